pub mod prober;
pub mod transport;
