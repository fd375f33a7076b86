pub mod lsa;
pub mod lsdb;
pub mod neighbor;
pub mod routing;
