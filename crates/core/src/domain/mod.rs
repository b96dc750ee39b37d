pub mod farmer;
pub mod recommendation;
pub mod soil;
pub mod weather;
