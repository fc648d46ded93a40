pub mod anneal;
pub mod construct;
pub mod grid;
pub mod parallel;
pub mod spatial;
