pub mod obs;
pub mod runner;
