pub mod catalog;
pub mod dataset;
pub mod district_series;
