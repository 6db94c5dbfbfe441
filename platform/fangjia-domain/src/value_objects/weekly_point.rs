use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPoint {
    pub date: String,
    pub average_price: f64,
    pub transaction_count: u32,
    pub source: String,
}

/// city → district → weekly points.
pub type WeeklySeries = BTreeMap<String, BTreeMap<String, Vec<WeeklyPoint>>>;
