pub mod collector;
pub mod extract;

pub use collector::{CollectorSettings, GotohuiCollector};
pub use extract::extract_monthly_records;
