use crate::value_objects::monthly_record::MonthlyRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistrictSeries {
    pub current_price: Option<f64>,
    #[serde(default)]
    pub monthly_data: Vec<MonthlyRecord>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub crawl_time: String,
}

impl DistrictSeries {
    /// Builds a series whose `current_price` is derived from the records.
    pub fn from_records(
        mut monthly_data: Vec<MonthlyRecord>,
        source: impl Into<String>,
        crawl_time: impl Into<String>,
    ) -> Self {
        sort_by_month(&mut monthly_data);
        Self {
            current_price: latest_price(&monthly_data),
            monthly_data,
            source: source.into(),
            crawl_time: crawl_time.into(),
        }
    }

    pub fn latest(&self) -> Option<&MonthlyRecord> {
        latest_record(&self.monthly_data)
    }

    pub fn refresh_current_price(&mut self) {
        self.current_price = latest_price(&self.monthly_data);
    }
}

pub fn sort_by_month(records: &mut [MonthlyRecord]) {
    records.sort_by(|a, b| a.month.cmp(&b.month));
}

/// Record with the greatest month string; on ties the last one wins.
pub fn latest_record(records: &[MonthlyRecord]) -> Option<&MonthlyRecord> {
    records.iter().max_by(|a, b| a.month.cmp(&b.month))
}

pub fn latest_price(records: &[MonthlyRecord]) -> Option<f64> {
    latest_record(records).map(|record| record.second_hand_price)
}
