use crate::entities::dataset::Dataset;
use crate::entities::district_series::{latest_price, DistrictSeries};
use crate::value_objects::monthly_record::MonthlyRecord;
use crate::value_objects::year_month::YearMonth;
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub const DEFAULT_PRICE_TOLERANCE: f64 = 100.0;
pub const EQUIVALENCE_WINDOW: usize = 3;

/// One record per month, ascending; a later record replaces an earlier one.
pub fn dedupe_by_month(records: impl IntoIterator<Item = MonthlyRecord>) -> Vec<MonthlyRecord> {
    let mut by_month: BTreeMap<String, MonthlyRecord> = BTreeMap::new();
    for record in records {
        by_month.insert(record.month.clone(), record);
    }
    by_month.into_values().collect()
}

pub fn merge_series(existing: &DistrictSeries, incoming: &DistrictSeries) -> DistrictSeries {
    let monthly_data = dedupe_by_month(
        existing
            .monthly_data
            .iter()
            .chain(incoming.monthly_data.iter())
            .cloned(),
    );
    let current_price = latest_price(&monthly_data).or(incoming.current_price);
    DistrictSeries {
        current_price,
        monthly_data,
        source: incoming.source.clone(),
        crawl_time: incoming.crawl_time.clone(),
    }
}

/// Drops records older than `cutoff`; unparsable months are kept. Returns the
/// number of removed records.
pub fn prune_series(series: &mut DistrictSeries, cutoff: YearMonth) -> usize {
    let before = series.monthly_data.len();
    series
        .monthly_data
        .retain(|record| YearMonth::parse(&record.month).map_or(true, |month| month >= cutoff));
    let removed = before - series.monthly_data.len();
    if removed > 0 {
        series.refresh_current_price();
    }
    removed
}

pub fn prune_cutoff(max_age_months: u32, today: NaiveDate) -> YearMonth {
    YearMonth::from_date(today).minus_months(max_age_months)
}

pub fn prune_dataset(dataset: &mut Dataset, max_age_months: u32, today: NaiveDate) -> usize {
    let cutoff = prune_cutoff(max_age_months, today);
    dataset
        .series_mut()
        .map(|series| prune_series(series, cutoff))
        .sum()
}

/// Whether `incoming` carries nothing new compared to `existing`.
///
/// Differences must stay strictly below `tolerance`, both for the current
/// price and for the most recent months of each series.
pub fn is_equivalent(incoming: &DistrictSeries, existing: &DistrictSeries, tolerance: f64) -> bool {
    let close = |a: f64, b: f64| (a - b).abs() < tolerance;

    match (incoming.current_price, existing.current_price) {
        (Some(a), Some(b)) if !close(a, b) => return false,
        (Some(_), None) | (None, Some(_)) => return false,
        _ => {}
    }

    let recent_new = most_recent(&incoming.monthly_data);
    let recent_old = most_recent(&existing.monthly_data);
    if recent_new.len() != recent_old.len() {
        return false;
    }
    recent_new.iter().zip(recent_old.iter()).all(|(a, b)| {
        a.month == b.month && close(a.second_hand_price, b.second_hand_price)
    })
}

fn most_recent(records: &[MonthlyRecord]) -> Vec<&MonthlyRecord> {
    let mut sorted: Vec<&MonthlyRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.month.cmp(&a.month));
    sorted.truncate(EQUIVALENCE_WINDOW);
    sorted
}
