use crate::services::round_cents;
use crate::value_objects::weekly_point::WeeklyPoint;
use chrono::{Datelike, Duration, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const LIVE_BASE_VOLUME: f64 = 50.0;
pub const LIVE_PRICE_JITTER: f64 = 0.02;
pub const LIVE_VOLUME_JITTER: f64 = 0.3;
pub const MIN_LIVE_VOLUME: f64 = 10.0;

pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// `weeks` consecutive Mondays starting at the Monday of `start`'s week.
pub fn week_starts(start: NaiveDate, weeks: usize) -> Vec<NaiveDate> {
    let first = monday_of(start);
    (0..weeks)
        .map(|idx| first + Duration::weeks(idx as i64))
        .collect()
}

/// Start date of a horizon of `weeks` weeks that ends in the week of `today`.
pub fn window_start(today: NaiveDate, weeks: usize) -> NaiveDate {
    let span = weeks.saturating_sub(1) as i64;
    monday_of(today) - Duration::weeks(span)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Weekly view of a live price: the current price with bounded noise per week.
pub fn perturb_weekly(
    current_price: f64,
    dates: &[NaiveDate],
    seed: u64,
    source: &str,
) -> Vec<WeeklyPoint> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    dates
        .iter()
        .map(|date| {
            let price_noise: f64 = rng.gen_range(-1.0..=1.0);
            let volume_noise: f64 = rng.gen_range(-1.0..=1.0);
            let volume = (LIVE_BASE_VOLUME * (1.0 + LIVE_VOLUME_JITTER * volume_noise))
                .max(MIN_LIVE_VOLUME);
            WeeklyPoint {
                date: format_date(*date),
                average_price: round_cents(current_price * (1.0 + LIVE_PRICE_JITTER * price_noise)),
                transaction_count: volume.round() as u32,
                source: source.to_string(),
            }
        })
        .collect()
}
