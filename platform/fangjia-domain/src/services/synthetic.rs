use crate::entities::catalog::CityCatalog;
use crate::services::round_cents;
use crate::services::seed::seed_for;
use crate::services::weekly::{format_date, week_starts};
use crate::value_objects::weekly_point::WeeklyPoint;
use chrono::NaiveDate;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f64::consts::PI;

pub const SYNTHETIC_SOURCE: &str = "聚汇数据(模拟)";

const MAX_SLOPE: f64 = 0.1;
const SEASON_AMPLITUDE: f64 = 0.03;
const SEASON_PERIOD_WEEKS: f64 = 52.0;
const NOISE_LEVEL: f64 = 0.02;
const BASE_VOLUME: f64 = 100.0;
const VOLUME_JITTER: f64 = 0.3;
const MIN_VOLUME: f64 = 20.0;

/// Weight of each week's `trend + season + noise` in the compounded product.
/// The terms read as yearly rates, so one week carries 1/52 of them.
const STEP_SCALE: f64 = 1.0 / 52.0;

/// Placeholder weekly series for a district with no live data.
///
/// `price(t) = base × coefficient × Π_{k≤t} (1 + STEP_SCALE × (trend(k) + season(k) + noise(k)))`
/// with a trend rising linearly from 0 to a seeded slope in `[-0.1, 0.1]`, a
/// 52-week sine of amplitude 0.03, and uniform noise in `±0.02`.
pub fn generate_weekly(
    catalog: &CityCatalog,
    city: &str,
    district: &str,
    start: NaiveDate,
    weeks: usize,
) -> Vec<WeeklyPoint> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed_for(city, district));
    let anchor = catalog.base_price(city) * catalog.coefficient(city, district);
    generate_with_rng(&mut rng, anchor, start, weeks)
}

fn generate_with_rng(
    rng: &mut impl Rng,
    anchor: f64,
    start: NaiveDate,
    weeks: usize,
) -> Vec<WeeklyPoint> {
    let slope: f64 = rng.gen_range(-MAX_SLOPE..=MAX_SLOPE);
    let mut price = anchor;
    let mut points = Vec::with_capacity(weeks);

    for (idx, date) in week_starts(start, weeks).into_iter().enumerate() {
        let noise: f64 = rng.gen_range(-NOISE_LEVEL..=NOISE_LEVEL);
        price *= weekly_change(idx, weeks, slope, noise);

        let deviation = (price / anchor - 1.0).abs();
        let volume_factor = (1.0 - 0.5 * deviation).max(0.5);
        let jitter: f64 = rng.gen_range(-1.0..=1.0);
        let volume = (BASE_VOLUME * volume_factor * (1.0 + VOLUME_JITTER * jitter)).max(MIN_VOLUME);

        points.push(WeeklyPoint {
            date: format_date(date),
            average_price: round_cents(price),
            transaction_count: volume.round() as u32,
            source: SYNTHETIC_SOURCE.to_string(),
        });
    }
    points
}

/// Factor for week `t` of a `weeks`-long horizon.
fn weekly_change(t: usize, weeks: usize, slope: f64, noise: f64) -> f64 {
    let trend = if weeks > 1 {
        slope * t as f64 / (weeks - 1) as f64
    } else {
        0.0
    };
    let season = SEASON_AMPLITUDE * (2.0 * PI * t as f64 / SEASON_PERIOD_WEEKS).sin();
    1.0 + STEP_SCALE * (trend + season + noise)
}
