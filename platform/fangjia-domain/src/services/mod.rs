pub mod clock;
pub mod months;
pub mod reconcile;
pub mod seed;
pub mod summary;
pub mod synthetic;
pub mod weekly;

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
