use crate::entities::district_series::DistrictSeries;

/// Live monthly series for one district; `None` when nothing could be extracted.
pub trait PriceSource {
    fn collect(&self, city: &str, district: &str) -> Option<DistrictSeries>;
}
