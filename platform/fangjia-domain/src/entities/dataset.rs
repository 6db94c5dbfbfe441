use crate::entities::district_series::DistrictSeries;
use crate::value_objects::year_month::YearMonth;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted source of truth: city → district → series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    cities: BTreeMap<String, BTreeMap<String, DistrictSeries>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, city: &str, district: &str) -> Option<&DistrictSeries> {
        self.cities.get(city)?.get(district)
    }

    pub fn insert(&mut self, city: &str, district: &str, series: DistrictSeries) {
        self.cities
            .entry(city.to_string())
            .or_default()
            .insert(district.to_string(), series);
    }

    pub fn city(&self, city: &str) -> Option<&BTreeMap<String, DistrictSeries>> {
        self.cities.get(city)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &DistrictSeries)> {
        self.cities.iter().flat_map(|(city, districts)| {
            districts
                .iter()
                .map(move |(district, series)| (city.as_str(), district.as_str(), series))
        })
    }

    pub fn series_mut(&mut self) -> impl Iterator<Item = &mut DistrictSeries> {
        self.cities
            .values_mut()
            .flat_map(|districts| districts.values_mut())
    }

    pub fn is_empty(&self) -> bool {
        self.cities.values().all(BTreeMap::is_empty)
    }

    pub fn district_count(&self) -> usize {
        self.cities.values().map(BTreeMap::len).sum()
    }

    pub fn record_count(&self) -> usize {
        self.iter()
            .map(|(_, _, series)| series.monthly_data.len())
            .sum()
    }

    /// Rejects datasets carrying negative or non-finite prices, or months
    /// outside the `YYYY-MM` form.
    pub fn validate(&self) -> Result<(), String> {
        for (city, district, series) in self.iter() {
            if let Some(price) = series.current_price {
                if !price.is_finite() || price < 0.0 {
                    return Err(format!("invalid current_price for {city}-{district}: {price}"));
                }
            }
            if let Some(record) = series
                .monthly_data
                .iter()
                .find(|record| !record.has_valid_prices())
            {
                return Err(format!(
                    "invalid price for {city}-{district} month {}",
                    record.month
                ));
            }
            if let Some(record) = series
                .monthly_data
                .iter()
                .find(|record| YearMonth::parse(&record.month).is_none())
            {
                return Err(format!(
                    "invalid month for {city}-{district}: {:?}",
                    record.month
                ));
            }
        }
        Ok(())
    }
}
