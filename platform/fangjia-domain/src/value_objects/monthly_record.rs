use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRecord {
    pub month: String,
    pub second_hand_price: f64,
    #[serde(default)]
    pub new_house_price: Option<f64>,
    #[serde(default)]
    pub source: String,
}

impl MonthlyRecord {
    pub fn new(
        month: impl Into<String>,
        second_hand_price: f64,
        new_house_price: Option<f64>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            month: month.into(),
            second_hand_price,
            new_house_price,
            source: source.into(),
        }
    }

    pub fn has_valid_prices(&self) -> bool {
        let valid = |price: f64| price.is_finite() && price >= 0.0;
        valid(self.second_hand_price) && self.new_house_price.map_or(true, valid)
    }
}
