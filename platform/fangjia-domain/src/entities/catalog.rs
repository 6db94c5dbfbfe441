use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_PRICE: f64 = 30_000.0;
pub const DEFAULT_COEFFICIENT: f64 = 1.0;

fn default_coefficient() -> f64 {
    DEFAULT_COEFFICIENT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistrictEntry {
    pub name: String,
    pub region_code: String,
    #[serde(default = "default_coefficient")]
    pub coefficient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CityEntry {
    pub name: String,
    pub base_price: f64,
    pub districts: Vec<DistrictEntry>,
}

/// Fetch universe: every tracked city and district, in a fixed iteration order.
#[derive(Debug, Clone, PartialEq)]
pub struct CityCatalog {
    cities: Vec<CityEntry>,
}

impl CityCatalog {
    pub fn new(cities: Vec<CityEntry>) -> Result<Self, String> {
        if cities.is_empty() {
            return Err("catalog must contain at least one city".to_string());
        }
        for (idx, city) in cities.iter().enumerate() {
            if city.name.trim().is_empty() {
                return Err("catalog city name must not be empty".to_string());
            }
            if cities[..idx].iter().any(|other| other.name == city.name) {
                return Err(format!("catalog city {} is listed twice", city.name));
            }
            if !city.base_price.is_finite() || city.base_price <= 0.0 {
                return Err(format!("catalog city {} has invalid base_price", city.name));
            }
            if city.districts.is_empty() {
                return Err(format!("catalog city {} has no districts", city.name));
            }
            for district in &city.districts {
                if district.name.trim().is_empty() || district.region_code.trim().is_empty() {
                    return Err(format!(
                        "catalog city {} has a district without name or region_code",
                        city.name
                    ));
                }
                if !district.coefficient.is_finite() || district.coefficient <= 0.0 {
                    return Err(format!(
                        "catalog district {}-{} has invalid coefficient",
                        city.name, district.name
                    ));
                }
            }
        }
        Ok(Self { cities })
    }

    pub fn builtin() -> Self {
        fn city(name: &str, base_price: f64, districts: &[(&str, &str, f64)]) -> CityEntry {
            CityEntry {
                name: name.to_string(),
                base_price,
                districts: districts
                    .iter()
                    .map(|(name, code, coefficient)| DistrictEntry {
                        name: name.to_string(),
                        region_code: code.to_string(),
                        coefficient: *coefficient,
                    })
                    .collect(),
            }
        }

        Self {
            cities: vec![
                city(
                    "北京",
                    60_000.0,
                    &[
                        ("朝阳", "618", 1.2),
                        ("海淀", "613", 1.3),
                        ("西城", "606", 1.5),
                        ("东城", "617", 1.4),
                        ("丰台", "614", 0.9),
                        ("昌平", "620", 1.0),
                        ("顺义", "608", 1.0),
                    ],
                ),
                city(
                    "上海",
                    58_000.0,
                    &[
                        ("浦东", "2491", 1.2),
                        ("徐汇", "2487", 1.4),
                        ("静安", "2496", 1.6),
                        ("黄浦", "2497", 1.5),
                        ("长宁", "2500", 1.3),
                    ],
                ),
                city(
                    "广州",
                    32_000.0,
                    &[
                        ("天河", "873", 1.3),
                        ("越秀", "872", 1.2),
                        ("海珠", "878", 1.1),
                        ("荔湾", "876", 1.0),
                        ("白云", "882", 0.8),
                    ],
                ),
                city(
                    "深圳",
                    55_000.0,
                    &[
                        ("福田", "953", 1.4),
                        ("罗湖", "951", 1.2),
                        ("南山", "950", 1.5),
                        ("宝安", "954", 0.9),
                        ("龙岗", "952", 0.8),
                    ],
                ),
                city(
                    "杭州",
                    40_000.0,
                    &[
                        ("西湖", "3321", 1.3),
                        ("上城", "3323", 1.2),
                        ("余杭", "3319", 0.9),
                    ],
                ),
            ],
        }
    }

    pub fn cities(&self) -> &[CityEntry] {
        &self.cities
    }

    pub fn city(&self, name: &str) -> Option<&CityEntry> {
        self.cities.iter().find(|city| city.name == name)
    }

    pub fn district(&self, city: &str, district: &str) -> Option<&DistrictEntry> {
        self.city(city)?
            .districts
            .iter()
            .find(|entry| entry.name == district)
    }

    pub fn region_code(&self, city: &str, district: &str) -> Option<&str> {
        self.district(city, district)
            .map(|entry| entry.region_code.as_str())
    }

    pub fn base_price(&self, city: &str) -> f64 {
        self.city(city)
            .map(|entry| entry.base_price)
            .unwrap_or(DEFAULT_BASE_PRICE)
    }

    pub fn coefficient(&self, city: &str, district: &str) -> f64 {
        self.district(city, district)
            .map(|entry| entry.coefficient)
            .unwrap_or(DEFAULT_COEFFICIENT)
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.cities.iter().flat_map(|city| {
            city.districts
                .iter()
                .map(move |district| (city.name.as_str(), district.name.as_str()))
        })
    }

    pub fn district_count(&self) -> usize {
        self.cities.iter().map(|city| city.districts.len()).sum()
    }
}
