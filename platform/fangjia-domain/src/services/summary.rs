use crate::entities::catalog::CityCatalog;
use crate::entities::dataset::Dataset;
use crate::services::round_cents;

pub const SUMMARY_HEADER: &str = "📊 **北上广深房价月报摘要**\n\n";
pub const SUMMARY_FOOTER: &str = "\n📈 完整报告包含各区域详细数据和走势图表，请点击查看。";

/// Mean of each district's latest second-hand price, per city.
///
/// Catalog cities come first in catalog order, followed by any other city
/// present in the dataset. Cities without a single record are skipped.
pub fn city_averages(dataset: &Dataset, catalog: &CityCatalog) -> Vec<(String, f64)> {
    let mut names: Vec<&str> = catalog.cities().iter().map(|c| c.name.as_str()).collect();
    for (city, _, _) in dataset.iter() {
        if !names.contains(&city) {
            names.push(city);
        }
    }

    names
        .into_iter()
        .filter_map(|city| {
            let prices: Vec<f64> = dataset
                .city(city)?
                .values()
                .filter_map(|series| series.latest().map(|r| r.second_hand_price))
                .collect();
            if prices.is_empty() {
                return None;
            }
            let mean = prices.iter().sum::<f64>() / prices.len() as f64;
            Some((city.to_string(), round_cents(mean)))
        })
        .collect()
}

pub fn render_summary(averages: &[(String, f64)]) -> String {
    let mut ranked: Vec<&(String, f64)> = averages.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut out = String::from(SUMMARY_HEADER);
    for (city, price) in ranked {
        out.push_str(&format!("🏙️ {city}: ¥{} 元/平方米\n", with_thousands(*price)));
    }
    out.push_str(SUMMARY_FOOTER);
    out
}

/// `52040.4` → `52,040`.
pub fn with_thousands(value: f64) -> String {
    let rounded = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (idx, ch) in rounded.chars().enumerate() {
        if idx > 0 && (rounded.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0.0 && rounded != "0" {
        grouped.insert(0, '-');
    }
    grouped
}
