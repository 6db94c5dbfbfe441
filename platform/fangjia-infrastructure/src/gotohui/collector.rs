use crate::gotohui::extract::extract_monthly_records;
use chrono::{DateTime, Datelike, FixedOffset};
use fangjia_domain::entities::catalog::CityCatalog;
use fangjia_domain::entities::district_series::DistrictSeries;
use fangjia_domain::repositories::page_fetcher::PageFetcher;
use fangjia_domain::repositories::price_source::PriceSource;
use fangjia_domain::services::clock::{format_crawl_time, report_now};
use fangjia_domain::services::reconcile::dedupe_by_month;
use fangjia_domain::value_objects::monthly_record::MonthlyRecord;

pub const DEFAULT_BASE_URL: &str = "https://fangjia.gotohui.com";
pub const LIVE_SOURCE: &str = "聚汇数据-月度";

#[derive(Debug, Clone, PartialEq)]
pub struct CollectorSettings {
    pub base_url: String,
    pub years_window: u32,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            years_window: 5,
        }
    }
}

impl CollectorSettings {
    pub fn year_url(&self, region_code: &str, year: i32) -> String {
        format!("{}/years/{region_code}/{year}/", self.base_url.trim_end_matches('/'))
    }

    pub fn legacy_url(&self, region_code: &str) -> String {
        format!("{}/fjdata-{region_code}", self.base_url.trim_end_matches('/'))
    }
}

/// Multi-year sweep over the provider's year archive pages for one district,
/// with the legacy aggregate page as a last resort.
pub struct GotohuiCollector<F> {
    fetcher: F,
    catalog: CityCatalog,
    settings: CollectorSettings,
    clock: fn() -> DateTime<FixedOffset>,
}

impl<F: PageFetcher> GotohuiCollector<F> {
    pub fn new(fetcher: F, catalog: CityCatalog, settings: CollectorSettings) -> Self {
        Self::with_clock(fetcher, catalog, settings, report_now)
    }

    pub fn with_clock(
        fetcher: F,
        catalog: CityCatalog,
        settings: CollectorSettings,
        clock: fn() -> DateTime<FixedOffset>,
    ) -> Self {
        Self {
            fetcher,
            catalog,
            settings,
            clock,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    fn sweep_years(&self, region_code: &str, current_year: i32) -> Vec<MonthlyRecord> {
        let window = self.settings.years_window.max(1) as i32;
        let mut records = Vec::new();
        for year in (current_year - window + 1..=current_year).rev() {
            let url = self.settings.year_url(region_code, year);
            match self.fetcher.fetch(&url) {
                Ok(page) => {
                    let found = extract_monthly_records(&page, Some(year));
                    metrics::counter!(
                        "fangjia.infra.collector.pages_total",
                        "kind" => "year",
                        "result" => if found.is_empty() { "empty" } else { "ok" }
                    )
                    .increment(1);
                    tracing::debug!(year, records = found.len(), "year page extracted");
                    records.extend(found);
                }
                Err(err) => {
                    metrics::counter!(
                        "fangjia.infra.collector.pages_total",
                        "kind" => "year",
                        "result" => "err"
                    )
                    .increment(1);
                    tracing::warn!(year, error = %err, "year page unavailable");
                }
            }
        }
        records
    }

    fn legacy_page(&self, region_code: &str) -> Vec<MonthlyRecord> {
        let url = self.settings.legacy_url(region_code);
        match self.fetcher.fetch(&url) {
            Ok(page) => {
                let found = extract_monthly_records(&page, None);
                metrics::counter!(
                    "fangjia.infra.collector.pages_total",
                    "kind" => "legacy",
                    "result" => if found.is_empty() { "empty" } else { "ok" }
                )
                .increment(1);
                found
            }
            Err(err) => {
                metrics::counter!(
                    "fangjia.infra.collector.pages_total",
                    "kind" => "legacy",
                    "result" => "err"
                )
                .increment(1);
                tracing::warn!(error = %err, "legacy page unavailable");
                Vec::new()
            }
        }
    }
}

impl<F: PageFetcher> PriceSource for GotohuiCollector<F> {
    fn collect(&self, city: &str, district: &str) -> Option<DistrictSeries> {
        let span = tracing::info_span!("infra.collector.collect", city = %city, district = %district);
        let _enter = span.enter();

        let Some(region_code) = self.catalog.region_code(city, district) else {
            tracing::warn!("no region code for district");
            return None;
        };

        let now = (self.clock)();
        let mut records = self.sweep_years(region_code, now.year());
        if records.is_empty() {
            tracing::info!(region_code, "year archive empty, trying legacy page");
            records = self.legacy_page(region_code);
        }
        if records.is_empty() {
            return None;
        }

        Some(DistrictSeries::from_records(
            dedupe_by_month(records),
            LIVE_SOURCE,
            format_crawl_time(&now),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::{CollectorSettings, GotohuiCollector, LIVE_SOURCE};
    use chrono::{DateTime, FixedOffset, TimeZone};
    use fangjia_domain::entities::catalog::CityCatalog;
    use fangjia_domain::errors::RetrievalError;
    use fangjia_domain::repositories::page_fetcher::PageFetcher;
    use fangjia_domain::repositories::price_source::PriceSource;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeFetcher {
        pages: HashMap<String, String>,
        requested: RefCell<Vec<String>>,
    }

    impl FakeFetcher {
        fn with_page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }
    }

    impl PageFetcher for FakeFetcher {
        fn fetch(&self, url: &str) -> Result<String, RetrievalError> {
            self.requested.borrow_mut().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| RetrievalError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    fn fixed_clock() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 10, 18, 9, 30, 0)
            .unwrap()
    }

    fn settings() -> CollectorSettings {
        CollectorSettings {
            base_url: "http://fixture/".to_string(),
            years_window: 3,
        }
    }

    fn year_table(rows: &[(&str, &str)]) -> String {
        let body: String = rows
            .iter()
            .enumerate()
            .map(|(idx, (month, price))| {
                format!("<tr><td>{}</td><td>{month}</td><td>{price}</td><td>-</td></tr>", idx + 1)
            })
            .collect();
        format!("<table><tr><th>序号</th><th>日期</th><th>二手房</th><th>新房</th></tr>{body}</table>")
    }

    #[test]
    fn sweeps_newest_year_first_and_tolerates_missing_years() {
        let fetcher = FakeFetcher::default()
            .with_page(
                "http://fixture/years/618/2025/",
                &year_table(&[("2025-09", "52040"), ("2025-08", "51900")]),
            )
            .with_page(
                "http://fixture/years/618/2023/",
                &year_table(&[("2023-12", "60000")]),
            );
        let collector =
            GotohuiCollector::with_clock(fetcher, CityCatalog::builtin(), settings(), fixed_clock);

        let series = collector.collect("北京", "朝阳").expect("series");
        assert_eq!(
            *collector.fetcher().requested.borrow(),
            vec![
                "http://fixture/years/618/2025/".to_string(),
                "http://fixture/years/618/2024/".to_string(),
                "http://fixture/years/618/2023/".to_string(),
            ]
        );
        let months: Vec<_> = series.monthly_data.iter().map(|r| r.month.as_str()).collect();
        assert_eq!(months, vec!["2023-12", "2025-08", "2025-09"]);
        assert_eq!(series.current_price, Some(52040.0));
        assert_eq!(series.source, LIVE_SOURCE);
        assert_eq!(series.crawl_time, "2025-10-18 09:30:00");
    }

    #[test]
    fn falls_back_to_the_legacy_page_without_year_hint() {
        let fetcher = FakeFetcher::default()
            .with_page("http://fixture/fjdata-618", "<div>2025-07 51000</div>");
        let collector =
            GotohuiCollector::with_clock(fetcher, CityCatalog::builtin(), settings(), fixed_clock);

        let series = collector.collect("北京", "朝阳").expect("legacy series");
        assert_eq!(series.monthly_data.len(), 1);
        assert_eq!(series.monthly_data[0].source, "聚汇数据-未知文本提取");
        assert_eq!(collector.fetcher().requested.borrow().len(), 4);
    }

    #[test]
    fn returns_none_when_every_page_is_empty() {
        let collector = GotohuiCollector::with_clock(
            FakeFetcher::default(),
            CityCatalog::builtin(),
            settings(),
            fixed_clock,
        );
        assert!(collector.collect("北京", "朝阳").is_none());
    }

    #[test]
    fn unknown_district_issues_no_requests() {
        let collector = GotohuiCollector::with_clock(
            FakeFetcher::default(),
            CityCatalog::builtin(),
            settings(),
            fixed_clock,
        );
        assert!(collector.collect("北京", "通州").is_none());
        assert!(collector.fetcher().requested.borrow().is_empty());
    }
}
