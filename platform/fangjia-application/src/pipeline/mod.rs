use crate::config::Config;
use chrono::{DateTime, FixedOffset};
use fangjia_domain::entities::catalog::CityCatalog;
use fangjia_domain::entities::dataset::Dataset;
use fangjia_domain::entities::district_series::DistrictSeries;
use fangjia_domain::repositories::dataset_store::DatasetStore;
use fangjia_domain::repositories::price_source::PriceSource;
use fangjia_domain::repositories::report::ReportWriter;
use fangjia_domain::services::reconcile::{is_equivalent, merge_series, prune_dataset};
use fangjia_domain::services::seed::seed_for;
use fangjia_domain::services::synthetic::generate_weekly;
use fangjia_domain::services::weekly::{perturb_weekly, week_starts, window_start};
pub use fangjia_domain::value_objects::weekly_point::WeeklySeries;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub weeks: usize,
    pub max_age_months: u32,
    pub price_tolerance: f64,
    pub report_path: PathBuf,
    pub district_pause_min_ms: u64,
    pub district_pause_max_ms: u64,
    pub seed: Option<u64>,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            weeks: config.run.weeks,
            max_age_months: config.run.max_age_months,
            price_tolerance: config.run.price_tolerance,
            report_path: PathBuf::from(&config.run.report_path),
            district_pause_min_ms: config.collector.district_pause_min_ms,
            district_pause_max_ms: config.collector.district_pause_max_ms,
            seed: config.fetch.seed,
        }
    }
}

pub struct PipelinePorts<'a> {
    pub source: &'a dyn PriceSource,
    pub store: &'a dyn DatasetStore,
    pub report: &'a dyn ReportWriter,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub districts: usize,
    pub live: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub synthetic: usize,
    pub pruned_records: usize,
    pub saved: bool,
    pub report_written: bool,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub dataset: Dataset,
    pub weekly: WeeklySeries,
    /// Generated series of the districts that had no live data.
    pub synthetic: WeeklySeries,
    pub stats: RunStats,
}

pub fn report_timestamp(now: &DateTime<FixedOffset>) -> String {
    now.format("%Y年%m月%d日 %H:%M:%S").to_string()
}

/// Reconciles one live series into the dataset. Returns true when the stored
/// series changed.
fn reconcile_live(
    dataset: &mut Dataset,
    city: &str,
    district: &str,
    incoming: &DistrictSeries,
    tolerance: f64,
) -> bool {
    let merged = match dataset.get(city, district) {
        Some(existing) if is_equivalent(incoming, existing, tolerance) => return false,
        Some(existing) => merge_series(existing, incoming),
        None => merge_series(&DistrictSeries::default(), incoming),
    };
    dataset.insert(city, district, merged);
    true
}

/// One crawl cycle over every catalog district, in catalog order.
///
/// Live series are merged into the persisted dataset; districts with no live
/// data get a synthetic weekly series that is charted in the report but never
/// persisted. The dataset is saved only when something changed, then the
/// report is rendered.
pub fn run_pipeline(
    catalog: &CityCatalog,
    settings: &PipelineSettings,
    ports: &PipelinePorts<'_>,
    now: DateTime<FixedOffset>,
) -> RunOutcome {
    let span = tracing::info_span!("app.pipeline.run", weeks = settings.weeks);
    let _enter = span.enter();
    let start = Instant::now();

    let today = now.date_naive();
    let horizon_start = window_start(today, settings.weeks);
    let dates = week_starts(horizon_start, settings.weeks);
    let mut pause_rng = match settings.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    let mut dataset = ports.store.load();
    let mut weekly = WeeklySeries::new();
    let mut synthetic = WeeklySeries::new();
    let mut stats = RunStats::default();
    let total = catalog.district_count();

    for (idx, (city, district)) in catalog.pairs().enumerate() {
        let district_span = tracing::info_span!("app.pipeline.district", city = %city, district = %district);
        let _district_enter = district_span.enter();
        stats.districts += 1;

        let points = match ports.source.collect(city, district) {
            Some(incoming) => {
                stats.live += 1;
                let price = incoming
                    .current_price
                    .unwrap_or_else(|| catalog.base_price(city) * catalog.coefficient(city, district));
                let points = perturb_weekly(price, &dates, seed_for(city, district), &incoming.source);

                let outcome = if reconcile_live(
                    &mut dataset,
                    city,
                    district,
                    &incoming,
                    settings.price_tolerance,
                ) {
                    stats.updated += 1;
                    "updated"
                } else {
                    stats.unchanged += 1;
                    "unchanged"
                };
                metrics::counter!("fangjia.app.pipeline.districts_total", "outcome" => outcome)
                    .increment(1);
                tracing::info!(
                    outcome,
                    records = incoming.monthly_data.len(),
                    current_price = ?incoming.current_price,
                    "live data collected"
                );
                points
            }
            None => {
                stats.synthetic += 1;
                metrics::counter!("fangjia.app.pipeline.districts_total", "outcome" => "synthetic")
                    .increment(1);
                tracing::warn!("no live data, using synthetic series");
                let points = generate_weekly(catalog, city, district, horizon_start, settings.weeks);
                synthetic
                    .entry(city.to_string())
                    .or_default()
                    .insert(district.to_string(), points.clone());
                points
            }
        };
        weekly
            .entry(city.to_string())
            .or_default()
            .insert(district.to_string(), points);

        if idx + 1 < total && settings.district_pause_max_ms > 0 {
            let low = settings.district_pause_min_ms.min(settings.district_pause_max_ms);
            let wait = pause_rng.gen_range(low..=settings.district_pause_max_ms);
            std::thread::sleep(Duration::from_millis(wait));
        }
    }

    stats.pruned_records = prune_dataset(&mut dataset, settings.max_age_months, today);
    if stats.pruned_records > 0 {
        tracing::info!(removed = stats.pruned_records, "pruned records past retention");
    }

    if stats.updated > 0 || stats.pruned_records > 0 {
        match ports.store.save(&dataset) {
            Ok(()) => stats.saved = true,
            Err(err) => tracing::warn!(error = %err, "failed to save dataset"),
        }
    } else {
        tracing::info!("dataset unchanged, save skipped");
    }

    stats.report_written = write_report(catalog, settings, ports.report, &dataset, &synthetic, &now);

    metrics::histogram!("fangjia.app.pipeline.run_ms").record(start.elapsed().as_millis() as f64);
    tracing::info!(
        districts = stats.districts,
        live = stats.live,
        updated = stats.updated,
        unchanged = stats.unchanged,
        synthetic = stats.synthetic,
        saved = stats.saved,
        "crawl finished"
    );

    RunOutcome {
        dataset,
        weekly,
        synthetic,
        stats,
    }
}

fn write_report(
    catalog: &CityCatalog,
    settings: &PipelineSettings,
    report: &dyn ReportWriter,
    dataset: &Dataset,
    synthetic: &WeeklySeries,
    now: &DateTime<FixedOffset>,
) -> bool {
    let generated_at = report_timestamp(now);
    match report.write_report(&settings.report_path, dataset, synthetic, catalog, &generated_at) {
        Ok(()) => {
            tracing::info!(path = %settings.report_path.display(), "report written");
            true
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to write report");
            false
        }
    }
}

/// Re-renders the report from the persisted dataset without fetching. No
/// synthetic series are charted since nothing is collected.
pub fn render_report_only(
    catalog: &CityCatalog,
    settings: &PipelineSettings,
    store: &dyn DatasetStore,
    report: &dyn ReportWriter,
    now: DateTime<FixedOffset>,
) -> Result<Dataset, String> {
    let dataset = store.load();
    report.write_report(
        &settings.report_path,
        &dataset,
        &WeeklySeries::new(),
        catalog,
        &report_timestamp(&now),
    )?;
    Ok(dataset)
}
