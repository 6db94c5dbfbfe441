use chrono::{DateTime, FixedOffset};
use fangjia_application::config::{load_config_with_source, to_toml_pretty, Config, MessagingEnv};
use fangjia_application::notify::{push_summary, resolve_page_url};
use fangjia_application::pipeline::{
    render_report_only, run_pipeline, PipelinePorts, PipelineSettings, RunOutcome,
};
use fangjia_domain::entities::catalog::CityCatalog;
use fangjia_domain::entities::dataset::Dataset;
use fangjia_domain::repositories::dataset_store::DatasetStore;
use fangjia_domain::repositories::notifier::NotifyOutcome;
use fangjia_domain::services::clock::report_now;
use fangjia_infrastructure::gotohui::{CollectorSettings, GotohuiCollector};
use fangjia_infrastructure::http::{FetchPolicy, HttpPageFetcher};
use fangjia_infrastructure::notify::{NotifierConfig, WebhookNotifier};
use fangjia_infrastructure::persistence::JsonDatasetStore;
use fangjia_infrastructure::reporting::FilesystemReportWriter;
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Crawl,
    Push,
    Report,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Crawl => "crawl",
            RunMode::Push => "push",
            RunMode::Report => "report",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub mode: RunMode,
    pub config_path: Option<PathBuf>,
}

pub fn run(args: RunArgs) -> Result<Value, String> {
    run_with_env(args, |key| std::env::var(key).ok())
}

/// Same as [`run`], with messaging credentials read through `lookup`.
pub fn run_with_env(
    args: RunArgs,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Value, String> {
    let config = resolve_config(args.config_path.as_deref())?;
    let catalog = config.catalog()?;
    let settings = PipelineSettings::from_config(&config);
    let now = report_now();

    match args.mode {
        RunMode::Report => run_report(&config, &catalog, &settings, now),
        RunMode::Crawl => {
            let outcome = run_crawl(&config, &catalog, &settings, now)?;
            Ok(crawl_json(args.mode, &config, &outcome))
        }
        RunMode::Push => {
            let outcome = run_crawl(&config, &catalog, &settings, now)?;
            let mut value = crawl_json(args.mode, &config, &outcome);
            value["notification"] = match run_push(&config, &catalog, &outcome.dataset, &lookup, &now)
            {
                Ok(result) => json!(result),
                Err(reason) => {
                    tracing::warn!(reason = %reason, "notification skipped");
                    json!({ "skipped": reason })
                }
            };
            Ok(value)
        }
    }
}

fn resolve_config(path: Option<&std::path::Path>) -> Result<Config, String> {
    match path {
        Some(path) => {
            let (config, _source) = load_config_with_source(path)?;
            tracing::info!(path = %path.display(), "config loaded");
            Ok(config)
        }
        None => {
            let config = Config::default();
            config.validate()?;
            tracing::info!("no config given, using built-in defaults");
            if let Ok(rendered) = to_toml_pretty(&config) {
                tracing::debug!(config = %rendered, "effective config");
            }
            Ok(config)
        }
    }
}

pub fn fetch_policy(config: &Config) -> FetchPolicy {
    FetchPolicy {
        timeout_ms: config.fetch.timeout_ms,
        retries: config.fetch.retries,
        min_delay_ms: config.fetch.min_delay_ms,
        max_delay_ms: config.fetch.max_delay_ms,
        backoff_min_ms: config.fetch.backoff_min_ms,
        backoff_max_ms: config.fetch.backoff_max_ms,
        user_agent: config.fetch.user_agent.clone(),
        seed: config.fetch.seed,
    }
}

fn run_crawl(
    config: &Config,
    catalog: &CityCatalog,
    settings: &PipelineSettings,
    now: DateTime<FixedOffset>,
) -> Result<RunOutcome, String> {
    let fetcher = HttpPageFetcher::new(fetch_policy(config))?;
    let source = GotohuiCollector::new(
        fetcher,
        catalog.clone(),
        CollectorSettings {
            base_url: config.fetch.base_url.clone(),
            years_window: config.collector.years_window,
        },
    );
    let store = JsonDatasetStore::new(&config.run.data_path);
    let report = FilesystemReportWriter::new();
    let ports = PipelinePorts {
        source: &source,
        store: &store,
        report: &report,
    };
    Ok(run_pipeline(catalog, settings, &ports, now))
}

fn crawl_json(mode: RunMode, config: &Config, outcome: &RunOutcome) -> Value {
    json!({
        "status": "ok",
        "mode": mode.as_str(),
        "data_path": config.run.data_path,
        "report_path": config.run.report_path,
        "stats": outcome.stats,
        "districts_stored": outcome.dataset.district_count(),
        "records_stored": outcome.dataset.record_count(),
        "synthetic_weekly": outcome.synthetic,
    })
}

fn run_report(
    config: &Config,
    catalog: &CityCatalog,
    settings: &PipelineSettings,
    now: DateTime<FixedOffset>,
) -> Result<Value, String> {
    let store = JsonDatasetStore::new(&config.run.data_path);
    let report = FilesystemReportWriter::new();
    let (report_written, dataset) = match render_report_only(catalog, settings, &store, &report, now)
    {
        Ok(dataset) => (true, dataset),
        Err(err) => {
            tracing::warn!(error = %err, "failed to write report");
            (false, store.load())
        }
    };
    Ok(json!({
        "status": "ok",
        "mode": RunMode::Report.as_str(),
        "data_path": config.run.data_path,
        "report_path": config.run.report_path,
        "report_written": report_written,
        "districts_stored": dataset.district_count(),
        "records_stored": dataset.record_count(),
    }))
}

/// Everything needed to deliver a push, or the reason it must be skipped.
pub struct PushTarget {
    pub notifier: NotifierConfig,
    pub env: MessagingEnv,
    pub page_url: String,
}

pub fn resolve_push_target(
    config: &Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PushTarget, String> {
    let notify = config
        .notify
        .as_ref()
        .ok_or_else(|| "config has no [notify] section".to_string())?;
    let env = MessagingEnv::from_lookup(lookup)?;
    let page_url = resolve_page_url(notify.page_url.as_deref(), &env).ok_or_else(|| {
        "no notify.page_url configured and GITHUB_REPOSITORY is not set".to_string()
    })?;
    Ok(PushTarget {
        notifier: NotifierConfig {
            send_url: notify.send_url.clone(),
            token_url: notify.token_url.clone(),
            app_id: env.app_id.clone(),
            app_secret: env.app_secret.clone(),
            timeout_ms: notify.timeout_ms,
        },
        env,
        page_url,
    })
}

fn run_push(
    config: &Config,
    catalog: &CityCatalog,
    dataset: &Dataset,
    lookup: impl Fn(&str) -> Option<String>,
    now: &DateTime<FixedOffset>,
) -> Result<NotifyOutcome, String> {
    let target = resolve_push_target(config, lookup)?;
    let notifier = WebhookNotifier::new(target.notifier)?;
    Ok(push_summary(
        dataset,
        catalog,
        &target.env,
        &target.page_url,
        &notifier,
        now,
    ))
}

#[cfg(test)]
mod tests {
    use super::{fetch_policy, resolve_push_target, RunMode};
    use fangjia_application::config::{Config, NotifyConfig};
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const CREDENTIALS: &[(&str, &str)] = &[
        ("APP_ID", "app"),
        ("APP_SECRET", "secret"),
        ("OPEN_ID", "user"),
        ("TEMPLATE_ID", "tpl"),
    ];

    #[test]
    fn push_is_skipped_without_notify_section() {
        let err = resolve_push_target(&Config::default(), lookup(CREDENTIALS))
            .err()
            .expect("skip reason");
        assert!(err.contains("[notify]"));
    }

    #[test]
    fn push_is_skipped_without_credentials() {
        let config = Config {
            notify: Some(NotifyConfig::default()),
            ..Config::default()
        };
        let err = resolve_push_target(&config, lookup(&[("APP_ID", "app")]))
            .err()
            .expect("skip reason");
        assert_eq!(
            err,
            "missing messaging credentials: APP_SECRET, OPEN_ID, TEMPLATE_ID"
        );
    }

    #[test]
    fn page_url_falls_back_to_repository_pages() {
        let config = Config {
            notify: Some(NotifyConfig::default()),
            ..Config::default()
        };
        let mut pairs = CREDENTIALS.to_vec();
        assert!(resolve_push_target(&config, lookup(&pairs)).is_err());

        pairs.push(("GITHUB_REPOSITORY", "someone/fangjia"));
        let target = resolve_push_target(&config, lookup(&pairs)).expect("target");
        assert_eq!(
            target.page_url,
            "https://someone.github.io/fangjia/house_price_report.html"
        );
        assert_eq!(target.notifier.app_id, "app");
        assert_eq!(target.env.open_id, "user");
    }

    #[test]
    fn fetch_policy_mirrors_config() {
        let mut config = Config::default();
        config.fetch.retries = 1;
        config.fetch.seed = Some(9);
        let policy = fetch_policy(&config);
        assert_eq!(policy.retries, 1);
        assert_eq!(policy.seed, Some(9));
        assert_eq!(policy.timeout_ms, config.fetch.timeout_ms);
        assert_eq!(RunMode::Push.as_str(), "push");
    }
}
