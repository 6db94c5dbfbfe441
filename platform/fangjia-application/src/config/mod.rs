use fangjia_domain::entities::catalog::{CityCatalog, CityEntry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    pub notify: Option<NotifyConfig>,
    pub catalog: Option<Vec<CityEntry>>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub weeks: usize,
    pub max_age_months: u32,
    pub data_path: String,
    pub report_path: String,
    pub price_tolerance: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            weeks: 260,
            max_age_months: 60,
            data_path: "crawl_data.json".to_string(),
            report_path: "house_price_report.html".to_string(),
            price_tolerance: 100.0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub retries: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_min_ms: u64,
    pub backoff_max_ms: u64,
    pub user_agent: Option<String>,
    pub seed: Option<u64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://fangjia.gotohui.com".to_string(),
            timeout_ms: 10_000,
            retries: 3,
            min_delay_ms: 500,
            max_delay_ms: 1_500,
            backoff_min_ms: 2_000,
            backoff_max_ms: 5_000,
            user_agent: None,
            seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CollectorConfig {
    pub years_window: u32,
    pub district_pause_min_ms: u64,
    pub district_pause_max_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            years_window: 5,
            district_pause_min_ms: 200,
            district_pause_max_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    pub send_url: String,
    pub token_url: Option<String>,
    /// Report page linked from the message; derived from `GITHUB_REPOSITORY` when absent.
    pub page_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            send_url: "https://api.weixin.qq.com/cgi-bin/message/template/send".to_string(),
            token_url: Some("https://api.weixin.qq.com/cgi-bin/token".to_string()),
            page_url: None,
            timeout_ms: 10_000,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        if self.run.weeks == 0 {
            return Err("run.weeks must be > 0".to_string());
        }
        if self.run.max_age_months == 0 {
            return Err("run.max_age_months must be > 0".to_string());
        }
        if !self.run.price_tolerance.is_finite() || self.run.price_tolerance <= 0.0 {
            return Err("run.price_tolerance must be a positive number".to_string());
        }
        if self.run.data_path.trim().is_empty() || self.run.report_path.trim().is_empty() {
            return Err("run.data_path and run.report_path must not be empty".to_string());
        }
        if self.fetch.base_url.trim().is_empty() {
            return Err("fetch.base_url must not be empty".to_string());
        }
        if self.fetch.min_delay_ms > self.fetch.max_delay_ms {
            return Err("fetch.min_delay_ms must be <= fetch.max_delay_ms".to_string());
        }
        if self.fetch.backoff_min_ms > self.fetch.backoff_max_ms {
            return Err("fetch.backoff_min_ms must be <= fetch.backoff_max_ms".to_string());
        }
        if self.collector.years_window == 0 {
            return Err("collector.years_window must be > 0".to_string());
        }
        if self.collector.district_pause_min_ms > self.collector.district_pause_max_ms {
            return Err(
                "collector.district_pause_min_ms must be <= collector.district_pause_max_ms"
                    .to_string(),
            );
        }
        if let Some(notify) = &self.notify {
            if notify.send_url.trim().is_empty() {
                return Err("notify.send_url must not be empty".to_string());
            }
        }
        self.catalog().map(|_| ())
    }

    /// Configured catalog, or the built-in one when the file has none.
    pub fn catalog(&self) -> Result<CityCatalog, String> {
        match &self.catalog {
            Some(cities) => CityCatalog::new(cities.clone()),
            None => Ok(CityCatalog::builtin()),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config, String> {
    let (config, _source) = load_config_with_source(path)?;
    Ok(config)
}

pub fn load_config_with_source(path: &Path) -> Result<(Config, String), String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))?;
    config
        .validate()
        .map_err(|err| format!("invalid config {}: {}", path.display(), err))?;
    Ok((config, contents))
}

pub fn to_toml_pretty(config: &Config) -> Result<String, String> {
    toml::to_string_pretty(config)
        .map_err(|err| format!("failed to serialize config as TOML: {err}"))
}

/// Messaging credentials, read from the process environment.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagingEnv {
    pub app_id: String,
    pub app_secret: String,
    pub open_id: String,
    pub template_id: String,
    pub github_repository: Option<String>,
}

impl MessagingEnv {
    pub const APP_ID: &'static str = "APP_ID";
    pub const APP_SECRET: &'static str = "APP_SECRET";
    pub const OPEN_ID: &'static str = "OPEN_ID";
    pub const TEMPLATE_ID: &'static str = "TEMPLATE_ID";
    pub const GITHUB_REPOSITORY: &'static str = "GITHUB_REPOSITORY";

    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Fails naming every missing credential.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = [
            Self::APP_ID,
            Self::APP_SECRET,
            Self::OPEN_ID,
            Self::TEMPLATE_ID,
        ];
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|key| read(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(format!("missing messaging credentials: {}", missing.join(", ")));
        }

        Ok(Self {
            app_id: read(Self::APP_ID).unwrap_or_default(),
            app_secret: read(Self::APP_SECRET).unwrap_or_default(),
            open_id: read(Self::OPEN_ID).unwrap_or_default(),
            template_id: read(Self::TEMPLATE_ID).unwrap_or_default(),
            github_repository: read(Self::GITHUB_REPOSITORY),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{load_config, load_config_with_source, to_toml_pretty, Config, MessagingEnv};
    use std::collections::HashMap;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn parse_config(toml_str: &str) -> Config {
        toml::from_str(toml_str).expect("config should parse")
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("");
        assert_eq!(config, Config::default());
        assert_eq!(config.run.weeks, 260);
        assert_eq!(config.fetch.retries, 3);
        assert_eq!(config.catalog().expect("catalog").district_count(), 25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn shipped_sample_config_is_valid() {
        let config = parse_config(include_str!("../../../../configs/fangjia.toml"));
        assert!(config.validate().is_ok());
        assert_eq!(config.run, Config::default().run);
        assert_eq!(config.notify, Some(super::NotifyConfig::default()));
    }

    #[test]
    fn parse_config_rejects_malformed_toml() {
        let err = toml::from_str::<Config>("[run\nweeks = 1").expect_err("malformed");
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn parse_config_rejects_unknown_fields() {
        let err = toml::from_str::<Config>("[fetch]\nretry = 3\n").expect_err("unknown field");
        assert!(err.to_string().to_lowercase().contains("unknown field"));
    }

    #[test]
    fn parse_partial_sections_and_custom_catalog() {
        let config = parse_config(
            r#"
[run]
weeks = 52
data_path = "out/crawl_data.json"

[fetch]
base_url = "http://127.0.0.1:9000"
retries = 0
seed = 7

[notify]
page_url = "https://example.github.io/fangjia/house_price_report.html"

[[catalog]]
name = "北京"
base_price = 60000.0
districts = [{ name = "朝阳", region_code = "618", coefficient = 1.2 }, { name = "海淀", region_code = "613" }]
"#,
        );
        assert_eq!(config.run.weeks, 52);
        assert_eq!(config.run.max_age_months, 60);
        assert_eq!(config.fetch.seed, Some(7));
        assert_eq!(config.fetch.timeout_ms, 10_000);
        let notify = config.notify.clone().expect("notify");
        assert!(notify.token_url.is_some());

        let catalog = config.catalog().expect("catalog");
        assert_eq!(catalog.district_count(), 2);
        assert_eq!(catalog.coefficient("北京", "海淀"), 1.0);
    }

    #[test]
    fn validate_rejects_inverted_delays_and_bad_catalog() {
        let mut config = Config::default();
        config.fetch.min_delay_ms = 2_000;
        assert!(config.validate().unwrap_err().contains("min_delay_ms"));

        let config = parse_config("[[catalog]]\nname = \"北京\"\nbase_price = 1.0\ndistricts = []\n");
        assert!(config.validate().unwrap_err().contains("no districts"));
    }

    #[test]
    fn config_roundtrips_through_pretty_toml() {
        let mut config = Config::default();
        config.catalog = Some(fangjia_domain::entities::catalog::CityCatalog::builtin().cities().to_vec());
        let text = to_toml_pretty(&config).expect("toml");
        assert_eq!(parse_config(&text), config);
    }

    #[test]
    fn load_config_reports_path_on_failure() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let path = std::env::temp_dir().join(format!("fangjia_cfg_{}_{nanos}.toml", std::process::id()));

        let err = load_config(&path).expect_err("missing file");
        assert!(err.starts_with("failed to read config"));

        std::fs::write(&path, "[run]\nweeks = 0\n").expect("write");
        let err = load_config(&path).expect_err("invalid");
        assert!(err.contains("run.weeks"));

        std::fs::write(&path, "[run]\nweeks = 4\n").expect("write");
        let (config, source) = load_config_with_source(&path).expect("valid");
        assert_eq!(config.run.weeks, 4);
        assert!(source.contains("weeks = 4"));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn messaging_env_lists_missing_credentials() {
        let mut vars = HashMap::new();
        vars.insert("APP_ID", "id");
        vars.insert("OPEN_ID", " ");
        let err = MessagingEnv::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
            .expect_err("missing");
        assert_eq!(err, "missing messaging credentials: APP_SECRET, OPEN_ID, TEMPLATE_ID");

        vars.insert("APP_SECRET", "s");
        vars.insert("OPEN_ID", "o");
        vars.insert("TEMPLATE_ID", "t");
        vars.insert("GITHUB_REPOSITORY", "someone/fangjia");
        let env = MessagingEnv::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
            .expect("complete");
        assert_eq!(env.open_id, "o");
        assert_eq!(env.github_repository.as_deref(), Some("someone/fangjia"));
    }
}
