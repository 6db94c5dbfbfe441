use fangjia_domain::errors::RetrievalError;
use fangjia_domain::repositories::page_fetcher::PageFetcher;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, UPGRADE_INSECURE_REQUESTS};
use serde::Serialize;
use std::time::{Duration, Instant};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";

#[derive(Debug, Clone, PartialEq)]
pub struct FetchPolicy {
    pub timeout_ms: u64,
    /// Extra attempts after the first one.
    pub retries: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_min_ms: u64,
    pub backoff_max_ms: u64,
    pub user_agent: Option<String>,
    pub seed: Option<u64>,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
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

impl FetchPolicy {
    /// No politeness delay and no backoff; used by tests against local servers.
    pub fn immediate(retries: u32) -> Self {
        Self {
            timeout_ms: 2_000,
            retries,
            min_delay_ms: 0,
            max_delay_ms: 0,
            backoff_min_ms: 0,
            backoff_max_ms: 0,
            user_agent: None,
            seed: Some(0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchCallInfo {
    pub attempts: u32,
    pub duration_ms: u64,
    pub status: Option<u16>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FetchCallResult {
    pub info: FetchCallInfo,
    pub body: Result<String, RetrievalError>,
}

pub struct HttpPageFetcher {
    policy: FetchPolicy,
    client: Client,
    rng: Mutex<ChaCha8Rng>,
}

impl HttpPageFetcher {
    pub fn new(policy: FetchPolicy) -> Result<Self, String> {
        if policy.min_delay_ms > policy.max_delay_ms {
            return Err("fetch min_delay_ms must be <= max_delay_ms".to_string());
        }
        if policy.backoff_min_ms > policy.backoff_max_ms {
            return Err("fetch backoff_min_ms must be <= backoff_max_ms".to_string());
        }

        let user_agent = policy
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

        let client = Client::builder()
            .timeout(Duration::from_millis(policy.timeout_ms))
            .user_agent(user_agent)
            .default_headers(headers)
            .gzip(true)
            .brotli(true)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;

        let rng = match policy.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Ok(Self {
            policy,
            client,
            rng: Mutex::new(rng),
        })
    }

    pub fn fetch_detailed(&self, url: &str) -> FetchCallResult {
        let span = tracing::info_span!(
            "infra.fetch.page",
            url = %url,
            timeout_ms = self.policy.timeout_ms,
            retries = self.policy.retries
        );
        let _enter = span.enter();

        let start = Instant::now();
        let mut attempts = 0u32;
        let mut last_status: Option<u16> = None;
        let mut last_error: Option<RetrievalError> = None;

        self.pause(self.politeness_delay());

        while attempts <= self.policy.retries {
            attempts += 1;
            if attempts > 1 {
                metrics::counter!("fangjia.infra.fetch.retries_total").increment(1);
                let wait = self.backoff_delay(attempts - 1);
                tracing::debug!(attempt = attempts, wait_ms = wait.as_millis() as u64, "retrying page fetch");
                self.pause(wait);
            }

            metrics::counter!("fangjia.infra.fetch.requests_total").increment(1);
            let attempt_start = Instant::now();
            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();
                    last_status = Some(status.as_u16());
                    metrics::histogram!(
                        "fangjia.infra.fetch.attempt_ms",
                        "status" => status.as_u16().to_string()
                    )
                    .record(attempt_start.elapsed().as_millis() as f64);

                    if !status.is_success() {
                        tracing::debug!(attempt = attempts, status = status.as_u16(), "non-success status");
                        last_error = Some(RetrievalError::HttpStatus {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                        continue;
                    }

                    match resp.text() {
                        Ok(body) => {
                            let duration_ms = start.elapsed().as_millis() as u64;
                            metrics::histogram!("fangjia.infra.fetch.call_ms", "result" => "ok")
                                .record(duration_ms as f64);
                            tracing::debug!(attempts, bytes = body.len(), "page fetched");
                            return FetchCallResult {
                                info: FetchCallInfo {
                                    attempts,
                                    duration_ms,
                                    status: last_status,
                                    error: None,
                                },
                                body: Ok(body),
                            };
                        }
                        Err(err) => {
                            last_error = Some(RetrievalError::Transport {
                                url: url.to_string(),
                                message: format!("failed to read body: {err}"),
                            });
                        }
                    }
                }
                Err(err) => {
                    metrics::histogram!("fangjia.infra.fetch.attempt_ms", "status" => "err")
                        .record(attempt_start.elapsed().as_millis() as f64);
                    tracing::debug!(attempt = attempts, error = %err, "transport failure");
                    last_error = Some(RetrievalError::Transport {
                        url: url.to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let error = last_error.unwrap_or_else(|| RetrievalError::Transport {
            url: url.to_string(),
            message: "request failed after retries".to_string(),
        });
        let kind = match error {
            RetrievalError::HttpStatus { .. } => "http_status",
            RetrievalError::Transport { .. } => "transport",
            RetrievalError::InvalidRequest(_) => "invalid_request",
        };
        metrics::counter!("fangjia.infra.fetch.errors_total", "kind" => kind).increment(1);
        metrics::histogram!("fangjia.infra.fetch.call_ms", "result" => "err")
            .record(duration_ms as f64);
        tracing::warn!(attempts, status = ?last_status, error = %error, "page fetch failed");

        FetchCallResult {
            info: FetchCallInfo {
                attempts,
                duration_ms,
                status: last_status,
                error: Some(error.to_string()),
            },
            body: Err(error),
        }
    }

    fn politeness_delay(&self) -> Duration {
        let (min, max) = (self.policy.min_delay_ms, self.policy.max_delay_ms);
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.rng.lock().gen_range(min..=max))
    }

    /// Wait before retry number `retry` (1-based): a jittered value in the
    /// upper half of a doubling ceiling capped at `backoff_max_ms`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let ceiling = backoff_ceiling(&self.policy, retry);
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.rng.lock().gen_range(ceiling / 2..=ceiling))
    }

    fn pause(&self, wait: Duration) {
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }
}

pub fn backoff_ceiling(policy: &FetchPolicy, retry: u32) -> u64 {
    let factor = 1u64 << retry.saturating_sub(1).min(16);
    policy
        .backoff_min_ms
        .saturating_mul(factor)
        .min(policy.backoff_max_ms)
}

impl PageFetcher for HttpPageFetcher {
    fn fetch(&self, url: &str) -> Result<String, RetrievalError> {
        if url.trim().is_empty() {
            return Err(RetrievalError::InvalidRequest("empty url".to_string()));
        }
        self.fetch_detailed(url).body
    }
}
