use crate::config::MessagingEnv;
use chrono::{DateTime, FixedOffset, Timelike};
use fangjia_domain::entities::catalog::CityCatalog;
use fangjia_domain::entities::dataset::Dataset;
use fangjia_domain::repositories::notifier::{Notification, Notifier, NotifyOutcome};
use fangjia_domain::services::summary::{city_averages, render_summary};

pub const REPORT_FILE_NAME: &str = "house_price_report.html";

pub fn time_period(hour: u32) -> &'static str {
    match hour {
        6..=11 => "上午",
        12..=17 => "下午",
        _ => "晚间",
    }
}

pub fn title_line(now: &DateTime<FixedOffset>) -> String {
    format!("{} - 月度房价趋势推送", now.format("%Y年%m月%d日"))
}

pub fn remark_line(now: &DateTime<FixedOffset>) -> String {
    format!("{}房价月报", time_period(now.hour()))
}

/// `owner/repo` → GitHub Pages address of the published report.
pub fn github_pages_url(repository: &str) -> Option<String> {
    let (owner, repo) = repository.trim().split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some(format!("https://{owner}.github.io/{repo}/{REPORT_FILE_NAME}"))
}

pub fn cache_busted(url: &str, unix_seconds: i64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}t={unix_seconds}")
}

/// Configured page URL first, then the one derived from the repository name.
pub fn resolve_page_url(configured: Option<&str>, env: &MessagingEnv) -> Option<String> {
    configured
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .or_else(|| env.github_repository.as_deref().and_then(github_pages_url))
}

pub fn build_notification(
    env: &MessagingEnv,
    summary: String,
    page_url: &str,
    now: &DateTime<FixedOffset>,
) -> Notification {
    Notification {
        recipient: env.open_id.clone(),
        template_id: env.template_id.clone(),
        title: title_line(now),
        summary,
        remark: remark_line(now),
        url: cache_busted(page_url, now.timestamp()),
    }
}

/// Summarises the dataset and sends it. Never fails; problems come back as a
/// non-zero status.
pub fn push_summary(
    dataset: &Dataset,
    catalog: &CityCatalog,
    env: &MessagingEnv,
    page_url: &str,
    notifier: &dyn Notifier,
    now: &DateTime<FixedOffset>,
) -> NotifyOutcome {
    let averages = city_averages(dataset, catalog);
    if averages.is_empty() {
        tracing::warn!("no prices to summarise, notification skipped");
        return NotifyOutcome {
            status: -1,
            message: "dataset has no prices to summarise".to_string(),
        };
    }

    let notification = build_notification(env, render_summary(&averages), page_url, now);
    let outcome = notifier.send(&notification);
    let result_label = if outcome.is_success() { "ok" } else { "err" };
    metrics::counter!("fangjia.app.notify.pushes_total", "result" => result_label).increment(1);
    tracing::info!(
        status = outcome.status,
        cities = averages.len(),
        "summary pushed"
    );
    outcome
}
