use chrono::{DateTime, FixedOffset, Offset, Utc};

const REPORT_OFFSET_SECONDS: i32 = 8 * 3600;

/// Report time zone (Asia/Shanghai, no DST).
pub fn report_offset() -> FixedOffset {
    FixedOffset::east_opt(REPORT_OFFSET_SECONDS).unwrap_or_else(|| Utc.fix())
}

pub fn report_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&report_offset())
}

pub fn format_crawl_time(at: &DateTime<FixedOffset>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}
