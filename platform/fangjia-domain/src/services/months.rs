use crate::value_objects::year_month::YearMonth;

const CHINESE_MONTHS: [&str; 12] = [
    "一月", "二月", "三月", "四月", "五月", "六月", "七月", "八月", "九月", "十月", "十一月",
    "十二月",
];

/// Normalizes a month cell to `YYYY-MM`.
///
/// Accepted forms, in order: a leading ISO `YYYY-MM` (day or suffix ignored),
/// a leading `12月` (so `12月份` also works), and the Chinese month names
/// `一月`..`十二月`. The last two need a year hint and yield `None` without one.
pub fn normalize_month_token(token: &str, year_hint: Option<i32>) -> Option<String> {
    let token = token.trim();
    if let Some(iso) = iso_prefix(token) {
        return Some(iso.to_string());
    }

    let month = bare_month(token).or_else(|| chinese_month(token))?;
    let year = year_hint?;
    YearMonth::new(year, month).map(|ym| ym.to_string())
}

fn iso_prefix(token: &str) -> Option<YearMonth> {
    let bytes = token.as_bytes();
    if bytes.len() < 7 || !bytes[..7].is_ascii() {
        return None;
    }
    if bytes.get(7).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    YearMonth::parse(&token[..7])
}

/// Leading `12月`; anything after the `月` (as in `12月份`) is ignored.
fn bare_month(token: &str) -> Option<u32> {
    let (digits, _rest) = token.split_once('月')?;
    if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn chinese_month(token: &str) -> Option<u32> {
    CHINESE_MONTHS
        .iter()
        .position(|name| *name == token)
        .map(|idx| idx as u32 + 1)
}
