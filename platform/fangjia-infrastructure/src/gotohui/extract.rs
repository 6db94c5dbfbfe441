use fangjia_domain::services::months::normalize_month_token;
use fangjia_domain::services::round_cents;
use fangjia_domain::value_objects::monthly_record::MonthlyRecord;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

pub const TABLE_KEYWORDS: [&str; 4] = ["二手房", "新房", "月份", "元/㎡"];
const UNKNOWN_YEAR: &str = "未知";

type Strategy = fn(&Html, Option<i32>) -> Vec<MonthlyRecord>;

/// Tried in order; the first strategy yielding at least one record wins.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("table", from_tables),
    ("text_seq_two_prices", from_text_seq_two_prices),
    ("text_seq_price", from_text_seq_price),
    ("text_month_price", from_text_month_price),
];

static NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[0-9][0-9,]*(?:\.[0-9]+)?").ok());
static SEQ_MONTH_TWO_PRICES: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"([0-9]+)\s+([0-9]{4}-[0-9]{2})\s+([0-9]+(?:\.[0-9]+)?)\s+([0-9]+(?:\.[0-9]+)?)")
        .ok()
});
static SEQ_MONTH_PRICE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"([0-9]+)\s+([0-9]{4}-[0-9]{2})\s+([0-9]+(?:\.[0-9]+)?)").ok()
});
static MONTH_PRICE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([0-9]{4}-[0-9]{2})\s+([0-9]+(?:\.[0-9]+)?)").ok());

/// Parses one provider page into monthly records. Never fails; an
/// unrecognised page yields no records.
pub fn extract_monthly_records(page: &str, year_hint: Option<i32>) -> Vec<MonthlyRecord> {
    let document = Html::parse_document(page);
    for (name, strategy) in STRATEGIES {
        let records = strategy(&document, year_hint);
        if !records.is_empty() {
            tracing::debug!(strategy = *name, records = records.len(), "extracted monthly records");
            return records;
        }
    }
    tracing::debug!(year = ?year_hint, "no monthly records found on page");
    Vec::new()
}

pub fn table_source(year_hint: Option<i32>) -> String {
    format!("聚汇数据-{}年度页面", year_label(year_hint))
}

pub fn text_source(year_hint: Option<i32>) -> String {
    format!("聚汇数据-{}文本提取", year_label(year_hint))
}

fn year_label(year_hint: Option<i32>) -> String {
    year_hint
        .map(|year| year.to_string())
        .unwrap_or_else(|| UNKNOWN_YEAR.to_string())
}

/// First numeric run of a cell, thousands separators removed.
pub fn first_number(text: &str) -> Option<f64> {
    let found = NUMBER.as_ref()?.find(text)?;
    found.as_str().replace(',', "").parse().ok()
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0).map(round_cents)
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn from_tables(document: &Html, year_hint: Option<i32>) -> Vec<MonthlyRecord> {
    let (Ok(tables), Ok(rows), Ok(cells)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("td, th"),
    ) else {
        return Vec::new();
    };

    for table in document.select(&tables) {
        let text: String = table.text().collect();
        if !TABLE_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
            continue;
        }

        let records: Vec<MonthlyRecord> = table
            .select(&rows)
            .skip(1)
            .filter_map(|row| {
                let values: Vec<String> = row.select(&cells).map(cell_text).collect();
                parse_table_row(&values, year_hint)
            })
            .collect();
        if !records.is_empty() {
            return records;
        }
    }
    Vec::new()
}

/// `[month, second_hand, new_house?]`, or `[seq, month, second_hand, new_house]`
/// when the first cell is a row number.
pub fn parse_table_row(values: &[String], year_hint: Option<i32>) -> Option<MonthlyRecord> {
    if values.len() < 3 {
        return None;
    }
    let sequence_first = values.len() >= 4
        && !values[0].is_empty()
        && values[0].bytes().all(|b| b.is_ascii_digit());
    let offset = usize::from(sequence_first);

    let month = normalize_month_token(&values[offset], year_hint)?;
    let second_hand = positive(first_number(&values[offset + 1]))?;
    let new_house = values
        .get(offset + 2)
        .and_then(|cell| positive(first_number(cell)));

    Some(MonthlyRecord::new(
        month,
        second_hand,
        new_house,
        table_source(year_hint),
    ))
}

fn page_text(document: &Html) -> String {
    document.root_element().text().collect::<Vec<_>>().join(" ")
}

fn from_text_seq_two_prices(document: &Html, year_hint: Option<i32>) -> Vec<MonthlyRecord> {
    let Some(pattern) = SEQ_MONTH_TWO_PRICES.as_ref() else {
        return Vec::new();
    };
    scan_text(&page_text(document), pattern, 2, Some(4), year_hint)
}

fn from_text_seq_price(document: &Html, year_hint: Option<i32>) -> Vec<MonthlyRecord> {
    let Some(pattern) = SEQ_MONTH_PRICE.as_ref() else {
        return Vec::new();
    };
    scan_text(&page_text(document), pattern, 2, None, year_hint)
}

fn from_text_month_price(document: &Html, year_hint: Option<i32>) -> Vec<MonthlyRecord> {
    let Some(pattern) = MONTH_PRICE.as_ref() else {
        return Vec::new();
    };
    scan_text(&page_text(document), pattern, 1, None, year_hint)
}

fn scan_text(
    text: &str,
    pattern: &Regex,
    month_group: usize,
    new_house_group: Option<usize>,
    year_hint: Option<i32>,
) -> Vec<MonthlyRecord> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| {
            let month = normalize_month_token(caps.get(month_group)?.as_str(), None)?;
            let second_hand =
                positive(caps.get(month_group + 1)?.as_str().parse::<f64>().ok())?;
            let new_house = new_house_group
                .and_then(|group| caps.get(group))
                .and_then(|m| positive(m.as_str().parse::<f64>().ok()));
            Some(MonthlyRecord::new(
                month,
                second_hand,
                new_house,
                text_source(year_hint),
            ))
        })
        .collect()
}
