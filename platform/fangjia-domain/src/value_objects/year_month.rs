use chrono::{Datelike, NaiveDate};
use std::fmt;

/// Calendar month in the canonical `YYYY-MM` form used by every stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(1..=12).contains(&month) || !(0..=9999).contains(&year) {
            return None;
        }
        Some(Self { year, month })
    }

    /// Strict parse of `YYYY-MM`; anything else (including `2024-13`) is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        let bytes = value.as_bytes();
        if bytes.len() != 7 || bytes[4] != b'-' {
            return None;
        }
        if !bytes[..4].iter().chain(&bytes[5..]).all(u8::is_ascii_digit) {
            return None;
        }
        let year = value[..4].parse().ok()?;
        let month = value[5..].parse().ok()?;
        Self::new(year, month)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn minus_months(self, months: u32) -> Self {
        let index = i64::from(self.year) * 12 + i64::from(self.month) - 1 - i64::from(months);
        let index = index.max(0);
        Self {
            year: (index / 12) as i32,
            month: (index % 12) as u32 + 1,
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::YearMonth;
    use chrono::NaiveDate;

    #[test]
    fn parse_accepts_only_canonical_months() {
        assert_eq!(YearMonth::parse("2024-09"), YearMonth::new(2024, 9));
        assert!(YearMonth::parse("2024-9").is_none());
        assert!(YearMonth::parse("2024-13").is_none());
        assert!(YearMonth::parse("2024-00").is_none());
        assert!(YearMonth::parse("24-09-01").is_none());
        assert!(YearMonth::parse("２０２４-09").is_none());
    }

    #[test]
    fn minus_months_crosses_year_boundaries() {
        let jan = YearMonth::new(2024, 1).unwrap();
        assert_eq!(jan.minus_months(1).to_string(), "2023-12");
        assert_eq!(jan.minus_months(60).to_string(), "2019-01");
        assert_eq!(jan.minus_months(0), jan);
    }

    #[test]
    fn from_date_drops_the_day() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        assert_eq!(YearMonth::from_date(date).to_string(), "2025-03");
    }
}
