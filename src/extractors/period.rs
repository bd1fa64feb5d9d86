// src/extractors/period.rs
use chrono::{Days, Months, NaiveDate};

/// Recognized fiscal-period codes from the `fp` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiscalPeriod {
    FullYear,
    CalendarYear,
    Half(u8),
    Trimester(u8),
    Quarter(u8),
}

impl FiscalPeriod {
    /// Parses a code such as `Q1` or `fy`. Surrounding whitespace and case are ignored.
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "FY" => Some(FiscalPeriod::FullYear),
            "CY" => Some(FiscalPeriod::CalendarYear),
            "H1" => Some(FiscalPeriod::Half(1)),
            "H2" => Some(FiscalPeriod::Half(2)),
            "T1" => Some(FiscalPeriod::Trimester(1)),
            "T2" => Some(FiscalPeriod::Trimester(2)),
            "T3" => Some(FiscalPeriod::Trimester(3)),
            "Q1" => Some(FiscalPeriod::Quarter(1)),
            "Q2" => Some(FiscalPeriod::Quarter(2)),
            "Q3" => Some(FiscalPeriod::Quarter(3)),
            "Q4" => Some(FiscalPeriod::Quarter(4)),
            _ => None,
        }
    }

    pub fn duration_months(&self) -> u32 {
        match self {
            FiscalPeriod::FullYear | FiscalPeriod::CalendarYear => 12,
            FiscalPeriod::Half(_) => 6,
            FiscalPeriod::Trimester(_) => 4,
            FiscalPeriod::Quarter(_) => 3,
        }
    }

    pub fn code(&self) -> String {
        match self {
            FiscalPeriod::FullYear => "FY".to_string(),
            FiscalPeriod::CalendarYear => "CY".to_string(),
            FiscalPeriod::Half(n) => format!("H{}", n),
            FiscalPeriod::Trimester(n) => format!("T{}", n),
            FiscalPeriod::Quarter(n) => format!("Q{}", n),
        }
    }
}

/// Parses the `period` column (`YYYYMMDD` as an integer).
pub fn parse_period_date(raw: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt((raw / 10_000) as i32, (raw / 100) % 100, raw % 100)
}

/// Returns `(start, start + duration - 1 day)`, or `None` for an unrecognized code.
/// Month addition clamps to the last day of the target month.
pub fn resolve(period_start: NaiveDate, code: &str) -> Option<(NaiveDate, NaiveDate)> {
    let period = FiscalPeriod::parse(code)?;
    let end = period_start
        .checked_add_months(Months::new(period.duration_months()))?
        .checked_sub_days(Days::new(1))?;
    Some((period_start, end))
}
