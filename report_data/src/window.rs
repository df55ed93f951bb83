use std::{fmt, str::FromStr};

use chrono::{Datelike as _, Days, NaiveDate};
use derive_more::derive::{Deref, Into};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// What people type on the command line.
const INPUT_FMT: &str = "%d/%m/%Y";
/// What `sreport start=`/`end=` wants.
const COMMAND_FMT: &str = "%m/%d/%Y";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid date `{input}`, expected a calendar date as dd/mm/yyyy")]
pub struct InvalidDateError {
    pub input: String,
    /// `None` when the input was turned down before chrono saw it
    #[source]
    source: Option<chrono::ParseError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, Into)]
pub struct ReportDate(pub NaiveDate);

impl ReportDate {
    pub fn parse(input: &str) -> Result<Self, InvalidDateError> {
        let trimmed = input.trim();
        // chrono's %Y takes any number of digits and a sign
        let year = trimmed.rsplit('/').next().unwrap_or_default();
        if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidDateError {
                input: input.to_owned(),
                source: None,
            });
        }

        NaiveDate::parse_from_str(trimmed, INPUT_FMT)
            .map(ReportDate)
            .map_err(|source| InvalidDateError {
                input: input.to_owned(),
                source: Some(source),
            })
    }

    pub fn to_command_format(&self) -> String {
        self.0.format(COMMAND_FMT).to_string()
    }
}

impl FromStr for ReportDate {
    type Err = InvalidDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ReportDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(INPUT_FMT))
    }
}

impl Serialize for ReportDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// `dd/mm/yyyy` -> `mm/dd/yyyy`
pub fn convert_date(input: &str) -> Result<String, InvalidDateError> {
    ReportDate::parse(input).map(|date| date.to_command_format())
}

/// Start and end as handed to the accounting command. Not checked for `start <= end`, slurm
/// complains about that itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ReportWindow {
    pub start: ReportDate,
    pub end: ReportDate,
}

impl ReportWindow {
    pub fn new(start: ReportDate, end: ReportDate) -> Self {
        Self { start, end }
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, InvalidDateError> {
        Ok(Self::new(ReportDate::parse(start)?, ReportDate::parse(end)?))
    }

    /// The calendar month before `today`. slurm treats `end` as midnight at the start of that
    /// day, so the window ends on the first of `today`'s month.
    pub fn previous_month(today: NaiveDate) -> Self {
        let end = today - Days::new(u64::from(today.day0()));
        let last_day = end - Days::new(1);
        let start = last_day - Days::new(u64::from(last_day.day0()));
        Self::new(ReportDate(start), ReportDate(end))
    }
}

impl fmt::Display for ReportWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

#[allow(non_snake_case)]
#[cfg(test)]
mod test {
    use color_eyre::Result;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Result<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| color_eyre::eyre::eyre!("bad test date"))
    }

    #[test]
    fn convert_date__swaps_day_and_month() -> Result<()> {
        assert_eq!(convert_date("01/02/2020")?, "02/01/2020");
        assert_eq!(convert_date("31/12/1999")?, "12/31/1999");
        assert_eq!(convert_date("29/02/2024")?, "02/29/2024");
        assert_eq!(convert_date(" 5/7/2021 ")?, "07/05/2021");
        Ok(())
    }

    #[test]
    fn convert_date__invalid() {
        for input in [
            "01/13/2020",
            "32/01/2020",
            "29/02/2023",
            "00/01/2020",
            "2020-01-02",
            "",
            "01/02/2020x",
            "01/02/20",
            "01/02/+2020",
            "01/02/-2020",
            "01/02/02020",
            "01/02/2020/",
        ] {
            let err = convert_date(input).expect_err(input);
            assert_eq!(err.input, input);
        }
    }

    #[test]
    fn ReportDate__from_str() -> Result<()> {
        let parsed: ReportDate = "15/03/2021".parse()?;
        assert_eq!(*parsed, date(2021, 3, 15)?);
        assert_eq!(parsed.to_string(), "15/03/2021");
        Ok(())
    }

    #[test]
    fn ReportWindow__previous_month() -> Result<()> {
        let window = ReportWindow::previous_month(date(2026, 10, 19)?);
        assert_eq!(window, ReportWindow::new(ReportDate(date(2026, 9, 1)?), ReportDate(date(2026, 10, 1)?)));

        let window = ReportWindow::previous_month(date(2024, 3, 1)?);
        assert_eq!(window, ReportWindow::new(ReportDate(date(2024, 2, 1)?), ReportDate(date(2024, 3, 1)?)));

        let window = ReportWindow::previous_month(date(2021, 1, 31)?);
        assert_eq!(window, ReportWindow::new(ReportDate(date(2020, 12, 1)?), ReportDate(date(2021, 1, 1)?)));
        Ok(())
    }

    #[test]
    fn ReportWindow__display() -> Result<()> {
        let window = ReportWindow::parse("01/09/2026", "01/10/2026")?;
        assert_eq!(window.to_string(), "01/09/2026 - 01/10/2026");
        Ok(())
    }
}
