//! Date Package
//!
//! Calendar arithmetic, business days, formatting and parsing, built on
//! `chrono`. Format strings use strftime syntax.
//!
//! Design notes:
//! - Business days are Monday to Friday; there is no holiday calendar
//! - "Today" comes from the evaluator, so hosts can pin the clock in tests
//! - Loops that step a script-controlled number of times check the time
//!   budget on every step

use core::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Weekday};

use crate::api::Registry;
use crate::errors::{InvalidExpression, Result};
use crate::evaluator::Evaluator;
use crate::values::{Args, Builtin, CalendarDelta, Value, is_leap_year, weekday_from_index};

use super::{expect_date, expect_datetime, expect_f64, expect_int, expect_str, is_missing, required, str_or};

pub const DEFAULT_FORMAT: &str = "%Y-%m-%d";

/// Formats tried by `universal_parse_date` when the caller gives none,
/// after the day-first or month-first ones.
const ISO_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y%m%d",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d %Y",
    "%B %d %Y",
];
const DAY_FIRST_FORMATS: &[&str] = &["%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y", "%d/%m/%y"];
const MONTH_FIRST_FORMATS: &[&str] = &["%m/%d/%Y", "%m.%d.%Y", "%m-%d-%Y", "%m/%d/%y"];

pub(super) fn register(registry: &mut Registry) {
    registry.define("now", Builtin::with_context(now));
    registry.define("date", Builtin::new(date));
    registry.define("date_min", Builtin::new(date_min));
    registry.define("date_max", Builtin::new(date_max));
    registry.define("isleap", Builtin::new(isleap));

    registry.define("days", Builtin::new(days));
    registry.define("weeks", Builtin::new(weeks));
    registry.define("months", Builtin::new(months));
    registry.define("timedelta", Builtin::new(timedelta));
    registry.define("add_days", Builtin::new(add_days));
    registry.define("add_weeks", Builtin::new(add_weeks));
    registry.define("add_workdays", Builtin::with_context(add_workdays));

    registry.define("format_date", Builtin::new(format_date_fn));
    registry.define("parse_date", Builtin::new(parse_date_fn));
    registry.define("universal_parse_date", Builtin::new(universal_parse_date));
    registry.define("unix_to_date", Builtin::new(unix_to_date));

    registry.define("last_business_day", Builtin::new(last_business_day));
    registry.define(
        "get_date_last_week_end_business",
        Builtin::with_context(|ev, args| period_end(ev, args, "get_date_last_week_end_business", Period::Week)),
    );
    registry.define(
        "get_date_last_month_end_business",
        Builtin::with_context(|ev, args| period_end(ev, args, "get_date_last_month_end_business", Period::Month)),
    );
    registry.define(
        "get_date_last_quarter_end_business",
        Builtin::with_context(|ev, args| period_end(ev, args, "get_date_last_quarter_end_business", Period::Quarter)),
    );
    registry.define(
        "get_date_last_year_end_business",
        Builtin::with_context(|ev, args| period_end(ev, args, "get_date_last_year_end_business", Period::Year)),
    );
}

// ============================================================================
// Formatting and parsing
// ============================================================================

/// Render a date-time with a strftime format.
///
/// Plain dates are formatted as midnight of that day, so `%H` and friends
/// are accepted for both.
pub fn format_date(datetime: NaiveDateTime, format: &str) -> Result<String> {
    let items = StrftimeItems::new(format);
    if items.clone().any(|item| matches!(item, Item::Error)) {
        return Err(InvalidExpression::eval(format!("invalid date format '{format}'")));
    }
    let mut out = String::new();
    write!(out, "{}", datetime.format_with_items(items))
        .map_err(|_| InvalidExpression::eval(format!("invalid date format '{format}'")))?;
    Ok(out)
}

/// Parse a date with a strftime format. Formats carrying a time of day are
/// accepted and the time is dropped.
pub fn parse_date(text: &str, format: &str) -> Result<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, format)
        .or_else(|_| NaiveDateTime::parse_from_str(text, format).map(|dt| dt.date()))
        .map_err(|_| {
            InvalidExpression::eval(format!(
                "time data '{text}' does not match format '{format}'"
            ))
        })
}

fn format_date_fn(args: Args) -> Result<Value> {
    let [value, format] = args.bind("format_date", ["date", "format"])?;
    let value = expect_datetime(&required(value, "format_date", "date")?, "format_date", "date")?;
    let format = str_or(format, DEFAULT_FORMAT, "format_date", "format")?;
    format_date(value, &format).map(Value::from)
}

fn parse_date_fn(args: Args) -> Result<Value> {
    let [text, format] = args.bind("parse_date", ["text", "format"])?;
    let text = required(text, "parse_date", "text")?;
    if let Some(date) = text.as_date() {
        return Ok(Value::Date(date));
    }
    let text = expect_str(&text, "parse_date", "text")?;
    let format = str_or(format, DEFAULT_FORMAT, "parse_date", "format")?;
    parse_date(&text, &format).map(Value::Date)
}

/// `universal_parse_date(text, formats=None, dayfirst=False)`: try each
/// format in turn and return the first date that parses.
fn universal_parse_date(args: Args) -> Result<Value> {
    let [text, formats, dayfirst] =
        args.bind("universal_parse_date", ["text", "formats", "dayfirst"])?;
    let text = required(text, "universal_parse_date", "text")?;
    if let Some(date) = text.as_date() {
        return Ok(Value::Date(date));
    }
    let text = expect_str(&text, "universal_parse_date", "text")?;
    let formats: Vec<String> = match formats {
        Some(v) if !v.is_none() => v
            .iterate()?
            .iter()
            .map(|f| expect_str(f, "universal_parse_date", "formats"))
            .collect::<Result<_>>()?,
        _ => {
            let dayfirst = dayfirst.is_some_and(|v| v.is_truthy());
            let local = if dayfirst {
                DAY_FIRST_FORMATS
            } else {
                MONTH_FIRST_FORMATS
            };
            local.iter().chain(ISO_FORMATS).map(|f| f.to_string()).collect()
        }
    };
    formats
        .iter()
        .find_map(|format| parse_date(&text, format).ok())
        .map(Value::Date)
        .ok_or_else(|| InvalidExpression::eval(format!("Unknown date format: '{text}'")))
}

/// `unix_to_date(timestamp, format=None)`: the UTC date of a Unix
/// timestamp, formatted when `format` is given.
fn unix_to_date(args: Args) -> Result<Value> {
    let [timestamp, format] = args.bind("unix_to_date", ["timestamp", "format"])?;
    let seconds = expect_f64(
        &required(timestamp, "unix_to_date", "timestamp")?,
        "unix_to_date",
        "timestamp",
    )?
    .floor();
    let datetime = (seconds.is_finite() && seconds.abs() < i64::MAX as f64)
        .then(|| DateTime::from_timestamp(seconds as i64, 0))
        .flatten()
        .ok_or_else(|| InvalidExpression::eval("timestamp out of range"))?
        .naive_utc();
    if is_missing(&format) {
        return Ok(Value::Date(datetime.date()));
    }
    let format = str_or(format, DEFAULT_FORMAT, "unix_to_date", "format")?;
    format_date(datetime, &format).map(Value::from)
}

// ============================================================================
// Construction
// ============================================================================

fn now(evaluator: &mut Evaluator, args: Args) -> Result<Value> {
    args.bind("now", [])?;
    Ok(Value::Date(evaluator.today()))
}

/// `date(year, month=1, day=1)`, or `date(value)` to coerce a string or
/// date-time.
fn date(args: Args) -> Result<Value> {
    let [year, month, day] = args.bind("date", ["year", "month", "day"])?;
    let year = required(year, "date", "year")?;
    if matches!(year, Value::Str(_) | Value::Date(_) | Value::DateTime(_)) {
        if month.is_some() || day.is_some() {
            return Err(InvalidExpression::type_error(
                "date() takes only one argument when given a date or string",
            ));
        }
        return expect_date(&year, "date", "year").map(Value::Date);
    }
    let year = expect_int(&year, "date", "year")?;
    let month = month.map_or(Ok(1), |v| expect_int(&v, "date", "month"))?;
    let day = day.map_or(Ok(1), |v| expect_int(&v, "date", "day"))?;
    ymd(year, month, day).map(Value::Date)
}

fn ymd(year: i64, month: i64, day: i64) -> Result<NaiveDate> {
    let (Ok(y), Ok(m), Ok(d)) = (i32::try_from(year), u32::try_from(month), u32::try_from(day))
    else {
        return Err(InvalidExpression::eval("date value out of range"));
    };
    if !(1..=12).contains(&m) {
        return Err(InvalidExpression::eval("month must be in 1..12"));
    }
    NaiveDate::from_ymd_opt(y, m, d)
        .ok_or_else(|| InvalidExpression::eval("day is out of range for month"))
}

fn date_min(args: Args) -> Result<Value> {
    args.bind("date_min", [])?;
    Ok(Value::Date(ymd(1, 1, 1)?))
}

fn date_max(args: Args) -> Result<Value> {
    args.bind("date_max", [])?;
    Ok(Value::Date(ymd(9999, 12, 31)?))
}

/// `isleap(year_or_date)`.
fn isleap(args: Args) -> Result<Value> {
    let [value] = args.bind("isleap", ["year"])?;
    let value = required(value, "isleap", "year")?;
    let year = match value.as_date() {
        Some(date) => date.year(),
        None => i32::try_from(expect_int(&value, "isleap", "year")?)
            .map_err(|_| InvalidExpression::eval("year out of range"))?,
    };
    Ok(Value::Bool(is_leap_year(year)))
}

// ============================================================================
// Durations and arithmetic
// ============================================================================

fn day_count(value: Option<Value>, function: &str, scale: i64) -> Result<TimeDelta> {
    let n = expect_int(&required(value, function, "n")?, function, "n")?;
    n.checked_mul(scale)
        .and_then(TimeDelta::try_days)
        .ok_or_else(|| InvalidExpression::eval("date value out of range"))
}

fn days(args: Args) -> Result<Value> {
    let [n] = args.bind("days", ["n"])?;
    day_count(n, "days", 1).map(Value::Duration)
}

fn weeks(args: Args) -> Result<Value> {
    let [n] = args.bind("weeks", ["n"])?;
    day_count(n, "weeks", 7).map(Value::Duration)
}

fn months(args: Args) -> Result<Value> {
    let [n] = args.bind("months", ["n"])?;
    let n = expect_int(&required(n, "months", "n")?, "months", "n")?;
    Ok(Value::Delta(CalendarDelta::months(n)))
}

/// `timedelta(years=0, months=0, weeks=0, days=0, leapdays=0, year=None,
/// month=None, day=None, weekday=None)`: a calendar-aware delta.
fn timedelta(args: Args) -> Result<Value> {
    const PARAMS: [&str; 9] = [
        "years", "months", "weeks", "days", "leapdays", "year", "month", "day", "weekday",
    ];
    let [years, months, weeks, days, leapdays, year, month, day, weekday] =
        args.bind("timedelta", PARAMS)?;
    let relative = |v: Option<Value>, name: &str| -> Result<i64> {
        match v {
            None | Some(Value::None) => Ok(0),
            Some(v) => expect_int(&v, "timedelta", name),
        }
    };
    let absolute = |v: Option<Value>,
                    name: &str,
                    range: core::ops::RangeInclusive<i64>|
     -> Result<Option<i64>> {
        match v {
            None | Some(Value::None) => Ok(None),
            Some(v) => {
                let n = expect_int(&v, "timedelta", name)?;
                if range.contains(&n) {
                    Ok(Some(n))
                } else {
                    Err(InvalidExpression::eval(format!(
                        "timedelta() {name} must be in {}..{}",
                        range.start(),
                        range.end()
                    )))
                }
            }
        }
    };
    let weeks = relative(weeks, "weeks")?;
    let days = relative(days, "days")?;
    let days = weeks
        .checked_mul(7)
        .and_then(|w| w.checked_add(days))
        .ok_or_else(|| InvalidExpression::eval("integer overflow"))?;
    let weekday = match absolute(weekday, "weekday", 0..=6)? {
        Some(i) => weekday_from_index(i),
        None => None,
    };
    Ok(Value::Delta(
        CalendarDelta {
            years: relative(years, "years")?,
            months: relative(months, "months")?,
            days,
            leapdays: relative(leapdays, "leapdays")?,
            year: absolute(year, "year", 1..=9999)?.map(|y| y as i32),
            month: absolute(month, "month", 1..=12)?.map(|m| m as u32),
            day: absolute(day, "day", 1..=31)?.map(|d| d as u32),
            weekday,
        }
        .normalized(),
    ))
}

fn shift(date: NaiveDate, delta: TimeDelta) -> Result<NaiveDate> {
    date.checked_add_signed(delta)
        .ok_or_else(|| InvalidExpression::eval("date value out of range"))
}

fn add_days(args: Args) -> Result<Value> {
    let [date, n] = args.bind("add_days", ["date", "n"])?;
    let date = expect_date(&required(date, "add_days", "date")?, "add_days", "date")?;
    shift(date, day_count(n, "add_days", 1)?).map(Value::Date)
}

fn add_weeks(args: Args) -> Result<Value> {
    let [date, n] = args.bind("add_weeks", ["date", "n"])?;
    let date = expect_date(&required(date, "add_weeks", "date")?, "add_weeks", "date")?;
    shift(date, day_count(n, "add_weeks", 7)?).map(Value::Date)
}

fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// `add_workdays(date, n)`: move `n` business days, skipping weekends.
/// A negative `n` moves backwards.
fn add_workdays(evaluator: &mut Evaluator, args: Args) -> Result<Value> {
    let [date, n] = args.bind("add_workdays", ["date", "n"])?;
    let mut date = expect_date(&required(date, "add_workdays", "date")?, "add_workdays", "date")?;
    let n = expect_int(&required(n, "add_workdays", "n")?, "add_workdays", "n")?;
    let step = TimeDelta::days(n.signum());
    for _ in 0..n.unsigned_abs() {
        evaluator.check_time()?;
        date = shift(date, step)?;
        while !is_business_day(date) {
            date = shift(date, step)?;
        }
    }
    Ok(Value::Date(date))
}

// ============================================================================
// Business period ends
// ============================================================================

/// The latest business day on or before `date`.
fn roll_back(mut date: NaiveDate) -> Result<NaiveDate> {
    while !is_business_day(date) {
        date = shift(date, TimeDelta::days(-1))?;
    }
    Ok(date)
}

/// `last_business_day(date, include_today=True)`.
fn last_business_day(args: Args) -> Result<Value> {
    let [date, include_today] = args.bind("last_business_day", ["date", "include_today"])?;
    let mut date = expect_date(
        &required(date, "last_business_day", "date")?,
        "last_business_day",
        "date",
    )?;
    if include_today.is_some_and(|v| !v.is_truthy()) {
        date = shift(date, TimeDelta::days(-1))?;
    }
    roll_back(date).map(Value::Date)
}

#[derive(Debug, Clone, Copy)]
enum Period {
    Week,
    Month,
    Quarter,
    Year,
}

impl Period {
    /// First day of the period containing `date`.
    fn start(self, date: NaiveDate) -> Result<NaiveDate> {
        match self {
            Period::Week => shift(
                date,
                TimeDelta::days(-i64::from(date.weekday().num_days_from_monday())),
            ),
            Period::Month => ymd(date.year().into(), date.month().into(), 1),
            Period::Quarter => {
                let month = (date.month0() / 3) * 3 + 1;
                ymd(date.year().into(), month.into(), 1)
            }
            Period::Year => ymd(date.year().into(), 1, 1),
        }
    }
}

/// The last business day of the period before the one containing `date`
/// (today when omitted).
fn period_end(evaluator: &mut Evaluator, args: Args, function: &str, period: Period) -> Result<Value> {
    let [date] = args.bind(function, ["date"])?;
    let date = match date {
        Some(v) if !v.is_none() => expect_date(&v, function, "date")?,
        _ => evaluator.today(),
    };
    let previous_end = shift(period.start(date)?, TimeDelta::days(-1))?;
    roll_back(previous_end).map(Value::Date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_format_date() {
        let midnight = d(2024, 3, 5).and_time(chrono::NaiveTime::MIN);
        assert_eq!(format_date(midnight, "%d/%m/%Y").unwrap(), "05/03/2024");
        assert_eq!(format_date(midnight, "%Y-%m-%d %H:%M").unwrap(), "2024-03-05 00:00");
        assert!(format_date(midnight, "%Q").is_err());
        assert!(format_date(midnight, "%z").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-02-29", DEFAULT_FORMAT).unwrap(), d(2024, 2, 29));
        assert_eq!(parse_date(" 01.02.2024 ", "%d.%m.%Y").unwrap(), d(2024, 2, 1));
        assert_eq!(
            parse_date("2024-02-29T10:30:00", "%Y-%m-%dT%H:%M:%S").unwrap(),
            d(2024, 2, 29)
        );
        let err = parse_date("2023-02-29", DEFAULT_FORMAT).unwrap_err();
        assert_eq!(
            err.message(),
            "time data '2023-02-29' does not match format '%Y-%m-%d'"
        );
    }

    #[test]
    fn test_period_starts() {
        // 2024-05-15 is a Wednesday.
        let date = d(2024, 5, 15);
        assert_eq!(Period::Week.start(date).unwrap(), d(2024, 5, 13));
        assert_eq!(Period::Month.start(date).unwrap(), d(2024, 5, 1));
        assert_eq!(Period::Quarter.start(date).unwrap(), d(2024, 4, 1));
        assert_eq!(Period::Year.start(date).unwrap(), d(2024, 1, 1));
    }

    #[test]
    fn test_roll_back_to_friday() {
        assert_eq!(roll_back(d(2024, 6, 30)).unwrap(), d(2024, 6, 28));
        assert_eq!(roll_back(d(2024, 6, 28)).unwrap(), d(2024, 6, 28));
    }
}
