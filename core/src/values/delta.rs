//! Calendar-aware relative deltas.
//!
//! A [`CalendarDelta`] carries relative fields (`years`, `months`, `days`,
//! `leapdays`) and absolute overrides (`year`, `month`, `day`, `weekday`).
//! Applying it to a date replaces the absolute fields first, then adds the
//! relative years and months (clamping the day to the end of the month),
//! then the relative days, and finally rolls forward to the requested
//! weekday.

use core::fmt;

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta, Weekday};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CalendarDelta {
    pub years: i64,
    pub months: i64,
    /// Weeks are folded into days on construction.
    pub days: i64,
    pub leapdays: i64,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub weekday: Option<Weekday>,
}

impl CalendarDelta {
    pub fn months(months: i64) -> Self {
        Self {
            months,
            ..Self::default()
        }
        .normalized()
    }

    /// Keeps `months` within -11..=11 by carrying into `years`.
    pub fn normalized(mut self) -> Self {
        if self.months.abs() > 11 {
            self.years += self.months / 12;
            self.months %= 12;
        }
        self
    }

    pub fn weeks(&self) -> i64 {
        self.days / 7
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// `None` when the result falls outside the representable date range.
    pub fn apply(&self, date: NaiveDate) -> Option<NaiveDate> {
        let mut year = self.year.unwrap_or(date.year()) as i64 + self.years;
        let mut month = self.month.unwrap_or(date.month()) as i64 + self.months;
        if month > 12 {
            year += 1;
            month -= 12;
        } else if month < 1 {
            year -= 1;
            month += 12;
        }
        let year = i32::try_from(year).ok()?;
        let month = month as u32;
        let day = self
            .day
            .unwrap_or(date.day())
            .min(days_in_month(year, month)?)
            .max(1);
        let mut result = NaiveDate::from_ymd_opt(year, month, day)?;

        let mut days = self.days;
        if self.leapdays != 0 && month > 2 && is_leap_year(year) {
            days += self.leapdays;
        }
        result = result.checked_add_signed(TimeDelta::try_days(days)?)?;

        if let Some(weekday) = self.weekday {
            let ahead = (7 + weekday.num_days_from_monday() as i64
                - result.weekday().num_days_from_monday() as i64)
                % 7;
            result = result.checked_add_signed(TimeDelta::try_days(ahead)?)?;
        }
        Some(result)
    }

    pub fn apply_datetime(&self, datetime: NaiveDateTime) -> Option<NaiveDateTime> {
        Some(self.apply(datetime.date())?.and_time(datetime.time()))
    }

    /// Sum of two deltas. Absolute fields of `other` win when set.
    pub fn add(&self, other: &CalendarDelta) -> CalendarDelta {
        CalendarDelta {
            years: self.years + other.years,
            months: self.months + other.months,
            days: self.days + other.days,
            leapdays: if other.leapdays != 0 {
                other.leapdays
            } else {
                self.leapdays
            },
            year: other.year.or(self.year),
            month: other.month.or(self.month),
            day: other.day.or(self.day),
            weekday: other.weekday.or(self.weekday),
        }
        .normalized()
    }

    /// Negates the relative fields; absolute fields are kept.
    pub fn negate(&self) -> CalendarDelta {
        CalendarDelta {
            years: -self.years,
            months: -self.months,
            days: -self.days,
            leapdays: -self.leapdays,
            ..*self
        }
    }

    pub fn scale(&self, factor: i64) -> Option<CalendarDelta> {
        Some(
            CalendarDelta {
                years: self.years.checked_mul(factor)?,
                months: self.months.checked_mul(factor)?,
                days: self.days.checked_mul(factor)?,
                leapdays: self.leapdays.checked_mul(factor)?,
                ..*self
            }
            .normalized(),
        )
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = first.checked_add_months(Months::new(1))?;
    Some(next.signed_duration_since(first).num_days() as u32)
}

pub fn weekday_from_index(index: i64) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

impl fmt::Display for CalendarDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        for (name, value) in [
            ("years", self.years),
            ("months", self.months),
            ("days", self.days),
            ("leapdays", self.leapdays),
        ] {
            if value != 0 {
                parts.push(format!("{name}={value:+}"));
            }
        }
        if let Some(year) = self.year {
            parts.push(format!("year={year}"));
        }
        if let Some(month) = self.month {
            parts.push(format!("month={month}"));
        }
        if let Some(day) = self.day {
            parts.push(format!("day={day}"));
        }
        if let Some(weekday) = self.weekday {
            parts.push(format!("weekday={}", weekday.to_string()[..2].to_uppercase()));
        }
        write!(f, "relativedelta({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_months_clamp_to_month_end() {
        let delta = CalendarDelta::months(1);
        assert_eq!(delta.apply(ymd(2024, 1, 31)), Some(ymd(2024, 2, 29)));
        assert_eq!(delta.apply(ymd(2023, 1, 31)), Some(ymd(2023, 2, 28)));
        assert_eq!(delta.apply(ymd(2023, 12, 15)), Some(ymd(2024, 1, 15)));
        assert_eq!(
            CalendarDelta::months(-1).apply(ymd(2024, 3, 31)),
            Some(ymd(2024, 2, 29))
        );
    }

    #[test]
    fn test_months_normalize_into_years() {
        let delta = CalendarDelta::months(14);
        assert_eq!((delta.years, delta.months), (1, 2));
        let delta = CalendarDelta::months(-13);
        assert_eq!((delta.years, delta.months), (-1, -1));
        assert_eq!(delta.apply(ymd(2024, 1, 10)), Some(ymd(2022, 12, 10)));
    }

    #[test]
    fn test_absolute_fields_apply_first() {
        let end_of_month = CalendarDelta {
            day: Some(31),
            ..CalendarDelta::default()
        };
        assert_eq!(end_of_month.apply(ymd(2024, 4, 10)), Some(ymd(2024, 4, 30)));

        let next_year_start = CalendarDelta {
            years: 1,
            month: Some(1),
            day: Some(1),
            ..CalendarDelta::default()
        };
        assert_eq!(next_year_start.apply(ymd(2024, 6, 15)), Some(ymd(2025, 1, 1)));
    }

    #[test]
    fn test_weekday_rolls_forward_inclusive() {
        let friday = CalendarDelta {
            weekday: Some(Weekday::Fri),
            ..CalendarDelta::default()
        };
        // 2024-05-15 is a Wednesday.
        assert_eq!(friday.apply(ymd(2024, 5, 15)), Some(ymd(2024, 5, 17)));
        assert_eq!(friday.apply(ymd(2024, 5, 17)), Some(ymd(2024, 5, 17)));
    }

    #[test]
    fn test_leapdays_only_after_february_of_leap_years() {
        let delta = CalendarDelta {
            leapdays: -1,
            ..CalendarDelta::default()
        };
        assert_eq!(delta.apply(ymd(2024, 3, 10)), Some(ymd(2024, 3, 9)));
        assert_eq!(delta.apply(ymd(2024, 2, 10)), Some(ymd(2024, 2, 10)));
        assert_eq!(delta.apply(ymd(2023, 3, 10)), Some(ymd(2023, 3, 10)));
    }

    #[test]
    fn test_display() {
        let delta = CalendarDelta {
            months: 1,
            day: Some(31),
            ..CalendarDelta::default()
        };
        assert_eq!(delta.to_string(), "relativedelta(months=+1, day=31)");
    }

    #[test]
    fn test_overflow_is_none() {
        let delta = CalendarDelta {
            years: i64::from(i32::MAX),
            ..CalendarDelta::default()
        };
        assert_eq!(delta.apply(ymd(2024, 1, 1)), None);
    }
}
