//! Cadence for the periodic fetch-time export task.

use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// How often the external scheduler should fire the export task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// The instant the task should next run after `last`: the next full
    /// hour, next midnight, next Monday midnight, or first of the next
    /// month, all in UTC.
    pub fn next_time(&self, last: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = NaiveTime::MIN;
        let naive = match self {
            Frequency::Hourly => {
                last.date_naive().and_time(midnight) + Duration::hours(last.hour() as i64 + 1)
            }
            Frequency::Daily => (last.date_naive() + Days::new(1)).and_time(midnight),
            Frequency::Weekly => {
                let until_monday = 7 - last.weekday().num_days_from_monday() as u64;
                (last.date_naive() + Days::new(until_monday)).and_time(midnight)
            }
            Frequency::Monthly => {
                // First of the current month, then one month forward.
                (last.date_naive() - Days::new(last.day0() as u64) + Months::new(1))
                    .and_time(midnight)
            }
        };
        Utc.from_utc_datetime(&naive)
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hourly" => Ok(Frequency::Hourly),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(format!("unknown frequency '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn hourly_rounds_up_to_next_full_hour() {
        assert_eq!(
            Frequency::Hourly.next_time(at(2014, 3, 5, 17, 8)),
            at(2014, 3, 5, 18, 0)
        );
    }

    #[test]
    fn daily_is_next_midnight() {
        assert_eq!(
            Frequency::Daily.next_time(at(2014, 3, 5, 17, 8)),
            at(2014, 3, 6, 0, 0)
        );
    }

    #[test]
    fn weekly_is_next_monday_midnight() {
        // 2014-03-05 was a Wednesday.
        assert_eq!(
            Frequency::Weekly.next_time(at(2014, 3, 5, 17, 8)),
            at(2014, 3, 10, 0, 0)
        );
        // From a Monday, the following Monday.
        assert_eq!(
            Frequency::Weekly.next_time(at(2014, 3, 10, 0, 0)),
            at(2014, 3, 17, 0, 0)
        );
    }

    #[test]
    fn monthly_is_first_of_next_month() {
        assert_eq!(
            Frequency::Monthly.next_time(at(2014, 12, 31, 23, 59)),
            at(2015, 1, 1, 0, 0)
        );
        assert_eq!(
            Frequency::Monthly.next_time(at(2014, 1, 31, 0, 0)),
            at(2014, 2, 1, 0, 0)
        );
    }
}
