//! Trading-day classification
//!
//! The engine never computes session calendars itself; it asks a classifier
//! which trading day a bar belongs to and treats any change as a rollover.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;
use chrono_tz::Tz;

/// Globex session rollover: 6:00 PM ET opens the next trading day
const CME_ROLLOVER_HOUR: u32 = 18;

pub trait TradingDayClassifier {
    fn trading_day(&self, timestamp: DateTime<Utc>) -> NaiveDate;
}

impl<F> TradingDayClassifier for F
where
    F: Fn(DateTime<Utc>) -> NaiveDate,
{
    fn trading_day(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        self(timestamp)
    }
}

/// Calendar date in UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct UtcDateClassifier;

impl TradingDayClassifier for UtcDateClassifier {
    fn trading_day(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        timestamp.date_naive()
    }
}

/// Local-time session calendar with an evening rollover
///
/// Bars at or after `rollover` (local time) belong to the next day. A
/// midnight rollover means plain local calendar dates. With `skip_weekends`
/// Saturday and Sunday roll forward to Monday, so Sunday evening trading
/// belongs to Monday's session.
#[derive(Debug, Clone, Copy)]
pub struct SessionRolloverClassifier {
    pub tz: Tz,
    pub rollover: NaiveTime,
    pub skip_weekends: bool,
}

impl SessionRolloverClassifier {
    pub fn new(tz: Tz, rollover: NaiveTime, skip_weekends: bool) -> Self {
        Self {
            tz,
            rollover,
            skip_weekends,
        }
    }

    /// CME Globex futures: 18:00 America/New_York, weekends skipped
    pub fn cme() -> Self {
        let rollover = NaiveTime::from_hms_opt(CME_ROLLOVER_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
        Self::new(New_York, rollover, true)
    }
}

impl Default for SessionRolloverClassifier {
    fn default() -> Self {
        Self::cme()
    }
}

impl TradingDayClassifier for SessionRolloverClassifier {
    fn trading_day(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        let local = timestamp.with_timezone(&self.tz);
        let mut date = local.date_naive();

        let midnight = self.rollover.num_seconds_from_midnight() == 0;
        if !midnight && local.time() >= self.rollover {
            date = date + Duration::days(1);
        }

        if self.skip_weekends {
            date = skip_weekends_forward(date);
        }
        date
    }
}

/// Skip weekends going forward
fn skip_weekends_forward(mut date: NaiveDate) -> NaiveDate {
    while date.weekday() == Weekday::Sat || date.weekday() == Weekday::Sun {
        date = date + Duration::days(1);
    }
    date
}
