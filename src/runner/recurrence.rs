use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecurrenceError {
    #[error("cron expression `{0}` must have 5 to 7 fields")]
    FieldCount(String),
    #[error("invalid cron expression `{expression}`: {source}")]
    Expression {
        expression: String,
        source: cron::error::Error,
    },
    #[error("unknown timezone `{0}`")]
    Timezone(String),
}

/// A cron rule evaluated in a named civil timezone.
///
/// Fire instants are computed in local time, so a rule like `15 */3 * * *`
/// keeps firing at minute 15 of every third local hour across DST changes.
#[derive(Debug, Clone)]
pub struct Recurrence {
    schedule: cron::Schedule,
    timezone: Tz,
    expression: String,
}

impl Recurrence {
    /// Parse an expression and timezone name into a recurrence rule.
    ///
    /// Classic five-field expressions are accepted by prepending a zero
    /// seconds field; six- and seven-field expressions pass through to the
    /// `cron` crate unchanged.
    pub fn parse(expression: &str, timezone: &str) -> Result<Self, RecurrenceError> {
        let timezone: Tz = timezone
            .parse()
            .map_err(|_| RecurrenceError::Timezone(timezone.to_string()))?;

        let normalized = normalize_expression(expression)?;
        let schedule =
            cron::Schedule::from_str(&normalized).map_err(|source| RecurrenceError::Expression {
                expression: expression.to_string(),
                source,
            })?;

        Ok(Self {
            schedule,
            timezone,
            expression: expression.to_string(),
        })
    }

    /// The expression as configured, before normalization.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// The next fire instant strictly after `instant`.
    ///
    /// Returns `None` only for rules that never fire again.
    #[must_use]
    pub fn next_after(&self, instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = instant.with_timezone(&self.timezone);
        self.schedule
            .after(&local)
            .next()
            .map(|fire| fire.with_timezone(&Utc))
    }

    /// The next fire instant from now.
    #[must_use]
    pub fn upcoming(&self) -> Option<DateTime<Utc>> {
        self.next_after(Utc::now())
    }

    /// All fire instants in `(start, end]`, in local time.
    pub fn fires_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Tz>> {
        let local_start = start.with_timezone(&self.timezone);
        self.schedule
            .after(&local_start)
            .take_while(|fire| *fire <= end)
            .collect()
    }
}

fn normalize_expression(expression: &str) -> Result<String, RecurrenceError> {
    match expression.split_whitespace().count() {
        5 => Ok(format!("0 {expression}")),
        6 | 7 => Ok(expression.to_string()),
        _ => Err(RecurrenceError::FieldCount(expression.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use chrono_tz::Europe::Paris;

    fn paris_recurrence() -> Recurrence {
        Recurrence::parse("15 */3 * * *", "Europe/Paris").unwrap()
    }

    #[test]
    fn fires_eight_times_per_day_at_quarter_past_every_third_hour() {
        let recurrence = paris_recurrence();
        let start = Paris.with_ymd_and_hms(2026, 8, 5, 0, 0, 0).unwrap();
        let end = Paris.with_ymd_and_hms(2026, 8, 6, 0, 0, 0).unwrap();

        let fires = recurrence.fires_between(start.with_timezone(&Utc), end.with_timezone(&Utc));

        assert_eq!(fires.len(), 8);
        for (i, fire) in fires.iter().enumerate() {
            assert_eq!(fire.hour(), (i as u32) * 3);
            assert_eq!(fire.minute(), 15);
            assert_eq!(fire.second(), 0);
        }
    }

    #[test]
    fn still_fires_eight_times_on_the_dst_spring_forward_day() {
        // Paris skips 02:00-02:59 on 2026-03-29; no fire hour falls in the gap.
        let recurrence = paris_recurrence();
        let start = Paris.with_ymd_and_hms(2026, 3, 29, 0, 0, 0).unwrap();
        let end = Paris.with_ymd_and_hms(2026, 3, 30, 0, 0, 0).unwrap();

        let fires = recurrence.fires_between(start.with_timezone(&Utc), end.with_timezone(&Utc));

        assert_eq!(fires.len(), 8);
    }

    #[test]
    fn five_field_form_matches_explicit_seconds_form() {
        let five = Recurrence::parse("15 */3 * * *", "Europe/Paris").unwrap();
        let six = Recurrence::parse("0 15 */3 * * *", "Europe/Paris").unwrap();

        let instant = Utc.with_ymd_and_hms(2026, 8, 5, 10, 0, 0).unwrap();
        assert_eq!(five.next_after(instant), six.next_after(instant));
    }

    #[test]
    fn next_fire_is_computed_in_local_time() {
        let recurrence = paris_recurrence();
        // 10:00 UTC on 2026-08-05 is 12:00 in Paris (CEST, UTC+2); the next
        // local fire is 12:15, i.e. 10:15 UTC.
        let instant = Utc.with_ymd_and_hms(2026, 8, 5, 10, 0, 0).unwrap();
        let next = recurrence.next_after(instant).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 5, 10, 15, 0).unwrap());
    }

    #[test]
    fn rejects_four_field_expressions() {
        let err = Recurrence::parse("15 */3 * *", "Europe/Paris").unwrap_err();
        assert!(matches!(err, RecurrenceError::FieldCount(_)));
    }

    #[test]
    fn rejects_unknown_timezone() {
        let err = Recurrence::parse("15 */3 * * *", "Mars/Olympus_Mons").unwrap_err();
        assert!(matches!(err, RecurrenceError::Timezone(_)));
    }

    #[test]
    fn rejects_malformed_expression() {
        let err = Recurrence::parse("15 61 * * *", "Europe/Paris").unwrap_err();
        assert!(matches!(err, RecurrenceError::Expression { .. }));
    }
}
