//! Whole-unit SQL intervals for window sizes and watermark delays.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{SqlError, SqlResult};

/// Unit of a [`SqlInterval`], largest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntervalUnit {
  /// Days
  Day,
  /// Hours
  Hour,
  /// Minutes
  Minute,
  /// Seconds
  Second,
  /// Milliseconds; only for sub-second durations
  Millisecond,
}

impl IntervalUnit {
  const fn millis(self) -> u128 {
    match self {
      IntervalUnit::Day => 86_400_000,
      IntervalUnit::Hour => 3_600_000,
      IntervalUnit::Minute => 60_000,
      IntervalUnit::Second => 1_000,
      IntervalUnit::Millisecond => 1,
    }
  }

  /// SQL keyword for the unit.
  pub fn keyword(self) -> &'static str {
    match self {
      IntervalUnit::Day => "DAY",
      IntervalUnit::Hour => "HOUR",
      IntervalUnit::Minute => "MINUTE",
      IntervalUnit::Second => "SECOND",
      IntervalUnit::Millisecond => "MILLISECOND",
    }
  }
}

/// Interval literal `INTERVAL 'value' UNIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlInterval {
  /// Whole number of units
  pub value: u64,
  /// Unit
  pub unit: IntervalUnit,
}

impl SqlInterval {
  /// Reduces a duration to a single whole unit.
  ///
  /// The largest of day, hour, minute, second that divides the duration
  /// evenly is used. Milliseconds are only accepted for durations shorter
  /// than one second, so `1500ms` is rejected rather than rendered as a
  /// mixed or fractional interval.
  pub fn from_duration(duration: Duration) -> SqlResult<Self> {
    if duration.subsec_nanos() % 1_000_000 != 0 {
      return Err(SqlError::interval(format!(
        "{:?} has sub-millisecond precision",
        duration
      )));
    }
    let millis = duration.as_millis();
    if millis == 0 {
      return Err(SqlError::interval(format!(
        "{:?} is not a positive interval",
        duration
      )));
    }

    let units = [
      IntervalUnit::Day,
      IntervalUnit::Hour,
      IntervalUnit::Minute,
      IntervalUnit::Second,
    ];
    let unit = units
      .into_iter()
      .find(|unit| millis % unit.millis() == 0)
      .or_else(|| (millis < 1_000).then_some(IntervalUnit::Millisecond))
      .ok_or_else(|| {
        SqlError::interval(format!(
          "{:?} is not a whole number of days, hours, minutes or seconds",
          duration
        ))
      })?;

    let value = u64::try_from(millis / unit.millis())
      .map_err(|_| SqlError::interval(format!("{:?} is too large", duration)))?;
    Ok(Self { value, unit })
  }
}

impl fmt::Display for SqlInterval {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "INTERVAL '{}' {}", self.value, self.unit.keyword())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;

  fn render(duration: Duration) -> SqlResult<String> {
    SqlInterval::from_duration(duration).map(|i| i.to_string())
  }

  #[test]
  fn test_whole_units_pick_the_largest() {
    assert_eq!(render(Duration::from_millis(5000)).unwrap(), "INTERVAL '5' SECOND");
    assert_eq!(render(Duration::from_secs(120)).unwrap(), "INTERVAL '2' MINUTE");
    assert_eq!(render(Duration::from_secs(90)).unwrap(), "INTERVAL '90' SECOND");
    assert_eq!(render(Duration::from_secs(7200)).unwrap(), "INTERVAL '2' HOUR");
    assert_eq!(render(Duration::from_secs(172_800)).unwrap(), "INTERVAL '2' DAY");
    assert_eq!(render(Duration::from_millis(250)).unwrap(), "INTERVAL '250' MILLISECOND");
  }

  #[test]
  fn test_mixed_and_fractional_intervals_are_rejected() {
    let err = render(Duration::from_millis(1500)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedInterval);
    assert!(render(Duration::from_micros(1500)).is_err());
  }

  #[test]
  fn test_zero_is_rejected() {
    let err = render(Duration::ZERO).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedInterval);
    assert!(err.to_string().contains("not a positive interval"));
  }
}
