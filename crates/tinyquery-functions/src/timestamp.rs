//! Timestamp construction, extraction, and arithmetic functions. BigQuery's
//! legacy TIMESTAMP is microseconds-since-epoch UTC; we use `chrono` instead
//! of the original's `arrow` but keep the same microsecond-truncated
//! semantics throughout.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use tinyquery_plan::Column;
use tinyquery_types::{Mode, PrimitiveType, ScalarValue, Value};

use crate::core::{ensure_literal, ScalarImpl};
use crate::error::{RuntimeError, TypeError};

fn to_timestamp(v: &ScalarValue) -> Option<DateTime<Utc>> {
    match v {
        ScalarValue::Timestamp(ts) => Some(*ts),
        ScalarValue::Int(usec) => Utc.timestamp_micros(*usec).single(),
        ScalarValue::String(s) => parse_utc_usec_str(s),
        _ => None,
    }
}

fn parse_utc_usec_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
        if let Ok(date) = chrono::NaiveDate::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()));
        }
    }
    None
}

fn check_one_datetime_arg(arg_types: &[PrimitiveType]) -> Result<(), TypeError> {
    let [t] = arg_types else {
        return Err(TypeError::mismatch("expected one argument", arg_types.to_vec()));
    };
    if !t.is_datetime_set() {
        return Err(TypeError::mismatch("expected a date/time-compatible argument", arg_types.to_vec()));
    }
    Ok(())
}

fn map_timestamp_column(
    args: &[Column],
    name: &str,
    result_type: PrimitiveType,
    f: impl Fn(DateTime<Utc>) -> ScalarValue,
) -> Result<Column, RuntimeError> {
    let [col] = args else {
        return Err(RuntimeError::msg(format!("{name} expects one argument")));
    };
    let values = col
        .values
        .iter()
        .map(|v| v.as_scalar().and_then(to_timestamp).map(&f))
        .map(Value::Scalar)
        .collect();
    Ok(Column {
        r#type: result_type,
        mode: Mode::Nullable,
        values,
    })
}

pub struct TimestampFunction;

impl ScalarImpl for TimestampFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        check_one_datetime_arg(arg_types)?;
        Ok(PrimitiveType::Timestamp)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        map_timestamp_column(args, "timestamp", PrimitiveType::Timestamp, ScalarValue::Timestamp)
    }
}

/// No-argument functions (`now`, `current_timestamp`, `current_date`,
/// `current_time`) each need a fixed "now" for a deterministic test double;
/// callers inject it rather than reaching for the system clock.
pub enum NoArgKind {
    Timestamp,
    Date,
    Time,
}

pub struct NoArgFunction {
    pub kind: NoArgKind,
    pub now: DateTime<Utc>,
}

impl ScalarImpl for NoArgFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        if !arg_types.is_empty() {
            return Err(TypeError::mismatch("expected no arguments", arg_types.to_vec()));
        }
        Ok(match self.kind {
            NoArgKind::Timestamp => PrimitiveType::Timestamp,
            NoArgKind::Date | NoArgKind::Time => PrimitiveType::String,
        })
    }

    fn evaluate_flat(&self, num_rows: usize, _args: &[Column]) -> Result<Column, RuntimeError> {
        let value = match self.kind {
            NoArgKind::Timestamp => ScalarValue::Timestamp(self.now),
            NoArgKind::Date => ScalarValue::String(self.now.format("%Y-%m-%d").to_string()),
            NoArgKind::Time => ScalarValue::String(self.now.format("%H:%M:%S").to_string()),
        };
        let result_type = match self.kind {
            NoArgKind::Timestamp => PrimitiveType::Timestamp,
            NoArgKind::Date | NoArgKind::Time => PrimitiveType::String,
        };
        Ok(Column {
            r#type: result_type,
            mode: Mode::Nullable,
            values: vec![Value::Scalar(Some(value)); num_rows],
        })
    }
}

/// The `date`/`day`/`dayofweek`/.../`year` extraction family. Each instance
/// projects a timestamp-like argument onto one calendar field.
pub enum Extract {
    Date,
    Day,
    /// 1 = Sunday, matching the BigQuery legacy-SQL convention (distinct from
    /// the 0 = Sunday convention `utc_usec_to_week`-family functions use).
    DayOfWeek,
    DayOfYear,
    Hour,
    Minute,
    Month,
    Quarter,
    Second,
    Time,
    Year,
}

pub struct TimestampExtractFunction(pub Extract);

impl ScalarImpl for TimestampExtractFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        check_one_datetime_arg(arg_types)?;
        Ok(match self.0 {
            Extract::Date | Extract::Time => PrimitiveType::String,
            _ => PrimitiveType::Int,
        })
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let result_type = match self.0 {
            Extract::Date | Extract::Time => PrimitiveType::String,
            _ => PrimitiveType::Int,
        };
        map_timestamp_column(args, "extract", result_type, |ts| match self.0 {
            Extract::Date => ScalarValue::String(ts.format("%Y-%m-%d").to_string()),
            Extract::Time => ScalarValue::String(ts.format("%H:%M:%S").to_string()),
            Extract::Day => ScalarValue::Int(i64::from(ts.day())),
            Extract::DayOfWeek => {
                ScalarValue::Int(i64::from(ts.weekday().num_days_from_sunday()) + 1)
            }
            Extract::DayOfYear => ScalarValue::Int(i64::from(ts.ordinal())),
            Extract::Hour => ScalarValue::Int(i64::from(ts.hour())),
            Extract::Minute => ScalarValue::Int(i64::from(ts.minute())),
            Extract::Month => ScalarValue::Int(i64::from(ts.month())),
            Extract::Quarter => ScalarValue::Int(i64::from((ts.month() - 1) / 3 + 1)),
            Extract::Second => ScalarValue::Int(i64::from(ts.second())),
            Extract::Year => ScalarValue::Int(i64::from(ts.year())),
        })
    }
}

/// `utc_usec_to_day/hour/month/year/week` truncate to the start of their
/// unit, returning another TIMESTAMP (not an extracted field).
pub enum ShiftUnit {
    Day,
    Hour,
    Month,
    Year,
    /// Truncates to the most recent Sunday; 0 = Sunday internally, a
    /// different convention than the `dayofweek` extraction function above.
    Week,
}

pub struct TimestampShiftFunction(pub ShiftUnit);

impl ScalarImpl for TimestampShiftFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        check_one_datetime_arg(arg_types)?;
        Ok(PrimitiveType::Timestamp)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        map_timestamp_column(args, "utc_usec_to", PrimitiveType::Timestamp, |ts| {
            let truncated = match self.0 {
                ShiftUnit::Day => ts.date_naive().and_hms_opt(0, 0, 0).unwrap(),
                ShiftUnit::Hour => ts.date_naive().and_hms_opt(ts.hour(), 0, 0).unwrap(),
                ShiftUnit::Month => chrono::NaiveDate::from_ymd_opt(ts.year(), ts.month(), 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                ShiftUnit::Year => chrono::NaiveDate::from_ymd_opt(ts.year(), 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                ShiftUnit::Week => {
                    let days_from_sunday = ts.weekday().num_days_from_sunday();
                    (ts.date_naive() - Duration::days(i64::from(days_from_sunday)))
                        .and_hms_opt(0, 0, 0)
                        .unwrap()
                }
            };
            ScalarValue::Timestamp(Utc.from_utc_datetime(&truncated))
        })
    }
}

pub struct WeekdayFunction;

impl ScalarImpl for WeekdayFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        check_one_datetime_arg(arg_types)?;
        Ok(PrimitiveType::Int)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        map_timestamp_column(args, "week", PrimitiveType::Int, |ts| {
            ScalarValue::Int(i64::from(ts.weekday().num_days_from_sunday()))
        })
    }
}

pub struct StrftimeFunction;

impl ScalarImpl for StrftimeFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t1, t2] = arg_types else {
            return Err(TypeError::mismatch("expected two arguments", arg_types.to_vec()));
        };
        if !t1.is_datetime_set() {
            return Err(TypeError::mismatch("expected a date/time-compatible first argument", arg_types.to_vec()));
        }
        if *t2 != PrimitiveType::String {
            return Err(TypeError::mismatch("expected a string format", arg_types.to_vec()));
        }
        Ok(PrimitiveType::String)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [timestamps, formats] = args else {
            return Err(RuntimeError::msg("strftime_utc_usec expects two arguments"));
        };
        let literal = ensure_literal(&formats.values, "strftime_utc_usec")?;
        let Some(ScalarValue::String(format)) = literal else {
            return Ok(Column {
                r#type: PrimitiveType::String,
                mode: Mode::Nullable,
                values: vec![Value::null(); timestamps.values.len()],
            });
        };
        let values = timestamps
            .values
            .iter()
            .map(|v| v.as_scalar().and_then(to_timestamp))
            .map(|ts| ts.map(|ts| ScalarValue::String(ts.format(&format).to_string())))
            .map(Value::Scalar)
            .collect();
        Ok(Column {
            r#type: PrimitiveType::String,
            mode: Mode::Nullable,
            values,
        })
    }
}

/// `timestamp_to_{msec,sec,usec}` and the `{msec,sec,usec}_to_timestamp`
/// inverses, expressed as one parameterized pair of functions each way.
pub enum TimeUnit {
    Millis,
    Seconds,
    Micros,
}

impl TimeUnit {
    fn per_second(&self) -> i64 {
        match self {
            TimeUnit::Millis => 1_000,
            TimeUnit::Seconds => 1,
            TimeUnit::Micros => 1_000_000,
        }
    }
}

pub struct TimestampToUnitFunction(pub TimeUnit);

impl ScalarImpl for TimestampToUnitFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        check_one_datetime_arg(arg_types)?;
        Ok(PrimitiveType::Int)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        map_timestamp_column(args, "timestamp_to_usec", PrimitiveType::Int, |ts| {
            let usec = ts.timestamp_micros();
            ScalarValue::Int(usec / (1_000_000 / self.0.per_second()))
        })
    }
}

pub struct UnitToTimestampFunction(pub TimeUnit);

impl ScalarImpl for UnitToTimestampFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t] = arg_types else {
            return Err(TypeError::mismatch("expected one argument", arg_types.to_vec()));
        };
        if !t.is_numeric_set() {
            return Err(TypeError::mismatch("expected a numeric argument", arg_types.to_vec()));
        }
        Ok(PrimitiveType::Timestamp)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col] = args else {
            return Err(RuntimeError::msg("expects one argument"));
        };
        let per_second = self.0.per_second();
        let values = col
            .values
            .iter()
            .map(|v| match v.as_scalar() {
                Some(ScalarValue::Int(n)) => Utc.timestamp_micros(n * (1_000_000 / per_second)).single(),
                Some(ScalarValue::Float(f)) => Utc.timestamp_micros((f * (1_000_000.0 / per_second as f64)) as i64).single(),
                _ => None,
            })
            .map(|ts| ts.map(ScalarValue::Timestamp))
            .map(Value::Scalar)
            .collect();
        Ok(Column {
            r#type: PrimitiveType::Timestamp,
            mode: Mode::Nullable,
            values,
        })
    }
}

pub struct ParseUtcUsecFunction;

impl ScalarImpl for ParseUtcUsecFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t] = arg_types else {
            return Err(TypeError::mismatch("expected one argument", arg_types.to_vec()));
        };
        if *t != PrimitiveType::String {
            return Err(TypeError::mismatch("expected a string argument", arg_types.to_vec()));
        }
        Ok(PrimitiveType::Int)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col] = args else {
            return Err(RuntimeError::msg("expects one argument"));
        };
        let values = col
            .values
            .iter()
            .map(|v| match v.as_scalar() {
                Some(ScalarValue::String(s)) => parse_utc_usec_str(s).map(|ts| ts.timestamp_micros()),
                _ => None,
            })
            .map(|v| v.map(ScalarValue::Int))
            .map(Value::Scalar)
            .collect();
        Ok(Column {
            r#type: PrimitiveType::Int,
            mode: Mode::Nullable,
            values,
        })
    }
}

pub struct FormatUtcUsecFunction;

impl ScalarImpl for FormatUtcUsecFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t] = arg_types else {
            return Err(TypeError::mismatch("expected one argument", arg_types.to_vec()));
        };
        if !t.is_numeric_set() {
            return Err(TypeError::mismatch("expected a numeric argument", arg_types.to_vec()));
        }
        Ok(PrimitiveType::String)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col] = args else {
            return Err(RuntimeError::msg("expects one argument"));
        };
        let values = col
            .values
            .iter()
            .map(|v| match v.as_scalar() {
                Some(ScalarValue::Int(usec)) => Utc.timestamp_micros(*usec).single(),
                _ => None,
            })
            .map(|ts| ts.map(|ts| ScalarValue::String(ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string())))
            .map(Value::Scalar)
            .collect();
        Ok(Column {
            r#type: PrimitiveType::String,
            mode: Mode::Nullable,
            values,
        })
    }
}

pub enum DateAddUnit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

fn parse_date_add_unit(s: &str) -> Option<DateAddUnit> {
    match s.to_ascii_uppercase().as_str() {
        "YEAR" => Some(DateAddUnit::Year),
        "MONTH" => Some(DateAddUnit::Month),
        "DAY" => Some(DateAddUnit::Day),
        "HOUR" => Some(DateAddUnit::Hour),
        "MINUTE" => Some(DateAddUnit::Minute),
        "SECOND" => Some(DateAddUnit::Second),
        _ => None,
    }
}

fn shift_by(ts: DateTime<Utc>, unit: &DateAddUnit, count: i64) -> Option<DateTime<Utc>> {
    match unit {
        DateAddUnit::Year => {
            let target_year = ts.year() + count as i32;
            ts.with_year(target_year)
        }
        DateAddUnit::Month => {
            let total_months = i64::from(ts.month0()) + count;
            let year_shift = total_months.div_euclid(12) as i32;
            let month0 = total_months.rem_euclid(12) as u32;
            ts.with_year(ts.year() + year_shift).and_then(|t| t.with_month0(month0))
        }
        DateAddUnit::Day => Some(ts + Duration::days(count)),
        DateAddUnit::Hour => Some(ts + Duration::hours(count)),
        DateAddUnit::Minute => Some(ts + Duration::minutes(count)),
        DateAddUnit::Second => Some(ts + Duration::seconds(count)),
    }
}

pub struct DateAddFunction;

impl ScalarImpl for DateAddFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [base, count, unit] = arg_types else {
            return Err(TypeError::mismatch("expected three arguments", arg_types.to_vec()));
        };
        if !base.is_datetime_set() {
            return Err(TypeError::mismatch("expected a date/time-compatible first argument", arg_types.to_vec()));
        }
        if *count != PrimitiveType::Int {
            return Err(TypeError::mismatch("expected an int count", arg_types.to_vec()));
        }
        if *unit != PrimitiveType::String {
            return Err(TypeError::mismatch("expected a string unit", arg_types.to_vec()));
        }
        Ok(PrimitiveType::Timestamp)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [base, counts, units] = args else {
            return Err(RuntimeError::msg("date_add expects three arguments"));
        };
        let unit_literal = ensure_literal(&units.values, "date_add")?;
        let Some(ScalarValue::String(unit_str)) = unit_literal else {
            return Ok(Column {
                r#type: PrimitiveType::Timestamp,
                mode: Mode::Nullable,
                values: vec![Value::null(); base.values.len()],
            });
        };
        let unit = parse_date_add_unit(&unit_str)
            .ok_or_else(|| RuntimeError::msg(format!("unknown date_add unit: {unit_str}")))?;
        let values = base
            .values
            .iter()
            .zip(&counts.values)
            .map(|(b, c)| match (b.as_scalar().and_then(to_timestamp), c.as_scalar()) {
                (Some(ts), Some(ScalarValue::Int(count))) => shift_by(ts, &unit, *count),
                _ => None,
            })
            .map(|ts| ts.map(ScalarValue::Timestamp))
            .map(Value::Scalar)
            .collect();
        Ok(Column {
            r#type: PrimitiveType::Timestamp,
            mode: Mode::Nullable,
            values,
        })
    }
}

pub struct DateDiffFunction;

impl ScalarImpl for DateDiffFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t1, t2] = arg_types else {
            return Err(TypeError::mismatch("expected two arguments", arg_types.to_vec()));
        };
        if !t1.is_datetime_set() || !t2.is_datetime_set() {
            return Err(TypeError::mismatch("expected date/time-compatible arguments", arg_types.to_vec()));
        }
        Ok(PrimitiveType::Int)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col1, col2] = args else {
            return Err(RuntimeError::msg("datediff expects two arguments"));
        };
        let values = col1
            .values
            .iter()
            .zip(&col2.values)
            .map(|(a, b)| match (a.as_scalar().and_then(to_timestamp), b.as_scalar().and_then(to_timestamp)) {
                (Some(a), Some(b)) => Some((a - b).num_days()),
                _ => None,
            })
            .map(|v| v.map(ScalarValue::Int))
            .map(Value::Scalar)
            .collect();
        Ok(Column {
            r#type: PrimitiveType::Int,
            mode: Mode::Nullable,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_dayofweek_with_sunday_as_one() {
        let sunday = Utc.with_ymd_and_hms(2024, 1, 7, 0, 0, 0).unwrap();
        let col = Column {
            r#type: PrimitiveType::Timestamp,
            mode: Mode::Nullable,
            values: vec![Value::Scalar(Some(ScalarValue::Timestamp(sunday)))],
        };
        let result = TimestampExtractFunction(Extract::DayOfWeek)
            .evaluate_flat(1, std::slice::from_ref(&col))
            .unwrap();
        assert_eq!(result.values[0], Value::Scalar(Some(ScalarValue::Int(1))));
    }

    #[test]
    fn date_add_shifts_months_across_year_boundary() {
        let base = Utc.with_ymd_and_hms(2023, 12, 15, 0, 0, 0).unwrap();
        let base_col = Column {
            r#type: PrimitiveType::Timestamp,
            mode: Mode::Nullable,
            values: vec![Value::Scalar(Some(ScalarValue::Timestamp(base)))],
        };
        let count_col = Column {
            r#type: PrimitiveType::Int,
            mode: Mode::Nullable,
            values: vec![Value::Scalar(Some(ScalarValue::Int(2)))],
        };
        let unit_col = Column {
            r#type: PrimitiveType::String,
            mode: Mode::Nullable,
            values: vec![Value::Scalar(Some(ScalarValue::String("MONTH".to_string())))],
        };
        let result = DateAddFunction
            .evaluate_flat(1, &[base_col, count_col, unit_col])
            .unwrap();
        match &result.values[0] {
            Value::Scalar(Some(ScalarValue::Timestamp(ts))) => {
                assert_eq!((ts.year(), ts.month()), (2024, 2));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
