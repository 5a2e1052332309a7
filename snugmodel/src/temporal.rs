//! Temporal fields: absolute instants, calendar dates and times of day.
//!
//! All three share one canonical form: a naive UTC instant, stored in backend cells as
//! signed microseconds since 1970-01-01T00:00:00 UTC. Dates are normalized to midnight and
//! times of day to 1970-01-01 before encoding.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, SubsecRound, TimeDelta, Utc};

use crate::{
    entity::Entity,
    errors::{ModelError, ModelResult},
    field::{FieldDef, FieldType},
    pipeline::{Layer, Stage, expected},
    value::Value,
};

/// Auto-timestamp options of a temporal field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemporalOptions {
    /// Stamp the current time on every finalization.
    pub auto_now: bool,
    /// Stamp the current time on finalization only when no value is set.
    pub auto_now_add: bool,
}

impl TemporalOptions {
    pub fn is_set(self) -> bool {
        self.auto_now || self.auto_now_add
    }
}

pub fn epoch() -> NaiveDateTime {
    NaiveDate::default().and_time(NaiveTime::MIN)
}

pub fn date_to_datetime(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

pub fn time_to_datetime(time: NaiveTime) -> NaiveDateTime {
    NaiveDate::default().and_time(time)
}

/// Microseconds between the epoch and `instant`. `None` on overflow.
pub fn datetime_to_micros(instant: NaiveDateTime) -> Option<i64> {
    (instant - epoch()).num_microseconds()
}

pub fn micros_to_datetime(micros: i64) -> Option<NaiveDateTime> {
    epoch().checked_add_signed(TimeDelta::microseconds(micros))
}

/// The naive UTC instant behind a datetime value. Rejects a non-UTC offset.
fn utc_instant(field: &FieldDef, value: &Value) -> ModelResult<NaiveDateTime> {
    match value {
        Value::DateTime(instant) => Ok(*instant),
        Value::ZonedDateTime(zoned) if zoned.offset().local_minus_utc() == 0 => Ok(zoned.naive_utc()),
        Value::ZonedDateTime(_) => Err(ModelError::bad_value(
            field.label(),
            "only UTC instants can be stored; convert the value to UTC first",
        )),
        other => Err(expected(field, "datetime", other)),
    }
}

/// Encode a base value for a backend cell.
pub(crate) fn encode_micros(field: &FieldDef, value: &Value) -> ModelResult<i64> {
    let instant = utc_instant(field, value)?;
    datetime_to_micros(instant)
        .ok_or_else(|| ModelError::bad_value(field.label(), format!("{instant} is out of the storable range")))
}

pub(crate) fn decode_micros(field: &FieldDef, micros: i64) -> ModelResult<NaiveDateTime> {
    micros_to_datetime(micros)
        .ok_or_else(|| ModelError::bad_value(field.label(), format!("{micros} microseconds is out of range")))
}

/// Current UTC time at storage precision, narrowed to the field's variant.
pub fn now(field_type: FieldType) -> Value {
    let now = Utc::now().naive_utc().trunc_subsecs(6);
    match field_type {
        FieldType::Date => Value::Date(now.date()),
        FieldType::Time => Value::Time(now.time()),
        _ => Value::DateTime(now),
    }
}

pub(crate) fn prepare_for_put(field: &FieldDef, entity: &mut Entity) {
    let options = field.temporal();
    let unset = entity.stored(field.name()).is_none_or(Value::is_null);
    if options.auto_now || (options.auto_now_add && unset) {
        field.store_value(entity, now(field.field_type()));
    }
}

pub struct DateTimeLayer;

impl Layer for DateTimeLayer {
    fn name(&self) -> &'static str {
        "datetime"
    }

    fn stages(&self) -> &'static [Stage] {
        &[Stage::Validate, Stage::ToBase]
    }

    fn validate(&self, field: &FieldDef, value: Value) -> ModelResult<Value> {
        match value {
            Value::DateTime(_) | Value::ZonedDateTime(_) => Ok(value),
            other => Err(expected(field, "datetime", &other)),
        }
    }

    /// Base instants are naive UTC.
    fn to_base(&self, field: &FieldDef, value: Value) -> ModelResult<Value> {
        utc_instant(field, &value).map(Value::DateTime)
    }
}

pub struct DateLayer;

impl Layer for DateLayer {
    fn name(&self) -> &'static str {
        "date"
    }

    fn stages(&self) -> &'static [Stage] {
        &[Stage::Validate, Stage::ToBase, Stage::FromBase]
    }

    fn validate(&self, field: &FieldDef, value: Value) -> ModelResult<Value> {
        match value {
            Value::Date(_) => Ok(value),
            other => Err(expected(field, "date", &other)),
        }
    }

    fn to_base(&self, _field: &FieldDef, value: Value) -> ModelResult<Value> {
        match value {
            Value::Date(date) => Ok(Value::DateTime(date_to_datetime(date))),
            other => Ok(other),
        }
    }

    fn from_base(&self, _field: &FieldDef, value: Value) -> ModelResult<Value> {
        match value {
            Value::DateTime(instant) => Ok(Value::Date(instant.date())),
            other => Ok(other),
        }
    }
}

pub struct TimeLayer;

impl Layer for TimeLayer {
    fn name(&self) -> &'static str {
        "time"
    }

    fn stages(&self) -> &'static [Stage] {
        &[Stage::Validate, Stage::ToBase, Stage::FromBase]
    }

    fn validate(&self, field: &FieldDef, value: Value) -> ModelResult<Value> {
        match value {
            Value::Time(_) => Ok(value),
            other => Err(expected(field, "time", &other)),
        }
    }

    fn to_base(&self, _field: &FieldDef, value: Value) -> ModelResult<Value> {
        match value {
            Value::Time(time) => Ok(Value::DateTime(time_to_datetime(time))),
            other => Ok(other),
        }
    }

    fn from_base(&self, _field: &FieldDef, value: Value) -> ModelResult<Value> {
        match value {
            Value::DateTime(instant) => Ok(Value::Time(instant.time())),
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn epoch_is_unix_zero() {
        assert_eq!(epoch(), instant(1970, 1, 1, 0, 0, 0));
        assert_eq!(datetime_to_micros(epoch()), Some(0));
    }

    #[test]
    fn encodes_new_year_2020() {
        let value = instant(2020, 1, 1, 0, 0, 0);
        assert_eq!(datetime_to_micros(value), Some(1_577_836_800_000_000));
        assert_eq!(micros_to_datetime(1_577_836_800_000_000), Some(value));
    }

    #[test]
    fn handles_instants_before_epoch_and_fractions() {
        let value = NaiveDate::from_ymd_opt(1969, 12, 31)
            .unwrap()
            .and_hms_micro_opt(23, 59, 59, 999_999)
            .unwrap();
        assert_eq!(datetime_to_micros(value), Some(-1));
        assert_eq!(micros_to_datetime(-1), Some(value));
    }

    #[test]
    fn normalizes_dates_and_times() {
        let date = NaiveDate::from_ymd_opt(2021, 6, 15).unwrap();
        assert_eq!(date_to_datetime(date), instant(2021, 6, 15, 0, 0, 0));
        let time = NaiveTime::from_hms_opt(13, 45, 10).unwrap();
        assert_eq!(time_to_datetime(time), instant(1970, 1, 1, 13, 45, 10));
    }

    #[test]
    fn now_is_narrowed_to_variant() {
        assert!(matches!(now(FieldType::Date), Value::Date(_)));
        assert!(matches!(now(FieldType::Time), Value::Time(_)));
        assert!(matches!(now(FieldType::DateTime), Value::DateTime(_)));
    }
}
