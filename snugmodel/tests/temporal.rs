use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use proptest::prelude::*;
use snugmodel::{
    CellSource, CellValue, Entity, FieldDef, FilterNode, Meaning, Model, ModelError, Record, Value, temporal,
};

fn midnight_2020() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

fn event() -> std::sync::Arc<Model> {
    Model::builder("Event")
        .field("created", FieldDef::datetime().auto_now_add())
        .field("updated", FieldDef::datetime().auto_now())
        .field("day", FieldDef::date())
        .field("starts", FieldDef::time())
        .field("at", FieldDef::datetime())
        .build()
        .unwrap()
}

#[test]
fn new_year_2020_encodes_to_epoch_microseconds() {
    let field = FieldDef::datetime().build().unwrap();
    let (cell, meaning) = field.db_set_value(&Value::DateTime(midnight_2020())).unwrap();
    assert_eq!(cell, CellValue::Int(1_577_836_800_000_000));
    assert_eq!(meaning, Some(Meaning::Timestamp));
    assert_eq!(field.db_get_value(&cell).unwrap(), Value::DateTime(midnight_2020()));
}

#[test]
fn utc_offsets_are_accepted_and_others_rejected() {
    let field = FieldDef::datetime().build().unwrap();

    let utc = DateTime::parse_from_rfc3339("2020-01-01T00:00:00+00:00").unwrap();
    let (cell, _) = field.db_set_value(&Value::from(utc)).unwrap();
    assert_eq!(cell, CellValue::Int(1_577_836_800_000_000));

    let shifted = DateTime::parse_from_rfc3339("2020-01-01T02:00:00+02:00").unwrap();
    assert!(field.do_validate(Value::from(shifted)).is_ok());
    let err = field.db_set_value(&Value::from(shifted)).unwrap_err();
    assert!(matches!(err, ModelError::BadValue { .. }));
}

#[test]
fn utc_zoned_instants_convert_to_naive_base_values() {
    let field = FieldDef::datetime().name("at").build().unwrap();
    let utc = DateTime::parse_from_rfc3339("2020-01-01T00:00:00+00:00").unwrap();
    let base = field.to_base_value(Value::from(utc)).unwrap();
    assert_eq!(base, Value::DateTime(midnight_2020()));
    assert_eq!(field.to_base_value(base.clone()).unwrap(), base);

    let node = field.equals(utc).unwrap();
    assert_eq!(node, field.equals(midnight_2020()).unwrap());

    let shifted = DateTime::parse_from_rfc3339("2020-01-01T02:00:00+02:00").unwrap();
    let err = field.equals(shifted).unwrap_err();
    assert!(matches!(err, ModelError::BadValue { .. }));
}

#[test]
fn visit_filters_match_across_zoned_and_naive_instants() {
    let visit = Model::builder("Visit")
        .field("place", FieldDef::string())
        .field("at", FieldDef::datetime())
        .build()
        .unwrap();
    let diary = Model::builder("Diary")
        .field("visits", FieldDef::structured(&visit).repeated())
        .build()
        .unwrap();

    let utc = DateTime::parse_from_rfc3339("2020-01-01T00:00:00+00:00").unwrap();
    let mut stored = Entity::new(&visit);
    stored.set("place", "cafe").unwrap();
    stored.set("at", utc).unwrap();
    let mut entity = Entity::new(&diary);
    entity.set("visits", vec![stored]).unwrap();

    let mut wanted = Entity::new(&visit);
    wanted.set("place", "cafe").unwrap();
    wanted.set("at", midnight_2020()).unwrap();
    let node = diary.find_field("visits").unwrap().equals(wanted).unwrap();
    let FilterNode::And(conditions) = &node else {
        panic!("expected conjunction, got {node:?}");
    };
    let Some(FilterNode::PostFilter(predicate)) = conditions.last() else {
        panic!("expected trailing post-filter, got {node:?}");
    };
    assert!(predicate.apply(&entity).unwrap());
}

#[test]
fn dates_and_times_normalize_around_the_epoch() {
    let day = FieldDef::date().build().unwrap();
    let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let base = day.to_base_value(Value::Date(date)).unwrap();
    assert_eq!(base, Value::DateTime(midnight_2020()));
    assert_eq!(day.from_base_value(base).unwrap(), Value::Date(date));

    let clock = FieldDef::time().build().unwrap();
    let time = NaiveTime::from_hms_opt(0, 0, 1).unwrap();
    let (cell, _) = clock
        .db_set_value(&clock.to_base_value(Value::Time(time)).unwrap())
        .unwrap();
    assert_eq!(cell, CellValue::Int(1_000_000));
}

#[test]
fn variants_reject_each_other() {
    let day = FieldDef::date().build().unwrap();
    assert!(day.do_validate(Value::DateTime(midnight_2020())).is_err());
    let at = FieldDef::datetime().build().unwrap();
    assert!(at.do_validate(Value::from("2020-01-01")).is_err());
}

#[test]
fn auto_now_overwrites_on_every_finalization() {
    let model = event();
    let mut entity = Entity::new(&model);
    entity.set("updated", midnight_2020()).unwrap();

    let before = Utc::now().naive_utc() - TimeDelta::seconds(1);
    entity.prepare_for_put().unwrap();
    let Value::DateTime(first) = entity.get("updated").unwrap() else {
        panic!("updated should hold a datetime");
    };
    assert!(first >= before);

    entity.set("updated", midnight_2020()).unwrap();
    entity.prepare_for_put().unwrap();
    assert_ne!(entity.get("updated").unwrap(), Value::DateTime(midnight_2020()));
}

#[test]
fn auto_now_add_only_fills_missing_values() {
    let model = event();
    let mut entity = Entity::new(&model);
    entity.set("created", midnight_2020()).unwrap();
    entity.prepare_for_put().unwrap();
    assert_eq!(entity.get("created").unwrap(), Value::DateTime(midnight_2020()));

    let mut fresh = Entity::new(&model);
    let before = Utc::now().naive_utc() - TimeDelta::seconds(1);
    fresh.prepare_for_put().unwrap();
    let Value::DateTime(stamped) = fresh.get("created").unwrap() else {
        panic!("created should be stamped");
    };
    assert!(stamped >= before);
}

#[test]
fn auto_timestamps_are_temporal_only_and_never_repeated() {
    assert!(FieldDef::datetime().repeated().auto_now().build().is_err());
    assert!(FieldDef::date().repeated().auto_now_add().build().is_err());
    assert!(FieldDef::string().auto_now().build().is_err());
}

#[test]
fn temporal_entities_survive_persistence() {
    let model = event();
    let mut entity = Entity::new(&model);
    entity.set("day", NaiveDate::from_ymd_opt(1969, 7, 20).unwrap()).unwrap();
    entity.set("starts", NaiveTime::from_hms_micro_opt(20, 17, 40, 123_456).unwrap()).unwrap();

    let mut record = Record::new();
    entity.put_into(&mut record).unwrap();
    assert!(record.cells().iter().all(|cell| cell.meaning == Some(Meaning::Timestamp)));

    let loaded = Entity::load(&model, None, &record).unwrap();
    assert_eq!(loaded, entity);
    assert!(matches!(loaded.get("created").unwrap(), Value::DateTime(_)));
}

proptest! {
    #[test]
    fn instants_round_trip_through_cells(micros in -10_000_000_000_000_000i64..10_000_000_000_000_000) {
        let field = FieldDef::datetime().build().unwrap();
        let instant = temporal::micros_to_datetime(micros).unwrap();
        let (cell, _) = field.db_set_value(&Value::DateTime(instant)).unwrap();
        prop_assert_eq!(&cell, &CellValue::Int(micros));
        prop_assert_eq!(field.db_get_value(&cell).unwrap(), Value::DateTime(instant));
    }

    #[test]
    fn dates_round_trip(days in 1i32..3_000_000) {
        let field = FieldDef::date().build().unwrap();
        let date = NaiveDate::from_num_days_from_ce_opt(days).unwrap();
        let base = field.to_base_value(Value::Date(date)).unwrap();
        let (cell, _) = field.db_set_value(&base).unwrap();
        let restored = field.from_base_value(field.db_get_value(&cell).unwrap()).unwrap();
        prop_assert_eq!(restored, Value::Date(date));
    }

    #[test]
    fn times_round_trip(seconds in 0u32..86_400, micros in 0u32..1_000_000) {
        let field = FieldDef::time().build().unwrap();
        let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, micros * 1_000).unwrap();
        let base = field.to_base_value(Value::Time(time)).unwrap();
        let (cell, _) = field.db_set_value(&base).unwrap();
        let restored = field.from_base_value(field.db_get_value(&cell).unwrap()).unwrap();
        prop_assert_eq!(restored, Value::Time(time));
    }
}
