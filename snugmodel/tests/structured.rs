use std::sync::Arc;

use serde_json::json;
use snugmodel::{
    CellSink, CellValue, Entity, FieldDef, FilterNode, FilterOp, Model, ModelError, Record, Value,
};

struct Models {
    address: Arc<Model>,
    person: Arc<Model>,
    household: Arc<Model>,
}

fn models() -> Models {
    let geo = Model::builder("Geo")
        .field("lat", FieldDef::float())
        .field("lng", FieldDef::float())
        .build()
        .unwrap();
    let address = Model::builder("Address")
        .field("city", FieldDef::string())
        .field("zip", FieldDef::integer())
        .field("note", FieldDef::text())
        .field("geo", FieldDef::structured(&geo))
        .build()
        .unwrap();
    let person = Model::builder("Person")
        .field("name", FieldDef::string())
        .field("home", FieldDef::structured(&address))
        .build()
        .unwrap();
    let household = Model::builder("Household")
        .field("addresses", FieldDef::structured(&address).repeated())
        .build()
        .unwrap();
    Models {
        address,
        person,
        household,
    }
}

fn address(models: &Models, city: &str, zip: Option<i64>) -> Entity {
    let mut entity = Entity::with_values(&models.address, [("city", city)]).unwrap();
    if let Some(zip) = zip {
        entity.set("zip", zip).unwrap();
    }
    entity
}

#[test]
fn sub_fields_are_renamed_and_memoized() {
    let models = models();
    let home = models.person.find_field("home").unwrap();

    let city = home.sub("city").unwrap();
    assert_eq!(city.name(), "home.city");
    assert!(Arc::ptr_eq(&city, &home.sub("city").unwrap()));

    let lat = home.sub("geo").unwrap().sub("lat").unwrap();
    assert_eq!(lat.name(), "home.geo.lat");

    let err = home.sub("country").unwrap_err();
    assert!(matches!(err, ModelError::UnknownAttribute { .. }));
}

#[test]
fn equality_yields_one_condition_per_set_sub_field() {
    let models = models();
    let home = models.person.find_field("home").unwrap();

    let node = home.equals(address(&models, "MPLS", Some(55401))).unwrap();
    assert_eq!(
        node,
        FilterNode::and([
            FilterNode::compare("home.city", FilterOp::Eq, "MPLS"),
            FilterNode::compare("home.zip", FilterOp::Eq, 55401),
        ])
    );

    let single = home.equals(address(&models, "MPLS", None)).unwrap();
    assert_eq!(single, FilterNode::compare("home.city", FilterOp::Eq, "MPLS"));
}

#[test]
fn nested_structured_conditions_are_flattened() {
    let models = models();
    let home = models.person.find_field("home").unwrap();
    let value = json!({"city": "MPLS", "geo": {"lat": 44.9, "lng": -93.2}});

    let node = home.equals(value).unwrap();
    let FilterNode::And(conditions) = &node else {
        panic!("expected conjunction, got {node:?}");
    };
    assert_eq!(conditions.len(), 3);
    assert_eq!(conditions[2], FilterNode::compare("home.geo.lng", FilterOp::Eq, -93.2));
}

#[test]
fn degenerate_structured_filters_are_rejected() {
    let models = models();
    let home = models.person.find_field("home").unwrap();

    let err = home.equals(Entity::new(&models.address)).unwrap_err();
    assert!(matches!(err, ModelError::BadFilter { .. }));

    let err = home.comparison(FilterOp::Gt, address(&models, "MPLS", None)).unwrap_err();
    assert!(matches!(err, ModelError::BadFilter { .. }));

    let mut noted = address(&models, "MPLS", None);
    noted.set("note", "ring twice").unwrap();
    let err = home.equals(noted).unwrap_err();
    assert!(matches!(err, ModelError::BadFilter { .. }));

    assert_eq!(
        home.equals(Value::Null).unwrap(),
        FilterNode::compare("home", FilterOp::Eq, Value::Null)
    );
}

#[test]
fn repeated_sub_fields_cannot_carry_filter_values() {
    let tagged = Model::builder("Tagged")
        .field("label", FieldDef::string())
        .field("tags", FieldDef::string().repeated())
        .build()
        .unwrap();
    let holder = Model::builder("Holder")
        .field("tagged", FieldDef::structured(&tagged))
        .build()
        .unwrap();
    let field = holder.find_field("tagged").unwrap();

    let mut value = Entity::with_values(&tagged, [("label", "x")]).unwrap();
    assert!(field.equals(value.clone()).is_ok());

    value.set("tags", vec!["a"]).unwrap();
    let err = field.equals(value).unwrap_err();
    assert!(matches!(err, ModelError::BadFilter { .. }));
}

#[test]
fn repeated_of_repeated_is_a_configuration_fault() {
    let tagged = Model::builder("Tagged")
        .field("tags", FieldDef::string().repeated())
        .build()
        .unwrap();
    let err = FieldDef::structured(&tagged).repeated().build().unwrap_err();
    assert!(matches!(err, ModelError::Configuration { .. }));

    let wrapper = Model::builder("Wrapper")
        .field("tagged", FieldDef::structured(&tagged))
        .build()
        .unwrap();
    assert!(FieldDef::structured(&wrapper).repeated().build().is_err());
}

#[test]
fn repeated_structured_filters_require_a_single_matching_element() {
    let models = models();
    let addresses = models.household.find_field("addresses").unwrap();

    let node = addresses.equals(address(&models, "MPLS", Some(55401))).unwrap();
    let FilterNode::And(conditions) = &node else {
        panic!("expected conjunction, got {node:?}");
    };
    let Some(FilterNode::PostFilter(predicate)) = conditions.last() else {
        panic!("expected trailing post-filter, got {node:?}");
    };
    assert_eq!(predicate.field(), "addresses");
    assert_eq!(predicate.conditions().len(), 2);

    let mut split = Entity::new(&models.household);
    split
        .set(
            "addresses",
            vec![address(&models, "MPLS", Some(1)), address(&models, "STP", Some(55401))],
        )
        .unwrap();
    assert!(!predicate.apply(&split).unwrap());

    let mut together = Entity::new(&models.household);
    together
        .set(
            "addresses",
            vec![address(&models, "STP", None), address(&models, "MPLS", Some(55401))],
        )
        .unwrap();
    assert!(predicate.apply(&together).unwrap());
}

#[test]
fn structured_values_accept_json_objects_and_check_kind() {
    let models = models();
    let mut person = Entity::new(&models.person);
    person.set("home", json!({"city": "MPLS", "zip": 55401})).unwrap();
    let home = person.get("home").unwrap();
    assert_eq!(home.as_entity().unwrap().get("zip").unwrap(), Value::Int(55401));

    let err = person.set("home", Entity::new(&models.household)).unwrap_err();
    assert!(matches!(err, ModelError::BadValue { .. }));
    let err = person.set("home", json!({"country": "US"})).unwrap_err();
    assert!(matches!(err, ModelError::UnknownAttribute { .. }));
}

#[test]
fn membership_on_structured_fields() {
    let models = models();
    let home = models.person.find_field("home").unwrap();
    let node = home
        .in_values(vec![address(&models, "MPLS", None), address(&models, "STP", None)])
        .unwrap();
    assert_eq!(node.to_string(), r#"(home.city = "MPLS" OR home.city = "STP")"#);
    assert_eq!(home.in_values(Vec::<Entity>::new()).unwrap(), FilterNode::False);
}

#[test]
fn repeated_structured_values_survive_persistence() {
    let models = models();
    let mut household = Entity::new(&models.household);
    let mut with_geo = address(&models, "STP", Some(55101));
    with_geo.set("geo", json!({"lat": 44.95})).unwrap();
    household
        .set("addresses", vec![address(&models, "MPLS", None), with_geo])
        .unwrap();

    let mut record = Record::new();
    household.put_into(&mut record).unwrap();
    let zips: Vec<_> = record.read_all("addresses.zip").map(|cell| cell.value.clone()).collect();
    assert_eq!(zips, [CellValue::Null, CellValue::Int(55101)]);
    assert_eq!(record.read_all("addresses.geo.lng").count(), 2);

    let loaded = Entity::load(&models.household, None, &record).unwrap();
    assert_eq!(loaded, household);
}

#[test]
fn single_structured_values_use_dotted_cells() {
    let models = models();
    let mut person = Entity::with_values(&models.person, [("name", "Ada")]).unwrap();
    person.set("home", address(&models, "MPLS", None)).unwrap();

    let mut record = Record::new();
    person.put_into(&mut record).unwrap();
    assert_eq!(record.read("home.city"), Some(&CellValue::Text("MPLS".into())));
    assert_eq!(record.read("home.zip"), None);

    let loaded = Entity::load(&models.person, None, &record).unwrap();
    assert_eq!(loaded, person);

    let mut bogus = Record::new();
    bogus.write("home.country", CellValue::Text("US".into()), None).unwrap();
    let err = Entity::load(&models.person, None, &bogus).unwrap_err();
    assert!(matches!(err, ModelError::UnknownAttribute { .. }));
}

#[test]
fn check_initialized_reports_dotted_paths() {
    let inner = Model::builder("Inner")
        .field("code", FieldDef::string().required())
        .build()
        .unwrap();
    let outer = Model::builder("Outer")
        .field("inner", FieldDef::structured(&inner))
        .build()
        .unwrap();
    let mut entity = Entity::new(&outer);
    entity.set("inner", Entity::new(&inner)).unwrap();

    let err = entity.check_initialized().unwrap_err();
    assert_eq!(err.issues[0].field, "inner.code");
}
