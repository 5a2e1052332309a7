//! Field descriptors: typed, named attributes of a model.

use std::{borrow::Cow, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    backend::{CellValue, Meaning},
    entity::Entity,
    errors::{ModelError, ModelResult},
    filters::{FilterNode, FilterOp},
    keys,
    model::Model,
    pipeline::{
        BooleanLayer, FloatLayer, IntegerLayer, JsonLayer, Layer, Pipeline, StringLayer, TextLayer,
    },
    structured::{StructuredLayer, StructuredSpec},
    temporal::{self, DateLayer, DateTimeLayer, TemporalOptions, TimeLayer},
    value::{JsonType, Value},
};

/// Separator between a structured field's name and its sub-field names.
pub const NAME_SEPARATOR: char = '.';

/// Attribute name reserved for an entity's identity.
pub const RESERVED_KEY_NAME: &str = "key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Boolean,
    Integer,
    Float,
    Text,
    String,
    Json,
    #[serde(rename = "datetime")]
    DateTime,
    Date,
    Time,
    Structured,
}

impl FieldType {
    pub const ALL: [FieldType; 10] = [
        FieldType::Boolean,
        FieldType::Integer,
        FieldType::Float,
        FieldType::Text,
        FieldType::String,
        FieldType::Json,
        FieldType::DateTime,
        FieldType::Date,
        FieldType::Time,
        FieldType::Structured,
    ];

    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    /// Specialization chain, most specific layer first.
    pub fn chain(self) -> &'static [&'static dyn Layer] {
        const BOOLEAN: &[&dyn Layer] = &[&BooleanLayer];
        const INTEGER: &[&dyn Layer] = &[&IntegerLayer];
        const FLOAT: &[&dyn Layer] = &[&FloatLayer];
        const TEXT: &[&dyn Layer] = &[&TextLayer];
        const STRING: &[&dyn Layer] = &[&StringLayer, &TextLayer];
        const JSON: &[&dyn Layer] = &[&JsonLayer, &TextLayer];
        const DATETIME: &[&dyn Layer] = &[&DateTimeLayer];
        const DATE: &[&dyn Layer] = &[&DateLayer, &DateTimeLayer];
        const TIME: &[&dyn Layer] = &[&TimeLayer, &DateTimeLayer];
        const STRUCTURED: &[&dyn Layer] = &[&StructuredLayer];

        match self {
            FieldType::Boolean => BOOLEAN,
            FieldType::Integer => INTEGER,
            FieldType::Float => FLOAT,
            FieldType::Text => TEXT,
            FieldType::String => STRING,
            FieldType::Json => JSON,
            FieldType::DateTime => DATETIME,
            FieldType::Date => DATE,
            FieldType::Time => TIME,
            FieldType::Structured => STRUCTURED,
        }
    }

    pub const fn is_temporal(self) -> bool {
        matches!(self, FieldType::DateTime | FieldType::Date | FieldType::Time)
    }

    const fn indexed_by_default(self) -> bool {
        !matches!(self, FieldType::Text | FieldType::Json)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Text => "text",
            FieldType::String => "string",
            FieldType::Json => "json",
            FieldType::DateTime => "datetime",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Structured => "structured",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type ValidatorFn = dyn Fn(&FieldDef, &Value) -> ModelResult<Option<Value>> + Send + Sync;

/// User-supplied validator, called after shallow validation.
///
/// Returning `Some` replaces the value. Validators must be idempotent.
#[derive(Clone)]
pub struct Validator {
    label: String,
    func: Arc<ValidatorFn>,
}

impl Validator {
    pub fn new<F>(label: impl Into<String>, func: F) -> Self
    where
        F: Fn(&FieldDef, &Value) -> ModelResult<Option<Value>> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            func: Arc::new(func),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn call(&self, field: &FieldDef, value: &Value) -> ModelResult<Option<Value>> {
        (self.func)(field, value)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Validator").field(&self.label).finish()
    }
}

/// Builder for a [`FieldDef`]. All option checks run in [`FieldBuilder::build`].
#[derive(Debug, Clone)]
pub struct FieldBuilder {
    field_type: FieldType,
    name: Option<String>,
    indexed: Option<bool>,
    repeated: bool,
    required: bool,
    default: Option<Value>,
    choices: Option<Vec<Value>>,
    validator: Option<Validator>,
    verbose_name: Option<String>,
    write_empty_list: bool,
    json_type: Option<JsonType>,
    temporal: TemporalOptions,
    nested: Option<Arc<Model>>,
}

impl FieldBuilder {
    fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            name: None,
            indexed: None,
            repeated: false,
            required: false,
            default: None,
            choices: None,
            validator: None,
            verbose_name: None,
            write_empty_list: false,
            json_type: None,
            temporal: TemporalOptions::default(),
            nested: None,
        }
    }

    /// Explicit storage name. Defaults to the declaring attribute name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn indexed(mut self, indexed: bool) -> Self {
        self.indexed = Some(indexed);
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.default = (!value.is_null()).then_some(value);
        self
    }

    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
        self.verbose_name = Some(verbose_name.into());
        self
    }

    pub fn write_empty_list(mut self) -> Self {
        self.write_empty_list = true;
        self
    }

    pub fn json_type(mut self, json_type: JsonType) -> Self {
        self.json_type = Some(json_type);
        self
    }

    pub fn auto_now(mut self) -> Self {
        self.temporal.auto_now = true;
        self
    }

    pub fn auto_now_add(mut self) -> Self {
        self.temporal.auto_now_add = true;
        self
    }

    pub fn build(self) -> ModelResult<FieldDef> {
        if let Some(name) = &self.name {
            check_storage_name(name)?;
        }
        let label = self.name.clone().unwrap_or_else(|| unbound_label(self.field_type));

        if self.repeated && (self.required || self.default.is_some()) {
            return Err(ModelError::config(format!(
                "field {label}: repeated is incompatible with required or default"
            )));
        }
        if self.temporal.is_set() {
            if !self.field_type.is_temporal() {
                return Err(ModelError::config(format!(
                    "field {label}: auto_now and auto_now_add only apply to temporal fields"
                )));
            }
            if self.repeated {
                return Err(ModelError::config(format!(
                    "field {label}: auto_now and auto_now_add cannot be combined with repeated"
                )));
            }
        }
        if self.json_type.is_some() && self.field_type != FieldType::Json {
            return Err(ModelError::config(format!(
                "field {label}: json_type only applies to json fields"
            )));
        }

        let structured = match (self.field_type, self.nested) {
            (FieldType::Structured, Some(model)) => {
                if self.repeated && model.has_repeated() {
                    return Err(ModelError::config(format!(
                        "field {label}: cannot use repeated because model {} contains repeated fields (directly or indirectly)",
                        model.kind()
                    )));
                }
                Some(Arc::new(StructuredSpec::new(model)))
            }
            (FieldType::Structured, None) => {
                return Err(ModelError::config(format!("field {label}: structured field needs a model")));
            }
            (_, Some(_)) => {
                return Err(ModelError::internal(format!("field {label}: nested model on a scalar field")));
            }
            (_, None) => None,
        };

        let field = FieldDef {
            name: self.name.unwrap_or_default(),
            code_name: String::new(),
            field_type: self.field_type,
            indexed: self.indexed.unwrap_or(self.field_type.indexed_by_default()),
            repeated: self.repeated,
            required: self.required,
            default: None,
            choices: None,
            validator: self.validator,
            verbose_name: self.verbose_name,
            write_empty_list: self.write_empty_list,
            json_type: self.json_type,
            temporal: self.temporal,
            structured,
        };

        // stored in shallow-validated shape, matching what do_validate compares
        let choices = match self.choices {
            Some(raw) => Some(
                raw.into_iter()
                    .map(|choice| {
                        if choice.is_null() {
                            return Ok(choice);
                        }
                        field.pipeline().shallow_validate(&field, choice).map_err(|err| {
                            ModelError::config(format!("field {label}: invalid choice: {err}"))
                        })
                    })
                    .collect::<ModelResult<Vec<_>>>()?,
            ),
            None => None,
        };
        let field = FieldDef { choices, ..field };

        let default = match self.default {
            Some(value) => Some(field.do_validate(value).map_err(|err| {
                ModelError::config(format!("field {label}: invalid default: {err}"))
            })?),
            None => None,
        };
        Ok(FieldDef { default, ..field })
    }
}

fn unbound_label(field_type: FieldType) -> String {
    format!("<unbound {field_type}>")
}

fn check_storage_name(name: &str) -> ModelResult<()> {
    if name.is_empty() {
        return Err(ModelError::config("field name cannot be empty"));
    }
    if name.contains(NAME_SEPARATOR) {
        return Err(ModelError::config(format!(
            "field name {name:?} cannot contain {NAME_SEPARATOR:?} characters"
        )));
    }
    if name == RESERVED_KEY_NAME {
        return Err(ModelError::config(format!(
            "field name {name:?} is reserved for the entity key"
        )));
    }
    if name.bytes().any(keys::is_reserved_byte) {
        return Err(ModelError::config(format!("field name {name:?} contains a reserved control byte")));
    }
    Ok(())
}

/// A declared field. Immutable once its model is built; shared behind `Arc`.
#[derive(Debug, Clone)]
pub struct FieldDef {
    name: String,
    code_name: String,
    field_type: FieldType,
    indexed: bool,
    repeated: bool,
    required: bool,
    default: Option<Value>,
    choices: Option<Vec<Value>>,
    validator: Option<Validator>,
    verbose_name: Option<String>,
    write_empty_list: bool,
    json_type: Option<JsonType>,
    temporal: TemporalOptions,
    structured: Option<Arc<StructuredSpec>>,
}

impl FieldDef {
    pub fn boolean() -> FieldBuilder {
        FieldBuilder::new(FieldType::Boolean)
    }

    pub fn integer() -> FieldBuilder {
        FieldBuilder::new(FieldType::Integer)
    }

    pub fn float() -> FieldBuilder {
        FieldBuilder::new(FieldType::Float)
    }

    /// Unindexed text of unlimited length.
    pub fn text() -> FieldBuilder {
        FieldBuilder::new(FieldType::Text)
    }

    /// Indexed text.
    pub fn string() -> FieldBuilder {
        FieldBuilder::new(FieldType::String)
    }

    pub fn json() -> FieldBuilder {
        FieldBuilder::new(FieldType::Json)
    }

    pub fn datetime() -> FieldBuilder {
        FieldBuilder::new(FieldType::DateTime)
    }

    pub fn date() -> FieldBuilder {
        FieldBuilder::new(FieldType::Date)
    }

    pub fn time() -> FieldBuilder {
        FieldBuilder::new(FieldType::Time)
    }

    pub fn structured(model: &Arc<Model>) -> FieldBuilder {
        FieldBuilder {
            nested: Some(Arc::clone(model)),
            ..FieldBuilder::new(FieldType::Structured)
        }
    }

    /// Builder for any field type. Structured fields need [`FieldDef::structured`].
    pub fn of_type(field_type: FieldType) -> FieldBuilder {
        FieldBuilder::new(field_type)
    }

    /// Storage name. Empty until the owning model is built, unless given explicitly.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name used in error messages: the storage name, or `<unbound TYPE>` before binding.
    pub fn label(&self) -> Cow<'_, str> {
        if self.name.is_empty() {
            Cow::Owned(unbound_label(self.field_type))
        } else {
            Cow::Borrowed(&self.name)
        }
    }

    /// Declaring attribute name.
    pub fn code_name(&self) -> &str {
        &self.code_name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn is_repeated(&self) -> bool {
        self.repeated
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn choices(&self) -> Option<&[Value]> {
        self.choices.as_deref()
    }

    pub fn validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }

    pub fn verbose_name(&self) -> Option<&str> {
        self.verbose_name.as_deref()
    }

    pub fn writes_empty_list(&self) -> bool {
        self.write_empty_list
    }

    pub fn json_type(&self) -> Option<JsonType> {
        self.json_type
    }

    pub fn temporal(&self) -> TemporalOptions {
        self.temporal
    }

    pub fn nested_model(&self) -> Option<&Arc<Model>> {
        self.structured.as_ref().map(|spec| spec.model())
    }

    pub(crate) fn structured_spec(&self) -> Option<&StructuredSpec> {
        self.structured.as_deref()
    }

    pub fn pipeline(&self) -> &'static Pipeline {
        Pipeline::for_type(self.field_type)
    }

    /// Bind the field to its declaring attribute. Called once, when the model is built.
    pub(crate) fn fix_up(&mut self, code_name: &str) -> ModelResult<()> {
        if !self.code_name.is_empty() {
            return Err(ModelError::config(format!(
                "field {} is already bound to attribute {}",
                self.name, self.code_name
            )));
        }
        self.code_name = code_name.to_string();
        if self.name.is_empty() {
            check_storage_name(code_name)?;
            self.name = code_name.to_string();
        }
        Ok(())
    }

    /// Copy of this field under another storage name, with a fresh sub-field cache.
    pub(crate) fn renamed(&self, name: String) -> FieldDef {
        FieldDef {
            name,
            structured: self
                .structured
                .as_ref()
                .map(|spec| Arc::new(StructuredSpec::new(Arc::clone(spec.model())))),
            ..self.clone()
        }
    }

    // ========== Value pipeline ==========

    /// Shallow validation, then the user validator, then the choice set.
    pub fn do_validate(&self, value: Value) -> ModelResult<Value> {
        let mut value = self.pipeline().shallow_validate(self, value)?;
        if let Some(validator) = &self.validator
            && let Some(replacement) = validator.call(self, &value)?
        {
            value = replacement;
        }
        if let Some(choices) = &self.choices
            && !choices.contains(&value)
        {
            return Err(ModelError::bad_value(
                self.label(),
                format!("value {value:?} is not an allowed choice"),
            ));
        }
        Ok(value)
    }

    /// Convert an already validated user value to its base representation.
    pub fn to_base_value(&self, value: Value) -> ModelResult<Value> {
        if value.is_null() {
            return Ok(value);
        }
        self.pipeline().to_base(self, value)
    }

    /// Convert a base value back to its user representation.
    pub fn from_base_value(&self, value: Value) -> ModelResult<Value> {
        if value.is_null() {
            return Ok(value);
        }
        self.pipeline().from_base(self, value)
    }

    // ========== Entity access ==========

    /// Validate and store a value. Repeated fields require a list.
    pub fn set_value(&self, entity: &mut Entity, value: Value) -> ModelResult<()> {
        let value = if self.repeated {
            match value {
                Value::List(items) => Value::List(
                    items
                        .into_iter()
                        .map(|item| self.do_validate(item))
                        .collect::<ModelResult<Vec<_>>>()?,
                ),
                other => {
                    return Err(ModelError::bad_value(
                        self.label(),
                        format!("expected list, got {}", other.type_name()),
                    ));
                }
            }
        } else if value.is_null() {
            value
        } else {
            self.do_validate(value)?
        };
        self.store_value(entity, value);
        Ok(())
    }

    /// Stored value, an empty list for unset repeated fields, or the default.
    pub fn get_value(&self, entity: &Entity) -> Value {
        match entity.stored(&self.name) {
            Some(value) => value.clone(),
            None if self.repeated => Value::List(Vec::new()),
            None => self.default.clone().unwrap_or_default(),
        }
    }

    /// Remove the stored value. No-op when nothing is stored.
    pub fn delete_value(&self, entity: &mut Entity) {
        entity.remove_stored(&self.name);
    }

    pub fn has_value(&self, entity: &Entity) -> bool {
        entity.stored(&self.name).is_some()
    }

    pub(crate) fn store_value(&self, entity: &mut Entity, value: Value) {
        entity.insert_stored(&self.name, value);
    }

    /// Base values of this field as a list: one per element for repeated fields,
    /// exactly one (possibly null) for single fields. Defaults are included.
    pub fn base_values(&self, entity: &Entity) -> ModelResult<Vec<Value>> {
        match self.get_value(entity) {
            Value::List(items) if self.repeated => items.into_iter().map(|item| self.to_base_value(item)).collect(),
            value => Ok(vec![self.to_base_value(value)?]),
        }
    }

    /// Finalize the field before persistence.
    pub fn prepare_for_put(&self, entity: &mut Entity) -> ModelResult<()> {
        match self.field_type {
            FieldType::DateTime | FieldType::Date | FieldType::Time => {
                temporal::prepare_for_put(self, entity);
                Ok(())
            }
            FieldType::Structured => self.prepare_nested_for_put(entity),
            _ => Ok(()),
        }
    }

    // ========== Filters ==========

    /// Build a comparison filter against this field.
    pub fn comparison(&self, op: FilterOp, value: impl Into<Value>) -> ModelResult<FilterNode> {
        let value = value.into();
        if self.structured.is_some() {
            return self.structured_comparison(op, value);
        }
        if !self.indexed {
            return Err(ModelError::bad_filter(format!(
                "cannot query for unindexed field {}",
                self.name
            )));
        }
        let value = if value.is_null() {
            value
        } else {
            let value = self.do_validate(value)?;
            self.to_base_value(value)?
        };
        Ok(FilterNode::compare(self.name.clone(), op, value))
    }

    pub fn equals(&self, value: impl Into<Value>) -> ModelResult<FilterNode> {
        self.comparison(FilterOp::Eq, value)
    }

    /// Membership filter, expanded to a disjunction of equality filters.
    pub fn in_values(&self, values: impl Into<Value>) -> ModelResult<FilterNode> {
        let items = match values.into() {
            Value::List(items) => items,
            other => {
                return Err(ModelError::bad_argument(format!(
                    "expected list of values, got {}",
                    other.type_name()
                )));
            }
        };
        let filters = items
            .into_iter()
            .map(|item| self.equals(item))
            .collect::<ModelResult<Vec<_>>>()?;
        if filters.is_empty() {
            return Ok(FilterNode::False);
        }
        Ok(FilterNode::Or(filters))
    }

    // ========== Backend cells ==========

    /// Encode one base value into a backend cell.
    pub fn db_set_value(&self, value: &Value) -> ModelResult<(CellValue, Option<Meaning>)> {
        let cell = match (self.field_type, value) {
            (_, Value::Null) => (CellValue::Null, None),
            (FieldType::Boolean, Value::Bool(flag)) => (CellValue::Bool(*flag), None),
            (FieldType::Integer, Value::Int(int)) => (CellValue::Int(*int), None),
            (FieldType::Float, Value::Float(float)) => (CellValue::Double(*float), None),
            (FieldType::Float, Value::Int(int)) => (CellValue::Double(*int as f64), None),
            (FieldType::Text | FieldType::String | FieldType::Json, Value::Text(text)) => {
                (CellValue::Text(text.clone()), None)
            }
            (FieldType::DateTime | FieldType::Date | FieldType::Time, value) => {
                (CellValue::Int(temporal::encode_micros(self, value)?), Some(Meaning::Timestamp))
            }
            (field_type, other) => {
                return Err(ModelError::bad_value(
                    self.label(),
                    format!("{field_type} field cannot store {}", other.type_name()),
                ));
            }
        };
        Ok(cell)
    }

    /// Decode a backend cell into a base value. Absent or mismatched cells read as null.
    pub fn db_get_value(&self, cell: &CellValue) -> ModelResult<Value> {
        let value = match (self.field_type, cell) {
            (FieldType::Boolean, CellValue::Bool(flag)) => Value::Bool(*flag),
            (FieldType::Integer, CellValue::Int(int)) => Value::Int(*int),
            (FieldType::Float, CellValue::Double(float)) => Value::Float(*float),
            (FieldType::Text | FieldType::String | FieldType::Json, CellValue::Text(text)) => Value::Text(text.clone()),
            (FieldType::DateTime | FieldType::Date | FieldType::Time, CellValue::Int(micros)) => {
                Value::DateTime(temporal::decode_micros(self, *micros)?)
            }
            (_, CellValue::Null) => Value::Null,
            (field_type, other) => {
                log::warn!("{field_type} field {} cannot read cell {other:?}; treating as null", self.name);
                Value::Null
            }
        };
        Ok(value)
    }
}
