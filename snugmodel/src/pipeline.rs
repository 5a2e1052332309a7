//! Composition of validation and base-type conversion stages.
//!
//! Every field type is described by a specialization chain of [`Layer`]s, most specific
//! first. Each layer declares the stages it contributes. A [`Pipeline`] flattens the chain
//! once per field type into three ordered step lists:
//!
//! * `shallow`: the leading run of `Validate` steps, up to and including the validation of
//!   the first layer that also converts. No conversion is ever applied.
//! * `to_base`: every remaining forward step (`Validate` and `ToBase`), most specific layer
//!   first. Validation already covered by `shallow` is not repeated.
//! * `from_base`: every `FromBase` step, base layer first.
//!
//! Stages tolerate values that are already converted, so applying `to_base` or `from_base`
//! a second time is a no-op.

use std::sync::OnceLock;

use crate::{
    errors::{ModelError, ModelResult},
    field::{FieldDef, FieldType},
    value::Value,
};

/// One kind of transformation a layer can contribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    ToBase,
    FromBase,
}

/// One level of a field type's specialization chain.
pub trait Layer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Stages this layer contributes, in application order.
    fn stages(&self) -> &'static [Stage];

    fn validate(&self, _field: &FieldDef, value: Value) -> ModelResult<Value> {
        Ok(value)
    }

    fn to_base(&self, _field: &FieldDef, value: Value) -> ModelResult<Value> {
        Ok(value)
    }

    fn from_base(&self, _field: &FieldDef, value: Value) -> ModelResult<Value> {
        Ok(value)
    }
}

/// A single named stage of one layer.
#[derive(Clone, Copy)]
pub struct Step {
    layer: &'static dyn Layer,
    stage: Stage,
}

impl Step {
    pub fn layer_name(&self) -> &'static str {
        self.layer.name()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn apply(&self, field: &FieldDef, value: Value) -> ModelResult<Value> {
        match self.stage {
            Stage::Validate => self.layer.validate(field, value),
            Stage::ToBase => self.layer.to_base(field, value),
            Stage::FromBase => self.layer.from_base(field, value),
        }
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{:?}", self.layer.name(), self.stage)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    shallow: Vec<Step>,
    to_base: Vec<Step>,
    from_base: Vec<Step>,
}

impl Pipeline {
    /// Flatten a specialization chain (most specific layer first) into a pipeline.
    pub fn compose(chain: &[&'static dyn Layer]) -> Self {
        let forward: Vec<Step> = chain
            .iter()
            .flat_map(|layer| {
                layer
                    .stages()
                    .iter()
                    .filter(|stage| **stage != Stage::FromBase)
                    .map(|stage| Step { layer: *layer, stage: *stage })
            })
            .collect();
        let split = forward
            .iter()
            .position(|step| step.stage != Stage::Validate)
            .unwrap_or(forward.len());
        let (shallow, to_base) = forward.split_at(split);

        let from_base = chain
            .iter()
            .rev()
            .filter(|layer| layer.stages().contains(&Stage::FromBase))
            .map(|layer| Step {
                layer: *layer,
                stage: Stage::FromBase,
            })
            .collect();

        Self {
            shallow: shallow.to_vec(),
            to_base: to_base.to_vec(),
            from_base,
        }
    }

    /// The cached pipeline of a field type. Built once for all types on first use.
    pub fn for_type(field_type: FieldType) -> &'static Pipeline {
        static PIPELINES: OnceLock<Vec<Pipeline>> = OnceLock::new();
        let pipelines = PIPELINES.get_or_init(|| {
            FieldType::ALL
                .iter()
                .map(|field_type| {
                    let pipeline = Pipeline::compose(field_type.chain());
                    log::trace!("composed pipeline for {field_type}: {pipeline:?}");
                    pipeline
                })
                .collect()
        });
        &pipelines[field_type.index()]
    }

    pub fn shallow_steps(&self) -> &[Step] {
        &self.shallow
    }

    pub fn to_base_steps(&self) -> &[Step] {
        &self.to_base
    }

    pub fn from_base_steps(&self) -> &[Step] {
        &self.from_base
    }

    pub fn shallow_validate(&self, field: &FieldDef, value: Value) -> ModelResult<Value> {
        run(&self.shallow, field, value)
    }

    pub fn to_base(&self, field: &FieldDef, value: Value) -> ModelResult<Value> {
        run(&self.to_base, field, value)
    }

    pub fn from_base(&self, field: &FieldDef, value: Value) -> ModelResult<Value> {
        run(&self.from_base, field, value)
    }
}

fn run(steps: &[Step], field: &FieldDef, value: Value) -> ModelResult<Value> {
    steps.iter().try_fold(value, |value, step| step.apply(field, value))
}

pub(crate) fn expected(field: &FieldDef, expected: &str, got: &Value) -> ModelError {
    ModelError::bad_value(field.label(), format!("expected {expected}, got {}", got.type_name()))
}

pub struct BooleanLayer;

impl Layer for BooleanLayer {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn stages(&self) -> &'static [Stage] {
        &[Stage::Validate]
    }

    fn validate(&self, field: &FieldDef, value: Value) -> ModelResult<Value> {
        match value {
            Value::Bool(_) => Ok(value),
            other => Err(expected(field, "bool", &other)),
        }
    }
}

pub struct IntegerLayer;

impl Layer for IntegerLayer {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn stages(&self) -> &'static [Stage] {
        &[Stage::Validate]
    }

    fn validate(&self, field: &FieldDef, value: Value) -> ModelResult<Value> {
        match value {
            Value::Int(_) => Ok(value),
            other => Err(expected(field, "integer", &other)),
        }
    }
}

pub struct FloatLayer;

impl Layer for FloatLayer {
    fn name(&self) -> &'static str {
        "float"
    }

    fn stages(&self) -> &'static [Stage] {
        &[Stage::Validate]
    }

    fn validate(&self, field: &FieldDef, value: Value) -> ModelResult<Value> {
        match value {
            Value::Float(_) => Ok(value),
            Value::Int(int) => Ok(Value::Float(int as f64)),
            other => Err(expected(field, "float", &other)),
        }
    }
}

pub struct TextLayer;

impl Layer for TextLayer {
    fn name(&self) -> &'static str {
        "text"
    }

    fn stages(&self) -> &'static [Stage] {
        &[Stage::Validate]
    }

    fn validate(&self, field: &FieldDef, value: Value) -> ModelResult<Value> {
        match value {
            Value::Text(_) => Ok(value),
            other => Err(expected(field, "text", &other)),
        }
    }
}

/// Indexed text. Contributes no stages of its own.
pub struct StringLayer;

impl Layer for StringLayer {
    fn name(&self) -> &'static str {
        "string"
    }

    fn stages(&self) -> &'static [Stage] {
        &[]
    }
}

/// JSON payload stored as its text encoding.
pub struct JsonLayer;

impl Layer for JsonLayer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn stages(&self) -> &'static [Stage] {
        &[Stage::Validate, Stage::ToBase, Stage::FromBase]
    }

    fn validate(&self, field: &FieldDef, value: Value) -> ModelResult<Value> {
        let json = match value {
            Value::Json(json) => json,
            Value::Bool(flag) => serde_json::Value::Bool(flag),
            Value::Int(int) => serde_json::Value::from(int),
            Value::Float(float) => serde_json::Value::from(float),
            Value::Text(text) => serde_json::Value::String(text),
            other => return Err(expected(field, "a JSON-encodable value", &other)),
        };
        check_json_type(field, &json)?;
        Ok(Value::Json(json))
    }

    fn to_base(&self, field: &FieldDef, value: Value) -> ModelResult<Value> {
        match value {
            Value::Json(json) => serde_json::to_string(&json)
                .map(Value::Text)
                .map_err(|err| ModelError::bad_value(field.label(), format!("cannot encode JSON: {err}"))),
            other => Ok(other),
        }
    }

    fn from_base(&self, field: &FieldDef, value: Value) -> ModelResult<Value> {
        match value {
            Value::Text(text) => {
                let json: serde_json::Value = serde_json::from_str(&text)
                    .map_err(|err| ModelError::bad_value(field.label(), format!("cannot decode JSON: {err}")))?;
                check_json_type(field, &json)?;
                Ok(Value::Json(json))
            }
            other => Ok(other),
        }
    }
}

fn check_json_type(field: &FieldDef, json: &serde_json::Value) -> ModelResult<()> {
    match field.json_type() {
        Some(json_type) if !json_type.matches(json) => Err(ModelError::bad_value(
            field.label(),
            format!("JSON value must be a {}", json_type.as_str()),
        )),
        _ => Ok(()),
    }
}
