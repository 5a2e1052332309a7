//! Declarative model definitions in TOML.
//!
//! ```toml
//! [[model]]
//! kind = "Address"
//!
//! [[model.field]]
//! attr = "city"
//! type = "string"
//! required = true
//!
//! [[model]]
//! kind = "Person"
//!
//! [[model.field]]
//! attr = "addresses"
//! type = "structured"
//! model = "Address"
//! repeated = true
//! ```
//!
//! Loading applies the same checks as building models in code and registers every model.
//! Structured fields name their nested kind, which must be defined earlier in the same
//! file or already registered.

use std::{collections::HashMap, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{
    errors::{ModelError, ModelResult},
    field::{FieldBuilder, FieldDef, FieldType},
    model::Model,
    registry::{get_model, register_model},
    validators,
    value::{JsonType, value_from_json},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaFile {
    #[serde(default)]
    pub model: Vec<ModelSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSpec {
    pub kind: String,
    #[serde(default)]
    pub field: Vec<FieldSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    /// Declaring attribute name.
    pub attr: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Storage name, when it differs from `attr`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
    #[serde(default)]
    pub repeated: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<JsonValue>>,
    /// Stock validator name, see [`validators::by_name`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Nested kind of a structured field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_type: Option<JsonType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose_name: Option<String>,
    #[serde(default)]
    pub write_empty_list: bool,
    #[serde(default)]
    pub auto_now: bool,
    #[serde(default)]
    pub auto_now_add: bool,
}

impl SchemaFile {
    pub fn parse(text: &str) -> ModelResult<Self> {
        toml::from_str(text).map_err(|err| ModelError::config(format!("invalid schema: {err}")))
    }

    /// Build every model in file order. Nothing is registered.
    pub fn build(&self) -> ModelResult<Vec<Arc<Model>>> {
        let mut local: HashMap<String, Arc<Model>> = HashMap::new();
        let mut models = Vec::with_capacity(self.model.len());
        for spec in &self.model {
            if local.contains_key(&spec.kind) {
                return Err(ModelError::config(format!("model {} is defined twice", spec.kind)));
            }
            let model = spec.build(&local)?;
            local.insert(spec.kind.clone(), Arc::clone(&model));
            models.push(model);
        }
        Ok(models)
    }
}

impl ModelSpec {
    fn build(&self, local: &HashMap<String, Arc<Model>>) -> ModelResult<Arc<Model>> {
        let mut builder = Model::builder(&self.kind);
        for field in &self.field {
            builder = builder.field(&field.attr, field.builder(&self.kind, local)?);
        }
        builder.build()
    }
}

impl FieldSpec {
    fn builder(&self, kind: &str, local: &HashMap<String, Arc<Model>>) -> ModelResult<FieldBuilder> {
        let label = format!("{kind}.{}", self.attr);
        let nested = match (self.field_type, &self.model) {
            (FieldType::Structured, Some(target)) => Some(
                local
                    .get(target)
                    .cloned()
                    .or_else(|| get_model(target))
                    .ok_or_else(|| ModelError::config(format!("{label}: unknown model {target}")))?,
            ),
            (FieldType::Structured, None) => {
                return Err(ModelError::config(format!("{label}: structured fields need a model")));
            }
            (_, Some(_)) => {
                return Err(ModelError::config(format!("{label}: only structured fields take a model")));
            }
            (_, None) => None,
        };

        let mut builder = match &nested {
            Some(model) => FieldDef::structured(model),
            None => FieldDef::of_type(self.field_type),
        };
        if let Some(name) = &self.name {
            builder = builder.name(name);
        }
        if let Some(indexed) = self.indexed {
            builder = builder.indexed(indexed);
        }
        if self.repeated {
            builder = builder.repeated();
        }
        if self.required {
            builder = builder.required();
        }
        if self.write_empty_list {
            builder = builder.write_empty_list();
        }
        if self.auto_now {
            builder = builder.auto_now();
        }
        if self.auto_now_add {
            builder = builder.auto_now_add();
        }
        if let Some(verbose_name) = &self.verbose_name {
            builder = builder.verbose_name(verbose_name);
        }
        if let Some(json_type) = self.json_type {
            builder = builder.json_type(json_type);
        }

        builder = match (&self.validator, &self.pattern) {
            (Some(_), Some(_)) => {
                return Err(ModelError::config(format!("{label}: use either validator or pattern, not both")));
            }
            (Some(name), None) => builder.validator(validators::by_name(name)?),
            (None, Some(pattern)) => builder.validator(validators::pattern(pattern)?),
            (None, None) => builder,
        };

        let decode = |json: &JsonValue| {
            value_from_json(&label, self.field_type, nested.as_ref(), json)
                .map_err(|err| ModelError::config(format!("{label}: {err}")))
        };
        if let Some(default) = &self.default {
            builder = builder.default_value(decode(default)?);
        }
        if let Some(choices) = &self.choices {
            builder = builder.choices(choices.iter().map(decode).collect::<ModelResult<Vec<_>>>()?);
        }
        Ok(builder)
    }
}

/// Build and register every model in `text`.
pub fn load_str(text: &str) -> ModelResult<Vec<Arc<Model>>> {
    let models = SchemaFile::parse(text)?.build()?;
    for model in &models {
        register_model(model);
    }
    log::debug!("loaded {} models from schema", models.len());
    Ok(models)
}

pub fn load_file(path: impl AsRef<Path>) -> ModelResult<Vec<Arc<Model>>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|err| ModelError::config(format!("cannot read schema {}: {err}", path.display())))?;
    load_str(&text)
}
