//! Entity instances: a model plus a name-to-value store.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::Value as JsonValue;

use crate::{
    backend::{Cell, CellSink, CellSource, CellValue, Meaning},
    errors::{ModelError, ModelResult, ValidationError, ValidationIssue, ValidationResult},
    field::{FieldDef, FieldType, NAME_SEPARATOR},
    keys::Key,
    model::Model,
    value::{Value, value_from_json},
};

/// One record of a model.
///
/// Values are stored by storage name in their user representation. Absent entries are
/// unset; reads of unset fields fall back to the field default.
#[derive(Clone)]
pub struct Entity {
    model: Arc<Model>,
    key: Option<Key>,
    values: BTreeMap<String, Value>,
}

impl Entity {
    pub fn new(model: &Arc<Model>) -> Self {
        Self {
            model: Arc::clone(model),
            key: None,
            values: BTreeMap::new(),
        }
    }

    /// Build an entity from `(attribute, value)` pairs.
    pub fn with_values<I, K, V>(model: &Arc<Model>, pairs: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut entity = Self::new(model);
        entity.populate(pairs)?;
        Ok(entity)
    }

    /// Assign several attributes at once. Stops at the first failure.
    pub fn populate<I, K, V>(&mut self, pairs: I) -> ModelResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        pairs
            .into_iter()
            .try_for_each(|(attr, value)| self.set(attr.as_ref(), value))
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn kind(&self) -> &str {
        self.model.kind()
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Attach an identity. The key's leaf kind must be this entity's kind.
    pub fn set_key(&mut self, key: Key) -> ModelResult<()> {
        if key.kind() != self.kind() {
            return Err(ModelError::bad_argument(format!(
                "expected key of kind {}, got {}",
                self.kind(),
                key.kind()
            )));
        }
        self.key = Some(key);
        Ok(())
    }

    pub fn clear_key(&mut self) -> Option<Key> {
        self.key.take()
    }

    pub fn resource_id(&self) -> Option<String> {
        self.key.as_ref().map(Key::to_resource_id)
    }

    // ========== Attribute access ==========

    pub fn set(&mut self, attr: &str, value: impl Into<Value>) -> ModelResult<()> {
        let field = Arc::clone(self.model.attr(attr)?);
        field.set_value(self, value.into())
    }

    pub fn get(&self, attr: &str) -> ModelResult<Value> {
        Ok(self.model.attr(attr)?.get_value(self))
    }

    pub fn delete(&mut self, attr: &str) -> ModelResult<()> {
        let field = Arc::clone(self.model.attr(attr)?);
        field.delete_value(self);
        Ok(())
    }

    pub fn has_value(&self, attr: &str) -> ModelResult<bool> {
        Ok(self.model.attr(attr)?.has_value(self))
    }

    pub(crate) fn stored(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub(crate) fn stored_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.values.get_mut(name)
    }

    pub(crate) fn insert_stored(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub(crate) fn remove_stored(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    // ========== Persistence ==========

    /// Run every field's finalization step, recursing into nested entities.
    pub fn prepare_for_put(&mut self) -> ModelResult<()> {
        let model = Arc::clone(&self.model);
        model.fields().iter().try_for_each(|field| field.prepare_for_put(self))
    }

    /// Report every required field without a value, by dotted attribute path.
    pub fn check_initialized(&self) -> ValidationResult<()> {
        let mut issues = Vec::new();
        self.collect_missing("", &mut issues);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(issues))
        }
    }

    fn collect_missing(&self, prefix: &str, issues: &mut Vec<ValidationIssue>) {
        for field in self.model.fields() {
            let path = format!("{prefix}{}", field.code_name());
            let value = field.get_value(self);
            if field.is_required() && value.is_null() {
                issues.push(ValidationIssue::new(&path, "required", format!("{path} is required")));
            }
            let nested_prefix = format!("{path}{NAME_SEPARATOR}");
            match &value {
                Value::Entity(sub) => sub.collect_missing(&nested_prefix, issues),
                Value::List(items) => items
                    .iter()
                    .filter_map(Value::as_entity)
                    .for_each(|sub| sub.collect_missing(&nested_prefix, issues)),
                _ => {}
            }
        }
    }

    /// Finalize, check required fields, then write every present field into `sink`.
    pub fn put_into(&mut self, sink: &mut dyn CellSink) -> ModelResult<()> {
        self.prepare_for_put()?;
        self.check_initialized()?;
        self.serialize_into(sink)
    }

    /// Write every present field as base-typed cells.
    ///
    /// Nested fields use dotted names. Inside a repeated structured field every nested
    /// field writes one cell per element, null when unset, so the k-th cell of each name
    /// belongs to the k-th element.
    pub fn serialize_into(&self, sink: &mut dyn CellSink) -> ModelResult<()> {
        self.write_cells("", false, sink)
    }

    fn write_cells(&self, prefix: &str, aligned: bool, sink: &mut dyn CellSink) -> ModelResult<()> {
        for field in self.model.fields() {
            if !aligned && !field.has_value(self) {
                continue;
            }
            let name = format!("{prefix}{}", field.name());
            write_field_cells(field, &name, field.get_value(self), aligned, sink)?;
        }
        Ok(())
    }

    /// Rebuild an entity from backend cells, converting every value back to user form.
    pub fn load(model: &Arc<Model>, key: Option<Key>, source: &dyn CellSource) -> ModelResult<Self> {
        let mut entity = Self::new(model);
        if let Some(key) = key {
            entity.set_key(key)?;
        }
        let mut occurrences = HashMap::new();
        for cell in source.cells() {
            entity.load_cell(&cell.name, &cell.name, cell, false, &mut occurrences)?;
        }
        Ok(entity)
    }

    fn load_cell(
        &mut self,
        full_name: &str,
        path: &str,
        cell: &Cell,
        in_element: bool,
        occurrences: &mut HashMap<String, usize>,
    ) -> ModelResult<()> {
        let (head, rest) = match path.split_once(NAME_SEPARATOR) {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let unknown = || ModelError::UnknownAttribute {
            kind: self.kind().to_string(),
            attribute: full_name.to_string(),
        };
        let field = Arc::clone(self.model.field(head).ok_or_else(unknown)?);
        let Some(rest) = rest else {
            return self.load_leaf(&field, cell, in_element);
        };
        let nested = Arc::clone(field.nested_model().ok_or_else(unknown)?);
        // Null padding inside an element must not materialize nested entities.
        if in_element && !field.is_repeated() && cell.value.is_null() {
            return Ok(());
        }

        let slot = self.values.entry(field.name().to_string());
        let target = if field.is_repeated() {
            let counter = occurrences.entry(full_name.to_string()).or_default();
            let index = *counter;
            *counter += 1;

            let Value::List(items) = slot.or_insert_with(|| Value::List(Vec::new())) else {
                return Err(ModelError::internal(format!("repeated field {} holds a non-list", field.name())));
            };
            while items.len() <= index {
                items.push(Value::Entity(Box::new(Entity::new(&nested))));
            }
            &mut items[index]
        } else {
            let value = slot.or_insert(Value::Null);
            if !matches!(value, Value::Entity(_)) {
                *value = Value::Entity(Box::new(Entity::new(&nested)));
            }
            value
        };
        let Value::Entity(sub_entity) = target else {
            return Err(ModelError::internal(format!(
                "structured field {} did not yield exactly one entity",
                field.name()
            )));
        };
        sub_entity.load_cell(full_name, rest, cell, in_element || field.is_repeated(), occurrences)
    }

    fn load_leaf(&mut self, field: &FieldDef, cell: &Cell, in_element: bool) -> ModelResult<()> {
        if cell.meaning == Some(Meaning::EmptyList) {
            if field.is_repeated() {
                self.values
                    .entry(field.name().to_string())
                    .or_insert_with(|| Value::List(Vec::new()));
            }
            return Ok(());
        }
        if in_element && cell.value.is_null() {
            return Ok(());
        }

        let value = field.from_base_value(field.db_get_value(&cell.value)?)?;
        if !field.is_repeated() {
            self.values.insert(field.name().to_string(), value);
            return Ok(());
        }
        match self
            .values
            .entry(field.name().to_string())
            .or_insert_with(|| Value::List(Vec::new()))
        {
            Value::List(items) => {
                items.push(value);
                Ok(())
            }
            _ => Err(ModelError::internal(format!("repeated field {} holds a non-list", field.name()))),
        }
    }

    // ========== JSON ==========

    /// Attribute-name keyed JSON object of every field, defaults included.
    pub fn to_json(&self) -> ModelResult<JsonValue> {
        serde_json::to_value(self).map_err(|err| ModelError::internal(format!("cannot render {}: {err}", self.kind())))
    }

    /// Build an entity from a JSON object keyed by attribute name.
    pub fn from_json(model: &Arc<Model>, json: &JsonValue) -> ModelResult<Self> {
        let object = json.as_object().ok_or_else(|| {
            ModelError::bad_argument(format!("{} must be built from a JSON object, got {json}", model.kind()))
        })?;
        let mut entity = Self::new(model);
        for (attr, raw) in object {
            let field = Arc::clone(model.attr(attr)?);
            let value = if field.is_repeated() {
                match raw {
                    JsonValue::Null => continue,
                    JsonValue::Array(items) => Value::List(
                        items
                            .iter()
                            .map(|item| json_to_value(&field, item))
                            .collect::<ModelResult<Vec<_>>>()?,
                    ),
                    other => {
                        return Err(ModelError::bad_value(field.label(), format!("expected JSON array, got {other}")));
                    }
                }
            } else {
                json_to_value(&field, raw)?
            };
            field.set_value(&mut entity, value)?;
        }
        Ok(entity)
    }
}

fn json_to_value(field: &FieldDef, json: &JsonValue) -> ModelResult<Value> {
    value_from_json(field.name(), field.field_type(), field.nested_model(), json)
}

fn write_field_cells(
    field: &FieldDef,
    name: &str,
    value: Value,
    aligned: bool,
    sink: &mut dyn CellSink,
) -> ModelResult<()> {
    let nested_prefix = format!("{name}{NAME_SEPARATOR}");
    match value {
        Value::List(items) if field.is_repeated() => {
            if items.is_empty() {
                if field.writes_empty_list() {
                    sink.write(name, CellValue::Null, Some(Meaning::EmptyList))?;
                }
                return Ok(());
            }
            for item in items {
                match (field.nested_model(), item) {
                    (Some(_), Value::Entity(sub)) => sub.write_cells(&nested_prefix, true, sink)?,
                    (Some(nested), _) => write_null_cells(nested, &nested_prefix, sink)?,
                    (None, item) => write_scalar(field, name, item, sink)?,
                }
            }
            Ok(())
        }
        Value::Entity(sub) => sub.write_cells(&nested_prefix, aligned, sink),
        Value::Null if aligned && field.field_type() == FieldType::Structured => match field.nested_model() {
            Some(nested) => write_null_cells(nested, &nested_prefix, sink),
            None => Ok(()),
        },
        value => write_scalar(field, name, value, sink),
    }
}

fn write_scalar(field: &FieldDef, name: &str, value: Value, sink: &mut dyn CellSink) -> ModelResult<()> {
    let base = field.to_base_value(value)?;
    let (cell, meaning) = field.db_set_value(&base)?;
    sink.write(name, cell, meaning)
}

fn write_null_cells(model: &Model, prefix: &str, sink: &mut dyn CellSink) -> ModelResult<()> {
    for field in model.fields() {
        let name = format!("{prefix}{}", field.name());
        match field.nested_model() {
            Some(nested) => write_null_cells(nested, &format!("{name}{NAME_SEPARATOR}"), sink)?,
            None => sink.write(&name, CellValue::Null, None)?,
        }
    }
    Ok(())
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.key == other.key && self.values == other.values
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.kind())
            .field("key", &self.key)
            .field("values", &self.values)
            .finish()
    }
}

impl Serialize for Entity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.model.fields().len()))?;
        for field in self.model.fields() {
            map.serialize_entry(field.code_name(), &field.get_value(self))?;
        }
        map.end()
    }
}
