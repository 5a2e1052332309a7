//! Structured fields: a field whose value is itself an entity, or a list of entities.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use crate::{
    entity::Entity,
    errors::{ModelError, ModelResult},
    field::{FieldDef, NAME_SEPARATOR},
    filters::{FilterNode, FilterOp, RepeatedStructuredPredicate},
    model::Model,
    pipeline::{Layer, Stage},
    value::Value,
};

/// Nested model of a structured field plus its memoized sub-field copies.
#[derive(Debug)]
pub(crate) struct StructuredSpec {
    model: Arc<Model>,
    subfields: RwLock<HashMap<String, Arc<FieldDef>>>,
}

impl StructuredSpec {
    pub(crate) fn new(model: Arc<Model>) -> Self {
        Self {
            model,
            subfields: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn model(&self) -> &Arc<Model> {
        &self.model
    }
}

pub struct StructuredLayer;

impl Layer for StructuredLayer {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn stages(&self) -> &'static [Stage] {
        &[Stage::Validate]
    }

    fn validate(&self, field: &FieldDef, value: Value) -> ModelResult<Value> {
        let model = field
            .nested_model()
            .ok_or_else(|| ModelError::internal(format!("structured field {} has no model", field.name())))?;
        match value {
            Value::Entity(entity) if entity.kind() == model.kind() => Ok(Value::Entity(entity)),
            Value::Json(json) if json.is_object() => Ok(Value::Entity(Box::new(Entity::from_json(model, &json)?))),
            other => Err(ModelError::bad_value(
                field.label(),
                format!("expected {} instance, got {}", model.kind(), describe(&other)),
            )),
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Entity(entity) => format!("{} instance", entity.kind()),
        other => other.type_name().to_string(),
    }
}

impl FieldDef {
    /// Resolve a sub-field of a structured field by attribute name.
    ///
    /// The result is a copy of the nested field renamed to `"<this>.<nested>"`. Copies are
    /// memoized, so repeated lookups of the same name return the same `Arc`.
    pub fn sub(&self, attr: &str) -> ModelResult<Arc<FieldDef>> {
        let spec = self
            .structured_spec()
            .ok_or_else(|| ModelError::bad_argument(format!("field {} is not a structured field", self.name())))?;
        if self.name().is_empty() {
            return Err(ModelError::config("sub-fields need a bound structured field"));
        }
        if let Some(hit) = spec.subfields.read().unwrap_or_else(PoisonError::into_inner).get(attr) {
            return Ok(Arc::clone(hit));
        }

        let nested = spec.model.find_field(attr).ok_or_else(|| ModelError::UnknownAttribute {
            kind: spec.model.kind().to_string(),
            attribute: attr.to_string(),
        })?;
        let copy = Arc::new(nested.renamed(format!("{}{NAME_SEPARATOR}{}", self.name(), nested.name())));

        let mut cache = spec.subfields.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(attr.to_string()).or_insert(copy)))
    }

    /// Equality filter on a structured field, decomposed into one condition per set sub-field.
    pub(crate) fn structured_comparison(&self, op: FilterOp, value: Value) -> ModelResult<FilterNode> {
        if op != FilterOp::Eq {
            return Err(ModelError::bad_filter("structured field filters can only use ="));
        }
        if !self.is_indexed() {
            return Err(ModelError::bad_filter(format!(
                "cannot query for unindexed structured field {}",
                self.name()
            )));
        }
        if value.is_null() {
            return Ok(FilterNode::compare(self.name().to_string(), op, value));
        }

        let value = self.do_validate(value)?;
        let value = self.to_base_value(value)?;
        let Value::Entity(sub_entity) = value else {
            return Err(ModelError::internal(format!(
                "structured field {} did not produce an entity",
                self.name()
            )));
        };

        let mut filters = Vec::new();
        for nested in sub_entity.model().fields() {
            let nested_value = nested.get_value(&sub_entity);
            if nested.is_repeated() {
                if nested_value.as_list().is_some_and(|items| !items.is_empty()) {
                    return Err(ModelError::bad_filter(format!(
                        "cannot query for non-empty repeated field {}",
                        nested.name()
                    )));
                }
                continue;
            }
            if nested_value.is_null() {
                continue;
            }
            let alt = self.sub(nested.code_name())?;
            match alt.comparison(op, nested_value)? {
                FilterNode::And(inner) => filters.extend(inner),
                filter => filters.push(filter),
            }
        }

        if filters.is_empty() {
            return Err(ModelError::bad_filter(format!(
                "structured field filter on {} without any values",
                self.name()
            )));
        }
        if filters.len() == 1 {
            return Ok(filters.remove(0));
        }
        if self.is_repeated() {
            let predicate = RepeatedStructuredPredicate::from_conditions(self.name(), &filters);
            filters.push(FilterNode::PostFilter(predicate));
        }
        Ok(FilterNode::And(filters))
    }

    /// Finalize every present nested entity.
    pub(crate) fn prepare_nested_for_put(&self, entity: &mut Entity) -> ModelResult<()> {
        let Some(stored) = entity.stored_mut(self.name()) else {
            return Ok(());
        };
        match stored {
            Value::Entity(sub_entity) => sub_entity.prepare_for_put(),
            Value::List(items) => items.iter_mut().try_for_each(|item| match item {
                Value::Entity(sub_entity) => sub_entity.prepare_for_put(),
                _ => Ok(()),
            }),
            _ => Ok(()),
        }
    }
}
