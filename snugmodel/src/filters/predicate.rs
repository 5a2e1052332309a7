use std::fmt;

use crate::{
    entity::Entity,
    errors::{ModelError, ModelResult},
    field::NAME_SEPARATOR,
    filters::{FilterNode, FilterOp},
    value::Value,
};

/// Post-filter for equality queries on a repeated structured field.
///
/// An index lookup on `addresses.city = X AND addresses.zip = Y` also returns entities
/// where one address matches the city and another the zip. The predicate keeps only
/// entities with a single element satisfying every condition.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatedStructuredPredicate {
    field: String,
    conditions: Vec<(String, Value)>,
}

impl RepeatedStructuredPredicate {
    /// Collect the equality leaves under `field`, with paths relative to each element.
    pub fn from_conditions(field: &str, filters: &[FilterNode]) -> Self {
        let prefix = format!("{field}{NAME_SEPARATOR}");
        let conditions = filters
            .iter()
            .flat_map(FilterNode::comparisons)
            .filter(|(_, op, _)| *op == FilterOp::Eq)
            .filter_map(|(name, _, value)| {
                name.strip_prefix(&prefix)
                    .map(|relative| (relative.to_string(), value.clone()))
            })
            .collect();
        Self {
            field: field.to_string(),
            conditions,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Element-relative paths and the base values they must equal.
    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    /// True when some element of the repeated field satisfies every condition.
    pub fn apply(&self, entity: &Entity) -> ModelResult<bool> {
        let field = entity.model().field(&self.field).ok_or_else(|| {
            ModelError::internal(format!("model {} has no field {}", entity.kind(), self.field))
        })?;
        let Value::List(elements) = field.get_value(entity) else {
            return Err(ModelError::internal(format!("field {} is not repeated", self.field)));
        };

        for element in &elements {
            let Value::Entity(element) = element else {
                continue;
            };
            if self.matches_element(element)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn matches_element(&self, element: &Entity) -> ModelResult<bool> {
        for (path, expected) in &self.conditions {
            if !resolve_base_values(element, path)?.contains(expected) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Base values found at `path` inside `entity`, descending through single structured fields.
fn resolve_base_values(entity: &Entity, path: &str) -> ModelResult<Vec<Value>> {
    let (head, rest) = match path.split_once(NAME_SEPARATOR) {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let field = entity
        .model()
        .field(head)
        .ok_or_else(|| ModelError::internal(format!("model {} has no field {head}", entity.kind())))?;

    let Some(rest) = rest else {
        return field.base_values(entity);
    };
    match field.get_value(entity) {
        Value::Null => Ok(Vec::new()),
        Value::Entity(nested) => resolve_base_values(&nested, rest),
        other => Err(ModelError::internal(format!(
            "expected exactly one {head} entity while resolving {path}, got {}",
            other.type_name()
        ))),
    }
}

impl fmt::Display for RepeatedStructuredPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ANY {}(", self.field)?;
        for (index, (path, value)) in self.conditions.iter().enumerate() {
            if index > 0 {
                f.write_str(" AND ")?;
            }
            let rendered = serde_json::to_string(value).map_err(|_| fmt::Error)?;
            write!(f, "{path} = {rendered}")?;
        }
        f.write_str(")")
    }
}
