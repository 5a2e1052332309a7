//! Entity types: an ordered, named set of field descriptors.

use std::{collections::HashMap, sync::Arc};

use crate::{
    entity::Entity,
    errors::{ModelError, ModelResult},
    field::{FieldBuilder, FieldDef, NAME_SEPARATOR, RESERVED_KEY_NAME},
    keys,
};

/// Prefix reserved for instance-internal attributes.
pub const INTERNAL_PREFIX: char = '_';

/// A declared field, built or still pending.
#[derive(Debug)]
pub enum FieldDecl {
    Builder(FieldBuilder),
    Built(FieldDef),
}

impl From<FieldBuilder> for FieldDecl {
    fn from(builder: FieldBuilder) -> Self {
        FieldDecl::Builder(builder)
    }
}

impl From<FieldDef> for FieldDecl {
    fn from(field: FieldDef) -> Self {
        FieldDecl::Built(field)
    }
}

/// An entity type. Immutable once built and shared behind `Arc`.
#[derive(Debug)]
pub struct Model {
    kind: String,
    fields: Vec<Arc<FieldDef>>,
    by_name: HashMap<String, usize>,
    has_repeated: bool,
}

impl Model {
    pub fn builder(kind: impl Into<String>) -> ModelBuilder {
        ModelBuilder {
            kind: kind.into(),
            fields: Vec::new(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Arc<FieldDef>] {
        &self.fields
    }

    /// Field by storage name.
    pub fn field(&self, name: &str) -> Option<&Arc<FieldDef>> {
        self.by_name.get(name).map(|index| &self.fields[*index])
    }

    /// Field by declaring attribute name.
    ///
    /// Tries the storage-name map first and accepts the hit only when its attribute name
    /// matches; otherwise scans the fields for a matching attribute name.
    pub fn find_field(&self, attr: &str) -> Option<&Arc<FieldDef>> {
        match self.field(attr) {
            Some(field) if field.code_name() == attr => Some(field),
            _ => self.fields.iter().find(|field| field.code_name() == attr),
        }
    }

    /// Like [`Model::find_field`], failing with `UnknownAttribute`.
    pub fn attr(&self, attr: &str) -> ModelResult<&Arc<FieldDef>> {
        self.find_field(attr).ok_or_else(|| ModelError::UnknownAttribute {
            kind: self.kind.clone(),
            attribute: attr.to_string(),
        })
    }

    /// True when any field is repeated, directly or through a structured field.
    pub fn has_repeated(&self) -> bool {
        self.has_repeated
    }

    /// Resolve a dotted attribute path such as `address.geo.lat` to a (sub-)field.
    pub fn resolve_path(&self, path: &str) -> ModelResult<Arc<FieldDef>> {
        let mut parts = path.split(NAME_SEPARATOR);
        let head = parts.next().unwrap_or_default();
        let mut field = Arc::clone(self.attr(head)?);
        for part in parts {
            field = field.sub(part)?;
        }
        Ok(field)
    }

    pub fn new_entity(self: &Arc<Self>) -> Entity {
        Entity::new(self)
    }
}

#[derive(Debug)]
pub struct ModelBuilder {
    kind: String,
    fields: Vec<(String, FieldDecl)>,
}

impl ModelBuilder {
    /// Declare a field under its attribute name.
    pub fn field(mut self, code_name: impl Into<String>, field: impl Into<FieldDecl>) -> Self {
        self.fields.push((code_name.into(), field.into()));
        self
    }

    pub fn build(self) -> ModelResult<Arc<Model>> {
        let kind = self.kind;
        if kind.is_empty() {
            return Err(ModelError::config("model kind cannot be empty"));
        }
        if kind.bytes().any(keys::is_reserved_byte) {
            return Err(ModelError::config(format!("model kind {kind:?} contains a reserved control byte")));
        }

        let mut fields = Vec::with_capacity(self.fields.len());
        let mut by_name = HashMap::new();
        let mut has_repeated = false;

        for (code_name, decl) in self.fields {
            if code_name.starts_with(INTERNAL_PREFIX) {
                return Err(ModelError::config(format!(
                    "model {kind}: attribute {code_name} cannot begin with an underscore; \
                     underscore-prefixed names are reserved for instance internals"
                )));
            }
            if code_name == RESERVED_KEY_NAME {
                return Err(ModelError::config(format!(
                    "model {kind}: attribute {code_name} is reserved for the entity key"
                )));
            }
            if fields.iter().any(|field: &Arc<FieldDef>| field.code_name() == code_name) {
                return Err(ModelError::config(format!("model {kind}: duplicate attribute {code_name}")));
            }

            let mut field = match decl {
                FieldDecl::Builder(builder) => builder.build()?,
                FieldDecl::Built(field) => field,
            };
            field.fix_up(&code_name)?;
            if by_name.contains_key(field.name()) {
                return Err(ModelError::config(format!(
                    "model {kind}: duplicate storage name {}",
                    field.name()
                )));
            }

            has_repeated |= field.is_repeated() || field.nested_model().is_some_and(|nested| nested.has_repeated());
            by_name.insert(field.name().to_string(), fields.len());
            fields.push(Arc::new(field));
        }

        log::debug!("built model {kind} with {} fields (has_repeated={has_repeated})", fields.len());
        Ok(Arc::new(Model {
            kind,
            fields,
            by_name,
            has_repeated,
        }))
    }
}
