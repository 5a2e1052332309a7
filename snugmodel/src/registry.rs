use crate::model::Model;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

static REGISTRY: OnceLock<RwLock<HashMap<String, Arc<Model>>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<String, Arc<Model>>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register a model under its kind, returning the model it replaced.
pub fn register_model(model: &Arc<Model>) -> Option<Arc<Model>> {
    let previous = registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(model.kind().to_string(), Arc::clone(model));
    if previous.is_some() {
        log::debug!("replaced registered model {}", model.kind());
    } else {
        log::debug!("registered model {}", model.kind());
    }
    previous
}

pub fn get_model(kind: &str) -> Option<Arc<Model>> {
    registry().read().unwrap_or_else(PoisonError::into_inner).get(kind).cloned()
}

/// Registered kinds, sorted.
pub fn registered_kinds() -> Vec<String> {
    let mut kinds: Vec<String> = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .cloned()
        .collect();
    kinds.sort();
    kinds
}
