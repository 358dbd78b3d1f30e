use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{BackendError, RegistryError};
use crate::model::{ActionKind, Params};

/// Handler for an extension action type: receives the action params and
/// returns optional result data.
pub type ActionHandler = Arc<dyn Fn(&Params) -> Result<Option<Params>, BackendError> + Send + Sync>;

struct Entry {
    handler: ActionHandler,
    owner: String,
}

/// Extension point for action types beyond the built-in primitives.
///
/// The engine consults the registry at dispatch time for any non-primitive
/// type; loaders register handlers here without the engine knowing about them.
#[derive(Default)]
pub struct ActionRegistry {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.list_actions())
            .finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `action_type` on behalf of `owner`.
    ///
    /// Built-in primitive types and already-registered types are rejected.
    pub fn register_action<F>(
        &self,
        action_type: &str,
        owner: &str,
        handler: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&Params) -> Result<Option<Params>, BackendError> + Send + Sync + 'static,
    {
        if ActionKind::is_primitive(action_type) {
            return Err(RegistryError::BuiltIn(action_type.to_string()));
        }
        let mut entries = self.entries.write();
        if entries.contains_key(action_type) {
            return Err(RegistryError::AlreadyRegistered(action_type.to_string()));
        }
        entries.insert(
            action_type.to_string(),
            Entry {
                handler: Arc::new(handler),
                owner: owner.to_string(),
            },
        );
        info!(target: "autotool::registry", %action_type, %owner, "Action registered");
        Ok(())
    }

    pub fn unregister_action(&self, action_type: &str) -> bool {
        self.entries.write().remove(action_type).is_some()
    }

    /// Drop every handler registered by `owner`; returns how many were removed.
    pub fn remove_owner(&self, owner: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.owner != owner);
        let removed = before - entries.len();
        debug!(target: "autotool::registry", %owner, removed, "Owner handlers removed");
        removed
    }

    pub fn get(&self, action_type: &str) -> Option<ActionHandler> {
        self.entries
            .read()
            .get(action_type)
            .map(|e| Arc::clone(&e.handler))
    }

    pub fn contains(&self, action_type: &str) -> bool {
        self.entries.read().contains_key(action_type)
    }

    pub fn list_actions(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}
