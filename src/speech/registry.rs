//! Page activation registry.
//!
//! Many screens can be mounted at once; at most one of them may produce
//! audible speech. The registry tracks which pages exist and which single
//! one is active, with pure transitions so the UI layer only ever calls
//! register/activate/cleanup and stays decoupled from focus-event details.

use std::collections::HashSet;
use tracing::warn;

#[derive(Debug, Default)]
pub struct PageRegistry {
    registered: HashSet<String>,
    active: Option<String>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page. Idempotent.
    pub fn register(&mut self, page_id: &str) {
        self.registered.insert(page_id.to_string());
    }

    /// Mark a registered page as the single active one. Activation of an
    /// unregistered id is ignored with a warning.
    pub fn set_active(&mut self, page_id: &str) {
        if !self.registered.contains(page_id) {
            warn!(page_id, "set_active on unregistered page, ignoring");
            return;
        }
        self.active = Some(page_id.to_string());
    }

    /// Deregister a page, clearing the active slot if it held it.
    pub fn cleanup(&mut self, page_id: &str) {
        self.registered.remove(page_id);
        if self.active.as_deref() == Some(page_id) {
            self.active = None;
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn is_active(&self, page_id: &str) -> bool {
        self.active.as_deref() == Some(page_id)
    }

    pub fn is_registered(&self, page_id: &str) -> bool {
        self.registered.contains(page_id)
    }
}
