//! Backend type registry.
use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::Settings;
use crate::encryption::Encryption;
use crate::types::diagnostics::{DiagClass, Diagnostic, Diagnostics};

use super::local::LocalBackend;
use super::Backend;

/// Everything a factory needs to configure a backend instance.
pub struct BackendInit<'a> {
    pub type_name: &'a str,
    pub config: &'a Value,
    pub settings: &'a Settings,
    pub encryption: Arc<dyn Encryption>,
}

pub type BackendFactory =
    Arc<dyn Fn(&BackendInit<'_>) -> Result<Arc<dyn Backend>, Diagnostics> + Send + Sync>;

fn local_factory(init: &BackendInit<'_>) -> Result<Arc<dyn Backend>, Diagnostics> {
    LocalBackend::from_init(init).map(|b| Arc::new(b) as Arc<dyn Backend>)
}

/// Maps backend type names to factories.
#[derive(Clone)]
pub struct Registry {
    factories: BTreeMap<String, BackendFactory>,
}

impl Default for Registry {
    /// Built-in backends only.
    fn default() -> Self {
        let mut r = Self::empty();
        r.register("local", Arc::new(local_factory));
        r
    }
}

impl Registry {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Add or replace the factory for `type_name`.
    pub fn register(&mut self, type_name: &str, factory: BackendFactory) {
        self.factories.insert(type_name.to_string(), factory);
    }

    #[must_use]
    pub fn with(mut self, type_name: &str, factory: BackendFactory) -> Self {
        self.register(type_name, factory);
        self
    }

    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Construct a configured backend.
    ///
    /// # Errors
    /// Returns a configuration diagnostic for unknown types, or whatever
    /// the factory reports.
    pub fn init(&self, init: &BackendInit<'_>) -> Result<Arc<dyn Backend>, Diagnostics> {
        let Some(f) = self.factories.get(init.type_name) else {
            let known: Vec<&str> = self.types().collect();
            return Err(Diagnostics::new().with(Diagnostic::error(
                DiagClass::Configuration,
                "Unsupported backend type",
                format!(
                    "There is no backend type named \"{}\". Available backend types: {}.",
                    init.type_name,
                    known.join(", ")
                ),
            )));
        };
        f(init)
    }
}
