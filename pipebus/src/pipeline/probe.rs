//! Probe contexts for pipe diagnostics.

use serde_json::{Map, Value};

/// Collects a description of a pipe graph.
#[derive(Debug, Default, Clone)]
pub struct ProbeContext {
    scopes: Vec<ProbeScope>,
}

/// The description of one filter, possibly containing a nested pipe.
#[derive(Debug, Clone)]
pub struct ProbeScope {
    name: String,
    properties: Map<String, Value>,
    inner: Option<ProbeContext>,
}

impl ProbeContext {
    /// Creates an empty probe context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a scope for a filter and returns it for decoration.
    pub fn create_scope(&mut self, name: impl Into<String>) -> &mut ProbeScope {
        self.scopes.push(ProbeScope {
            name: name.into(),
            properties: Map::new(),
            inner: None,
        });
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Returns the filter names in pipe order.
    #[must_use]
    pub fn filter_names(&self) -> Vec<&str> {
        self.scopes.iter().map(|s| s.name.as_str()).collect()
    }

    /// Returns the scopes in pipe order.
    #[must_use]
    pub fn scopes(&self) -> &[ProbeScope] {
        &self.scopes
    }

    /// Renders the probe as JSON.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Array(self.scopes.iter().map(ProbeScope::to_json).collect())
    }
}

impl ProbeScope {
    /// Adds a property.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Opens a nested probe context for an inner pipe.
    pub fn inner(&mut self) -> &mut ProbeContext {
        self.inner.get_or_insert_with(ProbeContext::new)
    }

    /// The filter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up a property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// The nested probe context, if any.
    #[must_use]
    pub fn inner_probe(&self) -> Option<&ProbeContext> {
        self.inner.as_ref()
    }

    fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("filter".to_string(), Value::String(self.name.clone()));
        for (k, v) in &self.properties {
            map.insert(k.clone(), v.clone());
        }
        if let Some(inner) = &self.inner {
            map.insert("pipe".to_string(), inner.to_json());
        }
        Value::Object(map)
    }
}
