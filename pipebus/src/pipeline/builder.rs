//! Pipe builder with validation.

use super::{Filter, FilterPipe, Pipe};
use crate::context::PipeContext;
use crate::errors::{ConfigurationError, ConfigurationIssue};
use std::sync::Arc;

/// Describes how to contribute filters to a pipe.
///
/// Specifications are validated together before any filter is created, so a
/// misconfigured pipe never gets built.
pub trait FilterSpecification<C: PipeContext>: Send + Sync {
    /// Returns configuration issues, if any.
    fn validate(&self) -> Vec<ConfigurationIssue> {
        Vec::new()
    }

    /// Appends this specification's filters.
    fn apply(&self, filters: &mut Vec<Arc<dyn Filter<C>>>);
}

struct FilterInstance<C: PipeContext> {
    filter: Arc<dyn Filter<C>>,
}

impl<C: PipeContext> FilterSpecification<C> for FilterInstance<C> {
    fn apply(&self, filters: &mut Vec<Arc<dyn Filter<C>>>) {
        filters.push(self.filter.clone());
    }
}

/// Builder for creating validated pipes.
pub struct PipeBuilder<C: PipeContext> {
    name: String,
    specifications: Vec<Box<dyn FilterSpecification<C>>>,
}

impl<C: PipeContext + 'static> PipeBuilder<C> {
    /// Creates a new pipe builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            specifications: Vec::new(),
        }
    }

    /// Adds a filter instance.
    #[must_use]
    pub fn filter(mut self, filter: impl Filter<C> + 'static) -> Self {
        self.add_filter(Arc::new(filter));
        self
    }

    /// Adds a shared filter instance.
    pub fn add_filter(&mut self, filter: Arc<dyn Filter<C>>) {
        self.specifications.push(Box::new(FilterInstance { filter }));
    }

    /// Adds a filter specification.
    #[must_use]
    pub fn specification(mut self, spec: impl FilterSpecification<C> + 'static) -> Self {
        self.specifications.push(Box::new(spec));
        self
    }

    /// Returns the number of specifications added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specifications.len()
    }

    /// Returns true if nothing has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specifications.is_empty()
    }

    /// Validates every specification and composes the pipe.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` listing every issue reported by the
    /// specifications.
    pub fn build(self) -> Result<Arc<dyn Pipe<C>>, ConfigurationError> {
        let issues: Vec<ConfigurationIssue> = self
            .specifications
            .iter()
            .flat_map(|spec| spec.validate())
            .collect();

        if let Some(err) = ConfigurationError::from_issues(&format!("Pipe '{}'", self.name), issues) {
            return Err(err);
        }

        let mut filters = Vec::with_capacity(self.specifications.len());
        for spec in &self.specifications {
            spec.apply(&mut filters);
        }

        tracing::debug!(pipe = %self.name, filters = filters.len(), "Pipe built");
        Ok(FilterPipe::compose(filters))
    }
}

impl<C: PipeContext> std::fmt::Debug for PipeBuilder<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeBuilder")
            .field("name", &self.name)
            .field("specifications", &self.specifications.len())
            .finish()
    }
}
