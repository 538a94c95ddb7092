//! Probe collections keyed by solution component.
//!
//! A solver with several unknowns (e.g. velocity components and pressure)
//! usually probes each one at the same points. [`ProbeDict`] keeps one
//! [`ProbeCollection`] per component name and probes them together.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::collection::{EvalReport, ProbeCollection};
use crate::error::{ProbeError, Result};
use crate::field::Field;
use crate::sink::ProbeSink;

/// Named probe collections in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ProbeDict {
    collections: IndexMap<String, ProbeCollection>,
}

impl ProbeDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the collection for `name`.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        collection: ProbeCollection,
    ) -> Option<ProbeCollection> {
        self.collections.insert(name.into(), collection)
    }

    pub fn get(&self, name: &str) -> Option<&ProbeCollection> {
        self.collections.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ProbeCollection> {
        self.collections.get_mut(name)
    }

    /// Component names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Evaluate every collection with the field of the same name.
    ///
    /// All fields are looked up before anything is evaluated, so a missing
    /// field leaves every collection untouched. If a component fails to
    /// evaluate, the entries already appended to earlier components are
    /// erased again, so every collection keeps the same evaluation count.
    pub fn probe<F>(
        &mut self,
        fields: &IndexMap<String, F>,
    ) -> Result<IndexMap<String, EvalReport>>
    where
        F: Field,
    {
        if let Some(name) = self.names().find(|name| !fields.contains_key(*name)) {
            return Err(ProbeError::FieldNotFound(name.to_string()));
        }

        let mut reports = IndexMap::with_capacity(self.collections.len());
        let mut failure = None;
        for (name, collection) in &mut self.collections {
            let result = fields
                .get(name)
                .ok_or_else(|| ProbeError::FieldNotFound(name.clone()))
                .and_then(|field| collection.eval(field));
            match result {
                Ok(report) => {
                    reports.insert(name.clone(), report);
                }
                Err(e) => {
                    failure = Some((name.clone(), e));
                    break;
                }
            }
        }

        if let Some((failed, e)) = failure {
            for collection in self.collections.values_mut().take(reports.len()) {
                collection.erase_snapshot(collection.number_of_evaluations() - 1)?;
            }
            warn!(
                component = %failed,
                rolled_back = reports.len(),
                "component evaluation failed, earlier components rolled back"
            );
            return Err(e);
        }
        debug!(components = reports.len(), "probe dict evaluated");
        Ok(reports)
    }

    /// Dump every component's full history to a destination named after it.
    pub fn dump<S>(&self, sink: &mut S) -> Result<()>
    where
        S: ProbeSink + ?Sized,
    {
        for (name, collection) in &self.collections {
            collection.dump_all(name, sink)?;
        }
        Ok(())
    }

    /// Clear every collection.
    pub fn clear(&mut self) {
        for collection in self.collections.values_mut() {
            collection.clear();
        }
    }
}
