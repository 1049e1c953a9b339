//! Named plugin registry with ordered, filterable resolution.
//!
//! Plugins are reusable steps registered once at process setup and selected
//! per handler: an include filter (`*` or an explicit ordered name list,
//! with nested groups resolved as one parallel position) and an exclusion
//! list. The registry is an injectable instance, not a module-level
//! singleton; concurrent invocations read it simultaneously while
//! registration is expected to happen before traffic.

use crate::steps::{Step, StepFn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// The reserved plugin name, remapped on registration.
pub const RESERVED_PLUGIN_NAME: &str = "plugin";

/// One entry of an include filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginSelector {
    /// A single registered plugin by name. The name `"*"` in the first
    /// position selects every registered plugin in registration order.
    Name(String),

    /// Several registered plugins resolved as one parallel group.
    Group(Vec<String>),
}

impl PluginSelector {
    /// Creates a name selector.
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Creates a group selector.
    #[must_use]
    pub fn group<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Group(names.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for PluginSelector {
    fn from(name: &str) -> Self {
        Self::name(name)
    }
}

#[derive(Default)]
struct RegistryInner {
    steps: HashMap<String, Step>,
    order: Vec<String>,
}

/// Registry of named reusable steps.
#[derive(Default)]
pub struct PluginRegistry {
    inner: RwLock<RegistryInner>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a step under a name, returning the effective name.
    ///
    /// The reserved name is remapped to a synthetic unique one. Duplicate
    /// names overwrite the stored step (idempotent re-import) while keeping
    /// the original position in registration order.
    pub fn register(&self, name: impl Into<String>, step: Step) -> String {
        let mut inner = self.inner.write();
        let mut name = name.into();
        if name.trim().eq_ignore_ascii_case(RESERVED_PLUGIN_NAME) {
            name = format!("plugin_{}", inner.steps.len());
        }
        if !inner.steps.contains_key(&name) {
            inner.order.push(name.clone());
        }
        inner.steps.insert(name.clone(), step);
        name
    }

    /// Resolves the ordered step list for one pipeline.
    ///
    /// With no filter, or a filter whose first selector is `"*"`, every
    /// registered step is returned in registration order. An explicit
    /// filter is followed in its own order: names not registered are
    /// skipped, group selectors become a single parallel position.
    /// Excluded names are omitted in both modes, including inside groups.
    #[must_use]
    pub fn resolve(
        &self,
        filter: Option<&[PluginSelector]>,
        excludes: &[String],
    ) -> Vec<Step> {
        let inner = self.inner.read();
        let excluded = |name: &str| excludes.iter().any(|e| e == name);

        let all_mode = match filter {
            None => true,
            Some(selectors) => {
                matches!(selectors.first(), Some(PluginSelector::Name(n)) if n == "*")
            }
        };

        if all_mode {
            return inner
                .order
                .iter()
                .filter(|name| !excluded(name))
                .filter_map(|name| inner.steps.get(name).cloned())
                .collect();
        }

        let mut resolved = Vec::new();
        for selector in filter.unwrap_or(&[]) {
            match selector {
                PluginSelector::Name(name) => {
                    if excluded(name) {
                        continue;
                    }
                    match inner.steps.get(name) {
                        Some(step) => resolved.push(step.clone()),
                        None => debug!(plugin = %name, "filter names unknown plugin"),
                    }
                }
                PluginSelector::Group(names) => {
                    let mut members: Vec<Arc<dyn StepFn>> = Vec::new();
                    for name in names {
                        if excluded(name) {
                            continue;
                        }
                        match inner.steps.get(name) {
                            Some(Step::Function(f)) => members.push(f.clone()),
                            Some(Step::Parallel(inner_members)) => {
                                members.extend(inner_members.iter().cloned());
                            }
                            Some(Step::Merge(_)) => {
                                debug!(plugin = %name, "merge plugin dropped from group selector");
                            }
                            None => debug!(plugin = %name, "group selector names unknown plugin"),
                        }
                    }
                    if !members.is_empty() {
                        resolved.push(Step::Parallel(members));
                    }
                }
            }
        }
        resolved
    }

    /// Returns the registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    /// Returns the number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().steps.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().steps.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("names", &self.names())
            .finish()
    }
}
