// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Component Registry
//!
//! Maps the class-path strings a declarative config names to factory
//! functions that build components from resolved constructor parameters.
//! Hosts register their component constructors once at startup; the
//! pipeline runner looks them up while binding a config.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use weir_domain::component::Component;
use weir_domain::error::PipelineError;

/// Factory building one component from resolved constructor parameters.
pub type ComponentFactory =
    Arc<dyn Fn(&Map<String, Value>) -> Result<Arc<dyn Component>, PipelineError> + Send + Sync>;

/// Registry for all pipeline components available to config binding.
#[derive(Default, Clone)]
pub struct ComponentRegistry {
    factories: HashMap<String, ComponentFactory>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component factory under a class-path key.
    pub fn register<F>(&mut self, class_path: impl Into<String>, factory: F)
    where
        F: Fn(&Map<String, Value>) -> Result<Arc<dyn Component>, PipelineError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(class_path.into(), Arc::new(factory));
    }

    /// Build a component by class path.
    pub fn build(
        &self,
        class_path: &str,
        params: &Map<String, Value>,
    ) -> Result<Arc<dyn Component>, PipelineError> {
        let factory = self.factories.get(class_path).ok_or_else(|| {
            let mut available: Vec<_> = self.factories.keys().cloned().collect();
            available.sort();
            PipelineError::component_not_found(format!(
                "Unknown component class '{class_path}'. Available: {available:?}"
            ))
        })?;
        factory(params)
    }

    pub fn contains(&self, class_path: &str) -> bool {
        self.factories.contains_key(class_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use weir_domain::component::{ComponentDescriptor, ComponentInput, ComponentOutput};

    struct NullComponent;

    #[async_trait]
    impl Component for NullComponent {
        fn descriptor(&self) -> ComponentDescriptor {
            ComponentDescriptor::builder().build()
        }
        async fn run(&self, _input: ComponentInput) -> Result<ComponentOutput, PipelineError> {
            Ok(ComponentOutput::default())
        }
    }

    #[test]
    fn registered_factories_are_looked_up_by_class_path() {
        let mut registry = ComponentRegistry::new();
        registry.register("weir.components.Null", |_params| {
            Ok(Arc::new(NullComponent) as Arc<dyn Component>)
        });
        assert!(registry.contains("weir.components.Null"));
        assert!(registry.build("weir.components.Null", &Map::new()).is_ok());
    }

    #[test]
    fn unknown_class_path_lists_available_components() {
        let mut registry = ComponentRegistry::new();
        registry.register("known", |_| Ok(Arc::new(NullComponent) as Arc<dyn Component>));
        let err = registry.build("unknown", &Map::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("unknown") && message.contains("known"));
    }
}
