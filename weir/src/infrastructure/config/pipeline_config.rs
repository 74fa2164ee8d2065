// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Configuration
//!
//! The declarative document a host binds into a validated pipeline: a list
//! of components (class path plus constructor parameters), a list of
//! connections, optional shared `extras`, and an optional trigger. Loading
//! the document from a file is the host's concern; binding starts from an
//! already-deserialized value.
//!
//! The `ingestion_pipeline` template covers the canonical
//! harvester -> grouper -> enricher -> cataloger shape: configs using it
//! may omit the connection list and the template materializes the
//! standard edges.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use weir_domain::error::PipelineError;

use crate::application::pipeline::{
    ComponentDefinition, ConnectionDefinition, PipelineDefinition,
};
use crate::infrastructure::scheduler::SchedulerConfig;

use super::params::resolve_params;
use super::registry::ComponentRegistry;

/// Declarative description of one component instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub name: String,
    /// Class-path key into the component registry.
    #[serde(rename = "class_")]
    pub class: String,
    /// Constructor parameters, resolved before instantiation.
    #[serde(default, rename = "params_")]
    pub params: Map<String, Value>,
    /// Pre-configured run parameters merged into runtime inputs.
    #[serde(default, rename = "run_params_")]
    pub run_params: Map<String, Value>,
}

/// Known pipeline templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineTemplate {
    IngestionPipeline,
}

/// The full declarative pipeline document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
    #[serde(default)]
    pub connections: Vec<ConnectionDefinition>,
    #[serde(default, rename = "template_")]
    pub template: Option<PipelineTemplate>,
    /// Extra values referencable from parameters via `CONFIG_KEY`.
    #[serde(default)]
    pub extras: Map<String, Value>,
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,
}

impl PipelineConfig {
    /// Instantiate every component and materialize the connection list.
    pub fn parse(&self, registry: &ComponentRegistry) -> Result<PipelineDefinition, PipelineError> {
        // extras resolve first so other parameters can reference them
        let extras = resolve_params(&self.extras, &Value::Null)?;
        let mut document = Map::new();
        document.insert("extras".to_string(), Value::Object(extras));
        let document = Value::Object(document);

        let mut components = Vec::with_capacity(self.components.len());
        for config in &self.components {
            let params = resolve_params(&config.params, &document)?;
            let component = registry.build(&config.class, &params)?;
            let run_params = resolve_params(&config.run_params, &document)?;
            components.push(ComponentDefinition {
                name: config.name.clone(),
                component,
                run_params,
            });
        }

        let mut connections = self.connections.clone();
        if let Some(template) = self.template {
            connections.extend(self.template_connections(template));
        }

        Ok(PipelineDefinition {
            components,
            connections,
        })
    }

    /// Standard edges of a template, restricted to the components the
    /// config actually declares.
    fn template_connections(&self, template: PipelineTemplate) -> Vec<ConnectionDefinition> {
        let declared =
            |name: &str| self.components.iter().any(|c| c.name == name);
        let connection = |start: &str, end: &str, wiring: &[(&str, &str)]| ConnectionDefinition {
            start: start.to_string(),
            end: end.to_string(),
            input_config: wiring
                .iter()
                .map(|(param, source)| (param.to_string(), source.to_string()))
                .collect::<BTreeMap<_, _>>(),
        };

        match template {
            PipelineTemplate::IngestionPipeline => {
                let mut connections = Vec::new();
                if declared("harvester") && declared("grouper") {
                    connections.push(connection(
                        "harvester",
                        "grouper",
                        &[
                            ("items", "harvester.items"),
                            ("operations", "harvester.operations"),
                        ],
                    ));
                }
                if declared("harvester") && declared("enricher") {
                    connections.push(connection(
                        "harvester",
                        "enricher",
                        &[("items", "harvester.items")],
                    ));
                }
                if declared("grouper") && declared("enricher") {
                    connections.push(connection(
                        "grouper",
                        "enricher",
                        &[("groups", "grouper.groups")],
                    ));
                }
                if declared("enricher") && declared("cataloger") {
                    connections.push(connection(
                        "enricher",
                        "cataloger",
                        &[
                            ("service_metadata", "enricher.service_metadata"),
                            ("group_metadata", "enricher.group_metadata"),
                        ],
                    ));
                }
                connections
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn config_deserializes_the_documented_shape() {
        let config: PipelineConfig = serde_json::from_value(json!({
            "template_": "ingestion_pipeline",
            "components": [
                {"name": "harvester", "class_": "weir.Harvester", "params_": {"page_size": 100}},
                {"name": "grouper", "class_": "weir.Grouper"}
            ],
            "extras": {"region": "muc"},
            "scheduler": {"scheduler_type": "interval", "minutes": 30}
        }))
        .unwrap();

        assert_eq!(config.components.len(), 2);
        assert_eq!(config.template, Some(PipelineTemplate::IngestionPipeline));
        assert!(config.scheduler.is_some());
    }

    #[test]
    fn template_materializes_only_declared_edges() {
        let config: PipelineConfig = serde_json::from_value(json!({
            "template_": "ingestion_pipeline",
            "components": [
                {"name": "harvester", "class_": "h"},
                {"name": "grouper", "class_": "g"}
            ]
        }))
        .unwrap();

        let connections = config.template_connections(PipelineTemplate::IngestionPipeline);
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].start, "harvester");
        assert_eq!(connections[0].end, "grouper");
        assert_eq!(
            connections[0].input_config.get("items"),
            Some(&"harvester.items".to_string())
        );
        assert_eq!(
            connections[0].input_config.get("operations"),
            Some(&"harvester.operations".to_string())
        );
    }
}
