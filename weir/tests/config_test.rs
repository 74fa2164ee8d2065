// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Declarative config binding through the runner: registry lookup,
//! parameter resolution, template edges, and the scheduler config.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use weir::application::runner::PipelineRunner;
use weir::components::{
    CatalogerComponent, EnricherComponent, GrouperComponent, HarvesterComponent,
};
use weir::infrastructure::config::{ComponentRegistry, PipelineConfig};
use weir::infrastructure::stores::InMemoryStore;
use weir_domain::component::Component;
use weir_domain::error::PipelineError;
use weir_domain::models::{CommonMetadata, Group, Item};
use weir_domain::ports::{Cataloger, Grouper, Harvester, MetadataBuilder};

struct FixedHarvester {
    items: Vec<Item>,
}

#[async_trait]
impl Harvester for FixedHarvester {
    async fn fetch_items(&self) -> Result<Vec<Item>, PipelineError> {
        Ok(self.items.clone())
    }
}

struct KindGrouper;

#[async_trait]
impl Grouper for KindGrouper {
    async fn group_items(&self, items: &[Item]) -> Result<Vec<Group>, PipelineError> {
        let mut groups: Vec<Group> = Vec::new();
        for item in items {
            let kind = item
                .content
                .get("kind")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            match groups.iter_mut().find(|g| g.name == kind) {
                Some(group) => group.items.push(item.clone()),
                None => groups.push(Group::new(kind, vec![item.clone()])),
            }
        }
        Ok(groups)
    }
}

struct StubBuilder {
    endpoint: String,
}

fn metadata(identifier: &str, endpoint: &str) -> CommonMetadata {
    CommonMetadata {
        identifier: identifier.into(),
        title: identifier.into(),
        description: String::new(),
        endpoint_url: endpoint.into(),
        spatial_extent: String::new(),
        temporal_extent: None,
        tags: vec![],
        keywords: vec![],
        source_type: "sensor_api".into(),
        last_updated: None,
        update_frequency: None,
        owner: None,
        license: None,
    }
}

#[async_trait]
impl MetadataBuilder for StubBuilder {
    async fn build_service_metadata(
        &self,
        _items: &[Item],
    ) -> Result<CommonMetadata, PipelineError> {
        Ok(metadata("service", &self.endpoint))
    }

    async fn build_group_metadata(&self, group: &Group) -> Result<CommonMetadata, PipelineError> {
        Ok(metadata(&group.name, &self.endpoint))
    }
}

struct AcceptingCataloger;

#[async_trait]
impl Cataloger for AcceptingCataloger {
    async fn register(
        &self,
        _service: &CommonMetadata,
        groups: &[CommonMetadata],
    ) -> Result<Vec<String>, PipelineError> {
        Ok(groups.iter().map(|g| g.identifier.clone()).collect())
    }
}

fn registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register("weir.components.Harvester", |params| {
        let items: Vec<Item> = params
            .get("items")
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()?
            .unwrap_or_default();
        Ok(Arc::new(HarvesterComponent::new(Arc::new(FixedHarvester { items })))
            as Arc<dyn Component>)
    });
    registry.register("weir.components.Grouper", |_params| {
        Ok(Arc::new(GrouperComponent::new(Arc::new(KindGrouper))) as Arc<dyn Component>)
    });
    registry.register("weir.components.Enricher", |params| {
        let endpoint = params
            .get("endpoint")
            .and_then(Value::as_str)
            .unwrap_or("https://unset.example")
            .to_string();
        Ok(Arc::new(EnricherComponent::new(Arc::new(StubBuilder { endpoint })))
            as Arc<dyn Component>)
    });
    registry.register("weir.components.Cataloger", |_params| {
        Ok(Arc::new(CatalogerComponent::new(Arc::new(AcceptingCataloger)))
            as Arc<dyn Component>)
    });
    registry
}

fn ingestion_config() -> PipelineConfig {
    std::env::set_var("WEIR_TEST_ENDPOINT", "https://sensors.example/api");
    serde_json::from_value(json!({
        "template_": "ingestion_pipeline",
        "extras": {"endpoint": "${WEIR_TEST_ENDPOINT}"},
        "components": [
            {
                "name": "harvester",
                "class_": "weir.components.Harvester",
                "params_": {"items": [
                    {"id": "1", "content": {"kind": "air"}},
                    {"id": "2", "content": {"kind": "water"}}
                ]}
            },
            {"name": "grouper", "class_": "weir.components.Grouper"},
            {
                "name": "enricher",
                "class_": "weir.components.Enricher",
                "params_": {"endpoint": {"resolver_": "CONFIG_KEY", "key_": "extras.endpoint"}}
            },
            {"name": "cataloger", "class_": "weir.components.Cataloger"}
        ],
        "scheduler": {"scheduler_type": "interval", "minutes": 15}
    }))
    .unwrap()
}

#[tokio::test]
async fn templated_config_runs_the_canonical_shape_end_to_end() {
    let config = ingestion_config();
    let runner =
        PipelineRunner::from_config(&config, &registry(), Arc::new(InMemoryStore::new())).unwrap();

    let result = runner.run(Default::default()).await.unwrap();

    assert!(result.success);
    let status = &result.results["cataloger"];
    assert_eq!(status["success"], json!(true));
    let mut registered: Vec<String> =
        serde_json::from_value(status["groups"].clone()).unwrap();
    registered.sort();
    assert_eq!(registered, vec!["air", "water"]);
}

#[tokio::test]
async fn config_key_and_env_references_reach_components() {
    let config = ingestion_config();
    let definition = config.parse(&registry()).unwrap();
    // the enricher factory received the resolved endpoint, which flows
    // into every metadata record
    let runner =
        PipelineRunner::from_definition(&definition, Arc::new(InMemoryStore::new())).unwrap();
    let result = runner.run(Default::default()).await.unwrap();
    assert_eq!(
        result.results["cataloger"]["success"],
        json!(true)
    );
}

#[tokio::test]
async fn unknown_class_path_fails_binding() {
    let config: PipelineConfig = serde_json::from_value(json!({
        "components": [{"name": "x", "class_": "weir.components.Nope"}]
    }))
    .unwrap();
    let err =
        PipelineRunner::from_config(&config, &registry(), Arc::new(InMemoryStore::new()))
            .unwrap_err();
    assert!(matches!(err, PipelineError::ComponentNotFound(_)));
}

#[tokio::test]
async fn scheduler_config_builds_the_configured_trigger() {
    let config = ingestion_config();
    let runner = Arc::new(
        PipelineRunner::from_config(&config, &registry(), Arc::new(InMemoryStore::new()))
            .unwrap(),
    );
    let scheduler = runner.scheduler(Default::default()).unwrap();
    assert!(scheduler.is_some());

    // a trigger drives the runner: start, let the immediate run land, stop
    let scheduler = scheduler.unwrap();
    scheduler.start();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    scheduler.shutdown().await;

    let records = runner
        .with_pipeline(|p| p.run_tracker())
        .await
        .get_run_records(10)
        .await
        .unwrap();
    assert!(!records.is_empty());
}

#[tokio::test]
async fn run_params_are_merged_with_user_input() {
    // a config-level run parameter reaches the component unless the user
    // overrides it
    let mut registry = registry();
    registry.register("weir.components.Echo", |_params| {
        Ok(Arc::new(EchoComponent) as Arc<dyn Component>)
    });

    let config: PipelineConfig = serde_json::from_value(json!({
        "components": [
            {"name": "echo", "class_": "weir.components.Echo", "run_params_": {"message": "from-config"}}
        ]
    }))
    .unwrap();
    let runner =
        PipelineRunner::from_config(&config, &registry, Arc::new(InMemoryStore::new())).unwrap();

    let result = runner.run(Default::default()).await.unwrap();
    assert_eq!(result.results["echo"]["echoed"], json!("from-config"));

    let user = serde_json::from_value(json!({"echo": {"message": "from-user"}})).unwrap();
    let result = runner.run(user).await.unwrap();
    assert_eq!(result.results["echo"]["echoed"], json!("from-user"));
}

struct EchoComponent;

#[async_trait]
impl Component for EchoComponent {
    fn descriptor(&self) -> weir_domain::component::ComponentDescriptor {
        weir_domain::component::ComponentDescriptor::builder()
            .input("message", weir_domain::component::TypeTag::Text)
            .output("echoed", weir_domain::component::TypeTag::Text)
            .build()
    }

    async fn run(
        &self,
        input: weir_domain::component::ComponentInput,
    ) -> Result<weir_domain::component::ComponentOutput, PipelineError> {
        let message: String = input.require("message")?;
        let mut fields = serde_json::Map::new();
        fields.insert("echoed".into(), Value::String(message));
        Ok(weir_domain::component::ComponentOutput {
            fields,
            state: None,
            stop_pipeline: false,
        })
    }
}
