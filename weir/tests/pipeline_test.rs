// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end tests of the run engine: wiring, concurrency, the status
//! machine, failure handling, and early stops.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use common::{wiring, AddConst, Concat, Emit, Failing, Staging, SumTwo};
use weir::application::pipeline::Pipeline;
use weir::infrastructure::run_tracker::PipelineRunStatus;
use weir_domain::component::{RunStatus, TypeTag};
use weir_domain::error::PipelineError;

#[tokio::test]
async fn linear_pipeline_passes_fields_downstream() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_component(
            "a",
            Arc::new(Emit::new(json!({"value": "x"}), &[("value", TypeTag::Text)])),
        )
        .unwrap();
    pipeline.add_component("b", Arc::new(Concat)).unwrap();
    pipeline
        .connect("a", "b", wiring(&[("input", "a.value")]))
        .unwrap();

    let result = pipeline.run(Default::default()).await.unwrap();

    assert!(result.success);
    assert_eq!(result.status, PipelineRunStatus::Completed);
    assert_eq!(result.results["b"]["result"], json!("got:x"));
    for node in ["a", "b"] {
        assert_eq!(
            pipeline.get_node_status(&result.run_id, node).await.unwrap(),
            RunStatus::Done
        );
    }
}

#[tokio::test]
async fn diamond_with_field_selection_joins_both_branches() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_component(
            "src",
            Arc::new(Emit::new(
                json!({"a": 1, "b": 2}),
                &[("a", TypeTag::Integer), ("b", TypeTag::Integer)],
            )),
        )
        .unwrap();
    pipeline
        .add_component(
            "l",
            Arc::new(AddConst {
                param: "x".into(),
                addend: 10,
            }),
        )
        .unwrap();
    pipeline
        .add_component(
            "r",
            Arc::new(AddConst {
                param: "y".into(),
                addend: 20,
            }),
        )
        .unwrap();
    pipeline.add_component("join", Arc::new(SumTwo)).unwrap();

    pipeline.connect("src", "l", wiring(&[("x", "src.a")])).unwrap();
    pipeline.connect("src", "r", wiring(&[("y", "src.b")])).unwrap();
    pipeline
        .connect("l", "join", wiring(&[("l", "l.out")]))
        .unwrap();
    pipeline
        .connect("r", "join", wiring(&[("r", "r.out")]))
        .unwrap();

    let result = pipeline.run(Default::default()).await.unwrap();

    assert!(result.success);
    assert_eq!(result.results["join"]["sum"], json!(33));
}

#[tokio::test]
async fn cycles_are_rejected_at_validation() {
    let mut pipeline = Pipeline::new();
    for name in ["a", "b", "c"] {
        pipeline
            .add_component(
                name,
                Arc::new(Emit::new(json!({"v": 1}), &[("v", TypeTag::Integer)])),
            )
            .unwrap();
    }
    pipeline.connect("a", "b", BTreeMap::new()).unwrap();
    pipeline.connect("b", "c", BTreeMap::new()).unwrap();
    pipeline.connect("c", "a", BTreeMap::new()).unwrap();

    let err = pipeline.validate().unwrap_err();
    assert!(matches!(err, PipelineError::PipelineDefinition(_)));
    assert!(err.to_string().contains("cycles"));
}

#[tokio::test]
async fn unknown_components_and_duplicate_edges_are_rejected() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_component(
            "a",
            Arc::new(Emit::new(json!({"v": 1}), &[("v", TypeTag::Integer)])),
        )
        .unwrap();
    pipeline.add_component("b", Arc::new(Concat)).unwrap();

    let err = pipeline.connect("a", "ghost", BTreeMap::new()).unwrap_err();
    assert!(matches!(err, PipelineError::ComponentNotFound(_)));

    pipeline
        .connect("a", "b", wiring(&[("input", "a.v")]))
        .unwrap();
    let err = pipeline.connect("a", "b", BTreeMap::new()).unwrap_err();
    assert!(matches!(err, PipelineError::PipelineDefinition(_)));
}

#[tokio::test]
async fn wiring_is_validated_against_descriptors() {
    // unknown target parameter
    let mut pipeline = Pipeline::new();
    pipeline
        .add_component(
            "a",
            Arc::new(Emit::new(json!({"value": "x"}), &[("value", TypeTag::Text)])),
        )
        .unwrap();
    pipeline.add_component("b", Arc::new(Concat)).unwrap();
    pipeline
        .connect("a", "b", wiring(&[("nope", "a.value")]))
        .unwrap();
    assert!(matches!(
        pipeline.validate().unwrap_err(),
        PipelineError::Validation(_)
    ));

    // unknown output field
    let mut pipeline = Pipeline::new();
    pipeline
        .add_component(
            "a",
            Arc::new(Emit::new(json!({"value": "x"}), &[("value", TypeTag::Text)])),
        )
        .unwrap();
    pipeline.add_component("b", Arc::new(Concat)).unwrap();
    pipeline
        .connect("a", "b", wiring(&[("input", "a.missing")]))
        .unwrap();
    assert!(pipeline.validate().is_err());

    // type mismatch between source field and target parameter
    let mut pipeline = Pipeline::new();
    pipeline
        .add_component(
            "a",
            Arc::new(Emit::new(json!({"n": 5}), &[("n", TypeTag::Integer)])),
        )
        .unwrap();
    pipeline.add_component("b", Arc::new(Concat)).unwrap();
    pipeline.connect("a", "b", wiring(&[("input", "a.n")])).unwrap();
    let err = pipeline.validate().unwrap_err();
    assert!(err.to_string().contains("Type mismatch"));
}

#[tokio::test]
async fn missing_required_runtime_inputs_fail_the_run_upfront() {
    let mut pipeline = Pipeline::new();
    pipeline.add_component("b", Arc::new(Concat)).unwrap();

    let err = pipeline.run(Default::default()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));

    // supplying the input via runtime inputs makes the run pass
    let inputs = serde_json::from_value(json!({"b": {"input": "hello"}})).unwrap();
    let result = pipeline.run(inputs).await.unwrap();
    assert!(result.success);
    assert_eq!(result.results["b"]["result"], json!("got:hello"));
}

#[tokio::test]
async fn failing_node_fails_the_run_and_leaves_successors_pending() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_component(
            "a",
            Arc::new(Emit::new(json!({"value": "x"}), &[("value", TypeTag::Text)])),
        )
        .unwrap();
    pipeline.add_component("b", Arc::new(Failing)).unwrap();
    pipeline.add_component("c", Arc::new(Concat)).unwrap();
    pipeline
        .connect("a", "b", wiring(&[("input", "a.value")]))
        .unwrap();
    pipeline
        .connect("b", "c", wiring(&[("input", "b.never")]))
        .unwrap();

    let result = pipeline.run(Default::default()).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.status, PipelineRunStatus::Failed);
    assert_eq!(
        pipeline.get_node_status(&result.run_id, "b").await.unwrap(),
        RunStatus::Failed
    );
    assert_eq!(
        pipeline.get_node_status(&result.run_id, "c").await.unwrap(),
        RunStatus::Pending
    );

    // the failed node's result is the error payload
    let store = pipeline.store();
    let error_payload = store
        .get_result_for_component(&result.run_id, "b")
        .await
        .unwrap()
        .unwrap();
    assert!(error_payload["error"].as_str().unwrap().contains("boom"));

    // the run record carries the failure
    let records = pipeline.run_tracker().get_run_records(1).await.unwrap();
    assert_eq!(records[0].status, PipelineRunStatus::Failed);
    assert!(records[0].error.is_some());
}

#[tokio::test]
async fn failed_runs_do_not_commit_staged_state() {
    let store = Arc::new(weir::infrastructure::stores::InMemoryStore::new());

    // first run commits a state version
    let mut pipeline = Pipeline::with_store(store.clone());
    pipeline
        .add_component(
            "stager",
            Arc::new(Staging {
                marker: json!("v1"),
                fail: false,
            }),
        )
        .unwrap();
    pipeline.add_component("sink", Arc::new(Failing)).unwrap();
    pipeline.connect("stager", "sink", BTreeMap::new()).unwrap();

    // the sink fails, so the staged marker must not become visible
    let result = pipeline.run(Default::default()).await.unwrap();
    assert!(!result.success);
    assert_eq!(pipeline.state_manager().current_version().await, None);
    let state = pipeline
        .state_manager()
        .get_component_state("stager")
        .await
        .unwrap();
    assert!(state.is_empty());
}

#[tokio::test]
async fn successful_runs_commit_state_keyed_by_run_id() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_component(
            "stager",
            Arc::new(Staging {
                marker: json!("v1"),
                fail: false,
            }),
        )
        .unwrap();

    let result = pipeline.run(Default::default()).await.unwrap();
    assert!(result.success);
    assert_eq!(
        pipeline.state_manager().current_version().await,
        Some(result.run_id.clone())
    );
    let state = pipeline
        .state_manager()
        .get_component_state("stager")
        .await
        .unwrap();
    assert_eq!(state.get("marker"), Some(&json!("v1")));
}

#[tokio::test]
async fn stop_pipeline_short_circuits_downstream_work() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_component(
            "source",
            Arc::new(
                Emit::new(json!({"value": "x"}), &[("value", TypeTag::Text)]).stopping(),
            ),
        )
        .unwrap();
    pipeline.add_component("sink", Arc::new(Concat)).unwrap();
    pipeline
        .connect("source", "sink", wiring(&[("input", "source.value")]))
        .unwrap();

    let result = pipeline.run(Default::default()).await.unwrap();

    assert!(result.success);
    assert!(result.stopped_early);
    assert_eq!(result.status, PipelineRunStatus::Stopped);
    assert_eq!(
        pipeline
            .get_node_status(&result.run_id, "source")
            .await
            .unwrap(),
        RunStatus::StopPipeline
    );
    assert_eq!(
        pipeline.get_node_status(&result.run_id, "sink").await.unwrap(),
        RunStatus::Pending
    );
    let records = pipeline.run_tracker().get_run_records(1).await.unwrap();
    assert_eq!(records[0].status, PipelineRunStatus::Stopped);
}

#[tokio::test]
async fn terminal_statuses_reject_further_transitions() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_component(
            "a",
            Arc::new(Emit::new(json!({"value": "x"}), &[("value", TypeTag::Text)])),
        )
        .unwrap();
    let result = pipeline.run(Default::default()).await.unwrap();
    assert_eq!(
        pipeline.get_node_status(&result.run_id, "a").await.unwrap(),
        RunStatus::Done
    );

    let err = pipeline
        .set_node_status(&result.run_id, "a", RunStatus::Running)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::StatusUpdate(_)));
}

#[tokio::test]
async fn runs_over_a_file_store_persist_results() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(weir::infrastructure::stores::FileStore::new(dir.path()).unwrap());

    let mut pipeline = Pipeline::with_store(store.clone());
    pipeline
        .add_component(
            "a",
            Arc::new(Emit::new(json!({"value": "x"}), &[("value", TypeTag::Text)])),
        )
        .unwrap();
    pipeline.add_component("b", Arc::new(Concat)).unwrap();
    pipeline
        .connect("a", "b", wiring(&[("input", "a.value")]))
        .unwrap();

    let result = pipeline.run(Default::default()).await.unwrap();
    assert!(result.success);

    // results, statuses, and the run history are all on disk
    assert!(dir.path().join("pipeline_run_history.json").exists());
    let result_file = dir.path().join(format!("{}_b.json", result.run_id));
    let status_file = dir.path().join(format!("{}_b_status.json", result.run_id));
    assert!(result_file.exists());
    assert!(status_file.exists());
}
