// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared test components and helpers for the integration suites.

#![allow(dead_code)]

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use weir_domain::component::{
    Component, ComponentDescriptor, ComponentInput, ComponentOutput, TypeTag,
};
use weir_domain::error::PipelineError;

/// Emits a fixed field-keyed payload, optionally asking the run to stop.
pub struct Emit {
    fields: Map<String, Value>,
    outputs: Vec<(String, TypeTag)>,
    stop_pipeline: bool,
}

impl Emit {
    pub fn new(payload: Value, outputs: &[(&str, TypeTag)]) -> Self {
        let Value::Object(fields) = payload else {
            panic!("Emit payload must be an object");
        };
        Self {
            fields,
            outputs: outputs
                .iter()
                .map(|(name, tag)| (name.to_string(), tag.clone()))
                .collect(),
            stop_pipeline: false,
        }
    }

    pub fn stopping(mut self) -> Self {
        self.stop_pipeline = true;
        self
    }
}

#[async_trait]
impl Component for Emit {
    fn descriptor(&self) -> ComponentDescriptor {
        let mut builder = ComponentDescriptor::builder();
        for (name, tag) in &self.outputs {
            builder = builder.output(name.clone(), tag.clone());
        }
        builder.build()
    }

    async fn run(&self, _input: ComponentInput) -> Result<ComponentOutput, PipelineError> {
        Ok(ComponentOutput {
            fields: self.fields.clone(),
            state: None,
            stop_pipeline: self.stop_pipeline,
        })
    }
}

/// Takes a text `input` and emits `result = "got:" + input`.
pub struct Concat;

#[async_trait]
impl Component for Concat {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::builder()
            .input("input", TypeTag::Text)
            .output("result", TypeTag::Text)
            .build()
    }

    async fn run(&self, input: ComponentInput) -> Result<ComponentOutput, PipelineError> {
        let value: String = input.require("input")?;
        let mut fields = Map::new();
        fields.insert("result".into(), Value::String(format!("got:{value}")));
        Ok(ComponentOutput {
            fields,
            state: None,
            stop_pipeline: false,
        })
    }
}

/// Adds a constant to the integer input named `param` and emits `out`.
pub struct AddConst {
    pub param: String,
    pub addend: i64,
}

#[async_trait]
impl Component for AddConst {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::builder()
            .input(self.param.clone(), TypeTag::Integer)
            .output("out", TypeTag::Integer)
            .build()
    }

    async fn run(&self, input: ComponentInput) -> Result<ComponentOutput, PipelineError> {
        let value: i64 = input.require(&self.param)?;
        let mut fields = Map::new();
        fields.insert("out".into(), Value::from(value + self.addend));
        Ok(ComponentOutput {
            fields,
            state: None,
            stop_pipeline: false,
        })
    }
}

/// Sums the integer inputs `l` and `r` into `sum`.
pub struct SumTwo;

#[async_trait]
impl Component for SumTwo {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::builder()
            .input("l", TypeTag::Integer)
            .input("r", TypeTag::Integer)
            .output("sum", TypeTag::Integer)
            .build()
    }

    async fn run(&self, input: ComponentInput) -> Result<ComponentOutput, PipelineError> {
        let l: i64 = input.require("l")?;
        let r: i64 = input.require("r")?;
        let mut fields = Map::new();
        fields.insert("sum".into(), Value::from(l + r));
        Ok(ComponentOutput {
            fields,
            state: None,
            stop_pipeline: false,
        })
    }
}

/// Stages a state marker, then optionally fails.
pub struct Staging {
    pub marker: Value,
    pub fail: bool,
}

#[async_trait]
impl Component for Staging {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::builder()
            .output("ok", TypeTag::Bool)
            .consumes_state()
            .build()
    }

    async fn run(&self, _input: ComponentInput) -> Result<ComponentOutput, PipelineError> {
        if self.fail {
            return Err(PipelineError::execution("staging component failed"));
        }
        let mut fields = Map::new();
        fields.insert("ok".into(), Value::Bool(true));
        let mut state = Map::new();
        state.insert("marker".into(), self.marker.clone());
        Ok(ComponentOutput {
            fields,
            state: Some(state),
            stop_pipeline: false,
        })
    }
}

/// Always fails with a component execution error.
pub struct Failing;

#[async_trait]
impl Component for Failing {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::builder()
            .optional_input("input", TypeTag::Any)
            .output("never", TypeTag::Any)
            .build()
    }

    async fn run(&self, _input: ComponentInput) -> Result<ComponentOutput, PipelineError> {
        Err(PipelineError::execution("boom"))
    }
}

/// Build an input wiring map from pairs.
pub fn wiring(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(param, source)| (param.to_string(), source.to_string()))
        .collect()
}
