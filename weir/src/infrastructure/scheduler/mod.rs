// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Schedulers
//!
//! Periodic triggers that drive repeated pipeline runs: a fixed-period
//! interval trigger and a cron trigger. Both share one contract: `start`
//! launches a background loop that performs one immediate invocation and
//! then follows its schedule; `shutdown` stops further invocations while
//! letting an in-flight run complete.
//!
//! A failed run is logged and the loop keeps going: the next firing
//! retries against the previously committed state.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use weir_domain::error::PipelineError;

use crate::application::pipeline::RuntimeInputs;
use crate::application::runner::PipelineRunner;

pub mod cron;
pub mod interval;

pub use cron::{CronScheduler, CronSchedulerConfig};
pub use interval::{parse_iso8601_duration, IntervalScheduler, IntervalSchedulerConfig};

/// Common contract of all triggers.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Launch the background loop. Idempotent start is not required;
    /// callers start a trigger once.
    fn start(&self);

    /// Stop further invocations. An in-flight run completes first.
    async fn shutdown(&self);
}

/// Declarative trigger selection, tagged by `scheduler_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheduler_type", rename_all = "lowercase")]
pub enum SchedulerConfig {
    Interval(IntervalSchedulerConfig),
    Cron(CronSchedulerConfig),
}

impl SchedulerConfig {
    /// Build the configured trigger around a runner.
    pub fn build(
        &self,
        runner: Arc<PipelineRunner>,
        inputs: RuntimeInputs,
    ) -> Result<Box<dyn Scheduler>, PipelineError> {
        match self {
            SchedulerConfig::Interval(config) => {
                Ok(Box::new(IntervalScheduler::new(runner, config, inputs)?))
            }
            SchedulerConfig::Cron(config) => {
                Ok(Box::new(CronScheduler::new(runner, config, inputs)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_deserializes_by_scheduler_type() {
        let interval: SchedulerConfig = serde_json::from_value(serde_json::json!({
            "scheduler_type": "interval",
            "minutes": 5
        }))
        .unwrap();
        assert!(matches!(
            interval,
            SchedulerConfig::Interval(IntervalSchedulerConfig { minutes: 5, .. })
        ));

        let cron: SchedulerConfig = serde_json::from_value(serde_json::json!({
            "scheduler_type": "cron",
            "cron_expression": "0 3 * * *"
        }))
        .unwrap();
        assert!(matches!(cron, SchedulerConfig::Cron(_)));
    }
}
