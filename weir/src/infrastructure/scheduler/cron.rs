// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cron Trigger
//!
//! Fires pipeline runs on a cron schedule. The schedule comes either from
//! a standard 5-field cron expression or from explicit calendar fields;
//! exactly one of the two forms must be given. As with the interval
//! trigger, one invocation fires immediately on `start`.
//!
//! Expressions are evaluated by the `cron` crate, which expects a seconds
//! column; 5-field expressions get `0` prepended. Explicit fields are
//! rendered into an equivalent expression, with unset minute/hour fields
//! defaulting to `0` whenever a coarser field is pinned (so `hour: 3`
//! fires once at 03:00, not every minute of hour three).

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use cron::Schedule;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use weir_domain::error::PipelineError;

use crate::application::pipeline::RuntimeInputs;
use crate::application::runner::PipelineRunner;

use super::Scheduler;

/// Configuration of a cron trigger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CronSchedulerConfig {
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub day: Option<u32>,
    /// Week-of-year has no cron-expression equivalent and is rejected.
    #[serde(default)]
    pub week: Option<u32>,
    #[serde(default)]
    pub day_of_week: Option<String>,
    #[serde(default)]
    pub hour: Option<u32>,
    #[serde(default)]
    pub minute: Option<u32>,
    #[serde(default)]
    pub second: Option<u32>,
    /// Standard 5-field cron expression, exclusive with explicit fields.
    #[serde(default)]
    pub cron_expression: Option<String>,
}

impl CronSchedulerConfig {
    fn has_explicit_fields(&self) -> bool {
        self.year.is_some()
            || self.month.is_some()
            || self.day.is_some()
            || self.week.is_some()
            || self.day_of_week.is_some()
            || self.hour.is_some()
            || self.minute.is_some()
            || self.second.is_some()
    }

    /// Resolve the configured schedule, enforcing the either-or rule.
    pub fn schedule(&self) -> Result<Schedule, PipelineError> {
        let expression = match (&self.cron_expression, self.has_explicit_fields()) {
            (Some(_), true) => {
                return Err(PipelineError::invalid_config(
                    "Provide either a cron expression or explicit fields, not both",
                ))
            }
            (None, false) => {
                return Err(PipelineError::invalid_config(
                    "Must provide either a cron expression or at least one field",
                ))
            }
            (Some(expression), false) => normalize_expression(expression),
            (None, true) => {
                if self.week.is_some() {
                    return Err(PipelineError::invalid_config(
                        "The week-of-year field has no cron equivalent and is not supported",
                    ));
                }
                self.render_expression()
            }
        };
        debug!(expression = %expression, "resolved cron schedule");
        Schedule::from_str(&expression).map_err(|e| {
            PipelineError::invalid_config(format!("Invalid cron expression '{expression}': {e}"))
        })
    }

    /// Render explicit fields into a seconds-first cron expression.
    fn render_expression(&self) -> String {
        let coarser_than_minute =
            self.hour.is_some() || self.day.is_some() || self.month.is_some() || self.year.is_some();
        let coarser_than_hour = self.day.is_some() || self.month.is_some() || self.year.is_some();

        let second = self.second.map_or_else(|| "0".to_string(), |v| v.to_string());
        let minute = match self.minute {
            Some(v) => v.to_string(),
            None if coarser_than_minute => "0".to_string(),
            None => "*".to_string(),
        };
        let hour = match self.hour {
            Some(v) => v.to_string(),
            None if coarser_than_hour => "0".to_string(),
            None => "*".to_string(),
        };
        let star = |v: Option<u32>| v.map_or_else(|| "*".to_string(), |v| v.to_string());
        let day_of_week = self
            .day_of_week
            .clone()
            .unwrap_or_else(|| "*".to_string());

        format!(
            "{second} {minute} {hour} {} {} {day_of_week} {}",
            star(self.day),
            star(self.month),
            star(self.year),
        )
    }
}

/// Prepend the seconds column to 5-field expressions.
fn normalize_expression(expression: &str) -> String {
    let fields = expression.split_whitespace().count();
    if fields == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    }
}

/// Trigger that invokes the runner at each schedule instant.
pub struct CronScheduler {
    runner: Arc<PipelineRunner>,
    inputs: RuntimeInputs,
    schedule: Schedule,
    shutdown_tx: watch::Sender<bool>,
    handle: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl CronScheduler {
    pub fn new(
        runner: Arc<PipelineRunner>,
        config: &CronSchedulerConfig,
        inputs: RuntimeInputs,
    ) -> Result<Self, PipelineError> {
        let schedule = config.schedule()?;
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            runner,
            inputs,
            schedule,
            shutdown_tx,
            handle: std::sync::Mutex::new(None),
        })
    }
}

#[async_trait]
impl Scheduler for CronScheduler {
    fn start(&self) {
        let runner = self.runner.clone();
        let inputs = self.inputs.clone();
        let schedule = self.schedule.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        info!("starting cron trigger");
        let handle = tokio::spawn(async move {
            // the next run time defaults to now
            if let Err(e) = runner.run(inputs.clone()).await {
                warn!(error = %e, "scheduled run failed");
            }
            loop {
                let Some(next) = schedule.upcoming(Utc).next() else {
                    info!("cron schedule exhausted");
                    break;
                };
                let delay = (next - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        if let Err(e) = runner.run(inputs.clone()).await {
                            warn!(error = %e, "scheduled run failed");
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });
        *self.handle.lock().expect("scheduler handle lock") = Some(handle);
    }

    async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handle = self.handle.lock().expect("scheduler handle lock").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("cron trigger stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_field_expressions_gain_a_seconds_column() {
        let config = CronSchedulerConfig {
            cron_expression: Some("*/5 * * * *".into()),
            ..Default::default()
        };
        // parses, and fires on minute boundaries only
        let schedule = config.schedule().unwrap();
        let next = schedule.upcoming(Utc).next().unwrap();
        assert_eq!(next.timestamp() % 60, 0);
    }

    #[test]
    fn explicit_fields_render_a_pinned_expression() {
        let config = CronSchedulerConfig {
            hour: Some(3),
            ..Default::default()
        };
        assert_eq!(config.render_expression(), "0 0 3 * * * *");

        let config = CronSchedulerConfig {
            minute: Some(15),
            ..Default::default()
        };
        assert_eq!(config.render_expression(), "0 15 * * * * *");
        assert!(config.schedule().is_ok());
    }

    #[test]
    fn both_or_neither_forms_are_rejected() {
        let both = CronSchedulerConfig {
            cron_expression: Some("* * * * *".into()),
            minute: Some(1),
            ..Default::default()
        };
        assert!(both.schedule().is_err());
        assert!(CronSchedulerConfig::default().schedule().is_err());
    }

    #[test]
    fn week_of_year_is_rejected() {
        let config = CronSchedulerConfig {
            week: Some(12),
            ..Default::default()
        };
        let err = config.schedule().unwrap_err();
        assert!(err.to_string().contains("week-of-year"));
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        let config = CronSchedulerConfig {
            cron_expression: Some("not a cron".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.schedule().unwrap_err(),
            PipelineError::InvalidConfiguration(_)
        ));
    }
}
