// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Interval Trigger
//!
//! Repeats pipeline runs at a fixed period. The period comes either from
//! explicit `{weeks, days, hours, minutes, seconds}` fields or from an
//! ISO-8601 duration string (`P[nY][nM][nW][nD]T[nH][nM][nS]`); exactly
//! one of the two forms must be given. Years count as 365 days and months
//! as 30 days, without calendar arithmetic.
//!
//! The first invocation fires immediately on `start`; an in-flight run
//! completes before `shutdown` returns.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use weir_domain::error::PipelineError;

use crate::application::pipeline::RuntimeInputs;
use crate::application::runner::PipelineRunner;

use super::Scheduler;

const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_HOUR: f64 = 3_600.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
const SECONDS_PER_WEEK: f64 = 7.0 * SECONDS_PER_DAY;
// no calendar arithmetic: fixed-length months and years
const SECONDS_PER_MONTH: f64 = 30.0 * SECONDS_PER_DAY;
const SECONDS_PER_YEAR: f64 = 365.0 * SECONDS_PER_DAY;

/// Configuration of an interval trigger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalSchedulerConfig {
    #[serde(default)]
    pub weeks: u64,
    #[serde(default)]
    pub days: u64,
    #[serde(default)]
    pub hours: u64,
    #[serde(default)]
    pub minutes: u64,
    #[serde(default)]
    pub seconds: u64,
    /// ISO-8601 duration string, exclusive with the explicit fields.
    #[serde(default)]
    pub interval: Option<String>,
}

impl IntervalSchedulerConfig {
    /// Resolve the configured period, enforcing the either-or rule.
    pub fn period(&self) -> Result<Duration, PipelineError> {
        let explicit =
            self.weeks + self.days + self.hours + self.minutes + self.seconds > 0;
        match (&self.interval, explicit) {
            (Some(_), true) => Err(PipelineError::invalid_config(
                "Provide either an interval string or explicit time units, not both",
            )),
            (None, false) => Err(PipelineError::invalid_config(
                "Must provide either an interval string or at least one time unit",
            )),
            (Some(duration), false) => parse_iso8601_duration(duration),
            (None, true) => Ok(Duration::from_secs(
                self.seconds
                    + self.minutes * 60
                    + self.hours * 3_600
                    + self.days * 86_400
                    + self.weeks * 604_800,
            )),
        }
    }
}

/// Parse an ISO-8601 duration (`P[nY][nM][nW][nD]T[nH][nM][nS]`) into a
/// fixed duration. `M` means months before the `T` separator and minutes
/// after it.
pub fn parse_iso8601_duration(duration: &str) -> Result<Duration, PipelineError> {
    let duration = duration.trim().to_uppercase();
    let mut chars = duration.chars().peekable();

    if chars.next() != Some('P') {
        return Err(PipelineError::invalid_config(format!(
            "Duration '{duration}' must start with 'P'"
        )));
    }

    let mut total_seconds = 0.0_f64;
    let mut in_time_section = false;
    let mut saw_component = false;

    while let Some(&c) = chars.peek() {
        if c == 'T' {
            in_time_section = true;
            chars.next();
            continue;
        }

        let mut number = String::new();
        while let Some(&d) = chars.peek() {
            if d.is_ascii_digit() || d == '.' {
                number.push(d);
                chars.next();
            } else {
                break;
            }
        }
        let value: f64 = number.parse().map_err(|_| {
            PipelineError::invalid_config(format!("Invalid number in duration '{duration}'"))
        })?;

        let designator = chars.next().ok_or_else(|| {
            PipelineError::invalid_config(format!("Missing designator in duration '{duration}'"))
        })?;
        let factor = match (designator, in_time_section) {
            ('Y', false) => SECONDS_PER_YEAR,
            ('M', false) => SECONDS_PER_MONTH,
            ('W', false) => SECONDS_PER_WEEK,
            ('D', false) => SECONDS_PER_DAY,
            ('H', true) => SECONDS_PER_HOUR,
            ('M', true) => SECONDS_PER_MINUTE,
            ('S', true) => 1.0,
            _ => {
                return Err(PipelineError::invalid_config(format!(
                    "Unexpected designator '{designator}' in duration '{duration}'"
                )))
            }
        };
        total_seconds += value * factor;
        saw_component = true;
    }

    if !saw_component || total_seconds <= 0.0 {
        return Err(PipelineError::invalid_config(format!(
            "Duration '{duration}' resolves to nothing"
        )));
    }
    Ok(Duration::from_secs_f64(total_seconds))
}

/// Trigger that invokes the runner at a fixed period.
pub struct IntervalScheduler {
    runner: Arc<PipelineRunner>,
    inputs: RuntimeInputs,
    period: Duration,
    shutdown_tx: watch::Sender<bool>,
    handle: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl IntervalScheduler {
    pub fn new(
        runner: Arc<PipelineRunner>,
        config: &IntervalSchedulerConfig,
        inputs: RuntimeInputs,
    ) -> Result<Self, PipelineError> {
        let period = config.period()?;
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            runner,
            inputs,
            period,
            shutdown_tx,
            handle: std::sync::Mutex::new(None),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

#[async_trait]
impl Scheduler for IntervalScheduler {
    fn start(&self) {
        let runner = self.runner.clone();
        let inputs = self.inputs.clone();
        let period = self.period;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        info!(period_seconds = period.as_secs_f64(), "starting interval trigger");
        let handle = tokio::spawn(async move {
            // the first tick completes immediately
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
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
            // an in-flight run completes before the loop observes shutdown
            let _ = handle.await;
        }
        info!("interval trigger stopped");
    }
}
