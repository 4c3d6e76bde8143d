// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![warn(missing_docs)]
//! # Scheduler ⏱️
//!
//! Drives the watchers and the signers. Every task fires on a fixed cadence,
//! shifted by its own phase so the four workers of the relayer never start
//! together. A firing runs in its own task under a time budget; when the
//! budget runs out the tick future is dropped, which releases the busy flag
//! of the worker so the next firing can run.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

use bridge_relayer_utils::metric::Metrics;
use bridge_relayer_utils::probe;

mod busy;

pub use busy::{BusyFlag, BusyGuard};

/// How a tick ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// The previous tick of the same worker was still running.
    Skipped,
    /// Nothing to do.
    Idle,
    /// Some work was done.
    Worked,
}

/// A unit of work the [`Scheduler`] fires periodically.
#[async_trait::async_trait]
pub trait PeriodicTask: Send + Sync {
    /// Used in logs.
    fn name(&self) -> &str;

    /// Runs one round. Implementations guard themselves with a [`BusyFlag`]
    /// and return [`TickStatus::Skipped`] when it is taken.
    async fn tick(&self) -> bridge_relayer_utils::Result<TickStatus>;
}

/// When a task fires: first after `offset`, then every `cadence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Delay of the first firing.
    pub offset: Duration,
    /// Time between two firings.
    pub cadence: Duration,
}

/// Spreads `workers` evenly over one `cadence`: worker `i` starts at
/// `i * cadence / workers`.
pub fn phase_offsets(cadence: Duration, workers: usize) -> Vec<Duration> {
    let n = u32::try_from(workers).unwrap_or(u32::MAX).max(1);
    (0..n).map(|i| cadence * i / n).collect()
}

/// Runs [`PeriodicTask`]s until shutdown.
pub struct Scheduler {
    cadence: Duration,
    tick_timeout: Duration,
    metrics: Metrics,
    tasks: Vec<Arc<dyn PeriodicTask>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.tasks.iter().map(|t| t.name()).collect();
        f.debug_struct("Scheduler")
            .field("cadence", &self.cadence)
            .field("tick_timeout", &self.tick_timeout)
            .field("tasks", &names)
            .finish()
    }
}

impl Scheduler {
    /// A scheduler firing every `cadence` and giving each tick at most
    /// `tick_timeout`.
    pub fn new(
        cadence: Duration,
        tick_timeout: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            cadence,
            tick_timeout,
            metrics,
            tasks: Vec::new(),
        }
    }

    /// Adds a task. Phases follow the registration order.
    pub fn register(&mut self, task: Arc<dyn PeriodicTask>) -> &mut Self {
        self.tasks.push(task);
        self
    }

    /// The schedule of every registered task, in registration order.
    pub fn schedules(&self) -> Vec<Schedule> {
        phase_offsets(self.cadence, self.tasks.len())
            .into_iter()
            .take(self.tasks.len())
            .map(|offset| Schedule {
                offset,
                cadence: self.cadence,
            })
            .collect()
    }

    /// Fires the tasks until `shutdown` resolves. In-flight ticks are
    /// aborted on return.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let mut drives = JoinSet::new();
        for (schedule, task) in self.schedules().into_iter().zip(self.tasks) {
            tracing::debug!(
                task = task.name(),
                offset = ?schedule.offset,
                cadence = ?schedule.cadence,
                "scheduling",
            );
            drives.spawn(drive(
                task,
                schedule,
                self.tick_timeout,
                self.metrics.clone(),
            ));
        }
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Scheduler is shutting down");
            }
            _ = async { while drives.join_next().await.is_some() {} } => {}
        }
        drives.abort_all();
    }
}

async fn drive(
    task: Arc<dyn PeriodicTask>,
    schedule: Schedule,
    budget: Duration,
    metrics: Metrics,
) {
    let mut interval =
        tokio::time::interval_at(Instant::now() + schedule.offset, schedule.cadence);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight = JoinSet::new();
    loop {
        tokio::select! {
            _ = interval.tick() => {
                in_flight.spawn(fire(task.clone(), budget, metrics.clone()));
            }
            Some(_) = in_flight.join_next() => {}
        }
    }
}

async fn fire(task: Arc<dyn PeriodicTask>, budget: Duration, metrics: Metrics) {
    let name = task.name().to_owned();
    match tokio::time::timeout(budget, task.tick()).await {
        Ok(Ok(TickStatus::Skipped)) => {
            metrics.skipped_ticks.inc();
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Scheduler,
                task = %name,
                skipped = true,
            );
        }
        Ok(Ok(status)) => {
            tracing::trace!(task = %name, ?status, "tick done");
        }
        Ok(Err(e)) => {
            tracing::warn!(task = %name, error = %e, "tick failed");
        }
        Err(_) => {
            metrics.timed_out_ticks.inc();
            tracing::warn!(task = %name, ?budget, "tick ran out of time");
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Scheduler,
                task = %name,
                timed_out = true,
            );
        }
    }
}
