use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::db;
use crate::directory::Directory;

/// Outcome of a single pass over the due messages.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
    /// The pass did not run because another one was still in progress.
    pub skipped: bool,
}

/// Periodically delivers scheduled messages whose time has come.
///
/// Delivery is at-least-once: the `sent` flag is written after the platform
/// accepts the message, so a crash in between resends it on the next pass.
pub struct Dispatcher {
    db: SqlitePool,
    directory: Arc<dyn Directory>,
    period: Duration,
    in_flight: Mutex<()>,
}

/// Running dispatch loop. Dropping it leaves the loop running; call [`stop`](Self::stop).
pub struct DispatchHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DispatchHandle {
    /// Signals the loop and waits for the current pass to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("dispatch loop panicked: {e}");
        }
    }
}

impl Dispatcher {
    pub fn new(db: SqlitePool, directory: Arc<dyn Directory>, period: Duration) -> Self {
        Self {
            db,
            directory,
            period,
            in_flight: Mutex::new(()),
        }
    }

    pub fn spawn(self: Arc<Self>) -> DispatchHandle {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        DispatchHandle { shutdown, task }
    }

    /// Ticks every `period` until `shutdown` flips to `true`. The first pass
    /// runs immediately; late ticks are skipped rather than bunched up.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(period_secs = self.period.as_secs(), "dispatch loop started");
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick().await;
                    if report.due > 0 {
                        info!(due = report.due, sent = report.sent, failed = report.failed, "dispatch pass finished");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("dispatch loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    pub async fn tick(&self) -> TickReport {
        self.tick_at(Utc::now()).await
    }

    /// Delivers every unsent message scheduled at or before `now`, one at a
    /// time in schedule order. A failure only affects its own message.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let Ok(_guard) = self.in_flight.try_lock() else {
            warn!("previous dispatch pass still running, skipping");
            return TickReport {
                skipped: true,
                ..TickReport::default()
            };
        };

        let now_str = db::timestamp(now);
        let due = match db::messages::find_due(&self.db, &now_str).await {
            Ok(due) => due,
            Err(e) => {
                error!("Error checking scheduled messages: {e}");
                return TickReport::default();
            }
        };

        let mut report = TickReport {
            due: due.len(),
            ..TickReport::default()
        };

        for message in due {
            if let Err(e) = self
                .directory
                .send_message(&message.channel_id, &message.content)
                .await
            {
                report.failed += 1;
                error!(message_id = %message.id, channel_id = %message.channel_id, "Failed to send message: {e}");
                continue;
            }

            match db::messages::mark_sent(&self.db, &message.id).await {
                Ok(true) => {
                    report.sent += 1;
                    info!(message_id = %message.id, "Sent scheduled message at {}", now_str);
                }
                Ok(false) => {
                    report.sent += 1;
                    warn!(message_id = %message.id, "Message delivered but was changed or removed before it could be marked sent");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(message_id = %message.id, "Message delivered but marking it sent failed: {e}");
                }
            }
        }

        report
    }
}
