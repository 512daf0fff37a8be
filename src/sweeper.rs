// src/sweeper.rs - Expiry sweeper for the history tab
use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time;

use crate::{DeletedNote, FlashError, Result, WeakNoteStore};

/// Removes deleted notes older than `retention` as of `now`.
///
/// A note deleted exactly `retention` ago is kept. Returns how many were dropped.
pub fn sweep_expired(deleted: &mut Vec<DeletedNote>, now: DateTime<Utc>, retention: Duration) -> usize {
    let before = deleted.len();
    deleted.retain(|note| now - note.deleted_at <= retention);
    before - deleted.len()
}

#[derive(Debug)]
pub enum SweeperCommand {
    /// Sweep immediately and report how many notes were evicted
    SweepNow(oneshot::Sender<usize>),
    /// Stop the sweeper
    Stop,
}

/// Periodically evicts expired notes from a store's history.
///
/// Idle until [`start`](Self::start), armed until [`stop`](Self::stop).
pub struct ExpirySweeper {
    /// Time between two sweeps
    interval: std::time::Duration,

    /// Channel to send commands to the sweeper task
    command_tx: Option<mpsc::Sender<SweeperCommand>>,

    /// Handle to the sweeper task
    sweeper_task: Option<JoinHandle<()>>,
}

impl ExpirySweeper {
    pub fn new(interval: std::time::Duration) -> Self {
        Self {
            interval,
            command_tx: None,
            sweeper_task: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.sweeper_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Arms the timer against `store`. Starting an armed sweeper does nothing.
    pub fn start(&mut self, store: WeakNoteStore) -> Result<()> {
        if self.is_armed() {
            debug!("Expiry sweeper already running");
            return Ok(());
        }
        if store.upgrade().is_none() {
            return Err(FlashError::SchedulerError {
                message: "note store is no longer alive".to_string(),
            });
        }

        info!("Starting expiry sweeper every {:?}", self.interval);
        let (command_tx, mut command_rx) = mpsc::channel(10);
        let period = self.interval;

        let task = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.tick().await; // Initial tick

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if run_sweep(&store).is_none() {
                            debug!("Note store dropped, expiry sweeper exiting");
                            break;
                        }
                    }
                    command = command_rx.recv() => match command {
                        Some(SweeperCommand::SweepNow(reply)) => {
                            let evicted = run_sweep(&store).unwrap_or(0);
                            let _ = reply.send(evicted);
                        }
                        Some(SweeperCommand::Stop) | None => {
                            info!("Expiry sweeper stopping...");
                            break;
                        }
                    }
                }
            }
        });

        self.command_tx = Some(command_tx);
        self.sweeper_task = Some(task);
        Ok(())
    }

    /// Stops the timer if it's armed and waits for the task to finish
    pub async fn stop(&mut self) -> Result<()> {
        let Some(task) = self.sweeper_task.take() else {
            debug!("Expiry sweeper is not running");
            return Ok(());
        };

        if let Some(command_tx) = self.command_tx.take() {
            if let Err(e) = command_tx.send(SweeperCommand::Stop).await {
                debug!("Sweeper task already gone: {}", e);
            }
        }

        if let Err(e) = task.await {
            let message = format!("Failed to stop expiry sweeper: {}", e);
            error!("{}", message);
            return Err(FlashError::SchedulerError { message });
        }

        info!("Expiry sweeper stopped");
        Ok(())
    }

    /// Asks the running task to sweep now and returns how many notes it evicted
    pub async fn sweep_now(&self) -> Result<usize> {
        let command_tx = match &self.command_tx {
            Some(tx) if self.is_armed() => tx,
            _ => {
                return Err(FlashError::SchedulerError {
                    message: "Expiry sweeper is not running".to_string(),
                })
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        command_tx
            .send(SweeperCommand::SweepNow(reply_tx))
            .await
            .map_err(|e| FlashError::SchedulerError {
                message: format!("Failed to send sweep command: {}", e),
            })?;
        reply_rx.await.map_err(|e| FlashError::SchedulerError {
            message: format!("Sweeper did not answer: {}", e),
        })
    }
}

/// Sweeps the store once; `None` when the store is gone
fn run_sweep(store: &WeakNoteStore) -> Option<usize> {
    let store = store.upgrade()?;
    let now = Utc::now();
    let evicted = store.purge_expired(now);
    debug!("Sweep at {} evicted {} notes", now, evicted);
    Some(evicted)
}
