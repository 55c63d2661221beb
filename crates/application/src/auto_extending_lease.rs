use std::time::Duration;

use hotlist_core::{AppError, AppResult};
use hotlist_domain::Lease;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::distributed_lock::DistributedLock;

/// Default bound on one extension call.
pub const DEFAULT_EXTEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Receiver side of the renewal loop's terminal error report.
#[derive(Debug, Clone)]
pub struct LeaseLossSignal {
    receiver: watch::Receiver<Option<AppError>>,
}

impl LeaseLossSignal {
    /// Returns the terminal renewal error, if one was reported.
    #[must_use]
    pub fn current(&self) -> Option<AppError> {
        self.receiver.borrow().clone()
    }

    /// Waits until the renewal loop reports loss of ownership.
    ///
    /// Never completes when the loop was stopped normally.
    pub async fn lost(&mut self) -> AppError {
        let reported = match self.receiver.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };

        match reported {
            Some(error) => error,
            None => std::future::pending().await,
        }
    }
}

struct RenewalTask {
    cancellation: CancellationToken,
    handle: JoinHandle<()>,
}

/// Keeps one lease alive from a background task until stopped.
pub struct AutoExtendingLease {
    lock: DistributedLock,
    extend_timeout: Duration,
    task: Mutex<Option<RenewalTask>>,
}

impl AutoExtendingLease {
    /// Creates an idle renewer bound to `lock`.
    #[must_use]
    pub fn new(lock: DistributedLock) -> Self {
        Self {
            lock,
            extend_timeout: DEFAULT_EXTEND_TIMEOUT,
            task: Mutex::new(None),
        }
    }

    /// Overrides the bound on each extension call.
    #[must_use]
    pub fn with_extend_timeout(mut self, extend_timeout: Duration) -> Self {
        self.extend_timeout = extend_timeout;
        self
    }

    /// Launches the renewal loop for `lease`.
    ///
    /// `renew_interval` must be shorter than `lease_duration`. Fails with
    /// `AlreadyRunning` while a previous loop is still alive.
    pub async fn start(
        &self,
        lease: Lease,
        lease_duration: Duration,
        renew_interval: Duration,
    ) -> AppResult<LeaseLossSignal> {
        validate_intervals(lease_duration, renew_interval)?;

        let mut task = self.task.lock().await;
        if task
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
        {
            return Err(AppError::AlreadyRunning(format!(
                "lease renewal for '{}' is already running",
                lease.lock_name()
            )));
        }

        if let Some(finished) = task.take() {
            join_renewal(finished.handle).await;
        }

        let (sender, receiver) = watch::channel(None);
        let cancellation = CancellationToken::new();
        let handle = tokio::spawn(renewal_loop(
            RenewalLoop {
                lock: self.lock.clone(),
                lease_duration,
                renew_interval,
                extend_timeout: self.extend_timeout,
            },
            lease,
            cancellation.clone(),
            sender,
        ));

        *task = Some(RenewalTask {
            cancellation,
            handle,
        });

        Ok(LeaseLossSignal { receiver })
    }

    /// Signals the loop to exit after its current tick and waits for it.
    ///
    /// Does not release the lease.
    pub async fn stop(&self) {
        let Some(task) = self.task.lock().await.take() else {
            return;
        };

        task.cancellation.cancel();
        join_renewal(task.handle).await;
    }

    /// Returns true while a renewal loop is alive.
    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }
}

impl Drop for AutoExtendingLease {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.cancellation.cancel();
        }
    }
}

fn validate_intervals(lease_duration: Duration, renew_interval: Duration) -> AppResult<()> {
    if renew_interval.is_zero() {
        return Err(AppError::Validation(
            "lease renew interval must be greater than zero".to_owned(),
        ));
    }

    if renew_interval >= lease_duration {
        return Err(AppError::Validation(format!(
            "lease renew interval {renew_interval:?} must be shorter than lease duration {lease_duration:?}"
        )));
    }

    Ok(())
}

async fn join_renewal(handle: JoinHandle<()>) {
    if let Err(join_error) = handle.await {
        warn!(error = %join_error, "lease renewal task ended abnormally");
    }
}

struct RenewalLoop {
    lock: DistributedLock,
    lease_duration: Duration,
    renew_interval: Duration,
    extend_timeout: Duration,
}

async fn renewal_loop(
    config: RenewalLoop,
    mut lease: Lease,
    cancellation: CancellationToken,
    sender: watch::Sender<Option<AppError>>,
) {
    let mut last_confirmed = Instant::now();

    loop {
        tokio::select! {
            biased;
            () = cancellation.cancelled() => {
                debug!(lock_name = %lease.lock_name(), "lease renewal stopped");
                return;
            }
            () = tokio::time::sleep(config.renew_interval) => {}
        }

        let attempt = tokio::time::timeout(
            config.extend_timeout,
            config.lock.extend(&lease, config.lease_duration),
        )
        .await;

        let failure = match attempt {
            Ok(Ok(extended)) => {
                debug!(
                    lock_name = %extended.lock_name(),
                    expires_at = %extended.expires_at(),
                    "lease extended"
                );
                lease = extended;
                last_confirmed = Instant::now();
                continue;
            }
            Ok(Err(extend_error)) => extend_error,
            Err(_) => AppError::Timeout(format!(
                "extending lock '{}' exceeded {:?}",
                lease.lock_name(),
                config.extend_timeout
            )),
        };

        if !failure.is_ownership_loss() && last_confirmed.elapsed() < config.lease_duration {
            warn!(
                lock_name = %lease.lock_name(),
                error = %failure,
                "lease extension failed, retrying on next tick"
            );
            continue;
        }

        let terminal = if failure.is_ownership_loss() {
            failure
        } else {
            AppError::NotFound(format!(
                "lock '{}' expired while extensions were failing: {failure}",
                lease.lock_name()
            ))
        };

        error!(
            lock_name = %lease.lock_name(),
            holder_id = %config.lock.holder_id(),
            error = %terminal,
            "lease ownership lost"
        );
        sender.send_replace(Some(terminal));
        return;
    }
}
