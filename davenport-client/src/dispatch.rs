//! # Operation Dispatcher
//!
//! Purpose: Turn one logical operation into wire calls against a pooled
//! session, applying the retry policy and per-operation timeout.
//!
//! ## Design Principles
//! 1. **Bounded Attempts**: Never more than `max_attempts` wire calls per
//!    dispatch, with exponential backoff between them.
//! 2. **Idempotency-Aware**: A torn IO failure only triggers a resend for
//!    idempotent opcodes; mutations retry solely on an explicit retryable
//!    status from the server.
//! 3. **Fresh Session per Retry**: A failed session is discarded by the
//!    pool, so every retry runs on a healthy connection.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use davenport_common::{DavError, DavResult, RequestFrame, ResponseFrame};

use crate::config::RetryPolicy;
use crate::metrics::{ClientMetrics, MetricsSnapshot};
use crate::pool::SessionPool;

/// Per-dispatch options.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DispatchOptions {
    /// Read-timeout override for this operation only.
    pub timeout: Option<Duration>,
}

/// Applies retry and timeout policy on top of the session pool.
pub(crate) struct Dispatcher {
    pool: SessionPool,
    retry: RetryPolicy,
    read_timeout: Option<Duration>,
    metrics: ClientMetrics,
}

impl Dispatcher {
    pub(crate) fn new(pool: SessionPool, retry: RetryPolicy, read_timeout: Option<Duration>) -> Self {
        Dispatcher {
            pool,
            retry,
            read_timeout,
            metrics: ClientMetrics::new(),
        }
    }

    /// Returns a snapshot of the client metrics.
    pub(crate) fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Executes one operation, retrying per policy.
    ///
    /// A returned frame may still carry a non-success status; mapping
    /// statuses to errors is the decoder's job, since some callers treat
    /// `NotFound` as data rather than failure. `errors_total` counts
    /// transport failures and exhausted retry budgets.
    pub(crate) fn dispatch(
        &self,
        frame: &mut RequestFrame,
        options: &DispatchOptions,
    ) -> DavResult<ResponseFrame> {
        let start = Instant::now();
        let idempotent = frame.opcode.is_idempotent();
        let mut attempt: u32 = 0;

        let result = loop {
            match self.try_once(frame, options) {
                Ok(response)
                    if response.status.is_retryable()
                        && attempt + 1 < self.retry.max_attempts =>
                {
                    debug!(
                        opcode = ?frame.opcode,
                        attempt,
                        status = ?response.status,
                        "retryable status, backing off"
                    );
                }
                Ok(response) => {
                    if response.status.is_retryable() {
                        warn!(
                            opcode = ?frame.opcode,
                            attempts = attempt + 1,
                            "retry budget exhausted"
                        );
                        self.metrics.record_error();
                    }
                    break Ok(response);
                }
                Err(err) => {
                    let transport = matches!(err, DavError::Io(_) | DavError::Timeout(_));
                    if !(transport && idempotent && attempt + 1 < self.retry.max_attempts) {
                        self.metrics.record_error();
                        break Err(err);
                    }
                    debug!(
                        opcode = ?frame.opcode,
                        attempt,
                        error = %err,
                        "transport failure, retrying on a fresh session"
                    );
                }
            }

            self.metrics.record_retry();
            thread::sleep(self.retry.delay_for(attempt));
            attempt += 1;
        };

        self.metrics.record_op(start.elapsed());
        result
    }

    fn try_once(
        &self,
        frame: &mut RequestFrame,
        options: &DispatchOptions,
    ) -> DavResult<ResponseFrame> {
        let mut session = self.pool.acquire()?;
        if let Some(timeout) = options.timeout {
            session.override_read_timeout(timeout)?;
        }
        match session.exec(frame) {
            Err(DavError::Io(err))
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                ) =>
            {
                match options.timeout.or(self.read_timeout) {
                    Some(timeout) => Err(DavError::Timeout(timeout)),
                    None => Err(DavError::Io(err)),
                }
            }
            other => other,
        }
    }
}
