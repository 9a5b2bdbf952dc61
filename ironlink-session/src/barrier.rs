/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Startup barrier.
//!
//! Counts down once per configured connection when that connection reaches
//! its readiness event, and releases everyone waiting once the count is zero.

use ironlink_core::connection::{ConnectionId, ReadinessEvent};
use ironlink_core::error::{LinkError, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Countdown over the connections configured at startup.
#[derive(Debug)]
pub struct StartupBarrier {
    pending: Mutex<HashMap<ConnectionId, ReadinessEvent>>,
    released: Condvar,
    remaining: watch::Sender<usize>,
}

impl StartupBarrier {
    /// Creates a barrier expecting `event` from each listed connection.
    #[must_use]
    pub fn new(expected: impl IntoIterator<Item = (ConnectionId, ReadinessEvent)>) -> Self {
        let pending: HashMap<_, _> = expected.into_iter().collect();
        let (remaining, _) = watch::channel(pending.len());
        Self {
            pending: Mutex::new(pending),
            released: Condvar::new(),
            remaining,
        }
    }

    /// Records that `connection` reached `event`.
    ///
    /// Returns true only if this call counted the connection down. Events that
    /// do not match the connection's expected one, unknown connections, and
    /// repeated arrivals are ignored.
    pub fn arrive(&self, connection: &ConnectionId, event: ReadinessEvent) -> bool {
        let mut pending = self.pending.lock();
        if pending.get(connection) != Some(&event) {
            return false;
        }
        pending.remove(connection);
        let remaining = pending.len();
        self.remaining.send_replace(remaining);
        debug!(connection = %connection, ?event, remaining, "startup barrier arrival");

        if remaining == 0 {
            info!("all configured connections ready");
            self.released.notify_all();
        }
        true
    }

    /// Number of connections that have not arrived yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns true once every connection has arrived.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.remaining() == 0
    }

    /// Display names of the connections still pending, sorted.
    #[must_use]
    pub fn pending(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pending.lock().keys().map(ToString::to_string).collect();
        names.sort();
        names
    }

    /// Blocks the current thread until every connection has arrived.
    ///
    /// `None` disables the check and returns immediately. A timeout too large
    /// to express as a deadline waits without one.
    ///
    /// # Errors
    /// Returns [`LinkError::StartupTimeout`] naming the pending connections if
    /// the timeout elapses first.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<()> {
        let Some(timeout) = timeout else {
            return Ok(());
        };
        let deadline = Instant::now().checked_add(timeout);

        let mut pending = self.pending.lock();
        while !pending.is_empty() {
            match deadline {
                Some(deadline) => {
                    if self.released.wait_until(&mut pending, deadline).timed_out() {
                        break;
                    }
                }
                None => self.released.wait(&mut pending),
            }
        }
        if pending.is_empty() {
            return Ok(());
        }
        drop(pending);
        Err(self.timed_out(timeout))
    }

    /// Async variant of [`StartupBarrier::wait`].
    ///
    /// # Errors
    /// As [`StartupBarrier::wait`].
    pub async fn wait_async(&self, timeout: Option<Duration>) -> Result<()> {
        let Some(timeout) = timeout else {
            return Ok(());
        };
        let mut remaining = self.remaining.subscribe();
        let released = tokio::time::timeout(timeout, async {
            // The sender lives as long as `self`, so this only ends on zero.
            let _ = remaining.wait_for(|count| *count == 0).await;
        })
        .await;

        match released {
            Ok(()) => Ok(()),
            Err(_) => Err(self.timed_out(timeout)),
        }
    }

    fn timed_out(&self, timeout: Duration) -> LinkError {
        let pending = self.pending();
        warn!(?timeout, ?pending, "startup timed out");
        LinkError::StartupTimeout { timeout, pending }
    }
}
