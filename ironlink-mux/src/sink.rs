/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Sinks: registered waiters for correlated messages.
//!
//! A sink pairs a correlation rule with two callbacks and belongs to exactly
//! one connection. Its phase moves one way only, from active to terminated
//! (after its error callback) or disposed. Callbacks for one sink are
//! serialized by a per-sink re-entrant lock, so no message is delivered after
//! the error callback and nothing at all once disposal has returned.

use crate::multiplexer::MuxShared;
use crate::rule::SharedRule;
use ironlink_core::connection::ConnectionId;
use ironlink_core::error::ConnectionDropped;
use ironlink_core::message::Message;
use parking_lot::ReentrantMutex;
use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique sink identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SinkId(u64);

impl SinkId {
    fn next() -> Self {
        Self(NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink-{}", self.0)
    }
}

/// Callbacks invoked by the multiplexer for one sink.
///
/// Implementations must not block: they run on the connection's inbound path.
pub trait SinkCallbacks: Send + Sync {
    /// Called for every inbound message the sink's rule matches.
    fn on_message(&self, message: &Message);

    /// Called once when the owning connection drops. Final callback.
    fn on_error(&self, error: &ConnectionDropped);

    /// Called once when the owning multiplexer is torn down. Final callback.
    fn on_closed(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkPhase {
    Active,
    Terminated,
    Disposed,
}

/// One registered waiter.
pub struct Sink {
    id: SinkId,
    connection: ConnectionId,
    rule: SharedRule,
    callbacks: Arc<dyn SinkCallbacks>,
    phase: ReentrantMutex<Cell<SinkPhase>>,
}

impl Sink {
    pub(crate) fn new(
        connection: ConnectionId,
        rule: SharedRule,
        callbacks: Arc<dyn SinkCallbacks>,
    ) -> Self {
        Self {
            id: SinkId::next(),
            connection,
            rule,
            callbacks,
            phase: ReentrantMutex::new(Cell::new(SinkPhase::Active)),
        }
    }

    /// Returns the sink identifier.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> SinkId {
        self.id
    }

    /// Returns the owning connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &ConnectionId {
        &self.connection
    }

    /// Returns true until the sink is terminated or disposed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.phase.lock().get() == SinkPhase::Active
    }

    /// Offers a message; returns true if it matched and was delivered.
    pub(crate) fn deliver(&self, message: &Message) -> bool {
        if !self.rule.matches(message) {
            return false;
        }
        let phase = self.phase.lock();
        if phase.get() != SinkPhase::Active {
            return false;
        }
        self.callbacks.on_message(message);
        true
    }

    /// Moves to terminated and fires the error callback, at most once.
    pub(crate) fn terminate(&self, error: &ConnectionDropped) -> bool {
        let phase = self.phase.lock();
        if phase.get() != SinkPhase::Active {
            return false;
        }
        phase.set(SinkPhase::Terminated);
        self.callbacks.on_error(error);
        true
    }

    /// Moves to disposed without any callback.
    pub(crate) fn dispose(&self) -> bool {
        let phase = self.phase.lock();
        if phase.get() != SinkPhase::Active {
            return false;
        }
        phase.set(SinkPhase::Disposed);
        true
    }

    /// Moves to disposed and fires the close callback.
    pub(crate) fn close(&self) -> bool {
        let phase = self.phase.lock();
        if phase.get() != SinkPhase::Active {
            return false;
        }
        phase.set(SinkPhase::Disposed);
        self.callbacks.on_closed();
        true
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("id", &self.id)
            .field("connection", &self.connection)
            .field("phase", &self.phase.lock().get())
            .finish()
    }
}

/// Caller-side handle to a registered sink.
///
/// Disposing through the handle removes the sink from its connection's active
/// set. Disposal is idempotent.
#[derive(Debug, Clone)]
pub struct SinkHandle {
    sink: Arc<Sink>,
    owner: Weak<MuxShared>,
}

impl SinkHandle {
    pub(crate) fn new(sink: Arc<Sink>, owner: Weak<MuxShared>) -> Self {
        Self { sink, owner }
    }

    /// Returns the sink identifier.
    #[must_use]
    pub fn id(&self) -> SinkId {
        self.sink.id()
    }

    /// Returns the owning connection.
    #[must_use]
    pub fn connection(&self) -> &ConnectionId {
        self.sink.connection()
    }

    /// Returns true until the sink is terminated or disposed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.sink.is_active()
    }

    /// Removes the sink. Returns true if this call changed anything.
    pub fn dispose(&self) -> bool {
        match self.owner.upgrade() {
            Some(owner) => owner.dispose(&self.sink),
            None => self.sink.dispose(),
        }
    }
}
