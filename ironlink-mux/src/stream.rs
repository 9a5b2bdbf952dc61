/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Keep-newest delivery streams.
//!
//! A [`Subscription`] is the receiving end of one sink. Matched messages are
//! pushed into a bounded ring; when the consumer falls behind, the oldest
//! undelivered message is overwritten so the connection's read loop never
//! blocks and memory stays bounded. Buffered messages are always handed out
//! before the terminal error.

use crate::sink::{SinkCallbacks, SinkHandle, SinkId};
use crossbeam_queue::ArrayQueue;
use ironlink_core::connection::ConnectionId;
use ironlink_core::error::ConnectionDropped;
use ironlink_core::message::Message;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::trace;

/// Why a subscription yielded no message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecvError {
    /// The connection dropped. Returned once, after all buffered messages.
    #[error(transparent)]
    Dropped(#[from] ConnectionDropped),

    /// The subscription was disposed, torn down, or already reported its error.
    #[error("subscription closed")]
    Closed,

    /// No correlated message arrived in time.
    #[error("no correlated message within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug)]
enum Terminal {
    Dropped(ConnectionDropped),
    Closed,
}

/// Producer side shared between the sink callbacks and the subscription.
#[derive(Debug)]
pub(crate) struct StreamShared {
    queue: ArrayQueue<Message>,
    terminal: Mutex<Option<Terminal>>,
    notify: Notify,
    overwritten: AtomicU64,
}

impl StreamShared {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            terminal: Mutex::new(None),
            notify: Notify::new(),
            overwritten: AtomicU64::new(0),
        }
    }

    fn finish(&self, terminal: Terminal) {
        {
            let mut slot = self.terminal.lock();
            if slot.is_none() {
                *slot = Some(terminal);
            }
        }
        self.notify.notify_one();
    }
}

impl SinkCallbacks for StreamShared {
    fn on_message(&self, message: &Message) {
        if self.queue.force_push(message.clone()).is_some() {
            let total = self.overwritten.fetch_add(1, Ordering::Relaxed) + 1;
            trace!(overwritten = total, "subscription lagging, dropped oldest message");
        }
        self.notify.notify_one();
    }

    fn on_error(&self, error: &ConnectionDropped) {
        self.finish(Terminal::Dropped(error.clone()));
    }

    fn on_closed(&self) {
        self.finish(Terminal::Closed);
    }
}

/// Receiving end of a sink.
///
/// Dropping the subscription disposes its sink.
#[derive(Debug)]
pub struct Subscription {
    handle: SinkHandle,
    shared: Arc<StreamShared>,
}

impl Subscription {
    pub(crate) fn new(handle: SinkHandle, shared: Arc<StreamShared>) -> Self {
        Self { handle, shared }
    }

    /// Returns the underlying sink identifier.
    #[must_use]
    pub fn sink_id(&self) -> SinkId {
        self.handle.id()
    }

    /// Returns the connection this subscription listens on.
    #[must_use]
    pub fn connection(&self) -> &ConnectionId {
        self.handle.connection()
    }

    /// Returns the sink handle.
    #[must_use]
    pub fn handle(&self) -> &SinkHandle {
        &self.handle
    }

    /// Number of messages overwritten because the consumer fell behind.
    #[must_use]
    pub fn overwritten(&self) -> u64 {
        self.shared.overwritten.load(Ordering::Relaxed)
    }

    /// Receives the next correlated message.
    ///
    /// # Errors
    /// [`RecvError::Dropped`] once the connection drops and the buffer is
    /// drained, [`RecvError::Closed`] afterwards or once disposed.
    pub async fn recv(&mut self) -> Result<Message, RecvError> {
        loop {
            if let Some(ready) = self.poll_ready() {
                return ready;
            }
            self.shared.notify.notified().await;
        }
    }

    /// Receives the next correlated message, giving up after `timeout`.
    ///
    /// # Errors
    /// As [`Subscription::recv`], plus [`RecvError::Timeout`].
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Message, RecvError> {
        tokio::time::timeout(timeout, self.recv())
            .await
            .map_err(|_| RecvError::Timeout(timeout))?
    }

    /// Returns a buffered message without waiting; `Ok(None)` if none yet.
    ///
    /// # Errors
    /// As [`Subscription::recv`].
    pub fn try_recv(&mut self) -> Result<Option<Message>, RecvError> {
        self.poll_ready().transpose()
    }

    /// Disposes the sink and closes the stream. Idempotent.
    pub fn dispose(&self) -> bool {
        let changed = self.handle.dispose();
        self.shared.finish(Terminal::Closed);
        changed
    }

    fn poll_ready(&mut self) -> Option<Result<Message, RecvError>> {
        if let Some(message) = self.shared.queue.pop() {
            return Some(Ok(message));
        }

        let mut terminal = self.shared.terminal.lock();
        if terminal.is_none() {
            return None;
        }

        // Everything pushed before the terminal state is visible now.
        if let Some(message) = self.shared.queue.pop() {
            return Some(Ok(message));
        }

        match terminal.replace(Terminal::Closed) {
            Some(Terminal::Dropped(error)) => Some(Err(RecvError::Dropped(error))),
            _ => Some(Err(RecvError::Closed)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironlink_core::error::DropCause;
    use ironlink_core::field::tags;
    use ironlink_core::message::MsgType;

    fn report(id: &str) -> Message {
        Message::new(MsgType::ExecutionReport).with_field(tags::CL_ORD_ID, id)
    }

    fn dropped() -> ConnectionDropped {
        ConnectionDropped::new(
            ConnectionId::new("FIX.4.4", "CLIENT", "BROKER"),
            DropCause::Disconnect,
        )
    }

    #[test]
    fn test_keep_newest_overwrites_oldest() {
        let shared = StreamShared::new(2);
        shared.on_message(&report("1"));
        shared.on_message(&report("2"));
        shared.on_message(&report("3"));

        assert_eq!(shared.overwritten.load(Ordering::Relaxed), 1);
        let first = shared.queue.pop().unwrap();
        let second = shared.queue.pop().unwrap();
        assert_eq!(first.get_field_str(tags::CL_ORD_ID), Some("2"));
        assert_eq!(second.get_field_str(tags::CL_ORD_ID), Some("3"));
        assert!(shared.queue.pop().is_none());
    }

    #[test]
    fn test_first_terminal_state_wins() {
        let shared = StreamShared::new(4);
        shared.on_error(&dropped());
        shared.on_closed();

        assert!(matches!(
            shared.terminal.lock().as_ref(),
            Some(Terminal::Dropped(_))
        ));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let shared = StreamShared::new(0);
        shared.on_message(&report("1"));
        assert_eq!(shared.queue.capacity(), 1);
        assert_eq!(shared.queue.len(), 1);
    }
}
