/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Per-connection correlation multiplexer.
//!
//! Holds the active sink set and the drop record of one connection behind a
//! single lock. Registration, broadcast, resume and disposal take the write
//! side; dispatch snapshots the set under the read side and invokes callbacks
//! with no lock held, so concurrent dispatches proceed in parallel.
//!
//! While a drop record is present the set is empty and stays empty: a new
//! registration is answered with the recorded error on the spot.

use crate::rule::SharedRule;
use crate::sink::{Sink, SinkCallbacks, SinkHandle, SinkId};
use crate::stream::{StreamShared, Subscription};
use ironlink_core::connection::ConnectionId;
use ironlink_core::error::ConnectionDropped;
use ironlink_core::message::{Message, MessageKind};
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, trace};

/// Default number of undelivered messages buffered per subscription.
pub const DEFAULT_SINK_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct MuxState {
    sinks: BTreeMap<SinkId, Arc<Sink>>,
    drop_record: Option<ConnectionDropped>,
    closed: bool,
}

enum Admission {
    Admitted,
    Dropped(ConnectionDropped),
    Closed,
}

#[derive(Debug)]
pub(crate) struct MuxShared {
    connection: ConnectionId,
    capacity: usize,
    state: RwLock<MuxState>,
}

impl MuxShared {
    pub(crate) fn dispose(&self, sink: &Sink) -> bool {
        let removed = self.state.write().sinks.remove(&sink.id()).is_some();
        let disposed = sink.dispose();
        if removed || disposed {
            trace!(connection = %self.connection, sink = %sink.id(), "sink disposed");
        }
        removed || disposed
    }
}

/// Correlation multiplexer for one connection.
///
/// Cheap to clone; clones share the same sink set.
#[derive(Debug, Clone)]
pub struct Multiplexer {
    shared: Arc<MuxShared>,
}

impl Multiplexer {
    /// Creates a multiplexer with the default subscription capacity.
    #[must_use]
    pub fn new(connection: ConnectionId) -> Self {
        Self::with_capacity(connection, DEFAULT_SINK_CAPACITY)
    }

    /// Creates a multiplexer whose subscriptions buffer `capacity` messages.
    #[must_use]
    pub fn with_capacity(connection: ConnectionId, capacity: usize) -> Self {
        Self {
            shared: Arc::new(MuxShared {
                connection,
                capacity: capacity.max(1),
                state: RwLock::new(MuxState::default()),
            }),
        }
    }

    /// Returns the connection this multiplexer serves.
    #[must_use]
    pub fn connection_id(&self) -> &ConnectionId {
        &self.shared.connection
    }

    /// Registers a callback-level sink.
    ///
    /// If the connection is currently dropped, `on_error` fires with the
    /// recorded error before this returns and the sink never becomes active.
    pub fn register(&self, rule: SharedRule, callbacks: Arc<dyn SinkCallbacks>) -> SinkHandle {
        let sink = Arc::new(Sink::new(self.shared.connection.clone(), rule, callbacks));

        let admission = {
            let mut state = self.shared.state.write();
            if state.closed {
                Admission::Closed
            } else if let Some(recorded) = &state.drop_record {
                Admission::Dropped(recorded.clone())
            } else {
                state.sinks.insert(sink.id(), Arc::clone(&sink));
                Admission::Admitted
            }
        };

        match admission {
            Admission::Admitted => {
                trace!(connection = %self.shared.connection, sink = %sink.id(), "sink registered");
            }
            Admission::Dropped(recorded) => {
                debug!(
                    connection = %self.shared.connection,
                    sink = %sink.id(),
                    "connection is dropped, failing new sink immediately"
                );
                self.guarded(&sink, "error", || {
                    sink.terminate(&recorded);
                });
            }
            Admission::Closed => {
                self.guarded(&sink, "close", || {
                    sink.close();
                });
            }
        }

        SinkHandle::new(sink, Arc::downgrade(&self.shared))
    }

    /// Registers a sink backed by a keep-newest stream.
    pub fn subscribe(&self, rule: SharedRule) -> Subscription {
        let shared = Arc::new(StreamShared::new(self.shared.capacity));
        let handle = self.register(rule, Arc::clone(&shared) as Arc<dyn SinkCallbacks>);
        Subscription::new(handle, shared)
    }

    /// Offers `message` to every active sink; returns how many received it.
    ///
    /// A panicking rule or callback is logged and skipped; it never affects
    /// other sinks or the caller.
    pub fn dispatch(&self, message: &Message) -> usize {
        let snapshot: SmallVec<[Arc<Sink>; 8]> =
            self.shared.state.read().sinks.values().cloned().collect();

        let mut delivered = 0;
        for sink in &snapshot {
            let mut matched = false;
            self.guarded(sink, "message", || {
                matched = sink.deliver(message);
            });
            if matched {
                delivered += 1;
            }
        }

        if delivered == 0 && message.kind() != MessageKind::Keepalive {
            debug!(
                connection = %self.shared.connection,
                msg_type = %message.msg_type(),
                "orphaned response, no sink matched"
            );
        }
        delivered
    }

    /// Records `error` and fails every active sink with it, exactly once.
    ///
    /// Returns the number of sinks notified. Until [`Multiplexer::resume`],
    /// every new registration fails immediately with the same error.
    pub fn dispatch_error(&self, error: ConnectionDropped) -> usize {
        let drained: Vec<Arc<Sink>> = {
            let mut state = self.shared.state.write();
            state.drop_record = Some(error.clone());
            std::mem::take(&mut state.sinks).into_values().collect()
        };

        let mut notified = 0;
        for sink in &drained {
            let mut terminated = false;
            self.guarded(sink, "error", || {
                terminated = sink.terminate(&error);
            });
            if terminated {
                notified += 1;
            }
        }

        info!(
            connection = %self.shared.connection,
            cause = %error.cause,
            sinks = notified,
            "connection drop broadcast"
        );
        notified
    }

    /// Clears the drop record so new registrations become live again.
    pub fn resume(&self) {
        let previous = self.shared.state.write().drop_record.take();
        if previous.is_some() {
            info!(connection = %self.shared.connection, "drop record cleared");
        }
    }

    /// Returns the current drop record.
    #[must_use]
    pub fn drop_record(&self) -> Option<ConnectionDropped> {
        self.shared.state.read().drop_record.clone()
    }

    /// Returns true if a drop record is present.
    #[must_use]
    pub fn is_dropped(&self) -> bool {
        self.shared.state.read().drop_record.is_some()
    }

    /// Removes a sink. Idempotent; once this returns the sink sees nothing more.
    pub fn dispose(&self, handle: &SinkHandle) -> bool {
        handle.dispose()
    }

    /// Number of active sinks.
    #[must_use]
    pub fn active_sinks(&self) -> usize {
        self.shared.state.read().sinks.len()
    }

    /// Tears the multiplexer down: every sink is closed without an error and
    /// later registrations close immediately.
    pub fn close(&self) -> usize {
        let drained: Vec<Arc<Sink>> = {
            let mut state = self.shared.state.write();
            state.closed = true;
            std::mem::take(&mut state.sinks).into_values().collect()
        };

        for sink in &drained {
            self.guarded(sink, "close", || {
                sink.close();
            });
        }
        debug!(connection = %self.shared.connection, sinks = drained.len(), "multiplexer closed");
        drained.len()
    }

    fn guarded(&self, sink: &Sink, stage: &'static str, f: impl FnOnce()) {
        if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
            error!(
                connection = %self.shared.connection,
                sink = %sink.id(),
                stage,
                "sink callback panicked"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{match_cl_ord_id, match_msg_type};
    use crate::stream::RecvError;
    use ironlink_core::error::DropCause;
    use ironlink_core::field::tags;
    use ironlink_core::message::MsgType;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        messages: Mutex<Vec<String>>,
        errors: Mutex<Vec<ConnectionDropped>>,
    }

    impl SinkCallbacks for Recorder {
        fn on_message(&self, message: &Message) {
            let id = message.get_field_str(tags::CL_ORD_ID).unwrap_or_default();
            self.messages.lock().push(id.to_string());
        }

        fn on_error(&self, error: &ConnectionDropped) {
            self.errors.lock().push(error.clone());
        }
    }

    struct Panicker;

    impl SinkCallbacks for Panicker {
        fn on_message(&self, _message: &Message) {
            panic!("boom");
        }

        fn on_error(&self, _error: &ConnectionDropped) {
            panic!("boom");
        }
    }

    fn connection() -> ConnectionId {
        ConnectionId::new("FIX.4.4", "CLIENT", "A")
    }

    fn report(id: &str) -> Message {
        Message::new(MsgType::ExecutionReport).with_field(tags::CL_ORD_ID, id)
    }

    fn logout_drop() -> ConnectionDropped {
        ConnectionDropped::new(connection(), DropCause::Logout).with_reason("maintenance")
    }

    #[test]
    fn test_match_by_id_scenario() {
        let mux = Multiplexer::new(connection());
        let recorder = Arc::new(Recorder::default());
        let _handle = mux.register(match_cl_ord_id("REQ-1"), recorder.clone());

        assert_eq!(mux.dispatch(&report("REQ-1")), 1);
        assert_eq!(mux.dispatch(&report("REQ-2")), 0);

        assert_eq!(*recorder.messages.lock(), vec!["REQ-1".to_string()]);
    }

    #[test]
    fn test_sink_receives_exact_subset_in_order() {
        let mux = Multiplexer::new(connection());
        let recorder = Arc::new(Recorder::default());
        let even: SharedRule = Arc::new(|m: &Message| {
            m.get_field_as::<u32>(tags::CL_ORD_ID)
                .is_some_and(|n| n % 2 == 0)
        });
        let _handle = mux.register(even, recorder.clone());

        for n in 0..10 {
            mux.dispatch(&report(&n.to_string()));
        }

        let expected: Vec<String> = ["0", "2", "4", "6", "8"].iter().map(|s| s.to_string()).collect();
        assert_eq!(*recorder.messages.lock(), expected);
    }

    #[test]
    fn test_broadcast_then_freeze_scenario() {
        let mux = Multiplexer::new(connection());
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let _a = mux.register(match_msg_type(MsgType::ExecutionReport), first.clone());
        let _b = mux.register(match_msg_type(MsgType::ExecutionReport), second.clone());

        assert_eq!(mux.dispatch_error(logout_drop()), 2);
        assert_eq!(mux.active_sinks(), 0);

        let third = Arc::new(Recorder::default());
        let late = mux.register(match_msg_type(MsgType::ExecutionReport), third.clone());
        assert!(!late.is_active());
        mux.dispatch(&report("X"));

        for recorder in [&first, &second, &third] {
            let errors = recorder.errors.lock();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].cause, DropCause::Logout);
            assert_eq!(errors[0].reason.as_deref(), Some("maintenance"));
            assert!(recorder.messages.lock().is_empty());
        }
    }

    #[test]
    fn test_repeated_broadcast_does_not_renotify() {
        let mux = Multiplexer::new(connection());
        let recorder = Arc::new(Recorder::default());
        let _handle = mux.register(match_cl_ord_id("A"), recorder.clone());

        mux.dispatch_error(logout_drop());
        assert_eq!(mux.dispatch_error(logout_drop()), 0);
        assert_eq!(recorder.errors.lock().len(), 1);
    }

    #[test]
    fn test_resume_reopens_subscriptions() {
        let mux = Multiplexer::new(connection());
        mux.dispatch_error(logout_drop());
        assert!(mux.is_dropped());

        mux.resume();
        assert!(mux.drop_record().is_none());

        let recorder = Arc::new(Recorder::default());
        let handle = mux.register(match_cl_ord_id("REQ-9"), recorder.clone());
        assert!(handle.is_active());
        assert_eq!(mux.dispatch(&report("REQ-9")), 1);
        assert!(recorder.errors.lock().is_empty());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mux = Multiplexer::new(connection());
        let recorder = Arc::new(Recorder::default());
        let handle = mux.register(match_cl_ord_id("A"), recorder.clone());

        assert!(mux.dispose(&handle));
        assert!(!mux.dispose(&handle));
        assert_eq!(mux.active_sinks(), 0);

        mux.dispatch(&report("A"));
        mux.dispatch_error(logout_drop());
        assert!(recorder.messages.lock().is_empty());
        assert!(recorder.errors.lock().is_empty());
    }

    #[test]
    fn test_dispose_from_inside_callback() {
        struct SelfDisposing {
            handle: Mutex<Option<SinkHandle>>,
            seen: Mutex<u32>,
        }

        impl SinkCallbacks for SelfDisposing {
            fn on_message(&self, _message: &Message) {
                *self.seen.lock() += 1;
                if let Some(handle) = self.handle.lock().as_ref() {
                    handle.dispose();
                }
            }

            fn on_error(&self, _error: &ConnectionDropped) {}
        }

        let mux = Multiplexer::new(connection());
        let callbacks = Arc::new(SelfDisposing {
            handle: Mutex::new(None),
            seen: Mutex::new(0),
        });
        let handle = mux.register(match_cl_ord_id("A"), callbacks.clone());
        *callbacks.handle.lock() = Some(handle);

        mux.dispatch(&report("A"));
        mux.dispatch(&report("A"));
        assert_eq!(*callbacks.seen.lock(), 1);
        assert_eq!(mux.active_sinks(), 0);
    }

    #[test]
    fn test_panicking_sink_does_not_affect_others() {
        let mux = Multiplexer::new(connection());
        let recorder = Arc::new(Recorder::default());
        let _bad = mux.register(match_cl_ord_id("A"), Arc::new(Panicker));
        let _good = mux.register(match_cl_ord_id("A"), recorder.clone());

        assert_eq!(mux.dispatch(&report("A")), 1);
        assert_eq!(mux.dispatch_error(logout_drop()), 1);
        assert_eq!(recorder.messages.lock().len(), 1);
        assert_eq!(recorder.errors.lock().len(), 1);
    }

    #[test]
    fn test_close_tears_down_sinks() {
        let mux = Multiplexer::new(connection());
        let recorder = Arc::new(Recorder::default());
        let handle = mux.register(match_cl_ord_id("A"), recorder.clone());

        assert_eq!(mux.close(), 1);
        assert!(!handle.is_active());
        let late = mux.register(match_cl_ord_id("A"), recorder.clone());
        assert!(!late.is_active());
        assert_eq!(mux.dispatch(&report("A")), 0);
        assert!(recorder.errors.lock().is_empty());
    }

    #[tokio::test]
    async fn test_subscription_drains_messages_before_error() {
        let mux = Multiplexer::new(connection());
        let mut sub = mux.subscribe(match_cl_ord_id("REQ-1"));

        mux.dispatch(&report("REQ-1"));
        mux.dispatch(&report("REQ-1"));
        mux.dispatch_error(logout_drop());

        assert!(sub.recv().await.is_ok());
        assert!(sub.recv().await.is_ok());
        assert!(matches!(sub.recv().await, Err(RecvError::Dropped(_))));
        assert_eq!(sub.recv().await, Err(RecvError::Closed));
    }

    #[tokio::test]
    async fn test_subscription_after_drop_fails_immediately() {
        let mux = Multiplexer::new(connection());
        mux.dispatch_error(logout_drop());

        let mut sub = mux.subscribe(match_cl_ord_id("REQ-1"));
        mux.dispatch(&report("REQ-1"));
        match sub.try_recv() {
            Err(RecvError::Dropped(err)) => assert_eq!(err.cause, DropCause::Logout),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_subscription_wakes_pending_receiver() {
        let mux = Multiplexer::new(connection());
        let mut sub = mux.subscribe(match_cl_ord_id("REQ-1"));

        let producer = mux.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.dispatch(&report("REQ-1"));
        });

        let message = sub.recv_timeout(Duration::from_secs(2)).await.unwrap();
        assert_eq!(message.get_field_str(tags::CL_ORD_ID), Some("REQ-1"));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_subscription_timeout_and_dispose() {
        let mux = Multiplexer::new(connection());
        let mut sub = mux.subscribe(match_cl_ord_id("REQ-1"));

        let result = sub.recv_timeout(Duration::from_millis(20)).await;
        assert_eq!(result, Err(RecvError::Timeout(Duration::from_millis(20))));

        assert!(sub.dispose());
        assert!(!sub.dispose());
        assert_eq!(mux.active_sinks(), 0);
        assert_eq!(sub.try_recv(), Err(RecvError::Closed));
    }

    #[test]
    fn test_dropping_subscription_disposes_sink() {
        let mux = Multiplexer::new(connection());
        {
            let _sub = mux.subscribe(match_cl_ord_id("A"));
            assert_eq!(mux.active_sinks(), 1);
        }
        assert_eq!(mux.active_sinks(), 0);
    }

    #[test]
    fn test_slow_consumer_keeps_newest() {
        let mux = Multiplexer::with_capacity(connection(), 2);
        let mut sub = mux.subscribe(match_msg_type(MsgType::ExecutionReport));

        for n in 0..5 {
            mux.dispatch(&report(&n.to_string()));
        }

        assert_eq!(sub.overwritten(), 3);
        let first = sub.try_recv().unwrap().unwrap();
        let second = sub.try_recv().unwrap().unwrap();
        assert_eq!(first.get_field_str(tags::CL_ORD_ID), Some("3"));
        assert_eq!(second.get_field_str(tags::CL_ORD_ID), Some("4"));
        assert_eq!(sub.try_recv(), Ok(None));
    }

    #[test]
    fn test_concurrent_dispatch_and_broadcast() {
        let mux = Multiplexer::new(connection());
        let recorders: Vec<Arc<Recorder>> = (0..16).map(|_| Arc::new(Recorder::default())).collect();
        let _handles: Vec<SinkHandle> = recorders
            .iter()
            .map(|r| mux.register(match_msg_type(MsgType::ExecutionReport), r.clone()))
            .collect();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let mux = mux.clone();
                scope.spawn(move || {
                    for n in 0..200 {
                        mux.dispatch(&report(&n.to_string()));
                    }
                });
            }
            let mux = mux.clone();
            scope.spawn(move || {
                std::thread::sleep(Duration::from_millis(1));
                mux.dispatch_error(logout_drop());
            });
        });

        for recorder in &recorders {
            assert_eq!(recorder.errors.lock().len(), 1);
        }
        assert_eq!(mux.active_sinks(), 0);
    }
}
