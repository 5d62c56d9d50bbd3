//! The surface the client needs from a Channel Access style transport.
//!
//! A transport executes requests asynchronously. `get` and `put` only queue
//! work; nothing is guaranteed to have happened until `flush` or `pend` has
//! sent it. Each request reports its own outcome through its completion
//! slot, or through the exception handler when it was issued without one.
//! Requests against one channel are executed in the order they were issued.

mod error;

pub use error::TransportStatus;

pub use inner::{
    Completion, ExceptionCallback, ExceptionEvent, EventStatus, GetReply, MonitorCallback,
    MonitorEvent, PutReply, Transport,
};

mod inner {

    use std::{
        sync::{Arc, Mutex, PoisonError},
        time::Duration,
    };

    use pvproxy_shared::{ChannelId, ChannelState, ConnectionConfig, SubscriptionId, WireType};

    use super::TransportStatus;

    pub trait Transport: Send + Sync {
        /// Creates the process context, applying the network settings
        fn open_context(
            &self,
            config: &ConnectionConfig,
            exceptions: ExceptionCallback,
        ) -> Result<(), TransportStatus>;
        /// Destroys the process context
        fn close_context(&self) -> Result<(), TransportStatus>;

        /// Starts a search for `name`. Connection completes during `pend`.
        fn create_channel(&self, name: &str, priority: u8) -> Result<ChannelId, TransportStatus>;
        fn clear_channel(&self, channel: ChannelId) -> Result<(), TransportStatus>;

        /// Native type tag, `None` while the channel is not connected
        fn field_type(&self, channel: ChannelId) -> Option<i16>;
        /// Native element count, zero while the channel is not connected
        fn element_count(&self, channel: ChannelId) -> usize;
        fn channel_state(&self, channel: ChannelId) -> ChannelState;
        /// Outcome of the channel's search: `Ok` once a server answered,
        /// `ChannelNotFound` when none hosts the name, `Timeout` while the
        /// search is still outstanding
        fn search_outcome(&self, channel: ChannelId) -> Result<(), TransportStatus>;

        /// Queues a read whose payload is delivered into `reply`
        fn get(
            &self,
            channel: ChannelId,
            wire_type: WireType,
            count: usize,
            reply: GetReply,
        ) -> Result<(), TransportStatus>;
        /// Queues a write of `count` encoded elements. Without a `reply` a
        /// failure is reported to the exception handler.
        fn put(
            &self,
            channel: ChannelId,
            wire_type: WireType,
            count: usize,
            payload: Vec<u8>,
            reply: Option<PutReply>,
        ) -> Result<(), TransportStatus>;

        /// Installs a monitor. Events are delivered on the transport's own
        /// callback thread, starting with the current value.
        fn subscribe(
            &self,
            channel: ChannelId,
            wire_type: WireType,
            count: usize,
            callback: MonitorCallback,
        ) -> Result<SubscriptionId, TransportStatus>;
        fn unsubscribe(&self, subscription: SubscriptionId) -> Result<(), TransportStatus>;

        /// Sends queued requests and blocks until all outstanding requests
        /// and channel searches complete, or `timeout` elapses. `Timeout`
        /// means something was still outstanding; the failure of a single
        /// request is never reported here.
        fn pend(&self, timeout: Duration) -> Result<(), TransportStatus>;
        /// Sends queued requests without waiting
        fn flush(&self) -> Result<(), TransportStatus>;
    }

    // Monitor

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum EventStatus {
        Normal,
        /// The channel lost its server
        Disconnected,
        /// Any other non-normal native status
        Failed(i32),
    }

    #[derive(Clone, Debug)]
    pub struct MonitorEvent {
        pub status: EventStatus,
        pub wire_type: WireType,
        pub count: usize,
        pub payload: Vec<u8>,
    }

    pub type MonitorCallback = Arc<dyn Fn(MonitorEvent) + Send + Sync>;

    // Exceptions

    /// Asynchronous fault reported outside any request
    #[derive(Clone, Debug)]
    pub struct ExceptionEvent {
        pub channel: Option<ChannelId>,
        pub status: TransportStatus,
        pub context: String,
    }

    pub type ExceptionCallback = Arc<dyn Fn(ExceptionEvent) + Send + Sync>;

    // Completion

    /// Slot a queued request fills once the transport completes it
    pub struct Completion<T> {
        slot: Arc<Mutex<Option<Result<T, TransportStatus>>>>,
    }

    /// Carries the payload of a `get`
    pub type GetReply = Completion<Vec<u8>>;
    /// Carries the acknowledgement of a `put`
    pub type PutReply = Completion<()>;

    impl<T> Completion<T> {
        pub fn new() -> Self {
            Self {
                slot: Arc::new(Mutex::new(None)),
            }
        }

        /// A completion that needs no transport round trip
        pub fn ready(value: T) -> Self {
            let completion = Self::new();
            completion.complete(Ok(value));
            completion
        }

        /// Called by the transport. The first completion wins.
        pub fn complete(&self, result: Result<T, TransportStatus>) {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(result);
            }
        }

        pub fn is_complete(&self) -> bool {
            self.slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
        }

        pub fn take(&self) -> Option<Result<T, TransportStatus>> {
            self.slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
        }
    }

    impl<T> Clone for Completion<T> {
        fn clone(&self) -> Self {
            Self {
                slot: self.slot.clone(),
            }
        }
    }

    impl<T> Default for Completion<T> {
        fn default() -> Self {
            Self::new()
        }
    }
}
