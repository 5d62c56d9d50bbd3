use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::{
    client_config::ClientConfig,
    subscription::{CallbackRouter, SubscriptionRegistry},
    transport::{ExceptionCallback, ExceptionEvent, Transport, TransportStatus},
};

use super::error::ConnectError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Active,
    Destroyed,
}

/// The link to the transport context that every channel depends on.
///
/// Cloning is cheap and every clone refers to the same link. Closing does
/// not cascade: Variables must be destroyed first.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    state: Mutex<ConnectionState>,
    live_channels: AtomicUsize,
    router: Arc<CallbackRouter>,
}

impl Connection {
    /// Prepares a connection without touching the transport
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new(transport.clone()));
        let router = CallbackRouter::new(registry);

        Self {
            inner: Arc::new(ConnectionInner {
                transport,
                config,
                state: Mutex::new(ConnectionState::Uninitialized),
                live_channels: AtomicUsize::new(0),
                router,
            }),
        }
    }

    /// Creates and opens a connection
    pub fn open_with(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
    ) -> Result<Self, ConnectError> {
        let connection = Self::new(transport, config);
        connection.open()?;
        Ok(connection)
    }

    /// Creates the transport context, handing it the network settings.
    /// Opening an active connection is a caller bug and fails immediately.
    pub fn open(&self) -> Result<(), ConnectError> {
        let mut state = self.inner.state();
        match *state {
            ConnectionState::Uninitialized => {}
            ConnectionState::Active => {
                error!("Connection opened twice");
                return Err(ConnectError::AlreadyActive);
            }
            ConnectionState::Destroyed => return Err(ConnectError::Closed),
        }

        let exceptions: ExceptionCallback = Arc::new(|event: ExceptionEvent| match event.channel {
            Some(channel) => warn!(
                "CA exception on {}: {} ({})",
                channel, event.status, event.context
            ),
            None => warn!("CA exception: {} ({})", event.status, event.context),
        });

        match self
            .inner
            .transport
            .open_context(&self.inner.config.connection, exceptions)
        {
            Ok(()) => {}
            Err(TransportStatus::ContextActive) => {
                error!("Transport context is already active in this process");
                return Err(ConnectError::AlreadyActive);
            }
            Err(status) => return Err(ConnectError::Transport { status }),
        }

        *state = ConnectionState::Active;
        info!(
            "Connection opened (address list '{}', pend timeout {:?})",
            self.inner.config.connection.address_list, self.inner.config.pend_timeout
        );
        Ok(())
    }

    /// Releases the transport context. Only the first call reaches the
    /// transport; later calls are no-ops.
    pub fn close(&self) -> Result<(), ConnectError> {
        self.inner.close()
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state()
    }

    pub fn is_active(&self) -> bool {
        self.state() == ConnectionState::Active
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        self.inner.router.registry()
    }

    pub fn router(&self) -> &Arc<CallbackRouter> {
        &self.inner.router
    }

    /// Channels created under this connection and not yet cleared
    pub fn live_channels(&self) -> usize {
        self.inner.live_channels.load(Ordering::SeqCst)
    }

    /// Sends queued requests and waits up to the configured pend timeout
    pub fn pend(&self) -> Result<(), TransportStatus> {
        self.pend_for(self.inner.config.pend_timeout)
    }

    pub fn pend_for(&self, timeout: Duration) -> Result<(), TransportStatus> {
        if !self.is_active() {
            return Err(TransportStatus::NoContext);
        }
        self.inner.transport.pend(timeout)
    }

    /// Sends queued requests without waiting for them
    pub fn flush(&self) -> Result<(), TransportStatus> {
        if !self.is_active() {
            return Err(TransportStatus::NoContext);
        }
        self.inner.transport.flush()
    }

    pub(crate) fn channel_opened(&self) {
        self.inner.live_channels.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn channel_closed(&self) {
        let _ = self
            .inner
            .live_channels
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| count.checked_sub(1));
    }
}

impl ConnectionInner {
    fn state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) -> Result<(), ConnectError> {
        let mut state = self.state();
        match *state {
            ConnectionState::Active => {}
            ConnectionState::Uninitialized => {
                *state = ConnectionState::Destroyed;
                return Ok(());
            }
            ConnectionState::Destroyed => {
                debug!("Connection already closed");
                return Ok(());
            }
        }
        *state = ConnectionState::Destroyed;

        let live_channels = self.live_channels.load(Ordering::SeqCst);
        if live_channels > 0 {
            warn!(
                "Closing connection with {} live channel(s); they are now invalid",
                live_channels
            );
        }
        let live_subscriptions = self.router.registry().len();
        if live_subscriptions > 0 {
            warn!(
                "Closing connection with {} live subscription(s)",
                live_subscriptions
            );
        }

        self.transport
            .close_context()
            .map_err(|status| ConnectError::Transport { status })?;
        info!("Connection closed");
        Ok(())
    }
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            warn!("Failed to close connection on drop: {}", error);
        }
    }
}
