use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::{debug, error, warn};

use pvproxy_shared::{
    decode_array, decode_scalar, decode_text_bytes, ChannelId, ChannelState, PvData, PvType,
    WireError, WireType,
};

use crate::{
    connection::Connection,
    subscription::{
        ContextToken, MonitorHandler, MonitorUpdate, Route, SubscribeError, SubscriptionHandle,
    },
    transport::{Completion, GetReply, PutReply, Transport, TransportStatus},
};

use super::{
    error::{ChannelError, IoError},
    pending_read::PendingRead,
};

/// Proxy for one named process variable.
///
/// Owns its channel exclusively and at most one monitor on it. All state is
/// behind a per-variable lock that is released before any read or write
/// waits on the transport, so a monitor handler running on the callback
/// thread can write back through any Variable.
pub struct Variable {
    name: Arc<str>,
    field: String,
    connection: Connection,
    state: Mutex<VariableState>,
    // Shared with the monitor route so updates refresh it too
    latest: Arc<Mutex<Option<PvData>>>,
}

impl std::fmt::Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

struct VariableState {
    channel: Option<ChannelId>,
    wire_type: Option<WireType>,
    element_count: usize,
    subscription: Option<SubscriptionHandle>,
    last_error: Option<String>,
    destroyed: bool,
}

// What a request is issued against, captured under the lock
struct Target {
    channel: ChannelId,
    wire_type: WireType,
    count: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Shape {
    Scalar,
    Array,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Confirm {
    Wait,
    Defer,
}

impl Variable {
    /// Connects a channel to `device_prefix` + `field_suffix`, waiting up to
    /// the configured pend timeout for the server to answer.
    pub fn create(
        connection: &Connection,
        device_prefix: &str,
        field_suffix: &str,
    ) -> Result<Self, ChannelError> {
        let name = format!("{}{}", device_prefix, field_suffix);
        if !connection.is_active() {
            return Err(ChannelError::ConnectionClosed { name });
        }

        let transport = connection.transport();
        let config = connection.config();
        let channel = transport
            .create_channel(&name, config.channel_priority)
            .map_err(|status| ChannelError::Transport {
                name: name.clone(),
                status,
            })?;
        connection.channel_opened();
        debug!("Created channel {} for PV {}", channel, name);

        // Success is judged by this channel's own search, whatever else the
        // pend was waiting on.
        let pended = transport.pend(config.pend_timeout);
        if let Err(status) = transport.search_outcome(channel) {
            Self::abandon(connection, channel, &name);
            return Err(match status {
                TransportStatus::ChannelNotFound => ChannelError::NotFound { name },
                TransportStatus::Timeout => ChannelError::Timeout {
                    name,
                    timeout: config.pend_timeout,
                },
                status => ChannelError::Transport { name, status },
            });
        }
        if let Err(status) = pended {
            debug!("Channel for PV {} connected, pend reported: {}", name, status);
        }

        // An unknown tag is not fatal here; it fails the first typed access.
        let wire_type = transport
            .field_type(channel)
            .and_then(|tag| WireType::from_tag(tag).ok());
        let element_count = transport.element_count(channel);

        Ok(Self {
            name: name.into(),
            field: field_suffix.to_string(),
            connection: connection.clone(),
            state: Mutex::new(VariableState {
                channel: Some(channel),
                wire_type,
                element_count,
                subscription: None,
                last_error: None,
                destroyed: false,
            }),
            latest: Arc::new(Mutex::new(None)),
        })
    }

    fn abandon(connection: &Connection, channel: ChannelId, name: &str) {
        connection.channel_closed();
        if let Err(status) = connection.transport().clear_channel(channel) {
            warn!("Failed to clear unconnected channel for PV {}: {}", name, status);
        }
    }

    // Accessors

    /// Full name, device prefix included
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The suffix this variable was created with
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn channel(&self) -> Option<ChannelId> {
        self.state().channel
    }

    /// Wire type negotiated so far, if the channel has ever connected with
    /// a supported type
    pub fn wire_type(&self) -> Option<WireType> {
        self.state().wire_type
    }

    pub fn element_count(&self) -> Result<usize, IoError> {
        let channel = self.usable_channel(&self.state())?;
        Ok(self.transport().element_count(channel))
    }

    pub fn channel_state(&self) -> ChannelState {
        match self.state().channel {
            Some(channel) if self.connection.is_active() => self.transport().channel_state(channel),
            _ => ChannelState::Closed,
        }
    }

    /// The live monitor, if any. A monitor cancelled by a disconnect is no
    /// longer reported.
    pub fn subscription(&self) -> Option<SubscriptionHandle> {
        let mut state = self.state();
        let handle = state.subscription?;
        if self.connection.router().registry().contains(handle) {
            return Some(handle);
        }
        state.subscription = None;
        None
    }

    /// Last value read through this variable or delivered by its monitor
    pub fn value(&self) -> Option<PvData> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Message of the most recent failure, cleared by the next success
    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state().destroyed
    }

    // Read

    /// Reads a scalar. `T` must carry the channel's wire type exactly.
    /// Text read as `String` must be UTF-8; see `read_text_bytes`.
    pub fn read<T: PvType>(&self) -> Result<T, IoError> {
        let result = self.read_scalar::<T>();
        self.finish(result)
    }

    /// Reads every element the channel reports, possibly none.
    pub fn read_array<T: PvType>(&self) -> Result<Vec<T>, IoError> {
        let result = self.read_elements::<T>();
        self.finish(result)
    }

    /// Reads using whatever type the channel negotiated
    pub fn read_value(&self) -> Result<PvData, IoError> {
        let result = self.read_negotiated();
        self.finish(result)
    }

    /// Reads a text channel byte for byte, one entry per element, whatever
    /// encoding the server used
    pub fn read_text_bytes(&self) -> Result<Vec<Vec<u8>>, IoError> {
        let result = self.read_raw_text();
        self.finish(result)
    }

    /// Queues a scalar read without waiting. Confirm it with
    /// `Connection::pend` before completing it.
    pub fn read_deferred<T: PvType>(&self) -> Result<PendingRead<T>, IoError> {
        let result = self.queue_read(Shape::Scalar, decode_scalar::<T>, T::WIRE_TYPE);
        self.finish(result)
    }

    pub fn read_array_deferred<T: PvType>(&self) -> Result<PendingRead<Vec<T>>, IoError> {
        let result = self.queue_read(Shape::Array, decode_array::<T>, T::WIRE_TYPE);
        self.finish(result)
    }

    fn read_scalar<T: PvType>(&self) -> Result<T, IoError> {
        let target = self.target(Some(T::WIRE_TYPE))?;
        self.require_shape(&target, Shape::Scalar)?;

        let payload = self.get_confirmed(&target, 1)?;
        let value = decode_scalar::<T>(&payload, 1).map_err(|source| self.encoding(source))?;
        self.remember(PvData::scalar(value.clone()));
        Ok(value)
    }

    fn read_elements<T: PvType>(&self) -> Result<Vec<T>, IoError> {
        let target = self.target(Some(T::WIRE_TYPE))?;
        self.require_shape(&target, Shape::Array)?;

        let values = if target.count == 0 {
            Vec::new()
        } else {
            let payload = self.get_confirmed(&target, target.count)?;
            decode_array::<T>(&payload, target.count).map_err(|source| self.encoding(source))?
        };
        self.remember(PvData::array(values.clone()));
        Ok(values)
    }

    fn read_negotiated(&self) -> Result<PvData, IoError> {
        let target = self.target(None)?;
        let shape = if target.count == 1 {
            Shape::Scalar
        } else {
            Shape::Array
        };
        self.require_shape(&target, shape)?;

        let payload = if target.count == 0 {
            Vec::new()
        } else {
            self.get_confirmed(&target, target.count)?
        };
        let data = PvData::decode(target.wire_type, &payload, target.count)
            .map_err(|source| self.encoding(source))?;
        self.remember(data.clone());
        Ok(data)
    }

    fn read_raw_text(&self) -> Result<Vec<Vec<u8>>, IoError> {
        let target = self.target(Some(WireType::String))?;
        if target.count == 0 {
            return Ok(Vec::new());
        }
        let payload = self.get_confirmed(&target, target.count)?;
        decode_text_bytes(&payload, target.count).map_err(|source| self.encoding(source))
    }

    fn queue_read<R>(
        &self,
        shape: Shape,
        decode: fn(&[u8], usize) -> Result<R, WireError>,
        requested: WireType,
    ) -> Result<PendingRead<R>, IoError> {
        let target = self.target(Some(requested))?;
        self.require_shape(&target, shape)?;

        let count = match shape {
            Shape::Scalar => 1,
            Shape::Array => target.count,
        };
        if count == 0 {
            return Ok(PendingRead::new(&self.name, GetReply::ready(Vec::new()), 0, decode));
        }

        let reply = GetReply::new();
        self.transport()
            .get(target.channel, target.wire_type, count, reply.clone())
            .map_err(|status| self.status_error(status))?;
        debug!("Queued deferred read of {} ({} elements)", self.name, count);
        Ok(PendingRead::new(&self.name, reply, count, decode))
    }

    fn get_confirmed(&self, target: &Target, count: usize) -> Result<Vec<u8>, IoError> {
        let reply = GetReply::new();
        self.transport()
            .get(target.channel, target.wire_type, count, reply.clone())
            .map_err(|status| self.status_error(status))?;
        self.await_completion(&reply)
    }

    // Write

    /// Writes a scalar and waits for the transport to confirm it
    pub fn write<T: PvType>(&self, value: T) -> Result<(), IoError> {
        let result = self.put_values(&[value], Shape::Scalar, Confirm::Wait);
        self.finish(result)
    }

    pub fn write_array<T: PvType>(&self, values: &[T]) -> Result<(), IoError> {
        let result = self.put_values(values, Shape::Array, Confirm::Wait);
        self.finish(result)
    }

    /// Queues a scalar write. Nothing is sent until the connection is
    /// flushed or pended.
    pub fn write_deferred<T: PvType>(&self, value: T) -> Result<(), IoError> {
        let result = self.put_values(&[value], Shape::Scalar, Confirm::Defer);
        self.finish(result)
    }

    pub fn write_array_deferred<T: PvType>(&self, values: &[T]) -> Result<(), IoError> {
        let result = self.put_values(values, Shape::Array, Confirm::Defer);
        self.finish(result)
    }

    /// Writes a dynamically typed value, which must carry the negotiated
    /// wire type
    pub fn write_value(&self, data: &PvData) -> Result<(), IoError> {
        let result = self.put_data(data);
        self.finish(result)
    }

    fn put_values<T: PvType>(
        &self,
        values: &[T],
        shape: Shape,
        confirm: Confirm,
    ) -> Result<(), IoError> {
        let target = self.target(Some(T::WIRE_TYPE))?;
        self.require_shape(&target, shape)?;

        let payload = T::encode(values).map_err(|source| self.encoding(source))?;
        match confirm {
            Confirm::Wait => self.put_confirmed(&target, values.len(), payload),
            Confirm::Defer => {
                // Failures surface through the connection's exception handler
                self.transport()
                    .put(target.channel, target.wire_type, values.len(), payload, None)
                    .map_err(|status| self.status_error(status))?;
                debug!("Queued deferred write of {} ({} elements)", self.name, values.len());
                Ok(())
            }
        }
    }

    fn put_data(&self, data: &PvData) -> Result<(), IoError> {
        let target = self.target(Some(data.wire_type()))?;
        let shape = if data.len() == 1 {
            Shape::Scalar
        } else {
            Shape::Array
        };
        self.require_shape(&target, shape)?;

        let payload = data.encode().map_err(|source| self.encoding(source))?;
        self.put_confirmed(&target, data.len(), payload)
    }

    fn put_confirmed(
        &self,
        target: &Target,
        count: usize,
        payload: Vec<u8>,
    ) -> Result<(), IoError> {
        let reply = PutReply::new();
        self.transport()
            .put(target.channel, target.wire_type, count, payload, Some(reply.clone()))
            .map_err(|status| self.status_error(status))?;
        self.await_completion(&reply)
    }

    // Confirmation

    /// Sends queued requests and waits for all of them. Only a timeout is
    /// reported here; a failed deferred write goes to the exception handler.
    pub fn pend(&self) -> Result<(), IoError> {
        self.usable_channel(&self.state())?;
        let result = self
            .transport()
            .pend(self.timeout())
            .map_err(|status| self.status_error(status));
        self.finish(result)
    }

    /// Sends queued requests without waiting
    pub fn flush(&self) -> Result<(), IoError> {
        self.usable_channel(&self.state())?;
        let result = self
            .transport()
            .flush()
            .map_err(|status| self.status_error(status));
        self.finish(result)
    }

    // Pends, then judges the request by its own slot only
    fn await_completion<T>(&self, reply: &Completion<T>) -> Result<T, IoError> {
        let pended = self.transport().pend(self.timeout());
        match reply.take() {
            Some(Ok(value)) => Ok(value),
            Some(Err(status)) => Err(self.status_error(status)),
            None => Err(match pended {
                Err(status) if status != TransportStatus::Timeout => self.status_error(status),
                _ => IoError::Timeout {
                    name: self.name.to_string(),
                    timeout: self.timeout(),
                },
            }),
        }
    }

    // Subscriptions

    /// Installs a monitor whose updates are handed to `handler` together
    /// with `context`. Subscribing again returns the live handle.
    pub fn subscribe<F>(
        &self,
        handler: F,
        context: ContextToken,
    ) -> Result<SubscriptionHandle, SubscribeError>
    where
        F: Fn(&MonitorUpdate, &ContextToken) + Send + Sync + 'static,
    {
        self.subscribe_handler(Arc::new(handler), context)
    }

    pub fn subscribe_handler(
        &self,
        handler: Arc<dyn MonitorHandler>,
        context: ContextToken,
    ) -> Result<SubscriptionHandle, SubscribeError> {
        let result = self.install_monitor(handler, context);
        let mut state = self.state();
        match &result {
            Ok(_) => state.last_error = None,
            Err(error) => state.last_error = Some(error.to_string()),
        }
        result
    }

    // The state lock is held throughout so that concurrent subscribe,
    // unsubscribe and destroy calls cannot interleave.
    fn install_monitor(
        &self,
        handler: Arc<dyn MonitorHandler>,
        context: ContextToken,
    ) -> Result<SubscriptionHandle, SubscribeError> {
        let mut state = self.state();
        let channel = self.usable_channel(&state)?;
        let router = self.connection.router();

        if let Some(existing) = state.subscription {
            if router.registry().contains(existing) {
                debug!("PV {} is already subscribed ({})", self.name, existing.id());
                return Ok(existing);
            }
            state.subscription = None;
        }

        let channel_state = self.transport().channel_state(channel);
        if !channel_state.accepts_subscription() {
            return Err(SubscribeError::NotConnected {
                name: self.name.to_string(),
                state: channel_state,
            });
        }
        let wire_type = self.negotiate(&mut state, channel)?;
        let count = state.element_count;

        let latest = self.latest.clone();
        let caching: Arc<dyn MonitorHandler> =
            Arc::new(move |update: &MonitorUpdate, context: &ContextToken| {
                *latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(update.data.clone());
                handler.on_update(update, context);
            });
        router.route(
            channel,
            Route {
                name: self.name.clone(),
                handler: caching,
                context,
            },
        );
        let callback = router.callback_for(channel);
        let id = match self.transport().subscribe(channel, wire_type, count, callback) {
            Ok(id) => id,
            Err(status) => {
                router.unroute(channel);
                return Err(self.subscribe_error(status));
            }
        };

        let handle = SubscriptionHandle::new(channel, id);
        router.registry().add(handle);
        if let Err(status) = self.transport().flush() {
            if let Err(cancel_status) = router.cancel_subscription(handle) {
                warn!("Failed to cancel unconfirmed monitor on {}: {}", self.name, cancel_status);
            }
            return Err(self.subscribe_error(status));
        }

        state.subscription = Some(handle);
        debug!("Subscribed to PV {} ({})", self.name, id);
        Ok(handle)
    }

    /// Cancels the monitor. Without one this is a no-op.
    pub fn unsubscribe(&self) -> Result<(), IoError> {
        let result = self.cancel_monitor();
        self.finish(result)
    }

    fn cancel_monitor(&self) -> Result<(), IoError> {
        let mut state = self.state();
        self.usable_channel(&state)?;
        let Some(handle) = state.subscription.take() else {
            return Ok(());
        };

        match self.connection.router().cancel_subscription(handle) {
            Ok(true) => debug!("Unsubscribed from PV {} ({})", self.name, handle.id()),
            Ok(false) => debug!("Monitor on PV {} was already cancelled", self.name),
            Err(status) => return Err(self.status_error(status)),
        }
        Ok(())
    }

    // Teardown

    /// Cancels the monitor, then clears the channel. Every later call on
    /// this variable fails with `IoError::Destroyed`.
    pub fn destroy(&self) -> Result<(), IoError> {
        let mut state = self.state();
        if state.destroyed {
            error!("PV {} destroyed twice", self.name);
            return Err(self.destroyed());
        }
        state.destroyed = true;
        state.subscription = None;

        let mut first_error = None;
        if let Some(channel) = state.channel {
            if let Err(status) = self.connection.router().cancel(channel) {
                warn!("Failed to cancel monitors of PV {}: {}", self.name, status);
                first_error = Some(self.status_error(status));
            }
        }
        if let Err(error) = self.clear_channel(&mut state) {
            first_error.get_or_insert(error);
        }

        match first_error {
            Some(error) => {
                state.last_error = Some(error.to_string());
                Err(error)
            }
            None => {
                state.last_error = None;
                Ok(())
            }
        }
    }

    // The handle is cleared exactly once; clearing a null handle is an error.
    fn clear_channel(&self, state: &mut VariableState) -> Result<(), IoError> {
        let Some(channel) = state.channel.take() else {
            return Err(self.destroyed());
        };
        self.connection.channel_closed();

        debug!("Destroying channel {} for PV {}", channel, self.name);
        self.transport()
            .clear_channel(channel)
            .map_err(|status| self.status_error(status))
    }

    // Helpers

    fn state(&self) -> MutexGuard<'_, VariableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transport(&self) -> &Arc<dyn Transport> {
        self.connection.transport()
    }

    fn timeout(&self) -> Duration {
        self.connection.config().pend_timeout
    }

    fn usable_channel(&self, state: &VariableState) -> Result<ChannelId, IoError> {
        if state.destroyed {
            error!("Operation on destroyed PV {}", self.name);
            return Err(self.destroyed());
        }
        let channel = state.channel.ok_or_else(|| self.destroyed())?;
        if !self.connection.is_active() {
            return Err(IoError::ConnectionClosed {
                name: self.name.to_string(),
            });
        }
        Ok(channel)
    }

    // Resolves the channel's wire type against the closed table. While the
    // channel is disconnected the last negotiated type is used.
    fn negotiate(
        &self,
        state: &mut VariableState,
        channel: ChannelId,
    ) -> Result<WireType, IoError> {
        let Some(tag) = self.transport().field_type(channel) else {
            return state.wire_type.ok_or_else(|| IoError::TransportFailure {
                name: self.name.to_string(),
                status: TransportStatus::Disconnected,
            });
        };

        let wire_type = WireType::from_tag(tag).map_err(|_| IoError::UnsupportedType {
            name: self.name.to_string(),
            tag,
        })?;
        state.wire_type = Some(wire_type);
        state.element_count = self.transport().element_count(channel);
        Ok(wire_type)
    }

    fn target(&self, requested: Option<WireType>) -> Result<Target, IoError> {
        let mut state = self.state();
        let channel = self.usable_channel(&state)?;
        let wire_type = self.negotiate(&mut state, channel)?;

        if let Some(requested) = requested {
            if requested != wire_type {
                return Err(IoError::TypeMismatch {
                    name: self.name.to_string(),
                    wire_type,
                    requested,
                });
            }
        }

        Ok(Target {
            channel,
            wire_type,
            count: state.element_count,
        })
    }

    fn require_shape(&self, target: &Target, shape: Shape) -> Result<(), IoError> {
        match shape {
            Shape::Scalar if target.count != 1 => Err(IoError::NotScalar {
                name: self.name.to_string(),
                count: target.count,
            }),
            Shape::Array if !target.wire_type.is_array_capable() => Err(IoError::ScalarOnly {
                name: self.name.to_string(),
                wire_type: target.wire_type,
            }),
            _ => Ok(()),
        }
    }

    fn remember(&self, data: PvData) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(data);
    }

    fn finish<R>(&self, result: Result<R, IoError>) -> Result<R, IoError> {
        let mut state = self.state();
        match &result {
            Ok(_) => state.last_error = None,
            Err(error) => state.last_error = Some(error.to_string()),
        }
        result
    }

    fn destroyed(&self) -> IoError {
        IoError::Destroyed {
            name: self.name.to_string(),
        }
    }

    fn encoding(&self, source: WireError) -> IoError {
        IoError::encoding(&self.name, source)
    }

    fn status_error(&self, status: TransportStatus) -> IoError {
        IoError::from_status(&self.name, status, self.timeout())
    }

    fn subscribe_error(&self, status: TransportStatus) -> SubscribeError {
        SubscribeError::Transport {
            name: self.name.to_string(),
            status,
        }
    }
}

impl Drop for Variable {
    fn drop(&mut self) {
        let destroyed = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .destroyed;
        if destroyed {
            return;
        }
        if let Err(error) = self.destroy() {
            warn!("Failed to destroy PV {} on drop: {}", self.name, error);
        }
    }
}
