use std::{any::Any, fmt, sync::Arc};

use pvproxy_shared::{ChannelId, PvData, SubscriptionId};

/// Identity of one live monitor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    channel: ChannelId,
    id: SubscriptionId,
}

impl SubscriptionHandle {
    pub fn new(channel: ChannelId, id: SubscriptionId) -> Self {
        Self { channel, id }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

/// A decoded change notification
#[derive(Clone, Debug)]
pub struct MonitorUpdate {
    /// Full name of the variable the monitor is installed on
    pub name: Arc<str>,
    pub channel: ChannelId,
    pub data: PvData,
}

/// Receives monitor updates on the transport's callback thread
pub trait MonitorHandler: Send + Sync + 'static {
    fn on_update(&self, update: &MonitorUpdate, context: &ContextToken);
}

impl<F> MonitorHandler for F
where
    F: Fn(&MonitorUpdate, &ContextToken) + Send + Sync + 'static,
{
    fn on_update(&self, update: &MonitorUpdate, context: &ContextToken) {
        self(update, context)
    }
}

/// Caller-supplied value handed back to the handler with every update
#[derive(Clone, Default)]
pub struct ContextToken {
    value: Option<Arc<dyn Any + Send + Sync>>,
}

impl ContextToken {
    pub fn none() -> Self {
        Self { value: None }
    }

    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Some(Arc::new(value)),
        }
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self { value: Some(value) }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.as_deref()?.downcast_ref::<T>()
    }

    pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone()?.downcast::<T>().ok()
    }
}

impl fmt::Debug for ContextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextToken")
            .field("present", &self.value.is_some())
            .finish()
    }
}
