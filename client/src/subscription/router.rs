use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, Weak},
};

use log::{trace, warn};

use pvproxy_shared::{ChannelId, PvData};

use crate::transport::{EventStatus, MonitorCallback, MonitorEvent, TransportStatus};

use super::{
    handler::{ContextToken, MonitorHandler, MonitorUpdate, SubscriptionHandle},
    registry::SubscriptionRegistry,
};

/// Where updates for one channel go
pub struct Route {
    pub name: Arc<str>,
    pub handler: Arc<dyn MonitorHandler>,
    pub context: ContextToken,
}

/// Delivers transport notifications to subscriber handlers.
///
/// Runs on the transport's callback thread and never blocks on the
/// transport itself, apart from cancelling monitors of a channel that
/// reported a non-normal status.
pub struct CallbackRouter {
    me: Weak<CallbackRouter>,
    registry: Arc<SubscriptionRegistry>,
    routes: RwLock<HashMap<ChannelId, Arc<Route>>>,
}

impl CallbackRouter {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            registry,
            routes: RwLock::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Installs (or replaces) the route for `channel`
    pub fn route(&self, channel: ChannelId, route: Route) {
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel, Arc::new(route));
    }

    pub fn unroute(&self, channel: ChannelId) -> bool {
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&channel)
            .is_some()
    }

    pub fn is_routed(&self, channel: ChannelId) -> bool {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&channel)
    }

    pub fn route_count(&self) -> usize {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Callback to hand to the transport for `channel`. It holds the router
    /// weakly, so events arriving after the connection is gone are dropped.
    pub fn callback_for(&self, channel: ChannelId) -> MonitorCallback {
        let router = self.me.clone();
        Arc::new(move |event: MonitorEvent| {
            if let Some(router) = router.upgrade() {
                router.dispatch(channel, event);
            }
        })
    }

    pub fn dispatch(&self, channel: ChannelId, event: MonitorEvent) {
        if event.status != EventStatus::Normal {
            warn!(
                "Monitor on {} reported {:?}, cancelling its subscriptions",
                channel, event.status
            );
            if let Err(status) = self.cancel(channel) {
                warn!("Cancelling subscriptions on {} failed: {}", channel, status);
            }
            return;
        }

        let route = self
            .routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&channel)
            .cloned();
        let Some(route) = route else {
            warn!("Dropping monitor event for unrouted channel {}", channel);
            return;
        };

        let data = match PvData::decode(event.wire_type, &event.payload, event.count) {
            Ok(data) => data,
            Err(error) => {
                warn!("Dropping undecodable monitor event for {}: {}", route.name, error);
                return;
            }
        };

        trace!("Monitor update for {}: {}", route.name, data);
        let update = MonitorUpdate {
            name: route.name.clone(),
            channel,
            data,
        };
        route.handler.on_update(&update, &route.context);
    }

    /// Cancels every subscription on `channel` and forgets its route
    pub fn cancel(&self, channel: ChannelId) -> Result<usize, TransportStatus> {
        self.unroute(channel);
        self.registry.remove_all_for(channel)
    }

    /// Cancels one subscription, dropping the route once the channel has
    /// none left
    pub fn cancel_subscription(&self, handle: SubscriptionHandle) -> Result<bool, TransportStatus> {
        let removed = self.registry.remove(handle);
        if self.registry.subscriptions_for(handle.channel()).is_empty() {
            self.unroute(handle.channel());
        }
        removed
    }
}
