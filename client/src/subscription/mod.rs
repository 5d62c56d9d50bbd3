mod error;
mod handler;
mod registry;
mod router;

pub use error::SubscribeError;
pub use handler::{ContextToken, MonitorHandler, MonitorUpdate, SubscriptionHandle};
pub use registry::SubscriptionRegistry;
pub use router::{CallbackRouter, Route};
