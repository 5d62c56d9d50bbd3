mod error;
mod pending_read;
mod variable;

pub use error::{ChannelError, IoError};
pub use pending_read::PendingRead;
pub use variable::Variable;
