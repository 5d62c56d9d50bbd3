mod connection;
mod error;

pub use connection::{Connection, ConnectionState};
pub use error::ConnectError;
