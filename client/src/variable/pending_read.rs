use std::marker::PhantomData;

use pvproxy_shared::WireError;

use crate::transport::GetReply;

use super::error::IoError;

type Decoder<T> = fn(&[u8], usize) -> Result<T, WireError>;

/// A read issued without waiting for confirmation.
///
/// Complete it after `Connection::flush` or `Connection::pend` has confirmed
/// the request. Dropping it discards the reply buffer.
#[must_use = "a deferred read does nothing unless completed"]
pub struct PendingRead<T> {
    name: String,
    reply: GetReply,
    count: usize,
    decode: Decoder<T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PendingRead<T> {
    pub(crate) fn new(name: &str, reply: GetReply, count: usize, decode: Decoder<T>) -> Self {
        Self {
            name: name.to_string(),
            reply,
            count,
            decode,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_confirmed(&self) -> bool {
        self.reply.is_complete()
    }

    pub fn complete(self) -> Result<T, IoError> {
        let Some(result) = self.reply.take() else {
            return Err(IoError::Unconfirmed { name: self.name });
        };
        let payload = result.map_err(|status| IoError::TransportFailure {
            name: self.name.clone(),
            status,
        })?;
        (self.decode)(&payload, self.count).map_err(|source| IoError::encoding(&self.name, source))
    }
}
