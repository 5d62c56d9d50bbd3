use std::fmt;

/// Transport-assigned identity of one channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u32);

impl ChannelId {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch#{}", self.0)
    }
}

/// Transport-assigned identity of one monitor subscription
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u32);

impl SubscriptionId {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Connection state of a channel, as reported by the transport
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// Created but the server has never answered
    NeverConnected,
    /// Was connected once, currently disconnected
    PreviouslyConnected,
    Connected,
    /// Cleared, or unknown to the transport
    Closed,
}

impl ChannelState {
    /// Monitors may only be installed on channels that have seen a server.
    pub fn accepts_subscription(self) -> bool {
        match self {
            ChannelState::Connected | ChannelState::PreviouslyConnected => true,
            ChannelState::NeverConnected | ChannelState::Closed => false,
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::NeverConnected => "never connected",
            ChannelState::PreviouslyConnected => "previously connected",
            ChannelState::Connected => "connected",
            ChannelState::Closed => "closed",
        };
        f.write_str(name)
    }
}
