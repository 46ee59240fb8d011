//! Connection states for the layered network link
//!
//! Two layers sit between a reading and the broker: the transport (network
//! join) and the session (broker handshake with credentials). The state
//! machine that moves between these states lives in the connectors crate;
//! this module only defines the states and their layer queries.
//!
//! ```text
//! Disconnected -> TransportConnecting -> TransportUp -> SessionConnecting -> SessionUp
//!                        ^    |                 ^              |              |
//!                        +----+ (join failed)   +--------------+              |
//!                                               (handshake failed)            |
//! Disconnected <--------------------------------------------------------------+
//!                       (transport loss / heartbeat failure)
//! ```

/// State of the transport + session connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    /// No network join, no session
    #[default]
    Disconnected,
    /// Network join in progress (or waiting to retry)
    TransportConnecting,
    /// Network joined, no session
    TransportUp,
    /// Broker handshake in progress
    SessionConnecting,
    /// Session established; publishing allowed
    SessionUp,
}

impl ConnectionState {
    /// Publishing is only valid in this state
    pub const fn is_session_up(self) -> bool {
        matches!(self, Self::SessionUp)
    }

    /// Network join has completed
    pub const fn is_transport_up(self) -> bool {
        matches!(self, Self::TransportUp | Self::SessionConnecting | Self::SessionUp)
    }

    /// Short lowercase label for log lines
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::TransportConnecting => "transport-connecting",
            Self::TransportUp => "transport-up",
            Self::SessionConnecting => "session-connecting",
            Self::SessionUp => "session-up",
        }
    }
}

impl core::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
