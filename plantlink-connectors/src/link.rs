//! Host transport layer
//!
//! On a Linux host the operating system owns the network interface, so the
//! closest equivalent of a radio join is "the broker host resolves to at
//! least one address". A failed resolution is a transport join failure and
//! goes through the same retry path as a failed radio join would.

use std::time::Duration;

use log::debug;
use plantlink_core::NodeConfig;

use crate::{LinkError, NetworkLink};

/// Network link that is up once the broker host resolves
#[derive(Debug, Clone)]
pub struct ResolverLink {
    host: String,
    port: u16,
    timeout: Duration,
    up: bool,
}

impl ResolverLink {
    /// Link for `host:port`, giving up on one resolution after `timeout`
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
            up: false,
        }
    }

    /// Link for the configured broker
    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(config.broker.host.clone(), config.broker.port, config.connect_timeout())
    }
}

#[async_trait::async_trait]
impl NetworkLink for ResolverLink {
    async fn join(&mut self) -> Result<(), LinkError> {
        self.up = false;

        let lookup = tokio::net::lookup_host((self.host.as_str(), self.port));
        let mut addrs = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(addrs)) => addrs,
            Ok(Err(e)) => return Err(LinkError::Resolve(e.to_string())),
            Err(_) => return Err(LinkError::Timeout),
        };

        let first = addrs.next().ok_or(LinkError::NoAddress)?;
        debug!("link: {} resolved to {}", self.host, first);
        self.up = true;
        Ok(())
    }

    fn is_up(&self) -> bool {
        self.up
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn literal_address_joins() {
        let mut link = ResolverLink::new("127.0.0.1", 8883, Duration::from_secs(1));
        assert!(!link.is_up());
        link.join().await.unwrap();
        assert!(link.is_up());
    }

    #[tokio::test]
    async fn unresolvable_host_fails_and_stays_down() {
        let mut link = ResolverLink::new("no-such-host.invalid", 8883, Duration::from_secs(5));
        assert!(link.join().await.is_err());
        assert!(!link.is_up());
    }
}
