//! MQTT session for PlantLink
//!
//! Session layer on top of `rumqttc`. The event loop's built-in reconnect
//! is never used: any connection error drops the client, and the
//! connectivity manager decides when to handshake again.
//!
//! - QoS 0 publishes (at most once, matching the best-effort contract)
//! - clean session, no subscriptions
//! - TLS with certificate validation, either against the platform roots
//!   or against a configured CA bundle

use std::time::Duration;

use log::{debug, info};
use plantlink_core::NodeConfig;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS, Transport,
};
use tokio::time::Instant;

use crate::{ConnectorError, Session, SessionError};

/// Pending requests between the client handle and the event loop
const REQUEST_CAPACITY: usize = 10;

/// How long one heartbeat drives the event loop
const HEARTBEAT_POLL: Duration = Duration::from_millis(50);

/// Bound on waiting for a queued publish to reach the socket
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on the goodbye packet when closing
const DISCONNECT_WINDOW: Duration = Duration::from_millis(100);

struct ActiveSession {
    client: AsyncClient,
    eventloop: EventLoop,
}

/// `rumqttc` backed [`Session`]
pub struct MqttSession {
    options: MqttOptions,
    handshake_timeout: Duration,
    active: Option<ActiveSession>,
}

impl MqttSession {
    /// Session with prepared options
    pub fn new(options: MqttOptions, handshake_timeout: Duration) -> Self {
        Self {
            options,
            handshake_timeout,
            active: None,
        }
    }

    /// Session for the configured broker, identity and credentials
    ///
    /// Reads the CA bundle when one is configured.
    pub fn from_config(config: &NodeConfig) -> Result<Self, ConnectorError> {
        let mut options = MqttOptions::new(
            config.session.client_id.clone(),
            config.broker.host.clone(),
            config.broker.port,
        );
        options
            .set_keep_alive(config.keep_alive())
            .set_clean_session(true)
            .set_credentials(config.session.username.clone(), config.session.password.clone());

        let transport = match &config.broker.ca_file {
            Some(path) => Transport::tls(std::fs::read(path)?, None, None),
            None => Transport::tls_with_default_config(),
        };
        options.set_transport(transport);

        Ok(Self::new(options, config.connect_timeout()))
    }

    /// Options the next handshake will use
    pub fn options(&self) -> &MqttOptions {
        &self.options
    }

    /// Whether a session is currently held
    pub fn is_connected(&self) -> bool {
        self.active.is_some()
    }
}

/// Poll until `done` matches an event, the deadline passes (`Ok(false)`),
/// or the connection fails.
async fn drive_until(
    eventloop: &mut EventLoop,
    deadline: Instant,
    done: impl Fn(&Event) -> bool,
) -> Result<bool, ConnectionError> {
    loop {
        match tokio::time::timeout_at(deadline, eventloop.poll()).await {
            Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                return Err(ConnectionError::RequestsDone);
            }
            Ok(Ok(event)) => {
                if done(&event) {
                    return Ok(true);
                }
            }
            Ok(Err(e)) => return Err(e),
            Err(_elapsed) => return Ok(false),
        }
    }
}

#[async_trait::async_trait]
impl Session for MqttSession {
    async fn connect(&mut self) -> Result<(), SessionError> {
        self.active = None;

        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);
        let deadline = Instant::now() + self.handshake_timeout;

        loop {
            match tokio::time::timeout_at(deadline, eventloop.poll()).await {
                Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(SessionError::Handshake(format!("broker refused: {:?}", ack.code)));
                    }
                    let (host, port) = self.options.broker_address();
                    info!("mqtt: session established with {}:{}", host, port);
                    self.active = Some(ActiveSession { client, eventloop });
                    return Ok(());
                }
                Ok(Ok(_)) => continue,
                Ok(Err(ConnectionError::ConnectionRefused(code))) => {
                    return Err(SessionError::Handshake(format!("broker refused: {:?}", code)));
                }
                Ok(Err(e)) => return Err(SessionError::Handshake(e.to_string())),
                Err(_elapsed) => {
                    return Err(SessionError::Handshake("no CONNACK before timeout".to_string()));
                }
            }
        }
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionError> {
        let Some(active) = self.active.as_mut() else {
            return Err(SessionError::NotConnected);
        };

        if let Err(e) = active.client.try_publish(topic, QoS::AtMostOnce, false, payload.to_vec()) {
            return Err(SessionError::Transient(e.to_string()));
        }

        let deadline = Instant::now() + PUBLISH_TIMEOUT;
        let sent = drive_until(&mut active.eventloop, deadline, |event| {
            matches!(event, Event::Outgoing(Outgoing::Publish(_)))
        })
        .await;

        match sent {
            Ok(true) => Ok(()),
            Ok(false) => Err(SessionError::Timeout),
            Err(e) => {
                self.active = None;
                Err(SessionError::ConnectionLost(e.to_string()))
            }
        }
    }

    async fn heartbeat(&mut self) -> Result<(), SessionError> {
        let Some(active) = self.active.as_mut() else {
            return Err(SessionError::NotConnected);
        };

        // The event loop emits PINGREQ on its own once the keepalive is due
        // and fails the poll when PINGRESP never arrives.
        let polled = tokio::time::timeout(HEARTBEAT_POLL, active.eventloop.poll()).await;
        match polled {
            Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                self.active = None;
                Err(SessionError::ConnectionLost("broker sent DISCONNECT".to_string()))
            }
            Ok(Err(e)) => {
                self.active = None;
                Err(SessionError::ConnectionLost(e.to_string()))
            }
            Ok(Ok(_)) | Err(_) => Ok(()),
        }
    }

    async fn flush(&mut self, window: Duration) -> Result<(), SessionError> {
        let Some(active) = self.active.as_mut() else {
            return Err(SessionError::NotConnected);
        };

        let deadline = Instant::now() + window;
        match drive_until(&mut active.eventloop, deadline, |_| false).await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.active = None;
                Err(SessionError::ConnectionLost(e.to_string()))
            }
        }
    }

    async fn disconnect(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };

        if active.client.try_disconnect().is_ok() {
            let deadline = Instant::now() + DISCONNECT_WINDOW;
            let closed = drive_until(&mut active.eventloop, deadline, |event| {
                matches!(event, Event::Outgoing(Outgoing::Disconnect))
            })
            .await;
            debug!("mqtt: disconnect sent: {:?}", closed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_config() {
        let mut config = NodeConfig::new("broker.example.net", "node-7", "hunter2");
        config.session.keep_alive_secs = 45;

        let session = MqttSession::from_config(&config).unwrap();
        let options = session.options();

        assert_eq!(options.client_id(), "ESP32_Plant_Project");
        assert_eq!(options.broker_address(), ("broker.example.net".to_string(), 8883));
        assert_eq!(options.keep_alive(), Duration::from_secs(45));
        assert_eq!(
            options.credentials(),
            Some(("node-7".to_string(), "hunter2".to_string()))
        );
        assert!(!session.is_connected());
    }

    #[test]
    fn missing_ca_file_is_an_io_error() {
        let mut config = NodeConfig::new("broker.example.net", "node", "secret");
        config.broker.ca_file = Some("/nonexistent/ca.pem".to_string());
        assert!(matches!(MqttSession::from_config(&config), Err(ConnectorError::Io(_))));
    }

    #[tokio::test]
    async fn operations_need_a_session() {
        let options = MqttOptions::new("test", "127.0.0.1", 1883);
        let mut session = MqttSession::new(options, Duration::from_secs(1));

        assert_eq!(session.publish("plantData", b"{}").await, Err(SessionError::NotConnected));
        assert_eq!(session.heartbeat().await, Err(SessionError::NotConnected));
        assert_eq!(
            session.flush(Duration::from_millis(10)).await,
            Err(SessionError::NotConnected)
        );
        session.disconnect().await;
    }

    #[tokio::test]
    async fn refused_tcp_connect_is_a_handshake_failure() {
        // Port 1 on loopback has no listener
        let options = MqttOptions::new("test", "127.0.0.1", 1);
        let mut session = MqttSession::new(options, Duration::from_secs(2));

        assert!(matches!(session.connect().await, Err(SessionError::Handshake(_))));
        assert!(!session.is_connected());
    }
}
