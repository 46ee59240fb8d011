//! Power mode controller
//!
//! Chooses the execution topology at start:
//!
//! - [`DutyCycle`]: sample, connect once, publish, flush, close, then hand
//!   the device to the [`LowPower`] collaborator. Nothing survives the
//!   suspension; each wake builds a fresh `Disconnected` manager.
//! - [`Continuous`]: a sampling worker and a network worker spawned as
//!   separate tasks, sharing nothing but the telemetry queue.

use std::time::Duration;

use log::{debug, error, info, warn};
use plantlink_core::{payload, ConnectionState, NodeConfig, PowerMode, Reading, SensorSampler};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::connectivity::ConnectivityManager;
use crate::publisher::Publisher;
use crate::queue::{QueueProducer, QueueStats, TelemetryQueue};
use crate::{ConnectorError, NetworkLink, Session};

/// Timer-armed low-power state (external collaborator)
#[async_trait::async_trait]
pub trait LowPower: Send {
    /// Arm the wake timer
    fn arm_wake(&mut self, after: Duration);

    /// Enter the low-power state
    ///
    /// On hardware this does not return; execution restarts from
    /// initialization when the timer fires.
    async fn suspend(&mut self);
}

/// What [`HostSuspend`] does when asked to suspend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuspendBehaviour {
    /// Sleep for the armed interval and return
    #[default]
    Sleep,
    /// Exit the process; an external timer restarts the node
    Exit,
}

/// Low-power stand-in for a Linux host
#[derive(Debug, Default)]
pub struct HostSuspend {
    behaviour: SuspendBehaviour,
    wake_after: Option<Duration>,
}

impl HostSuspend {
    /// Host suspension with the given behaviour
    pub fn new(behaviour: SuspendBehaviour) -> Self {
        Self { behaviour, wake_after: None }
    }
}

#[async_trait::async_trait]
impl LowPower for HostSuspend {
    fn arm_wake(&mut self, after: Duration) {
        self.wake_after = Some(after);
    }

    async fn suspend(&mut self) {
        let after = self.wake_after.take().unwrap_or_default();
        match self.behaviour {
            SuspendBehaviour::Sleep => {
                info!("power: suspending for {:?}", after);
                tokio::time::sleep(after).await;
            }
            SuspendBehaviour::Exit => {
                info!("power: halting, wake timer {:?}", after);
                std::process::exit(0);
            }
        }
    }
}

/// Outcome of one duty cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Reading taken this wake, if the sensor produced one
    pub reading: Option<Reading>,
    /// Connection state reached before closing
    pub state: ConnectionState,
    /// Whether the reading was handed to the session
    pub published: bool,
}

/// One sequential wake: sample, connect, publish, suspend
pub struct DutyCycle<P, L, S> {
    sampler: P,
    manager: ConnectivityManager<L, S>,
    topic: String,
    sleep_interval: Duration,
    connect_timeout: Duration,
    flush_window: Duration,
    max_value: u16,
}

impl<P, L, S> DutyCycle<P, L, S>
where
    P: SensorSampler,
    L: NetworkLink,
    S: Session,
{
    /// Cycle over a freshly constructed manager
    pub fn new(sampler: P, manager: ConnectivityManager<L, S>, config: &NodeConfig) -> Self {
        Self {
            sampler,
            manager,
            topic: config.session.topic.clone(),
            sleep_interval: config.sleep_interval(),
            connect_timeout: config.connect_timeout(),
            flush_window: config.flush_window(),
            max_value: config.sensor.max_value,
        }
    }

    /// Run the wake once, then suspend through `low_power`
    ///
    /// A sensor fault skips the network entirely. A failed handshake
    /// loses the reading; it is not carried into the next wake.
    pub async fn run_cycle<W: LowPower + ?Sized>(mut self, low_power: &mut W) -> CycleReport {
        let report = self.active_phase().await;

        if report.reading.is_some() && !report.published {
            warn!("power: reading lost this cycle (state {})", report.state);
        }

        low_power.arm_wake(self.sleep_interval);
        low_power.suspend().await;
        report
    }

    async fn active_phase(&mut self) -> CycleReport {
        let reading = match self.sampler.sample() {
            Ok(reading) => reading,
            Err(e) => {
                warn!("power: sensor fault, skipping publish: {}", e);
                return CycleReport {
                    reading: None,
                    state: self.manager.state(),
                    published: false,
                };
            }
        };
        info!(
            "power: sampled {} ({}% of scale)",
            reading,
            reading.percent_of_scale(self.max_value)
        );

        let state = self.manager.establish(self.connect_timeout).await;
        if !state.is_session_up() {
            return CycleReport { reading: Some(reading), state, published: false };
        }

        let published = match payload::encode(reading) {
            Ok(body) => self.manager.publish(&body, &self.topic).await,
            Err(e) => {
                warn!("power: cannot encode reading {}: {}", reading, e);
                false
            }
        };

        self.manager.flush(self.flush_window).await;
        self.manager.shutdown().await;

        CycleReport { reading: Some(reading), state, published }
    }
}

/// Sample on a fixed interval and enqueue every reading; never returns
///
/// A full queue rejects the reading and the worker carries on. Sensor
/// faults are logged and skipped.
pub async fn sampling_worker<P: SensorSampler>(
    mut sampler: P,
    producer: QueueProducer,
    interval: Duration,
    max_value: u16,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match sampler.sample() {
            Ok(reading) => {
                debug!(
                    "sampler: {} ({}% of scale)",
                    reading,
                    reading.percent_of_scale(max_value)
                );
                producer.enqueue(reading);
            }
            Err(e) => warn!("sampler: {}", e),
        }
    }
}

/// Sampling worker and network worker for the device's lifetime
pub struct Continuous<P, L, S> {
    sampler: P,
    producer: QueueProducer,
    publisher: Publisher<L, S>,
    sample_interval: Duration,
    max_value: u16,
}

impl<P, L, S> Continuous<P, L, S>
where
    P: SensorSampler + Send + 'static,
    L: NetworkLink + 'static,
    S: Session + 'static,
{
    /// Wire both workers around a queue of the configured capacity
    pub fn new(sampler: P, link: L, session: S, config: &NodeConfig) -> Self {
        let (producer, consumer) = TelemetryQueue::new(config.queue_capacity).split();
        let manager = ConnectivityManager::new(link, session, config);
        Self {
            sampler,
            producer,
            publisher: Publisher::new(manager, consumer, config),
            sample_interval: config.sample_interval(),
            max_value: config.sensor.max_value,
        }
    }

    /// Counters of the shared queue, readable while the workers run
    pub fn queue_stats(&self) -> std::sync::Arc<QueueStats> {
        self.producer.stats()
    }

    /// Spawn both workers; returns (sampling, network) handles
    pub fn spawn(self) -> (JoinHandle<()>, JoinHandle<()>) {
        let sampling = tokio::spawn(sampling_worker(
            self.sampler,
            self.producer,
            self.sample_interval,
            self.max_value,
        ));
        let network = tokio::spawn(self.publisher.run());
        (sampling, network)
    }

    /// Run both workers until they end, which only a panic causes
    pub async fn run(self) {
        let (sampling, network) = self.spawn();
        let (sampled, networked) = tokio::join!(sampling, network);
        if let Err(e) = sampled {
            error!("power: sampling worker ended: {}", e);
        }
        if let Err(e) = networked {
            error!("power: network worker ended: {}", e);
        }
    }
}

/// Parts rebuilt for every wake (duty cycle) or once (continuous)
pub type NodeParts<P, L, S> = (P, L, S);

/// Top-level policy: picks the topology from the configured mode
pub struct PowerModeController {
    config: NodeConfig,
}

impl PowerModeController {
    /// Controller over a validated configuration
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    /// Configured topology
    pub fn mode(&self) -> PowerMode {
        self.config.mode
    }

    /// Run the node
    ///
    /// `build` creates the sampler, link and session. In duty-cycle mode it
    /// is called on every wake so no state crosses a suspension.
    pub async fn run<F, P, L, S, W>(&self, mut build: F, low_power: &mut W) -> Result<(), ConnectorError>
    where
        F: FnMut(&NodeConfig) -> Result<NodeParts<P, L, S>, ConnectorError>,
        P: SensorSampler + Send + 'static,
        L: NetworkLink + 'static,
        S: Session + 'static,
        W: LowPower + ?Sized,
    {
        match self.config.mode {
            PowerMode::DutyCycle => {
                info!("power: duty-cycle mode, sleeping {:?} between wakes", self.config.sleep_interval());
                loop {
                    let (sampler, link, session) = build(&self.config)?;
                    let manager = ConnectivityManager::new(link, session, &self.config);
                    let report = DutyCycle::new(sampler, manager, &self.config)
                        .run_cycle(low_power)
                        .await;
                    debug!("power: cycle finished: {:?}", report);
                }
            }
            PowerMode::Continuous => {
                info!(
                    "power: continuous mode, sampling every {:?}, queue capacity {}",
                    self.config.sample_interval(),
                    self.config.queue_capacity
                );
                let (sampler, link, session) = build(&self.config)?;
                Continuous::new(sampler, link, session, &self.config).run().await;
                Ok(())
            }
        }
    }
}
