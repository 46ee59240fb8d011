//! PlantLink sensor node
//!
//! Usage: `plantlink [CONFIG]`
//!
//! The configuration path comes from the first argument, then
//! `PLANTLINK_CONFIG`, then `plantlink.toml`. The analog channel is read
//! from `PLANTLINK_ADC_PATH` (default: IIO device 0, channel 0). Set
//! `PLANTLINK_SUSPEND=exit` to end the process after each duty cycle and
//! let an external timer start the next wake.

use plantlink_connectors::config::{self, CONFIG_PATH_VAR, DEFAULT_CONFIG_PATH};
use plantlink_connectors::iio::IioChannel;
use plantlink_connectors::link::ResolverLink;
use plantlink_connectors::power::{HostSuspend, PowerModeController, SuspendBehaviour};
use plantlink_connectors::{ConnectorError, MqttSession};
use plantlink_core::AdcSampler;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), ConnectorError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_PATH_VAR).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = config::load(&path)?;

    log::info!(
        "plantlink {} starting: broker {}:{}, topic {}, mode {:?}",
        plantlink_core::VERSION,
        config.broker.host,
        config.broker.port,
        config.session.topic,
        config.mode
    );

    let adc_path = std::env::var("PLANTLINK_ADC_PATH").ok();
    let behaviour = match std::env::var("PLANTLINK_SUSPEND").as_deref() {
        Ok("exit") => SuspendBehaviour::Exit,
        _ => SuspendBehaviour::Sleep,
    };
    let mut low_power = HostSuspend::new(behaviour);

    let build = |config: &plantlink_core::NodeConfig| {
        let channel = match &adc_path {
            Some(path) => IioChannel::new(path),
            None => IioChannel::voltage(0, 0),
        };
        let sampler = AdcSampler::with_resolution(channel, config.sensor.max_value);
        let link = ResolverLink::from_config(config);
        let session = MqttSession::from_config(config)?;
        Ok::<_, ConnectorError>((sampler, link, session))
    };

    PowerModeController::new(config).run(build, &mut low_power).await
}
