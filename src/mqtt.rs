// src/mqtt.rs - MQTT transport for the alarm bus
use crate::{
    config::MqttConfig,
    error::{Result, SireneError},
    protocol::{Inbound, Outbound},
    runtime::{Publisher, TransportEvent},
};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

fn map_qos(level: u8) -> Result<QoS> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(SireneError::Config(format!("Invalid MQTT QoS level {}", other))),
    }
}

/// Publishing half of an MQTT session.
///
/// The receiving half is a background task polling the event loop; it
/// resubscribes on every ConnAck and forwards publishes to the runtime.
pub struct MqttTransport {
    client: AsyncClient,
    qos: QoS,
}

impl MqttTransport {
    /// Start the session. Must be called inside a tokio runtime.
    pub fn connect(
        config: &MqttConfig,
        subscriptions: Vec<String>,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        let qos = map_qos(config.qos)?;
        let mut options = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(options, 100);
        let (tx, rx) = mpsc::channel(100);

        info!(
            "Connecting to MQTT broker {}:{} as '{}'",
            config.broker_host, config.broker_port, config.client_id
        );
        tokio::spawn(pump(eventloop, client.clone(), subscriptions, qos, tx));

        Ok((Self { client, qos }, rx))
    }
}

impl Publisher for MqttTransport {
    fn publish(&mut self, message: &Outbound) -> Result<()> {
        debug!("Publishing {} to {}", message.payload, message.topic);
        self.client
            .try_publish(message.topic.as_str(), self.qos, false, message.payload.clone())
            .map_err(|e| SireneError::Transport(e.to_string()))
    }
}

async fn pump(
    mut eventloop: EventLoop,
    client: AsyncClient,
    subscriptions: Vec<String>,
    qos: QoS,
    tx: mpsc::Sender<TransportEvent>,
) {
    loop {
        let event = match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                for topic in &subscriptions {
                    if let Err(e) = client.try_subscribe(topic.as_str(), qos) {
                        error!("Failed to subscribe to {}: {}", topic, e);
                    }
                }
                info!("MQTT connected, subscribed to {:?}", subscriptions);
                TransportEvent::Connected
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                TransportEvent::Message(Inbound::new(publish.topic, publish.payload.to_vec()))
            }
            Ok(_) => continue,
            Err(e) => {
                warn!("MQTT connection error: {}", e);
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };
        if tx.send(event).await.is_err() {
            debug!("Runtime gone, stopping MQTT event loop");
            break;
        }
    }
}
