use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, Outgoing, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

use super::BusControl;

pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

pub struct MqttClient {
    client: AsyncClient,
    eventloop: EventLoop,
    subscription: String,
}

/// A running bus connection: the control client plus the event loop task.
pub struct BusConnection {
    client: AsyncClient,
    subscription: String,
    task: JoinHandle<()>,
}

impl MqttClient {
    pub fn new(config: &Config) -> Self {
        let mut mqttopts = MqttOptions::new(
            &config.mqtt.client_id,
            &config.mqtt.broker_host,
            config.mqtt.broker_port,
        );
        mqttopts.set_keep_alive(Duration::from_secs(30));

        if let (Some(user), Some(pass)) = (&config.mqtt.username, &config.mqtt.password) {
            mqttopts.set_credentials(user, pass);
        }

        let (client, eventloop) = AsyncClient::new(mqttopts, 100);

        Self {
            client,
            eventloop,
            subscription: config.subscription_topic(),
        }
    }

    /// Wait for the broker to accept the first connection and subscribe.
    /// An unreachable or silent broker is an error rather than a retry.
    pub async fn connect(&mut self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, wait_for_connack(&mut self.eventloop))
            .await
            .map_err(|_| Error::MqttTimeout(timeout))??;
        info!("Connected to MQTT broker");
        self.client
            .subscribe(&self.subscription, QoS::AtLeastOnce)
            .await?;
        info!("Subscribed to {}", self.subscription);
        Ok(())
    }

    /// Spawn the event loop and hand back its control side.
    pub fn spawn(self, message_tx: mpsc::Sender<MqttMessage>) -> BusConnection {
        let client = self.client.clone();
        let subscription = self.subscription.clone();
        let task = tokio::spawn(self.run(message_tx));
        BusConnection {
            client,
            subscription,
            task,
        }
    }

    /// Run the MQTT event loop. Subscribes on every reconnect and forwards each
    /// incoming publish through `message_tx`. Returns once a disconnect
    /// requested through the [`BusConnection`] has gone out.
    async fn run(mut self, message_tx: mpsc::Sender<MqttMessage>) {
        let mut forwarder = Forwarder::new(message_tx);

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("Reconnected to MQTT broker");

                    // Broker forgets subscriptions on a clean-session reconnect.
                    if let Err(e) = self
                        .client
                        .subscribe(&self.subscription, QoS::AtLeastOnce)
                        .await
                    {
                        error!("Failed to subscribe to {}: {}", self.subscription, e);
                    }
                }
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    forwarder
                        .forward(MqttMessage {
                            topic: publish.topic.clone(),
                            payload: String::from_utf8_lossy(&publish.payload).to_string(),
                        })
                        .await;
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    info!("Disconnected from MQTT broker");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT connection error: {}. Reconnecting...", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<()> {
    loop {
        if let Event::Incoming(Incoming::ConnAck(_)) = eventloop.poll().await? {
            return Ok(());
        }
    }
}

/// Passes bus messages on until the receiving side goes away, then drops them.
struct Forwarder {
    tx: mpsc::Sender<MqttMessage>,
    open: bool,
}

impl Forwarder {
    fn new(tx: mpsc::Sender<MqttMessage>) -> Self {
        Self { tx, open: true }
    }

    async fn forward(&mut self, msg: MqttMessage) {
        if !self.open {
            return;
        }
        if self.tx.send(msg).await.is_err() {
            warn!("Bus message channel closed, dropping further messages");
            self.open = false;
        }
    }
}

impl BusControl for BusConnection {
    async fn unsubscribe(&mut self) -> Result<()> {
        self.client.unsubscribe(&self.subscription).await?;
        info!("Unsubscribed from {}", self.subscription);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.client.disconnect().await?;
        if tokio::time::timeout(Duration::from_secs(5), &mut self.task)
            .await
            .is_err()
        {
            warn!("MQTT event loop did not stop in time");
            self.task.abort();
        }
        Ok(())
    }
}
