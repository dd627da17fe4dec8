//! Glue between the bus, the device store and the chat.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tracing::{debug, info, warn};

use crate::commands::CommandRegistry;
use crate::lifecycle::{LifecycleController, LoopHandle};
use crate::mqtt::BusControl;
use crate::mqtt::client::MqttMessage;
use crate::telegram::{ChatCommand, ChatSender};
use crate::ups::store::DeviceStateStore;
use crate::ups::{notify, payload};

pub struct Dispatcher {
    store: DeviceStateStore,
    commands: CommandRegistry,
    chat: ChatSender,
}

impl Dispatcher {
    pub fn new(commands: CommandRegistry, chat: ChatSender) -> Self {
        Self {
            store: DeviceStateStore::new(),
            commands,
            chat,
        }
    }

    pub fn store(&self) -> &DeviceStateStore {
        &self.store
    }

    /// Track the status carried by one bus message and notify the chat if the
    /// device is new or its basic status changed.
    pub fn handle_bus_message(&mut self, msg: &MqttMessage, now: DateTime<Utc>) {
        let Some(update) = payload::extract(&msg.payload) else {
            debug!("No ups.status in message on {}, skipping", msg.topic);
            return;
        };

        let basic_status = update.basic_status.clone();
        let outcome = self.store.update(&msg.topic, update, now);
        if let Some(text) = notify::decide(outcome, &msg.topic, &basic_status) {
            info!("Notifying {}", text);
            self.chat.send(text);
        }
    }

    pub fn handle_command(&self, cmd: &ChatCommand, now: DateTime<Utc>) {
        match self
            .commands
            .dispatch(&cmd.name, &cmd.argument, &self.store, now)
        {
            Some(reply) => {
                info!("Answering /{}", cmd.name);
                self.chat.send(reply);
            }
            None => warn!("Unknown command /{}", cmd.name),
        }
    }

    /// Process bus messages and chat commands until the keep-alive token is
    /// released. Work still queued at that point is left unprocessed.
    pub async fn run(
        &mut self,
        keep_alive: &mut LoopHandle,
        bus_rx: &mut mpsc::Receiver<MqttMessage>,
        command_rx: &mut mpsc::Receiver<ChatCommand>,
        summary_interval: Option<Duration>,
    ) {
        let mut summary = summary_interval.map(|period| {
            tokio::time::interval_at(Instant::now() + period, period)
        });

        loop {
            tokio::select! {
                biased;
                _ = keep_alive.released() => {
                    info!("Event loop released, {} devices tracked", self.store.len());
                    break;
                }
                Some(msg) = bus_rx.recv() => {
                    self.handle_bus_message(&msg, Utc::now());
                }
                Some(cmd) = command_rx.recv() => {
                    self.handle_command(&cmd, Utc::now());
                }
                _ = tick(&mut summary) => {
                    self.log_summary();
                }
            }
        }
    }

    /// Ordered teardown after the loop has been released: stop bus intake,
    /// close the chat queue and wait until everything queued has been sent,
    /// disconnect the bus, then mark the lifecycle stopped.
    pub async fn shutdown<B: BusControl>(
        self,
        bus: &mut B,
        chat_sender: JoinHandle<()>,
        controller: &mut LifecycleController,
    ) {
        if let Err(e) = bus.unsubscribe().await {
            warn!("Failed to unsubscribe: {}", e);
        }

        info!("Stopping with {} ups tracked", self.store.len());
        drop(self);
        if let Err(e) = chat_sender.await {
            warn!("Telegram sender task failed: {}", e);
        }

        if let Err(e) = bus.disconnect().await {
            warn!("Failed to disconnect from MQTT broker: {}", e);
        }
        controller.finish();
    }

    fn log_summary(&self) {
        let now = Utc::now();
        info!("Tracking {} ups", self.store.len());
        for (topic, state) in self.store.snapshot() {
            info!(
                "  {}: {} ({}s ago)",
                topic,
                state.full_status,
                (now - state.last_seen).num_seconds()
            );
        }
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
