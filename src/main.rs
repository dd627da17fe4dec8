use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use nut_to_telegram::commands::CommandRegistry;
use nut_to_telegram::config::Config;
use nut_to_telegram::dispatcher::Dispatcher;
use nut_to_telegram::lifecycle::{self, LifecycleController};
use nut_to_telegram::mqtt::client::MqttClient;
use nut_to_telegram::telegram::bot::{CommandPoller, spawn_sender};
use nut_to_telegram::telegram::client::TelegramClient;
use nut_to_telegram::telegram::ChatSender;

const MQTT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting nut-to-telegram (mqtt={}:{}, topic={}, chat={})",
        config.mqtt.broker_host,
        config.mqtt.broker_port,
        config.subscription_topic(),
        config.telegram.chat_id,
    );

    let telegram = match TelegramClient::new(&config.telegram) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build Telegram client: {}", e);
            std::process::exit(1);
        }
    };
    match telegram.get_me().await {
        Ok(me) => info!(
            "Telegram bot {} ({})",
            me.username.as_deref().unwrap_or("<no username>"),
            me.id
        ),
        Err(e) => {
            error!("Telegram is not reachable: {}", e);
            std::process::exit(1);
        }
    }

    let commands = CommandRegistry::standard();
    if let Err(e) = telegram.set_my_commands(&commands.bot_commands()).await {
        warn!("Failed to publish command menu: {}", e);
    }

    let mut mqtt_client = MqttClient::new(&config);
    if let Err(e) = mqtt_client.connect(MQTT_CONNECT_TIMEOUT).await {
        error!("MQTT broker is not reachable: {}", e);
        std::process::exit(1);
    }

    // Signals and lifecycle
    let (signal_tx, signal_rx) = mpsc::channel(8);
    let signal_handles = match lifecycle::listen(signal_tx) {
        Ok(handles) => handles,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let (controller, mut keep_alive) = LifecycleController::new();
    let controller_task = tokio::spawn(controller.run(signal_rx));

    // Channels
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
    let (bus_tx, mut bus_rx) = mpsc::channel(100);
    let (command_tx, mut command_rx) = mpsc::channel(16);

    let sender_handle = spawn_sender(telegram.clone(), config.telegram.chat_id, outbound_rx);
    let poller = CommandPoller::new(
        telegram,
        config.telegram.chat_id,
        config.telegram.poll_timeout_secs,
    );
    let poller_handle = tokio::spawn(poller.run(command_tx));

    let mut bus = mqtt_client.spawn(bus_tx);

    let mut dispatcher = Dispatcher::new(commands, ChatSender::new(outbound_tx));
    dispatcher
        .run(
            &mut keep_alive,
            &mut bus_rx,
            &mut command_rx,
            config.summary_log_interval(),
        )
        .await;

    // Teardown: stop intake, flush the chat, then drop the bus.
    drop(bus_rx);
    drop(command_rx);
    poller_handle.abort();

    let mut controller = match controller_task.await {
        Ok(controller) => controller,
        Err(e) => {
            error!("Lifecycle task failed: {}", e);
            std::process::exit(1);
        }
    };
    dispatcher
        .shutdown(&mut bus, sender_handle, &mut controller)
        .await;
    for handle in signal_handles {
        handle.abort();
    }
    info!("nut-to-telegram stopped ({:?})", controller.state());
}
