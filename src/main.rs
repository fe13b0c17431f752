use dsmr2mqtt::mqtt::publisher::FramePublisher;
use dsmr2mqtt::{Config, DsmrManager, LatestFrame, MqttManager};
use log::{error, info};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let default_filter = std::env::var("DSMR2MQTT_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let latest = Arc::new(LatestFrame::new());

    let (mut mqtt, tx) = MqttManager::new(&config.mqtt);
    let mqtt_task = tokio::spawn(async move {
        mqtt.start_thread().await;
    });

    let mut publisher = FramePublisher::new(tx, latest.clone(), config.publish.clone(), &config.mqtt.base_topic);
    let publisher_task = tokio::spawn(async move {
        publisher.start_thread().await;
    });

    /* The reader only returns when the serial port goes away */
    let dsmr = DsmrManager::new(latest);
    let result = dsmr.start_thread(config.serial.clone()).await;

    publisher_task.abort();
    mqtt_task.abort();

    match result {
        Ok(()) => info!("Serial stream ended, exiting"),
        Err(e) => {
            error!("Reading from {} failed: {}", config.serial.device, e);
            std::process::exit(1);
        }
    }
}
