pub mod publisher;

use crate::config::MqttConfig;
use crate::dsmr::meter_definitions::{get_dsmr_obis_mapping, TEXT_IDS, TIMESTAMP_ID};
use crate::dsmr::Frame;
use lazy_static::lazy_static;
use log::{debug, error, info};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use serde_json;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MqttConnectionStatus {
    Connected,
    Disconnected,
    Error(String),
}

impl MqttConnectionStatus {
    pub fn as_payload(&self) -> String {
        match self {
            MqttConnectionStatus::Connected => "connected".to_string(),
            MqttConnectionStatus::Disconnected => "disconnected".to_string(),
            MqttConnectionStatus::Error(e) => format!("error: {}", e),
        }
    }
}

#[derive(Clone)]
pub struct AppStatus {
    pub start_time: Instant,
    pub mqtt_status: MqttConnectionStatus,
}

impl AppStatus {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            mqtt_status: MqttConnectionStatus::Disconnected,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

lazy_static! {
    pub static ref APP_STATUS: RwLock<AppStatus> = RwLock::new(AppStatus::new());
}

pub fn get_unix_ts() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MeteringData {
    pub id: String,
    pub meter_name: String,
    pub protocol: String,
    pub header: String,
    pub version: String,
    pub transmission_time: u64,
    pub metered_time: u64,
    pub metered_values: serde_json::Map<String, serde_json::Value>,
}

impl MeteringData {
    /// Flattens a telegram into named values.
    ///
    /// Known identifiers get their field name, everything else keeps the
    /// raw identifier. Numbers are sent as numbers, identifiers and texts as
    /// strings. Units go into `<name>_unit`, and `<name>_time` holds the
    /// object's own timestamp or else the telegram timestamp.
    pub fn from_frame(frame: &Frame) -> Self {
        let mapping = get_dsmr_obis_mapping();
        let mut metered_values = serde_json::Map::new();

        for (id, obj) in &frame.objects {
            let name = mapping.get(id.as_str()).map(|n| n.to_string()).unwrap_or_else(|| id.clone());

            let value = if id == TIMESTAMP_ID {
                match frame.time.time() {
                    Some(t) => serde_json::Value::String(t.to_rfc3339()),
                    None => serde_json::Value::Null,
                }
            } else if TEXT_IDS.contains(&id.as_str()) {
                serde_json::Value::String(obj.value.data.clone())
            } else {
                obj.value.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(serde_json::Value::Number)
                    .unwrap_or_else(|| serde_json::Value::String(obj.value.data.clone()))
            };
            metered_values.insert(name.clone(), value);

            if !obj.value.unit.is_empty() {
                metered_values.insert(format!("{}_unit", name), obj.value.unit.clone().into());
            }
            if id != TIMESTAMP_ID {
                if let Some(t) = frame.effective_time(id).time() {
                    metered_values.insert(format!("{}_time", name), t.to_rfc3339().into());
                }
            }
        }

        let meter_name = if frame.equipment_id.is_empty() {
            frame.header.clone()
        } else {
            frame.equipment_id.clone()
        };

        let now = get_unix_ts();
        let metered_time = frame.time.to_utc()
            .and_then(|t| u64::try_from(t.timestamp()).ok())
            .unwrap_or(now);

        MeteringData {
            id: format!("dsmr-{}", meter_name),
            meter_name,
            protocol: "dsmr".to_string(),
            header: frame.header.clone(),
            version: frame.version.clone(),
            transmission_time: now,
            metered_time,
            metered_values,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishData {
    pub topic: String,
    pub payload: String,
    pub qos: u8,
    pub retain: bool,
}

#[derive(Debug)]
pub enum Transmission {
    Metering(MeteringData),
    Publish(PublishData),
}

pub struct MqttManager {
    rx: Receiver<Transmission>,
    client: AsyncClient,
    base_topic: String,
}

fn to_qos(qos: u8) -> QoS {
    match qos {
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtMostOnce,
    }
}

impl MqttManager {
    pub fn new(config: &MqttConfig) -> (Self, Sender<Transmission>) {
        let (mtx, mrx) = tokio::sync::mpsc::channel(100);

        info!("MQTT connection to {}:{} starting up", config.host, config.port);
        let mut mqttoptions = MqttOptions::new(config.client_name.clone(), config.host.clone(), config.port);
        mqttoptions.set_keep_alive(Duration::from_secs(5));
        if let Some(user) = &config.user {
            mqttoptions.set_credentials(user.clone(), config.pass.clone().unwrap_or_default());
        }

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 10);

        tokio::spawn(async move {
            info!("MQTT Eventloop started");
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected to MQTT broker");
                        APP_STATUS.write().await.mqtt_status = MqttConnectionStatus::Connected;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Error in MQTT {:?}, reconnecting", e);
                        APP_STATUS.write().await.mqtt_status = MqttConnectionStatus::Error(e.to_string());
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        (MqttManager {
            rx: mrx,
            client,
            base_topic: config.base_topic.clone(),
        }, mtx)
    }

    pub async fn start_thread(&mut self) {
        while let Some(transmission) = self.rx.recv().await {
            match transmission {
                Transmission::Metering(data) => {
                    info!("Metering data received: {}", data.id);
                    self.publish_metering(&data).await;
                }
                Transmission::Publish(publish_data) => {
                    match self.client.publish(
                        publish_data.topic,
                        to_qos(publish_data.qos),
                        publish_data.retain,
                        publish_data.payload,
                    ).await {
                        Err(e) => { error!("Error publishing: {}", e); }
                        Ok(_) => { debug!("Published successfully"); }
                    }
                }
            }
        }

        info!("All MQTT senders gone, thread exits");
    }

    async fn publish_metering(&self, data: &MeteringData) {
        let values = match serde_json::to_string(&data.metered_values) {
            Ok(values) => values,
            Err(e) => {
                error!("Unable to serialize metering data {}: {}", data.id, e);
                return;
            }
        };

        match self.client.publish(metering_topic(&self.base_topic, data), QoS::AtLeastOnce, false, values).await {
            Err(e) => { error!("Error sending: {}", e); }
            Ok(_) => { debug!("Send successfully"); }
        }
    }
}

pub fn metering_topic(base_topic: &str, data: &MeteringData) -> String {
    format!("{}/devs/{}", base_topic, data.meter_name)
}

pub async fn get_app_status() -> AppStatus {
    APP_STATUS.read().await.clone()
}

/// Sends the retained management topics `<base>/mgt/uptime` and
/// `<base>/mgt/mqtt_status`.
pub async fn publish_status(mqtt_sender: &Sender<Transmission>, base_topic: &str) {
    let app_status = get_app_status().await;

    let topics = [
        ("uptime", app_status.uptime_seconds().to_string()),
        ("mqtt_status", app_status.mqtt_status.as_payload()),
    ];
    for (name, payload) in topics {
        let publish = PublishData {
            topic: format!("{}/mgt/{}", base_topic, name),
            payload,
            qos: 1,
            retain: true,
        };
        let _ = mqtt_sender.send(Transmission::Publish(publish)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsmr::testdata::SAMPLE_TELEGRAM;
    use crate::dsmr::decode_frame;

    #[test]
    fn test_metering_data_from_frame() {
        let frame = decode_frame(SAMPLE_TELEGRAM).unwrap();
        let data = MeteringData::from_frame(&frame);

        assert_eq!(data.meter_name, "4B384547303034303436333935353037");
        assert_eq!(data.id, "dsmr-4B384547303034303436333935353037");
        assert_eq!(data.protocol, "dsmr");
        assert_eq!(data.version, "50");
        assert_eq!(data.header, "ISk5\\2MT382-1000");
        /* 2010-12-09T10:30:20Z */
        assert_eq!(data.metered_time, 1291890620);

        let values = &data.metered_values;
        assert_eq!(values["energy_delivered_low"], serde_json::json!(123456.789));
        assert_eq!(values["energy_delivered_low_unit"], serde_json::json!("kWh"));
        assert_eq!(values["voltage_l1"], serde_json::json!(220.1));
        assert_eq!(values["tariff_indicator"], serde_json::json!(2.0));
        assert_eq!(values["version"], serde_json::json!("50"));
        assert_eq!(values["equipment_id"], serde_json::json!("4B384547303034303436333935353037"));
        assert_eq!(values["timestamp"], serde_json::json!("2010-12-09T11:30:20+01:00"));
        assert_eq!(values["gas_delivered"], serde_json::json!(12785.123));
        assert_eq!(values["gas_delivered_unit"], serde_json::json!("m3"));
        assert_eq!(values["gas_delivered_time"], serde_json::json!("2010-12-09T11:25:00+01:00"));
        assert_eq!(values["voltage_l1_time"], serde_json::json!("2010-12-09T11:30:20+01:00"));
        assert!(!values.contains_key("timestamp_time"));
        assert_eq!(values["0-0:96.7.21"], serde_json::json!(4.0));
        assert_eq!(values["0-0:96.13.0"], serde_json::json!(""));
    }

    #[test]
    fn test_meter_name_falls_back_to_header() {
        let frame = decode_frame("/XMX5LGBBFG1012463207\r\n1-0:1.8.1(000002.000*kWh)\r\n!").unwrap();
        let before = get_unix_ts();
        let data = MeteringData::from_frame(&frame);
        assert_eq!(data.meter_name, "XMX5LGBBFG1012463207");
        assert!(data.metered_time >= before);
    }

    #[test]
    fn test_qos_mapping() {
        assert_eq!(to_qos(0), QoS::AtMostOnce);
        assert_eq!(to_qos(1), QoS::AtLeastOnce);
        assert_eq!(to_qos(2), QoS::ExactlyOnce);
        assert_eq!(to_qos(7), QoS::AtMostOnce);
    }

    #[test]
    fn test_metering_topic() {
        let frame = decode_frame(SAMPLE_TELEGRAM).unwrap();
        let data = MeteringData::from_frame(&frame);
        assert_eq!(metering_topic("p1", &data), "p1/devs/4B384547303034303436333935353037");
    }

    #[test]
    fn test_connection_status_payload() {
        assert_eq!(MqttConnectionStatus::Connected.as_payload(), "connected");
        assert_eq!(MqttConnectionStatus::Disconnected.as_payload(), "disconnected");
        assert_eq!(
            MqttConnectionStatus::Error("connection refused".to_string()).as_payload(),
            "error: connection refused"
        );
    }

    #[tokio::test]
    async fn test_publish_status() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        publish_status(&tx, "p1").await;
        drop(tx);

        let mut sent = Vec::new();
        while let Some(t) = rx.recv().await {
            match t {
                Transmission::Publish(p) => sent.push(p),
                other => panic!("unexpected transmission {other:?}"),
            }
        }

        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].topic, "p1/mgt/uptime");
        assert!(sent[0].payload.parse::<u64>().is_ok());
        assert_eq!(sent[1].topic, "p1/mgt/mqtt_status");
        assert_eq!(sent[1].payload, get_app_status().await.mqtt_status.as_payload());
        assert!(sent.iter().all(|p| p.retain));
    }
}
