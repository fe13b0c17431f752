use super::{publish_status, MeteringData, PublishData, Transmission};
use crate::config::PublishConfig;
use crate::snapshot::LatestFrame;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;

/// Publishes the most recent telegram once per interval.
///
/// Meters push a telegram every second (DSMR 5) or every ten seconds, which
/// is more than most brokers want to see. Only the newest frame is sent and
/// a frame that was already sent is not repeated.
pub struct FramePublisher {
    sender: Sender<Transmission>,
    latest: Arc<LatestFrame>,
    config: PublishConfig,
    base_topic: String,
    last_published: Option<u64>,
}

impl FramePublisher {
    pub fn new(sender: Sender<Transmission>, latest: Arc<LatestFrame>, config: PublishConfig, base_topic: &str) -> Self {
        Self {
            sender,
            latest,
            config,
            base_topic: base_topic.to_string(),
            last_published: None,
        }
    }

    pub async fn start_thread(&mut self) {
        info!("Publishing DSMR frames every {} seconds", self.config.interval);

        let mut interval = tokio::time::interval(Duration::from_secs(self.config.interval));
        loop {
            interval.tick().await;
            self.publish_latest().await;
            publish_status(&self.sender, &self.base_topic).await;
        }
    }

    /// Returns whether a new frame was handed to the MQTT layer.
    pub async fn publish_latest(&mut self) -> bool {
        let (seq, frame) = match self.latest.snapshot() {
            Some(snapshot) => snapshot,
            None => {
                debug!("No DSMR frame received yet");
                return false;
            }
        };

        if self.last_published == Some(seq) {
            debug!("DSMR frame #{} already published", seq);
            return false;
        }
        self.last_published = Some(seq);

        let data = MeteringData::from_frame(&frame);
        let _ = self.sender.send(Transmission::Metering(data)).await;

        if self.config.include_raw {
            let raw = PublishData {
                topic: format!("{}/raw", self.base_topic),
                payload: frame.raw.clone(),
                qos: 0,
                retain: false,
            };
            let _ = self.sender.send(Transmission::Publish(raw)).await;
        }

        let stats = self.latest.stats();
        for (name, count) in [("frames_decoded", stats.decoded), ("frames_rejected", stats.rejected)] {
            let publish = PublishData {
                topic: format!("{}/mgt/{}", self.base_topic, name),
                payload: count.to_string(),
                qos: 1,
                retain: true,
            };
            let _ = self.sender.send(Transmission::Publish(publish)).await;
        }

        true
    }
}
