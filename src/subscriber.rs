//! Background event subscriber.
//!
//! Holds the broker endpoint and idles until the shared shutdown token is
//! cancelled, emitting a heartbeat on every interval. Message consumption is
//! not part of this service yet.

use crate::component::Component;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const COMPONENT_NAME: &str = "subscriber";

pub struct Subscriber {
    nats_url: String,
    heartbeat_interval: Duration,
}

impl Subscriber {
    pub fn new(nats_url: impl Into<String>, heartbeat_interval: Duration) -> Self {
        Self {
            nats_url: nats_url.into(),
            heartbeat_interval,
        }
    }

    pub fn nats_url(&self) -> &str {
        &self.nats_url
    }
}

#[async_trait]
impl Component for Subscriber {
    fn name(&self) -> &str {
        COMPONENT_NAME
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!(nats_url = %self.nats_url, "NATS subscriber started");

        let mut heartbeat = interval(self.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = heartbeat.tick() => {
                    metrics::counter!("processor_subscriber_heartbeats_total").increment(1);
                    debug!(nats_url = %self.nats_url, "subscriber idle");
                }
            }
        }

        info!("NATS subscriber shutting down");
        Ok(())
    }
}
