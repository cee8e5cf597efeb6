//! Rewrites a browsed job into the message sent to the target.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::DateTime;
use tracing::{debug, warn};

use crate::protocol::{SCHEDULED_DELAY, SCHEDULED_ID};
use crate::record::{ScheduledJobRecord, TransformedJob};

/// Returns the current time as milliseconds since UNIX epoch.
pub fn epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

fn format_instant(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

/// Produces forwardable copies of scheduled jobs.
#[derive(Debug, Clone)]
pub struct MessageTransformer {
    tracking_property: String,
}

impl MessageTransformer {
    pub fn new(tracking_property: impl Into<String>) -> Self {
        Self {
            tracking_property: tracking_property.into(),
        }
    }

    pub fn tracking_property(&self) -> &str {
        &self.tracking_property
    }

    /// Copies `record` for forwarding as observed at `now` (epoch ms).
    ///
    /// The scheduler id moves to the tracking property, and a present delay
    /// is reduced by the time elapsed since the job was enqueued so that
    /// `now + shifted_delay == enqueue_timestamp + delay`. The result is not
    /// clamped; a negative delay is left for the target broker to interpret.
    /// Arithmetic saturates at the `i64` range.
    ///
    /// Without an enqueue time there is nothing to measure from, so the delay
    /// is forwarded unshifted.
    pub fn fix(&self, record: &ScheduledJobRecord, now: i64) -> TransformedJob {
        let mut properties = record.properties.clone();
        properties.remove(SCHEDULED_ID);
        properties.insert(self.tracking_property.clone(), record.id.clone());

        let shifted_delay = record.delay.map(|delay| match record.enqueue_timestamp {
            Some(enqueued) => {
                let shifted = delay.saturating_sub(now.saturating_sub(enqueued));
                debug!(
                    job_id = %record.id,
                    from = %format!("{}+{}={}", enqueued, delay, format_instant(enqueued.saturating_add(delay))),
                    to = %format!("{}+{}={}", now, shifted, format_instant(now.saturating_add(shifted))),
                    "Shifting delay"
                );
                properties.insert(SCHEDULED_DELAY.to_string(), shifted.to_string());
                shifted
            }
            None => {
                warn!(job_id = %record.id, delay, "Job has no creation time, delay not shifted");
                delay
            }
        });

        TransformedJob {
            message_id: record.message_id.clone(),
            destination: record.original_destination.clone(),
            reply_to: record.reply_to.clone(),
            enqueue_timestamp: record.enqueue_timestamp,
            shifted_delay,
            tracking_property: self.tracking_property.clone(),
            properties,
            body: record.body.clone(),
            envelope: record.envelope.clone(),
        }
    }
}
