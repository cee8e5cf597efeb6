//! Scheduled-job records as browsed from the source, and their migrated form.

use std::collections::BTreeMap;
use std::fmt;

use crate::broker::{Destination, Envelope, MessageBody, WireMessage};
use crate::error::MigrateError;
use crate::protocol::{SCHEDULED_DELAY, SCHEDULED_ID};

/// Immutable snapshot of one job returned by a browse request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledJobRecord {
    /// Scheduler-assigned id; the only key a removal request accepts.
    pub id: String,
    pub message_id: Option<String>,
    /// Where the job is delivered once it fires. `None` when the broker did
    /// not report one.
    pub original_destination: Option<Destination>,
    pub reply_to: Option<Destination>,
    /// When the job was registered, in epoch milliseconds. `None` when the
    /// response carried no creation time.
    pub enqueue_timestamp: Option<i64>,
    /// Remaining delay in milliseconds, absent for non-delay schedules.
    pub delay: Option<i64>,
    pub properties: BTreeMap<String, String>,
    pub body: MessageBody,
    pub envelope: Envelope,
}

impl ScheduledJobRecord {
    /// Builds a record from a browse response.
    ///
    /// A response without a scheduler id cannot be removed later and is
    /// treated as a protocol fault. An unparsable delay is kept as a plain
    /// property and the job is migrated without shifting.
    pub fn from_wire(message: WireMessage) -> Result<Self, MigrateError> {
        let id = message
            .property(SCHEDULED_ID)
            .map(str::to_string)
            .ok_or(MigrateError::MissingJobId {
                property: SCHEDULED_ID,
            })?;

        let delay = message
            .property(SCHEDULED_DELAY)
            .and_then(|d| d.trim().parse::<i64>().ok());

        Ok(Self {
            id,
            message_id: message.message_id,
            original_destination: message.original_destination,
            reply_to: message.reply_to,
            enqueue_timestamp: message.timestamp,
            delay,
            properties: message.properties,
            body: message.body,
            envelope: message.envelope,
        })
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Forwardable copy of a [`ScheduledJobRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedJob {
    pub message_id: Option<String>,
    pub destination: Option<Destination>,
    pub reply_to: Option<Destination>,
    pub enqueue_timestamp: Option<i64>,
    /// Delay recomputed against the transform instant. May be negative.
    pub shifted_delay: Option<i64>,
    /// Name of the property holding the source scheduler id.
    pub tracking_property: String,
    pub properties: BTreeMap<String, String>,
    pub body: MessageBody,
    /// Header, message properties and annotations carried over unchanged.
    pub envelope: Envelope,
}

impl TransformedJob {
    /// Source scheduler id, read back from the tracking property.
    pub fn tracking_id(&self) -> Option<&str> {
        self.properties.get(&self.tracking_property).map(String::as_str)
    }

    /// Wire form sent to the target broker.
    pub fn to_wire(&self) -> WireMessage {
        WireMessage {
            message_id: self.message_id.clone(),
            to: self.destination.clone(),
            reply_to: self.reply_to.clone(),
            original_destination: None,
            timestamp: self.enqueue_timestamp,
            properties: self.properties.clone(),
            body: self.body.clone(),
            envelope: self.envelope.clone(),
        }
    }
}

impl fmt::Display for TransformedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let destination = self
            .destination
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "<none>".to_string());

        writeln!(f, "tracking_id: {}", self.tracking_id().unwrap_or("<none>"))?;
        writeln!(f, "message_id: {}", self.message_id.as_deref().unwrap_or("<none>"))?;
        writeln!(f, "destination: {}", destination)?;
        match self.enqueue_timestamp {
            Some(ts) => writeln!(f, "enqueue_timestamp: {}", ts)?,
            None => writeln!(f, "enqueue_timestamp: <none>")?,
        }
        match self.shifted_delay {
            Some(delay) => writeln!(f, "delay: {}", delay)?,
            None => writeln!(f, "delay: <none>")?,
        }
        writeln!(f, "properties: {}", self.properties.len())?;
        writeln!(f, "body: {}", self.body.kind())
    }
}
