//! Control-protocol conversation with the source broker's job scheduler.
//!
//! A run sends one `BROWSE` request whose reply-to is a private channel. The
//! scheduler answers with one message per job and no end marker, so the
//! stream is over once the channel stays quiet for the receive timeout.
//! `REMOVE` requests are fire-and-forget; the scheduler never acknowledges them.

use std::time::Duration;

use tracing::{debug, info};

use crate::broker::{Destination, SourceBroker, WireMessage};
use crate::error::{MigrateError, TransportError};
use crate::protocol::{
    ACTION_BROWSE, ACTION_REMOVE, MANAGEMENT_DESTINATION, SCHEDULED_ID, SCHEDULER_ACTION,
};
use crate::record::ScheduledJobRecord;

/// Builds the browse request answered on `reply_to`.
pub fn browse_request(reply_to: Destination) -> WireMessage {
    WireMessage {
        reply_to: Some(reply_to),
        ..Default::default()
    }
    .with_property(SCHEDULER_ACTION, ACTION_BROWSE)
}

/// Builds the request deleting job `id` from the scheduler store.
pub fn removal_request(id: &str) -> WireMessage {
    WireMessage::default()
        .with_property(SCHEDULER_ACTION, ACTION_REMOVE)
        .with_property(SCHEDULED_ID, id)
}

/// Owns the source broker connection for the length of a run.
pub struct BrowseSession {
    broker: Box<dyn SourceBroker>,
    management: Destination,
    reply_to: Option<Destination>,
}

impl BrowseSession {
    pub fn new(broker: Box<dyn SourceBroker>) -> Self {
        Self {
            broker,
            management: Destination::topic(MANAGEMENT_DESTINATION),
            reply_to: None,
        }
    }

    /// Opens the reply channel and sends the browse request. Responses
    /// arrive asynchronously and are pulled with [`next_record`](Self::next_record).
    pub async fn start_browse(&mut self) -> Result<(), MigrateError> {
        let reply_to = self.broker.open_reply_channel().await?;
        debug!(reply_to = %reply_to, "Sending browse request");
        self.broker
            .send(&self.management, browse_request(reply_to.clone()))
            .await?;
        self.reply_to = Some(reply_to);
        info!("Browse request sent");
        Ok(())
    }

    /// Waits up to `timeout` for the next job. `Ok(None)` marks the end of the stream.
    pub async fn next_record(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<ScheduledJobRecord>, MigrateError> {
        if self.reply_to.is_none() {
            return Err(TransportError::NoReplyChannel.into());
        }
        match self.broker.receive(timeout).await? {
            Some(message) => ScheduledJobRecord::from_wire(message).map(Some),
            None => {
                debug!(timeout_ms = timeout.as_millis() as u64, "No further browse responses");
                Ok(None)
            }
        }
    }

    /// Asks the scheduler to delete job `id`. No acknowledgement is awaited.
    pub async fn request_removal(&mut self, id: &str) -> Result<(), MigrateError> {
        debug!(job_id = id, "Requesting removal");
        self.broker
            .send(&self.management, removal_request(id))
            .await?;
        Ok(())
    }

    /// Releases the reply channel, producers and connection.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.reply_to = None;
        self.broker.close().await
    }
}
