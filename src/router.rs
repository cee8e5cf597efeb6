//! Dispatch of migrated jobs to the target broker.
//!
//! Each job goes to its original destination. Senders are created on first
//! use and cached per destination for the rest of the run, so N jobs for the
//! same queue attach exactly one link.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::broker::{Destination, MessageSender, TargetBroker};
use crate::error::TransportError;
use crate::record::TransformedJob;
use crate::removal::SinkOutcome;

/// Routes jobs to per-destination senders on an optional target broker.
pub struct DestinationRouter {
    target: Option<Box<dyn TargetBroker>>,
    /// Open senders keyed by destination, populated lazily.
    senders: HashMap<Destination, Box<dyn MessageSender>>,
}

impl DestinationRouter {
    pub fn new(target: Option<Box<dyn TargetBroker>>) -> Self {
        if target.is_none() {
            info!("Target broker not specified");
        }
        Self {
            target,
            senders: HashMap::new(),
        }
    }

    /// A router with no target broker; every forward is a no-op.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Number of senders opened so far.
    pub fn cached_senders(&self) -> usize {
        self.senders.len()
    }

    /// Forwards one job.
    ///
    /// - no target broker: nothing to do
    /// - no destination, or the sender cannot be opened: one failure
    /// - dry run: the sender is resolved but nothing is sent
    /// - send error: logged, one failure
    pub async fn forward(&mut self, job: &TransformedJob, dry_run: bool) -> SinkOutcome {
        let Some(target) = self.target.as_mut() else {
            return SinkOutcome::Done;
        };

        let tracking_id = job.tracking_id().unwrap_or("<none>");
        let Some(destination) = job.destination.as_ref() else {
            warn!(tracking_id, "Could not find destination for job");
            return SinkOutcome::Failed;
        };

        if !self.senders.contains_key(destination) {
            match target.open_sender(destination).await {
                Ok(sender) => {
                    debug!(destination = %destination, "Target destination opened");
                    self.senders.insert(destination.clone(), sender);
                }
                Err(e) => {
                    warn!(destination = %destination, error = %e, "Failed to open target sender");
                    return SinkOutcome::Failed;
                }
            }
        }

        let Some(sender) = self.senders.get_mut(destination) else {
            return SinkOutcome::Failed;
        };

        if dry_run {
            debug!(tracking_id, destination = %destination, "Forwarding job (dry run)");
            return SinkOutcome::Done;
        }

        debug!(tracking_id, destination = %destination, "Forwarding job");
        match sender.send(job.to_wire()).await {
            Ok(()) => SinkOutcome::Done,
            Err(e) => {
                warn!(tracking_id, destination = %destination, error = %e, "Failed to forward job");
                SinkOutcome::Failed
            }
        }
    }

    /// Closes every cached sender, then the target connection.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        for (destination, mut sender) in self.senders.drain() {
            if let Err(e) = sender.close().await {
                warn!(destination = %destination, error = %e, "Failed to close target sender");
            }
        }
        match self.target.take() {
            Some(mut target) => target.close().await,
            None => Ok(()),
        }
    }
}
