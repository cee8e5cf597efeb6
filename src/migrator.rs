//! The migration run: browse, filter, transform, archive, forward, remove.
//!
//! Records are handled strictly one at a time. A record's removal decision is
//! taken only after both sinks have reported, and always uses the id the
//! source scheduler assigned, never the transformed copy.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::archive::Archiver;
use crate::broker::amqp::{AmqpSource, AmqpTarget};
use crate::broker::{SourceBroker, TargetBroker};
use crate::config::RunConfig;
use crate::error::{MigrateError, TransportError};
use crate::filter::PropertyFilter;
use crate::record::ScheduledJobRecord;
use crate::removal::{RemovalMode, SinkOutcome};
use crate::router::DestinationRouter;
use crate::session::BrowseSession;
use crate::transform::{epoch_ms, MessageTransformer};

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Records received from the browse stream.
    pub received: u64,
    /// Records rejected by the property filter.
    pub filtered: u64,
    /// Records that went through both sinks.
    pub processed: u64,
    pub archive_failures: u64,
    pub forward_failures: u64,
    /// Removal requests sent to the source.
    pub removals_requested: u64,
    /// Removals the policy asked for but dry-run held back.
    pub removals_suppressed: u64,
}

pub struct Migrator {
    session: BrowseSession,
    router: DestinationRouter,
    archiver: Archiver,
    filter: PropertyFilter,
    transformer: MessageTransformer,
    removal_mode: RemovalMode,
    dry_run: bool,
    timeout: Duration,
    clock: fn() -> i64,
}

impl Migrator {
    pub fn new(
        session: BrowseSession,
        router: DestinationRouter,
        archiver: Archiver,
        config: &RunConfig,
    ) -> Self {
        Self {
            session,
            router,
            archiver,
            filter: config.filter.clone(),
            transformer: MessageTransformer::new(config.tracking_property.clone()),
            removal_mode: config.removal_mode,
            dry_run: config.dry_run,
            timeout: config.source_timeout,
            clock: epoch_ms,
        }
    }

    /// Replaces the wall clock (epoch milliseconds) used for delay shifting.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Sets up every sink and the source connection over AMQP.
    ///
    /// Order: archive directory, target broker, source broker. Any failure
    /// here is fatal and happens before a single job is read.
    pub async fn connect(config: &RunConfig) -> Result<Self, MigrateError> {
        debug!(dry_run = config.dry_run, "Dry run");
        if config.filter.is_empty() {
            info!("Property filters not specified");
        }

        let archiver = Archiver::prepare(config.target_dir.clone()).await?;

        let target = match &config.target {
            Some(endpoint) => {
                let target = AmqpTarget::connect(endpoint).await?;
                info!(url = %endpoint.url, "Target broker connected");
                Some(Box::new(target) as Box<dyn TargetBroker>)
            }
            None => None,
        };
        let router = DestinationRouter::new(target);

        Self::attach_source(config, archiver, router, AmqpSource::connect(&config.source)).await
    }

    /// Completes setup once the sinks are ready by awaiting the source
    /// connection. If the source cannot be reached the router, and with it
    /// any connected target broker, is closed before the error is returned.
    pub async fn attach_source<S, F>(
        config: &RunConfig,
        archiver: Archiver,
        mut router: DestinationRouter,
        source: F,
    ) -> Result<Self, MigrateError>
    where
        S: SourceBroker + 'static,
        F: Future<Output = Result<S, TransportError>>,
    {
        debug!(
            timeout_ms = config.source_timeout.as_millis() as u64,
            removal_mode = %config.removal_mode,
            "Source settings"
        );
        let source = match source.await {
            Ok(source) => source,
            Err(e) => {
                if let Err(close_err) = router.close().await {
                    warn!(error = %close_err, "Failed to shut down target broker");
                }
                return Err(e.into());
            }
        };
        info!(url = %config.source.url, "Source broker connected");

        Ok(Self::new(
            BrowseSession::new(Box::new(source)),
            router,
            archiver,
            config,
        ))
    }

    /// Runs the migration to the end of the browse stream.
    ///
    /// Target senders and connection are closed first, then the source
    /// session, whether or not the run failed.
    pub async fn run(mut self) -> Result<RunStats, MigrateError> {
        let result = self.process().await;

        if let Err(e) = self.router.close().await {
            warn!(error = %e, "Failed to shut down target broker");
        }
        if let Err(e) = self.session.close().await {
            warn!(error = %e, "Failed to shut down source broker");
        }

        let stats = result?;
        info!(
            received = stats.received,
            filtered = stats.filtered,
            processed = stats.processed,
            archive_failures = stats.archive_failures,
            forward_failures = stats.forward_failures,
            removals_requested = stats.removals_requested,
            removals_suppressed = stats.removals_suppressed,
            "Migration finished"
        );
        Ok(stats)
    }

    async fn process(&mut self) -> Result<RunStats, MigrateError> {
        let mut stats = RunStats::default();

        self.session.start_browse().await?;
        while let Some(record) = self.session.next_record(self.timeout).await? {
            stats.received += 1;
            self.process_record(record, &mut stats).await?;
        }

        info!("Done");
        Ok(stats)
    }

    async fn process_record(
        &mut self,
        record: ScheduledJobRecord,
        stats: &mut RunStats,
    ) -> Result<(), MigrateError> {
        if !self.filter.passes(&record) {
            stats.filtered += 1;
            return Ok(());
        }

        debug!(job_id = %record.id, destination = ?record.original_destination, "Processing");
        let job = self.transformer.fix(&record, (self.clock)());

        let archived = self.archiver.store(&job).await;
        let forwarded = self.router.forward(&job, self.dry_run).await;
        stats.processed += 1;
        if archived == SinkOutcome::Failed {
            stats.archive_failures += 1;
        }
        if forwarded == SinkOutcome::Failed {
            stats.forward_failures += 1;
        }

        let errors = archived.errors() + forwarded.errors();
        if !self.removal_mode.should_remove(errors) {
            return Ok(());
        }

        if self.dry_run {
            debug!(job_id = %record.id, "Removal skipped (dry run)");
            stats.removals_suppressed += 1;
            return Ok(());
        }

        self.session.request_removal(&record.id).await?;
        stats.removals_requested += 1;
        Ok(())
    }
}
