//! Schedule ingestion pipeline.
//!
//! One cycle walks these stages:
//!
//! 1. fetch the published document
//! 2. compare its fingerprint with the last ingested document
//! 3. hand it to the conversion collaborator for a cell grid
//! 4. normalize the grid into records
//! 5. swap the store's snapshot for the new records
//! 6. notify every known contact
//!
//! A cycle that stops early leaves the store as it was, and only one
//! cycle runs at a time.

mod convert;
mod error;
mod fetch;
mod fingerprint;
mod notify;
pub mod scheduler;

pub use convert::{CommandConverter, Converter};
pub use error::{IngestError, NotifyError};
pub use fetch::DocumentSource;
pub use fingerprint::{ChangeDetector, Fingerprint};
pub use notify::{notify_all, FanOutReport, LoggingNotifier, Notifier, WebhookNotifier};

use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::db::ScheduleStore;
use crate::normalize::normalize;

/// Downloaded document waiting to be ingested.
const STAGING_FILE: &str = "incoming.pdf";
/// The document the current snapshot was built from.
const INGESTED_FILE: &str = "current.pdf";
/// Grid written by the conversion collaborator.
const GRID_FILE: &str = "incoming.json";

/// Where the pipeline is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Fetching,
    Comparing,
    Converting,
    Normalizing,
    Replacing,
    Notifying,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Fetching => "fetching",
            Stage::Comparing => "comparing",
            Stage::Converting => "converting",
            Stage::Normalizing => "normalizing",
            Stage::Replacing => "replacing",
            Stage::Notifying => "notifying",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a cycle that installed a new snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub fingerprint: Fingerprint,
    pub records: usize,
    pub notifications: FanOutReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The document matches the one already ingested
    Unchanged { fingerprint: Fingerprint },
    Updated(CycleReport),
}

pub struct IngestPipeline {
    source: DocumentSource,
    detector: ChangeDetector,
    converter: Arc<dyn Converter>,
    notifier: Arc<dyn Notifier>,
    store: Arc<ScheduleStore>,
    data_dir: PathBuf,
    staging_path: PathBuf,
    notify_message: String,
    notify_concurrency: usize,
    stage: watch::Sender<Stage>,
    cycle_lock: Mutex<()>,
}

impl IngestPipeline {
    pub fn new(
        source: DocumentSource,
        converter: Arc<dyn Converter>,
        notifier: Arc<dyn Notifier>,
        store: Arc<ScheduleStore>,
        data_dir: impl AsRef<Path>,
    ) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        let defaults = crate::config::NotifyConfig::default();

        Self {
            source,
            detector: ChangeDetector::new(data_dir.join(INGESTED_FILE)),
            converter,
            notifier,
            store,
            staging_path: data_dir.join(STAGING_FILE),
            data_dir,
            notify_message: defaults.message,
            notify_concurrency: defaults.concurrency,
            stage: watch::channel(Stage::Idle).0,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Builds the production pipeline: HTTP source, command converter, and a
    /// webhook notifier when one is configured.
    pub fn from_config(config: &Config, store: Arc<ScheduleStore>) -> Result<Self, IngestError> {
        let source = DocumentSource::new(config.source_url.clone(), config.fetch_timeout())?;
        let converter = CommandConverter::new(
            config.convert_command.clone(),
            config.data_dir.join(GRID_FILE),
            config.convert_timeout(),
        );
        let notifier: Arc<dyn Notifier> = match &config.notify.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone())?),
            None => Arc::new(LoggingNotifier),
        };

        Ok(Self::new(
            source,
            Arc::new(converter),
            notifier,
            store,
            &config.data_dir,
        )
        .with_notification(config.notify.message.clone(), config.notify.concurrency))
    }

    pub fn with_notification(mut self, message: impl Into<String>, concurrency: usize) -> Self {
        self.notify_message = message.into();
        self.notify_concurrency = concurrency;
        self
    }

    pub fn store(&self) -> &Arc<ScheduleStore> {
        &self.store
    }

    pub fn stage(&self) -> Stage {
        *self.stage.borrow()
    }

    /// Watch stage transitions.
    pub fn subscribe(&self) -> watch::Receiver<Stage> {
        self.stage.subscribe()
    }

    fn enter(&self, stage: Stage, correlation_id: &str) {
        debug!(correlation_id = %correlation_id, stage = %stage, "Ingestion stage");
        self.stage.send_replace(stage);
    }

    /// Runs one ingestion cycle.
    ///
    /// Returns [`IngestError::CycleInProgress`] immediately if another cycle
    /// holds the pipeline. Failures are logged here; callers only need the
    /// result for reporting.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, IngestError> {
        let _guard = self
            .cycle_lock
            .try_lock()
            .map_err(|_| IngestError::CycleInProgress)?;

        let correlation_id = generate_correlation_id();
        let start = Instant::now();
        info!(
            correlation_id = %correlation_id,
            url = %self.source.url(),
            "Starting ingestion cycle"
        );

        let result = self.execute_cycle(&correlation_id).await;
        self.enter(Stage::Idle, &correlation_id);

        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(CycleOutcome::Unchanged { fingerprint }) => info!(
                correlation_id = %correlation_id,
                fingerprint = %fingerprint,
                duration_ms,
                "Schedule document unchanged"
            ),
            Ok(CycleOutcome::Updated(report)) => info!(
                correlation_id = %correlation_id,
                fingerprint = %report.fingerprint,
                records = report.records,
                delivered = report.notifications.delivered,
                failed = report.notifications.failed,
                duration_ms,
                "Schedule updated"
            ),
            Err(e @ IngestError::NormalizationEmptyResult) => warn!(
                correlation_id = %correlation_id,
                error = %e,
                duration_ms,
                "Ingestion cycle aborted"
            ),
            Err(e) => error!(
                correlation_id = %correlation_id,
                error = %e,
                recoverable = e.is_recoverable(),
                duration_ms,
                "Ingestion cycle failed"
            ),
        }

        result
    }

    async fn execute_cycle(&self, correlation_id: &str) -> Result<CycleOutcome, IngestError> {
        self.enter(Stage::Fetching, correlation_id);
        let document = self.source.fetch().await?;

        self.enter(Stage::Comparing, correlation_id);
        let fingerprint = Fingerprint::of(&document);
        if !self.detector.has_changed(&fingerprint).await? {
            return Ok(CycleOutcome::Unchanged { fingerprint });
        }
        info!(
            correlation_id = %correlation_id,
            fingerprint = %fingerprint,
            bytes = document.len(),
            "Schedule document changed"
        );

        self.enter(Stage::Converting, correlation_id);
        tokio::fs::create_dir_all(&self.data_dir).await?;
        tokio::fs::write(&self.staging_path, &document).await?;
        let sheet = self.converter.convert(&self.staging_path).await?;

        self.enter(Stage::Normalizing, correlation_id);
        let records = normalize(&sheet);
        if records.is_empty() {
            return Err(IngestError::NormalizationEmptyResult);
        }

        self.enter(Stage::Replacing, correlation_id);
        // Runs to completion even if this future is dropped, so shutdown can
        // never interrupt the swap halfway.
        let store = self.store.clone();
        let count = tokio::task::spawn_blocking(move || store.replace_schedule(&records))
            .await
            .map_err(|e| IngestError::StoreReplace {
                message: e.to_string(),
            })?
            .map_err(|e| IngestError::StoreReplace {
                message: e.to_string(),
            })?;

        self.detector.mark_ingested(fingerprint);
        if let Err(e) = tokio::fs::rename(&self.staging_path, self.detector.ingested_path()).await {
            // Only this process remembers the document; a restart ingests it again.
            warn!(
                correlation_id = %correlation_id,
                error = %e,
                "Failed to promote ingested document"
            );
        }

        self.enter(Stage::Notifying, correlation_id);
        let notifications = match self.store.contacts() {
            Ok(contacts) => {
                notify_all(
                    self.notifier.as_ref(),
                    &contacts,
                    &self.notify_message,
                    self.notify_concurrency,
                )
                .await
            }
            Err(e) => {
                warn!(
                    correlation_id = %correlation_id,
                    error = %e,
                    "Failed to load contacts, skipping notifications"
                );
                FanOutReport::default()
            }
        };

        Ok(CycleOutcome::Updated(CycleReport {
            fingerprint,
            records: count,
            notifications,
        }))
    }
}

/// Process exit status for a manually triggered cycle: `0` when the store
/// holds the published schedule (updated or already current), `1` otherwise.
pub fn exit_status(result: &Result<CycleOutcome, IngestError>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

fn generate_correlation_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}-{:08x}", timestamp & 0xFFFFFFFF, random)
}
