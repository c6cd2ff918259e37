//! One daily run: acquire a batch, render it, mail it.
//!
//! Entries are stored as they are accepted, so a mail failure or a timeout
//! never loses them; the batch is simply not delivered.

use crate::acquisition::{AcquiredBatch, AcquisitionError, AcquisitionLoop, AcquisitionStats};
use crate::mailer::{Envelope, Mailer};
use lexicon_shared::{MailError, VocabularyEntry};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    /// The batch was stored but could not be delivered
    #[error("Failed to send digest of {} words: {}", .entries.len(), .source)]
    Mail {
        #[source]
        source: MailError,
        entries: Vec<VocabularyEntry>,
    },

    /// Acquisition did not complete a batch before the run deadline
    #[error("Acquisition did not finish within {0:?}")]
    TimedOut(Duration),
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub entries: Vec<VocabularyEntry>,
    pub stats: AcquisitionStats,
}

/// Acquisition → digest → mail, with an optional deadline
pub struct Pipeline {
    acquisition: AcquisitionLoop,
    mailer: Arc<dyn Mailer>,
    envelope: Envelope,
    target_count: usize,
    run_timeout: Option<Duration>,
}

impl Pipeline {
    pub fn new(
        acquisition: AcquisitionLoop,
        mailer: Arc<dyn Mailer>,
        envelope: Envelope,
        target_count: usize,
    ) -> Self {
        Self {
            acquisition,
            mailer,
            envelope,
            target_count,
            run_timeout: None,
        }
    }

    /// Bound acquisition in each run; `None` lets the loop retry indefinitely
    pub fn with_run_timeout(mut self, run_timeout: Option<Duration>) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    /// Run with the configured target count
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        self.run_with_count(self.target_count).await
    }

    pub async fn run_with_count(&self, target_count: usize) -> Result<RunSummary, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);

        async move {
            match self.acquire(target_count).await {
                Ok(batch) => self.deliver(run_id, batch).await,
                Err(e) => Err(e),
            }
        }
        .instrument(span)
        .await
    }

    /// The run deadline bounds acquisition only; a completed batch is
    /// always handed to the mailer.
    async fn acquire(&self, target_count: usize) -> Result<AcquiredBatch, PipelineError> {
        let acquisition = self.acquisition.acquire_batch_with_stats(target_count);
        match self.run_timeout {
            Some(limit) => match tokio::time::timeout(limit, acquisition).await {
                Ok(result) => Ok(result?),
                Err(_) => Err(PipelineError::TimedOut(limit)),
            },
            None => Ok(acquisition.await?),
        }
    }

    async fn deliver(&self, run_id: Uuid, batch: AcquiredBatch) -> Result<RunSummary, PipelineError> {
        let message = self.envelope.digest(&batch.entries);
        if let Err(source) = self.mailer.send(&message).await {
            return Err(PipelineError::Mail {
                source,
                entries: batch.entries,
            });
        }
        info!("Delivered digest of {} words", batch.entries.len());

        Ok(RunSummary {
            run_id,
            entries: batch.entries,
            stats: batch.stats,
        })
    }
}
