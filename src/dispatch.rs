//! Batch dispatch: select eligible recipients, render, send, classify the
//! outcome, pace, then compact the pool.
use crate::blob::{Blob, BlobError, BlobResolver};
use crate::columns::{Columns, MissingColumns};
use crate::compact::{compact, CompactionSummary};
use crate::config::Settings;
use crate::db::Sheet;
use crate::mailer::{Mailer, OutgoingMessage, SendError};
use crate::model::{is_eligible, ArchiveRecord, Delivery, LogRecord, Marker, Recipient, Status};
use crate::pacing::{pick_delay, Pacer, TokioPacer};
use crate::render::{image_file_name, render_for, with_inline_image};
use crate::store::{Journal, RecipientStore};
use crate::template::{TemplateError, TemplatePair, TemplateStore};
use chrono::{DateTime, Local, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

pub const QUOTA_DRAFT_MESSAGE: &str = "Quota exceeded, saved as draft";

/// Conditions that abort a run.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    MissingColumns(#[from] MissingColumns),
    #[error("template unreachable: {0}")]
    Template(#[from] TemplateError),
    #[error("folder inaccessible: {0}")]
    Folder(#[from] BlobError),
    #[error("draft save failed for {email}: {source}")]
    Draft {
        email: String,
        #[source]
        source: SendError,
    },
    #[error("recipient store failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchResult {
    /// Send time absent, unparseable or still in the future.
    NotDue,
    NothingEligible,
    Completed(BatchReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub deliveries: Vec<Delivery>,
    pub compaction: CompactionSummary,
}

impl BatchReport {
    pub fn count(&self, status: Status) -> usize {
        self.deliveries.iter().filter(|d| d.status == status).count()
    }
}

/// Take the first `batch_size` eligible rows in sheet order.
pub fn select_batch(sheet: &Sheet, cols: &Columns, batch_size: usize) -> Vec<Recipient> {
    sheet
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| is_eligible(row.cell(cols.status)))
        .take(batch_size)
        .map(|(i, row)| cols.recipient(i, row))
        .collect()
}

pub struct Dispatcher {
    store: Arc<dyn RecipientStore>,
    journal: Arc<dyn Journal>,
    templates: Arc<dyn TemplateStore>,
    blobs: Arc<dyn BlobResolver>,
    mailer: Arc<dyn Mailer>,
    pacer: Arc<dyn Pacer>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn RecipientStore>,
        journal: Arc<dyn Journal>,
        templates: Arc<dyn TemplateStore>,
        blobs: Arc<dyn BlobResolver>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            store,
            journal,
            templates,
            blobs,
            mailer,
            pacer: Arc::new(TokioPacer),
        }
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Run one batch. Occupies the caller for the whole batch including
    /// the pauses between sends; callers must not run two batches against
    /// the same store concurrently.
    pub async fn run_batch(
        &self,
        settings: &Settings,
        now: DateTime<Local>,
    ) -> Result<BatchResult, DispatchError> {
        let run_id = Uuid::new_v4();
        self.run(settings, now, run_id)
            .instrument(info_span!("dispatch", %run_id))
            .await
    }

    async fn run(
        &self,
        settings: &Settings,
        now: DateTime<Local>,
        run_id: Uuid,
    ) -> Result<BatchResult, DispatchError> {
        let Some(send_at) = settings.scheduled_at() else {
            info!(send_time = ?settings.send_time, "no usable send time; skipping run");
            return Ok(BatchResult::NotDue);
        };
        if now < send_at {
            info!(%send_at, "send time not reached; skipping run");
            return Ok(BatchResult::NotDue);
        }

        let templates = TemplatePair::load(self.templates.as_ref(), settings).await?;
        let sheet = self.store.read_sheet().await?;
        let cols = Columns::for_dispatch(&sheet)?;

        if let Some(folder) = settings.inline_image_folder() {
            self.blobs.ensure_folder(folder).await?;
        }
        if let Some(folder) = settings.shared_attachment_folder() {
            self.blobs.ensure_folder(folder).await?;
        }

        let sheet = self.expire_ready(sheet, &cols).await?;

        let batch_size = usize::try_from(settings.batch_size).unwrap_or(usize::MAX);
        let batch = select_batch(&sheet, &cols, batch_size);
        drop(sheet);
        if batch.is_empty() {
            info!("no eligible recipients");
            return Ok(BatchResult::NothingEligible);
        }
        info!(size = batch.len(), "batch selected");

        let attachment = self.shared_attachment(settings).await?;

        let mut deliveries = Vec::with_capacity(batch.len());
        for (i, recipient) in batch.iter().enumerate() {
            let delivery = self
                .deliver(settings, &templates, recipient, attachment.clone())
                .await?;
            self.record(&cols, recipient, &delivery).await?;
            deliveries.push(delivery);

            if i + 1 < batch.len() {
                let delay = pick_delay(settings, &mut rand::thread_rng());
                debug!(secs = delay.as_secs(), "pausing before next send");
                self.pacer.pause(delay).await;
            }
        }

        let compaction = compact(self.store.as_ref()).await?;
        let report = BatchReport {
            run_id,
            deliveries,
            compaction,
        };
        info!(
            successful = report.count(Status::Successful),
            failed = report.count(Status::Failed),
            draft = report.count(Status::Draft),
            retained = compaction.retained,
            purged = compaction.purged,
            "batch finished"
        );
        Ok(BatchResult::Completed(report))
    }

    /// Preview writes are not commitments: collapse `ready` back to empty
    /// in the store, then apply the same change to the working copy.
    #[instrument(skip_all)]
    async fn expire_ready(&self, mut sheet: Sheet, cols: &Columns) -> Result<Sheet, DispatchError> {
        let mut expired = 0usize;
        for (i, row) in sheet.rows.iter_mut().enumerate() {
            if Status::parse_status(row.cell(cols.status)) == Some(Status::Ready) {
                self.store
                    .write_cell(i, cols.status, Status::Empty.as_str(), Marker::Cleared)
                    .await?;
                row.set_cell(cols.status, Status::Empty.as_str());
                row.marker = Marker::Cleared;
                expired += 1;
            }
        }
        if expired > 0 {
            info!(expired, "ready rows reset");
        }
        Ok(sheet)
    }

    async fn shared_attachment(
        &self,
        settings: &Settings,
    ) -> Result<Option<Arc<Blob>>, DispatchError> {
        let Some(folder) = settings.shared_attachment_folder() else {
            return Ok(None);
        };
        match self.blobs.resolve_first(folder).await? {
            Some(blob) => {
                info!(name = %blob.name, bytes = blob.bytes.len(), "shared attachment resolved");
                Ok(Some(Arc::new(blob)))
            }
            None => {
                warn!(folder, "no attachment found; sending without it");
                Ok(None)
            }
        }
    }

    /// Render and send to one recipient. Only a failed draft save escapes
    /// as an error; every other problem becomes a `failed` delivery.
    #[instrument(skip_all, fields(row = recipient.row, email = %recipient.email))]
    async fn deliver(
        &self,
        settings: &Settings,
        templates: &TemplatePair,
        recipient: &Recipient,
        attachment: Option<Arc<Blob>>,
    ) -> Result<Delivery, DispatchError> {
        let outcome = |status: Status, message: String| Delivery {
            row: recipient.row,
            name: recipient.name.clone(),
            email: recipient.email.clone(),
            status,
            message,
        };

        let mut body = render_for(templates, recipient);
        let mut inline_image = None;
        if let Some(folder) = settings.inline_image_folder() {
            match self
                .blobs
                .resolve_by_name(folder, &image_file_name(&recipient.name))
                .await
            {
                Ok(Some(blob)) => {
                    inline_image = Some(Arc::new(blob));
                    body = with_inline_image(body);
                }
                Ok(None) => {
                    warn!(name = %recipient.name, "recipient image not found");
                    return Ok(outcome(
                        Status::Failed,
                        format!("Image not found for: {}", recipient.name),
                    ));
                }
                Err(err) => {
                    warn!(%err, "recipient image lookup failed");
                    return Ok(outcome(Status::Failed, err.to_string()));
                }
            }
        }

        let message = OutgoingMessage {
            to: recipient.email.clone(),
            subject: settings.subject.clone(),
            html_body: body,
            inline_image,
            attachment,
        };

        match self.mailer.send(&message).await {
            Ok(()) => Ok(outcome(Status::Successful, String::new())),
            Err(SendError::QuotaExceeded(detail)) => {
                warn!(%detail, "send quota exhausted; saving draft");
                self.mailer
                    .save_draft(&message)
                    .await
                    .map_err(|source| DispatchError::Draft {
                        email: recipient.email.clone(),
                        source,
                    })?;
                Ok(outcome(Status::Draft, QUOTA_DRAFT_MESSAGE.to_string()))
            }
            Err(err @ SendError::Transport(_)) => {
                warn!(%err, "send failed");
                Ok(outcome(Status::Failed, err.to_string()))
            }
        }
    }

    /// Status cell write-back plus one log and one archive record.
    async fn record(
        &self,
        cols: &Columns,
        recipient: &Recipient,
        delivery: &Delivery,
    ) -> Result<(), DispatchError> {
        self.store
            .write_cell(
                recipient.row,
                cols.status,
                delivery.status.as_str(),
                delivery.status.marker(),
            )
            .await?;

        let at = Utc::now();
        self.journal
            .append_log(&LogRecord {
                logged_at: at,
                name: recipient.name.clone(),
                email: recipient.email.clone(),
                status: delivery.status.as_str().to_string(),
                message: delivery.message.clone(),
            })
            .await?;
        self.journal
            .append_archive(&ArchiveRecord {
                archived_at: at,
                name: recipient.name.clone(),
                academic_year: recipient.academic_year.clone(),
                gender: recipient.gender.clone(),
                email: recipient.email.clone(),
                status: delivery.status.as_str().to_string(),
                message: delivery.message.clone(),
            })
            .await?;
        info!(
            row = recipient.row,
            email = %recipient.email,
            status = delivery.status.as_str(),
            "delivery recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SheetRow;

    fn sheet(statuses: &[&str]) -> Sheet {
        Sheet {
            header: ["email", "name", "gender", "status", "academic_year"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            rows: statuses
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    SheetRow::new(vec![
                        format!("r{i}@x.io"),
                        format!("R{i}"),
                        "nam".into(),
                        s.to_string(),
                        "K1".into(),
                    ])
                })
                .collect(),
        }
    }

    #[test]
    fn selection_keeps_order_and_bound() {
        let s = sheet(&["successful", "", "failed", "Pending", "", "draft", ""]);
        let cols = Columns::for_dispatch(&s).unwrap();

        let rows: Vec<usize> = select_batch(&s, &cols, 10).iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![1, 3, 4, 6]);

        let rows: Vec<usize> = select_batch(&s, &cols, 2).iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![1, 3]);

        assert!(select_batch(&s, &cols, 0).is_empty());
    }

    #[test]
    fn nothing_eligible_after_terminal_statuses() {
        let s = sheet(&["successful", "draft", "failed", "ready"]);
        let cols = Columns::for_dispatch(&s).unwrap();
        assert!(select_batch(&s, &cols, 10).is_empty());
    }
}
