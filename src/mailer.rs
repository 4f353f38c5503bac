//! Outgoing transport: SMTP delivery with a local draft fallback.
use crate::blob::Blob;
use crate::config::Config;
use crate::render::INLINE_IMAGE_CID;
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// One rendered message. Blobs are shared by reference across a batch.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub inline_image: Option<Arc<Blob>>,
    pub attachment: Option<Arc<Blob>>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    /// The send budget for the current period is used up.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("{0}")]
    Transport(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), SendError>;

    /// Keep an unsent copy with identical content.
    async fn save_draft(&self, message: &OutgoingMessage) -> Result<(), SendError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    drafts: AsyncFileTransport<Tokio1Executor>,
    from: Mailbox,
}

impl fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

impl SmtpMailer {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let from: Mailbox = cfg.smtp.from.parse().context("invalid smtp.from address")?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp.host)
            .context("invalid smtp.host")?
            .port(cfg.smtp.port);
        if !cfg.smtp.username.trim().is_empty() {
            builder = builder.credentials(Credentials::new(
                cfg.smtp.username.clone(),
                cfg.resolved_smtp_password(),
            ));
        }
        Ok(Self {
            transport: builder.build(),
            drafts: AsyncFileTransport::<Tokio1Executor>::new(&cfg.app.drafts_dir),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), SendError> {
        let email = build_message(&self.from, message)?;
        match self.transport.send(email).await {
            Ok(_) => {
                info!(to = %message.to, "message sent");
                Ok(())
            }
            Err(err) => {
                let detail = err.to_string();
                if is_quota_signal(&detail) {
                    Err(SendError::QuotaExceeded(detail))
                } else {
                    Err(SendError::Transport(detail))
                }
            }
        }
    }

    async fn save_draft(&self, message: &OutgoingMessage) -> Result<(), SendError> {
        let email = build_message(&self.from, message)?;
        let id = self
            .drafts
            .send(email)
            .await
            .map_err(|e| SendError::Transport(format!("draft not saved: {}", e)))?;
        warn!(to = %message.to, draft_id = %id, "message saved as draft");
        Ok(())
    }
}

/// SMTP replies that mean the sender is over its sending budget. Recipient
/// side conditions (full mailbox, bad address) are ordinary failures.
pub fn is_quota_signal(detail: &str) -> bool {
    let detail = detail.to_lowercase();
    if ["4.2.2", "5.2.2", "mailbox full"]
        .iter()
        .any(|needle| detail.contains(needle))
    {
        return false;
    }
    ["5.4.5", "4.7.28", "sending quota", "rate limit"]
        .iter()
        .any(|needle| detail.contains(needle))
}

fn content_type(raw: &str) -> Result<ContentType, SendError> {
    ContentType::parse(raw)
        .map_err(|e| SendError::Transport(format!("invalid content type {}: {}", raw, e)))
}

/// HTML body in a related part (with the inline image), wrapped in a mixed
/// part carrying the optional attachment.
pub fn build_message(from: &Mailbox, message: &OutgoingMessage) -> Result<Message, SendError> {
    let to: Mailbox = message.to.parse().map_err(|e| {
        SendError::Transport(format!("invalid recipient address {}: {}", message.to, e))
    })?;

    let mut related = MultiPart::related().singlepart(SinglePart::html(message.html_body.clone()));
    if let Some(image) = &message.inline_image {
        related = related.singlepart(
            Attachment::new_inline(INLINE_IMAGE_CID.to_string())
                .body(image.bytes.clone(), content_type(&image.content_type)?),
        );
    }

    let mut mixed = MultiPart::mixed().multipart(related);
    if let Some(attachment) = &message.attachment {
        mixed = mixed.singlepart(
            Attachment::new(attachment.name.clone())
                .body(attachment.bytes.clone(), content_type(&attachment.content_type)?),
        );
    }

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(message.subject.clone())
        .multipart(mixed)
        .map_err(|e| SendError::Transport(format!("failed to build message: {}", e)))
}
