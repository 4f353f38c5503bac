//! Operator preview: render every row into one HTML page and mark rows as
//! `ready` (or `missing image`) until the next dispatch run.
use crate::blob::{Blob, BlobResolver};
use crate::columns::Columns;
use crate::config::Settings;
use crate::dispatch::DispatchError;
use crate::model::{Marker, Status};
use crate::render::{image_file_name, render_for};
use crate::store::RecipientStore;
use crate::template::TemplatePair;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{info, instrument, warn};

pub const NO_ATTACHMENT: &str = "No attachment";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewReport {
    pub html: String,
    pub ready: usize,
    pub missing_images: usize,
}

/// Inline `<img>` carrying the blob itself, for viewing outside a mail client.
pub fn data_uri_image(blob: &Blob) -> String {
    format!(
        r#"<br><img src="data:{};base64,{}" style="max-width:300px;">"#,
        blob.content_type,
        STANDARD.encode(&blob.bytes)
    )
}

#[instrument(skip_all)]
pub async fn preview(
    settings: &Settings,
    templates: &TemplatePair,
    store: &dyn RecipientStore,
    blobs: &dyn BlobResolver,
) -> Result<PreviewReport, DispatchError> {
    let sheet = store.read_sheet().await?;
    let cols = Columns::for_preview(&sheet)?;

    let attachment_line = match settings.shared_attachment_folder() {
        Some(folder) => {
            let name = blobs
                .resolve_first(folder)
                .await?
                .map(|b| b.name)
                .unwrap_or_else(|| NO_ATTACHMENT.to_string());
            format!("<b>Attachment:</b> {}<br>", name)
        }
        None => String::new(),
    };

    let mut report = PreviewReport {
        html: String::from("<h2>Email Preview</h2><hr>"),
        ready: 0,
        missing_images: 0,
    };

    for (i, row) in sheet.rows.iter().enumerate() {
        let recipient = cols.recipient(i, row);
        let body = render_for(templates, &recipient);

        let mut status = Status::Ready;
        let mut image = String::new();
        if let Some(folder) = settings.inline_image_folder() {
            match blobs
                .resolve_by_name(folder, &image_file_name(&recipient.name))
                .await?
            {
                Some(blob) => image = data_uri_image(&blob),
                None => {
                    warn!(name = %recipient.name, "preview: image not found");
                    status = Status::MissingImage;
                }
            }
        }

        store
            .write_cell(i, cols.status, status.as_str(), Marker::Cleared)
            .await?;
        match status {
            Status::MissingImage => report.missing_images += 1,
            _ => report.ready += 1,
        }

        report.html.push_str(&format!(
            r#"<div style="margin-bottom:40px; padding:10px; border:1px solid #ccc;">
  <b>To:</b> {}<br>
  <b>Name:</b> {}<br>
  <b>Status:</b> {}<br>
  {}
  <b>Content:</b><br>{}{}
</div>"#,
            recipient.email,
            recipient.name,
            status.as_str(),
            attachment_line,
            body,
            image
        ));
    }

    info!(
        ready = report.ready,
        missing_images = report.missing_images,
        "preview rendered"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_embeds_base64_bytes() {
        let blob = Blob::new("Lan.png", b"abc".to_vec());
        assert_eq!(
            data_uri_image(&blob),
            r#"<br><img src="data:image/png;base64,YWJj" style="max-width:300px;">"#
        );
    }
}
