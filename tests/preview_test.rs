mod common;

use batch_mailer::model::Marker;
use batch_mailer::preview::{preview, NO_ATTACHMENT};
use batch_mailer::template::{FsTemplateStore, TemplatePair};
use batch_mailer::BatchResult;
use chrono::Local;
use common::*;

#[tokio::test]
async fn test_preview_marks_rows_and_next_run_expires_them() {
    let h = Harness::new(
        &HEADER,
        &[
            &["an@x.io", "An", "Nam", "", "K20"],
            &["lan@x.io", "Lan", "Nữ", "failed", "K21"],
        ],
    )
    .await;
    h.blobs.put("cards", "An.png", b"abc").await;
    h.blobs.folder("docs").await;

    let mut settings = settings();
    settings.use_inline_image = true;
    settings.image_folder_id = "cards".into();
    settings.use_attachment = true;
    settings.attachment_folder_id = "docs".into();

    let templates = TemplatePair::load(&FsTemplateStore::new(h.templates.path()), &settings)
        .await
        .unwrap();
    let report = preview(&settings, &templates, h.store.as_ref(), &h.blobs)
        .await
        .unwrap();

    assert_eq!(report.ready, 1);
    assert_eq!(report.missing_images, 1);
    assert!(report.html.starts_with("<h2>Email Preview</h2><hr>"));
    assert!(report.html.contains("<p>Dear Mr An</p>"));
    assert!(report.html.contains("<p>Dear Ms Lan</p>"));
    assert!(report.html.contains("data:image/png;base64,YWJj"));
    assert!(report.html.contains(NO_ATTACHMENT));
    assert!(h.mailer.sent().await.is_empty());

    let sheet = h.sheet().await;
    assert_eq!(sheet.rows[0].cell(STATUS_COL), "ready");
    assert_eq!(sheet.rows[1].cell(STATUS_COL), "missing image");
    assert!(sheet.rows.iter().all(|r| r.marker == Marker::Cleared));

    // `ready` collapses back to empty and is sent; `missing image` is neither
    // eligible nor retained.
    let result = h.dispatcher().run_batch(&settings, Local::now()).await.unwrap();
    assert!(matches!(result, BatchResult::Completed(_)));
    let sent: Vec<_> = h.mailer.sent().await.into_iter().map(|m| m.to).collect();
    assert_eq!(sent, vec!["an@x.io"]);
    assert!(h.sheet().await.rows.is_empty());
}

#[tokio::test]
async fn test_preview_shows_attachment_name() {
    let h = Harness::new(&HEADER, &[&["an@x.io", "An", "Nam", "", "K20"]]).await;
    h.blobs.put("docs", "guide.pdf", b"%PDF").await;

    let mut settings = settings();
    settings.use_attachment = true;
    settings.attachment_folder_id = "docs".into();

    let templates = TemplatePair::load(&FsTemplateStore::new(h.templates.path()), &settings)
        .await
        .unwrap();
    let report = preview(&settings, &templates, h.store.as_ref(), &h.blobs)
        .await
        .unwrap();
    assert!(report.html.contains("<b>Attachment:</b> guide.pdf<br>"));
    assert!(!report.html.contains("<img"));
}
