mod common;

use batch_mailer::compact::compact;
use batch_mailer::model::Marker;
use batch_mailer::RecipientStore;
use common::*;

#[tokio::test]
async fn test_compaction_keeps_retryable_rows_in_order() {
    let store = setup_store().await;
    store
        .load_sheet(&sheet(
            &HEADER,
            &[
                &["a@x.io", "A", "Nam", "successful", "K1"],
                &["b@x.io", "B", "Nam", "", "K1"],
                &["c@x.io", "C", "Nam", "draft", "K1"],
                &["d@x.io", "D", "Nam", "", "K1"],
                &["e@x.io", "E", "Nam", "pending", "K1"],
            ],
        ))
        .await
        .unwrap();
    store
        .write_cell(3, STATUS_COL, "failed", Marker::Failed)
        .await
        .unwrap();

    let summary = compact(store.as_ref()).await.unwrap();
    assert_eq!(summary.retained, 3);
    assert_eq!(summary.purged, 2);

    let sheet = store.read_sheet().await.unwrap();
    assert_eq!(sheet.header.len(), HEADER.len());
    let emails: Vec<_> = sheet.rows.iter().map(|r| r.cell(0)).collect();
    assert_eq!(emails, vec!["b@x.io", "d@x.io", "e@x.io"]);
    assert_eq!(sheet.rows[1].marker, Marker::Failed);

    // a second pass changes nothing
    let summary = compact(store.as_ref()).await.unwrap();
    assert_eq!(summary.purged, 0);
    assert_eq!(store.read_sheet().await.unwrap(), sheet);
}

#[tokio::test]
async fn test_compaction_needs_status_column() {
    let store = setup_store().await;
    store
        .load_sheet(&sheet(&["Email", "Name"], &[&["a@x.io", "A"]]))
        .await
        .unwrap();
    assert!(compact(store.as_ref()).await.is_err());
    assert_eq!(store.read_sheet().await.unwrap().rows.len(), 1);
}
