use std::sync::{Arc, Mutex, atomic::Ordering};

use bytes::Bytes;

use super::{FaultyIndex, FaultyObjects, at_millis};
use crate::{
    catalog::build_catalog,
    category::Category,
    deploy::local::memory,
    progress::{FileStatus, ProgressReporter, UploadPhase},
    storage::index::{self, Client as _, IMAGES_KEY},
    upload::{ImageRecord, SelectedFile, UploadError, UploadPipeline},
};

/// Keeps every file status it is given, in call order.
#[derive(Default)]
struct RecordingReporter {
    statuses: Mutex<Vec<(String, FileStatus)>>,
}

impl ProgressReporter for RecordingReporter {
    fn set_phase(&self, _phase: UploadPhase) {}
    fn register_files(&self, _files: Vec<String>) {}
    fn update_file(&self, file: &str, status: FileStatus) {
        self.statuses.lock().unwrap().push((file.to_owned(), status));
    }
    fn finish(&self) {}
}

const NOW: i64 = 1_700_000_000_000;

fn jpeg(name: &str, body: &'static [u8]) -> SelectedFile {
    SelectedFile::new(name, Bytes::from_static(body))
}

async fn stored_records<I: index::Client>(index: &I) -> Vec<ImageRecord> {
    index::read_list(index, IMAGES_KEY).await.unwrap()
}

#[tokio::test]
async fn two_files_same_tick_land_on_distinct_paths() {
    let objects = memory::ObjectClient::default();
    let index = memory::IndexClient::default();
    let mut pipeline = UploadPipeline::new(&objects, &index);

    let queued = pipeline
        .select_files(
            vec![jpeg("fern.jpg", b"fern"), jpeg("moss.jpg", b"moss")],
            Category::Nature,
        )
        .await;
    assert_eq!(queued, 2);
    let pending = pipeline.pending();
    assert!(pending.iter().all(|upload| upload.category == Category::Nature));
    assert_ne!(pending[0].preview, pending[1].preview);

    let urls = pipeline.confirm_at(at_millis(NOW)).await.unwrap();
    assert_eq!(urls.len(), 2);
    assert!(pipeline.pending().is_empty());

    let mut keys = objects.keys().await;
    keys.sort();
    assert_eq!(
        keys,
        [
            "Nature Photography/1700000000000_fern.jpg",
            "Nature Photography/1700000000000_moss.jpg",
        ]
    );
    let (body, content_type) = objects
        .get("Nature Photography/1700000000000_fern.jpg")
        .await
        .unwrap();
    assert_eq!(body, Bytes::from_static(b"fern"));
    assert_eq!(content_type, "image/jpeg");

    let records = stored_records(&index).await;
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.category, Category::Nature);
        assert_eq!(record.timestamp, NOW);
        assert_eq!(
            record.path.as_deref(),
            Some(format!("Nature Photography/{NOW}_{}", record.file_name).as_str())
        );
        assert!(urls.contains(&record.url));
    }
}

#[tokio::test]
async fn confirm_appends_to_existing_index() {
    let objects = memory::ObjectClient::default();
    let index = memory::IndexClient::default();
    let mut pipeline = UploadPipeline::new(&objects, &index);

    pipeline
        .select_files(vec![jpeg("a.jpg", b"a")], Category::Wedding)
        .await;
    pipeline.confirm_at(at_millis(NOW)).await.unwrap();
    pipeline
        .select_files(vec![jpeg("b.jpg", b"b")], Category::Birthday)
        .await;
    pipeline.confirm_at(at_millis(NOW + 5)).await.unwrap();

    let records = stored_records(&index).await;
    assert_eq!(
        records
            .iter()
            .map(|record| (record.category, record.timestamp))
            .collect::<Vec<_>>(),
        [(Category::Wedding, NOW), (Category::Birthday, NOW + 5)]
    );
}

#[tokio::test]
async fn any_failed_write_leaves_index_untouched() {
    let objects = FaultyObjects {
        failing_puts: vec!["broken".into()],
        ..Default::default()
    };
    let index = memory::IndexClient::default();
    let mut pipeline = UploadPipeline::new(&objects, &index);

    pipeline
        .select_files(vec![jpeg("old.jpg", b"old")], Category::Fashion)
        .await;
    pipeline.confirm_at(at_millis(NOW - 1)).await.unwrap();
    assert_eq!(stored_records(&index).await.len(), 1);

    pipeline
        .select_files(
            vec![
                jpeg("one.jpg", b"1"),
                jpeg("broken.jpg", b"2"),
                jpeg("three.jpg", b"3"),
            ],
            Category::Fashion,
        )
        .await;
    let error = pipeline.confirm_at(at_millis(NOW)).await.unwrap_err();
    assert!(matches!(
        error,
        UploadError::Write {
            failed: 1,
            total: 3,
            ..
        }
    ));

    assert_eq!(stored_records(&index).await.len(), 1);
    assert_eq!(pipeline.pending().len(), 3);

    // the two writes that did land are removed again
    let mut deleted = objects.deleted.lock().unwrap().clone();
    deleted.sort();
    assert_eq!(
        deleted,
        [
            "Fashion Photography/1700000000000_one.jpg",
            "Fashion Photography/1700000000000_three.jpg",
        ]
    );
    assert_eq!(
        objects.inner.keys().await,
        ["Fashion Photography/1699999999999_old.jpg"]
    );
}

#[tokio::test]
async fn index_failure_rolls_back_blobs() {
    let objects = memory::ObjectClient::default();
    let index = FaultyIndex::default();
    index.reject_writes.store(true, Ordering::SeqCst);
    let mut pipeline = UploadPipeline::new(&objects, &index);

    pipeline
        .select_files(vec![jpeg("gala.png", b"png")], Category::CorporateEvents)
        .await;
    let error = pipeline.confirm_at(at_millis(NOW)).await.unwrap_err();
    assert!(matches!(error, UploadError::Index(_)));
    assert!(objects.keys().await.is_empty());
    assert_eq!(pipeline.pending().len(), 1);
    assert_eq!(index.get(IMAGES_KEY).await.unwrap(), None);

    index.reject_writes.store(false, Ordering::SeqCst);
    pipeline.confirm_at(at_millis(NOW + 1)).await.unwrap();
    assert_eq!(stored_records(&index).await.len(), 1);
}

#[tokio::test]
async fn duplicate_paths_are_rejected_before_writing() {
    let objects = memory::ObjectClient::default();
    let index = memory::IndexClient::default();
    let mut pipeline = UploadPipeline::new(&objects, &index);

    pipeline
        .select_files(
            vec![jpeg("same.jpg", b"1"), jpeg("same.jpg", b"2")],
            Category::Nature,
        )
        .await;
    let error = pipeline.confirm_at(at_millis(NOW)).await.unwrap_err();
    assert!(matches!(
        error,
        UploadError::PathCollision(path) if path == "Nature Photography/1700000000000_same.jpg"
    ));
    assert!(objects.keys().await.is_empty());
    assert!(stored_records(&index).await.is_empty());

    // same name under another category is a different path
    pipeline.discard();
    pipeline
        .select_files(vec![jpeg("same.jpg", b"1")], Category::Nature)
        .await;
    pipeline
        .select_files(vec![jpeg("same.jpg", b"2")], Category::Wedding)
        .await;
    assert_eq!(pipeline.confirm_at(at_millis(NOW)).await.unwrap().len(), 2);
}

#[tokio::test]
async fn nothing_pending_is_a_no_op() {
    let objects = memory::ObjectClient::default();
    let index = memory::IndexClient::default();
    let mut pipeline = UploadPipeline::new(&objects, &index);
    assert!(pipeline.confirm().await.unwrap().is_empty());
    assert_eq!(index.get(IMAGES_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn select_paths_skips_unreadable_and_non_images() {
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("portrait.png");
    let other = dir.path().join("cake.webp");
    let notes = dir.path().join("notes.txt");
    tokio::fs::write(&photo, b"png-bytes").await.unwrap();
    tokio::fs::write(&other, b"webp-bytes").await.unwrap();
    tokio::fs::write(&notes, b"text").await.unwrap();

    let objects = memory::ObjectClient::default();
    let index = memory::IndexClient::default();
    let mut pipeline = UploadPipeline::new(&objects, &index);
    let queued = pipeline
        .select_paths(
            [
                photo,
                notes,
                dir.path().join("missing.jpg"),
                other,
            ],
            Category::Birthday,
        )
        .await;
    assert_eq!(queued, 2);

    let mut names = pipeline
        .pending()
        .iter()
        .map(|upload| upload.file.name.as_str())
        .collect::<Vec<_>>();
    names.sort();
    assert_eq!(names, ["cake.webp", "portrait.png"]);
    let portrait = pipeline
        .pending()
        .iter()
        .find(|upload| upload.file.name == "portrait.png")
        .unwrap();
    assert_eq!(portrait.preview, "data:image/png;base64,cG5nLWJ5dGVz");
}

#[tokio::test]
async fn uploads_show_up_in_catalog() {
    let objects = memory::ObjectClient::default();
    let index = memory::IndexClient::default();
    let mut pipeline = UploadPipeline::new(&objects, &index);
    pipeline
        .select_files(vec![jpeg("veil.jpg", b"v")], Category::Wedding)
        .await;
    let urls = pipeline.confirm_at(at_millis(NOW)).await.unwrap();

    let images = build_catalog(&objects).await;
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].id, "Wedding Photography/1700000000000_veil.jpg");
    assert_eq!(images[0].url, urls[0]);
}

#[tokio::test]
async fn blob_without_url_is_rolled_back() {
    let objects = FaultyObjects {
        failing_resolves: vec!["bad".into()],
        ..Default::default()
    };
    let index = memory::IndexClient::default();
    let mut pipeline = UploadPipeline::new(&objects, &index);

    pipeline
        .select_files(
            vec![jpeg("ok.jpg", b"ok"), jpeg("bad.jpg", b"bad")],
            Category::Nature,
        )
        .await;
    let error = pipeline.confirm_at(at_millis(NOW)).await.unwrap_err();
    assert!(matches!(
        error,
        UploadError::Write {
            failed: 1,
            total: 2,
            ..
        }
    ));

    assert!(objects.inner.keys().await.is_empty());
    let mut deleted = objects.deleted.lock().unwrap().clone();
    deleted.sort();
    assert_eq!(
        deleted,
        [
            "Nature Photography/1700000000000_bad.jpg",
            "Nature Photography/1700000000000_ok.jpg",
        ]
    );
    assert!(stored_records(&index).await.is_empty());
    assert_eq!(pipeline.pending().len(), 2);
}

#[tokio::test]
async fn unreadable_index_entries_survive_upload() {
    let objects = memory::ObjectClient::default();
    let index = memory::IndexClient::default();
    index
        .set(
            IMAGES_KEY,
            r#"[{"url":"https://cdn.example.com/a.jpg","category":"Wedding Photography","timestamp":1,"fileName":"a.jpg"},{"url":"https://cdn.example.com/b.jpg","category":"Food Photography","timestamp":2,"fileName":"b.jpg"}]"#,
        )
        .await
        .unwrap();

    let mut pipeline = UploadPipeline::new(&objects, &index);
    pipeline
        .select_files(vec![jpeg("c.jpg", b"c")], Category::Fashion)
        .await;
    pipeline.confirm_at(at_millis(NOW)).await.unwrap();

    let raw = index.get(IMAGES_KEY).await.unwrap().unwrap();
    let stored: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
    assert_eq!(
        stored
            .iter()
            .map(|entry| entry["fileName"].as_str().unwrap())
            .collect::<Vec<_>>(),
        ["a.jpg", "b.jpg", "c.jpg"]
    );
    assert_eq!(stored[1]["category"], "Food Photography");

    let records = stored_records(&index).await;
    assert_eq!(
        records
            .iter()
            .map(|record| record.file_name.as_str())
            .collect::<Vec<_>>(),
        ["a.jpg", "c.jpg"]
    );
}

#[tokio::test]
async fn each_file_reports_progress_then_outcome() {
    let objects = FaultyObjects {
        failing_puts: vec!["torn".into()],
        ..Default::default()
    };
    let index = memory::IndexClient::default();
    let reporter = Arc::new(RecordingReporter::default());
    let mut pipeline = UploadPipeline::new(&objects, &index).with_reporter(reporter.clone());

    pipeline
        .select_files(
            vec![jpeg("whole.jpg", b"w"), jpeg("torn.jpg", b"t")],
            Category::Birthday,
        )
        .await;
    pipeline.confirm_at(at_millis(NOW)).await.unwrap_err();

    let statuses = reporter.statuses.lock().unwrap();
    let of = |name: &str| {
        statuses
            .iter()
            .filter(|(file, _)| file.ends_with(name))
            .map(|(_, status)| status.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(of("whole.jpg"), [FileStatus::Uploading, FileStatus::Done]);
    let torn = of("torn.jpg");
    assert_eq!(torn.len(), 2);
    assert_eq!(torn[0], FileStatus::Uploading);
    assert!(matches!(&torn[1], FileStatus::Failed(reason) if reason.contains("torn")));
}
