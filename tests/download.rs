#![cfg(feature = "provision")]

mod common;

use minehost::{
    Variant,
    error::DownloadError,
    provision::{ArtifactDescriptor, Downloader, ProgressRange},
};

fn descriptor(url: String) -> ArtifactDescriptor {
    ArtifactDescriptor {
        variant: Variant::Paper,
        version: "1.20.1".into(),
        url,
        file_name: "paper-1.20.1.jar".into(),
        installer_version: None,
    }
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_range_end() {
    let body = vec![7u8; 256 * 1024];
    let url = common::serve_once(200, body.clone()).await;
    let dir = tempfile::tempdir().unwrap();

    let mut seen = Vec::new();
    let path = Downloader::new()
        .download(&descriptor(url), dir.path(), ProgressRange::new(15, 80), |pct| {
            seen.push(pct)
        })
        .await
        .unwrap();

    assert_eq!(path, dir.path().join("paper-1.20.1.jar"));
    assert_eq!(std::fs::read(&path).unwrap(), body);
    assert_eq!(seen.first(), Some(&15));
    assert_eq!(seen.last(), Some(&80));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
}

#[tokio::test]
async fn empty_body_still_completes() {
    let url = common::serve_once(200, Vec::new()).await;
    let dir = tempfile::tempdir().unwrap();

    let mut seen = Vec::new();
    Downloader::new()
        .download(&descriptor(url), dir.path(), ProgressRange::new(15, 65), |pct| {
            seen.push(pct)
        })
        .await
        .unwrap();
    assert_eq!(seen, [15, 65]);
}

#[tokio::test]
async fn error_status_is_reported() {
    let url = common::serve_once(404, b"not found".to_vec()).await;
    let dir = tempfile::tempdir().unwrap();

    let result = Downloader::new()
        .download(&descriptor(url), dir.path(), ProgressRange::new(15, 80), |_| {})
        .await;
    assert!(matches!(
        result,
        Err(DownloadError::Status { status: 404, .. })
    ));
    assert!(!dir.path().join("paper-1.20.1.jar").exists());
}

#[tokio::test]
async fn refused_connection_is_a_request_error() {
    let port = common::closed_port().await;
    let dir = tempfile::tempdir().unwrap();

    let result = Downloader::new()
        .download(
            &descriptor(format!("http://127.0.0.1:{port}/paper.jar")),
            dir.path(),
            ProgressRange::new(15, 80),
            |_| {},
        )
        .await;
    assert!(matches!(result, Err(DownloadError::Request(_))));
}
