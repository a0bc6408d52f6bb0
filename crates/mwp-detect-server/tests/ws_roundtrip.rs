//! Drives the real accept loop over a loopback socket with annotation files
//! in a scratch directory.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use mwp_core::protocol::{DetectRequest, DetectResponse};
use mwp_core::Rect;
use mwp_detect_server::application::DetectService;
use mwp_detect_server::infrastructure::{serve, AnnotationMatcher};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_tungstenite::tungstenite::Message;

fn scratch_image(name: &str, annotations: &str) -> String {
    let dir: PathBuf = std::env::temp_dir().join(format!("mwp-detect-it-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let image = dir.join("frame.bmp");
    std::fs::write(&image, b"BM").unwrap();
    let image_ref = image.to_string_lossy().to_string();
    std::fs::write(AnnotationMatcher::new().annotation_path(&image_ref), annotations).unwrap();
    image_ref
}

async fn start_server() -> (String, Arc<AtomicBool>, tokio::task::JoinHandle<anyhow::Result<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let running = Arc::new(AtomicBool::new(true));
    let service = DetectService::new(Arc::new(AnnotationMatcher::new()), 0.8);
    let task = tokio::spawn(serve(listener, service, Duration::from_millis(20), Arc::clone(&running)));
    (url, running, task)
}

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn exchange(ws: &mut Client, request: &str) -> DetectResponse {
    ws.send(Message::Text(request.to_string())).await.unwrap();
    match ws.next().await {
        Some(Ok(Message::Text(text))) => serde_json::from_str(&text).unwrap(),
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn test_health_find_and_batch_over_one_connection() {
    // Arrange
    let image_ref = scratch_image(
        "session",
        r#"[{"label":"enemy","confidence":0.99,"bbox":{"x":0,"y":0,"width":10,"height":10}},
            {"label":"item","confidence":0.9,"bbox":{"x":40,"y":60,"width":20,"height":20}}]"#,
    );
    let (url, running, task) = start_server().await;
    let (mut ws, _) = connect_async(url.as_str()).await.unwrap();

    // Act + Assert: health
    let health = exchange(&mut ws, r#"{"type":"Health"}"#).await;
    assert!(matches!(health, DetectResponse::HealthStatus { matcher_ready: true, .. }));

    // find
    let find = DetectRequest::FindTarget {
        request_id: 1,
        image_ref: image_ref.clone(),
        target_label: "item".to_string(),
        early_exit: true,
    };
    match exchange(&mut ws, &serde_json::to_string(&find).unwrap()).await {
        DetectResponse::TargetResult { request_id, result, scanned, .. } => {
            assert_eq!(request_id, 1);
            assert!(result.found);
            assert_eq!(result.bbox, Some(Rect::new(40, 60, 20, 20)));
            assert_eq!(scanned, 2);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    // batch
    let batch = DetectRequest::BatchFind {
        request_id: 2,
        image_ref,
        target_labels: vec!["enemy".to_string(), "chest".to_string()],
        early_exit: false,
    };
    match exchange(&mut ws, &serde_json::to_string(&batch).unwrap()).await {
        DetectResponse::BatchResult { request_id, results } => {
            assert_eq!(request_id, 2);
            let found: Vec<bool> = results.iter().map(|r| r.found).collect();
            assert_eq!(found, vec![true, false]);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    // Cleanup
    ws.close(None).await.ok();
    running.store(false, Ordering::Relaxed);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_bad_frames_get_error_responses_and_connection_survives() {
    let (url, running, task) = start_server().await;
    let (mut ws, _) = connect_async(url.as_str()).await.unwrap();

    let resp = exchange(&mut ws, r#"{"type":"Reboot","request_id":3}"#).await;
    assert!(matches!(resp, DetectResponse::Error { request_id: Some(3), .. }));

    let missing = r#"{"type":"FindTarget","request_id":4,"image_ref":"/definitely/not/here.bmp","target_label":"item"}"#;
    let resp = exchange(&mut ws, missing).await;
    assert!(matches!(resp, DetectResponse::Error { request_id: Some(4), .. }));

    let health = exchange(&mut ws, r#"{"type":"Health"}"#).await;
    assert!(matches!(health, DetectResponse::HealthStatus { .. }));

    ws.close(None).await.ok();
    running.store(false, Ordering::Relaxed);
    task.await.unwrap().unwrap();
}
