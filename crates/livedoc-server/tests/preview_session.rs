//! End-to-end preview session tests against real servers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use livedoc_config::PortRange;
use livedoc_convert::{ConvertError, Converted, Converter, MarkdownConverter, SourceMeta};
use livedoc_server::{PreviewConfig, PreviewService, ServerStatus};
use tokio_tungstenite::tungstenite::Message;

/// Stand-in for an Org converter: reads `#+TITLE:` and echoes the rest.
struct OrgStub;

impl Converter for OrgStub {
    fn convert(&self, source: &str, _meta: &SourceMeta<'_>) -> Result<Converted, ConvertError> {
        let title = source
            .lines()
            .find_map(|l| l.strip_prefix("#+TITLE:"))
            .map(|t| t.trim().to_owned());
        let body = source
            .lines()
            .filter(|l| !l.starts_with("#+"))
            .map(|l| format!("<p>{l}</p>"))
            .collect::<String>();
        Ok(Converted { html: body, title })
    }
}

/// Two distinct single-port ranges that are free right now.
fn free_ranges() -> (PortRange, PortRange) {
    let a = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let b = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let a = a.local_addr().unwrap().port();
    let b = b.local_addr().unwrap().port();
    (PortRange::new(a, a), PortRange::new(b, b))
}

fn service(out: &Path, converter: impl Converter + 'static) -> PreviewService {
    let (http_ports, ws_ports) = free_ranges();
    PreviewService::new(
        PreviewConfig {
            http_ports,
            ws_ports,
            output_dir: Some(out.to_path_buf()),
            ..PreviewConfig::default()
        },
        Arc::new(converter),
    )
}

async fn wait_for_clients(service: &PreviewService, expected: usize) {
    for _ in 0..200 {
        if service.client_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {expected} clients, have {}",
        service.client_count()
    );
}

#[tokio::test]
async fn test_end_to_end_preview() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let doc = src.path().join("notes.org");
    std::fs::write(&doc, "#+TITLE: Notes\nFirst draft\n").unwrap();

    let mut service = service(out.path(), OrgStub);

    // (1) enabling preview starts both servers on distinct ports
    let url = service.enable_preview(&doc).await.unwrap();
    let status = service.status();
    assert!(status.running);
    let http_port = status.http_port.unwrap();
    let ws_port = status.ws_port.unwrap();
    assert_ne!(http_port, ws_port);

    // (2) the page carries the title and the WebSocket port
    let page = out.path().join("notes.html");
    let html = std::fs::read_to_string(&page).unwrap();
    assert!(html.contains("<title>Notes</title>"));
    assert!(html.contains(&format!("window.LIVEDOC_WS_PORT = {ws_port};")));

    let response = reqwest::get(&url).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["x-content-type-options"],
        "nosniff"
    );
    assert!(response.text().await.unwrap().contains("First draft"));

    let css = reqwest::get(format!("http://127.0.0.1:{http_port}/style.css"))
        .await
        .unwrap();
    assert_eq!(css.status(), 200);
    let js = reqwest::get(format!("http://127.0.0.1:{http_port}/live-reload.js"))
        .await
        .unwrap();
    assert_eq!(js.status(), 200);

    // (3) a client connects
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{ws_port}/"))
        .await
        .unwrap();
    wait_for_clients(&service, 1).await;

    // (4) a save re-exports and broadcasts a reload
    std::fs::write(&doc, "#+TITLE: Notes\nSecond draft\n").unwrap();
    let notified = service.on_document_saved(&doc).await.unwrap();
    assert_eq!(notified, 1);

    let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(message, Message::Text(r#"{"type":"reload"}"#.into()));
    assert!(std::fs::read_to_string(&page).unwrap().contains("Second draft"));

    // (5) disabling the only preview stops everything and removes the page
    service.disable_preview(&doc).await;
    assert_eq!(service.status(), ServerStatus::default());
    assert!(!page.exists());
    assert_eq!(service.client_count(), 0);

    // The client sees the connection end
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());

    // Ports are released
    assert!(std::net::TcpListener::bind(("127.0.0.1", http_port)).is_ok());
    assert!(std::net::TcpListener::bind(("127.0.0.1", ws_port)).is_ok());
}

#[tokio::test]
async fn test_disconnected_client_is_removed() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let doc = src.path().join("guide.md");
    std::fs::write(&doc, "# Guide\n").unwrap();

    let mut service = service(out.path(), MarkdownConverter::new());
    service.enable_preview(&doc).await.unwrap();
    let ws_port = service.status().ws_port.unwrap();

    let url = format!("ws://127.0.0.1:{ws_port}/");
    let (mut first, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let (_second, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    wait_for_clients(&service, 2).await;

    first.close(None).await.unwrap();
    wait_for_clients(&service, 1).await;

    assert_eq!(service.on_document_saved(&doc).await.unwrap(), 1);

    service.shutdown().await;
    assert_eq!(service.session_count(), 0);
    assert!(!service.status().running);
}

#[tokio::test]
async fn test_export_rewrites_local_image() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    std::fs::create_dir(src.path().join("img")).unwrap();
    std::fs::write(src.path().join("img/chart.svg"), "<svg/>").unwrap();
    let doc = src.path().join("report.md");
    std::fs::write(&doc, "# Report\n\n![chart](img/chart.svg)\n").unwrap();

    let mut service = service(out.path(), MarkdownConverter::new());
    service.enable_preview(&doc).await.unwrap();
    let http_port = service.status().http_port.unwrap();

    let html = std::fs::read_to_string(out.path().join("report.html")).unwrap();
    assert!(html.contains(r#"src="chart.svg""#));
    assert!(!html.contains("img/chart.svg"));

    let image = reqwest::get(format!("http://127.0.0.1:{http_port}/chart.svg"))
        .await
        .unwrap();
    assert_eq!(image.status(), 200);

    service.shutdown().await;
}

#[tokio::test]
async fn test_multiple_documents_share_servers() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let a = src.path().join("a.md");
    let b = src.path().join("b.md");
    std::fs::write(&a, "# A\n").unwrap();
    std::fs::write(&b, "# B\n").unwrap();

    let mut service = service(out.path(), MarkdownConverter::new());
    service.enable_preview(&a).await.unwrap();
    let status = service.status();
    service.enable_preview(&b).await.unwrap();
    assert_eq!(service.status(), status);

    let ws_port = status.ws_port.unwrap();
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{ws_port}/"))
        .await
        .unwrap();
    wait_for_clients(&service, 1).await;

    // Saving either document reloads every client
    assert_eq!(service.on_document_saved(&b).await.unwrap(), 1);
    let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(message.is_text());

    service.disable_preview(&a).await;
    assert!(service.status().running);
    assert!(out.path().join("b.html").is_file());
    assert!(!out.path().join("a.html").exists());

    service.disable_preview(&b).await;
    assert!(!service.status().running);
}
