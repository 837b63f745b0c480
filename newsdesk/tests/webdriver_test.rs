use mockito::Matcher;
use serde_json::json;

use newsdesk::scraping::webdriver::WebDriverLauncher;
use newsdesk::scraping::{extract_text, BrowserLauncher, ScrapeSettings};
use std::time::Duration;

fn quick() -> ScrapeSettings {
    ScrapeSettings {
        wait: Duration::from_millis(0),
        max_markup_bytes: 200_000,
    }
}

#[tokio::test]
async fn test_session_lifecycle_and_extraction() {
    let mut server = mockito::Server::new_async().await;

    let create = server
        .mock("POST", "/session")
        .match_body(Matcher::PartialJson(json!({
            "capabilities": { "alwaysMatch": { "browserName": "chrome" } }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"value": {"sessionId": "abc123", "capabilities": {}}}"#)
        .create_async()
        .await;
    let navigate = server
        .mock("POST", "/session/abc123/url")
        .match_body(Matcher::Json(json!({ "url": "https://news.example/a" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"value": null}"#)
        .create_async()
        .await;
    let source = server
        .mock("GET", "/session/abc123/source")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "value": "<html><body><p>Menu</p><article><p>Lead.</p><p>Body.</p></article></body></html>"
            })
            .to_string(),
        )
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/session/abc123")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"value": null}"#)
        .expect(1)
        .create_async()
        .await;

    let launcher = WebDriverLauncher::new(&server.url(), 5).expect("launcher");
    let mut session = launcher.launch().await.expect("session");

    let text = extract_text(session.as_mut(), "https://news.example/a", quick()).await;
    assert_eq!(text, "Lead.\nBody.");

    session.close().await.expect("close");
    // second close is a no-op
    session.close().await.expect("close again");
    drop(session);

    create.assert_async().await;
    navigate.assert_async().await;
    source.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn test_navigation_error_yields_empty_text() {
    let mut server = mockito::Server::new_async().await;

    let _create = server
        .mock("POST", "/session")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"value": {"sessionId": "s1"}}"#)
        .create_async()
        .await;
    let _navigate = server
        .mock("POST", "/session/s1/url")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"value": {"error": "unknown error", "message": "net::ERR_NAME_NOT_RESOLVED"}}"#)
        .create_async()
        .await;
    let _delete = server
        .mock("DELETE", "/session/s1")
        .with_status(200)
        .with_body(r#"{"value": null}"#)
        .create_async()
        .await;

    let launcher = WebDriverLauncher::new(&server.url(), 5).expect("launcher");
    let mut session = launcher.launch().await.expect("session");
    let text = extract_text(session.as_mut(), "https://nowhere.invalid", quick()).await;
    assert_eq!(text, "");
    session.close().await.expect("close");
}

#[tokio::test]
async fn test_refused_session_is_an_error() {
    let mut server = mockito::Server::new_async().await;

    let _create = server
        .mock("POST", "/session")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"value": {"error": "session not created", "message": "Chrome failed to start"}}"#)
        .create_async()
        .await;

    let launcher = WebDriverLauncher::new(&server.url(), 5).expect("launcher");
    let err = launcher.launch().await.err().expect("launch fails");
    assert!(format!("{:#}", err).contains("session not created"));
}
