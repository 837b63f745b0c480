use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;

use newsdesk::search::serpapi::SerpApiClient;
use newsdesk::search::{HeadlineSource, NewsQuery, SearchProvider};

fn client(server: &mockito::Server) -> SerpApiClient {
    SerpApiClient::new(format!("{}/search.json", server.url()), "secret-key", 5)
        .expect("client")
        .with_max_retries(3)
}

#[tokio::test]
async fn test_topic_request_parameters_and_filtering() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/search.json")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("engine".into(), "google_news".into()),
            Matcher::UrlEncoded("topic_token".into(), "BUSINESS".into()),
            Matcher::UrlEncoded("hl".into(), "en".into()),
            Matcher::UrlEncoded("gl".into(), "US".into()),
            Matcher::UrlEncoded("api_key".into(), "secret-key".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "news_results": [
                    {"title": "Top news", "stories": [{"title": "x", "story_token": "T0"}]},
                    {"highlight": {"title": "Stocks rally", "link": "https://a.example/1",
                                   "source": {"name": "Reuters"}, "date": "10/14/2026",
                                   "story_token": "S1"}},
                    {"title": "Oil slides", "link": "https://b.example/2", "source": {"name": "AP"}}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let source = HeadlineSource::new(Arc::new(client(&server)));
    let headlines = source.fetch("BUSINESS", 10).await;

    assert_eq!(headlines.len(), 2);
    assert_eq!(headlines[0].title, "Stocks rally");
    assert_eq!(headlines[0].story_token(), Some("S1"));
    assert_eq!(headlines[1].title, "Oil slides");
    assert_eq!(headlines[1].story_token(), None);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_story_links_are_capped_and_cleaned() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/search.json")
        .match_query(Matcher::UrlEncoded("story_token".into(), "S1".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "news_results": [
                    {"link": "https://a.example/1"},
                    {"link": ""},
                    {"title": "no link"},
                    {"link": " https://a.example/4 "},
                    {"link": "https://a.example/5"},
                    {"link": "https://a.example/6"}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let source = HeadlineSource::new(Arc::new(client(&server)));
    let links = source.supporting_links("S1", 5).await;
    assert_eq!(
        links,
        vec!["https://a.example/1", "https://a.example/4", "https://a.example/5"]
    );
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mut server = mockito::Server::new_async().await;

    let failing = server
        .mock("GET", "/search.json")
        .match_query(Matcher::Any)
        .with_status(503)
        .expect(1)
        .create_async()
        .await;
    let ok = server
        .mock("GET", "/search.json")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"news_results": [{"title": "Recovered"}]}"#)
        .expect(1)
        .create_async()
        .await;

    let response = client(&server)
        .search(NewsQuery::Topic("BUSINESS".into()))
        .await
        .expect("second attempt succeeds");
    assert_eq!(response.news_results.len(), 1);

    failing.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/search.json")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body("bad request")
        .expect(1)
        .create_async()
        .await;

    let err = client(&server)
        .search(NewsQuery::Topic("BUSINESS".into()))
        .await
        .expect_err("400 fails");
    assert!(err.to_string().contains("400"));
    assert!(!err.to_string().contains("secret-key"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_provider_error_field_fails_and_fetch_is_soft() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/search.json")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "Invalid API key."}"#)
        .create_async()
        .await;

    let provider = Arc::new(client(&server));
    let err = provider
        .search(NewsQuery::Topic("BUSINESS".into()))
        .await
        .expect_err("error field fails");
    assert!(err.to_string().contains("Invalid API key."));

    let source = HeadlineSource::new(provider);
    assert!(source.fetch("BUSINESS", 10).await.is_empty());
}
