use std::sync::Arc;
use tempfile::tempdir;

use common::init_db_pool;
use newsdesk::models::{Headline, NewsDocument, Summary};
use newsdesk::storage::{ensure_schema, DocumentStore, Persister, SqliteDocumentStore};

fn doc(title: &str) -> NewsDocument {
    let headline = Headline {
        title: title.to_string(),
        link: format!("https://news.example/{}", title),
        source: "Wire".to_string(),
        ..Default::default()
    };
    NewsDocument::for_selected(&headline, Vec::new(), Summary::empty(), None)
}

#[tokio::test]
async fn test_file_store_orders_newest_first_and_survives_reopen() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("nested").join("newsdesk.db");
    let db_path = db_path.to_string_lossy().to_string();

    {
        let pool = init_db_pool(&db_path).await.expect("pool");
        ensure_schema(&pool).await.expect("schema");
        // running it twice is harmless
        ensure_schema(&pool).await.expect("schema again");

        let persister = Persister::new(Arc::new(SqliteDocumentStore::new(pool.clone())));
        for i in 0..25 {
            persister.insert(doc(&format!("story-{:02}", i))).await.expect("insert");
        }
        pool.close().await;
    }

    let pool = init_db_pool(&db_path).await.expect("reopen");
    ensure_schema(&pool).await.expect("schema");
    let store = SqliteDocumentStore::new(pool);

    let latest = store.query_latest(20).await.expect("latest");
    assert_eq!(latest.len(), 20);
    assert_eq!(latest[0].document.title, "story-24");
    assert_eq!(latest[19].document.title, "story-05");
    assert!(latest
        .windows(2)
        .all(|w| w[0].document.created_at > w[1].document.created_at));

    let all = store.query_latest(100).await.expect("all");
    assert_eq!(all.len(), 25);
}

#[tokio::test]
async fn test_duplicate_headlines_are_appended() {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("memory pool");
    ensure_schema(&pool).await.expect("schema");
    let store = Arc::new(SqliteDocumentStore::new(pool));
    let persister = Persister::new(store.clone());

    let first = persister.insert(doc("same")).await.expect("first");
    let second = persister.insert(doc("same")).await.expect("second");
    assert_ne!(first, second);

    let latest = store.query_latest(10).await.expect("latest");
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].id, second);
}
