use anyhow::{Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::info;

use crate::models::{NewsDocument, StoredDocument};

/// Append-only document store.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Append one document, returning its id.
    async fn insert(&self, document: &NewsDocument) -> Result<i64>;

    /// Newest `limit` documents, `created_at` descending.
    async fn query_latest(&self, limit: i64) -> Result<Vec<StoredDocument>>;
}

/// Create the `news` table if needed.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    info!("storage: ensuring DB schema (CREATE TABLE IF NOT EXISTS ...)");
    let stmts = [
        r#"
        CREATE TABLE IF NOT EXISTS news (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            link TEXT NOT NULL,
            source TEXT NOT NULL,
            published TEXT NOT NULL,
            story_token TEXT NOT NULL,
            selected_top5 BOOLEAN NOT NULL DEFAULT TRUE,
            supporting_articles_json TEXT NOT NULL,
            summaries_json TEXT NOT NULL,
            ig_post_json TEXT,
            created_at TEXT NOT NULL
        );
        "#,
        "CREATE INDEX IF NOT EXISTS idx_news_created_at ON news (created_at DESC);",
    ];
    for stmt in stmts {
        sqlx::query(stmt)
            .execute(pool)
            .await
            .context("failed to create news schema")?;
    }
    Ok(())
}

/// SQLite-backed store. Nested values are JSON text columns.
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Fixed-width UTC text so that string order is time order.
fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait::async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert(&self, document: &NewsDocument) -> Result<i64> {
        let supporting_json = serde_json::to_string(&document.supporting_articles)
            .context("failed to serialize supporting articles")?;
        let summaries_json =
            serde_json::to_string(&document.summaries).context("failed to serialize summaries")?;
        let ig_post_json = document
            .ig_post
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("failed to serialize social post")?;

        let result = sqlx::query(
            r#"
            INSERT INTO news
            (title, link, source, published, story_token, selected_top5,
             supporting_articles_json, summaries_json, ig_post_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&document.title)
        .bind(&document.link)
        .bind(&document.source)
        .bind(&document.published)
        .bind(&document.story_token)
        .bind(document.selected_top5)
        .bind(&supporting_json)
        .bind(&summaries_json)
        .bind(ig_post_json)
        .bind(encode_timestamp(&document.created_at))
        .execute(&self.pool)
        .await
        .context("failed to insert news document")?;

        Ok(result.last_insert_rowid())
    }

    async fn query_latest(&self, limit: i64) -> Result<Vec<StoredDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, link, source, published, story_token, selected_top5,
                   supporting_articles_json, summaries_json, ig_post_json, created_at
            FROM news
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to query latest news")?;

        rows.into_iter()
            .map(|row| -> Result<StoredDocument> {
                let id: i64 = row.get("id");
                let supporting_json: String = row.get("supporting_articles_json");
                let summaries_json: String = row.get("summaries_json");
                let ig_post_json: Option<String> = row.get("ig_post_json");
                let created_at: String = row.get("created_at");

                let document = NewsDocument {
                    title: row.get("title"),
                    link: row.get("link"),
                    source: row.get("source"),
                    published: row.get("published"),
                    story_token: row.get("story_token"),
                    selected_top5: row.get("selected_top5"),
                    supporting_articles: serde_json::from_str(&supporting_json)
                        .with_context(|| format!("bad supporting_articles_json in news {}", id))?,
                    summaries: serde_json::from_str(&summaries_json)
                        .with_context(|| format!("bad summaries_json in news {}", id))?,
                    ig_post: ig_post_json
                        .as_deref()
                        .map(serde_json::from_str)
                        .transpose()
                        .with_context(|| format!("bad ig_post_json in news {}", id))?,
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .with_context(|| format!("bad created_at in news {}", id))?
                        .with_timezone(&Utc),
                };
                Ok(StoredDocument { id, document })
            })
            .collect()
    }
}

/// In-process store for tests and dry runs.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<Vec<StoredDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every document in insertion order.
    pub async fn documents(&self) -> Vec<StoredDocument> {
        self.documents.read().await.clone()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, document: &NewsDocument) -> Result<i64> {
        let mut documents = self.documents.write().await;
        let id = documents.len() as i64 + 1;
        documents.push(StoredDocument {
            id,
            document: document.clone(),
        });
        Ok(id)
    }

    async fn query_latest(&self, limit: i64) -> Result<Vec<StoredDocument>> {
        let mut documents = self.documents.read().await.clone();
        documents.sort_by(|a, b| {
            b.document
                .created_at
                .cmp(&a.document.created_at)
                .then(b.id.cmp(&a.id))
        });
        documents.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(documents)
    }
}

/// Stamps `created_at` and appends documents one at a time.
pub struct Persister {
    store: Arc<dyn DocumentStore>,
    last_stamp: Mutex<Option<DateTime<Utc>>>,
}

impl Persister {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            last_stamp: Mutex::new(None),
        }
    }

    /// Insert with a fresh `created_at`, strictly later than any earlier stamp
    /// from this persister.
    pub async fn insert(&self, mut document: NewsDocument) -> Result<i64> {
        document.created_at = self.next_stamp();
        let id = self.store.insert(&document).await?;
        info!(id, title = %document.title, "inserted news document");
        Ok(id)
    }

    fn next_stamp(&self) -> DateTime<Utc> {
        let mut now = Utc::now().trunc_subsecs(6);
        // A poisoned lock only means another insert panicked; the stamp is still valid.
        let mut last = self.last_stamp.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }
}
