use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A candidate headline returned by the search provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub link: String,
    pub source: String,
    pub published: String,
    /// Story-cluster token, empty when the provider gave none.
    pub story_token: String,
}

impl Headline {
    pub fn story_token(&self) -> Option<&str> {
        let token = self.story_token.trim();
        (!token.is_empty()).then_some(token)
    }
}

/// Scraped text of one article from a headline's story cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportingArticle {
    pub link: String,
    pub text: String,
}

/// Indonesian (`id`) and English (`en`) summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub id: String,
    pub en: String,
}

impl Summary {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Short title plus a one-slide social post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialPost {
    pub title: String,
    pub ig_post: String,
}

/// One enriched headline as written to the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsDocument {
    pub title: String,
    pub link: String,
    pub source: String,
    pub published: String,
    pub story_token: String,
    pub selected_top5: bool,
    pub supporting_articles: Vec<SupportingArticle>,
    pub summaries: Summary,
    pub ig_post: Option<SocialPost>,
    pub created_at: DateTime<Utc>,
}

impl NewsDocument {
    /// Build a document for a selected headline. `created_at` is provisional;
    /// the persister stamps the real value at insert time.
    pub fn for_selected(
        headline: &Headline,
        supporting_articles: Vec<SupportingArticle>,
        summaries: Summary,
        ig_post: Option<SocialPost>,
    ) -> Self {
        Self {
            title: headline.title.clone(),
            link: headline.link.clone(),
            source: headline.source.clone(),
            published: headline.published.clone(),
            story_token: headline.story_token.clone(),
            selected_top5: true,
            supporting_articles,
            summaries,
            ig_post,
            created_at: Utc::now(),
        }
    }
}

/// A document read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: i64,
    #[serde(flatten)]
    pub document: NewsDocument,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_story_token_is_absent() {
        let mut h = Headline {
            title: "Markets rally".into(),
            story_token: "   ".into(),
            ..Default::default()
        };
        assert_eq!(h.story_token(), None);
        h.story_token = "CAAq123".into();
        assert_eq!(h.story_token(), Some("CAAq123"));
    }

    #[test]
    fn missing_social_post_serializes_as_null() {
        let h = Headline {
            title: "Oil slides".into(),
            link: "https://example.com/oil".into(),
            ..Default::default()
        };
        let doc = NewsDocument::for_selected(&h, Vec::new(), Summary::empty(), None);
        let value = serde_json::to_value(&doc).expect("serialize");
        assert!(value["ig_post"].is_null());
        assert_eq!(value["selected_top5"], serde_json::json!(true));
        assert_eq!(value["summaries"], serde_json::json!({"id": "", "en": ""}));
        assert_eq!(value["supporting_articles"], serde_json::json!([]));
    }
}
