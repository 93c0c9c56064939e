//! Article model
//!
//! Longer-lived knowledge-base pages, addressed by slug.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    /// URL-friendly identifier (unique)
    pub slug: String,
    pub title: String,
    pub summary: Option<String>,
    /// Markdown source
    pub content: String,
    pub content_html: String,
    pub author_id: Option<i64>,
    pub category_id: Option<i64>,
    pub status: ArticleStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    Draft,
    Published,
}

string_enum!(ArticleStatus {
    Draft => "draft",
    Published => "published",
});

/// Input for creating an article
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateArticleInput {
    pub title: String,
    /// Generated from the title when absent
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    pub content: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub status: ArticleStatus,
}

/// Partial update of an article
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateArticleInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub clear_category: bool,
    #[serde(default)]
    pub status: Option<ArticleStatus>,
}
