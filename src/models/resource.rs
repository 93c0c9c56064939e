//! Resource model
//!
//! Links, documents and training videos share one table; a training video is
//! a resource of kind `video`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// http(s) URL
    pub url: String,
    pub kind: ResourceKind,
    pub category_id: Option<i64>,
    pub thumbnail_url: Option<String>,
    /// Only set for videos
    pub duration_seconds: Option<i64>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    #[default]
    Link,
    Document,
    Video,
}

string_enum!(ResourceKind {
    Link => "link",
    Document => "document",
    Video => "video",
});

/// Input for creating a resource
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateResourceInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
    #[serde(default)]
    pub kind: ResourceKind,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
}

/// Partial update; empty strings clear the optional text fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateResourceInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub kind: Option<ResourceKind>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub clear_category: bool,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
}

/// Filters for resource listings
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    pub kind: Option<ResourceKind>,
    pub category_id: Option<i64>,
    /// Substring of title or description
    pub query: Option<String>,
}
