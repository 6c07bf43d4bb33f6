use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A shortened link record from the `links` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Link {
    pub code: String,
    pub target_url: String,
    pub total_clicks: i64,
    pub last_clicked: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A freshly created link together with its public short URL.
#[derive(Debug, Clone)]
pub struct CreatedLink {
    pub link: Link,
    pub short_url: String,
}

/// Body of `POST /api/links`.
#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub target_url: Option<String>,
    pub code: Option<String>,
}

/// Body returned with `201 Created`.
#[derive(Debug, Serialize)]
pub struct CreateLinkResponse {
    pub code: String,
    pub short_url: String,
}

impl From<CreatedLink> for CreateLinkResponse {
    fn from(created: CreatedLink) -> Self {
        Self {
            code: created.link.code,
            short_url: created.short_url,
        }
    }
}
