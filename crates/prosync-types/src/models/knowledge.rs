use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{Record, nullable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub body: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub category: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub tags: Vec<String>,
    pub author_id: Uuid,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub published: bool,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub views: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Article {
    const TABLE: &'static str = "kb_articles";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewArticle {
    pub title: String,
    pub body: String,
    pub category: String,
    pub tags: Vec<String>,
    pub author_id: Uuid,
    pub published: bool,
    pub views: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArticlePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}
