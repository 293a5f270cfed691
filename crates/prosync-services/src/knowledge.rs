use std::sync::Arc;

use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use prosync_remote::RemoteClient;
use prosync_types::Query;
use prosync_types::models::knowledge::{Article, ArticlePatch, NewArticle};

use crate::ServiceError;
use crate::rows::{self, current_user, required};

pub struct KnowledgeBaseService<R> {
    remote: Arc<R>,
}

impl<R> Clone for KnowledgeBaseService<R> {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
        }
    }
}

impl<R: RemoteClient> KnowledgeBaseService<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self { remote }
    }

    /// Articles, most recently created first.
    pub async fn list_articles(&self, category: Option<&str>) -> Result<Vec<Article>, ServiceError> {
        let mut query = Query::table("kb_articles");
        if let Some(category) = category {
            query = query.eq("category", category.trim());
        }
        rows::fetch_all(&*self.remote, query.order_by("created_at", false))
            .await
            .inspect_err(|e| error!("Failed to list articles: {}", e))
    }

    /// Case-insensitive substring search on titles. A blank term matches
    /// every article.
    pub async fn search(&self, term: &str) -> Result<Vec<Article>, ServiceError> {
        let term = term.trim();
        let mut query = Query::table("kb_articles");
        if !term.is_empty() {
            let escaped = term.replace('%', "").replace('_', "");
            query = query.ilike("title", format!("%{}%", escaped));
        }
        rows::fetch_all(&*self.remote, query.order_by("title", true))
            .await
            .inspect_err(|e| error!("Article search for '{}' failed: {}", term, e))
    }

    pub async fn get_article(&self, id: Uuid) -> Result<Article, ServiceError> {
        rows::fetch_one(&*self.remote, id)
            .await
            .inspect_err(|e| error!("Failed to load article {}: {}", id, e))
    }

    /// Create an unpublished draft authored by the current user.
    pub async fn create_article(
        &self,
        title: &str,
        body: &str,
        category: &str,
        tags: Vec<String>,
    ) -> Result<Article, ServiceError> {
        let author_id = current_user(&*self.remote)?;
        let payload = NewArticle {
            title: required("Title", title)?,
            body: body.to_string(),
            category: category.trim().to_string(),
            tags: tags
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            author_id,
            published: false,
            views: 0,
        };

        let article: Article = rows::insert(&*self.remote, &payload)
            .await
            .inspect_err(|e| error!("Failed to create article: {}", e))?;
        info!("Created article '{}'", article.title);
        Ok(article)
    }

    pub async fn update_article(&self, id: Uuid, patch: ArticlePatch) -> Result<Article, ServiceError> {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ServiceError::validation("Title is required"));
        }
        let patch = serde_json::to_value(&patch)?;
        if patch.as_object().is_some_and(|p| p.is_empty()) {
            return Err(ServiceError::validation("Nothing to update"));
        }
        rows::update(&*self.remote, id, patch)
            .await
            .inspect_err(|e| error!("Failed to update article {}: {}", id, e))
    }

    pub async fn publish(&self, id: Uuid, published: bool) -> Result<Article, ServiceError> {
        rows::update(&*self.remote, id, json!({ "published": published }))
            .await
            .inspect_err(|e| error!("Failed to publish article {}: {}", id, e))
    }

    /// Count one view. Read-modify-write, so concurrent views may be
    /// counted once.
    pub async fn record_view(&self, id: Uuid) -> Result<Article, ServiceError> {
        let result: Result<Article, ServiceError> = async {
            let article: Article = rows::fetch_one(&*self.remote, id).await?;
            rows::update(&*self.remote, id, json!({ "views": article.views + 1 })).await
        }
        .await;
        result.inspect_err(|e| error!("Failed to record view of article {}: {}", id, e))
    }

    pub async fn delete_article(&self, id: Uuid) -> Result<(), ServiceError> {
        rows::delete::<Article, _>(&*self.remote, id)
            .await
            .inspect_err(|e| error!("Failed to delete article {}: {}", id, e))
    }
}
