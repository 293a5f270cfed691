//! [`RemoteClient`] over the hosted backend's HTTP APIs: PostgREST for
//! tables, the storage API for objects, GoTrue for auth and the Phoenix
//! websocket for realtime.

use std::sync::RwLock;

use reqwest::{Method, RequestBuilder, Response, header};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use prosync_types::api::{Credentials, ObjectUpload, Session};
use prosync_types::{ChannelSpec, Filter, Query};

use crate::error::excerpt;
use crate::realtime::RealtimeSocket;
use crate::{
    AuthProvider, RemoteClient, RemoteConfig, RemoteError, Subscription, validate_query,
    validate_table, validate_write,
};

const RETURN_REPRESENTATION: &str = "return=representation";

pub struct HttpRemote {
    config: RemoteConfig,
    http: reqwest::Client,
    session: RwLock<Option<Session>>,
    /// Lazily connected on first subscribe, replaced if it has died.
    realtime: Mutex<Option<RealtimeSocket>>,
}

impl HttpRemote {
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            config,
            http,
            session: RwLock::new(None),
            realtime: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Install a session obtained elsewhere, e.g. restored from disk.
    pub fn set_session(&self, session: Option<Session>) {
        if let Ok(mut guard) = self.session.write() {
            *guard = session;
        }
    }

    fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .ok()
            .and_then(|s| s.as_ref().map(|s| s.access_token.clone()))
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let bearer = self
            .access_token()
            .unwrap_or_else(|| self.config.anon_key.clone());

        self.http
            .request(method, url)
            .header("apikey", &self.config.anon_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Backend returned {}: {}", status, excerpt(&body, 200));
        Err(RemoteError::from_status(status.as_u16(), body))
    }

    async fn rows(&self, builder: RequestBuilder) -> Result<Vec<Value>, RemoteError> {
        let response = self.send(builder).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    fn filter_pairs(filters: &[Filter]) -> Vec<(String, String)> {
        filters
            .iter()
            .map(|f| (f.column.clone(), f.to_postgrest()))
            .collect()
    }

    async fn password_grant(&self, credentials: &Credentials) -> Result<Session, RemoteError> {
        let builder = self
            .request(Method::POST, self.config.auth_url("token"))
            .query(&[("grant_type", "password")])
            .json(credentials);
        let response = self.send(builder).await?;
        Ok(response.json::<Session>().await?)
    }
}

impl RemoteClient for HttpRemote {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, RemoteError> {
        validate_query(query)?;
        debug!("select {:?}", query);

        let builder = self
            .request(Method::GET, self.config.rest_url(&query.table))
            .query(&query.to_postgrest_pairs());
        self.rows(builder).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        validate_table(table)?;

        let builder = self
            .request(Method::POST, self.config.rest_url(table))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&row);
        self.rows(builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::Backend(format!("insert into {} returned no row", table)))
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>, RemoteError> {
        validate_write(table, filters)?;

        let builder = self
            .request(Method::PATCH, self.config.rest_url(table))
            .query(&Self::filter_pairs(filters))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&patch);
        self.rows(builder).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, RemoteError> {
        validate_write(table, filters)?;

        let builder = self
            .request(Method::DELETE, self.config.rest_url(table))
            .query(&Self::filter_pairs(filters))
            .header("Prefer", RETURN_REPRESENTATION);
        self.rows(builder).await
    }

    async fn upload(&self, bucket: &str, path: &str, object: ObjectUpload) -> Result<(), RemoteError> {
        let size = object.bytes.len();
        let builder = self
            .request(Method::POST, self.config.storage_url(bucket, path))
            .header(header::CONTENT_TYPE, object.content_type)
            .header("x-upsert", if object.upsert { "true" } else { "false" })
            .body(object.bytes);
        self.send(builder).await?;

        debug!("Uploaded {} bytes to {}/{}", size, bucket, path);
        Ok(())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, RemoteError> {
        let builder = self.request(Method::GET, self.config.storage_url(bucket, path));
        let response = self.send(builder).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), RemoteError> {
        if paths.is_empty() {
            return Ok(());
        }
        let builder = self
            .request(Method::DELETE, self.config.storage_bucket_url(bucket))
            .json(&json!({ "prefixes": paths }));
        self.send(builder).await?;
        Ok(())
    }

    async fn subscribe(&self, spec: ChannelSpec) -> Result<Subscription, RemoteError> {
        validate_table(&spec.table)?;

        let mut socket = self.realtime.lock().await;
        if !socket.as_ref().is_some_and(RealtimeSocket::is_alive) {
            if socket.is_some() {
                info!("Realtime socket closed, reconnecting for new subscriptions");
            }
            *socket = Some(RealtimeSocket::connect(&self.config).await?);
        }

        match socket.as_ref() {
            Some(s) => {
                s.join(spec, self.access_token(), self.config.join_timeout)
                    .await
            }
            None => Err(RemoteError::Realtime("socket unavailable".into())),
        }
    }

    fn session(&self) -> Option<Session> {
        self.session.read().ok().and_then(|s| s.clone())
    }
}

impl AuthProvider for HttpRemote {
    async fn sign_up(&self, credentials: &Credentials) -> Result<Session, RemoteError> {
        let builder = self
            .request(Method::POST, self.config.auth_url("signup"))
            .json(credentials);
        let body: Value = self.send(builder).await?.json().await?;

        // With email confirmation enabled the service answers with a bare
        // user and no tokens.
        if body.get("access_token").is_none() {
            return Err(RemoteError::Unauthorized(
                "sign-up requires email confirmation".into(),
            ));
        }
        let session: Session = serde_json::from_value(body)?;
        info!("Signed up {}", session.user.id);
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, RemoteError> {
        let session = self.password_grant(credentials).await?;
        info!("Signed in {}", session.user.id);
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        if self.access_token().is_some() {
            let builder = self.request(Method::POST, self.config.auth_url("logout"));
            if let Err(e) = self.send(builder).await {
                warn!("Remote logout failed, clearing local session anyway: {}", e);
            }
        }
        self.set_session(None);
        Ok(())
    }
}
