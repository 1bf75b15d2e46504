//! MongoDB Atlas Data API mirror
//!
//! Users and entries are mirrored to Atlas over its REST Data API. The
//! local store stays authoritative; mirror failures are logged by the
//! caller and never undo a local write.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::model::{Entry, User};

pub const USERS_COLLECTION: &str = "users";
pub const ENTRIES_COLLECTION: &str = "entries";

/// Connection settings for [`AtlasClient`]
#[derive(Debug, Clone)]
pub struct AtlasConfig {
    /// e.g. "https://data.mongodb-api.com/app/<app-id>/endpoint/data/v1"
    pub data_api_url: String,
    pub api_key: String,
    /// Cluster name
    pub data_source: String,
    pub database: String,
    pub request_timeout_secs: u64,
}

/// Errors from the Data API
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Data API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Data API unavailable")]
    Unavailable,

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl CloudError {
    fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CloudError::Timeout
        } else if e.is_connect() {
            CloudError::Unavailable
        } else {
            CloudError::Request(e)
        }
    }
}

/// Minimal Data API client
pub struct AtlasClient {
    client: Client,
    config: AtlasConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
    pub inserted_id: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceOneResult {
    pub matched_count: u64,
    pub modified_count: u64,
    #[serde(default)]
    pub upserted_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FindOneResult<T> {
    document: Option<T>,
}

impl AtlasClient {
    pub fn new(config: AtlasConfig) -> Result<Self, CloudError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    pub async fn insert_one<D: Serialize>(
        &self,
        collection: &str,
        document: &D,
    ) -> Result<InsertOneResult, CloudError> {
        let mut body = self.base(collection);
        body["document"] = to_value(document)?;
        self.action("insertOne", &body).await
    }

    pub async fn find_one<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: Value,
    ) -> Result<Option<T>, CloudError> {
        let mut body = self.base(collection);
        body["filter"] = filter;
        let result: FindOneResult<T> = self.action("findOne", &body).await?;
        Ok(result.document)
    }

    pub async fn replace_one<D: Serialize>(
        &self,
        collection: &str,
        filter: Value,
        replacement: &D,
        upsert: bool,
    ) -> Result<ReplaceOneResult, CloudError> {
        let mut body = self.base(collection);
        body["filter"] = filter;
        body["replacement"] = to_value(replacement)?;
        body["upsert"] = Value::Bool(upsert);
        self.action("replaceOne", &body).await
    }

    fn base(&self, collection: &str) -> Value {
        json!({
            "dataSource": self.config.data_source,
            "database": self.config.database,
            "collection": collection,
        })
    }

    async fn action<T: DeserializeOwned>(&self, action: &str, body: &Value) -> Result<T, CloudError> {
        let url = format!(
            "{}/action/{}",
            self.config.data_api_url.trim_end_matches('/'),
            action
        );

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(CloudError::from_transport)?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| CloudError::InvalidResponse(e.to_string()))
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(CloudError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

fn to_value<D: Serialize>(document: &D) -> Result<Value, CloudError> {
    serde_json::to_value(document).map_err(|e| CloudError::InvalidResponse(e.to_string()))
}

/// Mirrors tracker records into Atlas, keyed by their local ids
pub struct CloudMirror {
    client: AtlasClient,
}

impl CloudMirror {
    pub fn new(client: AtlasClient) -> Self {
        Self { client }
    }

    pub async fn sync_user(&self, user: &User) -> Result<(), CloudError> {
        self.client
            .replace_one(USERS_COLLECTION, json!({ "id": user.id }), user, true)
            .await?;
        tracing::debug!(user_id = %user.id, "Mirrored user");
        Ok(())
    }

    pub async fn sync_entry(&self, entry: &Entry) -> Result<(), CloudError> {
        self.client
            .replace_one(ENTRIES_COLLECTION, json!({ "id": entry.id }), entry, true)
            .await?;
        tracing::debug!(entry_id = %entry.id, "Mirrored entry");
        Ok(())
    }

    /// Look up a mirrored user by email
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CloudError> {
        self.client
            .find_one(USERS_COLLECTION, json!({ "email": email }))
            .await
    }
}
