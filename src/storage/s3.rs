//! AWS S3 state store.
//!
//! The whole state lives in one object; PutObject replaces it atomically.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::StateError;
use crate::storage::{SeenState, StateStore, decode_or_empty};

/// State kept in a single S3 object.
pub struct S3StateStore {
    client: Client,
    bucket: String,
    key: String,
    capacity: usize,
}

impl S3StateStore {
    pub fn new(
        client: Client,
        bucket: impl Into<String>,
        key: impl Into<String>,
        capacity: usize,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key: key.into(),
            capacity,
        }
    }

    /// Create a store using the ambient AWS configuration.
    pub async fn from_env(bucket: impl Into<String>, key: impl Into<String>, capacity: usize) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), bucket, key, capacity)
    }

    async fn read_bytes(&self) -> Result<Option<Vec<u8>>, StateError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StateError::Remote(e.to_string()))?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(StateError::Remote(service_err.to_string()))
                }
            }
        }
    }
}

#[async_trait]
impl StateStore for S3StateStore {
    async fn load(&self) -> SeenState {
        decode_or_empty(self.read_bytes().await, self.capacity, &self.location())
    }

    async fn save(&self, state: &SeenState) -> Result<(), StateError> {
        let bytes = ByteStream::from(state.to_json()?);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .body(bytes)
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StateError::Remote(e.into_service_error().to_string()))?;

        log::debug!("Saved {} seen ids to {}", state.len(), self.location());
        Ok(())
    }

    fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}
