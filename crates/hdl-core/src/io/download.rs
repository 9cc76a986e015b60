//! Repository download with streaming SHA256 verification.
//!
//! Only fetches `<repository>/<layout path>`; there is no metadata or
//! transitive resolution.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use hdl_schema::{ProviderEntity, Sha256Digest};
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::ResolveError;
use crate::io::resolve::{ArtifactResolver, Fetched};
use crate::store::ArtifactStore;

/// Maven Central, used when no repository is configured.
pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2";

/// Fetches artifacts from an ordered list of repositories over HTTP.
///
/// A 404 moves on to the next repository; any other failure stops.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: Client,
    repositories: Vec<String>,
}

impl HttpResolver {
    /// Resolver over `repositories`, tried in order.
    pub fn new(repositories: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::with_client(Client::new(), repositories)
    }

    /// Resolver sharing an existing client.
    pub fn with_client(
        client: Client,
        repositories: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            client,
            repositories: repositories
                .into_iter()
                .map(|r| {
                    let r: String = r.into();
                    r.trim_end_matches('/').to_string()
                })
                .collect(),
        }
    }

    /// Configured repositories, in lookup order.
    pub fn repositories(&self) -> &[String] {
        &self.repositories
    }
}

impl Default for HttpResolver {
    fn default() -> Self {
        Self::new([MAVEN_CENTRAL])
    }
}

#[async_trait]
impl ArtifactResolver for HttpResolver {
    async fn fetch(&self, entity: &ProviderEntity, dest: &Path) -> Result<Fetched, ResolveError> {
        if self.repositories.is_empty() {
            return Err(ResolveError::NoRepositories);
        }

        let layout = entity.coordinates.repository_path();
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        for repository in &self.repositories {
            let url = format!("{repository}/{layout}");
            let response = self
                .client
                .get(&url)
                .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
                .send()
                .await?;

            if response.status() == StatusCode::NOT_FOUND {
                tracing::warn!(%url, "artifact not found, trying next repository");
                continue;
            }
            if !response.status().is_success() {
                return Err(ResolveError::Status {
                    url,
                    status: response.status().as_u16(),
                });
            }

            let partial = ArtifactStore::partial_path(dest);
            let mut file = File::create(&partial).await?;
            let mut stream = response.bytes_stream();
            let mut hasher = Sha256::new();
            let mut downloaded: u64 = 0;

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                hasher.update(&chunk);
                downloaded += chunk.len() as u64;
            }

            file.flush().await?;
            drop(file);
            let actual = hex::encode(hasher.finalize());

            if let Some(expected) = &entity.sha256 {
                if expected.as_str() != actual {
                    tokio::fs::remove_file(&partial).await.ok();
                    return Err(ResolveError::ChecksumMismatch {
                        coordinates: entity.coordinates.clone(),
                        expected: expected.to_string(),
                        actual,
                    });
                }
            }

            tokio::fs::rename(&partial, dest).await?;
            let sha256 = Sha256Digest::new(actual).map_err(std::io::Error::other)?;
            return Ok(Fetched {
                sha256,
                bytes: downloaded,
            });
        }

        Err(ResolveError::NotFound {
            coordinates: entity.coordinates.clone(),
            tried: self.repositories.len(),
        })
    }
}
