//! GitHub repository publisher using the git data API.
//!
//! The whole snapshot lands as one commit: blobs are created for every file,
//! a tree is built on top of the branch head that also removes connector
//! files no longer present, and the branch ref is moved to the new commit.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::config::GitHubPublisherConfig;

use super::{
    check_relative_path, PublishError, PublishReceipt, Publisher, Snapshot, CONNECTORS_DIR,
};

const BLOB_MODE: &str = "100644";

/// An entry of an existing tree as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeItem {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub sha: Option<String>,
}

/// An entry of a tree to create. `sha: None` deletes the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: Option<String>,
}

/// Entries for the new tree: one per snapshot file (path to blob SHA), plus a
/// deletion for every existing connector file the snapshot no longer has.
pub fn build_tree_entries(
    existing: &[TreeItem],
    blobs: &BTreeMap<String, String>,
) -> Vec<TreeEntry> {
    let prefix = format!("{}/", CONNECTORS_DIR);

    let mut entries: Vec<TreeEntry> = blobs
        .iter()
        .map(|(path, sha)| TreeEntry {
            path: path.clone(),
            mode: BLOB_MODE.to_string(),
            kind: "blob".to_string(),
            sha: Some(sha.clone()),
        })
        .collect();

    let kept: HashSet<&str> = blobs.keys().map(String::as_str).collect();
    entries.extend(
        existing
            .iter()
            .filter(|item| item.kind == "blob")
            .filter(|item| item.path.starts_with(&prefix))
            .filter(|item| !kept.contains(item.path.as_str()))
            .map(|item| TreeEntry {
                path: item.path.clone(),
                mode: BLOB_MODE.to_string(),
                kind: "blob".to_string(),
                sha: None,
            }),
    );

    entries
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: ShaObject,
}

#[derive(Debug, Deserialize)]
struct ShaObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    tree: ShaObject,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeItem>,
}

/// Publishes snapshots as commits on a GitHub branch.
pub struct GitHubPublisher {
    client: Client,
    config: GitHubPublisherConfig,
}

impl GitHubPublisher {
    pub fn new(config: GitHubPublisherConfig) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .user_agent(concat!("scrapeflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PublishError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/git/{}",
            self.config.api_url.trim_end_matches('/'),
            urlencoding::encode(&self.config.owner),
            urlencoding::encode(&self.config.repo),
            path
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.repo_url(path))
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, PublishError> {
        let response = request
            .send()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Api(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| PublishError::Api(format!("Failed to parse response: {}", e)))
    }

    async fn create_blob(&self, content: &str) -> Result<String, PublishError> {
        let blob: ShaObject = self
            .send(
                self.request(Method::POST, "blobs")
                    .json(&json!({ "content": content, "encoding": "utf-8" })),
            )
            .await?;
        Ok(blob.sha)
    }
}

#[async_trait]
impl Publisher for GitHubPublisher {
    async fn publish(&self, snapshot: &Snapshot) -> Result<PublishReceipt, PublishError> {
        for path in snapshot.files().keys() {
            check_relative_path(path)?;
        }

        let branch_ref = format!("refs/heads/{}", self.config.branch);

        let head: RefResponse = self
            .send(self.request(Method::GET, &format!("ref/heads/{}", self.config.branch)))
            .await?;
        let parent_sha = head.object.sha;

        let parent: CommitResponse = self
            .send(self.request(Method::GET, &format!("commits/{}", parent_sha)))
            .await?;
        let base_tree = parent.tree.sha;

        let current: TreeResponse = self
            .send(
                self.request(Method::GET, &format!("trees/{}", base_tree))
                    .query(&[("recursive", "1")]),
            )
            .await?;

        debug!(
            branch = %self.config.branch,
            parent = %parent_sha,
            existing = current.tree.len(),
            "Resolved branch head"
        );

        let mut blobs = BTreeMap::new();
        for (path, contents) in snapshot.files() {
            let sha = self.create_blob(contents).await?;
            blobs.insert(path.clone(), sha);
        }

        let entries = build_tree_entries(&current.tree, &blobs);
        let tree: ShaObject = self
            .send(
                self.request(Method::POST, "trees")
                    .json(&json!({ "base_tree": base_tree, "tree": entries })),
            )
            .await?;

        let message = format!(
            "Update as at {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
        );
        let commit: ShaObject = self
            .send(self.request(Method::POST, "commits").json(&json!({
                "message": message,
                "tree": tree.sha,
                "parents": [parent_sha],
            })))
            .await?;

        let _: RefResponse = self
            .send(
                self.request(Method::PATCH, &branch_ref)
                    .json(&json!({ "sha": commit.sha, "force": false })),
            )
            .await?;

        info!(
            repo = %format!("{}/{}", self.config.owner, self.config.repo),
            commit = %commit.sha,
            files = snapshot.len(),
            "Published snapshot"
        );

        Ok(PublishReceipt {
            backend: self.name().to_string(),
            location: commit.sha,
            files: snapshot.len(),
            published_at: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "github"
    }
}
