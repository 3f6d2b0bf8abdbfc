/// GitHub API client
///
/// Fetches repository listings, recursive trees and file contents on behalf
/// of a user, authenticated with the bearer credential from the user's stored
/// identity record. Listing endpoints follow RFC 5988 `Link` pagination until
/// exhausted. File retrieval picks a strategy by declared size: the contents
/// endpoint below the configured threshold, the ref -> commit -> tree -> blob
/// indirection at or above it (the contents endpoint is size-limited
/// upstream).
use crate::config::GithubConfig;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("no GitHub identity stored for user")]
    MissingIdentity,

    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub returned {status} for {path}")]
    Status { status: u16, path: String },

    #[error("content could not be decoded: {0}")]
    Decode(String),

    #[error("content exceeds the {limit} byte budget")]
    ContentTooLarge { limit: u64 },

    #[error("path {0} not found in repository tree")]
    PathNotInTree(String),
}

/// One repository from the user's listing. Repositories without commits have
/// no default branch and are skipped by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoListing {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub private: bool,
    pub default_branch: Option<String>,
}

/// One entry of a recursive tree listing
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
}

impl TreeEntry {
    pub fn is_file(&self) -> bool {
        self.kind == "blob"
    }
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: String,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    url: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    tree: TreeRef,
}

#[derive(Debug, Deserialize)]
struct TreeRef {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Hook {
    id: i64,
    config: HookConfig,
}

#[derive(Debug, Default, Deserialize)]
struct HookConfig {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateHookRequest<'a> {
    name: &'a str,
    active: bool,
    events: [&'a str; 1],
    config: CreateHookConfig<'a>,
}

#[derive(Debug, Serialize)]
struct CreateHookConfig<'a> {
    url: &'a str,
    content_type: &'a str,
}

#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    config: GithubConfig,
    token: String,
}

impl GithubClient {
    pub fn new(config: GithubConfig, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            token,
        }
    }

    /// GET an API path (or an absolute URL handed back by a previous
    /// response), failing on non-success statuses.
    async fn get(&self, path_or_url: &str) -> Result<reqwest::Response, GithubError> {
        let url = self.absolute(path_or_url);
        let response = self
            .http
            .get(&url)
            .timeout(self.timeout())
            .header("Authorization", format!("token {}", self.token))
            .header("User-Agent", "geosync-service")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GithubError::Status {
                status: response.status().as_u16(),
                path: path_or_url.to_string(),
            });
        }
        Ok(response)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs.max(1))
    }

    fn absolute(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else {
            format!("{}{}", self.config.api_base_url, path_or_url)
        }
    }

    /// List all repositories visible to the user, following pagination until
    /// exhausted. Pages are fetched sequentially to respect rate limits.
    pub async fn list_repos(&self) -> Result<Vec<RepoListing>, GithubError> {
        let mut repos = Vec::new();
        let mut next = Some(format!("{}/user/repos", self.config.api_base_url));
        while let Some(url) = next {
            let response = self.get(&url).await?;
            next = next_page(&response);
            let mut page: Vec<RepoListing> = response.json().await?;
            repos.append(&mut page);
        }
        Ok(repos)
    }

    /// Fetch the recursive tree of a branch head
    pub async fn get_tree(
        &self,
        full_name: &str,
        branch: &str,
    ) -> Result<Vec<TreeEntry>, GithubError> {
        let response = self
            .get(&format!(
                "/repos/{}/git/trees/{}?recursive=1",
                full_name, branch
            ))
            .await?;
        let tree: TreeResponse = response.json().await?;
        Ok(tree.tree)
    }

    /// Fetch one file's raw bytes, choosing the retrieval strategy by the
    /// declared size from the tree listing.
    pub async fn fetch_file(
        &self,
        full_name: &str,
        branch: &str,
        path: &str,
        declared_size: u64,
    ) -> Result<Vec<u8>, GithubError> {
        if declared_size < self.config.contents_size_limit {
            self.fetch_contents(full_name, path).await
        } else {
            self.fetch_blob(full_name, branch, path).await
        }
    }

    async fn fetch_contents(&self, full_name: &str, path: &str) -> Result<Vec<u8>, GithubError> {
        let response = self
            .get(&format!("/repos/{}/contents/{}", full_name, path))
            .await?;
        let contents: ContentsResponse = response.json().await?;
        self.decode_content(&contents.content)
    }

    /// Resolve the branch head ref, the commit it points to and that commit's
    /// recursive tree, then fetch the matching entry's blob.
    async fn fetch_blob(
        &self,
        full_name: &str,
        branch: &str,
        path: &str,
    ) -> Result<Vec<u8>, GithubError> {
        let head: RefResponse = self
            .get(&format!("/repos/{}/git/refs/heads/{}", full_name, branch))
            .await?
            .json()
            .await?;
        let commit: CommitResponse = self.get(&head.object.url).await?.json().await?;
        let tree: TreeResponse = self
            .get(&format!("{}?recursive=1", commit.tree.url))
            .await?
            .json()
            .await?;

        let blob_url = tree
            .tree
            .iter()
            .find(|entry| entry.path == path)
            .and_then(|entry| entry.url.clone())
            .ok_or_else(|| GithubError::PathNotInTree(path.to_string()))?;

        let blob: ContentsResponse = self.get(&blob_url).await?.json().await?;
        self.decode_content(&blob.content)
    }

    fn decode_content(&self, encoded: &str) -> Result<Vec<u8>, GithubError> {
        let limit = self.config.max_content_bytes;
        if encoded.len() as u64 > limit.saturating_mul(4) / 3 + 4 {
            return Err(GithubError::ContentTooLarge { limit });
        }
        // The API wraps base64 payloads in newlines
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let decoded = BASE64
            .decode(compact.as_bytes())
            .map_err(|e| GithubError::Decode(e.to_string()))?;
        if decoded.len() as u64 > limit {
            return Err(GithubError::ContentTooLarge { limit });
        }
        Ok(decoded)
    }

    /// Register a push webhook pointing at this service
    pub async fn create_push_hook(
        &self,
        full_name: &str,
        hook_url: &str,
    ) -> Result<(), GithubError> {
        let path = format!("/repos/{}/hooks", full_name);
        let payload = CreateHookRequest {
            name: "web",
            active: true,
            events: ["push"],
            config: CreateHookConfig {
                url: hook_url,
                content_type: "json",
            },
        };
        let response = self
            .http
            .post(self.absolute(&path))
            .timeout(self.timeout())
            .header("Authorization", format!("token {}", self.token))
            .header("User-Agent", "geosync-service")
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GithubError::Status {
                status: response.status().as_u16(),
                path,
            });
        }
        Ok(())
    }

    /// Remove the push webhook whose config URL matches `hook_url`. Returns
    /// whether a matching hook was found and deleted.
    pub async fn delete_push_hook(
        &self,
        full_name: &str,
        hook_url: &str,
    ) -> Result<bool, GithubError> {
        let hooks: Vec<Hook> = self
            .get(&format!("/repos/{}/hooks", full_name))
            .await?
            .json()
            .await?;
        let Some(hook) = hooks
            .iter()
            .find(|hook| hook.config.url.as_deref() == Some(hook_url))
        else {
            return Ok(false);
        };

        let path = format!("/repos/{}/hooks/{}", full_name, hook.id);
        let response = self
            .http
            .delete(self.absolute(&path))
            .timeout(self.timeout())
            .header("Authorization", format!("token {}", self.token))
            .header("User-Agent", "geosync-service")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GithubError::Status {
                status: response.status().as_u16(),
                path,
            });
        }
        Ok(true)
    }
}

/// Extract the rel="next" target from a response's `Link` header
fn next_page(response: &reqwest::Response) -> Option<String> {
    let header = response.headers().get("link")?.to_str().ok()?;
    parse_next_link(header)
}

fn parse_next_link(header: &str) -> Option<String> {
    for part in header.split(',') {
        let mut sections = part.split(';');
        let url = sections.next()?.trim();
        let is_next = sections
            .any(|param| param.trim().eq_ignore_ascii_case("rel=\"next\""));
        if is_next {
            return Some(url.trim_start_matches('<').trim_end_matches('>').to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(base_url: String) -> GithubConfig {
        GithubConfig {
            api_base_url: base_url,
            contents_size_limit: 1_048_576,
            max_content_bytes: 1_048_576,
            request_timeout_secs: 5,
        }
    }

    #[test]
    fn parses_next_link_from_header() {
        let header = "<https://api.github.com/user/repos?page=2>; rel=\"next\", \
                      <https://api.github.com/user/repos?page=5>; rel=\"last\"";
        assert_eq!(
            parse_next_link(header),
            Some("https://api.github.com/user/repos?page=2".to_string())
        );
    }

    #[test]
    fn no_next_link_on_last_page() {
        let header = "<https://api.github.com/user/repos?page=1>; rel=\"first\"";
        assert_eq!(parse_next_link(header), None);
    }

    #[tokio::test]
    async fn list_repos_follows_pagination() {
        let mut server = mockito::Server::new_async().await;
        let page_two_url = format!("{}/user/repos?page=2", server.url());
        let _first = server
            .mock("GET", "/user/repos")
            .with_header("link", &format!("<{}>; rel=\"next\"", page_two_url))
            .with_body(
                r#"[{"id": 1, "name": "a", "full_name": "me/a", "private": false, "default_branch": "main"}]"#,
            )
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/user/repos?page=2")
            .with_body(
                r#"[{"id": 2, "name": "b", "full_name": "me/b", "private": true, "default_branch": null}]"#,
            )
            .create_async()
            .await;

        let client = GithubClient::new(test_config(server.url()), "t0ken".to_string());
        let repos = client.list_repos().await.unwrap();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].full_name, "me/a");
        assert_eq!(repos[1].default_branch, None);
    }

    #[tokio::test]
    async fn small_files_come_from_the_contents_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let encoded = BASE64.encode(b"{\"type\": \"FeatureCollection\"}");
        let _contents = server
            .mock("GET", "/repos/me/a/contents/parks.geojson")
            .with_body(format!(
                r#"{{"content": "{}", "encoding": "base64"}}"#,
                encoded
            ))
            .create_async()
            .await;

        let client = GithubClient::new(test_config(server.url()), "t0ken".to_string());
        let bytes = client
            .fetch_file("me/a", "main", "parks.geojson", 120)
            .await
            .unwrap();
        assert_eq!(bytes, b"{\"type\": \"FeatureCollection\"}");
    }

    #[tokio::test]
    async fn oversized_content_is_a_budget_failure() {
        let mut server = mockito::Server::new_async().await;
        let encoded = BASE64.encode(vec![b'x'; 64]);
        let _contents = server
            .mock("GET", "/repos/me/a/contents/parks.geojson")
            .with_body(format!(r#"{{"content": "{}"}}"#, encoded))
            .create_async()
            .await;

        let mut config = test_config(server.url());
        config.max_content_bytes = 16;
        let client = GithubClient::new(config, "t0ken".to_string());
        let err = client
            .fetch_file("me/a", "main", "parks.geojson", 120)
            .await
            .unwrap_err();
        assert!(matches!(err, GithubError::ContentTooLarge { .. }));
    }

    #[tokio::test]
    async fn missing_status_maps_to_status_error() {
        let mut server = mockito::Server::new_async().await;
        let _missing = server
            .mock("GET", "/repos/me/a/git/trees/main?recursive=1")
            .with_status(404)
            .create_async()
            .await;

        let client = GithubClient::new(test_config(server.url()), "t0ken".to_string());
        let err = client.get_tree("me/a", "main").await.unwrap_err();
        assert!(matches!(err, GithubError::Status { status: 404, .. }));
    }
}
