//! GitHub REST v3 implementation of [`HostingApi`].

use std::time::Duration;

use log::debug;
use reqwest::blocking::{Client, Response};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use url::Url;

use crate::error::{Error, Result};
use crate::hosting::{HostingApi, RemoteRepository, RepositoryLookup};

/// Public GitHub API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking GitHub client. Redirects are not followed so that renamed
/// repositories surface as [`RepositoryLookup::Moved`].
pub struct GitHubApi {
    client: Client,
    base_url: Url,
}

impl GitHubApi {
    /// Create a client for `base_url`. An empty token sends anonymous requests.
    pub fn new(token: &str, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if !token.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                Error::ConfigParse {
                    message: "access token contains invalid characters".to_string(),
                    hint: None,
                }
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("polyrepo/", env!("CARGO_PKG_VERSION")))
            .redirect(Policy::none())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Network {
                url: base_url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: normalize_base(base_url)?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn get(&self, url: Url) -> Result<Response> {
        debug!("GET {}", url);
        self.client.get(url.clone()).send().map_err(|e| Error::Network {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    fn list(&self, path: &str, page: u32, per_page: u32) -> Result<Vec<RemoteRepository>> {
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut()
            .append_pair("per_page", &per_page.to_string())
            .append_pair("page", &page.to_string());

        let response = self.get(url.clone())?;
        if !response.status().is_success() {
            return Err(api_error(&url, response));
        }
        response.json().map_err(|e| Error::Network {
            url: url.to_string(),
            message: format!("invalid response body: {}", e),
        })
    }
}

impl HostingApi for GitHubApi {
    fn get_repository(&self, owner: &str, name: &str) -> Result<RepositoryLookup> {
        let url = self.endpoint(&format!("repos/{}/{}", owner, name))?;
        let response = self.get(url.clone())?;

        match response.status() {
            StatusCode::MOVED_PERMANENTLY | StatusCode::PERMANENT_REDIRECT => {
                let location = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                Ok(RepositoryLookup::Moved { location })
            }
            StatusCode::NOT_FOUND => Err(Error::RepositoryNotFound {
                full_name: format!("{}/{}", owner, name),
            }),
            status if status.is_success() => {
                let repo = response.json().map_err(|e| Error::Network {
                    url: url.to_string(),
                    message: format!("invalid response body: {}", e),
                })?;
                Ok(RepositoryLookup::Found(repo))
            }
            _ => Err(api_error(&url, response)),
        }
    }

    fn list_organization_repositories(
        &self,
        organization: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemoteRepository>> {
        self.list(&format!("orgs/{}/repos", organization), page, per_page)
    }

    fn list_user_repositories(
        &self,
        user: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemoteRepository>> {
        self.list(&format!("users/{}/repos", user), page, per_page)
    }
}

/// `Url::join` drops the last path segment unless the base ends with `/`.
fn normalize_base(base_url: &str) -> Result<Url> {
    if base_url.ends_with('/') {
        Ok(Url::parse(base_url)?)
    } else {
        Ok(Url::parse(&format!("{}/", base_url))?)
    }
}

fn api_error(url: &Url, response: Response) -> Error {
    let status = response.status().as_u16();
    let message = response
        .text()
        .ok()
        .and_then(|body| {
            serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                .or(Some(body))
        })
        .unwrap_or_default();
    Error::Api {
        url: url.to_string(),
        status,
        message,
    }
}
