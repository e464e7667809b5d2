use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Url};

use crate::error::DredgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    Default,
    NoCache,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            status_text: "OK".to_string(),
            body: body.into(),
        }
    }

    pub fn status(status: u16, status_text: &str) -> Self {
        Self {
            status,
            status_text: status_text.to_string(),
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn get(&self, url: &Url, cache: CachePolicy) -> Result<FetchResponse, DredgeError>;
}

#[derive(Clone)]
pub struct HttpResourceClient {
    client: Client,
}

impl HttpResourceClient {
    pub fn new() -> Result<Self, DredgeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("dredge/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DredgeError::Transport(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| DredgeError::Transport(err.to_string()))?;
        Ok(Self { client })
    }

    async fn read_file(url: &Url) -> Result<FetchResponse, DredgeError> {
        let path = url
            .to_file_path()
            .map_err(|_| DredgeError::InvalidUrl(url.to_string()))?;
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(FetchResponse::ok(body)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Ok(FetchResponse::status(404, "Not Found"))
            }
            Err(err) => Err(DredgeError::Transport(format!("{}: {err}", path.display()))),
        }
    }
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
    async fn get(&self, url: &Url, cache: CachePolicy) -> Result<FetchResponse, DredgeError> {
        if url.scheme() == "file" {
            return Self::read_file(url).await;
        }

        let mut request = self.client.get(url.clone());
        if cache == CachePolicy::NoCache {
            request = request.header(CACHE_CONTROL, "no-cache");
        }
        let response = request
            .send()
            .await
            .map_err(|err| DredgeError::Transport(err.to_string()))?;
        let status = response.status();
        let body = if status.is_success() {
            response
                .text()
                .await
                .map_err(|err| DredgeError::Transport(err.to_string()))?
        } else {
            String::new()
        };
        Ok(FetchResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

pub async fn fetch_resource(
    client: &dyn ResourceClient,
    url: &Url,
    cache: CachePolicy,
) -> Result<String, DredgeError> {
    let response = client.get(url, cache).await?;
    check_status(&response)?;
    Ok(response.body)
}

pub fn check_status(response: &FetchResponse) -> Result<(), DredgeError> {
    if response.is_success() {
        return Ok(());
    }
    if response.status == 404 {
        return Err(DredgeError::FileNotFound);
    }
    let detail = if response.status_text.is_empty() {
        response.status.to_string()
    } else {
        response.status_text.clone()
    };
    Err(DredgeError::RequestFailed(detail))
}

pub fn resolve_url(base: &Url, path: &str) -> Result<Url, DredgeError> {
    base.join(path)
        .map_err(|err| DredgeError::InvalidUrl(format!("{path}: {err}")))
}
