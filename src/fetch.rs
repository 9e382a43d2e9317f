use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};

use crate::error::MdexError;

pub struct Payload {
    pub extension: String,
    pub body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payload")
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

pub trait ResourceFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Payload, MdexError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(request_timeout: Duration) -> Result<Self, MdexError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("mdex-dl/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MdexError::Config(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .map_err(|err| MdexError::Config(err.to_string()))?;
        Ok(Self { client })
    }
}

impl ResourceFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Payload, MdexError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| MdexError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(MdexError::Remote {
                url: url.to_string(),
                status: response.status().to_string(),
            });
        }

        let content_type = match response.headers().get(CONTENT_TYPE) {
            None => None,
            Some(value) => match value.to_str() {
                Ok(value) => Some(value.to_string()),
                Err(_) => {
                    return Err(MdexError::UnexpectedContentType {
                        url: url.to_string(),
                        content_type: String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    });
                }
            },
        };
        let extension = media_extension(content_type.as_deref()).ok_or_else(|| {
            MdexError::UnexpectedContentType {
                url: url.to_string(),
                content_type: content_type.clone().unwrap_or_default(),
            }
        })?;

        Ok(Payload {
            extension,
            body: Box::new(response),
        })
    }
}

// A missing header counts as JPEG.
pub fn media_extension(content_type: Option<&str>) -> Option<String> {
    let essence = content_type
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if essence.is_empty() || essence == "image/jpeg" {
        return Some("jpg".to_string());
    }
    essence
        .strip_prefix("image/")
        .filter(|subtype| !subtype.is_empty())
        .map(|subtype| subtype.to_string())
}
