use std::time::Duration;

use regex::Regex;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ApiConfig;
use crate::domain::{Chapter, Quality, SortOrder};
use crate::error::MdexError;

pub const MAX_FEED_LIMIT: u32 = 500;

pub trait MangaSource: Send + Sync {
    fn feed(&self, query: &FeedQuery) -> Result<Vec<Chapter>, MdexError>;
    fn chapter(&self, id: &str) -> Result<Chapter, MdexError>;
    fn manga_title(&self, id: &str) -> Result<Option<String>, MdexError>;

    fn feed_all(&self, query: &FeedQuery) -> Result<Vec<Chapter>, MdexError> {
        let mut chapters = Vec::new();
        let mut page = query.clone();
        loop {
            let batch = self.feed(&page)?;
            if batch.is_empty() {
                break;
            }
            chapters.extend(batch);
            page = page.clone().offset(page.offset + page.limit);
        }
        Ok(chapters)
    }
}

pub trait PageSource: Send + Sync {
    fn page_urls(&self, chapter: &Chapter, quality: Quality) -> Result<Vec<String>, MdexError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    pub manga_id: String,
    pub language: String,
    pub limit: u32,
    pub offset: u32,
    pub order: SortOrder,
    pub include_groups: bool,
}

impl FeedQuery {
    pub fn new(manga_id: impl Into<String>) -> Self {
        Self {
            manga_id: manga_id.into(),
            language: "en".to_string(),
            limit: 100,
            offset: 0,
            order: SortOrder::Asc,
            include_groups: false,
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn include_groups(mut self) -> Self {
        self.include_groups = true;
        self
    }

    pub fn verify(&self) -> Result<(), MdexError> {
        if self.manga_id.trim().is_empty() {
            return Err(MdexError::InvalidId(self.manga_id.clone()));
        }
        if self.language.trim().is_empty() {
            return Err(MdexError::Config("language is empty".to_string()));
        }
        if self.limit < 1 || self.limit > MAX_FEED_LIMIT {
            return Err(MdexError::Config(format!(
                "limit is not in range [1..{MAX_FEED_LIMIT}]"
            )));
        }
        Ok(())
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("translatedLanguage[]", self.language.clone()),
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
            ("order[chapter]", self.order.to_string()),
        ];
        if self.include_groups {
            params.push(("includes[]", "scanlation_group".to_string()));
        }
        params
    }
}

#[derive(Clone)]
pub struct MangadexClient {
    client: Client,
    base_url: String,
}

impl MangadexClient {
    pub fn new(api: &ApiConfig, timeout: Duration) -> Result<Self, MdexError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("mdex-dl/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MdexError::Config(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| MdexError::MangadexHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: api.base_url.clone(),
        })
    }

    fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value, MdexError> {
        debug!(url, "mangadex request");
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .map_err(|err| MdexError::MangadexHttp(format!("error getting {url}: {err}")))?;
        let response = Self::handle_status(response)?;
        response
            .json()
            .map_err(|err| MdexError::MangadexParse(err.to_string()))
    }

    fn handle_status(response: Response) -> Result<Response, MdexError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "MangaDex request failed".to_string());
        Err(MdexError::MangadexStatus { status, message })
    }
}

impl MangaSource for MangadexClient {
    fn feed(&self, query: &FeedQuery) -> Result<Vec<Chapter>, MdexError> {
        query.verify()?;
        let url = format!("{}/manga/{}/feed", self.base_url, query.manga_id);
        let value = self.get_json(&url, &query.params())?;
        parse_feed(&value)
    }

    fn chapter(&self, id: &str) -> Result<Chapter, MdexError> {
        let url = format!("{}/chapter/{id}", self.base_url);
        let value = self.get_json(&url, &[])?;
        parse_chapter(&value)
    }

    fn manga_title(&self, id: &str) -> Result<Option<String>, MdexError> {
        let url = format!("{}/manga/{id}", self.base_url);
        let value = self.get_json(&url, &[])?;
        Ok(parse_main_title(&value))
    }
}

impl PageSource for MangadexClient {
    fn page_urls(&self, chapter: &Chapter, quality: Quality) -> Result<Vec<String>, MdexError> {
        let url = format!("{}/at-home/server/{}", self.base_url, chapter.id);
        let value = self.get_json(&url, &[])?;
        parse_at_home(&value, quality)
    }
}

#[derive(Debug, Deserialize)]
struct RawChapter {
    id: String,
    attributes: RawChapterAttributes,
    #[serde(default)]
    relationships: Vec<RawRelationship>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChapterAttributes {
    #[serde(default)]
    volume: Option<String>,
    #[serde(default)]
    chapter: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    translated_language: Option<String>,
    #[serde(default)]
    pages: u32,
}

#[derive(Debug, Deserialize)]
struct RawRelationship {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    attributes: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    #[serde(default)]
    data: Vec<RawChapter>,
}

#[derive(Debug, Deserialize)]
struct ChapterEnvelope {
    data: RawChapter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHome {
    base_url: String,
    chapter: AtHomeChapter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHomeChapter {
    hash: String,
    #[serde(default)]
    data: Vec<String>,
    #[serde(default)]
    data_saver: Vec<String>,
}

impl From<RawChapter> for Chapter {
    fn from(raw: RawChapter) -> Self {
        let group = raw
            .relationships
            .iter()
            .filter(|rel| rel.kind == "scanlation_group")
            .find_map(|rel| {
                rel.attributes
                    .as_ref()
                    .and_then(|attrs| attrs.get("name"))
                    .and_then(|name| name.as_str())
                    .map(|name| name.to_string())
            });
        Chapter {
            id: raw.id,
            name: raw.attributes.chapter.unwrap_or_default(),
            volume: raw.attributes.volume.unwrap_or_default(),
            title: raw.attributes.title.unwrap_or_default(),
            language: raw.attributes.translated_language.unwrap_or_default(),
            pages: raw.attributes.pages,
            group,
        }
    }
}

pub fn parse_feed(value: &Value) -> Result<Vec<Chapter>, MdexError> {
    let envelope = FeedEnvelope::deserialize(value)
        .map_err(|err| MdexError::MangadexParse(err.to_string()))?;
    Ok(envelope.data.into_iter().map(Chapter::from).collect())
}

pub fn parse_chapter(value: &Value) -> Result<Chapter, MdexError> {
    let envelope = ChapterEnvelope::deserialize(value)
        .map_err(|err| MdexError::MangadexParse(err.to_string()))?;
    Ok(envelope.data.into())
}

pub fn parse_at_home(value: &Value, quality: Quality) -> Result<Vec<String>, MdexError> {
    let server =
        AtHome::deserialize(value).map_err(|err| MdexError::MangadexParse(err.to_string()))?;
    let files = match quality {
        Quality::DataSaver => &server.chapter.data_saver,
        Quality::Original => &server.chapter.data,
    };
    let base = server.base_url.trim_end_matches('/');
    Ok(files
        .iter()
        .map(|file| {
            format!(
                "{base}/{}/{}/{file}",
                quality.path_segment(),
                server.chapter.hash
            )
        })
        .collect())
}

pub fn parse_main_title(value: &Value) -> Option<String> {
    let titles = value
        .get("data")
        .and_then(|data| data.get("attributes"))
        .and_then(|attrs| attrs.get("title"))
        .and_then(|title| title.as_object())?;
    titles
        .get("en")
        .or_else(|| titles.values().next())
        .and_then(|title| title.as_str())
        .map(|title| title.to_string())
}

pub fn extract_manga_id(input: &str) -> Result<String, MdexError> {
    extract_id(input, r"mangadex\.org/title/([\w-]+)")
}

pub fn extract_chapter_id(input: &str) -> Result<String, MdexError> {
    extract_id(input, r"mangadex\.org/chapter/([\w-]+)")
}

fn extract_id(input: &str, pattern: &str) -> Result<String, MdexError> {
    let trimmed = input.trim();
    let re = Regex::new(pattern).map_err(|err| MdexError::Config(err.to_string()))?;
    if let Some(id) = re.captures(trimmed).and_then(|caps| caps.get(1)) {
        return Ok(id.as_str().to_string());
    }
    let is_bare_id = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if !is_bare_id {
        return Err(MdexError::InvalidId(input.to_string()));
    }
    Ok(trimmed.to_string())
}
