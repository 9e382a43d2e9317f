use std::sync::Arc;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{info, warn};

use crate::batch::{BatchDownloader, BatchReport, BatchRequest, DEFAULT_ARCHIVE_EXT};
use crate::config::EngineConfig;
use crate::domain::{Chapter, Quality, SortOrder, Unit};
use crate::error::MdexError;
use crate::fetch::ResourceFetcher;
use crate::filter::{ChapterFilter, parse_range, select_last};
use crate::mangadex::{FeedQuery, MAX_FEED_LIMIT, MangaSource, PageSource};
use crate::unit::{UnitDownloader, UnitTarget};

pub const TITLE_PLACEHOLDER: &str = ":m";

#[derive(Debug, Clone, Default)]
pub struct MangaRequest {
    pub manga_id: String,
    pub language: String,
    pub chapters: Vec<String>,
    pub volumes: Vec<String>,
    pub chapter_range: Vec<f64>,
    pub volume_range: Vec<f64>,
    pub groups: Vec<String>,
    pub last: Option<usize>,
    pub all: bool,
}

impl MangaRequest {
    pub fn new(manga_id: impl Into<String>) -> Self {
        Self {
            manga_id: manga_id.into(),
            language: "en".to_string(),
            ..Self::default()
        }
    }

    pub fn build_filter(&self) -> Result<ChapterFilter, MdexError> {
        let chapter_range = parse_range(&self.chapter_range, "chapter-range")?;
        let volume_range = parse_range(&self.volume_range, "volume-range")?;

        let has_filters = chapter_range.is_some()
            || volume_range.is_some()
            || !self.chapters.is_empty()
            || !self.volumes.is_empty();
        if matches!(self.last, Some(n) if n > 0) && has_filters {
            return Err(MdexError::Config(
                "'--last/-L' can not be used together with chapter or volume filters".to_string(),
            ));
        }

        let mut filter = ChapterFilter::new();
        if !self.groups.is_empty() {
            filter = filter.prefer_groups(&self.groups);
        }
        if let Some((min, max)) = chapter_range {
            filter = filter.chapter_range(min, max);
        }
        if let Some((min, max)) = volume_range {
            filter = filter.volume_range(min, max);
        }
        if !self.chapters.is_empty() {
            filter = filter.chapters(self.chapters.iter().cloned());
        }
        if !self.volumes.is_empty() {
            filter = filter.volumes(self.volumes.iter().cloned());
        }
        Ok(filter)
    }

    pub fn feed_query(&self) -> FeedQuery {
        let query = FeedQuery::new(self.manga_id.clone())
            .language(self.language.clone())
            .limit(MAX_FEED_LIMIT)
            .order(SortOrder::Asc);
        if self.groups.is_empty() {
            query
        } else {
            query.include_groups()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanEntry {
    pub position: usize,
    pub id: String,
    pub chapter: String,
    pub volume: String,
    pub pages: u32,
    pub group: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResult {
    pub chapters: Vec<PlanEntry>,
}

impl PlanResult {
    pub fn from_chapters(chapters: &[Chapter]) -> Self {
        Self {
            chapters: chapters
                .iter()
                .enumerate()
                .map(|(position, chapter)| PlanEntry {
                    position,
                    id: chapter.id.clone(),
                    chapter: chapter.name.clone(),
                    volume: chapter.volume.clone(),
                    pages: chapter.pages,
                    group: chapter.group.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChapterResult {
    pub id: String,
    pub chapter: String,
    pub path: String,
    pub pages: usize,
}

pub struct App<S, F>
where
    S: MangaSource + PageSource,
    F: ResourceFetcher,
{
    source: Arc<S>,
    fetcher: Arc<F>,
    engine: EngineConfig,
}

impl<S, F> App<S, F>
where
    S: MangaSource + PageSource + 'static,
    F: ResourceFetcher + 'static,
{
    pub fn new(source: S, fetcher: F, engine: EngineConfig) -> Self {
        Self {
            source: Arc::new(source),
            fetcher: Arc::new(fetcher),
            engine,
        }
    }

    pub fn plan_manga(&self, request: &MangaRequest) -> Result<Vec<Chapter>, MdexError> {
        let filter = request.build_filter()?;
        let query = request.feed_query();
        query.verify()?;

        let candidates = if request.all {
            self.source.feed_all(&query)?
        } else {
            self.source.feed(&query)?
        };
        info!(candidates = candidates.len(), "fetched manga feed");

        let selected = filter.apply(&candidates);
        Ok(match request.last {
            Some(count) if count > 0 => select_last(selected, count),
            _ => selected,
        })
    }

    pub fn download_manga(
        &self,
        request: &MangaRequest,
        batch: BatchRequest,
    ) -> Result<BatchReport, MdexError> {
        request.build_filter()?;
        let batch = self.resolve_title(&request.manga_id, batch);
        let chapters = self.plan_manga(request)?;
        let downloader = BatchDownloader::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.source),
            self.engine.clone(),
        );
        Ok(downloader.run(&chapters, &batch))
    }

    pub fn download_chapter(
        &self,
        chapter_id: &str,
        output: Utf8PathBuf,
        archive_ext: Option<&str>,
        quality: Quality,
    ) -> Result<ChapterResult, MdexError> {
        let chapter = self.source.chapter(chapter_id)?;
        let urls = self.source.page_urls(&chapter, quality)?;
        let target = match archive_ext {
            Some(ext) => {
                let ext = if ext.is_empty() {
                    DEFAULT_ARCHIVE_EXT
                } else {
                    ext
                };
                UnitTarget::Archive(Utf8PathBuf::from(format!("{output}.{ext}")))
            }
            None => UnitTarget::Directory(output),
        };

        let units = UnitDownloader::new(Arc::clone(&self.fetcher), self.engine.stall_timeout);
        let pages = units.download(&Unit::new(chapter.name.clone(), urls), &target)?;
        info!(chapter = %chapter.name, pages, "chapter downloaded");
        Ok(ChapterResult {
            id: chapter.id,
            chapter: chapter.name,
            path: target.path().to_string(),
            pages,
        })
    }

    fn resolve_title(&self, manga_id: &str, mut batch: BatchRequest) -> BatchRequest {
        if !batch.prefix.contains(TITLE_PLACEHOLDER) {
            return batch;
        }
        match self.source.manga_title(manga_id) {
            Ok(Some(title)) => {
                batch.prefix = batch.prefix.replace(TITLE_PLACEHOLDER, &title);
            }
            Ok(None) => warn!(manga = manga_id, "manga has no title, keeping prefix as is"),
            Err(err) => warn!(manga = manga_id, error = %err, "can't get manga title, keeping prefix as is"),
        }
        batch
    }
}
