use std::sync::Arc;
use std::thread::{self, JoinHandle};

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::domain::{Chapter, Quality, Unit};
use crate::error::MdexError;
use crate::fetch::ResourceFetcher;
use crate::mangadex::PageSource;
use crate::unit::{UnitDownloader, UnitTarget};

pub const POSITION_PLACEHOLDER: &str = ":id";
pub const DEFAULT_ARCHIVE_EXT: &str = "zip";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    Loose,
    Archive { extension: String },
}

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub prefix: String,
    pub mode: OutputMode,
    pub quality: Quality,
}

impl BatchRequest {
    pub fn target_for(&self, position: usize, chapter: &Chapter) -> UnitTarget {
        let prefix = expand_prefix(&self.prefix, position);
        match &self.mode {
            OutputMode::Loose => UnitTarget::Directory(Utf8PathBuf::from(format!(
                "{prefix}{}",
                chapter.name
            ))),
            OutputMode::Archive { extension } => {
                let extension = if extension.is_empty() {
                    DEFAULT_ARCHIVE_EXT
                } else {
                    extension.as_str()
                };
                UnitTarget::Archive(Utf8PathBuf::from(format!(
                    "{prefix}{}.{extension}",
                    chapter.name
                )))
            }
        }
    }
}

pub fn expand_prefix(prefix: &str, position: usize) -> String {
    prefix.replace(POSITION_PLACEHOLDER, &format!("{position:04}"))
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    pub position: usize,
    pub name: String,
    pub pages: usize,
    pub error: Option<String>,
}

impl UnitOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<UnitOutcome>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(UnitOutcome::is_success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_success())
    }
}

pub struct BatchDownloader<F: ResourceFetcher, P: PageSource> {
    units: UnitDownloader<F>,
    pages: Arc<P>,
    config: EngineConfig,
}

impl<F, P> BatchDownloader<F, P>
where
    F: ResourceFetcher + 'static,
    P: PageSource + 'static,
{
    pub fn new(fetcher: Arc<F>, pages: Arc<P>, config: EngineConfig) -> Self {
        Self {
            units: UnitDownloader::new(fetcher, config.stall_timeout),
            pages,
            config,
        }
    }

    pub fn run(&self, chapters: &[Chapter], request: &BatchRequest) -> BatchReport {
        if chapters.is_empty() {
            info!("chapter list is empty, nothing to download");
            return BatchReport::default();
        }

        let throttle = chapters.len() > self.config.delay_threshold;
        let mut admitted: u64 = 0;
        let mut in_flight: Vec<InFlight> = Vec::new();
        let mut outcomes = Vec::with_capacity(chapters.len());

        for (position, chapter) in chapters.iter().enumerate() {
            let weight = chapter.weight();
            // Wait for everything in flight before exceeding the page budget.
            if admitted + weight > self.config.page_budget {
                debug!(
                    in_flight = in_flight.len(),
                    admitted, "page budget reached, waiting for running chapters"
                );
                drain(&mut in_flight, &mut outcomes);
                admitted = 0;
            }
            admitted += weight;

            let target = request.target_for(position, chapter);
            in_flight.push(self.launch(position, chapter.clone(), target, request.quality));

            if throttle {
                thread::sleep(self.config.launch_delay);
            }
        }

        drain(&mut in_flight, &mut outcomes);
        outcomes.sort_by_key(|outcome| outcome.position);
        BatchReport { outcomes }
    }

    fn launch(
        &self,
        position: usize,
        chapter: Chapter,
        target: UnitTarget,
        quality: Quality,
    ) -> InFlight {
        let units = self.units.clone();
        let pages = Arc::clone(&self.pages);
        let name = chapter.name.clone();

        let spawned = thread::Builder::new()
            .name(format!("chapter-{position:04}"))
            .spawn(move || {
                let result = pages.page_urls(&chapter, quality).and_then(|urls| {
                    units.download(&Unit::new(chapter.name.clone(), urls), &target)
                });
                report(position, &chapter.name, result)
            });

        match spawned {
            Ok(handle) => InFlight::Running {
                position,
                name,
                handle,
            },
            Err(err) => InFlight::Finished(report(
                position,
                &name,
                Err(MdexError::Spawn {
                    unit: name.clone(),
                    message: err.to_string(),
                }),
            )),
        }
    }
}

enum InFlight {
    Running {
        position: usize,
        name: String,
        handle: JoinHandle<UnitOutcome>,
    },
    Finished(UnitOutcome),
}

fn report(position: usize, name: &str, result: Result<usize, MdexError>) -> UnitOutcome {
    match result {
        Ok(pages) => {
            info!(chapter = %name, pages, "chapter downloaded");
            UnitOutcome {
                position,
                name: name.to_string(),
                pages,
                error: None,
            }
        }
        Err(err) => {
            warn!(chapter = %name, error = %err, "chapter is not downloaded completely");
            UnitOutcome {
                position,
                name: name.to_string(),
                pages: 0,
                error: Some(err.to_string()),
            }
        }
    }
}

fn drain(in_flight: &mut Vec<InFlight>, outcomes: &mut Vec<UnitOutcome>) {
    for unit in in_flight.drain(..) {
        let outcome = match unit {
            InFlight::Finished(outcome) => outcome,
            InFlight::Running {
                position,
                name,
                handle,
            } => handle.join().unwrap_or_else(|_| {
                warn!(chapter = %name, "chapter worker panicked");
                UnitOutcome {
                    position,
                    name,
                    pages: 0,
                    error: Some("chapter worker panicked".to_string()),
                }
            }),
        };
        outcomes.push(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_placeholder_uses_position() {
        assert_eq!(expand_prefix("out/:id_ch_", 7), "out/0007_ch_");
        assert_eq!(expand_prefix("chapter_", 7), "chapter_");
    }

    #[test]
    fn targets_follow_mode() {
        let chapter = Chapter::new("id", "12.5", 20);
        let loose = BatchRequest {
            prefix: "manga/chapter_".to_string(),
            mode: OutputMode::Loose,
            quality: Quality::DataSaver,
        };
        assert_eq!(
            loose.target_for(0, &chapter),
            UnitTarget::Directory(Utf8PathBuf::from("manga/chapter_12.5"))
        );

        let archive = BatchRequest {
            mode: OutputMode::Archive {
                extension: String::new(),
            },
            ..loose
        };
        assert_eq!(
            archive.target_for(0, &chapter),
            UnitTarget::Archive(Utf8PathBuf::from("manga/chapter_12.5.zip"))
        );
    }
}
