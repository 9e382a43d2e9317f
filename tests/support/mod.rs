#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use mdex_dl::domain::{Chapter, Quality};
use mdex_dl::error::MdexError;
use mdex_dl::fetch::{Payload, ResourceFetcher};
use mdex_dl::mangadex::PageSource;

#[derive(Debug, Clone)]
pub enum Reply {
    Image { extension: &'static str, body: Vec<u8> },
    Status(&'static str),
}

#[derive(Debug, Clone)]
pub struct Script {
    pub delay: Duration,
    pub reply: Reply,
}

impl Script {
    pub fn image(delay_ms: u64, extension: &'static str) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            reply: Reply::Image {
                extension,
                body: extension.as_bytes().to_vec(),
            },
        }
    }

    pub fn status(delay_ms: u64, status: &'static str) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            reply: Reply::Status(status),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Finish,
}

/// In-memory fetcher that sleeps and answers according to a per-URL script.
pub struct ScriptedFetcher {
    scripts: HashMap<String, Script>,
    completed: AtomicUsize,
    events: Mutex<Vec<(String, Phase, Instant)>>,
}

impl ScriptedFetcher {
    pub fn new<I, S>(scripts: I) -> Self
    where
        I: IntoIterator<Item = (S, Script)>,
        S: Into<String>,
    {
        Self {
            scripts: scripts
                .into_iter()
                .map(|(url, script)| (url.into(), script))
                .collect(),
            completed: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn first(&self, prefix: &str, phase: Phase) -> Option<Instant> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(url, p, _)| url.starts_with(prefix) && *p == phase)
            .map(|(_, _, at)| *at)
            .min()
    }

    pub fn last(&self, prefix: &str, phase: Phase) -> Option<Instant> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(url, p, _)| url.starts_with(prefix) && *p == phase)
            .map(|(_, _, at)| *at)
            .max()
    }

    fn record(&self, url: &str, phase: Phase) {
        self.events
            .lock()
            .unwrap()
            .push((url.to_string(), phase, Instant::now()));
    }
}

impl ResourceFetcher for ScriptedFetcher {
    fn fetch(&self, url: &str) -> Result<Payload, MdexError> {
        self.record(url, Phase::Start);
        let script = self.scripts.get(url).cloned().unwrap_or(Script {
            delay: Duration::ZERO,
            reply: Reply::Status("404 Not Found"),
        });
        thread::sleep(script.delay);
        self.record(url, Phase::Finish);
        self.completed.fetch_add(1, Ordering::SeqCst);

        match script.reply {
            Reply::Image { extension, body } => Ok(Payload {
                extension: extension.to_string(),
                body: Box::new(std::io::Cursor::new(body)),
            }),
            Reply::Status(status) => Err(MdexError::Remote {
                url: url.to_string(),
                status: status.to_string(),
            }),
        }
    }
}

/// Page source returning fixed URL lists keyed by chapter id.
pub struct StaticPages {
    pages: HashMap<String, Vec<String>>,
}

impl StaticPages {
    pub fn new<I>(pages: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Vec<&'static str>)>,
    {
        Self {
            pages: pages
                .into_iter()
                .map(|(id, urls)| (id.to_string(), urls.into_iter().map(String::from).collect()))
                .collect(),
        }
    }
}

impl PageSource for StaticPages {
    fn page_urls(&self, chapter: &Chapter, _quality: Quality) -> Result<Vec<String>, MdexError> {
        self.pages
            .get(&chapter.id)
            .cloned()
            .ok_or_else(|| MdexError::MangadexStatus {
                status: 404,
                message: format!("no at-home server for {}", chapter.id),
            })
    }
}

pub fn utf8_tempdir() -> (tempfile::TempDir, camino::Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = camino::Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}
