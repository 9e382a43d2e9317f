use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::archive::ArchiveSink;
use crate::domain::Unit;
use crate::error::MdexError;
use crate::fetch::{Payload, ResourceFetcher};
use crate::fs_util;

pub const PAGE_PREFIX: &str = "page_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitTarget {
    Directory(Utf8PathBuf),
    Archive(Utf8PathBuf),
}

impl UnitTarget {
    pub fn path(&self) -> &Utf8Path {
        match self {
            UnitTarget::Directory(path) | UnitTarget::Archive(path) => path,
        }
    }
}

pub fn page_file_name(index: usize, extension: &str) -> String {
    format!("{PAGE_PREFIX}{index:02}.{extension}")
}

pub struct UnitDownloader<F: ResourceFetcher> {
    fetcher: Arc<F>,
    stall_timeout: Duration,
}

impl<F: ResourceFetcher> Clone for UnitDownloader<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            stall_timeout: self.stall_timeout,
        }
    }
}

impl<F: ResourceFetcher + 'static> UnitDownloader<F> {
    pub fn new(fetcher: Arc<F>, stall_timeout: Duration) -> Self {
        Self {
            fetcher,
            stall_timeout,
        }
    }

    pub fn download(&self, unit: &Unit, target: &UnitTarget) -> Result<usize, MdexError> {
        if unit.urls.is_empty() {
            return Err(MdexError::EmptyUnit(unit.name.clone()));
        }
        debug!(chapter = %unit.name, pages = unit.urls.len(), target = %target.path(), "starting chapter");

        match target {
            UnitTarget::Directory(dir) => self.download_to_dir(unit, dir),
            UnitTarget::Archive(path) => self.download_to_archive(unit, path),
        }
    }

    fn download_to_dir(&self, unit: &Unit, dir: &Utf8Path) -> Result<usize, MdexError> {
        let (tx, rx) = mpsc::channel::<Result<(), MdexError>>();
        for (index, url) in unit.urls.iter().enumerate() {
            let tx = tx.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let url = url.clone();
            let dir = dir.to_path_buf();
            spawn_page(unit, index, move || {
                let result = fetcher.fetch(&url).and_then(|mut payload| {
                    let path = dir.join(page_file_name(index, &payload.extension));
                    fs_util::write_stream(&path, &mut payload.body).map(|_| ())
                });
                let _ = tx.send(result);
            })?;
        }
        drop(tx);

        let total = unit.urls.len();
        for _ in 0..total {
            self.next_result(&rx, unit)??;
        }
        Ok(total)
    }

    fn download_to_archive(&self, unit: &Unit, path: &Utf8Path) -> Result<usize, MdexError> {
        let mut sink = ArchiveSink::create(path)?;

        let (tx, rx) = mpsc::channel::<(usize, Result<Payload, MdexError>)>();
        let mut spawned = Ok(());
        for (index, url) in unit.urls.iter().enumerate() {
            let tx = tx.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let url = url.clone();
            spawned = spawn_page(unit, index, move || {
                let _ = tx.send((index, fetcher.fetch(&url)));
            });
            if spawned.is_err() {
                break;
            }
        }
        drop(tx);

        let collected = spawned.and_then(|()| self.collect_into(&mut sink, &rx, unit));
        // Finalise even on failure so the entries written so far stay readable.
        let finished = sink.finish();
        let written = collected?;
        finished?;
        Ok(written)
    }

    fn collect_into(
        &self,
        sink: &mut ArchiveSink,
        rx: &Receiver<(usize, Result<Payload, MdexError>)>,
        unit: &Unit,
    ) -> Result<usize, MdexError> {
        for _ in 0..unit.urls.len() {
            let (index, result) = self.next_result(rx, unit)?;
            let mut payload = result?;
            sink.append(&page_file_name(index, &payload.extension), &mut payload.body)?;
        }
        Ok(sink.entries())
    }

    // The window restarts on every received result.
    fn next_result<T>(&self, rx: &Receiver<T>, unit: &Unit) -> Result<T, MdexError> {
        match rx.recv_timeout(self.stall_timeout) {
            Ok(message) => Ok(message),
            Err(RecvTimeoutError::Timeout) => Err(MdexError::Timeout {
                unit: unit.name.clone(),
                window_ms: self.stall_timeout.as_millis(),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(MdexError::WorkerLost(unit.name.clone())),
        }
    }
}

fn spawn_page<W>(unit: &Unit, index: usize, work: W) -> Result<(), MdexError>
where
    W: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(format!("page-{index:02}"))
        .spawn(work)
        .map(|_| ())
        .map_err(|err| MdexError::Spawn {
            unit: unit.name.clone(),
            message: err.to_string(),
        })
}
