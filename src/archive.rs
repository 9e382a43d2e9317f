use std::fs;
use std::io::{self, Read};

use camino::{Utf8Path, Utf8PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::MdexError;
use crate::fs_util;

// Owned by the collecting thread: `ZipWriter` takes one entry at a time.
pub struct ArchiveSink {
    path: Utf8PathBuf,
    writer: ZipWriter<fs::File>,
    entries: usize,
}

impl ArchiveSink {
    pub fn create(path: &Utf8Path) -> Result<Self, MdexError> {
        fs_util::ensure_parent_dir(path)?;
        let file = fs::File::create(path.as_std_path())
            .map_err(|err| MdexError::Filesystem(format!("create {path}: {err}")))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: ZipWriter::new(file),
            entries: 0,
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn append(&mut self, name: &str, body: &mut dyn Read) -> Result<u64, MdexError> {
        // Pages are already compressed images.
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        self.writer
            .start_file(name, options)
            .map_err(|err| MdexError::Filesystem(format!("{}: {name}: {err}", self.path)))?;
        let written = io::copy(body, &mut self.writer)
            .map_err(|err| MdexError::Filesystem(format!("{}: {name}: {err}", self.path)))?;
        self.entries += 1;
        Ok(written)
    }

    pub fn finish(self) -> Result<usize, MdexError> {
        let path = self.path;
        self.writer
            .finish()
            .map_err(|err| MdexError::Filesystem(format!("finish {path}: {err}")))?;
        Ok(self.entries)
    }
}

pub fn entry_names(path: &Utf8Path) -> Result<Vec<String>, MdexError> {
    let file = fs::File::open(path.as_std_path())
        .map_err(|err| MdexError::Filesystem(format!("open zip {path}: {err}")))?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| MdexError::Filesystem(err.to_string()))?;

    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| MdexError::Filesystem(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        io::copy(&mut entry, &mut io::sink())
            .map_err(|err| MdexError::Filesystem(err.to_string()))?;
        names.push(entry.name().to_string());
    }
    Ok(names)
}
