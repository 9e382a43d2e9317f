use std::fs;
use std::io::{self, BufWriter, Read, Write};

use camino::Utf8Path;

use crate::error::MdexError;

pub fn ensure_parent_dir(path: &Utf8Path) -> Result<(), MdexError> {
    if let Some(parent) = path.parent() {
        if !parent.as_str().is_empty() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| MdexError::Filesystem(format!("create {parent}: {err}")))?;
        }
    }
    Ok(())
}

pub fn write_stream(path: &Utf8Path, body: &mut dyn Read) -> Result<u64, MdexError> {
    ensure_parent_dir(path)?;
    let file = fs::File::create(path.as_std_path())
        .map_err(|err| MdexError::Filesystem(format!("create {path}: {err}")))?;
    let mut writer = BufWriter::new(file);
    let written = io::copy(body, &mut writer)
        .map_err(|err| MdexError::Filesystem(format!("write {path}: {err}")))?;
    writer
        .flush()
        .map_err(|err| MdexError::Filesystem(format!("flush {path}: {err}")))?;
    Ok(written)
}
