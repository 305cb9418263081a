// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL file of serde records.
//!
//! Each record is one line of JSON. A file whose tail cannot be parsed (torn
//! write, disk corruption) is rotated to `.bak` on open and rewritten with the
//! records that precede the corruption.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur in log operations
#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) struct JsonlFile<T> {
    file: File,
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> JsonlFile<T> {
    /// Open or create the file and load every valid record.
    pub(crate) fn open(path: &Path) -> Result<(Self, Vec<T>), LogError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let (records, corrupt) = if path.exists() {
            Self::read_valid(path)?
        } else {
            (Vec::new(), false)
        };

        if corrupt {
            let bak_path = rotate_bak_path(path);
            warn!(
                path = %path.display(),
                bak = %bak_path.display(),
                valid_records = records.len(),
                "Corrupt log detected, rotating to .bak and preserving valid records",
            );
            fs::rename(path, &bak_path)?;
            write_atomic(path, &records)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok((
            Self {
                file,
                path: path.to_owned(),
                _record: PhantomData,
            },
            records,
        ))
    }

    /// Read records up to the first unparseable line.
    ///
    /// Returns `(records, corrupt)`.
    fn read_valid(path: &Path) -> Result<(Vec<T>, bool), LogError> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => return Ok((records, false)),
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => return Ok((records, true)),
                Err(e) => return Err(e.into()),
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str(trimmed) {
                Ok(record) => records.push(record),
                Err(_) => return Ok((records, true)),
            }
        }
    }

    /// Append one record and fsync.
    pub(crate) fn append(&mut self, record: &T) -> Result<(), LogError> {
        let mut bytes = serde_json::to_vec(record)?;
        bytes.push(b'\n');
        self.file.write_all(&bytes)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Replace the file contents with `records` (write to .tmp, then rename).
    pub(crate) fn rewrite(&mut self, records: &[T]) -> Result<(), LogError> {
        write_atomic(&self.path, records)?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }
}

fn write_atomic<T: Serialize>(path: &Path, records: &[T]) -> Result<(), LogError> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut tmp = File::create(&tmp_path)?;
        for record in records {
            let mut bytes = serde_json::to_vec(record)?;
            bytes.push(b'\n');
            tmp.write_all(&bytes)?;
        }
        tmp.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
/// The oldest backup is removed when the limit is reached.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "jsonl_tests.rs"]
mod tests;
