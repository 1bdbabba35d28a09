// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

use crate::error::StateError;

/// Name of the seen-record file inside the download directory
pub const SEEN_RECORD_FILENAME: &str = "prev_downloaded_files.dat";

/// Identifier stored in the seen-record file for an enclosure URL
///
/// Lowercase hex MD5 of the URL's UTF-8 bytes. Only uniqueness matters here,
/// not cryptographic strength.
pub fn identifier_for(url: &str) -> String {
    let digest = Md5::digest(url.as_bytes());
    format!("{digest:x}")
}

/// Persistent record of enclosure URLs that were already downloaded
///
/// The backing file is append-only with one identifier per line. It is read
/// once on [`SeenStore::open`]; later lookups are served from memory.
#[derive(Debug)]
pub struct SeenStore {
    path: PathBuf,
    identifiers: HashSet<String>,
}

impl SeenStore {
    /// Open the seen-record at `path`, creating an empty file if there is none
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();

        if !path.exists() {
            std::fs::File::create(&path).map_err(|e| StateError::CreateFailed {
                path: path.clone(),
                source: e,
            })?;

            return Ok(Self {
                path,
                identifiers: HashSet::new(),
            });
        }

        let content = std::fs::read_to_string(&path).map_err(|e| StateError::ReadFailed {
            path: path.clone(),
            source: e,
        })?;

        let identifiers = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();

        Ok(Self { path, identifiers })
    }

    /// Whether the enclosure at `url` has been downloaded before
    pub fn contains(&self, url: &str) -> bool {
        self.identifiers.contains(&identifier_for(url))
    }

    /// Mark `url` as downloaded, appending its identifier to the backing file
    ///
    /// The in-memory set is only updated once the line is on disk.
    pub fn record(&mut self, url: &str) -> Result<(), StateError> {
        let id = identifier_for(url);
        if self.identifiers.contains(&id) {
            return Ok(());
        }

        let append_failed = |e| StateError::AppendFailed {
            path: self.path.clone(),
            source: e,
        };

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(append_failed)?;
        writeln!(file, "{id}").map_err(append_failed)?;

        self.identifiers.insert(id);
        Ok(())
    }

    /// Number of identifiers currently known
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
