// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading the run configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read sources file {path}: {source}")]
    SourcesUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when fetching or parsing RSS feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for feed {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to read feed file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse RSS feed: {0}")]
    ParseFailed(#[from] rss::Error),

    #[error("Feed is missing required field {field}")]
    MissingField { field: &'static str },

    #[error("Failed to parse date '{date_str}': {reason}")]
    InvalidDate { date_str: String, reason: String },
}

/// Errors that can occur during episode downloads
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors from creating the download directory layout
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the seen-record file
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to create seen-record file {path}: {source}")]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read seen-record file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append to seen-record file {path}: {source}")]
    AppendFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level errors for sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Filesystem error: {0}")]
    Storage(#[from] StorageError),

    #[error("Seen-record error: {0}")]
    State(#[from] StateError),
}

impl SyncError {
    /// Whether this error must abort the whole run instead of just one feed
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Config(_) | SyncError::State(_))
    }

    /// Short name of the error kind, used in per-failure log lines
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Config(_) => "ConfigError",
            SyncError::Feed(
                FeedError::FetchFailed { .. }
                | FeedError::HttpStatus { .. }
                | FeedError::FileReadFailed { .. },
            ) => "FeedFetchError",
            SyncError::Feed(_) => "FeedParseError",
            SyncError::Storage(_) => "FilesystemError",
            SyncError::State(_) => "SeenStoreError",
        }
    }
}
