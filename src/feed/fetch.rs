// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use url::Url;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::parse::{Channel, parse_feed};

/// Where a feed document comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Remote(Url),
    File(PathBuf),
}

impl FeedSource {
    /// Interpret one line of the sources file
    ///
    /// `http://` and `https://` lines that parse as URLs are fetched over the
    /// network; anything else is treated as a path to a local RSS file.
    pub fn from_line(line: &str) -> Self {
        if is_url(line)
            && let Ok(url) = Url::parse(line)
        {
            return FeedSource::Remote(url);
        }
        FeedSource::File(PathBuf::from(line))
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedSource::Remote(url) => write!(f, "{url}"),
            FeedSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Fetch raw feed bytes from a URL (without parsing)
///
/// Anything but `200 OK` is an error.
pub async fn fetch_feed_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes, FeedError> {
    let response = client
        .get_bytes(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status != 200 {
        return Err(FeedError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    Ok(response.body)
}

/// Read raw feed bytes from a local file (without parsing)
pub fn read_feed_file(path: &Path) -> Result<Vec<u8>, FeedError> {
    std::fs::read(path).map_err(|e| FeedError::FileReadFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load and parse a feed from wherever it lives
pub async fn load_feed<C: HttpClient>(
    client: &C,
    source: &FeedSource,
) -> Result<Channel, FeedError> {
    match source {
        FeedSource::Remote(url) => {
            let bytes = fetch_feed_bytes(client, url.as_str()).await?;
            parse_feed(&bytes)
        }
        FeedSource::File(path) => {
            let bytes = read_feed_file(path)?;
            parse_feed(&bytes)
        }
    }
}

/// Determine if a string is a URL or a file path
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
