// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use crate::error::ConfigError;
use crate::feed::FeedSource;

/// Read the list of feeds from the sources file
pub fn read_sources(path: &Path) -> Result<Vec<FeedSource>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SourcesUnreadable {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(parse_sources(&content))
}

/// One feed per line; surrounding whitespace is ignored, as are blank lines
/// and lines starting with `#`
pub fn parse_sources(content: &str) -> Vec<FeedSource> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(FeedSource::from_line)
        .collect()
}
