// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::time::Duration;

use crate::state::SEEN_RECORD_FILENAME;

pub const DEFAULT_SOURCES_FILE: &str = "./sources.txt";
pub const DEFAULT_DOWNLOAD_DIR: &str = "./downloaded/";
pub const DEFAULT_MAX_EPISODES: usize = 5;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Settings for one sync run
///
/// Built once at startup and handed to the sync by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Text file listing one feed per line
    pub sources_file: PathBuf,
    /// How many of the newest episodes to keep per channel
    pub max_episodes_per_channel: usize,
    /// Root directory; one subdirectory per channel is created inside
    pub download_dir: PathBuf,
    /// Per-request timeout for feeds and enclosures
    pub http_timeout: Duration,
}

impl Config {
    /// Location of the seen-record file
    pub fn seen_record_path(&self) -> PathBuf {
        self.download_dir.join(SEEN_RECORD_FILENAME)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources_file: PathBuf::from(DEFAULT_SOURCES_FILE),
            max_episodes_per_channel: DEFAULT_MAX_EPISODES,
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}
