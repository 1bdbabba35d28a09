// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use crate::feed::Episode;

/// Maximum length, in characters, of a channel directory name
const MAX_CHANNEL_DIR_LENGTH: usize = 64;

/// Extension given to every downloaded episode
const AUDIO_EXTENSION: &str = "mp3";

/// Directory name for a channel
///
/// Spaces and path separators become underscores and the result is cut to
/// 64 characters. A name made only of dots is turned into underscores so it
/// can never point at `.` or `..`.
pub fn channel_dir_name(channel_name: &str) -> String {
    let name: String = channel_name
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | '\0' => '_',
            c => c,
        })
        .take(MAX_CHANNEL_DIR_LENGTH)
        .collect();

    if name.chars().all(|c| c == '.') {
        name.replace('.', "_")
    } else {
        name
    }
}

/// Filename stem for an episode: its publish date as `YYYY-MM-DD`
///
/// The date is taken in the offset the feed published it with.
pub fn generate_filename_stem(episode: &Episode) -> String {
    episode
        .publish_date
        .date_naive()
        .to_string()
        .replace(' ', "_")
}

/// Generate a complete filename for an episode (with extension)
pub fn generate_filename(episode: &Episode) -> String {
    format!("{}.{}", generate_filename_stem(episode), AUDIO_EXTENSION)
}

/// First filename for an episode that is not already taken in `dir`
///
/// The plain `YYYY-MM-DD.mp3` is used when free; otherwise `_2`, `_3`, ...
/// is appended to the stem. Files from earlier runs are never overwritten by
/// a different episode published on the same date.
pub fn next_free_filename(dir: &Path, episode: &Episode) -> String {
    let stem = generate_filename_stem(episode);
    let mut filename = generate_filename(episode);
    let mut suffix = 1;

    while dir.join(&filename).exists() {
        suffix += 1;
        filename = format!("{stem}_{suffix}.{AUDIO_EXTENSION}");
    }

    filename
}
