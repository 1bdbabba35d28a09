// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::feed::Episode;

/// Pick the `max_count` most recent episodes, newest first
///
/// Episodes published at the same instant keep their feed order.
pub fn select_episodes(mut episodes: Vec<Episode>, max_count: usize) -> Vec<Episode> {
    // sort_by is stable
    episodes.sort_by(|a, b| b.publish_date.cmp(&a.publish_date));
    episodes.truncate(max_count);
    episodes
}
