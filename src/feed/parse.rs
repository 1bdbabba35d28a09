// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset};
use tracing::warn;

use crate::error::FeedError;

/// Format used by RSS `pubDate` values, e.g. `Mon, 02 Jan 2023 15:04:05 +0000`
const PUB_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// A parsed podcast channel
#[derive(Debug, Clone)]
pub struct Channel {
    pub name: String,
    /// Episodes in feed order
    pub episodes: Vec<Episode>,
    /// Number of items that were skipped because a required field was missing
    pub rejected_items: usize,
}

/// Represents a single podcast episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub title: String,
    pub enclosure_url: String,
    pub description: String,
    pub publish_date: DateTime<FixedOffset>,
}

/// Parse RSS feed XML bytes into a Channel
///
/// Channel-level problems fail the whole feed. An item with no enclosure URL
/// or no usable `pubDate` is skipped with a warning and counted in
/// [`Channel::rejected_items`].
pub fn parse_feed(xml_bytes: &[u8]) -> Result<Channel, FeedError> {
    let channel = rss::Channel::read_from(xml_bytes)?;

    let name = channel.title().trim();
    if name.is_empty() {
        return Err(FeedError::MissingField {
            field: "channel/title",
        });
    }

    let mut episodes = Vec::with_capacity(channel.items().len());
    let mut rejected_items = 0;

    for item in channel.items() {
        match parse_episode(item) {
            Ok(episode) => episodes.push(episode),
            Err(e) => {
                warn!(
                    channel = name,
                    item = item.title().unwrap_or("<untitled>"),
                    "Skipping feed item: {e}"
                );
                rejected_items += 1;
            }
        }
    }

    Ok(Channel {
        name: name.to_string(),
        episodes,
        rejected_items,
    })
}

fn parse_episode(item: &rss::Item) -> Result<Episode, FeedError> {
    let title = item
        .title()
        .map(String::from)
        .unwrap_or_else(|| "Untitled Episode".to_string());

    let enclosure_url = item
        .enclosure()
        .map(|enclosure| enclosure.url().trim())
        .filter(|url| !url.is_empty())
        .ok_or(FeedError::MissingField {
            field: "item/enclosure[url]",
        })?;

    let date_str = item
        .pub_date()
        .map(str::trim)
        .filter(|date| !date.is_empty())
        .ok_or(FeedError::MissingField {
            field: "item/pubDate",
        })?;

    Ok(Episode {
        title,
        enclosure_url: enclosure_url.to_string(),
        description: item.description().map(String::from).unwrap_or_default(),
        publish_date: parse_pub_date(date_str)?,
    })
}

/// Parse a `pubDate`, falling back to full RFC 2822 for named zones like `GMT`
fn parse_pub_date(date_str: &str) -> Result<DateTime<FixedOffset>, FeedError> {
    DateTime::parse_from_str(date_str, PUB_DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc2822(date_str))
        .map_err(|e| FeedError::InvalidDate {
            date_str: date_str.to_string(),
            reason: e.to_string(),
        })
}
