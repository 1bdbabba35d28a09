mod fetch;
mod parse;

pub use fetch::{FeedSource, fetch_feed_bytes, is_url, load_feed, read_feed_file};
pub use parse::{Channel, Episode, parse_feed};
