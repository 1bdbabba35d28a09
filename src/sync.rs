// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::episode::{
    DownloadContext, channel_dir_name, download_episode, next_free_filename, select_episodes,
};
use crate::error::{StorageError, SyncError};
use crate::feed::{FeedSource, load_feed};
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::sources::read_sources;
use crate::state::SeenStore;

/// Outcome of synchronizing one feed
#[derive(Debug, Clone, Default)]
pub struct FeedReport {
    /// The sources-file entry this report is for
    pub source: String,
    pub channel: String,
    /// Episodes parsed from the feed, before selection
    pub total_episodes: usize,
    /// Feed items dropped for missing or unparsable required fields
    pub rejected_items: usize,
    pub downloaded: usize,
    /// Selected episodes that were downloaded on an earlier run
    pub skipped: usize,
    /// Episodes whose download failed (title, error message)
    pub failed_episodes: Vec<(String, String)>,
}

impl FeedReport {
    pub fn failed(&self) -> usize {
        self.failed_episodes.len()
    }
}

/// Result of a sync run over every configured feed
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub feeds: Vec<FeedReport>,
    /// Feeds that could not be synchronized (source, error message)
    pub failed_feeds: Vec<(String, String)>,
}

impl SyncReport {
    pub fn downloaded(&self) -> usize {
        self.feeds.iter().map(|f| f.downloaded).sum()
    }

    pub fn skipped(&self) -> usize {
        self.feeds.iter().map(|f| f.skipped).sum()
    }

    pub fn failed(&self) -> usize {
        self.feeds.iter().map(FeedReport::failed).sum()
    }

    /// True when every feed was fetched and parsed, even if some episode
    /// downloads failed
    pub fn all_feeds_synced(&self) -> bool {
        self.failed_feeds.is_empty()
    }
}

/// Synchronize every feed listed in the sources file
///
/// This is the main entry point for the library. It:
/// 1. Reads the sources file
/// 2. Creates the download directory and opens the seen-record in it
/// 3. Syncs each feed in turn, see [`sync_sources`]
pub async fn run<C: HttpClient>(
    client: &C,
    config: &Config,
    reporter: SharedProgressReporter,
) -> Result<SyncReport, SyncError> {
    let sources = read_sources(&config.sources_file)?;
    info!(
        sources_file = %config.sources_file.display(),
        feeds = sources.len(),
        "Loaded feed sources"
    );

    std::fs::create_dir_all(&config.download_dir).map_err(|e| {
        StorageError::CreateDirectoryFailed {
            path: config.download_dir.clone(),
            source: e,
        }
    })?;

    let mut store = SeenStore::open(config.seen_record_path())?;
    debug!(
        path = %store.path().display(),
        known = store.len(),
        "Opened seen-record"
    );

    sync_sources(client, &sources, config, &mut store, reporter).await
}

/// Synchronize a list of feeds, one after the other
///
/// A feed that cannot be fetched, parsed or given a directory is logged and
/// recorded in [`SyncReport::failed_feeds`], and the run moves on to the next
/// feed. Seen-record failures abort the run.
pub async fn sync_sources<C: HttpClient>(
    client: &C,
    sources: &[FeedSource],
    config: &Config,
    store: &mut SeenStore,
    reporter: SharedProgressReporter,
) -> Result<SyncReport, SyncError> {
    let mut report = SyncReport::default();

    for source in sources {
        match sync_feed(client, source, config, store, &reporter).await {
            Ok(feed_report) => report.feeds.push(feed_report),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(feed = %source, kind = e.kind(), "Feed sync failed: {e}");
                reporter.report(ProgressEvent::FeedFailed {
                    source: source.to_string(),
                    error: e.to_string(),
                });
                report.failed_feeds.push((source.to_string(), e.to_string()));
            }
        }
    }

    reporter.report(ProgressEvent::SyncCompleted {
        downloaded_count: report.downloaded(),
        skipped_count: report.skipped(),
        failed_count: report.failed(),
        failed_feeds: report.failed_feeds.len(),
    });

    Ok(report)
}

/// Synchronize a single feed into its channel directory
///
/// Episode download failures are recorded in the returned report and leave
/// the episode unmarked, so the next run tries again.
pub async fn sync_feed<C: HttpClient>(
    client: &C,
    source: &FeedSource,
    config: &Config,
    store: &mut SeenStore,
    reporter: &SharedProgressReporter,
) -> Result<FeedReport, SyncError> {
    reporter.report(ProgressEvent::FetchingFeed {
        source: source.to_string(),
    });

    let channel = load_feed(client, source).await?;

    let channel_dir = config.download_dir.join(channel_dir_name(&channel.name));
    std::fs::create_dir_all(&channel_dir).map_err(|e| StorageError::CreateDirectoryFailed {
        path: channel_dir.clone(),
        source: e,
    })?;

    let mut report = FeedReport {
        source: source.to_string(),
        channel: channel.name.clone(),
        total_episodes: channel.episodes.len(),
        rejected_items: channel.rejected_items,
        ..Default::default()
    };

    let selected = select_episodes(channel.episodes, config.max_episodes_per_channel);
    let total_to_download = selected.len();

    reporter.report(ProgressEvent::FeedParsed {
        channel: channel.name.clone(),
        total_episodes: report.total_episodes,
        selected: total_to_download,
    });
    info!(
        channel = %channel.name,
        episodes = report.total_episodes,
        selected = total_to_download,
        "Syncing channel"
    );

    for (episode_index, episode) in selected.iter().enumerate() {
        if store.contains(&episode.enclosure_url) {
            debug!(episode = %episode.title, url = %episode.enclosure_url, "Already downloaded");
            reporter.report(ProgressEvent::EpisodeSkipped {
                episode_title: episode.title.clone(),
            });
            report.skipped += 1;
            continue;
        }

        let output_path = channel_dir.join(next_free_filename(&channel_dir, episode));
        let context = DownloadContext {
            episode_index,
            total_to_download,
        };

        match download_episode(client, episode, &output_path, &context, reporter).await {
            Ok(bytes) => {
                store.record(&episode.enclosure_url)?;
                info!(
                    channel = %channel.name,
                    episode = %episode.title,
                    path = %output_path.display(),
                    bytes,
                    "Downloaded episode"
                );
                report.downloaded += 1;
            }
            Err(e) => {
                warn!(
                    channel = %channel.name,
                    episode = %episode.title,
                    kind = "EnclosureFetchError",
                    "Episode download failed: {e}"
                );
                reporter.report(ProgressEvent::DownloadFailed {
                    episode_title: episode.title.clone(),
                    error: e.to_string(),
                });
                report
                    .failed_episodes
                    .push((episode.title.clone(), e.to_string()));
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use crate::error::StateError;
    use crate::http::{BufferedResponse, ByteStream, HttpResponse};
    use crate::progress::{NoopReporter, ProgressReporter};
    use crate::state::identifier_for;
    use async_trait::async_trait;
    use bytes::Bytes;
    use tempfile::tempdir;

    /// Serves canned responses by URL and remembers every request
    #[derive(Default)]
    struct MockHttpClient {
        routes: HashMap<String, (u16, Vec<u8>)>,
        requests: Mutex<Vec<String>>,
        /// Replaced by a directory on the first enclosure request
        break_path: Option<PathBuf>,
    }

    impl MockHttpClient {
        fn with(mut self, url: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
            self.routes.insert(url.to_string(), (status, body.into()));
            self
        }

        fn respond(&self, url: &str) -> (u16, Vec<u8>) {
            self.requests.lock().unwrap().push(url.to_string());
            self.routes
                .get(url)
                .cloned()
                .unwrap_or((404, b"Not Found".to_vec()))
        }

        fn requested(&self, url: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|u| *u == url)
                .count()
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, url: &str) -> Result<BufferedResponse, reqwest::Error> {
            let (status, body) = self.respond(url);
            Ok(BufferedResponse {
                status,
                body: Bytes::from(body),
            })
        }

        async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
            if let Some(path) = &self.break_path
                && path.is_file()
            {
                std::fs::remove_file(path).unwrap();
                std::fs::create_dir(path).unwrap();
            }

            let (status, data) = self.respond(url);
            let len = data.len() as u64;

            let stream: ByteStream =
                Box::pin(futures::stream::once(async move { Ok(Bytes::from(data)) }));

            Ok(HttpResponse {
                status,
                content_length: Some(len),
                body: stream,
            })
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    const FEED_URL: &str = "https://example.com/feed.xml";

    fn feed(title: &str, items: &[(&str, &str)]) -> String {
        let items: String = items
            .iter()
            .map(|(url, date)| {
                format!(
                    r#"<item>
      <title>{url}</title>
      <pubDate>{date}</pubDate>
      <enclosure url="{url}" type="audio/mpeg"/>
    </item>
    "#
                )
            })
            .collect();

        format!(
            r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>{title}</title>
    <description>Test</description>
    {items}
  </channel>
</rss>"#
        )
    }

    fn my_show_feed() -> String {
        feed(
            "My Show",
            &[
                ("https://example.com/jan1.mp3", "Sun, 01 Jan 2023 09:00:00 +0000"),
                ("https://example.com/jan3.mp3", "Tue, 03 Jan 2023 09:00:00 +0000"),
                ("https://example.com/jan2.mp3", "Mon, 02 Jan 2023 09:00:00 +0000"),
            ],
        )
    }

    fn my_show_client() -> MockHttpClient {
        MockHttpClient::default()
            .with(FEED_URL, 200, my_show_feed())
            .with("https://example.com/jan1.mp3", 200, "audio jan1")
            .with("https://example.com/jan2.mp3", 200, "audio jan2")
            .with("https://example.com/jan3.mp3", 200, "audio jan3")
    }

    fn config_for(dir: &Path, max: usize) -> Config {
        Config {
            sources_file: dir.join("sources.txt"),
            max_episodes_per_channel: max,
            download_dir: dir.join("downloaded"),
            ..Default::default()
        }
    }

    fn write_sources(config: &Config, lines: &[&str]) {
        std::fs::write(&config.sources_file, lines.join("\n")).unwrap();
    }

    #[tokio::test]
    async fn downloads_newest_episodes_into_channel_dir() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), 2);
        write_sources(&config, &[FEED_URL]);
        let client = my_show_client();

        let report = run(&client, &config, NoopReporter::shared()).await.unwrap();

        assert_eq!(report.downloaded(), 2);
        assert!(report.all_feeds_synced());

        let show_dir = config.download_dir.join("My_Show");
        assert_eq!(
            std::fs::read(show_dir.join("2023-01-03.mp3")).unwrap(),
            b"audio jan3"
        );
        assert_eq!(
            std::fs::read(show_dir.join("2023-01-02.mp3")).unwrap(),
            b"audio jan2"
        );
        assert!(!show_dir.join("2023-01-01.mp3").exists());
        assert_eq!(client.requested("https://example.com/jan1.mp3"), 0);

        let seen = std::fs::read_to_string(config.seen_record_path()).unwrap();
        assert_eq!(
            seen,
            format!(
                "{}\n{}\n",
                identifier_for("https://example.com/jan3.mp3"),
                identifier_for("https://example.com/jan2.mp3")
            )
        );
    }

    #[tokio::test]
    async fn second_run_downloads_nothing() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), 5);
        write_sources(&config, &[FEED_URL]);
        let client = my_show_client();

        let first = run(&client, &config, NoopReporter::shared()).await.unwrap();
        assert_eq!(first.downloaded(), 3);

        let second = run(&client, &config, NoopReporter::shared()).await.unwrap();
        assert_eq!(second.downloaded(), 0);
        assert_eq!(second.skipped(), 3);

        for url in [
            "https://example.com/jan1.mp3",
            "https://example.com/jan2.mp3",
            "https://example.com/jan3.mp3",
        ] {
            assert_eq!(client.requested(url), 1);
        }
    }

    #[tokio::test]
    async fn seen_enclosure_is_not_requested() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), 5);
        std::fs::create_dir_all(&config.download_dir).unwrap();
        std::fs::write(
            config.seen_record_path(),
            format!("{}\n", identifier_for("https://example.com/jan2.mp3")),
        )
        .unwrap();

        let client = my_show_client();
        let mut store = SeenStore::open(config.seen_record_path()).unwrap();
        let source = FeedSource::from_line(FEED_URL);

        let report = sync_feed(
            &client,
            &source,
            &config,
            &mut store,
            &NoopReporter::shared(),
        )
        .await
        .unwrap();

        assert_eq!(report.downloaded, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(client.requested("https://example.com/jan2.mp3"), 0);
        assert!(
            !config
                .download_dir
                .join("My_Show")
                .join("2023-01-02.mp3")
                .exists()
        );
    }

    #[tokio::test]
    async fn zero_max_downloads_nothing() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), 0);
        write_sources(&config, &[FEED_URL]);
        let client = my_show_client();

        let report = run(&client, &config, NoopReporter::shared()).await.unwrap();

        assert_eq!(report.downloaded(), 0);
        assert_eq!(report.feeds[0].total_episodes, 3);
        assert_eq!(client.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_channel_is_a_no_op() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), 5);
        write_sources(&config, &[FEED_URL]);
        let client = MockHttpClient::default().with(FEED_URL, 200, feed("Quiet Show", &[]));

        let report = run(&client, &config, NoopReporter::shared()).await.unwrap();

        assert_eq!(report.feeds.len(), 1);
        assert_eq!(report.downloaded(), 0);
        assert_eq!(report.failed(), 0);
        assert_eq!(client.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_feed_does_not_stop_other_feeds() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), 2);
        let missing = "https://example.com/missing.xml";
        write_sources(&config, &[missing, FEED_URL]);
        let client = my_show_client();

        let report = run(&client, &config, NoopReporter::shared()).await.unwrap();

        assert_eq!(report.failed_feeds.len(), 1);
        assert_eq!(report.failed_feeds[0].0, missing);
        assert!(report.failed_feeds[0].1.contains("404"));
        assert!(!report.all_feeds_synced());

        assert_eq!(report.feeds.len(), 1);
        assert_eq!(report.feeds[0].channel, "My Show");
        assert_eq!(report.downloaded(), 2);
    }

    #[tokio::test]
    async fn malformed_feed_is_reported_and_skipped() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), 2);
        let broken = "https://example.com/broken.xml";
        write_sources(&config, &[broken, FEED_URL]);
        let client = my_show_client().with(broken, 200, "<rss><channel>");

        let report = run(&client, &config, NoopReporter::shared()).await.unwrap();

        assert_eq!(report.failed_feeds.len(), 1);
        assert_eq!(report.downloaded(), 2);
    }

    #[tokio::test]
    async fn failed_enclosure_is_retried_next_run() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), 1);
        write_sources(&config, &[FEED_URL]);
        let client = my_show_client().with("https://example.com/jan3.mp3", 500, "oops");

        let report = run(&client, &config, NoopReporter::shared()).await.unwrap();

        assert_eq!(report.downloaded(), 0);
        assert_eq!(report.failed(), 1);
        assert!(report.all_feeds_synced());
        assert!(
            !config
                .download_dir
                .join("My_Show")
                .join("2023-01-03.mp3")
                .exists()
        );
        let store = SeenStore::open(config.seen_record_path()).unwrap();
        assert!(!store.contains("https://example.com/jan3.mp3"));

        let client = my_show_client();
        let report = run(&client, &config, NoopReporter::shared()).await.unwrap();
        assert_eq!(report.downloaded(), 1);
        assert_eq!(client.requested("https://example.com/jan3.mp3"), 1);
    }

    #[tokio::test]
    async fn same_day_episodes_get_distinct_files() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), 5);
        write_sources(&config, &[FEED_URL]);
        let client = MockHttpClient::default()
            .with(
                FEED_URL,
                200,
                feed(
                    "Daily",
                    &[
                        ("https://example.com/am.mp3", "Tue, 03 Jan 2023 08:00:00 +0000"),
                        ("https://example.com/pm.mp3", "Tue, 03 Jan 2023 18:00:00 +0000"),
                    ],
                ),
            )
            .with("https://example.com/am.mp3", 200, "morning")
            .with("https://example.com/pm.mp3", 200, "evening");

        let report = run(&client, &config, NoopReporter::shared()).await.unwrap();
        assert_eq!(report.downloaded(), 2);

        let daily = config.download_dir.join("Daily");
        assert_eq!(std::fs::read(daily.join("2023-01-03.mp3")).unwrap(), b"evening");
        assert_eq!(std::fs::read(daily.join("2023-01-03_2.mp3")).unwrap(), b"morning");
    }

    #[tokio::test]
    async fn local_file_sources_are_read_from_disk() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), 5);
        let feed_path = dir.path().join("local.xml");
        std::fs::write(
            &feed_path,
            feed(
                "Local",
                &[("https://example.com/local.mp3", "Mon, 02 Jan 2023 09:00:00 +0000")],
            ),
        )
        .unwrap();
        write_sources(&config, &[feed_path.to_str().unwrap()]);
        let client = MockHttpClient::default().with("https://example.com/local.mp3", 200, "x");

        let report = run(&client, &config, NoopReporter::shared()).await.unwrap();

        assert_eq!(report.downloaded(), 1);
        assert!(config.download_dir.join("Local/2023-01-02.mp3").exists());
    }

    #[tokio::test]
    async fn missing_sources_file_is_fatal() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), 5);
        let client = MockHttpClient::default();

        let result = run(&client, &config, NoopReporter::shared()).await;
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[tokio::test]
    async fn unreadable_seen_record_is_fatal() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), 5);
        write_sources(&config, &[FEED_URL]);
        // A directory where the seen-record file should be
        std::fs::create_dir_all(config.seen_record_path()).unwrap();
        let client = my_show_client();

        let result = run(&client, &config, NoopReporter::shared()).await;
        assert!(matches!(result, Err(SyncError::State(_))));
        assert!(client.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_day_episode_from_later_run_keeps_earlier_file() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), 5);
        write_sources(&config, &[FEED_URL]);
        let morning = ("https://example.com/am.mp3", "Tue, 03 Jan 2023 08:00:00 +0000");
        let evening = ("https://example.com/pm.mp3", "Tue, 03 Jan 2023 18:00:00 +0000");

        let client = MockHttpClient::default()
            .with(FEED_URL, 200, feed("Daily", &[morning]))
            .with(morning.0, 200, "morning");
        let first = run(&client, &config, NoopReporter::shared()).await.unwrap();
        assert_eq!(first.downloaded(), 1);

        let client = MockHttpClient::default()
            .with(FEED_URL, 200, feed("Daily", &[evening, morning]))
            .with(morning.0, 200, "morning")
            .with(evening.0, 200, "evening");
        let second = run(&client, &config, NoopReporter::shared()).await.unwrap();
        assert_eq!(second.downloaded(), 1);
        assert_eq!(second.skipped(), 1);

        let daily = config.download_dir.join("Daily");
        assert_eq!(std::fs::read(daily.join("2023-01-03.mp3")).unwrap(), b"morning");
        assert_eq!(std::fs::read(daily.join("2023-01-03_2.mp3")).unwrap(), b"evening");
    }

    #[tokio::test]
    async fn seen_record_append_failure_aborts_run() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), 2);
        let other = "https://example.com/other.xml";
        write_sources(&config, &[FEED_URL, other]);
        let mut client = my_show_client().with(
            other,
            200,
            feed(
                "Other",
                &[("https://example.com/other.mp3", "Mon, 02 Jan 2023 09:00:00 +0000")],
            ),
        );
        client.break_path = Some(config.seen_record_path());

        let result = run(&client, &config, NoopReporter::shared()).await;

        assert!(matches!(
            result,
            Err(SyncError::State(StateError::AppendFailed { .. }))
        ));
        assert_eq!(client.requested("https://example.com/jan2.mp3"), 0);
        assert_eq!(client.requested(other), 0);
    }

    #[tokio::test]
    async fn reports_progress_events_for_each_step() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), 2);
        let missing = "https://example.com/missing.xml";
        write_sources(&config, &[FEED_URL, missing]);
        std::fs::create_dir_all(&config.download_dir).unwrap();
        std::fs::write(
            config.seen_record_path(),
            format!("{}\n", identifier_for("https://example.com/jan2.mp3")),
        )
        .unwrap();

        let recorder = Arc::new(RecordingReporter::default());
        let client = my_show_client();
        run(&client, &config, recorder.clone()).await.unwrap();

        let events = recorder.events.lock().unwrap();
        let kinds: Vec<&str> = events
            .iter()
            .filter(|e| !matches!(e, ProgressEvent::DownloadProgress { .. }))
            .map(|e| match e {
                ProgressEvent::FetchingFeed { .. } => "fetching",
                ProgressEvent::FeedParsed { .. } => "parsed",
                ProgressEvent::FeedFailed { .. } => "feed-failed",
                ProgressEvent::EpisodeSkipped { .. } => "skipped",
                ProgressEvent::DownloadStarting { .. } => "starting",
                ProgressEvent::DownloadProgress { .. } => "progress",
                ProgressEvent::DownloadCompleted { .. } => "completed",
                ProgressEvent::DownloadFailed { .. } => "failed",
                ProgressEvent::SyncCompleted { .. } => "done",
            })
            .collect();

        assert_eq!(
            kinds,
            [
                "fetching",
                "parsed",
                "starting",
                "completed",
                "skipped",
                "fetching",
                "feed-failed",
                "done"
            ]
        );

        match events.last() {
            Some(ProgressEvent::SyncCompleted {
                downloaded_count,
                skipped_count,
                failed_count,
                failed_feeds,
            }) => {
                assert_eq!(*downloaded_count, 1);
                assert_eq!(*skipped_count, 1);
                assert_eq!(*failed_count, 0);
                assert_eq!(*failed_feeds, 1);
            }
            other => panic!("Expected SyncCompleted last, got {other:?}"),
        }
    }
}
