pub mod config;
pub mod episode;
pub mod error;
pub mod feed;
pub mod http;
pub mod progress;
pub mod sources;
pub mod state;
pub mod sync;

// Re-export main types for convenience
pub use config::Config;
pub use episode::{channel_dir_name, next_free_filename, select_episodes};
pub use error::{ConfigError, DownloadError, FeedError, StateError, StorageError, SyncError};
pub use feed::{Channel, Episode, FeedSource, load_feed, parse_feed};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use state::{SeenStore, identifier_for};
pub use sync::{FeedReport, SyncReport, run, sync_feed, sync_sources};
