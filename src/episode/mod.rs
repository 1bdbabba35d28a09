mod download;
mod filename;
mod select;

pub use download::{DownloadContext, download_episode, partial_path};
pub use filename::{channel_dir_name, generate_filename, generate_filename_stem, next_free_filename};
pub use select::select_episodes;
