// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::DownloadError;
use crate::feed::Episode;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Position of a download within the current channel
#[derive(Debug, Clone)]
pub struct DownloadContext {
    /// Index of this episode in the download queue
    pub episode_index: usize,
    /// Total number of episodes selected for the channel
    pub total_to_download: usize,
}

/// Path the body is streamed into before it is moved onto `output_path`
pub fn partial_path(output_path: &Path) -> PathBuf {
    let mut name = output_path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Download an episode to the specified output path
///
/// The body is streamed into a `.partial` sibling and renamed over
/// `output_path` only once complete, so a failed download never leaves a
/// file behind. Returns the number of bytes downloaded on success.
pub async fn download_episode<C: HttpClient>(
    client: &C,
    episode: &Episode,
    output_path: &Path,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let temp_path = partial_path(output_path);

    let result = stream_to_file(client, episode, &temp_path, context, reporter).await;

    let result = match result {
        Ok(bytes) => tokio::fs::rename(&temp_path, output_path)
            .await
            .map(|_| bytes)
            .map_err(|e| DownloadError::FileWriteFailed {
                path: output_path.to_path_buf(),
                source: e,
            }),
        Err(e) => Err(e),
    };

    match &result {
        Ok(bytes_downloaded) => reporter.report(ProgressEvent::DownloadCompleted {
            episode_title: episode.title.clone(),
            bytes_downloaded: *bytes_downloaded,
        }),
        Err(_) => {
            let _ = tokio::fs::remove_file(&temp_path).await;
        }
    }

    result
}

async fn stream_to_file<C: HttpClient>(
    client: &C,
    episode: &Episode,
    temp_path: &Path,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let url = episode.enclosure_url.as_str();

    let response = client
        .get_stream(url)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status != 200 {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    reporter.report(ProgressEvent::DownloadStarting {
        episode_title: episode.title.clone(),
        episode_index: context.episode_index,
        total_to_download: context.total_to_download,
        content_length: response.content_length,
    });

    let mut file = File::create(temp_path)
        .await
        .map_err(|e| DownloadError::FileCreateFailed {
            path: temp_path.to_path_buf(),
            source: e,
        })?;

    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: temp_path.to_path_buf(),
                source: e,
            })?;

        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            bytes_downloaded,
            total_bytes: response.content_length,
        });
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: temp_path.to_path_buf(),
            source: e,
        })?;

    Ok(bytes_downloaded)
}
