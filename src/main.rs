// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use loadcast::config::{
    DEFAULT_DOWNLOAD_DIR, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MAX_EPISODES, DEFAULT_SOURCES_FILE,
};
use loadcast::{
    Config, NoopReporter, ProgressEvent, ProgressReporter, ReqwestClient, SharedProgressReporter,
    run,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Exit status for fatal errors and command-line usage errors
const EXIT_FATAL: i32 = 1;

/// Exit status when the run finished but at least one feed could not be synced
const EXIT_FEEDS_FAILED: i32 = 2;

/// Download the latest episodes of every podcast listed in a sources file
#[derive(Parser, Debug)]
#[command(name = "loadcast")]
#[command(about = "Download the latest episodes of every podcast listed in a sources file")]
#[command(version)]
struct Args {
    /// File listing one feed URL (or local RSS file) per line
    #[arg(short, long, env = "LOADCAST_SOURCES_FILE", default_value = DEFAULT_SOURCES_FILE)]
    sources: PathBuf,

    /// Directory that receives one subdirectory per podcast
    #[arg(short, long, env = "LOADCAST_DOWNLOAD_DIR", default_value = DEFAULT_DOWNLOAD_DIR)]
    download_dir: PathBuf,

    /// Number of most recent episodes to keep per podcast
    #[arg(short, long = "max", env = "LOADCAST_DOWNLOAD_MAX", default_value_t = DEFAULT_MAX_EPISODES)]
    max_episodes: usize,

    /// HTTP request timeout in seconds
    #[arg(short, long, env = "LOADCAST_HTTP_TIMEOUT", default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    timeout: u64,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// Log more (-v for info, -vv for debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Config {
            sources_file: args.sources.clone(),
            max_episodes_per_channel: args.max_episodes,
            download_dir: args.download_dir.clone(),
            http_timeout: Duration::from_secs(args.timeout),
        }
    }
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    download_bar: Mutex<Option<ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new(multi: MultiProgress) -> Self {
        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap();

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            download_bar: Mutex::new(None),
            main_bar,
        }
    }

    fn start_bar(&self, content_length: Option<u64>) -> ProgressBar {
        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap()
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(content_length.unwrap_or(0)));
        bar.set_style(style);
        *self.download_bar.lock().unwrap() = Some(bar.clone());
        bar
    }

    fn take_bar(&self) -> Option<ProgressBar> {
        self.download_bar.lock().unwrap().take()
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { source } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Fetching feed: {}", source.cyan()));
            }

            ProgressEvent::FeedParsed {
                channel,
                total_episodes,
                selected,
            } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{} • {} episodes, newest {} selected",
                    channel.bold().green(),
                    total_episodes.to_string().cyan(),
                    selected.to_string().yellow()
                ));
            }

            ProgressEvent::FeedFailed { source, error } => {
                self.multi
                    .println(format!("{FAILURE}{} - {}", source.red(), error.red()))
                    .ok();
            }

            ProgressEvent::EpisodeSkipped { .. } => {}

            ProgressEvent::DownloadStarting {
                episode_title,
                episode_index,
                total_to_download,
                content_length,
            } => {
                let bar = self.start_bar(content_length);
                bar.set_message(format!(
                    "[{}/{}] {}",
                    (episode_index + 1).to_string().cyan(),
                    total_to_download.to_string().cyan(),
                    truncate_title(&episode_title, 40)
                ));
            }

            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
            } => {
                if let Some(bar) = self.download_bar.lock().unwrap().as_ref() {
                    if let Some(total) = total_bytes {
                        bar.set_length(total);
                    }
                    bar.set_position(bytes_downloaded);
                }
            }

            ProgressEvent::DownloadCompleted {
                episode_title,
                bytes_downloaded,
            } => {
                if let Some(bar) = self.take_bar() {
                    bar.set_position(bytes_downloaded);
                    bar.finish_and_clear();
                }
                self.multi
                    .println(format!(
                        "  {SUCCESS}{}",
                        truncate_title(&episode_title, 60).green()
                    ))
                    .ok();
            }

            ProgressEvent::DownloadFailed {
                episode_title,
                error,
            } => {
                if let Some(bar) = self.take_bar() {
                    bar.finish_and_clear();
                }
                self.multi
                    .println(format!(
                        "  {FAILURE}{} - {}",
                        truncate_title(&episode_title, 30).red(),
                        error.red()
                    ))
                    .ok();
            }

            ProgressEvent::SyncCompleted {
                downloaded_count,
                skipped_count,
                failed_count,
                failed_feeds,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} downloaded, {} skipped, {} failed, {} feeds failed",
                    "Sync complete:".bold().green(),
                    downloaded_count.to_string().green().bold(),
                    skipped_count.to_string().yellow(),
                    colour_failures(failed_count),
                    colour_failures(failed_feeds),
                );
            }
        }
    }
}

fn colour_failures(count: usize) -> colored::ColoredString {
    if count > 0 {
        count.to_string().red().bold()
    } else {
        count.to_string().green()
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let cut: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

/// Exit status for an argument parsing failure
///
/// `--help` and `--version` are not failures and exit with 0.
fn exit_code_for(err: &clap::Error) -> i32 {
    if err.use_stderr() { EXIT_FATAL } else { 0 }
}

/// Log level used when RUST_LOG is not set
///
/// The progress UI already reports failed feeds and downloads, so warnings
/// are only logged in quiet mode unless more verbosity is requested.
fn default_log_level(quiet: bool, verbose: u8) -> &'static str {
    match verbose {
        0 if quiet => "warn",
        0 => "error",
        1 => "info",
        _ => "debug",
    }
}

/// Log sink that hides the progress bars while a line is written
#[derive(Clone)]
struct LogWriter(Option<MultiProgress>);

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &self.0 {
            Some(multi) => multi.suspend(|| io::stderr().write(buf)),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

fn init_logging(level: &str, multi: Option<MultiProgress>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("loadcast={level}")));
    let writer = LogWriter(multi);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(move || writer.clone()),
        )
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = exit_code_for(&e);
            e.print().ok();
            std::process::exit(code);
        }
    };

    let multi = (!args.quiet).then(MultiProgress::new);
    init_logging(default_log_level(args.quiet, args.verbose), multi.clone());

    let config = Config::from(&args);

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "loadcast".bold().magenta(),
            "- Podcast Sync".dimmed()
        );
    }

    let client =
        ReqwestClient::new(config.http_timeout).context("Failed to set up HTTP client")?;

    let reporter: SharedProgressReporter = match multi {
        Some(multi) => Arc::new(IndicatifReporter::new(multi)),
        None => NoopReporter::shared(),
    };

    let report = run(&client, &config, reporter)
        .await
        .context("Failed to sync podcasts")?;

    if !args.quiet {
        let failed_episodes: Vec<_> = report
            .feeds
            .iter()
            .flat_map(|feed| feed.failed_episodes.iter().map(move |e| (&feed.channel, e)))
            .collect();

        if !failed_episodes.is_empty() {
            println!("\n{}", "Failed episodes:".red().bold());
            for (channel, (title, error)) in failed_episodes {
                println!(
                    "  {}{} / {} - {}",
                    CROSS,
                    channel.cyan(),
                    title.yellow(),
                    error.dimmed()
                );
            }
        }

        if !report.failed_feeds.is_empty() {
            println!("\n{}", "Failed feeds:".red().bold());
            for (source, error) in &report.failed_feeds {
                println!("  {}{} - {}", CROSS, source.yellow(), error.dimmed());
            }
        }

        println!(
            "\n{FOLDER}Output: {}\n",
            config.download_dir.display().to_string().cyan()
        );
    }

    if !report.all_feeds_synced() {
        std::process::exit(EXIT_FEEDS_FAILED);
    }

    Ok(())
}
