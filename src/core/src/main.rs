use std::ffi::OsString;
use std::path::{Path, PathBuf};

use bugstream::configuration::config::Config;
use bugstream::report_generation::{decode_artifact, Report};
use bugstream::storage::{ArtifactStore, FileArtifactStore};
use clap::{Parser, Subcommand};
use log::{error, info};

#[derive(Parser)]
#[command(name = "bugstream")]
#[command(version)]
#[command(about = "Inspect BugStream capture artifacts")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the metadata and per-stream record counts of an artifact
    Inspect { file: PathBuf },
    /// Print the decoded report embedded in an artifact as JSON
    Extract {
        file: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
    /// List the artifacts in the configured output directory
    ///
    /// Accepts the capture flags, e.g. `--config <PATH>` or `--output-dir <DIR>`
    List {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        capture_args: Vec<OsString>,
    },
}

async fn read_report(path: &Path) -> Report {
    let html = tokio::fs::read_to_string(path).await.unwrap_or_else(|e| {
        error!("Unable to read {}: {}", path.display(), e);
        std::process::exit(1);
    });
    decode_artifact(&html).unwrap_or_else(|e| {
        error!("Unable to decode {}: {}", path.display(), e);
        std::process::exit(1);
    })
}

fn summary(report: &Report) -> String {
    let meta = &report.metadata;
    [
        format!("version:    {}", report.version),
        format!("url:        {}", meta.url),
        format!("title:      {}", meta.title),
        format!("timestamp:  {}", meta.timestamp),
        format!("duration:   {} ms", meta.duration),
        format!("user agent: {}", meta.user_agent),
        format!("screen:     {}x{}", meta.screen_width, meta.screen_height),
        format!("events:     {}", report.events.len()),
        format!("console:    {}", report.console.len()),
        format!("network:    {}", report.network.len()),
        format!("keyboard:   {}", report.keyboard.len()),
    ]
    .join("\n")
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Inspect { file } => {
            let report = read_report(&file).await;
            info!("{} holds {} record(s)", file.display(), report.record_count());
            println!("{}", summary(&report));
        }
        Commands::Extract { file, pretty } => {
            let report = read_report(&file).await;
            let json = if pretty {
                serde_json::to_string_pretty(&report)
            } else {
                serde_json::to_string(&report)
            };
            match json {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    error!("Unable to serialize report: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::List { capture_args } => {
            let args = std::iter::once(OsString::from("bugstream list")).chain(capture_args);
            let config = Config::from_args(args).unwrap_or_else(|e| {
                error!("Unable to import configuration: {}", e);
                std::process::exit(1);
            });
            let names = FileArtifactStore::from_config(&config.capture)
                .and_then(|store| store.list_artifacts())
                .unwrap_or_else(|e| {
                    error!("Unable to list artifacts: {}", e);
                    std::process::exit(1);
                });
            for name in names {
                println!("{}", name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bugstream::report_generation::ReportMetadata;

    #[test]
    fn test_parse_extract_flags() {
        let args = Args::try_parse_from(["bugstream", "extract", "report.html", "--pretty"]).unwrap();
        match args.command {
            Commands::Extract { file, pretty } => {
                assert_eq!(file, PathBuf::from("report.html"));
                assert!(pretty);
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn test_list_forwards_capture_flags() {
        let args =
            Args::try_parse_from(["bugstream", "list", "--output-dir", "/tmp/reports"]).unwrap();
        let Commands::List { capture_args } = args.command else {
            panic!("expected list");
        };
        assert_eq!(capture_args, vec![OsString::from("--output-dir"), OsString::from("/tmp/reports")]);

        let config =
            Config::from_args(std::iter::once(OsString::from("bugstream list")).chain(capture_args))
                .unwrap();
        assert_eq!(config.capture.output_dir, Some(PathBuf::from("/tmp/reports")));
    }

    #[test]
    fn test_summary_lists_stream_counts() {
        let report = Report::new(ReportMetadata {
            url: "https://app.example.com/".into(),
            screen_width: 1280,
            screen_height: 720,
            ..Default::default()
        });
        let text = summary(&report);
        assert!(text.starts_with("version:    2.0.0"));
        assert!(text.contains("screen:     1280x720"));
        assert!(text.ends_with("keyboard:   0"));
    }
}
