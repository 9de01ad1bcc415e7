use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::text::TextTask;

#[derive(Parser)]
#[command(
    name = "linkscribe",
    about = "Transcribe videos from bilibili, YouTube, Vimeo, Douyin and direct media links",
    version,
    long_about = "Downloads the video behind a link, extracts its audio, transcribes it with an OpenAI-compatible speech-to-text API and post-processes the transcript with a chat model. Runs once from the command line or as an HTTP service."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to ./config.yaml or the user config directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcribe the video behind a link
    Transcribe {
        /// Video link, or text containing one
        #[arg(value_name = "URL_OR_TEXT")]
        url: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Directory for saved artifacts (overrides config)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Do not write artifact files
        #[arg(long)]
        no_save: bool,

        /// Language hint for transcription, e.g. zh or en (auto-detect if not specified)
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,

        /// Text post-processing task
        #[arg(short, long, value_enum)]
        task: Option<TextTask>,

        /// Print per-stage status and timings
        #[arg(long)]
        stages: bool,
    },

    /// Run the HTTP service
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check external tools and credentials
    Health,

    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List supported platforms
    Platforms,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// The full result envelope as JSON
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_transcribe() {
        let cli = Cli::try_parse_from([
            "linkscribe",
            "transcribe",
            "https://youtu.be/abc",
            "--format",
            "json",
            "--task",
            "summarize",
            "--no-save",
        ])
        .unwrap();

        match cli.command {
            Commands::Transcribe {
                url,
                format,
                task,
                no_save,
                ..
            } => {
                assert_eq!(url, "https://youtu.be/abc");
                assert_eq!(format, OutputFormat::Json);
                assert_eq!(task, Some(TextTask::Summarize));
                assert!(no_save);
            }
            _ => panic!("expected transcribe"),
        }
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from(["linkscribe", "-v", "serve", "--port", "9000"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Serve {
                host: None,
                port: Some(9000)
            }
        ));
    }
}
