use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use linkscribe::cli::{Cli, Commands};
use linkscribe::config::Config;
use linkscribe::health::{ComponentStatus, CredentialStatus, OverallStatus};
use linkscribe::pipeline::{PipelineController, ResultEnvelope};
use linkscribe::platform::{ClassifierRegistry, PlatformType};
use linkscribe::server::{self, AppState};
use linkscribe::{output, utils};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Platforms needs no configuration or logging
    if let Commands::Platforms = cli.command {
        print_platforms();
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().await?,
    };

    init_tracing(cli.verbose, config.logging.json);

    match cli.command {
        Commands::Transcribe {
            url,
            format,
            output_dir,
            no_save,
            language,
            task,
            stages,
        } => {
            let mut config = config;
            if language.is_some() {
                config.openai.language = language;
            }
            if let Some(task) = task {
                config.openai.text_task = task;
            }

            warn_missing_dependencies(&config).await;

            let controller = PipelineController::from_config(&config);

            let progress = if cli.quiet {
                ProgressBar::hidden()
            } else {
                let progress = ProgressBar::new_spinner();
                progress.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
                );
                progress.enable_steady_tick(Duration::from_millis(120));
                progress
            };
            progress.set_message("Processing video link...");

            tracing::info!("Starting transcription for: {}", url);
            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });

            let job = controller.run(&url, cancel).await;
            let envelope = ResultEnvelope::checked(&job);

            if envelope.success {
                progress.finish_with_message("Done");
            } else {
                progress.abandon_with_message("Failed");
            }

            if stages {
                eprintln!("{}", style("Stages:").bold());
                eprintln!("{}", output::format_stage_reports(&job.stage_reports()));
            }

            output::print_to_console(&envelope, &format)?;

            if config.output.save_artifacts && !no_save {
                let dir = output_dir.unwrap_or_else(|| config.output.dir.clone());
                match output::save_artifacts(&envelope, &dir) {
                    Ok(paths) => {
                        for path in paths.iter() {
                            eprintln!("{} {}", style("Saved").green(), path.display());
                        }
                    }
                    Err(e) => eprintln!("{} {:#}", style("Could not save artifacts:").yellow(), e),
                }
            }

            if !envelope.success {
                std::process::exit(1);
            }
        }
        Commands::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            warn_missing_dependencies(&config).await;

            let state = Arc::new(AppState::new(
                PipelineController::from_config(&config),
                config.server.max_concurrent_jobs,
                config.output.clone(),
            ));
            server::serve(state, &config.server).await?;
        }
        Commands::Health => {
            let health = PipelineController::from_config(&config).health().await;

            let verdict = match health.status {
                OverallStatus::Healthy => style("healthy").green().bold(),
                OverallStatus::Degraded => style("degraded").yellow().bold(),
            };
            println!("Status: {} (v{})", verdict, health.version);

            println!("Components:");
            for (name, status) in &health.components {
                let mark = match status {
                    ComponentStatus::Ok => style("ok").green(),
                    ComponentStatus::Unavailable => style("unavailable").red(),
                };
                match health.details.get(name) {
                    Some(detail) => println!("  • {}: {} ({})", name, mark, detail),
                    None => println!("  • {}: {}", name, mark),
                }
            }

            println!("Credentials:");
            for (name, status) in &health.credentials {
                let mark = match status {
                    CredentialStatus::Configured => style("configured").green(),
                    CredentialStatus::Missing => style("missing").yellow(),
                };
                println!("  • {}: {}", name, mark);
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
                println!("Edit it to set API credentials, or export OPENAI_API_KEY / OPENAI_BASE_URL.");
            }
        }
        Commands::Platforms => print_platforms(),
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "linkscribe=debug" } else { "linkscribe=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Missing tools are reported, not fatal: direct links need no yt-dlp
async fn warn_missing_dependencies(config: &Config) {
    let missing = utils::check_dependencies(&config.download.yt_dlp_path, &config.audio.ffmpeg_path).await;
    if !missing.is_empty() {
        eprintln!("{}", style("Dependency check warnings:").yellow());
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}

fn print_platforms() {
    println!("Supported platforms:");
    for platform in ClassifierRegistry::default().list_platforms() {
        let hosts = match platform {
            PlatformType::DirectLink => "any http(s) link to a media file (mp4, webm, mp3, wav, ...)",
            PlatformType::Bilibili => "bilibili.com, b23.tv",
            PlatformType::Youtube => "youtube.com, youtu.be",
            PlatformType::Vimeo => "vimeo.com, player.vimeo.com",
            PlatformType::Douyin => "douyin.com, v.douyin.com",
            PlatformType::Unknown => "any other video page yt-dlp understands",
        };
        println!("  • {} ({})", platform, hosts);
    }
}
