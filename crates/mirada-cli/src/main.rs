use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod flow;
mod profiles;
mod screens;

use config::Config;
use engine::ScanReport;
use flow::{Nav, Screen};

#[derive(Parser)]
#[command(name = "mirada", about = "mirada — face lookup demo over a mock profile gallery")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session: home, capture or upload, processing, results
    Run,
    /// Identify a face from an image file
    Identify {
        /// Image to analyze
        #[arg(short, long)]
        image: PathBuf,
        /// Print the raw scan report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Capture from the camera and identify
    Capture {
        /// Print the raw scan report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the profiles in the gallery manifest
    Profiles,
    /// Manage the pretrained model files
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },
    /// Show the privacy notice
    Privacy,
    /// List available camera devices
    Devices,
}

#[derive(Subcommand)]
enum ModelsAction {
    /// Download any model files that are missing locally
    Fetch,
    /// Show where each model file resolves locally
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Run => run_session(&config).await?,
        Commands::Identify { image, json } => {
            let (engine, _) = engine::spawn_engine(&config).await?;
            let frame = mirada_capture::upload::load_image_file(&image)?;
            let report = engine.scan_frame(frame).await?;
            emit_report(&report, json)?;
        }
        Commands::Capture { json } => {
            let (engine, _) = engine::spawn_engine(&config).await?;
            let report = engine.scan_camera().await?;
            emit_report(&report, json)?;
        }
        Commands::Profiles => {
            let manifest = profiles::load_manifest(config.profiles_path.as_deref())?;
            let cards: Vec<_> = manifest.profiles.iter().map(engine::ProfileCard::from).collect();
            println!("{}", screens::render_gallery(&cards));
        }
        Commands::Models { action } => {
            let store =
                mirada_models::ModelStore::new(config.model_dir.clone(), config.model_base_url);
            match action {
                ModelsAction::Fetch => {
                    let resolved = store.ensure_all().await?;
                    println!("detector: {}", resolved.detector.display());
                    println!("embedder: {}", resolved.embedder.display());
                }
                ModelsAction::Status => {
                    for (kind, path) in store.local_status() {
                        match path {
                            Some(path) => println!("{kind:?}: {}", path.display()),
                            None => println!("{kind:?}: not present (run `mirada models fetch`)"),
                        }
                    }
                }
            }
        }
        Commands::Privacy => println!("{}", screens::render_privacy()),
        Commands::Devices => {
            let devices = mirada_capture::Camera::list_devices();
            if devices.is_empty() {
                println!("No video capture devices found.");
            }
            for dev in devices {
                println!("{}  {} ({})", dev.path, dev.name, dev.driver);
            }
        }
    }

    Ok(())
}

fn emit_report(report: &ScanReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", screens::render_results(report));
    }
    Ok(())
}

/// The interactive screen loop. Scans run through the same engine the
/// one-shot commands use; navigation goes through the transition table.
async fn run_session(config: &Config) -> Result<()> {
    println!("Loading models and building gallery...");
    let (engine, cards) = engine::spawn_engine(config).await?;
    println!("Ready. {} profile(s) enrolled.\n", cards.len());

    let mut screen = Screen::Home;
    let mut last_report: Option<ScanReport> = None;

    loop {
        match screen {
            Screen::Home => {
                println!("{}", screens::render_home());
                let choice = prompt("> ")?;
                let nav = match choice.as_str() {
                    "1" => Nav::OpenCamera,
                    "2" => Nav::OpenUpload,
                    "3" => Nav::OpenPrivacy,
                    "q" | "quit" => return Ok(()),
                    _ => {
                        println!("Unrecognized choice.\n");
                        continue;
                    }
                };
                screen = advance(screen, nav);
            }
            Screen::Camera => {
                println!("{}", screens::render_camera_prompt());
                let line = prompt("> ")?;
                if line == "b" {
                    screen = advance(screen, Nav::Back);
                    continue;
                }
                screen = advance(screen, Nav::ImageAccepted);
                println!("{}", screens::render_processing());
                last_report = Some(engine.scan_camera().await?);
                screen = advance(screen, Nav::ProcessingDone);
            }
            Screen::Upload => {
                println!("{}", screens::render_upload_prompt());
                let line = prompt("> ")?;
                if line == "b" {
                    screen = advance(screen, Nav::Back);
                    continue;
                }
                let frame = match mirada_capture::upload::load_image_file(Path::new(&line)) {
                    Ok(frame) => frame,
                    Err(err) => {
                        println!("Could not load image: {err}\n");
                        continue;
                    }
                };
                screen = advance(screen, Nav::ImageAccepted);
                println!("{}", screens::render_processing());
                last_report = Some(engine.scan_frame(frame).await?);
                screen = advance(screen, Nav::ProcessingDone);
            }
            Screen::Processing => {
                // Scans complete inline above; this arm only moves the
                // machine forward if it is ever entered directly.
                screen = advance(screen, Nav::ProcessingDone);
            }
            Screen::Results => {
                match &last_report {
                    Some(report) => println!("{}\n", screens::render_results(report)),
                    None => println!("No scan yet.\n"),
                }
                prompt("press enter to return home ")?;
                screen = advance(screen, Nav::Back);
            }
            Screen::Privacy => {
                println!("{}", screens::render_privacy());
                prompt("press enter to return home ")?;
                screen = advance(screen, Nav::Back);
            }
        }
    }
}

fn advance(screen: Screen, nav: Nav) -> Screen {
    match flow::transition(screen, nav) {
        Some(next) => next,
        None => {
            tracing::warn!(?screen, ?nav, "illegal navigation ignored");
            screen
        }
    }
}

fn prompt(text: &str) -> Result<String> {
    print!("{text}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
