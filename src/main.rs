use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use kiaan_wake::wake::{normalize, phonetic_keys};
use kiaan_wake::{
    EngineConfig, EngineEvent, LineRecognizer, PhraseCatalogue, Sensitivity, WakeWordEngine,
    extract_command, match_transcript,
};

/// Kiaan Wake - wake word detection for continuous speech transcripts
#[derive(Parser)]
#[command(name = "kiaan-wake", version, about)]
struct Cli {
    /// Sensitivity level (ultra, high, medium, low)
    #[arg(short, long, env = "KIAAN_WAKE_SENSITIVITY", global = true)]
    sensitivity: Option<Sensitivity>,

    /// Recognizer locale (e.g. "en-US")
    #[arg(short, long, env = "KIAAN_WAKE_LANGUAGE", global = true)]
    language: Option<String>,

    /// Wake phrase; repeat to build a custom catalogue
    #[arg(short, long = "wake-word", global = true)]
    wake_words: Vec<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for wake words in transcript lines read from stdin
    ///
    /// `> text` is an interim transcript, a plain line is final, `! code` is
    /// a recognizer error and a blank line ends the utterance.
    Listen {
        /// Print every engine event, not only detections
        #[arg(long)]
        all_events: bool,
    },
    /// Match a single transcript and print the result
    Match {
        /// Transcript to match
        transcript: String,
    },
    /// Print the sensitivity profiles
    Profiles,
    /// Print normalized text and phonetic keys
    Phonetic {
        /// Words to encode
        #[arg(required = true)]
        words: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,kiaan_wake=info",
        1 => "info,kiaan_wake=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = EngineConfig::load()?;
    if let Some(sensitivity) = cli.sensitivity {
        config.sensitivity = sensitivity;
    }
    if let Some(language) = cli.language {
        config.language = language;
    }
    if !cli.wake_words.is_empty() {
        config.wake_words = Some(cli.wake_words);
    }

    match cli.command.unwrap_or(Command::Listen { all_events: false }) {
        Command::Listen { all_events } => listen(config, all_events).await,
        Command::Match { transcript } => match_once(&config, &transcript),
        Command::Profiles => profiles(),
        Command::Phonetic { words } => phonetic(&words.join(" ")),
    }
}

/// Drive the engine from stdin until input ends
async fn listen(config: EngineConfig, all_events: bool) -> anyhow::Result<()> {
    let (line_tx, line_rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line_tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read stdin");
                    break;
                }
            }
        }
    });

    let recognizer = LineRecognizer::new(line_rx);
    let mut input_closed = recognizer.input_closed();

    let (engine, mut events) = WakeWordEngine::spawn(config, recognizer)?;
    let mut state = engine.subscribe_state();

    engine.start().await?;
    tracing::info!(sensitivity = %engine.sensitivity(), "listening for wake words on stdin");

    let halted = loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break true };
                print_event(&event, all_events)?;
                if !engine.is_active() {
                    break true;
                }
            }
            closed = input_closed.wait_for(|closed| *closed) => {
                closed?;
                break false;
            }
        }
    };

    if !halted {
        // let the engine finish the last session before tearing down
        state.wait_for(|s| !s.recognition_active).await?;
        while let Ok(event) = events.try_recv() {
            print_event(&event, all_events)?;
        }
    }

    let final_state = engine.state();
    engine.destroy().await?;

    tracing::info!(
        detections = final_state.detection_count,
        noise_level = final_state.noise_level,
        "input finished"
    );

    Ok(())
}

fn print_event(event: &EngineEvent, all_events: bool) -> anyhow::Result<()> {
    if all_events {
        println!("{}", event.to_json()?);
        return Ok(());
    }

    match event {
        EngineEvent::WakeWordDetected(detection) => {
            println!("{}", detection.to_json()?);
            let command = extract_command(&detection.transcript, &detection.phrase);
            if !command.is_empty() {
                tracing::info!(%command, "command follows wake phrase");
            }
        }
        EngineEvent::Error(message) => tracing::warn!("{message}"),
        EngineEvent::SensitivityChanged(level) => tracing::debug!(%level, "sensitivity changed"),
        EngineEvent::ListeningStateChanged(state) => tracing::debug!(?state, "state changed"),
    }

    Ok(())
}

fn match_once(config: &EngineConfig, transcript: &str) -> anyhow::Result<()> {
    let catalogue = match &config.wake_words {
        Some(words) => PhraseCatalogue::new(words)?,
        None => PhraseCatalogue::default(),
    };

    let result = match_transcript(transcript, &catalogue, config.sensitivity.profile());
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[allow(clippy::unnecessary_wraps)]
fn profiles() -> anyhow::Result<()> {
    println!(
        "{:<8} {:>6} {:>9} {:>6} {:>12} {:>9} {:>9} {:>8} {:>8}",
        "level", "exact", "phonetic", "fuzzy", "subsequence", "cooldown", "required", "interim", "max-lev"
    );

    for level in Sensitivity::ALL {
        let p = level.profile();
        println!(
            "{:<8} {:>6.2} {:>9.2} {:>6.2} {:>12.2} {:>7}ms {:>9} {:>8} {:>8}",
            level.to_string(),
            p.exact_threshold,
            p.phonetic_threshold,
            p.fuzzy_threshold,
            p.subsequence_threshold,
            p.cooldown.as_millis(),
            p.required_consecutive,
            p.allow_interim,
            p.max_levenshtein_distance,
        );
    }

    Ok(())
}

#[allow(clippy::unnecessary_wraps)]
fn phonetic(text: &str) -> anyhow::Result<()> {
    let normalized = normalize(text);
    let keys = phonetic_keys(&normalized);

    println!("normalized: {normalized}");
    println!("phonetic:   {}", keys.join(" "));
    Ok(())
}
