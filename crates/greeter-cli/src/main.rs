use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use greeter_core::ShutdownSignal;
use greeter_hw::Camera;
use greeter_voice::{
    classify, ConversationSession, Listener, MicListener, PicoSpeaker, Speaker, VoiceConfig,
};

#[derive(Parser)]
#[command(name = "greeter", about = "Greeter kiosk diagnostics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List V4L2 capture devices
    Devices,
    /// Speak a line through the synthesizer
    Say {
        /// Text to speak
        text: String,
    },
    /// Record one utterance and print what was recognized
    Listen,
    /// Show which menu intent an utterance maps to
    Classify {
        /// Utterance to classify
        utterance: String,
        /// Print JSON instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// Hold one conversation without the camera
    Chat {
        /// Print session stats as JSON when it ends
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let voice = VoiceConfig::from_env();

    match cli.command {
        Commands::Devices => {
            let devices = Camera::list_devices();
            tracing::debug!(count = devices.len(), "enumerated capture devices");
            if devices.is_empty() {
                println!("No capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
        Commands::Say { text } => {
            PicoSpeaker::new(voice.language.clone())
                .speak(&text)
                .context("speech synthesis failed")?;
        }
        Commands::Listen => {
            println!("Listening...");
            match tokio::task::spawn_blocking(move || MicListener::new(voice).listen()).await? {
                Ok(text) => println!("{text}"),
                Err(e) => {
                    tracing::warn!(error = %e, "listen failed");
                    return Err(e).context("listen failed");
                }
            }
        }
        Commands::Classify { utterance, json } => {
            let intent = classify(&utterance);
            if json {
                println!("{}", serde_json::json!({ "utterance": utterance, "intent": intent }));
            } else {
                match intent {
                    Some(intent) => println!("{intent:?}"),
                    None => println!("not understood"),
                }
            }
        }
        Commands::Chat { json } => {
            let shutdown = ShutdownSignal::new();
            let session = {
                let shutdown = shutdown.clone();
                tokio::task::spawn_blocking(move || {
                    let speaker = PicoSpeaker::new(voice.language.clone());
                    ConversationSession::new(speaker, MicListener::new(voice)).run(&shutdown)
                })
            };
            tokio::pin!(session);

            // Ctrl-C ends the session after its current turn.
            let stats = tokio::select! {
                stats = &mut session => stats?,
                res = tokio::signal::ctrl_c() => {
                    res?;
                    println!("Stopping after this turn...");
                    shutdown.trigger();
                    session.await?
                }
            };

            tracing::info!(answered = stats.answered, not_understood = stats.not_understood, "chat finished");
            if json {
                println!("{}", serde_json::to_string(&stats)?);
            } else {
                println!(
                    "Answered {} question(s), {} not understood",
                    stats.answered, stats.not_understood
                );
            }
        }
    }

    Ok(())
}
