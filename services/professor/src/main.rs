mod config;
mod gemini;
mod playback;
mod prompt_loader;
mod render;
mod sources;

use crate::config::Config;
use crate::gemini::GeminiProfessor;
use anasagashi_core::controller::SessionController;
use anasagashi_core::persona::Persona;
use anasagashi_core::service::ProfessorService;
use anasagashi_core::session::{Session, SourceMaterial};
use anasagashi_utils::audio;
use anasagashi_utils::sink::{AudioSink, SilentSink};
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(name = "anasagashi", about = "Strict-professor critique of research slides and reports")]
struct Cli {
    /// Professor persona: nitpicker, statistician, passionate or theorist
    persona: String,
    /// Directory of pre-rendered slide page images (PNG/JPEG, filename order)
    #[arg(long)]
    slides: Option<PathBuf>,
    /// Plain-text report file
    #[arg(long)]
    report: Option<PathBuf>,
    /// Presentation recording to transcribe first (wav/mp3/mp4/m4a)
    #[arg(long)]
    recording: Option<PathBuf>,
    /// Directory of persona prompt override files
    #[arg(long, default_value = "prompts")]
    prompts: PathBuf,
    /// Skip audio playback
    #[arg(long)]
    mute: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();
    let persona = Persona::from_key(&args.persona).ok_or_else(|| {
        anyhow!(
            "Unknown persona '{}'. Pick one of: {}",
            args.persona,
            Persona::ALL.map(|p| p.key()).join(", ")
        )
    })?;
    tracing::info!(
        "Professor persona: {} — {}",
        persona.key(),
        persona.profile().description
    );

    // --- 4. Load Prompt Overrides ---
    let overrides = prompt_loader::load_prompt_overrides(&args.prompts)
        .context("Failed to load persona prompt overrides")?;
    let system_prompt = prompt_loader::resolve_prompt(&overrides, persona);

    // --- 5. Initialize Clients ---
    let service = GeminiProfessor::new(&config);
    let sink: Box<dyn AudioSink> = if args.mute {
        Box::new(SilentSink::new())
    } else {
        match playback::CpalSink::new() {
            Ok(sink) => Box::new(sink),
            Err(e) => {
                tracing::warn!("Audio output unavailable, running muted: {e:#}");
                Box::new(SilentSink::new())
            }
        }
    };

    // --- 6. Gather Source Material ---
    let slides = match &args.slides {
        Some(dir) => sources::load_slides(dir)?,
        None => Vec::new(),
    };
    let report = args.report.as_deref().map(sources::load_report).transpose()?;
    let transcript = match &args.recording {
        Some(path) => {
            let upload = sources::load_recording(path)?;
            tracing::info!("Transcribing the presentation recording...");
            let text = service
                .transcribe(&upload.base64, upload.mime_type)
                .await
                .context("Transcription of the recording failed")?;
            tracing::debug!("Transcript: {text}");
            Some(text)
        }
        None => None,
    };
    let material = SourceMaterial {
        slides,
        transcript,
        report,
    };

    // --- 7. Analysis Pass ---
    let mut controller = SessionController::new();
    analyze_and_present(&mut controller, &service, sink.as_ref(), material.clone(), persona, system_prompt.clone())
        .await?;

    // --- 8. Rebuttal Loop ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"rebuttal> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            ":quit" | ":q" => break,
            ":reset" => {
                if !confirm_reset().await {
                    continue;
                }
                controller.reset();
                // A failed re-analysis leaves the controller back in Setup;
                // the loop stays alive so the user can retry with :reset.
                if let Err(e) = analyze_and_present(
                    &mut controller,
                    &service,
                    sink.as_ref(),
                    material.clone(),
                    persona,
                    system_prompt.clone(),
                )
                .await
                {
                    tracing::error!("Re-analysis failed: {e:#}");
                    println!("The professor could not re-read your work. Use :reset to try again.");
                }
            }
            cmd if cmd.starts_with(":play") => {
                let Some(session) = controller.session() else {
                    continue;
                };
                match point_clip(session, cmd.trim_start_matches(":play")) {
                    Some((title, Some(clip))) => {
                        println!("Professor, on \"{title}\":");
                        speak(sink.as_ref(), Some(clip.as_str())).await;
                    }
                    Some((title, None)) => {
                        println!("No voice clip was synthesized for \"{title}\".");
                    }
                    None => println!("Usage: :play <objection number>"),
                }
            }
            text => match controller.rebut(&service, text).await {
                Ok(reply) => {
                    println!("{}", render::render_message(&reply));
                    speak(sink.as_ref(), reply.audio.as_deref()).await;
                }
                Err(e) => {
                    tracing::error!("Rebuttal failed: {e:#}");
                    println!("The professor has fallen silent. Try again.");
                }
            },
        }
    }

    tracing::info!("Dismissed.");
    Ok(())
}

/// One all-or-nothing critique pass plus the initial presentation of its
/// outcome. A failure leaves the controller back in Setup and bubbles up.
async fn analyze_and_present(
    controller: &mut SessionController,
    service: &dyn ProfessorService,
    sink: &dyn AudioSink,
    material: SourceMaterial,
    persona: Persona,
    system_prompt: String,
) -> Result<()> {
    tracing::info!("The professor is reading your work closely...");
    controller
        .analyze(service, material, persona, system_prompt)
        .await
        .context("You seem to have upset the professor. Try again")?;

    let session = controller
        .session()
        .ok_or_else(|| anyhow!("Analysis reported success without a live session"))?;
    println!("{}", render::render_critique(session));
    println!("(:play <n> replays an objection, :reset starts over, :quit leaves)");
    if let Some(opening) = session.dialogue.messages().first() {
        println!("{}", render::render_message(opening));
        speak(sink, opening.audio.as_deref()).await;
    }
    Ok(())
}

async fn speak(sink: &dyn AudioSink, clip: Option<&str>) {
    let Some(clip) = clip else { return };
    let samples = audio::decode(clip);
    if samples.is_empty() {
        return;
    }
    sink.play(samples, audio::VOICE_PCM16_SAMPLE_RATE as u32)
        .await;
}

/// Resolves a `:play` argument to the addressed objection's title and clip.
/// Numbers are 1-based and follow the order of the critique listing.
fn point_clip(session: &Session, arg: &str) -> Option<(String, Option<String>)> {
    let n: usize = arg.trim().parse().ok()?;
    let point = session.points.get(n.checked_sub(1)?)?;
    Some((point.title.clone(), point.audio.clone()))
}

/// Resetting throws the whole session away; make the user say so.
async fn confirm_reset() -> bool {
    tokio::task::spawn_blocking(|| {
        inquire::Confirm::new("The analysis result will be discarded. Start over?")
            .with_default(false)
            .prompt()
            .unwrap_or(false)
    })
    .await
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anasagashi_core::critique::{Anchor, CritiquePoint};

    fn session_with_points() -> Session {
        let point = |id: &str, title: &str, audio: Option<&str>| CritiquePoint {
            id: id.into(),
            title: title.into(),
            comment: "…".into(),
            hole_type: "logical leap".into(),
            anchor: Anchor::Text {
                original_text: String::new(),
                suggestion: String::new(),
            },
            audio: audio.map(String::from),
        };
        Session {
            material: SourceMaterial {
                report: Some("text".into()),
                ..Default::default()
            },
            persona: Persona::Nitpicker,
            system_prompt: "prompt".into(),
            points: vec![
                point("f1", "No baseline", Some("clip1")),
                point("f2", "Axis unlabeled", None),
            ],
            dialogue: Default::default(),
        }
    }

    #[test]
    fn play_argument_addresses_points_one_based() {
        let session = session_with_points();
        assert_eq!(
            point_clip(&session, " 1 "),
            Some(("No baseline".into(), Some("clip1".into())))
        );
        // A point without a clip still resolves, by title.
        assert_eq!(
            point_clip(&session, "2"),
            Some(("Axis unlabeled".into(), None))
        );
    }

    #[test]
    fn play_argument_rejects_garbage_and_out_of_range() {
        let session = session_with_points();
        assert_eq!(point_clip(&session, "0"), None);
        assert_eq!(point_clip(&session, "3"), None);
        assert_eq!(point_clip(&session, "first"), None);
        assert_eq!(point_clip(&session, ""), None);
    }
}
