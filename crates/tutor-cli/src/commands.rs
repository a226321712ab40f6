//! Command handlers
//!
//! The CLI is the stream's consumer: it issues the request, watches snapshots
//! while the stream runs, and renders the terminal state.

use std::future::Future;
use std::io::{self, IsTerminal, Read, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, warn};
use tutor_core::api::{mime_type_for_path, AnalyzeImageRequest, AnalyzeRequest, ChatRequest};
use tutor_core::config::LEVEL_DEFINITIONS;
use tutor_core::stream::ByteStream;
use tutor_core::{Level, Section, SessionStore, StreamOutcome, TutorClient, TutorConfig, TutorStream};

use crate::render::{progress_line, write_final, LiveFollower};
use crate::{Cli, Command};

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config = TutorConfig::load()?.with_backend_url(cli.url);
    let sessions = SessionStore::open_default()?;
    let level = match cli.level {
        Some(level) => level,
        None => sessions.load_level().await.unwrap_or(config.level),
    };
    debug!("Using level {} against {}", level, config.base_url);

    match cli.command {
        Command::Analyze { text, file, follow } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => read_stdin()?,
            };
            let request = AnalyzeRequest::new(text, level)?;
            let client = TutorClient::new(config)?;
            stream_and_render(
                || client.analyze(&request),
                follow.map(Section::from),
                &sessions,
                tokio::signal::ctrl_c(),
            )
            .await
            .map(ExitCode::from)
        }
        Command::Image { path, follow } => {
            let request = image_request(&path, level).await?;
            let client = TutorClient::new(config)?;
            stream_and_render(
                || client.analyze_image(&request),
                follow.map(Section::from),
                &sessions,
                tokio::signal::ctrl_c(),
            )
            .await
            .map(ExitCode::from)
        }
        Command::Chat { question } => {
            let session_id = sessions.load_or_create().await?;
            let request = ChatRequest::new(session_id, question, level)?;
            let client = TutorClient::new(config)?;
            stream_and_render(
                || client.chat(&request),
                None,
                &sessions,
                tokio::signal::ctrl_c(),
            )
            .await
            .map(ExitCode::from)
        }
        Command::Session { reset } => {
            let id = if reset {
                sessions.reset().await?
            } else {
                sessions.load_or_create().await?
            };
            println!("{id}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Level { level: Some(new) } => {
            sessions.store_level(new).await?;
            println!("Level set to {new}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Level { level: None } => {
            for def in LEVEL_DEFINITIONS {
                let marker = if def.level == level.get() { "*" } else { " " };
                println!("{marker} {} {} - {}", def.level, def.label, def.description);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Health => {
            let client = TutorClient::new(config)?;
            let health = client.health().await?;
            println!(
                "{} ({})",
                health.status,
                health.version.as_deref().unwrap_or("unknown version")
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_stdin() -> Result<String> {
    if io::stdin().is_terminal() {
        return Err(anyhow!("No text given: pass it as an argument, with --file, or on stdin"));
    }
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read stdin")?;
    Ok(text)
}

async fn image_request(path: &Path, level: Level) -> Result<AnalyzeImageRequest> {
    let mime_type = mime_type_for_path(path)
        .ok_or_else(|| anyhow!("Unsupported image type: {}", path.display()))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(AnalyzeImageRequest::new(&bytes, mime_type, level)?)
}

/// How a rendered stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunEnd {
    Finished,
    Failed,
    Interrupted,
}

impl From<RunEnd> for ExitCode {
    fn from(end: RunEnd) -> Self {
        match end {
            RunEnd::Finished => ExitCode::SUCCESS,
            RunEnd::Failed => ExitCode::FAILURE,
            RunEnd::Interrupted => ExitCode::from(130),
        }
    }
}

/// Run one stream, rendering snapshots until it ends
///
/// `interrupt` resolving resets the stream; it is polled for the whole run.
async fn stream_and_render<F, Fut, I>(
    fetch: F,
    follow: Option<Section>,
    sessions: &SessionStore,
    interrupt: I,
) -> Result<RunEnd>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ByteStream>>,
    I: Future<Output = io::Result<()>>,
{
    let controller = TutorStream::new();
    let mut updates = controller.subscribe();
    let mut follower = follow.map(LiveFollower::new);
    let show_progress = follower.is_none() && io::stderr().is_terminal();
    let mut interrupted = false;

    let run = controller.start_stream(fetch);
    tokio::pin!(run);
    tokio::pin!(interrupt);

    let outcome = loop {
        tokio::select! {
            outcome = &mut run => break outcome,
            Ok(()) = updates.changed() => {
                let state = updates.borrow_and_update();
                if let Some(follower) = follower.as_mut() {
                    if let Some(delta) = follower.delta(&state) {
                        let mut stdout = io::stdout().lock();
                        stdout.write_all(delta.as_bytes())?;
                        stdout.flush()?;
                    }
                } else if show_progress {
                    eprint!("\r\x1b[2K{}", progress_line(&state));
                }
            }
            signal = &mut interrupt, if !interrupted => {
                interrupted = true;
                if let Err(e) = signal {
                    warn!("Interrupt handler failed: {}", e);
                } else {
                    controller.reset();
                }
            }
        }
    };

    if show_progress {
        eprint!("\r\x1b[2K");
    }

    let state = match outcome {
        StreamOutcome::Finished(state) => state,
        StreamOutcome::Cancelled => {
            eprintln!("Interrupted");
            return Ok(RunEnd::Interrupted);
        }
    };

    let mut stdout = io::stdout().lock();
    if follow.is_some() {
        writeln!(stdout)?;
        writeln!(stdout)?;
    }
    write_final(&mut stdout, &state, follow)?;

    if let Some(id) = &state.session_id {
        if let Err(e) = sessions.store(id).await {
            warn!("Failed to cache session id: {:#}", e);
        }
    }

    Ok(if state.overall.error.is_some() {
        RunEnd::Failed
    } else {
        RunEnd::Finished
    })
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    fn scratch_sessions() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let sessions = SessionStore::new(dir.path());
        (dir, sessions)
    }

    #[tokio::test]
    async fn test_interrupt_resets_a_silent_stream() {
        let (_dir, sessions) = scratch_sessions();
        let code = stream_and_render(
            || async { Ok::<ByteStream, anyhow::Error>(futures::stream::pending().boxed()) },
            None,
            &sessions,
            async { Ok::<(), io::Error>(()) },
        )
        .await
        .unwrap();
        assert_eq!(code, RunEnd::Interrupted);
    }

    #[tokio::test]
    async fn test_finished_stream_stores_session_id() {
        let (_dir, sessions) = scratch_sessions();
        let body = "event: reading_token\ndata: {\"token\":\"A\"}\n\nevent: done\ndata: {\"session_id\":\"s-42\"}\n\n";
        let code = stream_and_render(
            || async move {
                let chunks = [Ok(bytes::Bytes::from_static(body.as_bytes()))];
                Ok::<ByteStream, anyhow::Error>(futures::stream::iter(chunks).boxed())
            },
            None,
            &sessions,
            std::future::pending::<io::Result<()>>(),
        )
        .await
        .unwrap();
        assert_eq!(code, RunEnd::Finished);
        assert_eq!(sessions.load().await.as_deref(), Some("s-42"));
    }

    #[tokio::test]
    async fn test_failed_stream_exits_non_zero() {
        let (_dir, sessions) = scratch_sessions();
        let code = stream_and_render(
            || async { Err::<ByteStream, _>(anyhow!("connection refused")) },
            None,
            &sessions,
            std::future::pending::<io::Result<()>>(),
        )
        .await
        .unwrap();
        assert_eq!(code, RunEnd::Failed);
    }
}
