//! Interactive chat loop
//!
//! Reads stdin line by line and drives the session controller from one
//! `tokio::select!` loop: input, Ctrl-C and the next stream step race each
//! other, so an abort is picked up between any two chunks.

use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tracing::{info, warn};

use sidechat_core::{
    ChatBackend, ChatTurn, SendOutcome, SessionController, SessionEvent,
};

use crate::input::{Input, HELP};
use crate::render;

/// What the loop should do after handling a line
enum Flow {
    Continue,
    Quit,
}

/// Run the chat until the user quits or stdin closes
pub async fn run<B: ChatBackend + 'static>(mut controller: SessionController<B>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut events = controller.subscribe_events();
    let mut turns = controller.subscribe_turns();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut images: Vec<String> = Vec::new();

    if !controller.backend().health_check().await {
        warn!(backend = controller.backend().name(), "Backend health check failed");
        write(
            &mut stdout,
            "[warning] Model server not reachable, replies will fail until it is up\n",
        )
        .await?;
    }

    replay(&controller, &mut stdout).await?;
    match controller.model() {
        Some(model) => write(&mut stdout, &format!("Chatting with {model}. /help for commands.\n")).await?,
        None => write(&mut stdout, "No model selected, pick one with /model NAME.\n").await?,
    }

    loop {
        tokio::select! {
            biased;
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                if !controller.abort() {
                    info!("Ctrl-C while idle, leaving");
                    break;
                }
            }
            line = lines.next_line() => {
                let line = line.context("Failed to read stdin")?;
                let Some(line) = line else {
                    break;
                };
                let flow = handle_line(&mut controller, &mut images, &line, &mut stdout).await?;
                if matches!(flow, Flow::Quit) {
                    break;
                }
            }
            _ = controller.next_step(), if controller.is_generating() => {}
        }

        flush_output(&controller, &mut events, &mut turns, &mut stdout).await?;
    }

    // Leaving mid-reply records it as aborted
    if controller.abort() {
        controller.run_to_completion().await;
    }
    controller.flush_history().await;
    flush_output(&controller, &mut events, &mut turns, &mut stdout).await?;

    Ok(())
}

async fn handle_line<B: ChatBackend + 'static>(
    controller: &mut SessionController<B>,
    images: &mut Vec<String>,
    line: &str,
    stdout: &mut Stdout,
) -> Result<Flow> {
    match Input::parse(line) {
        Input::Empty => {}
        Input::Quit => return Ok(Flow::Quit),
        Input::Help => write(stdout, &format!("{HELP}\n")).await?,
        Input::Status => {
            let line = render::status_line(
                controller.state(),
                controller.model(),
                controller.store().len(),
                controller.stream_stats(),
            );
            write(stdout, &format!("{line}\n")).await?;
        }
        Input::Invalid(message) => write(stdout, &format!("{message}\n")).await?,
        Input::Abort => {
            if !controller.abort() {
                write(stdout, "Nothing to abort\n").await?;
            }
        }
        Input::Model(model) => {
            controller.set_model(model.as_str());
            write(stdout, &format!("Model set to {model}\n")).await?;
        }
        Input::Image(path) => match encode_image(&path).await {
            Ok(encoded) => {
                images.push(encoded);
                write(
                    stdout,
                    &format!("Attached {} ({} pending)\n", path.display(), images.len()),
                )
                .await?;
            }
            Err(e) => write(stdout, &format!("[error] {e:#}\n")).await?,
        },
        Input::Message(content) => {
            let attached = (!images.is_empty()).then(|| images.clone());
            match controller.send(content, attached).await {
                SendOutcome::Started => images.clear(),
                SendOutcome::Ignored(reason) => {
                    write(stdout, &format!("{}\n", reason.hint())).await?;
                }
            }
        }
    }
    Ok(Flow::Continue)
}

/// Read an image and encode it the way the model server expects
async fn encode_image(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Print the conversation restored from history
async fn replay<B: ChatBackend + 'static>(
    controller: &SessionController<B>,
    stdout: &mut Stdout,
) -> Result<()> {
    let turns = controller.store().snapshot();
    if turns.is_empty() {
        return Ok(());
    }
    let text: String = turns.iter().map(render::history_line).collect();
    write(stdout, &text).await?;
    write(stdout, "--- restored conversation ---\n").await
}

/// Write everything the controller reported since the last call
async fn flush_output<B: ChatBackend + 'static>(
    controller: &SessionController<B>,
    events: &mut tokio::sync::mpsc::UnboundedReceiver<SessionEvent>,
    turns: &mut tokio::sync::mpsc::UnboundedReceiver<ChatTurn>,
    stdout: &mut Stdout,
) -> Result<()> {
    let mut text = String::new();
    while let Ok(event) = events.try_recv() {
        if let Some(rendered) = render::event_text(&event, controller.model()) {
            text.push_str(&rendered);
        }
    }
    while let Ok(turn) = turns.try_recv() {
        if let Some(rendered) = render::turn_text(&turn) {
            text.push_str(&rendered);
        }
    }
    if !text.is_empty() {
        write(stdout, &text).await?;
    }
    Ok(())
}

async fn write(stdout: &mut Stdout, text: &str) -> Result<()> {
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
