use std::pin::pin;

use scholarsight_chat::{InputBuffer, KeyInput, MessageStatus, Role, StreamingMessageAggregator};
use snafu::ResultExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};

use crate::error::{AppResult, TerminalSnafu};

const PROMPT: &str = "> ";
const CONTINUATION_PROMPT: &str = ". ";
const ASSISTANT_LABEL: &str = "Assistant: ";

/// Line-oriented chat loop over stdin. Ends on EOF.
pub async fn run_chat(chat: &mut StreamingMessageAggregator) -> AppResult<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input = InputBuffer::new();

    if let Some(welcome) = chat.transcript().last() {
        write_out(&mut stdout, &format!("{ASSISTANT_LABEL}{}\n", welcome.text)).await?;
    }
    write_out(
        &mut stdout,
        "Ask about the paper. End a line with \\ to continue it; Ctrl-D quits.\n",
    )
    .await?;

    loop {
        let prompt = if input.is_empty() { PROMPT } else { CONTINUATION_PROMPT };
        write_out(&mut stdout, prompt).await?;

        let Some(line) = lines.next_line().await.context(TerminalSnafu {
            stage: "read-question",
        })?
        else {
            break;
        };

        input.set_streaming(chat.is_busy());
        if let Some(question) = feed_line(&mut input, &line) {
            answer(chat, &question, &mut stdout).await?;
        }
    }

    write_out(&mut stdout, "\n").await
}

/// Types one terminal line into the buffer. A trailing `\` acts as Shift+Enter.
pub fn feed_line(input: &mut InputBuffer, line: &str) -> Option<String> {
    let (body, continued) = match line.strip_suffix('\\') {
        Some(body) => (body, true),
        None => (line, false),
    };
    for ch in body.chars() {
        input.handle_key(KeyInput::Char(ch));
    }

    let submitted = input.handle_key(KeyInput::Enter { shift: continued });
    if submitted.is_none() && !continued && !input.is_streaming() {
        input.clear();
    }
    submitted
}

async fn answer(
    chat: &mut StreamingMessageAggregator,
    question: &str,
    stdout: &mut Stdout,
) -> AppResult<()> {
    let Some(pending) = chat.submit(question) else {
        if let Some(last) = chat.transcript().last().filter(|m| m.role == Role::Model) {
            write_out(stdout, &format!("{ASSISTANT_LABEL}{}\n", last.text)).await?;
        }
        return Ok(());
    };

    let message_id = pending.target().message_id;
    let mut frames = chat.subscribe();
    frames.borrow_and_update();
    write_out(stdout, ASSISTANT_LABEL).await?;

    let mut printed = 0;
    {
        let mut reply = pin!(chat.stream_reply(pending));
        loop {
            tokio::select! {
                _ = &mut reply => break,
                changed = frames.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let tail = frames.borrow_and_update().tail.clone();
                    if let Some(message) = tail.filter(|m| m.id == message_id && m.is_streaming()) {
                        printed = write_suffix(stdout, &message.text, printed).await?;
                    }
                }
            }
        }
    }

    if let Some(message) = chat.transcript().get(message_id) {
        if message.status == MessageStatus::Failed {
            let separator = if printed > 0 { "\n" } else { "" };
            write_out(stdout, &format!("{separator}{}", message.text)).await?;
        } else {
            write_suffix(stdout, &message.text, printed).await?;
        }
    }
    write_out(stdout, "\n").await
}

async fn write_suffix(stdout: &mut Stdout, text: &str, printed: usize) -> AppResult<usize> {
    if let Some(suffix) = text.get(printed..)
        && !suffix.is_empty()
    {
        write_out(stdout, suffix).await?;
        return Ok(text.len());
    }
    Ok(printed)
}

async fn write_out(stdout: &mut Stdout, text: &str) -> AppResult<()> {
    stdout.write_all(text.as_bytes()).await.context(TerminalSnafu {
        stage: "write-answer",
    })?;
    stdout.flush().await.context(TerminalSnafu {
        stage: "flush-answer",
    })
}
