use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use snafu::ResultExt;

use crate::provider::{
    ApiReportedSnafu, ChatFragment, ChunkDecodeSnafu, FragmentStream, ProviderError,
    ProviderResult,
};
use crate::wire::GenerateContentResponse;

/// Splits a byte stream into lines; chunk boundaries may fall anywhere.
#[derive(Debug, Default)]
pub(crate) struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(position) = self.pending.iter().position(|byte| *byte == b'\n') {
            let raw = self.pending.drain(..=position).collect::<Vec<_>>();
            lines.push(decode_line(&raw[..raw.len() - 1]));
        }
        lines
    }

    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Some(decode_line(&raw))
    }
}

fn decode_line(raw: &[u8]) -> String {
    let line = String::from_utf8_lossy(raw);
    line.strip_suffix('\r').unwrap_or(&line).to_string()
}

/// Maps one SSE line to a fragment. Comments, event names and blank
/// separators yield `None`.
pub(crate) fn parse_data_line(line: &str) -> Option<ProviderResult<ChatFragment>> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    let response = match serde_json::from_str::<GenerateContentResponse>(data).context(
        ChunkDecodeSnafu {
            stage: "decode-sse-chunk",
        },
    ) {
        Ok(response) => response,
        Err(error) => return Some(Err(error)),
    };

    if let Some(error) = response.error {
        return Some(
            ApiReportedSnafu {
                stage: "read-sse-chunk",
                details: error.describe(),
            }
            .fail(),
        );
    }

    Some(Ok(ChatFragment::from_optional(response.text())))
}

struct SseState<S> {
    bytes: Pin<Box<S>>,
    lines: SseLineBuffer,
    ready: VecDeque<ProviderResult<ChatFragment>>,
    finished: bool,
}

impl<S> SseState<S> {
    fn queue_lines(&mut self, lines: impl IntoIterator<Item = String>) {
        for line in lines {
            if let Some(item) = parse_data_line(&line) {
                let failed = item.is_err();
                self.ready.push_back(item);
                if failed {
                    // Nothing after a broken chunk is trustworthy.
                    self.finished = true;
                    return;
                }
            }
        }
    }
}

/// Turns a server-sent-events byte stream into a fragment stream.
///
/// The first transport or decode error is yielded and ends the stream.
pub fn fragment_stream<S, B, E>(bytes: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = SseState {
        bytes: Box::pin(bytes),
        lines: SseLineBuffer::default(),
        ready: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let lines = state.lines.push(chunk.as_ref());
                    state.queue_lines(lines);
                }
                Some(Err(error)) => {
                    tracing::warn!(error = %error, "generation stream transport failed");
                    state.finished = true;
                    state.ready.push_back(Err(ProviderError::StreamTransport {
                        stage: "read-sse-bytes",
                        details: error.to_string(),
                    }));
                }
                None => {
                    let tail = state.lines.finish();
                    state.queue_lines(tail);
                    state.finished = true;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> String {
        format!(
            "data: {{\"candidates\":[{{\"content\":{{\"role\":\"model\",\"parts\":[{{\"text\":{}}}]}}}}]}}\r\n\r\n",
            serde_json::to_string(text).unwrap()
        )
    }

    async fn collect(stream: FragmentStream) -> Vec<ProviderResult<ChatFragment>> {
        stream.collect::<Vec<_>>().await
    }

    #[test]
    fn line_buffer_handles_split_chunks() {
        let mut buffer = SseLineBuffer::default();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        assert_eq!(buffer.push(b":1}\r\nda"), vec!["data: {\"a\":1}".to_string()]);
        assert_eq!(buffer.finish().as_deref(), Some("da"));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn non_data_lines_are_skipped() {
        assert!(parse_data_line("").is_none());
        assert!(parse_data_line(": keep-alive").is_none());
        assert!(parse_data_line("event: message").is_none());
        assert!(parse_data_line("data: [DONE]").is_none());
    }

    #[tokio::test]
    async fn fragments_follow_delivery_order_across_chunk_boundaries() {
        let body = format!(
            "{}{}{}",
            chunk("The "),
            chunk("authors used "),
            chunk("the CIFAR-10 dataset.")
        );
        let (head, tail) = body.split_at(37);
        let bytes = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(head.as_bytes().to_vec()),
            Ok(tail.as_bytes().to_vec()),
        ]);

        let texts = collect(fragment_stream(bytes))
            .await
            .into_iter()
            .map(|item| item.unwrap().text().to_string())
            .collect::<Vec<_>>();

        assert_eq!(texts, vec!["The ", "authors used ", "the CIFAR-10 dataset."]);
    }

    #[tokio::test]
    async fn chunk_without_text_becomes_empty_fragment() {
        let bytes = futures::stream::iter(vec![Ok::<_, std::io::Error>(
            b"data: {\"candidates\":[{\"finishReason\":\"STOP\"}]}\n".to_vec(),
        )]);

        let items = collect(fragment_stream(bytes)).await;

        assert_eq!(items.len(), 1);
        let fragment = items.into_iter().next().unwrap().unwrap();
        assert!(!fragment.has_text());
        assert_eq!(fragment.text(), "");
    }

    #[tokio::test]
    async fn transport_error_ends_stream_after_earlier_fragments() {
        let bytes = futures::stream::iter(vec![
            Ok(chunk("partial").into_bytes()),
            Err(std::io::Error::other("connection reset")),
            Ok(chunk("never seen").into_bytes()),
        ]);

        let items = collect(fragment_stream(bytes)).await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().text(), "partial");
        assert!(matches!(
            items[1],
            Err(ProviderError::StreamTransport { .. })
        ));
    }

    #[tokio::test]
    async fn in_band_error_chunk_fails_the_stream() {
        let body = format!(
            "{}data: {{\"error\":{{\"code\":500,\"message\":\"Internal error\",\"status\":\"INTERNAL\"}}}}\n\n{}",
            chunk("partial"),
            chunk("never seen")
        );
        let bytes = futures::stream::iter(vec![Ok::<_, std::io::Error>(body.into_bytes())]);

        let items = collect(fragment_stream(bytes)).await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().text(), "partial");
        match &items[1] {
            Err(ProviderError::ApiReported { details, .. }) => {
                assert!(details.contains("INTERNAL"));
            }
            other => panic!("expected a reported error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_chunk_is_reported_once() {
        let bytes = futures::stream::iter(vec![Ok::<_, std::io::Error>(
            b"data: {not json}\ndata: {}\n".to_vec(),
        )]);

        let items = collect(fragment_stream(bytes)).await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(ProviderError::ChunkDecode { .. })));
    }
}
