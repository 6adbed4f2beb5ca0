//! SSE parsing for OpenAI-compatible streaming responses.
//!
//! Buffers raw bytes into complete `data:` lines before parsing — network
//! chunk boundaries do not align with SSE event boundaries.

use futures::{Stream, StreamExt};
use std::pin::Pin;

use fireside_core::{Error, Result};

use super::types::ChatCompletionChunk;
use crate::provider::{ChunkStream, StreamChunk, TokenUsage};

struct SseState {
    inner: Pin<Box<dyn Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Send>>,
    buf: String,
    usage: Option<TokenUsage>,
    finished: bool,
}

/// Convert a raw byte stream into a stream of [`StreamChunk`]s.
///
/// Emits `Delta` for each content fragment and a final `Done` (carrying
/// usage when the provider reported it) on `[DONE]` or end-of-stream.
pub fn parse_sse_stream(
    stream: impl Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
) -> ChunkStream {
    let state = SseState {
        inner: Box::pin(stream),
        buf: String::new(),
        usage: None,
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut st| async move {
        if st.finished {
            return None;
        }
        loop {
            // Drain complete lines already buffered
            while let Some(pos) = st.buf.find('\n') {
                let line: String = st.buf.drain(..=pos).collect();
                match parse_sse_line(line.trim(), &mut st.usage) {
                    LineResult::Skip => continue,
                    LineResult::Delta(content) => {
                        return Some((Ok(StreamChunk::Delta(content)), st));
                    }
                    LineResult::Done => {
                        st.finished = true;
                        return Some((Ok(StreamChunk::Done(st.usage.take())), st));
                    }
                    LineResult::Error(e) => {
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                }
            }

            // Need more bytes
            match st.inner.next().await {
                Some(Ok(bytes)) => st.buf.push_str(&String::from_utf8_lossy(&bytes)),
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(super::map_transport_err(e)), st));
                }
                // Provider closed without [DONE]; treat as graceful end
                None => {
                    st.finished = true;
                    return Some((Ok(StreamChunk::Done(st.usage.take())), st));
                }
            }
        }
    }))
}

enum LineResult {
    Skip,
    Delta(String),
    Done,
    Error(Error),
}

fn parse_sse_line(line: &str, usage: &mut Option<TokenUsage>) -> LineResult {
    // Skip blanks and comments
    if line.is_empty() || line.starts_with(':') {
        return LineResult::Skip;
    }
    let Some(data) = line.strip_prefix("data:") else {
        return LineResult::Skip;
    };
    let data = data.trim_start();

    if data == "[DONE]" {
        return LineResult::Done;
    }

    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => {
            if let Some(u) = chunk.usage {
                *usage = Some(u.into());
            }
            let mut content = String::new();
            for choice in chunk.choices {
                if let Some(c) = choice.delta.content {
                    content.push_str(&c);
                }
            }
            if content.is_empty() {
                LineResult::Skip
            } else {
                LineResult::Delta(content)
            }
        }
        Err(e) => LineResult::Error(Error::MalformedResponse(format!(
            "unparseable SSE chunk: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn bytes_stream(
        parts: Vec<&'static str>,
    ) -> impl Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> {
        stream::iter(
            parts
                .into_iter()
                .map(|p| Ok(bytes::Bytes::from_static(p.as_bytes()))),
        )
    }

    async fn collect(parts: Vec<&'static str>) -> Vec<Result<StreamChunk>> {
        parse_sse_stream(bytes_stream(parts)).collect().await
    }

    #[tokio::test]
    async fn single_delta_then_done() {
        let chunks = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
            "data: [DONE]\n",
        ])
        .await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(
            chunks[0].as_ref().unwrap(),
            &StreamChunk::Delta("Hello".to_string())
        );
        assert_eq!(chunks[1].as_ref().unwrap(), &StreamChunk::Done(None));
    }

    #[tokio::test]
    async fn line_split_across_network_chunks() {
        let chunks = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"con",
            "tent\":\"Hi\"}}]}\n\ndata: [DONE]\n",
        ])
        .await;
        assert_eq!(
            chunks[0].as_ref().unwrap(),
            &StreamChunk::Delta("Hi".to_string())
        );
        assert_eq!(chunks[1].as_ref().unwrap(), &StreamChunk::Done(None));
    }

    #[tokio::test]
    async fn role_only_delta_skipped() {
        let chunks = collect(vec![
            "data: {\"choices\":[{\"delta\":{}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n",
            "data: [DONE]\n",
        ])
        .await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(
            chunks[0].as_ref().unwrap(),
            &StreamChunk::Delta("x".to_string())
        );
    }

    #[tokio::test]
    async fn usage_carried_into_done() {
        let chunks = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"y\"}}],\"usage\":null}\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":5}}\n",
            "data: [DONE]\n",
        ])
        .await;
        let last = chunks.last().unwrap().as_ref().unwrap();
        assert_eq!(
            last,
            &StreamChunk::Done(Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5
            }))
        );
    }

    #[tokio::test]
    async fn eof_without_done_marker_is_graceful() {
        let chunks = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n",
        ])
        .await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].as_ref().unwrap(), &StreamChunk::Done(None));
    }

    #[tokio::test]
    async fn invalid_json_yields_error() {
        let chunks = collect(vec!["data: {not json}\n"]).await;
        assert!(chunks[0].is_err());
    }

    #[tokio::test]
    async fn comments_and_blank_lines_ignored() {
        let chunks = collect(vec![
            ": keep-alive\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
            "data: [DONE]\n",
        ])
        .await;
        assert_eq!(chunks.len(), 2);
    }
}
