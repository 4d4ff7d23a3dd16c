use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::{BackendError, FragmentSource, FragmentStream};
use crate::models::{GenerationRequest, SummaryStyle};

/// Summaries from a local Ollama model, streamed from `/api/generate`.
pub struct OllamaSource {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One NDJSON line of a streaming generate response.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

impl OllamaSource {
    pub fn new(ai_url: &str, model: &str) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BackendError::new(format!("Ollama client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", ai_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }

    pub fn instruction(style: SummaryStyle) -> &'static str {
        match style {
            SummaryStyle::Concise => {
                "You summarize blog posts. Write one short paragraph of plain prose \
                 covering only the main points. No headings, no lists."
            }
            SummaryStyle::Detailed => {
                "You summarize blog posts. Write two to four paragraphs of plain prose \
                 covering the argument, the supporting evidence and the conclusion. \
                 Separate paragraphs with a blank line. No headings, no lists."
            }
        }
    }
}

#[async_trait]
impl FragmentSource for OllamaSource {
    async fn fragments(&self, request: &GenerationRequest) -> Result<FragmentStream, BackendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateBody {
                model: &self.model,
                system: Self::instruction(request.style),
                prompt: &request.content,
                stream: true,
            })
            .send()
            .await
            .map_err(|e| BackendError::new(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::new(format!("Ollama returned {}: {}", status, body)));
        }

        log::debug!("🤖 {} streaming from {}", self.model, self.endpoint);
        Ok(words_from_ndjson(response.bytes_stream()))
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

/// Turns a streaming generate body into words. Lines may be split across
/// chunks and tokens may be split across words.
fn words_from_ndjson<S, E>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut body = Box::pin(body);
        let mut line = Vec::new();
        let mut words = WordSplitter::default();
        let mut done = false;

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(BackendError::new(e.to_string()));
                    return;
                }
            };

            for &byte in chunk.iter() {
                if byte != b'\n' {
                    line.push(byte);
                    continue;
                }
                match parse_line(&line) {
                    Ok(Some(parsed)) => {
                        done |= parsed.done;
                        for word in words.push(&parsed.response) {
                            yield Ok(word);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
                line.clear();
            }
        }

        match parse_line(&line) {
            Ok(Some(parsed)) => {
                done |= parsed.done;
                for word in words.push(&parsed.response) {
                    yield Ok(word);
                }
            }
            Ok(None) => {}
            Err(e) => {
                yield Err(e);
                return;
            }
        }

        if !done {
            yield Err(BackendError::new("Ollama stream ended before completion"));
            return;
        }
        for word in words.finish() {
            yield Ok(word);
        }
    };
    Box::pin(stream)
}

fn parse_line(line: &[u8]) -> Result<Option<GenerateChunk>, BackendError> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let chunk: GenerateChunk = serde_json::from_slice(line)
        .map_err(|e| BackendError::new(format!("Malformed Ollama chunk: {}", e)))?;
    match chunk.error {
        Some(error) => Err(BackendError::new(error)),
        None => Ok(Some(chunk)),
    }
}

/// Re-splits model tokens on single spaces. Leading and trailing whitespace of
/// the whole completion is dropped; runs of spaces inside it survive as empty
/// words.
#[derive(Debug, Default)]
struct WordSplitter {
    pending: String,
    blanks: usize,
    started: bool,
}

impl WordSplitter {
    fn push(&mut self, token: &str) -> Vec<String> {
        self.pending.push_str(token);
        if !self.started {
            let lead = self.pending.len() - self.pending.trim_start().len();
            self.pending.replace_range(..lead, "");
            if self.pending.is_empty() {
                return Vec::new();
            }
            self.started = true;
        }

        let mut words = Vec::new();
        while let Some(idx) = self.pending.find(' ') {
            let word: String = self.pending.drain(..idx).collect();
            self.pending.remove(0);
            self.emit(word, &mut words);
        }
        words
    }

    fn finish(mut self) -> Vec<String> {
        let last = self.pending.trim_end().to_string();
        let mut words = Vec::new();
        if !last.is_empty() {
            self.emit(last, &mut words);
        }
        words
    }

    fn emit(&mut self, word: String, words: &mut Vec<String>) {
        if word.is_empty() {
            self.blanks += 1;
            return;
        }
        words.extend(std::iter::repeat_n(String::new(), self.blanks));
        self.blanks = 0;
        words.push(word);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ndjson(tokens: &[&str]) -> String {
        let mut body = String::new();
        for token in tokens {
            body.push_str(&serde_json::json!({"response": token, "done": false}).to_string());
            body.push('\n');
        }
        body.push_str("{\"response\":\"\",\"done\":true}\n");
        body
    }

    fn chunked(body: &str, size: usize) -> Vec<Result<Bytes, String>> {
        body.as_bytes()
            .chunks(size)
            .map(|piece| Ok(Bytes::copy_from_slice(piece)))
            .collect()
    }

    async fn collect(items: Vec<Result<Bytes, String>>) -> Vec<Result<String, BackendError>> {
        words_from_ndjson(futures::stream::iter(items)).collect().await
    }

    #[test]
    fn test_instructions_differ_by_style() {
        assert_ne!(
            OllamaSource::instruction(SummaryStyle::Concise),
            OllamaSource::instruction(SummaryStyle::Detailed)
        );
    }

    #[test]
    fn test_client_builds_without_network() {
        let source = OllamaSource::new("http://127.0.0.1:11434/", "llama3.2").unwrap();
        assert_eq!(source.name(), "ollama");
        assert_eq!(source.endpoint, "http://127.0.0.1:11434/api/generate");
    }

    #[tokio::test]
    async fn test_tokens_are_resplit_into_words() {
        let body = ndjson(&[" Hel", "lo wor", "ld.", "\n\nBye", " now", "\n"]);
        for size in [1, 5, 7, body.len()] {
            let words: Vec<String> = collect(chunked(&body, size))
                .await
                .into_iter()
                .map(|w| w.unwrap())
                .collect();
            assert_eq!(words, vec!["Hello", "world.\n\nBye", "now"], "chunk size {size}");
        }
    }

    #[tokio::test]
    async fn test_double_spaces_survive_as_empty_words() {
        let words: Vec<String> = collect(chunked(&ndjson(&["a ", " b"]), 4))
            .await
            .into_iter()
            .map(|w| w.unwrap())
            .collect();
        assert_eq!(words, vec!["a", "", "b"]);
        assert_eq!(words.join(" "), "a  b");
    }

    #[tokio::test]
    async fn test_body_error_ends_with_err_item() {
        let body = "{\"response\":\"Hello there \",\"done\":false}\n";
        let mut items = chunked(body, 8);
        items.push(Err("connection reset".to_string()));

        let out = collect(items).await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], Ok("Hello".to_string()));
        assert_eq!(out[1], Ok("there".to_string()));
        assert_eq!(out[2], Err(BackendError::new("connection reset")));
    }

    #[tokio::test]
    async fn test_error_line_is_a_backend_error() {
        let body = "{\"response\":\"Partial \",\"done\":false}\n{\"error\":\"model not found\"}\n";
        let out = collect(chunked(body, 16)).await;
        assert_eq!(
            out,
            vec![Ok("Partial".to_string()), Err(BackendError::new("model not found"))]
        );
    }

    #[tokio::test]
    async fn test_malformed_line_fails() {
        let out = collect(chunked("not json\n", 64)).await;
        assert_eq!(out.len(), 1);
        assert!(out[0].as_ref().unwrap_err().message.contains("Malformed"));
    }

    #[tokio::test]
    async fn test_truncated_stream_fails() {
        let body = "{\"response\":\"Hello\",\"done\":false}\n";
        let out = collect(chunked(body, 64)).await;
        assert_eq!(
            out,
            vec![Err(BackendError::new("Ollama stream ended before completion"))]
        );
    }

    #[tokio::test]
    async fn test_final_line_without_newline() {
        let body = "{\"response\":\"One two\",\"done\":false}\n{\"response\":\"\",\"done\":true}";
        let words: Vec<String> = collect(chunked(body, 10))
            .await
            .into_iter()
            .map(|w| w.unwrap())
            .collect();
        assert_eq!(words, vec!["One", "two"]);
    }
}
