use std::error::Error as StdError;
use std::fmt;

use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{GenerateContentRequest, GenerateContentResponse};
use crate::core::message::Source;
use crate::utils::url::stream_generate_url;

/// Failure of one exchange with the model endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// No API key is configured.
    MissingCredential,
    /// The request could not be sent or the body could not be read.
    Http(String),
    /// The endpoint answered with an error document.
    Api {
        status: Option<u16>,
        message: String,
    },
}

impl ExchangeError {
    /// Whether the failure should route the user to the setup help. Besides
    /// a missing key this covers endpoint errors that mention the API key.
    pub fn is_missing_credential(&self) -> bool {
        match self {
            ExchangeError::MissingCredential => true,
            ExchangeError::Api { message, .. } => {
                let lower = message.to_ascii_lowercase();
                lower.contains("api key") || lower.contains("api_key")
            }
            ExchangeError::Http(_) => false,
        }
    }
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeError::MissingCredential => write!(f, "API_KEY_MISSING"),
            ExchangeError::Http(message) => write!(f, "HTTP error: {message}"),
            ExchangeError::Api {
                status: Some(status),
                message,
            } => write!(f, "API error ({status}): {message}"),
            ExchangeError::Api {
                status: None,
                message,
            } => write!(f, "API error: {message}"),
        }
    }
}

impl StdError for ExchangeError {}

#[derive(Clone, Debug)]
pub enum StreamMessage {
    /// Newly received text plus any citations attached to the same chunk.
    Fragment { text: String, sources: Vec<Source> },
    Error(ExchangeError),
    End,
}

type StreamSender = mpsc::UnboundedSender<(StreamMessage, u64)>;

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn handle_data_payload(payload: &str, tx: &StreamSender, stream_id: u64) -> bool {
    if payload.trim().is_empty() {
        return false;
    }

    let value = match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) => value,
        Err(err) => {
            warn!(stream_id, "unparsable stream payload: {err}");
            let _ = tx.send((StreamMessage::Error(api_error(None, payload)), stream_id));
            let _ = tx.send((StreamMessage::End, stream_id));
            return true;
        }
    };

    if value.get("error").is_some() {
        let _ = tx.send((StreamMessage::Error(api_error(None, payload)), stream_id));
        let _ = tx.send((StreamMessage::End, stream_id));
        return true;
    }

    match serde_json::from_value::<GenerateContentResponse>(value) {
        Ok(response) => {
            let text = response.text().unwrap_or_default();
            let sources: Vec<Source> = response
                .web_sources()
                .into_iter()
                .map(|(uri, title)| Source::new(uri, title))
                .collect();
            if !text.is_empty() || !sources.is_empty() {
                let _ = tx.send((StreamMessage::Fragment { text, sources }, stream_id));
            }
            false
        }
        Err(err) => {
            debug!(stream_id, "skipping chunk with unexpected shape: {err}");
            false
        }
    }
}

fn process_sse_line(line: &str, tx: &StreamSender, stream_id: u64) -> bool {
    extract_data_payload(line)
        .map(|payload| handle_data_payload(payload, tx, stream_id))
        .unwrap_or(false)
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Builds an [`ExchangeError::Api`] from an error body, preferring the
/// human readable message inside a JSON error document.
fn api_error(status: Option<u16>, body: &str) -> ExchangeError {
    let trimmed = body.trim();
    let message = serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|value| extract_error_summary(&value))
        .filter(|summary| !summary.is_empty())
        .unwrap_or_else(|| {
            if trimmed.is_empty() {
                "<empty>".to_string()
            } else {
                trimmed.to_string()
            }
        });
    ExchangeError::Api { status, message }
}

pub struct StreamParams {
    pub client: reqwest::Client,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub request: GenerateContentRequest,
    pub cancel_token: tokio_util::sync::CancellationToken,
    pub stream_id: u64,
}

#[derive(Clone)]
pub struct ChatStreamService {
    tx: StreamSender,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_stream(&self, params: StreamParams) {
        let tx_clone = self.tx.clone();
        tokio::spawn(async move {
            let StreamParams {
                client,
                base_url,
                api_key,
                model,
                request,
                cancel_token,
                stream_id,
            } = params;

            let Some(api_key) = api_key.filter(|key| !key.trim().is_empty()) else {
                let _ = tx_clone.send((StreamMessage::Error(ExchangeError::MissingCredential), stream_id));
                let _ = tx_clone.send((StreamMessage::End, stream_id));
                return;
            };

            tokio::select! {
                _ = async {
                    let url = stream_generate_url(&base_url, &model);
                    debug!(stream_id, %model, "starting stream");
                    let http_request = client
                        .post(url)
                        .header("Content-Type", "application/json")
                        .header("x-goog-api-key", api_key);

                    match http_request.json(&request).send().await {
                        Ok(response) => {
                            let status = response.status();
                            if !status.is_success() {
                                let error_text = response
                                    .text()
                                    .await
                                    .unwrap_or_else(|_| "<no body>".to_string());
                                let error = api_error(Some(status.as_u16()), &error_text);
                                let _ = tx_clone.send((StreamMessage::Error(error), stream_id));
                                let _ = tx_clone.send((StreamMessage::End, stream_id));
                                return;
                            }

                            let mut stream = response.bytes_stream();
                            let mut buffer: Vec<u8> = Vec::new();

                            while let Some(chunk) = stream.next().await {
                                if cancel_token.is_cancelled() {
                                    return;
                                }

                                let chunk_bytes = match chunk {
                                    Ok(bytes) => bytes,
                                    Err(err) => {
                                        let _ = tx_clone.send((
                                            StreamMessage::Error(ExchangeError::Http(err.to_string())),
                                            stream_id,
                                        ));
                                        let _ = tx_clone.send((StreamMessage::End, stream_id));
                                        return;
                                    }
                                };
                                buffer.extend_from_slice(&chunk_bytes);

                                while let Some(newline_pos) = memchr(b'\n', &buffer) {
                                    let line_str = match std::str::from_utf8(&buffer[..newline_pos]) {
                                        Ok(s) => s.trim(),
                                        Err(e) => {
                                            warn!(stream_id, "invalid UTF-8 in stream: {e}");
                                            buffer.drain(..=newline_pos);
                                            continue;
                                        }
                                    };

                                    let should_end = process_sse_line(line_str, &tx_clone, stream_id);
                                    buffer.drain(..=newline_pos);
                                    if should_end {
                                        return;
                                    }
                                }
                            }

                            if let Ok(rest) = std::str::from_utf8(&buffer) {
                                if process_sse_line(rest.trim(), &tx_clone, stream_id) {
                                    return;
                                }
                            }
                            debug!(stream_id, "stream finished");
                            let _ = tx_clone.send((StreamMessage::End, stream_id));
                        }
                        Err(e) => {
                            let _ = tx_clone.send((
                                StreamMessage::Error(ExchangeError::Http(e.to_string())),
                                stream_id,
                            ));
                            let _ = tx_clone.send((StreamMessage::End, stream_id));
                        }
                    }
                } => {}
                _ = cancel_token.cancelled() => {}
            }
        });
    }
}
