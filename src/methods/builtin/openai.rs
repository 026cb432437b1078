//! Chat-completion methods for OpenAI-compatible endpoints
//!
//! Both methods send the same short conversation to `<api_url>/chat/completions`;
//! `OpenAIChatStream` asks for a server-sent event stream and drains it chunk by
//! chunk, so the timed interval covers the whole generation.

use crate::methods::{ExecutableUnit, Method, MethodArgs};
use anyhow::{Context, Result};
use log::debug;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

const CONVERSATION: &[ChatMessage] = &[
    ChatMessage {
        role: "user",
        content: "Hey, how's your day going?",
    },
    ChatMessage {
        role: "assistant",
        content: "I'm just a language model, so I don't have days, but I'm here and ready to help! How about you?",
    },
    ChatMessage {
        role: "user",
        content: "I'm doing well! Quick question: What's the capital of Japan?",
    },
    ChatMessage {
        role: "assistant",
        content: "The capital of Japan is Tokyo.",
    },
    ChatMessage {
        role: "user",
        content: "Thanks! Can you summarize the theory of relativity and its implications in simple terms?",
    },
];

/// One non-streaming chat completion
///
/// Arguments: `api_url` (required), `api_key` (default `none`), `model`
/// (default `tgi`), `max_tokens` (default 1000), `temperature` (default 0.4).
#[derive(Debug, Clone)]
pub struct OpenAIChat {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAIChat {
    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_url.trim_end_matches('/'))
    }

    fn request(&self, stream: bool) -> ChatRequest<'_> {
        ChatRequest {
            model: &self.model,
            messages: CONVERSATION,
            stream,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    fn complete(&self, stream: bool) -> Result<Response> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.request(stream))
            .send()
            .with_context(|| format!("chat request to {} failed", self.endpoint()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            anyhow::bail!("chat request returned {}: {}", status, body);
        }
        Ok(response)
    }
}

impl Method for OpenAIChat {
    fn from_args(args: &MethodArgs) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: args.require("api_url")?.to_string(),
            api_key: args.get_or("api_key", "none").to_string(),
            model: args.get_or("model", "tgi").to_string(),
            max_tokens: args.parse_or("max_tokens", 1000)?,
            temperature: args.parse_or("temperature", 0.4)?,
        })
    }
}

impl ExecutableUnit for OpenAIChat {
    fn run(&mut self) -> Result<()> {
        let response = self.complete(false)?;
        let body: serde_json::Value = response.json().context("invalid chat completion body")?;
        debug!("chat completion id: {}", body["id"]);
        Ok(())
    }
}

/// One streaming chat completion, drained to the end
///
/// Takes the same arguments as [`OpenAIChat`].
#[derive(Debug, Clone)]
pub struct OpenAIChatStream {
    inner: OpenAIChat,
}

impl Method for OpenAIChatStream {
    fn from_args(args: &MethodArgs) -> Result<Self> {
        Ok(Self {
            inner: OpenAIChat::from_args(args)?,
        })
    }
}

impl ExecutableUnit for OpenAIChatStream {
    fn run(&mut self) -> Result<()> {
        let response = self.inner.complete(true)?;
        let chunks = drain_event_stream(BufReader::new(response))?;
        debug!("received {} streamed chunks", chunks);
        Ok(())
    }
}

/// Read `data:` events until `[DONE]` or end of stream
///
/// Returns the number of content deltas received.
fn drain_event_stream<R: BufRead>(reader: R) -> Result<usize> {
    let mut deltas = 0;

    for line in reader.lines() {
        let line = line.context("failed to read event stream")?;
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data == "[DONE]" {
            break;
        }
        if data.is_empty() {
            continue;
        }

        let chunk: StreamChunk =
            serde_json::from_str(data).with_context(|| format!("invalid stream chunk: {}", data))?;
        deltas += chunk
            .choices
            .iter()
            .filter(|choice| choice.delta.content.is_some())
            .count();
    }

    Ok(deltas)
}
