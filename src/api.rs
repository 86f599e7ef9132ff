//! Text generation through a local Ollama server.
//!
//! This module provides the single summarization call used by the digest
//! stage. Generation failures never abort a run: [`summarize`] logs them
//! and hands back an empty string, so one bad group costs only its own
//! summary.
//!
//! # Architecture
//!
//! - [`AskAsync`]: Core trait defining async text generation
//! - [`OllamaAsk`]: Sends prompts to Ollama's `generate` endpoint
//!
//! No timeout is added on top of the client's own; a hung server blocks
//! the run.

use crate::config::LlmConfig;
use crate::utils::truncate_for_log;
use ollama_rs::Ollama;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::models::ModelOptions;
use std::error::Error;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Trait for async text generation.
///
/// Implementors send a prompt to a model and return its raw text answer.
/// This abstraction allows the digest stage to run against any backend.
pub trait AskAsync {
    /// Send `prompt` to the model and return the generated text.
    async fn ask(&self, prompt: &str) -> Result<String, Box<dyn Error>>;
}

/// [`AskAsync`] implementation backed by `ollama-rs`.
///
/// Generation is near-deterministic (low temperature) and bounded in both
/// context size and output length.
#[derive(Debug, Clone)]
pub struct OllamaAsk {
    client: Ollama,
    model: String,
    temperature: f32,
    context_window: u64,
    max_tokens: i32,
}

impl OllamaAsk {
    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn Error>> {
        let url = Url::parse(&config.url)?;
        info!(url = %url, model = %config.model, "Using Ollama for text generation");
        Ok(Self {
            client: Ollama::from_url(url),
            model: config.model.clone(),
            temperature: config.temperature,
            context_window: config.context_window,
            max_tokens: config.max_tokens,
        })
    }

    fn options(&self) -> ModelOptions {
        ModelOptions::default()
            .temperature(self.temperature)
            .num_ctx(self.context_window)
            .num_predict(self.max_tokens)
    }
}

impl AskAsync for OllamaAsk {
    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn ask(&self, prompt: &str) -> Result<String, Box<dyn Error>> {
        let t0 = Instant::now();
        let request =
            GenerationRequest::new(self.model.clone(), prompt.to_string()).options(self.options());
        let res = self.client.generate(request).await;
        let dt = t0.elapsed();

        match res {
            Ok(response) => {
                debug!(
                    elapsed_ms = dt.as_millis() as u128,
                    bytes = response.response.len(),
                    "Generation finished"
                );
                Ok(response.response)
            }
            Err(e) => {
                warn!(elapsed_ms = dt.as_millis() as u128, error = %e, "Generation request failed");
                Err(Box::new(e))
            }
        }
    }
}

/// Generate text for `prompt`, trimmed. Any failure yields `""`.
///
/// # Arguments
///
/// * `model` - The text generator to ask
/// * `prompt` - Complete prompt text
///
/// # Returns
///
/// The generated text without surrounding whitespace, or an empty string
/// when the request failed.
#[instrument(level = "info", skip_all)]
pub async fn summarize<A: AskAsync>(model: &A, prompt: &str) -> String {
    debug!(prompt = %truncate_for_log(prompt, 300), "Requesting summary");
    match model.ask(prompt).await {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!(error = %e, "Text generation failed; leaving summary empty");
            String::new()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays canned answers and records every prompt it receives.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedAsk {
        pub answers: Mutex<Vec<Result<String, String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedAsk {
        pub fn new(answers: Vec<Result<&str, &str>>) -> Self {
            Self {
                answers: Mutex::new(
                    answers
                        .into_iter()
                        .rev()
                        .map(|a| a.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl AskAsync for ScriptedAsk {
        async fn ask(&self, prompt: &str) -> Result<String, Box<dyn Error>> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.answers.lock().unwrap().pop() {
                Some(Ok(text)) => Ok(text),
                Some(Err(e)) => Err(e.into()),
                None => Err("connection refused".into()),
            }
        }
    }

    #[tokio::test]
    async fn test_summarize_trims_response() {
        let model = ScriptedAsk::new(vec![Ok("  Low flows dominate.\n")]);
        assert_eq!(summarize(&model, "prompt").await, "Low flows dominate.");
    }

    #[tokio::test]
    async fn test_summarize_failure_is_empty() {
        let model = ScriptedAsk::new(vec![Err("timeout")]);
        assert_eq!(summarize(&model, "prompt").await, "");
        assert_eq!(model.prompts.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_ollama_from_config_rejects_bad_url() {
        let config = LlmConfig {
            url: "not a url".into(),
            ..Default::default()
        };
        assert!(OllamaAsk::from_config(&config).is_err());
    }

    #[test]
    fn test_ollama_from_config() {
        let ask = OllamaAsk::from_config(&LlmConfig::default()).unwrap();
        assert_eq!(ask.model, "llama3");
        assert_eq!(ask.max_tokens, 350);
    }
}
