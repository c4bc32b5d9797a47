//! Blocking client for an OpenAI-compatible chat completion API.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::controls::{Controls, Sentiment};
use crate::error::RefineError;
use crate::wiki;

// --- OpenAI-compatible serde structs ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
pub(crate) struct ChatResponse {
    pub(crate) choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
pub(crate) struct ChatChoice {
    pub(crate) message: ChatResponseMessage,
}

#[derive(Deserialize)]
pub(crate) struct ChatResponseMessage {
    pub(crate) content: String,
}

/// Configuration for the text refiner.
#[derive(Clone, Debug)]
pub struct RefinerConfig {
    /// Base URL of the OpenAI-compatible API.
    pub endpoint: String,
    /// Model name to request.
    pub model: String,
    /// Token budget per completion.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 200,
            temperature: 0.7,
            timeout_secs: 120,
        }
    }
}

/// A caption rewritten by the refiner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinedCaption {
    /// The caption as the captioner produced it.
    pub raw: String,
    /// The rewritten caption.
    pub refined: String,
    /// The knowledge extract handed to the model, if any.
    pub wiki: Option<String>,
}

impl RefinedCaption {
    /// A result carrying the raw caption unchanged, for when refinement is
    /// disabled or unavailable.
    pub fn passthrough(caption: impl Into<String>) -> Self {
        let caption = caption.into();
        Self {
            raw: caption.clone(),
            refined: caption,
            wiki: None,
        }
    }
}

/// Client for rewriting captions via a remote language model.
pub struct TextRefiner {
    client: reqwest::blocking::Client,
    config: RefinerConfig,
    api_key: String,
}

impl TextRefiner {
    /// Create a new refiner client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Bearer token for the API.
    /// * `config` - Endpoint and sampling configuration.
    pub fn new(api_key: impl Into<String>, config: RefinerConfig) -> Result<Self, RefineError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let config = RefinerConfig {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            ..config
        };
        log::info!(
            "text refiner configured: endpoint={}, model={}",
            config.endpoint,
            config.model
        );

        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    /// One chat completion round trip.
    pub fn llm(&self, prompt: &str) -> Result<String, RefineError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.endpoint))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefineError::Api {
                status: status.as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }

        let response: ChatResponse = response.json()?;
        let content = response
            .choices
            .into_iter()
            .next()
            .ok_or(RefineError::EmptyResponse)?
            .message
            .content;

        Ok(content.trim().to_string())
    }

    /// Connectivity test; an error means the remote model is unreachable.
    pub fn probe(&self) -> Result<(), RefineError> {
        self.llm("hi").map(|_| ())
    }

    /// Rewrite a caption according to the style controls.
    ///
    /// # Arguments
    ///
    /// * `caption` - The raw caption to rewrite.
    /// * `controls` - Length, sentiment, language and imagination controls.
    /// * `context` - Whole-image captions to anchor the rewrite.
    /// * `enable_wiki` - Fetch a knowledge extract for the caption subject.
    pub fn refine(
        &self,
        caption: &str,
        controls: &Controls,
        context: &[String],
        enable_wiki: bool,
    ) -> Result<RefinedCaption, RefineError> {
        let wiki = if enable_wiki {
            // knowledge lookup is best effort
            match wiki::lookup_summary(&self.client, &wiki::caption_subject(caption)) {
                Ok(extract) => extract,
                Err(e) => {
                    log::warn!("wiki lookup failed: {e}");
                    None
                }
            }
        } else {
            None
        };

        let prompt = build_refine_prompt(caption, controls, context, wiki.as_deref());
        let refined = self.llm(&prompt)?;

        Ok(RefinedCaption {
            raw: caption.to_string(),
            refined,
            wiki,
        })
    }
}

/// Build the rewrite instruction handed to the language model.
pub fn build_refine_prompt(
    caption: &str,
    controls: &Controls,
    context: &[String],
    wiki: Option<&str>,
) -> String {
    let sentiment = match controls.sentiment {
        Sentiment::Positive => "a positive tone",
        Sentiment::Natural => "a neutral tone",
        Sentiment::Negative => "a negative tone",
    };

    let mut prompt = format!(
        "Rewrite the image caption below with {sentiment}, in {}",
        controls.language
    );
    if let Some(length) = controls.length {
        prompt.push_str(&format!(", using at most {length} words"));
    }
    prompt.push('.');

    if controls.imagination {
        prompt.push_str(" You may embellish the scene with plausible details.");
    } else {
        prompt.push_str(
            " Only use facts present in the caption or the notes; do not invent details.",
        );
    }

    if !context.is_empty() {
        prompt.push_str("\nWhole image context:");
        for ctx in context {
            prompt.push_str(&format!("\n- {ctx}"));
        }
    }

    if let Some(wiki) = wiki {
        prompt.push_str(&format!("\nBackground notes: {wiki}"));
    }

    prompt.push_str("\nReply with the rewritten caption only.");
    prompt.push_str(&format!("\nCaption: {caption}"));

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_all_controls() {
        let controls = Controls {
            length: Some(30),
            sentiment: Sentiment::Positive,
            language: "French".to_string(),
            imagination: false,
        };
        let prompt = build_refine_prompt(
            "a dog on a sofa",
            &controls,
            &["a living room".to_string()],
            Some("Dogs are domesticated canids."),
        );

        assert!(prompt.contains("a positive tone"));
        assert!(prompt.contains("in French"));
        assert!(prompt.contains("at most 30 words"));
        assert!(prompt.contains("do not invent details"));
        assert!(prompt.contains("- a living room"));
        assert!(prompt.contains("Background notes: Dogs are domesticated canids."));
        assert!(prompt.ends_with("Caption: a dog on a sofa"));
    }

    #[test]
    fn prompt_with_imagination_drops_the_fact_guard() {
        let controls = Controls {
            imagination: true,
            ..Default::default()
        };
        let prompt = build_refine_prompt("a dog", &controls, &[], None);
        assert!(prompt.contains("may embellish"));
        assert!(!prompt.contains("do not invent"));
    }

    #[test]
    fn chat_response_parses() {
        let json = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": " A fluffy dog. "}}
            ]
        }"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.choices[0].message.content, " A fluffy dog. ");
    }

    #[test]
    fn passthrough_keeps_the_caption() {
        let out = RefinedCaption::passthrough("a cat");
        assert_eq!(out.raw, "a cat");
        assert_eq!(out.refined, "a cat");
        assert!(out.wiki.is_none());
    }
}
