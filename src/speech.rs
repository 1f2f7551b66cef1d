//! Text-to-speech client for guidance text.

use anyhow::Result;
use reqwest::Client;
use tracing::{error, info};

use crate::config::SpeechConfig;
use crate::error::PipelineError;

const USER_AGENT: &str = "senda-tts";

/// Speech synthesis over the cognitive services REST endpoint
pub struct SpeechClient {
    client: Client,
    endpoint: String,
    key: String,
    config: SpeechConfig,
}

impl SpeechClient {
    pub fn new(config: SpeechConfig, key: String) -> Self {
        let endpoint = format!(
            "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
            config.region
        );
        Self {
            client: Client::new(),
            endpoint,
            key,
            config,
        }
    }

    /// Render `text` as SSML for the configured voice
    pub fn ssml(&self, text: &str) -> String {
        format!(
            "<speak version='1.0' xml:lang='{lang}'><voice xml:lang='{lang}' xml:gender='{gender}' name='{voice}'>{text}</voice></speak>",
            lang = self.config.language,
            gender = self.config.gender,
            voice = self.config.voice,
            text = escape_xml(text),
        )
    }

    /// Synthesize `text` and return the encoded audio
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(PipelineError::Validation("text to synthesize is empty".to_string()).into());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("X-Microsoft-OutputFormat", &self.config.output_format)
            .header("Content-Type", "application/ssml+xml")
            .header("User-Agent", USER_AGENT)
            .body(self.ssml(text))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            error!("Speech synthesis failed ({}): {}", status, error_text);
            anyhow::bail!("speech synthesis failed ({}): {}", status, error_text);
        }

        let audio = response.bytes().await?.to_vec();
        info!("Synthesized {} bytes of audio", audio.len());
        Ok(audio)
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
