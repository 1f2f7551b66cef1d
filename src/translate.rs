//! Translation client.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::TranslatorConfig;
use crate::error::PipelineError;

#[derive(Serialize, Debug)]
struct TranslateItem<'a> {
    #[serde(rename = "Text")]
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct TranslateResult {
    translations: Vec<Translation>,
}

#[derive(Deserialize, Debug)]
struct Translation {
    text: String,
}

pub struct TranslatorClient {
    client: Client,
    key: String,
    config: TranslatorConfig,
}

impl TranslatorClient {
    pub fn new(config: TranslatorConfig, key: String) -> Self {
        Self {
            client: Client::new(),
            key,
            config,
        }
    }

    fn url(&self, to: &str) -> String {
        format!(
            "{}/translate?api-version=3.0&to={}",
            self.config.endpoint.trim_end_matches('/'),
            to
        )
    }

    /// Translate into the configured target language
    pub async fn translate(&self, text: &str) -> Result<String> {
        self.translate_to(text, &self.config.target_language).await
    }

    pub async fn translate_to(&self, text: &str, to: &str) -> Result<String> {
        if text.is_empty() {
            return Err(PipelineError::Validation("missing text to translate".to_string()).into());
        }

        let response = self
            .client
            .post(self.url(to))
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Ocp-Apim-Subscription-Region", &self.config.region)
            .json(&[TranslateItem { text }])
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            error!("Translation failed: {}", error_text);
            anyhow::bail!("translation failed: {}", error_text);
        }

        let results: Vec<TranslateResult> = response
            .json()
            .await
            .context("Unexpected translation response")?;
        let translated = first_translation(results)?;

        info!("Translated {} chars into '{}'", text.len(), to);
        Ok(translated)
    }
}

fn first_translation(results: Vec<TranslateResult>) -> Result<String> {
    results
        .into_iter()
        .next()
        .and_then(|r| r.translations.into_iter().next())
        .map(|t| t.text)
        .context("translation response had no translations")
}
