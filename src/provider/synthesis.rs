use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use super::{ProviderError, ProviderResult, SynthesisProvider};

/// Sample rate of generated audio. Telephony-grade mono PCM.
pub const SAMPLE_RATE: u32 = 8000;

const TTS_VOICE: &str = "default";

/// [`SynthesisProvider`] that POSTs text to an HTTP TTS endpoint and returns the body.
#[derive(Debug, Clone)]
pub struct HttpSynthesisProvider {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
    sample_rate: u32,
}

impl HttpSynthesisProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> ProviderResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SynthesisProvider for HttpSynthesisProvider {
    async fn synthesize(&self, text: &str) -> ProviderResult<Vec<u8>> {
        let body = SynthesisRequest {
            input: text,
            voice: TTS_VOICE,
            response_format: "wav",
            sample_rate: SAMPLE_RATE,
        };

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), url = %self.url, "TTS request rejected");
            return Err(ProviderError::SynthesisStatus {
                status: status.as_u16(),
            });
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        debug!(bytes = audio.len(), chars = text.chars().count(), "Synthesized audio");
        Ok(audio.to_vec())
    }
}

/// Offline synthesizer: a silent 16-bit mono WAV whose length tracks the text length.
#[derive(Debug, Clone)]
pub struct SilentWavSynthesizer {
    per_char: Duration,
}

impl Default for SilentWavSynthesizer {
    fn default() -> Self {
        Self {
            per_char: Duration::from_millis(60),
        }
    }
}

impl SilentWavSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration_per_char(mut self, per_char: Duration) -> Self {
        self.per_char = per_char;
        self
    }

    fn render(&self, text: &str) -> Vec<u8> {
        let chars = text.chars().filter(|c| !c.is_whitespace()).count().max(1) as u32;
        let millis = (self.per_char.as_millis() as u32).saturating_mul(chars);
        let samples = SAMPLE_RATE / 1000 * millis;
        wav_pcm16_mono(&vec![0i16; samples as usize], SAMPLE_RATE)
    }
}

#[async_trait]
impl SynthesisProvider for SilentWavSynthesizer {
    async fn synthesize(&self, text: &str) -> ProviderResult<Vec<u8>> {
        Ok(self.render(text))
    }
}

/// Encodes samples as a canonical 44-byte-header RIFF/WAVE file.
pub fn wav_pcm16_mono(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}
