//! Text-to-speech through Google Translate's speech endpoint.
//!
//! The endpoint takes at most ~100 characters per request, so the reply is
//! split into clauses and the returned MP3 segments are concatenated (MP3
//! frames can be joined byte-wise). Optionally the result is transcoded to
//! OGG Opus with ffmpeg so Telegram renders a waveform.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::chatbot::error::BotError;
use crate::chatbot::services::{AudioFormat, SynthesizedAudio, Synthesizer};
use crate::chatbot::text::{chunk_text, preview};

/// Longest text the endpoint accepts in one request.
const MAX_CHUNK_CHARS: usize = 100;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

pub struct GoogleTts {
    http: reqwest::Client,
    /// Top-level domain of the Google host, selects the accent (`es` = Spain).
    tld: String,
    /// ffmpeg binary used for OGG transcoding; `None` keeps MP3.
    ffmpeg: Option<PathBuf>,
}

impl GoogleTts {
    pub fn new(http: reqwest::Client, tld: String) -> Self {
        Self { http, tld, ffmpeg: None }
    }

    pub fn with_transcoding(mut self, ffmpeg: Option<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg;
        self
    }

    fn chunk_url(&self, chunk: &str, language: &str, idx: usize, total: usize) -> String {
        format!(
            "https://translate.google.{}/translate_tts?ie=UTF-8&q={}&tl={}&client=tw-ob&total={}&idx={}&textlen={}",
            self.tld,
            urlencoding::encode(chunk),
            urlencoding::encode(language),
            total,
            idx,
            chunk.chars().count(),
        )
    }

    async fn fetch_chunk(&self, url: &str) -> Result<Vec<u8>, BotError> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| BotError::Synthesis(format!("TTS request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Synthesis(format!("TTS error {}: {}", status, preview(&body, 200))));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BotError::Synthesis(format!("Failed to read TTS response: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Synthesizer for GoogleTts {
    async fn synthesize(&self, text: &str, language: &str) -> Result<SynthesizedAudio, BotError> {
        info!("TTS: \"{}\"", preview(text, 50));

        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(BotError::Synthesis("nothing to synthesize".to_string()));
        }

        let mut mp3 = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let url = self.chunk_url(chunk, language, idx, chunks.len());
            mp3.extend(self.fetch_chunk(&url).await?);
        }
        debug!("Got {} bytes of MP3 in {} chunk(s)", mp3.len(), chunks.len());

        match self.ffmpeg {
            Some(ref ffmpeg) => Ok(SynthesizedAudio {
                bytes: convert_mp3_to_ogg(ffmpeg, &mp3).await?,
                format: AudioFormat::OggOpus,
            }),
            None => Ok(SynthesizedAudio {
                bytes: mp3,
                format: AudioFormat::Mp3,
            }),
        }
    }
}

/// Convert MP3 to OGG Opus for Telegram voice notes.
///
/// Scratch files are `tempfile`s and vanish on every return path.
async fn convert_mp3_to_ogg(ffmpeg: &Path, mp3: &[u8]) -> Result<Vec<u8>, BotError> {
    let scratch = |suffix: &str| {
        tempfile::Builder::new()
            .prefix("sofia-tts-")
            .suffix(suffix)
            .tempfile()
            .map_err(|e| BotError::Synthesis(format!("Failed to create temp file: {e}")))
    };
    let input = scratch(".mp3")?;
    let output = scratch(".ogg")?;

    tokio::fs::write(input.path(), mp3)
        .await
        .map_err(|e| BotError::Synthesis(format!("Failed to write temp MP3: {e}")))?;

    // 300ms of leading silence: Telegram clips the start of voice notes
    let result = Command::new(ffmpeg)
        .arg("-y")
        .args(["-f", "lavfi", "-i", "anullsrc=r=24000:cl=mono"])
        .arg("-i")
        .arg(input.path())
        .args([
            "-filter_complex",
            "[0]atrim=0:0.3[silence];[silence][1:a]concat=n=2:v=0:a=1",
            "-c:a",
            "libopus",
            "-b:a",
            "48k",
        ])
        .arg(output.path())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| BotError::Synthesis(format!("Failed to run ffmpeg: {e}")))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(BotError::Synthesis(format!("ffmpeg conversion failed: {}", preview(&stderr, 300))));
    }

    let ogg = tokio::fs::read(output.path())
        .await
        .map_err(|e| BotError::Synthesis(format!("Failed to read OGG output: {e}")))?;

    debug!("Converted MP3 ({} bytes) to OGG ({} bytes)", mp3.len(), ogg.len());
    Ok(ogg)
}
