use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use songbird::input::{Input, YoutubeDl};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{
    ItemMetadata, ProviderFamily, ResolutionError, ResolvedStream, SourceKind, StreamHandle,
    StreamProvider,
};

/// Cliente para interactuar con YouTube vía yt-dlp
pub struct YouTubeClient {
    http: reqwest::Client,
    // Limitar procesos concurrentes de yt-dlp para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: String,
    title: String,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    is_live: Option<bool>,
    #[serde(default)]
    loudness: Option<f32>,
}

/// Entrada de `--flat-playlist`
#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: String,
    url: Option<String>,
}

impl YtDlpInfo {
    fn into_metadata(self) -> ItemMetadata {
        if self.is_live.unwrap_or(false) {
            debug!("🔴 {} es una transmisión en vivo", self.id);
        }

        let image_url = self
            .thumbnail
            .or_else(|| Some(format!("https://i.ytimg.com/vi/{}/default.jpg", self.id)));

        ItemMetadata {
            duration: self
                .duration
                .filter(|d| d.is_finite() && *d > 0.0)
                .map(|d| Duration::from_secs(d.floor() as u64))
                .unwrap_or_default(),
            title: self.title,
            image_url,
            author: self.uploader.or(self.channel),
            loudness_db: self.loudness.filter(|l| l.is_finite()),
        }
    }
}

impl FlatEntry {
    fn watch_url(self) -> String {
        match self.url {
            Some(url) if url.starts_with("http") => url,
            _ => format!("https://www.youtube.com/watch?v={}", self.id),
        }
    }
}

impl YouTubeClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            rate_limiter: Semaphore::new(3),
        }
    }

    /// Ejecuta yt-dlp y devuelve su stdout
    async fn run_ytdlp(&self, args: &[&str]) -> Result<String, ResolutionError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolutionError::Provider(e.to_string()))?;

        let output = Command::new("yt-dlp").args(args).output().await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ResolutionError::Provider(format!(
                "yt-dlp error: {}",
                error.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Obtiene información de una URL específica
    async fn get_info(&self, url: &str) -> Result<YtDlpInfo, ResolutionError> {
        debug!("📊 Obteniendo info de: {}", url);

        let stdout = self
            .run_ytdlp(&["--no-playlist", "--dump-json", "--no-warnings", url])
            .await?;

        Ok(serde_json::from_str(stdout.trim())?)
    }
}

#[async_trait]
impl StreamProvider for YouTubeClient {
    async fn resolve(&self, url: &str) -> Result<ResolvedStream, ResolutionError> {
        let started = Instant::now();

        let info = match self.get_info(url).await {
            Ok(info) => info,
            Err(e) => {
                warn!("❌ Video de YouTube ({}) no pudo obtenerse: {}", url, e);
                return Err(e);
            }
        };
        let metadata = info.into_metadata();

        // songbird se encarga de abrir el stream con yt-dlp al reproducir
        let input: Input = YoutubeDl::new(self.http.clone(), url.to_string()).into();

        info!(
            "✅ Video de YouTube ({}) obtenido en {}ms",
            url,
            started.elapsed().as_millis()
        );

        Ok(ResolvedStream {
            url: url.to_string(),
            kind: SourceKind::single(ProviderFamily::HostedVideo),
            metadata,
            stream: StreamHandle::Input(input),
        })
    }

    async fn expand_playlist(&self, url: &str) -> Result<Vec<String>, ResolutionError> {
        info!("📋 Obteniendo playlist: {}", url);

        let stdout = self
            .run_ytdlp(&["--flat-playlist", "--dump-json", "--no-warnings", url])
            .await?;

        let entries: Vec<String> = stdout
            .lines()
            .filter_map(|line| serde_json::from_str::<FlatEntry>(line).ok())
            .map(FlatEntry::watch_url)
            .collect();

        if entries.is_empty() {
            return Err(ResolutionError::Provider(format!(
                "playlist {url} has no entries"
            )));
        }

        Ok(entries)
    }

    fn source_name(&self) -> &'static str {
        "YouTube"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ytdlp_info_is_normalized() {
        let json = r#"{
            "id": "dQw4w9WgXcQ",
            "title": "Never Gonna Give You Up",
            "duration": 212.6,
            "uploader": "Rick Astley",
            "thumbnail": null,
            "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        }"#;
        let info: YtDlpInfo = serde_json::from_str(json).unwrap();

        assert_eq!(
            info.into_metadata(),
            ItemMetadata {
                duration: Duration::from_secs(212),
                title: "Never Gonna Give You Up".to_string(),
                image_url: Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/default.jpg".to_string()),
                author: Some("Rick Astley".to_string()),
                loudness_db: None,
            }
        );
    }

    #[test]
    fn live_streams_have_unknown_duration() {
        let json = r#"{"id": "live1", "title": "Radio", "is_live": true, "channel": "lofi"}"#;
        let info: YtDlpInfo = serde_json::from_str(json).unwrap();
        let metadata = info.into_metadata();

        assert_eq!(metadata.duration, Duration::ZERO);
        assert_eq!(metadata.author.as_deref(), Some("lofi"));
    }

    #[test]
    fn flat_entries_become_watch_urls() {
        let entry: FlatEntry = serde_json::from_str(r#"{"id": "abc", "url": "abc"}"#).unwrap();
        assert_eq!(entry.watch_url(), "https://www.youtube.com/watch?v=abc");

        let entry: FlatEntry =
            serde_json::from_str(r#"{"id": "abc", "url": "https://www.youtube.com/watch?v=abc"}"#)
                .unwrap();
        assert_eq!(entry.watch_url(), "https://www.youtube.com/watch?v=abc");
    }
}
