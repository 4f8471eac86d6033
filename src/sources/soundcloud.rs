use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::{
    ItemMetadata, ProviderFamily, ResolutionError, ResolvedStream, SourceKind, StreamHandle,
    StreamProvider,
};

const API_BASE: &str = "https://api.soundcloud.com";

/// Cliente de la API pública de SoundCloud
pub struct SoundCloudClient {
    client_id: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ScTrack {
    id: u64,
    title: String,
    /// Milisegundos
    duration: Option<u64>,
    artwork_url: Option<String>,
    user: ScUser,
}

#[derive(Debug, Deserialize)]
struct ScUser {
    username: String,
}

impl ScTrack {
    fn into_metadata(self) -> ItemMetadata {
        ItemMetadata {
            duration: Duration::from_secs(self.duration.unwrap_or(0) / 1000),
            title: self.title,
            image_url: self.artwork_url,
            author: Some(self.user.username),
            loudness_db: None,
        }
    }
}

impl SoundCloudClient {
    pub fn new(client_id: Option<String>) -> Self {
        Self {
            client_id,
            client: reqwest::Client::new(),
        }
    }

    fn client_id(&self) -> Result<&str, ResolutionError> {
        self.client_id
            .as_deref()
            .ok_or_else(|| ResolutionError::Unsupported("SOUNDCLOUD_CLIENT_ID not configured".to_string()))
    }
}

#[async_trait]
impl StreamProvider for SoundCloudClient {
    async fn resolve(&self, url: &str) -> Result<ResolvedStream, ResolutionError> {
        let started = Instant::now();
        let client_id = self.client_id()?;

        let track: ScTrack = self
            .client
            .get(format!("{API_BASE}/resolve"))
            .query(&[("url", url), ("client_id", client_id)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let stream_url = format!("{API_BASE}/tracks/{}/stream?client_id={client_id}", track.id);

        // Verificar que el stream esté disponible antes de encolar
        if let Err(e) = self
            .client
            .head(&stream_url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
        {
            warn!("❌ Audio de SoundCloud ({}) no pudo obtenerse: {}", url, e);
            return Err(e.into());
        }

        info!(
            "✅ Audio de SoundCloud ({}) obtenido en {}ms",
            url,
            started.elapsed().as_millis()
        );

        Ok(ResolvedStream {
            url: url.to_string(),
            kind: SourceKind::single(ProviderFamily::HostedAudio),
            metadata: track.into_metadata(),
            stream: StreamHandle::Url(stream_url),
        })
    }

    fn source_name(&self) -> &'static str {
        "SoundCloud"
    }
}
