use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Instant;
use tracing::{info, warn};
use url::Url;

use super::{
    ItemMetadata, ProviderFamily, ResolutionError, ResolvedStream, SourceKind, StreamHandle,
    StreamProvider,
};

/// Cliente para archivos de audio servidos por URL directa
pub struct DirectUrlClient {
    client: reqwest::Client,
}

impl DirectUrlClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Título a partir del último segmento de la ruta
    fn title_from_url(url: &Url) -> String {
        url.path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(|segment| {
                urlencoding::decode(segment)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| segment.to_string())
            })
            .unwrap_or_else(|| url.host_str().unwrap_or("Unknown").to_string())
    }
}

#[async_trait]
impl StreamProvider for DirectUrlClient {
    async fn resolve(&self, url: &str) -> Result<ResolvedStream, ResolutionError> {
        let started = Instant::now();
        let parsed = Url::parse(url).map_err(|_| ResolutionError::NotAUrl(url.to_string()))?;

        let response = self.client.head(parsed.as_str()).send().await?.error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if !content_type.is_empty()
            && !content_type.starts_with("audio/")
            && !content_type.starts_with("video/")
            && !content_type.starts_with("application/octet-stream")
            && !content_type.starts_with("application/ogg")
        {
            warn!("⚠️ {} responde con content-type {}", url, content_type);
        }

        info!(
            "✅ Archivo ({}) verificado en {}ms",
            url,
            started.elapsed().as_millis()
        );

        Ok(ResolvedStream {
            url: url.to_string(),
            kind: SourceKind::single(ProviderFamily::File),
            metadata: ItemMetadata {
                title: Self::title_from_url(&parsed),
                ..ItemMetadata::default()
            },
            stream: StreamHandle::Url(parsed.into()),
        })
    }

    fn source_name(&self) -> &'static str {
        "direct"
    }
}
