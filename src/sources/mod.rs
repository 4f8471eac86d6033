//! # Sources Module
//!
//! Turns a request string into something the player can stream.
//!
//! - [`classify`] decides which provider family a request belongs to. It is a
//!   pure function: no network, no state.
//! - Each provider family has one [`StreamProvider`] adapter that fetches a
//!   playable [`StreamHandle`] plus normalized [`ItemMetadata`].
//! - [`SearchProvider`] answers free-text queries with up to
//!   [`SEARCH_LIMIT`] candidates.
//! - [`SourceManager`] dispatches a classified request to the right adapter
//!   and expands playlists.
//!
//! Provider-native response shapes stay inside their adapter; everything
//! leaving this module is already an [`ItemMetadata`].

pub mod direct_url;
pub mod soundcloud;
pub mod youtube;
pub mod youtube_api_v3;

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use std::{collections::HashMap, fmt, sync::Arc, sync::LazyLock, time::Duration};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

pub use direct_url::DirectUrlClient;
pub use soundcloud::SoundCloudClient;
pub use youtube::YouTubeClient;
pub use youtube_api_v3::YouTubeAPIv3Client;

/// Número máximo de candidatos devueltos por una búsqueda
pub const SEARCH_LIMIT: usize = 5;

/// Familias de proveedores soportadas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderFamily {
    HostedVideo,
    HostedAudio,
    File,
}

impl ProviderFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderFamily::HostedVideo => "youtube",
            ProviderFamily::HostedAudio => "soundcloud",
            ProviderFamily::File => "file",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Single,
    Playlist,
}

/// Resultado de clasificar una petición
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceKind {
    pub family: ProviderFamily,
    pub variant: Variant,
}

impl SourceKind {
    pub fn single(family: ProviderFamily) -> Self {
        Self {
            family,
            variant: Variant::Single,
        }
    }
}

/// Metadata normalizada de un item, independiente del proveedor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemMetadata {
    /// Zero when the provider does not know the length.
    pub duration: Duration,
    pub title: String,
    pub image_url: Option<String>,
    pub author: Option<String>,
    pub loudness_db: Option<f32>,
}

/// Stream reproducible, consumido una sola vez por el sink
pub enum StreamHandle {
    /// Input de songbird ya preparado por el adaptador
    Input(songbird::input::Input),
    /// URL de audio directa; el sink la abre al reproducir
    Url(String),
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamHandle::Input(_) => f.write_str("StreamHandle::Input(..)"),
            StreamHandle::Url(url) => f.debug_tuple("StreamHandle::Url").field(url).finish(),
        }
    }
}

/// Stream y metadata de una petición resuelta
#[derive(Debug)]
pub struct ResolvedStream {
    pub url: String,
    pub kind: SourceKind,
    pub metadata: ItemMetadata,
    pub stream: StreamHandle,
}

/// Resultado de resolver una petición (un item o una playlist)
#[derive(Debug, Default)]
pub struct ResolvedBatch {
    pub resolved: Vec<ResolvedStream>,
    pub failed: usize,
}

/// Candidato de una búsqueda por texto
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCandidate {
    pub title: String,
    pub url: String,
    pub channel: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("not a valid URL: {0}")]
    NotAUrl(String),

    #[error("unsupported source: {0}")]
    Unsupported(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed provider response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Adaptador de un proveedor de streams
#[async_trait]
pub trait StreamProvider: Send + Sync {
    /// Obtiene stream y metadata de una URL
    async fn resolve(&self, url: &str) -> Result<ResolvedStream, ResolutionError>;

    /// Lista las URLs de los items de una playlist
    async fn expand_playlist(&self, url: &str) -> Result<Vec<String>, ResolutionError> {
        Err(ResolutionError::Unsupported(format!(
            "{} playlists ({url})",
            self.source_name()
        )))
    }

    fn source_name(&self) -> &'static str;
}

/// Búsqueda por texto libre
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize)
        -> Result<Vec<SearchCandidate>, ResolutionError>;
}

static HOSTED_VIDEO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:(?:www|m|music)\.)?(?:youtube\.com/(?:watch\?|embed/[\w-]+|v/[\w-]+|shorts/[\w-]+|playlist\?)|youtu\.be/[\w-]+)",
    )
    .expect("hosted video pattern")
});

static WELL_FORMED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(http|https)://[^ "]+$"#).expect("url pattern"));

/// Clasifica una petición en familia y variante.
///
/// Returns `None` when the request is not a well-formed http(s) URL; callers
/// treat that as a free-text search.
pub fn classify(request: &str) -> Option<SourceKind> {
    if !WELL_FORMED_RE.is_match(request) {
        return None;
    }
    let url = Url::parse(request).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();

    if HOSTED_VIDEO_RE.is_match(request) {
        let has_list = url
            .query_pairs()
            .any(|(key, value)| key == "list" && !value.is_empty());
        let variant = if has_list {
            Variant::Playlist
        } else {
            Variant::Single
        };
        return Some(SourceKind {
            family: ProviderFamily::HostedVideo,
            variant,
        });
    }

    if host.contains("soundcloud") {
        return Some(SourceKind::single(ProviderFamily::HostedAudio));
    }

    Some(SourceKind::single(ProviderFamily::File))
}

/// Manager para todas las fuentes de música
pub struct SourceManager {
    providers: HashMap<ProviderFamily, Arc<dyn StreamProvider>>,
    search: Option<Arc<dyn SearchProvider>>,
    resolve_timeout: Duration,
    max_playlist_size: usize,
}

impl SourceManager {
    pub fn new(resolve_timeout: Duration, max_playlist_size: usize) -> Self {
        Self {
            providers: HashMap::new(),
            search: None,
            resolve_timeout,
            max_playlist_size,
        }
    }

    /// Manager con los adaptadores de producción según la configuración
    pub fn from_config(config: &crate::config::Config) -> Self {
        let mut manager = Self::new(config.resolve_timeout, config.max_playlist_size)
            .with_provider(ProviderFamily::HostedVideo, Arc::new(YouTubeClient::new()))
            .with_provider(ProviderFamily::File, Arc::new(DirectUrlClient::new()))
            .with_provider(
                ProviderFamily::HostedAudio,
                Arc::new(SoundCloudClient::new(config.soundcloud_client_id.clone())),
            );

        match &config.youtube_api_key {
            Some(key) => {
                manager = manager.with_search(Arc::new(YouTubeAPIv3Client::new(key.clone())));
            }
            None => warn!("⚠️ YOUTUBE_API_KEY no configurada, búsqueda por texto deshabilitada"),
        }

        manager
    }

    pub fn with_provider(mut self, family: ProviderFamily, provider: Arc<dyn StreamProvider>) -> Self {
        self.providers.insert(family, provider);
        self
    }

    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    /// Resuelve una petición clasificada; las playlists se expanden y cada
    /// entrada se resuelve en paralelo.
    pub async fn resolve(&self, kind: SourceKind, url: &str) -> Result<ResolvedBatch, ResolutionError> {
        let provider = self
            .providers
            .get(&kind.family)
            .ok_or_else(|| ResolutionError::Unsupported(kind.family.as_str().to_string()))?;

        if kind.variant == Variant::Single {
            let resolved = self.resolve_one(provider.as_ref(), url).await?;
            return Ok(ResolvedBatch {
                resolved: vec![resolved],
                failed: 0,
            });
        }

        let entries = tokio::time::timeout(self.resolve_timeout, provider.expand_playlist(url))
            .await
            .map_err(|_| ResolutionError::Timeout(self.resolve_timeout))??;
        let entries: Vec<String> = entries.into_iter().take(self.max_playlist_size).collect();
        info!("📋 Playlist {} con {} entradas", url, entries.len());

        let results = join_all(
            entries
                .iter()
                .map(|entry| self.resolve_one(provider.as_ref(), entry)),
        )
        .await;

        let mut batch = ResolvedBatch::default();
        for (entry, result) in entries.iter().zip(results) {
            match result {
                Ok(resolved) => batch.resolved.push(resolved),
                Err(e) => {
                    debug!("Entrada de playlist {} falló: {}", entry, e);
                    batch.failed += 1;
                }
            }
        }

        if batch.resolved.is_empty() {
            return Err(ResolutionError::Provider(format!(
                "none of the {} playlist entries could be retrieved",
                batch.failed
            )));
        }

        Ok(batch)
    }

    async fn resolve_one(
        &self,
        provider: &dyn StreamProvider,
        url: &str,
    ) -> Result<ResolvedStream, ResolutionError> {
        tokio::time::timeout(self.resolve_timeout, provider.resolve(url))
            .await
            .map_err(|_| ResolutionError::Timeout(self.resolve_timeout))?
    }

    /// Busca candidatos por texto libre (máximo [`SEARCH_LIMIT`])
    pub async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, ResolutionError> {
        let search = self
            .search
            .as_ref()
            .ok_or_else(|| ResolutionError::Unsupported("text search".to_string()))?;

        let mut candidates = search.search(query, SEARCH_LIMIT).await?;
        candidates.truncate(SEARCH_LIMIT);
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn free_text_is_not_a_source() {
        assert_eq!(classify("never gonna give you up"), None);
        assert_eq!(classify("ftp://example.com/song.mp3"), None);
        assert_eq!(classify("https://example.com/a song.mp3"), None);
    }

    #[test]
    fn hosted_video_single_and_playlist() {
        let single = SourceKind::single(ProviderFamily::HostedVideo);
        assert_eq!(classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), Some(single));
        assert_eq!(classify("https://youtu.be/dQw4w9WgXcQ"), Some(single));
        assert_eq!(classify("https://music.youtube.com/watch?v=test"), Some(single));

        let playlist = SourceKind {
            family: ProviderFamily::HostedVideo,
            variant: Variant::Playlist,
        };
        assert_eq!(
            classify("https://www.youtube.com/watch?v=abc&list=PL123"),
            Some(playlist)
        );
        assert_eq!(
            classify("https://www.youtube.com/playlist?list=PL123"),
            Some(playlist)
        );
    }

    #[test]
    fn hosted_audio_and_files() {
        assert_eq!(
            classify("https://soundcloud.com/artist/track"),
            Some(SourceKind::single(ProviderFamily::HostedAudio))
        );
        assert_eq!(
            classify("https://host/video123"),
            Some(SourceKind::single(ProviderFamily::File))
        );
        // Un dominio de YouTube sin ruta de video no es un video
        assert_eq!(
            classify("https://www.youtube.com/about"),
            Some(SourceKind::single(ProviderFamily::File))
        );
    }

    #[tokio::test]
    async fn search_is_truncated_to_limit() {
        let mut search = MockSearchProvider::new();
        search
            .expect_search()
            .withf(|query, limit| query.to_string() == "lofi" && *limit == SEARCH_LIMIT)
            .times(1)
            .returning(|_, _| {
                Ok((0..8)
                    .map(|i| SearchCandidate {
                        title: format!("result {i}"),
                        url: format!("https://youtu.be/{i}"),
                        channel: None,
                        thumbnail: None,
                    })
                    .collect())
            });

        let manager = SourceManager::new(Duration::from_secs(5), 25).with_search(Arc::new(search));
        let results = manager.search("lofi").await.unwrap();
        assert_eq!(results.len(), SEARCH_LIMIT);
        assert_eq!(results[0].title, "result 0");
    }

    #[tokio::test]
    async fn search_without_provider_is_unsupported() {
        let manager = SourceManager::new(Duration::from_secs(5), 25);
        let err = manager.search("lofi").await.unwrap_err();
        assert!(matches!(err, ResolutionError::Unsupported(_)));
    }

    #[tokio::test]
    async fn missing_provider_is_unsupported() {
        let manager = SourceManager::new(Duration::from_secs(5), 25);
        let err = manager
            .resolve(SourceKind::single(ProviderFamily::File), "https://host/a.mp3")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Unsupported(_)));
    }

    struct PlaylistProvider;

    #[async_trait]
    impl StreamProvider for PlaylistProvider {
        async fn resolve(&self, url: &str) -> Result<ResolvedStream, ResolutionError> {
            if url.ends_with("broken") {
                return Err(ResolutionError::Provider("video unavailable".to_string()));
            }
            Ok(ResolvedStream {
                url: url.to_string(),
                kind: SourceKind::single(ProviderFamily::HostedVideo),
                metadata: ItemMetadata {
                    title: url.to_string(),
                    ..ItemMetadata::default()
                },
                stream: StreamHandle::Url(url.to_string()),
            })
        }

        async fn expand_playlist(&self, _url: &str) -> Result<Vec<String>, ResolutionError> {
            Ok(vec![
                "https://youtu.be/one".to_string(),
                "https://youtu.be/broken".to_string(),
                "https://youtu.be/two".to_string(),
                "https://youtu.be/three".to_string(),
            ])
        }

        fn source_name(&self) -> &'static str {
            "playlist"
        }
    }

    #[tokio::test]
    async fn playlists_keep_list_order_and_count_failures() {
        let manager = SourceManager::new(Duration::from_secs(5), 3)
            .with_provider(ProviderFamily::HostedVideo, Arc::new(PlaylistProvider));
        let kind = SourceKind {
            family: ProviderFamily::HostedVideo,
            variant: Variant::Playlist,
        };

        let batch = manager
            .resolve(kind, "https://www.youtube.com/playlist?list=PL1")
            .await
            .unwrap();

        let titles: Vec<_> = batch.resolved.iter().map(|r| r.metadata.title.as_str()).collect();
        assert_eq!(titles, vec!["https://youtu.be/one", "https://youtu.be/two"]);
        assert_eq!(batch.failed, 1);
    }
}
