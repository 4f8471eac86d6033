use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{ResolutionError, SearchCandidate, SearchProvider};

#[derive(Debug, Deserialize)]
struct YouTubeAPIResponse {
    items: Vec<YouTubeVideo>,
}

#[derive(Debug, Deserialize)]
struct YouTubeVideo {
    id: VideoId,
    snippet: VideoSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoId {
    video_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    channel_title: Option<String>,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
    high: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl From<YouTubeVideo> for SearchCandidate {
    fn from(video: YouTubeVideo) -> Self {
        let thumbnail = video
            .snippet
            .thumbnails
            .and_then(|t| t.high.or(t.medium))
            .map(|t| t.url);

        SearchCandidate {
            title: video.snippet.title,
            url: format!("https://youtu.be/{}", video.id.video_id),
            channel: video.snippet.channel_title,
            thumbnail,
        }
    }
}

/// Búsqueda de videos con la YouTube Data API v3
pub struct YouTubeAPIv3Client {
    api_key: String,
    client: reqwest::Client,
}

impl YouTubeAPIv3Client {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();

        Self { api_key, client }
    }
}

#[async_trait]
impl SearchProvider for YouTubeAPIv3Client {
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchCandidate>, ResolutionError> {
        debug!("🔍 Búsqueda YouTube API v3: {}", query);

        let max_results = limit.to_string();
        let response = self
            .client
            .get("https://www.googleapis.com/youtube/v3/search")
            .query(&[
                ("part", "snippet"),
                ("q", query),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("❌ YouTube API error: {} - {}", status, error_text);
            return Err(ResolutionError::Provider(format!(
                "YouTube API error: {status}"
            )));
        }

        let api_response: YouTubeAPIResponse = response.json().await?;
        let candidates: Vec<SearchCandidate> =
            api_response.items.into_iter().map(SearchCandidate::from).collect();

        info!("✅ YouTube API v3: {} resultados", candidates.len());
        Ok(candidates)
    }
}
