use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::errors::SyncError;
use crate::sources::SegmentLookup;

#[derive(Debug, Deserialize)]
struct SkipSegment {
    segment: (f64, f64),
    #[serde(default)]
    category: String,
}

/// SponsorBlock `skipSegments` endpoint
#[derive(Debug, Clone)]
pub struct SponsorBlock {
    client: reqwest::Client,
    endpoint: String,
}

impl SponsorBlock {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self { client, endpoint: endpoint.into() }
    }
}

/// Segments of a `skipSegments` answer, inverted ones dropped
fn parse_segments(body: &str) -> Result<Vec<(f64, f64)>, SyncError> {
    let entries: Vec<SkipSegment> = serde_json::from_str(body)?;
    Ok(entries
        .into_iter()
        .filter(|e| e.segment.1 > e.segment.0)
        .inspect(|e| debug!("[SponsorBlock] {} {:.2}-{:.2}", e.category, e.segment.0, e.segment.1))
        .map(|e| e.segment)
        .collect())
}

impl SegmentLookup for SponsorBlock {
    async fn segments(&self, video_id: &str, categories: &[String]) -> Result<Vec<(f64, f64)>, SyncError> {
        let categories = serde_json::to_string(categories)?;
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("videoID", video_id), ("categories", categories.as_str())])
            .send()
            .await?;

        // SponsorBlock answers 404 when no segment was submitted
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(SyncError::Http(format!("HTTP {} from SponsorBlock", response.status())));
        }
        parse_segments(&response.text().await?)
    }
}
