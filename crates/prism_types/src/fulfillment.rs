//! # Fulfillment Wire Model
//!
//! Request/response types exchanged with the fulfillment API and the status
//! updates fanned out to content consumers. The metadata payloads are tagged
//! by content kind: image and three-dimensional units carry both quality
//! tiers, video and audio carry a single quality, data carries none.

use crate::config::ContentKind;
use crate::ids::{FulfillmentId, SessionId, UnitId};
use serde::{Deserialize, Serialize};

/// Kind-specific request metadata for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RequestMetadata {
    #[serde(rename_all = "camelCase")]
    Image {
        low_quality_id: String,
        high_quality_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Video { quality_id: String },
    #[serde(rename_all = "camelCase")]
    Audio { quality_id: String },
    #[serde(rename_all = "camelCase")]
    ThreeDimensional {
        low_quality_id: String,
        high_quality_id: String,
    },
    Data,
}

impl RequestMetadata {
    /// Builds the metadata variant for `kind`, picking the quality ids that
    /// kind actually uses.
    pub fn for_kind(kind: ContentKind, min_quality_id: &str, max_quality_id: &str) -> Self {
        match kind {
            ContentKind::Image => RequestMetadata::Image {
                low_quality_id: min_quality_id.to_string(),
                high_quality_id: max_quality_id.to_string(),
            },
            ContentKind::Video => RequestMetadata::Video {
                quality_id: max_quality_id.to_string(),
            },
            ContentKind::Audio => RequestMetadata::Audio {
                quality_id: max_quality_id.to_string(),
            },
            ContentKind::ThreeDimensional => RequestMetadata::ThreeDimensional {
                low_quality_id: min_quality_id.to_string(),
                high_quality_id: max_quality_id.to_string(),
            },
            ContentKind::Data => RequestMetadata::Data,
        }
    }
}

/// One unit inside a fulfillment batch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitFulfillmentRequest {
    pub unit_id: UnitId,
    pub metadata: RequestMetadata,
}

/// A batched fulfillment request covering up to one chunk of instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentRequest {
    pub session_id: SessionId,
    pub dynamic_tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_api_key: Option<String>,
    pub units: Vec<UnitFulfillmentRequest>,
}

/// Kind-specific resolved content URLs returned by the fulfillment API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResponseMetadata {
    #[serde(rename_all = "camelCase")]
    Image { low_url: String, high_url: String },
    #[serde(rename_all = "camelCase")]
    Video {
        video_url: String,
        billboard_url: String,
    },
    #[serde(rename_all = "camelCase")]
    Audio { audio_url: String },
    #[serde(rename_all = "camelCase")]
    ThreeDimensional { low_url: String, high_url: String },
    #[serde(rename_all = "camelCase")]
    Data { payload_url: String },
}

impl ResponseMetadata {
    /// The content kind this payload belongs to.
    pub fn kind(&self) -> ContentKind {
        match self {
            ResponseMetadata::Image { .. } => ContentKind::Image,
            ResponseMetadata::Video { .. } => ContentKind::Video,
            ResponseMetadata::Audio { .. } => ContentKind::Audio,
            ResponseMetadata::ThreeDimensional { .. } => ContentKind::ThreeDimensional,
            ResponseMetadata::Data { .. } => ContentKind::Data,
        }
    }

    /// The URLs that participate in the same-content check for this kind.
    ///
    /// Video compares the video URL only; the billboard image is not part of
    /// the idempotence key.
    pub fn dedup_urls(&self) -> Vec<&str> {
        match self {
            ResponseMetadata::Image { low_url, high_url } => vec![low_url, high_url],
            ResponseMetadata::Video { video_url, .. } => vec![video_url],
            ResponseMetadata::Audio { audio_url } => vec![audio_url],
            ResponseMetadata::ThreeDimensional { low_url, high_url } => vec![low_url, high_url],
            ResponseMetadata::Data { payload_url } => vec![payload_url],
        }
    }
}

/// One key/value pair of project-defined custom metadata attached to a
/// fulfillment response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomMetadataEntry {
    pub key: String,
    pub value: serde_json::Value,
}

/// Per-unit outcome inside a fulfillment response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitFulfillmentResponse {
    pub unit_id: UnitId,
    pub fulfillment_id: FulfillmentId,
    /// Absent when the backend resolved no content for the unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
    /// Project-defined metadata dispatched through the custom metadata
    /// registry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_metadata: Vec<CustomMetadataEntry>,
}

/// Response to one chunked fulfillment request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentResponse {
    pub units: Vec<UnitFulfillmentResponse>,
}

/// Server-side content version marker for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitChecksum {
    pub unit_id: UnitId,
    pub checksum: String,
}

/// Per-instance fulfillment outcome fanned out to content consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FulfillmentStatusCode {
    /// A request including this instance is about to be sent.
    Started,
    /// The backend resolved no content for the unit.
    CompletedEmpty,
    /// New content was resolved; consumers should (re)load it.
    CompletedWithContent,
    /// The resolved content URLs match what the instance already holds;
    /// consumers are expected to skip redundant reloads.
    CompletedWithSameContent,
    /// The response payload did not match the slot's kind.
    Failed,
}

/// The update delivered to a content consumer for one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitFulfillmentUpdate {
    pub status: FulfillmentStatusCode,
    pub unit_id: UnitId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment_id: Option<FulfillmentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ResponseMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_metadata_uses_single_quality_for_av() {
        let video = RequestMetadata::for_kind(ContentKind::Video, "low", "high");
        assert_eq!(
            video,
            RequestMetadata::Video {
                quality_id: "high".to_string()
            }
        );

        let image = RequestMetadata::for_kind(ContentKind::Image, "low", "high");
        assert_eq!(
            image,
            RequestMetadata::Image {
                low_quality_id: "low".to_string(),
                high_quality_id: "high".to_string()
            }
        );
    }

    #[test]
    fn video_dedup_ignores_billboard() {
        let metadata = ResponseMetadata::Video {
            video_url: "https://cdn/video.mp4".to_string(),
            billboard_url: "https://cdn/billboard.png".to_string(),
        };
        assert_eq!(metadata.dedup_urls(), vec!["https://cdn/video.mp4"]);
    }

    #[test]
    fn request_serializes_with_kind_tag() {
        let request = UnitFulfillmentRequest {
            unit_id: UnitId::new("unit-1"),
            metadata: RequestMetadata::for_kind(ContentKind::Audio, "low", "high"),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["metadata"]["kind"], "audio");
        assert_eq!(json["metadata"]["qualityId"], "high");
    }
}
