// ABOUTME: Attachment model carried by agent events and its coercion from untyped payloads
// ABOUTME: Normalizes both typed maps and serialization round-tripped JSON into one canonical form
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Persistent attachment store used to externalize inline payloads
pub mod store;

pub use store::{AttachmentStore, LocalAttachmentStore};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Attachments keyed by their logical name, ordered for stable wire output
pub type AttachmentMap = BTreeMap<String, Attachment>;

/// One preview rendition of an attachment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewAsset {
    /// Asset identifier, unique within the attachment
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub asset_id: String,
    /// Human-readable label
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    /// Location of the rendition
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cdn_url: String,
    /// Media type of the rendition
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mime_type: String,
    /// How the client should render it (`iframe`, `image`, ...)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub preview_type: String,
}

/// A file or document attached to an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Logical name
    #[serde(default)]
    pub name: String,
    /// Declared media type
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    /// Inline payload, base64 of the bytes (or a `data:` URI)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
    /// Externalized location
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,
    /// Producer of the attachment
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Attachment kind (`artifact`, `attachment`, ...)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Document format hint (`html`, `markdown`, ...)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
    /// Preview profile hint for clients
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub preview_profile: String,
    /// Ordered preview renditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preview_assets: Vec<PreviewAsset>,
    /// Retention hint for stored payloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_ttl_seconds: Option<u64>,
}

impl Attachment {
    /// Create an attachment with a name and media type
    pub fn new(name: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            ..Self::default()
        }
    }

    /// Set the inline payload
    #[must_use]
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    /// Set the externalized location
    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }
}

/// Attachment mapping in either of the two shapes events carry
#[derive(Debug, Clone, Copy)]
pub enum AttachmentSource<'a> {
    /// Already-typed mapping
    Typed(&'a AttachmentMap),
    /// Generic structural value, e.g. after a JSON round-trip
    Untyped(&'a Value),
}

/// Coerce an attachment mapping into its canonical typed form.
///
/// Untyped entries that do not look like attachment records are skipped and a
/// missing `name` defaults to the map key. Returns `None` for null, non-map or
/// empty input, or when no entry survives.
#[must_use]
pub fn coerce_attachment_map(source: AttachmentSource<'_>) -> Option<AttachmentMap> {
    let map = match source {
        AttachmentSource::Typed(map) => map.clone(),
        AttachmentSource::Untyped(Value::Object(raw)) => raw
            .iter()
            .filter_map(|(key, entry)| {
                let entry = entry.as_object().filter(|e| is_attachment_record(e))?;
                Some((key.clone(), attachment_from_map(key, entry)))
            })
            .collect(),
        AttachmentSource::Untyped(_) => return None,
    };
    (!map.is_empty()).then_some(map)
}

/// An untyped entry is an attachment if it has any of the identifying fields
#[must_use]
pub fn is_attachment_record(entry: &Map<String, Value>) -> bool {
    ["data", "uri", "media_type", "name"]
        .iter()
        .any(|key| entry.contains_key(*key))
}

fn string_field(entry: &Map<String, Value>, key: &str) -> String {
    entry
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_default()
}

fn attachment_from_map(key: &str, entry: &Map<String, Value>) -> Attachment {
    let mut attachment = Attachment {
        name: string_field(entry, "name"),
        media_type: string_field(entry, "media_type"),
        data: string_field(entry, "data"),
        uri: string_field(entry, "uri"),
        source: string_field(entry, "source"),
        description: string_field(entry, "description"),
        kind: string_field(entry, "kind"),
        format: string_field(entry, "format"),
        preview_profile: string_field(entry, "preview_profile"),
        preview_assets: entry
            .get("preview_assets")
            .and_then(Value::as_array)
            .map(|assets| {
                assets
                    .iter()
                    .filter_map(Value::as_object)
                    .map(preview_asset_from_map)
                    .collect()
            })
            .unwrap_or_default(),
        retention_ttl_seconds: entry.get("retention_ttl_seconds").and_then(Value::as_u64),
    };
    if attachment.name.is_empty() {
        key.clone_into(&mut attachment.name);
    }
    attachment
}

fn preview_asset_from_map(entry: &Map<String, Value>) -> PreviewAsset {
    PreviewAsset {
        asset_id: string_field(entry, "asset_id"),
        label: string_field(entry, "label"),
        cdn_url: string_field(entry, "cdn_url"),
        mime_type: string_field(entry, "mime_type"),
        preview_type: string_field(entry, "preview_type"),
    }
}
