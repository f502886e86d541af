// ABOUTME: Attachment normalization that moves inline bytes behind cache or store URLs
// ABOUTME: Computes content digests and drops attachments a connection already received
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{PayloadSanitizer, SentAttachmentTracker};
use crate::attachments::{Attachment, AttachmentMap, PreviewAsset};
use crate::cache::data_uri::{decode_data_uri, is_data_uri};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use relay_core::constants::sanitizer::{DEFAULT_MEDIA_TYPE, HTML_PREVIEW_PROFILE};
use sha2::{Digest, Sha256};
use tracing::warn;

/// Inline bytes found on an attachment before externalization
struct InlinePayload {
    bytes: Vec<u8>,
    /// Media type declared by a `data:` URI, if that is where the bytes came from
    declared_media_type: Option<String>,
    /// The literal `data:` URI, reusable as a descriptor cache key
    data_uri: Option<String>,
}

/// Content digest over the fields that change when the delivered content changes:
/// the URI, the sorted preview CDN URLs and the media type.
#[must_use]
pub fn attachment_digest(attachment: &Attachment) -> String {
    let mut cdn_urls: Vec<&str> = attachment
        .preview_assets
        .iter()
        .map(|asset| asset.cdn_url.as_str())
        .collect();
    cdn_urls.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(attachment.uri.as_bytes());
    hasher.update([0x1f]);
    for url in cdn_urls {
        hasher.update(url.as_bytes());
        hasher.update([0x1e]);
    }
    hasher.update([0x1f]);
    hasher.update(attachment.media_type.as_bytes());
    hex::encode(hasher.finalize())
}

fn is_html(attachment: &Attachment) -> bool {
    let media = attachment.media_type.trim().to_ascii_lowercase();
    let format = attachment.format.trim().to_ascii_lowercase();
    let profile = attachment.preview_profile.trim().to_ascii_lowercase();
    media.contains("html") || format == "html" || profile.contains(HTML_PREVIEW_PROFILE)
}

fn is_image(media_type: &str) -> bool {
    media_type.trim().to_ascii_lowercase().starts_with("image/")
}

fn is_textual(media_type: &str) -> bool {
    let media = media_type.trim().to_ascii_lowercase();
    media.starts_with("text/") || media.contains("markdown") || media.contains("json")
}

/// Attach the HTML preview profile and a single iframe asset pointing at the URI
fn ensure_html_preview(mut attachment: Attachment) -> Attachment {
    if !is_html(&attachment) {
        return attachment;
    }
    if attachment.media_type.is_empty() {
        "text/html".clone_into(&mut attachment.media_type);
    }
    if attachment.format.is_empty() {
        "html".clone_into(&mut attachment.format);
    }
    if attachment.preview_profile.is_empty() {
        HTML_PREVIEW_PROFILE.clone_into(&mut attachment.preview_profile);
    }

    let has_html_asset = attachment
        .preview_assets
        .iter()
        .any(|asset| asset.mime_type.to_ascii_lowercase().contains("html"));
    let uri = attachment.uri.trim();
    if !has_html_asset && !uri.is_empty() && !is_data_uri(uri) {
        let asset = PreviewAsset {
            asset_id: format!("{}-html", attachment.name.trim()),
            label: "HTML preview".to_owned(),
            cdn_url: uri.to_owned(),
            mime_type: attachment.media_type.clone(),
            preview_type: "iframe".to_owned(),
        };
        attachment.preview_assets.push(asset);
    }
    attachment
}

fn inline_payload(attachment: &Attachment) -> Option<InlinePayload> {
    let data = attachment.data.trim();
    if !data.is_empty() {
        if is_data_uri(data) {
            let decoded = decode_data_uri(data)?;
            return Some(InlinePayload {
                bytes: decoded.bytes,
                declared_media_type: Some(decoded.media_type),
                data_uri: Some(data.to_owned()),
            });
        }
        let bytes = STANDARD.decode(data).ok().filter(|b| !b.is_empty())?;
        return Some(InlinePayload {
            bytes,
            declared_media_type: None,
            data_uri: None,
        });
    }

    let uri = attachment.uri.trim();
    if is_data_uri(uri) {
        let decoded = decode_data_uri(uri)?;
        return Some(InlinePayload {
            bytes: decoded.bytes,
            declared_media_type: Some(decoded.media_type),
            data_uri: Some(uri.to_owned()),
        });
    }
    None
}

impl PayloadSanitizer {
    /// Whether inline bytes may travel alongside a resolved URL.
    ///
    /// Images always keep their bytes for immediate rendering; text, markdown
    /// and JSON keep them while at or under the retention threshold.
    #[must_use]
    pub fn should_retain_inline(&self, media_type: &str, size: usize) -> bool {
        if size == 0 {
            return false;
        }
        is_image(media_type)
            || (is_textual(media_type) && size <= self.config.inline_retention_bytes)
    }

    /// Externalize an attachment's inline payload.
    ///
    /// A `data:` URI (in `data` or `uri`) or raw base64 `data` without a
    /// resolved URI is moved behind the attachment store or the content cache
    /// and the resulting URL adopted. `data` is then cleared unless
    /// [`should_retain_inline`](Self::should_retain_inline) allows keeping it.
    /// HTML attachments additionally get a preview profile and asset.
    #[must_use]
    pub fn normalize_attachment(&self, mut attachment: Attachment) -> Attachment {
        let has_resolved_uri = {
            let uri = attachment.uri.trim();
            !uri.is_empty() && !is_data_uri(uri)
        };
        let inline = inline_payload(&attachment);

        match inline {
            Some(payload) if payload.data_uri.is_some() || !has_resolved_uri => {
                self.externalize(&mut attachment, payload);
            }
            Some(payload) => {
                // Already served elsewhere: keep the bytes only where allowed
                if !self.should_retain_inline(&attachment.media_type, payload.bytes.len()) {
                    attachment.data.clear();
                }
            }
            None if has_resolved_uri && !attachment.data.is_empty() => {
                // Undecodable leftovers next to a real URL are never useful
                if !is_image(&attachment.media_type) {
                    attachment.data.clear();
                }
            }
            None => {}
        }

        ensure_html_preview(attachment)
    }

    fn externalize(&self, attachment: &mut Attachment, payload: InlinePayload) {
        let media_type = match (&payload.declared_media_type, attachment.media_type.trim()) {
            (Some(declared), "") => declared.clone(),
            (_, "") if is_html(attachment) => "text/html".to_owned(),
            (_, "") => DEFAULT_MEDIA_TYPE.to_owned(),
            (_, declared) => declared.to_owned(),
        };

        let Some(url) = self.persist(attachment, &media_type, &payload) else {
            return;
        };

        attachment.uri = url;
        if attachment.media_type.trim().is_empty() {
            attachment.media_type = media_type;
        }
        attachment.data = if self.should_retain_inline(&attachment.media_type, payload.bytes.len())
        {
            STANDARD.encode(&payload.bytes)
        } else {
            String::new()
        };
    }

    fn persist(
        &self,
        attachment: &Attachment,
        media_type: &str,
        payload: &InlinePayload,
    ) -> Option<String> {
        if let Some(store) = &self.store {
            match store.store_bytes(&attachment.name, media_type, &payload.bytes) {
                Ok(uri) if !uri.trim().is_empty() => return Some(uri),
                Ok(_) => {}
                Err(e) => {
                    warn!(attachment = %attachment.name, error = %e, "Attachment store rejected payload, using content cache");
                }
            }
        }

        if let Some(literal) = &payload.data_uri {
            if let Some(descriptor) = self.cache.maybe_store_data_uri(literal) {
                return Some(descriptor.url);
            }
        }
        self.cache.store_bytes(media_type, &payload.bytes)
    }

    /// Normalize attachments and drop those this connection already received.
    ///
    /// Unless `force_all` is set, an attachment whose digest equals the digest
    /// last sent under the same name is omitted. Returns `None` when the input
    /// is empty or every attachment was suppressed.
    pub fn sanitize_attachments_for_stream(
        &self,
        attachments: &AttachmentMap,
        sent: &mut SentAttachmentTracker,
        force_all: bool,
    ) -> Option<AttachmentMap> {
        let mut outgoing = AttachmentMap::new();
        for (name, attachment) in attachments {
            let normalized = self.normalize_attachment(attachment.clone());
            let digest = attachment_digest(&normalized);
            if !force_all && sent.already_sent(name, &digest) {
                continue;
            }
            sent.record(name, digest);
            outgoing.insert(name.clone(), normalized);
        }
        (!outgoing.is_empty()).then_some(outgoing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, ContentCache};
    use crate::sanitizer::SanitizerConfig;
    use std::sync::Arc;

    fn sanitizer() -> PayloadSanitizer {
        PayloadSanitizer::new(
            Arc::new(ContentCache::new(&CacheConfig::default())),
            SanitizerConfig::default(),
        )
    }

    #[test]
    fn test_digest_ignores_asset_order() {
        let asset = |url: &str| PreviewAsset {
            cdn_url: url.to_owned(),
            ..PreviewAsset::default()
        };
        let mut a = Attachment::new("x", "text/html").with_uri("/u");
        a.preview_assets = vec![asset("/1"), asset("/2")];
        let mut b = a.clone();
        b.preview_assets.reverse();
        assert_eq!(attachment_digest(&a), attachment_digest(&b));

        let c = a.clone().with_uri("/other");
        assert_ne!(attachment_digest(&a), attachment_digest(&c));
    }

    #[test]
    fn test_large_binary_loses_inline_data() {
        let sanitizer = sanitizer();
        let bytes = vec![7_u8; 10_000];
        let att = Attachment::new("blob.bin", "application/pdf").with_data(STANDARD.encode(&bytes));
        let normalized = sanitizer.normalize_attachment(att);
        assert!(normalized.uri.starts_with("/api/data/"));
        assert!(normalized.data.is_empty());
    }

    #[test]
    fn test_image_keeps_inline_data() {
        let sanitizer = sanitizer();
        let att = Attachment::new("pic.png", "image/png").with_data(STANDARD.encode([1_u8, 2, 3]));
        let normalized = sanitizer.normalize_attachment(att);
        assert!(!normalized.uri.is_empty());
        assert!(!normalized.data.is_empty());
    }

    #[test]
    fn test_data_uri_in_uri_field_adopts_media_type() {
        let sanitizer = sanitizer();
        let mut att = Attachment::new("notes", "");
        att.uri = "data:text/markdown;base64,IyBIaQ==".to_owned();
        let normalized = sanitizer.normalize_attachment(att);
        assert_eq!(normalized.media_type, "text/markdown");
        assert!(normalized.uri.starts_with("/api/data/"));
        assert_eq!(normalized.data, "IyBIaQ==");
    }

    #[test]
    fn test_external_uri_with_large_text_clears_data() {
        let sanitizer = sanitizer();
        let text = "a".repeat(5_000);
        let att = Attachment::new("log.txt", "text/plain")
            .with_uri("https://cdn.example.com/log.txt")
            .with_data(STANDARD.encode(text));
        let normalized = sanitizer.normalize_attachment(att);
        assert_eq!(normalized.uri, "https://cdn.example.com/log.txt");
        assert!(normalized.data.is_empty());
    }

    #[test]
    fn test_force_all_resends() {
        let sanitizer = sanitizer();
        let mut sent = SentAttachmentTracker::default();
        let mut map = AttachmentMap::new();
        map.insert(
            "a".to_owned(),
            Attachment::new("a", "application/pdf").with_uri("/files/a.pdf"),
        );
        assert!(sanitizer.sanitize_attachments_for_stream(&map, &mut sent, false).is_some());
        assert!(sanitizer.sanitize_attachments_for_stream(&map, &mut sent, false).is_none());
        assert!(sanitizer.sanitize_attachments_for_stream(&map, &mut sent, true).is_some());
    }
}
