//! Attachment payload kinds and the actions they offer.
//!
//! The engine never opens viewers or launches apps itself; it only resolves
//! which URIs a platform collaborator should offer for an attachment.

use serde::{Deserialize, Serialize};

/// Attachment payload carried by a message.
///
/// A message has at most one attachment; the message body doubles as the
/// caption when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Attachment {
    /// A still image.
    Image {
        /// URL of the full-size media.
        media_url: String,
        /// URL of a preview thumbnail, if one was generated.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail_url: Option<String>,
    },
    /// A video clip.
    Video {
        /// URL of the full-size media.
        media_url: String,
        /// URL of a preview thumbnail, if one was generated.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail_url: Option<String>,
    },
    /// An arbitrary file.
    Document {
        /// URL of the file.
        url: String,
        /// Display name of the file.
        file_name: String,
        /// Size in bytes.
        #[serde(default)]
        file_size: u64,
    },
    /// A geographic position.
    Location {
        latitude: f64,
        longitude: f64,
        /// Reverse-geocoded address, if known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<String>,
    },
    /// A shared contact card.
    Contact {
        /// Contact display name.
        name: String,
        /// Phone numbers in the order they appear on the card.
        #[serde(default)]
        phone_numbers: Vec<String>,
        /// Email addresses in the order they appear on the card.
        #[serde(default)]
        emails: Vec<String>,
    },
}

impl Attachment {
    /// One-line summary for conversation previews.
    pub fn summary(&self) -> String {
        match self {
            Attachment::Image { .. } => "Image".to_string(),
            Attachment::Video { .. } => "Video".to_string(),
            Attachment::Document { file_name, .. } => file_name.clone(),
            Attachment::Location { .. } => "Location".to_string(),
            Attachment::Contact { name, .. } => name.clone(),
        }
    }

    /// Resolve what a platform collaborator should offer for this attachment.
    pub fn resolve_action(&self) -> AttachmentAction {
        match self {
            Attachment::Image { media_url, .. } => AttachmentAction {
                kind: AttachmentActionKind::ViewMedia,
                target_uris: vec![media_url.clone()],
            },
            Attachment::Video { media_url, .. } => AttachmentAction {
                kind: AttachmentActionKind::PlayMedia,
                target_uris: vec![media_url.clone()],
            },
            Attachment::Document { url, .. } => AttachmentAction {
                kind: AttachmentActionKind::OpenDocument,
                // Google Docs viewer as a browser fallback for devices
                // without a native handler.
                target_uris: vec![
                    url.clone(),
                    format!(
                        "https://docs.google.com/viewer?url={}",
                        urlencode(url)
                    ),
                ],
            },
            Attachment::Location {
                latitude,
                longitude,
                ..
            } => AttachmentAction {
                kind: AttachmentActionKind::OpenMap,
                target_uris: vec![
                    format!("geo:{latitude},{longitude}"),
                    format!("https://www.google.com/maps?q={latitude},{longitude}"),
                ],
            },
            Attachment::Contact {
                phone_numbers,
                emails,
                ..
            } => {
                let mut targets = Vec::new();
                if let Some(number) = phone_numbers.first() {
                    targets.push(format!("tel:{number}"));
                    targets.push(format!("sms:{number}"));
                }
                if let Some(email) = emails.first() {
                    targets.push(format!("mailto:{email}"));
                }
                AttachmentAction {
                    kind: AttachmentActionKind::ContactOptions,
                    target_uris: targets,
                }
            }
        }
    }
}

/// What kind of external viewer the attachment calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentActionKind {
    /// Open an image viewer.
    ViewMedia,
    /// Open a video player.
    PlayMedia,
    /// Open a document viewer.
    OpenDocument,
    /// Open a maps application.
    OpenMap,
    /// Offer call / message / email options for a contact.
    ContactOptions,
}

/// The resolved action for an attachment: the viewer kind plus the URIs to
/// offer, in preference order. Launching anything is up to the platform
/// collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentAction {
    pub kind: AttachmentActionKind,
    pub target_uris: Vec<String>,
}

/// Format a byte count for display (document rows).
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// Minimal percent-encoding for embedding a URL as a query value.
fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
