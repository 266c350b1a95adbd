use crate::error::FormPressError;
use base64::Engine;
use serde::Deserialize;

/// Structured payload gathered by the intake form. Every field is optional:
/// an absent value renders as the `"N/A"` placeholder, never as a blank gap,
/// so column alignment stays deterministic across records.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IntakeRecord {
    // Identity
    pub name: Option<String>,
    pub company: Option<String>,
    pub billing_address: Option<String>,
    pub installation_address: Option<String>,
    pub city: Option<String>,
    pub pin: Option<String>,
    pub state: Option<String>,
    pub mobile: Option<String>,
    pub telephone: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub dob: Option<String>,

    // Plan
    pub plan_name: Option<String>,
    pub plan_id: Option<String>,
    pub installation_charges: Option<String>,
    pub renewal_charges: Option<String>,
    pub static_ips: Option<String>,
    pub other_charges: Option<String>,

    // Payment
    pub payment_mode: Option<String>,
    pub amount: Option<String>,
    pub bank: Option<String>,
    pub branch: Option<String>,
    pub cheque_no: Option<String>,
    pub dated: Option<String>,
    pub pan: Option<String>,

    // Declaration (payment made by a third party)
    pub entity_payment_name: Option<String>,
    pub entity_payment_details: Option<String>,

    // Provenance
    pub place: Option<String>,
    pub date: Option<String>,
}

/// The literal rendered wherever a field is absent.
pub const PLACEHOLDER: &str = "N/A";

/// Field text or the placeholder. Whitespace-only values count as absent.
pub fn field_or_placeholder(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => PLACEHOLDER,
    }
}

/// Declared content kind of an attachment. Set explicitly at construction;
/// the composer dispatches on this, never on payload sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Bitmap,
    Pdf,
}

impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Bitmap => "bitmap",
            AttachmentKind::Pdf => "pdf",
        }
    }
}

/// Where in the receipt an attachment lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentSlot {
    /// Fixed ~30x30 mm box at the top right of the first page.
    ProfilePhoto,
    /// Appended after the terms page, one output page per source page.
    Document1,
    Document2,
    /// Fixed ~40x20 mm box in the signature block and on the terms page.
    Signature,
}

impl AttachmentSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentSlot::ProfilePhoto => "profile_photo",
            AttachmentSlot::Document1 => "document1",
            AttachmentSlot::Document2 => "document2",
            AttachmentSlot::Signature => "signature",
        }
    }
}

/// Binary content handed over by the form. Owned by the composer for the
/// duration of one composition call and not retained afterward.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub slot: AttachmentSlot,
    pub kind: AttachmentKind,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(slot: AttachmentSlot, kind: AttachmentKind, data: Vec<u8>) -> Self {
        Self { slot, kind, data }
    }

    /// Convenience for form payloads still delivered as self-describing
    /// `data:` URIs. The MIME prefix decides the kind once, up front; an
    /// unrecognized prefix is an attachment error the composer downgrades
    /// to a logged skip.
    pub fn from_data_uri(slot: AttachmentSlot, uri: &str) -> Result<Self, FormPressError> {
        let (mime, data) = parse_data_uri(uri).ok_or_else(|| {
            FormPressError::Attachment(format!("malformed data URI for slot {}", slot.as_str()))
        })?;
        let kind = if mime.starts_with("image/") {
            AttachmentKind::Bitmap
        } else if mime == "application/pdf" {
            AttachmentKind::Pdf
        } else {
            return Err(FormPressError::Attachment(format!(
                "unsupported attachment type {} for slot {}",
                mime,
                slot.as_str()
            )));
        };
        Ok(Self { slot, kind, data })
    }
}

pub(crate) fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    if !uri.starts_with("data:") {
        return None;
    }
    let (header, payload) = uri.split_once(',')?;
    let mime = header
        .trim_start_matches("data:")
        .split(';')
        .next()
        .filter(|v| !v.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some((mime, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    #[test]
    fn empty_record_deserializes_with_every_field_absent() {
        let record: IntakeRecord = serde_json::from_str("{}").unwrap();
        assert!(record.name.is_none());
        assert!(record.plan_id.is_none());
        assert_eq!(field_or_placeholder(record.name.as_deref()), PLACEHOLDER);
    }

    #[test]
    fn whitespace_only_values_render_as_placeholder() {
        assert_eq!(field_or_placeholder(Some("   ")), PLACEHOLDER);
        assert_eq!(field_or_placeholder(Some("Aurangabad")), "Aurangabad");
    }

    #[test]
    fn data_uri_prefix_selects_bitmap_kind() {
        let payload = base64::engine::general_purpose::STANDARD.encode([0xFFu8, 0xD8, 0xFF]);
        let uri = format!("data:image/jpeg;base64,{payload}");
        let att = Attachment::from_data_uri(AttachmentSlot::ProfilePhoto, &uri).unwrap();
        assert_eq!(att.kind, AttachmentKind::Bitmap);
        assert_eq!(att.data, vec![0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn data_uri_prefix_selects_pdf_kind() {
        let payload = base64::engine::general_purpose::STANDARD.encode(b"%PDF-1.4");
        let uri = format!("data:application/pdf;base64,{payload}");
        let att = Attachment::from_data_uri(AttachmentSlot::Document1, &uri).unwrap();
        assert_eq!(att.kind, AttachmentKind::Pdf);
    }

    #[test]
    fn unknown_mime_is_an_attachment_error() {
        let uri = "data:text/plain;base64,SGVsbG8=";
        let err = Attachment::from_data_uri(AttachmentSlot::Document2, uri).unwrap_err();
        assert!(matches!(err, FormPressError::Attachment(_)));
    }

    #[test]
    fn record_parses_superset_fields_from_form_json() {
        let json = r#"{
            "name": "A. Customer",
            "plan_id": "PLAN-42",
            "entity_payment_name": "Acme Pvt. Ltd.",
            "gender": "Male",
            "dob": "1990-01-01"
        }"#;
        let record: IntakeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.plan_id.as_deref(), Some("PLAN-42"));
        assert_eq!(record.entity_payment_name.as_deref(), Some("Acme Pvt. Ltd."));
    }
}
