//! The per-run output bundle handed to the persistence collaborator.
//!
//! The core never performs its own network or database I/O; a run returns
//! plain serializable data and the collaborator persists it.

use serde::{Deserialize, Serialize};

use super::features::QuestionFeatures;
use super::geometry::BBox;
use super::markscheme::MsLink;
use super::question::{SegmentedQuestion, SegmentationWarning};
use super::tags::Tag;

/// Identifying metadata for one (question paper, mark scheme) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub board: String,
    pub level: String,
    pub subject_code: String,
    pub subject_name: String,
    pub year: u16,
    pub season: String,
    pub paper_number: String,
}

/// A rendered, hashed PNG crop of a question or part region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualCrop {
    pub question_number: u32,
    /// Part code, empty for the whole-question region.
    pub part_code: String,
    pub bbox: BBox,
    /// PNG-encoded bitmap.
    #[serde(with = "serde_bytes_hex")]
    pub png: Vec<u8>,
    /// SHA-256 of the PNG bytes, hex-encoded. Content fingerprint used by
    /// the storage layer for deduplication.
    pub content_hash: String,
    pub dpi: f64,
}

/// Everything one ingestion run produces for one paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperOutput {
    pub metadata: PaperMetadata,
    pub questions: Vec<SegmentedQuestion>,
    pub ms_links: Vec<MsLink>,
    /// Tag lists per question, parallel to `questions`.
    pub tags: Vec<Vec<Tag>>,
    /// Features per question, parallel to `questions`.
    pub features: Vec<QuestionFeatures>,
    /// Present only when a rasteriser was supplied to the run.
    pub crops: Vec<VisualCrop>,
    pub warnings: Vec<SegmentationWarning>,
}

/// Serialize binary crops as hex so JSON reports stay inspectable.
mod serde_bytes_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        let mut out = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            out.push_str(&format!("{b:02x}"));
        }
        ser.serialize_str(&out)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        if !s.is_ascii() {
            return Err(serde::de::Error::custom("non-ascii hex string"));
        }
        if s.len() % 2 != 0 {
            return Err(serde::de::Error::custom("odd-length hex string"));
        }
        (0..s.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&s[i..i + 2], 16)
                    .map_err(|e| serde::de::Error::custom(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Wrap(#[serde(with = "super::serde_bytes_hex")] Vec<u8>);

    #[test]
    fn hex_field_decodes() {
        let Wrap(bytes) = serde_json::from_str(r#""0aff""#).unwrap();
        assert_eq!(bytes, vec![0x0a, 0xff]);
    }

    #[test]
    fn odd_length_hex_is_rejected() {
        assert!(serde_json::from_str::<Wrap>(r#""0a1""#).is_err());
    }

    #[test]
    fn multibyte_hex_input_is_an_error_not_a_panic() {
        assert!(serde_json::from_str::<Wrap>(r#""éé""#).is_err());
    }
}
