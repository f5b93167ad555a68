//! Multi-encoding text decoding for incoming lines.

use encoding::Encoding;
use skein_core::{TransportError, TransportResult};

/// Encodings tried, in order, when no list is configured.
pub const DEFAULT_ENCODINGS: &[&str] = &["utf-8", "iso-8859-1", "shift_jis", "windows-1252"];

/// Decodes raw line bytes by trying each configured encoding strictly, then
/// falling back to lossy UTF-8. Never fails.
#[derive(Debug, Clone)]
pub struct TextDecoder {
    encodings: Vec<&'static Encoding>,
}

impl TextDecoder {
    /// Builds a decoder from WHATWG encoding labels.
    pub fn new<I, S>(labels: I) -> TransportResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let encodings = labels
            .into_iter()
            .map(|label| {
                let label = label.as_ref();
                Encoding::for_label(label.trim().as_bytes())
                    .ok_or_else(|| TransportError::UnknownEncoding(label.to_owned()))
            })
            .collect::<TransportResult<Vec<_>>>()?;
        Ok(Self { encodings })
    }

    /// Returns `true` if `label` names an encoding the decoder understands.
    pub fn is_known_label(label: &str) -> bool {
        Encoding::for_label(label.trim().as_bytes()).is_some()
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        for encoding in &self.encodings {
            if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes)
            {
                return text.into_owned();
            }
        }
        String::from_utf8_lossy(bytes).into_owned()
    }
}

impl Default for TextDecoder {
    /// Uses [`DEFAULT_ENCODINGS`].
    fn default() -> Self {
        Self {
            encodings: DEFAULT_ENCODINGS
                .iter()
                .filter_map(|label| Encoding::for_label(label.as_bytes()))
                .collect(),
        }
    }
}
