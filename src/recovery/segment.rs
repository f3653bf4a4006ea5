use serde::Serialize;

/// One captioned utterance: the elapsed-time marker shown by the player and
/// the text spoken from that point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptSegment {
    pub timestamp: String,
    #[serde(rename = "transcribed_text")]
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(timestamp: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            text: text.into(),
        }
    }
}

/// Ordered transcript recovered from a single agent run. Segment order is the
/// video's chronological order and is never rearranged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranscriptSet {
    transcriptions: Vec<TranscriptSegment>,
}

impl TranscriptSet {
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        Self {
            transcriptions: segments,
        }
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.transcriptions
    }

    pub fn len(&self) -> usize {
        self.transcriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcriptions.is_empty()
    }

    /// Render as `{"transcriptions": [...]}` with four-space indentation.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        String::from_utf8(buf).map_err(<serde_json::Error as serde::ser::Error>::custom)
    }
}
