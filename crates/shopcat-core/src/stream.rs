//! Wire protocol for scrape progress streams.
//!
//! Each event is one UTF-8 frame `data: <JSON>\n\n`. The JSON is one of:
//!
//! ```text
//! {"message": "..."}                  progress
//! {"error": "..."}                    terminal failure
//! {"finished": true, "data": {...}}   terminal success, data is a Catalog
//! ```
//!
//! Consumers receive arbitrary chunk boundaries and must buffer until the
//! blank-line delimiter; [`EventDecoder`] does exactly that.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::catalog::Catalog;

const DELIMITER: &[u8] = b"\n\n";

/// One event on a scrape progress stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeEvent {
    Progress(String),
    Error(String),
    Finished(Box<Catalog>),
}

impl ScrapeEvent {
    pub fn progress(message: impl Into<String>) -> Self {
        Self::Progress(message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    #[must_use]
    pub fn finished(catalog: Catalog) -> Self {
        Self::Finished(Box::new(catalog))
    }

    /// Terminal events close the stream; exactly one is sent per stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }

    /// Encodes the event as a single `data: <JSON>\n\n` frame.
    #[must_use]
    pub fn encode(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|e| {
            fallback_error_json(&format!("failed to serialize stream event: {e}"))
        });
        format!("data: {json}\n\n")
    }
}

fn fallback_error_json(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

impl Serialize for ScrapeEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Progress(message) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("message", message)?;
                map.end()
            }
            Self::Error(error) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", error)?;
                map.end()
            }
            Self::Finished(catalog) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("finished", &true)?;
                map.serialize_entry("data", catalog)?;
                map.end()
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireEvent {
    Finished { finished: bool, data: Box<Catalog> },
    Error { error: String },
    Progress { message: String },
}

impl<'de> Deserialize<'de> for ScrapeEvent {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match WireEvent::deserialize(deserializer)? {
            WireEvent::Finished {
                finished: true,
                data,
            } => Ok(Self::Finished(data)),
            WireEvent::Finished {
                finished: false, ..
            } => Err(serde::de::Error::custom(
                "finished event must carry `finished: true`",
            )),
            WireEvent::Error { error } => Ok(Self::Error(error)),
            WireEvent::Progress { message } => Ok(Self::Progress(message)),
        }
    }
}

#[derive(Debug, Error)]
pub enum StreamDecodeError {
    #[error("stream frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("stream frame is not a valid event: {source}")]
    InvalidEvent {
        frame: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("stream ended with {0} bytes of an incomplete frame")]
    Truncated(usize),
}

/// Incremental decoder for the frame protocol.
///
/// Feed raw body chunks with [`EventDecoder::push`]; complete frames are
/// decoded and returned, partial frames are buffered until the next chunk.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buf: Vec<u8>,
    /// Prefix of `buf` already searched for a delimiter.
    scanned: usize,
}

impl EventDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every event completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<ScrapeEvent, StreamDecodeError>> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        // A delimiter may straddle the previous chunk boundary.
        let mut from = self.scanned.saturating_sub(DELIMITER.len() - 1);
        while let Some(pos) = find_delimiter(&self.buf[from..]).map(|p| from + p) {
            if let Some(event) = decode_frame(&self.buf[start..pos]) {
                events.push(event);
            }
            start = pos + DELIMITER.len();
            from = start;
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len();
        events
    }

    /// Consumes the decoder at end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`StreamDecodeError::Truncated`] if a non-blank partial frame
    /// is still buffered.
    pub fn finish(self) -> Result<(), StreamDecodeError> {
        if self.buf.iter().all(u8::is_ascii_whitespace) {
            Ok(())
        } else {
            Err(StreamDecodeError::Truncated(self.buf.len()))
        }
    }
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(DELIMITER.len()).position(|w| w == DELIMITER)
}

/// Decodes one frame (without its trailing delimiter).
///
/// Frames without any `data:` line (comments, keep-alives) yield `None`.
fn decode_frame(frame: &[u8]) -> Option<Result<ScrapeEvent, StreamDecodeError>> {
    let Ok(text) = std::str::from_utf8(frame) else {
        return Some(Err(StreamDecodeError::InvalidUtf8));
    };

    let data: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();
    if data.is_empty() {
        return None;
    }

    let payload = data.join("\n");
    Some(
        serde_json::from_str::<ScrapeEvent>(&payload).map_err(|source| {
            StreamDecodeError::InvalidEvent {
                frame: payload,
                source,
            }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Product};
    use serde_json::json;

    fn sample_catalog() -> Catalog {
        let product: Product = serde_json::from_value(json!({
            "id": 1,
            "title": "Tee",
            "handle": "tee",
            "vendor": "Acme",
            "product_type": "Shirts",
            "tags": "a, b",
            "variants": [{"id": 10, "title": "S", "price": "10.00"}]
        }))
        .unwrap();
        Catalog::from_parts(vec![product], Vec::new())
    }

    #[test]
    fn progress_event_encodes_as_message_frame() {
        assert_eq!(
            ScrapeEvent::progress("Fetching page 1").encode(),
            "data: {\"message\":\"Fetching page 1\"}\n\n"
        );
    }

    #[test]
    fn error_event_encodes_as_error_frame() {
        assert_eq!(
            ScrapeEvent::error("boom").encode(),
            "data: {\"error\":\"boom\"}\n\n"
        );
    }

    #[test]
    fn finished_event_carries_flag_and_data() {
        let frame = ScrapeEvent::finished(sample_catalog()).encode();
        let json: serde_json::Value =
            serde_json::from_str(frame.strip_prefix("data: ").unwrap().trim_end()).unwrap();
        assert_eq!(json["finished"], json!(true));
        assert_eq!(json["data"]["vendors"][0]["name"], json!("Acme"));
        assert_eq!(json["data"]["products"][0]["tags"], json!(["a", "b"]));
    }

    #[test]
    fn only_progress_is_non_terminal() {
        assert!(!ScrapeEvent::progress("x").is_terminal());
        assert!(ScrapeEvent::error("x").is_terminal());
        assert!(ScrapeEvent::finished(sample_catalog()).is_terminal());
    }

    #[test]
    fn decoder_buffers_frames_split_across_chunks() {
        let mut wire = ScrapeEvent::progress("one").encode();
        wire.push_str(&ScrapeEvent::finished(sample_catalog()).encode());
        let bytes = wire.as_bytes();

        let mut decoder = EventDecoder::new();
        let mut events = Vec::new();
        for chunk in bytes.chunks(7) {
            events.extend(decoder.push(chunk).into_iter().map(Result::unwrap));
        }
        decoder.finish().unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ScrapeEvent::progress("one"));
        assert_eq!(events[1], ScrapeEvent::finished(sample_catalog()));
    }

    #[test]
    fn decoder_returns_multiple_events_from_one_chunk() {
        let wire = format!(
            "{}{}",
            ScrapeEvent::progress("a").encode(),
            ScrapeEvent::error("b").encode()
        );
        let events: Vec<_> = EventDecoder::new()
            .push(wire.as_bytes())
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(
            events,
            vec![ScrapeEvent::progress("a"), ScrapeEvent::error("b")]
        );
    }

    #[test]
    fn decoder_skips_comment_frames() {
        let events = EventDecoder::new().push(b": keep-alive\n\ndata: {\"message\":\"x\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &ScrapeEvent::progress("x"));
    }

    #[test]
    fn decoder_reports_invalid_json() {
        let events = EventDecoder::new().push(b"data: {not json}\n\n");
        assert!(matches!(
            events.as_slice(),
            [Err(StreamDecodeError::InvalidEvent { .. })]
        ));
    }

    #[test]
    fn decoder_rejects_finished_false() {
        let events = EventDecoder::new().push(b"data: {\"finished\":false,\"data\":{\"products\":[],\"collections\":[],\"vendors\":[],\"productTypes\":[]}}\n\n");
        assert!(matches!(
            events.as_slice(),
            [Err(StreamDecodeError::InvalidEvent { .. })]
        ));
    }

    #[test]
    fn decoder_finds_delimiter_split_across_chunks() {
        let mut decoder = EventDecoder::new();
        assert!(decoder.push(b"data: {\"message\":\"x\"}\n").is_empty());
        let events = decoder.push(b"\ndata: {\"mess");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &ScrapeEvent::progress("x"));
        assert_eq!(decoder.push(b"age\":\"y\"}\n\n").len(), 1);
        decoder.finish().unwrap();
    }

    #[test]
    fn decoder_handles_large_frame_in_small_chunks() {
        let products: Vec<Product> = (0..5_000)
            .map(|id| {
                serde_json::from_value(json!({
                    "id": id,
                    "title": format!("Product {id} with a reasonably long title"),
                    "handle": format!("product-{id}"),
                    "vendor": "Acme",
                    "body_html": "<p>".repeat(80),
                    "updated_at": "2026-01-01T00:00:00Z"
                }))
                .unwrap()
            })
            .collect();
        let catalog = Catalog::from_parts(products, Vec::new());
        let wire = ScrapeEvent::finished(catalog.clone()).encode();
        assert!(wire.len() > 1_000_000, "frame is {} bytes", wire.len());

        let mut decoder = EventDecoder::new();
        let mut events = Vec::new();
        for chunk in wire.as_bytes().chunks(512) {
            events.extend(decoder.push(chunk));
        }
        decoder.finish().unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(
            events.pop().unwrap().unwrap(),
            ScrapeEvent::finished(catalog)
        );
    }

    #[test]
    fn finish_reports_truncated_frame() {
        let mut decoder = EventDecoder::new();
        assert!(decoder.push(b"data: {\"message\":").is_empty());
        assert!(matches!(
            decoder.finish(),
            Err(StreamDecodeError::Truncated(_))
        ));
    }
}
