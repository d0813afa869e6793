//! Frame-data redaction.
//!
//! The envelope's `frame` object carries the raw image bytes next to the
//! metadata downstream consumers rely on. Redaction rebuilds `frame` from a
//! whitelist, so the image data cannot leak no matter what other fields the
//! envelope grows.

use crate::metrics::record_transform_duration;
use serde_json::{Map, Value};
use std::time::Instant;

/// Frame fields still needed downstream after redaction.
const FRAME_WHITELIST: [&str; 4] = ["source_id", "timestamp_utc_ms", "shape", "camera_location"];

pub struct FrameRedactor {
    enabled: bool,
}

impl FrameRedactor {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The bytes to forward: the input untouched when disabled, otherwise
    /// the envelope with `frame` reduced to the whitelist. Fails only when
    /// redaction is on and the payload is not a JSON object.
    pub fn apply(&self, payload: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
        if !self.enabled {
            return Ok(payload.to_vec());
        }

        let started = Instant::now();

        let mut envelope: Value = serde_json::from_slice(payload)?;
        if let Some(frame) = envelope.get_mut("frame") {
            let mut kept = Map::new();
            for field in FRAME_WHITELIST {
                if let Some(value) = frame.get(field) {
                    kept.insert(field.to_string(), value.clone());
                }
            }
            *frame = Value::Object(kept);
        }

        let bytes = serde_json::to_vec(&envelope)?;
        record_transform_duration(started.elapsed());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "frame": {
                "source_id": "cam1",
                "timestamp_utc_ms": 1722945600000u64,
                "shape": { "width": 1920, "height": 1080, "channels": 3 },
                "camera_location": { "lat": 49.0, "lon": 8.4 },
                "data": "aGVhdnkgYmFzZTY0IGltYWdlIGJ5dGVz"
            },
            "detections": [ { "class": "car", "confidence": 0.93 } ]
        }))
        .unwrap()
    }

    #[test]
    fn test_disabled_passes_bytes_through_untouched() {
        let redactor = FrameRedactor::new(false);
        let input = b"not even json".to_vec();
        assert_eq!(redactor.apply(&input).unwrap(), input);
    }

    #[test]
    fn test_redaction_strips_data_and_keeps_whitelist() {
        let redactor = FrameRedactor::new(true);
        let out: Value = serde_json::from_slice(&redactor.apply(&envelope()).unwrap()).unwrap();

        let frame = out.get("frame").unwrap();
        assert!(frame.get("data").is_none());
        assert_eq!(frame.get("source_id").unwrap(), "cam1");
        assert_eq!(frame.get("timestamp_utc_ms").unwrap(), 1722945600000u64);
        assert!(frame.get("shape").is_some());
        assert!(frame.get("camera_location").is_some());
    }

    #[test]
    fn test_redaction_preserves_sibling_fields() {
        let redactor = FrameRedactor::new(true);
        let out: Value = serde_json::from_slice(&redactor.apply(&envelope()).unwrap()).unwrap();

        assert_eq!(out["detections"][0]["class"], "car");
    }

    #[test]
    fn test_redaction_drops_unknown_frame_fields() {
        let redactor = FrameRedactor::new(true);
        let input = serde_json::to_vec(&json!({
            "frame": { "source_id": "cam1", "debug_blob": "xxxx" }
        }))
        .unwrap();

        let out: Value = serde_json::from_slice(&redactor.apply(&input).unwrap()).unwrap();
        assert!(out["frame"].get("debug_blob").is_none());
        assert_eq!(out["frame"]["source_id"], "cam1");
    }

    #[test]
    fn test_envelope_without_frame_survives() {
        let redactor = FrameRedactor::new(true);
        let input = serde_json::to_vec(&json!({ "detections": [] })).unwrap();

        let out: Value = serde_json::from_slice(&redactor.apply(&input).unwrap()).unwrap();
        assert!(out.get("frame").is_none());
        assert!(out.get("detections").is_some());
    }

    #[test]
    fn test_invalid_payload_is_an_error_when_enabled() {
        let redactor = FrameRedactor::new(true);
        assert!(redactor.apply(b"\x00\x01 not json").is_err());
    }
}
