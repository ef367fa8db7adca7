//! The single result message a worker reports to its caller.

use std::{
    io::{self, Write},
    path::PathBuf,
    time::Duration,
};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Outcome of one request: exactly one of these is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResult {
    Success {
        output_path: PathBuf,
        processing_time: Duration,
        inference_steps: usize,
        model: String,
        image_size: ImageSize,
    },
    Failure {
        error: String,
        /// Absent when the failure happened before timing started.
        processing_time: Option<Duration>,
    },
}

#[derive(Serialize)]
#[serde(untagged)]
enum Message<'a> {
    Success {
        success: bool,
        output_path: String,
        processing_time: u64,
        inference_steps: usize,
        model: &'a str,
        image_size: ImageSize,
    },
    Failure {
        success: bool,
        error: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        processing_time: Option<u64>,
    },
}

impl GenerationResult {
    pub fn failure(error: impl Into<String>, processing_time: Option<Duration>) -> Self {
        Self::Failure {
            error: error.into(),
            processing_time,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    fn message(&self) -> Message<'_> {
        match self {
            Self::Success {
                output_path,
                processing_time,
                inference_steps,
                model,
                image_size,
            } => Message::Success {
                success: true,
                output_path: output_path.display().to_string(),
                processing_time: processing_time.as_secs(),
                inference_steps: *inference_steps,
                model,
                image_size: *image_size,
            },
            Self::Failure {
                error,
                processing_time,
            } => Message::Failure {
                success: false,
                error,
                processing_time: processing_time.map(|elapsed| elapsed.as_secs()),
            },
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.message()).unwrap_or_else(|e| {
            serde_json::json!({ "success": false, "error": format!("failed to encode result: {e}") })
        })
    }

    /// Compact single-line JSON, `success` first.
    pub fn encode(&self) -> String {
        serde_json::to_string(&self.message()).unwrap_or_else(|e| {
            serde_json::json!({ "success": false, "error": format!("failed to encode result: {e}") })
                .to_string()
        })
    }

    /// Writes the message as one line and flushes; nothing else goes to `out`.
    pub fn emit<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "{}", self.encode())?;
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_message_shape() {
        let result = GenerationResult::Success {
            output_path: PathBuf::from("/out/abc123_generated.jpg"),
            processing_time: Duration::from_millis(7_900),
            inference_steps: 4,
            model: "flux-schnell".to_string(),
            image_size: ImageSize {
                width: 1024,
                height: 768,
            },
        };
        assert_eq!(
            result.to_json(),
            json!({
                "success": true,
                "output_path": "/out/abc123_generated.jpg",
                "processing_time": 7,
                "inference_steps": 4,
                "model": "flux-schnell",
                "image_size": { "width": 1024, "height": 768 }
            })
        );
    }

    #[test]
    fn failure_message_shape() {
        let result = GenerationResult::failure("Input image not found: x.jpg", Some(Duration::ZERO));
        assert_eq!(
            result.to_json(),
            json!({ "success": false, "error": "Input image not found: x.jpg", "processing_time": 0 })
        );
    }

    #[test]
    fn failure_before_timing_omits_processing_time() {
        let value = GenerationResult::failure("Usage: worker", None).to_json();
        assert!(value.get("processing_time").is_none());
        assert_eq!(value["success"], false);
    }

    #[test]
    fn encoded_fields_keep_declaration_order() {
        let failure = GenerationResult::failure("boom", Some(Duration::from_secs(2))).encode();
        assert_eq!(failure, r#"{"success":false,"error":"boom","processing_time":2}"#);

        let success = GenerationResult::Success {
            output_path: PathBuf::from("/out/a_generated.jpg"),
            processing_time: Duration::from_secs(9),
            inference_steps: 2,
            model: "flux-schnell".to_string(),
            image_size: ImageSize {
                width: 64,
                height: 32,
            },
        }
        .encode();
        assert_eq!(
            success,
            r#"{"success":true,"output_path":"/out/a_generated.jpg","processing_time":9,"inference_steps":2,"model":"flux-schnell","image_size":{"width":64,"height":32}}"#
        );
    }

    #[test]
    fn emit_writes_exactly_one_line() {
        let mut out = Vec::new();
        GenerationResult::failure("boom", Some(Duration::from_secs(3)))
            .emit(&mut out)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(parsed["processing_time"], 3);
    }
}
