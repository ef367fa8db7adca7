use std::{fmt, path::PathBuf};

use tracing::warn;

use crate::error::{RedesignError, Result};

/// Number of refinement passes, always within the fast variant's [1, 4] window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct InferenceSteps(u8);

impl InferenceSteps {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;

    /// Accepts any requested value; anything outside [1, 4] falls back to 4.
    pub fn coerce(requested: Option<i64>) -> Self {
        match requested {
            None => Self::default(),
            Some(steps) if (Self::MIN as i64..=Self::MAX as i64).contains(&steps) => {
                Self(steps as u8)
            }
            Some(steps) => {
                warn!(
                    requested = steps,
                    "invalid inference_steps, defaulting to {}",
                    Self::MAX
                );
                Self::default()
            }
        }
    }

    /// Parses a command-line step count. Any integer is accepted, including
    /// ones too large for `i64`; only non-integers are rejected.
    pub fn parse_arg(raw: &str) -> std::result::Result<Self, String> {
        let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("{raw:?} is not an integer"));
        }
        match raw.parse::<i64>() {
            Ok(steps) => Ok(Self::coerce(Some(steps))),
            Err(_) => {
                warn!(
                    requested = raw,
                    "invalid inference_steps, defaulting to {}",
                    Self::MAX
                );
                Ok(Self::default())
            }
        }
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl Default for InferenceSteps {
    fn default() -> Self {
        Self(Self::MAX)
    }
}

impl fmt::Display for InferenceSteps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedesignRequest {
    pub input_image_path: PathBuf,
    pub prompt: String,
    pub style: String,
    pub room_type: String,
    pub output_id: String,
    pub inference_steps: InferenceSteps,
}

impl RedesignRequest {
    /// Checks the parts of the request that need no filesystem access.
    pub fn validate(&self) -> Result<()> {
        if self.output_id.trim().is_empty() {
            return Err(RedesignError::Validation(
                "output_id must not be empty".to_string(),
            ));
        }
        if self.output_id.contains(['/', '\\']) || self.output_id == ".." {
            return Err(RedesignError::Validation(format!(
                "output_id must not contain path separators: {}",
                self.output_id
            )));
        }
        Ok(())
    }

    pub fn output_file_name(&self) -> String {
        output_file_name(&self.output_id)
    }
}

pub fn output_file_name(output_id: &str) -> String {
    format!("{output_id}_generated.jpg")
}
