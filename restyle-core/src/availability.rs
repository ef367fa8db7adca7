use std::fs;

use serde::Serialize;

use crate::{
    catalog::{room_type_entries, style_entries, CatalogEntry},
    Settings,
};

/// Whether this host can serve requests with the given settings.
#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub available: bool,
    pub message: String,
    pub styles: Vec<CatalogEntry>,
    pub room_types: Vec<CatalogEntry>,
}

/// The model directory must be reachable; the outputs directory is created
/// when missing.
pub fn check_availability(settings: &Settings) -> Availability {
    let (available, message) = if !settings.models_path.exists() {
        (
            false,
            format!(
                "Model path not accessible: {}. Ensure the model drive is mounted.",
                settings.models_path.display()
            ),
        )
    } else if let Err(e) = fs::create_dir_all(&settings.outputs_path) {
        (
            false,
            format!(
                "Output path not writable: {}: {e}",
                settings.outputs_path.display()
            ),
        )
    } else {
        (
            true,
            "AI model is properly configured and available".to_string(),
        )
    };

    Availability {
        available,
        message,
        styles: style_entries(),
        room_types: room_type_entries(),
    }
}
