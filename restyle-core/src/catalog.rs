//! Known design styles and room types.
//!
//! Labels outside the catalog are still accepted; they are passed to the
//! prompt verbatim.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignStyle {
    Modern,
    Minimalist,
    Industrial,
    Scandinavian,
    Bohemian,
    Luxury,
    Traditional,
    Contemporary,
}

serde_plain::derive_display_from_serialize!(DesignStyle);
serde_plain::derive_fromstr_from_deserialize!(DesignStyle);

impl DesignStyle {
    pub const ALL: [DesignStyle; 8] = [
        Self::Modern,
        Self::Minimalist,
        Self::Industrial,
        Self::Scandinavian,
        Self::Bohemian,
        Self::Luxury,
        Self::Traditional,
        Self::Contemporary,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Modern => "Modern",
            Self::Minimalist => "Minimalist",
            Self::Industrial => "Industrial",
            Self::Scandinavian => "Scandinavian",
            Self::Bohemian => "Bohemian",
            Self::Luxury => "Luxury",
            Self::Traditional => "Traditional",
            Self::Contemporary => "Contemporary",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Modern => "Clean lines, minimalist aesthetic",
            Self::Minimalist => "Less is more, simple elegance",
            Self::Industrial => "Raw materials, urban edge",
            Self::Scandinavian => "Bright, cozy, functional",
            Self::Bohemian => "Eclectic, colorful, artistic",
            Self::Luxury => "Opulent, sophisticated, high-end",
            Self::Traditional => "Classic, timeless elegance",
            Self::Contemporary => "Current trends, stylish",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    LivingRoom,
    Bedroom,
    Kitchen,
    Bathroom,
    DiningRoom,
    Office,
    Entryway,
    Outdoor,
}

serde_plain::derive_display_from_serialize!(RoomType);
serde_plain::derive_fromstr_from_deserialize!(RoomType);

impl RoomType {
    pub const ALL: [RoomType; 8] = [
        Self::LivingRoom,
        Self::Bedroom,
        Self::Kitchen,
        Self::Bathroom,
        Self::DiningRoom,
        Self::Office,
        Self::Entryway,
        Self::Outdoor,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::LivingRoom => "Living Room",
            Self::Bedroom => "Bedroom",
            Self::Kitchen => "Kitchen",
            Self::Bathroom => "Bathroom",
            Self::DiningRoom => "Dining Room",
            Self::Office => "Home Office",
            Self::Entryway => "Entryway",
            Self::Outdoor => "Outdoor/Patio",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub value: String,
    pub label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

pub fn style_entries() -> Vec<CatalogEntry> {
    DesignStyle::ALL
        .iter()
        .map(|style| CatalogEntry {
            value: style.to_string(),
            label: style.label(),
            description: Some(style.description()),
        })
        .collect()
}

pub fn room_type_entries() -> Vec<CatalogEntry> {
    RoomType::ALL
        .iter()
        .map(|room| CatalogEntry {
            value: room.to_string(),
            label: room.label(),
            description: None,
        })
        .collect()
}
