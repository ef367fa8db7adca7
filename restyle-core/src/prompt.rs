use tracing::warn;

use crate::catalog::{DesignStyle, RoomType};

pub const DEFAULT_DIRECTION: &str = "Professional interior redesign with elegant furniture and decor";
const QUALITY_MODIFIERS: &str =
    "High quality, photorealistic, well-lit, modern aesthetic, clean composition.";
const PHOTOGRAPHY_MODIFIERS: &str = "Professional interior photography, magazine quality.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSegment {
    pub name: &'static str,
    pub text: String,
}

/// Ordered list of named prompt segments, joined line by line.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    segments: Vec<PromptSegment>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segment(mut self, name: &'static str, text: impl Into<String>) -> Self {
        self.segments.push(PromptSegment {
            name,
            text: text.into(),
        });
        self
    }

    pub fn segments(&self) -> &[PromptSegment] {
        &self.segments
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.segments
            .iter()
            .find(|segment| segment.name == name)
            .map(|segment| segment.text.as_str())
    }

    /// Segments that are empty once trimmed are skipped.
    pub fn build(&self) -> String {
        self.segments
            .iter()
            .map(|segment| segment.text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Interior redesign prompt for a style, a room type and optional user direction.
pub fn builder(style: &str, room_type: &str, user_text: &str) -> PromptBuilder {
    let style = style.trim();
    let room_type = room_type.trim();
    if style.parse::<DesignStyle>().is_err() {
        warn!(style, "style is not in the catalog, using it verbatim");
    }
    if room_type.parse::<RoomType>().is_err() {
        warn!(room_type, "room type is not in the catalog, using it verbatim");
    }

    let direction = match user_text.trim() {
        "" => DEFAULT_DIRECTION,
        text => text,
    };

    PromptBuilder::new()
        .segment("subject", format!("{style} interior design style, {room_type}."))
        .segment("direction", direction)
        .segment("quality", QUALITY_MODIFIERS)
        .segment("photography", PHOTOGRAPHY_MODIFIERS)
}

pub fn compose(style: &str, room_type: &str, user_text: &str) -> String {
    builder(style, room_type, user_text).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_text_follows_the_subject() {
        let prompt = compose("industrial", "living_room", "cozy loft");
        assert_eq!(
            prompt,
            "industrial interior design style, living_room.\n\
             cozy loft\n\
             High quality, photorealistic, well-lit, modern aesthetic, clean composition.\n\
             Professional interior photography, magazine quality."
        );
    }

    #[test]
    fn empty_user_text_uses_default_direction() {
        for text in ["", "   ", "\n\t"] {
            let builder = builder("modern", "bedroom", text);
            assert_eq!(builder.get("direction"), Some(DEFAULT_DIRECTION));
        }
    }

    #[test]
    fn whitespace_is_trimmed_and_output_is_stable() {
        let a = compose("  modern ", " bedroom ", "  warm light  ");
        let b = compose("modern", "bedroom", "warm light");
        assert_eq!(a, b);
        assert!(a.starts_with("modern interior design style, bedroom."));
        assert!(!a.ends_with(char::is_whitespace));
    }

    #[test]
    fn segments_keep_their_order() {
        let names: Vec<_> = builder("luxury", "kitchen", "")
            .segments()
            .iter()
            .map(|segment| segment.name)
            .collect();
        assert_eq!(names, ["subject", "direction", "quality", "photography"]);
    }

    #[test]
    fn long_prompts_are_not_cut() {
        let text = "marble ".repeat(500);
        assert!(compose("modern", "bathroom", &text).contains(text.trim()));
    }
}
