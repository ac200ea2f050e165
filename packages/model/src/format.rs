//! # Formatting Attributes
//!
//! Inline text formats are a bit set so a selection can carry the format that
//! the next inserted character will use. Block-level attributes (alignment,
//! direction) are plain enums.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct TextFormat: u32 {
        const BOLD = 1;
        const ITALIC = 1 << 1;
        const STRIKETHROUGH = 1 << 2;
        const UNDERLINE = 1 << 3;
        const CODE = 1 << 4;
        const SUBSCRIPT = 1 << 5;
        const SUPERSCRIPT = 1 << 6;
        const HIGHLIGHT = 1 << 7;
    }
}

/// A single toggleable text format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextFormatType {
    Bold,
    Italic,
    Strikethrough,
    Underline,
    Code,
    Subscript,
    Superscript,
    Highlight,
}

impl TextFormatType {
    pub const ALL: [TextFormatType; 8] = [
        TextFormatType::Bold,
        TextFormatType::Italic,
        TextFormatType::Strikethrough,
        TextFormatType::Underline,
        TextFormatType::Code,
        TextFormatType::Subscript,
        TextFormatType::Superscript,
        TextFormatType::Highlight,
    ];

    pub fn flag(self) -> TextFormat {
        match self {
            TextFormatType::Bold => TextFormat::BOLD,
            TextFormatType::Italic => TextFormat::ITALIC,
            TextFormatType::Strikethrough => TextFormat::STRIKETHROUGH,
            TextFormatType::Underline => TextFormat::UNDERLINE,
            TextFormatType::Code => TextFormat::CODE,
            TextFormatType::Subscript => TextFormat::SUBSCRIPT,
            TextFormatType::Superscript => TextFormat::SUPERSCRIPT,
            TextFormatType::Highlight => TextFormat::HIGHLIGHT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TextFormatType::Bold => "bold",
            TextFormatType::Italic => "italic",
            TextFormatType::Strikethrough => "strikethrough",
            TextFormatType::Underline => "underline",
            TextFormatType::Code => "code",
            TextFormatType::Subscript => "subscript",
            TextFormatType::Superscript => "superscript",
            TextFormatType::Highlight => "highlight",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.name() == name)
    }
}

impl TextFormat {
    pub fn has(self, ty: TextFormatType) -> bool {
        self.contains(ty.flag())
    }

    /// Toggle one format. Subscript and superscript exclude each other.
    pub fn toggled(self, ty: TextFormatType) -> Self {
        let mut next = self ^ ty.flag();
        if next.contains(ty.flag()) {
            match ty {
                TextFormatType::Subscript => next.remove(TextFormat::SUPERSCRIPT),
                TextFormatType::Superscript => next.remove(TextFormat::SUBSCRIPT),
                _ => {}
            }
        }
        next
    }

    /// Names of the active formats, in declaration order
    pub fn names(self) -> Vec<&'static str> {
        TextFormatType::ALL
            .into_iter()
            .filter(|ty| self.has(*ty))
            .map(TextFormatType::name)
            .collect()
    }
}

/// How a text node behaves under editing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    /// Regular text, merges with compatible neighbours
    #[default]
    Normal,
    /// Edited as a single unit (mentions, hashtags)
    Token,
    /// Deleted segment by segment (space separated)
    Segmented,
}

/// Block alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementFormat {
    #[default]
    #[serde(rename = "")]
    None,
    Left,
    Start,
    Center,
    Right,
    End,
    Justify,
}

impl ElementFormat {
    pub fn css_value(self) -> Option<&'static str> {
        match self {
            ElementFormat::None => None,
            ElementFormat::Left => Some("left"),
            ElementFormat::Start => Some("start"),
            ElementFormat::Center => Some("center"),
            ElementFormat::Right => Some("right"),
            ElementFormat::End => Some("end"),
            ElementFormat::Justify => Some("justify"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_format() {
        let format = TextFormat::empty().toggled(TextFormatType::Bold);
        assert!(format.has(TextFormatType::Bold));

        let format = format.toggled(TextFormatType::Bold);
        assert!(format.is_empty());
    }

    #[test]
    fn test_subscript_excludes_superscript() {
        let format = TextFormat::empty()
            .toggled(TextFormatType::Superscript)
            .toggled(TextFormatType::Subscript);

        assert!(format.has(TextFormatType::Subscript));
        assert!(!format.has(TextFormatType::Superscript));
    }

    #[test]
    fn test_format_names() {
        let format = TextFormat::BOLD | TextFormat::CODE;
        assert_eq!(format.names(), vec!["bold", "code"]);
        assert_eq!(TextFormatType::from_name("italic"), Some(TextFormatType::Italic));
        assert_eq!(TextFormatType::from_name("blink"), None);
    }
}
