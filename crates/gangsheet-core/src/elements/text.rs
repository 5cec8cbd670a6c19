//! Text element.

use super::{ElementBase, ElementTrait, SerializableColor};
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};

/// Horizontal alignment of text inside its box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// A block of text laid out inside a width/height box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    #[serde(flatten)]
    pub base: ElementBase,
    pub content: String,
    /// Font size in pixels.
    pub font_size: f64,
    pub font_family: String,
    #[serde(default)]
    pub align: TextAlign,
    pub width: f64,
    pub height: f64,
    #[serde(default = "SerializableColor::black")]
    pub fill: SerializableColor,
}

impl Text {
    pub const DEFAULT_FONT_SIZE: f64 = 20.0;
    pub const DEFAULT_FONT_FAMILY: &'static str = "Arial";

    /// Create a text element. The box is estimated from the content until a
    /// renderer measures it.
    pub fn new(position: Point, content: impl Into<String>) -> Self {
        let content = content.into();
        let size = Self::estimate_size(&content, Self::DEFAULT_FONT_SIZE);
        Self {
            base: ElementBase::new(position),
            content,
            font_size: Self::DEFAULT_FONT_SIZE,
            font_family: Self::DEFAULT_FONT_FAMILY.to_string(),
            align: TextAlign::default(),
            width: size.width,
            height: size.height,
            fill: SerializableColor::black(),
        }
    }

    pub fn with_font_size(mut self, size: f64) -> Self {
        self.font_size = size;
        let estimated = Self::estimate_size(&self.content, size);
        self.width = estimated.width;
        self.height = estimated.height;
        self
    }

    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = family.into();
        self
    }

    pub fn with_align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    /// Rough box for a string: 0.6em per character on the longest line,
    /// 1.2em per line.
    fn estimate_size(content: &str, font_size: f64) -> Size {
        let longest = content.lines().map(|l| l.chars().count()).max().unwrap_or(0);
        let lines = content.lines().count().max(1);
        Size::new(
            (longest.max(1) as f64) * font_size * 0.6,
            lines as f64 * font_size * 1.2,
        )
    }
}

impl ElementTrait for Text {
    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn intrinsic_size(&self) -> Option<Size> {
        Some(Size::new(self.width, self.height))
    }

    fn set_intrinsic_size(&mut self, size: Size) {
        self.width = size.width;
        self.height = size.height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_box() {
        let text = Text::new(Point::ZERO, "ab\nabcd");
        assert!((text.width - 4.0 * 20.0 * 0.6).abs() < 1e-9);
        assert!((text.height - 2.0 * 20.0 * 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_empty_text_has_a_box() {
        let text = Text::new(Point::ZERO, "");
        assert!(text.width > 0.0);
        assert!(text.height > 0.0);
    }
}
