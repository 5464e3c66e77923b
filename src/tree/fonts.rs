use std::fmt;
use std::sync::Arc;

use font_kit::family_name::FamilyName;
use font_kit::properties::Properties;
use font_kit::source::SystemSource;
use fontdue::{Font, FontSettings};
use log::{debug, warn};

pub const BASE_FONT_SIZE: f32 = 10.0;
pub const FONT_SIZE_CHANGE_STEP: f32 = 1.0;
pub const MIN_BASE_FONT_SIZE: f32 = 2.0;
const SMALL_FONT_OFFSET: f32 = 2.0;

/// Glyph measurements needed by layout without painting anything.
pub trait GlyphMetrics: Send + Sync {
    fn string_width(&self, text: &str, size: f32) -> f32;
    fn ascent(&self, size: f32) -> f32;
    fn descent(&self, size: f32) -> f32;

    fn height(&self, size: f32) -> f32 {
        self.ascent(size) + self.descent(size)
    }
}

/// Real advances of a rasterisable font.
pub struct FontdueMetrics {
    font: Font,
}

impl FontdueMetrics {
    pub fn new(font: Font) -> Self {
        Self { font }
    }

    pub fn load_system() -> Option<Self> {
        load_system_sans_font().map(Self::new)
    }

    pub fn font(&self) -> &Font {
        &self.font
    }
}

impl fmt::Debug for FontdueMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontdueMetrics").finish_non_exhaustive()
    }
}

impl GlyphMetrics for FontdueMetrics {
    fn string_width(&self, text: &str, size: f32) -> f32 {
        text.chars()
            .map(|ch| self.font.metrics(ch, size).advance_width)
            .sum()
    }

    fn ascent(&self, size: f32) -> f32 {
        self.font
            .horizontal_line_metrics(size)
            .map(|m| m.ascent)
            .unwrap_or(size * 0.8)
    }

    fn descent(&self, size: f32) -> f32 {
        self.font
            .horizontal_line_metrics(size)
            .map(|m| -m.descent)
            .unwrap_or(size * 0.2)
    }
}

/// Deterministic per-character advance model for when no system font is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproximateMetrics;

impl ApproximateMetrics {
    fn advance(ch: char) -> f32 {
        match ch {
            'i' | 'j' | 'l' | 'I' | '.' | ',' | ':' | ';' | '\'' | '!' | '|' => 0.28,
            ' ' | 'f' | 't' | 'r' | '(' | ')' | '[' | ']' => 0.34,
            'm' | 'w' | 'M' | 'W' => 0.86,
            '0'..='9' => 0.56,
            c if c.is_uppercase() => 0.68,
            _ => 0.54,
        }
    }
}

impl GlyphMetrics for ApproximateMetrics {
    fn string_width(&self, text: &str, size: f32) -> f32 {
        text.chars().map(Self::advance).sum::<f32>() * size
    }

    fn ascent(&self, size: f32) -> f32 {
        size * 0.8
    }

    fn descent(&self, size: f32) -> f32 {
        size * 0.2
    }
}

pub fn load_system_sans_font() -> Option<Font> {
    let source = SystemSource::new();
    let handle = source
        .select_best_match(&[FamilyName::SansSerif], &Properties::new())
        .ok()?;
    let font = handle.load().ok()?;
    let font_data = font.copy_font_data()?;
    Font::from_bytes(font_data.as_ref().clone(), FontSettings::default()).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontPreset {
    Large,
    Medium,
    Small,
    Tiny,
    SuperTiny,
}

impl FontPreset {
    pub fn label(&self) -> &'static str {
        match self {
            FontPreset::Large => "Large",
            FontPreset::Medium => "Medium",
            FontPreset::Small => "Small",
            FontPreset::Tiny => "Tiny",
            FontPreset::SuperTiny => "Super tiny",
        }
    }

    /// (large, small) point sizes.
    pub fn sizes(&self) -> (f32, f32) {
        match self {
            FontPreset::Large => (14.0, 12.0),
            FontPreset::Medium => (10.0, 8.0),
            FontPreset::Small => (8.0, 7.0),
            FontPreset::Tiny => (6.0, 5.0),
            FontPreset::SuperTiny => (3.0, 2.0),
        }
    }
}

/// Measurements for one font tier at its current size.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TierMetrics {
    pub size: f32,
    pub ascent: f32,
    pub descent: f32,
    pub height: f32,
}

/// The two label fonts ("large" for names, "small" for annotations).
#[derive(Clone)]
pub struct TreeFontSet {
    provider: Arc<dyn GlyphMetrics>,
    large_size: f32,
    small_size: f32,
    large_memory: f32,
    small_memory: f32,
    decreased_by_system: bool,
    min_size: f32,
    large: TierMetrics,
    small: TierMetrics,
}

impl fmt::Debug for TreeFontSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeFontSet")
            .field("large", &self.large)
            .field("small", &self.small)
            .field("large_memory", &self.large_memory)
            .field("decreased_by_system", &self.decreased_by_system)
            .finish()
    }
}

impl TreeFontSet {
    pub fn new(provider: Arc<dyn GlyphMetrics>) -> Self {
        Self::with_base_size(provider, BASE_FONT_SIZE)
    }

    pub fn with_base_size(provider: Arc<dyn GlyphMetrics>, base: f32) -> Self {
        let large_size = base.max(1.0);
        let small_size = (large_size - SMALL_FONT_OFFSET).max(1.0);
        let mut set = Self {
            provider,
            large_size,
            small_size,
            large_memory: large_size,
            small_memory: small_size,
            decreased_by_system: false,
            min_size: MIN_BASE_FONT_SIZE,
            large: TierMetrics::default(),
            small: TierMetrics::default(),
        };
        set.setup_metrics();
        set
    }

    /// Uses the system sans-serif font, or the approximate model when none is found.
    pub fn system() -> Self {
        match FontdueMetrics::load_system() {
            Some(metrics) => Self::new(Arc::new(metrics)),
            None => {
                warn!("No system sans-serif font found; using approximate glyph metrics");
                Self::approximate()
            }
        }
    }

    pub fn approximate() -> Self {
        Self::new(Arc::new(ApproximateMetrics))
    }

    pub fn large(&self) -> TierMetrics {
        self.large
    }

    pub fn small(&self) -> TierMetrics {
        self.small
    }

    pub fn large_size(&self) -> f32 {
        self.large_size
    }

    pub fn small_size(&self) -> f32 {
        self.small_size
    }

    pub fn large_memory(&self) -> f32 {
        self.large_memory
    }

    pub fn small_memory(&self) -> f32 {
        self.small_memory
    }

    pub fn min_size(&self) -> f32 {
        self.min_size
    }

    pub fn set_min_size(&mut self, min: f32) {
        self.min_size = min.max(1.0);
    }

    pub fn is_decreased_by_system(&self) -> bool {
        self.decreased_by_system
    }

    pub fn large_width(&self, text: &str) -> f32 {
        self.provider.string_width(text, self.large_size)
    }

    pub fn small_width(&self, text: &str) -> f32 {
        self.provider.string_width(text, self.small_size)
    }

    /// Shrinks both tiers by one step if the large tier is at least `min`.
    /// The first shrink requested by the system remembers the sizes it started from.
    pub fn decrease_size(&mut self, min: f32, by_system: bool) {
        if by_system && !self.decreased_by_system {
            self.large_memory = self.large_size;
            self.small_memory = self.small_size;
        }
        self.decreased_by_system = by_system;
        if self.large_size >= min {
            self.large_size = (self.large_size - FONT_SIZE_CHANGE_STEP).max(1.0);
            self.small_size = (self.small_size - FONT_SIZE_CHANGE_STEP).max(1.0);
            self.setup_metrics();
        }
    }

    pub fn increase_size(&mut self) {
        self.large_size += FONT_SIZE_CHANGE_STEP;
        self.small_size += FONT_SIZE_CHANGE_STEP;
        self.setup_metrics();
    }

    pub fn apply_preset(&mut self, preset: FontPreset) {
        let (large, small) = preset.sizes();
        self.decreased_by_system = false;
        self.large_size = large;
        self.small_size = small;
        self.setup_metrics();
    }

    /// Returns to the base size and forgets any system shrink.
    pub fn reset(&mut self) {
        self.large_size = BASE_FONT_SIZE;
        self.small_size = BASE_FONT_SIZE - SMALL_FONT_OFFSET;
        self.large_memory = self.large_size;
        self.small_memory = self.small_size;
        self.decreased_by_system = false;
        self.setup_metrics();
    }

    fn setup_metrics(&mut self) {
        self.large = self.tier(self.large_size);
        self.small = self.tier(self.small_size);
        debug!(
            "Font metrics: large {} pt (height {:.2}), small {} pt",
            self.large_size, self.large.height, self.small_size
        );
    }

    fn tier(&self, size: f32) -> TierMetrics {
        let ascent = self.provider.ascent(size);
        let descent = self.provider.descent(size);
        TierMetrics {
            size,
            ascent,
            descent,
            height: ascent + descent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_tier_is_two_points_below_large() {
        let fonts = TreeFontSet::approximate();
        assert_eq!(fonts.large_size(), 10.0);
        assert_eq!(fonts.small_size(), 8.0);
    }

    #[test]
    fn test_metrics_follow_size_changes() {
        let mut fonts = TreeFontSet::approximate();
        let before = fonts.large_width("Homo sapiens");
        let height_before = fonts.large().height;
        fonts.increase_size();
        assert_eq!(fonts.large_size(), 11.0);
        assert!(
            fonts.large_width("Homo sapiens") > before,
            "Width must be re-derived after a size change"
        );
        assert!(fonts.large().height > height_before);
    }

    #[test]
    fn test_system_shrink_remembers_starting_size() {
        let mut fonts = TreeFontSet::approximate();
        fonts.decrease_size(2.0, true);
        fonts.decrease_size(2.0, true);
        assert_eq!(fonts.large_size(), 8.0);
        assert_eq!(fonts.large_memory(), 10.0, "Memory should keep the pre-shrink size");
        assert!(fonts.is_decreased_by_system());
    }

    #[test]
    fn test_decrease_respects_minimum() {
        let mut fonts = TreeFontSet::approximate();
        fonts.apply_preset(FontPreset::SuperTiny);
        fonts.decrease_size(4.0, false);
        assert_eq!(fonts.large_size(), 3.0, "No shrink below the minimum");
        assert_eq!(fonts.small_size(), 2.0);
    }

    #[test]
    fn test_presets_clear_system_flag() {
        let mut fonts = TreeFontSet::approximate();
        fonts.decrease_size(2.0, true);
        fonts.apply_preset(FontPreset::Large);
        assert!(!fonts.is_decreased_by_system());
        assert_eq!((fonts.large_size(), fonts.small_size()), (14.0, 12.0));
    }

    #[test]
    fn test_small_tier_never_below_one_point() {
        let mut fonts = TreeFontSet::approximate();
        fonts.apply_preset(FontPreset::SuperTiny);
        fonts.decrease_size(1.0, false);
        fonts.decrease_size(1.0, false);
        assert!(fonts.small_size() >= 1.0);
    }
}
