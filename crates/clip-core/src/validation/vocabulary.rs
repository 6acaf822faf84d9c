//! Accepted values for the enumerated fields of a render request.

use std::fmt;

use serde::{Deserialize, Serialize};

const TRANSITIONS: &[&str] = &[
    "fade",
    "fadeSlow",
    "fadeFast",
    "reveal",
    "revealSlow",
    "revealFast",
    "wipeLeft",
    "wipeRight",
    "wipeLeftFast",
    "wipeRightFast",
    "slideLeft",
    "slideRight",
    "slideUp",
    "slideDown",
    "slideLeftFast",
    "slideRightFast",
    "slideUpFast",
    "slideDownFast",
    "carouselLeft",
    "carouselRight",
    "carouselUpFast",
    "shuffleTopRight",
    "shuffleLeftBottom",
    "zoom",
    "zoomSlow",
    "zoomFast",
];

const EFFECTS: &[&str] = &["zoomIn", "zoomOut", "kenBurns"];

const FILTERS: &[&str] = &[
    "boost",
    "greyscale",
    "contrast",
    "muted",
    "negative",
    "darken",
    "lighten",
];

const ASPECT_RATIOS: &[&str] = &["16:9", "9:16", "1:1", "4:5", "4:3"];

const OUTPUT_FORMATS: &[&str] = &["mp4", "gif", "jpg", "png", "bmp", "mp3"];

const ASSET_TYPES: &[&str] = &["video", "image", "audio", "text", "title", "html"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Transition,
    Effect,
    Filter,
    AspectRatio,
    OutputFormat,
    AssetType,
}

impl FieldKind {
    pub const ALL: [FieldKind; 6] = [
        FieldKind::Transition,
        FieldKind::Effect,
        FieldKind::Filter,
        FieldKind::AspectRatio,
        FieldKind::OutputFormat,
        FieldKind::AssetType,
    ];

    pub fn values(self) -> &'static [&'static str] {
        match self {
            Self::Transition => TRANSITIONS,
            Self::Effect => EFFECTS,
            Self::Filter => FILTERS,
            Self::AspectRatio => ASPECT_RATIOS,
            Self::OutputFormat => OUTPUT_FORMATS,
            Self::AssetType => ASSET_TYPES,
        }
    }

    /// Case-sensitive membership.
    pub fn accepts(self, value: &str) -> bool {
        self.values().contains(&value)
    }

    /// The accepted spelling of `value`, ignoring ASCII case.
    pub fn canonical(self, value: &str) -> Option<&'static str> {
        self.values()
            .iter()
            .copied()
            .find(|v| v.eq_ignore_ascii_case(value))
    }

    pub fn sorted_values(self) -> Vec<&'static str> {
        let mut values = self.values().to_vec();
        values.sort_unstable();
        values
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transition => write!(f, "transition"),
            Self::Effect => write!(f, "effect"),
            Self::Filter => write!(f, "filter"),
            Self::AspectRatio => write!(f, "aspect ratio"),
            Self::OutputFormat => write!(f, "output format"),
            Self::AssetType => write!(f, "asset type"),
        }
    }
}
