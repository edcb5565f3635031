use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::llm::media::MediaKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttachmentSlot {
    FrontPhoto,
    SidePhoto,
    BackPhoto,
    FrontVideo,
    BackVideo,
    InspirationPhoto,
}

impl AttachmentSlot {
    pub const REQUIRED: [AttachmentSlot; 5] = [
        AttachmentSlot::FrontPhoto,
        AttachmentSlot::SidePhoto,
        AttachmentSlot::BackPhoto,
        AttachmentSlot::FrontVideo,
        AttachmentSlot::BackVideo,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            AttachmentSlot::FrontPhoto => "frontPhoto",
            AttachmentSlot::SidePhoto => "sidePhoto",
            AttachmentSlot::BackPhoto => "backPhoto",
            AttachmentSlot::FrontVideo => "frontVideo",
            AttachmentSlot::BackVideo => "backVideo",
            AttachmentSlot::InspirationPhoto => "inspirationPhoto",
        }
    }

    pub const fn is_required(self) -> bool {
        !matches!(self, AttachmentSlot::InspirationPhoto)
    }

    pub const fn kind(self) -> MediaKind {
        match self {
            AttachmentSlot::FrontVideo | AttachmentSlot::BackVideo => MediaKind::Video,
            _ => MediaKind::Image,
        }
    }

    pub const fn caption(self) -> &'static str {
        match self {
            AttachmentSlot::FrontPhoto => "Front-facing photo of the subject:",
            AttachmentSlot::SidePhoto => "Side profile photo of the subject:",
            AttachmentSlot::BackPhoto => "Photo of the back of the subject's head:",
            AttachmentSlot::FrontVideo => "Video of the subject facing the camera:",
            AttachmentSlot::BackVideo => "Video showing the back of the subject's hair:",
            AttachmentSlot::InspirationPhoto => "Inspiration photo provided by the subject:",
        }
    }
}

impl fmt::Display for AttachmentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
    Other,
}

impl Gender {
    pub fn label(self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
            Gender::Other => "non-binary / unspecified",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectProfile {
    pub gender: Gender,
    #[serde(default)]
    pub free_text_request: Option<String>,
}

impl SubjectProfile {
    pub fn request_text(&self) -> Option<&str> {
        self.free_text_request
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisRequest {
    pub attachment_refs: BTreeMap<AttachmentSlot, String>,
    pub subject_profile: SubjectProfile,
}

impl DiagnosisRequest {
    pub fn missing_slots(&self) -> Vec<AttachmentSlot> {
        AttachmentSlot::REQUIRED
            .into_iter()
            .filter(|slot| {
                self.attachment_refs
                    .get(slot)
                    .map_or(true, |reference| reference.trim().is_empty())
            })
            .collect()
    }

    pub fn submitted_refs(&self) -> BTreeMap<AttachmentSlot, String> {
        self.attachment_refs
            .iter()
            .filter(|(_, reference)| !reference.trim().is_empty())
            .map(|(slot, reference)| (*slot, reference.trim().to_string()))
            .collect()
    }
}

pub const BRIGHTNESS_LEVELS: [&str; 9] = [
    "Blue-black",
    "Natural black",
    "Dark brown",
    "Medium brown",
    "Light brown",
    "Dark blonde",
    "Medium blonde",
    "Light blonde",
    "Very light blonde",
];

static LEVEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:level\s*)?([1-9])\b").expect("valid level regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BrightnessLevel(u8);

impl BrightnessLevel {
    pub fn new(level: u8) -> Option<Self> {
        (1..=9).contains(&level).then_some(Self(level))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        BRIGHTNESS_LEVELS[usize::from(self.0 - 1)]
    }

    /// Accepts `"Level 6 (Dark blonde)"`, `"level 6"`, `"6"` or a bare label.
    pub fn parse(text: &str) -> Option<Self> {
        if let Some(captures) = LEVEL_RE.captures(text) {
            return captures[1].parse::<u8>().ok().and_then(Self::new);
        }
        let trimmed = text.trim();
        BRIGHTNESS_LEVELS
            .iter()
            .position(|name| name.eq_ignore_ascii_case(trimmed))
            .and_then(|index| Self::new(index as u8 + 1))
    }

    pub fn all() -> impl Iterator<Item = BrightnessLevel> {
        (1..=9).map(Self)
    }

    pub fn canonical_label(text: &str) -> String {
        Self::parse(text)
            .map(|level| level.to_string())
            .unwrap_or_else(|| text.trim().to_string())
    }
}

impl fmt::Display for BrightnessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Level {} ({})", self.0, self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceAnalysis {
    pub shape: String,
    pub features: String,
    pub impression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkeletonAnalysis {
    #[serde(rename = "type")]
    pub skeleton_type: String,
    pub features: String,
    pub body_line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalColorAnalysis {
    pub season: String,
    pub undertone: String,
    pub characteristics: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HairConditionAnalysis {
    pub texture: String,
    pub volume: String,
    pub damage: String,
    pub current_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub face: FaceAnalysis,
    pub skeleton: SkeletonAnalysis,
    pub personal_color: PersonalColorAnalysis,
    pub hair_condition: HairConditionAnalysis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HairstyleOption {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HaircolorOption {
    pub name: String,
    pub description: String,
    pub recommended_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteColor {
    pub name: String,
    pub hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HairstyleOptions {
    pub style1: HairstyleOption,
    pub style2: HairstyleOption,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaircolorOptions {
    pub color1: HaircolorOption,
    pub color2: HaircolorOption,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub color1: PaletteColor,
    pub color2: PaletteColor,
    pub color3: PaletteColor,
    pub color4: PaletteColor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeupSuggestion {
    pub base: String,
    pub eye: String,
    pub lip: String,
    pub cheek: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FashionSuggestion {
    pub recommended_styles: Vec<String>,
    pub recommended_items: Vec<String>,
    pub advice: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub hairstyles: HairstyleOptions,
    pub haircolors: HaircolorOptions,
    pub palette: Palette,
    pub makeup: MakeupSuggestion,
    pub fashion: FashionSuggestion,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub analysis: Analysis,
    pub proposal: Proposal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleKey {
    Style1,
    Style2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorKey {
    Color1,
    Color2,
}

impl StyleKey {
    pub fn parse(key: &str) -> Option<Self> {
        match key.trim() {
            "style1" => Some(StyleKey::Style1),
            "style2" => Some(StyleKey::Style2),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            StyleKey::Style1 => "style1",
            StyleKey::Style2 => "style2",
        }
    }
}

impl ColorKey {
    pub fn parse(key: &str) -> Option<Self> {
        match key.trim() {
            "color1" => Some(ColorKey::Color1),
            "color2" => Some(ColorKey::Color2),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ColorKey::Color1 => "color1",
            ColorKey::Color2 => "color2",
        }
    }

    pub const fn other(self) -> Self {
        match self {
            ColorKey::Color1 => ColorKey::Color2,
            ColorKey::Color2 => ColorKey::Color1,
        }
    }
}

impl Proposal {
    pub fn hairstyle(&self, key: StyleKey) -> &HairstyleOption {
        match key {
            StyleKey::Style1 => &self.hairstyles.style1,
            StyleKey::Style2 => &self.hairstyles.style2,
        }
    }

    pub fn haircolor(&self, key: ColorKey) -> &HaircolorOption {
        match key {
            ColorKey::Color1 => &self.haircolors.color1,
            ColorKey::Color2 => &self.haircolors.color2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_labels_in_several_shapes() {
        assert_eq!(BrightnessLevel::parse("Level 6 (Dark blonde)").map(|l| l.value()), Some(6));
        assert_eq!(BrightnessLevel::parse("level 3").map(|l| l.value()), Some(3));
        assert_eq!(BrightnessLevel::parse(" 9 ").map(|l| l.value()), Some(9));
        assert_eq!(BrightnessLevel::parse("light brown").map(|l| l.value()), Some(5));
        assert_eq!(BrightnessLevel::parse("Level 12"), None);
        assert_eq!(BrightnessLevel::parse("unknown"), None);
    }

    #[test]
    fn canonical_label_normalizes_on_scale_values_only() {
        assert_eq!(BrightnessLevel::canonical_label("level 2"), "Level 2 (Natural black)");
        assert_eq!(BrightnessLevel::canonical_label(" bleached "), "bleached");
        assert_eq!(BrightnessLevel::all().count(), 9);
    }

    #[test]
    fn request_reports_blank_required_slots_in_slot_order() {
        let mut refs = BTreeMap::new();
        refs.insert(AttachmentSlot::FrontPhoto, "https://cdn/front.jpg".to_string());
        refs.insert(AttachmentSlot::BackVideo, "  ".to_string());
        refs.insert(AttachmentSlot::InspirationPhoto, String::new());
        let request = DiagnosisRequest {
            attachment_refs: refs,
            subject_profile: SubjectProfile {
                gender: Gender::Female,
                free_text_request: Some("   ".to_string()),
            },
        };

        assert_eq!(
            request.missing_slots(),
            vec![
                AttachmentSlot::SidePhoto,
                AttachmentSlot::BackPhoto,
                AttachmentSlot::FrontVideo,
                AttachmentSlot::BackVideo,
            ]
        );
        assert_eq!(request.submitted_refs().len(), 1);
        assert_eq!(request.subject_profile.request_text(), None);
    }

    #[test]
    fn request_deserializes_from_camel_case_json() {
        let request: DiagnosisRequest = serde_json::from_value(serde_json::json!({
            "attachmentRefs": {
                "frontPhoto": "a", "sidePhoto": "b", "backPhoto": "c",
                "frontVideo": "d", "backVideo": "e"
            },
            "subjectProfile": { "gender": "male", "freeTextRequest": "short on the sides" }
        }))
        .unwrap();
        assert!(request.missing_slots().is_empty());
        assert_eq!(request.subject_profile.request_text(), Some("short on the sides"));
    }
}
