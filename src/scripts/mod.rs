//! Script specific shaping.
//!
//! A [ComplexShaper] is chosen per shape plan from the buffer's script and the script the
//! font's `GSUB` table was found to support. It adds the script's features to the plan and
//! hooks into the stages of the shaping pipeline.

pub(crate) mod arabic;
mod arabic_fallback;
mod syllable;
mod thai;
mod universal;

use crate::buffer::{Buffer, SegmentProperties};
use crate::face::FontFace;
use crate::feature_map::{FeatureMap, MapBuilder};
use crate::plan::ShapePlan;
use crate::tag;
use crate::unicode::{self, script, Script};

use self::arabic::ArabicPlan;
use self::universal::UniversalPlan;

/// When the advances of marks are zeroed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ZeroWidthMarks {
    None,
    ByGdefEarly,
    ByGdefLate,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NormalizationMode {
    None,
    Decomposed,
    /// Never composes base to base.
    ComposedDiacritics,
    /// Always fully decomposes and then recomposes.
    ComposedDiacriticsNoShortCircuit,
    Auto,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ComplexShaper {
    Default,
    /// No mark zeroing or fallback positioning, used when `morx` does the shaping.
    Dumb,
    /// As `Dumb`, without normalization, for Zawgyi encoded Myanmar.
    Zawgyi,
    Arabic,
    Thai,
    Universal,
}

/// Shaper state computed once per plan.
pub(crate) enum ShaperData {
    None,
    Arabic(ArabicPlan),
    Universal(UniversalPlan),
}

const DFLT: u32 = tag!(b"DFLT");
const LATN: u32 = tag!(b"latn");

const INDIC_SCRIPTS: &[Script] = &[
    script::BENGALI,
    script::DEVANAGARI,
    script::GUJARATI,
    script::GURMUKHI,
    script::KANNADA,
    script::MALAYALAM,
    script::ORIYA,
    script::TAMIL,
    script::TELUGU,
    script::SINHALA,
];

const UNIVERSAL_SCRIPTS: &[Script] = &[
    script::TIBETAN,
    script::MONGOLIAN,
    tag!(b"Buhd"),
    tag!(b"Hano"),
    tag!(b"Tglg"),
    tag!(b"Tagb"),
    tag!(b"Limb"),
    tag!(b"Tale"),
    script::BUGINESE,
    tag!(b"Khar"),
    tag!(b"Sylo"),
    tag!(b"Tfng"),
    script::BALINESE,
    script::NKO,
    script::PHAGS_PA,
    script::CHAM,
    tag!(b"Kali"),
    tag!(b"Lepc"),
    tag!(b"Rjng"),
    tag!(b"Saur"),
    script::SUNDANESE,
    tag!(b"Egyp"),
    script::JAVANESE,
    tag!(b"Kthi"),
    tag!(b"Mtei"),
    script::TAI_THAM,
    tag!(b"Tavt"),
    tag!(b"Batk"),
    tag!(b"Brah"),
    script::MANDAIC,
    tag!(b"Cakm"),
    tag!(b"Plrd"),
    tag!(b"Shrd"),
    tag!(b"Takr"),
    tag!(b"Dupl"),
    tag!(b"Gran"),
    tag!(b"Khoj"),
    tag!(b"Sind"),
    tag!(b"Mahj"),
    script::MANICHAEAN,
    tag!(b"Modi"),
    tag!(b"Hmng"),
    script::PSALTER_PAHLAVI,
    tag!(b"Sidd"),
    tag!(b"Tirh"),
    tag!(b"Ahom"),
    tag!(b"Mult"),
    script::ADLAM,
    tag!(b"Bhks"),
    tag!(b"Marc"),
    tag!(b"Newa"),
    tag!(b"Gonm"),
    tag!(b"Soyo"),
    tag!(b"Zanb"),
    tag!(b"Dogr"),
    tag!(b"Gong"),
    script::HANIFI_ROHINGYA,
    tag!(b"Maka"),
    tag!(b"Medf"),
    tag!(b"Sogo"),
    script::SOGDIAN,
    tag!(b"Elym"),
    tag!(b"Nand"),
    tag!(b"Hmnp"),
    tag!(b"Wcho"),
    script::CHORASMIAN,
    tag!(b"Diak"),
    tag!(b"Kits"),
    tag!(b"Yezi"),
    tag!(b"Cpmn"),
    script::OLD_UYGHUR,
    tag!(b"Tnsa"),
    tag!(b"Toto"),
    tag!(b"Vith"),
];

impl ComplexShaper {
    /// Pick the shaper for `props`, given the script chosen from the font's `GSUB` table.
    pub fn categorize(props: &SegmentProperties, chosen_script: Option<u32>) -> ComplexShaper {
        // Fonts designed for the default script, or where the pick fell back to Latin, are
        // shaped without script specific processing.
        let designed_generic = chosen_script == Some(DFLT) || chosen_script == Some(LATN);
        match props.script {
            // Arabic has fallback shaping so it gets its shaper even when the font lacks
            // the script. Joining only makes sense horizontally.
            script::ARABIC | script::SYRIAC => {
                if (chosen_script != Some(DFLT) || props.script == script::ARABIC)
                    && props.direction.is_horizontal()
                {
                    ComplexShaper::Arabic
                } else {
                    ComplexShaper::Default
                }
            }
            script::THAI | script::LAO => ComplexShaper::Thai,
            script::MYANMAR => match chosen_script {
                // The tag of fonts made before the Myanmar shaping model.
                Some(tag) if tag == tag!(b"mymr") => ComplexShaper::Zawgyi,
                _ if designed_generic => ComplexShaper::Default,
                _ => ComplexShaper::Universal,
            },
            script::KHMER => ComplexShaper::Universal,
            s if INDIC_SCRIPTS.contains(&s) || UNIVERSAL_SCRIPTS.contains(&s) => {
                if designed_generic {
                    ComplexShaper::Default
                } else {
                    ComplexShaper::Universal
                }
            }
            _ => ComplexShaper::Default,
        }
    }

    /// How mark advances are zeroed, and whether marks are positioned by the fallback
    /// positioner when the font can't.
    pub fn marks_behavior(self) -> (ZeroWidthMarks, bool) {
        match self {
            ComplexShaper::Default => (ZeroWidthMarks::ByGdefLate, true),
            ComplexShaper::Dumb | ComplexShaper::Zawgyi => (ZeroWidthMarks::None, false),
            ComplexShaper::Arabic => (ZeroWidthMarks::ByGdefLate, true),
            ComplexShaper::Thai => (ZeroWidthMarks::ByGdefLate, false),
            ComplexShaper::Universal => (ZeroWidthMarks::ByGdefEarly, false),
        }
    }

    pub fn normalization_mode(self) -> NormalizationMode {
        match self {
            ComplexShaper::Zawgyi => NormalizationMode::None,
            ComplexShaper::Universal => NormalizationMode::ComposedDiacriticsNoShortCircuit,
            _ => NormalizationMode::Auto,
        }
    }

    /// The `GPOS` script the shaper needs; with any other, marks are positioned by the
    /// fallback positioner.
    pub fn gpos_tag(self, script: Script) -> Option<u32> {
        match self {
            ComplexShaper::Universal if script == script::MYANMAR => Some(tag!(b"mym2")),
            _ => None,
        }
    }

    pub(crate) fn collect_features(self, builder: &mut MapBuilder<'_>, props: &SegmentProperties) {
        match self {
            ComplexShaper::Arabic => arabic::collect_features(builder, props.script),
            ComplexShaper::Universal => universal::collect_features(builder),
            _ => {}
        }
    }

    /// Adjust features after the common ones have been added.
    pub(crate) fn override_features(self, builder: &mut MapBuilder<'_>, props: &SegmentProperties) {
        if self != ComplexShaper::Universal {
            return;
        }
        if props.script == script::KHMER {
            // Khmer ligatures are required, so they move from liga to clig.
            builder.enable_feature(tag!(b"clig"));
            builder.disable_feature(tag!(b"liga"));
        } else if INDIC_SCRIPTS.contains(&props.script) {
            builder.disable_feature(tag!(b"liga"));
        }
    }

    pub(crate) fn create_data(
        self,
        map: &FeatureMap,
        props: &SegmentProperties,
        face: &dyn FontFace,
    ) -> ShaperData {
        match self {
            ComplexShaper::Arabic => ShaperData::Arabic(ArabicPlan::new(map, props.script, face)),
            ComplexShaper::Universal => {
                ShaperData::Universal(UniversalPlan::new(map, props.script, face))
            }
            _ => ShaperData::None,
        }
    }

    /// Edit the text before normalization.
    pub(crate) fn preprocess_text(self, plan: &ShapePlan, face: &dyn FontFace, buffer: &mut Buffer) {
        match self {
            ComplexShaper::Thai => thai::preprocess_text(plan, face, buffer),
            ComplexShaper::Universal => universal::preprocess_text(buffer),
            _ => {}
        }
    }

    pub(crate) fn decompose(self, ab: u32) -> Option<(u32, Option<u32>)> {
        match self {
            ComplexShaper::Universal => universal::decompose(ab),
            _ => unicode::decompose(ab),
        }
    }

    pub(crate) fn compose(self, a: u32, b: u32) -> Option<u32> {
        match self {
            ComplexShaper::Universal => universal::compose(a, b),
            _ => unicode::compose(a, b),
        }
    }

    /// Set the script's feature masks. Characters are not modified.
    pub(crate) fn setup_masks(self, plan: &ShapePlan, buffer: &mut Buffer) {
        match (self, &plan.data) {
            (ComplexShaper::Arabic, ShaperData::Arabic(arabic)) => {
                arabic.setup_masks(buffer, plan.props.script)
            }
            (ComplexShaper::Universal, _) => universal::setup_masks(plan, buffer),
            _ => {}
        }
    }

    /// Reorder the sorted run of marks in `start..end`.
    pub(crate) fn reorder_marks(self, buffer: &mut Buffer, start: usize, end: usize) {
        if self == ComplexShaper::Arabic {
            arabic::reorder_marks(buffer, start, end);
        }
    }

    /// Edit the glyphs once they have been positioned.
    pub(crate) fn postprocess_glyphs(
        self,
        plan: &ShapePlan,
        face: &dyn FontFace,
        buffer: &mut Buffer,
    ) {
        if self == ComplexShaper::Arabic {
            arabic::postprocess_glyphs(plan, face, buffer);
        }
    }
}

/// Pause that forgets which glyphs have been substituted so far.
pub(crate) fn clear_substitution_flags(_plan: &ShapePlan, _face: &dyn FontFace, buffer: &mut Buffer) {
    for info in &mut buffer.info {
        info.clear_substituted();
    }
}

/// Pause that drops syllable numbers once lookups no longer need them.
pub(crate) fn clear_syllables(_plan: &ShapePlan, _face: &dyn FontFace, buffer: &mut Buffer) {
    for info in &mut buffer.info {
        info.syllable = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Direction;

    fn props(script: Script, direction: Direction) -> SegmentProperties {
        SegmentProperties {
            direction,
            script,
            language: None,
        }
    }

    #[test]
    fn arabic_needs_horizontal_text() {
        let rtl = props(script::ARABIC, Direction::RightToLeft);
        let ttb = props(script::ARABIC, Direction::TopToBottom);
        assert_eq!(ComplexShaper::categorize(&rtl, None), ComplexShaper::Arabic);
        assert_eq!(ComplexShaper::categorize(&rtl, Some(DFLT)), ComplexShaper::Arabic);
        assert_eq!(ComplexShaper::categorize(&ttb, None), ComplexShaper::Default);
    }

    #[test]
    fn syriac_needs_a_syriac_font() {
        let syriac = props(script::SYRIAC, Direction::RightToLeft);
        assert_eq!(
            ComplexShaper::categorize(&syriac, Some(DFLT)),
            ComplexShaper::Default
        );
        assert_eq!(
            ComplexShaper::categorize(&syriac, Some(tag!(b"syrc"))),
            ComplexShaper::Arabic
        );
    }

    #[test]
    fn generic_fonts_skip_universal_shaping() {
        let deva = props(script::DEVANAGARI, Direction::LeftToRight);
        assert_eq!(ComplexShaper::categorize(&deva, Some(LATN)), ComplexShaper::Default);
        assert_eq!(
            ComplexShaper::categorize(&deva, Some(tag!(b"dev2"))),
            ComplexShaper::Universal
        );
        // A font with no layout tables at all still gets syllable handling.
        assert_eq!(ComplexShaper::categorize(&deva, None), ComplexShaper::Universal);
    }

    #[test]
    fn myanmar_tags() {
        let mymr = props(script::MYANMAR, Direction::LeftToRight);
        assert_eq!(
            ComplexShaper::categorize(&mymr, Some(tag!(b"mymr"))),
            ComplexShaper::Zawgyi
        );
        assert_eq!(
            ComplexShaper::categorize(&mymr, Some(tag!(b"mym2"))),
            ComplexShaper::Universal
        );
        assert_eq!(
            ComplexShaper::Universal.gpos_tag(script::MYANMAR),
            Some(tag!(b"mym2"))
        );
        assert_eq!(ComplexShaper::Zawgyi.normalization_mode(), NormalizationMode::None);
    }

    #[test]
    fn thai_and_lao_share_a_shaper() {
        let thai = props(script::THAI, Direction::LeftToRight);
        let lao = props(script::LAO, Direction::LeftToRight);
        assert_eq!(ComplexShaper::categorize(&thai, None), ComplexShaper::Thai);
        assert_eq!(ComplexShaper::categorize(&lao, Some(DFLT)), ComplexShaper::Thai);
        assert_eq!(
            ComplexShaper::Thai.marks_behavior(),
            (ZeroWidthMarks::ByGdefLate, false)
        );
    }

    #[test]
    fn latin_is_default() {
        let latn = props(script::LATIN, Direction::LeftToRight);
        assert_eq!(ComplexShaper::categorize(&latn, Some(LATN)), ComplexShaper::Default);
    }
}
