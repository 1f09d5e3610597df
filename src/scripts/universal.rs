//! The Universal Shaping Engine, for Brahmi-derived and other syllabic scripts.
//!
//! <https://docs.microsoft.com/en-us/typography/script-development/use>

use log::trace;

use crate::buffer::{Buffer, BufferFlags, GlyphInfo, Mask};
use crate::face::FontFace;
use crate::feature_map::{FeatureFlags, FeatureMap, MapBuilder};
use crate::plan::ShapePlan;
use crate::scripts::arabic::{self, ArabicPlan};
use crate::scripts::syllable::{
    insert_dotted_circles, match_any, match_either, match_nonempty, match_optional,
    match_optional_seq, match_repeat, match_seq, match_star,
};
use crate::scripts::{clear_substitution_flags, clear_syllables, ShaperData};
use crate::tag;
use crate::unicode::{self, mcc, GeneralCategory, Script};

const DOTTED_CIRCLE: u32 = 0x25CC;

/// Universal Shaping Engine character categories.
#[allow(non_upper_case_globals)]
pub(crate) mod category {
    pub const O: u8 = 0;
    pub const B: u8 = 1;
    pub const N: u8 = 4;
    pub const GB: u8 = 5;
    pub const SUB: u8 = 11;
    pub const H: u8 = 12;
    pub const HN: u8 = 13;
    pub const ZWNJ: u8 = 14;
    pub const R: u8 = 18;
    pub const S: u8 = 19;
    pub const VPre: u8 = 22;
    pub const VMPre: u8 = 23;
    pub const FAbv: u8 = 24;
    pub const FBlw: u8 = 25;
    pub const FPst: u8 = 26;
    pub const MAbv: u8 = 27;
    pub const MBlw: u8 = 28;
    pub const MPst: u8 = 29;
    pub const MPre: u8 = 30;
    pub const CMAbv: u8 = 31;
    pub const CMBlw: u8 = 32;
    pub const VAbv: u8 = 33;
    pub const VBlw: u8 = 34;
    pub const VPst: u8 = 35;
    pub const VMAbv: u8 = 37;
    pub const VMBlw: u8 = 38;
    pub const VMPst: u8 = 39;
    pub const SMAbv: u8 = 41;
    pub const SMBlw: u8 = 42;
    pub const CS: u8 = 43;
    pub const HVM: u8 = 44;
    pub const FMAbv: u8 = 45;
    pub const FMBlw: u8 = 46;
    pub const FMPst: u8 = 47;
    pub const Sk: u8 = 48;
    pub const G: u8 = 49;
    pub const J: u8 = 50;
    pub const SB: u8 = 51;
    pub const SE: u8 = 52;
}

/// Syllable types, stored in the low nibble of each glyph's syllable byte.
pub(crate) mod syllable_type {
    pub const INDEPENDENT: u8 = 0;
    pub const VIRAMA_TERMINATED: u8 = 1;
    pub const SAKOT_TERMINATED: u8 = 2;
    pub const STANDARD: u8 = 3;
    pub const NUMBER_JOINER_TERMINATED: u8 = 4;
    pub const NUMERAL: u8 = 5;
    pub const SYMBOL: u8 = 6;
    pub const HIEROGLYPH: u8 = 7;
    pub const BROKEN: u8 = 8;
    pub const NON_CLUSTER: u8 = 9;
}

/// Applied all at once, before reordering.
const BASIC_FEATURES: [u32; 7] = [
    tag!(b"rkrf"),
    tag!(b"abvf"),
    tag!(b"blwf"),
    tag!(b"half"),
    tag!(b"pstf"),
    tag!(b"vatu"),
    tag!(b"cjct"),
];

/// Indexed by `JoiningForm`.
const TOPOGRAPHICAL_FEATURES: [u32; 4] = [
    tag!(b"isol"),
    tag!(b"init"),
    tag!(b"medi"),
    tag!(b"fina"),
];

/// Applied after reordering and clearing syllables.
const OTHER_FEATURES: [u32; 5] = [
    tag!(b"abvs"),
    tag!(b"blws"),
    tag!(b"haln"),
    tag!(b"pres"),
    tag!(b"psts"),
];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum JoiningForm {
    Isol = 0,
    Init = 1,
    Medi = 2,
    Fina = 3,
}

pub(crate) struct UniversalPlan {
    rphf_mask: Mask,
    /// Present for scripts that join like Arabic.
    arabic_plan: Option<ArabicPlan>,
}

impl UniversalPlan {
    pub(crate) fn new(map: &FeatureMap, script: Script, face: &dyn FontFace) -> UniversalPlan {
        let arabic_plan = if arabic::has_arabic_joining(script) {
            Some(ArabicPlan::new(map, script, face))
        } else {
            None
        };
        UniversalPlan {
            rphf_mask: map.one_mask(tag!(b"rphf")),
            arabic_plan,
        }
    }
}

fn universal_plan(plan: &ShapePlan) -> Option<&UniversalPlan> {
    match &plan.data {
        ShaperData::Universal(universal) => Some(universal),
        _ => None,
    }
}

pub(crate) fn collect_features(builder: &mut MapBuilder<'_>) {
    // Before any lookups have been applied.
    builder.add_gsub_pause(Some(setup_syllables));

    // Default glyph pre-processing group
    builder.enable_feature(tag!(b"locl"));
    builder.enable_feature(tag!(b"ccmp"));
    builder.enable_feature(tag!(b"nukt"));
    builder.enable_feature_ext(tag!(b"akhn"), FeatureFlags::MANUAL_ZWJ, 1);

    // Reordering group
    builder.add_gsub_pause(Some(clear_substitution_flags));
    builder.add_feature_ext(tag!(b"rphf"), FeatureFlags::MANUAL_ZWJ, 1);
    builder.add_gsub_pause(Some(record_rphf));
    builder.add_gsub_pause(Some(clear_substitution_flags));
    builder.enable_feature_ext(tag!(b"pref"), FeatureFlags::MANUAL_ZWJ, 1);
    builder.add_gsub_pause(Some(record_pref));

    // Orthographic unit shaping group
    for &feature in BASIC_FEATURES.iter() {
        builder.enable_feature_ext(feature, FeatureFlags::MANUAL_ZWJ, 1);
    }

    builder.add_gsub_pause(Some(reorder));
    builder.add_gsub_pause(Some(clear_syllables));

    // Topographical features
    for &feature in TOPOGRAPHICAL_FEATURES.iter() {
        builder.add_feature(feature);
    }
    builder.add_gsub_pause(None);

    // Standard typographic presentation
    for &feature in OTHER_FEATURES.iter() {
        builder.enable_feature_ext(feature, FeatureFlags::MANUAL_ZWJ, 1);
    }
}

/// Masks can't be set up yet: the categories are recorded here and the masks set in the
/// first pause, once syllables are known.
pub(crate) fn setup_masks(plan: &ShapePlan, buffer: &mut Buffer) {
    if let Some(arabic_plan) = universal_plan(plan).and_then(|u| u.arabic_plan.as_ref()) {
        // Before the category bytes are taken over.
        arabic_plan.setup_masks(buffer, plan.props.script);
    }
    for info in &mut buffer.info {
        info.complex_category = use_category(info.codepoint);
    }
}

fn setup_syllables(plan: &ShapePlan, _face: &dyn FontFace, buffer: &mut Buffer) {
    find_syllables(buffer);
    let mut start = 0;
    while start < buffer.len() {
        let end = buffer.next_syllable(start);
        buffer.unsafe_to_break(start, end);
        start = end;
    }
    if let Some(universal) = universal_plan(plan) {
        setup_rphf_mask(universal, buffer);
        setup_topographical_masks(plan, universal, buffer);
    }
}

fn setup_rphf_mask(universal: &UniversalPlan, buffer: &mut Buffer) {
    let mask = universal.rphf_mask;
    if mask == 0 {
        return;
    }
    let mut start = 0;
    while start < buffer.len() {
        let end = buffer.next_syllable(start);
        let limit = if buffer.info[start].complex_category == category::R {
            1
        } else {
            std::cmp::min(3, end - start)
        };
        for info in &mut buffer.info[start..start + limit] {
            info.mask |= mask;
        }
        start = end;
    }
}

fn setup_topographical_masks(plan: &ShapePlan, universal: &UniversalPlan, buffer: &mut Buffer) {
    if universal.arabic_plan.is_some() {
        return;
    }

    let mut masks = [0; 4];
    let mut all_masks = 0;
    for (mask, &feature) in masks.iter_mut().zip(TOPOGRAPHICAL_FEATURES.iter()) {
        *mask = plan.map.one_mask(feature);
        if *mask == plan.map.global_mask() {
            *mask = 0;
        }
        all_masks |= *mask;
    }
    if all_masks == 0 {
        return;
    }
    let other_masks = !all_masks;

    let mut last_start = 0;
    let mut last_form = None;
    let mut start = 0;
    while start < buffer.len() {
        let end = buffer.next_syllable(start);
        match buffer.info[start].syllable & 0x0F {
            syllable_type::INDEPENDENT
            | syllable_type::SYMBOL
            | syllable_type::HIEROGLYPH
            | syllable_type::NON_CLUSTER => last_form = None,
            _ => {
                let join = matches!(last_form, Some(JoiningForm::Fina | JoiningForm::Isol));
                if join {
                    // Fix up the previous syllable's form.
                    let form = if last_form == Some(JoiningForm::Fina) {
                        JoiningForm::Medi
                    } else {
                        JoiningForm::Init
                    };
                    for info in &mut buffer.info[last_start..start] {
                        info.mask = (info.mask & other_masks) | masks[form as usize];
                    }
                }

                let form = if join {
                    JoiningForm::Fina
                } else {
                    JoiningForm::Isol
                };
                for info in &mut buffer.info[start..end] {
                    info.mask = (info.mask & other_masks) | masks[form as usize];
                }
                last_form = Some(form);
            }
        }
        last_start = start;
        start = end;
    }
}

/// Mark a substituted repha as `R`.
fn record_rphf(plan: &ShapePlan, _face: &dyn FontFace, buffer: &mut Buffer) {
    let mask = match universal_plan(plan) {
        Some(universal) if universal.rphf_mask != 0 => universal.rphf_mask,
        _ => return,
    };
    let mut start = 0;
    while start < buffer.len() {
        let end = buffer.next_syllable(start);
        for info in &mut buffer.info[start..end] {
            if info.mask & mask == 0 {
                break;
            }
            if info.is_substituted() {
                info.complex_category = category::R;
                break;
            }
        }
        start = end;
    }
}

/// Mark a substituted pref as `VPre`, as they behave the same way.
fn record_pref(_plan: &ShapePlan, _face: &dyn FontFace, buffer: &mut Buffer) {
    let mut start = 0;
    while start < buffer.len() {
        let end = buffer.next_syllable(start);
        if let Some(info) = buffer.info[start..end]
            .iter_mut()
            .find(|info| info.is_substituted())
        {
            info.complex_category = category::VPre;
        }
        start = end;
    }
}

fn reorder(_plan: &ShapePlan, face: &dyn FontFace, buffer: &mut Buffer) {
    trace!("reordering {} glyphs", buffer.len());
    insert_dotted_circles(
        face,
        buffer,
        syllable_type::BROKEN,
        category::B,
        Some(category::R),
    );

    let mut start = 0;
    while start < buffer.len() {
        let end = buffer.next_syllable(start);
        reorder_syllable(buffer, start, end);
        start = end;
    }
}

fn is_halant(info: &GlyphInfo) -> bool {
    matches!(info.complex_category, category::H | category::HVM) && !info.is_ligated()
}

const fn flag(category: u8) -> u64 {
    1 << category
}

const POST_BASE_FLAGS: u64 = flag(category::FAbv)
    | flag(category::FBlw)
    | flag(category::FPst)
    | flag(category::MAbv)
    | flag(category::MBlw)
    | flag(category::MPst)
    | flag(category::MPre)
    | flag(category::VAbv)
    | flag(category::VBlw)
    | flag(category::VPst)
    | flag(category::VPre)
    | flag(category::VMAbv)
    | flag(category::VMBlw)
    | flag(category::VMPst)
    | flag(category::VMPre);

fn reorder_syllable(buffer: &mut Buffer, start: usize, end: usize) {
    // Only a few syllable types need reordering.
    if !matches!(
        buffer.info[start].syllable & 0x0F,
        syllable_type::VIRAMA_TERMINATED
            | syllable_type::SAKOT_TERMINATED
            | syllable_type::STANDARD
            | syllable_type::BROKEN
    ) {
        return;
    }

    // Move a repha forward, to just before the first post-base glyph or to the end.
    if buffer.info[start].complex_category == category::R && end - start > 1 {
        for i in start + 1..end {
            let info = &buffer.info[i];
            let is_post_base = flag(info.complex_category) & POST_BASE_FLAGS != 0 || is_halant(info);
            if is_post_base || i == end - 1 {
                let i = if is_post_base { i - 1 } else { i };
                buffer.merge_clusters(start, i + 1);
                buffer.info[start..=i].rotate_left(1);
                break;
            }
        }
    }

    // Move pre-base vowels and vowel modifiers back, to just after the last halant or to
    // the start.
    let mut j = start;
    for i in start..end {
        let info = &buffer.info[i];
        if is_halant(info) {
            j = i + 1;
        } else if matches!(info.complex_category, category::VPre | category::VMPre)
            // Only the first component of a multiple substitution.
            && info.lig_comp() == 0
            && j < i
        {
            buffer.merge_clusters(j, i + 1);
            buffer.info[j..=i].rotate_right(1);
        }
    }
}

/// Insert dotted circles into vowel sequences that would otherwise render like a single
/// independent vowel.
pub(crate) fn preprocess_text(buffer: &mut Buffer) {
    if buffer.flags.contains(BufferFlags::DO_NOT_INSERT_DOTTED_CIRCLE) {
        return;
    }

    buffer.clear_output();
    let count = buffer.len();
    while buffer.idx + 1 < count && buffer.successful {
        let matched = match vowel_constraint(buffer.cur(0).codepoint, buffer.cur(1).codepoint) {
            InsertConstraint::Between => true,
            InsertConstraint::MaybeAfter(third) => {
                if buffer.idx + 2 < count && buffer.cur(2).codepoint == third {
                    buffer.next_glyph();
                    true
                } else {
                    false
                }
            }
            InsertConstraint::None => false,
        };
        buffer.next_glyph();
        if matched {
            buffer.output_char(DOTTED_CIRCLE, 0);
            if let Some(dotted_circle) = buffer.out_info.last_mut() {
                dotted_circle.reset_continuation();
            }
        }
    }
    buffer.swap_buffers();
}

/// Denotes if/where a dotted circle should be inserted.
enum InsertConstraint {
    /// Between a pair of characters.
    Between,
    /// After a pair of characters, when the character after the pair is the one given.
    MaybeAfter(u32),
    None,
}

/// See the following link for the full list of prohibited vowel combinations:
///
/// <https://docs.microsoft.com/en-us/typography/script-development/use#independent-vowel-iv-plus-dependent-vowel-constraints-dv>
fn vowel_constraint(c1: u32, c2: u32) -> InsertConstraint {
    match (c1, c2) {
        // Devanagari
        (0x0905, 0x0946) | (0x0905, 0x093E) | (0x0909, 0x0941) | (0x090F, 0x0945) => {
            InsertConstraint::Between
        }
        (0x090F, 0x0946) | (0x090F, 0x0947) | (0x0905, 0x0949) | (0x0906, 0x0945) => {
            InsertConstraint::Between
        }
        (0x0905, 0x094A) | (0x0906, 0x0946) | (0x0905, 0x094B) | (0x0906, 0x0947) => {
            InsertConstraint::Between
        }
        (0x0905, 0x094C) | (0x0906, 0x0948) | (0x0905, 0x0945) | (0x0905, 0x093A) => {
            InsertConstraint::Between
        }
        (0x0905, 0x093B) | (0x0906, 0x093A) | (0x0905, 0x094F) | (0x0905, 0x0956) => {
            InsertConstraint::Between
        }
        (0x0905, 0x0957) => InsertConstraint::Between,
        // Devanagari "Reph, Letter I"
        (0x0930, 0x094D) => InsertConstraint::MaybeAfter(0x0907),
        // Bengali
        (0x0985, 0x09BE) | (0x098B, 0x09C3) | (0x098C, 0x09E2) => InsertConstraint::Between,
        // Gurmukhi
        (0x0A05, 0x0A3E) | (0x0A72, 0x0A3F) | (0x0A72, 0x0A40) | (0x0A73, 0x0A41) => {
            InsertConstraint::Between
        }
        (0x0A73, 0x0A42) | (0x0A72, 0x0A47) | (0x0A05, 0x0A48) | (0x0A73, 0x0A4B) => {
            InsertConstraint::Between
        }
        (0x0A05, 0x0A4C) => InsertConstraint::Between,
        // Gujarati. The triplets starting 0A85 0ABE are covered by the pair.
        (0x0A85, 0x0ABE) | (0x0A85, 0x0AC5) | (0x0A85, 0x0AC7) | (0x0A85, 0x0AC8) => {
            InsertConstraint::Between
        }
        (0x0A85, 0x0AC9) | (0x0A85, 0x0ACB) | (0x0A85, 0x0ACC) | (0x0AC5, 0x0ABE) => {
            InsertConstraint::Between
        }
        // Oriya
        (0x0B05, 0x0B3E) | (0x0B0F, 0x0B57) | (0x0B13, 0x0B57) => InsertConstraint::Between,
        // Telugu
        (0x0C12, 0x0C55) | (0x0C12, 0x0C4C) | (0x0C3F, 0x0C55) | (0x0C46, 0x0C55) => {
            InsertConstraint::Between
        }
        (0x0C4A, 0x0C55) => InsertConstraint::Between,
        // Kannada
        (0x0C89, 0x0CBE) | (0x0C92, 0x0CCC) | (0x0C8B, 0x0CBE) => InsertConstraint::Between,
        // Malayalam
        (0x0D07, 0x0D57) | (0x0D09, 0x0D57) | (0x0D0E, 0x0D46) | (0x0D12, 0x0D3E) => {
            InsertConstraint::Between
        }
        (0x0D12, 0x0D57) => InsertConstraint::Between,
        // Sinhala
        (0x0D85, 0x0DCF) | (0x0D85, 0x0DD0) | (0x0D85, 0x0DD1) | (0x0D8B, 0x0DDF) => {
            InsertConstraint::Between
        }
        (0x0D8D, 0x0DD8) | (0x0D8F, 0x0DDF) | (0x0D91, 0x0DCA) | (0x0D91, 0x0DD9) => {
            InsertConstraint::Between
        }
        (0x0D91, 0x0DDA) | (0x0D91, 0x0DDC) | (0x0D91, 0x0DDD) | (0x0D94, 0x0DDF) => {
            InsertConstraint::Between
        }
        _ => InsertConstraint::None,
    }
}

/// Khmer split vowels have no canonical decomposition; their pre-base part is split off
/// so it can be reordered.
pub(crate) fn decompose(ab: u32) -> Option<(u32, Option<u32>)> {
    match ab {
        0x17BE | 0x17BF | 0x17C0 | 0x17C4 | 0x17C5 => Some((0x17C1, Some(ab))),
        _ => unicode::decompose(ab),
    }
}

/// Split matras are not recomposed.
pub(crate) fn compose(a: u32, b: u32) -> Option<u32> {
    if unicode::general_category(a).is_mark() {
        return None;
    }
    unicode::compose(a, b)
}

/////////////////////////////////////////////////////////////////////////////
// Syllable machine
/////////////////////////////////////////////////////////////////////////////

macro_rules! seq {
    ($f:expr) => { $f };
    ($f:expr, $($rest:expr),+) => { match_seq($f, seq!($($rest),+)) };
}

fn halant_or_sakot(cs: &[u8]) -> Option<usize> {
    use self::category::*;
    match_any(&[H, HVM, Sk])(cs)
}

fn consonant_modifiers(cs: &[u8]) -> Option<usize> {
    use self::category::*;
    let subjoined = match_either(match_seq(halant_or_sakot, match_any(&[B])), match_any(&[SUB]));
    seq!(
        match_star(&[CMAbv]),
        match_star(&[CMBlw]),
        match_repeat(
            0,
            seq!(
                subjoined,
                match_optional(match_any(&[CMAbv])),
                match_star(&[CMBlw])
            )
        )
    )(cs)
}

fn medial_consonants(cs: &[u8]) -> Option<usize> {
    use self::category::*;
    seq!(
        match_optional(match_any(&[MPre])),
        match_optional(match_any(&[MAbv])),
        match_optional(match_any(&[MBlw])),
        match_optional(match_any(&[MPst]))
    )(cs)
}

fn dependent_vowels(cs: &[u8]) -> Option<usize> {
    use self::category::*;
    seq!(
        match_star(&[VPre]),
        match_star(&[VAbv]),
        match_star(&[VBlw]),
        match_star(&[VPst])
    )(cs)
}

fn vowel_modifiers(cs: &[u8]) -> Option<usize> {
    use self::category::*;
    seq!(
        match_optional(match_any(&[HVM])),
        match_star(&[VMPre]),
        match_star(&[VMAbv]),
        match_star(&[VMBlw]),
        match_star(&[VMPst])
    )(cs)
}

fn final_consonants(cs: &[u8]) -> Option<usize> {
    use self::category::*;
    seq!(match_star(&[FAbv]), match_star(&[FBlw]), match_star(&[FPst]))(cs)
}

fn final_modifiers(cs: &[u8]) -> Option<usize> {
    use self::category::*;
    match_either(
        match_seq(match_star(&[FMAbv]), match_star(&[FMBlw])),
        match_optional(match_any(&[FMPst])),
    )(cs)
}

fn syllable_start(cs: &[u8]) -> Option<usize> {
    use self::category::*;
    match_optional_seq(match_any(&[R, CS]), match_any(&[B, GB]))(cs)
}

fn syllable_middle(cs: &[u8]) -> Option<usize> {
    use self::category::*;
    seq!(
        consonant_modifiers,
        medial_consonants,
        dependent_vowels,
        vowel_modifiers,
        match_repeat(0, match_seq(match_any(&[Sk]), match_any(&[B])))
    )(cs)
}

fn syllable_tail(cs: &[u8]) -> Option<usize> {
    seq!(syllable_middle, final_consonants, final_modifiers)(cs)
}

fn number_joiner_tail(cs: &[u8]) -> Option<usize> {
    use self::category::*;
    match_seq(
        match_repeat(0, match_seq(match_any(&[HN]), match_any(&[N]))),
        match_any(&[HN]),
    )(cs)
}

fn numeral_tail(cs: &[u8]) -> Option<usize> {
    use self::category::*;
    match_repeat(1, match_seq(match_any(&[HN]), match_any(&[N])))(cs)
}

fn symbol_tail(cs: &[u8]) -> Option<usize> {
    use self::category::*;
    match_either(
        match_seq(match_repeat(1, match_any(&[SMAbv])), match_star(&[SMBlw])),
        match_repeat(1, match_any(&[SMBlw])),
    )(cs)
}

fn independent_cluster(cs: &[u8]) -> Option<usize> {
    match_any(&[category::O])(cs)
}

fn virama_terminated_cluster(cs: &[u8]) -> Option<usize> {
    seq!(syllable_start, consonant_modifiers, halant_or_sakot)(cs)
}

fn sakot_terminated_cluster(cs: &[u8]) -> Option<usize> {
    seq!(syllable_start, syllable_middle, match_any(&[category::Sk]))(cs)
}

fn standard_cluster(cs: &[u8]) -> Option<usize> {
    match_seq(syllable_start, syllable_tail)(cs)
}

fn number_joiner_terminated_cluster(cs: &[u8]) -> Option<usize> {
    match_seq(match_any(&[category::N]), number_joiner_tail)(cs)
}

fn numeral_cluster(cs: &[u8]) -> Option<usize> {
    match_seq(match_any(&[category::N]), match_optional(numeral_tail))(cs)
}

fn symbol_cluster(cs: &[u8]) -> Option<usize> {
    use self::category::*;
    match_seq(match_any(&[S, GB]), match_optional(symbol_tail))(cs)
}

fn hieroglyph_cluster(cs: &[u8]) -> Option<usize> {
    use self::category::*;
    match_either(
        match_repeat(1, match_any(&[SB])),
        seq!(
            match_star(&[SB]),
            match_any(&[G]),
            match_star(&[SE]),
            match_repeat(
                0,
                seq!(
                    match_any(&[J]),
                    match_star(&[SE]),
                    match_optional(match_seq(match_any(&[G]), match_star(&[SE])))
                )
            )
        ),
    )(cs)
}

fn broken_cluster(cs: &[u8]) -> Option<usize> {
    match_optional_seq(
        match_any(&[category::R]),
        match_either(
            match_either(syllable_tail, number_joiner_tail),
            match_either(numeral_tail, symbol_tail),
        ),
    )(cs)
}

type ClusterMatcher = fn(&[u8]) -> Option<usize>;

/// In priority order: on equal lengths the earlier rule wins.
const CLUSTER_RULES: [(ClusterMatcher, u8); 9] = [
    (independent_cluster, syllable_type::INDEPENDENT),
    (virama_terminated_cluster, syllable_type::VIRAMA_TERMINATED),
    (sakot_terminated_cluster, syllable_type::SAKOT_TERMINATED),
    (standard_cluster, syllable_type::STANDARD),
    (number_joiner_terminated_cluster, syllable_type::NUMBER_JOINER_TERMINATED),
    (numeral_cluster, syllable_type::NUMERAL),
    (symbol_cluster, syllable_type::SYMBOL),
    (hieroglyph_cluster, syllable_type::HIEROGLYPH),
    (broken_cluster, syllable_type::BROKEN),
];

/// The length and type of the syllable at the start of `cs`, which must not be empty.
fn match_syllable(cs: &[u8]) -> (usize, u8) {
    let mut best = (1, syllable_type::NON_CLUSTER);
    let mut best_len = 0;
    for &(rule, syllable_type) in CLUSTER_RULES.iter() {
        if let Some(len) = match_nonempty(rule)(cs) {
            if len > best_len {
                best_len = len;
                best = (len, syllable_type);
            }
        }
    }
    best
}

/// Default ignorables of category `O` are invisible to the machine, as is a ZWNJ
/// followed by a mark.
fn is_visible(info: &[GlyphInfo], i: usize) -> bool {
    let is_standard_ignorable =
        |info: &GlyphInfo| info.complex_category == category::O && info.is_default_ignorable();
    if is_standard_ignorable(&info[i]) {
        return false;
    }
    if info[i].complex_category == category::ZWNJ {
        if let Some(next) = info[i + 1..].iter().find(|info| !is_standard_ignorable(info)) {
            return !next.is_unicode_mark();
        }
    }
    true
}

/// Number each syllable and record its type.
fn find_syllables(buffer: &mut Buffer) {
    let visible = (0..buffer.len())
        .filter(|&i| is_visible(&buffer.info, i))
        .collect::<Vec<_>>();
    let categories = visible
        .iter()
        .map(|&i| buffer.info[i].complex_category)
        .collect::<Vec<_>>();

    let mut serial = 1;
    let mut ts = 0;
    while ts < categories.len() {
        let (len, syllable_type) = match_syllable(&categories[ts..]);
        let te = ts + len;
        let start = visible[ts];
        let end = visible.get(te).copied().unwrap_or(buffer.len());
        for info in &mut buffer.info[start..end] {
            info.syllable = (serial << 4) | syllable_type;
        }
        serial += 1;
        if serial == 16 {
            serial = 1;
        }
        ts = te;
    }
}

/////////////////////////////////////////////////////////////////////////////
// Categories
/////////////////////////////////////////////////////////////////////////////

/// The Universal Shaping Engine category of `ch`.
pub(crate) fn use_category(ch: u32) -> u8 {
    use self::category::*;

    match ch {
        // Brahmi and Grantha visible viramas
        0x11046 | 0x1134D => HVM,
        // Tai Tham SAKOT
        0x1A60 => Sk,
        // Brahmi number joiner and numbers
        0x1107F => HN,
        0x11052..=0x11065 => N,
        // Egyptian hieroglyphs and their format controls
        0x13000..=0x1342F => G,
        0x13430..=0x13436 => J,
        0x13437 => SB,
        0x13438 => SE,
        // Devanagari
        0x0900..=0x0902 => VMAbv,
        0x0903 => VMPst,
        0x0904..=0x0939 => B,
        0x093A => VAbv,
        0x093B => VPst,
        0x093C => CMBlw,
        0x093D => B,
        0x093E => VPst,
        0x093F => VPre,
        0x0940 => VPst,
        0x0941..=0x0944 => VBlw,
        0x0945..=0x0948 => VAbv,
        0x0949..=0x094C => VPst,
        0x094D => H,
        0x094E => VPre,
        0x094F => VPst,
        0x0951 => VMAbv,
        0x0952 => VMBlw,
        0x0955 => VAbv,
        0x0956..=0x0957 => VBlw,
        0x0958..=0x0961 => B,
        0x0962..=0x0963 => VBlw,
        0x0966..=0x096F => B,
        0x0972..=0x097F => B,
        // Bengali
        0x0980 => GB,
        0x0981 => VMAbv,
        0x0982..=0x0983 => VMPst,
        0x0985..=0x098C => B,
        0x098F..=0x0990 => B,
        0x0993..=0x09A8 => B,
        0x09AA..=0x09B0 => B,
        0x09B2 => B,
        0x09B6..=0x09B9 => B,
        0x09BC => CMBlw,
        0x09BD => B,
        0x09BE => VPst,
        0x09BF => VPre,
        0x09C0 => VPst,
        0x09C1..=0x09C4 => VBlw,
        0x09C7..=0x09C8 => VPre,
        0x09CB..=0x09CC => VPre,
        0x09CD => H,
        0x09D7 => VPst,
        0x09DC..=0x09DD => B,
        0x09DF..=0x09E1 => B,
        0x09E2..=0x09E3 => VBlw,
        0x09E6..=0x09F1 => B,
        0x09F2..=0x09F3 => S,
        0x09F4..=0x09F9 => B,
        0x09FA..=0x09FB => S,
        0x09FE => FMAbv,
        // Gurmukhi
        0x0A01..=0x0A02 => VMAbv,
        0x0A03 => VMPst,
        0x0A05..=0x0A0A => B,
        0x0A0F..=0x0A10 => B,
        0x0A13..=0x0A28 => B,
        0x0A2A..=0x0A30 => B,
        0x0A32..=0x0A33 => B,
        0x0A35..=0x0A36 => B,
        0x0A38..=0x0A39 => B,
        0x0A3C => CMBlw,
        0x0A3E => VPst,
        0x0A3F => VPre,
        0x0A40 => VPst,
        0x0A41..=0x0A42 => VBlw,
        0x0A47..=0x0A48 => VAbv,
        0x0A4B..=0x0A4C => VAbv,
        0x0A4D => H,
        0x0A51 => VMPst,
        0x0A59..=0x0A5C => B,
        0x0A5E => B,
        0x0A66..=0x0A6F => B,
        0x0A70 => VMAbv,
        0x0A71 => CMAbv,
        0x0A72..=0x0A73 => GB,
        0x0A75 => MBlw,
        // Gujarati
        0x0A81..=0x0A82 => VMAbv,
        0x0A83 => VMPst,
        0x0A85..=0x0A8D => B,
        0x0A8F..=0x0A91 => B,
        0x0A93..=0x0AA8 => B,
        0x0AAA..=0x0AB0 => B,
        0x0AB2..=0x0AB3 => B,
        0x0AB5..=0x0AB9 => B,
        0x0ABC => CMBlw,
        0x0ABD => B,
        0x0ABE => VPst,
        0x0ABF => VPre,
        0x0AC0 => VPst,
        0x0AC1..=0x0AC4 => VBlw,
        0x0AC5 => VAbv,
        0x0AC7..=0x0AC9 => VAbv,
        0x0ACB..=0x0ACC => VPst,
        0x0ACD => H,
        0x0AE0..=0x0AE1 => B,
        0x0AE2..=0x0AE3 => VBlw,
        0x0AE6..=0x0AEF => B,
        0x0AF1 => S,
        0x0AF9 => B,
        0x0AFA..=0x0AFC => VMAbv,
        0x0AFD..=0x0AFF => CMAbv,
        // Oriya
        0x0B01 => VMAbv,
        0x0B02..=0x0B03 => VMPst,
        0x0B05..=0x0B0C => B,
        0x0B0F..=0x0B10 => B,
        0x0B13..=0x0B28 => B,
        0x0B2A..=0x0B30 => B,
        0x0B32..=0x0B33 => B,
        0x0B35..=0x0B39 => B,
        0x0B3C => CMBlw,
        0x0B3D => B,
        0x0B3E => VPst,
        0x0B3F => VAbv,
        0x0B40 => VPst,
        0x0B41..=0x0B44 => VBlw,
        0x0B47..=0x0B48 => VPre,
        0x0B4B..=0x0B4C => VPre,
        0x0B4D => H,
        0x0B56..=0x0B57 => VAbv,
        0x0B5C..=0x0B5D => B,
        0x0B5F..=0x0B61 => B,
        0x0B62..=0x0B63 => VBlw,
        0x0B66..=0x0B6F => B,
        0x0B70 => S,
        0x0B71..=0x0B77 => B,
        // Tamil
        0x0B82 => VMAbv,
        0x0B85..=0x0B8A => B,
        0x0B8E..=0x0B90 => B,
        0x0B92..=0x0B95 => B,
        0x0B99..=0x0B9A => B,
        0x0B9C => B,
        0x0B9E..=0x0B9F => B,
        0x0BA3..=0x0BA4 => B,
        0x0BA8..=0x0BAA => B,
        0x0BAE..=0x0BB9 => B,
        0x0BBE..=0x0BBF => VPst,
        0x0BC0 => VAbv,
        0x0BC1..=0x0BC2 => VPst,
        0x0BC6..=0x0BC8 => VPre,
        0x0BCA..=0x0BCC => VPre,
        0x0BCD => H,
        0x0BD7 => VPst,
        0x0BE6..=0x0BF2 => B,
        0x0BF3..=0x0BFA => S,
        // Telugu
        0x0C00 => VMAbv,
        0x0C01..=0x0C03 => VMPst,
        0x0C04 => VMAbv,
        0x0C05..=0x0C0C => B,
        0x0C0E..=0x0C10 => B,
        0x0C12..=0x0C28 => B,
        0x0C2A..=0x0C39 => B,
        0x0C3D => B,
        0x0C3E..=0x0C40 => VAbv,
        0x0C41..=0x0C44 => VPst,
        0x0C46..=0x0C48 => VAbv,
        0x0C4A..=0x0C4C => VAbv,
        0x0C4D => H,
        0x0C55 => VAbv,
        0x0C56 => VBlw,
        0x0C58..=0x0C5A => B,
        0x0C60..=0x0C61 => B,
        0x0C62..=0x0C63 => VBlw,
        0x0C66..=0x0C6F => B,
        0x0C78..=0x0C7E => B,
        0x0C7F => S,
        // Kannada
        0x0C81 => VMAbv,
        0x0C82..=0x0C83 => VMPst,
        0x0C85..=0x0C8C => B,
        0x0C8E..=0x0C90 => B,
        0x0C92..=0x0CA8 => B,
        0x0CAA..=0x0CB3 => B,
        0x0CB5..=0x0CB9 => B,
        0x0CBC => CMBlw,
        0x0CBD => B,
        0x0CBE => VPst,
        0x0CBF..=0x0CC0 => VAbv,
        0x0CC1..=0x0CC4 => VPst,
        0x0CC6..=0x0CC8 => VAbv,
        0x0CCA..=0x0CCC => VAbv,
        0x0CCD => H,
        0x0CD5..=0x0CD6 => VPst,
        0x0CDE => B,
        0x0CE0..=0x0CE1 => B,
        0x0CE2..=0x0CE3 => VBlw,
        0x0CE6..=0x0CEF => B,
        0x0CF1..=0x0CF2 => CS,
        // Malayalam
        0x0D00..=0x0D01 => VMAbv,
        0x0D02..=0x0D03 => VMPst,
        0x0D05..=0x0D0C => B,
        0x0D0E..=0x0D10 => B,
        0x0D12..=0x0D3A => B,
        0x0D3B..=0x0D3C => VAbv,
        0x0D3D => B,
        0x0D3E..=0x0D42 => VPst,
        0x0D43..=0x0D44 => VBlw,
        0x0D46..=0x0D48 => VPre,
        0x0D4A..=0x0D4C => VPre,
        0x0D4D => H,
        0x0D4E => R,
        0x0D4F => S,
        0x0D57 => VPst,
        0x0D58..=0x0D61 => B,
        0x0D62..=0x0D63 => VBlw,
        0x0D66..=0x0D78 => B,
        0x0D79 => S,
        // Sinhala
        0x0D82..=0x0D83 => VMPst,
        0x0D85..=0x0D96 => B,
        0x0D9A..=0x0DB1 => B,
        0x0DB3..=0x0DBB => B,
        0x0DBD => B,
        0x0DC0..=0x0DC6 => B,
        0x0DCA => H,
        0x0DCF..=0x0DD1 => VPst,
        0x0DD2..=0x0DD3 => VAbv,
        0x0DD4 => VBlw,
        0x0DD6 => VBlw,
        0x0DD8 => VPst,
        0x0DD9..=0x0DDE => VPre,
        0x0DDF => VPst,
        0x0DE6..=0x0DEF => B,
        0x0DF2..=0x0DF3 => VPst,
        // Myanmar
        0x1000..=0x102A => B,
        0x102B..=0x102C => VPst,
        0x102D..=0x102E => VAbv,
        0x102F..=0x1030 => VBlw,
        0x1031 => VPre,
        0x1032..=0x1035 => VAbv,
        0x1036 => VMAbv,
        0x1037 => VMBlw,
        0x1038 => VMPst,
        0x1039 => H,
        0x103A => VAbv,
        0x103B => MPst,
        0x103C => MPre,
        0x103D..=0x103E => MBlw,
        0x103F..=0x1049 => B,
        0x104E => GB,
        0x1050..=0x1055 => B,
        0x1056..=0x1057 => VPst,
        0x1058..=0x1059 => VBlw,
        0x105A..=0x105D => B,
        0x105E..=0x1060 => MBlw,
        0x1061 => B,
        0x1062 => VPst,
        0x1063..=0x1064 => VMPst,
        0x1065..=0x1066 => B,
        0x1067..=0x1068 => VPst,
        0x1069..=0x106D => VMPst,
        0x106E..=0x1070 => B,
        0x1071..=0x1074 => VAbv,
        0x1075..=0x1081 => B,
        0x1082 => MBlw,
        0x1083 => VPst,
        0x1084 => VPre,
        0x1085..=0x1086 => VAbv,
        0x1087..=0x108C => VMPst,
        0x108D => VMBlw,
        0x108E => B,
        0x108F => VMPst,
        0x1090..=0x1099 => B,
        0x109A..=0x109B => VMPst,
        0x109C => VPst,
        0x109D => VAbv,
        0x109E..=0x109F => S,
        // Khmer
        0x1780..=0x17B3 => B,
        0x17B6 => VPst,
        0x17B7..=0x17BA => VAbv,
        0x17BB..=0x17BD => VBlw,
        0x17BE..=0x17C5 => VPre,
        0x17C6 => CMAbv,
        0x17C7 => VMPst,
        0x17C8 => VPst,
        0x17C9..=0x17CA => VMAbv,
        0x17CB => FMAbv,
        0x17CC => FAbv,
        0x17CD => CMAbv,
        0x17CE..=0x17D0 => FMAbv,
        0x17D1 => VAbv,
        0x17D2 => H,
        0x17D3 => FMAbv,
        0x17DB => S,
        0x17DC => B,
        0x17DD => FMAbv,
        0x17E0..=0x17E9 => B,
        // Khmer Symbols
        0x19E0..=0x19FF => S,
        // Vedic Extensions
        0x1CD0..=0x1CD2 => VMAbv,
        0x1CD4..=0x1CD9 => VMBlw,
        0x1CDA..=0x1CDB => VMAbv,
        0x1CDC..=0x1CDF => VMBlw,
        0x1CE0 => VMAbv,
        0x1CE1 => VMPst,
        0x1CF2..=0x1CF3 => VMPst,
        0x1CF4 => VMAbv,
        0x1CF5..=0x1CF6 => CS,
        0x1CF8..=0x1CF9 => VMPst,
        // Devanagari Extended
        0xA8E0..=0xA8F1 => VMAbv,
        0xA8F2..=0xA8F3 => B,
        0xA8FE => B,
        0xA8FF => VAbv,
        // Myanmar Extended-B
        0xA9E0..=0xA9E4 => B,
        0xA9E5 => VAbv,
        0xA9E7..=0xA9FE => B,
        // Myanmar Extended-A
        0xAA60..=0xAA6F => B,
        0xAA71..=0xAA73 => B,
        0xAA74..=0xAA76 => GB,
        0xAA77..=0xAA79 => S,
        0xAA7A => B,
        0xAA7B => VMPst,
        0xAA7C => VMAbv,
        0xAA7D => VMPst,
        0xAA7E..=0xAA7F => B,
        // Sinhala Archaic Numbers
        0x111E1..=0x111F4 => B,
        // Grantha
        0x11301 => VMAbv,
        0x11303 => VMPst,
        0x1133B..=0x1133C => CMBlw,
        // Other
        0x00A0 => GB,
        0x00B2..=0x00B3 => FMPst,
        0x200C => ZWNJ,
        0x2010..=0x2014 => GB,
        0x2074 => FMPst,
        0x2082..=0x2084 => FMPst,
        0x25CC => GB,
        // Anything else in the blocks above is outside syllables.
        0x0900..=0x0DFF | 0x1000..=0x109F | 0x1780..=0x17FF | 0x19E0..=0x19FF => O,
        0x1CD0..=0x1CFF | 0xA8E0..=0xA8FF | 0xA9E0..=0xA9FF | 0xAA60..=0xAA7F => O,
        0x111E0..=0x111FF | 0x11300..=0x1137F => O,
        _ => category_from_properties(ch),
    }
}

/// A category for scripts without an entry in the table, from the general category and
/// the combining class.
fn category_from_properties(ch: u32) -> u8 {
    use self::category::*;

    let gen_cat = unicode::general_category(ch);
    match gen_cat {
        _ if gen_cat.is_letter() => B,
        GeneralCategory::DecimalNumber => B,
        GeneralCategory::OtherSymbol | GeneralCategory::CurrencySymbol => S,
        GeneralCategory::NonspacingMark | GeneralCategory::SpacingMark => {
            match mcc::combining_class(ch) {
                9 => H,
                7 => CMBlw,
                200 | 202 | 218 | 220 | 222 | 233 => VBlw,
                214 | 216 | 228 | 230 | 232 | 234 => VAbv,
                _ if gen_cat == GeneralCategory::SpacingMark => VPst,
                _ => VAbv,
            }
        }
        _ => O,
    }
}

#[cfg(test)]
mod tests {
    use super::category::*;
    use super::*;
    use crate::buffer::ScratchFlags;
    use crate::tests::TestFace;

    fn buffer_of(text: &[u32]) -> Buffer {
        let mut buffer = Buffer::new();
        let mut scratch_flags = ScratchFlags::empty();
        for (cluster, &ch) in text.iter().enumerate() {
            buffer.add(ch, cluster as u32);
            let info = buffer.info.last_mut().unwrap();
            info.init_unicode_props(&mut scratch_flags);
            info.complex_category = use_category(ch);
        }
        buffer
    }

    fn buffer_of_categories(categories: &[u8], syllable: u8) -> Buffer {
        let mut buffer = Buffer::new();
        for (cluster, &category) in categories.iter().enumerate() {
            buffer.add(0x1000 + cluster as u32, cluster as u32);
            let info = buffer.info.last_mut().unwrap();
            info.complex_category = category;
            info.syllable = syllable;
        }
        buffer
    }

    fn syllables(buffer: &Buffer) -> Vec<u8> {
        buffer.info.iter().map(|info| info.syllable).collect()
    }

    fn categories(buffer: &Buffer) -> Vec<u8> {
        buffer.info.iter().map(|info| info.complex_category).collect()
    }

    #[test]
    fn categories_from_table() {
        assert_eq!(use_category(0x0915), B);
        assert_eq!(use_category(0x094D), H);
        assert_eq!(use_category(0x093F), VPre);
        assert_eq!(use_category(0x0940), VPst);
        assert_eq!(use_category(0x0902), VMAbv);
        assert_eq!(use_category(0x25CC), GB);
        assert_eq!(use_category(0x200C), ZWNJ);
        assert_eq!(use_category(0x17D2), H);
        assert_eq!(use_category(0x0964), O);
    }

    #[test]
    fn categories_from_properties() {
        assert_eq!(use_category(0x1A60), Sk);
        // Tai Tham letter high ka
        assert_eq!(use_category(0x1A20), B);
        // Balinese adeg adeg
        assert_eq!(use_category(0x1B44), H);
        assert_eq!(use_category(0x0020), O);
    }

    #[test]
    fn conjunct_with_pre_base_vowel_is_one_syllable() {
        // KA VIRAMA SSA I
        let mut buffer = buffer_of(&[0x0915, 0x094D, 0x0937, 0x093F]);
        find_syllables(&mut buffer);
        let standard = (1 << 4) | syllable_type::STANDARD;
        assert_eq!(syllables(&buffer), vec![standard; 4]);
    }

    #[test]
    fn syllable_types() {
        assert_eq!(match_syllable(&[B, H]), (2, syllable_type::VIRAMA_TERMINATED));
        assert_eq!(match_syllable(&[B, VPst, B]), (2, syllable_type::STANDARD));
        assert_eq!(match_syllable(&[R, B, H, B, VAbv]), (5, syllable_type::STANDARD));
        assert_eq!(match_syllable(&[O, O]), (1, syllable_type::INDEPENDENT));
        assert_eq!(match_syllable(&[N, HN, N]), (3, syllable_type::NUMERAL));
        assert_eq!(match_syllable(&[N, HN]), (2, syllable_type::NUMBER_JOINER_TERMINATED));
        assert_eq!(match_syllable(&[S, SMAbv]), (2, syllable_type::SYMBOL));
        assert_eq!(match_syllable(&[G, J, G]), (3, syllable_type::HIEROGLYPH));
        assert_eq!(match_syllable(&[VPst, VMAbv]), (2, syllable_type::BROKEN));
        assert_eq!(match_syllable(&[ZWNJ]), (1, syllable_type::NON_CLUSTER));
    }

    #[test]
    fn syllables_are_numbered() {
        // KA, I, KA
        let mut buffer = buffer_of(&[0x0915, 0x093F, 0x0915]);
        find_syllables(&mut buffer);
        assert_eq!(
            syllables(&buffer),
            vec![
                (1 << 4) | syllable_type::STANDARD,
                (1 << 4) | syllable_type::STANDARD,
                (2 << 4) | syllable_type::STANDARD,
            ]
        );
    }

    #[test]
    fn ignorables_join_the_preceding_syllable() {
        // KA, ZWJ, KA
        let mut buffer = buffer_of(&[0x0915, 0x200D, 0x0915]);
        find_syllables(&mut buffer);
        assert_eq!(buffer.info[0].syllable, buffer.info[1].syllable);
        assert_ne!(buffer.info[1].syllable, buffer.info[2].syllable);
    }

    #[test]
    fn zwnj_before_mark_is_skipped() {
        // KA, ZWNJ, SIGN AA
        let mut buffer = buffer_of(&[0x0915, 0x200C, 0x093E]);
        find_syllables(&mut buffer);
        assert_eq!(buffer.info[0].syllable, buffer.info[2].syllable);
        assert_eq!(buffer.info[0].syllable & 0x0F, syllable_type::STANDARD);
    }

    #[test]
    fn broken_syllable_gets_dotted_circle() {
        let mut face = TestFace::new();
        face.map('\u{25CC}', 9);
        // SIGN I on its own
        let mut buffer = buffer_of(&[0x093F]);
        find_syllables(&mut buffer);
        assert_eq!(buffer.info[0].syllable & 0x0F, syllable_type::BROKEN);
        insert_dotted_circles(&face, &mut buffer, syllable_type::BROKEN, B, Some(R));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.info[0].codepoint, 9);
        // The vowel then moves to the front of its syllable.
        reorder_syllable(&mut buffer, 0, 2);
        assert_eq!(categories(&buffer), vec![VPre, B]);
    }

    #[test]
    fn repha_moves_before_post_base_glyphs() {
        let standard = (1 << 4) | syllable_type::STANDARD;
        let mut buffer = buffer_of_categories(&[R, B, H, B, VPst], standard);
        reorder_syllable(&mut buffer, 0, 5);
        assert_eq!(categories(&buffer), vec![B, R, H, B, VPst]);
        assert_eq!(buffer.info[0].cluster, 0);
        assert_eq!(buffer.info[1].cluster, 0);
        assert_eq!(buffer.info[2].cluster, 2);
    }

    #[test]
    fn repha_moves_to_end() {
        let standard = (1 << 4) | syllable_type::STANDARD;
        let mut buffer = buffer_of_categories(&[R, B, B], standard);
        reorder_syllable(&mut buffer, 0, 3);
        assert_eq!(categories(&buffer), vec![B, B, R]);
    }

    #[test]
    fn pre_base_vowel_moves_after_halant() {
        let standard = (1 << 4) | syllable_type::STANDARD;
        let mut buffer = buffer_of_categories(&[B, H, B, VPre], standard);
        reorder_syllable(&mut buffer, 0, 4);
        assert_eq!(categories(&buffer), vec![B, H, VPre, B]);
        assert_eq!(buffer.info[2].cluster, 2);
        assert_eq!(buffer.info[3].cluster, 2);
    }

    #[test]
    fn independent_syllables_are_not_reordered() {
        let independent = (1 << 4) | syllable_type::INDEPENDENT;
        let mut buffer = buffer_of_categories(&[R, B], independent);
        reorder_syllable(&mut buffer, 0, 2);
        assert_eq!(categories(&buffer), vec![R, B]);
    }

    #[test]
    fn vowel_constraints_insert_dotted_circle() {
        // LETTER A, SIGN AA
        let mut buffer = buffer_of(&[0x0905, 0x093E]);
        preprocess_text(&mut buffer);
        let text: Vec<_> = buffer.info.iter().map(|info| info.codepoint).collect();
        assert_eq!(text, vec![0x0905, 0x25CC, 0x093E]);
        let clusters: Vec<_> = buffer.info.iter().map(|info| info.cluster).collect();
        assert_eq!(clusters, vec![0, 1, 1]);
        assert!(!buffer.info[1].is_continuation());
    }

    #[test]
    fn reph_letter_i_constraint() {
        // RA, VIRAMA, LETTER I
        let mut buffer = buffer_of(&[0x0930, 0x094D, 0x0907]);
        preprocess_text(&mut buffer);
        let text: Vec<_> = buffer.info.iter().map(|info| info.codepoint).collect();
        assert_eq!(text, vec![0x0930, 0x094D, 0x25CC, 0x0907]);

        let mut buffer = buffer_of(&[0x0930, 0x094D, 0x0915]);
        preprocess_text(&mut buffer);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn vowel_constraints_can_be_disabled() {
        let mut buffer = buffer_of(&[0x0905, 0x093E]);
        buffer.flags |= BufferFlags::DO_NOT_INSERT_DOTTED_CIRCLE;
        preprocess_text(&mut buffer);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn khmer_split_vowels_decompose() {
        assert_eq!(decompose(0x17C4), Some((0x17C1, Some(0x17C4))));
        assert_eq!(decompose(0x0915), None);
        // A mark never recomposes
        assert_eq!(compose(0x0947, 0x093E), None);
        assert_eq!(compose(0x0928, 0x093C), Some(0x0929));
    }
}
