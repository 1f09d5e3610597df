//! Shape plans: the features, lookups and strategy chosen for one face, segment and set of
//! user features.

use crate::buffer::{Direction, Mask, SegmentProperties};
use crate::face::FontFace;
use crate::feature_map::{
    Feature, FeatureFlags, FeatureMap, MapBuilder, TableIndex, MAX_VALUE,
};
use crate::morx::{aat_selectors, AatSelector};
use crate::scripts::{ComplexShaper, ShaperData, ZeroWidthMarks};
use crate::tag;

/// Features every script uses.
const COMMON_FEATURES: [(u32, FeatureFlags); 7] = [
    (tag!(b"abvm"), FeatureFlags::GLOBAL),
    (tag!(b"blwm"), FeatureFlags::GLOBAL),
    (tag!(b"ccmp"), FeatureFlags::GLOBAL),
    (tag!(b"locl"), FeatureFlags::GLOBAL),
    (tag!(b"mark"), FeatureFlags::GLOBAL_MANUAL_JOINERS),
    (tag!(b"mkmk"), FeatureFlags::GLOBAL_MANUAL_JOINERS),
    (tag!(b"rlig"), FeatureFlags::GLOBAL),
];

const HORIZONTAL_FEATURES: [(u32, FeatureFlags); 7] = [
    (tag!(b"calt"), FeatureFlags::GLOBAL),
    (tag!(b"clig"), FeatureFlags::GLOBAL),
    (tag!(b"curs"), FeatureFlags::GLOBAL),
    (tag!(b"dist"), FeatureFlags::GLOBAL),
    (tag!(b"kern"), FeatureFlags::GLOBAL_HAS_FALLBACK),
    (tag!(b"liga"), FeatureFlags::GLOBAL),
    (tag!(b"rclt"), FeatureFlags::GLOBAL),
];

/// Everything decided before a buffer is shaped.
pub struct ShapePlan {
    pub(crate) props: SegmentProperties,
    pub(crate) shaper: ComplexShaper,
    pub(crate) map: FeatureMap,
    pub(crate) data: ShaperData,
    pub(crate) user_features: Vec<Feature>,
    pub(crate) aat_selectors: Vec<AatSelector>,

    pub(crate) frac_mask: Mask,
    pub(crate) numr_mask: Mask,
    pub(crate) dnom_mask: Mask,
    pub(crate) rtlm_mask: Mask,
    pub(crate) kern_mask: Mask,

    pub(crate) has_frac: bool,
    pub(crate) has_vert: bool,
    pub(crate) has_gpos_mark: bool,
    pub(crate) zero_marks: ZeroWidthMarks,
    pub(crate) fallback_glyph_classes: bool,
    pub(crate) fallback_mark_positioning: bool,
    pub(crate) adjust_mark_positioning_when_zeroing: bool,

    pub(crate) apply_gpos: bool,
    pub(crate) apply_kern: bool,
    pub(crate) apply_kerx: bool,
    pub(crate) apply_morx: bool,
}

impl ShapePlan {
    pub fn new(face: &dyn FontFace, props: &SegmentProperties, features: &[Feature]) -> ShapePlan {
        let mut builder = MapBuilder::new(face, props);

        // A vertical morx is only applied to fonts without GSUB, which handle vertical
        // text themselves.
        let apply_morx =
            face.morx().is_some() && (props.direction.is_horizontal() || face.gsub().is_none());

        let mut shaper =
            ComplexShaper::categorize(props, builder.chosen_script(TableIndex::Gsub));
        if apply_morx && shaper != ComplexShaper::Default {
            shaper = ComplexShaper::Dumb;
        }

        collect_features(&mut builder, shaper, props, features);

        let disable_gpos = shaper
            .gpos_tag(props.script)
            .map_or(false, |tag| Some(tag) != builder.chosen_script(TableIndex::Gpos));

        let map = builder.compile();

        let frac_mask = map.one_mask(tag!(b"frac"));
        let numr_mask = map.one_mask(tag!(b"numr"));
        let dnom_mask = map.one_mask(tag!(b"dnom"));
        let has_frac = frac_mask != 0 || (numr_mask != 0 && dnom_mask != 0);

        let rtlm_mask = map.one_mask(tag!(b"rtlm"));
        let has_vert = map.one_mask(tag!(b"vert")) != 0;

        let kern_tag = if props.direction.is_horizontal() {
            tag!(b"kern")
        } else {
            tag!(b"vkrn")
        };
        let kern_mask = map.mask(kern_tag).0;
        let has_gpos_kern = map.feature_index(TableIndex::Gpos, kern_tag).is_some();

        let has_kerx = face.kerx().is_some();
        let has_gsub = !apply_morx && face.gsub().is_some();
        let has_gpos = !disable_gpos && face.gpos().is_some();

        let mut apply_kerx = false;
        let mut apply_gpos = false;
        let mut apply_kern = false;
        // GPOS wins over kerx only when GSUB is there too.
        if has_kerx && !(has_gsub && has_gpos) {
            apply_kerx = true;
        } else if has_gpos {
            apply_gpos = true;
        }
        if !apply_kerx && (!has_gpos_kern || !apply_gpos) {
            if has_kerx {
                apply_kerx = true;
            } else if face.kern().is_some() {
                apply_kern = true;
            }
        }

        let (script_zero_marks, script_fallback_positioning) = shaper.marks_behavior();
        let zero_marks = if apply_kerx {
            ZeroWidthMarks::None
        } else {
            script_zero_marks
        };
        let adjust_mark_positioning_when_zeroing = !apply_gpos && !apply_kerx;
        let fallback_mark_positioning =
            adjust_mark_positioning_when_zeroing && script_fallback_positioning;
        let fallback_glyph_classes = !face.gdef().map_or(false, |gdef| gdef.has_glyph_classes());
        let has_gpos_mark = map.one_mask(tag!(b"mark")) != 0;

        let data = shaper.create_data(&map, props, face);

        ShapePlan {
            props: *props,
            shaper,
            map,
            data,
            user_features: features.to_vec(),
            aat_selectors: if apply_morx {
                aat_selectors(features)
            } else {
                Vec::new()
            },
            frac_mask,
            numr_mask,
            dnom_mask,
            rtlm_mask,
            kern_mask,
            has_frac,
            has_vert,
            has_gpos_mark,
            zero_marks,
            fallback_glyph_classes,
            fallback_mark_positioning,
            adjust_mark_positioning_when_zeroing,
            apply_gpos,
            apply_kern,
            apply_kerx,
            apply_morx,
        }
    }

    pub fn props(&self) -> &SegmentProperties {
        &self.props
    }

    pub fn shaper(&self) -> ComplexShaper {
        self.shaper
    }

    pub fn map(&self) -> &FeatureMap {
        &self.map
    }
}

fn collect_features(
    builder: &mut MapBuilder<'_>,
    shaper: ComplexShaper,
    props: &SegmentProperties,
    user_features: &[Feature],
) {
    builder.enable_feature(tag!(b"rvrn"));
    builder.add_gsub_pause(None);

    match props.direction {
        Direction::LeftToRight => {
            builder.enable_feature(tag!(b"ltra"));
            builder.enable_feature(tag!(b"ltrm"));
        }
        Direction::RightToLeft => {
            builder.enable_feature(tag!(b"rtla"));
            builder.add_feature(tag!(b"rtlm"));
        }
        _ => {}
    }

    // Automatic fractions.
    builder.add_feature(tag!(b"frac"));
    builder.add_feature(tag!(b"numr"));
    builder.add_feature(tag!(b"dnom"));

    builder.enable_feature_ext(tag!(b"rand"), FeatureFlags::RANDOM, MAX_VALUE);

    // Private features that let fonts know which shaper is running.
    builder.enable_feature(tag!(b"Harf"));
    builder.enable_feature(tag!(b"HARF"));

    shaper.collect_features(builder, props);

    builder.enable_feature(tag!(b"Buzz"));
    builder.enable_feature(tag!(b"BUZZ"));

    for &(tag, flags) in &COMMON_FEATURES {
        builder.add_feature_ext(tag, flags, 1);
    }

    if props.direction.is_horizontal() {
        for &(tag, flags) in &HORIZONTAL_FEATURES {
            builder.add_feature_ext(tag, flags, 1);
        }
    } else {
        builder.enable_feature_ext(tag!(b"vert"), FeatureFlags::GLOBAL_SEARCH, 1);
    }

    for feature in user_features {
        let flags = if feature.is_global() {
            FeatureFlags::GLOBAL
        } else {
            FeatureFlags::empty()
        };
        builder.add_feature_ext(feature.tag, flags, feature.value);
    }

    shaper.override_features(builder, props);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::layout::tests::gsub_single_subst_extension;
    use crate::layout::{LayoutTable, GSUB};
    use crate::tests::TestFace;
    use crate::unicode::script;

    fn props(script: u32, direction: Direction) -> SegmentProperties {
        SegmentProperties {
            direction,
            script,
            language: None,
        }
    }

    fn liga_face() -> TestFace {
        let data = gsub_single_subst_extension(3, 10);
        let mut face = TestFace::new();
        face.gsub = Some(ReadScope::new(&data).read::<LayoutTable<GSUB>>().unwrap());
        face
    }

    #[test]
    fn plain_face_falls_back_for_everything() {
        let face = TestFace::new();
        let plan = ShapePlan::new(&face, &props(script::LATIN, Direction::LeftToRight), &[]);
        assert_eq!(plan.shaper, ComplexShaper::Default);
        assert!(!plan.apply_gpos && !plan.apply_kern && !plan.apply_kerx && !plan.apply_morx);
        assert!(plan.fallback_glyph_classes);
        assert!(plan.fallback_mark_positioning);
        assert_eq!(plan.zero_marks, ZeroWidthMarks::ByGdefLate);
        // Features the font lacks get no mask bits.
        assert!(!plan.has_frac);
        assert_eq!(plan.rtlm_mask, 0);
        // kern has a fallback, so it is always allocated.
        assert_ne!(plan.kern_mask, 0);
    }

    #[test]
    fn global_features_share_the_global_bit() {
        let face = liga_face();
        let plan = ShapePlan::new(&face, &props(script::LATIN, Direction::LeftToRight), &[]);
        // Only liga and kern are allocated, both on the global bit.
        assert_eq!(plan.map.mask(tag!(b"liga")).0, plan.map.global_mask());
    }

    #[test]
    fn ranged_user_features_get_their_own_bits() {
        let face = liga_face();
        let feature = Feature {
            tag: tag!(b"liga"),
            value: 0,
            start: 1,
            end: 3,
        };
        let plan = ShapePlan::new(
            &face,
            &props(script::LATIN, Direction::LeftToRight),
            &[feature],
        );
        let (mask, _) = plan.map.mask(tag!(b"liga"));
        assert_ne!(mask, 0);
        assert_ne!(mask, plan.map.mask(tag!(b"kern")).0);
        // Still on outside the range.
        assert_eq!(mask & plan.map.global_mask(), mask);
        assert_eq!(plan.user_features, vec![feature]);
    }

    #[test]
    fn arabic_plan_has_joining_data() {
        let face = TestFace::new();
        let plan = ShapePlan::new(&face, &props(script::ARABIC, Direction::RightToLeft), &[]);
        assert_eq!(plan.shaper, ComplexShaper::Arabic);
        assert!(matches!(plan.data, ShaperData::Arabic(_)));
    }
}
