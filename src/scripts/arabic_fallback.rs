//! Arabic shaping for fonts without OpenType Arabic features.
//!
//! A `GSUB` table is synthesized from the font's mappings for the Arabic Presentation
//! Forms, or, for fonts laid out in the Windows-1256 encoding, taken from a fixed set of
//! lookups for that layout.

use log::debug;

use crate::buffer::Buffer;
use crate::context::ApplyContext;
use crate::face::FontFace;
use crate::feature_map::{FeatureMap, LookupMap};
use crate::layout::{
    LayoutTable, Ligature, LigatureSubst, Lookup, LookupFlag, SingleSubst, SubstSubtable, GSUB,
};
use crate::tag;

const SINGLE_SUBST: u16 = 1;
const LIGATURE_SUBST: u16 = 4;

/// Features in the order of the columns of `SHAPING_TABLE`, then `rlig`.
const FALLBACK_FEATURES: [u32; 5] = [
    tag!(b"isol"),
    tag!(b"fina"),
    tag!(b"init"),
    tag!(b"medi"),
    tag!(b"rlig"),
];

/// Isolated, final, initial and medial presentation forms of the Arabic letters, 0 where
/// a letter has no such form.
const SHAPING_TABLE: &[(u32, [u32; 4])] = &[
    (0x0621, [0xFE80, 0x0000, 0x0000, 0x0000]),
    (0x0622, [0xFE81, 0xFE82, 0x0000, 0x0000]),
    (0x0623, [0xFE83, 0xFE84, 0x0000, 0x0000]),
    (0x0624, [0xFE85, 0xFE86, 0x0000, 0x0000]),
    (0x0625, [0xFE87, 0xFE88, 0x0000, 0x0000]),
    (0x0626, [0xFE89, 0xFE8A, 0xFE8B, 0xFE8C]),
    (0x0627, [0xFE8D, 0xFE8E, 0x0000, 0x0000]),
    (0x0628, [0xFE8F, 0xFE90, 0xFE91, 0xFE92]),
    (0x0629, [0xFE93, 0xFE94, 0x0000, 0x0000]),
    (0x062A, [0xFE95, 0xFE96, 0xFE97, 0xFE98]),
    (0x062B, [0xFE99, 0xFE9A, 0xFE9B, 0xFE9C]),
    (0x062C, [0xFE9D, 0xFE9E, 0xFE9F, 0xFEA0]),
    (0x062D, [0xFEA1, 0xFEA2, 0xFEA3, 0xFEA4]),
    (0x062E, [0xFEA5, 0xFEA6, 0xFEA7, 0xFEA8]),
    (0x062F, [0xFEA9, 0xFEAA, 0x0000, 0x0000]),
    (0x0630, [0xFEAB, 0xFEAC, 0x0000, 0x0000]),
    (0x0631, [0xFEAD, 0xFEAE, 0x0000, 0x0000]),
    (0x0632, [0xFEAF, 0xFEB0, 0x0000, 0x0000]),
    (0x0633, [0xFEB1, 0xFEB2, 0xFEB3, 0xFEB4]),
    (0x0634, [0xFEB5, 0xFEB6, 0xFEB7, 0xFEB8]),
    (0x0635, [0xFEB9, 0xFEBA, 0xFEBB, 0xFEBC]),
    (0x0636, [0xFEBD, 0xFEBE, 0xFEBF, 0xFEC0]),
    (0x0637, [0xFEC1, 0xFEC2, 0xFEC3, 0xFEC4]),
    (0x0638, [0xFEC5, 0xFEC6, 0xFEC7, 0xFEC8]),
    (0x0639, [0xFEC9, 0xFECA, 0xFECB, 0xFECC]),
    (0x063A, [0xFECD, 0xFECE, 0xFECF, 0xFED0]),
    (0x0641, [0xFED1, 0xFED2, 0xFED3, 0xFED4]),
    (0x0642, [0xFED5, 0xFED6, 0xFED7, 0xFED8]),
    (0x0643, [0xFED9, 0xFEDA, 0xFEDB, 0xFEDC]),
    (0x0644, [0xFEDD, 0xFEDE, 0xFEDF, 0xFEE0]),
    (0x0645, [0xFEE1, 0xFEE2, 0xFEE3, 0xFEE4]),
    (0x0646, [0xFEE5, 0xFEE6, 0xFEE7, 0xFEE8]),
    (0x0647, [0xFEE9, 0xFEEA, 0xFEEB, 0xFEEC]),
    (0x0648, [0xFEED, 0xFEEE, 0x0000, 0x0000]),
    (0x0649, [0xFEEF, 0xFEF0, 0xFBE8, 0xFBE9]),
    (0x064A, [0xFEF1, 0xFEF2, 0xFEF3, 0xFEF4]),
    (0x0671, [0xFB50, 0xFB51, 0x0000, 0x0000]),
    (0x0677, [0xFBDD, 0x0000, 0x0000, 0x0000]),
    (0x0679, [0xFB66, 0xFB67, 0xFB68, 0xFB69]),
    (0x067A, [0xFB5E, 0xFB5F, 0xFB60, 0xFB61]),
    (0x067B, [0xFB52, 0xFB53, 0xFB54, 0xFB55]),
    (0x067E, [0xFB56, 0xFB57, 0xFB58, 0xFB59]),
    (0x067F, [0xFB62, 0xFB63, 0xFB64, 0xFB65]),
    (0x0680, [0xFB5A, 0xFB5B, 0xFB5C, 0xFB5D]),
    (0x0683, [0xFB76, 0xFB77, 0xFB78, 0xFB79]),
    (0x0684, [0xFB72, 0xFB73, 0xFB74, 0xFB75]),
    (0x0686, [0xFB7A, 0xFB7B, 0xFB7C, 0xFB7D]),
    (0x0687, [0xFB7E, 0xFB7F, 0xFB80, 0xFB81]),
    (0x0688, [0xFB88, 0xFB89, 0x0000, 0x0000]),
    (0x068C, [0xFB84, 0xFB85, 0x0000, 0x0000]),
    (0x068D, [0xFB82, 0xFB83, 0x0000, 0x0000]),
    (0x068E, [0xFB86, 0xFB87, 0x0000, 0x0000]),
    (0x0691, [0xFB8C, 0xFB8D, 0x0000, 0x0000]),
    (0x0698, [0xFB8A, 0xFB8B, 0x0000, 0x0000]),
    (0x06A4, [0xFB6A, 0xFB6B, 0xFB6C, 0xFB6D]),
    (0x06A6, [0xFB6E, 0xFB6F, 0xFB70, 0xFB71]),
    (0x06A9, [0xFB8E, 0xFB8F, 0xFB90, 0xFB91]),
    (0x06AD, [0xFBD3, 0xFBD4, 0xFBD5, 0xFBD6]),
    (0x06AF, [0xFB92, 0xFB93, 0xFB94, 0xFB95]),
    (0x06B1, [0xFB9A, 0xFB9B, 0xFB9C, 0xFB9D]),
    (0x06B3, [0xFB96, 0xFB97, 0xFB98, 0xFB99]),
    (0x06BA, [0xFB9E, 0xFB9F, 0x0000, 0x0000]),
    (0x06BB, [0xFBA0, 0xFBA1, 0xFBA2, 0xFBA3]),
    (0x06BE, [0xFBAA, 0xFBAB, 0xFBAC, 0xFBAD]),
    (0x06C0, [0xFBA4, 0xFBA5, 0x0000, 0x0000]),
    (0x06C1, [0xFBA6, 0xFBA7, 0xFBA8, 0xFBA9]),
    (0x06C5, [0xFBE0, 0xFBE1, 0x0000, 0x0000]),
    (0x06C6, [0xFBD9, 0xFBDA, 0x0000, 0x0000]),
    (0x06C7, [0xFBD7, 0xFBD8, 0x0000, 0x0000]),
    (0x06C8, [0xFBDB, 0xFBDC, 0x0000, 0x0000]),
    (0x06C9, [0xFBE2, 0xFBE3, 0x0000, 0x0000]),
    (0x06CB, [0xFBDE, 0xFBDF, 0x0000, 0x0000]),
    (0x06CC, [0xFBFC, 0xFBFD, 0xFBFE, 0xFBFF]),
    (0x06D0, [0xFBE4, 0xFBE5, 0xFBE6, 0xFBE7]),
    (0x06D2, [0xFBAE, 0xFBAF, 0x0000, 0x0000]),
    (0x06D3, [0xFBB0, 0xFBB1, 0x0000, 0x0000]),
];

/// Lam-alef ligatures of the initial and medial lam with the final alefs.
const LIGATURE_TABLE: &[(u32, [(u32, u32); 4])] = &[
    (
        0xFEDF,
        [
            (0xFE82, 0xFEF5),
            (0xFE84, 0xFEF7),
            (0xFE88, 0xFEF9),
            (0xFE8E, 0xFEFB),
        ],
    ),
    (
        0xFEE0,
        [
            (0xFE82, 0xFEF6),
            (0xFE84, 0xFEF8),
            (0xFE88, 0xFEFA),
            (0xFE8E, 0xFEFC),
        ],
    ),
];

/// Lookups replacing the OpenType Arabic features of a font.
pub(crate) struct ArabicFallbackPlan {
    table: LayoutTable<GSUB>,
    lookups: Vec<LookupMap>,
}

impl ArabicFallbackPlan {
    /// Returns `None` when the font supports neither kind of fallback.
    pub(crate) fn new(map: &FeatureMap, face: &dyn FontFace) -> Option<ArabicFallbackPlan> {
        ArabicFallbackPlan::from_unicode(map, face)
            .or_else(|| ArabicFallbackPlan::from_win1256(map, face))
    }

    fn from_lookups(
        map: &FeatureMap,
        lookups: impl Iterator<Item = (u32, Option<Lookup<GSUB>>)>,
    ) -> Option<ArabicFallbackPlan> {
        let mut plan = ArabicFallbackPlan {
            table: LayoutTable {
                opt_script_list: None,
                opt_feature_list: None,
                lookups: Vec::new(),
            },
            lookups: Vec::new(),
        };
        for (feature, lookup) in lookups {
            let mask = map.one_mask(feature);
            if mask == 0 {
                continue;
            }
            if let Some(lookup) = lookup {
                plan.lookups.push(LookupMap {
                    index: plan.table.lookups.len() as u16,
                    mask,
                    auto_zwnj: true,
                    auto_zwj: true,
                    random: false,
                });
                plan.table.lookups.push(lookup);
            }
        }
        if plan.lookups.is_empty() {
            None
        } else {
            Some(plan)
        }
    }

    fn from_unicode(map: &FeatureMap, face: &dyn FontFace) -> Option<ArabicFallbackPlan> {
        let lookups = FALLBACK_FEATURES
            .iter()
            .enumerate()
            .map(|(i, &feature)| {
                let lookup = match i {
                    0..=3 => synthesize_single(face, i),
                    _ => synthesize_ligature(face),
                };
                (feature, lookup)
            });
        ArabicFallbackPlan::from_lookups(map, lookups)
    }

    fn from_win1256(map: &FeatureMap, face: &dyn FontFace) -> Option<ArabicFallbackPlan> {
        if !win1256::looks_encoded(face) {
            return None;
        }
        debug!("using Windows-1256 Arabic fallback");
        ArabicFallbackPlan::from_lookups(
            map,
            win1256::lookups()
                .into_iter()
                .map(|(feature, lookup)| (feature, Some(lookup))),
        )
    }

    pub(crate) fn shape(&self, face: &dyn FontFace, buffer: &mut Buffer) {
        let mut ctx = ApplyContext::new(face, &self.table, buffer);
        for lookup in &self.lookups {
            ctx.apply_string(lookup);
        }
    }
}

fn synthesize_single(face: &dyn FontFace, form: usize) -> Option<Lookup<GSUB>> {
    let pairs: Vec<(u16, u16)> = SHAPING_TABLE
        .iter()
        .filter_map(|&(ch, forms)| {
            let shaped = forms[form];
            if shaped == 0 {
                return None;
            }
            let glyph = face.nominal_glyph(ch)?;
            let substitute = face.nominal_glyph(shaped)?;
            (glyph != substitute).then_some((glyph, substitute))
        })
        .collect();
    if pairs.is_empty() {
        return None;
    }
    Some(Lookup::new(
        SINGLE_SUBST,
        LookupFlag::IGNORE_MARKS,
        vec![SubstSubtable::Single(SingleSubst::from_pairs(pairs))],
    ))
}

fn synthesize_ligature(face: &dyn FontFace) -> Option<Lookup<GSUB>> {
    let sets: Vec<(u16, Vec<Ligature>)> = LIGATURE_TABLE
        .iter()
        .filter_map(|(first, ligatures)| {
            let first = face.nominal_glyph(*first)?;
            let ligatures = ligatures
                .iter()
                .filter_map(|&(second, ligature)| {
                    Some(Ligature {
                        ligature_glyph: face.nominal_glyph(ligature)?,
                        component_glyphs: vec![face.nominal_glyph(second)?],
                    })
                })
                .collect();
            Some((first, ligatures))
        })
        .collect();
    if sets.is_empty() {
        return None;
    }
    Some(Lookup::new(
        LIGATURE_SUBST,
        LookupFlag::IGNORE_MARKS,
        vec![SubstSubtable::Ligature(LigatureSubst::from_sets(sets))],
    ))
}

/// Lookups for fonts whose glyph ids follow the Windows-1256 code page.
mod win1256 {
    use super::{LIGATURE_SUBST, SINGLE_SUBST};
    use crate::face::FontFace;
    use crate::layout::{
        Ligature, LigatureSubst, Lookup, LookupFlag, SingleSubst, SubstSubtable, GSUB,
    };
    use crate::tag;

    /// Alef, lam, alef maksura, yeh and sukun sit at their code page positions.
    pub(super) fn looks_encoded(face: &dyn FontFace) -> bool {
        [
            (0x0627, 199),
            (0x0644, 225),
            (0x0649, 236),
            (0x064A, 237),
            (0x0652, 250),
        ]
        .iter()
        .all(|&(ch, glyph)| face.nominal_glyph(ch) == Some(glyph))
    }

    const INIT_MEDI: &[(u16, u16)] = &[
        (198, 162),
        (200, 4),
        (201, 5),
        (202, 5),
        (203, 6),
        (204, 7),
        (205, 9),
        (206, 11),
        (211, 13),
        (212, 14),
        (213, 15),
        (214, 26),
        (223, 140),
        (225, 141),
        (227, 142),
        (228, 143),
        (236, 154),
        (237, 154),
    ];
    const INIT: &[(u16, u16)] = &[(218, 27), (219, 30), (221, 128), (222, 131), (229, 144)];
    const MEDI: &[(u16, u16)] = &[(218, 28), (219, 31), (221, 129), (222, 138), (229, 149)];
    const FINA: &[(u16, u16)] = &[
        (194, 2),
        (195, 1),
        (197, 3),
        (198, 181),
        (199, 0),
        (201, 159),
        (204, 8),
        (205, 10),
        (206, 12),
        (218, 29),
        (219, 127),
        (229, 152),
        (236, 160),
        (237, 156),
    ];
    const MEDI_FINA_LAM_ALEF: &[(u16, u16)] = &[(165, 170), (178, 179), (180, 185), (252, 255)];
    /// Lam followed by each alef.
    const LAM_ALEF: (u16, &[(u16, u16)]) = (225, &[(199, 165), (195, 178), (194, 180), (197, 252)]);
    /// Shadda followed by fatha, damma and kasra.
    const SHADDA: (u16, &[(u16, u16)]) = (248, &[(243, 172), (245, 173), (246, 175)]);

    fn single(pairs: &[(u16, u16)]) -> SubstSubtable {
        SubstSubtable::Single(SingleSubst::from_pairs(pairs.to_vec()))
    }

    fn ligatures((first, pairs): (u16, &[(u16, u16)])) -> SubstSubtable {
        let ligatures = pairs
            .iter()
            .map(|&(second, ligature_glyph)| Ligature {
                ligature_glyph,
                component_glyphs: vec![second],
            })
            .collect();
        SubstSubtable::Ligature(LigatureSubst::from_sets(vec![(first, ligatures)]))
    }

    pub(super) fn lookups() -> Vec<(u32, Lookup<GSUB>)> {
        let ignore_marks = LookupFlag::IGNORE_MARKS;
        vec![
            (
                tag!(b"rlig"),
                Lookup::new(LIGATURE_SUBST, ignore_marks, vec![ligatures(LAM_ALEF)]),
            ),
            (
                tag!(b"init"),
                Lookup::new(SINGLE_SUBST, ignore_marks, vec![single(INIT_MEDI), single(INIT)]),
            ),
            (
                tag!(b"medi"),
                Lookup::new(
                    SINGLE_SUBST,
                    ignore_marks,
                    vec![single(INIT_MEDI), single(MEDI), single(MEDI_FINA_LAM_ALEF)],
                ),
            ),
            (
                tag!(b"fina"),
                Lookup::new(
                    SINGLE_SUBST,
                    ignore_marks,
                    vec![single(FINA), single(MEDI_FINA_LAM_ALEF)],
                ),
            ),
            (
                tag!(b"rlig"),
                Lookup::new(LIGATURE_SUBST, LookupFlag::empty(), vec![ligatures(SHADDA)]),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Direction, SegmentProperties};
    use crate::feature_map::MapBuilder;
    use crate::scripts::arabic;
    use crate::tests::TestFace;
    use crate::unicode::script;

    fn arabic_map(face: &TestFace) -> FeatureMap {
        let props = SegmentProperties {
            direction: Direction::RightToLeft,
            script: script::ARABIC,
            language: None,
        };
        let mut builder = MapBuilder::new(face, &props);
        arabic::collect_features(&mut builder, script::ARABIC);
        builder.compile()
    }

    fn glyphs(buffer: &Buffer) -> Vec<u32> {
        buffer.info.iter().map(|info| info.codepoint).collect()
    }

    #[test]
    fn presentation_forms() {
        let mut face = TestFace::new();
        face.map('\u{0628}', 1)
            .map('\u{FE8F}', 2)
            .map('\u{FE90}', 3)
            .map('\u{FE91}', 4)
            .map('\u{FE92}', 5);
        let map = arabic_map(&face);
        let plan = ArabicFallbackPlan::new(&map, &face).unwrap();
        // One single substitution per form, no ligatures.
        assert_eq!(plan.lookups.len(), 4);

        let mut buffer = Buffer::new();
        for cluster in 0..4 {
            buffer.add(1, cluster);
        }
        let masks = [
            map.one_mask(tag!(b"init")),
            map.one_mask(tag!(b"medi")),
            map.one_mask(tag!(b"fina")),
            map.one_mask(tag!(b"isol")),
        ];
        for (info, mask) in buffer.info.iter_mut().zip(masks) {
            info.mask = map.global_mask() | mask;
        }
        plan.shape(&face, &mut buffer);
        assert_eq!(glyphs(&buffer), vec![4, 5, 3, 2]);
    }

    #[test]
    fn lam_alef_ligature() {
        let mut face = TestFace::new();
        face.map('\u{0644}', 1)
            .map('\u{0627}', 2)
            .map('\u{FEDF}', 3)
            .map('\u{FE8E}', 4)
            .map('\u{FEFB}', 5);
        let map = arabic_map(&face);
        let plan = ArabicFallbackPlan::new(&map, &face).unwrap();

        let mut buffer = Buffer::new();
        buffer.add(1, 0);
        buffer.add(2, 1);
        buffer.info[0].mask = map.global_mask() | map.one_mask(tag!(b"init"));
        buffer.info[1].mask = map.global_mask() | map.one_mask(tag!(b"fina"));
        plan.shape(&face, &mut buffer);
        assert_eq!(glyphs(&buffer), vec![5]);
        assert_eq!(buffer.info[0].cluster, 0);
    }

    #[test]
    fn windows_1256_encoding() {
        let mut face = TestFace::new();
        face.num_glyphs = 256;
        face.map('\u{0627}', 199)
            .map('\u{0644}', 225)
            .map('\u{0649}', 236)
            .map('\u{064A}', 237)
            .map('\u{0652}', 250);
        let map = arabic_map(&face);
        let plan = ArabicFallbackPlan::new(&map, &face).unwrap();
        assert_eq!(plan.lookups.len(), 5);

        // Lam alef joins before the positional forms apply.
        let mut buffer = Buffer::new();
        buffer.add(225, 0);
        buffer.add(199, 1);
        buffer.info[0].mask = map.global_mask() | map.one_mask(tag!(b"init"));
        buffer.info[1].mask = map.global_mask() | map.one_mask(tag!(b"fina"));
        plan.shape(&face, &mut buffer);
        assert_eq!(glyphs(&buffer), vec![165]);
    }

    #[test]
    fn no_fallback_without_forms() {
        let face = TestFace::with_chars("\u{0628}\u{0627}");
        let map = arabic_map(&face);
        assert!(ArabicFallbackPlan::new(&map, &face).is_none());
    }
}
