//! Application of `GSUB` lookups to a buffer.
//!
//! Forward lookups write through the buffer's output side and end with a buffer swap.
//! Reverse chaining lookups substitute in place. See
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/gsub>.

use crate::buffer::{Buffer, GlyphProps};
use crate::context::{
    ApplyContext, ApplyTable, GlyphTable, MAX_CONTEXT_LENGTH, MAX_NESTING_LEVEL,
};
use crate::face::FontFace;
use crate::feature_map::{TableIndex, MAX_VALUE};
use crate::layout::{
    AlternateSubst, LayoutTable, LigatureSubst, Lookup, MultipleSubst, ReverseChainSingleSubst,
    SingleSubst, SubstSubtable, GSUB,
};
use crate::unicode::GeneralCategory;

impl ApplyTable for GSUB {
    const TABLE_INDEX: TableIndex = TableIndex::Gsub;
    const IN_PLACE: bool = false;

    fn layout_table(face: &dyn FontFace) -> Option<&LayoutTable<GSUB>> {
        face.gsub()
    }

    fn apply_subtable(ctx: &mut ApplyContext<'_, GSUB>, subtable: &SubstSubtable) -> bool {
        match subtable {
            SubstSubtable::Single(subst) => apply_single(ctx, subst),
            SubstSubtable::Multiple(subst) => apply_multiple(ctx, subst),
            SubstSubtable::Alternate(subst) => apply_alternate(ctx, subst),
            SubstSubtable::Ligature(subst) => apply_ligature(ctx, subst),
            SubstSubtable::Context(lookup) | SubstSubtable::ChainContext(lookup) => {
                ctx.apply_context(lookup)
            }
            SubstSubtable::ReverseChainSingle(subst) => apply_reverse_chain_single(ctx, subst),
        }
    }

    fn is_reverse(lookup: &Lookup<GSUB>) -> bool {
        lookup.lookup_type == 8
    }
}

/// Prepare the buffer for substitution: glyph classes come from GDEF, and ligature and
/// syllable state from earlier passes is dropped.
pub(crate) fn substitute_start(face: &dyn FontFace, buffer: &mut Buffer) {
    let gdef = face.gdef().filter(|gdef| gdef.has_glyph_classes());
    for info in &mut buffer.info {
        if let Some(gdef) = gdef {
            info.glyph_props = gdef.glyph_props(info.glyph_id());
        }
        info.lig_props = 0;
        info.syllable = 0;
    }
}

/// Guess glyph classes from the characters when the font has no GDEF classes.
pub(crate) fn synthesize_glyph_classes(buffer: &mut Buffer) {
    for info in &mut buffer.info {
        // Default ignorables are never marks, whatever their category.
        let class = if info.general_category() == GeneralCategory::NonspacingMark
            && !info.is_default_ignorable()
        {
            GlyphProps::MARK
        } else {
            GlyphProps::BASE_GLYPH
        };
        info.glyph_props = (info.glyph_props & GlyphProps::PRESERVE) | class;
    }
}

fn apply_single(ctx: &mut ApplyContext<'_, GSUB>, subst: &SingleSubst) -> bool {
    let glyph = ctx.buffer.cur(0).glyph_id();
    match subst.apply_glyph(glyph) {
        Some(output) => {
            ctx.replace_glyph(output);
            true
        }
        None => false,
    }
}

fn apply_multiple(ctx: &mut ApplyContext<'_, GSUB>, subst: &MultipleSubst) -> bool {
    let glyph = ctx.buffer.cur(0).glyph_id();
    let sequence = match subst.apply_glyph(glyph) {
        Some(sequence) => sequence,
        None => return false,
    };

    match sequence {
        [] => ctx.buffer.delete_glyph(),
        [output] => ctx.replace_glyph(*output),
        _ => {
            let class = if ctx.buffer.cur(0).is_ligature() {
                GlyphProps::BASE_GLYPH
            } else {
                GlyphProps::empty()
            };
            let lig_id = ctx.buffer.cur(0).lig_id();
            for (i, &output) in sequence.iter().enumerate() {
                // Glyphs attached to a ligature keep that attachment.
                if lig_id == 0 {
                    ctx.buffer
                        .cur_mut(0)
                        .set_lig_props_for_component((i & 0x0F) as u8);
                }
                ctx.output_glyph_for_component(output, class);
            }
            ctx.buffer.skip_glyph();
        }
    }
    true
}

fn apply_alternate(ctx: &mut ApplyContext<'_, GSUB>, subst: &AlternateSubst) -> bool {
    let glyph = ctx.buffer.cur(0).glyph_id();
    let alternates = match subst.apply_glyph(glyph) {
        Some(alternates) if !alternates.is_empty() => alternates,
        _ => return false,
    };

    let count = alternates.len() as u32;
    let lookup_mask = ctx.lookup_mask;
    let glyph_mask = ctx.buffer.cur(0).mask;
    let shift = lookup_mask.trailing_zeros();
    let mut alt_index = (lookup_mask & glyph_mask) >> shift;

    if alt_index == MAX_VALUE && ctx.random {
        let len = ctx.buffer.len();
        ctx.buffer.unsafe_to_break(0, len);
        alt_index = ctx.random_number() % count + 1;
    }
    if alt_index == 0 || alt_index > count {
        return false;
    }

    ctx.replace_glyph(alternates[(alt_index - 1) as usize]);
    true
}

fn apply_ligature(ctx: &mut ApplyContext<'_, GSUB>, subst: &LigatureSubst) -> bool {
    let glyph = ctx.buffer.cur(0).glyph_id();
    let ligatures = match subst.apply_glyph(glyph) {
        Some(ligatures) => ligatures,
        None => return false,
    };

    // The first ligature that matches is applied.
    for ligature in ligatures {
        if ligature.component_glyphs.is_empty() {
            ctx.replace_glyph(ligature.ligature_glyph);
            return true;
        }

        let mut match_positions = [0; MAX_CONTEXT_LENGTH];
        let input = GlyphTable::ById(&ligature.component_glyphs);
        if let Some((match_length, total_component_count)) =
            ctx.match_input(input, &mut match_positions)
        {
            ctx.ligate_input(
                ligature.component_glyphs.len() + 1,
                &match_positions,
                match_length,
                ligature.ligature_glyph,
                total_component_count,
            );
            return true;
        }
    }
    false
}

fn apply_reverse_chain_single(
    ctx: &mut ApplyContext<'_, GSUB>,
    subst: &ReverseChainSingleSubst,
) -> bool {
    // Reverse lookups can't be nested.
    if ctx.nesting_level_left != MAX_NESTING_LEVEL {
        return false;
    }

    let glyph = ctx.buffer.cur(0).glyph_id();
    let substitute = match subst.substitute(glyph) {
        Some(substitute) => substitute,
        None => return false,
    };
    let start = match ctx.match_backtrack(GlyphTable::ByCoverage(&subst.backtrack_coverages)) {
        Some(start) => start,
        None => return false,
    };
    let end = match ctx.match_lookahead(GlyphTable::ByCoverage(&subst.lookahead_coverages), 1) {
        Some(end) => end,
        None => return false,
    };

    ctx.buffer.unsafe_to_break_from_outbuffer(start, end);
    ctx.replace_glyph_inplace(substitute);
    // The cursor stays put; the lookup moves backwards.
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ScratchFlags;
    use crate::feature_map::LookupMap;
    use crate::layout::{
        ContextLookup, ContextRule, Coverage, Ligature, LookupFlag, SequenceLookup,
    };
    use crate::tests::TestFace;

    fn gsub_with(lookups: Vec<Lookup<GSUB>>) -> LayoutTable<GSUB> {
        LayoutTable {
            opt_script_list: None,
            opt_feature_list: None,
            lookups,
        }
    }

    fn single(from: u16, to: u16) -> Lookup<GSUB> {
        let subst = SingleSubst::Format2 {
            coverage: Coverage::from_glyphs(vec![from]),
            substitute_glyph_array: vec![to],
        };
        Lookup::new(1, LookupFlag::empty(), vec![SubstSubtable::Single(subst)])
    }

    fn buffer_of(glyphs: &[u32]) -> Buffer {
        let mut buffer = Buffer::new();
        for (cluster, &glyph) in glyphs.iter().enumerate() {
            buffer.add(glyph, cluster as u32);
        }
        buffer.reset_masks(1);
        buffer
    }

    fn apply(face: &TestFace, buffer: &mut Buffer, index: u16, mask: u32) {
        let table = face.gsub.as_ref().unwrap();
        let mut ctx = ApplyContext::new(face, table, buffer);
        ctx.apply_string(&LookupMap {
            index,
            mask,
            auto_zwnj: true,
            auto_zwj: true,
            random: false,
        });
    }

    fn glyphs(buffer: &Buffer) -> Vec<u32> {
        buffer.glyph_infos().iter().map(|info| info.codepoint).collect()
    }

    fn clusters(buffer: &Buffer) -> Vec<u32> {
        buffer.glyph_infos().iter().map(|info| info.cluster).collect()
    }

    #[test]
    fn single_substitution() {
        let mut face = TestFace::new();
        face.gsub = Some(gsub_with(vec![single(2, 20)]));
        let mut buffer = buffer_of(&[1, 2, 2]);
        apply(&face, &mut buffer, 0, 1);
        assert_eq!(glyphs(&buffer), vec![1, 20, 20]);
        assert!(buffer.glyph_infos()[1].is_substituted());
        assert!(!buffer.glyph_infos()[0].is_substituted());
    }

    #[test]
    fn masked_glyphs_are_not_substituted() {
        let mut face = TestFace::new();
        face.gsub = Some(gsub_with(vec![single(2, 20)]));
        let mut buffer = buffer_of(&[2, 2]);
        buffer.info[0].mask = 0;
        apply(&face, &mut buffer, 0, 1);
        assert_eq!(glyphs(&buffer), vec![2, 20]);
    }

    #[test]
    fn multiple_substitution_numbers_components() {
        let subst = MultipleSubst::from_sequences(vec![(3, vec![4, 5, 6]), (7, vec![])]);
        let mut face = TestFace::new();
        face.gsub = Some(gsub_with(vec![Lookup::new(
            2,
            LookupFlag::empty(),
            vec![SubstSubtable::Multiple(subst)],
        )]));
        let mut buffer = buffer_of(&[1, 3, 7, 2]);
        apply(&face, &mut buffer, 0, 1);

        assert_eq!(glyphs(&buffer), vec![1, 4, 5, 6, 2]);
        assert_eq!(clusters(&buffer), vec![0, 1, 1, 1, 3]);
        let infos = buffer.glyph_infos();
        let comps: Vec<u8> = infos[1..4].iter().map(|info| info.lig_comp()).collect();
        assert_eq!(comps, vec![0, 1, 2]);
        assert!(infos[2].is_multiplied());
    }

    #[test]
    fn alternate_picked_by_mask_value() {
        let subst = AlternateSubst::from_sets(vec![(3, vec![30, 31, 32])]);
        let mut face = TestFace::new();
        face.gsub = Some(gsub_with(vec![Lookup::new(
            3,
            LookupFlag::empty(),
            vec![SubstSubtable::Alternate(subst)],
        )]));
        let mut buffer = buffer_of(&[3, 3, 3]);
        buffer.info[0].mask = 0b0010;
        buffer.info[1].mask = 0b0100;
        buffer.info[2].mask = 0b1000;
        apply(&face, &mut buffer, 0, 0b1110);
        assert_eq!(glyphs(&buffer), vec![30, 31, 3]);
    }

    #[test]
    fn random_alternates_are_reproducible() {
        let subst = AlternateSubst::from_sets(vec![(3, vec![30, 31, 32])]);
        let mut face = TestFace::new();
        face.gsub = Some(gsub_with(vec![Lookup::new(
            3,
            LookupFlag::empty(),
            vec![SubstSubtable::Alternate(subst)],
        )]));
        let table = face.gsub.as_ref().unwrap();
        let mut buffer = buffer_of(&[3, 3]);
        buffer.reset_masks(MAX_VALUE << 1);
        {
            let mut ctx = ApplyContext::new(&face, table, &mut buffer);
            ctx.apply_string(&LookupMap {
                index: 0,
                mask: MAX_VALUE << 1,
                auto_zwnj: true,
                auto_zwj: true,
                random: true,
            });
        }
        // 48271 % 3 == 1 and 182605794 % 3 == 0.
        assert_eq!(glyphs(&buffer), vec![31, 30]);
    }

    #[test]
    fn ligature_merges_clusters() {
        let subst = LigatureSubst::from_sets(vec![(
            1,
            vec![
                Ligature {
                    ligature_glyph: 11,
                    component_glyphs: vec![1, 2],
                },
                Ligature {
                    ligature_glyph: 10,
                    component_glyphs: vec![2],
                },
            ],
        )]);
        let mut face = TestFace::new();
        face.gsub = Some(gsub_with(vec![Lookup::new(
            4,
            LookupFlag::empty(),
            vec![SubstSubtable::Ligature(subst)],
        )]));

        let mut buffer = buffer_of(&[1, 1, 2, 3]);
        apply(&face, &mut buffer, 0, 1);
        assert_eq!(glyphs(&buffer), vec![11, 3]);
        assert_eq!(clusters(&buffer), vec![0, 3]);
        let ligature = &buffer.glyph_infos()[0];
        assert!(ligature.is_ligature());
        assert!(ligature.is_ligated());
        assert_eq!(ligature.lig_num_comps(), 3);

        let mut buffer = buffer_of(&[1, 2, 1]);
        apply(&face, &mut buffer, 0, 1);
        assert_eq!(glyphs(&buffer), vec![10, 1]);
    }

    #[test]
    fn ligature_skips_ignored_marks() {
        let subst = LigatureSubst::from_sets(vec![(
            1,
            vec![Ligature {
                ligature_glyph: 10,
                component_glyphs: vec![2],
            }],
        )]);
        let mut face = TestFace::new();
        face.gsub = Some(gsub_with(vec![Lookup::new(
            4,
            LookupFlag::IGNORE_MARKS,
            vec![SubstSubtable::Ligature(subst)],
        )]));

        let mut buffer = buffer_of(&[1, 5, 2, 6]);
        buffer.info[1].glyph_props = GlyphProps::MARK;
        buffer.info[3].glyph_props = GlyphProps::MARK;
        apply(&face, &mut buffer, 0, 1);

        assert_eq!(glyphs(&buffer), vec![10, 5, 6]);
        assert_eq!(clusters(&buffer), vec![0, 0, 3]);
        let infos = buffer.glyph_infos();
        assert_eq!(infos[1].lig_id(), infos[0].lig_id());
        assert_eq!(infos[1].lig_comp(), 1);
        assert_eq!(infos[2].lig_id(), 0);
    }

    #[test]
    fn chained_context_with_coverages() {
        let chain = ContextLookup::Coverages {
            backtrack_coverages: vec![Coverage::from_glyphs(vec![1])],
            input_coverages: vec![Coverage::from_glyphs(vec![2])],
            lookahead_coverages: vec![Coverage::from_glyphs(vec![3])],
            lookup_records: vec![SequenceLookup {
                sequence_index: 0,
                lookup_index: 1,
            }],
        };
        let mut face = TestFace::new();
        face.gsub = Some(gsub_with(vec![
            Lookup::new(6, LookupFlag::empty(), vec![SubstSubtable::ChainContext(chain)]),
            single(2, 20),
        ]));

        let mut buffer = buffer_of(&[1, 2, 3, 4, 2, 3]);
        apply(&face, &mut buffer, 0, 1);
        assert_eq!(glyphs(&buffer), vec![1, 20, 3, 4, 2, 3]);
    }

    #[test]
    fn nested_lookups_track_length_changes() {
        let rule = ContextRule {
            backtrack: vec![],
            input: vec![2],
            lookahead: vec![],
            lookup_records: vec![
                SequenceLookup {
                    sequence_index: 0,
                    lookup_index: 1,
                },
                SequenceLookup {
                    sequence_index: 2,
                    lookup_index: 2,
                },
            ],
        };
        let context = ContextLookup::Glyphs {
            coverage: Coverage::from_glyphs(vec![1]),
            rule_sets: vec![vec![rule]],
        };
        let multiple = MultipleSubst::from_sequences(vec![(1, vec![7, 8])]);
        let mut face = TestFace::new();
        face.gsub = Some(gsub_with(vec![
            Lookup::new(5, LookupFlag::empty(), vec![SubstSubtable::Context(context)]),
            Lookup::new(2, LookupFlag::empty(), vec![SubstSubtable::Multiple(multiple)]),
            single(2, 9),
        ]));

        let mut buffer = buffer_of(&[1, 2, 5]);
        apply(&face, &mut buffer, 0, 1);
        assert_eq!(glyphs(&buffer), vec![7, 8, 9, 5]);
    }

    #[test]
    fn reverse_chain_runs_backwards() {
        // 2 becomes 20 before a 20, so a whole run of 2s changes from the end.
        let subst = ReverseChainSingleSubst::new(
            vec![(2, 20)],
            vec![],
            vec![Coverage::from_glyphs(vec![20])],
        );
        let mut face = TestFace::new();
        face.gsub = Some(gsub_with(vec![Lookup::new(
            8,
            LookupFlag::empty(),
            vec![SubstSubtable::ReverseChainSingle(subst)],
        )]));

        let mut buffer = buffer_of(&[2, 2, 2, 3]);
        apply(&face, &mut buffer, 0, 1);
        assert_eq!(glyphs(&buffer), vec![2, 2, 2, 3]);

        let mut buffer = buffer_of(&[2, 2, 2, 20]);
        apply(&face, &mut buffer, 0, 1);
        assert_eq!(glyphs(&buffer), vec![20, 20, 20, 20]);
    }

    #[test]
    fn synthesized_classes_follow_categories() {
        let mut buffer = Buffer::new();
        buffer.push_str("a\u{301}\u{200D}");
        let mut scratch_flags = ScratchFlags::empty();
        for info in &mut buffer.info {
            info.init_unicode_props(&mut scratch_flags);
        }
        synthesize_glyph_classes(&mut buffer);
        let infos = buffer.glyph_infos();
        assert!(infos[0].is_base_glyph());
        assert!(infos[1].is_mark());
        assert!(infos[2].is_base_glyph());
    }
}
