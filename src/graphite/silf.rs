//! Graphite `Silf` table: the rules of a Graphite font.

use log::warn;

use super::code::{CodeContext, PassType};
use super::pass::{run_passes, Pass};
use super::segment::Segment;
use crate::binary::read::{ReadBinaryDep, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::{U16Be, U32Be, U8};
use crate::error::ParseError;

/// `Silf` subtable flag: the font requests automatic collision fixing.
pub const SILF_FLAG_COLLISIONS: u8 = 0x20;

/// Parsed `Silf` table
#[derive(Debug, Clone)]
pub struct SilfTable {
    pub version: u32,
    pub subtables: Vec<SilfSubtable>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct JustificationLevel {
    pub attr_stretch: u8,
    pub attr_shrink: u8,
    pub attr_step: u8,
    pub attr_weight: u8,
    pub runto: u8,
}

impl ReadFrom for JustificationLevel {
    type ReadType = ((U8, U8, U8, U8), (U8, U8, U16Be));

    fn read_from(
        ((attr_stretch, attr_shrink, attr_step, attr_weight), (runto, _, _)): (
            (u8, u8, u8, u8),
            (u8, u8, u16),
        ),
    ) -> Self {
        JustificationLevel {
            attr_stretch,
            attr_shrink,
            attr_step,
            attr_weight,
            runto,
        }
    }
}

/// Maps a Unicode character to a pseudo glyph.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PseudoGlyph {
    pub unicode: u32,
    pub glyph_id: u16,
}

impl ReadFrom for PseudoGlyph {
    type ReadType = (U32Be, U16Be);

    fn read_from((unicode, glyph_id): (u32, u16)) -> Self {
        PseudoGlyph { unicode, glyph_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlyphClass {
    /// Glyphs in index order
    Linear(Vec<u16>),
    /// (glyph, index) pairs sorted by glyph
    Lookup(Vec<(u16, u16)>),
}

/// The replacement classes used by substitution rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassMap {
    pub classes: Vec<GlyphClass>,
}

impl ClassMap {
    pub fn num_classes(&self) -> u16 {
        self.classes.len() as u16
    }

    /// The glyph at `index` within class `class`, or 0.
    pub fn glyph(&self, class: u16, index: i32) -> u16 {
        let Ok(index) = usize::try_from(index) else {
            return 0;
        };
        match self.classes.get(usize::from(class)) {
            Some(GlyphClass::Linear(glyphs)) => glyphs.get(index).copied().unwrap_or(0),
            Some(GlyphClass::Lookup(pairs)) => pairs
                .iter()
                .find(|&&(_, i)| usize::from(i) == index)
                .map_or(0, |&(glyph, _)| glyph),
            None => 0,
        }
    }

    /// The index of `glyph` within class `class`, or -1.
    pub fn find_index(&self, class: u16, glyph: u16) -> i32 {
        match self.classes.get(usize::from(class)) {
            Some(GlyphClass::Linear(glyphs)) => glyphs
                .iter()
                .position(|&g| g == glyph)
                .map_or(-1, |i| i as i32),
            Some(GlyphClass::Lookup(pairs)) => pairs
                .binary_search_by_key(&glyph, |&(g, _)| g)
                .map_or(-1, |i| i32::from(pairs[i].1)),
            None => -1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SilfSubtable {
    pub rule_version: u32,
    pub max_glyph_id: u16,
    pub extra_ascent: i16,
    pub extra_descent: i16,
    pub num_passes: u8,
    /// Index of the first substitution pass
    pub sub_pass: u8,
    /// Index of the first positioning pass
    pub pos_pass: u8,
    /// Index of the first justification pass
    pub just_pass: u8,
    /// Index of the pass following bidi reordering, 0xFF if there is none
    pub bidi_pass: u8,
    pub flags: u8,
    pub max_pre_context: u8,
    pub max_post_context: u8,
    pub attr_pseudo: u8,
    pub attr_break_weight: u8,
    pub attr_directionality: u8,
    pub attr_mirroring: u8,
    pub attr_skip_passes: u8,
    pub justification_levels: Vec<JustificationLevel>,
    pub num_lig_comp: u16,
    pub num_user_defn: u8,
    pub max_comp_per_lig: u8,
    /// Writing direction of the subtable, bit 0 set for right-to-left
    pub dir: u8,
    pub attr_collisions: u8,
    pub critical_features: Vec<u16>,
    pub script_tags: Vec<u32>,
    pub line_break_glyph: u16,
    pub pseudo_glyphs: Vec<PseudoGlyph>,
    pub class_map: ClassMap,
    pub passes: Vec<Pass>,
}

impl SilfSubtable {
    pub fn has_collisions(&self) -> bool {
        self.flags & SILF_FLAG_COLLISIONS != 0
    }

    pub fn is_rtl(&self) -> bool {
        self.dir & 1 != 0
    }

    /// The pseudo glyph standing in for `ch`, if any.
    pub fn find_pseudo(&self, ch: u32) -> Option<u16> {
        self.pseudo_glyphs
            .binary_search_by_key(&ch, |pseudo| pseudo.unicode)
            .ok()
            .map(|i| self.pseudo_glyphs[i].glyph_id)
    }

    /// Run the passes of the subtable over `seg`: line breaking and substitution with
    /// bidi reordering, then positioning.
    pub fn run_graphite(&self, seg: &mut Segment<'_>) {
        if seg.dir & 3 == 3 && self.bidi_pass == 0xFF {
            seg.do_mirror(self.attr_mirroring);
        }
        run_passes(self, seg, 0, self.pos_pass, true);
        let num_chars = seg.char_infos.len();
        seg.associate_chars(0, num_chars);
        if self.has_collisions() {
            seg.init_collisions();
        }
        run_passes(self, seg, self.pos_pass, self.num_passes, false);
    }

    fn pass_type(&self, index: u8) -> PassType {
        if index >= self.just_pass {
            PassType::Justification
        } else if index >= self.pos_pass {
            PassType::Positioning
        } else if index >= self.sub_pass {
            PassType::Substitution
        } else {
            PassType::LineBreak
        }
    }
}

impl ReadBinaryDep for SilfTable {
    /// The number of glyph attributes and the number of features of the face
    type Args<'a> = (u16, u16);
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, args: (u16, u16)) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_u32be()?;
        ctxt.check_version(version >> 16 >= 2 && version >> 16 <= 5)?;
        if version >> 16 >= 3 {
            let _compiler_version = ctxt.read_u32be()?;
        }
        let num_sub = ctxt.read_u16be()?;
        let _reserved = ctxt.read_u16be()?;
        let offsets = ctxt.read_array::<U32Be>(usize::from(num_sub))?;

        let subtables = offsets
            .iter()
            .map(|offset| {
                let offset = usize::try_from(offset)?;
                read_subtable(scope.offset(offset), version, args)
            })
            .collect::<Result<Vec<_>, ParseError>>()?;

        Ok(SilfTable { version, subtables })
    }
}

impl SilfTable {
    /// The subtable for `script`, or the first subtable.
    pub fn subtable_for_script(&self, script: u32) -> Option<&SilfSubtable> {
        self.subtables
            .iter()
            .find(|subtable| subtable.script_tags.contains(&script))
            .or_else(|| self.subtables.first())
    }
}

fn read_subtable(
    scope: ReadScope<'_>,
    version: u32,
    (num_glyph_attrs, num_features): (u16, u16),
) -> Result<SilfSubtable, ParseError> {
    let mut ctxt = scope.ctxt();
    let rule_version = if version >> 16 >= 3 {
        let rule_version = ctxt.read_u32be()?;
        let _pass_offset = ctxt.read_u16be()?;
        let _pseudos_offset = ctxt.read_u16be()?;
        rule_version
    } else {
        0
    };
    let max_glyph_id = ctxt.read_u16be()?;
    let extra_ascent = ctxt.read_i16be()?;
    let extra_descent = ctxt.read_i16be()?;
    let num_passes = ctxt.read_u8()?;
    let sub_pass = ctxt.read_u8()?;
    let pos_pass = ctxt.read_u8()?;
    let just_pass = ctxt.read_u8()?;
    let bidi_pass = ctxt.read_u8()?;
    let flags = ctxt.read_u8()?;
    let max_pre_context = ctxt.read_u8()?;
    let max_post_context = ctxt.read_u8()?;
    let attr_pseudo = ctxt.read_u8()?;
    let attr_break_weight = ctxt.read_u8()?;
    let attr_directionality = ctxt.read_u8()?;
    let attr_mirroring = ctxt.read_u8()?;
    let attr_skip_passes = ctxt.read_u8()?;
    let num_j_levels = ctxt.read_u8()?;
    let justification_levels = ctxt
        .read_array::<JustificationLevel>(usize::from(num_j_levels))?
        .to_vec();
    let num_lig_comp = ctxt.read_u16be()?;
    let num_user_defn = ctxt.read_u8()?;
    let max_comp_per_lig = ctxt.read_u8()?;
    let dir = ctxt.read_u8()?.wrapping_sub(1);
    let attr_collisions = ctxt.read_u8()?;
    ctxt.skip(3)?;
    let num_crit_features = ctxt.read_u8()?;
    let critical_features = ctxt
        .read_array::<U16Be>(usize::from(num_crit_features))?
        .to_vec();
    ctxt.skip(1)?;
    let num_script_tags = ctxt.read_u8()?;
    let script_tags = ctxt
        .read_array::<U32Be>(usize::from(num_script_tags))?
        .to_vec();
    let line_break_glyph = ctxt.read_u16be()?;
    let pass_offsets = ctxt
        .read_array::<U32Be>(usize::from(num_passes) + 1)?
        .to_vec();

    let num_pseudo = ctxt.read_u16be()?;
    ctxt.skip(6)?;
    let mut pseudo_glyphs = ctxt
        .read_array::<PseudoGlyph>(usize::from(num_pseudo))?
        .to_vec();
    pseudo_glyphs.sort_by_key(|pseudo| pseudo.unicode);

    let class_map = read_class_map(&mut ctxt, version)?;

    ctxt.check(sub_pass <= pos_pass && pos_pass <= just_pass && just_pass <= num_passes)?;
    ctxt.check(bidi_pass == 0xFF || bidi_pass <= pos_pass)?;

    let mut subtable = SilfSubtable {
        rule_version,
        max_glyph_id,
        extra_ascent,
        extra_descent,
        num_passes,
        sub_pass,
        pos_pass,
        just_pass,
        bidi_pass,
        flags,
        max_pre_context,
        max_post_context,
        attr_pseudo,
        attr_break_weight,
        attr_directionality,
        attr_mirroring,
        attr_skip_passes,
        justification_levels,
        num_lig_comp,
        num_user_defn,
        max_comp_per_lig,
        dir,
        attr_collisions,
        critical_features,
        script_tags,
        line_break_glyph,
        pseudo_glyphs,
        class_map,
        passes: Vec::new(),
    };

    let mut passes = Vec::with_capacity(usize::from(num_passes));
    for (index, window) in pass_offsets.windows(2).enumerate() {
        let (start, end) = (usize::try_from(window[0])?, usize::try_from(window[1])?);
        let pass_data = scope.offset_length(start, end.checked_sub(start).ok_or(ParseError::BadOffset)?)?;
        let index = index as u8;
        let context = CodeContext {
            num_classes: subtable.class_map.num_classes(),
            num_glyph_attrs,
            num_features,
            num_user_attrs: num_user_defn,
            pass_type: subtable.pass_type(index),
        };
        let pass = Pass::read(scope, pass_data, start, &context, version).map_err(|err| {
            warn!("unable to read Graphite pass {}: {}", index, err);
            err
        })?;
        passes.push(pass);
    }
    subtable.passes = passes;

    Ok(subtable)
}

fn read_class_map(ctxt: &mut ReadCtxt<'_>, version: u32) -> Result<ClassMap, ParseError> {
    let scope = ctxt.scope();
    let num_class = ctxt.read_u16be()?;
    let num_linear = ctxt.read_u16be()?;
    ctxt.check(num_linear <= num_class)?;
    let count = usize::from(num_class) + 1;
    let offsets: Vec<usize> = if version >> 16 >= 4 {
        ctxt.read_array::<U32Be>(count)?
            .iter()
            .map(|offset| offset as usize)
            .collect()
    } else {
        ctxt.read_array::<U16Be>(count)?
            .iter()
            .map(usize::from)
            .collect()
    };

    let mut classes = Vec::with_capacity(usize::from(num_class));
    for (index, window) in offsets.windows(2).enumerate() {
        let (start, end) = (window[0], window[1]);
        if index < usize::from(num_linear) {
            let len = end.checked_sub(start).ok_or(ParseError::BadOffset)? / 2;
            let glyphs = scope.offset(start).ctxt().read_array::<U16Be>(len)?.to_vec();
            classes.push(GlyphClass::Linear(glyphs));
        } else {
            let mut lookup = scope.offset(start).ctxt();
            let num_ids = lookup.read_u16be()?;
            lookup.skip(6)?;
            let pairs = lookup
                .read_array::<(U16Be, U16Be)>(usize::from(num_ids))?
                .to_vec();
            classes.push(GlyphClass::Lookup(pairs));
        }
    }

    Ok(ClassMap { classes })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn class_lookup() {
        let class_map = ClassMap {
            classes: vec![
                GlyphClass::Linear(vec![10, 11, 12]),
                GlyphClass::Lookup(vec![(11, 1), (20, 0)]),
            ],
        };
        assert_eq!(class_map.glyph(0, 2), 12);
        assert_eq!(class_map.glyph(0, 3), 0);
        assert_eq!(class_map.glyph(1, 0), 20);
        assert_eq!(class_map.find_index(0, 11), 1);
        assert_eq!(class_map.find_index(1, 11), 1);
        assert_eq!(class_map.find_index(1, 12), -1);
        assert_eq!(class_map.find_index(5, 12), -1);
    }

    #[test]
    fn read_class_map_v2() {
        let data = [
            0, 2, 0, 1, // numClass, numLinear
            0, 10, 0, 14, 0, 26, // offsets
            0, 3, 0, 4, // linear class
            0, 1, 0, 0, 0, 0, 0, 0, 0, 7, 0, 0, // lookup class
        ];
        let class_map = read_class_map(&mut ReadScope::new(&data).ctxt(), 0x0002_0000).unwrap();
        assert_eq!(
            class_map.classes,
            vec![GlyphClass::Linear(vec![3, 4]), GlyphClass::Lookup(vec![(7, 0)])]
        );
    }
}
