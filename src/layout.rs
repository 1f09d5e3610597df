//! `GDEF`, `GSUB` and `GPOS` table parsing.
//!
//! The tables are decoded once, when a face is built, into owned structures. Lookups are
//! kept in lookup list order so that lookup indices from features and from contextual
//! subtables can be used directly. Extension subtables are unwrapped while reading.

use bitflags::bitflags;
use log::warn;

use crate::binary::read::{
    CheckIndex, ReadArray, ReadBinary, ReadBinaryDep, ReadCtxt, ReadFixedSizeDep, ReadFrom,
    ReadScope,
};
use crate::binary::U16Be;
use crate::buffer::GlyphProps;
use crate::digest::SetDigest;
use crate::error::ParseError;
use crate::tag;

/// Marker type for the glyph substitution table.
pub enum GSUB {}
/// Marker type for the glyph positioning table.
pub enum GPOS {}

pub const GLYPH_CLASS_BASE: u16 = 1;
pub const GLYPH_CLASS_LIGATURE: u16 = 2;
pub const GLYPH_CLASS_MARK: u16 = 3;
pub const GLYPH_CLASS_COMPONENT: u16 = 4;

bitflags! {
    /// Lookup qualifiers.
    ///
    /// The top byte holds the mark attachment class to filter on.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct LookupFlag: u16 {
        const RIGHT_TO_LEFT = 0x0001;
        const IGNORE_BASE_GLYPHS = 0x0002;
        const IGNORE_LIGATURES = 0x0004;
        const IGNORE_MARKS = 0x0008;
        const IGNORE_FLAGS = 0x000E;
        const USE_MARK_FILTERING_SET = 0x0010;
        const MARK_ATTACHMENT_TYPE = 0xFF00;
    }
}

impl LookupFlag {
    pub fn mark_attachment_type(self) -> u16 {
        (self & LookupFlag::MARK_ATTACHMENT_TYPE).bits() >> 8
    }
}

/// Glyph definition table.
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/gdef>
pub struct GDEFTable {
    pub opt_glyph_classdef: Option<ClassDef>,
    pub opt_mark_attach_classdef: Option<ClassDef>,
    /// Present from version 1.2.
    pub mark_glyph_sets: Vec<Coverage>,
}

impl ReadBinary for GDEFTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let table = ctxt.scope();

        let major_version = ctxt.read_u16be()?;
        ctxt.check_version(major_version == 1)?;
        let minor_version = ctxt.read_u16be()?;
        let glyph_classdef_offset = usize::from(ctxt.read_u16be()?);
        let _attach_list_offset = ctxt.read_u16be()?;
        let _lig_caret_list_offset = ctxt.read_u16be()?;
        // MarkAttachClassDef was added without a version bump, so it is always read.
        let mark_attach_classdef_offset = usize::from(ctxt.read_u16be()?);
        let mark_glyph_sets_offset = if minor_version >= 2 {
            usize::from(ctxt.read_u16be()?)
        } else {
            0
        };

        let header_size = 6 * 2;
        let read_opt_classdef = |offset: usize| -> Result<Option<ClassDef>, ParseError> {
            if offset < header_size {
                Ok(None)
            } else {
                table.offset(offset).read::<ClassDef>().map(Some)
            }
        };
        let opt_glyph_classdef = read_opt_classdef(glyph_classdef_offset)?;
        let opt_mark_attach_classdef = read_opt_classdef(mark_attach_classdef_offset)?;

        let mark_glyph_sets = if mark_glyph_sets_offset != 0 {
            let scope = table.offset(mark_glyph_sets_offset);
            let mut ctxt = scope.ctxt();
            let format = ctxt.read_u16be()?;
            ctxt.check_version(format == 1)?;
            let count = usize::from(ctxt.read_u16be()?);
            let mut sets = Vec::with_capacity(count);
            for _ in 0..count {
                let offset = ctxt.read_u32be()?;
                sets.push(scope.offset(offset as usize).read::<Coverage>()?);
            }
            sets
        } else {
            Vec::new()
        };

        Ok(GDEFTable {
            opt_glyph_classdef,
            opt_mark_attach_classdef,
            mark_glyph_sets,
        })
    }
}

impl GDEFTable {
    pub fn glyph_class(&self, glyph: u16) -> u16 {
        self.opt_glyph_classdef
            .as_ref()
            .map_or(0, |classdef| classdef.glyph_class_value(glyph))
    }

    pub fn mark_attach_class(&self, glyph: u16) -> u16 {
        self.opt_mark_attach_classdef
            .as_ref()
            .map_or(0, |classdef| classdef.glyph_class_value(glyph))
    }

    pub fn has_glyph_classes(&self) -> bool {
        self.opt_glyph_classdef.is_some()
    }

    /// The glyph class of `glyph` as glyph properties. Marks carry their attachment class
    /// in the top byte.
    pub fn glyph_props(&self, glyph: u16) -> GlyphProps {
        match self.glyph_class(glyph) {
            GLYPH_CLASS_BASE => GlyphProps::BASE_GLYPH,
            GLYPH_CLASS_LIGATURE => GlyphProps::LIGATURE,
            GLYPH_CLASS_MARK => {
                let class = self.mark_attach_class(glyph);
                GlyphProps::MARK | GlyphProps::from_bits_retain(class << 8)
            }
            _ => GlyphProps::empty(),
        }
    }

    pub fn is_mark_in_set(&self, glyph: u16, set_index: u16) -> bool {
        self.mark_glyph_sets
            .get(usize::from(set_index))
            .is_some_and(|set| set.glyph_coverage_value(glyph).is_some())
    }
}

/// Behaviour shared by the substitution and positioning tables.
pub trait LayoutTableType: Sized {
    type Subtable;

    /// The lookup type of extension lookups.
    const EXTENSION_LOOKUP_TYPE: u16;

    fn read_subtable(lookup_type: u16, scope: ReadScope<'_>) -> Result<Self::Subtable, ParseError>;

    /// Add the glyphs a subtable can start matching at to `digest`.
    fn collect_coverage(subtable: &Self::Subtable, digest: &mut SetDigest);
}

/// `GSUB` and `GPOS` share this top-level structure.
pub struct LayoutTable<T: LayoutTableType> {
    pub opt_script_list: Option<ScriptList>,
    pub opt_feature_list: Option<FeatureList>,
    pub lookups: Vec<Lookup<T>>,
}

pub struct ScriptList {
    script_records: Vec<ScriptRecord>,
}

pub struct ScriptRecord {
    pub script_tag: u32,
    script_table: ScriptTable,
}

pub struct ScriptTable {
    opt_default_langsys: Option<LangSys>,
    langsys_records: Vec<LangSysRecord>,
}

pub struct LangSysRecord {
    pub langsys_tag: u32,
    langsys_table: LangSys,
}

pub struct LangSys {
    required_feature_index: u16,
    feature_indices: Vec<u16>,
}

pub struct FeatureList {
    feature_records: Vec<FeatureRecord>,
}

pub struct FeatureRecord {
    pub feature_tag: u32,
    pub lookup_indices: Vec<u16>,
}

/// A lookup and the subtables it is made of.
pub struct Lookup<T: LayoutTableType> {
    /// The lookup type, with extension lookups resolved to the type they wrap.
    pub lookup_type: u16,
    pub lookup_flag: LookupFlag,
    pub mark_filtering_set: Option<u16>,
    pub subtables: Vec<T::Subtable>,
    /// Union of the subtable coverages.
    pub digest: SetDigest,
}

impl<T: LayoutTableType> ReadBinary for LayoutTable<T> {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let table = ctxt.scope();

        let major_version = ctxt.read_u16be()?;
        let _minor_version = ctxt.read_u16be()?;
        let script_list_offset = usize::from(ctxt.read_u16be()?);
        let feature_list_offset = usize::from(ctxt.read_u16be()?);
        let lookup_list_offset = usize::from(ctxt.read_u16be()?);
        // Version 1.1 adds FeatureVariations, which are not applied.
        ctxt.check_version(major_version == 1)?;

        let table_len = table.data().len();
        let check_offset = |offset: usize| -> Result<Option<ReadScope<'a>>, ParseError> {
            if offset >= table_len {
                Err(ParseError::BadOffset)
            } else if offset == 0 {
                Ok(None)
            } else {
                Ok(Some(table.offset(offset)))
            }
        };

        let opt_script_list = check_offset(script_list_offset)?
            .map(|scope| scope.read::<ScriptList>())
            .transpose()?;
        let opt_feature_list = check_offset(feature_list_offset)?
            .map(|scope| scope.read::<FeatureList>())
            .transpose()?;
        let lookups = match check_offset(lookup_list_offset)? {
            Some(scope) => read_lookup_list::<T>(scope)?,
            None => Vec::new(),
        };

        Ok(LayoutTable {
            opt_script_list,
            opt_feature_list,
            lookups,
        })
    }
}

fn read_lookup_list<T: LayoutTableType>(scope: ReadScope<'_>) -> Result<Vec<Lookup<T>>, ParseError> {
    let mut ctxt = scope.ctxt();
    let lookup_count = usize::from(ctxt.read_u16be()?);
    let lookup_offsets = ctxt.read_array::<U16Be>(lookup_count)?;
    let mut lookups = Vec::with_capacity(lookup_count);
    for (index, offset) in lookup_offsets.iter().enumerate() {
        // An unreadable lookup is kept as an empty one so later lookup indices stay valid.
        let lookup = scope
            .offset(usize::from(offset))
            .read::<Lookup<T>>()
            .unwrap_or_else(|err| {
                warn!("skipping invalid lookup {}: {}", index, err);
                Lookup::empty()
            });
        lookups.push(lookup);
    }
    Ok(lookups)
}

impl<T: LayoutTableType> ReadBinary for Lookup<T> {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let lookup_type = ctxt.read_u16be()?;
        let lookup_flag = LookupFlag::from_bits_retain(ctxt.read_u16be()?);
        let subtable_count = usize::from(ctxt.read_u16be()?);
        let subtable_offsets = ctxt.read_array::<U16Be>(subtable_count)?;
        let mark_filtering_set = if lookup_flag.contains(LookupFlag::USE_MARK_FILTERING_SET) {
            Some(ctxt.read_u16be()?)
        } else {
            None
        };

        let mut lookup = Lookup {
            lookup_type,
            lookup_flag,
            mark_filtering_set,
            subtables: Vec::with_capacity(subtable_count),
            digest: SetDigest::new(),
        };
        for subtable_offset in &subtable_offsets {
            let subtable_scope = scope.offset(usize::from(subtable_offset));
            let result = if lookup_type == T::EXTENSION_LOOKUP_TYPE {
                read_extension::<T>(subtable_scope).and_then(|(extension_type, scope)| {
                    // All subtables of an extension lookup must wrap the same type.
                    if lookup.subtables.is_empty() {
                        lookup.lookup_type = extension_type;
                    } else if extension_type != lookup.lookup_type {
                        return Err(ParseError::BadValue);
                    }
                    T::read_subtable(extension_type, scope)
                })
            } else {
                T::read_subtable(lookup_type, subtable_scope)
            };
            match result {
                Ok(subtable) => {
                    T::collect_coverage(&subtable, &mut lookup.digest);
                    lookup.subtables.push(subtable);
                }
                Err(err) => warn!("skipping invalid subtable: {}", err),
            }
        }
        Ok(lookup)
    }
}

fn read_extension<T: LayoutTableType>(scope: ReadScope<'_>) -> Result<(u16, ReadScope<'_>), ParseError> {
    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u16be()?;
    ctxt.check_version(format == 1)?;
    let extension_lookup_type = ctxt.read_u16be()?;
    ctxt.check(extension_lookup_type != T::EXTENSION_LOOKUP_TYPE)?;
    let extension_offset = ctxt.read_u32be()?;
    Ok((extension_lookup_type, scope.offset(extension_offset as usize)))
}

impl<T: LayoutTableType> Lookup<T> {
    pub fn empty() -> Lookup<T> {
        Lookup {
            lookup_type: 0,
            lookup_flag: LookupFlag::empty(),
            mark_filtering_set: None,
            subtables: Vec::new(),
            digest: SetDigest::new(),
        }
    }

    /// Build a lookup from subtables constructed in memory.
    pub fn new(lookup_type: u16, lookup_flag: LookupFlag, subtables: Vec<T::Subtable>) -> Lookup<T> {
        let mut digest = SetDigest::new();
        for subtable in &subtables {
            T::collect_coverage(subtable, &mut digest);
        }
        Lookup {
            lookup_type,
            lookup_flag,
            mark_filtering_set: None,
            subtables,
            digest,
        }
    }
}

impl ReadBinary for ScriptList {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let script_count = usize::from(ctxt.read_u16be()?);
        let script_records = ctxt
            .read_array_dep::<ScriptRecord>(script_count, scope)?
            .read_to_vec()?;
        Ok(ScriptList { script_records })
    }
}

impl ReadBinaryDep for ScriptRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = ScriptRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let script_tag = ctxt.read_u32be()?;
        let script_offset = usize::from(ctxt.read_u16be()?);
        let script_table = scope.offset(script_offset).read::<ScriptTable>()?;
        Ok(ScriptRecord {
            script_tag,
            script_table,
        })
    }
}

impl ReadFixedSizeDep for ScriptRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        4 + 2
    }
}

impl ReadBinary for ScriptTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let default_langsys_offset = usize::from(ctxt.read_u16be()?);
        let opt_default_langsys = if default_langsys_offset != 0 {
            Some(scope.offset(default_langsys_offset).read::<LangSys>()?)
        } else {
            None
        };
        let langsys_count = usize::from(ctxt.read_u16be()?);
        let langsys_records = ctxt
            .read_array_dep::<LangSysRecord>(langsys_count, scope)?
            .read_to_vec()?;
        Ok(ScriptTable {
            opt_default_langsys,
            langsys_records,
        })
    }
}

impl ReadBinaryDep for LangSysRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = LangSysRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let langsys_tag = ctxt.read_u32be()?;
        let langsys_offset = usize::from(ctxt.read_u16be()?);
        let langsys_table = scope.offset(langsys_offset).read::<LangSys>()?;
        Ok(LangSysRecord {
            langsys_tag,
            langsys_table,
        })
    }
}

impl ReadFixedSizeDep for LangSysRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        4 + 2
    }
}

impl ReadBinary for LangSys {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let _lookup_order = ctxt.read_u16be()?;
        let required_feature_index = ctxt.read_u16be()?;
        let feature_index_count = usize::from(ctxt.read_u16be()?);
        let feature_indices = ctxt.read_array::<U16Be>(feature_index_count)?.to_vec();
        Ok(LangSys {
            required_feature_index,
            feature_indices,
        })
    }
}

impl ReadBinary for FeatureList {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let feature_count = usize::from(ctxt.read_u16be()?);
        let feature_records = ctxt
            .read_array_dep::<FeatureRecord>(feature_count, scope)?
            .read_to_vec()?;
        Ok(FeatureList { feature_records })
    }
}

impl ReadBinaryDep for FeatureRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = FeatureRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let feature_tag = ctxt.read_u32be()?;
        let feature_offset = usize::from(ctxt.read_u16be()?);
        let mut feature_ctxt = scope.offset(feature_offset).ctxt();
        let _feature_params = feature_ctxt.read_u16be()?;
        let lookup_index_count = usize::from(feature_ctxt.read_u16be()?);
        let lookup_indices = feature_ctxt
            .read_array::<U16Be>(lookup_index_count)?
            .to_vec();
        Ok(FeatureRecord {
            feature_tag,
            lookup_indices,
        })
    }
}

impl ReadFixedSizeDep for FeatureRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        4 + 2
    }
}

impl<T: LayoutTableType> LayoutTable<T> {
    pub fn find_script(&self, script_tag: u32) -> Option<&ScriptTable> {
        self.opt_script_list
            .as_ref()
            .and_then(|script_list| script_list.find_script(script_tag))
    }

    /// The first of `script_tags` the table has, falling back to `DFLT`, `dflt` and `latn`.
    ///
    /// Returns the chosen tag with the script table.
    pub fn select_script(&self, script_tags: &[u32]) -> Option<(u32, &ScriptTable)> {
        let script_list = self.opt_script_list.as_ref()?;
        script_tags
            .iter()
            .chain(&[tag::DFLT, tag!(b"dflt"), tag::LATN])
            .find_map(|&script_tag| {
                script_list
                    .find_script(script_tag)
                    .map(|script_table| (script_tag, script_table))
            })
    }

    pub fn feature_record(&self, feature_index: u16) -> Result<&FeatureRecord, ParseError> {
        match self.opt_feature_list {
            Some(ref feature_list) => feature_list.nth_feature_record(usize::from(feature_index)),
            None => Err(ParseError::BadIndex),
        }
    }

    /// The index of the feature tagged `feature_tag` in `langsys`.
    pub fn find_langsys_feature(&self, langsys: &LangSys, feature_tag: u32) -> Option<u16> {
        langsys.feature_indices.iter().copied().find(|&feature_index| {
            self.feature_record(feature_index)
                .is_ok_and(|record| record.feature_tag == feature_tag)
        })
    }

    /// The index of the first feature tagged `feature_tag` in any script or language.
    pub fn find_feature_anywhere(&self, feature_tag: u32) -> Option<u16> {
        let script_list = self.opt_script_list.as_ref()?;
        script_list
            .script_records
            .iter()
            .flat_map(|record| record.script_table.langsys_iter())
            .find_map(|langsys| self.find_langsys_feature(langsys, feature_tag))
    }

    pub fn lookup(&self, lookup_index: usize) -> Option<&Lookup<T>> {
        self.lookups.get(lookup_index)
    }
}

impl ScriptList {
    pub fn script_records(&self) -> &[ScriptRecord] {
        &self.script_records
    }

    pub fn find_script(&self, script_tag: u32) -> Option<&ScriptTable> {
        self.script_records
            .iter()
            .find(|record| record.script_tag == script_tag)
            .map(|record| &record.script_table)
    }
}

impl ScriptRecord {
    pub fn script_table(&self) -> &ScriptTable {
        &self.script_table
    }
}

impl ScriptTable {
    pub fn default_langsys_record(&self) -> Option<&LangSys> {
        self.opt_default_langsys.as_ref()
    }

    pub fn langsys_records(&self) -> &[LangSysRecord] {
        &self.langsys_records
    }

    pub fn find_langsys(&self, langsys_tag: u32) -> Option<&LangSys> {
        self.langsys_records
            .iter()
            .find(|record| record.langsys_tag == langsys_tag)
            .map(|record| &record.langsys_table)
    }

    pub fn find_langsys_or_default(&self, opt_lang_tag: Option<u32>) -> Option<&LangSys> {
        // Some fonts register the default language system as `dflt`.
        opt_lang_tag
            .and_then(|lang_tag| self.find_langsys(lang_tag))
            .or_else(|| self.find_langsys(tag!(b"dflt")))
            .or_else(|| self.default_langsys_record())
    }

    fn langsys_iter(&self) -> impl Iterator<Item = &LangSys> {
        self.opt_default_langsys
            .iter()
            .chain(self.langsys_records.iter().map(|record| &record.langsys_table))
    }
}

impl LangSysRecord {
    pub fn langsys_table(&self) -> &LangSys {
        &self.langsys_table
    }
}

impl LangSys {
    pub fn required_feature_index(&self) -> Option<u16> {
        (self.required_feature_index != 0xFFFF).then_some(self.required_feature_index)
    }

    pub fn feature_indices(&self) -> &[u16] {
        &self.feature_indices
    }
}

impl FeatureList {
    pub fn nth_feature_record(&self, index: usize) -> Result<&FeatureRecord, ParseError> {
        self.feature_records.check_index(index)?;
        Ok(&self.feature_records[index])
    }
}

impl LayoutTableType for GSUB {
    type Subtable = SubstSubtable;

    const EXTENSION_LOOKUP_TYPE: u16 = 7;

    fn read_subtable(lookup_type: u16, scope: ReadScope<'_>) -> Result<SubstSubtable, ParseError> {
        match lookup_type {
            1 => scope.read::<SingleSubst>().map(SubstSubtable::Single),
            2 => scope.read::<MultipleSubst>().map(SubstSubtable::Multiple),
            3 => scope.read::<AlternateSubst>().map(SubstSubtable::Alternate),
            4 => scope.read::<LigatureSubst>().map(SubstSubtable::Ligature),
            5 => scope.read_dep::<ContextLookup>(false).map(SubstSubtable::Context),
            6 => scope.read_dep::<ContextLookup>(true).map(SubstSubtable::ChainContext),
            8 => scope
                .read::<ReverseChainSingleSubst>()
                .map(SubstSubtable::ReverseChainSingle),
            _ => Err(ParseError::BadVersion),
        }
    }

    fn collect_coverage(subtable: &SubstSubtable, digest: &mut SetDigest) {
        match subtable {
            SubstSubtable::Single(subst) => subst.coverage().collect(digest),
            SubstSubtable::Multiple(subst) => subst.coverage.collect(digest),
            SubstSubtable::Alternate(subst) => subst.coverage.collect(digest),
            SubstSubtable::Ligature(subst) => subst.coverage.collect(digest),
            SubstSubtable::Context(lookup) | SubstSubtable::ChainContext(lookup) => {
                lookup.collect_coverage(digest)
            }
            SubstSubtable::ReverseChainSingle(subst) => subst.coverage.collect(digest),
        }
    }
}

impl LayoutTableType for GPOS {
    type Subtable = PosSubtable;

    const EXTENSION_LOOKUP_TYPE: u16 = 9;

    fn read_subtable(lookup_type: u16, scope: ReadScope<'_>) -> Result<PosSubtable, ParseError> {
        match lookup_type {
            1 => scope.read::<SinglePos>().map(PosSubtable::Single),
            2 => scope.read::<PairPos>().map(PosSubtable::Pair),
            3 => scope.read::<CursivePos>().map(PosSubtable::Cursive),
            4 => scope.read::<MarkBasePos>().map(PosSubtable::MarkBase),
            5 => scope.read::<MarkLigPos>().map(PosSubtable::MarkLig),
            6 => scope.read::<MarkBasePos>().map(PosSubtable::MarkMark),
            7 => scope.read_dep::<ContextLookup>(false).map(PosSubtable::Context),
            8 => scope.read_dep::<ContextLookup>(true).map(PosSubtable::ChainContext),
            _ => Err(ParseError::BadVersion),
        }
    }

    fn collect_coverage(subtable: &PosSubtable, digest: &mut SetDigest) {
        match subtable {
            PosSubtable::Single(pos) => pos.coverage().collect(digest),
            PosSubtable::Pair(pos) => pos.coverage().collect(digest),
            PosSubtable::Cursive(pos) => pos.coverage.collect(digest),
            PosSubtable::MarkBase(pos) | PosSubtable::MarkMark(pos) => {
                pos.mark_coverage.collect(digest)
            }
            PosSubtable::MarkLig(pos) => pos.mark_coverage.collect(digest),
            PosSubtable::Context(lookup) | PosSubtable::ChainContext(lookup) => {
                lookup.collect_coverage(digest)
            }
        }
    }
}

pub enum SubstSubtable {
    Single(SingleSubst),
    Multiple(MultipleSubst),
    Alternate(AlternateSubst),
    Ligature(LigatureSubst),
    Context(ContextLookup),
    ChainContext(ContextLookup),
    ReverseChainSingle(ReverseChainSingleSubst),
}

pub enum PosSubtable {
    Single(SinglePos),
    Pair(PairPos),
    Cursive(CursivePos),
    MarkBase(MarkBasePos),
    MarkLig(MarkLigPos),
    MarkMark(MarkBasePos),
    Context(ContextLookup),
    ChainContext(ContextLookup),
}

pub enum SingleSubst {
    Format1 {
        coverage: Coverage,
        delta_glyph_index: i16,
    },
    Format2 {
        coverage: Coverage,
        substitute_glyph_array: Vec<u16>,
    },
}

impl ReadBinary for SingleSubst {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let subtable = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(&subtable, ctxt.read_u16be()?)?;
                let delta_glyph_index = ctxt.read_i16be()?;
                Ok(SingleSubst::Format1 {
                    coverage,
                    delta_glyph_index,
                })
            }
            2 => {
                let coverage = read_coverage(&subtable, ctxt.read_u16be()?)?;
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let substitute_glyph_array = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
                Ok(SingleSubst::Format2 {
                    coverage,
                    substitute_glyph_array,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl SingleSubst {
    /// A format 2 subtable from `(glyph, substitute)` pairs.
    pub fn from_pairs(pairs: Vec<(u16, u16)>) -> SingleSubst {
        let (coverage, substitute_glyph_array) = by_coverage(pairs);
        SingleSubst::Format2 {
            coverage,
            substitute_glyph_array,
        }
    }

    fn coverage(&self) -> &Coverage {
        match self {
            SingleSubst::Format1 { coverage, .. } | SingleSubst::Format2 { coverage, .. } => {
                coverage
            }
        }
    }

    pub fn apply_glyph(&self, glyph: u16) -> Option<u16> {
        match *self {
            SingleSubst::Format1 {
                ref coverage,
                delta_glyph_index,
            } => {
                coverage.glyph_coverage_value(glyph)?;
                // Addition of deltaGlyphID is modulo 65536.
                Some(glyph.wrapping_add(delta_glyph_index as u16))
            }
            SingleSubst::Format2 {
                ref coverage,
                ref substitute_glyph_array,
            } => {
                let coverage_index = coverage.glyph_coverage_value(glyph)?;
                substitute_glyph_array
                    .get(usize::from(coverage_index))
                    .copied()
            }
        }
    }
}

pub struct MultipleSubst {
    coverage: Coverage,
    sequences: Vec<Vec<u16>>,
}

impl ReadBinary for MultipleSubst {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(&scope, ctxt.read_u16be()?)?;
                let sequence_count = usize::from(ctxt.read_u16be()?);
                let sequence_offsets = ctxt.read_array::<U16Be>(sequence_count)?;
                let sequences = read_objects::<GlyphSequence>(&scope, sequence_offsets)?;
                Ok(MultipleSubst {
                    coverage,
                    sequences,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl MultipleSubst {
    /// Build a multiple substitution from `(glyph, sequence)` pairs.
    pub fn from_sequences(sequences: Vec<(u16, Vec<u16>)>) -> MultipleSubst {
        let (coverage, sequences) = by_coverage(sequences);
        MultipleSubst {
            coverage,
            sequences,
        }
    }

    pub fn apply_glyph(&self, glyph: u16) -> Option<&[u16]> {
        let coverage_index = self.coverage.glyph_coverage_value(glyph)?;
        self.sequences
            .get(usize::from(coverage_index))
            .map(Vec::as_slice)
    }
}

/// A counted array of glyph ids: a multiple substitution sequence or an alternate set.
enum GlyphSequence {}

impl ReadBinary for GlyphSequence {
    type HostType<'a> = Vec<u16>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Vec<u16>, ParseError> {
        // An empty sequence deletes the glyph. OpenType forbids it but fonts rely on it.
        let glyph_count = usize::from(ctxt.read_u16be()?);
        Ok(ctxt.read_array::<U16Be>(glyph_count)?.to_vec())
    }
}

pub struct AlternateSubst {
    coverage: Coverage,
    alternate_sets: Vec<Vec<u16>>,
}

impl ReadBinary for AlternateSubst {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(&scope, ctxt.read_u16be()?)?;
                let alternate_set_count = usize::from(ctxt.read_u16be()?);
                let alternate_set_offsets = ctxt.read_array::<U16Be>(alternate_set_count)?;
                let alternate_sets = read_objects::<GlyphSequence>(&scope, alternate_set_offsets)?;
                Ok(AlternateSubst {
                    coverage,
                    alternate_sets,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl AlternateSubst {
    pub fn from_sets(sets: Vec<(u16, Vec<u16>)>) -> AlternateSubst {
        let (coverage, alternate_sets) = by_coverage(sets);
        AlternateSubst {
            coverage,
            alternate_sets,
        }
    }

    pub fn apply_glyph(&self, glyph: u16) -> Option<&[u16]> {
        let coverage_index = self.coverage.glyph_coverage_value(glyph)?;
        self.alternate_sets
            .get(usize::from(coverage_index))
            .map(Vec::as_slice)
    }
}

pub struct LigatureSubst {
    coverage: Coverage,
    ligature_sets: Vec<Vec<Ligature>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ligature {
    pub ligature_glyph: u16,
    /// The components after the first, which is the covered glyph.
    pub component_glyphs: Vec<u16>,
}

impl ReadBinary for LigatureSubst {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(&scope, ctxt.read_u16be()?)?;
                let ligature_set_count = usize::from(ctxt.read_u16be()?);
                let ligature_set_offsets = ctxt.read_array::<U16Be>(ligature_set_count)?;
                let ligature_sets = read_objects::<LigatureSet>(&scope, ligature_set_offsets)?;
                Ok(LigatureSubst {
                    coverage,
                    ligature_sets,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl LigatureSubst {
    /// Build a ligature substitution from `(first component, ligatures)` pairs.
    pub fn from_sets(mut sets: Vec<(u16, Vec<Ligature>)>) -> LigatureSubst {
        sets.sort_by_key(|&(first, _)| first);
        let coverage = Coverage::Format1 {
            glyph_array: sets.iter().map(|&(first, _)| first).collect(),
        };
        let ligature_sets = sets.into_iter().map(|(_, ligatures)| ligatures).collect();
        LigatureSubst {
            coverage,
            ligature_sets,
        }
    }

    pub fn apply_glyph(&self, glyph: u16) -> Option<&[Ligature]> {
        let coverage_index = self.coverage.glyph_coverage_value(glyph)?;
        self.ligature_sets
            .get(usize::from(coverage_index))
            .map(Vec::as_slice)
    }
}

enum LigatureSet {}

impl ReadBinary for LigatureSet {
    type HostType<'a> = Vec<Ligature>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Vec<Ligature>, ParseError> {
        let scope = ctxt.scope();
        let ligature_count = usize::from(ctxt.read_u16be()?);
        let ligature_offsets = ctxt.read_array::<U16Be>(ligature_count)?;
        read_objects::<Ligature>(&scope, ligature_offsets)
    }
}

impl ReadBinary for Ligature {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let ligature_glyph = ctxt.read_u16be()?;
        let component_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(component_count > 0)?;
        let component_glyphs = ctxt.read_array::<U16Be>(component_count - 1)?.to_vec();
        Ok(Ligature {
            ligature_glyph,
            component_glyphs,
        })
    }
}

/// GSUB lookup type 8.
pub struct ReverseChainSingleSubst {
    coverage: Coverage,
    pub backtrack_coverages: Vec<Coverage>,
    pub lookahead_coverages: Vec<Coverage>,
    substitute_glyphs: Vec<u16>,
}

impl ReadBinary for ReverseChainSingleSubst {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(&scope, ctxt.read_u16be()?)?;
                let backtrack_count = usize::from(ctxt.read_u16be()?);
                let backtrack_coverages =
                    read_coverages(&scope, ctxt.read_array::<U16Be>(backtrack_count)?)?;
                let lookahead_count = usize::from(ctxt.read_u16be()?);
                let lookahead_coverages =
                    read_coverages(&scope, ctxt.read_array::<U16Be>(lookahead_count)?)?;
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let substitute_glyphs = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
                ctxt.check(coverage.glyph_count() == glyph_count)?;
                Ok(ReverseChainSingleSubst {
                    coverage,
                    backtrack_coverages,
                    lookahead_coverages,
                    substitute_glyphs,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReverseChainSingleSubst {
    pub fn new(
        substitutions: Vec<(u16, u16)>,
        backtrack_coverages: Vec<Coverage>,
        lookahead_coverages: Vec<Coverage>,
    ) -> ReverseChainSingleSubst {
        let (coverage, substitute_glyphs) = by_coverage(substitutions);
        ReverseChainSingleSubst {
            coverage,
            backtrack_coverages,
            lookahead_coverages,
            substitute_glyphs,
        }
    }

    pub fn substitute(&self, glyph: u16) -> Option<u16> {
        let coverage_index = self.coverage.glyph_coverage_value(glyph)?;
        self.substitute_glyphs
            .get(usize::from(coverage_index))
            .copied()
    }
}

/// A lookup to apply at a position of a matched context.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SequenceLookup {
    pub sequence_index: u16,
    pub lookup_index: u16,
}

impl ReadFrom for SequenceLookup {
    type ReadType = (U16Be, U16Be);

    fn read_from((sequence_index, lookup_index): (u16, u16)) -> Self {
        SequenceLookup {
            sequence_index,
            lookup_index,
        }
    }
}

/// A rule of a glyph or class based (chained) context subtable.
///
/// The values are glyph ids or class values depending on the subtable format. The
/// backtrack sequence is stored in reverse logical order, as in the font.
pub struct ContextRule {
    pub backtrack: Vec<u16>,
    /// The input sequence after the first glyph.
    pub input: Vec<u16>,
    pub lookahead: Vec<u16>,
    pub lookup_records: Vec<SequenceLookup>,
}

/// Context and chained context subtables, of GSUB and GPOS alike.
///
/// Plain context subtables are read as chained ones with no backtrack and lookahead.
pub enum ContextLookup {
    Glyphs {
        coverage: Coverage,
        rule_sets: Vec<Vec<ContextRule>>,
    },
    Classes {
        coverage: Coverage,
        backtrack_classdef: ClassDef,
        input_classdef: ClassDef,
        lookahead_classdef: ClassDef,
        rule_sets: Vec<Vec<ContextRule>>,
    },
    Coverages {
        backtrack_coverages: Vec<Coverage>,
        input_coverages: Vec<Coverage>,
        lookahead_coverages: Vec<Coverage>,
        lookup_records: Vec<SequenceLookup>,
    },
}

impl ReadBinaryDep for ContextLookup {
    type Args<'a> = bool;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, chained: bool) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(&scope, ctxt.read_u16be()?)?;
                let rule_set_count = usize::from(ctxt.read_u16be()?);
                let rule_set_offsets = ctxt.read_array::<U16Be>(rule_set_count)?;
                let rule_sets = read_rule_sets(&scope, rule_set_offsets, chained)?;
                Ok(ContextLookup::Glyphs {
                    coverage,
                    rule_sets,
                })
            }
            2 => {
                let coverage = read_coverage(&scope, ctxt.read_u16be()?)?;
                let (backtrack_classdef, input_classdef, lookahead_classdef) = if chained {
                    let backtrack = read_classdef(&scope, ctxt.read_u16be()?)?;
                    let input = read_classdef(&scope, ctxt.read_u16be()?)?;
                    let lookahead = read_classdef(&scope, ctxt.read_u16be()?)?;
                    (backtrack, input, lookahead)
                } else {
                    let input = read_classdef(&scope, ctxt.read_u16be()?)?;
                    (ClassDef::empty(), input, ClassDef::empty())
                };
                let rule_set_count = usize::from(ctxt.read_u16be()?);
                let rule_set_offsets = ctxt.read_array::<U16Be>(rule_set_count)?;
                let rule_sets = read_rule_sets(&scope, rule_set_offsets, chained)?;
                Ok(ContextLookup::Classes {
                    coverage,
                    backtrack_classdef,
                    input_classdef,
                    lookahead_classdef,
                    rule_sets,
                })
            }
            3 if chained => {
                let backtrack_count = usize::from(ctxt.read_u16be()?);
                let backtrack_coverages =
                    read_coverages(&scope, ctxt.read_array::<U16Be>(backtrack_count)?)?;
                let input_count = usize::from(ctxt.read_u16be()?);
                ctxt.check(input_count > 0)?;
                let input_coverages =
                    read_coverages(&scope, ctxt.read_array::<U16Be>(input_count)?)?;
                let lookahead_count = usize::from(ctxt.read_u16be()?);
                let lookahead_coverages =
                    read_coverages(&scope, ctxt.read_array::<U16Be>(lookahead_count)?)?;
                let lookup_count = usize::from(ctxt.read_u16be()?);
                let lookup_records = ctxt.read_array::<SequenceLookup>(lookup_count)?.to_vec();
                Ok(ContextLookup::Coverages {
                    backtrack_coverages,
                    input_coverages,
                    lookahead_coverages,
                    lookup_records,
                })
            }
            3 => {
                let input_count = usize::from(ctxt.read_u16be()?);
                ctxt.check(input_count > 0)?;
                let lookup_count = usize::from(ctxt.read_u16be()?);
                let input_coverages =
                    read_coverages(&scope, ctxt.read_array::<U16Be>(input_count)?)?;
                let lookup_records = ctxt.read_array::<SequenceLookup>(lookup_count)?.to_vec();
                Ok(ContextLookup::Coverages {
                    backtrack_coverages: Vec::new(),
                    input_coverages,
                    lookahead_coverages: Vec::new(),
                    lookup_records,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ContextLookup {
    fn collect_coverage(&self, digest: &mut SetDigest) {
        match self {
            ContextLookup::Glyphs { coverage, .. } | ContextLookup::Classes { coverage, .. } => {
                coverage.collect(digest)
            }
            ContextLookup::Coverages {
                input_coverages, ..
            } => {
                if let Some(coverage) = input_coverages.first() {
                    coverage.collect(digest)
                }
            }
        }
    }
}

fn read_rule_sets<'a>(
    scope: &ReadScope<'a>,
    offsets: ReadArray<'a, U16Be>,
    chained: bool,
) -> Result<Vec<Vec<ContextRule>>, ParseError> {
    let mut rule_sets = Vec::with_capacity(offsets.len());
    for offset in &offsets {
        if offset == 0 {
            rule_sets.push(Vec::new());
            continue;
        }
        let rule_set_scope = scope.offset(usize::from(offset));
        let mut ctxt = rule_set_scope.ctxt();
        let rule_count = usize::from(ctxt.read_u16be()?);
        let rule_offsets = ctxt.read_array::<U16Be>(rule_count)?;
        let mut rules = Vec::with_capacity(rule_count);
        for rule_offset in &rule_offsets {
            let rule = rule_set_scope
                .offset(usize::from(rule_offset))
                .read_dep::<ContextRule>(chained)?;
            rules.push(rule);
        }
        rule_sets.push(rules);
    }
    Ok(rule_sets)
}

impl ReadBinaryDep for ContextRule {
    type Args<'a> = bool;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, chained: bool) -> Result<Self, ParseError> {
        if chained {
            let backtrack_count = usize::from(ctxt.read_u16be()?);
            let backtrack = ctxt.read_array::<U16Be>(backtrack_count)?.to_vec();
            let input_count = usize::from(ctxt.read_u16be()?);
            ctxt.check(input_count > 0)?;
            let input = ctxt.read_array::<U16Be>(input_count - 1)?.to_vec();
            let lookahead_count = usize::from(ctxt.read_u16be()?);
            let lookahead = ctxt.read_array::<U16Be>(lookahead_count)?.to_vec();
            let lookup_count = usize::from(ctxt.read_u16be()?);
            let lookup_records = ctxt.read_array::<SequenceLookup>(lookup_count)?.to_vec();
            Ok(ContextRule {
                backtrack,
                input,
                lookahead,
                lookup_records,
            })
        } else {
            let input_count = usize::from(ctxt.read_u16be()?);
            ctxt.check(input_count > 0)?;
            let lookup_count = usize::from(ctxt.read_u16be()?);
            let input = ctxt.read_array::<U16Be>(input_count - 1)?.to_vec();
            let lookup_records = ctxt.read_array::<SequenceLookup>(lookup_count)?.to_vec();
            Ok(ContextRule {
                backtrack: Vec::new(),
                input,
                lookahead: Vec::new(),
                lookup_records,
            })
        }
    }
}

#[derive(Clone, Copy)]
pub struct ValueFormat(u16);

impl ReadBinary for ValueFormat {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let value_format = ctxt.read_u16be()?;
        if value_format <= 0xFF {
            Ok(ValueFormat(value_format))
        } else {
            Err(ParseError::BadValue)
        }
    }
}

impl ValueFormat {
    pub fn size(self) -> usize {
        self.0.count_ones() as usize * 2
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    fn has(self, bit: u16) -> bool {
        self.0 & (1 << bit) != 0
    }
}

/// A value record. Device table adjustments are not read.
pub type ValueRecord = Option<Adjust>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Adjust {
    pub x_placement: i16,
    pub y_placement: i16,
    pub x_advance: i16,
    pub y_advance: i16,
}

impl ReadBinaryDep for ValueRecord {
    type Args<'a> = ValueFormat;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, value_format: ValueFormat) -> Result<Self, ParseError> {
        if value_format.is_zero() {
            return Ok(None);
        }
        let mut fields = [0i16; 4];
        for (bit, field) in fields.iter_mut().enumerate() {
            if value_format.has(bit as u16) {
                *field = ctxt.read_i16be()?;
            }
        }
        // Device or variation index offsets
        for bit in 4..8 {
            if value_format.has(bit) {
                ctxt.read_u16be()?;
            }
        }
        let [x_placement, y_placement, x_advance, y_advance] = fields;
        Ok(Some(Adjust {
            x_placement,
            y_placement,
            x_advance,
            y_advance,
        }))
    }
}

impl ReadFixedSizeDep for ValueRecord {
    fn size(value_format: ValueFormat) -> usize {
        value_format.size()
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Anchor {
    pub x: i16,
    pub y: i16,
}

impl ReadBinary for Anchor {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        match ctxt.read_u16be()? {
            // Format 2 contour points and format 3 device tables are not used.
            1..=3 => {
                let x = ctxt.read_i16be()?;
                let y = ctxt.read_i16be()?;
                Ok(Anchor { x, y })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

pub enum SinglePos {
    Format1 {
        coverage: Coverage,
        value_record: ValueRecord,
    },
    Format2 {
        coverage: Coverage,
        value_records: Vec<ValueRecord>,
    },
}

impl ReadBinary for SinglePos {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(&scope, ctxt.read_u16be()?)?;
                let value_format = ctxt.read::<ValueFormat>()?;
                let value_record = ctxt.read_dep::<ValueRecord>(value_format)?;
                Ok(SinglePos::Format1 {
                    coverage,
                    value_record,
                })
            }
            2 => {
                let coverage = read_coverage(&scope, ctxt.read_u16be()?)?;
                let value_format = ctxt.read::<ValueFormat>()?;
                let value_count = usize::from(ctxt.read_u16be()?);
                let value_records = ctxt
                    .read_array_dep::<ValueRecord>(value_count, value_format)?
                    .read_to_vec()?;
                Ok(SinglePos::Format2 {
                    coverage,
                    value_records,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl SinglePos {
    fn coverage(&self) -> &Coverage {
        match self {
            SinglePos::Format1 { coverage, .. } | SinglePos::Format2 { coverage, .. } => coverage,
        }
    }

    /// The adjustment for `glyph`, `None` when it is not covered.
    pub fn apply(&self, glyph: u16) -> Option<ValueRecord> {
        match self {
            SinglePos::Format1 {
                coverage,
                value_record,
            } => coverage.glyph_coverage_value(glyph).map(|_| *value_record),
            SinglePos::Format2 {
                coverage,
                value_records,
            } => {
                let coverage_index = coverage.glyph_coverage_value(glyph)?;
                value_records.get(usize::from(coverage_index)).copied()
            }
        }
    }
}

pub enum PairPos {
    Format1 {
        coverage: Coverage,
        value_format2: ValueFormat,
        pair_sets: Vec<Vec<PairValueRecord>>,
    },
    Format2 {
        coverage: Coverage,
        value_format2: ValueFormat,
        classdef1: ClassDef,
        classdef2: ClassDef,
        class2_count: usize,
        /// `class1_count * class2_count` value record pairs.
        class_records: Vec<(ValueRecord, ValueRecord)>,
    },
}

pub struct PairValueRecord {
    second_glyph: u16,
    value_record1: ValueRecord,
    value_record2: ValueRecord,
}

impl ReadBinary for PairPos {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(&scope, ctxt.read_u16be()?)?;
                let value_format1 = ctxt.read::<ValueFormat>()?;
                let value_format2 = ctxt.read::<ValueFormat>()?;
                let pair_set_count = usize::from(ctxt.read_u16be()?);
                let pair_set_offsets = ctxt.read_array::<U16Be>(pair_set_count)?;
                let mut pair_sets = Vec::with_capacity(pair_set_count);
                for offset in &pair_set_offsets {
                    let mut pair_set_ctxt = scope.offset(usize::from(offset)).ctxt();
                    let pair_value_count = usize::from(pair_set_ctxt.read_u16be()?);
                    let pair_set = pair_set_ctxt
                        .read_array_dep::<PairValueRecord>(
                            pair_value_count,
                            (value_format1, value_format2),
                        )?
                        .read_to_vec()?;
                    pair_sets.push(pair_set);
                }
                Ok(PairPos::Format1 {
                    coverage,
                    value_format2,
                    pair_sets,
                })
            }
            2 => {
                let coverage = read_coverage(&scope, ctxt.read_u16be()?)?;
                let value_format1 = ctxt.read::<ValueFormat>()?;
                let value_format2 = ctxt.read::<ValueFormat>()?;
                let classdef1 = read_classdef(&scope, ctxt.read_u16be()?)?;
                let classdef2 = read_classdef(&scope, ctxt.read_u16be()?)?;
                let class1_count = usize::from(ctxt.read_u16be()?);
                let class2_count = usize::from(ctxt.read_u16be()?);
                let record_count = class1_count
                    .checked_mul(class2_count)
                    .ok_or(ParseError::LimitExceeded)?;
                let mut class_records = Vec::with_capacity(record_count);
                for _ in 0..record_count {
                    let value_record1 = ctxt.read_dep::<ValueRecord>(value_format1)?;
                    let value_record2 = ctxt.read_dep::<ValueRecord>(value_format2)?;
                    class_records.push((value_record1, value_record2));
                }
                Ok(PairPos::Format2 {
                    coverage,
                    value_format2,
                    classdef1,
                    classdef2,
                    class2_count,
                    class_records,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadBinaryDep for PairValueRecord {
    type Args<'a> = (ValueFormat, ValueFormat);
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (value_format1, value_format2): Self::Args<'a>,
    ) -> Result<Self, ParseError> {
        let second_glyph = ctxt.read_u16be()?;
        let value_record1 = ctxt.read_dep::<ValueRecord>(value_format1)?;
        let value_record2 = ctxt.read_dep::<ValueRecord>(value_format2)?;
        Ok(PairValueRecord {
            second_glyph,
            value_record1,
            value_record2,
        })
    }
}

impl ReadFixedSizeDep for PairValueRecord {
    fn size((value_format1, value_format2): Self::Args<'_>) -> usize {
        2 + value_format1.size() + value_format2.size()
    }
}

impl PairPos {
    /// Build a glyph pair adjustment from `(first, second, value1, value2)` records.
    pub fn from_pairs(pairs: Vec<(u16, u16, ValueRecord, ValueRecord)>) -> PairPos {
        let has_second = pairs.iter().any(|&(_, _, _, value2)| value2.is_some());
        let mut sets: Vec<(u16, Vec<PairValueRecord>)> = Vec::new();
        for (first, second_glyph, value_record1, value_record2) in pairs {
            let record = PairValueRecord {
                second_glyph,
                value_record1,
                value_record2,
            };
            match sets.iter_mut().find(|(glyph, _)| *glyph == first) {
                Some((_, set)) => set.push(record),
                None => sets.push((first, vec![record])),
            }
        }
        for (_, set) in &mut sets {
            set.sort_by_key(|record| record.second_glyph);
        }
        let (coverage, pair_sets) = by_coverage(sets);
        PairPos::Format1 {
            coverage,
            value_format2: ValueFormat(if has_second { 0x0004 } else { 0 }),
            pair_sets,
        }
    }

    fn coverage(&self) -> &Coverage {
        match self {
            PairPos::Format1 { coverage, .. } | PairPos::Format2 { coverage, .. } => coverage,
        }
    }

    /// Whether the second glyph of a matched pair is adjusted, and so consumed.
    pub fn has_second_value(&self) -> bool {
        match self {
            PairPos::Format1 { value_format2, .. } | PairPos::Format2 { value_format2, .. } => {
                !value_format2.is_zero()
            }
        }
    }

    pub fn apply(&self, glyph1: u16, glyph2: u16) -> Option<(ValueRecord, ValueRecord)> {
        match self {
            PairPos::Format1 {
                coverage,
                pair_sets,
                ..
            } => {
                let coverage_index = coverage.glyph_coverage_value(glyph1)?;
                let pair_set = pair_sets.get(usize::from(coverage_index))?;
                // Pair value records are ordered by the second glyph id.
                pair_set
                    .binary_search_by_key(&glyph2, |record| record.second_glyph)
                    .ok()
                    .map(|index| {
                        let record = &pair_set[index];
                        (record.value_record1, record.value_record2)
                    })
            }
            PairPos::Format2 {
                coverage,
                classdef1,
                classdef2,
                class2_count,
                class_records,
                ..
            } => {
                coverage.glyph_coverage_value(glyph1)?;
                let class1 = usize::from(classdef1.glyph_class_value(glyph1));
                let class2 = usize::from(classdef2.glyph_class_value(glyph2));
                if class2 >= *class2_count {
                    return None;
                }
                class_records.get(class1 * class2_count + class2).copied()
            }
        }
    }
}

pub struct CursivePos {
    coverage: Coverage,
    entry_exit_records: Vec<(Option<Anchor>, Option<Anchor>)>,
}

impl ReadBinary for CursivePos {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(&scope, ctxt.read_u16be()?)?;
                let entry_exit_count = usize::from(ctxt.read_u16be()?);
                let mut entry_exit_records = Vec::with_capacity(entry_exit_count);
                for _ in 0..entry_exit_count {
                    let entry = read_anchor(&scope, ctxt.read_u16be()?)?;
                    let exit = read_anchor(&scope, ctxt.read_u16be()?)?;
                    entry_exit_records.push((entry, exit));
                }
                Ok(CursivePos {
                    coverage,
                    entry_exit_records,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl CursivePos {
    pub fn from_records(records: Vec<(u16, (Option<Anchor>, Option<Anchor>))>) -> CursivePos {
        let (coverage, entry_exit_records) = by_coverage(records);
        CursivePos {
            coverage,
            entry_exit_records,
        }
    }

    /// The entry and exit anchors of `glyph`.
    pub fn entry_exit(&self, glyph: u16) -> Option<(Option<Anchor>, Option<Anchor>)> {
        let coverage_index = self.coverage.glyph_coverage_value(glyph)?;
        self.entry_exit_records
            .get(usize::from(coverage_index))
            .copied()
    }
}

struct MarkRecord {
    mark_class: u16,
    mark_anchor: Anchor,
}

/// Mark to base and mark to mark attachment.
pub struct MarkBasePos {
    mark_coverage: Coverage,
    base_coverage: Coverage,
    mark_class_count: usize,
    mark_records: Vec<MarkRecord>,
    /// `mark_class_count` anchors per base glyph.
    base_anchors: Vec<Option<Anchor>>,
}

impl ReadBinary for MarkBasePos {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let mark_coverage = read_coverage(&scope, ctxt.read_u16be()?)?;
                let base_coverage = read_coverage(&scope, ctxt.read_u16be()?)?;
                let mark_class_count = usize::from(ctxt.read_u16be()?);
                let mark_array_offset = usize::from(ctxt.read_u16be()?);
                let base_array_offset = usize::from(ctxt.read_u16be()?);
                let mark_records = read_mark_array(scope.offset(mark_array_offset))?;
                let base_array = scope.offset(base_array_offset);
                let mut base_ctxt = base_array.ctxt();
                let base_count = usize::from(base_ctxt.read_u16be()?);
                let base_anchors = read_anchor_matrix(
                    &base_array,
                    &mut base_ctxt,
                    base_count,
                    mark_class_count,
                )?;
                Ok(MarkBasePos {
                    mark_coverage,
                    base_coverage,
                    mark_class_count,
                    mark_records,
                    base_anchors,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl MarkBasePos {
    /// Build a mark attachment from `(mark, class, anchor)` records and the
    /// `mark_class_count` anchors of each base.
    pub fn from_records(
        marks: Vec<(u16, u16, Anchor)>,
        bases: Vec<(u16, Vec<Option<Anchor>>)>,
        mark_class_count: usize,
    ) -> MarkBasePos {
        let (mark_coverage, mark_records) = mark_records(marks);
        let (base_coverage, base_anchors) = by_coverage(bases);
        MarkBasePos {
            mark_coverage,
            base_coverage,
            mark_class_count,
            mark_records,
            base_anchors: base_anchors.into_iter().flatten().collect(),
        }
    }

    pub fn mark_covers(&self, glyph: u16) -> bool {
        self.mark_coverage.glyph_coverage_value(glyph).is_some()
    }

    /// The base and mark anchors attaching `mark` to `base`.
    pub fn apply(&self, base: u16, mark: u16) -> Option<(Anchor, Anchor)> {
        let base_index = usize::from(self.base_coverage.glyph_coverage_value(base)?);
        let mark_index = usize::from(self.mark_coverage.glyph_coverage_value(mark)?);
        let mark_record = self.mark_records.get(mark_index)?;
        let mark_class = usize::from(mark_record.mark_class);
        if mark_class >= self.mark_class_count {
            return None;
        }
        let base_anchor = (*self
            .base_anchors
            .get(base_index * self.mark_class_count + mark_class)?)?;
        Some((base_anchor, mark_record.mark_anchor))
    }
}

pub struct MarkLigPos {
    mark_coverage: Coverage,
    liga_coverage: Coverage,
    mark_class_count: usize,
    mark_records: Vec<MarkRecord>,
    /// Per ligature, `mark_class_count` anchors per component.
    ligature_anchors: Vec<Vec<Option<Anchor>>>,
}

impl ReadBinary for MarkLigPos {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let mark_coverage = read_coverage(&scope, ctxt.read_u16be()?)?;
                let liga_coverage = read_coverage(&scope, ctxt.read_u16be()?)?;
                let mark_class_count = usize::from(ctxt.read_u16be()?);
                let mark_array_offset = usize::from(ctxt.read_u16be()?);
                let liga_array_offset = usize::from(ctxt.read_u16be()?);
                let mark_records = read_mark_array(scope.offset(mark_array_offset))?;

                let liga_array = scope.offset(liga_array_offset);
                let mut liga_ctxt = liga_array.ctxt();
                let ligature_count = usize::from(liga_ctxt.read_u16be()?);
                let attach_offsets = liga_ctxt.read_array::<U16Be>(ligature_count)?;
                let mut ligature_anchors = Vec::with_capacity(ligature_count);
                for offset in &attach_offsets {
                    let attach = liga_array.offset(usize::from(offset));
                    let mut attach_ctxt = attach.ctxt();
                    let component_count = usize::from(attach_ctxt.read_u16be()?);
                    ligature_anchors.push(read_anchor_matrix(
                        &attach,
                        &mut attach_ctxt,
                        component_count,
                        mark_class_count,
                    )?);
                }
                Ok(MarkLigPos {
                    mark_coverage,
                    liga_coverage,
                    mark_class_count,
                    mark_records,
                    ligature_anchors,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl MarkLigPos {
    /// As `MarkBasePos::from_records`, with the anchors of each ligature listed
    /// component by component.
    pub fn from_records(
        marks: Vec<(u16, u16, Anchor)>,
        ligatures: Vec<(u16, Vec<Option<Anchor>>)>,
        mark_class_count: usize,
    ) -> MarkLigPos {
        let (mark_coverage, mark_records) = mark_records(marks);
        let (liga_coverage, ligature_anchors) = by_coverage(ligatures);
        MarkLigPos {
            mark_coverage,
            liga_coverage,
            mark_class_count,
            mark_records,
            ligature_anchors,
        }
    }

    pub fn mark_covers(&self, glyph: u16) -> bool {
        self.mark_coverage.glyph_coverage_value(glyph).is_some()
    }

    /// The number of components of `ligature`, if it is covered.
    pub fn component_count(&self, ligature: u16) -> Option<usize> {
        let liga_index = usize::from(self.liga_coverage.glyph_coverage_value(ligature)?);
        let anchors = self.ligature_anchors.get(liga_index)?;
        Some(anchors.len() / self.mark_class_count.max(1))
    }

    /// The ligature and mark anchors attaching `mark` to component `component_index`.
    pub fn apply(
        &self,
        ligature: u16,
        mark: u16,
        component_index: usize,
    ) -> Option<(Anchor, Anchor)> {
        let liga_index = usize::from(self.liga_coverage.glyph_coverage_value(ligature)?);
        let mark_index = usize::from(self.mark_coverage.glyph_coverage_value(mark)?);
        let mark_record = self.mark_records.get(mark_index)?;
        let mark_class = usize::from(mark_record.mark_class);
        if mark_class >= self.mark_class_count {
            return None;
        }
        let anchors = self.ligature_anchors.get(liga_index)?;
        let liga_anchor = (*anchors.get(component_index * self.mark_class_count + mark_class)?)?;
        Some((liga_anchor, mark_record.mark_anchor))
    }
}

fn read_mark_array(scope: ReadScope<'_>) -> Result<Vec<MarkRecord>, ParseError> {
    let mut ctxt = scope.ctxt();
    let mark_count = usize::from(ctxt.read_u16be()?);
    let mut mark_records = Vec::with_capacity(mark_count);
    for _ in 0..mark_count {
        let mark_class = ctxt.read_u16be()?;
        let mark_anchor = read_anchor(&scope, ctxt.read_u16be()?)?.ok_or(ParseError::BadOffset)?;
        mark_records.push(MarkRecord {
            mark_class,
            mark_anchor,
        });
    }
    Ok(mark_records)
}

/// Read `rows * columns` nullable anchor offsets relative to `scope`.
fn read_anchor_matrix<'a>(
    scope: &ReadScope<'a>,
    ctxt: &mut ReadCtxt<'a>,
    rows: usize,
    columns: usize,
) -> Result<Vec<Option<Anchor>>, ParseError> {
    let count = rows.checked_mul(columns).ok_or(ParseError::LimitExceeded)?;
    let offsets = ctxt.read_array::<U16Be>(count)?;
    offsets
        .iter()
        .map(|offset| read_anchor(scope, offset))
        .collect()
}

fn read_anchor(scope: &ReadScope<'_>, offset: u16) -> Result<Option<Anchor>, ParseError> {
    if offset == 0 {
        Ok(None)
    } else {
        scope.offset(usize::from(offset)).read::<Anchor>().map(Some)
    }
}

/// A coverage table over the glyphs of `records` and their values in coverage order.
fn by_coverage<V>(mut records: Vec<(u16, V)>) -> (Coverage, Vec<V>) {
    records.sort_by_key(|&(glyph, _)| glyph);
    records.dedup_by_key(|&mut (glyph, _)| glyph);
    let coverage = Coverage::Format1 {
        glyph_array: records.iter().map(|&(glyph, _)| glyph).collect(),
    };
    (coverage, records.into_iter().map(|(_, value)| value).collect())
}

fn mark_records(marks: Vec<(u16, u16, Anchor)>) -> (Coverage, Vec<MarkRecord>) {
    by_coverage(
        marks
            .into_iter()
            .map(|(glyph, mark_class, mark_anchor)| {
                (
                    glyph,
                    MarkRecord {
                        mark_class,
                        mark_anchor,
                    },
                )
            })
            .collect(),
    )
}

fn read_objects<'a, T: ReadBinary>(
    scope: &ReadScope<'a>,
    offsets: ReadArray<'a, U16Be>,
) -> Result<Vec<T::HostType<'a>>, ParseError> {
    let mut objects = Vec::with_capacity(offsets.len());
    for offset in &offsets {
        objects.push(scope.offset(usize::from(offset)).read::<T>()?);
    }
    Ok(objects)
}

fn read_coverage(scope: &ReadScope<'_>, offset: u16) -> Result<Coverage, ParseError> {
    scope.offset(usize::from(offset)).read::<Coverage>()
}

fn read_coverages<'a>(
    scope: &ReadScope<'a>,
    offsets: ReadArray<'a, U16Be>,
) -> Result<Vec<Coverage>, ParseError> {
    read_objects::<Coverage>(scope, offsets)
}

/// A class definition at `offset`. A null offset assigns every glyph class 0.
fn read_classdef(scope: &ReadScope<'_>, offset: u16) -> Result<ClassDef, ParseError> {
    if offset == 0 {
        Ok(ClassDef::empty())
    } else {
        scope.offset(usize::from(offset)).read::<ClassDef>()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coverage {
    Format1 {
        glyph_array: Vec<u16>,
    },
    Format2 {
        coverage_range_array: Vec<CoverageRangeRecord>,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CoverageRangeRecord {
    start_glyph: u16,
    end_glyph: u16,
    start_coverage_index: u16,
}

impl ReadFrom for CoverageRangeRecord {
    type ReadType = (U16Be, U16Be, U16Be);

    fn read_from((start_glyph, end_glyph, start_coverage_index): (u16, u16, u16)) -> Self {
        CoverageRangeRecord {
            start_glyph,
            end_glyph,
            start_coverage_index,
        }
    }
}

impl ReadBinary for Coverage {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        match ctxt.read_u16be()? {
            1 => {
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let glyph_array = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
                Ok(Coverage::Format1 { glyph_array })
            }
            2 => {
                let range_count = usize::from(ctxt.read_u16be()?);
                let coverage_range_array = ctxt
                    .read_array::<CoverageRangeRecord>(range_count)?
                    .to_vec();
                for record in &coverage_range_array {
                    ctxt.check(record.start_glyph <= record.end_glyph)?;
                }
                Ok(Coverage::Format2 {
                    coverage_range_array,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl Coverage {
    pub fn from_glyphs(mut glyphs: Vec<u16>) -> Coverage {
        glyphs.sort_unstable();
        glyphs.dedup();
        Coverage::Format1 {
            glyph_array: glyphs,
        }
    }

    /// The coverage index of `glyph`. Glyphs and ranges are sorted by glyph id.
    pub fn glyph_coverage_value(&self, glyph: u16) -> Option<u16> {
        match self {
            Coverage::Format1 { glyph_array } => glyph_array
                .binary_search(&glyph)
                .ok()
                .map(|index| index as u16),
            Coverage::Format2 {
                coverage_range_array,
            } => {
                let index = coverage_range_array
                    .partition_point(|range| range.end_glyph < glyph);
                let range = coverage_range_array.get(index)?;
                (range.start_glyph <= glyph)
                    .then(|| range.start_coverage_index.wrapping_add(glyph - range.start_glyph))
            }
        }
    }

    pub fn glyph_count(&self) -> usize {
        match self {
            Coverage::Format1 { glyph_array } => glyph_array.len(),
            Coverage::Format2 {
                coverage_range_array,
            } => coverage_range_array
                .iter()
                .map(|range| usize::from(range.end_glyph - range.start_glyph) + 1)
                .sum(),
        }
    }

    pub fn collect(&self, digest: &mut SetDigest) {
        match self {
            Coverage::Format1 { glyph_array } => {
                glyph_array.iter().for_each(|&glyph| digest.add(glyph))
            }
            Coverage::Format2 {
                coverage_range_array,
            } => coverage_range_array
                .iter()
                .for_each(|range| digest.add_range(range.start_glyph, range.end_glyph)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassDef {
    Format1 {
        start_glyph: u16,
        class_value_array: Vec<u16>,
    },
    Format2 {
        class_range_array: Vec<ClassRangeRecord>,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClassRangeRecord {
    start_glyph: u16,
    end_glyph: u16,
    class_value: u16,
}

impl ReadFrom for ClassRangeRecord {
    type ReadType = (U16Be, U16Be, U16Be);

    fn read_from((start_glyph, end_glyph, class_value): (u16, u16, u16)) -> Self {
        ClassRangeRecord {
            start_glyph,
            end_glyph,
            class_value,
        }
    }
}

impl ReadBinary for ClassDef {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        match ctxt.read_u16be()? {
            1 => {
                let start_glyph = ctxt.read_u16be()?;
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let class_value_array = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
                Ok(ClassDef::Format1 {
                    start_glyph,
                    class_value_array,
                })
            }
            2 => {
                let class_range_count = usize::from(ctxt.read_u16be()?);
                let class_range_array = ctxt
                    .read_array::<ClassRangeRecord>(class_range_count)
                    // Some fonts (Mangal) give a count larger than the data; take what is there.
                    .or_else(|_| ctxt.read_array_upto_hack::<ClassRangeRecord>(class_range_count))?
                    .to_vec();
                Ok(ClassDef::Format2 { class_range_array })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ClassDef {
    /// A class definition that puts every glyph in class 0.
    pub fn empty() -> ClassDef {
        ClassDef::Format2 {
            class_range_array: Vec::new(),
        }
    }

    pub fn glyph_class_value(&self, glyph: u16) -> u16 {
        match self {
            ClassDef::Format1 {
                start_glyph,
                class_value_array,
            } => glyph
                .checked_sub(*start_glyph)
                .and_then(|index| class_value_array.get(usize::from(index)))
                .copied()
                .unwrap_or(0),
            ClassDef::Format2 { class_range_array } => {
                let index = class_range_array.partition_point(|range| range.end_glyph < glyph);
                class_range_array
                    .get(index)
                    .filter(|range| range.start_glyph <= glyph)
                    .map_or(0, |range| range.class_value)
            }
        }
    }
}
