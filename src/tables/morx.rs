//! Binary reading of the `morx` table.
//!
//! <https://developer.apple.com/fonts/TrueType-Reference-Manual/RM06/Chap6morx.html>

use std::cmp::Ordering;

use log::warn;

use crate::binary::read::{ReadArray, ReadBinaryDep, ReadCtxt, ReadFrom, ReadScope, ReadUnchecked};
use crate::binary::{U16Be, U32Be, U8};
use crate::error::ParseError;

/// Class of the virtual glyph after the last glyph of the text.
pub const CLASS_END_OF_TEXT: u16 = 0;
/// Class of glyphs not covered by the class table.
pub const CLASS_OUT_OF_BOUNDS: u16 = 1;
/// Class of glyphs removed by an earlier subtable.
pub const CLASS_DELETED_GLYPH: u16 = 2;
/// Glyph id marking a glyph as removed.
pub const DELETED_GLYPH: u16 = 0xFFFF;

const NO_INDEX: u16 = 0xFFFF;

/// The extended glyph metamorphosis table.
pub struct MorxTable<'a> {
    pub version: u16,
    pub chains: Vec<Chain<'a>>,
}

impl<'b> ReadBinaryDep for MorxTable<'b> {
    type HostType<'a> = MorxTable<'a>;
    type Args<'a> = u16;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        num_glyphs: u16,
    ) -> Result<Self::HostType<'a>, ParseError> {
        let version = ctxt.read_u16be()?;
        // Version 3 appends a glyph coverage array to each chain, which is only an
        // optimisation and is skipped along with the rest of the chain.
        ctxt.check_version(version == 2 || version == 3)?;
        let _unused = ctxt.read_u16be()?;
        let num_chains = ctxt.read_u32be()?;

        let mut chains = Vec::new();
        for _ in 0..num_chains {
            let chain_length = ctxt.scope().offset(4).ctxt().read_u32be()?;
            let chain_scope = ctxt.read_scope(usize::try_from(chain_length)?)?;
            chains.push(chain_scope.read_dep::<Chain<'a>>(num_glyphs)?);
        }

        Ok(MorxTable { version, chains })
    }
}

/// A chain of subtables, enabled by the chain's feature flags.
pub struct Chain<'a> {
    pub default_flags: u32,
    pub features: ReadArray<'a, Feature>,
    pub subtables: Vec<Subtable<'a>>,
}

/// Maps a feature type and selector to the subtable flags it turns on and off.
#[derive(Debug, Clone, Copy)]
pub struct Feature {
    pub feature_type: u16,
    pub feature_setting: u16,
    pub enable_flags: u32,
    pub disable_flags: u32,
}

impl ReadFrom for Feature {
    type ReadType = (U16Be, U16Be, U32Be, U32Be);

    fn read_from(
        (feature_type, feature_setting, enable_flags, disable_flags): (u16, u16, u32, u32),
    ) -> Self {
        Feature {
            feature_type,
            feature_setting,
            enable_flags,
            disable_flags,
        }
    }
}

impl<'b> ReadBinaryDep for Chain<'b> {
    type HostType<'a> = Chain<'a>;
    type Args<'a> = u16;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        num_glyphs: u16,
    ) -> Result<Self::HostType<'a>, ParseError> {
        let default_flags = ctxt.read_u32be()?;
        let _chain_length = ctxt.read_u32be()?;
        let num_features = ctxt.read_u32be()?;
        let num_subtables = ctxt.read_u32be()?;
        let features = ctxt.read_array::<Feature>(usize::try_from(num_features)?)?;

        let mut subtables = Vec::new();
        for _ in 0..num_subtables {
            let length = ctxt.read_u32be()?;
            let coverage = ctxt.read_u32be()?;
            let sub_feature_flags = ctxt.read_u32be()?;
            // The length includes the 12 byte header just read.
            let body_length = usize::try_from(length)?
                .checked_sub(12)
                .ok_or(ParseError::BadValue)?;
            let body = ctxt.read_scope(body_length)?;
            match SubtableKind::read(coverage, body, num_glyphs) {
                Ok(Some(kind)) => subtables.push(Subtable {
                    coverage,
                    sub_feature_flags,
                    kind,
                }),
                Ok(None) => {}
                Err(err) => warn!("skipping invalid morx subtable: {}", err),
            }
        }

        Ok(Chain {
            default_flags,
            features,
            subtables,
        })
    }
}

/// A `morx` subtable with its coverage and feature flags.
pub struct Subtable<'a> {
    pub coverage: u32,
    pub sub_feature_flags: u32,
    pub kind: SubtableKind<'a>,
}

impl Subtable<'_> {
    const VERTICAL: u32 = 0x8000_0000;
    const DESCENDING: u32 = 0x4000_0000;
    const ALL_DIRECTIONS: u32 = 0x2000_0000;
    const LOGICAL: u32 = 0x1000_0000;

    /// Whether the subtable applies to text laid out in the given orientation.
    pub fn applies_to(&self, vertical: bool) -> bool {
        self.coverage & Self::ALL_DIRECTIONS != 0
            || (self.coverage & Self::VERTICAL != 0) == vertical
    }

    /// Whether the glyphs must be processed in reverse order, given the direction of the text.
    pub fn process_reversed(&self, backward: bool) -> bool {
        let descending = self.coverage & Self::DESCENDING != 0;
        if self.coverage & Self::LOGICAL != 0 {
            descending
        } else {
            descending != backward
        }
    }
}

pub enum SubtableKind<'a> {
    Rearrangement(StateTable<'a, RearrangementEntry>),
    Contextual(ContextualSubtable<'a>),
    Ligature(LigatureSubtable<'a>),
    NonContextual(LookupTable<'a>),
    Insertion(InsertionSubtable<'a>),
}

impl<'a> SubtableKind<'a> {
    fn read(
        coverage: u32,
        scope: ReadScope<'a>,
        num_glyphs: u16,
    ) -> Result<Option<SubtableKind<'a>>, ParseError> {
        let kind = match coverage & 0xFF {
            0 => SubtableKind::Rearrangement(scope.read_dep::<StateTable<'a, _>>(num_glyphs)?),
            1 => SubtableKind::Contextual(ContextualSubtable::read(scope, num_glyphs)?),
            2 => SubtableKind::Ligature(LigatureSubtable::read(scope, num_glyphs)?),
            4 => SubtableKind::NonContextual(scope.read_dep::<LookupTable<'a>>(num_glyphs)?),
            5 => SubtableKind::Insertion(InsertionSubtable::read(scope, num_glyphs)?),
            kind => {
                warn!("skipping morx subtable type {}", kind);
                return Ok(None);
            }
        };
        Ok(Some(kind))
    }
}

/// An extended state table: a class lookup, a state array and an entry table.
pub struct StateTable<'a, E: ReadUnchecked> {
    num_classes: usize,
    class_table: LookupTable<'a>,
    states: ReadArray<'a, U16Be>,
    entries: ReadArray<'a, E>,
}

impl<'b, E: ReadUnchecked> ReadBinaryDep for StateTable<'b, E> {
    type HostType<'a> = StateTable<'a, E>;
    type Args<'a> = u16;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        num_glyphs: u16,
    ) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let num_classes = usize::try_from(ctxt.read_u32be()?)?;
        let class_table_offset = usize::try_from(ctxt.read_u32be()?)?;
        let state_array_offset = usize::try_from(ctxt.read_u32be()?)?;
        let entry_table_offset = usize::try_from(ctxt.read_u32be()?)?;
        ctxt.check(num_classes >= 4)?;

        let class_table = scope
            .offset(class_table_offset)
            .read_dep::<LookupTable<'a>>(num_glyphs)?;

        // The number of states is implicit: the state array runs up to the entry table.
        let state_end = if entry_table_offset > state_array_offset {
            entry_table_offset
        } else {
            scope.data().len()
        };
        let state_rows = state_end.saturating_sub(state_array_offset) / (2 * num_classes);
        let states = scope
            .offset(state_array_offset)
            .ctxt()
            .read_array::<U16Be>(state_rows * num_classes)?;

        let mut entry_ctxt = scope.offset(entry_table_offset).ctxt();
        let num_entries = entry_ctxt.remaining() / E::SIZE;
        let entries = entry_ctxt.read_array::<E>(num_entries)?;

        Ok(StateTable {
            num_classes,
            class_table,
            states,
            entries,
        })
    }
}

impl<'a, E: ReadUnchecked> StateTable<'a, E> {
    /// The class of `glyph`, or of the end of the text for `None`.
    pub fn class(&self, glyph: Option<u16>) -> u16 {
        match glyph {
            None => CLASS_END_OF_TEXT,
            Some(DELETED_GLYPH) => CLASS_DELETED_GLYPH,
            Some(glyph) => self
                .class_table
                .lookup(glyph)
                .filter(|&class| usize::from(class) < self.num_classes)
                .unwrap_or(CLASS_OUT_OF_BOUNDS),
        }
    }

    /// The entry for `class` in `state`.
    pub fn entry(&self, state: u16, class: u16) -> Option<E::HostType> {
        let state = usize::from(state);
        let class = usize::from(class);
        let index = self.states.get_item(state * self.num_classes + class)?;
        self.entries.get_item(usize::from(index))
    }
}

#[derive(Debug, Copy, Clone)]
pub struct RearrangementEntry {
    pub next_state: u16,
    pub flags: u16,
}

impl RearrangementEntry {
    /// Make the current glyph the first glyph to be rearranged.
    pub fn mark_first(&self) -> bool {
        self.flags & 0x8000 != 0
    }

    pub fn dont_advance(&self) -> bool {
        self.flags & 0x4000 != 0
    }

    /// Make the current glyph the last glyph to be rearranged.
    pub fn mark_last(&self) -> bool {
        self.flags & 0x2000 != 0
    }

    pub fn verb(&self) -> RearrangementVerb {
        RearrangementVerb::from_bits(self.flags)
    }
}

impl ReadFrom for RearrangementEntry {
    type ReadType = (U16Be, U16Be);

    fn read_from((next_state, flags): (u16, u16)) -> Self {
        RearrangementEntry { next_state, flags }
    }
}

/// How the glyphs between the first and last marked glyphs are reordered.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RearrangementVerb {
    NoChange,
    /// Ax => xA
    Verb1,
    /// xD => Dx
    Verb2,
    /// AxD => DxA
    Verb3,
    /// ABx => xAB
    Verb4,
    /// ABx => xBA
    Verb5,
    /// xCD => CDx
    Verb6,
    /// xCD => DCx
    Verb7,
    /// AxCD => CDxA
    Verb8,
    /// AxCD => DCxA
    Verb9,
    /// ABxD => DxAB
    Verb10,
    /// ABxD => DxBA
    Verb11,
    /// ABxCD => CDxAB
    Verb12,
    /// ABxCD => CDxBA
    Verb13,
    /// ABxCD => DCxAB
    Verb14,
    /// ABxCD => DCxBA
    Verb15,
}

impl RearrangementVerb {
    const ALL: [RearrangementVerb; 16] = [
        RearrangementVerb::NoChange,
        RearrangementVerb::Verb1,
        RearrangementVerb::Verb2,
        RearrangementVerb::Verb3,
        RearrangementVerb::Verb4,
        RearrangementVerb::Verb5,
        RearrangementVerb::Verb6,
        RearrangementVerb::Verb7,
        RearrangementVerb::Verb8,
        RearrangementVerb::Verb9,
        RearrangementVerb::Verb10,
        RearrangementVerb::Verb11,
        RearrangementVerb::Verb12,
        RearrangementVerb::Verb13,
        RearrangementVerb::Verb14,
        RearrangementVerb::Verb15,
    ];

    fn from_bits(flags: u16) -> RearrangementVerb {
        Self::ALL[usize::from(flags & 0x000F)]
    }

    /// The number of glyphs moved from the start and from the end of the range.
    pub fn moved(self) -> (usize, usize) {
        use RearrangementVerb::*;
        match self {
            NoChange => (0, 0),
            Verb1 => (1, 0),
            Verb2 => (0, 1),
            Verb3 => (1, 1),
            Verb4 | Verb5 => (2, 0),
            Verb6 | Verb7 => (0, 2),
            Verb8 | Verb9 => (1, 2),
            Verb10 | Verb11 => (2, 1),
            Verb12 | Verb13 | Verb14 | Verb15 => (2, 2),
        }
    }
}

/// Contextual glyph substitution subtable.
pub struct ContextualSubtable<'a> {
    pub state_table: StateTable<'a, ContextualEntry>,
    substitution_tables: ReadScope<'a>,
    num_glyphs: u16,
}

#[derive(Debug, Copy, Clone)]
pub struct ContextualEntry {
    pub next_state: u16,
    pub flags: u16,
    pub mark_index: u16,
    pub current_index: u16,
}

impl ContextualEntry {
    /// Make the current glyph the marked glyph.
    pub fn set_mark(&self) -> bool {
        self.flags & 0x8000 != 0
    }

    pub fn dont_advance(&self) -> bool {
        self.flags & 0x4000 != 0
    }
}

impl ReadFrom for ContextualEntry {
    type ReadType = (U16Be, U16Be, U16Be, U16Be);

    fn read_from((next_state, flags, mark_index, current_index): (u16, u16, u16, u16)) -> Self {
        ContextualEntry {
            next_state,
            flags,
            mark_index,
            current_index,
        }
    }
}

impl<'a> ContextualSubtable<'a> {
    fn read(scope: ReadScope<'a>, num_glyphs: u16) -> Result<Self, ParseError> {
        let state_table = scope.read_dep::<StateTable<'a, ContextualEntry>>(num_glyphs)?;
        let substitution_table_offset = scope.offset(16).ctxt().read_u32be()?;
        Ok(ContextualSubtable {
            state_table,
            substitution_tables: scope.offset(usize::try_from(substitution_table_offset)?),
            num_glyphs,
        })
    }

    /// Substitute `glyph` using substitution table `index`.
    ///
    /// The number of tables is not recorded in the font, so each one is read on demand.
    pub fn substitute(&self, index: u16, glyph: u16) -> Option<u16> {
        if index == NO_INDEX {
            return None;
        }
        let offset = self
            .substitution_tables
            .offset(usize::from(index) * 4)
            .ctxt()
            .read_u32be()
            .ok()?;
        let table = self
            .substitution_tables
            .offset(usize::try_from(offset).ok()?)
            .read_dep::<LookupTable<'_>>(self.num_glyphs)
            .ok()?;
        table.lookup(glyph)
    }
}

/// Ligature subtable.
pub struct LigatureSubtable<'a> {
    pub state_table: StateTable<'a, LigatureEntry>,
    actions: ReadArray<'a, U32Be>,
    components: ReadArray<'a, U16Be>,
    ligatures: ReadArray<'a, U16Be>,
}

#[derive(Debug, Copy, Clone)]
pub struct LigatureEntry {
    pub next_state: u16,
    pub flags: u16,
    pub action_index: u16,
}

impl LigatureEntry {
    /// Push the current glyph onto the component stack.
    pub fn set_component(&self) -> bool {
        self.flags & 0x8000 != 0
    }

    pub fn dont_advance(&self) -> bool {
        self.flags & 0x4000 != 0
    }

    /// Run the ligature actions starting at `action_index`.
    pub fn perform_action(&self) -> bool {
        self.flags & 0x2000 != 0
    }
}

impl ReadFrom for LigatureEntry {
    type ReadType = (U16Be, U16Be, U16Be);

    fn read_from((next_state, flags, action_index): (u16, u16, u16)) -> Self {
        LigatureEntry {
            next_state,
            flags,
            action_index,
        }
    }
}

/// One ligature action: pop a component and accumulate its ligature table index.
#[derive(Debug, Copy, Clone)]
pub struct LigatureAction(u32);

impl LigatureAction {
    /// This is the last action in the list. This also implies storage.
    pub fn last(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Store the ligature in place of the popped glyph.
    pub fn store(self) -> bool {
        self.0 & 0x4000_0000 != 0
    }

    /// The signed 30-bit offset added to the glyph id to index the component table.
    pub fn offset(self) -> i32 {
        // Shift the 30-bit field to the top and back down to sign extend it.
        ((self.0 << 2) as i32) >> 2
    }
}

impl<'a> LigatureSubtable<'a> {
    fn read(scope: ReadScope<'a>, num_glyphs: u16) -> Result<Self, ParseError> {
        let state_table = scope.read_dep::<StateTable<'a, LigatureEntry>>(num_glyphs)?;
        let mut ctxt = scope.offset(16).ctxt();
        let action_offset = usize::try_from(ctxt.read_u32be()?)?;
        let component_offset = usize::try_from(ctxt.read_u32be()?)?;
        let ligature_offset = usize::try_from(ctxt.read_u32be()?)?;
        Ok(LigatureSubtable {
            state_table,
            actions: read_trailing_array(scope, action_offset)?,
            components: read_trailing_array(scope, component_offset)?,
            ligatures: read_trailing_array(scope, ligature_offset)?,
        })
    }

    pub fn action(&self, index: usize) -> Option<LigatureAction> {
        self.actions.get_item(index).map(LigatureAction)
    }

    pub fn component(&self, index: usize) -> Option<u16> {
        self.components.get_item(index)
    }

    pub fn ligature(&self, index: usize) -> Option<u16> {
        self.ligatures.get_item(index)
    }
}

/// Glyph insertion subtable.
pub struct InsertionSubtable<'a> {
    pub state_table: StateTable<'a, InsertionEntry>,
    insertion_glyphs: ReadArray<'a, U16Be>,
}

#[derive(Debug, Copy, Clone)]
pub struct InsertionEntry {
    pub next_state: u16,
    pub flags: u16,
    pub current_insert_index: u16,
    pub marked_insert_index: u16,
}

impl InsertionEntry {
    pub fn set_mark(&self) -> bool {
        self.flags & 0x8000 != 0
    }

    pub fn dont_advance(&self) -> bool {
        self.flags & 0x4000 != 0
    }

    /// Insert before the current glyph rather than after it.
    pub fn current_insert_before(&self) -> bool {
        self.flags & 0x0800 != 0
    }

    /// Insert before the marked glyph rather than after it.
    pub fn marked_insert_before(&self) -> bool {
        self.flags & 0x0400 != 0
    }

    pub fn current_insert_count(&self) -> usize {
        usize::from((self.flags & 0x03E0) >> 5)
    }

    pub fn marked_insert_count(&self) -> usize {
        usize::from(self.flags & 0x001F)
    }
}

impl ReadFrom for InsertionEntry {
    type ReadType = (U16Be, U16Be, U16Be, U16Be);

    fn read_from(
        (next_state, flags, current_insert_index, marked_insert_index): (u16, u16, u16, u16),
    ) -> Self {
        InsertionEntry {
            next_state,
            flags,
            current_insert_index,
            marked_insert_index,
        }
    }
}

impl<'a> InsertionSubtable<'a> {
    fn read(scope: ReadScope<'a>, num_glyphs: u16) -> Result<Self, ParseError> {
        let state_table = scope.read_dep::<StateTable<'a, InsertionEntry>>(num_glyphs)?;
        let insertion_offset = usize::try_from(scope.offset(16).ctxt().read_u32be()?)?;
        Ok(InsertionSubtable {
            state_table,
            insertion_glyphs: read_trailing_array(scope, insertion_offset)?,
        })
    }

    /// The `count` glyphs to insert starting at `index`, `None` when out of range.
    pub fn glyphs(&self, index: u16, count: usize) -> Option<Vec<u16>> {
        if index == NO_INDEX {
            return None;
        }
        let start = usize::from(index);
        (start..start + count)
            .map(|i| self.insertion_glyphs.get_item(i))
            .collect()
    }
}

fn read_trailing_array<T: ReadUnchecked>(
    scope: ReadScope<'_>,
    offset: usize,
) -> Result<ReadArray<'_, T>, ParseError> {
    let mut ctxt = scope.offset(offset).ctxt();
    let len = ctxt.remaining() / T::SIZE;
    ctxt.read_array::<T>(len)
}

/// An AAT lookup table mapping glyphs to 16-bit values.
pub enum LookupTable<'a> {
    /// Simple array indexed by glyph.
    Format0(ReadArray<'a, U16Be>),
    /// Segments sharing a single value.
    Format2(ReadArray<'a, LookupSegment>),
    /// Segments with an array of values each.
    Format4 {
        segments: ReadArray<'a, LookupSegment>,
        scope: ReadScope<'a>,
    },
    /// Sorted single glyphs.
    Format6(ReadArray<'a, LookupSingle>),
    /// Trimmed array.
    Format8 {
        first_glyph: u16,
        values: ReadArray<'a, U16Be>,
    },
    /// Trimmed array of one byte values.
    Format10 {
        first_glyph: u16,
        values: ReadArray<'a, U8>,
    },
}

/// A binary search segment, used by lookup formats 2 and 4.
#[derive(Debug, Copy, Clone)]
pub struct LookupSegment {
    pub last_glyph: u16,
    pub first_glyph: u16,
    /// The value for format 2, the offset to the values for format 4.
    pub value: u16,
}

impl ReadFrom for LookupSegment {
    type ReadType = (U16Be, U16Be, U16Be);

    fn read_from((last_glyph, first_glyph, value): (u16, u16, u16)) -> Self {
        LookupSegment {
            last_glyph,
            first_glyph,
            value,
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct LookupSingle {
    pub glyph: u16,
    pub value: u16,
}

impl ReadFrom for LookupSingle {
    type ReadType = (U16Be, U16Be);

    fn read_from((glyph, value): (u16, u16)) -> Self {
        LookupSingle { glyph, value }
    }
}

impl<'b> ReadBinaryDep for LookupTable<'b> {
    type HostType<'a> = LookupTable<'a>;
    type Args<'a> = u16;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        num_glyphs: u16,
    ) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let format = ctxt.read_u16be()?;
        match format {
            0 => Ok(LookupTable::Format0(
                ctxt.read_array_upto_hack(usize::from(num_glyphs))?,
            )),
            2 | 4 | 6 => {
                let unit_size = usize::from(ctxt.read_u16be()?);
                let num_units = usize::from(ctxt.read_u16be()?);
                let _search_range = ctxt.read_u16be()?;
                let _entry_selector = ctxt.read_u16be()?;
                let _range_shift = ctxt.read_u16be()?;
                // Tables may end with a 0xFFFF terminator unit, which never matches a real glyph.
                match format {
                    2 => {
                        ctxt.check(unit_size >= LookupSegment::SIZE)?;
                        let segments = ctxt.read_array_stride(num_units, unit_size)?;
                        Ok(LookupTable::Format2(segments))
                    }
                    4 => {
                        ctxt.check(unit_size >= LookupSegment::SIZE)?;
                        let segments = ctxt.read_array_stride(num_units, unit_size)?;
                        Ok(LookupTable::Format4 { segments, scope })
                    }
                    _ => {
                        ctxt.check(unit_size >= LookupSingle::SIZE)?;
                        let singles = ctxt.read_array_stride(num_units, unit_size)?;
                        Ok(LookupTable::Format6(singles))
                    }
                }
            }
            8 => {
                let first_glyph = ctxt.read_u16be()?;
                let glyph_count = ctxt.read_u16be()?;
                let values = ctxt.read_array(usize::from(glyph_count))?;
                Ok(LookupTable::Format8 {
                    first_glyph,
                    values,
                })
            }
            10 => {
                let unit_size = ctxt.read_u16be()?;
                let first_glyph = ctxt.read_u16be()?;
                let glyph_count = usize::from(ctxt.read_u16be()?);
                match unit_size {
                    1 => Ok(LookupTable::Format10 {
                        first_glyph,
                        values: ctxt.read_array(glyph_count)?,
                    }),
                    2 => Ok(LookupTable::Format8 {
                        first_glyph,
                        values: ctxt.read_array(glyph_count)?,
                    }),
                    _ => Err(ParseError::NotImplemented),
                }
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl<'a> LookupTable<'a> {
    /// The value for `glyph`, if the table covers it.
    pub fn lookup(&self, glyph: u16) -> Option<u16> {
        match self {
            LookupTable::Format0(values) => values.get_item(usize::from(glyph)),
            LookupTable::Format2(segments) => {
                find_segment(segments, glyph).map(|segment| segment.value)
            }
            LookupTable::Format4 { segments, scope } => {
                let segment = find_segment(segments, glyph)?;
                let offset = usize::from(segment.value)
                    + 2 * usize::from(glyph - segment.first_glyph);
                scope.offset(offset).ctxt().read_u16be().ok()
            }
            LookupTable::Format6(singles) => {
                let index = singles
                    .binary_search_by(|single| single.glyph.cmp(&glyph))
                    .ok()?;
                singles.get_item(index).map(|single| single.value)
            }
            LookupTable::Format8 {
                first_glyph,
                values,
            } => {
                let index = glyph.checked_sub(*first_glyph)?;
                values.get_item(usize::from(index))
            }
            LookupTable::Format10 {
                first_glyph,
                values,
            } => {
                let index = glyph.checked_sub(*first_glyph)?;
                values.get_item(usize::from(index)).map(u16::from)
            }
        }
    }
}

/// Binary search for the segment containing `glyph`. Segments are sorted by last glyph.
fn find_segment(segments: &ReadArray<'_, LookupSegment>, glyph: u16) -> Option<LookupSegment> {
    let index = segments
        .binary_search_by(|segment| {
            if segment.last_glyph < glyph {
                Ordering::Less
            } else if segment.first_glyph > glyph {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        })
        .ok()?;
    segments.get_item(index)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn push_u16s(data: &mut Vec<u8>, values: &[u16]) {
        for value in values {
            data.extend_from_slice(&value.to_be_bytes());
        }
    }

    pub(crate) fn push_u32s(data: &mut Vec<u8>, values: &[u32]) {
        for value in values {
            data.extend_from_slice(&value.to_be_bytes());
        }
    }

    /// A format 8 lookup table mapping `first..` to `values`.
    pub(crate) fn format8_lookup(first: u16, values: &[u16]) -> Vec<u8> {
        let mut data = Vec::new();
        push_u16s(&mut data, &[8, first, values.len() as u16]);
        push_u16s(&mut data, values);
        data
    }

    /// A noncontextual `morx` table, with one chain enabled by default, that substitutes
    /// glyphs according to `lookup`.
    pub(crate) fn noncontextual_morx(lookup: &[u8]) -> Vec<u8> {
        let subtable_length = 12 + lookup.len() as u32;
        let chain_length = 16 + subtable_length;
        let mut data = Vec::new();
        push_u16s(&mut data, &[2, 0]);
        push_u32s(&mut data, &[1]);
        push_u32s(&mut data, &[1, chain_length, 0, 1]);
        push_u32s(&mut data, &[subtable_length, 0x2000_0004, 1]);
        data.extend_from_slice(lookup);
        data
    }

    #[test]
    fn lookup_formats() {
        let data = format8_lookup(10, &[100, 101, 102]);
        let table = ReadScope::new(&data)
            .read_dep::<LookupTable<'_>>(20)
            .unwrap();
        assert_eq!(table.lookup(11), Some(101));
        assert_eq!(table.lookup(9), None);
        assert_eq!(table.lookup(13), None);

        // Format 2 with a terminating segment
        let mut data = Vec::new();
        push_u16s(&mut data, &[2, 6, 3, 12, 1, 6]);
        push_u16s(&mut data, &[5, 3, 40, 9, 8, 41, 0xFFFF, 0xFFFF, 0]);
        let table = ReadScope::new(&data)
            .read_dep::<LookupTable<'_>>(20)
            .unwrap();
        assert_eq!(table.lookup(4), Some(40));
        assert_eq!(table.lookup(8), Some(41));
        assert_eq!(table.lookup(7), None);

        // Format 6
        let mut data = Vec::new();
        push_u16s(&mut data, &[6, 4, 2, 8, 1, 0]);
        push_u16s(&mut data, &[3, 30, 7, 70]);
        let table = ReadScope::new(&data)
            .read_dep::<LookupTable<'_>>(20)
            .unwrap();
        assert_eq!(table.lookup(7), Some(70));
        assert_eq!(table.lookup(5), None);
    }

    #[test]
    fn read_noncontextual_chain() {
        let data = noncontextual_morx(&format8_lookup(3, &[30]));
        let morx = ReadScope::new(&data)
            .read_dep::<MorxTable<'_>>(40)
            .unwrap();
        assert_eq!(morx.chains.len(), 1);
        let chain = &morx.chains[0];
        assert_eq!(chain.default_flags, 1);
        let subtable = &chain.subtables[0];
        assert!(subtable.applies_to(true));
        assert!(!subtable.process_reversed(false));
        match &subtable.kind {
            SubtableKind::NonContextual(lookup) => assert_eq!(lookup.lookup(3), Some(30)),
            _ => panic!("expected a noncontextual subtable"),
        }
    }

    #[test]
    fn ligature_action_offset() {
        assert_eq!(LigatureAction(0x8000_0005).offset(), 5);
        assert_eq!(LigatureAction(0x3FFF_FFFF).offset(), -1);
        assert!(LigatureAction(0x8000_0000).last());
        assert!(LigatureAction(0x4000_0000).store());
    }

    #[test]
    fn verb_ranges() {
        let entry = RearrangementEntry {
            next_state: 0,
            flags: 0x800F,
        };
        assert!(entry.mark_first());
        assert_eq!(entry.verb(), RearrangementVerb::Verb15);
        assert_eq!(entry.verb().moved(), (2, 2));
    }
}
