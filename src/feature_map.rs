//! Compilation of requested features into glyph masks and lookup schedules.
//!
//! Shapers and callers register features with a [`MapBuilder`]. Compiling the builder
//! allocates each feature a slice of the 32-bit glyph mask, resolves the feature in the
//! `GSUB` and `GPOS` language systems selected for the run, and lays out the lookups of
//! each table in stages separated by pauses.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use log::{debug, warn};

use crate::buffer::{Buffer, Mask, SegmentProperties, GLYPH_FLAG_DEFINED};
use crate::context::{ApplyContext, ApplyTable};
use crate::error::ParseError;
use crate::face::FontFace;
use crate::layout::{LangSys, LayoutTable, LayoutTableType, GPOS, GSUB};
use crate::plan::ShapePlan;
use crate::unicode;

/// Bits available to a single feature value.
pub const MAX_BITS: u32 = 8;
pub const MAX_VALUE: u32 = (1 << MAX_BITS) - 1;

const GLOBAL_BIT_SHIFT: u32 = GLYPH_FLAG_DEFINED.count_ones();
const GLOBAL_BIT_MASK: Mask = GLYPH_FLAG_DEFINED + 1;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct FeatureFlags: u8 {
        /// The feature applies to every glyph.
        const GLOBAL = 1 << 0;
        /// The shaper can emulate the feature, so it keeps its mask bits even when the
        /// font lacks it.
        const HAS_FALLBACK = 1 << 1;
        /// Don't skip over ZWNJ when matching context.
        const MANUAL_ZWNJ = 1 << 2;
        /// Don't skip over ZWJ when matching input.
        const MANUAL_ZWJ = 1 << 3;
        /// Look in every language system when the selected one lacks the feature.
        const GLOBAL_SEARCH = 1 << 4;
        /// Pick alternates at random.
        const RANDOM = 1 << 5;
        const MANUAL_JOINERS = Self::MANUAL_ZWNJ.bits() | Self::MANUAL_ZWJ.bits();
        const GLOBAL_MANUAL_JOINERS = Self::GLOBAL.bits() | Self::MANUAL_JOINERS.bits();
        const GLOBAL_HAS_FALLBACK = Self::GLOBAL.bits() | Self::HAS_FALLBACK.bits();
    }
}

/// One of the two OpenType layout tables.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TableIndex {
    Gsub,
    Gpos,
}

impl TableIndex {
    pub(crate) fn index(self) -> usize {
        match self {
            TableIndex::Gsub => 0,
            TableIndex::Gpos => 1,
        }
    }
}

/// A feature requested by the caller, over a range of cluster values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Feature {
    pub tag: u32,
    pub value: u32,
    pub start: usize,
    pub end: usize,
}

impl Feature {
    pub const GLOBAL_START: usize = 0;
    pub const GLOBAL_END: usize = usize::MAX;

    /// A feature applying to the whole buffer.
    pub fn new(tag: u32, value: u32) -> Feature {
        Feature {
            tag,
            value,
            start: Feature::GLOBAL_START,
            end: Feature::GLOBAL_END,
        }
    }

    pub fn is_global(&self) -> bool {
        self.start == Feature::GLOBAL_START && self.end == Feature::GLOBAL_END
    }
}

/// Parses the syntax `[+|-]tag[[start:end]][=value]`.
///
/// `-` disables the feature. A single index `[n]` selects the cluster `n` alone, and the
/// value may also be written `on` or `off`.
impl FromStr for Feature {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Feature, ParseError> {
        let s = s.trim();
        let (value, s) = match s.as_bytes().first() {
            Some(b'-') => (0, &s[1..]),
            Some(b'+') => (1, &s[1..]),
            _ => (1, s),
        };

        let tag_end = s.find(|c: char| c == '[' || c == '=').unwrap_or(s.len());
        let tag = parse_tag(s[..tag_end].trim())?;
        let mut feature = Feature::new(tag, value);
        let mut rest = &s[tag_end..];

        if let Some(range) = rest.strip_prefix('[') {
            let close = range.find(']').ok_or(ParseError::BadValue)?;
            let (start, end) = parse_range(&range[..close])?;
            feature.start = start;
            feature.end = end;
            rest = &range[close + 1..];
        }

        if let Some(value) = rest.strip_prefix('=') {
            feature.value = match value.trim() {
                "on" => 1,
                "off" => 0,
                value => value.parse::<u32>().map_err(|_| ParseError::BadValue)?,
            };
        } else if !rest.trim().is_empty() {
            return Err(ParseError::BadValue);
        }

        Ok(feature)
    }
}

fn parse_tag(s: &str) -> Result<u32, ParseError> {
    let s = s.trim_matches(|c: char| c == '"' || c == '\'');
    if s.is_empty() || s.len() > 4 || !s.is_ascii() {
        return Err(ParseError::BadValue);
    }
    // Short tags are padded with spaces.
    let mut bytes = [b' '; 4];
    bytes[..s.len()].copy_from_slice(s.as_bytes());
    Ok(u32::from_be_bytes(bytes))
}

fn parse_range(s: &str) -> Result<(usize, usize), ParseError> {
    let parse_bound = |bound: &str, default: usize| match bound.trim() {
        "" => Ok(default),
        bound => bound.parse::<usize>().map_err(|_| ParseError::BadValue),
    };
    match s.split_once(':') {
        Some((start, end)) => Ok((
            parse_bound(start, Feature::GLOBAL_START)?,
            parse_bound(end, Feature::GLOBAL_END)?,
        )),
        None => {
            let start = parse_bound(s, Feature::GLOBAL_START)?;
            Ok((start, start.saturating_add(1)))
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value == 0 {
            f.write_str("-")?;
        }
        let tag = self.tag.to_be_bytes();
        f.write_str(String::from_utf8_lossy(&tag).trim_end())?;
        if !self.is_global() {
            f.write_str("[")?;
            if self.start != Feature::GLOBAL_START {
                write!(f, "{}", self.start)?;
            }
            f.write_str(":")?;
            if self.end != Feature::GLOBAL_END {
                write!(f, "{}", self.end)?;
            }
            f.write_str("]")?;
        }
        if self.value > 1 {
            write!(f, "={}", self.value)?;
        }
        Ok(())
    }
}

/// A function run between two stages of lookups.
pub type PauseFn = fn(&ShapePlan, &dyn FontFace, &mut Buffer);

#[derive(Clone, Copy)]
struct FeatureInfo {
    tag: u32,
    max_value: u32,
    flags: FeatureFlags,
    /// The value of glyphs outside the ranges of a non-global feature.
    default_value: u32,
    stage: [usize; 2],
}

struct StageInfo {
    index: usize,
    pause: Option<PauseFn>,
}

/// The script and language system chosen for one layout table.
struct TableSelection<'a> {
    chosen_script: Option<u32>,
    found_script: bool,
    langsys: Option<&'a LangSys>,
}

impl<'a> TableSelection<'a> {
    fn new<T: LayoutTableType>(
        table: Option<&'a LayoutTable<T>>,
        script_tags: &[u32],
        language: Option<u32>,
    ) -> TableSelection<'a> {
        match table.and_then(|table| table.select_script(script_tags)) {
            Some((script_tag, script_table)) => TableSelection {
                chosen_script: Some(script_tag),
                found_script: script_tags.contains(&script_tag),
                langsys: script_table.find_langsys_or_default(language),
            },
            None => TableSelection {
                chosen_script: None,
                found_script: false,
                langsys: None,
            },
        }
    }
}

/// Collects feature requests and pauses for one shape plan.
pub struct MapBuilder<'a> {
    gsub: Option<&'a LayoutTable<GSUB>>,
    gpos: Option<&'a LayoutTable<GPOS>>,
    selections: [TableSelection<'a>; 2],
    current_stage: [usize; 2],
    feature_infos: Vec<FeatureInfo>,
    stages: [Vec<StageInfo>; 2],
}

impl<'a> MapBuilder<'a> {
    pub fn new(face: &'a dyn FontFace, props: &SegmentProperties) -> MapBuilder<'a> {
        let script_tags = unicode::ot_script_tags(props.script);
        let gsub = face.gsub();
        let gpos = face.gpos();
        let selections = [
            TableSelection::new(gsub, &script_tags, props.language),
            TableSelection::new(gpos, &script_tags, props.language),
        ];
        MapBuilder {
            gsub,
            gpos,
            selections,
            current_stage: [0; 2],
            feature_infos: Vec::new(),
            stages: [Vec::new(), Vec::new()],
        }
    }

    /// The script tag selected in `table`, if the table has any usable script.
    pub fn chosen_script(&self, table: TableIndex) -> Option<u32> {
        self.selections[table.index()].chosen_script
    }

    pub fn add_feature_ext(&mut self, tag: u32, flags: FeatureFlags, value: u32) {
        let default_value = if flags.contains(FeatureFlags::GLOBAL) {
            value
        } else {
            0
        };
        self.feature_infos.push(FeatureInfo {
            tag,
            max_value: value,
            flags,
            default_value,
            stage: self.current_stage,
        });
    }

    pub fn enable_feature_ext(&mut self, tag: u32, flags: FeatureFlags, value: u32) {
        self.add_feature_ext(tag, FeatureFlags::GLOBAL | flags, value)
    }

    /// Turn `tag` on everywhere.
    pub fn enable_feature(&mut self, tag: u32) {
        self.enable_feature_ext(tag, FeatureFlags::empty(), 1)
    }

    /// Allocate mask bits for `tag` without turning it on.
    pub fn add_feature(&mut self, tag: u32) {
        self.add_feature_ext(tag, FeatureFlags::empty(), 1)
    }

    pub fn disable_feature(&mut self, tag: u32) {
        self.add_feature_ext(tag, FeatureFlags::GLOBAL, 0)
    }

    fn add_pause(&mut self, table: TableIndex, pause: Option<PauseFn>) {
        let table = table.index();
        self.stages[table].push(StageInfo {
            index: self.current_stage[table],
            pause,
        });
        self.current_stage[table] += 1;
    }

    /// End the current `GSUB` stage, running `pause` before the next one.
    pub fn add_gsub_pause(&mut self, pause: Option<PauseFn>) {
        self.add_pause(TableIndex::Gsub, pause)
    }

    pub fn add_gpos_pause(&mut self, pause: Option<PauseFn>) {
        self.add_pause(TableIndex::Gpos, pause)
    }

    pub fn compile(mut self) -> FeatureMap {
        let mut map = FeatureMap {
            chosen_script: [self.selections[0].chosen_script, self.selections[1].chosen_script],
            found_script: [self.selections[0].found_script, self.selections[1].found_script],
            global_mask: GLOBAL_BIT_MASK,
            features: Vec::new(),
            lookups: [Vec::new(), Vec::new()],
            stages: [Vec::new(), Vec::new()],
        };

        let required_features = [
            self.required_feature(TableIndex::Gsub),
            self.required_feature(TableIndex::Gpos),
        ];
        // The required feature is applied in stage 0 unless a feature with its tag is
        // registered, in which case it runs in that feature's stage.
        let mut required_stage = [0; 2];

        let feature_infos = merge_feature_infos(std::mem::take(&mut self.feature_infos));
        let mut next_bit = GLOBAL_BIT_SHIFT + 1;
        for info in feature_infos {
            let uses_global_bit = info.flags.contains(FeatureFlags::GLOBAL) && info.max_value == 1;
            let bits_needed = if uses_global_bit {
                0
            } else {
                MAX_BITS.min(bit_storage(info.max_value))
            };
            if info.max_value == 0 {
                continue;
            }
            if next_bit + bits_needed > Mask::BITS {
                warn!(
                    "no mask bits left for feature '{}', ignoring it",
                    Feature::new(info.tag, 1)
                );
                continue;
            }

            for (table, required) in required_features.iter().enumerate() {
                if let Some((_, required_tag)) = required {
                    if *required_tag == info.tag {
                        required_stage[table] = info.stage[table];
                    }
                }
            }

            let mut index = [
                self.find_feature(TableIndex::Gsub, info.tag),
                self.find_feature(TableIndex::Gpos, info.tag),
            ];
            let mut found = index.iter().any(Option::is_some);
            if !found && info.flags.contains(FeatureFlags::GLOBAL_SEARCH) {
                index = [
                    self.gsub.and_then(|gsub| gsub.find_feature_anywhere(info.tag)),
                    self.gpos.and_then(|gpos| gpos.find_feature_anywhere(info.tag)),
                ];
                found = index.iter().any(Option::is_some);
            }
            if !found && !info.flags.contains(FeatureFlags::HAS_FALLBACK) {
                continue;
            }

            let (shift, mask) = if uses_global_bit {
                (GLOBAL_BIT_SHIFT, GLOBAL_BIT_MASK)
            } else {
                let shift = next_bit;
                let mask = (1 << (next_bit + bits_needed)) - (1 << next_bit);
                next_bit += bits_needed;
                map.global_mask |= (info.default_value << shift) & mask;
                (shift, mask)
            };
            map.features.push(FeatureMapEntry {
                tag: info.tag,
                index,
                stage: info.stage,
                shift,
                mask,
                one_mask: (1 << shift) & mask,
                needs_fallback: !found,
                auto_zwnj: !info.flags.contains(FeatureFlags::MANUAL_ZWNJ),
                auto_zwj: !info.flags.contains(FeatureFlags::MANUAL_ZWJ),
                random: info.flags.contains(FeatureFlags::RANDOM),
            });
        }

        self.add_gsub_pause(None);
        self.add_gpos_pause(None);

        for table in [TableIndex::Gsub, TableIndex::Gpos] {
            let t = table.index();
            let mut stage_index = 0;
            let mut last_num_lookups = 0;
            for stage in 0..self.current_stage[t] {
                if let Some((required_index, _)) = required_features[t] {
                    if required_stage[t] == stage {
                        let lookups = self.feature_lookups(table, required_index);
                        map.add_lookups(t, lookups, GLOBAL_BIT_MASK, true, true, false);
                    }
                }

                for feature in &map.features {
                    if feature.stage[t] != stage {
                        continue;
                    }
                    if let Some(feature_index) = feature.index[t] {
                        let lookups = self.feature_lookups(table, feature_index);
                        map.lookups[t].extend(lookups.iter().map(|&index| LookupMap {
                            index,
                            mask: feature.mask,
                            auto_zwnj: feature.auto_zwnj,
                            auto_zwj: feature.auto_zwj,
                            random: feature.random,
                        }));
                    }
                }

                merge_stage_lookups(&mut map.lookups[t], last_num_lookups);
                last_num_lookups = map.lookups[t].len();

                if let Some(stage_info) = self.stages[t].get(stage_index) {
                    if stage_info.index == stage {
                        map.stages[t].push(StageMap {
                            last_lookup: last_num_lookups,
                            pause: stage_info.pause,
                        });
                        stage_index += 1;
                    }
                }
            }
        }

        debug!(
            "compiled {} features, global mask {:#x}",
            map.features.len(),
            map.global_mask
        );
        map
    }

    fn required_feature(&self, table: TableIndex) -> Option<(u16, u32)> {
        let langsys = self.selections[table.index()].langsys?;
        let feature_index = langsys.required_feature_index()?;
        let tag = match table {
            TableIndex::Gsub => self.gsub?.feature_record(feature_index).ok()?.feature_tag,
            TableIndex::Gpos => self.gpos?.feature_record(feature_index).ok()?.feature_tag,
        };
        Some((feature_index, tag))
    }

    fn find_feature(&self, table: TableIndex, tag: u32) -> Option<u16> {
        let langsys = self.selections[table.index()].langsys?;
        match table {
            TableIndex::Gsub => self.gsub?.find_langsys_feature(langsys, tag),
            TableIndex::Gpos => self.gpos?.find_langsys_feature(langsys, tag),
        }
    }

    fn feature_lookups(&self, table: TableIndex, feature_index: u16) -> &'a [u16] {
        let record = match table {
            TableIndex::Gsub => self.gsub.map(|gsub| gsub.feature_record(feature_index)),
            TableIndex::Gpos => self.gpos.map(|gpos| gpos.feature_record(feature_index)),
        };
        match record {
            Some(Ok(record)) => &record.lookup_indices,
            _ => &[],
        }
    }
}

/// Sort by tag and fold repeated requests for the same feature into one.
fn merge_feature_infos(mut infos: Vec<FeatureInfo>) -> Vec<FeatureInfo> {
    infos.sort_by_key(|info| info.tag);
    let mut merged: Vec<FeatureInfo> = Vec::with_capacity(infos.len());
    for info in infos {
        let last = match merged.last_mut() {
            Some(last) if last.tag == info.tag => last,
            _ => {
                merged.push(info);
                continue;
            }
        };
        if info.flags.contains(FeatureFlags::GLOBAL) {
            last.flags |= FeatureFlags::GLOBAL;
            last.max_value = info.max_value;
            last.default_value = info.default_value;
        } else {
            last.flags.remove(FeatureFlags::GLOBAL);
            last.max_value = last.max_value.max(info.max_value);
        }
        last.flags |= info.flags & FeatureFlags::HAS_FALLBACK;
        last.stage[0] = last.stage[0].min(info.stage[0]);
        last.stage[1] = last.stage[1].min(info.stage[1]);
    }
    merged
}

/// Sort the lookups added for one stage and merge duplicates.
fn merge_stage_lookups(lookups: &mut Vec<LookupMap>, start: usize) {
    if lookups.len() <= start {
        return;
    }
    lookups[start..].sort_by_key(|lookup| lookup.index);
    let mut j = start;
    for i in start + 1..lookups.len() {
        if lookups[i].index != lookups[j].index {
            j += 1;
            lookups[j] = lookups[i];
        } else {
            lookups[j].mask |= lookups[i].mask;
            lookups[j].auto_zwnj &= lookups[i].auto_zwnj;
            lookups[j].auto_zwj &= lookups[i].auto_zwj;
        }
    }
    lookups.truncate(j + 1);
}

/// The number of bits needed to store `value`.
fn bit_storage(value: u32) -> u32 {
    Mask::BITS - value.leading_zeros()
}

struct FeatureMapEntry {
    tag: u32,
    index: [Option<u16>; 2],
    stage: [usize; 2],
    shift: u32,
    mask: Mask,
    one_mask: Mask,
    needs_fallback: bool,
    auto_zwnj: bool,
    auto_zwj: bool,
    random: bool,
}

/// A lookup scheduled for application, with the glyph mask it applies under.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LookupMap {
    pub index: u16,
    pub mask: Mask,
    pub auto_zwnj: bool,
    pub auto_zwj: bool,
    pub random: bool,
}

#[derive(Clone, Copy)]
struct StageMap {
    /// Cumulative lookup count at the end of the stage.
    last_lookup: usize,
    pause: Option<PauseFn>,
}

/// The compiled feature map of a shape plan.
pub struct FeatureMap {
    chosen_script: [Option<u32>; 2],
    found_script: [bool; 2],
    global_mask: Mask,
    /// Sorted by tag.
    features: Vec<FeatureMapEntry>,
    lookups: [Vec<LookupMap>; 2],
    stages: [Vec<StageMap>; 2],
}

impl FeatureMap {
    fn add_lookups(
        &mut self,
        table: usize,
        lookup_indices: &[u16],
        mask: Mask,
        auto_zwnj: bool,
        auto_zwj: bool,
        random: bool,
    ) {
        self.lookups[table].extend(lookup_indices.iter().map(|&index| LookupMap {
            index,
            mask,
            auto_zwnj,
            auto_zwj,
            random,
        }));
    }

    fn feature(&self, tag: u32) -> Option<&FeatureMapEntry> {
        self.features
            .binary_search_by_key(&tag, |feature| feature.tag)
            .ok()
            .map(|index| &self.features[index])
    }

    /// The bits every glyph starts with.
    pub fn global_mask(&self) -> Mask {
        self.global_mask
    }

    /// The mask and shift of the bits allocated to `tag`, `(0, 0)` if it has none.
    pub fn mask(&self, tag: u32) -> (Mask, u32) {
        self.feature(tag)
            .map_or((0, 0), |feature| (feature.mask, feature.shift))
    }

    /// The mask selecting value 1 of `tag`.
    pub fn one_mask(&self, tag: u32) -> Mask {
        self.feature(tag).map_or(0, |feature| feature.one_mask)
    }

    /// Whether `tag` got mask bits without being found in the font.
    pub fn needs_fallback(&self, tag: u32) -> bool {
        self.feature(tag).is_some_and(|feature| feature.needs_fallback)
    }

    pub fn feature_index(&self, table: TableIndex, tag: u32) -> Option<u16> {
        self.feature(tag)
            .and_then(|feature| feature.index[table.index()])
    }

    pub fn feature_stage(&self, table: TableIndex, tag: u32) -> Option<usize> {
        self.feature(tag).map(|feature| feature.stage[table.index()])
    }

    pub fn chosen_script(&self, table: TableIndex) -> Option<u32> {
        self.chosen_script[table.index()]
    }

    /// Whether `table` has one of the tags of the buffer's script, as opposed to a
    /// fallback script.
    pub fn found_script(&self, table: TableIndex) -> bool {
        self.found_script[table.index()]
    }

    pub fn lookups(&self, table: TableIndex) -> &[LookupMap] {
        &self.lookups[table.index()]
    }

    /// The lookups of stage `stage` of `table`.
    pub fn stage_lookups(&self, table: TableIndex, stage: usize) -> &[LookupMap] {
        let t = table.index();
        let stages = &self.stages[t];
        if stage > stages.len() {
            return &[];
        }
        let start = match stage {
            0 => 0,
            _ => stages[stage - 1].last_lookup,
        };
        let end = stages
            .get(stage)
            .map_or(self.lookups[t].len(), |stage| stage.last_lookup);
        &self.lookups[t][start..end]
    }

    /// Apply the lookups of table `T` stage by stage, running each stage's pause after
    /// its lookups.
    pub(crate) fn apply<T: ApplyTable>(
        &self,
        plan: &ShapePlan,
        face: &dyn FontFace,
        buffer: &mut Buffer,
    ) {
        let t = T::TABLE_INDEX.index();
        let table = T::layout_table(face);
        let mut random_state = 1;
        let mut i = 0;
        for stage in &self.stages[t] {
            if let Some(table) = table {
                let mut ctx = ApplyContext::new(face, table, buffer);
                ctx.random_state = random_state;
                for lookup in &self.lookups[t][i..stage.last_lookup] {
                    ctx.apply_string(lookup);
                }
                random_state = ctx.random_state;
            }
            i = stage.last_lookup;
            if let Some(pause) = stage.pause {
                pause(plan, face, buffer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::buffer::Direction;
    use crate::layout::tests::gsub_single_subst_extension;
    use crate::tag;
    use crate::tests::TestFace;
    use crate::unicode::script;

    fn latin_props() -> SegmentProperties {
        SegmentProperties {
            direction: Direction::LeftToRight,
            script: script::LATIN,
            language: None,
        }
    }

    #[test]
    fn parse_features() {
        let feature = "kern".parse::<Feature>().unwrap();
        assert_eq!(feature, Feature::new(tag!(b"kern"), 1));
        assert!(feature.is_global());

        let feature = "-liga".parse::<Feature>().unwrap();
        assert_eq!(feature, Feature::new(tag!(b"liga"), 0));

        let feature = "aalt=2".parse::<Feature>().unwrap();
        assert_eq!(feature.value, 2);

        let feature = "+smcp[3:5]".parse::<Feature>().unwrap();
        assert_eq!((feature.start, feature.end, feature.value), (3, 5, 1));

        let feature = "cv01[7]=off".parse::<Feature>().unwrap();
        assert_eq!((feature.start, feature.end, feature.value), (7, 8, 0));

        let feature = "ss1[2:]".parse::<Feature>().unwrap();
        assert_eq!(feature.tag, tag!(b"ss1 "));
        assert_eq!((feature.start, feature.end), (2, Feature::GLOBAL_END));
    }

    #[test]
    fn reject_bad_features() {
        assert!("".parse::<Feature>().is_err());
        assert!("toolong".parse::<Feature>().is_err());
        assert!("kern[1".parse::<Feature>().is_err());
        assert!("kern=x".parse::<Feature>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for s in ["kern", "-liga", "aalt=3", "smcp[3:5]", "ss01[:4]"] {
            let feature = s.parse::<Feature>().unwrap();
            assert_eq!(feature.to_string(), s);
        }
    }

    #[test]
    fn allocate_mask_bits() {
        let face = TestFace::new();
        let mut builder = MapBuilder::new(&face, &latin_props());
        builder.enable_feature_ext(tag!(b"aalt"), FeatureFlags::HAS_FALLBACK, 3);
        builder.add_feature_ext(tag!(b"smcp"), FeatureFlags::HAS_FALLBACK, 1);
        builder.enable_feature_ext(tag!(b"kern"), FeatureFlags::HAS_FALLBACK, 1);
        // not in the font and no fallback
        builder.enable_feature(tag!(b"liga"));
        let map = builder.compile();

        assert_eq!(map.mask(tag!(b"kern")), (GLOBAL_BIT_MASK, GLOBAL_BIT_SHIFT));
        assert_eq!(map.mask(tag!(b"aalt")), (0b1100, 2));
        assert_eq!(map.one_mask(tag!(b"aalt")), 0b0100);
        assert_eq!(map.mask(tag!(b"smcp")), (0b10000, 4));
        assert_eq!(map.mask(tag!(b"liga")), (0, 0));
        assert!(map.needs_fallback(tag!(b"smcp")));
        // aalt defaults to 3, smcp to 0
        assert_eq!(map.global_mask(), GLOBAL_BIT_MASK | 0b1100);
    }

    #[test]
    fn later_requests_override_earlier_ones() {
        let face = TestFace::new();
        let mut builder = MapBuilder::new(&face, &latin_props());
        builder.enable_feature_ext(tag!(b"calt"), FeatureFlags::HAS_FALLBACK, 1);
        builder.disable_feature(tag!(b"calt"));
        builder.add_feature_ext(tag!(b"salt"), FeatureFlags::HAS_FALLBACK, 1);
        builder.add_feature_ext(tag!(b"salt"), FeatureFlags::empty(), 5);
        let map = builder.compile();
        assert_eq!(map.mask(tag!(b"calt")), (0, 0));
        // max(1, 5) needs three bits
        assert_eq!(map.mask(tag!(b"salt")), (0b11100, 2));
    }

    #[test]
    fn running_out_of_bits() {
        let face = TestFace::new();
        let mut builder = MapBuilder::new(&face, &latin_props());
        for i in 0..5u8 {
            builder.add_feature_ext(
                u32::from_be_bytes([b's', b's', b'0', b'0' + i]),
                FeatureFlags::HAS_FALLBACK,
                MAX_VALUE,
            );
        }
        let map = builder.compile();
        // 30 bits are free after the two reserved ones: three features fit
        let allocated = (0..5u8)
            .filter(|&i| map.mask(u32::from_be_bytes([b's', b's', b'0', b'0' + i])).0 != 0)
            .count();
        assert_eq!(allocated, 3);
    }

    #[test]
    fn schedule_lookups_in_stages() {
        let data = gsub_single_subst_extension(3, 10);
        let mut face = TestFace::new();
        face.gsub = Some(ReadScope::new(&data).read::<LayoutTable<GSUB>>().unwrap());

        fn pause(_: &ShapePlan, _: &dyn FontFace, _: &mut Buffer) {}

        let mut builder = MapBuilder::new(&face, &latin_props());
        assert_eq!(builder.chosen_script(TableIndex::Gsub), Some(tag::LATN));
        builder.enable_feature(tag!(b"ccmp"));
        builder.add_gsub_pause(Some(pause));
        builder.enable_feature(tag!(b"liga"));
        let map = builder.compile();

        assert!(map.found_script(TableIndex::Gsub));
        assert_eq!(map.chosen_script(TableIndex::Gpos), None);
        assert_eq!(map.feature_index(TableIndex::Gsub, tag!(b"liga")), Some(0));
        assert_eq!(map.feature_stage(TableIndex::Gsub, tag!(b"liga")), Some(1));
        assert!(map.stage_lookups(TableIndex::Gsub, 0).is_empty());
        let lookups = map.stage_lookups(TableIndex::Gsub, 1);
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0].index, 0);
        assert_eq!(lookups[0].mask, GLOBAL_BIT_MASK);
    }

    #[test]
    fn fallback_script_is_not_found() {
        let data = gsub_single_subst_extension(3, 10);
        let mut face = TestFace::new();
        face.gsub = Some(ReadScope::new(&data).read::<LayoutTable<GSUB>>().unwrap());
        let props = SegmentProperties {
            direction: Direction::RightToLeft,
            script: script::ARABIC,
            language: None,
        };
        let map = MapBuilder::new(&face, &props).compile();
        assert_eq!(map.chosen_script(TableIndex::Gsub), Some(tag::LATN));
        assert!(!map.found_script(TableIndex::Gsub));
    }
}
