//! The glyph buffer shaped by the OpenType and Graphite shapers.
//!
//! A buffer starts out holding Unicode characters and ends up holding glyph ids and their
//! positions. Substitution passes read from `info` at the cursor and write to a separate
//! output vector which replaces `info` when the pass finishes.

use std::fmt::Write;

use bitflags::bitflags;
use tinyvec::ArrayVec;

use crate::unicode::{self, GeneralCategory, Script, SpaceType};

/// Per-glyph feature mask.
pub type Mask = u32;

/// Breaking the text before this glyph would change the shaping result.
pub const GLYPH_FLAG_UNSAFE_TO_BREAK: Mask = 0x0000_0001;
/// All glyph flags that are visible to callers.
pub const GLYPH_FLAG_DEFINED: Mask = GLYPH_FLAG_UNSAFE_TO_BREAK;

/// Maximum number of context characters kept on either side of the buffer contents.
pub const CONTEXT_LENGTH: usize = 5;

const IS_LIG_BASE: u8 = 0x10;

/// Text direction of a buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Invalid,
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
}

impl Direction {
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::LeftToRight | Direction::RightToLeft)
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::TopToBottom | Direction::BottomToTop)
    }

    pub fn is_forward(self) -> bool {
        matches!(self, Direction::LeftToRight | Direction::TopToBottom)
    }

    pub fn is_backward(self) -> bool {
        matches!(self, Direction::RightToLeft | Direction::BottomToTop)
    }

    pub fn reverse(self) -> Direction {
        match self {
            Direction::LeftToRight => Direction::RightToLeft,
            Direction::RightToLeft => Direction::LeftToRight,
            Direction::TopToBottom => Direction::BottomToTop,
            Direction::BottomToTop => Direction::TopToBottom,
            Direction::Invalid => Direction::Invalid,
        }
    }

    /// The horizontal direction `script` is written in.
    pub fn from_script(script: Script) -> Direction {
        if unicode::is_rtl_script(script) {
            Direction::RightToLeft
        } else {
            Direction::LeftToRight
        }
    }
}

bitflags! {
    /// Flags that control how a buffer is shaped.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct BufferFlags: u32 {
        /// The buffer starts at the beginning of a paragraph.
        const BOT = 1 << 0;
        /// The buffer ends at the end of a paragraph.
        const EOT = 1 << 1;
        /// Default ignorable characters keep the glyph the font gives them.
        const PRESERVE_DEFAULT_IGNORABLES = 1 << 2;
        /// Default ignorable characters are removed rather than hidden.
        const REMOVE_DEFAULT_IGNORABLES = 1 << 3;
        /// Broken clusters are not given a dotted circle base.
        const DO_NOT_INSERT_DOTTED_CIRCLE = 1 << 4;
    }
}

bitflags! {
    /// Signals set while shaping a buffer, so later stages can skip work.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct ScratchFlags: u32 {
        const HAS_NON_ASCII = 1 << 0;
        const HAS_DEFAULT_IGNORABLES = 1 << 1;
        const HAS_SPACE_FALLBACK = 1 << 2;
        const HAS_GPOS_ATTACHMENT = 1 << 3;
        const HAS_UNSAFE_TO_BREAK = 1 << 4;
        const HAS_CGJ = 1 << 5;
        /// Reserved for the Arabic shaper: the buffer holds `stch` glyphs.
        const ARABIC_HAS_STCH = 1 << 24;
    }
}

bitflags! {
    /// Unicode properties packed into a glyph.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct UnicodeProps: u16 {
        const GENERAL_CATEGORY = 0x001F;
        const IGNORABLE = 0x0020;
        /// Mongolian free variation selectors, tag characters and CGJ.
        const HIDDEN = 0x0040;
        const CONTINUATION = 0x0080;
        // Top byte when the category is Format.
        const CF_ZWJ = 0x0100;
        const CF_ZWNJ = 0x0200;
    }
}

bitflags! {
    /// Glyph class and substitution history of a glyph.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct GlyphProps: u16 {
        // These match the LookupFlag ignore bits.
        const BASE_GLYPH = 0x02;
        const LIGATURE = 0x04;
        const MARK = 0x08;
        const CLASS_MASK = Self::BASE_GLYPH.bits() | Self::LIGATURE.bits() | Self::MARK.bits();

        const SUBSTITUTED = 0x10;
        const LIGATED = 0x20;
        const MULTIPLIED = 0x40;
        const PRESERVE = Self::SUBSTITUTED.bits() | Self::LIGATED.bits() | Self::MULTIPLIED.bits();
    }
}

/// How clusters are formed and merged.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ClusterLevel {
    #[default]
    MonotoneGraphemes,
    MonotoneCharacters,
    Characters,
}

/// The segment properties of a buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct SegmentProperties {
    pub direction: Direction,
    /// ISO 15924 script tag, 0 when unset.
    pub script: Script,
    /// OpenType language system tag.
    pub language: Option<u32>,
}

/// A character, or after substitution a glyph, in the buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct GlyphInfo {
    /// A Unicode scalar value before substitution, a glyph id after.
    pub codepoint: u32,
    pub cluster: u32,
    pub mask: Mask,
    pub(crate) unicode_props: UnicodeProps,
    pub(crate) mcc_or_space: u8,
    pub(crate) glyph_props: GlyphProps,
    pub(crate) lig_props: u8,
    pub(crate) syllable: u8,
    /// Shaper specific character category.
    pub(crate) complex_category: u8,
    /// Shaper specific auxiliary value, such as the Arabic joining action.
    pub(crate) complex_aux: u8,
    /// The glyph a character maps to, recorded during normalization.
    pub(crate) glyph_index: u32,
}

/// The position of a glyph.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct GlyphPosition {
    pub x_advance: i32,
    pub y_advance: i32,
    pub x_offset: i32,
    pub y_offset: i32,
    /// Offset to the glyph this one is attached to, 0 when unattached.
    pub(crate) attach_chain: i16,
    pub(crate) attach_type: u8,
}

impl GlyphInfo {
    pub fn new(codepoint: u32, cluster: u32) -> GlyphInfo {
        GlyphInfo {
            codepoint,
            cluster,
            ..GlyphInfo::default()
        }
    }

    pub fn unsafe_to_break(&self) -> bool {
        self.mask & GLYPH_FLAG_UNSAFE_TO_BREAK != 0
    }

    pub(crate) fn init_unicode_props(&mut self, scratch_flags: &mut ScratchFlags) {
        let ch = self.codepoint;
        let gen_cat = unicode::general_category(ch);
        let mut props = UnicodeProps::from_bits_truncate(gen_cat as u16);
        let mut mcc = 0;

        if ch >= 0x80 {
            *scratch_flags |= ScratchFlags::HAS_NON_ASCII;

            if unicode::is_default_ignorable(ch) {
                props |= UnicodeProps::IGNORABLE;
                *scratch_flags |= ScratchFlags::HAS_DEFAULT_IGNORABLES;

                match ch {
                    0x200C => props |= UnicodeProps::CF_ZWNJ,
                    0x200D => props |= UnicodeProps::CF_ZWJ,
                    // Mongolian free variation selectors are marks that must not be skipped
                    // during shaping even though they are hidden afterwards.
                    0x180B..=0x180D | 0x180F => props |= UnicodeProps::HIDDEN,
                    0xE0020..=0xE007F => props |= UnicodeProps::HIDDEN,
                    0x034F => {
                        props |= UnicodeProps::HIDDEN;
                        *scratch_flags |= ScratchFlags::HAS_CGJ;
                    }
                    _ => {}
                }
            }

            if gen_cat.is_mark() {
                props |= UnicodeProps::CONTINUATION;
                mcc = unicode::modified_combining_class(ch);
            }
        }

        self.unicode_props = props;
        self.mcc_or_space = mcc;
    }

    pub(crate) fn general_category(&self) -> GeneralCategory {
        GeneralCategory::from_u8((self.unicode_props & UnicodeProps::GENERAL_CATEGORY).bits() as u8)
    }

    pub(crate) fn set_general_category(&mut self, gen_cat: GeneralCategory) {
        self.unicode_props = (self.unicode_props - UnicodeProps::GENERAL_CATEGORY)
            | UnicodeProps::from_bits_truncate(gen_cat as u16);
    }

    pub(crate) fn is_unicode_mark(&self) -> bool {
        self.general_category().is_mark()
    }

    pub(crate) fn is_unicode_space(&self) -> bool {
        self.general_category() == GeneralCategory::SpaceSeparator
    }

    pub(crate) fn space_fallback(&self) -> SpaceType {
        if self.is_unicode_space() {
            SpaceType::from_u8(self.mcc_or_space)
        } else {
            SpaceType::NotSpace
        }
    }

    pub(crate) fn set_space_fallback(&mut self, space: SpaceType) {
        if self.is_unicode_space() {
            self.mcc_or_space = space as u8;
        }
    }

    pub(crate) fn modified_combining_class(&self) -> u8 {
        if self.is_unicode_mark() {
            self.mcc_or_space
        } else {
            0
        }
    }

    pub(crate) fn set_modified_combining_class(&mut self, mcc: u8) {
        if self.is_unicode_mark() {
            self.mcc_or_space = mcc;
        }
    }

    pub(crate) fn is_zwnj(&self) -> bool {
        self.general_category() == GeneralCategory::Format
            && self.unicode_props.contains(UnicodeProps::CF_ZWNJ)
    }

    pub(crate) fn is_zwj(&self) -> bool {
        self.general_category() == GeneralCategory::Format
            && self.unicode_props.contains(UnicodeProps::CF_ZWJ)
    }

    pub(crate) fn is_joiner(&self) -> bool {
        self.general_category() == GeneralCategory::Format
            && self
                .unicode_props
                .intersects(UnicodeProps::CF_ZWJ | UnicodeProps::CF_ZWNJ)
    }

    pub(crate) fn is_hidden(&self) -> bool {
        self.unicode_props.contains(UnicodeProps::HIDDEN)
    }

    pub(crate) fn unhide(&mut self) {
        self.unicode_props.remove(UnicodeProps::HIDDEN);
    }

    pub(crate) fn is_continuation(&self) -> bool {
        self.unicode_props.contains(UnicodeProps::CONTINUATION)
    }

    pub(crate) fn set_continuation(&mut self) {
        self.unicode_props.insert(UnicodeProps::CONTINUATION);
    }

    pub(crate) fn reset_continuation(&mut self) {
        self.unicode_props.remove(UnicodeProps::CONTINUATION);
    }

    /// Default ignorables stop being ignorable once a substitution touched them.
    pub(crate) fn is_default_ignorable(&self) -> bool {
        self.unicode_props.contains(UnicodeProps::IGNORABLE) && !self.is_substituted()
    }

    pub(crate) fn is_default_ignorable_and_not_hidden(&self) -> bool {
        self.is_default_ignorable() && !self.is_hidden()
    }

    pub(crate) fn clear_default_ignorable(&mut self) {
        self.unicode_props.remove(UnicodeProps::IGNORABLE);
    }

    // Ligature properties: the top three bits hold the ligature id, bit 4 marks the
    // ligature glyph itself and the low four bits hold either the number of components
    // (ligature glyph) or the component a mark belongs to.

    pub(crate) fn set_lig_props_for_ligature(&mut self, lig_id: u8, lig_num_comps: u8) {
        self.lig_props = (lig_id << 5) | IS_LIG_BASE | (lig_num_comps & 0x0F);
    }

    pub(crate) fn set_lig_props_for_mark(&mut self, lig_id: u8, lig_comp: u8) {
        self.lig_props = (lig_id << 5) | (lig_comp & 0x0F);
    }

    pub(crate) fn set_lig_props_for_component(&mut self, comp: u8) {
        self.set_lig_props_for_mark(0, comp);
    }

    pub(crate) fn lig_id(&self) -> u8 {
        self.lig_props >> 5
    }

    fn is_ligated_internal(&self) -> bool {
        self.lig_props & IS_LIG_BASE != 0
    }

    pub(crate) fn lig_comp(&self) -> u8 {
        if self.is_ligated_internal() {
            0
        } else {
            self.lig_props & 0x0F
        }
    }

    pub(crate) fn lig_num_comps(&self) -> u8 {
        if self.glyph_props.contains(GlyphProps::LIGATURE) && self.is_ligated_internal() {
            self.lig_props & 0x0F
        } else {
            1
        }
    }

    pub(crate) fn is_base_glyph(&self) -> bool {
        self.glyph_props.contains(GlyphProps::BASE_GLYPH)
    }

    pub(crate) fn is_ligature(&self) -> bool {
        self.glyph_props.contains(GlyphProps::LIGATURE)
    }

    pub(crate) fn is_mark(&self) -> bool {
        self.glyph_props.contains(GlyphProps::MARK)
    }

    pub(crate) fn is_substituted(&self) -> bool {
        self.glyph_props.contains(GlyphProps::SUBSTITUTED)
    }

    pub(crate) fn is_ligated(&self) -> bool {
        self.glyph_props.contains(GlyphProps::LIGATED)
    }

    pub(crate) fn is_multiplied(&self) -> bool {
        self.glyph_props.contains(GlyphProps::MULTIPLIED)
    }

    pub(crate) fn is_ligated_and_didnt_multiply(&self) -> bool {
        self.is_ligated() && !self.is_multiplied()
    }

    pub(crate) fn clear_ligated_and_multiplied(&mut self) {
        self.glyph_props
            .remove(GlyphProps::LIGATED | GlyphProps::MULTIPLIED);
    }

    pub(crate) fn clear_substituted(&mut self) {
        self.glyph_props.remove(GlyphProps::SUBSTITUTED);
    }

    pub(crate) fn glyph_id(&self) -> u16 {
        self.codepoint as u16
    }

    fn set_cluster(&mut self, cluster: u32, mask: Mask) {
        if self.cluster != cluster {
            self.mask = (self.mask & !GLYPH_FLAG_DEFINED) | (mask & GLYPH_FLAG_DEFINED);
        }
        self.cluster = cluster;
    }
}

/// Text to be shaped, and the glyphs it is shaped into.
#[derive(Debug, Clone)]
pub struct Buffer {
    pub flags: BufferFlags,
    pub cluster_level: ClusterLevel,
    /// Glyph used for hidden default ignorables. The space glyph when `None`.
    pub invisible_glyph: Option<u16>,
    /// Glyph used for characters the font has no glyph for.
    pub replacement_glyph: u16,
    pub max_len: usize,
    pub max_ops: i32,
    pub props: SegmentProperties,

    pub(crate) scratch_flags: ScratchFlags,
    /// Cleared when a limit is hit; the current pass is then abandoned.
    pub(crate) successful: bool,
    pub(crate) have_output: bool,
    pub(crate) have_positions: bool,
    pub(crate) idx: usize,
    pub(crate) info: Vec<GlyphInfo>,
    pub(crate) pos: Vec<GlyphPosition>,
    pub(crate) out_info: Vec<GlyphInfo>,
    /// Characters before and after the buffer contents, ordered outward.
    pub(crate) context: [ArrayVec<[u32; CONTEXT_LENGTH]>; 2],
    serial: u8,
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::new()
    }
}

impl Buffer {
    pub const MAX_LEN_FACTOR: usize = 32;
    pub const MAX_LEN_MIN: usize = 8192;
    pub const MAX_LEN_DEFAULT: usize = 0x3FFF_FFFF;
    pub const MAX_OPS_FACTOR: i32 = 64;
    pub const MAX_OPS_MIN: i32 = 1024;
    pub const MAX_OPS_DEFAULT: i32 = 0x1FFF_FFFF;

    pub fn new() -> Buffer {
        Buffer {
            flags: BufferFlags::empty(),
            cluster_level: ClusterLevel::default(),
            invisible_glyph: None,
            replacement_glyph: 0,
            max_len: Self::MAX_LEN_DEFAULT,
            max_ops: Self::MAX_OPS_DEFAULT,
            props: SegmentProperties::default(),
            scratch_flags: ScratchFlags::empty(),
            successful: true,
            have_output: false,
            have_positions: false,
            idx: 0,
            info: Vec::new(),
            pos: Vec::new(),
            out_info: Vec::new(),
            context: [ArrayVec::new(), ArrayVec::new()],
            serial: 0,
        }
    }

    /// Remove the contents and properties so the buffer can be reused.
    pub fn clear(&mut self) {
        self.props = SegmentProperties::default();
        self.scratch_flags = ScratchFlags::empty();
        self.successful = true;
        self.have_output = false;
        self.have_positions = false;
        self.idx = 0;
        self.info.clear();
        self.pos.clear();
        self.out_info.clear();
        self.context = [ArrayVec::new(), ArrayVec::new()];
        self.serial = 0;
    }

    pub fn len(&self) -> usize {
        self.info.len()
    }

    pub fn is_empty(&self) -> bool {
        self.info.is_empty()
    }

    pub fn glyph_infos(&self) -> &[GlyphInfo] {
        &self.info
    }

    pub fn glyph_positions(&self) -> &[GlyphPosition] {
        &self.pos
    }

    pub fn direction(&self) -> Direction {
        self.props.direction
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.props.direction = direction;
    }

    pub fn script(&self) -> Script {
        self.props.script
    }

    pub fn set_script(&mut self, script: Script) {
        self.props.script = script;
    }

    pub fn set_language(&mut self, language: Option<u32>) {
        self.props.language = language;
    }

    /// Append one character. Any post-context is dropped.
    pub fn add(&mut self, codepoint: u32, cluster: u32) {
        self.push(codepoint, cluster);
        self.context[1].clear();
    }

    fn push(&mut self, codepoint: u32, cluster: u32) {
        self.info.push(GlyphInfo::new(codepoint, cluster));
        self.pos.push(GlyphPosition::default());
    }

    /// Append `text[item_offset..item_offset + item_length]`.
    ///
    /// Cluster values are indices into `text`. Up to five characters either side of the
    /// item become the pre- and post-context, so that shaping can see across item
    /// boundaries.
    pub fn add_codepoints(&mut self, text: &[u32], item_offset: usize, item_length: usize) {
        let item_end = item_offset.saturating_add(item_length).min(text.len());
        let item_offset = item_offset.min(item_end);

        if self.info.is_empty() && item_offset > 0 {
            self.context[0].clear();
            for &ch in text[..item_offset].iter().rev().take(CONTEXT_LENGTH) {
                self.context[0].push(ch);
            }
        }

        for (i, &ch) in text[item_offset..item_end].iter().enumerate() {
            self.push(ch, (item_offset + i) as u32);
        }

        self.context[1].clear();
        for &ch in text[item_end..].iter().take(CONTEXT_LENGTH) {
            self.context[1].push(ch);
        }
    }

    /// Append the characters of `text`, with byte offsets as clusters.
    pub fn push_str(&mut self, text: &str) {
        for (i, ch) in text.char_indices() {
            self.push(u32::from(ch), i as u32);
        }
        self.context[1].clear();
    }

    pub fn pre_context(&self) -> &[u32] {
        &self.context[0]
    }

    pub fn post_context(&self) -> &[u32] {
        &self.context[1]
    }

    /// Fill in the script and direction from the contents when they are unset.
    ///
    /// The script is that of the first character with a specific script, the direction
    /// the one that script is written in.
    pub fn guess_segment_properties(&mut self) {
        if self.props.script == 0 {
            self.props.script = self
                .info
                .iter()
                .map(|info| unicode::script_of(info.codepoint))
                .find(|&script| {
                    !matches!(
                        script,
                        unicode::script::COMMON | unicode::script::INHERITED | unicode::script::UNKNOWN
                    )
                })
                .unwrap_or(0);
        }

        if self.props.direction == Direction::Invalid {
            self.props.direction = if self.props.script != 0 {
                Direction::from_script(self.props.script)
            } else {
                Direction::LeftToRight
            };
        }
    }

    pub(crate) fn cur(&self, i: usize) -> &GlyphInfo {
        &self.info[self.idx + i]
    }

    pub(crate) fn cur_mut(&mut self, i: usize) -> &mut GlyphInfo {
        let idx = self.idx + i;
        &mut self.info[idx]
    }

    pub(crate) fn cur_pos_mut(&mut self) -> &mut GlyphPosition {
        let idx = self.idx;
        &mut self.pos[idx]
    }

    /// The last glyph written to the output.
    pub(crate) fn prev(&self) -> Option<&GlyphInfo> {
        self.out_info.last()
    }

    pub(crate) fn prev_mut(&mut self) -> Option<&mut GlyphInfo> {
        self.out_info.last_mut()
    }

    pub(crate) fn backtrack_len(&self) -> usize {
        if self.have_output {
            self.out_info.len()
        } else {
            self.idx
        }
    }

    pub(crate) fn lookahead_len(&self) -> usize {
        self.info.len() - self.idx
    }

    /// The glyph `i` positions back, from the output during a substitution pass.
    pub(crate) fn backtrack_info(&self, i: usize) -> &GlyphInfo {
        if self.have_output {
            &self.out_info[i]
        } else {
            &self.info[i]
        }
    }

    pub(crate) fn out_len(&self) -> usize {
        self.out_info.len()
    }

    fn next_serial(&mut self) -> u8 {
        self.serial = self.serial.wrapping_add(1);
        if self.serial == 0 {
            self.serial = 1;
        }
        self.serial
    }

    /// A fresh ligature id. Ids wrap around after seven ligatures.
    pub(crate) fn allocate_lig_id(&mut self) -> u8 {
        let mut lig_id = self.next_serial() & 0x07;
        if lig_id == 0 {
            lig_id = self.next_serial() & 0x07;
        }
        lig_id
    }

    /// Set the limits for the current shaping call from the buffer length.
    pub(crate) fn enter(&mut self) {
        self.serial = 0;
        self.scratch_flags = ScratchFlags::empty();
        self.successful = true;
        if let Some(len) = self.len().checked_mul(Self::MAX_LEN_FACTOR) {
            self.max_len = len.max(Self::MAX_LEN_MIN);
        }
        if let Some(ops) = i32::try_from(self.len())
            .ok()
            .and_then(|len| len.checked_mul(Self::MAX_OPS_FACTOR))
        {
            self.max_ops = ops.max(Self::MAX_OPS_MIN);
        }
    }

    pub(crate) fn leave(&mut self) {
        self.max_len = Self::MAX_LEN_DEFAULT;
        self.max_ops = Self::MAX_OPS_DEFAULT;
        self.serial = 0;
    }

    /// Consume one operation from the budget, `false` once it is exhausted.
    pub(crate) fn decrement_max_ops(&mut self) -> bool {
        self.max_ops -= 1;
        self.max_ops > 0
    }

    fn ensure(&mut self, size: usize) -> bool {
        if size > self.max_len {
            self.successful = false;
            return false;
        }
        true
    }

    /// Start a substitution pass.
    pub(crate) fn clear_output(&mut self) {
        self.have_output = true;
        self.have_positions = false;
        self.idx = 0;
        self.out_info.clear();
    }

    /// Drop the output, leaving the glyphs to be rewritten in place.
    pub(crate) fn remove_output(&mut self) {
        self.have_output = false;
        self.have_positions = false;
        self.out_info.clear();
    }

    /// Start positioning: every position is zeroed.
    pub(crate) fn clear_positions(&mut self) {
        self.have_output = false;
        self.have_positions = true;
        self.out_info.clear();
        self.pos.clear();
        self.pos.resize(self.info.len(), GlyphPosition::default());
    }

    /// Finish a substitution pass: the output becomes the buffer contents.
    ///
    /// When a limit was hit during the pass the input is kept unchanged.
    pub(crate) fn swap_buffers(&mut self) {
        debug_assert!(self.have_output);
        if self.successful {
            self.next_glyphs(self.info.len() - self.idx);
            std::mem::swap(&mut self.info, &mut self.out_info);
        }
        self.have_output = false;
        self.out_info.clear();
        self.idx = 0;
        self.pos.resize(self.info.len(), GlyphPosition::default());
    }

    /// Copy the glyph at the cursor to the output and advance.
    pub(crate) fn next_glyph(&mut self) {
        if self.have_output {
            if !self.ensure(self.out_info.len() + 1) {
                self.idx += 1;
                return;
            }
            let info = self.info[self.idx];
            self.out_info.push(info);
        }
        self.idx += 1;
    }

    pub(crate) fn next_glyphs(&mut self, n: usize) {
        if self.have_output {
            let end = (self.idx + n).min(self.info.len());
            self.out_info.extend_from_slice(&self.info[self.idx..end]);
        }
        self.idx += n;
    }

    /// Record `glyph` as the normalization glyph of the current character and advance.
    pub(crate) fn next_char(&mut self, glyph: u32) {
        self.cur_mut(0).glyph_index = glyph;
        self.next_glyph();
    }

    /// Advance without copying to the output.
    pub(crate) fn skip_glyph(&mut self) {
        self.idx += 1;
    }

    /// Copy the glyph at the cursor to the output without advancing.
    pub(crate) fn copy_glyph(&mut self) {
        if !self.ensure(self.out_info.len() + 1) {
            return;
        }
        let info = self.info[self.idx];
        self.out_info.push(info);
    }

    /// Replace the glyph at the cursor with `glyph` and advance.
    pub(crate) fn replace_glyph(&mut self, glyph: u32) {
        if !self.ensure(self.out_info.len() + 1) {
            self.idx += 1;
            return;
        }
        let mut info = self.info[self.idx];
        info.codepoint = glyph;
        self.out_info.push(info);
        self.idx += 1;
    }

    /// Replace `num_in` glyphs at the cursor with `glyphs`. The outputs take the
    /// properties of the first input and the minimum cluster of all of them.
    pub(crate) fn replace_glyphs(&mut self, num_in: usize, glyphs: &[u32]) {
        if !self.ensure(self.out_info.len() + glyphs.len()) {
            return;
        }
        self.merge_clusters(self.idx, self.idx + num_in);
        let orig_info = self.info[self.idx];
        self.out_info.extend(glyphs.iter().map(|&glyph| GlyphInfo {
            codepoint: glyph,
            ..orig_info
        }));
        self.idx += num_in;
    }

    /// Write a copy of the glyph at the cursor holding `glyph`, without advancing.
    pub(crate) fn output_glyph(&mut self, glyph: u32) {
        if !self.ensure(self.out_info.len() + 1) {
            return;
        }
        let template = match self.info.get(self.idx).or_else(|| self.out_info.last()) {
            Some(info) => *info,
            None => return,
        };
        self.out_info.push(GlyphInfo {
            codepoint: glyph,
            ..template
        });
    }

    pub(crate) fn output_info(&mut self, info: GlyphInfo) {
        if !self.ensure(self.out_info.len() + 1) {
            return;
        }
        self.out_info.push(info);
    }

    /// Output `ch`, recording `glyph` as its normalization glyph, without advancing.
    pub(crate) fn output_char(&mut self, ch: u32, glyph: u32) {
        self.cur_mut(0).glyph_index = glyph;
        self.output_glyph(ch);
        let mut scratch_flags = self.scratch_flags;
        if let Some(prev) = self.out_info.last_mut() {
            prev.init_unicode_props(&mut scratch_flags);
        }
        self.scratch_flags = scratch_flags;
    }

    /// Remove the glyph at the cursor, merging its cluster into a neighbour.
    pub(crate) fn delete_glyph(&mut self) {
        let cluster = self.info[self.idx].cluster;

        if self.idx + 1 < self.len() && cluster == self.info[self.idx + 1].cluster {
            // The cluster survives.
            self.skip_glyph();
            return;
        }

        if let Some(last) = self.out_info.last() {
            // Merge backward.
            if cluster < last.cluster {
                let mask = self.info[self.idx].mask;
                let old_cluster = last.cluster;
                for info in self.out_info.iter_mut().rev() {
                    if info.cluster != old_cluster {
                        break;
                    }
                    info.set_cluster(cluster, mask);
                }
            }
            self.skip_glyph();
            return;
        }

        if self.idx + 1 < self.len() {
            // Merge forward.
            self.merge_clusters(self.idx, self.idx + 2);
        }
        self.skip_glyph();
    }

    /// Remove every glyph for which `filter` holds, outside a substitution pass.
    pub(crate) fn delete_glyphs_inplace(&mut self, filter: impl Fn(&GlyphInfo) -> bool) {
        let mut j = 0;
        for i in 0..self.len() {
            if filter(&self.info[i]) {
                let cluster = self.info[i].cluster;
                if i + 1 < self.len() && cluster == self.info[i + 1].cluster {
                    continue;
                }

                if j != 0 {
                    if cluster < self.info[j - 1].cluster {
                        let mask = self.info[i].mask;
                        let old_cluster = self.info[j - 1].cluster;
                        for info in self.info[..j].iter_mut().rev() {
                            if info.cluster != old_cluster {
                                break;
                            }
                            info.set_cluster(cluster, mask);
                        }
                    }
                    continue;
                }

                if i + 1 < self.len() {
                    self.merge_clusters(i, i + 2);
                }
                continue;
            }

            if j != i {
                self.info[j] = self.info[i];
                self.pos[j] = self.pos[i];
            }
            j += 1;
        }
        self.info.truncate(j);
        self.pos.truncate(j);
    }

    /// Move the cursor so that `i` glyphs have been output, copying forward or
    /// rewinding the output as needed.
    pub(crate) fn move_to(&mut self, i: usize) -> bool {
        if !self.have_output {
            debug_assert!(i <= self.len());
            self.idx = i.min(self.len());
            return true;
        }
        if !self.successful {
            return false;
        }

        let out_len = self.out_info.len();
        if out_len < i {
            let count = (i - out_len).min(self.len() - self.idx);
            if !self.ensure(out_len + count) {
                return false;
            }
            self.next_glyphs(count);
        } else if out_len > i {
            let count = out_len - i;
            let rewound = self.out_info.split_off(i);
            if self.idx < count {
                if !self.ensure(self.len() + count - self.idx) {
                    return false;
                }
                self.info.splice(0..self.idx, rewound);
                self.idx = 0;
            } else {
                self.idx -= count;
                self.info[self.idx..self.idx + count].copy_from_slice(&rewound);
            }
        }
        true
    }

    pub(crate) fn reset_masks(&mut self, mask: Mask) {
        for info in &mut self.info {
            info.mask = mask;
        }
    }

    /// Set the bits of `mask` to `value` on glyphs whose cluster is in
    /// `cluster_start..cluster_end`.
    pub(crate) fn set_masks(
        &mut self,
        value: Mask,
        mask: Mask,
        cluster_start: u32,
        cluster_end: u32,
    ) {
        if mask == 0 {
            return;
        }
        let value = value & mask;
        for info in &mut self.info {
            if cluster_start <= info.cluster && info.cluster < cluster_end {
                info.mask = (info.mask & !mask) | value;
            }
        }
    }

    /// Reverse the glyphs in `start..end`.
    pub fn reverse_range(&mut self, start: usize, end: usize) {
        let end = end.min(self.len());
        if end <= start + 1 {
            return;
        }
        self.info[start..end].reverse();
        if self.have_positions {
            self.pos[start..end].reverse();
        }
    }

    pub fn reverse(&mut self) {
        self.reverse_range(0, self.len());
    }

    /// Reverse the buffer while keeping the glyphs of each cluster in logical order.
    pub(crate) fn reverse_clusters(&mut self) {
        self.reverse_groups(|a, b| a.cluster == b.cluster, false);
    }

    /// Reverse the buffer while keeping the glyphs of each grapheme in logical order.
    pub(crate) fn reverse_graphemes(&mut self) {
        let merge = self.cluster_level == ClusterLevel::MonotoneCharacters;
        self.reverse_groups(|_, b| b.is_continuation(), merge);
    }

    fn reverse_groups(&mut self, group: impl Fn(&GlyphInfo, &GlyphInfo) -> bool, merge: bool) {
        if self.is_empty() {
            return;
        }
        let mut start = 0;
        for i in 1..self.len() {
            if !group(&self.info[i - 1], &self.info[i]) {
                if merge {
                    self.merge_clusters(start, i);
                }
                self.reverse_range(start, i);
                start = i;
            }
        }
        if merge {
            self.merge_clusters(start, self.len());
        }
        self.reverse_range(start, self.len());
        self.reverse();
    }

    /// The end of the run of glyphs starting at `start` for which `group` holds pairwise.
    pub(crate) fn group_end(
        &self,
        start: usize,
        group: impl Fn(&GlyphInfo, &GlyphInfo) -> bool,
    ) -> usize {
        let mut end = start + 1;
        while end < self.len() && group(&self.info[end - 1], &self.info[end]) {
            end += 1;
        }
        end
    }

    pub(crate) fn next_cluster(&self, start: usize) -> usize {
        self.group_end(start, |a, b| a.cluster == b.cluster)
    }

    pub(crate) fn next_syllable(&self, start: usize) -> usize {
        self.group_end(start, |a, b| a.syllable == b.syllable)
    }

    pub(crate) fn next_grapheme(&self, start: usize) -> usize {
        self.group_end(start, |_, b| b.is_continuation())
    }

    /// `(start, end)` of each run of glyphs sharing a cluster.
    pub fn clusters(&self) -> GroupIter<'_> {
        GroupIter::new(self, Buffer::next_cluster)
    }

    /// `(start, end)` of each run of glyphs sharing a syllable.
    pub fn syllables(&self) -> GroupIter<'_> {
        GroupIter::new(self, Buffer::next_syllable)
    }

    /// `(start, end)` of each grapheme: a glyph and the continuation glyphs after it.
    pub fn graphemes(&self) -> GroupIter<'_> {
        GroupIter::new(self, Buffer::next_grapheme)
    }

    /// Merge the clusters of `start..end` into their minimum.
    ///
    /// The range grows outward over neighbours that share a cluster with its ends, and
    /// into the output when it starts at the cursor.
    pub fn merge_clusters(&mut self, start: usize, end: usize) {
        if end <= start + 1 {
            return;
        }

        if self.cluster_level == ClusterLevel::Characters {
            self.unsafe_to_break(start, end);
            return;
        }

        let mut start = start;
        let mut end = end.min(self.len());
        let cluster = self.info[start..end]
            .iter()
            .map(|info| info.cluster)
            .min()
            .unwrap_or(0);

        while end < self.len() && self.info[end - 1].cluster == self.info[end].cluster {
            end += 1;
        }

        while self.idx < start && self.info[start - 1].cluster == self.info[start].cluster {
            start -= 1;
        }

        if self.idx == start {
            let start_cluster = self.info[start].cluster;
            for info in self.out_info.iter_mut().rev() {
                if info.cluster != start_cluster {
                    break;
                }
                info.set_cluster(cluster, 0);
            }
        }

        for info in &mut self.info[start..end] {
            info.set_cluster(cluster, 0);
        }
    }

    /// Merge the clusters of `start..end` in the output.
    pub(crate) fn merge_out_clusters(&mut self, start: usize, end: usize) {
        if self.cluster_level == ClusterLevel::Characters || end <= start + 1 {
            return;
        }

        let mut start = start;
        let mut end = end.min(self.out_info.len());
        let cluster = self.out_info[start..end]
            .iter()
            .map(|info| info.cluster)
            .min()
            .unwrap_or(0);

        while start != 0 && self.out_info[start - 1].cluster == self.out_info[start].cluster {
            start -= 1;
        }

        while end < self.out_info.len() && self.out_info[end - 1].cluster == self.out_info[end].cluster
        {
            end += 1;
        }

        if end == self.out_info.len() {
            let end_cluster = self.out_info[end - 1].cluster;
            for info in &mut self.info[self.idx..] {
                if info.cluster != end_cluster {
                    break;
                }
                info.set_cluster(cluster, 0);
            }
        }

        for info in &mut self.out_info[start..end] {
            info.set_cluster(cluster, 0);
        }
    }

    /// Mark the glyphs of `start..end` outside the minimum cluster as unsafe to break.
    pub fn unsafe_to_break(&mut self, start: usize, end: usize) {
        let end = end.min(self.len());
        if end <= start + 1 {
            return;
        }
        let cluster = min_cluster(&self.info[start..end], u32::MAX);
        if set_unsafe_to_break(&mut self.info[start..end], cluster) {
            self.scratch_flags |= ScratchFlags::HAS_UNSAFE_TO_BREAK;
        }
    }

    /// As `unsafe_to_break`, for a range starting at `start` in the output and ending at
    /// `end` in the input.
    pub(crate) fn unsafe_to_break_from_outbuffer(&mut self, start: usize, end: usize) {
        if !self.have_output {
            self.unsafe_to_break(start, end);
            return;
        }
        let start = start.min(self.out_info.len());
        let end = end.min(self.len()).max(self.idx);
        let cluster = min_cluster(&self.info[self.idx..end], u32::MAX);
        let cluster = min_cluster(&self.out_info[start..], cluster);
        let out = set_unsafe_to_break(&mut self.out_info[start..], cluster);
        let input = set_unsafe_to_break(&mut self.info[self.idx..end], cluster);
        if out || input {
            self.scratch_flags |= ScratchFlags::HAS_UNSAFE_TO_BREAK;
        }
    }

    /// Stable insertion sort of `start..end`, merging the clusters of glyphs that move.
    ///
    /// `gt(a, b)` reports whether `a` sorts after `b`.
    pub(crate) fn sort(
        &mut self,
        start: usize,
        end: usize,
        gt: impl Fn(&GlyphInfo, &GlyphInfo) -> bool,
    ) {
        debug_assert!(!self.have_positions);
        for i in start + 1..end {
            let mut j = i;
            while j > start && gt(&self.info[j - 1], &self.info[i]) {
                j -= 1;
            }
            if i == j {
                continue;
            }
            // Move item i to position j, shifting what is in between.
            self.merge_clusters(j, i + 1);
            self.info[j..=i].rotate_right(1);
        }
    }

    /// A textual form of the glyphs: `[gid=cluster@x,y+advance|...]`.
    ///
    /// Offsets are omitted when zero, as is the vertical advance.
    pub fn serialize(&self, with_positions: bool) -> String {
        let mut out = String::from("[");
        for (i, info) in self.info.iter().enumerate() {
            if i > 0 {
                out.push('|');
            }
            let _ = write!(out, "{}={}", info.codepoint, info.cluster);
            if with_positions && self.have_positions {
                let pos = &self.pos[i];
                if pos.x_offset != 0 || pos.y_offset != 0 {
                    let _ = write!(out, "@{},{}", pos.x_offset, pos.y_offset);
                }
                let _ = write!(out, "+{}", pos.x_advance);
                if pos.y_advance != 0 {
                    let _ = write!(out, ",{}", pos.y_advance);
                }
            }
        }
        out.push(']');
        out
    }
}

fn min_cluster(infos: &[GlyphInfo], cluster: u32) -> u32 {
    infos
        .iter()
        .map(|info| info.cluster)
        .fold(cluster, u32::min)
}

fn set_unsafe_to_break(infos: &mut [GlyphInfo], cluster: u32) -> bool {
    let mut any = false;
    for info in infos.iter_mut().filter(|info| info.cluster != cluster) {
        info.mask |= GLYPH_FLAG_UNSAFE_TO_BREAK;
        any = true;
    }
    any
}

/// Iterator over `(start, end)` ranges of a buffer.
pub struct GroupIter<'a> {
    buffer: &'a Buffer,
    next: fn(&Buffer, usize) -> usize,
    start: usize,
}

impl<'a> GroupIter<'a> {
    fn new(buffer: &'a Buffer, next: fn(&Buffer, usize) -> usize) -> Self {
        GroupIter {
            buffer,
            next,
            start: 0,
        }
    }
}

impl Iterator for GroupIter<'_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<(usize, usize)> {
        if self.start >= self.buffer.len() {
            return None;
        }
        let start = self.start;
        let end = (self.next)(self.buffer, start);
        self.start = end;
        Some((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with_clusters(clusters: &[u32]) -> Buffer {
        let mut buffer = Buffer::new();
        for (i, &cluster) in clusters.iter().enumerate() {
            buffer.add(0x61 + i as u32, cluster);
        }
        buffer
    }

    fn clusters(buffer: &Buffer) -> Vec<u32> {
        buffer.glyph_infos().iter().map(|info| info.cluster).collect()
    }

    #[test]
    fn merge_clusters() {
        let mut buffer = buffer_with_clusters(&[5, 5, 8, 10]);
        buffer.merge_clusters(1, 3);
        assert_eq!(clusters(&buffer), vec![5, 5, 5, 10]);
    }

    #[test]
    fn merge_clusters_extends_over_equal_neighbours() {
        let mut buffer = buffer_with_clusters(&[0, 1, 2, 2, 3]);
        buffer.merge_clusters(1, 3);
        assert_eq!(clusters(&buffer), vec![0, 1, 1, 1, 3]);
    }

    #[test]
    fn merge_clusters_at_character_level_marks_unsafe() {
        let mut buffer = buffer_with_clusters(&[0, 1, 2]);
        buffer.cluster_level = ClusterLevel::Characters;
        buffer.merge_clusters(0, 3);
        assert_eq!(clusters(&buffer), vec![0, 1, 2]);
        let unsafe_flags: Vec<bool> = buffer
            .glyph_infos()
            .iter()
            .map(GlyphInfo::unsafe_to_break)
            .collect();
        assert_eq!(unsafe_flags, vec![false, true, true]);
    }

    #[test]
    fn add_codepoints_records_context() {
        let text = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13];
        let mut buffer = Buffer::new();
        buffer.add_codepoints(&text, 6, 2);
        assert_eq!(buffer.pre_context(), &[6, 5, 4, 3, 2]);
        assert_eq!(buffer.post_context(), &[9, 10, 11, 12, 13]);
        assert_eq!(clusters(&buffer), vec![6, 7]);
        buffer.add(0x20, 8);
        assert!(buffer.post_context().is_empty());
    }

    #[test]
    fn reverse_twice_is_identity() {
        let mut buffer = buffer_with_clusters(&[0, 1, 1, 2]);
        buffer.clear_positions();
        buffer.pos[1].x_advance = 10;
        let original = buffer.clone();
        buffer.reverse();
        assert_eq!(clusters(&buffer), vec![2, 1, 1, 0]);
        assert_eq!(buffer.pos[2].x_advance, 10);
        buffer.reverse();
        assert_eq!(buffer.info, original.info);
        assert_eq!(buffer.pos, original.pos);
    }

    #[test]
    fn reverse_clusters_keeps_cluster_order() {
        let mut buffer = buffer_with_clusters(&[0, 1, 1, 2]);
        buffer.reverse_clusters();
        let codepoints: Vec<u32> = buffer.info.iter().map(|info| info.codepoint).collect();
        assert_eq!(codepoints, vec![0x64, 0x62, 0x63, 0x61]);
    }

    #[test]
    fn substitution_pass() {
        let mut buffer = buffer_with_clusters(&[0, 1, 2, 3]);
        buffer.clear_output();
        buffer.next_glyph();
        buffer.replace_glyphs(2, &[100]);
        buffer.output_glyph(200);
        buffer.replace_glyph(300);
        buffer.swap_buffers();
        let codepoints: Vec<u32> = buffer.info.iter().map(|info| info.codepoint).collect();
        assert_eq!(codepoints, vec![0x61, 100, 200, 300]);
        assert_eq!(clusters(&buffer), vec![0, 1, 3, 3]);
        assert_eq!(buffer.info.len(), buffer.pos.len());
    }

    #[test]
    fn delete_glyph_merges_backward() {
        let mut buffer = buffer_with_clusters(&[0, 1, 2]);
        buffer.clear_output();
        buffer.next_glyph();
        buffer.next_glyph();
        buffer.delete_glyph();
        buffer.swap_buffers();
        assert_eq!(clusters(&buffer), vec![0, 1]);

        let mut buffer = buffer_with_clusters(&[0, 1, 2]);
        buffer.clear_output();
        buffer.delete_glyph();
        buffer.swap_buffers();
        assert_eq!(clusters(&buffer), vec![0, 0]);
    }

    #[test]
    fn move_to_rewinds_output() {
        let mut buffer = buffer_with_clusters(&[0, 1, 2, 3]);
        buffer.clear_output();
        buffer.next_glyphs(3);
        assert!(buffer.move_to(1));
        assert_eq!(buffer.idx, 1);
        assert_eq!(buffer.out_len(), 1);
        assert!(buffer.move_to(4));
        buffer.swap_buffers();
        assert_eq!(clusters(&buffer), vec![0, 1, 2, 3]);
    }

    #[test]
    fn max_len_abandons_pass() {
        let mut buffer = buffer_with_clusters(&[0, 1]);
        buffer.max_len = 2;
        buffer.clear_output();
        buffer.replace_glyphs(1, &[1, 2, 3]);
        assert!(!buffer.successful);
        buffer.swap_buffers();
        assert_eq!(clusters(&buffer), vec![0, 1]);
    }

    #[test]
    fn sort_merges_moved_clusters() {
        let mut buffer = buffer_with_clusters(&[0, 1, 2]);
        buffer.info[1].codepoint = 30;
        buffer.info[2].codepoint = 20;
        buffer.sort(1, 3, |a, b| a.codepoint > b.codepoint);
        let codepoints: Vec<u32> = buffer.info.iter().map(|info| info.codepoint).collect();
        assert_eq!(codepoints, vec![0x61, 20, 30]);
        assert_eq!(clusters(&buffer), vec![0, 1, 1]);
    }

    #[test]
    fn group_iterators() {
        let mut buffer = buffer_with_clusters(&[0, 0, 1, 2, 2, 2]);
        assert_eq!(
            buffer.clusters().collect::<Vec<_>>(),
            vec![(0, 2), (2, 3), (3, 6)]
        );
        for (i, syllable) in [1, 1, 1, 2, 2, 3].into_iter().enumerate() {
            buffer.info[i].syllable = syllable;
        }
        assert_eq!(
            buffer.syllables().collect::<Vec<_>>(),
            vec![(0, 3), (3, 5), (5, 6)]
        );
        buffer.info[1].set_continuation();
        assert_eq!(buffer.graphemes().collect::<Vec<_>>()[0], (0, 2));
    }

    #[test]
    fn guess_properties() {
        let mut buffer = Buffer::new();
        buffer.push_str("1 \u{0644}\u{0627}");
        buffer.guess_segment_properties();
        assert_eq!(buffer.script(), unicode::script::ARABIC);
        assert_eq!(buffer.direction(), Direction::RightToLeft);
    }

    #[test]
    fn unicode_props() {
        let mut scratch = ScratchFlags::empty();
        let mut info = GlyphInfo::new(0x0301, 0);
        info.init_unicode_props(&mut scratch);
        assert!(info.is_unicode_mark());
        assert!(info.is_continuation());
        assert_eq!(info.modified_combining_class(), 230);

        let mut zwj = GlyphInfo::new(0x200D, 0);
        zwj.init_unicode_props(&mut scratch);
        assert!(zwj.is_zwj());
        assert!(zwj.is_default_ignorable());
        assert!(scratch.contains(ScratchFlags::HAS_DEFAULT_IGNORABLES));

        let mut lig = GlyphInfo::default();
        lig.glyph_props = GlyphProps::LIGATURE;
        lig.set_lig_props_for_ligature(3, 2);
        assert_eq!((lig.lig_id(), lig.lig_comp(), lig.lig_num_comps()), (3, 0, 2));
    }

    #[test]
    fn serialize_glyphs() {
        let mut buffer = buffer_with_clusters(&[0, 2]);
        buffer.clear_positions();
        buffer.info[0].codepoint = 5;
        buffer.info[1].codepoint = 7;
        buffer.pos[0].x_advance = 500;
        buffer.pos[1].x_offset = -20;
        buffer.pos[1].y_offset = 10;
        assert_eq!(buffer.serialize(true), "[5=0+500|7=2@-20,10+0]");
        assert_eq!(buffer.serialize(false), "[5=0|7=2]");
    }
}
