//! Slots: the glyphs of a segment while Graphite rules run over them.

use bitflags::bitflags;

use super::{Position, Rect};

/// Index of a slot in the slot arena of its segment.
pub type SlotId = usize;

bitflags! {
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
    pub struct SlotFlags: u8 {
        const DELETED = 1;
        /// Set when nothing may be inserted before the slot
        const INSERTED = 2;
        const COPIED = 4;
        const POSITIONED = 8;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slot {
    pub(crate) glyph_id: u16,
    /// The glyph to render when `glyph_id` is a pseudo glyph, otherwise 0
    pub(crate) real_glyph_id: u16,
    /// Index of the character the slot was created for
    pub(crate) original: usize,
    pub(crate) before: i32,
    pub(crate) after: i32,
    /// Position of the slot in the segment, as of the last call to `associate_chars`
    pub(crate) index: usize,
    pub(crate) prev: Option<SlotId>,
    pub(crate) next: Option<SlotId>,
    pub(crate) parent: Option<SlotId>,
    pub(crate) child: Option<SlotId>,
    pub(crate) sibling: Option<SlotId>,
    pub(crate) position: Position,
    pub(crate) shift: Position,
    pub(crate) advance: Position,
    pub(crate) attach: Position,
    pub(crate) with: Position,
    pub(crate) just: f32,
    pub(crate) flags: SlotFlags,
    pub(crate) att_level: u8,
    /// -1 until looked up from the glyph attributes
    pub(crate) bidi_class: i8,
    pub(crate) bidi_level: u8,
    pub(crate) user_attrs: Vec<i16>,
}

impl Slot {
    pub(crate) fn new(num_user_attrs: usize) -> Slot {
        Slot {
            bidi_class: -1,
            user_attrs: vec![0; num_user_attrs],
            ..Slot::default()
        }
    }

    /// Return the slot to its freshly created state, keeping the user attribute storage.
    pub(crate) fn reset(&mut self) {
        let mut user_attrs = std::mem::take(&mut self.user_attrs);
        user_attrs.iter_mut().for_each(|attr| *attr = 0);
        *self = Slot {
            user_attrs,
            ..Slot::new(0)
        };
    }

    pub fn glyph_id(&self) -> u16 {
        self.glyph_id
    }

    /// The glyph to display for this slot.
    pub fn glyph(&self) -> u16 {
        if self.real_glyph_id != 0 {
            self.real_glyph_id
        } else {
            self.glyph_id
        }
    }

    pub fn before(&self) -> i32 {
        self.before
    }

    pub fn after(&self) -> i32 {
        self.after
    }

    pub fn original(&self) -> usize {
        self.original
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn advance(&self) -> Position {
        self.advance
    }

    pub fn attached_to(&self) -> Option<SlotId> {
        self.parent
    }

    pub fn is_base(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.flags.contains(SlotFlags::DELETED)
    }

    pub fn is_copied(&self) -> bool {
        self.flags.contains(SlotFlags::COPIED)
    }

    pub fn can_insert_before(&self) -> bool {
        !self.flags.contains(SlotFlags::INSERTED)
    }

    pub(crate) fn mark_deleted(&mut self, state: bool) {
        self.flags.set(SlotFlags::DELETED, state);
    }

    pub(crate) fn mark_copied(&mut self, state: bool) {
        self.flags.set(SlotFlags::COPIED, state);
    }

    pub(crate) fn mark_insert_before(&mut self, state: bool) {
        self.flags.set(SlotFlags::INSERTED, !state);
    }
}

/// Collision flags, as stored in the collision glyph attribute.
pub mod collision {
    pub const FIX: u16 = 1;
    pub const IGNORE: u16 = 2;
    pub const START: u16 = 4;
    pub const END: u16 = 8;
    pub const KERN: u16 = 16;
    pub const ISCOL: u16 = 32;
    pub const KNOWN: u16 = 64;
    pub const ISSPACE: u16 = 128;
    pub const TEMPLOCK: u16 = 256;
}

/// Collision avoidance parameters of a slot, initialised from the glyph attributes that
/// start at the collision attribute of the `Silf` subtable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotCollision {
    pub flags: u16,
    pub limit: Rect,
    pub margin: u16,
    pub margin_weight: u16,
    pub shift: Position,
    pub offset: Position,
    pub excl_glyph: u16,
    pub excl_offset: Position,
    pub seq_class: u16,
    pub seq_prox_class: u16,
    pub seq_order: u16,
    pub seq_above_xoff: i16,
    pub seq_above_weight: u16,
    pub seq_below_xlim: i16,
    pub seq_below_weight: u16,
    pub seq_valign_height: u16,
    pub seq_valign_weight: u16,
}

impl SlotCollision {
    /// Build from the attribute values `attrs[i] = attribute(collision_attr + i)`.
    pub fn from_attrs(attrs: &[i16; 16]) -> SlotCollision {
        let pos = |x: i16, y: i16| Position::new(f32::from(x), f32::from(y));
        SlotCollision {
            flags: attrs[0] as u16,
            limit: Rect::new(pos(attrs[1], attrs[2]), pos(attrs[3], attrs[4])),
            margin: attrs[5] as u16,
            margin_weight: attrs[6] as u16,
            seq_class: attrs[7] as u16,
            seq_prox_class: attrs[8] as u16,
            seq_order: attrs[9] as u16,
            seq_above_xoff: attrs[10],
            seq_above_weight: attrs[11] as u16,
            seq_below_xlim: attrs[12],
            seq_below_weight: attrs[13] as u16,
            seq_valign_height: attrs[14] as u16,
            seq_valign_weight: attrs[15] as u16,
            ..SlotCollision::default()
        }
    }

    /// Mark the collision state as needing to be recalculated.
    pub(crate) fn unknown(&mut self) {
        self.flags &= !collision::KNOWN;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_user_attrs() {
        let mut slot = Slot::new(2);
        slot.user_attrs[1] = 5;
        slot.glyph_id = 3;
        slot.mark_deleted(true);
        slot.reset();
        assert_eq!(slot.user_attrs, vec![0, 0]);
        assert_eq!(slot.glyph_id, 0);
        assert_eq!(slot.bidi_class, -1);
        assert!(!slot.is_deleted());
    }

    #[test]
    fn insert_before_flag() {
        let mut slot = Slot::new(0);
        assert!(slot.can_insert_before());
        slot.mark_insert_before(false);
        assert!(!slot.can_insert_before());
    }

    #[test]
    fn collision_from_attrs() {
        let mut attrs = [0; 16];
        attrs[0] = collision::FIX as i16 | collision::KNOWN as i16;
        attrs[1] = -10;
        attrs[4] = 20;
        let mut coll = SlotCollision::from_attrs(&attrs);
        assert_eq!(coll.limit.bl, Position::new(-10.0, 0.0));
        assert_eq!(coll.limit.tr, Position::new(0.0, 20.0));
        coll.unknown();
        assert_eq!(coll.flags, collision::FIX);
    }
}
