//! A fast rejection filter for glyph sets.
//!
//! Each lookup keeps the union of its subtable coverages in a `SetDigest`. A glyph the
//! digest reports as absent is certainly not covered, so no subtable needs to be consulted.

const MASK_BITS: u32 = u16::BITS;

/// One 16-bit Bloom filter, indexed by four bits of the glyph id starting at `SHIFT`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
struct BitsPattern<const SHIFT: u32> {
    mask: u16,
}

impl<const SHIFT: u32> BitsPattern<SHIFT> {
    fn mask_for(glyph: u16) -> u16 {
        1 << ((u32::from(glyph) >> SHIFT) & (MASK_BITS - 1))
    }

    fn add(&mut self, glyph: u16) {
        self.mask |= Self::mask_for(glyph);
    }

    fn add_range(&mut self, first: u16, last: u16) {
        if (u32::from(last) >> SHIFT) - (u32::from(first) >> SHIFT) >= MASK_BITS - 1 {
            self.mask = u16::MAX;
            return;
        }
        let ma = Self::mask_for(first);
        let mb = Self::mask_for(last);
        // Every bit from ma to mb inclusive, wrapping around when mb is below ma.
        self.mask |= mb
            .wrapping_add(mb.wrapping_sub(ma))
            .wrapping_sub(u16::from(mb < ma));
    }

    fn may_have(&self, glyph: u16) -> bool {
        self.mask & Self::mask_for(glyph) != 0
    }
}

/// Three Bloom filters over different bits of the glyph id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct SetDigest {
    low: BitsPattern<0>,
    middle: BitsPattern<4>,
    high: BitsPattern<9>,
}

impl SetDigest {
    pub fn new() -> SetDigest {
        SetDigest::default()
    }

    pub fn add(&mut self, glyph: u16) {
        self.low.add(glyph);
        self.middle.add(glyph);
        self.high.add(glyph);
    }

    /// Add every glyph in `first..=last`.
    pub fn add_range(&mut self, first: u16, last: u16) {
        if first > last {
            return;
        }
        self.low.add_range(first, last);
        self.middle.add_range(first, last);
        self.high.add_range(first, last);
    }

    pub fn add_digest(&mut self, other: &SetDigest) {
        self.low.mask |= other.low.mask;
        self.middle.mask |= other.middle.mask;
        self.high.mask |= other.high.mask;
    }

    pub fn may_have(&self, glyph: u16) -> bool {
        self.low.may_have(glyph) && self.middle.may_have(glyph) && self.high.may_have(glyph)
    }

    pub fn is_empty(&self) -> bool {
        self.low.mask == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_digest_has_nothing() {
        let digest = SetDigest::new();
        assert!(digest.is_empty());
        assert!(!digest.may_have(0));
        assert!(!digest.may_have(1234));
    }

    #[test]
    fn added_glyphs_are_present() {
        let mut digest = SetDigest::new();
        for glyph in [3, 17, 300, 4000, 65535] {
            digest.add(glyph);
        }
        for glyph in [3, 17, 300, 4000, 65535] {
            assert!(digest.may_have(glyph));
        }
        assert!(!digest.may_have(4));
    }

    #[test]
    fn ranges() {
        let mut digest = SetDigest::new();
        digest.add_range(100, 120);
        assert!((100..=120).all(|glyph| digest.may_have(glyph)));
        assert!(!digest.may_have(2000));

        // A range that wraps around the low filter
        let mut digest = SetDigest::new();
        digest.add_range(14, 18);
        assert!((14..=18).all(|glyph| digest.may_have(glyph)));

        let mut wide = SetDigest::new();
        wide.add_range(0, 60000);
        assert!(wide.may_have(31337));
    }

    #[test]
    fn union() {
        let mut a = SetDigest::new();
        a.add(5);
        let mut b = SetDigest::new();
        b.add(500);
        a.add_digest(&b);
        assert!(a.may_have(5));
        assert!(a.may_have(500));
    }
}
