//! Pair kerning from the legacy `kern` table, applied when a font has no GPOS.

use crate::buffer::{Buffer, Mask};
use crate::tables::kern::KernTable;

/// Apply the horizontal kerning in `kern` to glyphs with `kern_mask` set.
pub fn apply_fallback_kerning(kern: &KernTable<'_>, buffer: &mut Buffer, kern_mask: Mask) {
    if !buffer.direction().is_horizontal() || !kern.has_horizontal() {
        return;
    }
    kern_pairs(buffer, Some(kern_mask), |left, right| {
        kern.horizontal_kerning(left, right)
    });
}

/// Adjust each pair of adjacent non-mark glyphs by the kerning `get_kerning` reports.
///
/// The kerning is split between the advance of the first glyph and the advance and offset
/// of the second, so that the space falls in the middle of the pair. When `mask` is given,
/// only pairs starting at a glyph with the mask set are kerned.
pub(crate) fn kern_pairs(
    buffer: &mut Buffer,
    mask: Option<Mask>,
    get_kerning: impl Fn(u16, u16) -> i32,
) {
    let horizontal = buffer.direction().is_horizontal();
    let len = buffer.len();
    let mut i = 0;
    while i < len {
        if mask.map_or(false, |mask| buffer.info[i].mask & mask == 0) {
            i += 1;
            continue;
        }
        let j = match (i + 1..len).find(|&j| !buffer.info[j].is_mark()) {
            Some(j) => j,
            None => break,
        };

        let kerning = get_kerning(buffer.info[i].glyph_id(), buffer.info[j].glyph_id());
        if kerning != 0 {
            let first = kerning >> 1;
            let second = kerning - first;
            if horizontal {
                buffer.pos[i].x_advance += first;
                buffer.pos[j].x_advance += second;
                buffer.pos[j].x_offset += second;
            } else {
                buffer.pos[i].y_advance += first;
                buffer.pos[j].y_advance += second;
                buffer.pos[j].y_offset += second;
            }
            buffer.unsafe_to_break(i, j + 1);
        }
        i = j;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::buffer::Direction;
    use crate::tables::kern::tests::kern_table;

    #[test]
    fn kerning_split_across_pair() {
        let data = kern_table(&[(1, 2, -40)]);
        let kern = ReadScope::new(&data).read::<KernTable<'_>>().unwrap();
        let mut buffer = Buffer::new();
        buffer.set_direction(Direction::LeftToRight);
        buffer.add(1, 0);
        buffer.add(2, 1);
        buffer.add(1, 2);
        buffer.reset_masks(0x4);
        apply_fallback_kerning(&kern, &mut buffer, 0x4);

        let positions = buffer.glyph_positions();
        assert_eq!(positions[0].x_advance, -20);
        assert_eq!(positions[1].x_advance, -20);
        assert_eq!(positions[1].x_offset, -20);
        assert_eq!(positions[2].x_advance, 0);
        assert!(buffer.glyph_infos()[1].unsafe_to_break());
    }

    #[test]
    fn masked_glyphs_are_not_kerned() {
        let data = kern_table(&[(1, 2, -40)]);
        let kern = ReadScope::new(&data).read::<KernTable<'_>>().unwrap();
        let mut buffer = Buffer::new();
        buffer.set_direction(Direction::LeftToRight);
        buffer.add(1, 0);
        buffer.add(2, 1);
        apply_fallback_kerning(&kern, &mut buffer, 0x4);
        assert_eq!(buffer.glyph_positions()[0].x_advance, 0);
    }
}
