//! Positioning for fonts that lack the tables to do it themselves.
//!
//! Marks are placed around their base from glyph extents and combining classes, and space
//! characters that were mapped to the plain space glyph get the width they stand for.

use crate::buffer::{Buffer, Direction, GlyphPosition};
use crate::face::{FontFace, GlyphExtents};
use crate::plan::ShapePlan;
use crate::unicode::{GeneralCategory, SpaceType};

mod class {
    pub const ATTACHED_BELOW_LEFT: u8 = 200;
    pub const ATTACHED_BELOW: u8 = 202;
    pub const ATTACHED_ABOVE: u8 = 214;
    pub const ATTACHED_ABOVE_RIGHT: u8 = 216;
    pub const BELOW_LEFT: u8 = 218;
    pub const BELOW: u8 = 220;
    pub const BELOW_RIGHT: u8 = 222;
    pub const ABOVE_LEFT: u8 = 228;
    pub const ABOVE: u8 = 230;
    pub const ABOVE_RIGHT: u8 = 232;
    pub const DOUBLE_BELOW: u8 = 233;
    pub const DOUBLE_ABOVE: u8 = 234;
}

/// Map the classes of script specific marks onto the positional classes above.
///
/// `class` is the modified combining class, so the Hebrew, Arabic, Thai and Tibetan values
/// here are the permuted ones.
fn recategorize_combining_class(ch: u32, mut class: u8) -> u8 {
    if class >= 200 {
        return class;
    }

    // Thai and Lao marks with no class of their own.
    if ch & !0xFF == 0x0E00 {
        if class == 0 {
            match ch {
                0x0E31 | 0x0E34..=0x0E37 | 0x0E47 | 0x0E4C..=0x0E4E => {
                    class = class::ABOVE_RIGHT
                }
                0x0EB1 | 0x0EB4..=0x0EB7 | 0x0EBB | 0x0ECC | 0x0ECD => class = class::ABOVE,
                0x0EBC => class = class::BELOW,
                _ => {}
            }
        } else if ch == 0x0E3A {
            // Thai virama
            class = class::BELOW_RIGHT;
        }
    }

    match class {
        // Hebrew: sheva, hataf vowels, hiriq, tsere, segol, patah, qamats, qubuts, meteg
        15..=25 => class::BELOW,
        // rafe
        13 => class::ATTACHED_ABOVE,
        // shin dot
        10 => class::ABOVE_RIGHT,
        // sin dot, holam
        11 | 14 => class::ABOVE_LEFT,
        // point varika
        26 => class::ABOVE,
        // Arabic and Syriac marks above
        27..=29 | 31 | 32 | 34..=36 => class::ABOVE,
        // kasratan, kasra
        30 | 33 => class::BELOW,
        // Thai sara u and uu, mai
        3 => class::BELOW_RIGHT,
        107 => class::ABOVE_RIGHT,
        // Lao
        118 => class::BELOW,
        122 => class::ABOVE,
        // Tibetan
        129 | 131 => class::BELOW,
        132 => class::ABOVE,
        _ => class,
    }
}

/// Give non-spacing marks positional combining classes before they are positioned.
pub(crate) fn recategorize_marks(buffer: &mut Buffer) {
    for info in &mut buffer.info {
        if info.general_category() == GeneralCategory::NonspacingMark {
            let class = recategorize_combining_class(info.codepoint, info.modified_combining_class());
            info.set_modified_combining_class(class);
        }
    }
}

fn zero_mark_advances(buffer: &mut Buffer, start: usize, end: usize, adjust_offsets: bool) {
    for i in start..end {
        if buffer.info[i].general_category() != GeneralCategory::NonspacingMark {
            continue;
        }
        let pos = &mut buffer.pos[i];
        if adjust_offsets {
            pos.x_offset -= pos.x_advance;
            pos.y_offset -= pos.y_advance;
        }
        pos.x_advance = 0;
        pos.y_advance = 0;
    }
}

fn position_mark(
    face: &dyn FontFace,
    buffer: &mut Buffer,
    base_extents: &mut GlyphExtents,
    i: usize,
    class: u8,
) {
    let mark_extents = match face.glyph_extents(buffer.info[i].glyph_id()) {
        Some(extents) => extents,
        None => return,
    };
    let y_gap = i32::from(face.units_per_em()) / 16;
    let direction = buffer.props.direction;
    let pos = &mut buffer.pos[i];
    pos.x_offset = 0;
    pos.y_offset = 0;

    let center = base_extents.x_bearing + (base_extents.width - mark_extents.width) / 2
        - mark_extents.x_bearing;
    pos.x_offset += match class {
        class::DOUBLE_BELOW | class::DOUBLE_ABOVE if direction == Direction::LeftToRight => {
            base_extents.x_bearing + base_extents.width
                - mark_extents.width / 2
                - mark_extents.x_bearing
        }
        class::DOUBLE_BELOW | class::DOUBLE_ABOVE if direction == Direction::RightToLeft => {
            base_extents.x_bearing - mark_extents.width / 2 - mark_extents.x_bearing
        }
        class::ATTACHED_BELOW_LEFT | class::BELOW_LEFT | class::ABOVE_LEFT => {
            base_extents.x_bearing - mark_extents.x_bearing
        }
        class::ATTACHED_ABOVE_RIGHT | class::BELOW_RIGHT | class::ABOVE_RIGHT => {
            base_extents.x_bearing + base_extents.width
                - mark_extents.width
                - mark_extents.x_bearing
        }
        _ => center,
    };

    match class {
        class::DOUBLE_BELOW
        | class::BELOW_LEFT
        | class::BELOW
        | class::BELOW_RIGHT
        | class::ATTACHED_BELOW_LEFT
        | class::ATTACHED_BELOW => {
            if !matches!(class, class::ATTACHED_BELOW_LEFT | class::ATTACHED_BELOW) {
                base_extents.height -= y_gap;
            }
            pos.y_offset = base_extents.y_bearing + base_extents.height - mark_extents.y_bearing;
            // Never shift below marks up.
            if (y_gap > 0) == (pos.y_offset > 0) {
                base_extents.height -= pos.y_offset;
                pos.y_offset = 0;
            }
            base_extents.height += mark_extents.height;
        }
        class::DOUBLE_ABOVE
        | class::ABOVE_LEFT
        | class::ABOVE
        | class::ABOVE_RIGHT
        | class::ATTACHED_ABOVE
        | class::ATTACHED_ABOVE_RIGHT => {
            if !matches!(class, class::ATTACHED_ABOVE | class::ATTACHED_ABOVE_RIGHT) {
                base_extents.y_bearing += y_gap;
                base_extents.height -= y_gap;
            }
            pos.y_offset = base_extents.y_bearing - (mark_extents.y_bearing + mark_extents.height);
            // Don't shift above marks down too far.
            if (y_gap > 0) != (pos.y_offset > 0) {
                let correction = -pos.y_offset / 2;
                base_extents.y_bearing += correction;
                base_extents.height -= correction;
                pos.y_offset += correction;
            }
            base_extents.y_bearing -= mark_extents.height;
            base_extents.height += mark_extents.height;
        }
        _ => {}
    }
}

fn position_around_base(
    plan: &ShapePlan,
    face: &dyn FontFace,
    buffer: &mut Buffer,
    base: usize,
    end: usize,
    adjust_offsets: bool,
) {
    buffer.unsafe_to_break(base, end);

    let base_glyph = buffer.info[base].glyph_id();
    let mut base_extents = match face.glyph_extents(base_glyph) {
        Some(extents) => extents,
        None => {
            zero_mark_advances(buffer, base + 1, end, adjust_offsets);
            return;
        }
    };
    base_extents.y_bearing += buffer.pos[base].y_offset;
    // The advance positions marks better than the ink, and works for empty glyphs.
    base_extents.x_bearing = 0;
    base_extents.width = face.glyph_h_advance(base_glyph);

    let lig_id = buffer.info[base].lig_id();
    let num_lig_components = i32::from(buffer.info[base].lig_num_comps());

    let forward = buffer.props.direction.is_forward();
    let (mut x_offset, mut y_offset) = if forward {
        (-buffer.pos[base].x_advance, -buffer.pos[base].y_advance)
    } else {
        (0, 0)
    };

    let horizontal_direction = if plan.props.direction.is_horizontal() {
        plan.props.direction
    } else {
        Direction::from_script(plan.props.script)
    };

    let mut component_extents = base_extents;
    let mut last_lig_component = -1;
    let mut last_class = 255;
    let mut cluster_extents = base_extents;
    for i in base + 1..end {
        let class = buffer.info[i].modified_combining_class();
        if class == 0 {
            let pos = &buffer.pos[i];
            if forward {
                x_offset -= pos.x_advance;
                y_offset -= pos.y_advance;
            } else {
                x_offset += pos.x_advance;
                y_offset += pos.y_advance;
            }
            continue;
        }

        if num_lig_components > 1 {
            let this_lig_id = buffer.info[i].lig_id();
            let mut this_lig_component = i32::from(buffer.info[i].lig_comp()) - 1;
            // Marks that don't belong to a component attach to the last one.
            if lig_id == 0 || lig_id != this_lig_id || this_lig_component >= num_lig_components {
                this_lig_component = num_lig_components - 1;
            }
            if last_lig_component != this_lig_component {
                last_lig_component = this_lig_component;
                last_class = 255;
                component_extents = base_extents;
                let component = if horizontal_direction == Direction::LeftToRight {
                    this_lig_component
                } else {
                    num_lig_components - 1 - this_lig_component
                };
                component_extents.x_bearing +=
                    component * component_extents.width / num_lig_components;
                component_extents.width /= num_lig_components;
            }
        }

        if last_class != class {
            last_class = class;
            cluster_extents = component_extents;
        }
        position_mark(face, buffer, &mut cluster_extents, i, class);

        let pos = &mut buffer.pos[i];
        pos.x_advance = 0;
        pos.y_advance = 0;
        pos.x_offset += x_offset;
        pos.y_offset += y_offset;
    }
}

fn position_cluster(
    plan: &ShapePlan,
    face: &dyn FontFace,
    buffer: &mut Buffer,
    start: usize,
    end: usize,
    adjust_offsets: bool,
) {
    if end - start < 2 {
        return;
    }

    let mut i = start;
    while i < end {
        if buffer.info[i].is_unicode_mark() {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < end && buffer.info[j].is_unicode_mark() {
            j += 1;
        }
        position_around_base(plan, face, buffer, i, j, adjust_offsets);
        i = j;
    }
}

/// Position marks around their base for fonts without mark positioning.
pub(crate) fn position_marks(
    plan: &ShapePlan,
    face: &dyn FontFace,
    buffer: &mut Buffer,
    adjust_offsets: bool,
) {
    let mut start = 0;
    for i in 1..buffer.len() {
        if !buffer.info[i].is_unicode_mark() {
            position_cluster(plan, face, buffer, start, i, adjust_offsets);
            start = i;
        }
    }
    let end = buffer.len();
    if end > start {
        position_cluster(plan, face, buffer, start, end, adjust_offsets);
    }
}

/// Set the advance of spaces that were given the plain space glyph during normalization.
pub(crate) fn position_spaces(face: &dyn FontFace, buffer: &mut Buffer) {
    let horizontal = buffer.props.direction.is_horizontal();
    let upem = i32::from(face.units_per_em());
    for i in 0..buffer.len() {
        let info = &buffer.info[i];
        if !info.is_unicode_space() || info.is_ligated() {
            continue;
        }

        let pos = &mut buffer.pos[i];
        let space = info.space_fallback();
        let em_fraction = match space {
            SpaceType::NotSpace | SpaceType::Space => continue,
            SpaceType::Em
            | SpaceType::Em2
            | SpaceType::Em3
            | SpaceType::Em4
            | SpaceType::Em5
            | SpaceType::Em6
            | SpaceType::Em16 => {
                let n = space as i32;
                (upem + n / 2) / n
            }
            SpaceType::FourEm18 => upem * 4 / 18,
            SpaceType::Figure => {
                let digit = (u32::from(b'0')..=u32::from(b'9')).find_map(|ch| face.nominal_glyph(ch));
                if let Some(glyph) = digit {
                    set_glyph_advance(face, pos, glyph, horizontal);
                }
                continue;
            }
            SpaceType::Punctuation => {
                let punctuation = face
                    .nominal_glyph(u32::from(b'.'))
                    .or_else(|| face.nominal_glyph(u32::from(b',')));
                if let Some(glyph) = punctuation {
                    set_glyph_advance(face, pos, glyph, horizontal);
                }
                continue;
            }
            SpaceType::Narrow => {
                // Half the space glyph it was given.
                if horizontal {
                    pos.x_advance /= 2;
                } else {
                    pos.y_advance /= 2;
                }
                continue;
            }
        };

        if horizontal {
            pos.x_advance = em_fraction;
        } else {
            pos.y_advance = -em_fraction;
        }
    }
}

fn set_glyph_advance(face: &dyn FontFace, pos: &mut GlyphPosition, glyph: u16, horizontal: bool) {
    if horizontal {
        pos.x_advance = face.glyph_h_advance(glyph);
    } else {
        pos.y_advance = face.glyph_v_advance(glyph);
    }
}
