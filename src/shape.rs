//! Shaping a buffer of text into positioned glyphs.
//!
//! [shape] picks the Graphite engine when the face has Graphite tables and the OpenType
//! pipeline otherwise. The OpenType pipeline runs in a fixed order:
//!
//! 1. Unicode properties, cluster formation and native direction.
//! 2. Script preprocessing, mirroring, normalization and feature masks.
//! 3. Substitution with GSUB, or `morx` for AAT fonts.
//! 4. Positioning with GPOS, `kerx` or `kern`, followed by fallback mark positioning.
//! 5. Default ignorables are hidden or removed and glyph flags propagated.
//!
//! Anomalies met along the way (malformed lookups, exhausted limits) end the pass they
//! occur in. They are never reported to the caller.

use log::{debug, warn};

use crate::buffer::{
    Buffer, BufferFlags, ClusterLevel, Direction, GlyphInfo, GlyphPosition, ScratchFlags,
    GLYPH_FLAG_DEFINED,
};
use crate::error::ShapingError;
use crate::face::FontFace;
use crate::fallback;
use crate::feature_map::Feature;
use crate::gpos;
use crate::layout::GPOS;
use crate::graphite::GraphiteFace;
use crate::gsub;
use crate::layout::GSUB;
use crate::kern::apply_fallback_kerning;
use crate::morx::{apply_kerx, apply_morx};
use crate::normalize::normalize;
use crate::plan::ShapePlan;
use crate::scripts::ZeroWidthMarks;
use crate::tag;
use crate::unicode::{self, script, GeneralCategory};

const DOTTED_CIRCLE: u32 = 0x25CC;
const FRACTION_SLASH: u32 = 0x2044;

/// Shape the contents of `buffer` with `face`, applying `features` on top of the defaults.
///
/// The buffer's direction and script are guessed from its contents when unset. Afterwards
/// the buffer holds glyph ids in visual order along with their positions.
pub fn shape(face: &dyn FontFace, buffer: &mut Buffer, features: &[Feature]) {
    if buffer.props.direction == Direction::Invalid || buffer.props.script == 0 {
        buffer.guess_segment_properties();
    }
    if buffer.is_empty() {
        return;
    }

    if let Some(graphite) = face.graphite() {
        match shape_graphite(graphite, face, buffer, features) {
            Ok(true) => return,
            Ok(false) => debug!("no Graphite rules for the script, using OpenType"),
            Err(err) => warn!("Graphite shaping failed, using OpenType: {}", err),
        }
    }

    let plan = ShapePlan::new(face, &buffer.props, features);
    shape_with_plan(&plan, face, buffer);
}

/// Shape `buffer` with a plan built earlier for the same face and segment properties.
pub fn shape_with_plan(plan: &ShapePlan, face: &dyn FontFace, buffer: &mut Buffer) {
    if buffer.is_empty() {
        return;
    }
    buffer.enter();
    let target_direction = buffer.props.direction;

    buffer.reset_masks(plan.map.global_mask());
    set_unicode_props(buffer);
    insert_dotted_circle(face, buffer);
    form_clusters(buffer);
    ensure_native_direction(buffer);

    plan.shaper.preprocess_text(plan, face, buffer);

    substitute_before_position(plan, face, buffer, target_direction);
    position(plan, face, buffer);
    substitute_after_position(plan, face, buffer);

    propagate_flags(buffer);

    buffer.props.direction = target_direction;
    buffer.leave();
}

fn set_unicode_props(buffer: &mut Buffer) {
    let len = buffer.len();
    let mut i = 0;
    while i < len {
        buffer.info[i].init_unicode_props(&mut buffer.scratch_flags);
        let ch = buffer.info[i].codepoint;

        // Marks are made continuations by `init_unicode_props`. Emoji modifiers, joined
        // pictographs, flag pairs and a few non-mark extenders are handled here.
        if buffer.info[i].general_category() == GeneralCategory::ModifierSymbol
            && (0x1F3FB..=0x1F3FF).contains(&ch)
        {
            buffer.info[i].set_continuation();
        } else if is_regional_indicator(ch) {
            if i + 1 < len && is_regional_indicator(buffer.info[i + 1].codepoint) {
                i += 1;
                buffer.info[i].init_unicode_props(&mut buffer.scratch_flags);
                buffer.info[i].set_continuation();
            }
        } else if buffer.info[i].is_zwj() {
            buffer.info[i].set_continuation();
            if i + 1 < len && unicode::is_extended_pictographic(buffer.info[i + 1].codepoint) {
                i += 1;
                buffer.info[i].init_unicode_props(&mut buffer.scratch_flags);
                buffer.info[i].set_continuation();
            }
        } else if matches!(ch, 0xFF9E..=0xFF9F | 0xE0020..=0xE007F) {
            buffer.info[i].set_continuation();
        }
        i += 1;
    }
}

fn is_regional_indicator(ch: u32) -> bool {
    (0x1F1E6..=0x1F1FF).contains(&ch)
}

/// Give a mark at the very start of the text a dotted circle to sit on.
fn insert_dotted_circle(face: &dyn FontFace, buffer: &mut Buffer) {
    if !buffer.flags.contains(BufferFlags::BOT)
        || buffer.flags.contains(BufferFlags::DO_NOT_INSERT_DOTTED_CIRCLE)
        || !buffer.context[0].is_empty()
        || !buffer.info[0].is_unicode_mark()
    {
        return;
    }
    if face.nominal_glyph(DOTTED_CIRCLE).is_none() {
        return;
    }

    let mut dotted_circle = GlyphInfo::new(DOTTED_CIRCLE, buffer.info[0].cluster);
    dotted_circle.mask = buffer.info[0].mask;
    dotted_circle.init_unicode_props(&mut buffer.scratch_flags);

    buffer.clear_output();
    buffer.output_info(dotted_circle);
    buffer.swap_buffers();
}

fn form_clusters(buffer: &mut Buffer) {
    if !buffer.scratch_flags.contains(ScratchFlags::HAS_NON_ASCII) {
        return;
    }
    let graphemes = buffer.graphemes().collect::<Vec<_>>();
    for (start, end) in graphemes {
        if buffer.cluster_level == ClusterLevel::MonotoneGraphemes {
            buffer.merge_clusters(start, end);
        } else {
            buffer.unsafe_to_break(start, end);
        }
    }
}

/// The horizontal direction of the buffer's script, or `None` for text without a script.
fn horizontal_direction(buffer: &Buffer) -> Option<Direction> {
    match buffer.props.script {
        0 | script::COMMON | script::INHERITED | script::UNKNOWN => {}
        script => return Some(Direction::from_script(script)),
    }

    // Numbers with no letters are laid out left to right.
    let mut found_number = false;
    for info in &buffer.info {
        let gen_cat = info.general_category();
        if gen_cat == GeneralCategory::DecimalNumber {
            found_number = true;
        } else if gen_cat.is_letter() {
            return None;
        }
    }
    found_number.then_some(Direction::LeftToRight)
}

/// Lookups run in the script's native direction. A buffer shaped against it is reversed
/// grapheme by grapheme, and reversed back once positioned.
fn ensure_native_direction(buffer: &mut Buffer) {
    let direction = buffer.props.direction;
    let horizontal = horizontal_direction(buffer);

    let reverse = match horizontal {
        Some(native) if direction.is_horizontal() => direction != native,
        _ => direction.is_vertical() && direction != Direction::TopToBottom,
    };
    if reverse {
        buffer.reverse_graphemes();
        buffer.props.direction = direction.reverse();
    }
}

fn substitute_before_position(
    plan: &ShapePlan,
    face: &dyn FontFace,
    buffer: &mut Buffer,
    target_direction: Direction,
) {
    rotate_chars(plan, face, buffer, target_direction);
    normalize(plan, face, buffer);
    setup_masks(plan, buffer);

    if plan.fallback_mark_positioning {
        fallback::recategorize_marks(buffer);
    }

    // From here on the buffer holds glyphs.
    for info in &mut buffer.info {
        info.codepoint = info.glyph_index;
    }

    gsub::substitute_start(face, buffer);
    if plan.fallback_glyph_classes {
        gsub::synthesize_glyph_classes(buffer);
    }

    match face.morx() {
        Some(morx) if plan.apply_morx => apply_morx(morx, buffer, &plan.aat_selectors),
        _ => plan.map.apply::<GSUB>(plan, face, buffer),
    }
}

/// Mirror characters for right-to-left text and use vertical forms for vertical text
/// when the font has no `vert` feature.
fn rotate_chars(
    plan: &ShapePlan,
    face: &dyn FontFace,
    buffer: &mut Buffer,
    target_direction: Direction,
) {
    if target_direction.is_backward() {
        for info in &mut buffer.info {
            let Some(mirrored) = unicode::mirrored(info.codepoint) else {
                continue;
            };
            if face.nominal_glyph(mirrored).is_some() {
                info.codepoint = mirrored;
            } else {
                info.mask |= plan.rtlm_mask;
            }
        }
    }

    if target_direction.is_vertical() && !plan.has_vert {
        for info in &mut buffer.info {
            let vertical = unicode::vertical_char_for(info.codepoint);
            if vertical != info.codepoint && face.nominal_glyph(vertical).is_some() {
                info.codepoint = vertical;
            }
        }
    }
}

fn setup_masks(plan: &ShapePlan, buffer: &mut Buffer) {
    setup_masks_fraction(plan, buffer);

    plan.shaper.setup_masks(plan, buffer);

    for feature in plan.user_features.iter().filter(|f| !f.is_global()) {
        let (mask, shift) = plan.map.mask(feature.tag);
        let start = u32::try_from(feature.start).unwrap_or(u32::MAX);
        let end = u32::try_from(feature.end).unwrap_or(u32::MAX);
        buffer.set_masks(feature.value << shift, mask, start, end);
    }
}

/// Digits around a fraction slash become numerator and denominator.
fn setup_masks_fraction(plan: &ShapePlan, buffer: &mut Buffer) {
    if !buffer.scratch_flags.contains(ScratchFlags::HAS_NON_ASCII) || !plan.has_frac {
        return;
    }

    let (pre_mask, post_mask) = if buffer.props.direction.is_forward() {
        (
            plan.numr_mask | plan.frac_mask,
            plan.frac_mask | plan.dnom_mask,
        )
    } else {
        (
            plan.frac_mask | plan.dnom_mask,
            plan.numr_mask | plan.frac_mask,
        )
    };

    let is_digit = |info: &GlyphInfo| info.general_category() == GeneralCategory::DecimalNumber;
    let len = buffer.len();
    let mut i = 0;
    while i < len {
        if buffer.info[i].codepoint != FRACTION_SLASH {
            i += 1;
            continue;
        }

        let mut start = i;
        while start > 0 && is_digit(&buffer.info[start - 1]) {
            start -= 1;
        }
        let mut end = i + 1;
        while end < len && is_digit(&buffer.info[end]) {
            end += 1;
        }
        if start == i || end == i + 1 {
            i += 1;
            continue;
        }

        buffer.unsafe_to_break(start, end);
        for info in &mut buffer.info[start..i] {
            info.mask |= pre_mask;
        }
        buffer.info[i].mask |= plan.frac_mask;
        for info in &mut buffer.info[i + 1..end] {
            info.mask |= post_mask;
        }
        i = end;
    }
}

fn position(plan: &ShapePlan, face: &dyn FontFace, buffer: &mut Buffer) {
    buffer.clear_positions();
    position_default(face, buffer);
    position_complex(plan, face, buffer);

    if buffer.props.direction.is_backward() {
        buffer.reverse();
    }
}

fn position_default(face: &dyn FontFace, buffer: &mut Buffer) {
    let horizontal = buffer.props.direction.is_horizontal();
    for (info, pos) in buffer.info.iter().zip(buffer.pos.iter_mut()) {
        let glyph = info.glyph_id();
        if horizontal {
            pos.x_advance = face.glyph_h_advance(glyph);
        } else {
            pos.y_advance = face.glyph_v_advance(glyph);
            let (x, y) = face.glyph_v_origin(glyph);
            pos.x_offset -= x;
            pos.y_offset -= y;
        }
    }

    if buffer
        .scratch_flags
        .contains(ScratchFlags::HAS_SPACE_FALLBACK)
    {
        fallback::position_spaces(face, buffer);
    }
}

fn position_complex(plan: &ShapePlan, face: &dyn FontFace, buffer: &mut Buffer) {
    // Without GPOS, a zeroed mark hangs over the glyph before it.
    let adjust_offsets_when_zeroing =
        plan.adjust_mark_positioning_when_zeroing && buffer.props.direction.is_forward();

    // GPOS works with glyph origins at the horizontal origin.
    for_each_h_origin(face, buffer, 1);

    gpos::position_start(buffer);

    if plan.zero_marks == ZeroWidthMarks::ByGdefEarly {
        zero_mark_widths(buffer, adjust_offsets_when_zeroing);
    }

    if plan.apply_gpos {
        plan.map.apply::<GPOS>(plan, face, buffer);
    } else if plan.apply_kerx {
        if let Some(kerx) = face.kerx() {
            apply_kerx(kerx, buffer);
        }
    }
    if plan.apply_kern {
        if let Some(kern) = face.kern() {
            apply_fallback_kerning(kern, buffer, plan.kern_mask);
        }
    }

    if plan.zero_marks == ZeroWidthMarks::ByGdefLate {
        zero_mark_widths(buffer, adjust_offsets_when_zeroing);
    }

    zero_width_default_ignorables(buffer);
    gpos::position_finish_offsets(buffer);

    for_each_h_origin(face, buffer, -1);

    if plan.fallback_mark_positioning {
        fallback::position_marks(plan, face, buffer, adjust_offsets_when_zeroing);
    }
}

/// Add (`sign` 1) or subtract (`sign` -1) each glyph's horizontal origin from its offset.
fn for_each_h_origin(face: &dyn FontFace, buffer: &mut Buffer, sign: i32) {
    for (info, pos) in buffer.info.iter().zip(buffer.pos.iter_mut()) {
        let (x, y) = face.glyph_h_origin(info.glyph_id());
        pos.x_offset += sign * x;
        pos.y_offset += sign * y;
    }
}

fn zero_mark_widths(buffer: &mut Buffer, adjust_offsets: bool) {
    for (info, pos) in buffer.info.iter().zip(buffer.pos.iter_mut()) {
        if !info.is_mark() {
            continue;
        }
        if adjust_offsets {
            pos.x_offset -= pos.x_advance;
            pos.y_offset -= pos.y_advance;
        }
        pos.x_advance = 0;
        pos.y_advance = 0;
    }
}

fn zero_width_default_ignorables(buffer: &mut Buffer) {
    if !buffer
        .scratch_flags
        .contains(ScratchFlags::HAS_DEFAULT_IGNORABLES)
        || buffer.flags.intersects(
            BufferFlags::PRESERVE_DEFAULT_IGNORABLES | BufferFlags::REMOVE_DEFAULT_IGNORABLES,
        )
    {
        return;
    }
    for (info, pos) in buffer.info.iter().zip(buffer.pos.iter_mut()) {
        if info.is_default_ignorable() {
            *pos = GlyphPosition::default();
        }
    }
}

fn substitute_after_position(plan: &ShapePlan, face: &dyn FontFace, buffer: &mut Buffer) {
    hide_default_ignorables(face, buffer);
    plan.shaper.postprocess_glyphs(plan, face, buffer);
}

/// Show default ignorables with the invisible glyph, or drop them.
fn hide_default_ignorables(face: &dyn FontFace, buffer: &mut Buffer) {
    if !buffer
        .scratch_flags
        .contains(ScratchFlags::HAS_DEFAULT_IGNORABLES)
        || buffer
            .flags
            .contains(BufferFlags::PRESERVE_DEFAULT_IGNORABLES)
    {
        return;
    }

    let invisible = buffer
        .invisible_glyph
        .or_else(|| face.nominal_glyph(u32::from(' ')));
    match invisible {
        Some(glyph) if !buffer.flags.contains(BufferFlags::REMOVE_DEFAULT_IGNORABLES) => {
            for info in buffer.info.iter_mut().filter(|info| info.is_default_ignorable()) {
                info.codepoint = u32::from(glyph);
            }
        }
        _ => buffer.delete_glyphs_inplace(GlyphInfo::is_default_ignorable),
    }
}

/// Every glyph of a cluster carries the glyph flags of any of them.
fn propagate_flags(buffer: &mut Buffer) {
    if !buffer
        .scratch_flags
        .contains(ScratchFlags::HAS_UNSAFE_TO_BREAK)
    {
        return;
    }
    let clusters = buffer.clusters().collect::<Vec<_>>();
    for (start, end) in clusters {
        let flags = buffer.info[start..end]
            .iter()
            .fold(0, |flags, info| flags | (info.mask & GLYPH_FLAG_DEFINED));
        if flags != 0 {
            for info in &mut buffer.info[start..end] {
                info.mask |= flags;
            }
        }
    }
}

/// Characters and glyphs that Graphite output groups together.
#[derive(Debug, Copy, Clone, Default)]
struct GraphiteCluster {
    base_char: usize,
    num_chars: usize,
    cluster: u32,
    base_glyph: usize,
    num_glyphs: usize,
    advance: f32,
}

/// Shape with the Graphite rules of `graphite`. Returns `Ok(false)` when the font has no
/// rules for the buffer's script.
///
/// The buffer is only modified once shaping has succeeded.
fn shape_graphite(
    graphite: &GraphiteFace,
    face: &dyn FontFace,
    buffer: &mut Buffer,
    features: &[Feature],
) -> Result<bool, ShapingError> {
    let mut values = graphite.features_for_language(buffer.props.language.unwrap_or(0));
    for feature in features {
        let value = i16::try_from(feature.value)?;
        values.set_by_id(&graphite.feat, feature.tag, value);
    }

    let chars = buffer.info.iter().map(|info| info.codepoint).collect::<Vec<_>>();
    let script = unicode::ot_script_tags(buffer.props.script)
        .last()
        .copied()
        .unwrap_or(tag::DFLT);
    let backward = buffer.props.direction.is_backward();
    let rtl = buffer.props.direction == Direction::RightToLeft;

    let Some(seg) = graphite.shape(&chars, script, values, rtl, |ch| face.nominal_glyph(ch))
    else {
        return Ok(false);
    };

    if seg.slot_count() == 0 {
        buffer.info.clear();
        buffer.pos.clear();
        return Ok(true);
    }

    let mut clusters = vec![GraphiteCluster {
        cluster: buffer.info[0].cluster,
        ..GraphiteCluster::default()
    }];
    let mut curradv = 0.0;
    if backward {
        if let Some(first) = seg.first() {
            curradv = seg.slot(first).position().x;
        }
        clusters[0].advance = seg.advance().x - curradv;
    }

    let mut glyphs = Vec::with_capacity(seg.slot_count());
    for (ic, id) in seg.iter().enumerate() {
        let slot = seg.slot(id);
        let before = usize::try_from(slot.before())?;
        let after = usize::try_from(slot.after())?;
        glyphs.push(slot.glyph());

        // A glyph reaching back before the current cluster merges the clusters it spans.
        while clusters.len() > 1 && clusters[clusters.len() - 1].base_char > before {
            if let Some(merged) = clusters.pop() {
                let last = clusters.len() - 1;
                clusters[last].num_chars += merged.num_chars;
                clusters[last].num_glyphs += merged.num_glyphs;
                clusters[last].advance += merged.advance;
            }
        }

        let current = clusters[clusters.len() - 1];
        if slot.can_insert_before()
            && current.num_chars != 0
            && before >= current.base_char + current.num_chars
        {
            let base_char = current.base_char + current.num_chars;
            let cluster = buffer
                .info
                .get(base_char)
                .map(|info| info.cluster)
                .ok_or(crate::error::ParseError::BadIndex)?;
            let mut next = GraphiteCluster {
                base_char,
                num_chars: before - base_char,
                cluster,
                base_glyph: ic,
                num_glyphs: 0,
                advance: 0.0,
            };
            if backward {
                next.advance = curradv - slot.position().x;
                curradv -= next.advance;
            } else {
                let last = clusters.len() - 1;
                clusters[last].advance += slot.position().x - curradv;
                curradv += clusters[last].advance;
            }
            clusters.push(next);
        }

        let last = clusters.len() - 1;
        let current = &mut clusters[last];
        current.num_glyphs += 1;
        if current.base_char + current.num_chars < after + 1 {
            current.num_chars = after + 1 - current.base_char;
        }
    }

    let last = clusters.len() - 1;
    clusters[last].advance += if backward {
        curradv
    } else {
        seg.advance().x - curradv
    };

    let mut infos = Vec::with_capacity(glyphs.len());
    let mut cluster_advances = Vec::with_capacity(glyphs.len());
    for cluster in &clusters {
        let cluster_glyphs = glyphs
            .get(cluster.base_glyph..cluster.base_glyph + cluster.num_glyphs)
            .ok_or(crate::error::ParseError::BadIndex)?;
        for &glyph in cluster_glyphs {
            infos.push(GlyphInfo::new(u32::from(glyph), cluster.cluster));
            cluster_advances.push(cluster.advance as i32);
        }
    }

    let mut positions = vec![GlyphPosition::default(); infos.len()];
    let mut current_cluster = None;
    if !backward {
        let (mut curradvx, mut curradvy) = (0, 0);
        for (i, id) in seg.iter().enumerate().take(infos.len()) {
            let slot = seg.slot(id);
            let pos = &mut positions[i];
            pos.x_offset = slot.position().x as i32 - curradvx;
            pos.y_offset = slot.position().y as i32 - curradvy;
            if current_cluster != Some(infos[i].cluster) {
                pos.x_advance = cluster_advances[i];
                curradvx += pos.x_advance;
                current_cluster = Some(infos[i].cluster);
            }
            pos.y_advance = slot.advance().y as i32;
            curradvy += pos.y_advance;
        }
    } else {
        let mut curradvx = seg.advance().x as i32;
        let mut curradvy = 0;
        for (i, id) in seg.iter().enumerate().take(infos.len()) {
            let slot = seg.slot(id);
            let pos = &mut positions[i];
            if current_cluster != Some(infos[i].cluster) {
                pos.x_advance = cluster_advances[i];
                curradvx -= pos.x_advance;
                current_cluster = Some(infos[i].cluster);
            }
            pos.y_advance = slot.advance().y as i32;
            curradvy -= pos.y_advance;
            pos.x_offset =
                slot.position().x as i32 - cluster_advances[i] - curradvx + pos.x_advance;
            pos.y_offset = slot.position().y as i32 - curradvy;
        }
    }

    buffer.info = infos;
    buffer.pos = positions;
    buffer.have_output = false;
    buffer.have_positions = true;
    if backward {
        buffer.reverse_clusters();
    }
    let len = buffer.len();
    buffer.unsafe_to_break(0, len);
    Ok(true)
}
