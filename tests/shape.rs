mod common;

use fontshape::unicode::script;
use fontshape::{shape, Buffer, BufferFlags, ClusterLevel, Direction};

use crate::common::{glyph_ids, glyphs, parse_features, shape_text, MapFace};

#[test]
fn empty_text_shapes_to_nothing() {
    let face = MapFace::with_chars("abc");
    let buffer = shape_text(&face, "", "", |_| {});
    assert_eq!(buffer.len(), 0);
    assert!(buffer.glyph_positions().is_empty());
}

#[test]
fn every_glyph_has_a_position() {
    let face = MapFace::with_chars("abc \u{0301}");
    for text in ["abc", "a\u{0301}b", "a b\u{200D}c", "\u{0301}\u{0301}"] {
        let buffer = shape_text(&face, text, "", |buffer| buffer.flags = BufferFlags::BOT);
        assert_eq!(buffer.glyph_infos().len(), buffer.glyph_positions().len(), "{}", text);
    }
}

#[test]
fn clusters_increase_in_forward_text() {
    let face = MapFace::with_chars("abcde\u{0301}");
    let buffer = shape_text(&face, "ab\u{0301}cde", "", |_| {});
    let clusters = glyphs(&buffer)
        .iter()
        .map(|glyph| glyph.cluster)
        .collect::<Vec<_>>();
    assert!(clusters.windows(2).all(|pair| pair[0] <= pair[1]));
    // The mark joins the cluster of its base.
    assert_eq!(clusters, vec![0, 1, 1, 4, 5, 6]);
}

#[test]
fn clusters_decrease_in_backward_text() {
    let face = MapFace::new(&[('\u{05D0}', 1), ('\u{05D1}', 2), ('\u{05D2}', 3)]);
    let buffer = shape_text(&face, "\u{05D0}\u{05D1}\u{05D2}", "", |_| {});
    assert_eq!(buffer.direction(), Direction::RightToLeft);
    assert_eq!(glyph_ids(&buffer), vec![3, 2, 1]);
    let clusters = glyphs(&buffer)
        .iter()
        .map(|glyph| glyph.cluster)
        .collect::<Vec<_>>();
    assert_eq!(clusters, vec![4, 2, 0]);
}

#[test]
fn characters_cluster_level_keeps_marks_apart() {
    let face = MapFace::with_chars("a\u{0301}");
    let buffer = shape_text(&face, "a\u{0301}", "", |buffer| {
        buffer.cluster_level = ClusterLevel::Characters
    });
    let glyphs = glyphs(&buffer);
    assert_eq!(glyphs[0].cluster, 0);
    assert_eq!(glyphs[1].cluster, 1);
}

#[test]
fn marks_hang_over_their_base_without_gpos() {
    let face = MapFace::with_chars("a\u{0301}");
    let buffer = shape_text(&face, "a\u{0301}", "", |_| {});
    let glyphs = glyphs(&buffer);
    assert_eq!(glyphs[0].x_advance, 500);
    assert_eq!(glyphs[1].x_advance, 0);
}

#[test]
fn arabic_lam_alef_from_windows_1256_glyphs() {
    // Glyph ids follow the Windows-1256 code page and there is no GSUB.
    let face = MapFace::new(&[
        ('\u{0627}', 199),
        ('\u{0644}', 225),
        ('\u{0649}', 236),
        ('\u{064A}', 237),
        ('\u{0652}', 250),
    ]);
    let mut buffer = Buffer::new();
    buffer.set_direction(Direction::RightToLeft);
    buffer.set_script(script::ARABIC);
    buffer.add_codepoints(&[0x0644, 0x0627], 0, 2);
    shape(&face, &mut buffer, &[]);
    assert_eq!(glyph_ids(&buffer), vec![165]);
}

#[test]
fn thai_sara_am_is_decomposed() {
    let face = MapFace::new(&[
        ('\u{0E14}', 1),
        ('\u{0E48}', 2),
        ('\u{0E4D}', 3),
        ('\u{0E32}', 4),
    ]);
    let buffer = shape_text(&face, "\u{0E14}\u{0E48}\u{0E33}", "", |_| {});
    // NIKHAHIT moves in front of the tone mark and SARA AA follows.
    assert_eq!(glyph_ids(&buffer), vec![1, 3, 2, 4]);
}

#[test]
fn unsupported_variation_selector_stays_separate() {
    let face = MapFace::new(&[('\u{4E00}', 1)]);
    let buffer = shape_text(&face, "\u{4E00}\u{E0101}", "", |buffer| {
        buffer.flags = BufferFlags::PRESERVE_DEFAULT_IGNORABLES
    });
    assert_eq!(glyph_ids(&buffer), vec![1, 0]);
}

#[test]
fn features_parse_from_strings() {
    let features = parse_features("kern, -liga  aalt=2 +smcp[3:5]");
    let strings = features
        .iter()
        .map(|feature| feature.to_string())
        .collect::<Vec<_>>();
    assert_eq!(strings, vec!["kern", "-liga", "aalt=2", "smcp[3:5]"]);
}

#[test]
fn user_features_without_lookups_change_nothing() {
    let face = MapFace::with_chars("fi");
    let plain = shape_text(&face, "fi", "", |_| {});
    let featured = shape_text(&face, "fi", "-liga, smcp[0:1]", |_| {});
    assert_eq!(plain.serialize(true), featured.serialize(true));
}
