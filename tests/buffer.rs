mod common;

use fontshape::unicode::script;
use fontshape::{Buffer, ClusterLevel, Direction};

use crate::common::{glyphs, shape_text, MapFace};

fn clusters(buffer: &Buffer) -> Vec<u32> {
    buffer.glyph_infos().iter().map(|info| info.cluster).collect()
}

#[test]
fn merge_clusters_takes_the_minimum() {
    let mut buffer = Buffer::new();
    for (i, &cluster) in [5, 5, 8, 10].iter().enumerate() {
        buffer.add(0x61 + i as u32, cluster);
    }
    buffer.merge_clusters(1, 3);
    assert_eq!(clusters(&buffer), vec![5, 5, 5, 10]);
}

#[test]
fn merge_clusters_grows_over_shared_clusters() {
    let mut buffer = Buffer::new();
    for (i, &cluster) in [1, 2, 2, 3, 4].iter().enumerate() {
        buffer.add(0x61 + i as u32, cluster);
    }
    buffer.merge_clusters(0, 2);
    assert_eq!(clusters(&buffer), vec![1, 1, 1, 3, 4]);
}

#[test]
fn merge_clusters_only_flags_at_character_level() {
    let mut buffer = Buffer::new();
    buffer.cluster_level = ClusterLevel::Characters;
    for (i, &cluster) in [0, 1, 2].iter().enumerate() {
        buffer.add(0x61 + i as u32, cluster);
    }
    buffer.merge_clusters(0, 3);
    assert_eq!(clusters(&buffer), vec![0, 1, 2]);
    let flags = buffer
        .glyph_infos()
        .iter()
        .map(|info| info.unsafe_to_break())
        .collect::<Vec<_>>();
    assert_eq!(flags, vec![false, true, true]);
}

#[test]
fn reversing_twice_restores_the_buffer() {
    let face = MapFace::with_chars("abcd\u{0301}");
    let mut buffer = shape_text(&face, "ab\u{0301}cd", "", |_| {});
    let before = glyphs(&buffer);
    buffer.reverse();
    assert_ne!(glyphs(&buffer), before);
    buffer.reverse();
    assert_eq!(glyphs(&buffer), before);
}

#[test]
fn segment_properties_are_guessed() {
    let mut buffer = Buffer::new();
    buffer.push_str("123 \u{05D0}");
    buffer.guess_segment_properties();
    assert_eq!(buffer.script(), script::HEBREW);
    assert_eq!(buffer.direction(), Direction::RightToLeft);

    let mut buffer = Buffer::new();
    buffer.push_str("123");
    buffer.guess_segment_properties();
    assert_eq!(buffer.script(), 0);
    assert_eq!(buffer.direction(), Direction::LeftToRight);
}

#[test]
fn context_is_kept_around_an_item() {
    let text = "hello world".chars().map(u32::from).collect::<Vec<_>>();
    let mut buffer = Buffer::new();
    buffer.add_codepoints(&text, 6, 5);
    assert_eq!(buffer.len(), 5);
    assert_eq!(clusters(&buffer), vec![6, 7, 8, 9, 10]);
    // Nearest character first.
    let pre = buffer.pre_context().to_vec();
    assert_eq!(pre, vec![0x20, 0x6F, 0x6C, 0x6C, 0x65]);
    assert!(buffer.post_context().is_empty());
}

#[test]
fn serialized_glyphs_round_trip_through_the_parser() {
    let face = MapFace::with_chars("ab");
    let buffer = shape_text(&face, "ab", "", |_| {});
    assert_eq!(buffer.serialize(true), "[1=0+500|2=1+500]");
    let parsed = glyphs(&buffer);
    assert_eq!(parsed.len(), 2);
    assert_eq!((parsed[1].id, parsed[1].cluster, parsed[1].x_advance), (2, 1, 500));
}
