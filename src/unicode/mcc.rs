use unicode_ccc::{get_canonical_combining_class, CanonicalCombiningClass};

/// Combining classes as used for mark reordering.
///
/// The Hebrew, Arabic, Telugu, Thai and Tibetan classes are permuted so that sorting marks by
/// this value produces the order fonts are designed for. A handful of characters have their
/// class overridden outright.
pub fn modified_combining_class(ch: u32) -> u8 {
    match ch {
        // Tai Tham SAKOT sorts after any tone marks
        0x1A60 => 254,
        // Tibetan PADMA sorts after vowel marks
        0x0FC6 => 254,
        // Tibetan TSA-PHRU sorts before U+0F74
        0x0F39 => 127,
        _ => match char::from_u32(ch) {
            Some(c) => modify(get_canonical_combining_class(c)),
            None => 0,
        },
    }
}

pub fn combining_class(ch: u32) -> u8 {
    match char::from_u32(ch) {
        Some(c) => get_canonical_combining_class(c) as u8,
        None => 0,
    }
}

fn modify(ccc: CanonicalCombiningClass) -> u8 {
    let class = ccc as u8;
    match class {
        // Hebrew
        10 => 22,
        11 => 15,
        12 => 16,
        13 => 17,
        14 => 23,
        15 => 18,
        16 => 19,
        17 => 20,
        18 => 21,
        19 => 14,
        20 => 24,
        21 => 12,
        22 => 25,
        23 => 13,
        24 => 10,
        25 => 11,
        // Arabic
        27 => 28,
        28 => 29,
        29 => 30,
        30 => 31,
        31 => 32,
        32 => 33,
        33 => 27,
        // Telugu length marks would otherwise reorder with the virama
        84 => 4,
        91 => 5,
        // Thai sara u / sara uu
        103 => 3,
        // Tibetan
        130 => 132,
        132 => 131,
        _ => class,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hebrew_marks_are_permuted() {
        // SHEVA
        assert_eq!(modified_combining_class(0x05B0), 22);
        // DAGESH sorts before the vowel points
        assert_eq!(modified_combining_class(0x05BC), 12);
        assert_eq!(modified_combining_class(0x05C1), 10);
    }

    #[test]
    fn arabic_shadda_sorts_first() {
        assert_eq!(modified_combining_class(0x0651), 27);
        assert_eq!(modified_combining_class(0x064E), 31);
    }

    #[test]
    fn special_cases() {
        assert_eq!(modified_combining_class(0x1A60), 254);
        assert_eq!(modified_combining_class(0x0F39), 127);
        assert_eq!(modified_combining_class(0x0E38), 3);
        assert_eq!(modified_combining_class(0x0C56), 5);
        assert_eq!(modified_combining_class(0x0301), 230);
        assert_eq!(modified_combining_class(0x0041), 0);
    }
}
