//! Unicode character properties used while shaping.

pub mod mcc;

use crate::tag;

pub use self::mcc::modified_combining_class;

/// A Unicode script, identified by its ISO 15924 tag (`Arab`, `Latn`, ...).
pub type Script = u32;

/// ISO 15924 script tags.
pub mod script {
    use crate::tag;

    pub const ARABIC: u32 = tag!(b"Arab");
    pub const ARMENIAN: u32 = tag!(b"Armn");
    pub const BALINESE: u32 = tag!(b"Bali");
    pub const BENGALI: u32 = tag!(b"Beng");
    pub const BUGINESE: u32 = tag!(b"Bugi");
    pub const CHAM: u32 = tag!(b"Cham");
    pub const COMMON: u32 = tag!(b"Zyyy");
    pub const CYRILLIC: u32 = tag!(b"Cyrl");
    pub const DEVANAGARI: u32 = tag!(b"Deva");
    pub const GEORGIAN: u32 = tag!(b"Geor");
    pub const GREEK: u32 = tag!(b"Grek");
    pub const GUJARATI: u32 = tag!(b"Gujr");
    pub const GURMUKHI: u32 = tag!(b"Guru");
    pub const HAN: u32 = tag!(b"Hani");
    pub const HANGUL: u32 = tag!(b"Hang");
    pub const HEBREW: u32 = tag!(b"Hebr");
    pub const HIRAGANA: u32 = tag!(b"Hira");
    pub const INHERITED: u32 = tag!(b"Zinh");
    pub const JAVANESE: u32 = tag!(b"Java");
    pub const KANNADA: u32 = tag!(b"Knda");
    pub const KATAKANA: u32 = tag!(b"Kana");
    pub const KHMER: u32 = tag!(b"Khmr");
    pub const LAO: u32 = tag!(b"Laoo");
    pub const LATIN: u32 = tag!(b"Latn");
    pub const MALAYALAM: u32 = tag!(b"Mlym");
    pub const MANDAIC: u32 = tag!(b"Mand");
    pub const MANICHAEAN: u32 = tag!(b"Mani");
    pub const MONGOLIAN: u32 = tag!(b"Mong");
    pub const MYANMAR: u32 = tag!(b"Mymr");
    pub const NKO: u32 = tag!(b"Nkoo");
    pub const ORIYA: u32 = tag!(b"Orya");
    pub const PHAGS_PA: u32 = tag!(b"Phag");
    pub const PSALTER_PAHLAVI: u32 = tag!(b"Phlp");
    pub const SINHALA: u32 = tag!(b"Sinh");
    pub const SUNDANESE: u32 = tag!(b"Sund");
    pub const SYRIAC: u32 = tag!(b"Syrc");
    pub const TAI_THAM: u32 = tag!(b"Lana");
    pub const TAMIL: u32 = tag!(b"Taml");
    pub const TELUGU: u32 = tag!(b"Telu");
    pub const THAANA: u32 = tag!(b"Thaa");
    pub const THAI: u32 = tag!(b"Thai");
    pub const TIBETAN: u32 = tag!(b"Tibt");
    pub const UNKNOWN: u32 = tag!(b"Zzzz");
    pub const ADLAM: u32 = tag!(b"Adlm");
    pub const HANIFI_ROHINGYA: u32 = tag!(b"Rohg");
    pub const SOGDIAN: u32 = tag!(b"Sogd");
    pub const CHORASMIAN: u32 = tag!(b"Chrs");
    pub const OLD_UYGHUR: u32 = tag!(b"Ougr");
}

/// General category values, ordered so they pack into five bits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum GeneralCategory {
    Control = 0,
    Format = 1,
    Unassigned = 2,
    PrivateUse = 3,
    Surrogate = 4,
    LowercaseLetter = 5,
    ModifierLetter = 6,
    OtherLetter = 7,
    TitlecaseLetter = 8,
    UppercaseLetter = 9,
    SpacingMark = 10,
    EnclosingMark = 11,
    NonspacingMark = 12,
    DecimalNumber = 13,
    LetterNumber = 14,
    OtherNumber = 15,
    ConnectPunctuation = 16,
    DashPunctuation = 17,
    ClosePunctuation = 18,
    FinalPunctuation = 19,
    InitialPunctuation = 20,
    OtherPunctuation = 21,
    OpenPunctuation = 22,
    CurrencySymbol = 23,
    ModifierSymbol = 24,
    MathSymbol = 25,
    OtherSymbol = 26,
    LineSeparator = 27,
    ParagraphSeparator = 28,
    SpaceSeparator = 29,
}

impl GeneralCategory {
    pub fn is_mark(self) -> bool {
        matches!(
            self,
            GeneralCategory::SpacingMark
                | GeneralCategory::EnclosingMark
                | GeneralCategory::NonspacingMark
        )
    }

    pub fn is_letter(self) -> bool {
        matches!(
            self,
            GeneralCategory::LowercaseLetter
                | GeneralCategory::ModifierLetter
                | GeneralCategory::OtherLetter
                | GeneralCategory::TitlecaseLetter
                | GeneralCategory::UppercaseLetter
        )
    }

    pub(crate) fn from_u8(value: u8) -> GeneralCategory {
        use GeneralCategory::*;

        const ALL: [GeneralCategory; 30] = [
            Control,
            Format,
            Unassigned,
            PrivateUse,
            Surrogate,
            LowercaseLetter,
            ModifierLetter,
            OtherLetter,
            TitlecaseLetter,
            UppercaseLetter,
            SpacingMark,
            EnclosingMark,
            NonspacingMark,
            DecimalNumber,
            LetterNumber,
            OtherNumber,
            ConnectPunctuation,
            DashPunctuation,
            ClosePunctuation,
            FinalPunctuation,
            InitialPunctuation,
            OtherPunctuation,
            OpenPunctuation,
            CurrencySymbol,
            ModifierSymbol,
            MathSymbol,
            OtherSymbol,
            LineSeparator,
            ParagraphSeparator,
            SpaceSeparator,
        ];
        ALL.get(usize::from(value)).copied().unwrap_or(Unassigned)
    }
}

impl From<unicode_general_category::GeneralCategory> for GeneralCategory {
    fn from(gc: unicode_general_category::GeneralCategory) -> Self {
        use unicode_general_category::GeneralCategory as G;

        match gc {
            G::Control => GeneralCategory::Control,
            G::Format => GeneralCategory::Format,
            G::Unassigned => GeneralCategory::Unassigned,
            G::PrivateUse => GeneralCategory::PrivateUse,
            G::Surrogate => GeneralCategory::Surrogate,
            G::LowercaseLetter => GeneralCategory::LowercaseLetter,
            G::ModifierLetter => GeneralCategory::ModifierLetter,
            G::OtherLetter => GeneralCategory::OtherLetter,
            G::TitlecaseLetter => GeneralCategory::TitlecaseLetter,
            G::UppercaseLetter => GeneralCategory::UppercaseLetter,
            G::SpacingMark => GeneralCategory::SpacingMark,
            G::EnclosingMark => GeneralCategory::EnclosingMark,
            G::NonspacingMark => GeneralCategory::NonspacingMark,
            G::DecimalNumber => GeneralCategory::DecimalNumber,
            G::LetterNumber => GeneralCategory::LetterNumber,
            G::OtherNumber => GeneralCategory::OtherNumber,
            G::ConnectorPunctuation => GeneralCategory::ConnectPunctuation,
            G::DashPunctuation => GeneralCategory::DashPunctuation,
            G::ClosePunctuation => GeneralCategory::ClosePunctuation,
            G::FinalPunctuation => GeneralCategory::FinalPunctuation,
            G::InitialPunctuation => GeneralCategory::InitialPunctuation,
            G::OtherPunctuation => GeneralCategory::OtherPunctuation,
            G::OpenPunctuation => GeneralCategory::OpenPunctuation,
            G::CurrencySymbol => GeneralCategory::CurrencySymbol,
            G::ModifierSymbol => GeneralCategory::ModifierSymbol,
            G::MathSymbol => GeneralCategory::MathSymbol,
            G::OtherSymbol => GeneralCategory::OtherSymbol,
            G::LineSeparator => GeneralCategory::LineSeparator,
            G::ParagraphSeparator => GeneralCategory::ParagraphSeparator,
            G::SpaceSeparator => GeneralCategory::SpaceSeparator,
            _ => GeneralCategory::Unassigned,
        }
    }
}

pub fn general_category(ch: u32) -> GeneralCategory {
    match char::from_u32(ch) {
        Some(c) => unicode_general_category::get_general_category(c).into(),
        None => GeneralCategory::Unassigned,
    }
}

/// Default_Ignorable_Code_Point, excluding the Hangul fillers and the shorthand format
/// controls, which fonts render with spacing glyphs.
pub fn is_default_ignorable(ch: u32) -> bool {
    match ch >> 16 {
        0 => matches!(
            ch,
            0x00AD
                | 0x034F
                | 0x061C
                | 0x17B4..=0x17B5
                | 0x180B..=0x180F
                | 0x200B..=0x200F
                | 0x202A..=0x202E
                | 0x2060..=0x206F
                | 0xFE00..=0xFE0F
                | 0xFEFF
                | 0xFFF0..=0xFFF8
        ),
        1 => matches!(ch, 0x1D173..=0x1D17A),
        0xE => matches!(ch, 0xE0000..=0xE0FFF),
        _ => false,
    }
}

/// Extended_Pictographic, approximated by the blocks it is allocated in.
pub fn is_extended_pictographic(ch: u32) -> bool {
    matches!(
        ch,
        0x00A9
            | 0x00AE
            | 0x203C
            | 0x2049
            | 0x2122
            | 0x2139
            | 0x2194..=0x2199
            | 0x21A9..=0x21AA
            | 0x231A..=0x231B
            | 0x2328
            | 0x2388
            | 0x23CF
            | 0x23E9..=0x23F3
            | 0x23F8..=0x23FA
            | 0x24C2
            | 0x25AA..=0x25AB
            | 0x25B6
            | 0x25C0
            | 0x25FB..=0x25FE
            | 0x2600..=0x27BF
            | 0x2934..=0x2935
            | 0x2B05..=0x2B07
            | 0x2B1B..=0x2B1C
            | 0x2B50
            | 0x2B55
            | 0x3030
            | 0x303D
            | 0x3297
            | 0x3299
            | 0x1F000..=0x1F0FF
            | 0x1F10D..=0x1F10F
            | 0x1F12F
            | 0x1F16C..=0x1F171
            | 0x1F17E..=0x1F17F
            | 0x1F18E
            | 0x1F191..=0x1F19A
            | 0x1F1AD..=0x1F1E5
            | 0x1F201..=0x1F20F
            | 0x1F21A
            | 0x1F22F
            | 0x1F232..=0x1F23A
            | 0x1F23C..=0x1F23F
            | 0x1F249..=0x1F3FA
            | 0x1F400..=0x1F53D
            | 0x1F546..=0x1F64F
            | 0x1F680..=0x1F6FF
            | 0x1F774..=0x1F77F
            | 0x1F7D5..=0x1F7FF
            | 0x1F80C..=0x1F80F
            | 0x1F848..=0x1F84F
            | 0x1F85A..=0x1F85F
            | 0x1F888..=0x1F88F
            | 0x1F8AE..=0x1F8FF
            | 0x1F90C..=0x1F93A
            | 0x1F93C..=0x1F945
            | 0x1F947..=0x1FAFF
            | 0x1FC00..=0x1FFFD
    )
}

/// U+FE00..FE0F and U+E0100..E01EF. The Mongolian free variation selectors are left to
/// the Arabic shaper.
pub fn is_variation_selector(ch: u32) -> bool {
    matches!(ch, 0xFE00..=0xFE0F | 0xE0100..=0xE01EF)
}

/// How a space character may be synthesised when the font lacks a glyph for it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum SpaceType {
    NotSpace = 0,
    Em = 1,
    Em2 = 2,
    Em3 = 3,
    Em4 = 4,
    Em5 = 5,
    Em6 = 6,
    Em16 = 16,
    FourEm18 = 17,
    Space = 18,
    Figure = 19,
    Punctuation = 20,
    Narrow = 21,
}

impl SpaceType {
    pub(crate) fn from_u8(value: u8) -> SpaceType {
        match value {
            1 => SpaceType::Em,
            2 => SpaceType::Em2,
            3 => SpaceType::Em3,
            4 => SpaceType::Em4,
            5 => SpaceType::Em5,
            6 => SpaceType::Em6,
            16 => SpaceType::Em16,
            17 => SpaceType::FourEm18,
            18 => SpaceType::Space,
            19 => SpaceType::Figure,
            20 => SpaceType::Punctuation,
            21 => SpaceType::Narrow,
            _ => SpaceType::NotSpace,
        }
    }
}

pub fn space_fallback_type(ch: u32) -> SpaceType {
    match ch {
        0x0020 | 0x00A0 => SpaceType::Space,
        0x2000 | 0x2002 => SpaceType::Em2,
        0x2001 | 0x2003 | 0x3000 => SpaceType::Em,
        0x2004 => SpaceType::Em3,
        0x2005 => SpaceType::Em4,
        0x2006 => SpaceType::Em6,
        0x2007 => SpaceType::Figure,
        0x2008 => SpaceType::Punctuation,
        0x2009 => SpaceType::Em5,
        0x200A => SpaceType::Em16,
        0x202F => SpaceType::Narrow,
        0x205F => SpaceType::FourEm18,
        _ => SpaceType::NotSpace,
    }
}

pub fn mirrored(ch: u32) -> Option<u32> {
    char::from_u32(ch)
        .and_then(unicode_bidi_mirroring::get_mirrored)
        .map(u32::from)
}

/// The presentation form of `ch` for vertical text, or `ch` itself.
pub fn vertical_char_for(ch: u32) -> u32 {
    match ch >> 8 {
        0x20 => match ch {
            0x2013 => 0xFE32,
            0x2014 => 0xFE31,
            0x2025 => 0xFE30,
            0x2026 => 0xFE19,
            _ => ch,
        },
        0x30 => match ch {
            0x3001 => 0xFE11,
            0x3002 => 0xFE12,
            0x3008 => 0xFE3F,
            0x3009 => 0xFE40,
            0x300A => 0xFE3D,
            0x300B => 0xFE3E,
            0x300C => 0xFE41,
            0x300D => 0xFE42,
            0x300E => 0xFE43,
            0x300F => 0xFE44,
            0x3010 => 0xFE3B,
            0x3011 => 0xFE3C,
            0x3014 => 0xFE39,
            0x3015 => 0xFE3A,
            0x3016 => 0xFE17,
            0x3017 => 0xFE18,
            _ => ch,
        },
        0xFE => match ch {
            0xFE4F => 0xFE34,
            _ => ch,
        },
        0xFF => match ch {
            0xFF01 => 0xFE15,
            0xFF08 => 0xFE35,
            0xFF09 => 0xFE36,
            0xFF0C => 0xFE10,
            0xFF1A => 0xFE13,
            0xFF1B => 0xFE14,
            0xFF1F => 0xFE16,
            0xFF3B => 0xFE47,
            0xFF3D => 0xFE48,
            0xFF3F => 0xFE33,
            0xFF5B => 0xFE37,
            0xFF5D => 0xFE38,
            _ => ch,
        },
        _ => ch,
    }
}

/// Canonical decomposition of `ab` into at most two characters.
pub fn decompose(ab: u32) -> Option<(u32, Option<u32>)> {
    let c = char::from_u32(ab)?;
    // Hangul syllables decompose algorithmically into LV + T.
    if let Some(pair) = decompose_hangul(ab) {
        return Some(pair);
    }
    let mut parts = tinyvec::TinyVec::<[char; 4]>::new();
    unicode_normalization::char::decompose_canonical(c, |d| parts.push(d));
    if parts.len() == 1 && parts[0] == c {
        return None;
    }
    // Recompose all but the last part so the result is a pair, as the canonical
    // decomposition mapping is.
    let last = parts.pop()?;
    let mut first = *parts.first()?;
    for &part in parts.iter().skip(1) {
        first = unicode_normalization::char::compose(first, part)?;
    }
    Some((u32::from(first), Some(u32::from(last))))
}

/// Canonical composition of `a` and `b`.
pub fn compose(a: u32, b: u32) -> Option<u32> {
    if a == 0 || b == 0 {
        return None;
    }
    let a = char::from_u32(a)?;
    let b = char::from_u32(b)?;
    unicode_normalization::char::compose(a, b).map(u32::from)
}

const HANGUL_S_BASE: u32 = 0xAC00;
const HANGUL_L_BASE: u32 = 0x1100;
const HANGUL_V_BASE: u32 = 0x1161;
const HANGUL_T_BASE: u32 = 0x11A7;
const HANGUL_T_COUNT: u32 = 28;
const HANGUL_N_COUNT: u32 = 588;
const HANGUL_S_COUNT: u32 = 11172;

fn decompose_hangul(ab: u32) -> Option<(u32, Option<u32>)> {
    let s_index = ab.checked_sub(HANGUL_S_BASE)?;
    if s_index >= HANGUL_S_COUNT {
        return None;
    }
    let t_index = s_index % HANGUL_T_COUNT;
    if t_index == 0 {
        let l = HANGUL_L_BASE + s_index / HANGUL_N_COUNT;
        let v = HANGUL_V_BASE + (s_index % HANGUL_N_COUNT) / HANGUL_T_COUNT;
        Some((l, Some(v)))
    } else {
        Some((ab - t_index, Some(HANGUL_T_BASE + t_index)))
    }
}

/// The script of `ch`, for the scripts this crate has shapers or direction rules for.
/// Everything else is reported as Common, or Inherited for combining marks.
pub fn script_of(ch: u32) -> Script {
    use self::script::*;

    match ch {
        0x0041..=0x005A | 0x0061..=0x007A | 0x00AA | 0x00BA => LATIN,
        0x00C0..=0x00D6 | 0x00D8..=0x00F6 | 0x00F8..=0x024F | 0x1E00..=0x1EFF => LATIN,
        0x0300..=0x036F => INHERITED,
        0x0370..=0x03FF | 0x1F00..=0x1FFF => GREEK,
        0x0400..=0x052F => CYRILLIC,
        0x0531..=0x058F => ARMENIAN,
        0x0591..=0x05FF | 0xFB1D..=0xFB4F => HEBREW,
        0x064B..=0x0655 | 0x0670 => INHERITED,
        0x0600..=0x060B | 0x060D..=0x061A | 0x061C..=0x061E | 0x0620..=0x063F => ARABIC,
        0x0641..=0x06FF | 0x0750..=0x077F | 0x08A0..=0x08FF => ARABIC,
        0xFB50..=0xFDFF | 0xFE70..=0xFEFE => ARABIC,
        0x0700..=0x074F | 0x0860..=0x086F => SYRIAC,
        0x0780..=0x07BF => THAANA,
        0x07C0..=0x07FF => NKO,
        0x0840..=0x085F => MANDAIC,
        0x0900..=0x0950 | 0x0953..=0x0963 | 0x0966..=0x097F | 0xA8E0..=0xA8FF => DEVANAGARI,
        0x0980..=0x09FF => BENGALI,
        0x0A00..=0x0A7F => GURMUKHI,
        0x0A80..=0x0AFF => GUJARATI,
        0x0B00..=0x0B7F => ORIYA,
        0x0B80..=0x0BFF => TAMIL,
        0x0C00..=0x0C7F => TELUGU,
        0x0C80..=0x0CFF => KANNADA,
        0x0D00..=0x0D7F => MALAYALAM,
        0x0D80..=0x0DFF => SINHALA,
        0x0E01..=0x0E3A | 0x0E40..=0x0E5B => THAI,
        0x0E80..=0x0EFF => LAO,
        0x0F00..=0x0FD4 | 0x0FD9..=0x0FFF => TIBETAN,
        0x1000..=0x109F | 0xA9E0..=0xA9FF | 0xAA60..=0xAA7F => MYANMAR,
        0x10A0..=0x10FF | 0x2D00..=0x2D2F => GEORGIAN,
        0x1100..=0x11FF | 0x3130..=0x318F | 0xA960..=0xA97F | 0xAC00..=0xD7FF => HANGUL,
        0x1780..=0x17FF | 0x19E0..=0x19FF => KHMER,
        0x1800..=0x1801 | 0x1804 | 0x1806..=0x18AF => MONGOLIAN,
        0x1A00..=0x1A1F => BUGINESE,
        0x1A20..=0x1AAF => TAI_THAM,
        0x1B00..=0x1B7F => BALINESE,
        0x1B80..=0x1BBF | 0x1CC0..=0x1CCF => SUNDANESE,
        0x200C..=0x200D => INHERITED,
        0x3041..=0x309F => HIRAGANA,
        0x30A1..=0x30FA | 0x30FD..=0x30FF | 0x31F0..=0x31FF | 0xFF66..=0xFF9F => KATAKANA,
        0x2E80..=0x2FDF | 0x3005 | 0x3007 | 0x3021..=0x3029 | 0x3038..=0x303B => HAN,
        0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF | 0x20000..=0x3134F => HAN,
        0xA840..=0xA87F => PHAGS_PA,
        0xA980..=0xA9DF => JAVANESE,
        0xAA00..=0xAA5F => CHAM,
        0xFE00..=0xFE0F | 0xE0100..=0xE01EF => INHERITED,
        0x10AC0..=0x10AFF => MANICHAEAN,
        0x10B80..=0x10BAF => PSALTER_PAHLAVI,
        0x10D00..=0x10D3F => HANIFI_ROHINGYA,
        0x10F30..=0x10F6F => SOGDIAN,
        0x10F70..=0x10FAF => OLD_UYGHUR,
        0x10FB0..=0x10FDF => CHORASMIAN,
        0x1E900..=0x1E95F => ADLAM,
        _ => COMMON,
    }
}

/// Whether text in `script` runs right to left.
pub fn is_rtl_script(script: Script) -> bool {
    const RTL: &[u32] = &[
        script::ARABIC,
        script::HEBREW,
        script::SYRIAC,
        script::THAANA,
        script::NKO,
        script::MANDAIC,
        script::MANICHAEAN,
        script::PSALTER_PAHLAVI,
        script::ADLAM,
        script::HANIFI_ROHINGYA,
        script::SOGDIAN,
        script::CHORASMIAN,
        script::OLD_UYGHUR,
        tag!(b"Cprt"),
        tag!(b"Khar"),
        tag!(b"Phnx"),
        tag!(b"Lydi"),
        tag!(b"Avst"),
        tag!(b"Armi"),
        tag!(b"Phli"),
        tag!(b"Prti"),
        tag!(b"Sarb"),
        tag!(b"Orkh"),
        tag!(b"Samr"),
        tag!(b"Merc"),
        tag!(b"Mero"),
        tag!(b"Mend"),
        tag!(b"Nbat"),
        tag!(b"Narb"),
        tag!(b"Palm"),
        tag!(b"Hatr"),
        tag!(b"Sogo"),
        tag!(b"Elym"),
        tag!(b"Yezi"),
    ];
    RTL.contains(&script)
}

/// The OpenType script tags to try for `script`, most preferred first.
pub fn ot_script_tags(script: Script) -> tinyvec::ArrayVec<[u32; 3]> {
    use self::script::*;

    let mut tags = tinyvec::ArrayVec::new();
    let new_tag = match script {
        BENGALI => Some(tag::BNG2),
        DEVANAGARI => Some(tag::DEV2),
        GUJARATI => Some(tag::GJR2),
        GURMUKHI => Some(tag::GUR2),
        KANNADA => Some(tag::KND2),
        MALAYALAM => Some(tag::MLM2),
        ORIYA => Some(tag::ORY2),
        TAMIL => Some(tag::TML2),
        TELUGU => Some(tag::TEL2),
        MYANMAR => Some(tag::MYM2),
        _ => None,
    };
    if let Some(new_tag) = new_tag {
        tags.push(new_tag);
    }
    let old_tag = match script {
        HIRAGANA | KATAKANA => tag::KANA,
        LAO => tag::LAO,
        NKO => tag::NKO,
        COMMON | INHERITED | UNKNOWN => return tags,
        // The ISO tag with its first letter lowercased
        _ => script | 0x2000_0000,
    };
    tags.push(old_tag);
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_pack_into_five_bits() {
        for value in 0..30 {
            assert_eq!(GeneralCategory::from_u8(value) as u8, value);
        }
        assert_eq!(general_category(0x0301), GeneralCategory::NonspacingMark);
        assert_eq!(general_category(0x0020), GeneralCategory::SpaceSeparator);
    }

    #[test]
    fn default_ignorables() {
        assert!(is_default_ignorable(0x200D));
        assert!(is_default_ignorable(0xE0101));
        assert!(!is_default_ignorable(0x115F));
        assert!(!is_default_ignorable(0x0041));
    }

    #[test]
    fn decompose_pairs() {
        assert_eq!(decompose(0x00E9), Some((0x0065, Some(0x0301))));
        // U+1EC7 = U+1EB9 U+0302
        assert_eq!(decompose(0x1EC7), Some((0x1EB9, Some(0x0302))));
        assert_eq!(decompose(0xAC01), Some((0xAC00, Some(0x11A8))));
        assert_eq!(decompose(0x0041), None);
        assert_eq!(compose(0x0065, 0x0301), Some(0x00E9));
    }

    #[test]
    fn script_tags() {
        assert_eq!(
            ot_script_tags(script::DEVANAGARI).as_slice(),
            &[tag::DEV2, tag::DEVA]
        );
        assert_eq!(ot_script_tags(script::ARABIC).as_slice(), &[tag::ARAB]);
        assert!(ot_script_tags(script::COMMON).is_empty());
        assert!(is_rtl_script(script_of(0x0644)));
        assert_eq!(script_of(0x0E14), script::THAI);
    }
}
