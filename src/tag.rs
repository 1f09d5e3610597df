//! Four byte tags for tables, scripts, languages and features.

use crate::error::ParseError;
use std::fmt;

/// Generate a 4-byte font table tag from byte string
///
/// Example:
///
/// ```
/// use fontshape::tag;
/// assert_eq!(tag!(b"glyf"), 0x676C7966);
/// ```
#[macro_export]
macro_rules! tag {
    ($w:expr) => {
        $crate::tag::tag(*$w)
    };
}

/// Formats a tag as its four characters, or as hex when they are not printable ASCII.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct DisplayTag(pub u32);

pub const fn tag(chars: [u8; 4]) -> u32 {
    u32::from_be_bytes(chars)
}

/// Parse a tag of one to four printable ASCII characters. Short tags are padded with
/// spaces, so `"lao"` gives `lao `.
pub fn from_string(s: &str) -> Result<u32, ParseError> {
    let bytes = s.as_bytes();
    if bytes.is_empty() || bytes.len() > 4 {
        return Err(ParseError::BadValue);
    }
    if !bytes.iter().all(|&b| (0x20..0x7F).contains(&b)) {
        return Err(ParseError::BadValue);
    }
    let mut chars = [b' '; 4];
    chars[..bytes.len()].copy_from_slice(bytes);
    Ok(tag(chars))
}

impl fmt::Display for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chars = self.0.to_be_bytes();
        if chars.iter().all(|&b| (0x20..0x7F).contains(&b)) {
            chars.iter().try_for_each(|&b| write!(f, "{}", char::from(b)))
        } else {
            write!(f, "0x{:08x}", self.0)
        }
    }
}

impl fmt::Debug for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

// Tables
pub const AVAR: u32 = tag!(b"avar");
pub const CFF: u32 = tag!(b"CFF ");
pub const CMAP: u32 = tag!(b"cmap");
pub const FEAT: u32 = tag!(b"Feat");
pub const FVAR: u32 = tag!(b"fvar");
pub const GDEF: u32 = tag!(b"GDEF");
pub const GLAT: u32 = tag!(b"Glat");
pub const GLOC: u32 = tag!(b"Gloc");
pub const GLYF: u32 = tag!(b"glyf");
pub const GPOS: u32 = tag!(b"GPOS");
pub const GSUB: u32 = tag!(b"GSUB");
pub const HEAD: u32 = tag!(b"head");
pub const HHEA: u32 = tag!(b"hhea");
pub const HMTX: u32 = tag!(b"hmtx");
pub const KERN: u32 = tag!(b"kern");
pub const KERX: u32 = tag!(b"kerx");
pub const LOCA: u32 = tag!(b"loca");
pub const MAXP: u32 = tag!(b"maxp");
pub const MORX: u32 = tag!(b"morx");
pub const OS_2: u32 = tag!(b"OS/2");
pub const POST: u32 = tag!(b"post");
pub const SILF: u32 = tag!(b"Silf");
pub const SILL: u32 = tag!(b"Sill");
pub const VHEA: u32 = tag!(b"vhea");
pub const VMTX: u32 = tag!(b"vmtx");

// sfnt versions
pub const OTTO: u32 = tag!(b"OTTO");
pub const TRUE: u32 = tag!(b"true");

// Scripts
pub const ARAB: u32 = tag!(b"arab");
pub const BNG2: u32 = tag!(b"bng2");
pub const CHAM: u32 = tag!(b"cham");
pub const DEV2: u32 = tag!(b"dev2");
pub const DEVA: u32 = tag!(b"deva");
pub const DFLT: u32 = tag!(b"DFLT");
pub const GJR2: u32 = tag!(b"gjr2");
pub const GUR2: u32 = tag!(b"gur2");
pub const KANA: u32 = tag!(b"kana");
pub const KND2: u32 = tag!(b"knd2");
pub const LAO: u32 = tag!(b"lao ");
pub const LATN: u32 = tag!(b"latn");
pub const MLM2: u32 = tag!(b"mlm2");
pub const MYM2: u32 = tag!(b"mym2");
pub const NKO: u32 = tag!(b"nko ");
pub const ORY2: u32 = tag!(b"ory2");
pub const TEL2: u32 = tag!(b"tel2");
pub const TML2: u32 = tag!(b"tml2");
pub const THAI: u32 = tag!(b"thai");


pub const FIN2: u32 = tag!(b"fin2");
pub const FIN3: u32 = tag!(b"fin3");
pub const FINA: u32 = tag!(b"fina");
pub const INIT: u32 = tag!(b"init");
pub const ISOL: u32 = tag!(b"isol");
pub const MARK: u32 = tag!(b"mark");
pub const MED2: u32 = tag!(b"med2");
pub const MEDI: u32 = tag!(b"medi");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_tags_with_padding() {
        assert_eq!(from_string("arab"), Ok(ARAB));
        assert_eq!(from_string("lao"), Ok(LAO));
        assert_eq!(from_string("nko"), Ok(NKO));
    }

    #[test]
    fn rejects_bad_tags() {
        assert_eq!(from_string(""), Err(ParseError::BadValue));
        assert_eq!(from_string("toolong"), Err(ParseError::BadValue));
        assert_eq!(from_string("a\tb"), Err(ParseError::BadValue));
        assert_eq!(from_string("\u{e9}"), Err(ParseError::BadValue));
    }

    #[test]
    fn displays_printable_tags_as_text() {
        assert_eq!(DisplayTag(GSUB).to_string(), "GSUB");
        assert_eq!(DisplayTag(OS_2).to_string(), "OS/2");
        assert_eq!(format!("{:?}", DisplayTag(CFF)), "\"CFF \"");
        assert_eq!(DisplayTag(0x12345678).to_string(), "0x12345678");
    }
}
