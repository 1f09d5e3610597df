//! Variation settings for variable fonts.

use std::str::FromStr;

use crate::error::ParseError;
use crate::tables::variable_fonts::fvar::FvarTable;
use crate::tables::Fixed;
use crate::tag;

/// A requested position on one variation axis, in design units.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Variation {
    pub tag: u32,
    pub value: f32,
}

impl FromStr for Variation {
    type Err = ParseError;

    /// Parse a setting of the form `wght=700`. The `=` is optional and the tag may be quoted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| c == '=' || c.is_ascii_whitespace())
            .ok_or(ParseError::BadValue)?;
        let (tag, value) = s.split_at(split);
        let tag = parse_quoted_tag(tag)?;
        let value = value
            .trim_start()
            .trim_start_matches('=')
            .trim()
            .parse::<f32>()
            .map_err(|_| ParseError::BadValue)?;
        Ok(Variation { tag, value })
    }
}

/// Parse a tag that may be wrapped in matching single or double quotes.
///
/// Quoted tags must be exactly four characters long.
pub(crate) fn parse_quoted_tag(s: &str) -> Result<u32, ParseError> {
    let s = s.trim();
    for quote in ['\'', '"'] {
        if let Some(rest) = s.strip_prefix(quote) {
            let inner = rest.strip_suffix(quote).ok_or(ParseError::BadValue)?;
            if inner.len() != 4 {
                return Err(ParseError::BadValue);
            }
            return tag::from_string(inner);
        }
    }
    if !s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(ParseError::BadValue);
    }
    tag::from_string(s)
}

/// Resolve variation settings against the axes of `fvar`, giving one design coordinate per
/// axis.
///
/// Axes without a setting keep their default. When a tag is given more than once the last
/// setting wins.
pub fn design_coords(fvar: &FvarTable<'_>, variations: &[Variation]) -> Vec<Fixed> {
    fvar.axes()
        .map(|axis| {
            variations
                .iter()
                .rev()
                .find(|variation| variation.tag == axis.axis_tag)
                .map(|variation| Fixed::from(variation.value))
                .unwrap_or(axis.default_value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::tables::variable_fonts::fvar::tests::fvar_table;
    use crate::tag;

    #[test]
    fn parse_variation() {
        assert_eq!(
            "wght=700".parse::<Variation>(),
            Ok(Variation {
                tag: tag!(b"wght"),
                value: 700.0
            })
        );
        assert_eq!(
            " 'wdth' 87.5 ".parse::<Variation>(),
            Ok(Variation {
                tag: tag!(b"wdth"),
                value: 87.5
            })
        );
        assert_eq!("'wd' 1".parse::<Variation>(), Err(ParseError::BadValue));
        assert_eq!("wght".parse::<Variation>(), Err(ParseError::BadValue));
        assert_eq!("wght=bold".parse::<Variation>(), Err(ParseError::BadValue));
    }

    #[test]
    fn last_setting_wins() {
        let data = fvar_table();
        let fvar = ReadScope::new(&data).read::<FvarTable<'_>>().unwrap();
        assert_eq!(design_coords(&fvar, &[]), vec![Fixed::from(400)]);
        let variations = [
            Variation {
                tag: tag!(b"wght"),
                value: 300.0,
            },
            Variation {
                tag: tag!(b"wght"),
                value: 650.0,
            },
            Variation {
                tag: tag!(b"ital"),
                value: 1.0,
            },
        ];
        assert_eq!(design_coords(&fvar, &variations), vec![Fixed::from(650)]);
    }
}
