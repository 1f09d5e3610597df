//! The metrics carried by the `OS/2` table.

use crate::binary::read::{ReadBinary, ReadCtxt};
use crate::error::ParseError;

/// Bit 7 of `fsSelection`: use the typo metrics for line spacing.
pub const USE_TYPO_METRICS: u16 = 1 << 7;

/// `OS/2` table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/os2>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Os2 {
    pub version: u16,
    pub us_weight_class: u16,
    pub y_strikeout_size: i16,
    pub y_strikeout_position: i16,
    pub fs_selection: u16,
    // Some legacy TrueType fonts were built with a shortened version 0 table that stops at
    // usLastCharIndex.
    pub typo: Option<TypoMetrics>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TypoMetrics {
    pub s_typo_ascender: i16,
    pub s_typo_descender: i16,
    pub s_typo_line_gap: i16,
    pub us_win_ascent: u16,
    pub us_win_descent: u16,
}

impl ReadBinary for Os2 {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let version = ctxt.read_u16be()?;
        let _x_avg_char_width = ctxt.read_i16be()?;
        let us_weight_class = ctxt.read_u16be()?;
        let _us_width_class = ctxt.read_u16be()?;
        let _fs_type = ctxt.read_u16be()?;
        // subscript and superscript sizes and offsets
        ctxt.skip(8 * 2)?;
        let y_strikeout_size = ctxt.read_i16be()?;
        let y_strikeout_position = ctxt.read_i16be()?;
        let _s_family_class = ctxt.read_i16be()?;
        // panose, unicode ranges, vendor id
        ctxt.skip(10 + 4 * 4 + 4)?;
        let fs_selection = ctxt.read_u16be()?;
        let _us_first_char_index = ctxt.read_u16be()?;
        let _us_last_char_index = ctxt.read_u16be()?;

        let typo = if ctxt.remaining() >= 10 {
            Some(TypoMetrics {
                s_typo_ascender: ctxt.read_i16be()?,
                s_typo_descender: ctxt.read_i16be()?,
                s_typo_line_gap: ctxt.read_i16be()?,
                us_win_ascent: ctxt.read_u16be()?,
                us_win_descent: ctxt.read_u16be()?,
            })
        } else {
            None
        };

        Ok(Os2 {
            version,
            us_weight_class,
            y_strikeout_size,
            y_strikeout_position,
            fs_selection,
            typo,
        })
    }
}

impl Os2 {
    /// The typo metrics, if the font asks for them to be used for line spacing.
    pub fn preferred_typo_metrics(&self) -> Option<TypoMetrics> {
        if self.fs_selection & USE_TYPO_METRICS != 0 {
            self.typo
        } else {
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::binary::read::ReadScope;

    pub(crate) fn os2_table(fs_selection: u16) -> Vec<u8> {
        let mut data = vec![0, 4, 0, 0, 0x01, 0x90];
        data.resize(26, 0);
        data.extend_from_slice(&50i16.to_be_bytes());
        data.extend_from_slice(&300i16.to_be_bytes());
        data.resize(62, 0);
        data.extend_from_slice(&fs_selection.to_be_bytes());
        data.extend_from_slice(&[0; 4]);
        for v in [850i16, -150, 100] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        data.extend_from_slice(&[0x03, 0xE8, 0x00, 0xC8]);
        data
    }

    #[test]
    fn read_typo_metrics() {
        let os2 = ReadScope::new(&os2_table(USE_TYPO_METRICS))
            .read::<Os2>()
            .unwrap();
        assert_eq!(os2.us_weight_class, 400);
        assert_eq!(os2.y_strikeout_position, 300);
        let typo = os2.preferred_typo_metrics().unwrap();
        assert_eq!(typo.s_typo_ascender, 850);
        assert_eq!(typo.us_win_descent, 200);
    }

    #[test]
    fn short_version0_table() {
        let mut data = os2_table(USE_TYPO_METRICS);
        data.truncate(68);
        let os2 = ReadScope::new(&data).read::<Os2>().unwrap();
        assert_eq!(os2.typo, None);
        assert_eq!(os2.preferred_typo_metrics(), None);
    }
}
