//! OpenType font table parsing.

pub mod cmap;
pub mod glyf;
pub mod kern;
pub mod kerx;
pub mod morx;
pub mod os2;
pub mod variable_fonts;

use crate::binary::read::{CheckIndex, ReadArray, ReadBinary, ReadBinaryDep, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::{I16Be, I32Be, U16Be, U32Be};
use crate::error::ParseError;
use crate::tag;

use std::borrow::Cow;
use std::convert::TryFrom;

/// Magic value identifying a CFF font (`OTTO`)
pub const CFF_MAGIC: u32 = tag::OTTO;

/// Magic number identifying TrueType 1.0
///
/// The version number 1.0 as a 16.16 fixed-point value, indicating TrueType glyph data.
pub const TTF_MAGIC: u32 = 0x00010000;

/// Apple's TrueType magic (`true`)
pub const TRUE_MAGIC: u32 = tag::TRUE;

/// 32-bit signed fixed-point number (16.16)
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Fixed(i32);

/// The F2DOT14 format consists of a signed, 2’s complement integer and an unsigned fraction.
///
/// To compute the actual value, take the integer and add the fraction.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct F2Dot14(i16);

pub trait FontTableProvider {
    /// Return data for the specified table if present
    fn table_data<'a>(&'a self, tag: u32) -> Result<Option<Cow<'a, [u8]>>, ParseError>;

    fn has_table<'a>(&'a self, tag: u32) -> bool;

    fn read_table_data<'a>(&'a self, tag: u32) -> Result<Cow<'a, [u8]>, ParseError> {
        self.table_data(tag)?.ok_or(ParseError::MissingTable(tag))
    }
}

/// The size of the offsets in the `loca` table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/loca>
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexToLocFormat {
    /// Offsets are 16-bit. The actual local offset divided by 2 is stored.
    Short,
    /// Offsets are 32-bit. The actual local offset is stored.
    Long,
}

/// OpenType Offset Table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/otff#organization-of-an-opentype-font>
#[derive(Clone)]
pub struct OffsetTable<'a> {
    pub sfnt_version: u32,
    pub table_records: ReadArray<'a, TableRecord>,
}

/// A font table provider over the tables of a single sfnt font.
#[derive(Clone)]
pub struct OffsetTableFontProvider<'a> {
    scope: ReadScope<'a>,
    offset_table: OffsetTable<'a>,
}

/// An entry in the Offset Table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/otff#organization-of-an-opentype-font>
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Hash)]
pub struct TableRecord {
    pub table_tag: u32,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

/// `head` table
///
/// Only the fields shaping and metrics need are kept.
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/head>
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeadTable {
    pub units_per_em: u16,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
    pub index_to_loc_format: IndexToLocFormat,
}

/// `hhea` horizontal header table
///
/// This struct is also used for the `vhea` table.
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/hhea>
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HheaTable {
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    pub advance_width_max: u16,
    pub caret_slope_rise: i16,
    pub caret_slope_run: i16,
    pub caret_offset: i16,
    pub num_h_metrics: u16,
}

/// `hmtx` horizontal metrics table
///
/// This struct is also used for `vmtx` table.
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/hmtx>
#[derive(Debug, Clone)]
pub struct HmtxTable<'a> {
    pub h_metrics: ReadArray<'a, LongHorMetric>,
    pub left_side_bearings: ReadArray<'a, I16Be>,
}

/// A `longHorMetric` record in the `hmtx` table.
///
/// This struct is also used for LongVerMetric `vmtx` table.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct LongHorMetric {
    pub advance_width: u16,
    pub lsb: i16,
}

/// maxp - Maximum profile
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/maxp>
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaxpTable {
    pub num_glyphs: u16,
}

/// The header of the `post` table.
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/post>
#[derive(Debug, Clone, PartialEq)]
pub struct PostTable {
    pub version: u32,
    pub italic_angle: Fixed,
    pub underline_position: i16,
    pub underline_thickness: i16,
    pub is_fixed_pitch: u32,
}

impl<'a> OffsetTableFontProvider<'a> {
    /// Read the table directory of the sfnt font in `data`.
    pub fn new(data: &'a [u8]) -> Result<Self, ParseError> {
        let scope = ReadScope::new(data);
        let offset_table = scope.read::<OffsetTable<'_>>()?;
        Ok(OffsetTableFontProvider {
            scope,
            offset_table,
        })
    }

    pub fn sfnt_version(&self) -> u32 {
        self.offset_table.sfnt_version
    }

    /// The data of the table tagged `tag`, borrowed from the font data.
    pub fn table_scope(&self, tag: u32) -> Result<Option<ReadScope<'a>>, ParseError> {
        self.offset_table.read_table(&self.scope, tag)
    }

    pub fn table_tags(&self) -> impl Iterator<Item = u32> + 'a {
        self.offset_table
            .table_records
            .iter()
            .map(|record| record.table_tag)
    }
}

impl<'b> ReadBinary for OffsetTable<'b> {
    type HostType<'a> = OffsetTable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let sfnt_version = ctxt.read_u32be()?;
        match sfnt_version {
            TTF_MAGIC | CFF_MAGIC | TRUE_MAGIC => {
                let num_tables = ctxt.read_u16be()?;
                let _search_range = ctxt.read_u16be()?;
                let _entry_selector = ctxt.read_u16be()?;
                let _range_shift = ctxt.read_u16be()?;
                let table_records = ctxt.read_array::<TableRecord>(usize::from(num_tables))?;
                Ok(OffsetTable {
                    sfnt_version,
                    table_records,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl<'a> FontTableProvider for OffsetTableFontProvider<'a> {
    fn table_data<'b>(&'b self, tag: u32) -> Result<Option<Cow<'b, [u8]>>, ParseError> {
        self.offset_table
            .read_table(&self.scope, tag)
            .map(|scope| scope.map(|scope| Cow::Borrowed(scope.data())))
    }

    fn has_table<'b>(&'b self, tag: u32) -> bool {
        self.offset_table.find_table_record(tag).is_some()
    }
}

impl ReadFrom for TableRecord {
    type ReadType = ((U32Be, U32Be), (U32Be, U32Be));

    fn read_from(((table_tag, checksum), (offset, length)): ((u32, u32), (u32, u32))) -> Self {
        TableRecord {
            table_tag,
            checksum,
            offset,
            length,
        }
    }
}

impl<'a> OffsetTable<'a> {
    pub fn find_table_record(&self, tag: u32) -> Option<TableRecord> {
        self.table_records
            .iter()
            .find(|table_record| table_record.table_tag == tag)
    }

    pub fn read_table(
        &self,
        scope: &ReadScope<'a>,
        tag: u32,
    ) -> Result<Option<ReadScope<'a>>, ParseError> {
        match self.find_table_record(tag) {
            Some(table_record) => table_record.read_table(scope).map(Some),
            None => Ok(None),
        }
    }
}

impl TableRecord {
    pub const SIZE: usize = 4 * 4;

    pub fn read_table<'a>(&self, scope: &ReadScope<'a>) -> Result<ReadScope<'a>, ParseError> {
        let offset = usize::try_from(self.offset)?;
        let length = usize::try_from(self.length)?;
        scope.offset_length(offset, length)
    }
}

impl ReadBinary for HeadTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let major_version = ctxt.read_u16be()?;
        let _minor_version = ctxt.read_u16be()?;
        ctxt.check_version(major_version == 1)?;
        let _font_revision = ctxt.read::<Fixed>()?;
        let _check_sum_adjustment = ctxt.read_u32be()?;
        let magic_number = ctxt.read_u32be()?;
        ctxt.check(magic_number == 0x5F0F3CF5)?;
        let _flags = ctxt.read_u16be()?;
        let units_per_em = ctxt.read_u16be()?;
        // created, modified
        ctxt.skip(2 * 8)?;
        let x_min = ctxt.read_i16be()?;
        let y_min = ctxt.read_i16be()?;
        let x_max = ctxt.read_i16be()?;
        let y_max = ctxt.read_i16be()?;
        let _mac_style = ctxt.read_u16be()?;
        let _lowest_rec_ppem = ctxt.read_u16be()?;
        let _font_direction_hint = ctxt.read_i16be()?;
        let index_to_loc_format = ctxt.read::<IndexToLocFormat>()?;
        let _glyph_data_format = ctxt.read_i16be()?;

        Ok(HeadTable {
            units_per_em,
            x_min,
            y_min,
            x_max,
            y_max,
            index_to_loc_format,
        })
    }
}

impl ReadBinary for IndexToLocFormat {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        match ctxt.read_i16be()? {
            0 => Ok(IndexToLocFormat::Short),
            1 => Ok(IndexToLocFormat::Long),
            _ => Err(ParseError::BadValue),
        }
    }
}

impl ReadBinary for HheaTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let major_version = ctxt.read_u16be()?;
        let _minor_version = ctxt.read_u16be()?;
        ctxt.check_version(major_version == 1)?;
        let ascender = ctxt.read_i16be()?;
        let descender = ctxt.read_i16be()?;
        let line_gap = ctxt.read_i16be()?;
        let advance_width_max = ctxt.read_u16be()?;
        let _min_left_side_bearing = ctxt.read_i16be()?;
        let _min_right_side_bearing = ctxt.read_i16be()?;
        let _x_max_extent = ctxt.read_i16be()?;
        let caret_slope_rise = ctxt.read_i16be()?;
        let caret_slope_run = ctxt.read_i16be()?;
        let caret_offset = ctxt.read_i16be()?;
        // reserved
        ctxt.skip(4 * 2)?;
        let metric_data_format = ctxt.read_i16be()?;
        ctxt.check(metric_data_format == 0)?;
        let num_h_metrics = ctxt.read_u16be()?;

        Ok(HheaTable {
            ascender,
            descender,
            line_gap,
            advance_width_max,
            caret_slope_rise,
            caret_slope_run,
            caret_offset,
            num_h_metrics,
        })
    }
}

impl<'b> ReadBinaryDep for HmtxTable<'b> {
    type Args<'a> = (usize, usize); // num_glyphs, num_h_metrics
    type HostType<'a> = HmtxTable<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (num_glyphs, num_h_metrics): (usize, usize),
    ) -> Result<Self::HostType<'a>, ParseError> {
        let h_metrics = ctxt.read_array::<LongHorMetric>(num_h_metrics)?;
        // Some fonts truncate the side bearings, which shaping never reads.
        let left_side_bearings =
            ctxt.read_array_upto_hack::<I16Be>(num_glyphs.saturating_sub(num_h_metrics))?;
        Ok(HmtxTable {
            h_metrics,
            left_side_bearings,
        })
    }
}

impl<'a> HmtxTable<'a> {
    /// The advance of `glyph_id`.
    ///
    /// The number of records can be less than the number of glyphs, in which case the advance of
    /// the last record applies to all remaining glyph ids.
    pub fn advance(&self, glyph_id: u16) -> Result<u16, ParseError> {
        self.metric(glyph_id).map(|metric| metric.advance_width)
    }

    /// The side bearing of `glyph_id`: the left side bearing for `hmtx`, the top for `vmtx`.
    pub fn side_bearing(&self, glyph_id: u16) -> Result<i16, ParseError> {
        let index = usize::from(glyph_id);
        if index < self.h_metrics.len() {
            self.metric(glyph_id).map(|metric| metric.lsb)
        } else {
            let index = index - self.h_metrics.len();
            self.left_side_bearings
                .check_index(index)
                .and_then(|_| self.left_side_bearings.read_item(index))
        }
    }

    fn metric(&self, glyph_id: u16) -> Result<LongHorMetric, ParseError> {
        let index = usize::from(glyph_id).min(
            self.h_metrics
                .len()
                .checked_sub(1)
                .ok_or(ParseError::BadIndex)?,
        );
        self.h_metrics.read_item(index)
    }
}

impl ReadFrom for LongHorMetric {
    type ReadType = (U16Be, I16Be);

    fn read_from((advance_width, lsb): (u16, i16)) -> Self {
        LongHorMetric { advance_width, lsb }
    }
}

impl ReadBinary for MaxpTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let version = ctxt.read_u32be()?;
        ctxt.check_version(version == 0x00010000 || version == 0x00005000)?;
        let num_glyphs = ctxt.read_u16be()?;
        Ok(MaxpTable { num_glyphs })
    }
}

impl ReadBinary for PostTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let version = ctxt.read_u32be()?;
        let italic_angle = ctxt.read::<Fixed>()?;
        let underline_position = ctxt.read_i16be()?;
        let underline_thickness = ctxt.read_i16be()?;
        let is_fixed_pitch = ctxt.read_u32be()?;
        Ok(PostTable {
            version,
            italic_angle,
            underline_position,
            underline_thickness,
            is_fixed_pitch,
        })
    }
}

impl ReadFrom for Fixed {
    type ReadType = I32Be;

    fn read_from(value: i32) -> Self {
        Fixed(value)
    }
}

impl ReadFrom for F2Dot14 {
    type ReadType = I16Be;

    fn read_from(value: i16) -> Self {
        F2Dot14(value)
    }
}

impl Fixed {
    pub fn from_raw(value: i32) -> Fixed {
        Fixed(value)
    }

    pub fn raw_value(self) -> i32 {
        self.0
    }
}

impl From<i32> for Fixed {
    fn from(value: i32) -> Fixed {
        Fixed(value << 16)
    }
}

impl From<F2Dot14> for Fixed {
    fn from(value: F2Dot14) -> Fixed {
        Fixed(i32::from(value.0) << 2)
    }
}

impl std::ops::Add for Fixed {
    type Output = Fixed;

    fn add(self, other: Fixed) -> Fixed {
        Fixed(self.0.wrapping_add(other.0))
    }
}

impl std::ops::Sub for Fixed {
    type Output = Fixed;

    fn sub(self, other: Fixed) -> Fixed {
        Fixed(self.0.wrapping_sub(other.0))
    }
}

impl std::ops::Mul for Fixed {
    type Output = Fixed;

    fn mul(self, other: Fixed) -> Fixed {
        let product = i64::from(self.0) * i64::from(other.0);
        Fixed(((product + 0x8000) >> 16) as i32)
    }
}

impl std::ops::Div for Fixed {
    type Output = Fixed;

    /// Division by zero yields zero.
    fn div(self, other: Fixed) -> Fixed {
        if other.0 == 0 {
            return Fixed(0);
        }
        Fixed(((i64::from(self.0) << 16) / i64::from(other.0)) as i32)
    }
}

impl std::ops::Neg for Fixed {
    type Output = Fixed;

    fn neg(self) -> Fixed {
        Fixed(self.0.wrapping_neg())
    }
}

impl From<Fixed> for f32 {
    fn from(value: Fixed) -> f32 {
        crate::binary::fixed_to_f32(value.0)
    }
}

impl From<f32> for Fixed {
    fn from(value: f32) -> Fixed {
        Fixed((value * 65536.0).round() as i32)
    }
}

impl F2Dot14 {
    pub fn new(value: i16) -> F2Dot14 {
        F2Dot14(value)
    }

    pub fn raw_value(self) -> i16 {
        self.0
    }
}

impl From<F2Dot14> for f32 {
    fn from(value: F2Dot14) -> f32 {
        crate::binary::f2dot14_to_f32(value.0)
    }
}

impl From<f32> for F2Dot14 {
    fn from(value: f32) -> F2Dot14 {
        F2Dot14((value.clamp(-2.0, 1.999_939) * 16384.0).round() as i16)
    }
}

impl From<Fixed> for F2Dot14 {
    /// Round a 16.16 value to 2.14, the way normalized axis coordinates are stored.
    fn from(value: Fixed) -> F2Dot14 {
        let raw = (value.0 + 2) >> 2;
        F2Dot14(raw.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Assemble an sfnt font from `(tag, data)` pairs.
    pub(crate) fn build_font(sfnt_version: u32, tables: &[(u32, &[u8])]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&sfnt_version.to_be_bytes());
        data.extend_from_slice(&(tables.len() as u16).to_be_bytes());
        data.extend_from_slice(&[0; 6]);
        let mut offset = 12 + tables.len() * TableRecord::SIZE;
        for (tag, table) in tables {
            data.extend_from_slice(&tag.to_be_bytes());
            data.extend_from_slice(&0u32.to_be_bytes());
            data.extend_from_slice(&(offset as u32).to_be_bytes());
            data.extend_from_slice(&(table.len() as u32).to_be_bytes());
            offset += crate::binary::long_align(table.len());
        }
        for (_, table) in tables {
            data.extend_from_slice(table);
            data.resize(crate::binary::long_align(data.len()), 0);
        }
        data
    }

    pub(crate) fn head_table(units_per_em: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 1, 0, 0]);
        data.extend_from_slice(&[0, 1, 0, 0]);
        data.extend_from_slice(&[0; 4]);
        data.extend_from_slice(&0x5F0F3CF5u32.to_be_bytes());
        data.extend_from_slice(&[0; 2]);
        data.extend_from_slice(&units_per_em.to_be_bytes());
        data.extend_from_slice(&[0; 16]);
        for v in [-100i16, -250, 1100, 900] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        data.extend_from_slice(&[0; 6]);
        data.extend_from_slice(&1i16.to_be_bytes());
        data.extend_from_slice(&[0; 2]);
        data
    }

    pub(crate) fn hhea_table(ascender: i16, descender: i16, num_h_metrics: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 1, 0, 0]);
        for v in [ascender, descender, 90] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        data.extend_from_slice(&[0; 24]);
        data.extend_from_slice(&num_h_metrics.to_be_bytes());
        data
    }

    #[test]
    fn read_table_directory() {
        let head = head_table(1000);
        let maxp = [0, 0, 0x50, 0, 0, 7];
        let font = build_font(TTF_MAGIC, &[(tag::HEAD, &head), (tag::MAXP, &maxp)]);
        let provider = OffsetTableFontProvider::new(&font).unwrap();
        assert!(provider.has_table(tag::HEAD));
        assert!(!provider.has_table(tag::GSUB));
        let head = ReadScope::new(&provider.read_table_data(tag::HEAD).unwrap())
            .read::<HeadTable>()
            .unwrap();
        assert_eq!(head.units_per_em, 1000);
        assert_eq!(head.index_to_loc_format, IndexToLocFormat::Long);
        assert_eq!((head.x_min, head.y_max), (-100, 900));
        let maxp = ReadScope::new(&provider.read_table_data(tag::MAXP).unwrap())
            .read::<MaxpTable>()
            .unwrap();
        assert_eq!(maxp.num_glyphs, 7);
        assert_eq!(
            provider.read_table_data(tag::GSUB),
            Err(ParseError::MissingTable(tag::GSUB))
        );
    }

    #[test]
    fn bad_sfnt_version() {
        let font = build_font(0x12345678, &[]);
        assert!(OffsetTableFontProvider::new(&font).is_err());
        assert!(OffsetTableFontProvider::new(&[0, 1, 0]).is_err());
    }

    #[test]
    fn hmtx_repeats_last_advance() {
        let data = [0x01, 0xF4, 0, 10, 0x02, 0x58, 0, 20, 0, 30];
        let hmtx = ReadScope::new(&data)
            .read_dep::<HmtxTable<'_>>((3, 2))
            .unwrap();
        assert_eq!(hmtx.advance(0).unwrap(), 500);
        assert_eq!(hmtx.advance(2).unwrap(), 600);
        assert_eq!(hmtx.advance(100).unwrap(), 600);
        assert_eq!(hmtx.side_bearing(1).unwrap(), 20);
        assert_eq!(hmtx.side_bearing(2).unwrap(), 30);
    }

    #[test]
    fn fixed_to_f2dot14() {
        assert_eq!(F2Dot14::from(Fixed::from(0.5)).raw_value(), 0x2000);
        assert_eq!(F2Dot14::from(Fixed::from(-1.0)).raw_value(), -0x4000);
        assert_eq!(f32::from(F2Dot14::new(0x4000)), 1.0);
    }

    #[test]
    fn fixed_arithmetic() {
        let half = Fixed::from(0.5);
        assert_eq!(half * Fixed::from(3), Fixed::from(1.5));
        assert_eq!(Fixed::from(1) / Fixed::from(4), Fixed::from(0.25));
        assert_eq!(-half + Fixed::from(2), Fixed::from(1.5));
        assert_eq!(Fixed::from(1) / Fixed::from(0), Fixed::from(0));
    }
}
