//! Reading of the Compact Font Format (CFF) container.
//!
//! Only what is needed to run Type2 charstrings is decoded: the INDEX structures, the Top
//! and Private DICTs (interpreted with the charstring machine in DICT context) and, for
//! CID-keyed fonts, the Font DICT array and FDSelect.
//!
//! <https://adobe-type-tools.github.io/font-tech-notes/pdfs/5176.CFF.pdf>

use std::iter;

use itertools::Itertools;
use log::warn;

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadScope};
use crate::binary::{U16Be, U8};
use crate::error::ParseError;
use crate::postscript::bounds::{type2_glyph_metrics, GlyphMetrics};
use crate::postscript::{
    CharStringError, Context, Machine, Operator, OperatorHandler, StackEffect,
};

mod standard;

pub use standard::{STANDARD_ENCODING, STANDARD_STRINGS};

/// Top level representation of a CFF table. Only the first font of a FontSet is used.
pub struct CFF<'a> {
    pub header: Header,
    pub name_index: Index<'a>,
    pub string_index: Index<'a>,
    pub global_subrs: Vec<&'a [u8]>,
    pub font: Font<'a>,
}

pub struct Header {
    pub major: u8,
    pub minor: u8,
    pub hdr_size: u8,
    pub off_size: u8,
}

/// A CFF INDEX: an array of variable length objects.
#[derive(Clone, Copy)]
pub struct Index<'a> {
    pub count: usize,
    off_size: u8,
    offset_array: &'a [u8],
    data_array: &'a [u8],
}

pub struct Font<'a> {
    pub top_dict: Dict,
    pub char_strings: Index<'a>,
    pub variant: FontVariant<'a>,
}

pub enum FontVariant<'a> {
    Type1(PrivateData<'a>),
    CID(CIDData<'a>),
}

pub struct CIDData<'a> {
    fd_select: FDSelect<'a>,
    font_dicts: Vec<PrivateData<'a>>,
}

/// The parts of a Private DICT needed to run charstrings.
#[derive(Default)]
pub struct PrivateData<'a> {
    pub default_width: i32,
    pub nominal_width: i32,
    pub local_subrs: Vec<&'a [u8]>,
}

/// Font DICT select as described in Section 19 of Technical Note #5176
pub enum FDSelect<'a> {
    Format0 {
        glyph_font_dict_indices: ReadArray<'a, U8>,
    },
    // Formats 1 and 2 are not defined
    Format3 {
        ranges: ReadArray<'a, (U16Be, U8)>,
        sentinel: u16,
    },
}

/// Decoded DICT: every operator with the operands that preceded it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Dict {
    entries: Vec<(Operator, Vec<i32>)>,
}

pub mod op {
    use crate::postscript::Operator;

    const fn op1(code: u8) -> Operator {
        Operator {
            code,
            escaped: false,
        }
    }

    const fn op2(code: u8) -> Operator {
        Operator {
            code,
            escaped: true,
        }
    }

    pub const CHAR_STRINGS: Operator = op1(17);
    pub const PRIVATE: Operator = op1(18);
    pub const SUBRS: Operator = op1(19);
    pub const DEFAULT_WIDTH_X: Operator = op1(20);
    pub const NOMINAL_WIDTH_X: Operator = op1(21);
    pub const CHARSTRING_TYPE: Operator = op2(6);
    pub const ROS: Operator = op2(30);
    pub const FD_ARRAY: Operator = op2(36);
    pub const FD_SELECT: Operator = op2(37);
}

struct DictReader {
    context: Context,
    dict: Dict,
}

impl OperatorHandler for DictReader {
    fn context(&self) -> Context {
        self.context
    }

    fn apply(
        &mut self,
        op: Operator,
        machine: &mut Machine<'_>,
    ) -> Result<StackEffect, CharStringError> {
        // reserved
        if !op.escaped && (op.code == 31 || op.code == 255) {
            return Err(CharStringError::InvalidOperator);
        }
        self.dict.entries.push((op, machine.args.all().to_vec()));
        Ok(StackEffect::Clear)
    }
}

impl Dict {
    pub fn read(data: &[u8], context: Context) -> Result<Dict, ParseError> {
        let mut reader = DictReader {
            context,
            dict: Dict::default(),
        };
        Machine::new(&[], &[]).run(data, &mut reader)?;
        Ok(reader.dict)
    }

    pub fn get(&self, op: Operator) -> Option<&[i32]> {
        self.entries
            .iter()
            .find(|(key, _)| *key == op)
            .map(|(_, operands)| operands.as_slice())
    }

    pub fn get_i32(&self, op: Operator) -> Option<i32> {
        self.get(op).and_then(|operands| operands.first().copied())
    }

    pub fn first_operator(&self) -> Option<Operator> {
        self.entries.first().map(|(op, _)| *op)
    }

    fn get_offset(&self, op: Operator) -> Result<Option<usize>, ParseError> {
        self.get_i32(op)
            .map(|offset| usize::try_from(offset).map_err(ParseError::from))
            .transpose()
    }

    /// The (size, offset) operands of the Private operator.
    fn private_range(&self) -> Result<Option<(usize, usize)>, ParseError> {
        match self.get(op::PRIVATE) {
            Some([size, offset]) => Ok(Some((usize::try_from(*size)?, usize::try_from(*offset)?))),
            Some(_) => Err(ParseError::BadValue),
            None => Ok(None),
        }
    }
}

impl<'b> ReadBinary for CFF<'b> {
    type HostType<'a> = CFF<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        // Offsets are relative to the start of the CFF data
        let scope = ctxt.scope();

        let header = ctxt.read::<Header>()?;
        let name_index = ctxt.read::<Index<'_>>()?;
        let top_dict_index = ctxt.read::<Index<'_>>()?;
        let string_index = ctxt.read::<Index<'_>>()?;
        let global_subrs = ctxt.read::<Index<'_>>()?.to_vec();

        if name_index.count == 0 {
            return Err(ParseError::MissingValue);
        }
        if name_index.count > 1 {
            warn!("CFF FontSet with {} fonts, using the first", name_index.count);
        }

        let top_dict_data = top_dict_index.get(0).ok_or(ParseError::BadIndex)?;
        let top_dict = Dict::read(top_dict_data, Context::TopDict)?;

        if top_dict.get_i32(op::CHARSTRING_TYPE).unwrap_or(2) != 2 {
            return Err(ParseError::NotImplemented);
        }

        let char_strings_offset = top_dict
            .get_offset(op::CHAR_STRINGS)?
            .ok_or(ParseError::MissingValue)?;
        let char_strings = scope.offset(char_strings_offset).read::<Index<'_>>()?;

        // The Top DICT of a CIDFont begins with the ROS operator
        let variant = if top_dict.first_operator() == Some(op::ROS) {
            FontVariant::CID(read_cid_data(&scope, &top_dict, char_strings.count)?)
        } else {
            FontVariant::Type1(read_private_data(&scope, &top_dict)?)
        };

        Ok(CFF {
            header,
            name_index,
            string_index,
            global_subrs,
            font: Font {
                top_dict,
                char_strings,
                variant,
            },
        })
    }
}

impl ReadBinary for Header {
    type HostType<'b> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        // Newer minor versions are compatible, newer major versions are not
        let major = ctxt.read_u8()?;
        ctxt.check_version(major == 1)?;
        let minor = ctxt.read_u8()?;
        let hdr_size = ctxt.read_u8()?;
        let off_size = ctxt.read_u8()?;

        if hdr_size < 4 || !(1..=4).contains(&off_size) {
            return Err(ParseError::BadValue);
        }

        let _unknown = ctxt.read_slice(usize::from(hdr_size - 4))?;

        Ok(Header {
            major,
            minor,
            hdr_size,
            off_size,
        })
    }
}

impl<'b> ReadBinary for Index<'b> {
    type HostType<'a> = Index<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let count = usize::from(ctxt.read_u16be()?);

        if count == 0 {
            return Ok(Index {
                count,
                off_size: 1,
                offset_array: &[],
                data_array: &[],
            });
        }

        let off_size = ctxt.read_u8()?;
        if !(1..=4).contains(&off_size) {
            return Err(ParseError::BadValue);
        }

        let offset_array = ctxt.read_slice((count + 1) * usize::from(off_size))?;
        // offsets are 1 based
        let last_offset = lookup_offset(off_size, offset_array, count)?;
        if last_offset < 1 {
            return Err(ParseError::BadValue);
        }
        let data_array = ctxt.read_slice(last_offset - 1)?;

        Ok(Index {
            count,
            off_size,
            offset_array,
            data_array,
        })
    }
}

fn lookup_offset(off_size: u8, offset_array: &[u8], index: usize) -> Result<usize, ParseError> {
    let mut ctxt = ReadScope::new(offset_array)
        .offset(index * usize::from(off_size))
        .ctxt();
    Ok(ctxt.read_uint_sized(off_size)? as usize)
}

impl<'a> Index<'a> {
    pub fn get(&self, index: usize) -> Option<&'a [u8]> {
        if index >= self.count {
            return None;
        }
        let start = lookup_offset(self.off_size, self.offset_array, index).ok()?;
        let end = lookup_offset(self.off_size, self.offset_array, index + 1).ok()?;
        self.data_array.get(start.checked_sub(1)?..end.checked_sub(1)?)
    }

    /// All objects of the INDEX. Malformed entries are empty.
    pub fn to_vec(&self) -> Vec<&'a [u8]> {
        (0..self.count)
            .map(|i| self.get(i).unwrap_or(&[]))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The object at `index` interpreted as a string.
    pub fn get_str(&self, index: usize) -> Result<&'a str, ParseError> {
        let bytes = self.get(index).ok_or(ParseError::BadIndex)?;
        std::str::from_utf8(bytes).map_err(|_utf8_err| ParseError::BadValue)
    }
}

fn read_private_data<'a>(
    scope: &ReadScope<'a>,
    dict: &Dict,
) -> Result<PrivateData<'a>, ParseError> {
    let (size, offset) = match dict.private_range()? {
        Some(range) => range,
        None => return Ok(PrivateData::default()),
    };
    let private_scope = scope.offset_length(offset, size)?;
    let private_dict = Dict::read(private_scope.data(), Context::PrivateDict)?;

    // The local subrs offset is relative to the beginning of the Private DICT data
    let local_subrs = match private_dict.get_offset(op::SUBRS)? {
        Some(subrs_offset) => scope
            .offset(offset + subrs_offset)
            .read::<Index<'_>>()?
            .to_vec(),
        None => Vec::new(),
    };

    Ok(PrivateData {
        default_width: private_dict.get_i32(op::DEFAULT_WIDTH_X).unwrap_or(0),
        nominal_width: private_dict.get_i32(op::NOMINAL_WIDTH_X).unwrap_or(0),
        local_subrs,
    })
}

fn read_cid_data<'a>(
    scope: &ReadScope<'a>,
    top_dict: &Dict,
    n_glyphs: usize,
) -> Result<CIDData<'a>, ParseError> {
    let fd_array_offset = top_dict
        .get_offset(op::FD_ARRAY)?
        .ok_or(ParseError::MissingValue)?;
    let fd_array = scope.offset(fd_array_offset).read::<Index<'_>>()?;
    let font_dicts = (0..fd_array.count)
        .map(|i| {
            let data = fd_array.get(i).ok_or(ParseError::BadIndex)?;
            let font_dict = Dict::read(data, Context::TopDict)?;
            read_private_data(scope, &font_dict)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let fd_select_offset = top_dict
        .get_offset(op::FD_SELECT)?
        .ok_or(ParseError::MissingValue)?;
    let fd_select = read_fd_select(&mut scope.offset(fd_select_offset).ctxt(), n_glyphs)?;

    Ok(CIDData {
        fd_select,
        font_dicts,
    })
}

fn read_fd_select<'a>(ctxt: &mut ReadCtxt<'a>, n_glyphs: usize) -> Result<FDSelect<'a>, ParseError> {
    match ctxt.read::<U8>()? {
        0 => {
            let glyph_font_dict_indices = ctxt.read_array::<U8>(n_glyphs)?;
            Ok(FDSelect::Format0 {
                glyph_font_dict_indices,
            })
        }
        3 => {
            let nranges = usize::from(ctxt.read::<U16Be>()?);
            let ranges = ctxt.read_array(nranges)?;
            let sentinel = ctxt.read::<U16Be>()?;
            Ok(FDSelect::Format3 { ranges, sentinel })
        }
        _ => Err(ParseError::BadValue),
    }
}

impl<'a> FDSelect<'a> {
    /// Returns the index of the Font DICT for the supplied `glyph_id`
    pub fn font_dict_index(&self, glyph_id: u16) -> Option<u8> {
        match self {
            FDSelect::Format0 {
                glyph_font_dict_indices,
            } => glyph_font_dict_indices.get_item(usize::from(glyph_id)),
            FDSelect::Format3 { ranges, sentinel } => ranges
                .iter()
                .map(|(first, fd_index)| (first, Some(fd_index)))
                .chain(iter::once((*sentinel, None)))
                .tuple_windows()
                .find(|((first, _), (last, _))| glyph_id >= *first && glyph_id < *last)
                .and_then(|((_, fd_index), _)| fd_index),
        }
    }
}

impl<'a> CFF<'a> {
    pub fn num_glyphs(&self) -> usize {
        self.font.char_strings.count
    }

    fn private_data(&self, glyph_id: u16) -> Option<&PrivateData<'a>> {
        match &self.font.variant {
            FontVariant::Type1(private) => Some(private),
            FontVariant::CID(cid) => {
                let index = cid.fd_select.font_dict_index(glyph_id)?;
                cid.font_dicts.get(usize::from(index))
            }
        }
    }

    /// Advance and control bounds of `glyph_id`, found by running its charstring.
    pub fn glyph_metrics(&self, glyph_id: u16) -> Result<GlyphMetrics, CharStringError> {
        let charstring = self
            .font
            .char_strings
            .get(usize::from(glyph_id))
            .ok_or(CharStringError::InvalidSubroutineIndex)?;
        let private = self
            .private_data(glyph_id)
            .ok_or(CharStringError::InvalidOperand)?;
        type2_glyph_metrics(
            charstring,
            &private.local_subrs,
            &self.global_subrs,
            private.default_width,
            private.nominal_width,
        )
    }

    /// The font name from the Name INDEX.
    pub fn font_name(&self) -> Result<&'a str, ParseError> {
        self.name_index.get_str(0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Serialise `objects` as an INDEX with 1 byte offsets.
    pub(crate) fn index(objects: &[&[u8]]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&(objects.len() as u16).to_be_bytes());
        if objects.is_empty() {
            return data;
        }
        data.push(1);
        let mut offset = 1;
        data.push(offset as u8);
        for object in objects {
            offset += object.len();
            data.push(offset as u8);
        }
        for object in objects {
            data.extend_from_slice(object);
        }
        data
    }

    /// Encode an integer DICT operand using the 5 byte form.
    fn int(value: i32) -> Vec<u8> {
        let mut data = vec![29];
        data.extend_from_slice(&value.to_be_bytes());
        data
    }

    /// A minimal CFF with the given charstrings and one local subroutine.
    pub(crate) fn build_cff(char_strings: &[&[u8]], local_subr: &[u8]) -> Vec<u8> {
        let header = [1, 0, 4, 1];
        let name = index(&[b"Test"]);
        let strings = index(&[]);
        let gsubrs = index(&[]);
        // private dict: defaultWidthX 500, nominalWidthX 100, Subrs at its end
        let mut private = Vec::new();
        private.extend(int(500));
        private.push(20);
        private.extend(int(100));
        private.push(21);
        let subrs_offset = private.len() + 6;
        private.extend(int(subrs_offset as i32));
        private.push(19);
        let local_subrs = index(&[local_subr]);
        let char_strings_index = index(char_strings);

        // the top dict has a fixed size: 3 operators with 5 byte operands
        let top_dict_len = 5 + 1 + 5 + 5 + 1;
        let top_dict_index_len = 2 + 1 + 2 + top_dict_len;
        let char_strings_offset =
            header.len() + name.len() + top_dict_index_len + strings.len() + gsubrs.len();
        let private_offset = char_strings_offset + char_strings_index.len();

        let mut top_dict = Vec::new();
        top_dict.extend(int(char_strings_offset as i32));
        top_dict.push(17);
        top_dict.extend(int(private.len() as i32));
        top_dict.extend(int(private_offset as i32));
        top_dict.push(18);
        assert_eq!(top_dict.len(), top_dict_len);

        let mut data = header.to_vec();
        data.extend(name);
        data.extend(index(&[&top_dict]));
        data.extend(strings);
        data.extend(gsubrs);
        data.extend(char_strings_index);
        data.extend(private);
        data.extend(local_subrs);
        data
    }

    #[test]
    fn read_index() {
        let data = index(&[b"ab", b"", b"cde"]);
        let index = ReadScope::new(&data).read::<Index<'_>>().unwrap();
        assert_eq!(index.count, 3);
        assert_eq!(index.get(0), Some(&b"ab"[..]));
        assert_eq!(index.get(1), Some(&b""[..]));
        assert_eq!(index.get(2), Some(&b"cde"[..]));
        assert_eq!(index.get(3), None);
    }

    #[test]
    fn read_dict() {
        // 1 2 3 4 FontBBox, 500 CharStrings, escaped CharstringType 2
        let data = [140, 141, 142, 143, 5, 248, 136, 17, 141, 12, 6];
        let dict = Dict::read(&data, Context::TopDict).unwrap();
        assert_eq!(
            dict.get(Operator {
                code: 5,
                escaped: false
            }),
            Some(&[1, 2, 3, 4][..])
        );
        assert_eq!(dict.get_i32(op::CHAR_STRINGS), Some(500));
        assert_eq!(dict.get_i32(op::CHARSTRING_TYPE), Some(2));
    }

    #[test]
    fn glyph_metrics() {
        // glyph 0: empty; glyph 1: width 20, call the local subroutine (index -107 biased)
        // which draws a line, then endchar
        let glyph: &[u8] = &[159, 149, 149, 21, 32, 10, 14];
        let subr: &[u8] = &[169, 179, 5, 11];
        let data = build_cff(&[&[], glyph], subr);
        let cff = ReadScope::new(&data).read::<CFF<'_>>().unwrap();
        assert_eq!(cff.num_glyphs(), 2);
        assert_eq!(cff.font_name(), Ok("Test"));

        let metrics = cff.glyph_metrics(1).unwrap();
        assert_eq!(metrics.advance, 120);
        assert_eq!(metrics.bounds.x_max(), 40);
        assert_eq!(metrics.bounds.y_max(), 50);

        let empty = cff.glyph_metrics(0).unwrap();
        assert_eq!(empty.advance, 0);
    }

    #[test]
    fn fd_select_format3() {
        // two ranges: glyphs 0..10 use dict 0, 10..20 use dict 1
        let data = [3, 0, 2, 0, 0, 0, 0, 10, 1, 0, 20];
        let fd_select = read_fd_select(&mut ReadScope::new(&data).ctxt(), 20).unwrap();
        assert_eq!(fd_select.font_dict_index(0), Some(0));
        assert_eq!(fd_select.font_dict_index(15), Some(1));
        assert_eq!(fd_select.font_dict_index(20), None);
    }
}
