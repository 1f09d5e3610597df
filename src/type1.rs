//! Adobe Type1 fonts in the PFB (Printer Font Binary) format.
//!
//! A Type1 font program is a PostScript program in two parts: a clear-text dictionary with
//! the font metadata and encoding, and an eexec encrypted part holding the Private
//! dictionary, the subroutines and the glyph charstrings. Reading is forgiving since many
//! fonts in the wild, especially those embedded in PDFs, do not follow the format
//! closely.
//!
//! Refer to [Adobe Type 1 Font Format](https://adobe-type-tools.github.io/font-tech-notes/pdfs/T1_SPEC.pdf).

pub mod tokenizer;

use std::convert::TryFrom;

use byteorder::{ByteOrder, LittleEndian};
use log::warn;
use pathfinder_geometry::vector::{vec2i, Vector2I};
use rustc_hash::FxHashMap;

use crate::cff::{STANDARD_ENCODING, STANDARD_STRINGS};
use crate::error::ParseError;
use crate::face::{FontExtents, LineMetric};
use crate::postscript::bounds::{GlyphMetrics, PathBounds};
use crate::postscript::type1::{type1_glyph_metrics, Type1Glyph};
use tokenizer::{hex_value, is_whitespace, Kind, Token, Tokenizer};

const EEXEC_KEY: u16 = 55665;
const CHARSTRING_KEY: u16 = 4330;
const DEFAULT_LEN_IV: i32 = 4;

const HEADER_FONT_TYPE: &[u8] = b"%!FontType";
const HEADER_ADOBE_FONT: &[u8] = b"%!PS-AdobeFont";
const CURRENTFILE_EEXEC: &[u8] = b"currentfile eexec";

const SEGMENT_START: u8 = 0x80;
const SEGMENT_ASCII: u8 = 0x01;
const SEGMENT_BINARY: u8 = 0x02;

/// The `FontInfo` dictionary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FontInfo {
    pub version: String,
    pub notice: String,
    pub full_name: String,
    pub family_name: String,
    pub weight: String,
    pub is_fixed_pitch: bool,
    pub italic_angle: i32,
    pub underline_position: i32,
    pub underline_thickness: i32,
}

/// The built-in encoding of a Type1 font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoding {
    Standard,
    /// Glyph names indexed by character code.
    Custom(Box<[Option<String>; 256]>),
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Standard
    }
}

impl Encoding {
    pub fn empty_custom() -> Encoding {
        Encoding::Custom(Box::new(std::array::from_fn(|_| None)))
    }

    /// The glyph name for `code`, `None` for unencoded codes.
    pub fn glyph_name(&self, code: u8) -> Option<&str> {
        match self {
            Encoding::Standard => standard_glyph_name(code),
            Encoding::Custom(names) => names[usize::from(code)].as_deref(),
        }
    }
}

/// Map a code of the Adobe Standard Encoding to its glyph name.
pub fn standard_glyph_name(code: u8) -> Option<&'static str> {
    match STANDARD_ENCODING[usize::from(code)] {
        0 => None,
        sid => STANDARD_STRINGS.get(usize::from(sid)).copied(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CharString {
    name: String,
    data: Vec<u8>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Type1Font {
    pub font_name: String,
    pub info: FontInfo,
    pub encoding: Encoding,
    pub paint_type: i32,
    pub font_type: i32,
    pub unique_id: i32,
    pub stroke_width: f32,
    pub font_id: String,
    pub font_matrix: Vec<f32>,
    pub font_bbox: Vec<f32>,
    subrs: Vec<Vec<u8>>,
    char_strings: Vec<CharString>,
    glyph_indices: FxHashMap<String, u16>,
}

impl Type1Font {
    /// Parse a PFB file, or a bare font program when the segment headers are missing.
    pub fn parse(data: &[u8]) -> Result<Type1Font, ParseError> {
        let (ascii, binary) = read_segments(data)?;
        let mut parser = Parser::new(ascii);
        let mut font = parser.parse_ascii()?;
        if !binary.is_empty() {
            let decrypted = decrypt_segment(binary);
            let mut parser = Parser::new(&decrypted);
            if let Err(err) = parser.parse_binary(&mut font) {
                warn!("unable to read the private part of Type1 font: {}", err);
            }
        }
        font.glyph_indices = font
            .char_strings
            .iter()
            .enumerate()
            .filter_map(|(index, cs)| Some((cs.name.clone(), u16::try_from(index).ok()?)))
            .collect();
        Ok(font)
    }

    pub fn num_glyphs(&self) -> usize {
        self.char_strings.len()
    }

    pub fn glyph_name(&self, glyph_id: u16) -> Option<&str> {
        self.char_strings
            .get(usize::from(glyph_id))
            .map(|cs| cs.name.as_str())
    }

    pub fn glyph_index(&self, name: &str) -> Option<u16> {
        self.glyph_indices.get(name).copied()
    }

    /// The glyph used for `code` by the built-in encoding.
    pub fn glyph_for_code(&self, code: u8) -> Option<u16> {
        self.encoding
            .glyph_name(code)
            .and_then(|name| self.glyph_index(name))
    }

    fn run_charstring(&self, glyph_id: u16, origin: Vector2I) -> Result<Type1Glyph, ParseError> {
        let cs = self
            .char_strings
            .get(usize::from(glyph_id))
            .ok_or(ParseError::BadIndex)?;
        let subrs = self.subrs.iter().map(Vec::as_slice).collect::<Vec<_>>();
        Ok(type1_glyph_metrics(&cs.data, &subrs, origin)?)
    }

    /// Advance and control bounds of a glyph. Accented glyphs built with `seac` include
    /// both components in their bounds.
    pub fn glyph_metrics(&self, glyph_id: u16) -> Result<GlyphMetrics, ParseError> {
        let glyph = self.run_charstring(glyph_id, Vector2I::zero())?;
        let seac = match glyph.seac {
            Some(seac) => seac,
            None => return Ok(glyph.metrics),
        };

        let standard_glyph = |code: i32| {
            u8::try_from(code)
                .ok()
                .and_then(standard_glyph_name)
                .and_then(|name| self.glyph_index(name))
                .ok_or(ParseError::MissingValue)
        };
        let base = self.run_charstring(standard_glyph(seac.base_code)?, Vector2I::zero())?;
        let origin = seac.accent_origin - vec2i(seac.accent_left_side_bearing, 0);
        let accent = self.run_charstring(standard_glyph(seac.accent_code)?, origin)?;

        let mut bounds = base.metrics.bounds;
        bounds.union(accent.metrics.bounds);
        Ok(GlyphMetrics {
            // the advance is that of the composite, which repeats the base's hsbw
            advance: glyph.metrics.advance,
            bounds,
        })
    }

    pub fn glyph_advance(&self, glyph_id: u16) -> Result<i32, ParseError> {
        self.run_charstring(glyph_id, Vector2I::zero())
            .map(|glyph| glyph.metrics.advance)
    }

    pub fn glyph_bounds(&self, glyph_id: u16) -> Result<PathBounds, ParseError> {
        self.glyph_metrics(glyph_id).map(|metrics| metrics.bounds)
    }

    /// Units per em derived from the `FontMatrix`, the larger of the two axes.
    pub fn units_per_em(&self) -> u16 {
        let (xx, yy) = match self.font_matrix.as_slice() {
            [xx, _, _, yy, ..] => (xx.abs(), yy.abs()),
            _ => return 1000,
        };
        let upem = |scale: f32| {
            if scale != 0.0 {
                (1.0 / scale).round() as u16
            } else {
                1000
            }
        };
        upem(xx).max(upem(yy))
    }

    /// `(x_min, y_min, x_max, y_max)` of the `FontBBox`.
    pub fn font_bbox(&self) -> Option<(f32, f32, f32, f32)> {
        match self.font_bbox.as_slice() {
            [x_min, y_min, x_max, y_max, ..] => Some((*x_min, *y_min, *x_max, *y_max)),
            _ => None,
        }
    }

    /// Horizontal extents from the font bounding box.
    pub fn font_extents(&self) -> Option<FontExtents> {
        let (_, y_min, _, y_max) = self.font_bbox()?;
        let ascender = y_max.round() as i32;
        let descender = y_min.round() as i32;
        let line_gap = ((f32::from(self.units_per_em()) * 1.2).round() as i32).max(ascender - descender);
        Some(FontExtents {
            ascender,
            descender,
            line_gap,
        })
    }

    pub fn line_metric(&self, metric: LineMetric) -> Option<i32> {
        match metric {
            LineMetric::UnderlinePosition => Some(self.info.underline_position),
            LineMetric::UnderlineThickness => Some(self.info.underline_thickness),
            // Type 1 fonts carry no strikeout metrics
            _ => None,
        }
    }

    /// Style name, italic and bold flags derived from the names and weight.
    pub fn style(&self) -> (String, bool, bool) {
        let family = self.info.family_name.as_bytes();
        let full = self.info.full_name.as_bytes();
        let mut style_name = None;

        if !family.is_empty() {
            let (mut i, mut j) = (0, 0);
            let mut same = true;
            while i < full.len() {
                if j < family.len() && full[i] == family[j] {
                    i += 1;
                    j += 1;
                } else if full[i] == b' ' || full[i] == b'-' {
                    i += 1;
                } else if j < family.len() && (family[j] == b' ' || family[j] == b'-') {
                    j += 1;
                } else {
                    same = false;
                    if j == family.len() {
                        style_name = Some(String::from_utf8_lossy(&full[i..]).into_owned());
                    }
                    break;
                }
            }
            if same {
                style_name = Some(String::from("Regular"));
            }
        }

        let style_name = style_name.unwrap_or_else(|| {
            if self.info.weight.is_empty() {
                String::from("Regular")
            } else {
                self.info.weight.clone()
            }
        });
        let is_italic = self.info.italic_angle != 0;
        let is_bold = self.info.weight == "Bold" || self.info.weight == "Black";
        (style_name, is_italic, is_bold)
    }
}

/// Split a PFB file into its clear-text and encrypted parts.
fn read_segments(data: &[u8]) -> Result<(&[u8], &[u8]), ParseError> {
    let mut rest = data;
    match read_segment(&mut rest, SEGMENT_ASCII, data.len()) {
        Ok(ascii) => {
            // the trailing segment of zeros is not needed
            let binary = read_segment(&mut rest, SEGMENT_BINARY, data.len())?;
            Ok((ascii, binary))
        }
        Err(_) => find_eexec(data),
    }
}

fn read_segment<'a>(
    rest: &mut &'a [u8],
    expected: u8,
    total_size: usize,
) -> Result<&'a [u8], ParseError> {
    let header = rest.get(..6).ok_or(ParseError::BadEof)?;
    if header[0] != SEGMENT_START || header[1] != expected {
        return Err(ParseError::BadValue);
    }
    let size = usize::try_from(LittleEndian::read_u32(&header[2..]))?;
    if size >= total_size {
        return Err(ParseError::BadValue);
    }
    let segment = rest.get(6..6 + size).ok_or(ParseError::BadEof)?;
    *rest = &rest[6 + size..];
    Ok(segment)
}

/// Locate `currentfile eexec` in a font program without segment headers.
fn find_eexec(data: &[u8]) -> Result<(&[u8], &[u8]), ParseError> {
    if !(data.starts_with(HEADER_FONT_TYPE) || data.starts_with(HEADER_ADOBE_FONT)) {
        return Err(ParseError::BadVersion);
    }
    let index = data
        .windows(CURRENTFILE_EEXEC.len())
        .position(|window| window == CURRENTFILE_EEXEC)
        .ok_or(ParseError::MissingValue)?;
    let (ascii, mut binary) = data.split_at(index + CURRENTFILE_EEXEC.len());
    // end of line
    if binary.first().copied().map_or(false, is_whitespace) {
        binary = &binary[1..];
    }
    Ok((ascii, binary))
}

fn decrypt_segment(data: &[u8]) -> Vec<u8> {
    // fonts sometimes use the hexadecimal form of the encrypted part
    if is_binary(data) {
        decrypt(data, EEXEC_KEY, 4)
    } else {
        decrypt(&hex_to_binary(data), EEXEC_KEY, 4)
    }
}

/// eexec and charstring decryption. `skip` is the number of leading random bytes; a value
/// of -1 means the data is not encrypted.
fn decrypt(data: &[u8], mut key: u16, skip: i32) -> Vec<u8> {
    const C1: u16 = 52845;
    const C2: u16 = 22719;

    let skip = match usize::try_from(skip) {
        Ok(skip) => skip,
        Err(_) => return data.to_vec(),
    };
    if data.is_empty() || data.len() < skip {
        return Vec::new();
    }
    let mut plain = Vec::with_capacity(data.len());
    for &cipher in data {
        plain.push(cipher ^ (key >> 8) as u8);
        key = u16::from(cipher)
            .wrapping_add(key)
            .wrapping_mul(C1)
            .wrapping_add(C2);
    }
    plain.split_off(skip)
}

/// At least one of the first four bytes of binary eexec data is not a hex digit.
fn is_binary(data: &[u8]) -> bool {
    if data.len() < 4 {
        return true;
    }
    data[..4]
        .iter()
        .any(|&b| !is_whitespace(b) && hex_value(b).is_none())
}

fn hex_to_binary(data: &[u8]) -> Vec<u8> {
    let digits = data.iter().filter_map(|&b| hex_value(b)).collect::<Vec<_>>();
    digits
        .chunks_exact(2)
        .map(|pair| (pair[0] << 4) | pair[1])
        .collect()
}

fn latin1(value: &[u8]) -> String {
    let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(value);
    text.into_owned()
}

struct Parser<'a> {
    lexer: Tokenizer<'a>,
}

type Value<'a> = Vec<Token<'a>>;

impl<'a> Parser<'a> {
    fn new(data: &'a [u8]) -> Self {
        Parser {
            lexer: Tokenizer::new(data),
        }
    }

    fn peek(&self) -> Option<Token<'a>> {
        self.lexer.peek()
    }

    fn peek_is(&self, kind: Kind, name: &str) -> bool {
        self.peek().map_or(false, |token| token.is(kind, name))
    }

    fn next(&mut self) -> Result<Token<'a>, ParseError> {
        self.lexer.next_token()?.ok_or(ParseError::BadEof)
    }

    fn read(&mut self, kind: Kind) -> Result<Token<'a>, ParseError> {
        let token = self.next()?;
        if token.kind != kind {
            warn!("Type1: found {} but expected {}", token.kind, kind);
            return Err(ParseError::BadValue);
        }
        Ok(token)
    }

    fn read_named(&mut self, kind: Kind, name: &str) -> Result<(), ParseError> {
        let token = self.read(kind)?;
        if token.value.as_ref() != name.as_bytes() {
            warn!("Type1: found {} but expected {}", latin1(&token.value), name);
            return Err(ParseError::BadValue);
        }
        Ok(())
    }

    fn read_maybe(&mut self, kind: Kind, name: &str) -> Result<Option<Token<'a>>, ParseError> {
        if self.peek_is(kind, name) {
            self.next().map(Some)
        } else {
            Ok(None)
        }
    }

    fn read_int(&mut self) -> Result<i32, ParseError> {
        self.read(Kind::Integer)?.int().ok_or(ParseError::BadValue)
    }

    fn parse_ascii(&mut self) -> Result<Type1Font, ParseError> {
        let mut font = Type1Font::default();
        if !self.lexer_data_starts_with(b"%!") {
            return Err(ParseError::BadVersion);
        }

        // synthetic font prelude
        if self.peek_is(Kind::Other, "FontDirectory") {
            self.read_named(Kind::Other, "FontDirectory")?;
            self.read(Kind::Name)?;
            self.read_named(Kind::Other, "known")?;
            self.read(Kind::StartProc)?;
            self.read_proc()?;
            self.read(Kind::StartProc)?;
            self.read_proc()?;
            self.read_named(Kind::Other, "ifelse")?;
        }

        let length = self.read_int()?;
        self.read_named(Kind::Other, "dict")?;
        // found in some TeX fonts
        self.read_maybe(Kind::Other, "dup")?;
        self.read_named(Kind::Other, "begin")?;

        for _ in 0..length {
            match self.peek() {
                None => break,
                Some(token) if token.is_other("currentdict") || token.is_other("end") => break,
                Some(_) => {}
            }
            let key = self.read(Kind::Name)?;
            match key.value.as_ref() {
                b"FontInfo" | b"Fontinfo" => {
                    let dict = self.read_simple_dict()?;
                    font.info = font_info(&dict);
                }
                b"Metrics" => {
                    self.read_simple_dict()?;
                }
                b"Encoding" => font.encoding = self.read_encoding()?,
                key => {
                    let key = key.to_vec();
                    self.read_simple_value(&key, &mut font)?;
                }
            }
        }

        self.read_maybe(Kind::Other, "currentdict")?;
        self.read_named(Kind::Other, "end")?;
        self.read_named(Kind::Other, "currentfile")?;
        self.read_named(Kind::Other, "eexec")?;
        Ok(font)
    }

    fn lexer_data_starts_with(&self, prefix: &[u8]) -> bool {
        self.lexer.data().starts_with(prefix)
    }

    fn read_simple_value(&mut self, key: &[u8], font: &mut Type1Font) -> Result<(), ParseError> {
        let value = self.read_dict_value()?;
        let first = || value.first().ok_or(ParseError::MissingValue);
        match key {
            b"FontName" => font.font_name = latin1(&first()?.value),
            b"PaintType" => font.paint_type = first()?.int().unwrap_or_default(),
            b"FontType" => font.font_type = first()?.int().unwrap_or_default(),
            b"UniqueID" => font.unique_id = first()?.int().unwrap_or_default(),
            b"StrokeWidth" => font.stroke_width = first()?.float().unwrap_or_default() as f32,
            b"FID" => font.font_id = latin1(&first()?.value),
            b"FontMatrix" => font.font_matrix = array_to_numbers(&value)?,
            b"FontBBox" => font.font_bbox = array_to_numbers(&value)?,
            _ => {}
        }
        Ok(())
    }

    fn read_encoding(&mut self) -> Result<Encoding, ParseError> {
        if self.peek().map_or(false, |token| token.kind == Kind::Other) {
            let name = self.next()?;
            if name.value.as_ref() != b"StandardEncoding" {
                warn!("Type1: unknown encoding {}", latin1(&name.value));
                return Err(ParseError::NotImplemented);
            }
            self.read_maybe(Kind::Other, "readonly")?;
            self.read_named(Kind::Other, "def")?;
            return Ok(Encoding::Standard);
        }

        self.read(Kind::Integer)?;
        self.read_maybe(Kind::Other, "array")?;
        // skip the initialisation loop, `0 1 255 {1 index exch /.notdef put } for`. Some
        // fonts go straight to `readonly def` without any entries.
        loop {
            match self.peek() {
                Some(token)
                    if token.is_other("dup")
                        || token.is_other("readonly")
                        || token.is_other("def") =>
                {
                    break
                }
                _ => {
                    self.next()?;
                }
            }
        }

        let mut encoding = Encoding::empty_custom();
        while self.peek_is(Kind::Other, "dup") {
            self.read_named(Kind::Other, "dup")?;
            let code = self.read_int()?;
            let name = self.read(Kind::Name)?;
            self.read_named(Kind::Other, "put")?;
            if let (Encoding::Custom(names), Ok(code)) = (&mut encoding, u8::try_from(code)) {
                names[usize::from(code)] = Some(latin1(&name.value));
            }
        }
        self.read_maybe(Kind::Other, "readonly")?;
        self.read_named(Kind::Other, "def")?;
        Ok(encoding)
    }

    /// Read a dictionary whose values do not contain nested dictionaries.
    fn read_simple_dict(&mut self) -> Result<FxHashMap<Vec<u8>, Value<'a>>, ParseError> {
        let mut dict = FxHashMap::default();
        let length = self.read_int()?;
        self.read_named(Kind::Other, "dict")?;
        self.read_maybe(Kind::Other, "dup")?;
        self.read_named(Kind::Other, "begin")?;

        for _ in 0..length {
            match self.peek() {
                None => break,
                Some(token) if token.kind == Kind::Other && !token.is_other("end") => {
                    self.next()?;
                }
                Some(_) => {}
            }
            match self.peek() {
                None => break,
                Some(token) if token.is_other("end") => break,
                Some(_) => {}
            }
            let key = self.read(Kind::Name)?;
            let value = self.read_dict_value()?;
            dict.insert(key.value.into_owned(), value);
        }

        self.read_named(Kind::Other, "end")?;
        self.read_maybe(Kind::Other, "readonly")?;
        self.read_named(Kind::Other, "def")?;
        Ok(dict)
    }

    fn read_dict_value(&mut self) -> Result<Value<'a>, ParseError> {
        let value = self.read_value()?;
        self.read_def()?;
        Ok(value)
    }

    /// Read a number, string, name, array, procedure or charstring. Nested dictionaries
    /// are only supported when empty.
    fn read_value(&mut self) -> Result<Value<'a>, ParseError> {
        let token = self.next()?;
        let kind = token.kind;
        let mut value = vec![token];

        match kind {
            Kind::StartArray => {
                let mut open = 1;
                while open > 0 {
                    let token = self.next()?;
                    match token.kind {
                        Kind::StartArray => open += 1,
                        Kind::EndArray => open -= 1,
                        _ => {}
                    }
                    value.push(token);
                }
            }
            Kind::StartProc => value.extend(self.read_proc()?),
            Kind::StartDic => {
                // `/GlyphNames2HostCode << >> def`
                self.read(Kind::EndDic)?;
                return Ok(value);
            }
            _ => {}
        }
        self.read_postscript_wrapper(&mut value)?;
        Ok(value)
    }

    /// `systemdict /internaldict known {...} {...} ifelse {pop value} if`, not part of the
    /// Type1 format but found in some fonts. The value in the wrapper replaces `value`.
    fn read_postscript_wrapper(&mut self, value: &mut Value<'a>) -> Result<(), ParseError> {
        if !self.peek_is(Kind::Other, "systemdict") {
            return Ok(());
        }
        self.read_named(Kind::Other, "systemdict")?;
        self.read_named(Kind::Name, "internaldict")?;
        self.read_named(Kind::Other, "known")?;
        self.read(Kind::StartProc)?;
        self.read_proc()?;
        self.read(Kind::StartProc)?;
        self.read_proc()?;
        self.read_named(Kind::Other, "ifelse")?;

        self.read(Kind::StartProc)?;
        self.read_named(Kind::Other, "pop")?;
        *value = self.read_value()?;
        self.read(Kind::EndProc)?;
        self.read_named(Kind::Other, "if")?;
        Ok(())
    }

    /// Read the rest of a procedure after its opening brace.
    fn read_proc(&mut self) -> Result<Value<'a>, ParseError> {
        let mut value = Vec::new();
        let mut open = 1;
        while open > 0 {
            let token = self.next()?;
            match token.kind {
                Kind::StartProc => open += 1,
                Kind::EndProc => open -= 1,
                _ => {}
            }
            value.push(token);
        }
        if let Some(token) = self.read_maybe(Kind::Other, "executeonly")? {
            value.push(token);
        }
        Ok(value)
    }

    /// `def` or one of its equivalents: `ND`, `|-`, `noaccess def`.
    fn read_def(&mut self) -> Result<(), ParseError> {
        self.read_maybe(Kind::Other, "readonly")?;
        // `noaccess ND` is not in the format but occurs
        self.read_maybe(Kind::Other, "noaccess")?;
        let mut token = self.read(Kind::Other)?;
        match token.value.as_ref() {
            b"ND" | b"|-" => return Ok(()),
            b"noaccess" => token = self.read(Kind::Other)?,
            _ => {}
        }
        if token.value.as_ref() == b"def" {
            Ok(())
        } else {
            warn!("Type1: found {} but expected ND", latin1(&token.value));
            Err(ParseError::BadValue)
        }
    }

    /// `put` or one of its equivalents: `NP`, `|`, `noaccess put`.
    fn read_put(&mut self) -> Result<(), ParseError> {
        self.read_maybe(Kind::Other, "readonly")?;
        let mut token = self.read(Kind::Other)?;
        match token.value.as_ref() {
            b"NP" | b"|" => return Ok(()),
            b"noaccess" => token = self.read(Kind::Other)?,
            _ => {}
        }
        if token.value.as_ref() == b"put" {
            Ok(())
        } else {
            warn!("Type1: found {} but expected NP", latin1(&token.value));
            Err(ParseError::BadValue)
        }
    }

    fn skip_to_name(&mut self, name: &str) -> Result<(), ParseError> {
        while !self.peek_is(Kind::Name, name) {
            self.next()?;
        }
        self.read_named(Kind::Name, name)
    }

    fn parse_binary(&mut self, font: &mut Type1Font) -> Result<(), ParseError> {
        // the code before the Private dictionary is of no interest
        self.skip_to_name("Private")?;
        let length = self.read_int()?;
        self.read_named(Kind::Other, "dict")?;
        // `/Private 10 dict def Private begin` is also possible
        self.read_maybe(Kind::Other, "dup")?;
        self.read_named(Kind::Other, "begin")?;

        let mut len_iv = DEFAULT_LEN_IV;
        for _ in 0..length {
            if self.peek().map_or(true, |token| token.kind != Kind::Name) {
                break;
            }
            let key = self.read(Kind::Name)?;
            match key.value.as_ref() {
                b"Subrs" => font.subrs = self.read_subrs(len_iv)?,
                b"OtherSubrs" => self.read_other_subrs()?,
                b"lenIV" => {
                    let value = self.read_dict_value()?;
                    len_iv = value
                        .first()
                        .and_then(Token::int)
                        .ok_or(ParseError::BadValue)?;
                }
                // `/RD {string currentfile exch readstring pop} bind executeonly def`
                b"RD" | b"-|" => {
                    self.read(Kind::StartProc)?;
                    self.read_proc()?;
                    self.read_maybe(Kind::Other, "bind")?;
                    self.read_maybe(Kind::Other, "executeonly")?;
                    self.read_named(Kind::Other, "def")?;
                }
                // hinting values are not used
                _ => {
                    self.read_dict_value()?;
                }
            }
        }

        // some fonts have "2 index" here, others "end noaccess put"
        self.skip_to_name("CharStrings")?;
        font.char_strings = self.read_char_strings(len_iv)?;
        Ok(())
    }

    fn read_subrs(&mut self, len_iv: i32) -> Result<Vec<Vec<u8>>, ParseError> {
        let length = usize::try_from(self.read_int()?)?;
        self.read_named(Kind::Other, "array")?;
        let mut subrs = vec![Vec::new(); length];

        for _ in 0..length {
            if !self.peek_is(Kind::Other, "dup") {
                break;
            }
            self.read_named(Kind::Other, "dup")?;
            let index = usize::try_from(self.read_int()?)?;
            self.read(Kind::Integer)?;
            if index >= length {
                warn!("Type1: subroutine index {} out of range ({})", index, length);
                return Err(ParseError::BadIndex);
            }
            let charstring = self.read(Kind::CharString)?;
            subrs[index] = decrypt(&charstring.value, CHARSTRING_KEY, len_iv);
            self.read_put()?;
        }
        self.read_def()?;
        Ok(subrs)
    }

    /// OtherSubrs are PostScript procedures, skipped.
    fn read_other_subrs(&mut self) -> Result<(), ParseError> {
        if self.peek().map_or(false, |token| token.kind == Kind::StartArray) {
            self.read_value()?;
            return self.read_def();
        }
        let length = self.read_int()?;
        self.read_named(Kind::Other, "array")?;
        for _ in 0..length {
            self.read_named(Kind::Other, "dup")?;
            self.read(Kind::Integer)?;
            self.read_value()?;
            self.read_put()?;
        }
        self.read_def()
    }

    fn read_char_strings(&mut self, len_iv: i32) -> Result<Vec<CharString>, ParseError> {
        let length = self.read_int()?;
        self.read_named(Kind::Other, "dict")?;
        // `CharStrings begin` is also possible
        self.read_named(Kind::Other, "dup")?;
        self.read_named(Kind::Other, "begin")?;

        let mut char_strings = Vec::new();
        for _ in 0..length {
            match self.peek() {
                None => break,
                Some(token) if token.is_other("end") => break,
                Some(_) => {}
            }
            let name = self.read(Kind::Name)?;
            self.read(Kind::Integer)?;
            let charstring = self.read(Kind::CharString)?;
            char_strings.push(CharString {
                name: latin1(&name.value),
                data: decrypt(&charstring.value, CHARSTRING_KEY, len_iv),
            });
            self.read_def()?;
        }
        // some fonts have one "end", others two
        self.read_named(Kind::Other, "end")?;
        Ok(char_strings)
    }
}

/// The numbers of an array or procedure, without the surrounding brackets.
fn array_to_numbers(value: &[Token<'_>]) -> Result<Vec<f32>, ParseError> {
    if value.len() < 2 {
        return Ok(Vec::new());
    }
    value[1..value.len() - 1]
        .iter()
        .map(|token| match token.kind {
            Kind::Integer | Kind::Float => token.float().map(|f| f as f32).ok_or(ParseError::BadValue),
            _ => {
                warn!("Type1: expected a number but found {}", token.kind);
                Err(ParseError::BadValue)
            }
        })
        .collect()
}

fn font_info(dict: &FxHashMap<Vec<u8>, Value<'_>>) -> FontInfo {
    let mut info = FontInfo::default();
    for (key, value) in dict {
        let token = match value.first() {
            Some(token) => token,
            None => continue,
        };
        let text = || latin1(&token.value);
        let int = || token.int().unwrap_or_default();
        match key.as_slice() {
            b"version" => info.version = text(),
            b"Notice" => info.notice = text(),
            b"FullName" => info.full_name = text(),
            b"FamilyName" => info.family_name = text(),
            b"Weight" => info.weight = text(),
            b"isFixedPitch" => info.is_fixed_pitch = token.value.as_ref() == b"true",
            b"ItalicAngle" => info.italic_angle = int(),
            b"UnderlinePosition" => info.underline_position = int(),
            b"UnderlineThickness" => info.underline_thickness = int(),
            _ => {}
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASCII_PART: &str = "%!PS-AdobeFont-1.0: Test 001.000
12 dict begin
/FontInfo 9 dict dup begin
/version (001.000) readonly def
/Notice (Public domain) readonly def
/FullName (Test Sans Bold) readonly def
/FamilyName (Test Sans) readonly def
/Weight (Bold) readonly def
/ItalicAngle 0 def
/isFixedPitch false def
/UnderlinePosition -100 def
/UnderlineThickness 50 def
end readonly def
/FontName /TestSans-Bold def
/PaintType 0 def
/FontType 1 def
/FontMatrix [0.001 0 0 0.001 0 0] readonly def
/Encoding 256 array
0 1 255 {1 index exch /.notdef put} for
dup 65 /A put
dup 66 /B put
readonly def
/FontBBox {-50 -200 1000 800} readonly def
currentdict end
currentfile eexec
";

    fn n(value: i32) -> u8 {
        (value + 139) as u8
    }

    fn encrypt(plain: &[u8], mut key: u16) -> Vec<u8> {
        plain
            .iter()
            .map(|&p| {
                let c = p ^ (key >> 8) as u8;
                key = u16::from(c)
                    .wrapping_add(key)
                    .wrapping_mul(52845)
                    .wrapping_add(22719);
                c
            })
            .collect()
    }

    fn charstring(program: &[u8]) -> Vec<u8> {
        let mut plain = vec![0; 4];
        plain.extend_from_slice(program);
        encrypt(&plain, CHARSTRING_KEY)
    }

    fn private_part() -> Vec<u8> {
        let mut private = b"dup /Private 8 dict dup begin\n/RD {string currentfile exch readstring pop} executeonly def\n/ND {noaccess def} executeonly def\n/NP {noaccess put} executeonly def\n/lenIV 4 def\n/BlueValues [-10 0 700 710] ND\n".to_vec();

        let subr = charstring(&[n(0), n(40), 5, 11]);
        private.extend_from_slice(format!("/Subrs 1 array\ndup 0 {} RD ", subr.len()).as_bytes());
        private.extend_from_slice(&subr);
        private.extend_from_slice(b" NP\nND\n2 index /CharStrings 4 dict dup begin\n");

        let glyphs: [(&str, Vec<u8>); 4] = [
            (".notdef", charstring(&[n(0), 247, 142, 13, 14])),
            // 20 500 hsbw 100 hlineto 0 callsubr endchar
            ("A", charstring(&[n(20), 248, 136, 13, n(100), 6, n(0), 10, 14])),
            // 0 300 hsbw 50 vlineto endchar
            ("acute", charstring(&[n(0), 247, 192, 13, n(50), 7, 14])),
            // 20 500 hsbw 0 200 100 65 194 seac
            ("Aacute", charstring(&[n(20), 248, 136, 13, n(0), n(100), n(100), n(65), 247, 86, 12, 6])),
        ];
        for (name, data) in glyphs.iter() {
            private.extend_from_slice(format!("/{} {} RD ", name, data.len()).as_bytes());
            private.extend_from_slice(data);
            private.extend_from_slice(b" ND\n");
        }
        private.extend_from_slice(b"end\nend\nreadonly put\nnoaccess put\ndup /FontName get exch definefont pop\nmark currentfile closefile\n");

        let mut plain = b"\x00\x00\x00\x00".to_vec();
        plain.extend_from_slice(&private);
        encrypt(&plain, EEXEC_KEY)
    }

    fn pfb() -> Vec<u8> {
        let ascii = ASCII_PART.as_bytes();
        let binary = private_part();
        let mut data = Vec::new();
        for (marker, segment) in [(SEGMENT_ASCII, ascii), (SEGMENT_BINARY, binary.as_slice())] {
            data.extend_from_slice(&[SEGMENT_START, marker]);
            data.extend_from_slice(&(segment.len() as u32).to_le_bytes());
            data.extend_from_slice(segment);
        }
        data.extend_from_slice(&[SEGMENT_START, 0x03]);
        data
    }

    #[test]
    fn decrypt_round_trip_skips_random_bytes() {
        let cipher = encrypt(b"abcdefgh", EEXEC_KEY);
        assert_eq!(decrypt(&cipher, EEXEC_KEY, 4), b"efgh");
        assert_eq!(decrypt(&cipher, EEXEC_KEY, -1), cipher);
        assert!(decrypt(&cipher[..2], EEXEC_KEY, 4).is_empty());
    }

    #[test]
    fn binary_detection() {
        assert!(is_binary(b"\x80\x01ab"));
        assert!(!is_binary(b"D9 1F"));
        assert!(is_binary(b"ab"));
        assert_eq!(hex_to_binary(b"d9 1F\n0"), vec![0xD9, 0x1F]);
    }

    #[test]
    fn parse_font_dictionary() {
        let font = Type1Font::parse(&pfb()).unwrap();
        assert_eq!(font.font_name, "TestSans-Bold");
        assert_eq!(font.font_type, 1);
        assert_eq!(font.info.full_name, "Test Sans Bold");
        assert_eq!(font.info.underline_position, -100);
        assert!(!font.info.is_fixed_pitch);
        assert_eq!(font.font_bbox(), Some((-50.0, -200.0, 1000.0, 800.0)));
        assert_eq!(font.units_per_em(), 1000);
        assert_eq!(font.encoding.glyph_name(65), Some("A"));
        assert_eq!(font.encoding.glyph_name(67), None);
        assert_eq!(font.style(), (String::from("Bold"), false, true));
        assert_eq!(
            font.font_extents(),
            Some(FontExtents {
                ascender: 800,
                descender: -200,
                line_gap: 1200,
            })
        );
    }

    #[test]
    fn parse_char_strings() {
        let font = Type1Font::parse(&pfb()).unwrap();
        assert_eq!(font.num_glyphs(), 4);
        assert_eq!(font.glyph_index("A"), Some(1));
        assert_eq!(font.glyph_for_code(65), Some(1));
        assert_eq!(font.glyph_name(2), Some("acute"));
        assert_eq!(font.glyph_advance(0).unwrap(), 250);
        assert_eq!(font.glyph_advance(1).unwrap(), 500);

        let bounds = font.glyph_bounds(1).unwrap();
        assert_eq!(
            (bounds.x_min(), bounds.y_min(), bounds.x_max(), bounds.y_max()),
            (0, 0, 120, 40)
        );
    }

    #[test]
    fn seac_bounds_include_accent() {
        let font = Type1Font::parse(&pfb()).unwrap();
        let metrics = font.glyph_metrics(3).unwrap();
        assert_eq!(metrics.advance, 500);
        // the accent starts at (100 - 0, 100) and its hsbw adds no side bearing
        let bounds = metrics.bounds;
        assert_eq!(
            (bounds.x_min(), bounds.y_min(), bounds.x_max(), bounds.y_max()),
            (0, 0, 120, 150)
        );
    }

    #[test]
    fn eexec_fallback_without_segments() {
        let mut data = ASCII_PART.as_bytes().to_vec();
        data.extend_from_slice(&private_part());
        let font = Type1Font::parse(&data).unwrap();
        assert_eq!(font.num_glyphs(), 4);
        assert!(Type1Font::parse(b"not a font").is_err());
    }

    #[test]
    fn standard_encoding_names() {
        assert_eq!(standard_glyph_name(65), Some("A"));
        assert_eq!(standard_glyph_name(194), Some("acute"));
        assert_eq!(standard_glyph_name(0), None);
    }
}
