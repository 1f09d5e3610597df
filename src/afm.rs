//! Adobe Font Metrics (AFM) files.
//!
//! AFM files accompany Type1 fonts and carry the metrics that the font program itself does
//! not: character widths and boxes, kerning pairs and ligatures.
//!
//! Refer to [Adobe Font Metrics File Format Specification](https://adobe-type-tools.github.io/font-tech-notes/pdfs/5004.AFM_Spec.pdf).

use std::str::FromStr;

use log::warn;
use rustc_hash::FxHashMap;

use crate::error::ParseError;
use crate::type1::Type1Font;

pub const NOTDEF: &str = ".notdef";

/// Metrics of one entry of the `CharMetrics` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharMetric {
    /// `None` for glyphs that are not encoded.
    pub code: Option<u8>,
    pub name: String,
    pub width: i32,
    /// `[llx, lly, urx, ury]`
    pub bbox: [i32; 4],
    /// `(successor, ligature)` pairs
    pub ligatures: Vec<(String, String)>,
}

impl Default for CharMetric {
    fn default() -> Self {
        CharMetric {
            code: None,
            name: String::new(),
            width: 250,
            bbox: [0; 4],
            ligatures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AfmFont {
    pub version: String,
    pub notice: String,
    pub font_name: String,
    pub full_name: String,
    pub family_name: String,
    pub weight: String,
    pub italic_angle: f32,
    pub is_fixed_pitch: bool,
    pub character_set: String,
    pub encoding_scheme: String,
    /// `[llx, lly, urx, ury]`
    pub font_bbox: [f32; 4],
    pub underline_position: i32,
    pub underline_thickness: i32,
    pub cap_height: f32,
    pub x_height: i32,
    pub ascender: f32,
    pub descender: f32,
    pub std_hw: i32,
    pub std_vw: i32,
    /// Every character, encoded or not, in file order.
    pub char_metrics: Vec<CharMetric>,
    /// Glyph names indexed by character code.
    pub code_to_name: FxHashMap<u8, String>,
    /// Kerning distances keyed by the first and second glyph names.
    pub kern_pairs: FxHashMap<(String, String), i32>,
    names: FxHashMap<String, usize>,
}

impl Default for AfmFont {
    fn default() -> Self {
        AfmFont {
            version: String::new(),
            notice: String::new(),
            font_name: String::new(),
            full_name: String::new(),
            family_name: String::new(),
            weight: String::new(),
            italic_angle: 0.,
            is_fixed_pitch: false,
            character_set: String::new(),
            encoding_scheme: String::from("FontSpecific"),
            font_bbox: [0.; 4],
            underline_position: -100,
            underline_thickness: 50,
            cap_height: 0.,
            x_height: 480,
            ascender: 0.,
            descender: 0.,
            std_hw: 0,
            std_vw: 80,
            char_metrics: Vec::new(),
            code_to_name: FxHashMap::default(),
            kern_pairs: FxHashMap::default(),
            names: FxHashMap::default(),
        }
    }
}

fn token<'a>(tokens: &[&'a str], index: usize) -> Result<&'a str, ParseError> {
    tokens.get(index).copied().ok_or(ParseError::MissingValue)
}

fn number<T: FromStr>(tokens: &[&str], index: usize) -> Result<T, ParseError> {
    let value = token(tokens, index)?;
    value.parse().map_err(|_| {
        warn!("AFM: invalid number '{}'", value);
        ParseError::BadValue
    })
}

/// The rest of the line after the key, used for free text values.
fn text(line: &str, key: &str) -> String {
    line.trim_start()[key.len()..].trim().to_string()
}

impl AfmFont {
    pub fn parse(data: &[u8]) -> Result<AfmFont, ParseError> {
        let (source, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(data);
        let mut font = AfmFont::default();
        let mut lines = source.lines();

        font.parse_header(&mut lines)?;
        font.parse_char_metrics(&mut lines)?;
        font.parse_kern_pairs(&mut lines)?;
        Ok(font)
    }

    fn parse_header<'a>(&mut self, lines: &mut impl Iterator<Item = &'a str>) -> Result<(), ParseError> {
        for line in lines {
            let tokens = line.split_whitespace().collect::<Vec<_>>();
            let key = match tokens.first() {
                Some(key) => *key,
                None => continue,
            };
            match key {
                "Version" => self.version = text(line, key),
                "Notice" => self.notice = text(line, key),
                "FontName" => self.font_name = token(&tokens, 1)?.to_string(),
                "FullName" => self.full_name = text(line, key),
                "FamilyName" => self.family_name = text(line, key),
                "Weight" => self.weight = token(&tokens, 1)?.to_string(),
                "ItalicAngle" => self.italic_angle = number(&tokens, 1)?,
                "IsFixedPitch" => self.is_fixed_pitch = token(&tokens, 1)? == "true",
                "CharacterSet" => self.character_set = token(&tokens, 1)?.to_string(),
                "FontBBox" => {
                    for i in 0..4 {
                        self.font_bbox[i] = number(&tokens, i + 1)?;
                    }
                }
                "UnderlinePosition" => self.underline_position = number(&tokens, 1)?,
                "UnderlineThickness" => self.underline_thickness = number(&tokens, 1)?,
                "EncodingScheme" => self.encoding_scheme = text(line, key),
                "CapHeight" => self.cap_height = number(&tokens, 1)?,
                "XHeight" => self.x_height = number(&tokens, 1)?,
                "Ascender" => self.ascender = number(&tokens, 1)?,
                "Descender" => self.descender = number(&tokens, 1)?,
                "StdHW" => self.std_hw = number(&tokens, 1)?,
                "StdVW" => self.std_vw = number(&tokens, 1)?,
                "StartCharMetrics" => return Ok(()),
                _ => {}
            }
        }
        warn!("AFM: missing StartCharMetrics");
        Err(ParseError::MissingValue)
    }

    fn parse_char_metrics<'a>(
        &mut self,
        lines: &mut impl Iterator<Item = &'a str>,
    ) -> Result<(), ParseError> {
        for line in lines {
            match line.split_whitespace().next() {
                None => continue,
                Some("EndCharMetrics") => return Ok(()),
                Some(_) => {}
            }

            let mut metric = CharMetric::default();
            for entry in line.split(';') {
                let tokens = entry.split_whitespace().collect::<Vec<_>>();
                match tokens.first().copied() {
                    Some("C") => {
                        let code: i32 = number(&tokens, 1)?;
                        metric.code = u8::try_from(code).ok();
                    }
                    Some("CH") => {
                        let hex = token(&tokens, 1)?.trim_matches(|c| c == '<' || c == '>');
                        metric.code = u8::from_str_radix(hex, 16).ok();
                    }
                    Some("WX") | Some("W0X") => metric.width = number(&tokens, 1)?,
                    Some("N") => metric.name = token(&tokens, 1)?.to_string(),
                    Some("B") => {
                        for i in 0..4 {
                            metric.bbox[i] = number(&tokens, i + 1)?;
                        }
                    }
                    Some("L") => {
                        let successor = token(&tokens, 1)?.to_string();
                        let ligature = token(&tokens, 2)?.to_string();
                        metric.ligatures.push((successor, ligature));
                    }
                    _ => {}
                }
            }

            if let Some(code) = metric.code {
                self.code_to_name.insert(code, metric.name.clone());
            }
            match self.names.get(&metric.name) {
                Some(&index) => self.char_metrics[index] = metric,
                None => {
                    self.names.insert(metric.name.clone(), self.char_metrics.len());
                    self.char_metrics.push(metric);
                }
            }
        }
        warn!("AFM: missing EndCharMetrics");
        Err(ParseError::MissingValue)
    }

    fn parse_kern_pairs<'a>(&mut self, lines: &mut impl Iterator<Item = &'a str>) -> Result<(), ParseError> {
        let mut in_kern_pairs = false;
        for line in lines {
            let tokens = line.split_whitespace().collect::<Vec<_>>();
            match tokens.first().copied() {
                Some("EndFontMetrics") if !in_kern_pairs => return Ok(()),
                Some("StartKernPairs") | Some("StartKernPairs0") => in_kern_pairs = true,
                Some("KPX") if in_kern_pairs => {
                    let first = token(&tokens, 1)?.to_string();
                    let second = token(&tokens, 2)?.to_string();
                    let distance = number(&tokens, 3)?;
                    self.kern_pairs.insert((first, second), distance);
                }
                Some("EndKernPairs") if in_kern_pairs => return Ok(()),
                _ => {}
            }
        }
        if in_kern_pairs {
            warn!("AFM: missing EndKernPairs");
            return Err(ParseError::MissingValue);
        }
        warn!("AFM: missing EndFontMetrics");
        Err(ParseError::MissingValue)
    }

    pub fn char_metric(&self, name: &str) -> Option<&CharMetric> {
        self.names.get(name).map(|&index| &self.char_metrics[index])
    }

    /// The glyph name for `code`.
    pub fn glyph_name(&self, code: u8) -> Option<&str> {
        self.code_to_name.get(&code).map(String::as_str)
    }

    pub fn width(&self, name: &str) -> Option<i32> {
        self.char_metric(name).map(|metric| metric.width)
    }

    pub fn kerning(&self, first: &str, second: &str) -> i32 {
        self.kern_pairs
            .get(&(first.to_string(), second.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// The ligature formed by `first` followed by `second`, if any.
    pub fn ligature(&self, first: &str, second: &str) -> Option<&str> {
        self.char_metric(first)?
            .ligatures
            .iter()
            .find(|(successor, _)| successor == second)
            .map(|(_, ligature)| ligature.as_str())
    }

    /// The kerning pairs expressed with the glyph indices of `font`. Pairs naming glyphs
    /// missing from the font are dropped.
    pub fn kern_pairs_for(&self, font: &Type1Font) -> FxHashMap<(u16, u16), i32> {
        self.kern_pairs
            .iter()
            .filter_map(|((first, second), &distance)| {
                Some(((font.glyph_index(first)?, font.glyph_index(second)?), distance))
            })
            .collect()
    }

    /// The names of the characters in the font, in PDF syntax, without `.notdef`.
    pub fn char_set(&self) -> String {
        self.char_metrics
            .iter()
            .filter(|metric| metric.name != NOTDEF)
            .map(|metric| format!("/{}", metric.name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AFM: &str = "StartFontMetrics 4.1
Comment Test font
FontName Test-Roman
FullName Test Roman
FamilyName Test
Weight Roman
ItalicAngle -12.5
IsFixedPitch false
FontBBox -168 -218 1000 898
UnderlinePosition -75
EncodingScheme AdobeStandardEncoding
CapHeight 662
XHeight 450
Ascender 683
Descender -217
StartCharMetrics 4
C 32 ; WX 250 ; N space ; B 0 0 0 0 ;
C 102 ; WX 333 ; N f ; B 20 0 383 683 ; L i fi ; L l fl ;
C 105 ; WX 278 ; N i ; B 16 0 253 683 ;
C -1 ; WX 556 ; N fi ; B 31 0 521 683 ;
EndCharMetrics
StartKernData
StartKernPairs 2
KPX f i -20
KPX space f 10
EndKernPairs
EndKernData
EndFontMetrics
";

    #[test]
    fn parse_header() {
        let font = AfmFont::parse(AFM.as_bytes()).unwrap();
        assert_eq!(font.font_name, "Test-Roman");
        assert_eq!(font.full_name, "Test Roman");
        assert_eq!(font.italic_angle, -12.5);
        assert_eq!(font.font_bbox, [-168., -218., 1000., 898.]);
        assert_eq!(font.underline_position, -75);
        assert_eq!(font.underline_thickness, 50);
        assert_eq!(font.x_height, 450);
        assert_eq!(font.encoding_scheme, "AdobeStandardEncoding");
    }

    #[test]
    fn parse_metrics_and_kerning() {
        let font = AfmFont::parse(AFM.as_bytes()).unwrap();
        assert_eq!(font.char_metrics.len(), 4);
        assert_eq!(font.glyph_name(102), Some("f"));
        assert_eq!(font.width("fi"), Some(556));
        assert_eq!(font.char_metric("fi").unwrap().code, None);
        assert_eq!(font.char_metric("i").unwrap().bbox, [16, 0, 253, 683]);
        assert_eq!(font.ligature("f", "l"), Some("fl"));
        assert_eq!(font.ligature("i", "f"), None);
        assert_eq!(font.kerning("f", "i"), -20);
        assert_eq!(font.kerning("i", "f"), 0);
        assert_eq!(font.char_set(), "/space/f/i/fi");
    }

    #[test]
    fn missing_sections() {
        assert_eq!(
            AfmFont::parse(b"StartFontMetrics 4.1\nFontName X\n"),
            Err(ParseError::MissingValue)
        );
        let unterminated = "StartCharMetrics 1\nC 32 ; WX 250 ; N space ;\n";
        assert!(AfmFont::parse(unterminated.as_bytes()).is_err());
    }

    #[test]
    fn no_kerning() {
        let afm = "StartCharMetrics 1\nC 32 ; WX 250 ; N space ;\nEndCharMetrics\nEndFontMetrics\n";
        let font = AfmFont::parse(afm.as_bytes()).unwrap();
        assert!(font.kern_pairs.is_empty());
    }
}
