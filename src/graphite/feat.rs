//! Graphite `Feat` and `Sill` tables.
//!
//! `Feat` lists the features a Graphite font understands and the values each accepts.
//! `Sill` gives per-language default values for those features.

use crate::binary::read::{ReadBinary, ReadCtxt, ReadFrom};
use crate::binary::{I16Be, U16Be, U32Be};
use crate::error::ParseError;

/// Parsed `Feat` table. Features are sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatTable {
    pub features: Vec<FeatureDefn>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureDefn {
    pub id: u32,
    pub flags: u16,
    pub label: u16,
    pub settings: Vec<FeatureSetting>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FeatureSetting {
    pub value: i16,
    pub label: u16,
}

impl ReadFrom for FeatureSetting {
    type ReadType = (I16Be, U16Be);

    fn read_from((value, label): (i16, u16)) -> Self {
        FeatureSetting { value, label }
    }
}

impl ReadBinary for FeatTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_u32be()? >> 16;
        ctxt.check_version(version >= 1)?;
        let num_feat = ctxt.read_u16be()?;
        ctxt.skip(6)?;

        let mut features = Vec::with_capacity(usize::from(num_feat));
        for _ in 0..num_feat {
            let id = if version >= 2 {
                ctxt.read_u32be()?
            } else {
                u32::from(ctxt.read_u16be()?)
            };
            let num_settings = ctxt.read_u16be()?;
            if version >= 2 {
                ctxt.skip(2)?;
            }
            let offset = ctxt.read_u32be()?;
            let flags = ctxt.read_u16be()?;
            let label = ctxt.read_u16be()?;

            let settings = scope
                .offset(usize::try_from(offset)?)
                .ctxt()
                .read_array::<FeatureSetting>(usize::from(num_settings))?
                .to_vec();
            features.push(FeatureDefn {
                id,
                flags,
                label,
                settings,
            });
        }
        features.sort_by_key(|feature| feature.id);

        Ok(FeatTable { features })
    }
}

impl FeatTable {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn find(&self, id: u32) -> Option<(usize, &FeatureDefn)> {
        let index = self
            .features
            .binary_search_by_key(&id, |feature| feature.id)
            .ok()?;
        Some((index, &self.features[index]))
    }

    /// Feature values with the first setting of each feature selected.
    pub fn default_values(&self) -> Features {
        let values = self
            .features
            .iter()
            .map(|feature| feature.settings.first().map_or(0, |setting| setting.value))
            .collect();
        Features { values }
    }
}

/// A chosen value for every feature of a `Feat` table, in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Features {
    values: Vec<i16>,
}

impl Features {
    pub fn get(&self, index: usize) -> i16 {
        self.values.get(index).copied().unwrap_or(0)
    }

    /// Set the value of the feature at `index`. Returns false if there is no such feature.
    pub fn set(&mut self, index: usize, value: i16) -> bool {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Set the value of the feature with `id`, matching tags padded with either spaces
    /// or zeros.
    pub fn set_by_id(&mut self, feat: &FeatTable, id: u32, value: i16) -> bool {
        match find_loose(feat, id) {
            Some(index) => self.set(index, value),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn find_loose(feat: &FeatTable, id: u32) -> Option<usize> {
    feat.find(id).map(|(index, _)| index).or_else(|| {
        feat.features
            .iter()
            .position(|feature| zero_to_space(feature.id) == zero_to_space(id))
    })
}

/// Replace trailing zero bytes of a tag with spaces.
pub(crate) fn zero_to_space(tag: u32) -> u32 {
    let mut bytes = tag.to_be_bytes();
    for byte in bytes.iter_mut().rev() {
        if *byte != 0 {
            break;
        }
        *byte = b' ';
    }
    u32::from_be_bytes(bytes)
}

/// Parsed `Sill` table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SillTable {
    pub languages: Vec<LanguageSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSettings {
    pub language: u32,
    pub settings: Vec<LanguageSetting>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LanguageSetting {
    pub feature_id: u32,
    pub value: i16,
}

impl ReadFrom for LanguageSetting {
    type ReadType = (U32Be, I16Be, U16Be);

    fn read_from((feature_id, value, _pad): (u32, i16, u16)) -> Self {
        LanguageSetting { feature_id, value }
    }
}

impl ReadBinary for SillTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let _version = ctxt.read_u32be()?;
        let num_langs = ctxt.read_u16be()?;
        ctxt.skip(6)?;

        // the final entry only marks the end of the settings
        let mut languages = Vec::with_capacity(usize::from(num_langs));
        for _ in 0..num_langs {
            let language = ctxt.read_u32be()?;
            let num_settings = ctxt.read_u16be()?;
            let offset = ctxt.read_u16be()?;
            let settings = scope
                .offset(usize::from(offset))
                .ctxt()
                .read_array::<LanguageSetting>(usize::from(num_settings))?
                .to_vec();
            languages.push(LanguageSettings { language, settings });
        }

        Ok(SillTable { languages })
    }
}

impl SillTable {
    /// Feature values for `language`, starting from the defaults of `feat`. Unknown
    /// languages get the defaults.
    pub fn features_for_language(&self, feat: &FeatTable, language: u32) -> Features {
        let mut features = feat.default_values();
        if language == 0 {
            return features;
        }
        let language = zero_to_space(language);
        let found = self
            .languages
            .iter()
            .find(|lang| zero_to_space(lang.language) == language);
        if let Some(lang) = found {
            for setting in &lang.settings {
                features.set_by_id(feat, setting.feature_id, setting.value);
            }
        }
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::tag;

    fn feat_v2() -> Vec<u8> {
        let mut data = vec![
            0, 2, 0, 0, // version
            0, 2, // numFeat
            0, 0, 0, 0, 0, 0,
        ];
        // records, deliberately out of order
        data.extend_from_slice(&[b'W', b'X', b'Y', b'Z', 0, 1, 0, 0, 0, 0, 0, 44, 0, 0, 0, 3]);
        data.extend_from_slice(&[b'A', b'B', b'C', b'D', 0, 2, 0, 0, 0, 0, 0, 48, 0, 0, 0, 4]);
        // settings
        data.extend_from_slice(&[0, 5, 0, 7]);
        data.extend_from_slice(&[0, 0, 0, 10, 0, 1, 0, 11]);
        data
    }

    #[test]
    fn read_feat() {
        let feat = ReadScope::new(&feat_v2()).read::<FeatTable>().unwrap();
        assert_eq!(feat.len(), 2);
        assert_eq!(feat.features[0].id, tag!(b"ABCD"));
        assert_eq!(
            feat.features[0].settings,
            vec![
                FeatureSetting { value: 0, label: 10 },
                FeatureSetting { value: 1, label: 11 }
            ]
        );
        assert_eq!(feat.features[1].settings[0].value, 5);
        assert_eq!(feat.find(tag!(b"WXYZ")).map(|(i, _)| i), Some(1));
        assert!(feat.find(tag!(b"NONE")).is_none());

        let defaults = feat.default_values();
        assert_eq!(defaults.get(0), 0);
        assert_eq!(defaults.get(1), 5);
    }

    #[test]
    fn read_feat_v1() {
        let data = [
            0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, // header
            0, 9, 0, 1, 0, 0, 0, 24, 0x80, 0, 0, 1, // record
            0xFF, 0xFF, 0, 2, // setting
        ];
        let feat = ReadScope::new(&data).read::<FeatTable>().unwrap();
        assert_eq!(feat.features[0].id, 9);
        assert_eq!(feat.features[0].flags, 0x8000);
        assert_eq!(feat.features[0].settings[0].value, -1);
    }

    #[test]
    fn language_settings() {
        let feat = ReadScope::new(&feat_v2()).read::<FeatTable>().unwrap();
        let sill_data = [
            0, 1, 0, 0, // version
            0, 1, 0, 0, 0, 0, 0, 0, // numLangs, search fields
            b'f', b'r', 0, 0, 0, 1, 0, 28, // lang
            0, 0, 0, 0, 0, 0, 0, 36, // sentinel
            b'A', b'B', b'C', b'D', 0, 1, 0, 0, // setting
        ];
        let sill = ReadScope::new(&sill_data).read::<SillTable>().unwrap();
        assert_eq!(sill.languages.len(), 1);

        let fr = sill.features_for_language(&feat, tag!(b"fr  "));
        assert_eq!(fr.get(0), 1);
        let other = sill.features_for_language(&feat, tag!(b"de  "));
        assert_eq!(other.get(0), 0);
    }

    #[test]
    fn padding() {
        assert_eq!(zero_to_space(u32::from_be_bytes(*b"fr\0\0")), tag!(b"fr  "));
        assert_eq!(zero_to_space(tag!(b"abcd")), tag!(b"abcd"));
    }
}
