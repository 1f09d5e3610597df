//! `fvar` Font Variations Table
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/fvar>

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadFrom};
use crate::binary::{U16Be, U32Be};
use crate::error::ParseError;
use crate::tables::variable_fonts::avar::AvarTable;
use crate::tables::{F2Dot14, Fixed};

/// `fvar` Font Variations Table.
///
/// Only the axes are retained, named instances are not needed for shaping.
pub struct FvarTable<'a> {
    axes: ReadArray<'a, VariationAxisRecord>,
}

/// A variation axis: its tag and user-space range.
#[derive(Eq, PartialEq, Debug, Copy, Clone)]
pub struct VariationAxisRecord {
    pub axis_tag: u32,
    pub min_value: Fixed,
    pub default_value: Fixed,
    pub max_value: Fixed,
    pub flags: u16,
    pub axis_name_id: u16,
}

impl<'a> FvarTable<'a> {
    pub fn axes(&self) -> impl Iterator<Item = VariationAxisRecord> + use<'_, 'a> {
        self.axes.iter()
    }

    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    /// Turn user-space coordinates into normalized coordinates.
    ///
    /// Coordinates are matched to axes by position. Missing coordinates take the axis default
    /// and surplus ones are ignored. When `avar` is present its segment maps are applied after
    /// default normalization.
    pub fn normalize(&self, user_coords: &[Fixed], avar: Option<&AvarTable<'_>>) -> Vec<F2Dot14> {
        self.axes()
            .enumerate()
            .map(|(i, axis)| {
                let user_value = user_coords.get(i).copied().unwrap_or(axis.default_value);
                let mut normalized_value = default_normalize(&axis, user_value);
                if let Some(segment_map) = avar.and_then(|avar| avar.segment_map(i)) {
                    normalized_value = segment_map
                        .normalize(normalized_value)
                        .clamp(Fixed::from(-1), Fixed::from(1));
                }
                F2Dot14::from(normalized_value)
            })
            .collect()
    }
}

fn default_normalize(axis: &VariationAxisRecord, coord: Fixed) -> Fixed {
    // Some fonts have min > default or max < default; clamp would panic on min > max.
    let min_value = axis.min_value.min(axis.default_value);
    let max_value = axis.max_value.max(axis.default_value);
    let coord = coord.clamp(min_value, max_value);

    let normalized_value = if coord < axis.default_value {
        -(axis.default_value - coord) / (axis.default_value - min_value)
    } else if coord > axis.default_value {
        (coord - axis.default_value) / (max_value - axis.default_value)
    } else {
        Fixed::from(0)
    };

    normalized_value.clamp(Fixed::from(-1), Fixed::from(1))
}

impl ReadBinary for FvarTable<'_> {
    type HostType<'a> = FvarTable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let major_version = ctxt.read_u16be()?;
        ctxt.check_version(major_version == 1)?;
        let _minor_version = ctxt.read_u16be()?;
        let axes_array_offset = ctxt.read_u16be()?;
        let _reserved = ctxt.read_u16be()?;
        let axis_count = ctxt.read_u16be()?;
        let axis_size = ctxt.read_u16be()?;
        let axes = scope
            .offset(usize::from(axes_array_offset))
            .ctxt()
            .read_array_stride(usize::from(axis_count), usize::from(axis_size))?;
        Ok(FvarTable { axes })
    }
}

impl ReadFrom for VariationAxisRecord {
    type ReadType = ((U32Be, Fixed, Fixed), (Fixed, U16Be, U16Be));

    fn read_from(
        ((axis_tag, min_value, default_value), (max_value, flags, axis_name_id)): (
            (u32, Fixed, Fixed),
            (Fixed, u16, u16),
        ),
    ) -> Self {
        VariationAxisRecord {
            axis_tag,
            min_value,
            default_value,
            max_value,
            flags,
            axis_name_id,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::tables::variable_fonts::avar::tests::avar_table;
    use crate::tag;

    /// An `fvar` table with a single `wght` axis: 100, 400, 900.
    pub(crate) fn fvar_table() -> Vec<u8> {
        let mut data = vec![0, 1, 0, 0, 0, 16, 0, 2, 0, 1, 0, 20, 0, 0, 0, 0];
        data.extend_from_slice(&tag!(b"wght").to_be_bytes());
        for value in [100i32, 400, 900] {
            data.extend_from_slice(&(value << 16).to_be_bytes());
        }
        data.extend_from_slice(&[0, 0, 1, 0]);
        data
    }

    #[test]
    fn test_default_normalization() {
        let axis = VariationAxisRecord {
            axis_tag: tag!(b"wght"),
            min_value: Fixed::from(100),
            default_value: Fixed::from(400),
            max_value: Fixed::from(900),
            flags: 0,
            axis_name_id: 0,
        };
        assert_eq!(default_normalize(&axis, Fixed::from(250)), Fixed::from(-0.5));
        assert_eq!(default_normalize(&axis, Fixed::from(1000)), Fixed::from(1));
        assert_eq!(default_normalize(&axis, Fixed::from(400)), Fixed::from(0));
    }

    #[test]
    fn normalize_with_avar() {
        let fvar_data = fvar_table();
        let fvar = ReadScope::new(&fvar_data).read::<FvarTable<'_>>().unwrap();
        assert_eq!(fvar.axis_count(), 1);
        assert_eq!(fvar.axes().next().unwrap().axis_tag, tag!(b"wght"));

        // 650 is halfway between default and max
        let coords = [Fixed::from(650)];
        assert_eq!(fvar.normalize(&coords, None), vec![F2Dot14::from(0.5)]);

        let avar_data = avar_table();
        let avar = ReadScope::new(&avar_data).read::<AvarTable<'_>>().unwrap();
        assert_eq!(fvar.normalize(&coords, Some(&avar)), vec![F2Dot14::from(0.25)]);
        assert_eq!(fvar.normalize(&[], Some(&avar)), vec![F2Dot14::from(0.0)]);
    }
}
