//! `avar` Axis Variations Table
//!
//! The axis variations table (`avar`) modifies the coordinate normalization used when
//! processing variation data for a particular variation instance.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/avar>

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadFrom};
use crate::error::ParseError;
use crate::tables::{F2Dot14, Fixed};

/// `avar` Axis Variations Table.
pub struct AvarTable<'a> {
    segment_maps: Vec<SegmentMap<'a>>,
}

/// Segment map record.
///
/// Contains an array of mappings from a normalised coordinate value to a modified value.
pub struct SegmentMap<'a> {
    axis_value_maps: ReadArray<'a, AxisValueMap>,
}

/// A mapping from a normalised coordinate value to a modified value.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AxisValueMap {
    /// A normalized coordinate value obtained using default normalization.
    pub from_coordinate: F2Dot14,
    /// The modified, normalized coordinate value.
    pub to_coordinate: F2Dot14,
}

impl<'a> AvarTable<'a> {
    pub fn segment_map(&self, axis_index: usize) -> Option<&SegmentMap<'a>> {
        self.segment_maps.get(axis_index)
    }
}

impl ReadBinary for AvarTable<'_> {
    type HostType<'a> = AvarTable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let major_version = ctxt.read_u16be()?;
        ctxt.check_version(major_version == 1)?;
        let _minor_version = ctxt.read_u16be()?;
        let _reserved = ctxt.read_u16be()?;
        let axis_count = ctxt.read_u16be()?;
        let segment_maps = (0..axis_count)
            .map(|_| ctxt.read::<SegmentMap<'_>>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(AvarTable { segment_maps })
    }
}

impl SegmentMap<'_> {
    /// Performs `avar` normalization to a value that has already been default normalised.
    ///
    /// `normalized_value` should be in the range [-1, +1].
    pub fn normalize(&self, normalized_value: Fixed) -> Fixed {
        let mut start_seg: Option<AxisValueMap> = None;
        for end_seg in self.axis_value_maps.iter() {
            let end_from = Fixed::from(end_seg.from_coordinate);
            if end_from == normalized_value {
                return Fixed::from(end_seg.to_coordinate);
            }
            if end_from > normalized_value {
                // The first record, for -1, cannot be the end of a segment.
                let start_seg = match start_seg {
                    Some(start_seg) => start_seg,
                    None => return normalized_value,
                };
                let start_from = Fixed::from(start_seg.from_coordinate);
                let start_to = Fixed::from(start_seg.to_coordinate);
                let ratio = (normalized_value - start_from) / (end_from - start_from);
                return start_to + ratio * (Fixed::from(end_seg.to_coordinate) - start_to);
            }
            start_seg = Some(end_seg);
        }
        normalized_value
    }
}

impl ReadBinary for SegmentMap<'_> {
    type HostType<'a> = SegmentMap<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let position_map_count = ctxt.read_u16be()?;
        let axis_value_maps = ctxt.read_array::<AxisValueMap>(usize::from(position_map_count))?;
        Ok(SegmentMap { axis_value_maps })
    }
}

impl ReadFrom for AxisValueMap {
    type ReadType = (F2Dot14, F2Dot14);

    fn read_from((from_coordinate, to_coordinate): (F2Dot14, F2Dot14)) -> Self {
        AxisValueMap {
            from_coordinate,
            to_coordinate,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::binary::read::ReadScope;

    /// An `avar` table with one axis mapping 0.5 to 0.25.
    pub(crate) fn avar_table() -> Vec<u8> {
        let mut data = vec![0, 1, 0, 0, 0, 0, 0, 1, 0, 4];
        for (from, to) in [(-0x4000i16, -0x4000i16), (0, 0), (0x2000, 0x1000), (0x4000, 0x4000)] {
            data.extend_from_slice(&from.to_be_bytes());
            data.extend_from_slice(&to.to_be_bytes());
        }
        data
    }

    #[test]
    fn piecewise_linear_mapping() {
        let data = avar_table();
        let avar = ReadScope::new(&data).read::<AvarTable<'_>>().unwrap();
        let map = avar.segment_map(0).unwrap();
        assert_eq!(map.normalize(Fixed::from(0.5)), Fixed::from(0.25));
        assert_eq!(map.normalize(Fixed::from(0.75)), Fixed::from(0.625));
        assert_eq!(map.normalize(Fixed::from(-0.5)), Fixed::from(-0.5));
        assert!(avar.segment_map(1).is_none());
    }
}
