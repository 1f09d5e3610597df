#![allow(missing_docs)]

//! Bounds-checked reading of big-endian font data.
//!
//! `ReadScope` is a borrowed window onto some bytes, usually a table or a subtable.
//! `ReadCtxt` is a cursor over a scope. A read that fails leaves the cursor where it was.
//!
//! Decoding is described by three traits. `ReadBinary` is for values that need nothing
//! but the bytes, `ReadBinaryDep` for values that need outside arguments (a count, a
//! format, the scope offsets are relative to) and `ReadUnchecked` for fixed size records,
//! which can be read in bulk once the length has been checked.

use std::cmp::Ordering;
use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use crate::binary::{I16Be, I32Be, U16Be, U24Be, U32Be, U8};
use crate::error::ParseError;

/// Ran out of data.
#[derive(Debug, Copy, Clone)]
pub struct ReadEof {}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReadScope<'a> {
    data: &'a [u8],
}

#[derive(Clone)]
pub struct ReadCtxt<'a> {
    data: &'a [u8],
    pos: usize,
}

pub trait ReadBinary {
    type HostType<'a>: Sized;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError>;
}

pub trait ReadBinaryDep {
    type Args<'a>: Copy;
    type HostType<'a>: Sized;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        args: Self::Args<'a>,
    ) -> Result<Self::HostType<'a>, ParseError>;
}

/// A dependent read whose length is known from its arguments alone.
pub trait ReadFixedSizeDep: ReadBinaryDep {
    fn size(args: Self::Args<'_>) -> usize;
}

/// A record of exactly `SIZE` bytes.
pub trait ReadUnchecked {
    type HostType: Sized;

    const SIZE: usize;

    /// # Safety
    ///
    /// The caller must have checked that `SIZE` bytes are available.
    unsafe fn read_unchecked(ctxt: &mut ReadCtxt<'_>) -> Self::HostType;
}

/// A record assembled from a tuple of primitive fields.
pub trait ReadFrom {
    type ReadType: ReadUnchecked;
    fn read_from(value: <Self::ReadType as ReadUnchecked>::HostType) -> Self;
}

impl<T: ReadFrom> ReadUnchecked for T {
    type HostType = T;

    const SIZE: usize = T::ReadType::SIZE;

    unsafe fn read_unchecked(ctxt: &mut ReadCtxt<'_>) -> Self::HostType {
        T::read_from(T::ReadType::read_unchecked(ctxt))
    }
}

impl<T: ReadUnchecked> ReadBinary for T {
    type HostType<'a> = T::HostType;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        Ok(ctxt.read_record::<T>()?)
    }
}

impl<T: ReadBinary> ReadBinaryDep for T {
    type Args<'a> = ();
    type HostType<'a> = T::HostType<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (): Self::Args<'a>,
    ) -> Result<Self::HostType<'a>, ParseError> {
        T::read(ctxt)
    }
}

impl<T: ReadUnchecked> ReadFixedSizeDep for T {
    fn size((): ()) -> usize {
        T::SIZE
    }
}

/// Validation of indices read from font data against the collection they index.
pub trait CheckIndex {
    fn len_for_index(&self) -> usize;

    fn check_index(&self, index: usize) -> Result<(), ParseError> {
        if index < self.len_for_index() {
            Ok(())
        } else {
            Err(ParseError::BadIndex)
        }
    }
}

/// Records decoded on demand from a contiguous run of bytes.
pub struct ReadArray<'a, T: ReadFixedSizeDep> {
    data: &'a [u8],
    length: usize,
    stride: usize,
    args: T::Args<'a>,
}

impl<'a, T: ReadFixedSizeDep> Clone for ReadArray<'a, T> {
    fn clone(&self) -> Self {
        ReadArray {
            data: self.data,
            length: self.length,
            stride: self.stride,
            args: self.args,
        }
    }
}

pub struct ReadArrayIter<'a, T: ReadUnchecked> {
    array: ReadArray<'a, T>,
    index: usize,
}

impl<'a> ReadScope<'a> {
    pub fn new(data: &'a [u8]) -> ReadScope<'a> {
        ReadScope { data }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The scope from `offset` to the end. Offsets past the end give an empty scope.
    pub fn offset(&self, offset: usize) -> ReadScope<'a> {
        ReadScope::new(self.data.get(offset..).unwrap_or_default())
    }

    /// The `length` bytes at `offset`.
    ///
    /// An empty range is allowed anywhere, including past the end.
    pub fn offset_length(&self, offset: usize, length: usize) -> Result<ReadScope<'a>, ParseError> {
        if length == 0 {
            return Ok(ReadScope::new(&[]));
        }
        if offset >= self.data.len() {
            return Err(ParseError::BadOffset);
        }
        offset
            .checked_add(length)
            .and_then(|end| self.data.get(offset..end))
            .map(ReadScope::new)
            .ok_or(ParseError::BadEof)
    }

    pub fn ctxt(&self) -> ReadCtxt<'a> {
        ReadCtxt {
            data: self.data,
            pos: 0,
        }
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&self) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read::<T>()
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read_dep::<T>(args)
    }

    pub fn read_at<T: ReadBinaryDep<Args<'a> = ()>>(
        &self,
        offset: usize,
    ) -> Result<T::HostType<'a>, ParseError> {
        let mut ctxt = self.ctxt();
        ctxt.seek(offset)?;
        ctxt.read::<T>()
    }
}

impl<'a> ReadCtxt<'a> {
    fn fail_unless(cond: bool, err: ParseError) -> Result<(), ParseError> {
        if cond {
            Ok(())
        } else {
            Err(err)
        }
    }

    /// `BadValue` unless `cond` holds.
    pub fn check(&self, cond: bool) -> Result<(), ParseError> {
        Self::fail_unless(cond, ParseError::BadValue)
    }

    /// `BadIndex` unless `cond` holds.
    pub fn check_index(&self, cond: bool) -> Result<(), ParseError> {
        Self::fail_unless(cond, ParseError::BadIndex)
    }

    /// `BadVersion` unless `cond` holds.
    ///
    /// ```
    /// use fontshape::binary::read::ReadScope;
    /// use fontshape::error::ParseError;
    ///
    /// let mut ctxt = ReadScope::new(&[0, 2]).ctxt();
    /// let major_version = ctxt.read_u16be().expect("unable to read version");
    /// assert!(ctxt.check_version(major_version == 2).is_ok());
    /// assert_eq!(ctxt.check_version(major_version == 1), Err(ParseError::BadVersion));
    /// ```
    pub fn check_version(&self, cond: bool) -> Result<(), ParseError> {
        Self::fail_unless(cond, ParseError::BadVersion)
    }

    /// The unread part of the data.
    pub fn scope(&self) -> ReadScope<'a> {
        let data = self.data;
        ReadScope::new(&data[self.pos..])
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn seek(&mut self, pos: usize) -> Result<(), ReadEof> {
        if pos > self.data.len() {
            return Err(ReadEof {});
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, length: usize) -> Result<(), ReadEof> {
        self.read_slice(length).map(|_| ())
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&mut self) -> Result<T::HostType<'a>, ParseError> {
        self.read_dep::<T>(())
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &mut self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        let start = self.pos;
        T::read_dep(self, args).map_err(|err| {
            self.pos = start;
            err
        })
    }

    fn ensure(&self, length: usize) -> Result<(), ReadEof> {
        if length <= self.remaining() {
            Ok(())
        } else {
            Err(ReadEof {})
        }
    }

    /// # Safety
    ///
    /// `length` bytes must remain.
    unsafe fn take_unchecked(&mut self, length: usize) -> &'a [u8] {
        let data = self.data;
        let bytes = data.get_unchecked(self.pos..self.pos + length);
        self.pos += length;
        bytes
    }

    fn read_record<T: ReadUnchecked>(&mut self) -> Result<T::HostType, ReadEof> {
        self.ensure(T::SIZE)?;
        // SAFETY: `ensure` checked there are `SIZE` bytes left.
        Ok(unsafe { T::read_unchecked(self) })
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadEof> {
        self.read_record::<U8>()
    }

    pub fn read_u16be(&mut self) -> Result<u16, ReadEof> {
        self.read_record::<U16Be>()
    }

    pub fn read_i16be(&mut self) -> Result<i16, ReadEof> {
        self.read_record::<I16Be>()
    }

    pub fn read_u32be(&mut self) -> Result<u32, ReadEof> {
        self.read_record::<U32Be>()
    }

    /// An unsigned integer of `size` bytes, 1 to 4, as CFF offsets are stored.
    pub fn read_uint_sized(&mut self, size: u8) -> Result<u32, ParseError> {
        let value = match size {
            1 => u32::from(self.read_u8()?),
            2 => u32::from(self.read_u16be()?),
            3 => self.read_record::<U24Be>()?,
            4 => self.read_u32be()?,
            _ => return Err(ParseError::BadValue),
        };
        Ok(value)
    }

    fn read_strided<T: ReadFixedSizeDep>(
        &mut self,
        length: usize,
        stride: usize,
        args: T::Args<'a>,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        let byte_len = length.checked_mul(stride).ok_or(ParseError::BadValue)?;
        let data = self.read_slice(byte_len)?;
        Ok(ReadArray {
            data,
            length,
            stride,
            args,
        })
    }

    pub fn read_array<T: ReadUnchecked>(
        &mut self,
        length: usize,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        self.read_strided(length, T::SIZE, ())
    }

    /// An array whose records are `stride` bytes apart, for tables that allow records to
    /// grow in later versions.
    pub fn read_array_stride<T: ReadUnchecked>(
        &mut self,
        length: usize,
        stride: usize,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        if stride < T::SIZE {
            return Err(ParseError::BadValue);
        }
        self.read_strided(length, stride, ())
    }

    /// Like `read_array` but truncated to the records actually present, for fonts that
    /// overstate their counts.
    pub fn read_array_upto_hack<T: ReadUnchecked>(
        &mut self,
        length: usize,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        let available = self.remaining() / T::SIZE.max(1);
        self.read_array(length.min(available))
    }

    pub fn read_array_dep<T: ReadFixedSizeDep>(
        &mut self,
        length: usize,
        args: T::Args<'a>,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        self.read_strided(length, T::size(args), args)
    }

    pub fn read_scope(&mut self, length: usize) -> Result<ReadScope<'a>, ReadEof> {
        self.read_slice(length).map(ReadScope::new)
    }

    pub fn read_slice(&mut self, length: usize) -> Result<&'a [u8], ReadEof> {
        self.ensure(length)?;
        // SAFETY: checked by `ensure`.
        Ok(unsafe { self.take_unchecked(length) })
    }
}

impl<'a, T: ReadFixedSizeDep> ReadArray<'a, T> {
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn record_scope(&self, index: usize, size: usize) -> Option<ReadScope<'a>> {
        if index >= self.length {
            return None;
        }
        let start = index * self.stride;
        self.data.get(start..start + size).map(ReadScope::new)
    }

    pub fn read_item(&self, index: usize) -> Result<T::HostType<'a>, ParseError> {
        let scope = self
            .record_scope(index, T::size(self.args))
            .ok_or(ParseError::BadIndex)?;
        T::read_dep(&mut scope.ctxt(), self.args)
    }

    pub fn read_to_vec(&self) -> Result<Vec<T::HostType<'a>>, ParseError> {
        (0..self.length).map(|index| self.read_item(index)).collect()
    }
}

impl<'a, T: ReadUnchecked> ReadArray<'a, T> {
    pub fn get_item(&self, index: usize) -> Option<T::HostType> {
        let scope = self.record_scope(index, T::SIZE)?;
        // SAFETY: `record_scope` returned exactly `SIZE` bytes.
        Some(unsafe { T::read_unchecked(&mut scope.ctxt()) })
    }

    pub fn last(&self) -> Option<T::HostType> {
        self.get_item(self.length.checked_sub(1)?)
    }

    pub fn to_vec(&self) -> Vec<T::HostType> {
        self.iter().collect()
    }

    pub fn iter(&self) -> ReadArrayIter<'a, T> {
        ReadArrayIter {
            array: self.clone(),
            index: 0,
        }
    }

    /// Binary search over records sorted consistently with `f`.
    ///
    /// Same contract as `slice::binary_search_by`.
    pub fn binary_search_by<F>(&self, mut f: F) -> Result<usize, usize>
    where
        F: FnMut(T::HostType) -> Ordering,
    {
        let (mut low, mut high) = (0, self.length);
        while low < high {
            let mid = low + (high - low) / 2;
            match self.get_item(mid).map(&mut f) {
                Some(Ordering::Less) => low = mid + 1,
                Some(Ordering::Greater) => high = mid,
                Some(Ordering::Equal) => return Ok(mid),
                None => break,
            }
        }
        Err(low)
    }
}

impl<'a, T: ReadFixedSizeDep> CheckIndex for ReadArray<'a, T> {
    fn len_for_index(&self) -> usize {
        self.length
    }
}

impl<T> CheckIndex for Vec<T> {
    fn len_for_index(&self) -> usize {
        self.len()
    }
}

impl<'a, 'b, T: ReadUnchecked> IntoIterator for &'b ReadArray<'a, T> {
    type Item = T::HostType;
    type IntoIter = ReadArrayIter<'a, T>;

    fn into_iter(self) -> ReadArrayIter<'a, T> {
        self.iter()
    }
}

impl<'a, T: ReadUnchecked> Iterator for ReadArrayIter<'a, T> {
    type Item = T::HostType;

    fn next(&mut self) -> Option<T::HostType> {
        let item = self.array.get_item(self.index)?;
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.array.len().saturating_sub(self.index);
        (left, Some(left))
    }
}

impl<'a, T: ReadUnchecked> ExactSizeIterator for ReadArrayIter<'a, T> {}

impl<'a, T> fmt::Debug for ReadArray<'a, T>
where
    T: ReadFixedSizeDep,
    T::HostType<'a>: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items = self.read_to_vec().map_err(|_| fmt::Error)?;
        f.debug_list().entries(items).finish()
    }
}

macro_rules! big_endian_primitive {
    ($marker:ty => $host:ty, $size:expr, $decode:expr) => {
        impl ReadUnchecked for $marker {
            type HostType = $host;

            const SIZE: usize = $size;

            unsafe fn read_unchecked(ctxt: &mut ReadCtxt<'_>) -> $host {
                let decode = $decode;
                decode(ctxt.take_unchecked($size))
            }
        }
    };
}

big_endian_primitive!(U8 => u8, 1, |bytes: &[u8]| bytes[0]);
big_endian_primitive!(U16Be => u16, 2, BigEndian::read_u16);
big_endian_primitive!(I16Be => i16, 2, BigEndian::read_i16);
big_endian_primitive!(U24Be => u32, 3, BigEndian::read_u24);
big_endian_primitive!(U32Be => u32, 4, BigEndian::read_u32);
big_endian_primitive!(I32Be => i32, 4, BigEndian::read_i32);

macro_rules! tuple_record {
    ($($field:ident),+) => {
        impl<$($field: ReadUnchecked),+> ReadUnchecked for ($($field,)+) {
            type HostType = ($($field::HostType,)+);

            const SIZE: usize = 0 $(+ $field::SIZE)+;

            unsafe fn read_unchecked(ctxt: &mut ReadCtxt<'_>) -> Self::HostType {
                ($($field::read_unchecked(ctxt),)+)
            }
        }
    };
}

tuple_record!(A, B);
tuple_record!(A, B, C);
tuple_record!(A, B, C, D);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_three_byte_integers() {
        let mut ctxt = ReadScope::new(&[1, 2, 3]).ctxt();
        assert_eq!(ctxt.read_uint_sized(3).unwrap(), 0x10203);
        assert!(ctxt.read_uint_sized(5).is_err());
    }

    #[test]
    fn empty_range_past_the_end_is_allowed() {
        let scope = ReadScope::new(&[1, 2, 3]);
        assert!(scope.offset_length(99, 0).is_ok());
        assert_eq!(scope.offset_length(99, 1), Err(ParseError::BadOffset));
        assert_eq!(scope.offset_length(2, 2), Err(ParseError::BadEof));
    }

    #[test]
    fn short_read_does_not_advance() {
        let mut ctxt = ReadScope::new(&[1, 2, 3]).ctxt();
        assert_eq!(ctxt.read_u16be().unwrap(), 0x0102);
        assert!(ctxt.read_u32be().is_err());
        assert_eq!(ctxt.position(), 2);
        assert_eq!(ctxt.read_u8().unwrap(), 3);
        assert_eq!(ctxt.remaining(), 0);
    }

    #[test]
    fn failed_tuple_read_restores_cursor() {
        let mut ctxt = ReadScope::new(&[0, 1, 0]).ctxt();
        assert!(ctxt.read::<(U16Be, U16Be)>().is_err());
        assert_eq!(ctxt.position(), 0);
        assert_eq!(ctxt.read::<(U8, I16Be)>().unwrap(), (0, 256));
    }

    #[test]
    fn seek_and_read_at() {
        let scope = ReadScope::new(&[0, 0, 0, 7, 0, 9]);
        assert_eq!(scope.read_at::<U16Be>(4).unwrap(), 9);
        let mut ctxt = scope.ctxt();
        ctxt.seek(2).unwrap();
        assert_eq!(ctxt.read_u16be().unwrap(), 7);
        assert!(ctxt.seek(7).is_err());
    }

    #[test]
    fn arrays_iterate_and_search() {
        let scope = ReadScope::new(&[0, 1, 0, 5, 0, 9]);
        let array = scope.ctxt().read_array::<U16Be>(3).unwrap();
        assert_eq!(array.to_vec(), vec![1, 5, 9]);
        assert_eq!(array.binary_search_by(|x| x.cmp(&5)), Ok(1));
        assert_eq!(array.binary_search_by(|x| x.cmp(&6)), Err(2));
        assert_eq!(array.last(), Some(9));
        assert!(array.check_index(3).is_err());
    }

    #[test]
    fn strided_arrays_skip_trailing_bytes() {
        let scope = ReadScope::new(&[0, 1, 0xFF, 0, 2, 0xFF]);
        let array = scope.ctxt().read_array_stride::<U16Be>(2, 3).unwrap();
        assert_eq!(array.to_vec(), vec![1, 2]);
        let truncated = scope.ctxt().read_array_upto_hack::<U32Be>(10).unwrap();
        assert_eq!(truncated.len(), 1);
    }
}
