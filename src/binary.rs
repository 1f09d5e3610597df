//! Primitive encodings used in font files.
//!
//! The empty enums below are type-level names for on-disk integer formats. They are
//! never constructed, only passed to the readers in [`read`].

pub mod read;

/// Round `len` up to a multiple of four, the alignment of sfnt tables.
///
/// ```
/// use fontshape::binary::long_align;
///
/// assert_eq!(long_align(123), 124);
/// assert_eq!(long_align(124), 124);
/// ```
pub const fn long_align(len: usize) -> usize {
    (len + 3) & !3
}

/// 2.14 fixed point, as used for normalized variation coordinates.
pub fn f2dot14_to_f32(value: i16) -> f32 {
    f32::from(value) / f32::from(1u16 << 14)
}

/// 16.16 fixed point.
pub fn fixed_to_f32(value: i32) -> f32 {
    value as f32 / 65536.0
}

#[derive(Copy, Clone)]
pub enum U8 {}

#[derive(Copy, Clone)]
pub enum U16Be {}

#[derive(Copy, Clone)]
pub enum I16Be {}

/// Three byte unsigned integer, used for code points in format 14 cmaps.
#[derive(Copy, Clone)]
pub enum U24Be {}

#[derive(Copy, Clone)]
pub enum U32Be {}

#[derive(Copy, Clone)]
pub enum I32Be {}
