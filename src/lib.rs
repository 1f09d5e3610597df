#![warn(rust_2018_idioms)]

//! Text shaping for OpenType, AAT and Graphite fonts, with parsers for the CFF, Type 1 and
//! AFM formats shaping depends on.
//!
//! ```no_run
//! use fontshape::{shape, Buffer, OpenTypeFace};
//!
//! # fn main() -> Result<(), fontshape::error::ParseError> {
//! let data = std::fs::read("font.ttf").unwrap();
//! let face = OpenTypeFace::new(&data)?;
//! let mut buffer = Buffer::new();
//! buffer.push_str("shaping");
//! shape(&face, &mut buffer, &[]);
//! println!("{}", buffer.serialize(true));
//! # Ok(())
//! # }
//! ```

/// Font metrics from Adobe Font Metrics files.
pub mod afm;
/// Reading of binary data.
pub mod binary;
pub mod buffer;
pub mod cff;
pub mod context;
pub mod digest;
pub mod error;
pub mod face;
mod fallback;
pub mod feature_map;
pub mod gpos;
pub mod graphite;
pub mod gsub;
pub mod kern;
pub mod layout;
pub mod morx;
mod normalize;
pub mod plan;
pub mod postscript;
pub mod scripts;
pub mod shape;
pub mod tables;
pub mod tag;
/// Shared test code.
#[cfg(test)]
pub mod tests;
pub mod type1;
pub mod unicode;
pub mod variations;

pub use crate::buffer::{
    Buffer, BufferFlags, ClusterLevel, Direction, GlyphInfo, GlyphPosition, SegmentProperties,
};
pub use crate::face::{FontFace, OpenTypeFace};
pub use crate::feature_map::Feature;
pub use crate::plan::ShapePlan;
pub use crate::shape::{shape, shape_with_plan};
