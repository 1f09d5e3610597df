//! Tables pertaining to variable fonts.

pub mod avar;
pub mod fvar;
