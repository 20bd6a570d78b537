//! JavaScript bindings for the 2D tessellator.

pub mod d2;
pub mod utils;
