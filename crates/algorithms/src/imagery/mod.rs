//! Imagery algorithms
//!
//! - Band math: pixel-wise functions of two co-registered bands
//! - Chlorophyll-a: blue/red band-ratio retrieval

mod band_math;
mod chlorophyll;

pub use band_math::band_math_pair;
pub use chlorophyll::{blue_red_chla, chla_pixel, CHLA_DECIMALS};
