//! Color primitives and matching.

use serde::{Deserialize, Serialize};

/// Per-channel tolerance that absorbs rendering noise (anti-aliasing,
/// compression, lighting) when matching UI pixels.
pub const DEFAULT_TOLERANCE: u8 = 5;

/// An RGB triple. Compared by value only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
	pub r: u8,
	pub g: u8,
	pub b: u8,
}

impl Color {
	pub const WHITE: Self = Self::new(255, 255, 255);
	pub const BLACK: Self = Self::new(0, 0, 0);

	#[inline]
	pub const fn new(r: u8, g: u8, b: u8) -> Self {
		Self { r, g, b }
	}
}

/// Bitwise channel equality.
#[inline]
pub fn exact_match(sample: Color, target: Color) -> bool {
	sample == target
}

/// Every channel strictly within ±`tolerance` of the target.
///
/// The band is open: a channel off by exactly `tolerance` does not match.
pub fn tolerant_match(sample: Color, target: Color, tolerance: u8) -> bool {
	let near = |a: u8, b: u8| (a as i16 - b as i16).abs() < tolerance as i16;
	near(sample.r, target.r) && near(sample.g, target.g) && near(sample.b, target.b)
}
