//! The stacking-buff indicator.
//!
//! A handful of fixed pixels identify how many stacks of the tracked buff
//! are up. The fingerprints come from configuration; the generic status
//! checker does the rest.

use anyhow::{Context, Result, bail};

use detect::{Fingerprint, StatusCheckInfo};

use crate::config::StacksConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuffStacks {
	None,
	One,
	Two,
	Three,
	Four,
}

impl BuffStacks {
	/// Glyph shown on the overlay.
	pub fn indicator(self) -> &'static str {
		match self {
			Self::None => "-",
			Self::One => "1",
			Self::Two => "2",
			Self::Three => "3",
			Self::Four => "4",
		}
	}

	fn from_count(count: u8) -> Result<Self> {
		Ok(match count {
			0 => Self::None,
			1 => Self::One,
			2 => Self::Two,
			3 => Self::Three,
			4 => Self::Four,
			other => bail!("unsupported stack count {other}"),
		})
	}
}

/// Validate the configured fingerprints into checker input.
pub fn status_check_info(config: &StacksConfig) -> Result<StatusCheckInfo<BuffStacks>> {
	let mut fingerprints = Vec::with_capacity(config.candidates.len());

	for candidate in &config.candidates {
		let stacks = BuffStacks::from_count(candidate.stacks)
			.context("stacks fingerprint")?;
		let fingerprint =
			Fingerprint::from_lists(stacks, candidate.points.clone(), candidate.colors.clone())
				.with_context(|| format!("stacks fingerprint for {}", candidate.stacks))?;
		fingerprints.push(fingerprint);
	}

	Ok(StatusCheckInfo {
		name: "buff-stacks".to_string(),
		missing: BuffStacks::None,
		fingerprints,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::StacksFingerprint;
	use detect::Color;

	fn candidate(stacks: u8, points: Vec<(i32, i32)>, colors: Vec<Color>) -> StacksFingerprint {
		StacksFingerprint {
			stacks,
			points,
			colors,
		}
	}

	#[test]
	fn valid_candidates_convert_in_order() {
		let config = StacksConfig {
			miss_limit: 5,
			candidates: vec![
				candidate(1, vec![(10, 10)], vec![Color::new(57, 149, 45)]),
				candidate(2, vec![(10, 10)], vec![Color::new(175, 175, 175)]),
			],
		};

		let info = status_check_info(&config).unwrap();
		assert_eq!(info.missing, BuffStacks::None);
		assert_eq!(info.fingerprints.len(), 2);
		assert_eq!(info.fingerprints[0].value, BuffStacks::One);
		assert_eq!(info.fingerprints[1].value, BuffStacks::Two);
	}

	#[test]
	fn out_of_range_stack_counts_are_rejected() {
		let config = StacksConfig {
			miss_limit: 5,
			candidates: vec![candidate(9, vec![(0, 0)], vec![Color::BLACK])],
		};
		assert!(status_check_info(&config).is_err());
	}

	#[test]
	fn mismatched_fingerprint_lists_are_rejected() {
		let config = StacksConfig {
			miss_limit: 5,
			candidates: vec![candidate(1, vec![(0, 0), (1, 1)], vec![Color::BLACK])],
		};
		assert!(status_check_info(&config).is_err());
	}
}
