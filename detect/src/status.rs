//! Generic multi-point status detection.
//!
//! A status checker watches a small set of fixed screen points and maps
//! their colors to a discrete value: buff stacks, charge counts, anything a
//! fingerprint of a few pixels can identify. Matching is exact on purpose;
//! fingerprints often distinguish near-identical grayscale shades, and the
//! tolerant band would blur them together.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use anyhow::{Result, ensure};

use crate::{Color, Screen, Subscription, TickSource, exact_match};

/// Consecutive fully-missed ticks tolerated before the checker falls back to
/// the missing value. Keeps single noisy frames from flickering the
/// externally visible status.
pub const DEFAULT_MISS_LIMIT: u32 = 5;

pub type Point = (i32, i32);

/// One candidate: a set of (point, expected color) pairs that together
/// identify `value`.
#[derive(Debug, Clone)]
pub struct Fingerprint<T> {
	pub value: T,
	pub tests: Vec<(Point, Color)>,
}

impl<T> Fingerprint<T> {
	pub fn new(value: T, tests: Vec<(Point, Color)>) -> Self {
		Self { value, tests }
	}

	/// Build from the parallel point/color lists configuration files use.
	/// Mismatched lengths are a configuration defect and fail here.
	pub fn from_lists(value: T, points: Vec<Point>, colors: Vec<Color>) -> Result<Self> {
		ensure!(
			points.len() == colors.len(),
			"fingerprint has {} points but {} colors",
			points.len(),
			colors.len()
		);
		Ok(Self {
			value,
			tests: points.into_iter().zip(colors).collect(),
		})
	}
}

/// An ordered candidate list plus the value reported when nothing matches.
#[derive(Debug, Clone)]
pub struct StatusCheckInfo<T> {
	pub name: String,
	pub missing: T,
	/// Tested top to bottom; the first full match wins.
	pub fingerprints: Vec<Fingerprint<T>>,
}

/// Callback for status transitions: checker name plus the new value.
/// Invoked on the dispatch context.
pub type StatusChangedFn<T> = Box<dyn Fn(&str, T) + Send>;

/// Edge-triggered classifier driven by the shared poll timer.
pub struct StatusChecker<T> {
	inner: Arc<Mutex<Inner<T>>>,
	subscription: Subscription,
}

struct Inner<T> {
	screen: Arc<dyn Screen>,
	info: StatusCheckInfo<T>,
	on_changed: StatusChangedFn<T>,

	value: T,
	miss_limit: u32,
	miss_count: u32,
}

impl<T> StatusChecker<T>
where
	T: Copy + PartialEq + Debug + Send + 'static,
{
	pub fn new(
		screen: Arc<dyn Screen>,
		ticks: &dyn TickSource,
		info: StatusCheckInfo<T>,
		on_changed: StatusChangedFn<T>,
	) -> Self {
		Self::with_miss_limit(screen, ticks, info, DEFAULT_MISS_LIMIT, on_changed)
	}

	pub fn with_miss_limit(
		screen: Arc<dyn Screen>,
		ticks: &dyn TickSource,
		info: StatusCheckInfo<T>,
		miss_limit: u32,
		on_changed: StatusChangedFn<T>,
	) -> Self {
		let inner = Arc::new(Mutex::new(Inner {
			value: info.missing,
			screen,
			info,
			on_changed,
			miss_limit,
			miss_count: 0,
		}));

		let weak = Arc::downgrade(&inner);
		let subscription = ticks.subscribe(Box::new(move || {
			if let Some(inner) = weak.upgrade() {
				inner.lock().expect("status checker lock poisoned").on_tick();
			}
		}));

		Self { inner, subscription }
	}

	/// Last classified value.
	pub fn value(&self) -> T {
		self.inner.lock().expect("status checker lock poisoned").value
	}

	/// Detach from the poll timer. Idempotent.
	pub fn dispose(&mut self) {
		self.subscription.cancel();
	}
}

impl<T> Inner<T>
where
	T: Copy + PartialEq + Debug,
{
	fn on_tick(&mut self) {
		for fingerprint in &self.info.fingerprints {
			let matched = fingerprint
				.tests
				.iter()
				.all(|&((x, y), color)| exact_match(self.screen.pixel(x, y), color));

			if matched {
				self.miss_count = 0;
				if self.value != fingerprint.value {
					tracing::debug!(
						check = %self.info.name,
						from = ?self.value,
						to = ?fingerprint.value,
						"status matched"
					);
					self.value = fingerprint.value;
					(self.on_changed)(&self.info.name, self.value);
				}
				return;
			}
		}

		self.miss_count += 1;
		if self.miss_count > self.miss_limit {
			tracing::debug!(
				check = %self.info.name,
				misses = self.miss_count,
				missing = ?self.info.missing,
				"falling back to missing value"
			);
			self.miss_count = 0;
			if self.value != self.info.missing {
				self.value = self.info.missing;
				(self.on_changed)(&self.info.name, self.value);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::TickFn;
	use std::collections::HashMap;
	use std::sync::atomic::{AtomicU64, Ordering};

	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	enum Stacks {
		None,
		One,
		Two,
	}

	/// Screen fake with per-point colors; unset points read black.
	#[derive(Default)]
	struct FakeScreen {
		pixels: Mutex<HashMap<Point, Color>>,
	}

	impl FakeScreen {
		fn set(&self, point: Point, color: Color) {
			self.pixels.lock().unwrap().insert(point, color);
		}
	}

	impl Screen for FakeScreen {
		fn pixel(&self, x: i32, y: i32) -> Color {
			self.pixels
				.lock()
				.unwrap()
				.get(&(x, y))
				.copied()
				.unwrap_or(Color::BLACK)
		}
	}

	#[derive(Default)]
	struct ManualTicker {
		subs: Arc<Mutex<Vec<(u64, TickFn)>>>,
		next_id: AtomicU64,
	}

	impl ManualTicker {
		fn tick(&self) {
			for (_, on_tick) in self.subs.lock().unwrap().iter_mut() {
				on_tick();
			}
		}
	}

	impl TickSource for ManualTicker {
		fn subscribe(&self, on_tick: TickFn) -> Subscription {
			let id = self.next_id.fetch_add(1, Ordering::Relaxed);
			self.subs.lock().unwrap().push((id, on_tick));

			let subs = Arc::clone(&self.subs);
			Subscription::new(move || {
				subs.lock().unwrap().retain(|(sub_id, _)| *sub_id != id);
			})
		}
	}

	const P1: Point = (10, 10);
	const P2: Point = (20, 10);

	fn two_candidates() -> StatusCheckInfo<Stacks> {
		StatusCheckInfo {
			name: "stacks".to_string(),
			missing: Stacks::None,
			fingerprints: vec![
				Fingerprint::new(Stacks::One, vec![(P1, Color::new(255, 0, 0))]),
				Fingerprint::new(Stacks::Two, vec![(P1, Color::new(0, 255, 0))]),
			],
		}
	}

	fn checker(
		screen: &Arc<FakeScreen>,
		ticker: &ManualTicker,
		info: StatusCheckInfo<Stacks>,
		miss_limit: u32,
	) -> (StatusChecker<Stacks>, Arc<Mutex<Vec<Stacks>>>) {
		let emitted = Arc::new(Mutex::new(Vec::new()));
		let log = Arc::clone(&emitted);
		let checker = StatusChecker::with_miss_limit(
			Arc::clone(screen) as Arc<dyn Screen>,
			ticker,
			info,
			miss_limit,
			Box::new(move |name, value| {
				assert_eq!(name, "stacks");
				log.lock().unwrap().push(value);
			}),
		);
		(checker, emitted)
	}

	#[test]
	fn first_fully_matching_candidate_wins() {
		let screen = Arc::new(FakeScreen::default());
		let ticker = ManualTicker::default();
		let (checker, emitted) = checker(&screen, &ticker, two_candidates(), 5);

		// Candidate One is evaluated first and fails; Two matches.
		screen.set(P1, Color::new(0, 255, 0));
		ticker.tick();

		assert_eq!(*emitted.lock().unwrap(), vec![Stacks::Two]);
		assert_eq!(checker.value(), Stacks::Two);
	}

	#[test]
	fn every_point_of_a_fingerprint_must_match() {
		let screen = Arc::new(FakeScreen::default());
		let ticker = ManualTicker::default();
		let info = StatusCheckInfo {
			name: "stacks".to_string(),
			missing: Stacks::None,
			fingerprints: vec![Fingerprint::new(
				Stacks::One,
				vec![(P1, Color::new(255, 0, 0)), (P2, Color::new(0, 0, 255))],
			)],
		};
		let (_checker, emitted) = checker(&screen, &ticker, info, 5);

		// Only one of the two points shows the expected color.
		screen.set(P1, Color::new(255, 0, 0));
		ticker.tick();
		assert!(emitted.lock().unwrap().is_empty());

		screen.set(P2, Color::new(0, 0, 255));
		ticker.tick();
		assert_eq!(*emitted.lock().unwrap(), vec![Stacks::One]);
	}

	#[test]
	fn near_matches_do_not_count() {
		let screen = Arc::new(FakeScreen::default());
		let ticker = ManualTicker::default();
		let (_checker, emitted) = checker(&screen, &ticker, two_candidates(), 5);

		// One channel off by one: exact matching must reject it.
		screen.set(P1, Color::new(254, 0, 0));
		ticker.tick();
		assert!(emitted.lock().unwrap().is_empty());
	}

	#[test]
	fn repeated_matches_emit_once() {
		let screen = Arc::new(FakeScreen::default());
		let ticker = ManualTicker::default();
		let (_checker, emitted) = checker(&screen, &ticker, two_candidates(), 5);

		screen.set(P1, Color::new(255, 0, 0));
		for _ in 0..4 {
			ticker.tick();
		}

		assert_eq!(*emitted.lock().unwrap(), vec![Stacks::One]);
	}

	#[test]
	fn misses_fall_back_to_missing_only_past_the_limit() {
		let screen = Arc::new(FakeScreen::default());
		let ticker = ManualTicker::default();
		let (checker, emitted) = checker(&screen, &ticker, two_candidates(), 5);

		// Establish a real value first so the fallback is observable.
		screen.set(P1, Color::new(255, 0, 0));
		ticker.tick();
		assert_eq!(*emitted.lock().unwrap(), vec![Stacks::One]);

		// Nothing matches from here on.
		screen.set(P1, Color::new(9, 9, 9));
		for _ in 0..5 {
			ticker.tick();
		}
		// Five misses: still holding the last value.
		assert_eq!(*emitted.lock().unwrap(), vec![Stacks::One]);
		assert_eq!(checker.value(), Stacks::One);

		// The sixth miss crosses the limit.
		ticker.tick();
		assert_eq!(*emitted.lock().unwrap(), vec![Stacks::One, Stacks::None]);
		assert_eq!(checker.value(), Stacks::None);

		// Staying missed emits nothing further.
		for _ in 0..12 {
			ticker.tick();
		}
		assert_eq!(*emitted.lock().unwrap(), vec![Stacks::One, Stacks::None]);
	}

	#[test]
	fn a_match_resets_the_miss_counter() {
		let screen = Arc::new(FakeScreen::default());
		let ticker = ManualTicker::default();
		let (_checker, emitted) = checker(&screen, &ticker, two_candidates(), 5);

		screen.set(P1, Color::new(255, 0, 0));
		ticker.tick();

		// Four misses, then a match, then four misses again: the counter
		// restarts at the match, so the limit is never crossed.
		screen.set(P1, Color::new(9, 9, 9));
		for _ in 0..4 {
			ticker.tick();
		}
		screen.set(P1, Color::new(255, 0, 0));
		ticker.tick();
		screen.set(P1, Color::new(9, 9, 9));
		for _ in 0..4 {
			ticker.tick();
		}

		assert_eq!(*emitted.lock().unwrap(), vec![Stacks::One]);
	}

	#[test]
	fn dispose_detaches_from_the_ticker() {
		let screen = Arc::new(FakeScreen::default());
		let ticker = ManualTicker::default();
		let (mut checker, emitted) = checker(&screen, &ticker, two_candidates(), 5);

		checker.dispose();
		screen.set(P1, Color::new(255, 0, 0));
		ticker.tick();

		assert!(emitted.lock().unwrap().is_empty());
		checker.dispose();
	}

	#[test]
	fn mismatched_point_and_color_lists_are_rejected() {
		let result = Fingerprint::from_lists(
			Stacks::One,
			vec![P1, P2],
			vec![Color::new(255, 0, 0)],
		);
		assert!(result.is_err());
	}
}
