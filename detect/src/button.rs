//! Per-ability mode/state machine.
//!
//! Each tracked ability samples one configured pixel on every poll tick,
//! classifies it against a small reference palette, and keeps a visible
//! indicator (and, in autocast mode, a simulated key press) in sync with
//! what the game is showing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::{
	Color, DEFAULT_TOLERANCE, Dispatch, KeyCode, Keyboard, Screen, Subscription, TickSource,
	exact_match, tolerant_match,
};

/// Reference palette for the skill-slot pixel.
///
/// Availability is pure white and matched exactly; the cooldown and active
/// shades drift with lighting and post-processing, so those get the tolerant
/// band. The bands are far enough apart that a pixel can satisfy at most one.
pub const SKILL_AVAILABLE: Color = Color::new(255, 255, 255);
pub const SKILL_COOLDOWN: Color = Color::new(17, 17, 21);
pub const SKILL_ACTIVE: Color = Color::new(64, 59, 52);

/// How long a simulated press holds the key down.
pub const DEFAULT_KEY_HOLD: Duration = Duration::from_millis(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonMode {
	Disabled,
	Manual,
	AutoCast,
}

impl ButtonMode {
	/// Next mode along the fixed Disabled → Manual → AutoCast cycle.
	pub fn next(self) -> Self {
		match self {
			Self::Disabled => Self::Manual,
			Self::Manual => Self::AutoCast,
			Self::AutoCast => Self::Disabled,
		}
	}
}

/// Inferred ability state. Meaningful while the mode is Manual or AutoCast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
	Ready,
	Cooldown,
	Active,
}

/// Immutable per-ability descriptor. Built once from configuration.
#[derive(Debug, Clone)]
pub struct ButtonConfig {
	pub label: String,
	pub action_key: KeyCode,
	pub mode_key: KeyCode,
	pub detect_x: i32,
	pub detect_y: i32,
	pub initial_mode: ButtonMode,
	pub key_hold: Duration,
}

impl ButtonConfig {
	/// Parse a config entry's key names into a validated descriptor.
	///
	/// An unknown key name is a configuration defect and fails here, before
	/// any timer starts.
	pub fn parse(
		label: impl Into<String>,
		action_key: &str,
		mode_key: &str,
		detect_x: i32,
		detect_y: i32,
		initial_mode: ButtonMode,
	) -> Result<Self> {
		let label = label.into();
		Ok(Self {
			action_key: action_key
				.parse()
				.with_context(|| format!("button {label}: bad action key"))?,
			mode_key: mode_key
				.parse()
				.with_context(|| format!("button {label}: bad mode key"))?,
			label,
			detect_x,
			detect_y,
			initial_mode,
			key_hold: DEFAULT_KEY_HOLD,
		})
	}
}

pub type StateChangedFn = Box<dyn Fn(&str, ButtonState) + Send>;
pub type ModeChangedFn = Box<dyn Fn(&str, ButtonMode) + Send>;

/// Callbacks for the presentation layer. Invoked on the dispatch context.
pub struct ButtonEvents {
	pub state_changed: StateChangedFn,
	pub mode_changed: ModeChangedFn,
}

/// A tracked ability button, subscribed to the shared poll timer.
pub struct AbilityButton {
	inner: Arc<Mutex<Inner>>,
	dispatch: Arc<dyn Dispatch>,
	label: String,
	mode_key: KeyCode,
	subscription: Subscription,
}

struct Inner {
	config: ButtonConfig,
	screen: Arc<dyn Screen>,
	keyboard: Arc<dyn Keyboard>,
	events: ButtonEvents,

	mode: ButtonMode,
	state: ButtonState,
	/// Set once the action key has been injected for the current
	/// availability window; cleared when the ability goes on cooldown.
	autocast_fired: bool,
}

impl AbilityButton {
	pub fn new(
		screen: Arc<dyn Screen>,
		keyboard: Arc<dyn Keyboard>,
		dispatch: Arc<dyn Dispatch>,
		ticks: &dyn TickSource,
		config: ButtonConfig,
		events: ButtonEvents,
	) -> Self {
		let label = config.label.clone();
		let mode_key = config.mode_key;
		let mode = config.initial_mode;

		tracing::debug!(button = %label, ?mode, action_key = %config.action_key, "tracking button");

		let inner = Arc::new(Mutex::new(Inner {
			config,
			screen,
			keyboard,
			events,
			mode,
			state: ButtonState::Ready,
			autocast_fired: false,
		}));

		// Paint the starting picture before the first tick arrives.
		{
			let inner = Arc::clone(&inner);
			dispatch.post(Box::new(move || {
				let inner = inner.lock().expect("button lock poisoned");
				inner.emit_mode();
				inner.emit_state();
			}));
		}

		let weak = Arc::downgrade(&inner);
		let subscription = ticks.subscribe(Box::new(move || {
			if let Some(inner) = weak.upgrade() {
				inner.lock().expect("button lock poisoned").on_tick();
			}
		}));

		Self {
			inner,
			dispatch,
			label,
			mode_key,
			subscription,
		}
	}

	pub fn label(&self) -> &str {
		&self.label
	}

	/// The key that cycles this button's mode.
	pub fn mode_key(&self) -> KeyCode {
		self.mode_key
	}

	/// Advance the mode cycle. Callable from any thread; the actual
	/// transition runs on the dispatch context.
	pub fn change_mode(&self) {
		let inner = Arc::clone(&self.inner);
		self.dispatch.post(Box::new(move || {
			inner.lock().expect("button lock poisoned").change_mode();
		}));
	}

	/// Detach from the poll timer. Idempotent; a tick already queued behind
	/// this call finds the subscription gone and does nothing.
	pub fn dispose(&mut self) {
		self.subscription.cancel();
	}
}

impl Inner {
	fn change_mode(&mut self) {
		let mode = self.mode.next();
		tracing::debug!(button = %self.config.label, ?mode, "mode changed");
		self.mode = mode;
		self.emit_mode();

		// Entering a live mode starts over from a clean slate. Disabled
		// keeps the last state around; ticks just stop acting on it.
		if matches!(mode, ButtonMode::Manual | ButtonMode::AutoCast) {
			self.autocast_fired = false;
			self.set_state(ButtonState::Ready);
		}
	}

	fn on_tick(&mut self) {
		if self.mode == ButtonMode::Disabled {
			return;
		}

		let pixel = self.screen.pixel(self.config.detect_x, self.config.detect_y);
		let state = classify(pixel);

		if self.mode == ButtonMode::AutoCast {
			match state {
				ButtonState::Ready if !self.autocast_fired => {
					tracing::debug!(button = %self.config.label, key = %self.config.action_key, "autocasting");
					self.keyboard.press_key(self.config.action_key, self.config.key_hold);
					self.autocast_fired = true;
				}
				// Cooldown re-arms the latch: one press per availability
				// window, however fast the timer polls.
				ButtonState::Cooldown => self.autocast_fired = false,
				_ => {}
			}
		}

		self.set_state(state);
	}

	fn set_state(&mut self, state: ButtonState) {
		if self.state == state {
			return;
		}
		tracing::debug!(button = %self.config.label, ?state, "state changed");
		self.state = state;
		self.emit_state();
	}

	fn emit_state(&self) {
		(self.events.state_changed)(&self.config.label, self.state);
	}

	fn emit_mode(&self) {
		(self.events.mode_changed)(&self.config.label, self.mode);
	}
}

/// Classify one sampled pixel against the reference palette.
fn classify(pixel: Color) -> ButtonState {
	if exact_match(pixel, SKILL_AVAILABLE) {
		ButtonState::Ready
	} else if tolerant_match(pixel, SKILL_ACTIVE, DEFAULT_TOLERANCE) {
		ButtonState::Active
	} else {
		// Tolerant cooldown match, or no match at all. A slot that is
		// neither clearly available nor clearly active is assumed unusable.
		ButtonState::Cooldown
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Task, TickFn};
	use std::sync::atomic::{AtomicU64, Ordering};

	struct DirectDispatch;

	impl Dispatch for DirectDispatch {
		fn post(&self, task: Task) {
			task();
		}

		fn run(&self, task: Task) {
			task();
		}
	}

	struct FakeScreen {
		pixel: Mutex<Color>,
	}

	impl FakeScreen {
		fn new(pixel: Color) -> Arc<Self> {
			Arc::new(Self {
				pixel: Mutex::new(pixel),
			})
		}

		fn set(&self, pixel: Color) {
			*self.pixel.lock().unwrap() = pixel;
		}
	}

	impl Screen for FakeScreen {
		fn pixel(&self, _x: i32, _y: i32) -> Color {
			*self.pixel.lock().unwrap()
		}
	}

	#[derive(Default)]
	struct FakeKeyboard {
		presses: Mutex<Vec<KeyCode>>,
	}

	impl FakeKeyboard {
		fn press_count(&self) -> usize {
			self.presses.lock().unwrap().len()
		}
	}

	impl Keyboard for FakeKeyboard {
		fn press_key(&self, key: KeyCode, _hold: Duration) {
			self.presses.lock().unwrap().push(key);
		}
	}

	/// Hand-fired tick source.
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

		fn subscriber_count(&self) -> usize {
			self.subs.lock().unwrap().len()
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

	struct Fixture {
		button: AbilityButton,
		screen: Arc<FakeScreen>,
		keyboard: Arc<FakeKeyboard>,
		ticker: ManualTicker,
		states: Arc<Mutex<Vec<ButtonState>>>,
		modes: Arc<Mutex<Vec<ButtonMode>>>,
	}

	impl Fixture {
		fn new(initial_mode: ButtonMode) -> Self {
			let screen = FakeScreen::new(SKILL_AVAILABLE);
			let keyboard = Arc::new(FakeKeyboard::default());
			let ticker = ManualTicker::default();

			let states = Arc::new(Mutex::new(Vec::new()));
			let modes = Arc::new(Mutex::new(Vec::new()));

			let config = ButtonConfig::parse("Q", "VK_Q", "F5", 100, 200, initial_mode).unwrap();

			let state_log = Arc::clone(&states);
			let mode_log = Arc::clone(&modes);
			let events = ButtonEvents {
				state_changed: Box::new(move |label, state| {
					assert_eq!(label, "Q");
					state_log.lock().unwrap().push(state);
				}),
				mode_changed: Box::new(move |label, mode| {
					assert_eq!(label, "Q");
					mode_log.lock().unwrap().push(mode);
				}),
			};

			let button = AbilityButton::new(
				Arc::clone(&screen) as Arc<dyn Screen>,
				Arc::clone(&keyboard) as Arc<dyn Keyboard>,
				Arc::new(DirectDispatch),
				&ticker,
				config,
				events,
			);

			Self {
				button,
				screen,
				keyboard,
				ticker,
				states,
				modes,
			}
		}

		fn states(&self) -> Vec<ButtonState> {
			self.states.lock().unwrap().clone()
		}

		fn modes(&self) -> Vec<ButtonMode> {
			self.modes.lock().unwrap().clone()
		}
	}

	#[test]
	fn construction_emits_the_initial_mode_and_state() {
		let fx = Fixture::new(ButtonMode::Manual);

		assert_eq!(fx.modes(), vec![ButtonMode::Manual]);
		assert_eq!(fx.states(), vec![ButtonState::Ready]);
	}

	#[test]
	fn cooldown_pixel_puts_the_button_on_cooldown() {
		let fx = Fixture::new(ButtonMode::Manual);

		fx.screen.set(SKILL_COOLDOWN);
		fx.ticker.tick();
		assert_eq!(fx.states().last(), Some(&ButtonState::Cooldown));
	}

	#[test]
	fn near_cooldown_pixel_matches_within_the_tolerance_band() {
		let fx = Fixture::new(ButtonMode::Manual);

		fx.screen.set(Color::new(19, 19, 23));
		fx.ticker.tick();
		assert_eq!(fx.states().last(), Some(&ButtonState::Cooldown));
	}

	#[test]
	fn available_pixel_brings_the_button_back_up() {
		let fx = Fixture::new(ButtonMode::Manual);

		fx.screen.set(SKILL_COOLDOWN);
		fx.ticker.tick();
		fx.screen.set(SKILL_AVAILABLE);
		fx.ticker.tick();

		assert_eq!(
			fx.states(),
			vec![ButtonState::Ready, ButtonState::Cooldown, ButtonState::Ready]
		);
	}

	#[test]
	fn active_pixel_marks_the_skill_active() {
		let fx = Fixture::new(ButtonMode::Manual);

		fx.screen.set(Color::new(65, 60, 53));
		fx.ticker.tick();
		assert_eq!(fx.states().last(), Some(&ButtonState::Active));
	}

	#[test]
	fn unknown_pixel_is_assumed_to_be_on_cooldown() {
		let fx = Fixture::new(ButtonMode::Manual);

		fx.screen.set(Color::new(250, 10, 10));
		fx.ticker.tick();
		assert_eq!(fx.states().last(), Some(&ButtonState::Cooldown));
	}

	#[test]
	fn unchanged_classification_emits_no_repeat_events() {
		let fx = Fixture::new(ButtonMode::Manual);

		fx.screen.set(SKILL_COOLDOWN);
		for _ in 0..5 {
			fx.ticker.tick();
		}

		// One transition, not five.
		assert_eq!(fx.states(), vec![ButtonState::Ready, ButtonState::Cooldown]);
	}

	#[test]
	fn mode_changes_follow_the_fixed_cycle() {
		let fx = Fixture::new(ButtonMode::Manual);

		fx.button.change_mode();
		fx.button.change_mode();
		fx.button.change_mode();

		assert_eq!(
			fx.modes(),
			vec![
				ButtonMode::Manual,
				ButtonMode::AutoCast,
				ButtonMode::Disabled,
				ButtonMode::Manual,
			]
		);
	}

	#[test]
	fn the_mode_cycle_is_closed() {
		for mode in [ButtonMode::Disabled, ButtonMode::Manual, ButtonMode::AutoCast] {
			assert_eq!(mode.next().next().next(), mode);
		}
	}

	#[test]
	fn disabled_buttons_ignore_ticks() {
		let fx = Fixture::new(ButtonMode::Disabled);

		fx.screen.set(SKILL_COOLDOWN);
		fx.ticker.tick();
		fx.screen.set(Color::new(65, 60, 53));
		fx.ticker.tick();

		assert_eq!(fx.states(), vec![ButtonState::Ready]);
		assert_eq!(fx.keyboard.press_count(), 0);
	}

	#[test]
	fn autocast_presses_the_action_key_when_available() {
		let fx = Fixture::new(ButtonMode::AutoCast);

		fx.screen.set(SKILL_AVAILABLE);
		fx.ticker.tick();

		assert_eq!(*fx.keyboard.presses.lock().unwrap(), vec![KeyCode::Q]);
	}

	#[test]
	fn autocast_presses_once_per_availability_window() {
		let fx = Fixture::new(ButtonMode::AutoCast);

		fx.screen.set(SKILL_AVAILABLE);
		for _ in 0..5 {
			fx.ticker.tick();
		}
		assert_eq!(fx.keyboard.press_count(), 1);

		fx.screen.set(SKILL_COOLDOWN);
		fx.ticker.tick();
		assert_eq!(fx.keyboard.press_count(), 1);

		fx.screen.set(SKILL_AVAILABLE);
		fx.ticker.tick();
		assert_eq!(fx.keyboard.press_count(), 2);
	}

	#[test]
	fn manual_mode_never_injects_keys() {
		let fx = Fixture::new(ButtonMode::Manual);

		fx.screen.set(SKILL_AVAILABLE);
		for _ in 0..3 {
			fx.ticker.tick();
		}
		assert_eq!(fx.keyboard.press_count(), 0);
	}

	#[test]
	fn entering_a_live_mode_resets_to_ready_and_rearms_autocast() {
		let fx = Fixture::new(ButtonMode::AutoCast);

		fx.screen.set(SKILL_AVAILABLE);
		fx.ticker.tick();
		assert_eq!(fx.keyboard.press_count(), 1);

		// AutoCast -> Disabled -> Manual -> AutoCast: the latch was cleared,
		// so the standing availability window fires again.
		fx.button.change_mode();
		fx.button.change_mode();
		fx.button.change_mode();
		fx.ticker.tick();
		assert_eq!(fx.keyboard.press_count(), 2);
	}

	#[test]
	fn dispose_detaches_from_the_ticker() {
		let mut fx = Fixture::new(ButtonMode::Manual);
		assert_eq!(fx.ticker.subscriber_count(), 1);

		fx.button.dispose();
		assert_eq!(fx.ticker.subscriber_count(), 0);

		fx.screen.set(SKILL_COOLDOWN);
		fx.ticker.tick();
		assert_eq!(fx.states(), vec![ButtonState::Ready]);

		// Disposing twice is a no-op.
		fx.button.dispose();
	}

	#[test]
	fn bad_key_names_fail_at_construction() {
		assert!(ButtonConfig::parse("Q", "NOT_A_KEY", "F5", 0, 0, ButtonMode::Manual).is_err());
		assert!(ButtonConfig::parse("Q", "VK_Q", "F99", 0, 0, ButtonMode::Manual).is_err());
	}
}
