//! Pixel-driven ability state detection.
//!
//! The engine samples fixed screen coordinates on a shared poll timer,
//! classifies the sampled colors, and drives per-ability state machines and
//! generic fingerprint checkers. It owns no OS resources itself: screen
//! access, key injection, and thread marshalling come in through the
//! capability traits below, so the whole engine runs against fakes in tests.

mod color;
pub use color::*;
mod keycode;
pub use keycode::*;
mod poll;
pub use poll::*;

pub mod button;
pub use button::{AbilityButton, ButtonConfig, ButtonEvents, ButtonMode, ButtonState};
pub mod status;
pub use status::{Fingerprint, StatusCheckInfo, StatusChecker};

use std::time::Duration;

/// A unit of work marshalled onto the single logical processing thread.
pub type Task = Box<dyn FnOnce() + Send>;

/// Reads the color of one absolute screen pixel.
pub trait Screen: Send + Sync {
	fn pixel(&self, x: i32, y: i32) -> Color;
}

/// Simulates a physical key press: down, hold, up.
pub trait Keyboard: Send + Sync {
	fn press_key(&self, key: KeyCode, hold: Duration);
}

/// Marshals work onto the single logical processing thread.
///
/// All tick handlers and event callbacks run through here, so the engine
/// behaves as single-threaded cooperative code: no two state machines ever
/// mutate concurrently, and no locks are needed beyond each instance's own.
pub trait Dispatch: Send + Sync {
	/// Queue `task` and return immediately. Submissions run in FIFO order.
	fn post(&self, task: Task);

	/// Run `task` on the processing thread, blocking the caller until done.
	fn run(&self, task: Task);
}
