//! Key injection and key-event mapping.
//!
//! Injection runs on its own thread: enigo's handle is not shareable across
//! threads on every platform, and the hold delay must not stall the tick
//! fan-out.

use std::sync::mpsc::{self, Sender};
use std::time::Duration;

use enigo::{Direction, Enigo, Keyboard as _, Settings};

use detect::KeyCode;

pub struct KeyInjector {
	tx: Sender<(KeyCode, Duration)>,
}

impl KeyInjector {
	pub fn new() -> Self {
		let (tx, rx) = mpsc::channel::<(KeyCode, Duration)>();

		let _worker = std::thread::Builder::new()
			.name("keyinject".to_string())
			.spawn(move || {
				let mut enigo = match Enigo::new(&Settings::default()) {
					Ok(enigo) => enigo,
					Err(err) => {
						tracing::error!(error = %err, "input simulation unavailable");
						return;
					}
				};

				for (key, hold) in rx {
					let Some(target) = to_enigo(key) else {
						tracing::warn!(%key, "key is not injectable");
						continue;
					};

					// Down, hold, up: some games poll key state and miss
					// zero-length presses.
					if let Err(err) = enigo.key(target, Direction::Press) {
						tracing::warn!(%key, error = %err, "key press failed");
						continue;
					}
					std::thread::sleep(hold);
					if let Err(err) = enigo.key(target, Direction::Release) {
						tracing::warn!(%key, error = %err, "key release failed");
					}
				}
			})
			.expect("spawn key injection thread");

		Self { tx }
	}
}

impl detect::Keyboard for KeyInjector {
	fn press_key(&self, key: KeyCode, hold: Duration) {
		if self.tx.send((key, hold)).is_err() {
			tracing::warn!(%key, "key injection thread gone");
		}
	}
}

fn to_enigo(key: KeyCode) -> Option<enigo::Key> {
	use enigo::Key as E;

	Some(match key {
		KeyCode::A => E::Unicode('a'),
		KeyCode::B => E::Unicode('b'),
		KeyCode::C => E::Unicode('c'),
		KeyCode::D => E::Unicode('d'),
		KeyCode::E => E::Unicode('e'),
		KeyCode::F => E::Unicode('f'),
		KeyCode::G => E::Unicode('g'),
		KeyCode::H => E::Unicode('h'),
		KeyCode::I => E::Unicode('i'),
		KeyCode::J => E::Unicode('j'),
		KeyCode::K => E::Unicode('k'),
		KeyCode::L => E::Unicode('l'),
		KeyCode::M => E::Unicode('m'),
		KeyCode::N => E::Unicode('n'),
		KeyCode::O => E::Unicode('o'),
		KeyCode::P => E::Unicode('p'),
		KeyCode::Q => E::Unicode('q'),
		KeyCode::R => E::Unicode('r'),
		KeyCode::S => E::Unicode('s'),
		KeyCode::T => E::Unicode('t'),
		KeyCode::U => E::Unicode('u'),
		KeyCode::V => E::Unicode('v'),
		KeyCode::W => E::Unicode('w'),
		KeyCode::X => E::Unicode('x'),
		KeyCode::Y => E::Unicode('y'),
		KeyCode::Z => E::Unicode('z'),
		KeyCode::Num0 => E::Unicode('0'),
		KeyCode::Num1 => E::Unicode('1'),
		KeyCode::Num2 => E::Unicode('2'),
		KeyCode::Num3 => E::Unicode('3'),
		KeyCode::Num4 => E::Unicode('4'),
		KeyCode::Num5 => E::Unicode('5'),
		KeyCode::Num6 => E::Unicode('6'),
		KeyCode::Num7 => E::Unicode('7'),
		KeyCode::Num8 => E::Unicode('8'),
		KeyCode::Num9 => E::Unicode('9'),
		KeyCode::F1 => E::F1,
		KeyCode::F2 => E::F2,
		KeyCode::F3 => E::F3,
		KeyCode::F4 => E::F4,
		KeyCode::F5 => E::F5,
		KeyCode::F6 => E::F6,
		KeyCode::F7 => E::F7,
		KeyCode::F8 => E::F8,
		KeyCode::F9 => E::F9,
		KeyCode::F10 => E::F10,
		KeyCode::F11 => E::F11,
		KeyCode::F12 => E::F12,
		KeyCode::Space => E::Space,
		KeyCode::Escape => E::Escape,
		// Listener-side keys; nothing sensible to inject.
		KeyCode::Pause | KeyCode::ScrollLock => return None,
	})
}

/// Map a listener event back to an engine key, if it is one we care about.
pub fn from_rdev(key: rdev::Key) -> Option<KeyCode> {
	use rdev::Key as R;

	Some(match key {
		R::KeyA => KeyCode::A,
		R::KeyB => KeyCode::B,
		R::KeyC => KeyCode::C,
		R::KeyD => KeyCode::D,
		R::KeyE => KeyCode::E,
		R::KeyF => KeyCode::F,
		R::KeyG => KeyCode::G,
		R::KeyH => KeyCode::H,
		R::KeyI => KeyCode::I,
		R::KeyJ => KeyCode::J,
		R::KeyK => KeyCode::K,
		R::KeyL => KeyCode::L,
		R::KeyM => KeyCode::M,
		R::KeyN => KeyCode::N,
		R::KeyO => KeyCode::O,
		R::KeyP => KeyCode::P,
		R::KeyQ => KeyCode::Q,
		R::KeyR => KeyCode::R,
		R::KeyS => KeyCode::S,
		R::KeyT => KeyCode::T,
		R::KeyU => KeyCode::U,
		R::KeyV => KeyCode::V,
		R::KeyW => KeyCode::W,
		R::KeyX => KeyCode::X,
		R::KeyY => KeyCode::Y,
		R::KeyZ => KeyCode::Z,
		R::Num0 => KeyCode::Num0,
		R::Num1 => KeyCode::Num1,
		R::Num2 => KeyCode::Num2,
		R::Num3 => KeyCode::Num3,
		R::Num4 => KeyCode::Num4,
		R::Num5 => KeyCode::Num5,
		R::Num6 => KeyCode::Num6,
		R::Num7 => KeyCode::Num7,
		R::Num8 => KeyCode::Num8,
		R::Num9 => KeyCode::Num9,
		R::F1 => KeyCode::F1,
		R::F2 => KeyCode::F2,
		R::F3 => KeyCode::F3,
		R::F4 => KeyCode::F4,
		R::F5 => KeyCode::F5,
		R::F6 => KeyCode::F6,
		R::F7 => KeyCode::F7,
		R::F8 => KeyCode::F8,
		R::F9 => KeyCode::F9,
		R::F10 => KeyCode::F10,
		R::F11 => KeyCode::F11,
		R::F12 => KeyCode::F12,
		R::Space => KeyCode::Space,
		R::Escape => KeyCode::Escape,
		R::Pause => KeyCode::Pause,
		R::ScrollLock => KeyCode::ScrollLock,
		_ => return None,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn every_action_key_maps_to_an_injectable_key() {
		for key in [KeyCode::Q, KeyCode::Num7, KeyCode::F12, KeyCode::Space] {
			assert!(to_enigo(key).is_some());
		}
	}

	#[test]
	fn listener_only_keys_are_not_injectable() {
		assert!(to_enigo(KeyCode::Pause).is_none());
		assert!(to_enigo(KeyCode::ScrollLock).is_none());
	}

	#[test]
	fn listener_events_map_back_to_engine_keys() {
		assert_eq!(from_rdev(rdev::Key::KeyQ), Some(KeyCode::Q));
		assert_eq!(from_rdev(rdev::Key::F5), Some(KeyCode::F5));
		assert_eq!(from_rdev(rdev::Key::Pause), Some(KeyCode::Pause));
		assert_eq!(from_rdev(rdev::Key::ShiftLeft), None);
	}
}
