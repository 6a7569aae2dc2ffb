//! Global keyboard listener.
//!
//! Runs `rdev::listen` on its own thread and routes the handful of keys the
//! overlay reacts to: per-button mode keys, Pause to toggle polling by hand,
//! ScrollLock to quit.

use std::sync::mpsc::Sender;

use detect::{KeyCode, PollerControl};

use crate::keys;

pub enum HookEvent {
	ModeKey(KeyCode),
	Quit,
}

pub fn spawn(
	tx: Sender<HookEvent>,
	ctx: egui::Context,
	control: PollerControl,
	mode_keys: Vec<KeyCode>,
) {
	let _listener = std::thread::Builder::new()
		.name("keyhook".to_string())
		.spawn(move || {
			let result = rdev::listen(move |event| {
				let rdev::EventType::KeyPress(key) = event.event_type else {
					return;
				};
				let Some(key) = keys::from_rdev(key) else {
					return;
				};

				match key {
					KeyCode::Pause => {
						if control.is_running() {
							tracing::debug!("polling manually switched off");
							control.stop();
						} else {
							tracing::debug!("polling manually switched on");
							control.start();
						}
					}
					KeyCode::ScrollLock => {
						control.stop();
						let _ = tx.send(HookEvent::Quit);
						ctx.request_repaint();
					}
					key if mode_keys.contains(&key) => {
						let _ = tx.send(HookEvent::ModeKey(key));
						ctx.request_repaint();
					}
					_ => {}
				}
			});

			// listen() only returns on failure (missing permissions, no
			// display server). The overlay stays usable minus hotkeys.
			if let Err(err) = result {
				tracing::error!(?err, "keyboard listener failed");
			}
		})
		.expect("spawn keyboard listener thread");
}
