//! Game-window watcher.
//!
//! The overlay only polls while the game is actually up. Once a second this
//! thread looks for a window whose app name or title contains the configured
//! fragment; polling is started when one appears and stopped when it goes
//! away or is minimized. Acting on transitions (rather than re-asserting
//! every pass) keeps the manual Pause toggle usable in between.

use std::time::Duration;

use detect::PollerControl;

pub fn spawn(control: PollerControl, game_window: String) {
	let _watcher = std::thread::Builder::new()
		.name("gamewatch".to_string())
		.spawn(move || {
			let needle = game_window.to_lowercase();
			let mut was_present = false;

			loop {
				let present = game_present(&needle);
				if present && !was_present {
					tracing::debug!(window = %game_window, "game window found; polling resumed");
					control.start();
				} else if !present && was_present {
					tracing::debug!(window = %game_window, "game window gone; polling suspended");
					control.stop();
				}
				was_present = present;

				std::thread::sleep(Duration::from_secs(1));
			}
		})
		.expect("spawn game watcher thread");
}

fn game_present(needle: &str) -> bool {
	let Ok(windows) = xcap::Window::all() else {
		return false;
	};

	windows.iter().any(|window| {
		let named = window
			.app_name()
			.map(|name| name.to_lowercase().contains(needle))
			.unwrap_or(false)
			|| window
				.title()
				.map(|title| title.to_lowercase().contains(needle))
				.unwrap_or(false);

		named && !window.is_minimized().unwrap_or(false)
	})
}
