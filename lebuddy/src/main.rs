//! lebuddy: a pixel-driven cooldown overlay.
//!
//! Watches fixed pixels of the game's skill bar, infers per-ability state,
//! and renders a small always-on-top indicator row. Abilities switched to
//! autocast get their action key pressed once per availability window.

mod app;
mod buff;
mod config;
mod dispatch;
mod hook;
mod keys;
mod screen;
mod watch;

use anyhow::{Context, Result};

fn main() -> Result<()> {
	// Structured logging. Use `RUST_LOG=debug` etc.
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.init();

	let config = config::Config::load_or_default();

	// First run: write the defaults out so there is a file to edit.
	match config::Config::path() {
		Ok(path) if !path.exists() => {
			if let Err(err) = config.save() {
				tracing::warn!(error = %err, "could not write default config");
			}
		}
		_ => {}
	}

	// Validate everything before any timer starts. A bad key name or a
	// malformed fingerprint is a configuration defect; refuse to run.
	let buttons = config.button_configs().context("button configuration")?;
	let stacks_info = config
		.stacks
		.as_ref()
		.map(buff::status_check_info)
		.transpose()
		.context("stacks configuration")?;

	tracing::info!(
		buttons = buttons.len(),
		stacks = stacks_info.is_some(),
		window = %config.game_window,
		"starting overlay"
	);

	let (width, height) = app::overlay_size(&config);
	let (pos_x, pos_y) = app::overlay_position(&config, width, height);

	let viewport = egui::ViewportBuilder::default()
		.with_title("lebuddy")
		.with_inner_size([width, height])
		.with_position([pos_x, pos_y])
		.with_decorations(false)
		.with_transparent(true)
		.with_always_on_top()
		.with_mouse_passthrough(true)
		.with_taskbar(false);

	let options = eframe::NativeOptions {
		viewport,
		..Default::default()
	};

	eframe::run_native(
		"lebuddy",
		options,
		Box::new(move |cc| Ok(Box::new(app::Overlay::new(cc, config, buttons, stacks_info)))),
	)
	.map_err(|err| anyhow::anyhow!("eframe: {err}"))
}
