//! The overlay window.
//!
//! A small, borderless, click-through bar that renders one slot per tracked
//! button plus the optional stack counter. Engine events arrive over a
//! channel from the dispatch context; the UI drains it each frame.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use detect::{
	AbilityButton, ButtonConfig, ButtonEvents, ButtonMode, ButtonState, Dispatch, Keyboard,
	Poller, PollerControl, Screen, StatusCheckInfo, StatusChecker,
};

use crate::buff::BuffStacks;
use crate::config::{Config, OverlayConfig};
use crate::dispatch::WorkerDispatcher;
use crate::hook::{self, HookEvent};
use crate::keys::KeyInjector;
use crate::screen::MonitorScreen;
use crate::watch;

const BAR_PADDING: i8 = 8;
const BAR_PADDING_F32: f32 = BAR_PADDING as f32;
const SLOT_SPACING: f32 = 10.0;

const GOLDENROD: egui::Color32 = egui::Color32::from_rgb(184, 134, 11);

/// Messages from the engine to the UI thread.
enum UiEvent {
	ButtonState { label: String, state: ButtonState },
	ButtonMode { label: String, mode: ButtonMode },
	Stacks(BuffStacks),
}

struct Indicator {
	label: String,
	mode: ButtonMode,
	state: ButtonState,
}

pub struct Overlay {
	// Field order is teardown order: machines and the checker unsubscribe
	// first, then the poller joins its worker, then the dispatcher drains.
	machines: Vec<AbilityButton>,
	_checker: Option<StatusChecker<BuffStacks>>,
	_poller: Poller,

	control: PollerControl,
	ui_rx: Receiver<UiEvent>,
	hook_rx: Receiver<HookEvent>,

	indicators: Vec<Indicator>,
	stacks: Option<BuffStacks>,
	overlay_cfg: OverlayConfig,
}

impl Overlay {
	pub fn new(
		cc: &eframe::CreationContext<'_>,
		config: Config,
		buttons: Vec<ButtonConfig>,
		stacks_info: Option<StatusCheckInfo<BuffStacks>>,
	) -> Self {
		let (ui_tx, ui_rx) = mpsc::channel();
		let (hook_tx, hook_rx) = mpsc::channel();

		let dispatch: Arc<dyn Dispatch> = Arc::new(WorkerDispatcher::new());
		let screen: Arc<dyn Screen> = Arc::new(MonitorScreen::new());
		let keyboard: Arc<dyn Keyboard> = Arc::new(KeyInjector::new());

		let poller = Poller::with_timings(
			Arc::clone(&dispatch),
			Duration::from_millis(config.first_delay_ms),
			Duration::from_millis(config.interval_ms),
		);

		let mut machines = Vec::with_capacity(buttons.len());
		let mut indicators = Vec::with_capacity(buttons.len());
		for button in buttons {
			indicators.push(Indicator {
				label: button.label.clone(),
				mode: button.initial_mode,
				state: ButtonState::Ready,
			});

			let state_tx = ui_tx.clone();
			let state_ctx = cc.egui_ctx.clone();
			let mode_tx = ui_tx.clone();
			let mode_ctx = cc.egui_ctx.clone();
			let events = ButtonEvents {
				state_changed: Box::new(move |label, state| {
					let _ = state_tx.send(UiEvent::ButtonState {
						label: label.to_string(),
						state,
					});
					state_ctx.request_repaint();
				}),
				mode_changed: Box::new(move |label, mode| {
					let _ = mode_tx.send(UiEvent::ButtonMode {
						label: label.to_string(),
						mode,
					});
					mode_ctx.request_repaint();
				}),
			};

			machines.push(AbilityButton::new(
				Arc::clone(&screen),
				Arc::clone(&keyboard),
				Arc::clone(&dispatch),
				&poller,
				button,
				events,
			));
		}

		let stacks = stacks_info.is_some().then_some(BuffStacks::None);
		let miss_limit = config
			.stacks
			.as_ref()
			.map(|s| s.miss_limit)
			.unwrap_or(detect::status::DEFAULT_MISS_LIMIT);
		let checker = stacks_info.map(|info| {
			let tx = ui_tx.clone();
			let ctx = cc.egui_ctx.clone();
			StatusChecker::with_miss_limit(
				Arc::clone(&screen),
				&poller,
				info,
				miss_limit,
				Box::new(move |_name, value| {
					let _ = tx.send(UiEvent::Stacks(value));
					ctx.request_repaint();
				}),
			)
		});

		let control = poller.control();
		let mode_keys = machines.iter().map(AbilityButton::mode_key).collect();
		hook::spawn(hook_tx, cc.egui_ctx.clone(), control.clone(), mode_keys);
		watch::spawn(control.clone(), config.game_window.clone());

		Self {
			machines,
			_checker: checker,
			_poller: poller,
			control,
			ui_rx,
			hook_rx,
			indicators,
			stacks,
			overlay_cfg: config.overlay,
		}
	}

	fn drain_events(&mut self, ctx: &egui::Context) {
		while let Ok(event) = self.hook_rx.try_recv() {
			match event {
				HookEvent::ModeKey(key) => {
					if let Some(machine) = self.machines.iter().find(|m| m.mode_key() == key) {
						machine.change_mode();
					}
				}
				HookEvent::Quit => ctx.send_viewport_cmd(egui::ViewportCommand::Close),
			}
		}

		while let Ok(event) = self.ui_rx.try_recv() {
			match event {
				UiEvent::ButtonState { label, state } => {
					if let Some(indicator) = self.indicators.iter_mut().find(|i| i.label == label) {
						indicator.state = state;
					}
				}
				UiEvent::ButtonMode { label, mode } => {
					if let Some(indicator) = self.indicators.iter_mut().find(|i| i.label == label) {
						indicator.mode = mode;
					}
				}
				UiEvent::Stacks(value) => self.stacks = Some(value),
			}
		}
	}
}

impl eframe::App for Overlay {
	fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
		self.drain_events(ctx);

		let polling = self.control.is_running();

		egui::Area::new(egui::Id::new("overlay_root"))
			.fixed_pos(egui::pos2(0.0, 0.0))
			.show(ctx, |ui| {
				egui::Frame::default()
					.fill(egui::Color32::from_black_alpha(96))
					.corner_radius(egui::CornerRadius::same(6))
					.inner_margin(egui::Margin::same(BAR_PADDING))
					.show(ui, |ui| {
						ui.horizontal(|ui| {
							for indicator in &self.indicators {
								slot_ui(ui, indicator, self.overlay_cfg.button_font_size, polling);
							}
							if let Some(stacks) = self.stacks {
								stacks_ui(ui, stacks, self.overlay_cfg.indicator_font_size, polling);
							}
						});
					});
			});

		// The paused flag has no event of its own; refresh at a human cadence.
		ctx.request_repaint_after(Duration::from_millis(250));
	}

	fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
		egui::Rgba::TRANSPARENT.to_array()
	}
}

fn slot_ui(ui: &mut egui::Ui, indicator: &Indicator, font_size: f32, polling: bool) {
	let size = egui::vec2(font_size * 1.6, font_size * 1.6);

	// State changes visibility, mode changes colours; the two signals stay
	// strictly separate so either is readable on its own.
	let (fill, text) = match indicator.mode {
		ButtonMode::Disabled => (egui::Color32::TRANSPARENT, egui::Color32::TRANSPARENT),
		ButtonMode::Manual => (GOLDENROD, egui::Color32::BLACK),
		ButtonMode::AutoCast => (egui::Color32::TRANSPARENT, GOLDENROD),
	};

	let (fill, text) = if indicator.mode == ButtonMode::Disabled {
		(fill, text)
	} else {
		match indicator.state {
			ButtonState::Cooldown => (egui::Color32::TRANSPARENT, egui::Color32::TRANSPARENT),
			ButtonState::Active => (fill.gamma_multiply(0.3), text.gamma_multiply(0.3)),
			ButtonState::Ready => (fill, text),
		}
	};

	let (fill, text) = if polling {
		(fill, text)
	} else {
		(fill.gamma_multiply(0.25), text.gamma_multiply(0.25))
	};

	egui::Frame::default()
		.fill(fill)
		.corner_radius(egui::CornerRadius::same(4))
		.show(ui, |ui| {
			ui.add_sized(
				size,
				egui::Label::new(egui::RichText::new(&indicator.label).size(font_size).color(text)),
			);
		});
	ui.add_space(SLOT_SPACING);
}

fn stacks_ui(ui: &mut egui::Ui, stacks: BuffStacks, font_size: f32, polling: bool) {
	let color = if polling {
		egui::Color32::WHITE
	} else {
		egui::Color32::from_gray(100)
	};
	ui.label(
		egui::RichText::new(stacks.indicator())
			.size(font_size)
			.color(color)
			.strong(),
	);
}

/// Window size for the configured indicator row.
pub fn overlay_size(config: &Config) -> (f32, f32) {
	let slot = config.overlay.button_font_size * 1.6;
	let slots = config.buttons.len() as f32;
	let stacks_w = if config.stacks.is_some() {
		config.overlay.indicator_font_size * 1.6 + SLOT_SPACING
	} else {
		0.0
	};

	let width = BAR_PADDING_F32 * 2.0 + slots * (slot + SLOT_SPACING) + stacks_w + 16.0;
	let height = BAR_PADDING_F32 * 2.0 + slot + 8.0;
	(width, height)
}

/// Center-anchored window position from the configured screen ratios.
pub fn overlay_position(config: &Config, width: f32, height: f32) -> (f32, f32) {
	let (screen_w, screen_h) = primary_screen_size().unwrap_or((1920.0, 1080.0));
	(
		(screen_w * config.overlay.pos_x - width * 0.5).max(0.0),
		(screen_h * config.overlay.pos_y - height * 0.5).max(0.0),
	)
}

fn primary_screen_size() -> Option<(f32, f32)> {
	let monitors = xcap::Monitor::all().ok()?;
	let monitor = monitors
		.into_iter()
		.find(|m| m.is_primary().unwrap_or(false))?;
	Some((monitor.width().ok()? as f32, monitor.height().ok()? as f32))
}
