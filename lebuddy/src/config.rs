//! Persistent application configuration.
//!
//! Stored as JSON in a platform-appropriate config directory. Key names and
//! fingerprint definitions are validated once, at startup; a bad entry stops
//! the overlay before any timer starts.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use detect::{ButtonConfig, ButtonMode, Color};

/// On-disk configuration for the overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
	/// Substring of the game window's app name or title. Polling runs only
	/// while a matching, non-minimized window exists.
	pub game_window: String,

	/// Poll interval for the shared detection timer.
	pub interval_ms: u64,
	/// Delay before the first tick after polling starts.
	pub first_delay_ms: u64,
	/// How long a simulated key press holds the key down.
	pub key_hold_ms: u64,

	/// Tracked ability buttons. An ability absent from this list gets no
	/// state machine and no indicator.
	pub buttons: Vec<ButtonEntry>,

	/// Optional stacking-buff indicator.
	pub stacks: Option<StacksConfig>,

	pub overlay: OverlayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonEntry {
	pub label: String,
	pub action_key: String,
	pub mode_key: String,
	pub detect_x: i32,
	pub detect_y: i32,
	/// "disabled", "manual" or "autocast".
	#[serde(default = "default_start_mode")]
	pub start_mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StacksConfig {
	/// Candidates are tested top to bottom; the first full match wins.
	pub candidates: Vec<StacksFingerprint>,
	#[serde(default = "default_miss_limit")]
	pub miss_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StacksFingerprint {
	pub stacks: u8,
	/// Index-aligned with `colors`; checked at startup.
	pub points: Vec<(i32, i32)>,
	pub colors: Vec<Color>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
	/// Overlay center as fractions of the primary screen size.
	pub pos_x: f32,
	pub pos_y: f32,
	pub button_font_size: f32,
	pub indicator_font_size: f32,
}

fn default_start_mode() -> String {
	"manual".to_string()
}

fn default_miss_limit() -> u32 {
	detect::status::DEFAULT_MISS_LIMIT
}

impl Default for Config {
	fn default() -> Self {
		Self {
			game_window: "Last Epoch".to_string(),
			interval_ms: 100,
			first_delay_ms: 1000,
			key_hold_ms: 15,
			buttons: vec![
				ButtonEntry::new("Q", "Q", "F5", 1113, 1318),
				ButtonEntry::new("W", "W", "F6", 1177, 1318),
				ButtonEntry::new("E", "E", "F7", 1241, 1318),
				ButtonEntry::new("R", "R", "F8", 1305, 1318),
			],
			stacks: None,
			overlay: OverlayConfig {
				pos_x: 0.5,
				pos_y: 0.12,
				button_font_size: 24.0,
				indicator_font_size: 20.0,
			},
		}
	}
}

impl ButtonEntry {
	fn new(label: &str, action_key: &str, mode_key: &str, detect_x: i32, detect_y: i32) -> Self {
		Self {
			label: label.to_string(),
			action_key: action_key.to_string(),
			mode_key: mode_key.to_string(),
			detect_x,
			detect_y,
			start_mode: default_start_mode(),
		}
	}
}

impl Config {
	/// Path to the config file.
	pub fn path() -> Result<PathBuf> {
		let base = dirs::config_dir().context("config_dir() unavailable")?;
		Ok(base.join("lebuddy.json"))
	}

	/// Load configuration from disk, falling back to defaults on a missing
	/// or unreadable file.
	pub fn load_or_default() -> Self {
		match Self::try_load() {
			Ok(cfg) => cfg,
			Err(err) => {
				tracing::warn!(error = %err, "failed to load config; using defaults");
				Self::default()
			}
		}
	}

	/// Try to load configuration from disk.
	pub fn try_load() -> Result<Self> {
		let path = Self::path()?;
		if !path.exists() {
			return Ok(Self::default());
		}
		let json = fs::read_to_string(&path).with_context(|| format!("read {:?}", path))?;
		let cfg = serde_json::from_str(&json).with_context(|| format!("parse {:?}", path))?;
		Ok(cfg)
	}

	/// Save configuration to disk.
	pub fn save(&self) -> Result<()> {
		let path = Self::path()?;
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
		}
		let json = serde_json::to_string_pretty(self).context("serialize config")?;
		fs::write(&path, json).with_context(|| format!("write {:?}", path))?;
		Ok(())
	}

	/// Validate the button entries into engine descriptors.
	pub fn button_configs(&self) -> Result<Vec<ButtonConfig>> {
		let key_hold = Duration::from_millis(self.key_hold_ms);
		self.buttons
			.iter()
			.map(|entry| {
				let mut config = ButtonConfig::parse(
					entry.label.clone(),
					&entry.action_key,
					&entry.mode_key,
					entry.detect_x,
					entry.detect_y,
					parse_mode(&entry.start_mode)
						.with_context(|| format!("button {}", entry.label))?,
				)?;
				config.key_hold = key_hold;
				Ok(config)
			})
			.collect()
	}
}

fn parse_mode(s: &str) -> Result<ButtonMode> {
	match s.to_ascii_lowercase().as_str() {
		"disabled" => Ok(ButtonMode::Disabled),
		"manual" => Ok(ButtonMode::Manual),
		"autocast" => Ok(ButtonMode::AutoCast),
		other => bail!("unknown button mode {other:?}"),
	}
}
