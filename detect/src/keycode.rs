//! Typed key identifiers.
//!
//! Configuration refers to keys by name. Parsing happens once, at
//! construction time, so a bad name is a startup error with the offending
//! string in it instead of a panic deep inside a tick callback.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;

macro_rules! keycodes {
	($($variant:ident => $name:literal),+ $(,)?) => {
		/// A key the engine can press or react to.
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
		pub enum KeyCode {
			$($variant),+
		}

		impl KeyCode {
			/// Canonical name, as accepted by the parser.
			pub fn name(self) -> &'static str {
				match self {
					$(Self::$variant => $name),+
				}
			}

			fn lookup(name: &str) -> Option<Self> {
				match name {
					$($name => Some(Self::$variant)),+,
					_ => None,
				}
			}
		}
	};
}

keycodes! {
	A => "A", B => "B", C => "C", D => "D", E => "E", F => "F", G => "G",
	H => "H", I => "I", J => "J", K => "K", L => "L", M => "M", N => "N",
	O => "O", P => "P", Q => "Q", R => "R", S => "S", T => "T", U => "U",
	V => "V", W => "W", X => "X", Y => "Y", Z => "Z",
	Num0 => "0", Num1 => "1", Num2 => "2", Num3 => "3", Num4 => "4",
	Num5 => "5", Num6 => "6", Num7 => "7", Num8 => "8", Num9 => "9",
	F1 => "F1", F2 => "F2", F3 => "F3", F4 => "F4", F5 => "F5", F6 => "F6",
	F7 => "F7", F8 => "F8", F9 => "F9", F10 => "F10", F11 => "F11", F12 => "F12",
	Space => "SPACE",
	Escape => "ESCAPE",
	Pause => "PAUSE",
	ScrollLock => "SCROLL",
}

impl FromStr for KeyCode {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let upper = s.trim().to_ascii_uppercase();
		// Accept the Win32 VirtualKeyCode spellings older configs use
		// ("VK_Q", "SCROLL") alongside bare names.
		let name = upper.strip_prefix("VK_").unwrap_or(&upper);

		let name = match name {
			"ESC" => "ESCAPE",
			"SCROLLLOCK" => "SCROLL",
			other => other,
		};

		match Self::lookup(name) {
			Some(key) => Ok(key),
			None => bail!("unknown key code {s:?}"),
		}
	}
}

impl fmt::Display for KeyCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}
