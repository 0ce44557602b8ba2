//! keyboard-piano - play MIDI notes from your computer keyboard
//!
//! Each key listed in the configuration file plays a fixed note. Pressing
//! the key sends note-on, releasing it sends note-off, and key auto-repeat
//! is ignored. Releasing Escape ends the session.
//!
//! # Usage as a Library
//!
//! ```no_run
//! use keyboard_piano::{choose_port, list_output_ports, open_output};
//! use keyboard_piano::{Bridge, Config, OsKeyboardListener};
//!
//! # fn main() -> keyboard_piano::Result<()> {
//! let config = Config::load("config.toml")?;
//! let ports = list_output_ports(config.midi.backend, &config.midi.client_name)?;
//! let port = choose_port(&ports, &mut std::io::stdin().lock(), &mut std::io::stdout())?;
//! let output = open_output(config.midi.backend, &config.midi.client_name, &port)?;
//!
//! let listener = OsKeyboardListener::start(config.layout)?;
//! let mut bridge = Bridge::new(config.binding_table(), output);
//! bridge.run(listener.receiver())?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod keyboard;
pub mod midi;
pub mod os_keyboard;
pub mod selector;

// Re-export main types
pub use bridge::Bridge;
pub use config::{Config, KeyboardLayout, DEFAULT_CONFIG_FILE};
pub use error::{Error, Result};
pub use keyboard::{note_name, Binding, BindingTable, VirtualKeyboard, DEFAULT_VELOCITY};
pub use midi::{list_output_ports, open_output, MidiBackend, MidiMessage, MidiOutput};
pub use os_keyboard::{OsKeyEvent, OsKeyboardListener, ESCAPE};
pub use selector::choose_port;
