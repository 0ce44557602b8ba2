//! Configuration file support for keyboard-piano
//!
//! The configuration is a TOML document. Each `[[binding]]` table maps one
//! key character to a note:
//!
//! ```toml
//! [[binding]]
//! key = "a"
//! note = 60
//! velocity = 100  # optional
//! channel = 0     # optional
//! ```

use crate::error::{Error, Result};
use crate::keyboard::{Binding, BindingTable, DEFAULT_CHANNEL, DEFAULT_VELOCITY};
use crate::midi::MidiBackend;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Config file used when no path is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Key bindings, in file order
    #[serde(rename = "binding")]
    pub bindings: Vec<BindingEntry>,
    /// Physical keyboard layout
    pub layout: KeyboardLayout,
    /// MIDI configuration
    pub midi: MidiSettings,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Build the binding table from the `[[binding]]` entries
    pub fn binding_table(&self) -> BindingTable {
        for entry in &self.bindings {
            entry.warn_out_of_range();
        }
        BindingTable::from_entries(self.bindings.iter().map(|e| (e.key, e.to_binding())))
    }

    /// Write a commented example configuration to `path`
    ///
    /// Fails if the file already exists.
    pub fn write_default(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            return Err(Error::Config(format!("{} already exists", path.display())));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG)?;
        Ok(())
    }
}

/// One `[[binding]]` table from the config file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BindingEntry {
    /// The key character
    pub key: char,
    /// MIDI note number
    pub note: u8,
    /// Note-on velocity
    #[serde(default = "default_velocity")]
    pub velocity: u8,
    /// MIDI channel (0-15)
    #[serde(default = "default_channel")]
    pub channel: u8,
}

impl BindingEntry {
    /// Convert to Binding
    ///
    /// Values beyond the MIDI range are clamped to its top.
    pub fn to_binding(&self) -> Binding {
        Binding {
            note: self.note.min(127),
            velocity: self.velocity.min(127),
            channel: self.channel.min(15),
        }
    }

    fn warn_out_of_range(&self) {
        if self.note > 127 {
            log::warn!("Key {:?}: note {} is outside 0-127, using 127", self.key, self.note);
        }
        if self.velocity > 127 {
            log::warn!("Key {:?}: velocity {} is outside 0-127, using 127", self.key, self.velocity);
        }
        if self.channel > 15 {
            log::warn!("Key {:?}: channel {} is outside 0-15, using 15", self.key, self.channel);
        }
    }
}

fn default_velocity() -> u8 {
    DEFAULT_VELOCITY
}

fn default_channel() -> u8 {
    DEFAULT_CHANNEL
}

/// Physical keyboard layout used to turn key positions into characters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KeyboardLayout {
    /// US QWERTY layout
    #[default]
    Us,
    /// German QWERTZ layout
    German,
}

/// MIDI settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MidiSettings {
    /// Output backend
    pub backend: MidiBackend,
    /// Client name announced to the MIDI system
    pub client_name: String,
}

impl Default for MidiSettings {
    fn default() -> Self {
        Self {
            backend: MidiBackend::default(),
            client_name: "keyboard-piano".to_string(),
        }
    }
}

const DEFAULT_CONFIG: &str = r#"# keyboard-piano configuration file

# Physical keyboard layout: "us" or "german"
layout = "us"

[midi]
# Output backend: "midir" (system MIDI ports) or "jack"
backend = "midir"
client_name = "keyboard-piano"

# One [[binding]] per key. `velocity` defaults to 100, `channel` to 0.
# Home row plays one chromatic octave starting at middle C.

[[binding]]
key = "a"
note = 60

[[binding]]
key = "w"
note = 61

[[binding]]
key = "s"
note = 62

[[binding]]
key = "e"
note = 63

[[binding]]
key = "d"
note = 64

[[binding]]
key = "f"
note = 65

[[binding]]
key = "t"
note = 66

[[binding]]
key = "g"
note = 67

[[binding]]
key = "y"
note = 68

[[binding]]
key = "h"
note = 69

[[binding]]
key = "u"
note = 70

[[binding]]
key = "j"
note = 71

[[binding]]
key = "k"
note = 72
"#;
