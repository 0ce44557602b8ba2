//! Key bindings and pressed-key state
//!
//! A [`BindingTable`] maps single characters to the note they play. A
//! [`VirtualKeyboard`] tracks which bound keys are currently held so that
//! OS key-repeat does not retrigger notes and every note-on gets exactly one
//! matching note-off.

use std::collections::{HashMap, HashSet};

/// Default velocity for key presses
pub const DEFAULT_VELOCITY: u8 = 100;

/// Default MIDI channel (0-based)
pub const DEFAULT_CHANNEL: u8 = 0;

/// The note a key plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    /// MIDI note number
    pub note: u8,
    /// Note-on velocity
    pub velocity: u8,
    /// MIDI channel (0-15)
    pub channel: u8,
}

impl Binding {
    /// Create a binding with the default velocity and channel
    pub fn new(note: u8) -> Self {
        Self {
            note,
            velocity: DEFAULT_VELOCITY,
            channel: DEFAULT_CHANNEL,
        }
    }
}

/// Mapping from key character to [`Binding`]
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingTable {
    bindings: HashMap<char, Binding>,
}

impl BindingTable {
    /// Build a table from `(key, binding)` pairs
    ///
    /// A key that appears more than once keeps its last binding.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (char, Binding)>,
    {
        let mut bindings = HashMap::new();
        for (key, binding) in entries {
            if let Some(previous) = bindings.insert(key, binding) {
                log::warn!(
                    "Key {:?} is bound more than once, replacing note {} with note {}",
                    key,
                    previous.note,
                    binding.note
                );
            }
        }
        Self { bindings }
    }

    /// Look up the binding for a key
    pub fn get(&self, key: char) -> Option<&Binding> {
        self.bindings.get(&key)
    }

    /// Number of bound keys
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no keys are bound
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Pressed-key state on top of a binding table
#[derive(Debug, Clone)]
pub struct VirtualKeyboard {
    bindings: BindingTable,
    /// Keys with an outstanding note-on
    pressed: HashSet<char>,
}

impl VirtualKeyboard {
    /// Create a keyboard with no keys held
    pub fn new(bindings: BindingTable) -> Self {
        Self {
            bindings,
            pressed: HashSet::new(),
        }
    }

    /// Handle a key press
    /// Returns the binding to sound if the key is bound and was not already held
    pub fn key_down(&mut self, c: char) -> Option<Binding> {
        let binding = *self.bindings.get(c)?;
        if self.pressed.insert(c) {
            Some(binding)
        } else {
            None
        }
    }

    /// Handle a key release
    /// Returns the binding to silence if the key was held
    pub fn key_up(&mut self, c: char) -> Option<Binding> {
        let binding = *self.bindings.get(c)?;
        if self.pressed.remove(&c) {
            Some(binding)
        } else {
            None
        }
    }

    /// Release every held key
    /// Returns the bindings that were still sounding
    pub fn release_all(&mut self) -> Vec<Binding> {
        let bindings = &self.bindings;
        self.pressed
            .drain()
            .filter_map(|c| bindings.get(c).copied())
            .collect()
    }

    /// Check if a key is currently held
    pub fn is_key_pressed(&self, c: char) -> bool {
        self.pressed.contains(&c)
    }

    /// Number of keys currently held
    pub fn pressed_count(&self) -> usize {
        self.pressed.len()
    }
}

/// Get the name of a MIDI note (e.g., "C4", "F#3")
pub fn note_name(note: u8) -> String {
    const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (note as i16 / 12) - 1;
    format!("{}{}", NAMES[(note % 12) as usize], octave)
}
