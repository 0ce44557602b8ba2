//! Keyboard to MIDI bridge
//!
//! Consumes key events one at a time, plays bound keys on the MIDI output
//! and stops when Escape is released.

use crate::error::{Error, Result};
use crate::keyboard::{note_name, Binding, BindingTable, VirtualKeyboard};
use crate::midi::MidiOutput;
use crate::os_keyboard::{OsKeyEvent, ESCAPE};
use crossbeam_channel::Receiver;
use std::ops::ControlFlow;

/// Owns the pressed-key state and the MIDI output for one session
pub struct Bridge<O: MidiOutput> {
    keyboard: VirtualKeyboard,
    output: O,
}

impl<O: MidiOutput> Bridge<O> {
    /// Create a bridge with no keys held
    pub fn new(bindings: BindingTable, output: O) -> Self {
        Self {
            keyboard: VirtualKeyboard::new(bindings),
            output,
        }
    }

    /// The keyboard state
    pub fn keyboard(&self) -> &VirtualKeyboard {
        &self.keyboard
    }

    /// The MIDI output
    pub fn output(&self) -> &O {
        &self.output
    }

    /// Handle a single key event
    ///
    /// Returns `Break` once Escape has been released.
    pub fn handle(&mut self, event: OsKeyEvent) -> ControlFlow<()> {
        match event {
            OsKeyEvent::Press(c) => {
                if let Some(binding) = self.keyboard.key_down(c) {
                    if !self.note_on(c, binding) {
                        // Nothing sounded, so there is nothing to release later
                        self.keyboard.key_up(c);
                    }
                }
                ControlFlow::Continue(())
            }
            OsKeyEvent::Release(c) => {
                if let Some(binding) = self.keyboard.key_up(c) {
                    self.note_off(c, binding);
                }
                if c == ESCAPE {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        }
    }

    /// Process events until Escape is released
    ///
    /// Any notes still held when the loop ends are released. Fails if the
    /// event source goes away before Escape is seen.
    pub fn run(&mut self, events: &Receiver<OsKeyEvent>) -> Result<()> {
        let mut result = Err(Error::Keyboard("keyboard event stream closed".to_string()));
        for event in events.iter() {
            if self.handle(event).is_break() {
                log::info!("Escape released, stopping");
                result = Ok(());
                break;
            }
        }
        self.release_all();
        result
    }

    /// Send note-off for every held key
    pub fn release_all(&mut self) {
        for binding in self.keyboard.release_all() {
            if let Err(e) = self.output.note_off(binding.channel, binding.note) {
                log::warn!("Failed to release note {}: {}", binding.note, e);
            }
        }
    }

    /// Consume the bridge, returning the output
    pub fn into_output(self) -> O {
        self.output
    }

    fn note_on(&mut self, c: char, binding: Binding) -> bool {
        log::debug!(
            "{:?} down: note on {} ({}) vel={} ch={}",
            c,
            binding.note,
            note_name(binding.note),
            binding.velocity,
            binding.channel
        );
        match self.output.note_on(binding.channel, binding.note, binding.velocity) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to send note on for {:?}: {}", c, e);
                false
            }
        }
    }

    fn note_off(&mut self, c: char, binding: Binding) {
        log::debug!("{:?} up: note off {} ch={}", c, binding.note, binding.channel);
        if let Err(e) = self.output.note_off(binding.channel, binding.note) {
            log::warn!("Failed to send note off for {:?}: {}", c, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::midi::MidiMessage;
    use crossbeam_channel::unbounded;

    /// Records every message; optionally fails every send
    #[derive(Default)]
    struct RecordingOutput {
        sent: Vec<MidiMessage>,
        fail: bool,
    }

    impl MidiOutput for RecordingOutput {
        fn send(&mut self, message: MidiMessage) -> Result<()> {
            if self.fail {
                return Err(Error::Midi("port closed".to_string()));
            }
            self.sent.push(message);
            Ok(())
        }

        fn port_name(&self) -> &str {
            "recording"
        }
    }

    fn bridge(entries: &[(char, Binding)]) -> Bridge<RecordingOutput> {
        Bridge::new(
            BindingTable::from_entries(entries.iter().copied()),
            RecordingOutput::default(),
        )
    }

    fn note_on(channel: u8, note: u8, velocity: u8) -> MidiMessage {
        MidiMessage::NoteOn { channel, note, velocity }
    }

    fn note_off(channel: u8, note: u8) -> MidiMessage {
        MidiMessage::NoteOff { channel, note }
    }

    #[test]
    fn test_press_repeat_release() {
        let mut bridge = bridge(&[('a', Binding::new(60))]);

        assert!(bridge.handle(OsKeyEvent::Press('a')).is_continue());
        assert_eq!(bridge.output().sent, vec![note_on(0, 60, 100)]);

        // Auto-repeat while held
        bridge.handle(OsKeyEvent::Press('a'));
        bridge.handle(OsKeyEvent::Press('a'));
        assert_eq!(bridge.output().sent.len(), 1);

        assert!(bridge.handle(OsKeyEvent::Release('a')).is_continue());
        assert_eq!(bridge.output().sent, vec![note_on(0, 60, 100), note_off(0, 60)]);
        assert_eq!(bridge.keyboard().pressed_count(), 0);
    }

    #[test]
    fn test_binding_values_used() {
        let mut bridge = bridge(&[('s', Binding { note: 62, velocity: 80, channel: 9 })]);
        bridge.handle(OsKeyEvent::Press('s'));
        bridge.handle(OsKeyEvent::Release('s'));
        assert_eq!(bridge.output().sent, vec![note_on(9, 62, 80), note_off(9, 62)]);
    }

    #[test]
    fn test_unbound_keys_ignored() {
        let mut bridge = bridge(&[('a', Binding::new(60))]);
        bridge.handle(OsKeyEvent::Press('x'));
        bridge.handle(OsKeyEvent::Release('x'));
        assert!(bridge.output().sent.is_empty());
        assert_eq!(bridge.keyboard().pressed_count(), 0);
    }

    #[test]
    fn test_release_without_press() {
        let mut bridge = bridge(&[('a', Binding::new(60))]);
        bridge.handle(OsKeyEvent::Release('a'));
        assert!(bridge.output().sent.is_empty());
    }

    #[test]
    fn test_interleaved_keys() {
        let mut bridge = bridge(&[('a', Binding::new(60)), ('s', Binding::new(62))]);
        bridge.handle(OsKeyEvent::Press('a'));
        bridge.handle(OsKeyEvent::Press('s'));
        bridge.handle(OsKeyEvent::Release('a'));
        bridge.handle(OsKeyEvent::Release('s'));
        assert_eq!(
            bridge.output().sent,
            vec![note_on(0, 60, 100), note_on(0, 62, 100), note_off(0, 60), note_off(0, 62)]
        );
    }

    #[test]
    fn test_escape_release_stops() {
        let mut bridge = bridge(&[]);
        assert!(bridge.handle(OsKeyEvent::Press(ESCAPE)).is_continue());
        assert!(bridge.handle(OsKeyEvent::Release(ESCAPE)).is_break());
        assert!(bridge.output().sent.is_empty());
    }

    #[test]
    fn test_empty_bindings_emit_nothing() {
        let (tx, rx) = unbounded();
        for c in ['a', 's', 'q', '1', ' '] {
            tx.send(OsKeyEvent::Press(c)).unwrap();
            tx.send(OsKeyEvent::Press(c)).unwrap();
            tx.send(OsKeyEvent::Release(c)).unwrap();
        }
        tx.send(OsKeyEvent::Press(ESCAPE)).unwrap();
        tx.send(OsKeyEvent::Release(ESCAPE)).unwrap();

        let bindings = Config::parse("").unwrap().binding_table();
        let mut bridge = Bridge::new(bindings, RecordingOutput::default());
        bridge.run(&rx).unwrap();

        assert!(bridge.output().sent.is_empty());
        assert_eq!(bridge.keyboard().pressed_count(), 0);
        assert!(rx.is_empty());
        assert!(bridge.handle(OsKeyEvent::Release(ESCAPE)).is_break());
    }

    #[test]
    fn test_bound_escape_releases_and_stops() {
        let mut bridge = bridge(&[(ESCAPE, Binding::new(36))]);
        bridge.handle(OsKeyEvent::Press(ESCAPE));
        assert!(bridge.handle(OsKeyEvent::Release(ESCAPE)).is_break());
        assert_eq!(bridge.output().sent, vec![note_on(0, 36, 100), note_off(0, 36)]);
    }

    #[test]
    fn test_failed_note_on_not_held() {
        let mut bridge = Bridge::new(
            BindingTable::from_entries([('a', Binding::new(60))]),
            RecordingOutput { sent: Vec::new(), fail: true },
        );
        assert!(bridge.handle(OsKeyEvent::Press('a')).is_continue());
        assert!(!bridge.keyboard().is_key_pressed('a'));
    }

    #[test]
    fn test_run_until_escape() {
        let (tx, rx) = unbounded();
        for event in [
            OsKeyEvent::Press('a'),
            OsKeyEvent::Release('a'),
            OsKeyEvent::Release(ESCAPE),
            // Never reached
            OsKeyEvent::Press('a'),
        ] {
            tx.send(event).unwrap();
        }

        let mut bridge = bridge(&[('a', Binding::new(60))]);
        bridge.run(&rx).unwrap();
        assert_eq!(bridge.output().sent, vec![note_on(0, 60, 100), note_off(0, 60)]);
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_run_releases_held_notes() {
        let (tx, rx) = unbounded();
        tx.send(OsKeyEvent::Press('a')).unwrap();
        tx.send(OsKeyEvent::Release(ESCAPE)).unwrap();

        let mut bridge = bridge(&[('a', Binding::new(60))]);
        bridge.run(&rx).unwrap();
        assert_eq!(bridge.output().sent, vec![note_on(0, 60, 100), note_off(0, 60)]);
        assert_eq!(bridge.keyboard().pressed_count(), 0);
    }

    #[test]
    fn test_run_fails_when_stream_closes() {
        let (tx, rx) = unbounded();
        tx.send(OsKeyEvent::Press('a')).unwrap();
        drop(tx);

        let mut bridge = bridge(&[('a', Binding::new(60))]);
        assert!(matches!(bridge.run(&rx), Err(Error::Keyboard(_))));
        // Held note still released on the way out
        let output = bridge.into_output();
        assert_eq!(output.sent, vec![note_on(0, 60, 100), note_off(0, 60)]);
    }
}
