//! OS-level keyboard input using rdev
//!
//! rdev delivers press and release events for physical keys regardless of
//! which window has focus. Events are translated to characters through a
//! layout table on the listener thread and handed to the consumer over a
//! channel, one at a time and in the order the OS reported them.

use crate::config::KeyboardLayout;
use crate::error::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use rdev::{listen, Event, EventType, Key};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Character reported for the Escape key
pub const ESCAPE: char = '\x1b';

/// Keyboard events from the OS-level listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsKeyEvent {
    /// A key was pressed (repeats while held)
    Press(char),
    /// A key was released
    Release(char),
}

/// OS-level keyboard listener that captures key press and release events
pub struct OsKeyboardListener {
    /// Channel receiver for keyboard events
    event_rx: Receiver<OsKeyEvent>,
    /// Shutdown flag
    shutdown: Arc<AtomicBool>,
    /// Listener thread handle
    _thread: JoinHandle<()>,
}

impl OsKeyboardListener {
    /// Start the OS keyboard listener on its own thread
    pub fn start(layout: KeyboardLayout) -> Result<Self> {
        if !is_available() {
            return Err(Error::Keyboard(
                "no display server found (DISPLAY / WAYLAND_DISPLAY unset)".to_string(),
            ));
        }

        let (tx, rx) = unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let thread = thread::Builder::new()
            .name("keyboard-listener".to_string())
            .spawn(move || run_listener(tx, layout, shutdown_clone))?;

        Ok(Self {
            event_rx: rx,
            shutdown,
            _thread: thread,
        })
    }

    /// Get the event receiver
    pub fn receiver(&self) -> &Receiver<OsKeyEvent> {
        &self.event_rx
    }
}

impl Drop for OsKeyboardListener {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Map rdev Key to a character for the given layout
pub fn key_to_char(key: Key, layout: KeyboardLayout) -> Option<char> {
    match layout {
        KeyboardLayout::Us => key_to_char_us(key),
        KeyboardLayout::German => key_to_char_german(key),
    }
}

/// Map rdev Key to character using US QWERTY layout
pub fn key_to_char_us(key: Key) -> Option<char> {
    let c = match key {
        Key::KeyA => 'a',
        Key::KeyB => 'b',
        Key::KeyC => 'c',
        Key::KeyD => 'd',
        Key::KeyE => 'e',
        Key::KeyF => 'f',
        Key::KeyG => 'g',
        Key::KeyH => 'h',
        Key::KeyI => 'i',
        Key::KeyJ => 'j',
        Key::KeyK => 'k',
        Key::KeyL => 'l',
        Key::KeyM => 'm',
        Key::KeyN => 'n',
        Key::KeyO => 'o',
        Key::KeyP => 'p',
        Key::KeyQ => 'q',
        Key::KeyR => 'r',
        Key::KeyS => 's',
        Key::KeyT => 't',
        Key::KeyU => 'u',
        Key::KeyV => 'v',
        Key::KeyW => 'w',
        Key::KeyX => 'x',
        Key::KeyY => 'y',
        Key::KeyZ => 'z',

        Key::Num0 => '0',
        Key::Num1 => '1',
        Key::Num2 => '2',
        Key::Num3 => '3',
        Key::Num4 => '4',
        Key::Num5 => '5',
        Key::Num6 => '6',
        Key::Num7 => '7',
        Key::Num8 => '8',
        Key::Num9 => '9',

        Key::BackQuote => '`',
        Key::Minus => '-',
        Key::Equal => '=',
        Key::LeftBracket => '[',
        Key::RightBracket => ']',
        Key::BackSlash => '\\',
        Key::SemiColon => ';',
        Key::Quote => '\'',
        Key::Comma => ',',
        Key::Dot => '.',
        Key::Slash => '/',
        Key::Space => ' ',

        Key::Escape => ESCAPE,

        // Modifiers, function keys, arrows, etc.
        _ => return None,
    };
    Some(c)
}

/// Map rdev Key to character using German QWERTZ layout
///
/// rdev reports physical key positions named after the US layout, so the
/// physical Y position is the German Z key and vice versa.
pub fn key_to_char_german(key: Key) -> Option<char> {
    match key {
        Key::KeyY => Some('z'),
        Key::KeyZ => Some('y'),
        Key::BackQuote => Some('^'),
        Key::Minus => Some('ß'),
        Key::Equal => Some('´'),
        Key::LeftBracket => Some('ü'),
        Key::RightBracket => Some('+'),
        Key::BackSlash => Some('#'),
        Key::SemiColon => Some('ö'),
        Key::Quote => Some('ä'),
        Key::Slash => Some('-'),
        Key::IntlBackslash => Some('<'),
        _ => key_to_char_us(key),
    }
}

/// Translate a raw rdev event
pub fn translate(event_type: EventType, layout: KeyboardLayout) -> Option<OsKeyEvent> {
    match event_type {
        EventType::KeyPress(key) => key_to_char(key, layout).map(OsKeyEvent::Press),
        EventType::KeyRelease(key) => key_to_char(key, layout).map(OsKeyEvent::Release),
        _ => None,
    }
}

/// Run the rdev listener (blocking - runs in its own thread)
fn run_listener(tx: Sender<OsKeyEvent>, layout: KeyboardLayout, shutdown: Arc<AtomicBool>) {
    let callback = move |event: Event| {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        if let Some(key_event) = translate(event.event_type, layout) {
            let _ = tx.send(key_event);
        }
    };

    // Blocks until an error occurs; dropping `tx` then closes the channel
    if let Err(e) = listen(callback) {
        log::error!("OS keyboard listener error: {:?}", e);
    }
}

/// Check if the OS keyboard listener is likely to work on this system
pub fn is_available() -> bool {
    // On Linux, rdev requires X11 or Wayland
    #[cfg(target_os = "linux")]
    {
        std::env::var("DISPLAY").is_ok() || std::env::var("WAYLAND_DISPLAY").is_ok()
    }

    #[cfg(not(target_os = "linux"))]
    {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping_us() {
        assert_eq!(key_to_char_us(Key::KeyZ), Some('z'));
        assert_eq!(key_to_char_us(Key::KeyY), Some('y'));
        assert_eq!(key_to_char_us(Key::Num1), Some('1'));
        assert_eq!(key_to_char_us(Key::SemiColon), Some(';'));
        assert_eq!(key_to_char_us(Key::Escape), Some(ESCAPE));
    }

    #[test]
    fn test_key_mapping_german() {
        assert_eq!(key_to_char_german(Key::KeyZ), Some('y'));
        assert_eq!(key_to_char_german(Key::KeyY), Some('z'));
        assert_eq!(key_to_char_german(Key::SemiColon), Some('ö'));
        assert_eq!(key_to_char_german(Key::KeyC), Some('c'));
        assert_eq!(key_to_char_german(Key::Escape), Some(ESCAPE));
    }

    #[test]
    fn test_non_printable_keys_dropped() {
        for key in [Key::ShiftLeft, Key::ControlLeft, Key::F1, Key::UpArrow, Key::Alt] {
            assert_eq!(key_to_char_us(key), None);
            assert_eq!(key_to_char_german(key), None);
        }
    }

    #[test]
    fn test_translate() {
        assert_eq!(
            translate(EventType::KeyPress(Key::KeyA), KeyboardLayout::Us),
            Some(OsKeyEvent::Press('a'))
        );
        assert_eq!(
            translate(EventType::KeyRelease(Key::Escape), KeyboardLayout::Us),
            Some(OsKeyEvent::Release(ESCAPE))
        );
        assert_eq!(translate(EventType::KeyPress(Key::ShiftRight), KeyboardLayout::Us), None);
        assert_eq!(
            translate(EventType::MouseMove { x: 1.0, y: 2.0 }, KeyboardLayout::Us),
            None
        );
    }
}
