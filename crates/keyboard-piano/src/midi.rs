//! MIDI output backends
//!
//! Two backends are available: system MIDI ports through `midir` (ALSA,
//! CoreMIDI or WinMM depending on the platform) and JACK MIDI.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// MIDI backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MidiBackend {
    /// System MIDI ports via midir
    #[default]
    Midir,
    /// JACK MIDI output
    Jack,
}

/// MIDI message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note on: channel, note, velocity
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Note off: channel, note (sent with velocity 0)
    NoteOff { channel: u8, note: u8 },
}

impl MidiMessage {
    /// Convert to raw MIDI bytes
    pub fn to_bytes(&self) -> [u8; 3] {
        match self {
            MidiMessage::NoteOn { channel, note, velocity } => {
                [0x90 | (channel & 0x0F), *note & 0x7F, *velocity & 0x7F]
            }
            MidiMessage::NoteOff { channel, note } => [0x80 | (channel & 0x0F), *note & 0x7F, 0],
        }
    }
}

/// MIDI output trait
pub trait MidiOutput: Send {
    /// Send a single message
    fn send(&mut self, message: MidiMessage) -> Result<()>;

    /// Get the name of the endpoint this output is connected to
    fn port_name(&self) -> &str;

    /// Send a note on message
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<()> {
        self.send(MidiMessage::NoteOn { channel, note, velocity })
    }

    /// Send a note off message
    fn note_off(&mut self, channel: u8, note: u8) -> Result<()> {
        self.send(MidiMessage::NoteOff { channel, note })
    }
}

impl<T: MidiOutput + ?Sized> MidiOutput for Box<T> {
    fn send(&mut self, message: MidiMessage) -> Result<()> {
        (**self).send(message)
    }

    fn port_name(&self) -> &str {
        (**self).port_name()
    }
}

/// List the names of the MIDI destinations available on `backend`
///
/// Order is whatever the host reports.
pub fn list_output_ports(backend: MidiBackend, client_name: &str) -> Result<Vec<String>> {
    match backend {
        MidiBackend::Midir => list_midir_ports(client_name),
        MidiBackend::Jack => {
            if is_jack_running() {
                Ok(list_jack_midi_ports())
            } else {
                log::warn!("JACK is not running");
                Ok(Vec::new())
            }
        }
    }
}

/// Open a connection to the destination named `port_name`
pub fn open_output(
    backend: MidiBackend,
    client_name: &str,
    port_name: &str,
) -> Result<Box<dyn MidiOutput>> {
    let output: Box<dyn MidiOutput> = match backend {
        MidiBackend::Midir => Box::new(MidirOutput::connect(client_name, port_name)?),
        MidiBackend::Jack => Box::new(JackMidiOutput::connect(client_name, port_name)?),
    };
    log::info!("MIDI output connected: {}", output.port_name());
    Ok(output)
}

/// System MIDI output through midir
pub struct MidirOutput {
    connection: midir::MidiOutputConnection,
    port_name: String,
}

impl MidirOutput {
    /// Connect to the output port with the given name
    pub fn connect(client_name: &str, port_name: &str) -> Result<Self> {
        let output = midir::MidiOutput::new(client_name).map_err(|e| Error::Midi(e.to_string()))?;
        let port = output
            .ports()
            .into_iter()
            .find(|p| output.port_name(p).map(|n| n == port_name).unwrap_or(false))
            .ok_or_else(|| Error::Midi(format!("output port {:?} is not available", port_name)))?;
        let connection = output
            .connect(&port, client_name)
            .map_err(|e| Error::Midi(format!("cannot connect to {:?}: {}", port_name, e)))?;

        Ok(Self {
            connection,
            port_name: port_name.to_string(),
        })
    }
}

impl MidiOutput for MidirOutput {
    fn send(&mut self, message: MidiMessage) -> Result<()> {
        self.connection
            .send(&message.to_bytes())
            .map_err(|e| Error::Midi(e.to_string()))
    }

    fn port_name(&self) -> &str {
        &self.port_name
    }
}

fn list_midir_ports(client_name: &str) -> Result<Vec<String>> {
    let output = midir::MidiOutput::new(client_name).map_err(|e| Error::Midi(e.to_string()))?;
    Ok(output
        .ports()
        .iter()
        .filter_map(|p| output.port_name(p).ok())
        .collect())
}

/// How long dropping a JACK output waits for queued messages to go out
const JACK_DRAIN_TIMEOUT: Duration = Duration::from_millis(200);

/// Message queue from the caller to the JACK process callback
///
/// Tracks how many messages are still waiting so the sender can tell when
/// the callback has caught up.
struct MidiQueue {
    tx: Sender<MidiMessage>,
    pending: Arc<AtomicUsize>,
}

/// Receiving half of a [`MidiQueue`], owned by the process callback
struct MidiQueueReceiver {
    rx: Receiver<MidiMessage>,
    pending: Arc<AtomicUsize>,
}

fn midi_queue() -> (MidiQueue, MidiQueueReceiver) {
    let (tx, rx) = channel();
    let pending = Arc::new(AtomicUsize::new(0));
    (
        MidiQueue { tx, pending: pending.clone() },
        MidiQueueReceiver { rx, pending },
    )
}

impl MidiQueue {
    fn push(&self, message: MidiMessage) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.tx.send(message).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            Error::Midi("JACK process callback is gone".to_string())
        })
    }

    fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Block until every queued message has been taken or `timeout` passes
    ///
    /// Returns false on timeout.
    fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

impl MidiQueueReceiver {
    /// Hand every queued message to `write`
    fn drain(&self, mut write: impl FnMut(MidiMessage)) {
        while let Ok(msg) = self.rx.try_recv() {
            write(msg);
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// JACK MIDI output
pub struct JackMidiOutput {
    /// Queue of MIDI messages for the JACK process callback
    queue: MidiQueue,
    /// Destination port name
    port_name: String,
    /// Keep the client alive
    _client: jack::AsyncClient<(), JackMidiHandler>,
}

impl JackMidiOutput {
    /// Register an output port and connect it to the JACK MIDI input `destination`
    pub fn connect(client_name: &str, destination: &str) -> Result<Self> {
        let (client, _status) = jack::Client::new(client_name, jack::ClientOptions::NO_START_SERVER)?;
        let midi_out = client.register_port("midi_out", jack::MidiOut::default())?;
        let source = midi_out.name()?;

        let (queue, rx) = midi_queue();
        let handler = JackMidiHandler { midi_out, rx };
        let active_client = client.activate_async((), handler)?;

        active_client
            .as_client()
            .connect_ports_by_name(&source, destination)?;
        log::debug!("JACK: {} -> {}", source, destination);

        Ok(Self {
            queue,
            port_name: destination.to_string(),
            _client: active_client,
        })
    }
}

impl Drop for JackMidiOutput {
    fn drop(&mut self) {
        // The client deactivates when dropped; let the last note-offs go out first
        if !self.queue.wait_drained(JACK_DRAIN_TIMEOUT) {
            log::warn!(
                "{} MIDI messages not delivered before JACK shutdown",
                self.queue.pending()
            );
        }
    }
}

impl MidiOutput for JackMidiOutput {
    fn send(&mut self, message: MidiMessage) -> Result<()> {
        self.queue.push(message)
    }

    fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// JACK process handler for MIDI output
struct JackMidiHandler {
    midi_out: jack::Port<jack::MidiOut>,
    rx: MidiQueueReceiver,
}

impl jack::ProcessHandler for JackMidiHandler {
    fn process(&mut self, _client: &jack::Client, ps: &jack::ProcessScope) -> jack::Control {
        let mut writer = self.midi_out.writer(ps);

        self.rx.drain(|msg| {
            let bytes = msg.to_bytes();
            let raw = jack::RawMidi {
                time: 0,
                bytes: &bytes,
            };
            if let Err(e) = writer.write(&raw) {
                log::warn!("JACK MIDI write failed: {}", e);
            }
        });

        jack::Control::Continue
    }
}

/// Check if JACK is running
pub fn is_jack_running() -> bool {
    jack::Client::new("keyboard-piano-probe", jack::ClientOptions::NO_START_SERVER).is_ok()
}

/// List available JACK MIDI input ports
pub fn list_jack_midi_ports() -> Vec<String> {
    if let Ok((client, _)) = jack::Client::new("keyboard-piano-list", jack::ClientOptions::NO_START_SERVER) {
        client.ports(None, Some("midi"), jack::PortFlags::IS_INPUT)
    } else {
        Vec::new()
    }
}
