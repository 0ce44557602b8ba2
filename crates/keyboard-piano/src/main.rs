//! keyboard-piano - play MIDI notes from your computer keyboard

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;

use keyboard_piano::{
    choose_port,
    config::{Config, KeyboardLayout, DEFAULT_CONFIG_FILE},
    list_output_ports, open_output, Bridge, MidiBackend, OsKeyboardListener,
};

#[derive(Parser)]
#[command(name = "keyboard-piano")]
#[command(author, version, about = "Play MIDI notes from your computer keyboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// MIDI backend (overrides the config file)
    #[arg(long, value_enum)]
    backend: Option<MidiBackend>,

    /// Keyboard layout (overrides the config file)
    #[arg(long, value_enum)]
    layout: Option<KeyboardLayout>,

    /// MIDI client name (overrides the config file)
    #[arg(long)]
    client_name: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example configuration file to the config path
    Init,
    /// List available MIDI outputs
    ListPorts,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init) => {
            Config::write_default(&cli.config)?;
            println!("Created example config at: {}", cli.config.display());
            return Ok(());
        }
        Some(Commands::ListPorts) => {
            let config = load_config(&cli, false)?;
            let ports = list_output_ports(config.midi.backend, &config.midi.client_name)?;
            if ports.is_empty() {
                println!("No MIDI outputs found");
            } else {
                println!("Available MIDI outputs:");
                for (i, port) in ports.iter().enumerate() {
                    println!("{}: {}", i, port);
                }
            }
            return Ok(());
        }
        None => {}
    }

    let config = load_config(&cli, true)?;
    let bindings = config.binding_table();
    log::info!("Loaded {} key bindings from {}", bindings.len(), cli.config.display());

    let ports = list_output_ports(config.midi.backend, &config.midi.client_name)?;
    let port = choose_port(&ports, &mut io::stdin().lock(), &mut io::stdout())?;
    let output = open_output(config.midi.backend, &config.midi.client_name, &port)
        .with_context(|| format!("Failed to open MIDI output {:?}", port))?;

    let listener = OsKeyboardListener::start(config.layout)?;

    println!("Starting keyboard piano. Press Esc to quit.");
    let mut bridge = Bridge::new(bindings, output);
    bridge.run(listener.receiver())?;

    Ok(())
}

/// Load the config file and apply CLI overrides
///
/// When `required` is false a missing file falls back to the defaults.
fn load_config(cli: &Cli, required: bool) -> Result<Config> {
    let mut config = if required || cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };
    if let Some(backend) = cli.backend {
        config.midi.backend = backend;
    }
    if let Some(layout) = cli.layout {
        config.layout = layout;
    }
    if let Some(ref name) = cli.client_name {
        config.midi.client_name = name.clone();
    }
    Ok(config)
}
