//! Output endpoint selection
//!
//! With a single endpoint there is nothing to ask. With several, the user
//! picks one by index from a numbered list.

use crate::error::{Error, Result};
use std::io::{BufRead, Write};

/// Resolve the list of endpoint names to exactly one
///
/// `input` is only read when there is more than one endpoint.
pub fn choose_port<R, W>(names: &[String], input: &mut R, output: &mut W) -> Result<String>
where
    R: BufRead,
    W: Write,
{
    match names {
        [] => Err(Error::NoOutputDevice),
        [only] => {
            writeln!(output, "Using MIDI output: {}", only)?;
            Ok(only.clone())
        }
        _ => {
            writeln!(output, "Available MIDI outputs:")?;
            for (i, name) in names.iter().enumerate() {
                writeln!(output, "{}: {}", i, name)?;
            }
            write!(output, "Choose output index: ")?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Err(Error::InvalidSelection("no input".to_string()));
            }
            let choice = line.trim();
            let index: usize = choice
                .parse()
                .map_err(|_| Error::InvalidSelection(format!("{:?} is not a number", choice)))?;
            names.get(index).cloned().ok_or_else(|| {
                Error::InvalidSelection(format!(
                    "{} is out of range (0-{})",
                    index,
                    names.len() - 1
                ))
            })
        }
    }
}
