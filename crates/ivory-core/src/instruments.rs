use ivory_ports::types::{Program, NUM_PROGRAMS};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum InstrumentTableError {
    #[error("io error: {0}")]
    Io(String),
}

/// Display names for the 128 General MIDI programs.
///
/// Always holds exactly `NUM_PROGRAMS` entries; missing names are empty strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstrumentNameTable {
    names: Vec<String>,
}

impl InstrumentNameTable {
    pub fn blank() -> Self {
        Self {
            names: vec![String::new(); NUM_PROGRAMS],
        }
    }

    /// One name per line; reading stops at end of stream or the first blank line.
    ///
    /// Bytes that are not UTF-8 become U+FFFD. A read error ends the table early
    /// with whatever names came before it.
    pub fn from_reader<R: BufRead>(mut reader: R) -> Self {
        let mut names = Vec::with_capacity(NUM_PROGRAMS);
        let mut buf = Vec::new();
        while names.len() < NUM_PROGRAMS {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(
                        read = names.len(),
                        error = %err,
                        "instrument names cut short"
                    );
                    break;
                }
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                break;
            }
            names.push(line.to_string());
        }
        names.resize(NUM_PROGRAMS, String::new());
        Self { names }
    }

    pub fn load(path: &Path) -> Result<Self, InstrumentTableError> {
        let file = File::open(path)
            .map_err(|e| InstrumentTableError::Io(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_reader(BufReader::new(file)))
    }

    pub fn load_or_blank(path: &Path) -> Self {
        match Self::load(path) {
            Ok(table) => {
                tracing::debug!(path = %path.display(), "loaded instrument names");
                table
            }
            Err(err) => {
                tracing::warn!("Cannot read MIDI instrument names: {}", err);
                Self::blank()
            }
        }
    }

    pub fn name(&self, program: Program) -> &str {
        &self.names[program.index()]
    }

    pub fn get(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl Default for InstrumentNameTable {
    fn default() -> Self {
        Self::blank()
    }
}
