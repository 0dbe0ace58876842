//! Log writer module
//!
//! Resolves where a log stream goes: a file when a path is configured,
//! otherwise stdout or stderr.

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Standard stream used when no file is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Log output target
pub enum LogTarget {
    Stream(Stream),
    File(File),
}

impl LogTarget {
    /// Colors are only worth emitting to an interactive stream
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Stream(Stream::Stdout) => io::stdout().is_terminal(),
            Self::Stream(Stream::Stderr) => io::stderr().is_terminal(),
            Self::File(_) => false,
        }
    }

    pub fn into_make_writer(self) -> BoxMakeWriter {
        match self {
            Self::Stream(Stream::Stdout) => BoxMakeWriter::new(io::stdout),
            Self::Stream(Stream::Stderr) => BoxMakeWriter::new(io::stderr),
            Self::File(file) => BoxMakeWriter::new(Mutex::new(file)),
        }
    }
}

/// Pick the target for one log stream
pub fn make_writer(path: Option<&str>, fallback: Stream) -> io::Result<LogTarget> {
    match path {
        Some(path) => Ok(LogTarget::File(open_log_file(path)?)),
        None => Ok(LogTarget::Stream(fallback)),
    }
}

/// Open or create a log file for appending
fn open_log_file(path: &str) -> io::Result<File> {
    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}
