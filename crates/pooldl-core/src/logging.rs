//! Logging init: append to a file under the XDG state dir, or fall back to stderr.

use anyhow::{anyhow, Result};
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "info,pooldl_core=debug,pooldl=debug";

/// Builds the filter: `RUST_LOG` wins; otherwise `verbosity` picks the level
/// (0 = built-in defaults, 1 = debug, 2+ = trace).
pub fn env_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbosity {
        0 => EnvFilter::new(DEFAULT_DIRECTIVES),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    })
}

/// Path of the log file, `~/.local/state/pooldl/pooldl.log`.
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pooldl")?;
    Ok(xdg_dirs.get_state_home().join("pooldl.log"))
}

/// Hands out clones of one append-mode file; a clone failure degrades that
/// one write to stderr instead of dropping the record.
struct AppendFile(File);

enum FileOrStderr {
    File(File),
    Stderr(io::Stderr),
}

impl io::Write for FileOrStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileOrStderr::File(f) => f.write(buf),
            FileOrStderr::Stderr(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileOrStderr::File(f) => f.flush(),
            FileOrStderr::Stderr(s) => s.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for AppendFile {
    type Writer = FileOrStderr;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(FileOrStderr::File)
            .unwrap_or_else(|_| FileOrStderr::Stderr(io::stderr()))
    }
}

/// Initialize structured logging to the XDG state log file.
/// Returns Err if the file cannot be opened so the caller can use stderr instead.
pub fn init_logging(verbosity: u8) -> Result<PathBuf> {
    let path = log_file_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_writer(AppendFile(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("logging already initialized: {}", e))?;

    tracing::info!("pooldl logging initialized at {}", path.display());
    Ok(path)
}

/// Initialize logging to stderr only. Used when `init_logging` fails.
pub fn init_logging_stderr(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}
