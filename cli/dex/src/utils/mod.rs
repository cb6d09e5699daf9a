use std::io::Stderr;
use std::sync::{LazyLock, Mutex};

pub mod display;
pub mod init;
pub mod message;

/// Shared handle on stderr; log lines and messages take this lock to write.
pub static TERMINAL_STDERR: LazyLock<Mutex<Stderr>> =
    LazyLock::new(|| Mutex::new(std::io::stderr()));
