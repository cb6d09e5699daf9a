use std::fmt::Display;
use std::io::Write;

use crate::utils::TERMINAL_STDERR;

/// Write a message to stderr.
///
/// This is a wrapper around `eprintln!` that holds the terminal lock,
/// so messages don't interleave with log output.
fn print_message(v: impl Display) {
    #[cfg(test)]
    {
        let history = crate::utils::message::history::History::global();
        history.push_message(format!("{v}"));
    }

    match TERMINAL_STDERR.lock() {
        Ok(mut stderr) => {
            let _ = writeln!(stderr, "{v}");
        },
        Err(_) => eprintln!("{v}"),
    }
}

/// alias for [print_message]
pub(crate) fn plain(v: impl Display) {
    print_message(v);
}
pub(crate) fn error(v: impl Display) {
    print_message(std::format_args!("❌ ERROR: {v}"));
}
/// double width character, add an additional space for alignment
pub(crate) fn warning(v: impl Display) {
    print_message(std::format_args!("⚠️  {v}"));
}
