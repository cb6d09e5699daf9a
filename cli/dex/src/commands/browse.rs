use std::io::{Write, stdout};
use std::sync::Arc;

use anyhow::{Context, Result};
use bpaf::Bpaf;
use dex_catalog::{CatalogLoadCoordinator, Item};
use indoc::indoc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, instrument};

use crate::config::Config;
use crate::utils::display::{TerminalDetailView, render_row, stdout_is_tty};
use crate::utils::init::init_fetcher;
use crate::utils::message;

const BROWSE_HELP: &str = indoc! {"
    Commands:
      more      load the next page
      /<text>   show loaded items whose name starts with <text>
      /         clear the search
      <number>  show details of a row
      help      show this help
      quit      exit"};

// Interactively page through and search the catalog
#[derive(Debug, Bpaf, Clone)]
pub struct Browse {}

/// One line of input in the browse loop.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BrowseCommand {
    More,
    Search(String),
    ClearSearch,
    Select(usize),
    Help,
    Quit,
    Unknown(String),
}

impl BrowseCommand {
    fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(text) = line.strip_prefix('/') {
            if text.trim().is_empty() {
                return BrowseCommand::ClearSearch;
            }
            return BrowseCommand::Search(text.to_string());
        }

        match line.trim() {
            "" | "more" | "m" => BrowseCommand::More,
            "help" | "h" | "?" => BrowseCommand::Help,
            "quit" | "q" | "exit" => BrowseCommand::Quit,
            other => match other.parse::<usize>() {
                Ok(index) => BrowseCommand::Select(index),
                Err(_) => BrowseCommand::Unknown(other.to_string()),
            },
        }
    }
}

impl Browse {
    #[instrument(name = "browse", skip_all)]
    pub async fn handle(self, config: Config) -> Result<()> {
        let fetcher = init_fetcher(&config)?;
        let mut coordinator = CatalogLoadCoordinator::new(
            fetcher,
            TerminalDetailView,
            config.dex.coordinator_config(),
        );
        let mut alerts = coordinator
            .alerts()
            .context("load failure notifications already taken")?;
        let mut view = coordinator.displayed();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        let styled = stdout_is_tty();
        // Rows of the current view already on screen.
        let mut printed = 0;

        message::plain(BROWSE_HELP);
        coordinator.on_become_visible();

        loop {
            tokio::select! {
                Some(outcome) = coordinator.next_completion(), if coordinator.is_loading() => {
                    debug!(?outcome, "page applied");
                },
                Some(alert) = alerts.recv() => {
                    message::error(alert);
                },
                Ok(()) = view.changed() => {
                    let items = view.borrow_and_update().clone();
                    printed = print_rows(&items, printed, styled)?;
                },
                line = lines.next_line() => {
                    let Some(line) = line.context("Could not read from stdin")? else {
                        break;
                    };
                    match BrowseCommand::parse(&line) {
                        BrowseCommand::More => {
                            let last_visible = printed.saturating_sub(1);
                            if !coordinator.on_scrolled(last_visible) {
                                if coordinator.is_searching() {
                                    message::warning("Loading is paused while searching, clear the search with '/'");
                                } else if coordinator.is_loading() {
                                    message::plain("Still loading...");
                                }
                            }
                        },
                        BrowseCommand::Search(text) => {
                            coordinator.on_search_text_changed(&text);
                            printed = 0;
                        },
                        BrowseCommand::ClearSearch => {
                            coordinator.on_search_text_changed("");
                            printed = 0;
                        },
                        BrowseCommand::Select(index) => {
                            if coordinator.select_displayed(index).is_none() {
                                message::warning(format!("No row {index}"));
                            }
                        },
                        BrowseCommand::Help => message::plain(BROWSE_HELP),
                        BrowseCommand::Quit => break,
                        BrowseCommand::Unknown(input) => {
                            message::warning(format!("Unknown command '{input}', type 'help' for a list of commands"));
                        },
                    }
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        coordinator.shutdown().await;
        Ok(())
    }
}

/// Print the rows of `items` from `from` on, returning how many rows are printed.
///
/// A view that shrank below `from` was replaced, and is printed again in full.
fn print_rows(items: &[Arc<Item>], from: usize, styled: bool) -> Result<usize> {
    let from = if from > items.len() { 0 } else { from };
    let mut out = stdout().lock();
    if from == 0 {
        writeln!(out, "-- {} items --", items.len())?;
    }
    for (index, item) in items.iter().enumerate().skip(from) {
        writeln!(out, "{}", render_row(index, item, styled))?;
    }
    Ok(items.len())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_browse_commands() {
        assert_eq!(BrowseCommand::parse("more\n"), BrowseCommand::More);
        assert_eq!(BrowseCommand::parse(""), BrowseCommand::More);
        assert_eq!(
            BrowseCommand::parse("/Bul"),
            BrowseCommand::Search("Bul".to_string())
        );
        assert_eq!(BrowseCommand::parse("/"), BrowseCommand::ClearSearch);
        assert_eq!(BrowseCommand::parse("/   "), BrowseCommand::ClearSearch);
        assert_eq!(BrowseCommand::parse("12"), BrowseCommand::Select(12));
        assert_eq!(BrowseCommand::parse(" q "), BrowseCommand::Quit);
        assert_eq!(BrowseCommand::parse("?"), BrowseCommand::Help);
        assert_eq!(
            BrowseCommand::parse("-1"),
            BrowseCommand::Unknown("-1".to_string())
        );
    }

    #[test]
    fn search_text_keeps_inner_whitespace() {
        assert_eq!(
            BrowseCommand::parse("/mr mime"),
            BrowseCommand::Search("mr mime".to_string())
        );
    }
}
