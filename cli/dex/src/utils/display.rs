use std::io::{Write, stdout};
use std::sync::Arc;

use anyhow::Result;
use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use dex_catalog::{DetailView, Item};
use indoc::formatdoc;
use itertools::Itertools;

/// Whether stdout is a terminal and output may be styled.
pub fn stdout_is_tty() -> bool {
    stdout().is_tty()
}

/// One row of a listing: position, display name and categories.
pub fn render_row(index: usize, item: &Item, styled: bool) -> String {
    let name = item.display_name();
    let name = if styled {
        format!("{:<20}", name).bold().to_string()
    } else {
        format!("{:<20}", name)
    };
    format!("{index:>4}  {name} {}", render_categories(item))
}

/// First category, and the second one only if the item has one.
fn render_categories(item: &Item) -> String {
    match item.categories.as_slice() {
        [] => String::new(),
        [first] => first.clone(),
        [first, second, ..] => format!("{first} / {second}"),
    }
}

pub fn render_detail(item: &Item) -> String {
    let categories = if item.categories.is_empty() {
        "-".to_string()
    } else {
        item.categories.iter().join(", ")
    };
    formatdoc! {"
        {name}
          categories: {categories}
          image:      {image}",
        name = item.display_name(),
        categories = categories,
        image = item.image.as_deref().unwrap_or("-"),
    }
}

/// Print `items` to stdout, either as rows or as a JSON array.
pub fn print_items(items: &[Arc<Item>], json: bool) -> Result<()> {
    let mut out = stdout().lock();
    if json {
        let items = items.iter().map(Arc::as_ref).collect::<Vec<&Item>>();
        writeln!(out, "{}", serde_json::to_string_pretty(&items)?)?;
        return Ok(());
    }

    let styled = stdout_is_tty();
    for (index, item) in items.iter().enumerate() {
        writeln!(out, "{}", render_row(index, item, styled))?;
    }
    Ok(())
}

/// Shows a selected item on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalDetailView;

impl DetailView for TerminalDetailView {
    fn show(&self, item: Arc<Item>) {
        let _ = writeln!(stdout().lock(), "{}", render_detail(&item));
    }
}
