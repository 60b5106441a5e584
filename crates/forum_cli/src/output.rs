//! Terminal output helpers shared by the commands.

use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use owo_colors::OwoColorize;

#[derive(Debug, Clone, Copy, Default)]
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", "✓".bright_green(), message.bold());
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", "!".bright_yellow(), message.yellow());
    }

    /// A dimmed label followed by its value.
    pub fn info(&self, label: &str, value: &str) {
        println!("{} {}", label.dimmed(), value);
    }

    pub fn status(&self, message: &str) {
        println!("{}", message);
    }

    pub fn section(&self, title: &str) {
        println!();
        println!("{}", title.bright_cyan().bold());
    }

    pub fn kv(&self, key: &str, value: &str) {
        println!("{}: {}", key.bright_blue(), value);
    }

    pub fn list_item(&self, item: &str) {
        println!("  • {}", item);
    }

    /// Print rows under a header as a condensed table.
    pub fn table<I, R>(&self, header: &[&str], rows: I)
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = String>,
    {
        println!("{}", render_table(header, rows));
    }
}

pub fn render_table<I, R>(header: &[&str], rows: I) -> Table
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = String>,
{
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().copied());
    for row in rows {
        table.add_row(row);
    }
    table
}
