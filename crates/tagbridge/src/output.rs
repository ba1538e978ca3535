//! Output formatting: tables for people, JSON lines for scripts.

use std::io::{self, Write};

use tabled::{Table, Tabled, settings::Style};

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Pretty-printed JSON.
pub fn render_json_pretty<T: serde::Serialize + ?Sized>(data: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(data)
}

/// Print the rendered output to stdout.
pub fn print_output(output: &str) {
    if output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
