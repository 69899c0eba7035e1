//! HTML status page rendering
//!
//! Turns the aggregator's display lines into a small self-contained HTML
//! page with one `<select>` list, and writes it to disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Rows shown when the entry count is outside `1..=MAX_AUTO_ROWS`.
pub const DEFAULT_ROWS: usize = 10;

/// Largest entry count the list grows to fit.
pub const MAX_AUTO_ROWS: usize = 30;

const PAGE_HEAD: &str = concat!(
    "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"UTF-8\" />",
    "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\" />",
    "<title>Host IP Addresses</title><style>\n",
    "body {margin: 0;padding: 0;height: 100vh;display: flex;align-items: center;",
    "justify-content: center;background: linear-gradient(to right, #f0f2f5, #e0e7ff);",
    "font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;}\n",
    "select {width: 80ch;font-size: 1rem;padding: 10px;border-radius: 8px;",
    "border: 1px solid #ccc;box-shadow: 0 2px 5px rgba(0,0,0,0.1);background-color: white;}",
    "</style></head><body>"
);

const PAGE_TAIL: &str = "</body></html>\n";

/// Visible row count for a list of `entries` entries.
pub fn row_count(entries: usize) -> usize {
    if (1..=MAX_AUTO_ROWS).contains(&entries) {
        entries
    } else {
        DEFAULT_ROWS
    }
}

/// Render the status page. Entries appear as options in input order and are
/// HTML-escaped.
pub fn render_page(entries: &[String]) -> String {
    let mut html = String::with_capacity(PAGE_HEAD.len() + PAGE_TAIL.len() + entries.len() * 48);
    html.push_str(PAGE_HEAD);
    html.push_str(&format!("<select size=\"{}\">", row_count(entries.len())));
    for entry in entries {
        html.push_str("<option>");
        html.push_str(&escape_html(entry));
        html.push_str("</option>");
    }
    html.push_str("</select>");
    html.push_str(PAGE_TAIL);
    html
}

/// Escape the characters that are significant in HTML text and attributes.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Replace `path` with `html`.
///
/// Writes a sibling temporary file and renames it over the target, so a
/// reader never sees a half-written page.
pub fn write_page(path: &Path, html: &str) -> io::Result<()> {
    let tmp = temp_path(path);
    fs::write(&tmp, html)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "page.html".into());
    name.push(".tmp");
    path.with_file_name(name)
}
