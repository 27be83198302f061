//! `stamp diff`: unified, context, ndiff or HTML comparison of two
//! stamps' canonical text (§4.6).

use muddle_config::StampFormat;
use similar::{ChangeTag, TextDiff};

use crate::Stamp;

/// Render the difference between two stamps' canonical text in
/// `format`, for display to the user.
pub fn diff_stamps(from: &Stamp, to: &Stamp, format: StampFormat) -> String {
    let (from_text, to_text) = (from.render(), to.render());
    match format {
        StampFormat::Unified => unified(&from_text, &to_text),
        StampFormat::Context => context(&from_text, &to_text),
        StampFormat::Ndiff => ndiff(&from_text, &to_text),
        StampFormat::Html => html(&from_text, &to_text),
    }
}

fn unified(from: &str, to: &str) -> String {
    TextDiff::from_lines(from, to)
        .unified_diff()
        .context_radius(3)
        .header("from", "to")
        .to_string()
}

/// A context-style diff: unchanged runs collapse to `...` like `diff -c`.
fn context(from: &str, to: &str) -> String {
    let diff = TextDiff::from_lines(from, to);
    let mut out = String::new();
    for group in diff.grouped_ops(3) {
        out.push_str("***************\n");
        for op in &group {
            for change in diff.iter_changes(op) {
                let marker = match change.tag() {
                    ChangeTag::Delete => "- ",
                    ChangeTag::Insert => "+ ",
                    ChangeTag::Equal => "  ",
                };
                out.push_str(marker);
                out.push_str(change.value());
            }
        }
    }
    out
}

/// Python `ndiff`-style output: every line prefixed `+`/`-`/` `, with a
/// `?` guide line under intra-line replacements elided (we don't carry
/// character-level markers, matching the subset this core needs).
fn ndiff(from: &str, to: &str) -> String {
    let diff = TextDiff::from_lines(from, to);
    let mut out = String::new();
    for change in diff.iter_all_changes() {
        let marker = match change.tag() {
            ChangeTag::Delete => "- ",
            ChangeTag::Insert => "+ ",
            ChangeTag::Equal => "  ",
        };
        out.push_str(marker);
        out.push_str(change.value());
    }
    out
}

fn html(from: &str, to: &str) -> String {
    let diff = TextDiff::from_lines(from, to);
    let mut out = String::from("<table class=\"stamp-diff\">\n");
    for change in diff.iter_all_changes() {
        let (class, sign) = match change.tag() {
            ChangeTag::Delete => ("del", "-"),
            ChangeTag::Insert => ("ins", "+"),
            ChangeTag::Equal => ("eq", " "),
        };
        let escaped = change
            .value()
            .trim_end_matches('\n')
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;");
        out.push_str(&format!("<tr class=\"{class}\"><td>{sign}</td><td>{escaped}</td></tr>\n"));
    }
    out.push_str("</table>\n");
    out
}
