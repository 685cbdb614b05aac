//! Placeholder contents for notebooks that failed to convert.

use serde_json::{json, Value};

/// Build notebook contents with a single page holding one markdown cell that
/// shows `message`.
///
/// The shape matches what the converter emits (`cells` is a list of pages,
/// each page a list of cells) so any client that renders a notebook can
/// render the error too.
pub fn build_error(message: &str) -> Value {
    let fence = "`".repeat(longest_backtick_run(message).max(2) + 1);
    json!({
        "cells": [[
            {
                "id": 1,
                "cell_type": "markdown",
                "subtype": "view",
                "source": format!("# Conversion failed\n\n{fence}\n{message}\n{fence}"),
                "outputs": [],
            }
        ]]
    })
}

fn longest_backtick_run(text: &str) -> usize {
    text.split(|c: char| c != '`').map(str::len).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_page_one_markdown_cell() {
        let contents = build_error("syntax error on line 3");
        let pages = contents["cells"].as_array().unwrap();
        assert_eq!(pages.len(), 1);
        let cells = pages[0].as_array().unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0]["cell_type"], "markdown");
        assert!(cells[0]["source"]
            .as_str()
            .unwrap()
            .contains("syntax error on line 3"));
        assert_eq!(cells[0]["outputs"], json!([]));
    }

    #[test]
    fn deterministic() {
        assert_eq!(build_error("boom"), build_error("boom"));
        assert_ne!(build_error("boom"), build_error("bang"));
    }

    #[test]
    fn message_is_embedded_verbatim() {
        let message = "Traceback (most recent call last):\n  \"quoted\" {braces}\n";
        let contents = build_error(message);
        let source = contents["cells"][0][0]["source"].as_str().unwrap();
        assert!(source.contains(message));
    }

    #[test]
    fn fence_outlasts_backticks_in_message() {
        let message = "cell 2:\n```python\nprint(1)\n```";
        let contents = build_error(message);
        let source = contents["cells"][0][0]["source"].as_str().unwrap();
        assert!(source.starts_with("# Conversion failed\n\n````\n"));
        assert!(source.ends_with("\n````"));
        assert!(source.contains(message));

        let plain = build_error("boom");
        assert_eq!(
            plain["cells"][0][0]["source"],
            "# Conversion failed\n\n```\nboom\n```"
        );
    }
}
