//! Project-specific utilities live here.

use std::io::Write;

use anyhow::Context;
use serde::Serialize;

/// Write a titled, pretty-printed JSON section.
pub fn write_section<T: Serialize + ?Sized>(
    out: &mut impl Write,
    title: &str,
    value: &T,
) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to encode section '{title}'"))?;
    writeln!(out, "\n== {title}\n{body}").context("failed to write output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_has_title_and_json_body() {
        let mut out = Vec::new();
        write_section(&mut out, "Counts", &vec![1, 2]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("\n== Counts\n"));
        assert!(text.contains("[\n  1,\n  2\n]"));
    }
}
