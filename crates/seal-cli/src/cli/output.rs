//! Terminal output helpers.

use std::collections::BTreeMap;
use std::io::{self, Write};

const COLUMN_PADDING: usize = 3;

/// Print a `KEY`/`VALUE` table, preceded by a blank line.
pub fn print_metadata_map(out: &mut dyn Write, metadata: &BTreeMap<String, String>) -> io::Result<()> {
    let width = metadata
        .keys()
        .map(|k| k.chars().count())
        .chain(std::iter::once("KEY".len()))
        .max()
        .unwrap_or(0)
        + COLUMN_PADDING;

    writeln!(out)?;
    writeln!(out, "{:<width$}VALUE", "KEY")?;
    for (key, value) in metadata {
        writeln!(out, "{:<width$}{}", key, value)?;
    }
    Ok(())
}
