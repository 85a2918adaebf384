use anyhow::{Context, Result};
use nativex::{file_reader, MappedTrie, PatriciaTrie};
use serde_json::json;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use crate::cli_utils::{format_bytes, format_number};

pub fn cmd_trie_build(words: PathBuf, output: PathBuf) -> Result<()> {
    let start = Instant::now();
    let reader = file_reader::open(&words)
        .with_context(|| format!("Failed to open word list: {}", words.display()))?;

    let mut trie = PatriciaTrie::new();
    let mut lines = 0usize;
    for line in reader.split(b'\n') {
        let mut line = line.with_context(|| format!("Failed to read {}", words.display()))?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.is_empty() {
            continue;
        }
        lines += 1;
        trie.insert(&line);
    }

    trie.save(&output)
        .with_context(|| format!("Failed to save trie: {}", output.display()))?;

    let size = std::fs::metadata(&output).map(|m| m.len() as usize).unwrap_or(0);
    eprintln!(
        "[INFO] {} words ({} lines), {} nodes, {} written to {} in {:.2}s",
        format_number(trie.len()),
        format_number(lines),
        format_number(trie.node_count()),
        format_bytes(size),
        output.display(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

pub fn cmd_trie_search(trie: PathBuf, values: Vec<String>, verify: bool) -> Result<()> {
    let mapped = if verify {
        MappedTrie::open_verified(&trie)
    } else {
        MappedTrie::open(&trie)
    }
    .with_context(|| format!("Failed to load trie: {}", trie.display()))?;

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    for value in &values {
        let result = mapped.search_extended(value);
        let line = json!({
            "value": value,
            "found": result.matched == value.len() && result.terminal,
            "matched": result.matched,
            "terminal": result.terminal,
            "branching": result.branching,
        });
        writeln!(out, "{}", line)?;
    }
    out.flush()?;
    Ok(())
}

pub fn cmd_trie_dump(trie: PathBuf) -> Result<()> {
    let mapped = MappedTrie::open(&trie)
        .with_context(|| format!("Failed to load trie: {}", trie.display()))?;
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    mapped.dump(&mut out)?;
    out.flush()?;
    Ok(())
}
