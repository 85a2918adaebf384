use anyhow::Result;
use nativex::miner::builtin;
use nativex::miner::dynamic::{DEFAULT_MINERS_PATH, MINERS_PATH_ENV};

pub fn cmd_miners() -> Result<()> {
    println!("Built-in miners:");
    for symbol in builtin::symbols() {
        println!("  {}", symbol);
    }
    let dir = std::env::var(MINERS_PATH_ENV).unwrap_or_else(|_| DEFAULT_MINERS_PATH.to_string());
    println!();
    println!("Shared modules with relative paths are loaded from: {}", dir);
    Ok(())
}
