mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{
    cmd_extract, cmd_miners, cmd_trie_build, cmd_trie_dump, cmd_trie_search, ExtractArgs,
};

#[derive(Parser)]
#[command(name = "nativex")]
#[command(
    about = "Streaming entity extraction and memory-mappable Patricia tries",
    long_about = "nativex - Extract entities from files with pluggable miners, and build/search Patricia tries\n\n\
    Miners are either built in (match_glob, match_glob_icase, match_dictionary) or loaded\n\
    from shared modules exporting the nativex miner ABI.\n\n\
    Examples:\n\
      nativex extract notes.txt --glob '????-??-??'\n\
      nativex extract logs.txt.gz --dict file:cities.trie --no-enclosed --format csv\n\
      nativex extract input.txt --plugin glob_entities.so:match_glob:'+1*'\n\
      nativex trie build cities.txt -o cities.trie\n\
      nativex trie search cities.trie 'new york' praha\n\
      nativex miners\n\n\
    Logging goes to stderr; set RUST_LOG (e.g. RUST_LOG=nativex=debug) for detail."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract entities from files
    Extract {
        /// Files to scan (.gz decompressed transparently)
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Built-in glob miner (repeatable)
        #[arg(long = "glob", value_name = "PATTERN")]
        globs: Vec<String>,

        /// Built-in case-insensitive glob miner (repeatable)
        #[arg(long = "glob-icase", value_name = "PATTERN")]
        globs_icase: Vec<String>,

        /// Built-in dictionary miner: "file:<trie>" or "word,word,..." (repeatable)
        #[arg(long = "dict", value_name = "SPEC")]
        dicts: Vec<String>,

        /// Shared-module miner as PATH:SYMBOL[:PARAM] (repeatable)
        #[arg(long = "plugin", value_name = "SPEC")]
        plugins: Vec<String>,

        /// JSON pipeline configuration; command-line miners are added after its miners
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Occurrences per batch
        #[arg(long, value_name = "N")]
        batch: Option<usize>,

        /// Worker threads (default: 1, "auto" for all cores)
        #[arg(short = 'j', long)]
        threads: Option<String>,

        /// Drop occurrences enclosed by longer ones
        #[arg(long)]
        no_enclosed: bool,

        /// Output format: json (default, NDJSON), csv, or text (one per line)
        #[arg(long, default_value = "json")]
        format: String,

        /// Show extraction statistics to stderr
        #[arg(short, long)]
        stats: bool,
    },

    /// Build, search and inspect Patricia tries
    Trie {
        #[command(subcommand)]
        command: TrieCommands,
    },

    /// List built-in miners
    Miners,
}

#[derive(Subcommand)]
enum TrieCommands {
    /// Build a trie from a word list (one word per line, .gz supported, "-" for stdin)
    Build {
        /// Word list
        #[arg(value_name = "WORDS")]
        words: PathBuf,

        /// Output trie file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Search a saved trie (prints one JSON object per value)
    Search {
        /// Saved trie
        #[arg(value_name = "TRIE")]
        trie: PathBuf,

        /// Values to look up
        #[arg(value_name = "VALUE", required = true)]
        values: Vec<String>,

        /// Verify the file checksum before searching
        #[arg(long)]
        verify: bool,
    },

    /// Print the node structure of a saved trie
    Dump {
        /// Saved trie
        #[arg(value_name = "TRIE")]
        trie: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing("warn");
    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            inputs,
            globs,
            globs_icase,
            dicts,
            plugins,
            config,
            batch,
            threads,
            no_enclosed,
            format,
            stats,
        } => cmd_extract(ExtractArgs {
            inputs,
            globs,
            globs_icase,
            dicts,
            plugins,
            config,
            batch,
            threads,
            no_enclosed,
            format,
            show_stats: stats,
        }),
        Commands::Trie { command } => match command {
            TrieCommands::Build { words, output } => cmd_trie_build(words, output),
            TrieCommands::Search {
                trie,
                values,
                verify,
            } => cmd_trie_search(trie, values, verify),
            TrieCommands::Dump { trie } => cmd_trie_dump(trie),
        },
        Commands::Miners => cmd_miners(),
    }
}

/// Log to stderr, filtered by RUST_LOG (falls back to `default_filter`)
fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}
