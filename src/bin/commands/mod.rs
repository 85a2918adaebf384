pub mod extract_cmd;
pub mod miners_cmd;
pub mod trie_cmd;

pub use extract_cmd::{cmd_extract, ExtractArgs};
pub use miners_cmd::cmd_miners;
pub use trie_cmd::{cmd_trie_build, cmd_trie_dump, cmd_trie_search};
