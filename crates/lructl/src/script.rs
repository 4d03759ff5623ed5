//! Script replay: one cache command per line
//!
//! ```text
//! # comment lines start with '#'
//! set <key> <value>
//! get <key>
//! clear
//! len
//! stats
//! ```
//!
//! `set` prints whether the key was present, `get` prints the value, `nil`,
//! or `(miss)`, and `stats` prints a JSON snapshot. The value `nil` stores an
//! entry without a value. Keys and values may contain `#`.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use lrucache::LruCache;
use tracing::debug;

/// Value literal standing for "present, no value"
const NIL: &str = "nil";

/// Cache type driven by scripts
pub type ScriptCache = LruCache<String, Option<String>>;

/// Parsed script line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Insert or update a key
    Set { key: String, value: Option<String> },
    /// Look up a key
    Get { key: String },
    /// Drop every entry
    Clear,
    /// Print the entry count
    Len,
    /// Print statistics
    Stats,
}

impl Command {
    /// Parse one line. Blank lines and lines starting with `#` yield `None`.
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let args: Vec<&str> = line.split_whitespace().collect();
        let command = args[0].to_lowercase();

        let parsed = match (command.as_str(), &args[1..]) {
            ("set", [key, value]) => Command::Set {
                key: key.to_string(),
                value: (*value != NIL).then(|| value.to_string()),
            },
            ("get", [key]) => Command::Get {
                key: key.to_string(),
            },
            ("clear", []) => Command::Clear,
            ("len", []) => Command::Len,
            ("stats", []) => Command::Stats,
            ("set" | "get" | "clear" | "len" | "stats", _) => {
                bail!("wrong number of arguments for '{}'", command)
            }
            _ => bail!("unknown command '{}'", args[0]),
        };

        Ok(Some(parsed))
    }

    /// Run against the cache and render the output line
    pub fn execute(&self, cache: &ScriptCache) -> Result<String> {
        let output = match self {
            Command::Set { key, value } => cache.set(key.clone(), value.clone()).to_string(),
            Command::Get { key } => match cache.get(key.as_str()) {
                Some(Some(value)) => value,
                Some(None) => NIL.to_string(),
                None => "(miss)".to_string(),
            },
            Command::Clear => {
                cache.clear();
                "OK".to_string()
            }
            Command::Len => cache.len().to_string(),
            Command::Stats => serde_json::to_string(&cache.stats().snapshot())?,
        };
        Ok(output)
    }
}

/// Open a script file, or stdin when no path is given
pub fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open script {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

/// Replay every command from `input`, writing one line per command to `out`
///
/// Stops at the first malformed line.
///
/// # Returns
/// * Number of commands executed
pub fn replay<R: BufRead, W: Write>(cache: &ScriptCache, input: R, out: &mut W) -> Result<usize> {
    let mut executed = 0;

    for (idx, line) in input.lines().enumerate() {
        let lineno = idx + 1;
        let line = line.with_context(|| format!("failed to read line {}", lineno))?;

        let Some(command) = Command::parse(&line).with_context(|| format!("line {}", lineno))?
        else {
            continue;
        };

        debug!(lineno, ?command, "executing");
        let output = command.execute(cache)?;
        writeln!(out, "{}", output)?;
        executed += 1;
    }

    Ok(executed)
}
