//! Line protocol for editors driving `livedoc preview --stdin`.
//!
//! One command per line:
//!
//! ```text
//! open <path>
//! save <path>
//! close <path>
//! quit
//! ```

use std::path::PathBuf;

/// A command sent by the editor.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum EditorCommand {
    /// Start previewing a document.
    Open(PathBuf),
    /// A document was saved.
    Save(PathBuf),
    /// Stop previewing a document.
    Close(PathBuf),
    /// Stop every preview and exit.
    Quit,
}

/// Parse one protocol line.
///
/// Blank lines yield `Ok(None)`. Paths may contain spaces; everything after
/// the first run of whitespace is the path.
pub(crate) fn parse_line(line: &str) -> Result<Option<EditorCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, arg) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let path = || {
        if arg.is_empty() {
            Err(format!("'{verb}' needs a path"))
        } else {
            Ok(PathBuf::from(arg))
        }
    };

    let command = match verb {
        "open" => EditorCommand::Open(path()?),
        "save" => EditorCommand::Save(path()?),
        "close" => EditorCommand::Close(path()?),
        "quit" if arg.is_empty() => EditorCommand::Quit,
        "quit" => return Err("'quit' takes no arguments".to_owned()),
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(Some(command))
}
