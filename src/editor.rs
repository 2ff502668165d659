//! Spawning the user's text editor on the listing.
//!
//! The listing is written to a temporary file, the editor command runs on it,
//! and the possibly rewritten content is read back by path afterwards.
//! Reading by path matters: editors like vim replace the file rather than
//! writing through the original handle.

use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::process::Command;

/// Errors produced while resolving or running the editor.
#[derive(Debug)]
pub enum EditorError {
    /// No editor command could be resolved from the flag, the environment,
    /// or the configuration file.
    NoEditor,
    /// The configured command is empty.
    EmptyCommand,
    /// The listing could not be written to a temporary file.
    TempFile { source: io::Error },
    /// The editor process could not be started.
    Spawn { command: String, source: io::Error },
    /// The editor exited with a non-zero status; the edit is discarded.
    NonZeroExit { command: String },
    /// The edited listing could not be read back.
    ReadBack { source: io::Error },
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorError::NoEditor => {
                write!(
                    f,
                    "No editor configured; set $EDITOR, pass --editor, or configure one"
                )
            }
            EditorError::EmptyCommand => write!(f, "Editor command is empty"),
            EditorError::TempFile { source } => {
                write!(f, "Failed to write listing to a temporary file: {}", source)
            }
            EditorError::Spawn { command, source } => {
                write!(f, "Failed to run editor '{}': {}", command, source)
            }
            EditorError::NonZeroExit { command } => {
                write!(f, "Editor '{}' did not exit gracefully", command)
            }
            EditorError::ReadBack { source } => {
                write!(f, "Failed to read the edited listing: {}", source)
            }
        }
    }
}

impl std::error::Error for EditorError {}

/// Picks the editor command to use: an explicit flag wins, then `$EDITOR`,
/// then the configured fallback.
pub fn resolve_command(
    flag: Option<&str>,
    config_fallback: Option<&str>,
) -> Result<String, EditorError> {
    if let Some(command) = flag {
        return Ok(command.to_string());
    }
    if let Ok(command) = env::var("EDITOR")
        && !command.trim().is_empty()
    {
        return Ok(command);
    }
    if let Some(command) = config_fallback {
        return Ok(command.to_string());
    }
    Err(EditorError::NoEditor)
}

/// Writes `initial` to a temporary file, opens it in the editor, and returns
/// the content after the editor exits. The command string is split on
/// whitespace; the first token is the program, the rest are leading
/// arguments.
pub fn edit_text(command: &str, initial: &str) -> Result<String, EditorError> {
    let mut parts = command.split_whitespace();
    let program = parts.next().ok_or(EditorError::EmptyCommand)?;

    let file = tempfile::Builder::new()
        .prefix("umv-")
        .suffix(".list")
        .tempfile()
        .map_err(|source| EditorError::TempFile { source })?;
    fs::write(file.path(), initial).map_err(|source| EditorError::TempFile { source })?;

    let status = Command::new(program)
        .args(parts)
        .arg(file.path())
        .status()
        .map_err(|source| EditorError::Spawn {
            command: command.to_string(),
            source,
        })?;
    if !status.success() {
        return Err(EditorError::NonZeroExit {
            command: command.to_string(),
        });
    }

    fs::read_to_string(file.path()).map_err(|source| EditorError::ReadBack { source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins_over_fallback() {
        let command =
            resolve_command(Some("nano"), Some("vi")).expect("Failed to resolve command");
        assert_eq!(command, "nano");
    }

    #[test]
    fn test_fallback_is_used_without_flag_or_environment() {
        // $EDITOR may be set in the environment running the tests, in which
        // case it legitimately wins over the fallback.
        let command = resolve_command(None, Some("vi")).expect("Failed to resolve command");
        if env::var("EDITOR").map(|v| v.trim().is_empty()).unwrap_or(true) {
            assert_eq!(command, "vi");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_noop_editor_returns_listing_unchanged() {
        let text = edit_text("true", "a.txt\nb.txt\n").expect("edit failed");
        assert_eq!(text, "a.txt\nb.txt\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_editor_is_an_error() {
        let result = edit_text("false", "a.txt\n");
        assert!(matches!(result, Err(EditorError::NonZeroExit { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_editor_is_an_error() {
        let result = edit_text("definitely-not-an-editor-7f3a", "a.txt\n");
        assert!(matches!(result, Err(EditorError::Spawn { .. })));
    }
}
