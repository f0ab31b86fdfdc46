//! Output formatting for CLI commands.
//!
//! Store management and metadata commands report through [`OutputWriter`] in
//! text or JSON form. Object content is always written to stdout as raw bytes.

use anyhow::Result;
use oscat_core::Hash;
use serde::Serialize;
use std::io::{self, Write};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    stdout: io::Stdout,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stdout: io::stdout(),
        }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Write `data` as JSON, or the text produced by `text_fn`.
    ///
    /// `text_fn` is only called in text mode.
    pub fn write<T: Serialize>(&self, data: &T, text_fn: impl FnOnce() -> String) -> Result<()> {
        let mut stdout = self.stdout.lock();
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(stdout, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(stdout, "{}", text)?;
                }
            }
        }
        stdout.flush()?;
        Ok(())
    }

    /// Report a fatal error on stderr.
    ///
    /// Text mode prints `fatal: <message>` with the full context chain.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "fatal: {:#}", error);
            }
        }
    }
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Output for `init` command.
#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub result_code: u8,
    pub root: String,
    pub algorithm: String,
}

/// Output for `put` command.
#[derive(Debug, Serialize)]
pub struct PutOutput {
    pub success: bool,
    pub result_code: u8,
    pub hash: Hash,
    pub object_type: String,
    pub size: u64,
}

/// Object added during `add` command.
#[derive(Debug, Clone, Serialize)]
pub struct AddedObject {
    pub hash: Hash,
    pub path: String,
}

/// Output for `add` command.
#[derive(Debug, Serialize)]
pub struct AddOutput {
    pub success: bool,
    pub result_code: u8,
    pub objects: Vec<AddedObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<RefInfo>,
}

/// A named reference.
#[derive(Debug, Clone, Serialize)]
pub struct RefInfo {
    pub name: String,
    pub hash: Hash,
}

/// Output for `refs set` command.
#[derive(Debug, Serialize)]
pub struct RefsSetOutput {
    pub success: bool,
    pub result_code: u8,
    pub name: String,
    pub hash: Hash,
}

/// Output for `refs list` command.
#[derive(Debug, Serialize)]
pub struct RefsListOutput {
    pub success: bool,
    pub result_code: u8,
    pub refs: Vec<RefInfo>,
}

/// Output for `refs rm` command.
#[derive(Debug, Serialize)]
pub struct RefsRmOutput {
    pub success: bool,
    pub result_code: u8,
    pub name: String,
}

/// Output for `type` command.
#[derive(Debug, Serialize)]
pub struct TypeOutput {
    pub success: bool,
    pub result_code: u8,
    pub object: String,
    pub object_type: String,
}

/// Output for `size` command.
#[derive(Debug, Serialize)]
pub struct SizeOutput {
    pub success: bool,
    pub result_code: u8,
    pub object: String,
    pub size: u64,
}

/// Output for `exists` command.
#[derive(Debug, Serialize)]
pub struct ExistsOutput {
    pub success: bool,
    pub result_code: u8,
    pub object: String,
    pub exists: bool,
}
