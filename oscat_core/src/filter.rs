//! Attribute-driven content conversion.
//!
//! [`AttributeFilters`] implements both the working-tree filter (ident, eol,
//! smudge drivers) and the textconv filter (diff drivers). Drivers are named by
//! attributes and configured through the store `config` file.

use crate::attributes::{AttrSet, Attributes};
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::ObjectType;
use crate::store::Store;
use crate::traits::{CheckoutMetadata, ObjectStore, TextConvFilter, WorkingTreeFilter};
use crate::tree::{FileMode, file_modes};
use std::borrow::Cow;
use std::ffi::OsStr;
use std::io::{self, Write};
use std::process::{Output, Stdio};
use tracing::{debug, warn};

/// Filters configured by a store's `attributes` and `config` files.
pub struct AttributeFilters<'a> {
    store: &'a Store,
    attributes: Attributes,
}

impl<'a> AttributeFilters<'a> {
    /// Read the store's attributes file.
    pub fn load(store: &'a Store) -> Result<Self> {
        Ok(Self::new(store, Attributes::load(store.root())?))
    }

    pub fn new(store: &'a Store, attributes: Attributes) -> Self {
        Self { store, attributes }
    }

    fn smudge(&self, driver: &str, path: &str, content: &[u8]) -> Result<Option<Vec<u8>>> {
        let config = self.store.config();
        let Some(command) = config.smudge_command(driver) else {
            return Ok(None);
        };
        let command = command.replace("%f", &shell_quote(path));

        debug!(driver, path, "running smudge filter");
        let result = run_command(&command, &[], Some(content)).and_then(|output| {
            if output.status.success() {
                Ok(output.stdout)
            } else {
                Err(Error::filter_failed(
                    "smudge",
                    command.as_str(),
                    path,
                    format!(
                        "{}: {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    ),
                ))
            }
        });

        match result {
            Ok(converted) => Ok(Some(converted)),
            Err(e) if config.filter_required(driver) => Err(e),
            Err(e) => {
                warn!(driver, path, error = %e, "smudge filter failed; using content as stored");
                Ok(None)
            }
        }
    }
}

impl WorkingTreeFilter for AttributeFilters<'_> {
    fn apply(
        &self,
        path: &str,
        content: &[u8],
        checkout: &CheckoutMetadata,
    ) -> Result<Option<Vec<u8>>> {
        let attrs = self.attributes.lookup(path);
        let mut current = Cow::Borrowed(content);

        if attrs.is_set("ident")
            && let Some(expanded) = expand_ident(&current, &checkout.hash)
        {
            current = Cow::Owned(expanded);
        }

        if wants_crlf(&attrs, &current)
            && let Some(converted) = lf_to_crlf(&current)
        {
            current = Cow::Owned(converted);
        }

        if let Some(driver) = attrs.value("filter")
            && let Some(converted) = self.smudge(driver, path, &current)?
        {
            current = Cow::Owned(converted);
        }

        Ok(match current {
            Cow::Borrowed(_) => None,
            Cow::Owned(converted) => Some(converted),
        })
    }
}

impl TextConvFilter for AttributeFilters<'_> {
    fn convert(&self, path: &str, mode: FileMode, hash: &Hash) -> Result<Option<Vec<u8>>> {
        if !file_modes::is_regular(mode) {
            return Ok(None);
        }
        let attrs = self.attributes.lookup(path);
        let Some(driver) = attrs.value("diff") else {
            return Ok(None);
        };
        let Some(command) = self.store.config().textconv_command(driver) else {
            return Ok(None);
        };

        let (content, metadata) = self.store.read_raw(hash)?;
        if metadata.object_type != ObjectType::Blob {
            return Ok(None);
        }

        let mut input = tempfile::NamedTempFile::new()?;
        input.write_all(&content)?;
        input.flush()?;

        debug!(driver, path, "running textconv");
        let output = run_command(command, &[input.path().as_os_str()], None)?;
        if !output.status.success() {
            return Err(Error::filter_failed(
                "textconv",
                command,
                path,
                format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(Some(output.stdout))
    }
}

/// Run `command` through the shell with `args` appended after it.
fn run_command(command: &str, args: &[&OsStr], stdin: Option<&[u8]>) -> Result<Output> {
    let mut child = gix_command::prepare(command)
        .with_shell()
        .args(args.iter().copied())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let pipe = child.stdin.take();

    // Input is fed from its own thread while output is collected.
    std::thread::scope(|scope| {
        let feeder = stdin.zip(pipe).map(|(data, mut pipe)| {
            scope.spawn(move || match pipe.write_all(data) {
                // The command may exit without consuming its input.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            })
        });

        let output = child.wait_with_output()?;
        if let Some(feeder) = feeder {
            feeder
                .join()
                .map_err(|_| io::Error::other("stdin writer panicked"))??;
        }
        Ok(output)
    })
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn wants_crlf(attrs: &AttrSet, content: &[u8]) -> bool {
    if attrs.value("eol") != Some("crlf") || attrs.is_unset("text") {
        return false;
    }
    attrs.is_set("text") || !content.contains(&0)
}

/// Turn every LF not already preceded by CR into CRLF.
fn lf_to_crlf(content: &[u8]) -> Option<Vec<u8>> {
    let lone = content
        .iter()
        .enumerate()
        .filter(|&(i, &b)| b == b'\n' && (i == 0 || content[i - 1] != b'\r'))
        .count();
    if lone == 0 {
        return None;
    }

    let mut out = Vec::with_capacity(content.len() + lone);
    for (i, &b) in content.iter().enumerate() {
        if b == b'\n' && (i == 0 || content[i - 1] != b'\r') {
            out.push(b'\r');
        }
        out.push(b);
    }
    Some(out)
}

/// Expand `$Id$` (or an already expanded `$Id: ... $`) to `$Id: <hex> $`.
fn expand_ident(content: &[u8], hash: &Hash) -> Option<Vec<u8>> {
    const KEYWORD: &[u8] = b"$Id";

    let replacement = format!("$Id: {} $", hash);
    let mut out = Vec::with_capacity(content.len());
    let mut changed = false;
    let mut rest = content;

    while let Some(pos) = find(rest, KEYWORD) {
        let after = &rest[pos + KEYWORD.len()..];
        let end = match after.first() {
            Some(b'$') => Some(1),
            Some(b':') => after
                .iter()
                .position(|&b| b == b'$' || b == b'\n')
                .filter(|&i| after[i] == b'$')
                .map(|i| i + 1),
            _ => None,
        };

        match end {
            Some(end) => {
                out.extend_from_slice(&rest[..pos]);
                out.extend_from_slice(replacement.as_bytes());
                rest = &after[end..];
                changed = true;
            }
            None => {
                out.extend_from_slice(&rest[..pos + KEYWORD.len()]);
                rest = after;
            }
        }
    }
    out.extend_from_slice(rest);

    changed.then_some(out)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
