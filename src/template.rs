//! Template rendering and config-file emission.
//!
//! Substitution is "safe": `$key` / `${key}` placeholders with a value are
//! replaced, unknown placeholders are left literal, and `$$` escapes a
//! dollar sign. Template/data drift therefore never fails a render - a
//! stale template just keeps its placeholder text.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Renders named templates and persists config files with a mode.
pub trait Emitter {
    fn render(&self, template: &str, values: &BTreeMap<String, String>) -> Result<String>;
    fn write(&self, path: &Path, text: &str, mode: u32) -> Result<()>;
}

/// [`Emitter`] backed by template files in a directory.
pub struct DiskTemplates {
    dir: PathBuf,
}

impl DiskTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DiskTemplates { dir: dir.into() }
    }
}

impl Emitter for DiskTemplates {
    fn render(&self, template: &str, values: &BTreeMap<String, String>) -> Result<String> {
        let path = self.dir.join(template);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading template '{}'", path.display()))?;
        Ok(safe_substitute(&text, values))
    }

    fn write(&self, path: &Path, text: &str, mode: u32) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating '{}'", parent.display()))?;
        }
        fs::write(path, text).with_context(|| format!("writing '{}'", path.display()))?;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .with_context(|| format!("setting mode on '{}'", path.display()))?;
        Ok(())
    }
}

/// Replace `$key` / `${key}` placeholders, leaving unknown keys literal.
pub fn safe_substitute(text: &str, values: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            // "$$" -> "$"
            Some((_, '$')) => {
                chars.next();
                out.push('$');
            }
            // "${key}"
            Some((_, '{')) => {
                let rest = &text[i + 2..];
                match rest.find('}') {
                    Some(end) => {
                        let key = &rest[..end];
                        match values.get(key) {
                            Some(value) => out.push_str(value),
                            None => {
                                out.push_str(&text[i..i + 2 + end + 1]);
                            }
                        }
                        // Skip "{key}" - the closing brace sits at i+2+end.
                        let close = i + 2 + end;
                        while let Some(&(j, _)) = chars.peek() {
                            if j > close {
                                break;
                            }
                            chars.next();
                        }
                    }
                    // Unterminated brace: keep literal.
                    None => out.push('$'),
                }
            }
            // "$key"
            Some((_, c2)) if c2.is_ascii_alphabetic() || *c2 == '_' => {
                let rest = &text[i + 1..];
                let len = rest
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(rest.len());
                let key = &rest[..len];
                match values.get(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('$');
                        out.push_str(key);
                    }
                }
                for _ in 0..len {
                    chars.next();
                }
            }
            _ => out.push('$'),
        }
    }
    out
}
