//! CSV manifest of ingested documents
//!
//! A single-column CSV with a `Name` header, one document filename per row.

use crate::error::Result;
use std::path::{Path, PathBuf};

const HEADER: &str = "Name";

/// Manifest file listing ingested documents
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    names: Vec<String>,
}

impl Manifest {
    /// Load the manifest at `path`, or start an empty one if the file is missing
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let names = if path.exists() {
            parse(&std::fs::read_to_string(&path)?)
        } else {
            Vec::new()
        };
        Ok(Self { path, names })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name.trim())
    }

    /// Add a name and persist. Returns `false` if it was already listed.
    pub fn append(&mut self, name: &str) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() || self.contains(name) {
            return Ok(false);
        }
        self.names.push(name.to_string());
        self.save()?;
        log::info!("Added {} to manifest {}", name, self.path.display());
        Ok(true)
    }

    /// Remove a name and persist. Returns `false` if it was not listed.
    pub fn remove(&mut self, name: &str) -> Result<bool> {
        let before = self.names.len();
        self.names.retain(|n| n != name.trim());
        if self.names.len() == before {
            return Ok(false);
        }
        self.save()?;
        log::info!("Removed {} from manifest {}", name, self.path.display());
        Ok(true)
    }

    /// Serialized manifest contents
    pub fn to_csv(&self) -> String {
        let mut out = String::from(HEADER);
        out.push('\n');
        for name in &self.names {
            out.push_str(&quote(name));
            out.push('\n');
        }
        out
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, self.to_csv())?;
        Ok(())
    }
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Parse rows after the header, trimming names and dropping blank rows
fn parse(content: &str) -> Vec<String> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            '\n' if !in_quotes => rows.push(std::mem::take(&mut field)),
            '\r' if !in_quotes => {}
            _ => field.push(c),
        }
    }
    if !field.is_empty() {
        rows.push(field);
    }

    rows.into_iter()
        .skip(1)
        .map(|row| row.trim().to_string())
        .filter(|row| !row.is_empty())
        .collect()
}
