//! Embedded block/file store.
//!
//! Persisted as one JSON document at a fixed build path, loaded on first use
//! and saved after every mutation, with an atomic temp-file-then-rename
//! write so a crash mid-write never leaves a truncated store on disk.

#[cfg(test)]
mod tests;

use crate::config;
use crate::error::LongError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Version {
    pub blocks: Vec<String>,
    pub size: u64,
    pub ts: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileEntry {
    pub blocks: Vec<String>,
    pub size: u64,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub ui: String,
    #[serde(default)]
    pub run: String,
    #[serde(default)]
    pub backup: String,
    #[serde(default)]
    pub versions: Vec<Version>,
    pub created: u64,
    pub modified: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Store {
    pub block_size: usize,
    pub next_block_id: u64,
    pub blocks: BTreeMap<String, String>,
    pub files: BTreeMap<String, FileEntry>,
}

impl Default for Store {
    fn default() -> Self {
        Store {
            block_size: config::BLOCK_SIZE,
            next_block_id: 1,
            blocks: BTreeMap::new(),
            files: BTreeMap::new(),
        }
    }
}

fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Parse `FS[Create][path]=role=doc,ui=none,...`'s RHS into a key/value map.
/// Unrecognized keys and bare tokens (no `=`) are dropped; recognized keys
/// are `role`, `ui`, `run`, `backup`. Missing keys are left unset here —
/// `fs_create` fills them with its own defaults.
fn parse_meta(text: &str) -> BTreeMap<String, String> {
    let mut meta = BTreeMap::new();
    let text = text.trim();
    let text = if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        &text[1..text.len() - 1]
    } else {
        text
    };
    for token in text.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        if let Some((key, val)) = token.split_once('=') {
            let key = key.trim().to_ascii_lowercase();
            let val = val.trim();
            if matches!(key.as_str(), "role" | "ui" | "run" | "backup") {
                meta.insert(key, val.to_string());
            }
        }
    }
    meta
}

/// Collapse repeated `/` and guarantee a single leading `/`.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::from("/");
    for part in path.split('/').filter(|p| !p.is_empty()) {
        if out.len() > 1 {
            out.push('/');
        }
        out.push_str(part);
    }
    out
}

impl Store {
    pub fn load(path: &Path) -> Result<Self, LongError> {
        if !path.exists() {
            return Ok(Store::default());
        }
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(LongError::from)
    }

    /// Write via a temp file in the same directory, then rename, so a crash
    /// mid-write never leaves a truncated store on disk.
    pub fn save(&self, path: &Path) -> Result<(), LongError> {
        if let Some(dir) = path.parent() {
            config::ensure_dir(dir)?;
        }
        let body = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn fs_alloc_block(&mut self) -> String {
        let id = self.next_block_id;
        self.next_block_id += 1;
        let key = id.to_string();
        self.blocks.insert(key.clone(), String::new());
        key
    }

    pub fn fs_write_block(&mut self, id: &str, content: &str) -> Result<(), LongError> {
        if !self.blocks.contains_key(id) {
            return Err(LongError::fs(format!("no such block '{id}'")));
        }
        let truncated: String = content.chars().take(self.block_size).collect();
        self.blocks.insert(id.to_string(), truncated);
        Ok(())
    }

    pub fn fs_read_block(&self, id: &str) -> Result<&str, LongError> {
        self.blocks
            .get(id)
            .map(|s| s.as_str())
            .ok_or_else(|| LongError::fs(format!("no such block '{id}'")))
    }

    fn chunk_into_blocks(&mut self, content: &str) -> Vec<String> {
        let chars: Vec<char> = content.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }
        chars
            .chunks(self.block_size)
            .map(|chunk| {
                let id = self.fs_alloc_block();
                let text: String = chunk.iter().collect();
                self.blocks.insert(id.clone(), text);
                id
            })
            .collect()
    }

    pub fn fs_create(&mut self, path: &str, meta_raw: &str) -> Result<(), LongError> {
        let path = normalize_path(path);
        if self.files.contains_key(&path) {
            return Err(LongError::fs(format!("'{path}' already exists")));
        }
        let meta = parse_meta(meta_raw);
        let field = |key: &str, default: &str| {
            meta.get(key).cloned().unwrap_or_else(|| default.to_string())
        };
        let ts = now_ts();
        self.files.insert(
            path,
            FileEntry {
                blocks: Vec::new(),
                size: 0,
                role: field("role", "doc"),
                ui: field("ui", "none"),
                run: field("run", "fg"),
                backup: field("backup", "versioned"),
                versions: Vec::new(),
                created: ts,
                modified: ts,
            },
        );
        Ok(())
    }

    pub fn fs_write_file(&mut self, path: &str, content: &str) -> Result<(), LongError> {
        let path = normalize_path(path);
        let ts = now_ts();
        let previous = self.files.get(&path).cloned();
        let new_blocks = self.chunk_into_blocks(content);
        let size = content.len() as u64;
        let entry = self.files.entry(path).or_insert_with(|| FileEntry {
            blocks: Vec::new(),
            size: 0,
            role: String::new(),
            ui: String::new(),
            run: String::new(),
            backup: String::new(),
            versions: Vec::new(),
            created: ts,
            modified: ts,
        });
        if let Some(prev) = previous {
            if !prev.blocks.is_empty() {
                entry.versions.push(Version {
                    blocks: prev.blocks,
                    size: prev.size,
                    ts: prev.modified,
                });
            }
        }
        entry.blocks = new_blocks;
        entry.size = size;
        entry.modified = ts;
        Ok(())
    }

    pub fn fs_read_file(&self, path: &str) -> Result<String, LongError> {
        let path = normalize_path(path);
        let entry = self
            .files
            .get(&path)
            .ok_or_else(|| LongError::fs(format!("no such file '{path}'")))?;
        let mut out = String::new();
        for id in &entry.blocks {
            out.push_str(self.fs_read_block(id)?);
        }
        Ok(out)
    }

    /// Immediate children of `path`: a component with no further `/` is a
    /// plain name, one with a descendant is reported with a trailing `/`.
    pub fn fs_list_dir(&self, path: &str) -> Vec<String> {
        let base = normalize_path(path);
        let prefix = if base == "/" {
            String::from("/")
        } else {
            format!("{base}/")
        };
        let mut seen = BTreeMap::new();
        for file_path in self.files.keys() {
            let Some(rest) = file_path.strip_prefix(&prefix) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            match rest.find('/') {
                Some(_) => {
                    let name = rest.split('/').next().unwrap_or(rest);
                    seen.insert(format!("{name}/"), ());
                }
                None => {
                    seen.insert(rest.to_string(), ());
                }
            }
        }
        seen.into_keys().collect()
    }

    pub fn fs_set_role(&mut self, path: &str, role: &str) -> Result<(), LongError> {
        let path = normalize_path(path);
        let entry = self
            .files
            .get_mut(&path)
            .ok_or_else(|| LongError::fs(format!("no such file '{path}'")))?;
        entry.role = role.to_string();
        entry.modified = now_ts();
        Ok(())
    }

    pub fn fs_tran(&mut self, path: &str) -> Result<(), LongError> {
        let path = normalize_path(path);
        let entry = self
            .files
            .get_mut(&path)
            .ok_or_else(|| LongError::fs(format!("no such file '{path}'")))?;
        entry.run = "bg".to_string();
        entry.role = "Tran".to_string();
        entry.modified = now_ts();
        Ok(())
    }
}

