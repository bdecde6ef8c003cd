//! Model directory lookup.
//!
//! Models are `*.gguf` files in one flat directory and are addressed by file
//! stem. A missing directory lists as empty.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crate::error::EngineError;

/// File extension of loadable models.
pub const MODEL_EXTENSION: &str = "gguf";

/// Flat directory of model files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDirectory {
    root: PathBuf,
}

impl ModelDirectory {
    /// Wrap a directory path. The directory does not need to exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sorted model names.
    ///
    /// # Errors
    ///
    /// - `EngineError::Io` if the directory exists but cannot be read
    pub fn list(&self) -> Result<Vec<String>, EngineError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut models = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != MODEL_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                models.push(stem.to_owned());
            }
        }

        models.sort();
        Ok(models)
    }

    /// Path of the model file for `name`.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidModelName` if `name` is empty or not a plain
    ///   file name
    /// - `EngineError::ModelNotFound` if the file does not exist
    pub fn resolve(&self, name: &str) -> Result<PathBuf, EngineError> {
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && Path::new(name).components().count() == 1;
        if !plain {
            return Err(EngineError::InvalidModelName(name.to_owned()));
        }

        let path = self.root.join(format!("{name}.{MODEL_EXTENSION}"));
        if !path.is_file() {
            return Err(EngineError::ModelNotFound(path));
        }
        Ok(path)
    }
}
