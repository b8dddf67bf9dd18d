//! Lookup of level text resources by name.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use crate::LevelError;

const LEVEL_EXTENSION: &str = "txt";

/// Resource store that resolves a level name to its text.
pub trait LevelSource {
    /// Returns the full text of level `name`.
    fn read(&self, name: &str) -> Result<String, LevelError>;
}

/// Canonical resource name of the level with the provided number.
#[must_use]
pub fn level_name(number: u32) -> String {
    format!("Level_{number:02}")
}

/// Reads levels from `<root>/<name>.txt`.
#[derive(Clone, Debug)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Creates a source rooted at the provided directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory the levels are read from.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name).with_extension(LEVEL_EXTENSION)
    }
}

impl LevelSource for DirectorySource {
    fn read(&self, name: &str) -> Result<String, LevelError> {
        let path = self.path_for(name);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "level file not found");
                Err(LevelError::LevelNotFound {
                    level: name.to_owned(),
                })
            }
            Err(source) => Err(LevelError::Io { path, source }),
        }
    }
}

/// Serves levels held in memory, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct InMemorySource {
    levels: BTreeMap<String, String>,
}

impl InMemorySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a level, returning the source for chaining.
    #[must_use]
    pub fn with_level(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    /// Adds or replaces a level.
    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        let _ = self.levels.insert(name.into(), text.into());
    }
}

impl LevelSource for InMemorySource {
    fn read(&self, name: &str) -> Result<String, LevelError> {
        self.levels
            .get(name)
            .cloned()
            .ok_or_else(|| LevelError::LevelNotFound {
                level: name.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::load;

    #[test]
    fn level_names_are_zero_padded() {
        assert_eq!(level_name(1), "Level_01");
        assert_eq!(level_name(12), "Level_12");
    }

    #[test]
    fn directory_source_reads_txt_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("Level_01.txt"), "//1\n$1\nGX\n").expect("write level");

        let source = DirectorySource::new(dir.path());
        let definition = load(&source, "Level_01", 1).expect("level loads");
        assert_eq!(definition.width(), 2);
        assert_eq!(definition.ground_depth(), 2);
    }

    #[test]
    fn directory_source_reports_missing_levels() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = DirectorySource::new(dir.path());
        let error = load(&source, "Level_09", 1).expect_err("level is missing");
        assert!(matches!(error, LevelError::LevelNotFound { ref level } if level == "Level_09"));
    }

    #[test]
    fn in_memory_source_distinguishes_missing_level_from_missing_part() {
        let source = InMemorySource::new().with_level("Level_01", "$1\nXX\n");
        assert!(matches!(
            load(&source, "Level_02", 1),
            Err(LevelError::LevelNotFound { .. })
        ));
        assert!(matches!(
            load(&source, "Level_01", 2),
            Err(LevelError::PartNotFound { part: 2, .. })
        ));
    }
}
