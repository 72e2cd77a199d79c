use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::BuildError;

/// Translation units waiting to be compiled into one artifact.
#[derive(Debug, Clone)]
pub struct SourceSet {
    module_name: String,
    target_dir: PathBuf,
    sources: Vec<PathBuf>,
}

impl SourceSet {
    /// `module_name` may be dotted (`pkg.module`); the last segment names the artifact.
    pub fn new(module_name: impl Into<String>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            module_name: module_name.into(),
            target_dir: target_dir.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    pub fn add_source(&mut self, path: impl Into<PathBuf>) {
        self.sources.push(path.into());
    }

    /// Write `text` to `file_name` inside the target directory and add it.
    pub fn write_source(&mut self, file_name: &str, text: &str) -> Result<PathBuf, BuildError> {
        let path = self.write_file(file_name, text)?;
        self.sources.push(path.clone());
        Ok(path)
    }

    /// Write a file next to the sources (a header) without compiling it.
    pub fn write_file(&self, file_name: &str, text: &str) -> Result<PathBuf, BuildError> {
        fs::create_dir_all(&self.target_dir)
            .map_err(|err| BuildError::io(&self.target_dir, err))?;
        let path = self.target_dir.join(file_name);
        fs::write(&path, text).map_err(|err| BuildError::io(&path, err))?;
        Ok(path)
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn artifact_stem(&self) -> &str {
        self.module_name
            .rsplit('.')
            .next()
            .filter(|stem| !stem.is_empty())
            .unwrap_or("module")
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn listing(&self) -> SourceListing {
        SourceListing::new(&self.sources)
    }
}

/// Line-numbered dump of every source in a set, attached to build failures.
#[derive(Debug, Clone)]
pub struct SourceListing {
    files: Vec<(PathBuf, Option<String>)>,
}

impl SourceListing {
    pub fn new(paths: &[PathBuf]) -> Self {
        Self {
            files: paths
                .iter()
                .map(|path| (path.clone(), fs::read_to_string(path).ok()))
                .collect(),
        }
    }
}

impl fmt::Display for SourceListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (path, text) in &self.files {
            writeln!(f, "// {}", path.display())?;
            match text {
                Some(text) => {
                    for (number, line) in text.lines().enumerate() {
                        writeln!(f, "{:>4} | {line}", number + 1)?;
                    }
                }
                None => writeln!(f, "     | <unreadable>")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_stem_uses_last_segment() {
        let set = SourceSet::new("__test__.build", "/tmp");
        assert_eq!(set.artifact_stem(), "build");
        assert_eq!(SourceSet::new("plain", "/tmp").artifact_stem(), "plain");
    }

    #[test]
    fn test_listing_numbers_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut set = SourceSet::new("listing", dir.path());
        set.write_source("main.cpp", "int a;\nint b;\n").unwrap();

        let listing = set.listing().to_string();
        assert!(listing.contains("   1 | int a;"));
        assert!(listing.contains("   2 | int b;"));
    }
}
