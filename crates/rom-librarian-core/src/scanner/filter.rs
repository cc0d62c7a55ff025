use ahash::AHashSet;
use glob::Pattern;
use std::path::Path;
use tracing::error;

use crate::config::{AppConfig, FilterMode};
use crate::model::lowercase_extension;

/// Decides which enumerated paths are scan candidates.
#[derive(Debug, Clone)]
pub struct FileFilter {
    mode: FilterMode,
    rom_extensions: AHashSet<String>,
    excluded_folders: AHashSet<String>,
    ignore_patterns: Vec<Pattern>,
}

impl FileFilter {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.filter_mode, config)
    }

    /// Same lists as `config`, overriding only the mode.
    pub fn new(mode: FilterMode, config: &AppConfig) -> Self {
        let lower = |values: &[String]| -> AHashSet<String> {
            values
                .iter()
                .map(|v| v.trim_start_matches('.').to_lowercase())
                .collect()
        };

        let ignore_patterns = config
            .ignore_patterns
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();

        Self {
            mode,
            rom_extensions: lower(&config.rom_extensions),
            excluded_folders: config
                .excluded_folder_names
                .iter()
                .map(|n| n.to_lowercase())
                .collect(),
            ignore_patterns,
        }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(path))
    }

    /// Whether a directory should be pruned from a recursive walk.
    pub fn skips_directory(&self, dir: &Path) -> bool {
        if self.is_ignored(dir) {
            return true;
        }
        self.mode == FilterMode::RomOnly
            && dir
                .file_name()
                .map(|name| self.is_excluded_folder(&name.to_string_lossy()))
                .unwrap_or(false)
    }

    pub fn is_excluded_folder(&self, name: &str) -> bool {
        self.excluded_folders.contains(&name.to_lowercase())
    }

    pub fn includes(&self, path: &Path) -> bool {
        if self.is_ignored(path) {
            return false;
        }
        if self.mode == FilterMode::AllFiles {
            return true;
        }

        let in_excluded_folder = path
            .parent()
            .into_iter()
            .flat_map(|p| p.components())
            .any(|c| self.is_excluded_folder(&c.as_os_str().to_string_lossy()));
        if in_excluded_folder {
            return false;
        }

        lowercase_extension(path)
            .map(|ext| self.rom_extensions.contains(&ext))
            .unwrap_or(false)
    }

    pub fn is_rom_extension(&self, ext: &str) -> bool {
        self.rom_extensions.contains(&ext.to_lowercase())
    }
}
