use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::compare::NameNormalization;
use crate::selection::Region;

static DEFAULT_HASH_CACHE_FILE: &str = ".rom_librarian_hash_cache.json";

pub const DEFAULT_ROM_EXTENSIONS: &[&str] = &[
    // cartridge
    "nds", "gba", "gbc", "gb", "sfc", "smc", "nes", "n64", "z64", "v64", "md", "smd", "gen", "gg",
    "sms", "pce", "ngp", "ngc", "ws", "wsc",
    // disc
    "bin", "iso", "cue", "chd", "cso", "gcm", "rvz", "wbfs", "wad",
    // modern
    "dol", "elf", "nsp", "xci", "nca",
    // archives
    "zip", "7z", "rar", "gz",
];

pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "7z", "rar", "gz"];

pub const DEFAULT_EXCLUDED_FOLDERS: &[&str] = &[
    "media", "screenshots", "manuals", "boxart", "box art", "images", "saves", "savedata", "docs",
    "documentation", "videos",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    RomOnly,
    AllFiles,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Roots making up the "entire library" scan scope.
    pub library_roots: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub excluded_folder_names: Vec<String>,
    pub filter_mode: FilterMode,
    pub rom_extensions: Vec<String>,
    pub cache_path: PathBuf,
    /// Worker threads used for hashing. 0 lets rayon decide.
    pub hash_threads: usize,
    pub region_order: Vec<Region>,
    pub compare_case_insensitive: bool,
    pub compare_ignore_extension: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            library_roots: Vec::new(),
            ignore_patterns: Vec::new(),
            excluded_folder_names: to_strings(DEFAULT_EXCLUDED_FOLDERS),
            filter_mode: FilterMode::RomOnly,
            rom_extensions: to_strings(DEFAULT_ROM_EXTENSIONS),
            cache_path: default_cache_path(),
            hash_threads: 0,
            region_order: Region::default_order(),
            compare_case_insensitive: true,
            compare_ignore_extension: true,
        }
    }
}

impl AppConfig {
    pub fn name_normalization(&self) -> NameNormalization {
        NameNormalization {
            case_insensitive: self.compare_case_insensitive,
            ignore_extension: self.compare_ignore_extension,
        }
    }
}

/// Reads `Config.toml` (optional) and `ROM_LIBRARIAN_*` environment overrides.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("ROM_LIBRARIAN").try_parsing(true))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

fn default_cache_path() -> PathBuf {
    if let Ok(path) = env::var("HASH_CACHE_PATH") {
        return PathBuf::from(path);
    }
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(|home| Path::new(&home).join(DEFAULT_HASH_CACHE_FILE))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HASH_CACHE_FILE))
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for dir in dirs {
        let dir_path = Path::new(&dir);
        if result.iter().any(|kept| dir_path.starts_with(Path::new(kept))) {
            continue;
        }
        result.retain(|kept| !Path::new(kept).starts_with(dir_path));
        result.push(dir);
    }

    result
}
