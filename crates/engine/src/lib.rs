use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod world;

pub use app::{
    FrameReport, InputAction, InputSnapshot, LoopConfig, LoopMetricsSnapshot, Scene,
    SceneCommand, SceneRunner,
};
pub use world::{
    script_digest, Action, Character, CharacterRegistry, Direction, FileSaveStore, GridTerrain,
    HarvestReport, MemorySaveStore, MotionRecord, ObjectKind, PersistedCharacter,
    PersistedState, PersistenceError, RegistryError, SaveStore, Simulation, TerrainError,
    TerrainQuery, Vec2, WorldConfig, WorldEvent, WorldEventKind, SAVE_KEY,
};

pub const ROOT_ENV_VAR: &str = "ISOGRID_ROOT";
const SAVES_SUBDIR: &str = "saves";

/// Where the binary keeps its files. `saves_dir` exists once resolution succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub root: PathBuf,
    pub saves_dir: PathBuf,
}

impl AppPaths {
    pub fn under_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let saves_dir = root.join(SAVES_SUBDIR);
        Self { root, saves_dir }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("ISOGRID_ROOT is not valid unicode")]
    RootVarNotUnicode,
    #[error("ISOGRID_ROOT={path} is not a project root (needs Cargo.toml and crates/)")]
    InvalidEnvRoot { path: PathBuf },
    #[error("cannot locate the running executable: {0}")]
    CurrentExe(#[source] io::Error),
    #[error(
        "no project root above {start_dir}; set ISOGRID_ROOT or pass --save-dir to choose where saves go"
    )]
    RootNotFound { start_dir: PathBuf },
    #[error("failed to create save directory {path}: {source}")]
    CreateSaveDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Resolves the project root from `ISOGRID_ROOT`, else by walking up from the executable,
/// and makes sure the saves directory exists.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let path = canonical_or_raw(Path::new(&value));
            if !is_project_root(&path) {
                return Err(StartupError::InvalidEnvRoot { path });
            }
            path
        }
        Err(env::VarError::NotUnicode(_)) => return Err(StartupError::RootVarNotUnicode),
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let start_dir = exe.parent().unwrap_or(&exe).to_path_buf();
            find_project_root(&start_dir).ok_or(StartupError::RootNotFound { start_dir })?
        }
    };

    let paths = AppPaths::under_root(root);
    fs::create_dir_all(&paths.saves_dir).map_err(|source| StartupError::CreateSaveDir {
        path: paths.saves_dir.clone(),
        source,
    })?;
    Ok(paths)
}

/// Nearest ancestor of `start` (inclusive) that holds `Cargo.toml` and `crates/`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| is_project_root(candidate))
        .map(canonical_or_raw)
}

fn is_project_root(path: &Path) -> bool {
    path.join("Cargo.toml").is_file() && path.join("crates").is_dir()
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn project_at(dir: &Path) {
        fs::write(dir.join("Cargo.toml"), "[workspace]").expect("write manifest");
        fs::create_dir_all(dir.join("crates")).expect("mkdir crates");
    }

    #[test]
    fn root_needs_manifest_and_crates_dir() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(temp.path().join("Cargo.toml"), "[workspace]").expect("write manifest");
        assert!(!is_project_root(temp.path()));

        fs::create_dir_all(temp.path().join("crates")).expect("mkdir crates");
        assert!(is_project_root(temp.path()));
    }

    #[test]
    fn root_is_found_from_nested_directory() {
        let temp = TempDir::new().expect("tempdir");
        project_at(temp.path());
        let nested = temp.path().join("target").join("debug");
        fs::create_dir_all(&nested).expect("mkdir nested");

        let found = find_project_root(&nested).expect("root");
        assert_eq!(found, canonical_or_raw(temp.path()));
    }

    #[test]
    fn saves_live_under_root() {
        let paths = AppPaths::under_root("/srv/isogrid");
        assert_eq!(paths.saves_dir, PathBuf::from("/srv/isogrid/saves"));
    }
}
