//! Private HOME/XDG overlay for external toolchain invocations.
//!
//! The toolchain keeps mutable global state (caches, downloaded CRS files,
//! auth tokens) under the user's home directory. Every subprocess runs with
//! those locations redirected under a private root, while `PATH` is still
//! built from the operator's real install locations so the binaries resolve.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Install directories under the real home, highest priority first.
/// Newer installer layouts come before older ones so they shadow them.
const BINARY_DIRS: &[&str] = &[".bb/bin", ".bb", ".nargo/bin", ".local/bin", ".cargo/bin"];

/// Environment overlay applied to every external command
#[derive(Debug, Clone)]
pub struct IsolatedEnvironment {
    root: PathBuf,
    search_path: OsString,
}

impl IsolatedEnvironment {
    /// Build the overlay from the current process's home directory and `PATH`
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        Self::with_real_home(root, home::home_dir().as_deref(), std::env::var_os("PATH"))
    }

    /// Build the overlay from an explicit real home and inherited `PATH`
    pub fn with_real_home(
        root: impl AsRef<Path>,
        real_home: Option<&Path>,
        inherited_path: Option<OsString>,
    ) -> io::Result<Self> {
        let root = std::path::absolute(root.as_ref())?;

        let mut dirs: Vec<PathBuf> = real_home
            .map(|home| BINARY_DIRS.iter().map(|dir| home.join(dir)).collect())
            .unwrap_or_default();
        if let Some(path) = inherited_path {
            dirs.extend(std::env::split_paths(&path));
        }
        let search_path = std::env::join_paths(dirs)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        Ok(Self { root, search_path })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn home_dir(&self) -> PathBuf {
        self.root.join("home")
    }

    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    #[must_use]
    pub fn search_path(&self) -> &OsString {
        &self.search_path
    }

    /// Create the redirected directories
    pub fn prepare(&self) -> io::Result<()> {
        for dir in [self.home_dir(), self.cache_dir(), self.config_dir(), self.data_dir()] {
            std::fs::create_dir_all(&dir)?;
            debug!("Prepared isolated directory {}", dir.display());
        }
        info!("🔒 Toolchain isolated under {}", self.root.display());
        Ok(())
    }

    /// Variables to set on each spawned command
    #[must_use]
    pub fn vars(&self) -> Vec<(&'static str, OsString)> {
        vec![
            ("HOME", self.home_dir().into_os_string()),
            ("XDG_CACHE_HOME", self.cache_dir().into_os_string()),
            ("XDG_CONFIG_HOME", self.config_dir().into_os_string()),
            ("XDG_DATA_HOME", self.data_dir().into_os_string()),
            ("PATH", self.search_path.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_path_priority() {
        let env = IsolatedEnvironment::with_real_home(
            "/srv/prover-env",
            Some(Path::new("/home/operator")),
            Some(OsString::from("/usr/bin:/bin")),
        )
        .unwrap();

        let dirs: Vec<PathBuf> = std::env::split_paths(env.search_path()).collect();
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/home/operator/.bb/bin"),
                PathBuf::from("/home/operator/.bb"),
                PathBuf::from("/home/operator/.nargo/bin"),
                PathBuf::from("/home/operator/.local/bin"),
                PathBuf::from("/home/operator/.cargo/bin"),
                PathBuf::from("/usr/bin"),
                PathBuf::from("/bin"),
            ]
        );
    }

    #[test]
    fn test_vars_redirect_under_root() {
        let env = IsolatedEnvironment::with_real_home("/srv/prover-env", None, None).unwrap();
        let vars = env.vars();

        let home = vars.iter().find(|(k, _)| *k == "HOME").unwrap();
        assert_eq!(home.1, OsString::from("/srv/prover-env/home"));
        for (key, value) in vars.iter().filter(|(k, _)| k.starts_with("XDG_")) {
            assert!(
                Path::new(value).starts_with("/srv/prover-env"),
                "{key} escapes the isolated root"
            );
        }
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let env = IsolatedEnvironment::with_real_home(".prover-env", None, None).unwrap();
        assert!(env.root().is_absolute());
    }

    #[test]
    fn test_prepare_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let env = IsolatedEnvironment::with_real_home(dir.path().join("iso"), None, None).unwrap();
        env.prepare().unwrap();
        assert!(env.home_dir().is_dir());
        assert!(env.cache_dir().is_dir());
        assert!(env.config_dir().is_dir());
        assert!(env.data_dir().is_dir());
    }
}
