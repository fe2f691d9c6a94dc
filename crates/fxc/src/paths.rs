use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "FXC_CONFIG_DIR";
pub const ENV_CACHE_DIR: &str = "FXC_CACHE_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Magpie";
const APPLICATION: &str = "fxc";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    cache_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let config_override = env_override(ENV_CONFIG_DIR);
        let cache_override = env_override(ENV_CACHE_DIR);
        if let (Some(config_dir), Some(cache_dir)) = (&config_override, &cache_override) {
            return Ok(Self {
                config_dir: config_dir.clone(),
                cache_dir: cache_dir.clone(),
            });
        }

        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self {
            config_dir: config_override.unwrap_or_else(|| project_dirs.config_dir().to_path_buf()),
            cache_dir: cache_override.unwrap_or_else(|| project_dirs.cache_dir().to_path_buf()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("fxc.toml")
    }

    pub fn effect_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("effects")
    }
}

#[cfg(test)]
impl AppPaths {
    pub fn from_raw(config_dir: PathBuf, cache_dir: PathBuf) -> Self {
        Self {
            config_dir,
            cache_dir,
        }
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.as_os_str().is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    struct EnvGuard {
        key: &'static str,
        previous: Option<OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &Path) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = self.previous.take() {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    #[test]
    fn env_overrides_take_precedence() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let config_dir = root.path().join("config");
        let cache_dir = root.path().join("cache");

        let _config_guard = EnvGuard::set(ENV_CONFIG_DIR, &config_dir);
        let _cache_guard = EnvGuard::set(ENV_CACHE_DIR, &cache_dir);

        let paths = AppPaths::discover().unwrap();
        assert_eq!(paths.config_dir(), config_dir.as_path());
        assert_eq!(paths.cache_dir(), cache_dir.as_path());
        assert_eq!(paths.config_file(), config_dir.join("fxc.toml"));
        assert_eq!(paths.effect_cache_dir(), cache_dir.join("effects"));
    }

    #[test]
    fn empty_override_is_ignored() {
        let _guard = env_lock().lock().unwrap();
        let _config_guard = EnvGuard::set(ENV_CONFIG_DIR, Path::new(""));
        assert_eq!(env_override(ENV_CONFIG_DIR), None);
    }
}
