//! Platform-level helpers: environment variables and well-known directories,
//! read through the global working-directory/env accessors in `utils.rs`.

use crate::error::RouteError;
use crate::utils;

#[derive(Default)]
pub struct PlatformService;

impl PlatformService {
    pub fn new() -> Self {
        Self
    }

    pub fn env(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    pub fn set_env(&self, key: &str, value: &str) {
        // SAFETY: single-threaded at call time relative to other env mutation in this process.
        unsafe {
            std::env::set_var(key, value);
        }
    }

    pub fn cwd(&self) -> String {
        utils::current_working_directory()
    }

    pub fn chdir(&self, path: &str) -> Result<(), RouteError> {
        Ok(utils::set_current_working_directory(path)?)
    }

    pub fn home_dir(&self) -> Option<String> {
        std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_round_trips() {
        let svc = PlatformService::new();
        svc.set_env("APP_RUNTIME_TEST_VAR", "1");
        assert_eq!(svc.env("APP_RUNTIME_TEST_VAR").as_deref(), Some("1"));
    }
}
