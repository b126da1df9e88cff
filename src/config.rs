//! Typed accessors over the raw `Ini` table, the way the original
//! runtime's `WindowOptions`/app config wraps its parsed INI in
//! domain-specific getters instead of passing the raw map around.

use crate::ini::Ini;

#[derive(Debug, Clone)]
pub struct UserConfig {
    ini: Ini,
}

impl UserConfig {
    pub fn parse(source: &str) -> Self {
        Self { ini: Ini::parse(source) }
    }

    pub fn from_ini(ini: Ini) -> Self {
        Self { ini }
    }

    pub fn raw(&self) -> &Ini {
        &self.ini
    }

    pub fn app_id(&self) -> &str {
        self.ini.get("build.id").unwrap_or("app.runtime.default")
    }

    pub fn app_name(&self) -> &str {
        self.ini.get("build.name").unwrap_or("Untitled")
    }

    pub fn window_width(&self) -> u32 {
        self.ini
            .get("window.width")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1024)
    }

    pub fn window_height(&self) -> u32 {
        self.ini
            .get("window.height")
            .and_then(|v| v.parse().ok())
            .unwrap_or(768)
    }

    pub fn should_exit_application_on_close(&self) -> bool {
        self.ini
            .get("window.exit_on_close")
            .map(|v| v == "true")
            .unwrap_or(true)
    }

    pub fn debug(&self) -> bool {
        self.ini.get("debug").map(|v| v == "true").unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.ini.get(key)
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        Self::parse("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_defaults_when_unset() {
        let config = UserConfig::default();
        assert_eq!(config.app_name(), "Untitled");
        assert_eq!(config.window_width(), 1024);
        assert!(config.should_exit_application_on_close());
    }

    #[test]
    fn reads_declared_values() {
        let config = UserConfig::parse("[build]\nname = Demo\n[window]\nwidth = 640\nheight = 480\n");
        assert_eq!(config.app_name(), "Demo");
        assert_eq!(config.window_width(), 640);
        assert_eq!(config.window_height(), 480);
    }
}
