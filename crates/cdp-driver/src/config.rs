//! Launch and tuning configuration for the Chromium driver.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Browser binary; searched for when unset or missing.
    pub executable: Option<PathBuf>,
    /// Profile directory; a throwaway profile is used when unset.
    pub user_data_dir: Option<PathBuf>,
    pub headless: bool,
    pub no_sandbox: bool,
    /// Navigation counts as settled once at most this many requests are in flight...
    pub idle_max_inflight: usize,
    /// ...for this long.
    pub idle_quiet_ms: u64,
    pub idle_poll_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            executable: None,
            user_data_dir: None,
            headless: env_flag("RTV_HEADLESS").unwrap_or(true),
            no_sandbox: env_flag("RTV_NO_SANDBOX").unwrap_or(false),
            idle_max_inflight: 2,
            idle_quiet_ms: 500,
            idle_poll_ms: 50,
            request_timeout_ms: 30_000,
        }
    }
}

impl DriverConfig {
    pub fn resolve_executable(&self) -> Option<PathBuf> {
        self.locate_browser().map(|found| found.path)
    }

    pub fn locate_browser(&self) -> Option<BrowserLocation> {
        BrowserSearch::from_env().locate(self.executable.as_deref())
    }
}

/// `1/true/yes/on` or `0/false/no/off`; anything else is ignored.
fn env_flag(key: &str) -> Option<bool> {
    let value = env::var(key).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrowserSource {
    /// `browser.executable` / `--chrome`.
    Configured,
    /// `RTV_CHROME`.
    Environment,
    /// Found on `PATH`.
    SearchPath,
    /// A well-known install location.
    Install,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrowserLocation {
    pub path: PathBuf,
    pub source: BrowserSource,
}

/// Where to look for a browser, in priority order after the configured path.
#[derive(Clone, Debug, Default)]
pub struct BrowserSearch {
    pub env_override: Option<PathBuf>,
    pub binary_names: Vec<String>,
    pub install_paths: Vec<PathBuf>,
}

#[cfg(windows)]
const BINARY_NAMES: &[&str] = &["chrome.exe", "chromium.exe", "msedge.exe"];
#[cfg(not(windows))]
const BINARY_NAMES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome-stable",
    "google-chrome",
];

impl BrowserSearch {
    /// Search list for this machine. `RTV_SKIP_OS_PATHS` drops install paths.
    pub fn from_env() -> Self {
        let env_override = env::var("RTV_CHROME")
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);
        let skip_installs = env::var("RTV_SKIP_OS_PATHS")
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false);
        Self {
            env_override,
            binary_names: BINARY_NAMES.iter().map(|name| name.to_string()).collect(),
            install_paths: if skip_installs {
                Vec::new()
            } else {
                install_paths()
            },
        }
    }

    /// First existing candidate: configured path, env override, `PATH`, installs.
    pub fn locate(&self, configured: Option<&Path>) -> Option<BrowserLocation> {
        let explicit = [
            (configured.map(Path::to_path_buf), BrowserSource::Configured),
            (self.env_override.clone(), BrowserSource::Environment),
        ];
        for (candidate, source) in explicit {
            match candidate {
                Some(path) if !path.as_os_str().is_empty() && path.is_file() => {
                    return Some(BrowserLocation { path, source });
                }
                Some(path) if !path.as_os_str().is_empty() => {
                    tracing::warn!(
                        target: "cdp-driver",
                        path = %path.display(),
                        ?source,
                        "browser executable not found; searching further"
                    );
                }
                _ => {}
            }
        }

        self.binary_names
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(|path| BrowserLocation {
                path,
                source: BrowserSource::SearchPath,
            })
            .or_else(|| {
                self.install_paths
                    .iter()
                    .find(|path| path.is_file())
                    .map(|path| BrowserLocation {
                        path: path.clone(),
                        source: BrowserSource::Install,
                    })
            })
    }
}

/// Convenience for callers without a `DriverConfig`.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    BrowserSearch::from_env().locate(None).map(|found| found.path)
}

fn install_paths() -> Vec<PathBuf> {
    if cfg!(windows) {
        ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
            .iter()
            .filter_map(|key| env::var(key).ok())
            .flat_map(|root| {
                let root = PathBuf::from(root.trim());
                [
                    root.join("Chromium/Application/chrome.exe"),
                    root.join("Google/Chrome/Application/chrome.exe"),
                ]
            })
            .collect()
    } else if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
        ]
    } else {
        ["/usr/bin", "/usr/local/bin", "/snap/bin"]
            .iter()
            .flat_map(|dir| {
                BINARY_NAMES
                    .iter()
                    .map(move |name| Path::new(dir).join(name))
            })
            .collect()
    }
}
