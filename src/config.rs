use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::DEFAULT_CACHE_PATH;
use crate::mapper::{FrameMapper, Gradient, DEFAULT_GRADIENT};
use crate::pool::DEFAULT_WORKERS;
use crate::scheduler::SchedulingMode;

/// Config file name looked up in the data directory and the working directory.
pub const CONFIG_FILE_STEM: &str = "vidscii";

/// Extraction size and, optionally, a gradient of its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub gradient: Option<String>,
}

fn default_presets() -> HashMap<String, Preset> {
    let mut presets = HashMap::new();
    presets.insert("default".to_string(), Preset { width: 80, height: 60, gradient: None });
    presets.insert("small".to_string(), Preset { width: 40, height: 30, gradient: None });
    presets.insert(
        "large".to_string(),
        Preset {
            width: 160,
            height: 120,
            gradient: Some(" .'`^,:;Il!i><~+_-?][}{1)(|/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$".chars().rev().collect()),
        },
    );
    presets
}

fn default_preset_name() -> String {
    "default".to_string()
}

fn default_gradient() -> String {
    DEFAULT_GRADIENT.to_string()
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_PATH)
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("resources")
}

fn default_input_path() -> PathBuf {
    PathBuf::from("resources/input.mp4")
}

fn default_true() -> bool {
    true
}

/// Application configuration with presets, gradient and file locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_presets")]
    pub presets: HashMap<String, Preset>,
    #[serde(default = "default_preset_name")]
    pub default_preset: String,
    #[serde(default = "default_gradient")]
    pub gradient: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    /// Scratch space for extracted frames, audio and downloads
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_input_path")]
    pub input_path: PathBuf,
    #[serde(default)]
    pub scheduling: SchedulingMode,
    #[serde(default = "default_true")]
    pub status_line: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            presets: default_presets(),
            default_preset: default_preset_name(),
            gradient: default_gradient(),
            workers: default_workers(),
            cache_path: default_cache_path(),
            work_dir: default_work_dir(),
            input_path: default_input_path(),
            scheduling: SchedulingMode::default(),
            status_line: true,
        }
    }
}

/// Size and gradient a run maps frames with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub gradient: Gradient,
}

impl RenderSettings {
    pub fn mapper(&self) -> FrameMapper {
        FrameMapper::new(self.gradient.clone()).with_size(self.width, self.height)
    }
}

impl AppConfig {
    /// Load configuration from a JSON or TOML file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let config: AppConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&text).with_context(|| format!("parsing config toml {}", path.display()))?,
            _ => serde_json::from_str(&text).with_context(|| format!("parsing config json {}", path.display()))?,
        };
        config
            .validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Look for a config file in app support, current dir fallback, then built-in default
    pub fn discover() -> Result<Self> {
        for p in Self::search_paths() {
            if p.is_file() {
                log::debug!("using config {}", p.display());
                return Self::from_file(&p);
            }
        }
        Ok(Self::default())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut tried: Vec<PathBuf> = Vec::new();
        let names = [format!("{}.json", CONFIG_FILE_STEM), format!("{}.toml", CONFIG_FILE_STEM)];
        if let Some(mut d) = dirs::data_dir() {
            d.push(CONFIG_FILE_STEM);
            for name in &names {
                tried.push(d.join(name));
            }
        }
        for name in &names {
            tried.push(PathBuf::from(name));
        }
        tried
    }

    pub fn validate(&self) -> Result<()> {
        Gradient::new(&self.gradient).context("gradient")?;
        if self.workers == 0 {
            return Err(anyhow!("workers must be at least 1"));
        }
        for (name, preset) in &self.presets {
            if preset.width == 0 || preset.height == 0 {
                return Err(anyhow!("preset '{}' has a zero dimension", name));
            }
            if let Some(g) = &preset.gradient {
                Gradient::new(g).with_context(|| format!("gradient of preset '{}'", name))?;
            }
        }
        Ok(())
    }

    pub fn get_preset(&self, name: &str) -> Option<&Preset> {
        self.presets.get(name)
    }

    /// Settings for the named preset, or the default preset if `None`.
    ///
    /// A preset gradient takes precedence over the top-level one.
    pub fn render_settings(&self, preset_name: Option<&str>) -> Result<RenderSettings> {
        let name = preset_name.unwrap_or(&self.default_preset);
        let preset = self
            .get_preset(name)
            .ok_or_else(|| anyhow!("Preset '{}' not found", name))?;
        let gradient = preset.gradient.as_deref().unwrap_or(&self.gradient);
        Ok(RenderSettings {
            width: preset.width,
            height: preset.height,
            gradient: Gradient::new(gradient).with_context(|| format!("gradient of preset '{}'", name))?,
        })
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.work_dir.join("frames")
    }

    pub fn audio_path(&self) -> PathBuf {
        self.work_dir.join("input.mp3")
    }

    pub fn download_path(&self) -> PathBuf {
        self.work_dir.join("dl.mp4")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        cfg.validate().unwrap();
        let settings = cfg.render_settings(None).unwrap();
        assert_eq!((settings.width, settings.height), (80, 60));
        assert_eq!(settings.gradient.as_str(), DEFAULT_GRADIENT);
        assert_eq!(cfg.frames_dir(), PathBuf::from("resources/frames"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidscii.json");
        fs::write(&path, r##"{"gradient": "#. ", "workers": 4, "scheduling": "per-tick"}"##).unwrap();

        let cfg = AppConfig::from_file(&path).unwrap();
        assert_eq!(cfg.gradient, "#. ");
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.scheduling, SchedulingMode::PerTick);
        assert!(cfg.status_line);
        assert_eq!(cfg.cache_path, PathBuf::from("frames.dat"));
        assert!(cfg.get_preset("small").is_some());
    }

    #[test]
    fn test_toml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidscii.toml");
        fs::write(
            &path,
            r#"
default_preset = "tiny"
status_line = false

[presets.tiny]
width = 8
height = 6
gradient = "@ "
"#,
        )
        .unwrap();

        let cfg = AppConfig::from_file(&path).unwrap();
        assert!(!cfg.status_line);
        let settings = cfg.render_settings(None).unwrap();
        assert_eq!((settings.width, settings.height), (8, 6));
        assert_eq!(settings.gradient.as_str(), "@ ");
        assert!(cfg.render_settings(Some("default")).is_err());
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");

        fs::write(&path, r#"{"gradient": "ab\r"}"#).unwrap();
        assert!(AppConfig::from_file(&path).is_err());

        fs::write(&path, r#"{"workers": 0}"#).unwrap();
        assert!(AppConfig::from_file(&path).is_err());

        fs::write(&path, r#"{"presets": {"x": {"width": 0, "height": 3}}}"#).unwrap();
        assert!(AppConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_large_preset_is_dense_first() {
        let settings = AppConfig::default().render_settings(Some("large")).unwrap();
        assert!(settings.gradient.as_str().starts_with('$'));
        assert!(settings.gradient.as_str().ends_with(' '));
    }
}
