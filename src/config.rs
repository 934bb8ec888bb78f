use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub scene: SceneConfig,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
}

#[derive(Debug, Deserialize)]
pub struct SceneConfig {
    #[serde(default = "default_size")]
    pub size: f32,
    #[serde(default = "default_ticks")]
    pub ticks: usize,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default = "default_orbit_speed")]
    pub orbit_speed: f32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            crf: default_crf(),
            codec: default_codec(),
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            size: default_size(),
            ticks: default_ticks(),
            colors: Vec::new(),
            orbit_speed: default_orbit_speed(),
        }
    }
}

fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 720 }
fn default_fps() -> u32 { 30 }
fn default_crf() -> u32 { 18 }
fn default_codec() -> String { "libx264".into() }
fn default_size() -> f32 { 10.0 }
fn default_ticks() -> usize { 4 }
fn default_orbit_speed() -> f32 { 0.04 }

pub fn load_config(path: &PathBuf) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}
