use crate::error::SketchError;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs::File, io::Read, path::Path};

#[derive(Deserialize, Serialize)]
pub struct SketchConfig {
    #[serde(default = "SketchConfig::default_title")]
    pub title: String,
    #[serde(default = "SketchConfig::default_width")]
    pub width: u32,
    #[serde(default = "SketchConfig::default_height")]
    pub height: u32,
    #[serde(default = "SketchConfig::default_renderer")]
    pub renderer: String,
    #[serde(default = "SketchConfig::default_background")]
    pub background: Vector3<f32>,
    #[serde(default)]
    pub constants: HashMap<String, ron::Value>,
}

impl SketchConfig {
    fn default_title() -> String {
        "rhaisketch".to_string()
    }

    fn default_width() -> u32 {
        100
    }

    fn default_height() -> u32 {
        100
    }

    fn default_renderer() -> String {
        "java2d".to_string()
    }

    fn default_background() -> Vector3<f32> {
        Vector3::new(0.8, 0.8, 0.8)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SketchError> {
        let mut file = File::open(path)?;
        let mut buffer = String::new();
        file.read_to_string(&mut buffer)?;
        Ok(ron::from_str(&buffer)?)
    }
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            title: Self::default_title(),
            width: Self::default_width(),
            height: Self::default_height(),
            renderer: Self::default_renderer(),
            background: Self::default_background(),
            constants: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: SketchConfig = ron::from_str("(width: 640, title: \"orbits\")").unwrap();
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 100);
        assert_eq!(config.title, "orbits");
        assert_eq!(config.renderer, "java2d");
        assert_eq!(config.background, Vector3::new(0.8, 0.8, 0.8));
        assert!(config.constants.is_empty());
    }

    #[test]
    fn constants_keep_their_ron_values() {
        let config: SketchConfig =
            ron::from_str("(constants: { \"GRID\": 16, \"PALETTE\": [\"red\", \"blue\"] })").unwrap();
        assert_eq!(config.constants.len(), 2);
        assert!(matches!(config.constants["PALETTE"], ron::Value::Seq(ref items) if items.len() == 2));
    }
}
