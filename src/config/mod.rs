//! Configuration loading and validation

mod schema;

pub use schema::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config(path: &Path) -> Result<ChamberConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {:?}", path))?;
    let config: ChamberConfig = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config: {:?}", path))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::Shape;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_minimal_config() {
        let yaml = r#"
audio:
  sample_rate: 44100
  block_size: 512

voices: []
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.audio.block_size, 512);
        assert_eq!(config.tick_rate, 60);
        assert!(config.resonators.is_empty());
    }

    #[test]
    fn test_load_example_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(include_str!("../../chamber.example.yaml").as_bytes())
            .unwrap();

        let config = load_config(file.path()).unwrap();
        assert!(!config.voices.is_empty());
        assert!(!config.resonators.is_empty());
        assert!(config.voices.iter().any(|v| v.shape == Shape::Saw));
    }

    #[test]
    fn test_load_invalid_config() {
        let yaml = r#"
audio:
  sample_rate: 100
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_config(Path::new("/nonexistent/chamber.yaml")).is_err());
    }
}
