// Engine configuration
// One JSON document covering analysis, playback and the default difficulty

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::events::Difficulty;
use crate::pipeline::AnalysisConfig;
use crate::playback::SessionConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub analysis: AnalysisConfig,
    pub session: SessionConfig,
    pub difficulty: Difficulty,
}

impl EngineConfig {
    /// Parse and validate; missing fields take their defaults
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = fs::read_to_string(path)?;
        log::info!("Loading engine config from {}", path.display());
        Self::from_json(&contents)
    }

    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        log::info!("Loading engine config from {}", path.display());
        Self::from_json(&contents)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Check ranges the algorithms rely on
    pub fn validate(&self) -> ConfigResult<()> {
        let analysis = &self.analysis;
        let pre = &analysis.preprocess;

        positive("analysis.preprocess.high_pass_hz", pre.high_pass_hz)?;
        positive("analysis.preprocess.low_pass_hz", pre.low_pass_hz)?;
        if pre.low_pass_hz <= pre.high_pass_hz {
            return Err(invalid(
                "analysis.preprocess.low_pass_hz",
                format!("{} Hz is not above the high-pass cutoff {} Hz", pre.low_pass_hz, pre.high_pass_hz),
            ));
        }
        positive("analysis.preprocess.target_rms", pre.target_rms as f64)?;

        positive("analysis.onset.window_secs", analysis.onset.window_secs)?;
        positive("analysis.onset.hop_secs", analysis.onset.hop_secs)?;
        if !(0.0..1.0).contains(&analysis.onset.smoothing) {
            return Err(invalid("analysis.onset.smoothing", "must be in [0, 1)".to_string()));
        }

        if analysis.yield_every == 0 {
            return Err(invalid("analysis.yield_every", "must be at least 1".to_string()));
        }
        if analysis.pitch_window < 2 {
            return Err(invalid("analysis.pitch_window", "must be at least 2 samples".to_string()));
        }

        for (field, scan) in [("analysis.enhanced", &analysis.enhanced), ("analysis.simple", &analysis.simple)] {
            positive(field, scan.hop_secs)?;
            if scan.window_size < 2 {
                return Err(invalid(field, "window_size must be at least 2 samples".to_string()));
            }
        }

        for (field, pitch) in [
            ("analysis.autocorrelation", &analysis.autocorrelation),
            ("analysis.enhanced.autocorrelation", &analysis.enhanced.autocorrelation),
            ("analysis.simple.autocorrelation", &analysis.simple.autocorrelation),
        ] {
            positive(field, pitch.min_frequency)?;
            if pitch.max_frequency <= pitch.min_frequency {
                return Err(invalid(field, "max_frequency must exceed min_frequency".to_string()));
            }
        }

        let tempo = &analysis.tempo;
        if tempo.min_bpm == 0 || tempo.min_bpm > tempo.max_bpm {
            return Err(invalid(
                "analysis.tempo",
                format!("bpm range {}..={} is empty", tempo.min_bpm, tempo.max_bpm),
            ));
        }

        let scheduler = &self.session.scheduler;
        positive("session.scheduler.fall_duration_secs", scheduler.fall_duration_secs)?;
        positive("session.scheduler.poll_window_secs", scheduler.poll_window_secs)?;

        let fft_size = self.session.spectrum.fft_size;
        if fft_size < 2 || !fft_size.is_power_of_two() {
            return Err(invalid("session.spectrum.fft_size", format!("{} is not a power of two", fft_size)));
        }
        if self.session.sample_rate == 0 {
            return Err(invalid("session.sample_rate", "must be positive".to_string()));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

fn positive(field: &'static str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{} must be positive", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::AnalysisMode;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(
            r#"{
                "difficulty": "beginner",
                "analysis": { "mode": "enhanced", "yield_every": 10 },
                "session": { "scheduler": { "fall_duration_secs": 3.0 } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.difficulty, Difficulty::Beginner);
        assert_eq!(config.analysis.mode, AnalysisMode::Enhanced);
        assert_eq!(config.session.scheduler.fall_duration_secs, 3.0);
        assert_eq!(config.session.scheduler.poll_window_secs, 0.05);
        assert_eq!(config.analysis.onset.hop_secs, 0.01);
    }

    #[test]
    fn test_partial_scan_section() {
        let config = EngineConfig::from_json(r#"{"analysis":{"enhanced":{"hop_secs":0.02}}}"#).unwrap();
        assert_eq!(config.analysis.enhanced.hop_secs, 0.02);
        assert_eq!(config.analysis.enhanced.min_gap_secs, 0.08);
        assert_eq!(config.analysis.simple.hop_secs, 0.05);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = EngineConfig::from_json(r#"{"session": {"scheduler": {"fall_duration_secs": 0}}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "session.scheduler.fall_duration_secs", .. }));

        let err = EngineConfig::from_json(r#"{"analysis": {"preprocess": {"low_pass_hz": 50}}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "analysis.preprocess.low_pass_hz", .. }));

        let err = EngineConfig::from_json(r#"{"session": {"spectrum": {"fft_size": 1000}}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        assert!(matches!(EngineConfig::from_json("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notefall.json");

        let mut config = EngineConfig::default();
        config.difficulty = Difficulty::Advanced;
        config.session.scheduler.catch_up = true;
        config.save(&path).unwrap();

        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded.difficulty, Difficulty::Advanced);
        assert!(loaded.session.scheduler.catch_up);
    }

    #[tokio::test]
    async fn test_async_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notefall.json");
        std::fs::write(&path, r#"{"analysis": {"mode": "simple"}}"#).unwrap();

        let config = EngineConfig::load(&path).await.unwrap();
        assert_eq!(config.analysis.mode, AnalysisMode::Simple);

        let missing = EngineConfig::load(&dir.path().join("missing.json")).await;
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
