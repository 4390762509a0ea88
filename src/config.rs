use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// IoU above which two detections count as the same face.
    pub dedupe_threshold: f64,
    /// Below this many people a dominance ranking is not produced.
    pub min_ranked_people: usize,
    pub thumbnail: ThumbnailConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dedupe_threshold: 0.65,
            min_ranked_people: 2,
            thumbnail: ThumbnailConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThumbnailConfig {
    pub size: u32,
    /// Extra margin on each side, as a fraction of the face extent.
    pub padding: f64,
    /// Smallest crop extent, as a fraction of the image.
    pub min_extent: f64,
    pub jpeg_quality: u8,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            size: 256,
            padding: 0.2,
            min_extent: 0.12,
            jpeg_quality: 85,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads `FRAMEMOG_LISTEN` and `FRAMEMOG_DEDUPE_THRESHOLD`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup("FRAMEMOG_LISTEN") {
            match raw.parse::<SocketAddr>() {
                Ok(addr) => config.listen = addr,
                Err(err) => warn!("event" = "config.invalid", key = "FRAMEMOG_LISTEN", %raw, %err),
            }
        }
        if let Some(raw) = lookup("FRAMEMOG_DEDUPE_THRESHOLD") {
            match raw.parse::<f64>() {
                Ok(t) if (0.0..=1.0).contains(&t) => config.pipeline.dedupe_threshold = t,
                _ => warn!("event" = "config.invalid", key = "FRAMEMOG_DEDUPE_THRESHOLD", %raw),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[]));
        assert_eq!(ServerConfig::default(), config);
        assert_eq!(0.65, config.pipeline.dedupe_threshold);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("FRAMEMOG_LISTEN", "127.0.0.1:9000"),
            ("FRAMEMOG_DEDUPE_THRESHOLD", "0.92"),
        ]));
        assert_eq!("127.0.0.1:9000".parse::<SocketAddr>().ok(), Some(config.listen));
        assert_eq!(0.92, config.pipeline.dedupe_threshold);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("FRAMEMOG_LISTEN", "not an address"),
            ("FRAMEMOG_DEDUPE_THRESHOLD", "1.5"),
        ]));
        assert_eq!(ServerConfig::default(), config);
    }

    #[test]
    fn test_partial_json() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "dedupeThreshold": 0.8 }"#).unwrap_or_default();
        assert_eq!(0.8, config.dedupe_threshold);
        assert_eq!(ThumbnailConfig::default(), config.thumbnail);
    }
}
