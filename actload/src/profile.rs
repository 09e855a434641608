use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use actload_core::{Stage, ThresholdSet};
use anyhow::Context as _;
use serde::Deserialize;

/// Optional run profile. Every field is optional; missing ones fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ProfileYaml {
    pub base_url: Option<String>,

    #[serde(default)]
    pub stages: Vec<StageYaml>,

    /// Metric name to one expression or a list of expressions.
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdExprYaml>,

    pub timeout: Option<YamlDuration>,
    pub think_time: Option<YamlDuration>,

    pub parse_payload: Option<serde_json::Value>,
    pub run_payload: Option<serde_json::Value>,

    pub request_id_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StageYaml {
    pub duration: YamlDuration,
    pub target: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ThresholdExprYaml {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    pub(crate) fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 30s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(|v| YamlDuration(Duration::from_secs(v)))
                    .map_err(|_| E::custom("duration must not be negative"))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a non-negative, finite number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v.trim()).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }
        }

        deserializer.deserialize_any(V)
    }
}

impl ProfileYaml {
    pub(crate) fn from_slice(bytes: &[u8]) -> anyhow::Result<Self> {
        // An empty document is a valid, empty profile.
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_slice(bytes)?)
    }

    pub(crate) fn stages(&self) -> Vec<Stage> {
        self.stages
            .iter()
            .map(|s| Stage::new(s.duration.into_inner(), s.target))
            .collect()
    }

    /// `None` when the profile does not mention thresholds, so defaults apply.
    pub(crate) fn thresholds(&self) -> Option<Vec<ThresholdSet>> {
        if self.thresholds.is_empty() {
            return None;
        }

        Some(
            self.thresholds
                .iter()
                .map(|(metric, exprs)| match exprs {
                    ThresholdExprYaml::One(e) => ThresholdSet::new(metric.as_str(), [e.as_str()]),
                    ThresholdExprYaml::Many(v) => {
                        ThresholdSet::new(metric.as_str(), v.iter().map(String::as_str))
                    }
                })
                .collect(),
        )
    }
}

pub(crate) fn looks_like_yaml_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()).map(|s| s.to_ascii_lowercase()),
        Some(ext) if ext == "yml" || ext == "yaml"
    )
}

pub(crate) async fn load_profile(path: &Path) -> anyhow::Result<ProfileYaml> {
    if !looks_like_yaml_path(path) {
        anyhow::bail!(
            "unsupported profile extension (expected .yaml or .yml): {}",
            path.display()
        );
    }

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read profile: {}", path.display()))?;

    ProfileYaml::from_slice(&bytes)
        .with_context(|| format!("failed to parse YAML: {}", path.display()))
}
