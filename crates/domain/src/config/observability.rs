use serde::{Deserialize, Serialize};

/// OpenTelemetry export.
///
/// Structured JSON logs are always written. Setting `otlp_endpoint` also
/// ships spans over OTLP/gRPC.
///
/// Sampling is decided once per HTTP request trace: `sample_rate` picks
/// which request traces are kept, and the `turn` span a `/chat` request
/// spawns follows its parent request's decision, so a kept trace always
/// carries its turn and a dropped one never does. Logs and `lt_event`
/// lines are unaffected by sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// e.g. `http://localhost:4317`. `None` disables export.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    #[serde(default = "d_service_name")]
    pub service_name: String,

    /// Fraction of request traces exported, `0.0..=1.0`.
    #[serde(default = "d_sample_rate")]
    pub sample_rate: f64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: d_service_name(),
            sample_rate: d_sample_rate(),
        }
    }
}

impl ObservabilityConfig {
    pub fn export_enabled(&self) -> bool {
        self.otlp_endpoint.as_deref().is_some_and(|e| !e.trim().is_empty())
    }
}

fn d_service_name() -> String {
    "lextutor".into()
}

fn d_sample_rate() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_off_by_default_and_keeps_every_turn() {
        let cfg: ObservabilityConfig = toml::from_str("").unwrap();
        assert!(!cfg.export_enabled());
        assert_eq!(cfg.service_name, "lextutor");
        assert_eq!(cfg.sample_rate, 1.0);
    }

    #[test]
    fn blank_endpoint_does_not_enable_export() {
        let cfg: ObservabilityConfig = toml::from_str(r#"otlp_endpoint = "  ""#).unwrap();
        assert!(!cfg.export_enabled());

        let cfg: ObservabilityConfig = toml::from_str(
            r#"
            otlp_endpoint = "http://collector:4317"
            sample_rate = 0.25
            "#,
        )
        .unwrap();
        assert!(cfg.export_enabled());
        assert_eq!(cfg.sample_rate, 0.25);
    }
}
