//! Output formatting for CLI results

use crate::core::fix_log;
use crate::core::provision::ProvisionReport;
use crate::core::reader::FixSample;
use serde::Serialize;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON, one document per result
    Json,
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Format one fix sample
pub fn format_fix(sample: &FixSample, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => fix_log::to_text(sample),
        OutputFormat::Json => json(sample),
    }
}

/// Format a provisioning report
pub fn format_report(report: &ProvisionReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json(report),
        OutputFormat::Text => {
            let mut lines = vec![
                format!(
                    "Provisioned:    {}",
                    if report.provisioned { "yes" } else { "no" }
                ),
                format!("Attempts:       {}", report.attempts),
                format!(
                    "Detected baud:  {}",
                    report
                        .detected_baud
                        .map_or_else(|| "-".to_string(), |b| b.to_string())
                ),
                format!("Link baud:      {}", report.target_baud),
                format!(
                    "Update rate:    {} Hz (was {})",
                    report.update_rate,
                    report
                        .previous_update_rate
                        .map_or_else(|| "unknown".to_string(), |r| format!("{r} Hz"))
                ),
            ];
            if let Some(version) = &report.receiver_version {
                lines.push(format!("Receiver:       {version}"));
            }
            if report.factory_reset_issued {
                lines.push("Factory reset:  issued".to_string());
            }
            if let Some(reason) = report.history.iter().rev().find_map(|t| t.reason.as_deref()) {
                lines.push(format!("Last failure:   {reason}"));
            }
            lines.join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reader::FixMode;

    fn report(provisioned: bool) -> ProvisionReport {
        ProvisionReport {
            provisioned,
            attempts: 1,
            detected_baud: Some(9600),
            target_baud: 921_600,
            previous_update_rate: None,
            update_rate: 10,
            receiver_version: None,
            factory_reset_issued: false,
            history: Vec::new(),
        }
    }

    #[test]
    fn test_report_text() {
        let text = format_report(&report(true), OutputFormat::Text);
        assert!(text.contains("Provisioned:    yes"));
        assert!(text.contains("Update rate:    10 Hz (was unknown)"));
        assert!(!text.contains("Factory reset"));
    }

    #[test]
    fn test_report_json() {
        let text = format_report(&report(false), OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["provisioned"], false);
        assert_eq!(value["detected_baud"], 9600);
    }

    #[test]
    fn test_fix_json() {
        let sample = FixSample {
            fix_mode: FixMode::Fix2D,
            satellites: 4,
            latitude: 1.5,
            longitude: -2.25,
            altitude: 0.0,
            speed_kmh: 0.0,
            timestamp_ms: 0,
        };
        let value: serde_json::Value = serde_json::from_str(&format_fix(&sample, OutputFormat::Json)).unwrap();
        assert_eq!(value["fix_mode"], "2d");
        assert_eq!(value["longitude"], -2.25);
    }
}
