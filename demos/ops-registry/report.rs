use chrono::{DateTime, Utc};
use csv::Writer;
use lending_ops::errors::Result;
use lending_ops::registry::ValidationReport;
use lending_ops::utils::Network;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

/// One CSV row per validated operation.
#[derive(Debug, Serialize)]
pub struct ReportRow {
    pub timestamp: DateTime<Utc>,
    pub network: Network,
    pub operation: String,
    pub outcome: &'static str,
    pub detail: String,
    pub fingerprint: String,
}

impl ReportRow {
    pub fn new(network: Network, report: &ValidationReport, timestamp: DateTime<Utc>) -> Self {
        let detail = report.outcome.to_string();
        let label = report.outcome.label();
        Self {
            timestamp,
            network,
            operation: report.operation.clone(),
            outcome: label,
            detail: if detail == label { String::new() } else { detail },
            fingerprint: report
                .fingerprint
                .map(|fingerprint| fingerprint.to_string())
                .unwrap_or_default(),
        }
    }
}

pub fn write_report(path: &Path, network: Network, reports: &[ValidationReport]) -> Result<usize> {
    let timestamp = Utc::now();
    let mut writer: Writer<File> =
        Writer::from_path(path).map_err(|e| anyhow::anyhow!("Failed to create report file: {}", e))?;

    for report in reports {
        writer
            .serialize(ReportRow::new(network, report, timestamp))
            .map_err(|e| anyhow::anyhow!("Failed to write report row: {}", e))?;
    }
    writer.flush()?;

    tracing::info!(
        path = %path.display(),
        rows = reports.len(),
        "Wrote validation report"
    );
    Ok(reports.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lending_ops::registry::ValidationOutcome;

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let reports = vec![
            ValidationReport {
                operation: "AAVEV3OpenDepositBorrow".to_string(),
                outcome: ValidationOutcome::Configured,
                fingerprint: Some(Default::default()),
            },
            ValidationReport {
                operation: "LegacyOperation".to_string(),
                outcome: ValidationOutcome::OpUnknown,
                fingerprint: None,
            },
        ];

        let rows = write_report(&path, Network::Base, &reports).unwrap();
        assert_eq!(rows, 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,network,operation,outcome,detail,fingerprint"));
        assert!(lines[1].contains("AAVEV3OpenDepositBorrow,CONFIGURED,,0x0000"));
        assert!(lines[2].contains("LegacyOperation,OP_UNKNOWN,,"));
    }
}
