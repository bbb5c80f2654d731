//! Summary of a structure scan, as produced by the CLI's collecting sink.

use serde::Serialize;

/// Counters and findings accumulated over one full parse.
///
/// Serialized as-is for `--json` output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StructureReport {
    /// Headers in the primary header section.
    pub primary_headers: u64,

    /// Headers found after multipart boundaries.
    pub part_headers: u64,

    /// Headers found at the start of nested messages.
    pub nested_headers: u64,

    /// Body records delivered (including boundary delimiter lines).
    pub body_lines: u64,

    /// Multipart part header blocks observed.
    pub parts: u64,

    /// Deepest multipart nesting observed.
    pub deepest_nesting: usize,

    /// Anomaly messages, most serious first. Empty for a clean message.
    pub anomalies: Vec<String>,
}

impl StructureReport {
    /// Total header count across all classes.
    pub fn total_headers(&self) -> u64 {
        self.primary_headers + self.part_headers + self.nested_headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_headers() {
        let report = StructureReport {
            primary_headers: 4,
            part_headers: 2,
            nested_headers: 1,
            ..Default::default()
        };
        assert_eq!(report.total_headers(), 7);
    }

    #[test]
    fn test_report_serializes() {
        let report = StructureReport {
            primary_headers: 1,
            anomalies: vec!["message header was truncated".to_string()],
            ..Default::default()
        };
        let json = serde_json::to_string(&report).expect("serialize");
        assert!(json.contains("\"primary_headers\":1"));
        assert!(json.contains("truncated"));
    }
}
