//! Engine configuration: column detection hints and display defaults

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::types::*;

/// Substrings used to pre-select mapping columns from imported headers.
///
/// Matching is case-insensitive; the first header containing any hint wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnHints {
    pub identifier: Vec<String>,
    pub amount_a: Vec<String>,
    pub amount_b: Vec<String>,
}

impl Default for ColumnHints {
    fn default() -> Self {
        Self {
            identifier: vec!["cuit".to_string()],
            amount_a: vec!["monto retenido".to_string()],
            amount_b: vec!["crédito".to_string(), "monto".to_string()],
        }
    }
}

/// Tunables for a reconciliation deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub column_hints: ColumnHints,
    /// Threshold used when the operator has not chosen one
    pub default_discrepancy_threshold: BigDecimal,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            column_hints: ColumnHints::default(),
            default_discrepancy_threshold: BigDecimal::from(0),
        }
    }
}

impl ReconConfig {
    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> ReconResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ReconError::Validation(format!("Invalid configuration: {e}")))
    }

    pub fn to_json(&self) -> ReconResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ReconError::Validation(format!("Unserializable configuration: {e}")))
    }
}

fn find_header(headers: &[String], hints: &[String]) -> Option<String> {
    headers
        .iter()
        .find(|header| {
            let header = header.to_lowercase();
            hints.iter().any(|hint| header.contains(&hint.to_lowercase()))
        })
        .cloned()
}

/// Pre-select identifier and amount columns for both sources from their headers.
///
/// Fields with no matching header are left unset for the operator to choose.
pub fn detect_column_mapping(
    headers_a: &[String],
    headers_b: &[String],
    hints: &ColumnHints,
) -> ColumnMapping {
    ColumnMapping {
        identifier_col_a: find_header(headers_a, &hints.identifier),
        amount_col_a: find_header(headers_a, &hints.amount_a),
        identifier_col_b: find_header(headers_b, &hints.identifier),
        amount_col_b: find_header(headers_b, &hints.amount_b),
    }
}

/// Column names in the order they first appear across the given rows
pub fn discover_headers(rows: &[RawRecord]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        for column in row.columns() {
            if !headers.iter().any(|h| h == column) {
                headers.push(column.to_string());
            }
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_detect_default_columns() {
        let a = headers(&["Fecha", "CUIT Agente", "Monto Retenido"]);
        let b = headers(&["Cuit", "Débito", "Crédito"]);
        let mapping = detect_column_mapping(&a, &b, &ColumnHints::default());

        assert_eq!(mapping.identifier_col_a.as_deref(), Some("CUIT Agente"));
        assert_eq!(mapping.amount_col_a.as_deref(), Some("Monto Retenido"));
        assert_eq!(mapping.identifier_col_b.as_deref(), Some("Cuit"));
        assert_eq!(mapping.amount_col_b.as_deref(), Some("Crédito"));
        assert!(mapping.is_complete());
    }

    #[test]
    fn test_undetected_columns_stay_unset() {
        let a = headers(&["Tax ID", "Amount"]);
        let mapping = detect_column_mapping(&a, &a, &ColumnHints::default());
        assert_eq!(mapping.identifier_col_a, None);
        assert_eq!(mapping.missing_columns().len(), 4);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config =
            ReconConfig::from_json(r#"{ "column_hints": { "identifier": ["tax id"] } }"#).unwrap();
        assert_eq!(config.column_hints.identifier, vec!["tax id".to_string()]);
        assert_eq!(config.column_hints.amount_b, ColumnHints::default().amount_b);
        assert_eq!(config.default_discrepancy_threshold, BigDecimal::from(0));

        assert!(ReconConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_discover_headers() {
        let rows = vec![
            RawRecord::new().with("b", "1").with("a", "2"),
            RawRecord::new().with("c", "3"),
        ];
        assert_eq!(discover_headers(&rows), headers(&["a", "b", "c"]));
    }
}
