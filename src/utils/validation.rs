//! Validation utilities

use std::collections::HashSet;

use crate::traits::*;
use crate::types::*;

/// Maximum length of a session name
pub const MAX_SESSION_NAME_LEN: usize = 120;

/// Validate a session name, returning it trimmed
pub fn validate_session_name(name: &str) -> ReconResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ReconError::Validation(
            "Session name cannot be empty".to_string(),
        ));
    }

    if trimmed.chars().count() > MAX_SESSION_NAME_LEN {
        return Err(ReconError::Validation(format!(
            "Session name cannot exceed {MAX_SESSION_NAME_LEN} characters"
        )));
    }

    Ok(trimmed.to_string())
}

/// Validate that identifier and amount columns are chosen for both sources
pub fn validate_mapping(mapping: &ColumnMapping) -> ReconResult<()> {
    let missing = mapping.missing_columns();
    if !missing.is_empty() {
        return Err(ReconError::Validation(format!(
            "Identifier and amount columns must be selected for both sources (missing: {})",
            missing.join(", ")
        )));
    }
    Ok(())
}

/// Validate that every mapped column exists among the imported headers
pub fn validate_mapping_against_headers(
    mapping: &ColumnMapping,
    headers_a: &[String],
    headers_b: &[String],
) -> ReconResult<()> {
    validate_mapping(mapping)?;

    for (source, headers) in [
        (SourceSystem::TaxAuthority, headers_a),
        (SourceSystem::Accounting, headers_b),
    ] {
        for column in [mapping.identifier_column(source), mapping.amount_column(source)]
            .into_iter()
            .flatten()
        {
            if !headers.iter().any(|h| h == column) {
                return Err(ReconError::Validation(format!(
                    "Column '{}' not found in {} headers",
                    column,
                    source.label()
                )));
            }
        }
    }
    Ok(())
}

/// Enhanced session validator with detailed checks
pub struct EnhancedSessionValidator;

impl SessionValidator for EnhancedSessionValidator {
    fn validate_session(&self, session: &Session) -> ReconResult<()> {
        validate_session_name(&session.name)?;
        validate_mapping(&session.mapping)?;

        // Every record must sit on the side it claims, with coherent match state
        let mut seen = HashSet::new();
        for (expected, records) in [
            (SourceSystem::TaxAuthority, &session.source_a),
            (SourceSystem::Accounting, &session.source_b),
        ] {
            for record in records {
                if record.source != expected {
                    return Err(ReconError::Validation(format!(
                        "Record {} is filed under the wrong source",
                        record.record_id
                    )));
                }
                if !record.is_consistent() {
                    return Err(ReconError::Validation(format!(
                        "Record {} has status {} but match {:?}",
                        record.record_id,
                        record.status.label(),
                        record.match_id
                    )));
                }
                if !seen.insert(record.record_id) {
                    return Err(ReconError::Validation(format!(
                        "Record {} appears more than once",
                        record.record_id
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_name() {
        assert_eq!(validate_session_name("  March  ").unwrap(), "March");
        assert!(validate_session_name("   ").is_err());
        assert!(validate_session_name(&"x".repeat(MAX_SESSION_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_incomplete_mapping() {
        let mut mapping = ColumnMapping::new("CUIT", "Monto", "CUIT", "Credito");
        assert!(validate_mapping(&mapping).is_ok());

        mapping.amount_col_b = Some(" ".to_string());
        let err = validate_mapping(&mapping).unwrap_err();
        assert!(err.to_string().contains("amount_col_b"));
    }

    #[test]
    fn test_mapping_against_headers() {
        let mapping = ColumnMapping::new("CUIT", "Monto", "CUIT", "Credito");
        let headers_a = vec!["CUIT".to_string(), "Monto".to_string()];
        let headers_b = vec!["CUIT".to_string(), "Debito".to_string()];
        assert!(validate_mapping_against_headers(&mapping, &headers_a, &headers_b).is_err());

        let headers_b = vec!["CUIT".to_string(), "Credito".to_string()];
        assert!(validate_mapping_against_headers(&mapping, &headers_a, &headers_b).is_ok());
    }

    #[test]
    fn test_enhanced_validator_detects_inconsistent_record() {
        let mapping = ColumnMapping::new("CUIT", "Monto", "CUIT", "Credito");
        let mut session = Session::import(
            "ok",
            mapping,
            vec![RawRecord::new().with("CUIT", "1")],
            vec![],
        )
        .unwrap();
        assert!(EnhancedSessionValidator.validate_session(&session).is_ok());

        session.source_a[0].status = RecordStatus::Reconciled;
        assert!(EnhancedSessionValidator.validate_session(&session).is_err());
    }
}
