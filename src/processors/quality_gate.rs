use crate::error::{ProcessingError, Result};
use crate::models::table::{column, ColumnType};
use crate::utils::constants::{DIM_DATE_TABLE, DIM_PORTS_TABLE, FACT_VISITS_TABLE};
use crate::utils::dates::{date32_to_date, in_reporting_period};
use crate::writers::TableStore;
use arrow::array::{Array, ArrayRef, Date32Array};
use arrow::row::{OwnedRow, RowConverter, SortField};
use std::collections::HashSet;
use std::fmt;
use tracing::{error, info};

/// One declarative assertion over a persisted table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualityCheck {
    ColumnExists {
        table: String,
        column: String,
    },
    ColumnType {
        table: String,
        column: String,
        expected: ColumnType,
    },
    UniqueKey {
        table: String,
        columns: Vec<String>,
    },
    /// Every non-null date in the column falls in the reporting month
    ReportingPeriod {
        table: String,
        column: String,
    },
    NonEmpty {
        table: String,
    },
}

impl QualityCheck {
    pub fn column_exists(table: &str, column: &str) -> Self {
        QualityCheck::ColumnExists {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    pub fn column_type(table: &str, column: &str, expected: ColumnType) -> Self {
        QualityCheck::ColumnType {
            table: table.to_string(),
            column: column.to_string(),
            expected,
        }
    }

    pub fn unique_key(table: &str, columns: &[&str]) -> Self {
        QualityCheck::UniqueKey {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn reporting_period(table: &str, column: &str) -> Self {
        QualityCheck::ReportingPeriod {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    pub fn non_empty(table: &str) -> Self {
        QualityCheck::NonEmpty {
            table: table.to_string(),
        }
    }

    pub fn table(&self) -> &str {
        match self {
            QualityCheck::ColumnExists { table, .. }
            | QualityCheck::ColumnType { table, .. }
            | QualityCheck::UniqueKey { table, .. }
            | QualityCheck::ReportingPeriod { table, .. }
            | QualityCheck::NonEmpty { table } => table,
        }
    }

    /// Evaluate the check; a failed assertion is a `SchemaViolation`
    ///
    /// On success returns a short description of what was verified.
    pub fn evaluate(&self, store: &TableStore) -> Result<String> {
        let table = self.table();
        let violation = |message: String| Err(ProcessingError::schema_violation(table, message));

        match self {
            QualityCheck::ColumnExists { column, .. } => {
                let schema = store.table_schema(table)?;
                if schema.column_with_name(column).is_none() {
                    return violation(format!("column '{column}' does not exist"));
                }
                Ok(format!("column '{column}' exists"))
            }
            QualityCheck::ColumnType {
                column, expected, ..
            } => {
                let schema = store.table_schema(table)?;
                let Some((_, field)) = schema.column_with_name(column) else {
                    return violation(format!("column '{column}' does not exist"));
                };
                let actual = ColumnType::from_data_type(field.data_type())
                    .map(|t| t.to_string())
                    .unwrap_or_else(|_| field.data_type().to_string());
                if actual != expected.to_string() {
                    return violation(format!(
                        "column '{column}' has type {actual}, expected {expected}"
                    ));
                }
                Ok(format!("column '{column}' has type {expected}"))
            }
            QualityCheck::UniqueKey { columns, .. } => {
                let (rows, distinct) = count_distinct(store, table, columns)?;
                if rows > distinct {
                    return violation(format!(
                        "{} rows but only {} distinct values of ({})",
                        rows,
                        distinct,
                        columns.join(", ")
                    ));
                }
                Ok(format!("{} rows unique on ({})", rows, columns.join(", ")))
            }
            QualityCheck::ReportingPeriod { column, .. } => {
                let outside = count_outside_period(store, table, column)?;
                if outside > 0 {
                    return violation(format!(
                        "{outside} values of '{column}' fall outside the reporting period"
                    ));
                }
                Ok(format!("all '{column}' values in the reporting period"))
            }
            QualityCheck::NonEmpty { .. } => {
                let rows = store.file_info(table)?.total_rows();
                if rows == 0 {
                    return violation("table has no rows".to_string());
                }
                Ok(format!("{rows} rows"))
            }
        }
    }
}

impl fmt::Display for QualityCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityCheck::ColumnExists { table, column } => {
                write!(f, "{table}.{column} exists")
            }
            QualityCheck::ColumnType {
                table,
                column,
                expected,
            } => write!(f, "{table}.{column} is {expected}"),
            QualityCheck::UniqueKey { table, columns } => {
                write!(f, "{table} unique on ({})", columns.join(", "))
            }
            QualityCheck::ReportingPeriod { table, column } => {
                write!(f, "{table}.{column} within reporting period")
            }
            QualityCheck::NonEmpty { table } => write!(f, "{table} is not empty"),
        }
    }
}

fn count_distinct(store: &TableStore, table: &str, columns: &[String]) -> Result<(usize, usize)> {
    let batches = store.read_batches(table)?;
    let Some(first) = batches.first() else {
        return Ok((0, 0));
    };

    let fields = columns
        .iter()
        .map(|name| {
            first
                .column_by_name(name)
                .map(|array| SortField::new(array.data_type().clone()))
                .ok_or_else(|| {
                    ProcessingError::schema_violation(table, format!("column '{name}' does not exist"))
                })
        })
        .collect::<Result<Vec<_>>>()?;
    let converter = RowConverter::new(fields)?;

    let mut seen: HashSet<OwnedRow> = HashSet::new();
    let mut rows = 0;
    for batch in &batches {
        let arrays = columns
            .iter()
            .map(|name| {
                batch.column_by_name(name).cloned().ok_or_else(|| {
                    ProcessingError::schema_violation(table, format!("column '{name}' does not exist"))
                })
            })
            .collect::<Result<Vec<ArrayRef>>>()?;

        let converted = converter.convert_columns(&arrays)?;
        rows += converted.num_rows();
        seen.extend(converted.iter().map(|row| row.owned()));
    }

    Ok((rows, seen.len()))
}

fn count_outside_period(store: &TableStore, table: &str, column_name: &str) -> Result<usize> {
    let mut outside = 0;
    for batch in store.read_batches(table)? {
        let dates = column::<Date32Array>(&batch, column_name).map_err(|_| {
            ProcessingError::schema_violation(table, format!("column '{column_name}' is not a date"))
        })?;

        outside += (0..dates.len())
            .filter(|&i| !dates.is_null(i))
            .filter(|&i| {
                !date32_to_date(dates.value(i)).is_some_and(in_reporting_period)
            })
            .count();
    }
    Ok(outside)
}

/// Passed checks in execution order
#[derive(Debug, Clone, Default)]
pub struct QualityReport {
    pub passed: Vec<(QualityCheck, String)>,
}

impl QualityReport {
    pub fn generate_summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str("=== Quality Gate Report ===\n");
        summary.push_str(&format!("Checks passed: {}\n", self.passed.len()));
        for (i, (check, detail)) in self.passed.iter().enumerate() {
            summary.push_str(&format!("  {}. {} ({})\n", i + 1, check, detail));
        }
        summary
    }
}

/// Ordered checklist run after loading; the first failure aborts
#[derive(Debug, Clone)]
pub struct QualityGate {
    checks: Vec<QualityCheck>,
}

impl QualityGate {
    pub fn new(checks: Vec<QualityCheck>) -> Self {
        Self { checks }
    }

    /// Checklist applied at the end of every run
    pub fn standard() -> Self {
        Self::new(vec![
            QualityCheck::column_exists(FACT_VISITS_TABLE, "cicid"),
            QualityCheck::column_type(FACT_VISITS_TABLE, "cicid", ColumnType::Int64),
            QualityCheck::unique_key(FACT_VISITS_TABLE, &["cicid"]),
            QualityCheck::reporting_period(FACT_VISITS_TABLE, "arrdate"),
            QualityCheck::non_empty(FACT_VISITS_TABLE),
            QualityCheck::non_empty(DIM_PORTS_TABLE),
            QualityCheck::unique_key(DIM_PORTS_TABLE, &["code"]),
            QualityCheck::reporting_period(DIM_DATE_TABLE, "arrdate"),
        ])
    }

    pub fn checks(&self) -> &[QualityCheck] {
        &self.checks
    }

    pub fn run(&self, store: &TableStore) -> Result<QualityReport> {
        let mut report = QualityReport::default();

        for check in &self.checks {
            match check.evaluate(store) {
                Ok(detail) => {
                    info!("Quality check passed: {} ({})", check, detail);
                    report.passed.push((check.clone(), detail));
                }
                Err(e) => {
                    error!("Quality check failed: {}: {}", check, e);
                    return Err(e);
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CodeLabelDim, PortDim};
    use tempfile::TempDir;

    fn store_with_ports(ports: &[PortDim]) -> (TempDir, TableStore) {
        let dir = TempDir::new().unwrap();
        let store = TableStore::new(dir.path());
        store.write_table(DIM_PORTS_TABLE, ports).unwrap();
        (dir, store)
    }

    #[test]
    fn test_unique_key_failure_names_table() {
        let port = PortDim::new("ABC", "ANYTOWN", "NY", "New York");
        let (_dir, store) = store_with_ports(&[port.clone(), port]);

        let result = QualityCheck::unique_key(DIM_PORTS_TABLE, &["code"]).evaluate(&store);
        match result {
            Err(ProcessingError::SchemaViolation { table, message }) => {
                assert_eq!(table, DIM_PORTS_TABLE);
                assert!(message.contains("2 rows"), "{message}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_non_empty_failure() {
        let (_dir, store) = store_with_ports(&[]);
        let result = QualityCheck::non_empty(DIM_PORTS_TABLE).evaluate(&store);
        assert!(matches!(
            result,
            Err(ProcessingError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn test_column_checks() -> Result<()> {
        let dir = TempDir::new()?;
        let store = TableStore::new(dir.path());
        store.write_table("dim_us_visas", &[CodeLabelDim::new(1, "Business")])?;

        QualityCheck::column_exists("dim_us_visas", "code").evaluate(&store)?;
        QualityCheck::column_type("dim_us_visas", "code", ColumnType::Int64).evaluate(&store)?;

        assert!(QualityCheck::column_exists("dim_us_visas", "missing")
            .evaluate(&store)
            .is_err());

        match QualityCheck::column_type("dim_us_visas", "name", ColumnType::Int64).evaluate(&store) {
            Err(ProcessingError::SchemaViolation { message, .. }) => {
                assert!(message.contains("string"), "{message}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_gate_stops_at_first_failure() {
        let (_dir, store) = store_with_ports(&[PortDim::new("ABC", "ANYTOWN", "NY", "New York")]);
        let gate = QualityGate::new(vec![
            QualityCheck::non_empty(DIM_PORTS_TABLE),
            QualityCheck::non_empty("missing_table"),
            QualityCheck::unique_key(DIM_PORTS_TABLE, &["code"]),
        ]);

        let result = gate.run(&store);
        assert!(matches!(result, Err(ProcessingError::TableNotFound(_))));
    }

    #[test]
    fn test_standard_checklist_order() {
        let gate = QualityGate::standard();
        assert_eq!(gate.checks().len(), 8);
        assert_eq!(gate.checks()[0].table(), FACT_VISITS_TABLE);
        assert_eq!(gate.checks()[7].table(), DIM_DATE_TABLE);
    }
}
