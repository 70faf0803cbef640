use std::borrow::Cow;
use std::error;
use std::fmt;
use std::io;

/// Type alias for convenience when using the Result type with our Error.
pub type SyncResult<T> = Result<T, SyncError>;

/// Internal error representation with kind, description and optional detail.
///
/// Boxed to keep the public error type one pointer wide on the success path.
struct ErrorInner {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<String>,
}

/// Error classification for sync operations.
///
/// Kinds are grouped by the recovery behaviour they demand: transient kinds
/// are retried in place, schema kinds fail the table and stamp the drift
/// record, structural kinds skip the table, precondition kinds never reach
/// the database, and everything else is fatal for the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The database is temporarily unavailable (SQL Server 40613).
    DatabaseUnavailable,
    /// The service is busy or processing a transient failure (40197, 40501).
    ServiceBusy,
    /// Session or server resource limits were hit (10928, 10929).
    ResourceLimitExceeded,
    /// The transport dropped mid-operation (233, 64).
    ConnectionLost,
    /// A timeout at any layer of the stack.
    Timeout,

    /// A referenced column does not exist (207).
    InvalidColumn,
    /// A referenced object does not exist (208).
    InvalidObject,
    /// Column count or type mismatch between statement and table (213).
    ColumnMismatch,
    /// A NOT NULL constraint rejected a row (515).
    NullConstraintViolation,
    /// A constraint conflict, typically a foreign-key reference (547).
    ConstraintConflict,
    /// IDENTITY_INSERT state did not permit the write.
    IdentityInsertConflict,
    /// An attempt to write a generated-always column.
    GeneratedColumnWrite,
    /// The table definition changed underneath a bulk operation (4891).
    SchemaChanged,

    /// A write against a temporal history table (4712).
    TemporalHistoryWrite,

    /// The table has no primary key and the flags do not allow syncing it.
    MissingPrimaryKey,
    /// A source primary-key column has no representative in the target.
    PrimaryKeyNotRepresentable,
    /// Reconciliation produced no common columns to sync.
    EmptyProjection,

    /// Failed to establish a database connection.
    ConnectionFailed,
    /// A query failed for a reason with no finer classification.
    QueryFailed,
    /// Invalid engine configuration.
    ConfigError,
    /// Failure while building the execution plan.
    PlannerFailed,
    /// Failure while engaging the constraint/temporal warden.
    WardenFailed,
    /// Failure writing the run-result file.
    ReportIo,
    /// A table worker panicked.
    WorkerPanicked,
    /// Worker dispatch or coordination failure.
    WorkerPoolFailed,
}

/// The recovery class of an [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retried in place with exponential backoff.
    Transient,
    /// Never retried; fails the table and stamps the schema-drift record.
    Schema,
    /// The table is skipped with a reason; the run continues.
    Structural,
    /// A precondition on the table itself, detected before any data moves.
    Precondition,
    /// Everything else; fails the table (or the run, inside the coordinator).
    Fatal,
}

impl ErrorKind {
    pub fn class(&self) -> ErrorClass {
        use ErrorKind::*;
        match self {
            DatabaseUnavailable | ServiceBusy | ResourceLimitExceeded | ConnectionLost
            | Timeout => ErrorClass::Transient,

            InvalidColumn | InvalidObject | ColumnMismatch | NullConstraintViolation
            | ConstraintConflict | IdentityInsertConflict | GeneratedColumnWrite
            | SchemaChanged => ErrorClass::Schema,

            TemporalHistoryWrite => ErrorClass::Structural,

            MissingPrimaryKey | PrimaryKeyNotRepresentable | EmptyProjection => {
                ErrorClass::Precondition
            }

            ConnectionFailed | QueryFailed | ConfigError | PlannerFailed | WardenFailed
            | ReportIo | WorkerPanicked | WorkerPoolFailed => ErrorClass::Fatal,
        }
    }

    /// Stable name used as `ErrorType` in the run-result file.
    pub fn as_str(&self) -> &'static str {
        use ErrorKind::*;
        match self {
            DatabaseUnavailable => "DatabaseUnavailable",
            ServiceBusy => "ServiceBusy",
            ResourceLimitExceeded => "ResourceLimitExceeded",
            ConnectionLost => "ConnectionLost",
            Timeout => "Timeout",
            InvalidColumn => "InvalidColumn",
            InvalidObject => "InvalidObject",
            ColumnMismatch => "ColumnMismatch",
            NullConstraintViolation => "NullConstraintViolation",
            ConstraintConflict => "ConstraintConflict",
            IdentityInsertConflict => "IdentityInsertConflict",
            GeneratedColumnWrite => "GeneratedColumnWrite",
            SchemaChanged => "SchemaChanged",
            TemporalHistoryWrite => "TemporalHistoryWrite",
            MissingPrimaryKey => "MissingPrimaryKey",
            PrimaryKeyNotRepresentable => "PrimaryKeyNotRepresentable",
            EmptyProjection => "EmptyProjection",
            ConnectionFailed => "ConnectionFailed",
            QueryFailed => "QueryFailed",
            ConfigError => "ConfigError",
            PlannerFailed => "PlannerFailed",
            WardenFailed => "WardenFailed",
            ReportIo => "ReportIo",
            WorkerPanicked => "WorkerPanicked",
            WorkerPoolFailed => "WorkerPoolFailed",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClass::Transient => "Transient",
            ErrorClass::Schema => "Schema",
            ErrorClass::Structural => "Structural",
            ErrorClass::Precondition => "Precondition",
            ErrorClass::Fatal => "Fatal",
        };
        f.write_str(name)
    }
}

/// The stable error type of the sync engine.
pub struct SyncError(Box<ErrorInner>);

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        self.0.kind
    }

    pub fn class(&self) -> ErrorClass {
        self.0.kind.class()
    }

    pub fn description(&self) -> &str {
        &self.0.description
    }

    pub fn detail(&self) -> Option<&str> {
        self.0.detail.as_deref()
    }
}

impl From<(ErrorKind, &'static str)> for SyncError {
    fn from((kind, description): (ErrorKind, &'static str)) -> Self {
        SyncError(Box::new(ErrorInner {
            kind,
            description: Cow::Borrowed(description),
            detail: None,
        }))
    }
}

impl From<(ErrorKind, String)> for SyncError {
    fn from((kind, description): (ErrorKind, String)) -> Self {
        SyncError(Box::new(ErrorInner {
            kind,
            description: Cow::Owned(description),
            detail: None,
        }))
    }
}

impl From<(ErrorKind, &'static str, String)> for SyncError {
    fn from((kind, description, detail): (ErrorKind, &'static str, String)) -> Self {
        SyncError(Box::new(ErrorInner {
            kind,
            description: Cow::Borrowed(description),
            detail: Some(detail),
        }))
    }
}

impl fmt::Debug for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncError")
            .field("kind", &self.0.kind)
            .field("description", &self.0.description)
            .field("detail", &self.0.detail)
            .finish()
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.description)?;
        if let Some(detail) = &self.0.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl error::Error for SyncError {}

/// Maps driver errors onto the engine taxonomy.
///
/// Server errors classify by the documented SQL Server error codes first and
/// by message substrings second; transport errors classify by their I/O kind.
impl From<tiberius::error::Error> for SyncError {
    fn from(err: tiberius::error::Error) -> Self {
        use tiberius::error::Error as Tds;

        match &err {
            Tds::Server(token) => classify_server_error(token.code(), token.message()),
            Tds::Io { kind, message } => {
                let kind = match kind {
                    io::ErrorKind::TimedOut => ErrorKind::Timeout,
                    _ => ErrorKind::ConnectionLost,
                };
                SyncError::from((kind, "transport error", message.clone()))
            }
            Tds::Routing { host, port } => SyncError::from((
                ErrorKind::ConnectionLost,
                "server requested rerouting",
                format!("{host}:{port}"),
            )),
            Tds::Tls(message) => SyncError::from((
                ErrorKind::ConnectionFailed,
                "tls negotiation failed",
                message.clone(),
            )),
            _ => SyncError::from((ErrorKind::QueryFailed, "database error", err.to_string())),
        }
    }
}

fn classify_server_error(code: u32, message: &str) -> SyncError {
    let kind = match code {
        40613 => ErrorKind::DatabaseUnavailable,
        40197 | 40501 => ErrorKind::ServiceBusy,
        10928 | 10929 => ErrorKind::ResourceLimitExceeded,
        233 | 64 => ErrorKind::ConnectionLost,
        207 => ErrorKind::InvalidColumn,
        208 => ErrorKind::InvalidObject,
        213 => ErrorKind::ColumnMismatch,
        515 => ErrorKind::NullConstraintViolation,
        547 => ErrorKind::ConstraintConflict,
        4712 => ErrorKind::TemporalHistoryWrite,
        4891 => ErrorKind::SchemaChanged,
        _ => classify_message(message),
    };

    SyncError::from((kind, "sql server error", format!("code {code}: {message}")))
}

/// Fallback classification on the message text, checked most-specific first
/// so the broad `column` match never shadows the narrower ones.
fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();

    if lower.contains("identity_insert") {
        ErrorKind::IdentityInsertConflict
    } else if lower.contains("generated always") {
        ErrorKind::GeneratedColumnWrite
    } else if lower.contains("schema change") {
        ErrorKind::SchemaChanged
    } else if lower.contains("temporal history table") {
        ErrorKind::TemporalHistoryWrite
    } else if lower.contains("invalid column") {
        ErrorKind::InvalidColumn
    } else if lower.contains("invalid object name") || lower.contains("does not exist") {
        ErrorKind::InvalidObject
    } else if lower.contains("column") {
        ErrorKind::InvalidColumn
    } else if lower.contains("timeout") {
        ErrorKind::Timeout
    } else {
        ErrorKind::QueryFailed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_codes_classify_as_transient() {
        for code in [40613, 40197, 40501, 10928, 10929, 233, 64] {
            let err = classify_server_error(code, "whatever");
            assert_eq!(err.class(), ErrorClass::Transient, "code {code}");
        }
    }

    #[test]
    fn schema_codes_classify_as_schema() {
        for code in [207, 208, 213, 515, 547] {
            let err = classify_server_error(code, "whatever");
            assert_eq!(err.class(), ErrorClass::Schema, "code {code}");
        }
    }

    #[test]
    fn temporal_history_code_is_structural() {
        let err = classify_server_error(4712, "cannot delete rows from temporal history table");
        assert_eq!(err.kind(), ErrorKind::TemporalHistoryWrite);
        assert_eq!(err.class(), ErrorClass::Structural);
    }

    #[test]
    fn message_substrings_classify_as_schema() {
        let cases = [
            ("Invalid column name 'Email'.", ErrorKind::InvalidColumn),
            ("Invalid object name 'dbo.Missing'.", ErrorKind::InvalidObject),
            ("table does not exist", ErrorKind::InvalidObject),
            (
                "Cannot insert explicit value when IDENTITY_INSERT is OFF",
                ErrorKind::IdentityInsertConflict,
            ),
            (
                "cannot modify GENERATED ALWAYS column",
                ErrorKind::GeneratedColumnWrite,
            ),
            (
                "Insert bulk failed due to a schema change of the target table",
                ErrorKind::SchemaChanged,
            ),
        ];
        for (message, expected) in cases {
            let err = classify_server_error(99999, message);
            assert_eq!(err.kind(), expected, "message {message:?}");
            assert_eq!(err.class(), ErrorClass::Schema);
        }
    }

    #[test]
    fn unclassified_server_errors_are_fatal() {
        let err = classify_server_error(50000, "custom application error");
        assert_eq!(err.kind(), ErrorKind::QueryFailed);
        assert_eq!(err.class(), ErrorClass::Fatal);
    }

    #[test]
    fn timeout_message_is_transient() {
        let err = classify_server_error(99999, "Execution Timeout Expired");
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.class(), ErrorClass::Transient);
    }

    #[test]
    fn display_includes_detail() {
        let err = SyncError::from((
            ErrorKind::InvalidColumn,
            "sql server error",
            "code 207: Invalid column name 'x'".to_string(),
        ));
        let rendered = err.to_string();
        assert!(rendered.contains("sql server error"));
        assert!(rendered.contains("code 207"));
    }
}
