//! Utility macros for error handling.

/// Creates a [`crate::error::SyncError`] from an error kind and description,
/// with an optional detail payload.
///
/// ```rust,ignore
/// let error = sync_error!(ErrorKind::ConfigError, "Invalid batch size");
/// let error = sync_error!(
///     ErrorKind::PlannerFailed,
///     "Could not plan execution levels",
///     err.to_string()
/// );
/// ```
#[macro_export]
macro_rules! sync_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::SyncError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::SyncError::from(($kind, $desc, $detail.to_string()))
    };
}

/// Creates and returns a [`crate::error::SyncError`] from the current
/// function.
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return Err($crate::sync_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return Err($crate::sync_error!($kind, $desc, $detail))
    };
}
