//! Mapping of driver errors onto `RepairError`.

use scylla::errors::{
    DbError, ExecutionError, IntoRowsResultError, NewSessionError, RequestAttemptError, RowsError,
};

use candlefix_core::RepairError;

fn is_transient_db_error(e: &DbError) -> bool {
    matches!(
        e,
        DbError::Unavailable { .. }
            | DbError::ReadTimeout { .. }
            | DbError::WriteTimeout { .. }
            | DbError::Overloaded
            | DbError::IsBootstrapping
    )
}

/// Classify a failed request so the retry layer can tell transient from permanent.
pub fn map_execution_error(operation: &'static str, e: &ExecutionError) -> RepairError {
    match e {
        ExecutionError::RequestTimeout(_) => RepairError::timeout(operation),
        ExecutionError::LastAttemptError(RequestAttemptError::DbError(db, _))
            if is_transient_db_error(db) =>
        {
            RepairError::Unavailable(format!("{operation}: {e}"))
        }
        ExecutionError::ConnectionPoolError(_) => {
            RepairError::Unavailable(format!("{operation}: {e}"))
        }
        _ => RepairError::Query(format!("{operation}: {e}")),
    }
}

pub fn map_session_error(e: &NewSessionError) -> RepairError {
    RepairError::Connection(e.to_string())
}

pub fn map_rows_error(operation: &'static str, e: &IntoRowsResultError) -> RepairError {
    RepairError::Query(format!("{operation}: unexpected response: {e}"))
}

pub fn map_typed_rows_error(operation: &'static str, e: &RowsError) -> RepairError {
    RepairError::Data(format!("{operation}: {e}"))
}
