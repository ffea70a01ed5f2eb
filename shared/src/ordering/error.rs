use thiserror::Error;

use super::ScopeKey;
use crate::error::{AppError, ErrorCode};

/// Failure of a display-order operation
///
/// Everything except `StoreFailure` is detected before the first write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderingError {
    #[error("member {id} not found in scope {scope}")]
    NotFound { scope: ScopeKey, id: i64 },

    #[error("display order {requested} is outside 1..={max} in scope {scope}")]
    OutOfRange {
        scope: ScopeKey,
        requested: i32,
        max: i32,
    },

    #[error(
        "reorder list for scope {scope} has {received} ids, expected the {expected} current members"
    )]
    IncompleteReorder {
        scope: ScopeKey,
        expected: usize,
        received: usize,
        /// Members of the scope absent from the list
        missing: Vec<i64>,
        /// Ids in the list that are not members of the scope
        unknown: Vec<i64>,
        /// Ids listed more than once
        duplicated: Vec<i64>,
    },

    #[error("store failure in scope {scope}: {message}")]
    StoreFailure { scope: ScopeKey, message: String },

    #[error("scope {scope} is not dense after the operation")]
    ScopeInconsistent { scope: ScopeKey },
}

impl OrderingError {
    pub fn scope(&self) -> ScopeKey {
        match self {
            OrderingError::NotFound { scope, .. }
            | OrderingError::OutOfRange { scope, .. }
            | OrderingError::IncompleteReorder { scope, .. }
            | OrderingError::StoreFailure { scope, .. }
            | OrderingError::ScopeInconsistent { scope } => *scope,
        }
    }

    pub fn is_store_failure(&self) -> bool {
        matches!(self, OrderingError::StoreFailure { .. })
    }
}

impl From<OrderingError> for AppError {
    fn from(err: OrderingError) -> Self {
        let scope = serde_json::to_value(err.scope()).unwrap_or_default();
        match err {
            OrderingError::NotFound { id, .. } => {
                AppError::with_message(ErrorCode::NotFound, format!("Item {id} not found"))
                    .with_detail("id", id)
                    .with_detail("scope", scope)
            }
            OrderingError::OutOfRange { requested, max, .. } => AppError::with_message(
                ErrorCode::OrderOutOfRange,
                format!("Display order must be between 1 and {max}"),
            )
            .with_detail("requested", requested)
            .with_detail("max", max)
            .with_detail("scope", scope),
            OrderingError::IncompleteReorder {
                expected,
                received,
                missing,
                unknown,
                duplicated,
                ..
            } => AppError::new(ErrorCode::ReorderIncomplete)
                .with_detail("expected", expected)
                .with_detail("received", received)
                .with_detail("missing", missing)
                .with_detail("unknown", unknown)
                .with_detail("duplicated", duplicated)
                .with_detail("scope", scope),
            OrderingError::StoreFailure { .. } => AppError::new(ErrorCode::OrderStoreFailure)
                .with_detail("reload", true)
                .with_detail("scope", scope),
            OrderingError::ScopeInconsistent { .. } => AppError::new(ErrorCode::ScopeNeedsRepair)
                .with_detail("reload", true)
                .with_detail("scope", scope),
        }
    }
}
