//! Service-layer error type
//!
//! `ServiceError` lets facades use `?` on `sqlx::Error`, `BoxError`,
//! `AppError` and `OrderingError` alike; handlers turn it into an `AppError`.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};
use shared::ordering::OrderingError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// - `Db`: infrastructure error, logged and mapped to `InternalError`
/// - `App`: business error passed through to the client
#[derive(Debug)]
pub enum ServiceError {
    Db(BoxError),
    App(AppError),
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        ServiceError::Db(e.into())
    }
}

impl From<BoxError> for ServiceError {
    fn from(e: BoxError) -> Self {
        ServiceError::Db(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<OrderingError> for ServiceError {
    fn from(e: OrderingError) -> Self {
        ServiceError::App(e.into())
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Db(db_err) => {
                tracing::error!(error = %db_err, "Service database error");
                AppError::new(ErrorCode::InternalError)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ordering::ScopeKey;

    #[test]
    fn db_errors_are_hidden() {
        let err: AppError = ServiceError::from(sqlx::Error::RowNotFound).into();
        assert_eq!(err.code, ErrorCode::InternalError);
    }

    #[test]
    fn ordering_errors_keep_their_code() {
        let err: AppError = ServiceError::from(OrderingError::ScopeInconsistent {
            scope: ScopeKey::Category(2),
        })
        .into();
        assert_eq!(err.code, ErrorCode::ScopeNeedsRepair);
    }
}
