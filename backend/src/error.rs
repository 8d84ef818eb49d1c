use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),
    #[error("relay interrupted after {forwarded} bytes: {reason}")]
    RelayInterrupted { forwarded: usize, reason: String },
    #[error("db error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamFailure(_)
            | AppError::RelayInterrupted { .. }
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // internal details stay in the log
        let message = match &self {
            AppError::UpstreamFailure(_) => {
                error!("{self}");
                "failed to process the analysis".to_string()
            }
            AppError::RelayInterrupted { .. } | AppError::Database(_) | AppError::Internal(_) => {
                error!("{self}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::{json, Value};

    async fn rendered(err: AppError) -> (StatusCode, Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_faults_are_masked() {
        let (status, body) = rendered(AppError::Database(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "internal server error"}));

        let (status, body) = rendered(AppError::RelayInterrupted {
            forwarded: 12,
            reason: "connection reset by peer".into(),
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "internal server error"}));

        let (_, body) = rendered(AppError::Internal("pool exhausted".into())).await;
        assert_eq!(body, json!({"error": "internal server error"}));
    }

    #[tokio::test]
    async fn upstream_failure_hides_upstream_detail() {
        let (status, body) =
            rendered(AppError::UpstreamFailure("HTTP error: 503 Service Unavailable".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "failed to process the analysis"}));
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() {
        let (status, body) = rendered(AppError::Forbidden("Não autorizado".into())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({"error": "Não autorizado"}));
    }
}
