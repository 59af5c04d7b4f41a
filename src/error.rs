use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SkilletError {
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("DocType not found: {0}")]
    DocTypeNotFound(String),

    #[error("Language not found: {0}")]
    LanguageNotFound(String),

    #[error("Change feed error: {0}")]
    Feed(String),

    #[error("Read-side transport error: {0}")]
    QuerySide(String),

    #[error("Content extraction error: {0}")]
    Extraction(String),

    #[error("Language identification error: {0}")]
    Classification(String),

    #[error("Update queue is full, can't accept new notifications for now")]
    QueueFull,

    #[error("Retry count {count} has exceeded the limit {max} for docType {doc_type}")]
    RetryExhausted {
        doc_type: String,
        count: u32,
        max: u32,
    },

    #[error("Schema description error: {0}")]
    Schema(String),

    #[error("Invalid options: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("YAML error: {0}")]
    Yaml(String),
}

pub type Result<T> = std::result::Result<T, SkilletError>;

impl From<std::io::Error> for SkilletError {
    fn from(e: std::io::Error) -> Self {
        SkilletError::Io(e.to_string())
    }
}

impl From<tantivy::TantivyError> for SkilletError {
    fn from(e: tantivy::TantivyError) -> Self {
        SkilletError::Index(e.to_string())
    }
}

impl From<serde_json::Error> for SkilletError {
    fn from(e: serde_json::Error) -> Self {
        SkilletError::Json(e.to_string())
    }
}

impl From<serde_yaml::Error> for SkilletError {
    fn from(e: serde_yaml::Error) -> Self {
        SkilletError::Yaml(e.to_string())
    }
}

impl SkilletError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SkilletError::InstanceNotFound(_) => StatusCode::NOT_FOUND,
            SkilletError::DocTypeNotFound(_) => StatusCode::NOT_FOUND,
            SkilletError::LanguageNotFound(_) => StatusCode::NOT_FOUND,
            SkilletError::Feed(_) => StatusCode::BAD_GATEWAY,
            SkilletError::QuerySide(_) => StatusCode::BAD_GATEWAY,
            SkilletError::Extraction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SkilletError::Classification(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SkilletError::QueueFull => StatusCode::TOO_MANY_REQUESTS,
            SkilletError::RetryExhausted { .. } => StatusCode::TOO_MANY_REQUESTS,
            SkilletError::Schema(_) => StatusCode::BAD_REQUEST,
            SkilletError::Config(_) => StatusCode::BAD_REQUEST,
            SkilletError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SkilletError::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SkilletError::Json(_) => StatusCode::BAD_REQUEST,
            SkilletError::Yaml(_) => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(feature = "axum-support")]
impl axum::response::IntoResponse for SkilletError {
    fn into_response(self) -> axum::response::Response {
        let body = axum::Json(serde_json::json!({ "error": self.to_string() }));
        (self.status_code(), body).into_response()
    }
}
