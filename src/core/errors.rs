use spin_sdk::http::Response;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoardError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    /// Credentials did not match.
    #[error("{0}")]
    Auth(String),
    /// The route requires a logged-in user and there is none.
    #[error("Please log in.")]
    Unauthenticated,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BoardError {
    pub fn validation(msg: impl Into<String>) -> Self {
        BoardError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        BoardError::NotFound(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        BoardError::Auth(msg.into())
    }

    pub fn status(&self) -> u16 {
        match self {
            BoardError::Validation(_) => 400,
            BoardError::NotFound(_) => 404,
            BoardError::Auth(_) | BoardError::Unauthenticated => 401,
            BoardError::Internal(_) => 500,
        }
    }
}

impl From<BoardError> for Response {
    fn from(err: BoardError) -> Self {
        let message = match &err {
            BoardError::Internal(inner) => {
                tracing::error!(error = %inner, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = serde_json::json!({ "error": message }).to_string();
        Response::builder()
            .status(err.status())
            .header("content-type", "application/json")
            .body(body)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(BoardError::validation("Title required.").status(), 400);
        assert_eq!(BoardError::not_found("No topic found").status(), 404);
        assert_eq!(BoardError::auth("nope").status(), 401);
        assert_eq!(BoardError::Unauthenticated.status(), 401);
        assert_eq!(BoardError::from(anyhow::anyhow!("disk on fire")).status(), 500);
    }

    #[test]
    fn internal_details_stay_out_of_the_body() {
        let resp: Response = BoardError::from(anyhow::anyhow!("disk on fire")).into();
        assert_eq!(*resp.status(), 500);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["error"], "Internal server error");
    }
}
