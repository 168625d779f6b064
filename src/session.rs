//! The signed-in user, as forwarded by the auth provider in request headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use one_core::OneError;

use crate::routes::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_IMAGE_HEADER: &str = "x-user-image";

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER).ok_or(OneError::Unauthenticated)?;

        Ok(Session {
            user_id,
            email: header(parts, USER_EMAIL_HEADER),
            name: header(parts, USER_NAME_HEADER),
            image: header(parts, USER_IMAGE_HEADER),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Session, AppError> {
        let (mut parts, _) = request.into_parts();
        Session::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_session_from_headers() {
        let request = Request::builder()
            .header(USER_ID_HEADER, "user-1")
            .header(USER_EMAIL_HEADER, "alice@example.com")
            .body(())
            .unwrap();

        let session = extract(request).await.unwrap();

        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.email.as_deref(), Some("alice@example.com"));
        assert_eq!(session.name, None);
    }

    #[tokio::test]
    async fn test_missing_or_blank_user_id_is_unauthenticated() {
        let missing = extract(Request::builder().body(()).unwrap()).await;
        assert_eq!(missing.unwrap_err().0, OneError::Unauthenticated);

        let blank = Request::builder()
            .header(USER_ID_HEADER, "  ")
            .body(())
            .unwrap();
        assert_eq!(extract(blank).await.unwrap_err().0, OneError::Unauthenticated);
    }
}
