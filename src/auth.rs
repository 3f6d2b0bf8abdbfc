/// Request identity
///
/// Session handling lives in a fronting auth layer; it forwards the
/// authenticated user as an `X-User-Id` header. Handlers that gate on
/// ownership extract `UserId` and requests without the header are rejected.
use crate::error::AppError;
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

impl FromRequest for UserId {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user_id = req
            .headers()
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok());
        ready(match user_id {
            Some(id) => Ok(UserId(id)),
            None => Err(AppError::Unauthorized),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn extracts_user_id_from_header() {
        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header(("x-user-id", id.to_string()))
            .to_http_request();
        let extracted = UserId::extract(&req).await.unwrap();
        assert_eq!(extracted, UserId(id));
    }

    #[actix_web::test]
    async fn missing_header_is_unauthorized() {
        let req = TestRequest::default().to_http_request();
        assert!(UserId::extract(&req).await.is_err());
    }
}
