//! Request-context middleware
//!
//! The identity provider is an external collaborator: it issues JWTs that
//! carry who is acting and which location they are working in. This
//! middleware only verifies the token and threads that context into the
//! request; it never performs authentication itself.

use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use shared::LocationId;

use crate::error::ErrorResponse;

/// Acting user and location extracted from the JWT
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub user_id: uuid::Uuid,
    /// Display name, used for movement/audit attribution
    pub user_name: String,
    /// The location the caller is currently operating
    pub location_id: LocationId,
}

/// Middleware that validates the JWT and inserts a [`RequestContext`]
pub async fn context_middleware(mut request: Request, next: Next) -> Response {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return unauthorized_response("Missing or invalid Authorization header");
        }
    };

    // Get JWT secret from environment (fallback for middleware without state)
    let jwt_secret = std::env::var("STOCKROOM__JWT__SECRET")
        .or_else(|_| std::env::var("STOCKROOM_JWT_SECRET"))
        .unwrap_or_else(|_| "development-secret-key".to_string());

    let claims = match decode_jwt(token, &jwt_secret) {
        Ok(claims) => claims,
        Err(msg) => {
            return unauthorized_response(&msg);
        }
    };

    // Parse UUIDs from claims
    let user_id = match uuid::Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return unauthorized_response("Invalid user ID in token"),
    };

    let location_id = match claims.location_id.parse::<LocationId>() {
        Ok(id) => id,
        Err(_) => return unauthorized_response("Invalid location ID in token"),
    };

    let context = RequestContext {
        user_id,
        user_name: claims.name,
        location_id,
    };

    request.extensions_mut().insert(context);

    next.run(request).await
}

/// JWT claims structure
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    sub: String,
    name: String,
    location_id: String,
    exp: i64,
    iat: i64,
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: crate::error::ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            field: None,
        },
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for the request context
/// Use this in handlers to get the acting user and location
#[derive(Clone, Debug)]
pub struct CurrentContext(pub RequestContext);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .map(CurrentContext)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: crate::error::ErrorDetail {
                        code: "UNAUTHORIZED".to_string(),
                        message: "Authentication required".to_string(),
                        field: None,
                    },
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}
