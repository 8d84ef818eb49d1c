use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::routes::AppState;

// Tokens are issued by the session service; this side only verifies them.
#[derive(Serialize, Deserialize)]
pub struct Claims {
    pub exp: usize, // Expiry time of the token
    pub iat: usize, // Issued at time of the token
    pub sub: String, // user_id (uuid string)
}

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
}

pub fn decode_jwt(secret: &str, token: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.validate_exp = true;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| AppError::Unauthenticated(format!("invalid token: {e}")))?;

    Ok(data.claims)
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = identify(&state.jwt_secret, req.headers()).map_err(|e| {
        debug!(reason = %e, "rejected credentials");
        AppError::Unauthenticated(state.locale.labels().unauthorized.to_string())
    })?;
    debug!(%user_id, "authenticated");

    req.extensions_mut().insert(AuthUser { user_id });

    Ok(next.run(req).await)
}

fn identify(secret: &str, headers: &HeaderMap) -> Result<Uuid, AppError> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthenticated("Missing Authorization header".into()))?;

    let token = auth
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthenticated("Invalid Authorization scheme".into()))?;

    let claims = decode_jwt(secret, token)?;
    Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthenticated("Invalid sub in token".into()))
}

#[cfg(test)]
pub fn encode_jwt(secret: &str, user_id: Uuid) -> String {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(24)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_subject() {
        let user = Uuid::new_v4();
        let token = encode_jwt("secret", user);
        let claims = decode_jwt("secret", &token).unwrap();
        assert_eq!(claims.sub, user.to_string());
    }

    #[test]
    fn identifies_bearer_subject() {
        let user = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", encode_jwt("secret", user)).parse().unwrap(),
        );
        assert_eq!(identify("secret", &headers).unwrap(), user);

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(identify("secret", &headers).is_err());
        assert!(identify("secret", &HeaderMap::new()).is_err());
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = encode_jwt("secret", Uuid::new_v4());
        assert!(matches!(
            decode_jwt("other", &token),
            Err(AppError::Unauthenticated(_))
        ));
    }
}
