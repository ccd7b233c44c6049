use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::{debug, warn};
use rocket::http::Status;
use rocket::request::{self, FromRequest, Request};
use rocket::response::status;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JWT claims accepted on protected routes.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    Missing,
    #[error("invalid bearer token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

/// Verifies HS256 bearer tokens. Managed only when auth is enabled.
pub struct Authenticator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Authenticator {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims)
    }
}

/// Request guard for write routes. Always succeeds when no
/// [`Authenticator`] is managed.
#[derive(Debug)]
pub struct Authenticated;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Authenticated {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let Some(authenticator) = req.rocket().state::<Authenticator>() else {
            return request::Outcome::Success(Authenticated);
        };

        let token = req
            .headers()
            .get_one("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "));
        let result = match token {
            Some(token) => authenticator.verify(token),
            None => Err(AuthError::Missing),
        };

        match result {
            Ok(claims) => {
                debug!("{} {} authenticated as {}", req.method(), req.uri(), claims.sub);
                request::Outcome::Success(Authenticated)
            }
            Err(e) => {
                warn!("{} {} rejected: {}", req.method(), req.uri(), e);
                request::Outcome::Error((Status::Unauthorized, e))
            }
        }
    }
}

#[derive(Serialize)]
pub struct AuthFailure {
    code: u16,
    message: &'static str,
}

#[catch(401)]
pub fn unauthorized() -> status::Custom<Json<AuthFailure>> {
    status::Custom(
        Status::Unauthorized,
        Json(AuthFailure {
            code: 401,
            message: "authentication required",
        }),
    )
}
