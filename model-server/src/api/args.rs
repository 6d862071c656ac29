//! Request arguments from either the query string or a JSON body
//!
//! Every endpoint accepts `GET ?a=b` as well as `POST {"a": "b"}`. An empty
//! POST body means "no arguments".

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Query, Request},
    http::Method,
};
use serde::de::DeserializeOwned;

use crate::api::error::ApiError;

/// Arguments of type `T` taken from the query string (GET, HEAD) or the
/// JSON body (any other method)
#[derive(Debug, Clone, Default)]
pub struct RequestArgs<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for RequestArgs<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if req.method() == Method::GET || req.method() == Method::HEAD {
            let Query(args) = Query::<T>::try_from_uri(req.uri())
                .map_err(|e| ApiError::BadRequest(format!("invalid query string: {}", e)))?;
            return Ok(RequestArgs(args));
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(format!("unreadable body: {}", e)))?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(RequestArgs(T::default()));
        }

        serde_json::from_slice(&body)
            .map(RequestArgs)
            .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))
    }
}
