use std::{collections::HashMap, sync::Arc, time::Duration};

use reqwest;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::constants;

// Shared HTTP client instances. The lax client skips certificate
// verification; brvm.org serves a broken chain.
lazy_static::lazy_static! {
    static ref CLIENT: Arc<reqwest::Client> = Arc::new(
        reqwest::Client::builder()
            .user_agent(constants::USER_AGENT)
            .timeout(Duration::from_secs(constants::HTTP_TIMEOUT_SECS))
            .build()
            .unwrap(),
    );
    static ref LAX_CLIENT: Arc<reqwest::Client> = Arc::new(
        reqwest::Client::builder()
            .user_agent(constants::USER_AGENT)
            .timeout(Duration::from_secs(constants::HTTP_TIMEOUT_SECS))
            .danger_accept_invalid_certs(true)
            .build()
            .unwrap(),
    );
}

/// Custom error type for HTTP requests.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("HTTP error: {0}. Status: {1}. Response body: {2}")]
    HttpError(reqwest::Url, u16, String),
    #[error("Error deserializing JSON: {0}")]
    JsonError(String),
    #[error("Other error: {0}")]
    Other(String),
}

impl RequestError {
    /// The HTTP status carried by the error, when the server answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RequestError::HttpError(_, status, _) => Some(*status),
            _ => None,
        }
    }
}

/// Makes a GET request to the given path with optional query parameters
/// and deserializes the JSON response.
pub async fn get_json<T: DeserializeOwned>(
    path: &str,                  // Endpoint URL.
    params: HashMap<&str, &str>, // Optional query parameters.
) -> Result<T, RequestError> {
    // Construct the URL.
    let url = if params.is_empty() {
        reqwest::Url::parse(path).map_err(|e| RequestError::Other(e.to_string()))?
    } else {
        reqwest::Url::parse_with_params(path, &params)
            .map_err(|e| RequestError::Other(e.to_string()))?
    };

    let response = CLIENT
        .get(url.as_str())
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| RequestError::Other(e.to_string()))?;

    let status = response.status();

    // Handle non-success status codes.
    if !status.is_success() {
        let body = response
            .text()
            .await
            .map_err(|e| RequestError::Other(e.to_string()))?;
        return Err(RequestError::HttpError(url, status.as_u16(), body));
    }

    // Deserialize the JSON response.
    response
        .json()
        .await
        .map_err(|e| RequestError::JsonError(e.to_string()))
}

/// Downloads a page as plain text. Used for the BRVM snapshot fetch.
pub async fn get_text(url: &str, accept_invalid_certs: bool) -> Result<String, RequestError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| RequestError::Other(e.to_string()))?;

    let client: &reqwest::Client =
        if accept_invalid_certs { &LAX_CLIENT } else { &CLIENT };
    let response = client
        .get(parsed.as_str())
        .send()
        .await
        .map_err(|e| RequestError::Other(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .map_err(|e| RequestError::Other(e.to_string()))?;
        return Err(RequestError::HttpError(parsed, status.as_u16(), body));
    }

    response
        .text()
        .await
        .map_err(|e| RequestError::Other(e.to_string()))
}
