//! HTTP helpers for end-to-end tests against a running weabase server.

use std::error::Error;
use std::net::SocketAddr;
use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

type TestResult<T> = Result<T, Box<dyn Error>>;

/// One client for every test in the binary
static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("Failed to build test HTTP client")
});

/// `path` (including any query string) on the server at `addr`
pub fn build_url(addr: &SocketAddr, path_and_query: &str) -> Url {
    Url::parse(&format!("http://{}{}", addr, path_and_query)).expect("Failed to parse URL")
}

pub async fn get(addr: &SocketAddr, path_and_query: &str) -> TestResult<Response> {
    let url = build_url(addr, path_and_query);
    println!("GET {}", url);
    Ok(CLIENT.get(url).send().await?)
}

/// Status and decoded JSON body, whatever the status
pub async fn get_json_any<T: DeserializeOwned>(
    addr: &SocketAddr,
    path_and_query: &str,
) -> TestResult<(StatusCode, T)> {
    let response = get(addr, path_and_query).await?;
    let status = response.status();
    let body = response.json::<T>().await?;
    Ok((status, body))
}

/// Decoded JSON body of a request expected to succeed
pub async fn get_json<T: DeserializeOwned>(addr: &SocketAddr, path_and_query: &str) -> TestResult<T> {
    let response = get(addr, path_and_query).await?;
    match response.status() {
        StatusCode::OK => Ok(response.json::<T>().await?),
        status => Err(format!("{} returned {}: {}", path_and_query, status, response.text().await?).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_keeps_query() {
        let addr: SocketAddr = ([127, 0, 0, 1], 8000).into();
        let url = build_url(&addr, "/getStnDates?stn=nnsc");
        assert_eq!(url.path(), "/getStnDates");
        assert_eq!(url.query(), Some("stn=nnsc"));
    }
}
