use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::retry::{is_retryable_status, with_retry, RetryConfig};

/// Fields requested from the details endpoint. Billing is per field group,
/// so this stays a fixed list.
pub const DETAILS_FIELDS: &str =
    "name,formatted_address,formatted_phone_number,website,rating,price_level";

#[derive(Error, Debug)]
pub enum PlacesError {
    #[error("HTTP {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Request timed out")]
    Timeout,

    #[error("Query limit exceeded")]
    RateLimitExceeded,

    #[error("Request denied: {0}")]
    RequestDenied(String),

    #[error("Provider returned status {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Status {
        status: String,
        message: Option<String>,
    },

    /// Always built through `map_send_error`, which strips the URL (and the key in it)
    #[error("Network error: {0}")]
    NetworkError(#[source] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseError(#[from] serde_json::Error),
}

impl PlacesError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            PlacesError::Timeout | PlacesError::RateLimitExceeded => true,
            PlacesError::Http { status, .. } => is_retryable_status(*status),
            PlacesError::NetworkError(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlacesError>;

/// Client for the places web service (nearby search + place details)
pub struct PlacesClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    retry_config: RetryConfig,
}

impl PlacesClient {
    /// Point the client somewhere else (proxy, regional endpoint) and pick
    /// the per-request timeout
    pub fn with_options(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("Foodie/0.1.0"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(map_send_error)?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_config: RetryConfig::default(),
        })
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/json", self.base_url, path)
    }

    /// Places of `place_type` within `radius_meters` of a point, in provider order
    pub async fn nearby_search(
        &self,
        lat: f64,
        lng: f64,
        radius_meters: u32,
        place_type: &str,
    ) -> Result<Vec<NearbyPlace>> {
        let url = self.endpoint("nearbysearch");
        let params = [
            ("location", format!("{},{}", lat, lng)),
            ("radius", radius_meters.to_string()),
            ("type", place_type.to_string()),
            ("key", self.api_key.clone()),
        ];

        // Status is checked per attempt so OVER_QUERY_LIMIT gets backed off too
        let results = with_retry(&self.retry_config, PlacesError::is_retryable, || {
            self.nearby_once(&url, &params)
        })
        .await?;

        debug!(
            "Nearby search at ({}, {}) returned {} places",
            lat,
            lng,
            results.len()
        );
        Ok(results)
    }

    /// Extended details for one place; `None` when the provider doesn't know the id
    pub async fn place_details(&self, place_id: &str) -> Result<Option<PlaceDetails>> {
        let url = self.endpoint("details");
        let params = [
            ("place_id", place_id.to_string()),
            ("fields", DETAILS_FIELDS.to_string()),
            ("key", self.api_key.clone()),
        ];

        let details = with_retry(&self.retry_config, PlacesError::is_retryable, || {
            self.details_once(&url, &params)
        })
        .await?;

        if details.is_none() {
            debug!("Place {} not found", place_id);
        }
        Ok(details)
    }

    async fn nearby_once(&self, url: &str, params: &[(&str, String)]) -> Result<Vec<NearbyPlace>> {
        let body = self.get_text(url, params).await?;
        let response: NearbySearchResponse = serde_json::from_str(&body)?;
        check_status(&response.status, response.error_message)?;
        Ok(response.results)
    }

    async fn details_once(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Option<PlaceDetails>> {
        let body = self.get_text(url, params).await?;
        let response: PlaceDetailsResponse = serde_json::from_str(&body)?;
        if response.status == "NOT_FOUND" {
            return Ok(None);
        }
        check_status(&response.status, response.error_message)?;
        Ok(response.result)
    }

    async fn get_text(&self, url: &str, params: &[(&str, String)]) -> Result<String> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlacesError::Http { status, body });
        }

        response.text().await.map_err(map_send_error)
    }
}

fn map_send_error(e: reqwest::Error) -> PlacesError {
    if e.is_timeout() {
        PlacesError::Timeout
    } else {
        PlacesError::NetworkError(e.without_url())
    }
}

/// Translate the provider's in-body status into an error
///
/// The service answers HTTP 200 for most failures and reports them here.
pub fn check_status(status: &str, error_message: Option<String>) -> Result<()> {
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        "OVER_QUERY_LIMIT" => Err(PlacesError::RateLimitExceeded),
        "REQUEST_DENIED" => Err(PlacesError::RequestDenied(
            error_message.unwrap_or_else(|| "check the API key".to_string()),
        )),
        other => Err(PlacesError::Status {
            status: other.to_string(),
            message: error_message,
        }),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbySearchResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<NearbyPlace>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyPlace {
    pub place_id: String,
    pub name: String,
    pub geometry: Geometry,
    pub rating: Option<f64>,
    pub vicinity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceDetailsResponse {
    pub status: String,
    pub result: Option<PlaceDetails>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlaceDetails {
    #[serde(default)]
    pub name: String,
    pub formatted_address: Option<String>,
    pub formatted_phone_number: Option<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub price_level: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    const NEARBY_BODY: &str = r#"{
        "html_attributions": [],
        "results": [
            {
                "place_id": "ChIJ1",
                "name": "Casa Pepe",
                "geometry": { "location": { "lat": 40.4168, "lng": -3.7038 } },
                "rating": 4.4,
                "vicinity": "Calle Mayor 1, Madrid"
            },
            {
                "place_id": "ChIJ2",
                "name": "Sin Nota",
                "geometry": { "location": { "lat": 40.42, "lng": -3.70 } }
            }
        ],
        "status": "OK"
    }"#;

    const DETAILS_BODY: &str = r#"{
        "result": {
            "name": "Casa Pepe",
            "formatted_address": "Calle Mayor 1, 28013 Madrid, Spain",
            "formatted_phone_number": "912 34 56 78",
            "website": "https://casapepe.example",
            "rating": 4.4,
            "price_level": 2
        },
        "status": "OK"
    }"#;

    #[test]
    fn test_parse_nearby_response() {
        let response: NearbySearchResponse = serde_json::from_str(NEARBY_BODY).unwrap();
        assert_eq!(response.status, "OK");
        assert_eq!(response.results.len(), 2);

        let first = &response.results[0];
        assert_eq!(first.place_id, "ChIJ1");
        assert_eq!(first.geometry.location, LatLng { lat: 40.4168, lng: -3.7038 });
        assert_eq!(first.rating, Some(4.4));
        assert_eq!(response.results[1].rating, None);
    }

    #[test]
    fn test_parse_zero_results_without_results_key() {
        let response: NearbySearchResponse =
            serde_json::from_str(r#"{ "status": "ZERO_RESULTS" }"#).unwrap();
        assert!(response.results.is_empty());
        assert!(check_status(&response.status, None).is_ok());
    }

    #[test]
    fn test_parse_details_response() {
        let response: PlaceDetailsResponse = serde_json::from_str(DETAILS_BODY).unwrap();
        let details = response.result.unwrap();
        assert_eq!(details.name, "Casa Pepe");
        assert_eq!(details.formatted_phone_number.as_deref(), Some("912 34 56 78"));
        assert_eq!(details.price_level, Some(2));
    }

    #[test]
    fn test_check_status_mapping() {
        assert!(check_status("OK", None).is_ok());
        assert!(matches!(
            check_status("OVER_QUERY_LIMIT", None),
            Err(PlacesError::RateLimitExceeded)
        ));
        assert!(matches!(
            check_status("REQUEST_DENIED", Some("The provided API key is invalid.".into())),
            Err(PlacesError::RequestDenied(msg)) if msg.contains("invalid")
        ));
        assert!(matches!(
            check_status("INVALID_REQUEST", None),
            Err(PlacesError::Status { status, .. }) if status == "INVALID_REQUEST"
        ));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(PlacesError::Timeout.is_retryable());
        assert!(PlacesError::RateLimitExceeded.is_retryable());
        assert!(PlacesError::Http {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: String::new(),
        }
        .is_retryable());

        assert!(!PlacesError::RequestDenied("bad key".into()).is_retryable());
        assert!(!PlacesError::Http {
            status: reqwest::StatusCode::FORBIDDEN,
            body: String::new(),
        }
        .is_retryable());
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = PlacesClient::with_options(
            "key".into(),
            "http://localhost:8080/place/".into(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/place");
        assert_eq!(
            client.endpoint("nearbysearch"),
            "http://localhost:8080/place/nearbysearch/json"
        );
    }

    #[tokio::test]
    async fn test_network_error_hides_api_key() {
        // Port 9 (discard) is closed on any sane test machine
        let client = PlacesClient::with_options(
            "SECRET_KEY_123".into(),
            "http://127.0.0.1:9".into(),
            Duration::from_secs(2),
        )
        .unwrap()
        .with_retry_config(RetryConfig::none());

        let err = client
            .nearby_search(40.0, -3.0, 1500, "restaurant")
            .await
            .unwrap_err();
        assert!(matches!(err, PlacesError::NetworkError(_)));
        assert!(!err.to_string().contains("SECRET_KEY_123"));
        assert!(!format!("{:?}", err).contains("SECRET_KEY_123"));
    }

    /// Answers each connection with the next canned JSON body and hands back
    /// the request lines it saw
    async fn serve_json(bodies: Vec<&'static str>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut request_lines = Vec::new();
            for body in bodies {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                request_lines.push(request.lines().next().unwrap_or_default().to_string());

                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
            request_lines
        });

        (format!("http://{}", addr), handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn local_client(base_url: String) -> PlacesClient {
        PlacesClient::with_options("test-key".into(), base_url, Duration::from_secs(5))
            .unwrap()
            .with_retry_config(RetryConfig::none())
    }

    #[tokio::test]
    async fn test_nearby_search_sends_location_radius_type_and_key() {
        let (base_url, server) = serve_json(vec![NEARBY_BODY]).await;
        let client = local_client(base_url);

        let places = client
            .nearby_search(40.5, -3.25, 800, "restaurant")
            .await
            .unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].name, "Casa Pepe");

        let lines = server.await.unwrap();
        let line = &lines[0];
        assert!(line.starts_with("GET /nearbysearch/json?"), "{}", line);
        assert!(line.contains("location=40.5%2C-3.25"), "{}", line);
        assert!(line.contains("radius=800"), "{}", line);
        assert!(line.contains("type=restaurant"), "{}", line);
        assert!(line.contains("key=test-key"), "{}", line);
    }

    #[tokio::test]
    async fn test_details_sends_place_id_and_fields() {
        let (base_url, server) = serve_json(vec![DETAILS_BODY]).await;
        let client = local_client(base_url);

        let details = client.place_details("ChIJ1").await.unwrap().unwrap();
        assert_eq!(
            details.formatted_address.as_deref(),
            Some("Calle Mayor 1, 28013 Madrid, Spain")
        );

        let lines = server.await.unwrap();
        let line = &lines[0];
        assert!(line.starts_with("GET /details/json?"), "{}", line);
        assert!(line.contains("place_id=ChIJ1"), "{}", line);
        assert!(
            line.contains(
                "fields=name%2Cformatted_address%2Cformatted_phone_number%2Cwebsite%2Crating%2Cprice_level"
            ),
            "{}",
            line
        );
        assert!(line.contains("key=test-key"), "{}", line);
    }

    #[tokio::test]
    async fn test_details_not_found_is_none() {
        let (base_url, _server) = serve_json(vec![r#"{ "status": "NOT_FOUND" }"#]).await;
        let client = local_client(base_url);

        assert!(client.place_details("gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_request_denied_is_not_retried() {
        let (base_url, server) = serve_json(vec![
            r#"{ "status": "REQUEST_DENIED", "error_message": "The provided API key is invalid." }"#,
        ])
        .await;
        let client = local_client(base_url).with_retry_config(RetryConfig {
            max_retries: 2,
            initial_delay_ms: 10,
            max_delay_ms: 10,
            backoff_multiplier: 1.0,
        });

        let err = client
            .nearby_search(40.0, -3.0, 1500, "restaurant")
            .await
            .unwrap_err();
        assert!(matches!(err, PlacesError::RequestDenied(_)));
        assert_eq!(server.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_over_query_limit_is_retried() {
        let (base_url, server) = serve_json(vec![
            r#"{ "status": "OVER_QUERY_LIMIT" }"#,
            r#"{ "status": "ZERO_RESULTS" }"#,
        ])
        .await;
        let client = local_client(base_url).with_retry_config(RetryConfig {
            max_retries: 1,
            initial_delay_ms: 10,
            max_delay_ms: 10,
            backoff_multiplier: 1.0,
        });

        let places = client
            .nearby_search(40.0, -3.0, 1500, "restaurant")
            .await
            .unwrap();
        assert!(places.is_empty());
        assert_eq!(server.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_silent_provider_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept, then never answer
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let client = PlacesClient::with_options(
            "test-key".into(),
            format!("http://{}", addr),
            Duration::from_secs(1),
        )
        .unwrap()
        .with_retry_config(RetryConfig::none());

        let err = client.place_details("slow").await.unwrap_err();
        assert!(matches!(err, PlacesError::Timeout));
    }
}
