//! Google Maps provider client: nearby place search, geocoding and travel
//! distance, plus the deterministic fixtures served in mock mode.

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::http::{build_http_client, ResponseExt, DEFAULT_TIMEOUT};

const BASE_URL: &str = "https://maps.googleapis.com/maps/api";

/// Errors from the Google Maps client.
#[derive(Error, Debug)]
pub enum PlacesError {
    #[error("invalid {field}: {message}")]
    InvalidInput { field: &'static str, message: String },

    #[error("Google API key is required. Set GOOGLE_API_KEY or enable MOCK_GOOGLE_API")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Google Maps API failed: {0}")]
    Provider(String),
}

/// Provider search ordering. Distance ranking excludes a radius constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankBy {
    Distance,
    Prominence,
}

impl FromStr for RankBy {
    type Err = PlacesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "distance" => Ok(Self::Distance),
            "prominence" => Ok(Self::Prominence),
            other => Err(PlacesError::InvalidInput {
                field: "rankby",
                message: format!(r#"must be "distance" or "prominence", got "{other}""#),
            }),
        }
    }
}

/// Caller-supplied parameters for a nearby search.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: u32,
    pub keyword: String,
    pub place_type: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub language: Option<String>,
    pub rank_by: Option<RankBy>,
    pub name: Option<String>,
}

impl SearchQuery {
    /// A query centered on the given coordinate, with default radius and keyword.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius: 1000,
            keyword: "hotel".to_string(),
            place_type: None,
            min_price: None,
            max_price: None,
            language: None,
            rank_by: None,
            name: None,
        }
    }

    pub fn with_radius(mut self, radius: u32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    pub fn with_price_range(mut self, min_price: Option<i64>, max_price: Option<i64>) -> Self {
        self.min_price = min_price;
        self.max_price = max_price;
        self
    }

    pub fn with_rank_by(mut self, rank_by: RankBy) -> Self {
        self.rank_by = Some(rank_by);
        self
    }

    fn validate(&self) -> Result<(), PlacesError> {
        for (field, value) in [("min_price", self.min_price), ("max_price", self.max_price)] {
            if let Some(v) = value {
                if !(0..=4).contains(&v) {
                    return Err(PlacesError::InvalidInput {
                        field,
                        message: format!("must be between 0 and 4, got {v}"),
                    });
                }
            }
        }
        Ok(())
    }

    fn to_params(&self, key: &str) -> NearbySearchParams {
        // Radius and distance ranking are mutually exclusive upstream.
        let radius = match self.rank_by {
            Some(RankBy::Distance) => None,
            _ => Some(self.radius),
        };
        NearbySearchParams {
            location: format!("{},{}", self.latitude, self.longitude),
            radius,
            keyword: self.keyword.clone(),
            place_type: self.place_type.clone(),
            minprice: self.min_price,
            maxprice: self.max_price,
            language: self.language.clone(),
            rankby: self.rank_by,
            name: self.name.clone(),
            key: key.to_string(),
        }
    }
}

/// Outbound query parameters for the Nearby Search endpoint. Absent fields
/// are omitted from the request entirely.
#[skip_serializing_none]
#[derive(Debug, Serialize)]
pub struct NearbySearchParams {
    pub location: String,
    pub radius: Option<u32>,
    pub keyword: String,
    #[serde(rename = "type")]
    pub place_type: Option<String>,
    pub minprice: Option<i64>,
    pub maxprice: Option<i64>,
    pub language: Option<String>,
    pub rankby: Option<RankBy>,
    pub name: Option<String>,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct GeocodeParams {
    pub address: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct DistanceMatrixParams {
    pub origins: String,
    pub destinations: String,
    pub mode: String,
    pub key: String,
}

/// A geographic coordinate as the provider reports it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Geometry {
    pub location: Option<LatLng>,
}

/// One photo attachment on a raw place record.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoRef {
    pub photo_reference: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// One place as returned by the provider, before shaping.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlace {
    pub name: Option<String>,
    pub vicinity: Option<String>,
    pub formatted_address: Option<String>,
    pub rating: Option<f64>,
    pub user_ratings_total: Option<u64>,
    pub price_level: Option<i64>,
    pub place_id: Option<String>,
    pub business_status: Option<String>,
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub photos: Vec<PhotoRef>,
}

#[derive(Debug, Deserialize)]
pub struct PlacesResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<RawPlace>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeResult {
    pub geometry: Geometry,
}

#[derive(Debug, Deserialize)]
pub struct DistanceMatrixResponse {
    pub status: String,
    #[serde(default)]
    pub rows: Vec<DistanceRow>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DistanceRow {
    #[serde(default)]
    pub elements: Vec<DistanceElement>,
}

#[derive(Debug, Deserialize)]
pub struct DistanceElement {
    pub status: String,
    pub distance: Option<TextValue>,
    pub duration: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
pub struct TextValue {
    pub text: String,
}

/// Transport seam for the Google Maps endpoints, so the client can be
/// exercised against a stub.
#[async_trait]
pub trait PlacesApi: Send + Sync {
    async fn nearby_search(&self, params: &NearbySearchParams)
        -> Result<PlacesResponse, PlacesError>;

    async fn geocode(&self, params: &GeocodeParams) -> Result<GeocodeResponse, PlacesError>;

    async fn distance_matrix(
        &self,
        params: &DistanceMatrixParams,
    ) -> Result<DistanceMatrixResponse, PlacesError>;
}

/// Live implementation against the Google Maps web service.
pub struct HttpPlacesApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPlacesApi {
    pub fn new() -> Result<Self, PlacesError> {
        Ok(Self {
            http: build_http_client(DEFAULT_TIMEOUT)?,
            base_url: BASE_URL.to_string(),
        })
    }

    async fn get_json<T, P>(&self, path: &str, params: &P) -> Result<T, PlacesError>
    where
        T: serde::de::DeserializeOwned,
        P: Serialize + Sync,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "querying Google Maps API");
        let response = self.http.get(&url).query(params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text_logged().await.unwrap_or_default();
            return Err(PlacesError::Provider(format!("HTTP {status}: {body}")));
        }
        response.json_logged().await
    }
}

#[async_trait]
impl PlacesApi for HttpPlacesApi {
    async fn nearby_search(
        &self,
        params: &NearbySearchParams,
    ) -> Result<PlacesResponse, PlacesError> {
        self.get_json("/place/nearbysearch/json", params).await
    }

    async fn geocode(&self, params: &GeocodeParams) -> Result<GeocodeResponse, PlacesError> {
        self.get_json("/geocode/json", params).await
    }

    async fn distance_matrix(
        &self,
        params: &DistanceMatrixParams,
    ) -> Result<DistanceMatrixResponse, PlacesError> {
        self.get_json("/distancematrix/json", params).await
    }
}

/// Google Maps client with injectable transport, credentials and mock flag.
pub struct PlacesClient {
    api: Box<dyn PlacesApi>,
    api_key: Option<String>,
    mock: bool,
}

impl PlacesClient {
    pub fn new(api: Box<dyn PlacesApi>, api_key: Option<String>, mock: bool) -> Self {
        Self { api, api_key, mock }
    }

    pub fn from_config(config: &Config) -> Result<Self, PlacesError> {
        Ok(Self::new(
            Box::new(HttpPlacesApi::new()?),
            config.google_api_key.clone(),
            config.mock_google_api,
        ))
    }

    /// The key embedded into derived photo URLs. Empty when none is configured.
    pub fn photo_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or("")
    }

    fn api_key(&self) -> Result<&str, PlacesError> {
        self.api_key.as_deref().ok_or(PlacesError::MissingApiKey)
    }

    /// Search for places around a coordinate. Caller errors are detected
    /// before any network traffic; the mock switch wins over everything.
    pub async fn search_nearby(&self, query: &SearchQuery) -> Result<Vec<RawPlace>, PlacesError> {
        if self.mock {
            debug!("MOCK_GOOGLE_API enabled, serving nearby-search fixtures");
            return Ok(mock_places(query.latitude, query.longitude));
        }
        query.validate()?;
        let params = query.to_params(self.api_key()?);
        let response = self.api.nearby_search(&params).await?;
        match response.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(response.results),
            status => Err(PlacesError::Provider(provider_message(
                status,
                response.error_message,
            ))),
        }
    }

    /// Resolve an address or place name to a coordinate. `None` means the
    /// provider found nothing for the address.
    pub async fn geocode(&self, address: &str) -> Result<Option<LatLng>, PlacesError> {
        if self.mock {
            debug!("MOCK_GOOGLE_API enabled, serving geocode fixture");
            return Ok(Some(LatLng {
                lat: 40.785091,
                lng: -73.968285,
            }));
        }
        let params = GeocodeParams {
            address: address.to_string(),
            key: self.api_key()?.to_string(),
        };
        let response = self.api.geocode(&params).await?;
        match response.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(response
                .results
                .into_iter()
                .next()
                .and_then(|result| result.geometry.location)),
            status => Err(PlacesError::Provider(provider_message(
                status,
                response.error_message,
            ))),
        }
    }

    /// Distance and travel time between two points, rendered for display.
    pub async fn travel_distance(
        &self,
        origin: &str,
        destination: &str,
        mode: &str,
    ) -> Result<String, PlacesError> {
        if self.mock {
            debug!("MOCK_GOOGLE_API enabled, serving distance fixture");
            return Ok(format!(
                "Mock Distance: 5.2 km (Time: 15 mins) via {mode} from '{origin}' to '{destination}'"
            ));
        }
        let params = DistanceMatrixParams {
            origins: origin.to_string(),
            destinations: destination.to_string(),
            mode: mode.to_string(),
            key: self.api_key()?.to_string(),
        };
        let response = self.api.distance_matrix(&params).await?;
        if response.status != "OK" {
            return Err(PlacesError::Provider(provider_message(
                &response.status,
                response.error_message,
            )));
        }
        let element = response
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.elements.into_iter().next())
            .ok_or_else(|| {
                PlacesError::Provider("distance matrix response contained no elements".to_string())
            })?;
        if element.status != "OK" {
            return Ok(format!("Could not calculate distance: {}", element.status));
        }
        let distance = element
            .distance
            .map(|d| d.text)
            .unwrap_or_else(|| "N/A".to_string());
        let duration = element
            .duration
            .map(|d| d.text)
            .unwrap_or_else(|| "N/A".to_string());
        Ok(format!(
            "Distance: {distance}, Duration: {duration} (Mode: {mode})"
        ))
    }
}

fn provider_message(status: &str, error_message: Option<String>) -> String {
    match error_message {
        Some(message) => format!("status {status}: {message}"),
        None => format!("status {status}"),
    }
}

/// Deterministic fixture set served when `MOCK_GOOGLE_API` is enabled.
/// Six entries so the shaping cap is exercised end to end.
fn mock_places(latitude: f64, longitude: f64) -> Vec<RawPlace> {
    let at = |dlat: f64, dlng: f64| {
        Some(Geometry {
            location: Some(LatLng {
                lat: latitude + dlat,
                lng: longitude + dlng,
            }),
        })
    };
    vec![
        RawPlace {
            name: Some("The Grand Mock Resort".to_string()),
            vicinity: Some("456 Fake St, Simulation Town".to_string()),
            rating: Some(5.0),
            user_ratings_total: Some(48),
            price_level: Some(4),
            place_id: Some("ChIJmock-grand-resort-0001".to_string()),
            business_status: Some("OPERATIONAL".to_string()),
            geometry: at(-0.001, -0.001),
            photos: vec![
                PhotoRef {
                    photo_reference: "mock-photo-grand-low".to_string(),
                    width: 400,
                    height: 300,
                },
                PhotoRef {
                    photo_reference: "mock-photo-grand-high".to_string(),
                    width: 800,
                    height: 600,
                },
            ],
            ..Default::default()
        },
        RawPlace {
            name: Some("Mock Hotel California".to_string()),
            vicinity: Some("123 Mockingbird Lane, Mock City".to_string()),
            rating: Some(4.5),
            user_ratings_total: Some(1203),
            price_level: Some(3),
            place_id: Some("ChIJmock-hotel-california-0002".to_string()),
            business_status: Some("OPERATIONAL".to_string()),
            geometry: at(0.001, 0.001),
            photos: vec![PhotoRef {
                photo_reference: "mock-photo-california".to_string(),
                width: 640,
                height: 480,
            }],
            ..Default::default()
        },
        RawPlace {
            name: Some("Casa del Mock".to_string()),
            formatted_address: Some("789 Plaza Falsa, Mock City".to_string()),
            rating: Some(4.5),
            user_ratings_total: Some(876),
            price_level: Some(2),
            geometry: at(0.002, -0.002),
            ..Default::default()
        },
        RawPlace {
            name: Some("Mock Diner".to_string()),
            vicinity: Some("12 Greasy Spoon Rd, Mock City".to_string()),
            rating: Some(3.8),
            user_ratings_total: Some(321),
            price_level: Some(1),
            business_status: Some("CLOSED_TEMPORARILY".to_string()),
            geometry: at(-0.002, 0.002),
            ..Default::default()
        },
        RawPlace {
            name: Some("Budget Mock Inn".to_string()),
            vicinity: Some("99 Last Resort Ave, Simulation Town".to_string()),
            rating: Some(2.9),
            user_ratings_total: Some(54),
            price_level: Some(0),
            geometry: at(0.003, 0.003),
            ..Default::default()
        },
        RawPlace {
            name: Some("Forgotten Mock Bar".to_string()),
            ..Default::default()
        },
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct StubApi {
        nearby_calls: Arc<AtomicUsize>,
        distance_response: Arc<Mutex<Option<DistanceMatrixResponse>>>,
    }

    #[async_trait]
    impl PlacesApi for StubApi {
        async fn nearby_search(
            &self,
            _params: &NearbySearchParams,
        ) -> Result<PlacesResponse, PlacesError> {
            self.nearby_calls.fetch_add(1, Ordering::SeqCst);
            Ok(PlacesResponse {
                status: "OK".to_string(),
                results: Vec::new(),
                error_message: None,
            })
        }

        async fn geocode(&self, _params: &GeocodeParams) -> Result<GeocodeResponse, PlacesError> {
            Ok(GeocodeResponse {
                status: "ZERO_RESULTS".to_string(),
                results: Vec::new(),
                error_message: None,
            })
        }

        async fn distance_matrix(
            &self,
            _params: &DistanceMatrixParams,
        ) -> Result<DistanceMatrixResponse, PlacesError> {
            let rigged = self.distance_response.lock().unwrap().take();
            Ok(rigged.unwrap_or(DistanceMatrixResponse {
                status: "OK".to_string(),
                rows: Vec::new(),
                error_message: None,
            }))
        }
    }

    fn stub_client(api: StubApi) -> PlacesClient {
        PlacesClient::new(Box::new(api), Some("test-key".to_string()), false)
    }

    #[test]
    fn rankby_parses_both_variants() {
        assert_eq!("distance".parse::<RankBy>().unwrap(), RankBy::Distance);
        assert_eq!("prominence".parse::<RankBy>().unwrap(), RankBy::Prominence);
    }

    #[test]
    fn rankby_rejects_unknown_values() {
        let err = "nearest".parse::<RankBy>().unwrap_err();
        assert!(matches!(
            err,
            PlacesError::InvalidInput { field: "rankby", .. }
        ));
    }

    #[test]
    fn distance_ranking_omits_radius_from_params() {
        let query = SearchQuery::new(42.55, 1.51)
            .with_radius(1000)
            .with_rank_by(RankBy::Distance);
        let value = serde_json::to_value(query.to_params("k")).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("radius"));
        assert_eq!(object["rankby"], "distance");
    }

    #[test]
    fn absent_optionals_are_omitted_from_params() {
        let query = SearchQuery::new(42.55, 1.51);
        let value = serde_json::to_value(query.to_params("k")).unwrap();
        let object = value.as_object().unwrap();
        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["key", "keyword", "location", "radius"]);
        assert_eq!(object["location"], "42.55,1.51");
        assert_eq!(object["radius"], 1000);
    }

    #[tokio::test]
    async fn min_price_out_of_range_fails_before_network() {
        let api = StubApi::default();
        let calls = api.nearby_calls.clone();
        let client = stub_client(api);
        let query = SearchQuery::new(1.0, 2.0).with_price_range(Some(5), None);

        let err = client.search_nearby(&query).await.unwrap_err();
        assert!(matches!(
            err,
            PlacesError::InvalidInput { field: "min_price", .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn max_price_out_of_range_fails_before_network() {
        let api = StubApi::default();
        let calls = api.nearby_calls.clone();
        let client = stub_client(api);
        let query = SearchQuery::new(1.0, 2.0).with_price_range(None, Some(-1));

        let err = client.search_nearby(&query).await.unwrap_err();
        assert!(matches!(
            err,
            PlacesError::InvalidInput { field: "max_price", .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_network() {
        let api = StubApi::default();
        let calls = api.nearby_calls.clone();
        let client = PlacesClient::new(Box::new(api), None, false);

        let err = client.search_nearby(&SearchQuery::new(1.0, 2.0)).await.unwrap_err();
        assert!(matches!(err, PlacesError::MissingApiKey));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_query_reaches_the_api_once() {
        let api = StubApi::default();
        let calls = api.nearby_calls.clone();
        let client = stub_client(api);

        let results = client
            .search_nearby(&SearchQuery::new(1.0, 2.0).with_keyword("cafe"))
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mock_mode_serves_fixtures_without_network() {
        let api = StubApi::default();
        let calls = api.nearby_calls.clone();
        let client = PlacesClient::new(Box::new(api), None, true);

        let results = client.search_nearby(&SearchQuery::new(42.55, 1.51)).await.unwrap();
        assert_eq!(results.len(), 6);
        assert_eq!(results[0].name.as_deref(), Some("The Grand Mock Resort"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn mock_geocode_returns_fixed_coordinate() {
        let client = PlacesClient::new(Box::new(StubApi::default()), None, true);
        let location = client.geocode("Eiffel Tower").await.unwrap().unwrap();
        assert_eq!(location, LatLng { lat: 40.785091, lng: -73.968285 });
    }

    #[tokio::test]
    async fn geocode_zero_results_is_none() {
        let client = stub_client(StubApi::default());
        assert!(client.geocode("nowhere at all").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreachable_destination_renders_element_status() {
        let api = StubApi::default();
        *api.distance_response.lock().unwrap() = Some(DistanceMatrixResponse {
            status: "OK".to_string(),
            rows: vec![DistanceRow {
                elements: vec![DistanceElement {
                    status: "NOT_FOUND".to_string(),
                    distance: None,
                    duration: None,
                }],
            }],
            error_message: None,
        });
        let client = stub_client(api);

        let text = client.travel_distance("A", "B", "driving").await.unwrap();
        assert_eq!(text, "Could not calculate distance: NOT_FOUND");
    }

    #[tokio::test]
    async fn distance_matrix_success_renders_distance_and_duration() {
        let api = StubApi::default();
        *api.distance_response.lock().unwrap() = Some(DistanceMatrixResponse {
            status: "OK".to_string(),
            rows: vec![DistanceRow {
                elements: vec![DistanceElement {
                    status: "OK".to_string(),
                    distance: Some(TextValue { text: "5.2 km".to_string() }),
                    duration: Some(TextValue { text: "15 mins".to_string() }),
                }],
            }],
            error_message: None,
        });
        let client = stub_client(api);

        let text = client.travel_distance("A", "B", "walking").await.unwrap();
        assert_eq!(text, "Distance: 5.2 km, Duration: 15 mins (Mode: walking)");
    }

    #[tokio::test]
    async fn distance_matrix_denied_is_a_provider_error() {
        let api = StubApi::default();
        *api.distance_response.lock().unwrap() = Some(DistanceMatrixResponse {
            status: "REQUEST_DENIED".to_string(),
            rows: Vec::new(),
            error_message: Some("The provided API key is invalid.".to_string()),
        });
        let client = stub_client(api);

        let err = client.travel_distance("A", "B", "driving").await.unwrap_err();
        assert!(err.to_string().contains("REQUEST_DENIED"));
    }
}
