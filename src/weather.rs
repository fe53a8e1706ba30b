//! Meteoblue weather fetch with a per-coordinate TTL cache and the
//! plain-text forecast rendering used by the weather tool.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::http::{build_http_client, ResponseExt, DEFAULT_TIMEOUT};

/// How long a cached forecast stays fresh.
pub const CACHE_TTL: Duration = Duration::from_secs(3600);
/// Wind speed (km/h) above which the condition label is always "windy".
pub const WINDY_THRESHOLD_KMH: f64 = 30.0;
/// Forward hour offsets rendered in the forecast section.
pub const FORECAST_HOURS: [usize; 4] = [1, 3, 6, 12];

const BASE_URL: &str = "https://my.meteoblue.com/packages";
const FORECAST_PACKAGE: &str = "basic-1h_basic-day";

/// Errors from the weather client.
#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("Meteoblue API key is required. Set METEOBLUE_API_KEY or enable MOCK_WEATHER_API")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("weather provider error: {0}")]
    Provider(String),
}

/// Forecast payload in the provider's `basic-1h_basic-day` package shape.
/// Every field defaults so partial payloads never fail a call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub data_day: DataDay,
    #[serde(default)]
    pub data_1h: DataHourly,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataDay {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_max: Vec<f64>,
    #[serde(default)]
    pub temperature_min: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataHourly {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature: Vec<f64>,
    #[serde(default)]
    pub windspeed: Vec<f64>,
    #[serde(default)]
    pub pictocode: Vec<i64>,
    #[serde(default)]
    pub precipitation_probability: Vec<f64>,
}

/// One cached forecast for a coordinate key.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Forecast,
    pub fetched_at: SystemTime,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: SystemTime) -> bool {
        match now.duration_since(self.fetched_at) {
            Ok(age) => age < CACHE_TTL,
            // Clock went backwards; the entry cannot be older than the TTL.
            Err(_) => true,
        }
    }
}

/// Exact string key. Two requests differing only in float value share an
/// entry; no geographic rounding is applied.
fn cache_key(latitude: f64, longitude: f64) -> String {
    format!("{latitude},{longitude}")
}

/// Transport seam for the forecast provider.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<Forecast, WeatherError>;
}

#[derive(Debug, Serialize)]
struct ForecastParams<'a> {
    apikey: &'a str,
    lat: f64,
    lon: f64,
    asl: i32,
    format: &'a str,
}

/// Live implementation against the Meteoblue packages API.
pub struct MeteoblueApi {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl MeteoblueApi {
    pub fn new(api_key: Option<String>) -> Result<Self, WeatherError> {
        Ok(Self {
            http: build_http_client(DEFAULT_TIMEOUT)?,
            base_url: BASE_URL.to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl ForecastSource for MeteoblueApi {
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<Forecast, WeatherError> {
        let apikey = self.api_key.as_deref().ok_or(WeatherError::MissingApiKey)?;
        let url = format!("{}/{}", self.base_url, FORECAST_PACKAGE);
        debug!(%url, latitude, longitude, "fetching forecast");
        let response = self
            .http
            .get(&url)
            .query(&ForecastParams {
                apikey,
                lat: latitude,
                lon: longitude,
                asl: 0,
                format: "json",
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text_logged().await.unwrap_or_default();
            return Err(WeatherError::Provider(format!("HTTP {status}: {body}")));
        }
        response.json_logged().await
    }
}

/// Weather lookups with a per-coordinate cache and stale fallback.
pub struct WeatherService {
    source: Box<dyn ForecastSource>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    mock: bool,
}

impl WeatherService {
    pub fn new(source: Box<dyn ForecastSource>, mock: bool) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
            mock,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, WeatherError> {
        Ok(Self::new(
            Box::new(MeteoblueApi::new(config.meteoblue_api_key.clone())?),
            config.mock_weather_api,
        ))
    }

    /// Current weather and forecast for a coordinate. A fresh cache entry
    /// short-circuits the network; a failed fetch falls back to any cached
    /// entry for the key, even a stale one.
    pub async fn get_weather(&self, latitude: f64, longitude: f64) -> Result<Forecast, WeatherError> {
        self.get_weather_at(latitude, longitude, SystemTime::now()).await
    }

    async fn get_weather_at(
        &self,
        latitude: f64,
        longitude: f64,
        now: SystemTime,
    ) -> Result<Forecast, WeatherError> {
        if self.mock {
            debug!("MOCK_WEATHER_API enabled, serving forecast fixture");
            return Ok(mock_forecast());
        }
        let key = cache_key(latitude, longitude);
        if let Some(entry) = self.lookup(&key) {
            if entry.is_fresh(now) {
                debug!(%key, "serving cached forecast");
                return Ok(entry.payload);
            }
        }
        match self.source.fetch(latitude, longitude).await {
            Ok(payload) => {
                self.store(&key, payload.clone(), now);
                Ok(payload)
            }
            Err(err) => {
                if let Some(entry) = self.lookup(&key) {
                    warn!(%key, error = %err, "forecast fetch failed, serving stale cache");
                    return Ok(entry.payload);
                }
                Err(err)
            }
        }
    }

    fn lookup(&self, key: &str) -> Option<CacheEntry> {
        self.cache.lock().ok()?.get(key).cloned()
    }

    fn store(&self, key: &str, payload: Forecast, now: SystemTime) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key.to_string(), CacheEntry { payload, fetched_at: now });
        }
    }
}

/// Display label for an hour of weather. High wind wins outright;
/// otherwise the pictocode is bucketed.
pub fn condition_label(pictocode: i64, windspeed: f64) -> &'static str {
    if windspeed > WINDY_THRESHOLD_KMH {
        return "windy";
    }
    match pictocode {
        code if code <= 3 => "sunny",
        code if code <= 8 => "mixed",
        _ => "rain",
    }
}

/// Render a forecast as the plain text returned to the agent. Hour offsets
/// past the end of the data render as "not available" rather than failing.
pub fn format_forecast(forecast: &Forecast) -> String {
    let hourly = &forecast.data_1h;
    let daily = &forecast.data_day;
    let mut lines = Vec::new();

    let name = if forecast.metadata.name.is_empty() {
        "Unknown"
    } else {
        forecast.metadata.name.as_str()
    };
    lines.push(format!("Location: {name}"));

    match (daily.temperature_max.first(), daily.temperature_min.first()) {
        (Some(max), Some(min)) => lines.push(format!("Today: max {max}°C / min {min}°C")),
        _ => lines.push("Today: N/A".to_string()),
    }

    match hourly.temperature.first() {
        Some(temperature) => {
            let label = condition_label(
                hourly.pictocode.first().copied().unwrap_or(0),
                hourly.windspeed.first().copied().unwrap_or(0.0),
            );
            lines.push(format!("Current Temp: {temperature}°C ({label})"));
        }
        None => lines.push("Current Temp: N/A".to_string()),
    }

    lines.push("Forecast:".to_string());
    for offset in FORECAST_HOURS {
        match hourly.temperature.get(offset) {
            Some(temperature) => {
                let label = condition_label(
                    hourly.pictocode.get(offset).copied().unwrap_or(0),
                    hourly.windspeed.get(offset).copied().unwrap_or(0.0),
                );
                lines.push(format!("+{offset}h: {temperature}°C ({label})"));
            }
            None => lines.push(format!("+{offset}h: not available")),
        }
    }

    lines.join("\n")
}

/// Deterministic multi-hour fixture served when `MOCK_WEATHER_API` is
/// enabled. Eight hourly entries, so the +12h offset exercises the
/// bounds check.
fn mock_forecast() -> Forecast {
    Forecast {
        metadata: Metadata {
            name: "Mock City".to_string(),
        },
        data_day: DataDay {
            time: vec!["2023-10-27".to_string()],
            temperature_max: vec![24.6],
            temperature_min: vec![14.2],
        },
        data_1h: DataHourly {
            time: (12..20).map(|h| format!("2023-10-27 {h}:00")).collect(),
            temperature: vec![18.4, 19.1, 20.3, 21.7, 22.5, 23.1, 23.9, 24.2],
            windspeed: vec![12.0, 14.5, 16.0, 18.2, 20.1, 22.4, 35.0, 28.3],
            pictocode: vec![2, 2, 3, 5, 6, 7, 9, 4],
            precipitation_probability: vec![0.0, 0.0, 5.0, 10.0, 20.0, 30.0, 60.0, 40.0],
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[derive(Clone, Default)]
    struct StubSource {
        calls: Arc<AtomicUsize>,
        fail: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ForecastSource for StubSource {
        async fn fetch(&self, _latitude: f64, _longitude: f64) -> Result<Forecast, WeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(WeatherError::Provider("connection reset".to_string()));
            }
            Ok(test_forecast())
        }
    }

    fn test_forecast() -> Forecast {
        Forecast {
            metadata: Metadata {
                name: "Stub Town".to_string(),
            },
            data_day: DataDay {
                temperature_max: vec![20.0],
                temperature_min: vec![10.0],
                ..Default::default()
            },
            data_1h: DataHourly {
                temperature: vec![15.0, 15.5],
                windspeed: vec![5.0, 6.0],
                pictocode: vec![1, 2],
                ..Default::default()
            },
        }
    }

    fn service(source: StubSource) -> WeatherService {
        WeatherService::new(Box::new(source), false)
    }

    #[tokio::test]
    async fn second_call_within_ttl_skips_the_fetch() {
        let source = StubSource::default();
        let calls = source.calls.clone();
        let service = service(source);
        let now = SystemTime::now();

        let first = service.get_weather_at(42.0, 1.0, now).await.unwrap();
        let second = service.get_weather_at(42.0, 1.0, now + Duration::from_secs(60)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn expired_entry_triggers_a_new_fetch() {
        let source = StubSource::default();
        let calls = source.calls.clone();
        let service = service(source);
        let now = SystemTime::now();

        service.get_weather_at(42.0, 1.0, now).await.unwrap();
        service
            .get_weather_at(42.0, 1.0, now + CACHE_TTL + Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn distinct_coordinates_use_distinct_entries() {
        let source = StubSource::default();
        let calls = source.calls.clone();
        let service = service(source);
        let now = SystemTime::now();

        service.get_weather_at(42.0, 1.0, now).await.unwrap();
        service.get_weather_at(42.0, 2.0, now).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refetch_falls_back_to_the_stale_entry() {
        let source = StubSource::default();
        let calls = source.calls.clone();
        let fail = source.fail.clone();
        let service = service(source);
        let now = SystemTime::now();

        let first = service.get_weather_at(42.0, 1.0, now).await.unwrap();
        fail.store(true, Ordering::SeqCst);
        let fallback = service
            .get_weather_at(42.0, 1.0, now + CACHE_TTL + Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(first, fallback);
    }

    #[tokio::test]
    async fn failure_with_no_cache_propagates() {
        let source = StubSource::default();
        source.fail.store(true, Ordering::SeqCst);
        let service = service(source);

        let err = service.get_weather(42.0, 1.0).await.unwrap_err();
        assert!(matches!(err, WeatherError::Provider(_)));
    }

    #[tokio::test]
    async fn mock_mode_bypasses_cache_and_network() {
        let source = StubSource::default();
        source.fail.store(true, Ordering::SeqCst);
        let calls = source.calls.clone();
        let service = WeatherService::new(Box::new(source), true);

        let forecast = service.get_weather(0.0, 0.0).await.unwrap();
        assert_eq!(forecast.metadata.name, "Mock City");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn entry_freshness_follows_the_ttl() {
        let now = SystemTime::now();
        let entry = CacheEntry {
            payload: Forecast::default(),
            fetched_at: now,
        };
        assert!(entry.is_fresh(now + CACHE_TTL - Duration::from_secs(1)));
        assert!(!entry.is_fresh(now + CACHE_TTL));
    }

    #[test]
    fn high_wind_always_wins_the_label() {
        assert_eq!(condition_label(1, 31.0), "windy");
        assert_eq!(condition_label(9, 30.1), "windy");
        assert_eq!(condition_label(1, 30.0), "sunny");
    }

    #[test]
    fn pictocode_buckets_map_to_labels() {
        assert_eq!(condition_label(0, 0.0), "sunny");
        assert_eq!(condition_label(3, 0.0), "sunny");
        assert_eq!(condition_label(4, 0.0), "mixed");
        assert_eq!(condition_label(8, 0.0), "mixed");
        assert_eq!(condition_label(9, 0.0), "rain");
    }

    #[test]
    fn format_renders_location_current_and_offsets() {
        let text = format_forecast(&mock_forecast());
        assert!(text.contains("Location: Mock City"), "{text}");
        assert!(text.contains("Today: max 24.6°C / min 14.2°C"), "{text}");
        assert!(text.contains("Current Temp: 18.4°C (sunny)"), "{text}");
        assert!(text.contains("+1h: 19.1°C (sunny)"), "{text}");
        assert!(text.contains("+6h: 23.9°C (windy)"), "{text}");
        assert!(text.contains("+12h: not available"), "{text}");
    }

    #[test]
    fn empty_payload_renders_placeholders_not_errors() {
        let text = format_forecast(&Forecast::default());
        assert!(text.contains("Location: Unknown"), "{text}");
        assert!(text.contains("Today: N/A"), "{text}");
        assert!(text.contains("Current Temp: N/A"), "{text}");
        assert!(text.contains("+1h: not available"), "{text}");
    }
}
