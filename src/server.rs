//! MCP tool surface: argument schemas, the four tool handlers, and the
//! plain-text rendering of place results.

use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use serde::Deserialize;
use tracing::{error, info};

use crate::config::Config;
use crate::places::{PlacesClient, PlacesError, RankBy, SearchQuery};
use crate::shape::{shape, PlaceRecord, MAX_RESULTS};
use crate::weather::{self, WeatherService};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchNearbyArgs {
    #[schemars(description = "Latitude of the search center")]
    pub latitude: f64,
    #[schemars(description = "Longitude of the search center")]
    pub longitude: f64,
    #[serde(default = "default_radius")]
    #[schemars(description = "Search radius in meters (default 1000, ignored if rankby is \"distance\")")]
    pub radius: u32,
    #[serde(default = "default_keyword")]
    #[schemars(description = "Type of place to search for (default \"hotel\")")]
    pub keyword: String,
    #[serde(rename = "type")]
    #[schemars(description = "Optional specific place type (e.g. \"lodging\", \"restaurant\", \"cafe\")")]
    pub place_type: Option<String>,
    #[schemars(description = "Optional minimum price level (0-4, where 0=free, 4=very expensive)")]
    pub min_price: Option<i64>,
    #[schemars(description = "Optional maximum price level (0-4, where 0=free, 4=very expensive)")]
    pub max_price: Option<i64>,
    #[schemars(description = "Optional language code for results (e.g. \"es\", \"en\", \"fr\")")]
    pub language: Option<String>,
    #[schemars(description = "Optional ranking method: \"distance\" or \"prominence\" (if \"distance\", radius is ignored)")]
    pub rankby: Option<String>,
    #[schemars(description = "Optional exact name of the place to search for")]
    pub name: Option<String>,
}

fn default_radius() -> u32 {
    1000
}

fn default_keyword() -> String {
    "hotel".to_string()
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetCoordinatesArgs {
    #[schemars(description = "The address or place name to geocode (e.g. \"Eiffel Tower\")")]
    pub address: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetWeatherArgs {
    #[schemars(description = "Latitude of the location")]
    pub latitude: f64,
    #[schemars(description = "Longitude of the location")]
    pub longitude: f64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct TravelDistanceArgs {
    #[schemars(description = "Starting point (address, place name, or \"lat,lng\")")]
    pub origin: String,
    #[schemars(description = "End point (address, place name, or \"lat,lng\")")]
    pub destination: String,
    #[serde(default = "default_mode")]
    #[schemars(description = "Travel mode: \"driving\", \"walking\", \"bicycling\" or \"transit\"")]
    pub mode: String,
}

fn default_mode() -> String {
    "driving".to_string()
}

/// The location tool server. Cheap to clone; the provider clients and the
/// weather cache are shared across connections.
#[derive(Clone)]
pub struct LocationServer {
    places: Arc<PlacesClient>,
    weather: Arc<WeatherService>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl LocationServer {
    pub fn new(places: PlacesClient, weather: WeatherService) -> Self {
        Self {
            places: Arc::new(places),
            weather: Arc::new(weather),
            tool_router: Self::tool_router(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self::new(
            PlacesClient::from_config(config)?,
            WeatherService::from_config(config)?,
        ))
    }

    #[tool(
        description = "Search for nearby places (hotels, restaurants, etc.) using the Google Maps API. Returns up to 5 results, sorted by rating (descending)."
    )]
    async fn search_nearby(
        &self,
        Parameters(args): Parameters<SearchNearbyArgs>,
    ) -> Result<CallToolResult, McpError> {
        info!(
            latitude = args.latitude,
            longitude = args.longitude,
            radius = args.radius,
            keyword = %args.keyword,
            rankby = ?args.rankby,
            "search_nearby called"
        );
        let rank_by = match args.rankby.as_deref() {
            Some(value) => Some(value.parse::<RankBy>().map_err(places_tool_error)?),
            None => None,
        };
        let query = SearchQuery {
            latitude: args.latitude,
            longitude: args.longitude,
            radius: args.radius,
            keyword: args.keyword,
            place_type: args.place_type,
            min_price: args.min_price,
            max_price: args.max_price,
            language: args.language,
            rank_by,
            name: args.name,
        };
        let raw = self
            .places
            .search_nearby(&query)
            .await
            .map_err(places_tool_error)?;
        let shaped = shape(raw, self.places.photo_key());
        Ok(CallToolResult::success(vec![Content::text(format_places(
            &shaped, &query,
        ))]))
    }

    #[tool(
        description = "Convert an address or place name (e.g. \"Eiffel Tower\", \"New York City\") into latitude and longitude coordinates. Use this before searching for nearby places if you only have a name or address."
    )]
    async fn get_coordinates(
        &self,
        Parameters(args): Parameters<GetCoordinatesArgs>,
    ) -> Result<CallToolResult, McpError> {
        info!(address = %args.address, "get_coordinates called");
        let text = match self
            .places
            .geocode(&args.address)
            .await
            .map_err(places_tool_error)?
        {
            Some(location) => format!(
                "Coordinates for '{}': Latitude {}, Longitude {}",
                args.address, location.lat, location.lng
            ),
            None => format!("No coordinates found for address: '{}'", args.address),
        };
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(
        description = "Get the current weather and forecast for a specific location (latitude/longitude). Returns a readable string with temperature, conditions and a short outlook."
    )]
    async fn get_weather(
        &self,
        Parameters(args): Parameters<GetWeatherArgs>,
    ) -> Result<CallToolResult, McpError> {
        info!(latitude = args.latitude, longitude = args.longitude, "get_weather called");
        // Weather failures render as text instead of protocol faults.
        let text = match self.weather.get_weather(args.latitude, args.longitude).await {
            Ok(forecast) => weather::format_forecast(&forecast),
            Err(err) => {
                error!(error = %err, "get_weather failed");
                format!("Failed to get weather: {err}")
            }
        };
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(
        description = "Calculate the travel distance and time between two points (addresses or coordinates). Modes: \"driving\", \"walking\", \"bicycling\", \"transit\"."
    )]
    async fn calculate_travel_distance(
        &self,
        Parameters(args): Parameters<TravelDistanceArgs>,
    ) -> Result<CallToolResult, McpError> {
        info!(
            origin = %args.origin,
            destination = %args.destination,
            mode = %args.mode,
            "calculate_travel_distance called"
        );
        let text = self
            .places
            .travel_distance(&args.origin, &args.destination, &args.mode)
            .await
            .map_err(places_tool_error)?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[tool_handler]
impl ServerHandler for LocationServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "nearby".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Location tools backed by the Google Maps and Meteoblue APIs: nearby place \
                 search, geocoding, travel distance and weather."
                    .into(),
            ),
            ..Default::default()
        }
    }
}

fn places_tool_error(err: PlacesError) -> McpError {
    match err {
        PlacesError::InvalidInput { .. } => McpError::invalid_params(err.to_string(), None),
        _ => McpError::internal_error(err.to_string(), None),
    }
}

/// Render shaped places for the agent. An empty result set names the
/// search term and location instead of returning an empty string.
pub fn format_places(places: &[PlaceRecord], query: &SearchQuery) -> String {
    if places.is_empty() {
        let term = if !query.keyword.is_empty() {
            query.keyword.as_str()
        } else {
            query.place_type.as_deref().unwrap_or("places")
        };
        return format!(
            "No {term} found near ({}, {}).",
            query.latitude, query.longitude
        );
    }

    let mut lines = vec![format!(
        "Found {} places (showing top {} by rating):\n",
        places.len(),
        MAX_RESULTS
    )];
    for (idx, place) in places.iter().enumerate() {
        let mut details = match place.rating {
            Some(rating) => format!("Rating: {rating}"),
            None => "Rating: N/A".to_string(),
        };
        if let Some(count) = place.rating_count {
            details.push_str(&format!(" ({count} reviews)"));
        }
        if let Some(level) = place.price_level {
            details.push_str(&format!(" | Price: {}", price_label(level)));
        }
        if let Some(status) = &place.business_status {
            details.push_str(&format!(" | Status: {status}"));
        }
        lines.push(format!(
            "{}. {}\n   {}\n   Address: {}",
            idx + 1,
            place.name,
            details,
            place.address
        ));
        if let Some(photo) = &place.photo_url {
            lines.push(format!("   Photo: {photo}"));
        }
        if !place.map_url.is_empty() {
            lines.push(format!("   Map: {}", place.map_url));
        }
        if let Some(id) = &place.place_id {
            lines.push(format!("   Place ID: {id}"));
        }
        lines.push(String::new());
    }
    lines.join("\n").trim().to_string()
}

fn price_label(level: i64) -> &'static str {
    match level {
        0 => "Free",
        1 => "$",
        2 => "$$",
        3 => "$$$",
        4 => "$$$$",
        _ => "N/A",
    }
}
