//! Result shaping for nearby search: derived photo and map links, the
//! rating sort, and the result cap.

use std::cmp::Ordering;

use reqwest::Url;

use crate::places::{LatLng, PhotoRef, RawPlace};

/// Hard cap on shaped results per search.
pub const MAX_RESULTS: usize = 5;
/// Maximum pixel width requested for derived photo URLs.
pub const PHOTO_MAX_WIDTH: u32 = 400;

const PHOTO_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/place/photo";
const MAPS_SEARCH_ENDPOINT: &str = "https://www.google.com/maps/search/";

/// One place after shaping, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceRecord {
    pub name: String,
    pub address: String,
    pub rating: Option<f64>,
    pub rating_count: Option<u64>,
    pub price_level: Option<i64>,
    pub place_id: Option<String>,
    pub business_status: Option<String>,
    pub location: Option<LatLng>,
    pub photo_url: Option<String>,
    pub map_url: String,
}

/// Derive display fields for every record, sort by rating (descending,
/// missing as 0, ties keep provider order) and cap the result set.
/// Individual records never fail shaping; absent fields stay absent.
pub fn shape(raw: Vec<RawPlace>, photo_key: &str) -> Vec<PlaceRecord> {
    let mut records: Vec<PlaceRecord> = raw
        .into_iter()
        .map(|place| to_record(place, photo_key))
        .collect();
    records.sort_by(|a, b| {
        let (ra, rb) = (a.rating.unwrap_or(0.0), b.rating.unwrap_or(0.0));
        rb.partial_cmp(&ra).unwrap_or(Ordering::Equal)
    });
    records.truncate(MAX_RESULTS);
    records
}

fn to_record(place: RawPlace, photo_key: &str) -> PlaceRecord {
    let RawPlace {
        name,
        vicinity,
        formatted_address,
        rating,
        user_ratings_total,
        price_level,
        place_id,
        business_status,
        geometry,
        photos,
    } = place;

    let location = geometry.and_then(|g| g.location);
    let photo_url = best_photo(&photos).map(|photo| photo_url(photo, photo_key));
    let map_url = map_url(place_id.as_deref(), location.as_ref(), name.as_deref());

    PlaceRecord {
        name: name.unwrap_or_else(|| "Unknown".to_string()),
        address: vicinity
            .or(formatted_address)
            .unwrap_or_else(|| "No address".to_string()),
        rating,
        rating_count: user_ratings_total,
        price_level,
        place_id,
        business_status,
        location,
        photo_url,
        map_url,
    }
}

/// The highest-resolution photo reference, by pixel area.
fn best_photo(photos: &[PhotoRef]) -> Option<&PhotoRef> {
    photos
        .iter()
        .max_by_key(|photo| u64::from(photo.width) * u64::from(photo.height))
}

fn photo_url(photo: &PhotoRef, key: &str) -> String {
    Url::parse_with_params(
        PHOTO_ENDPOINT,
        &[
            ("maxwidth", PHOTO_MAX_WIDTH.to_string()),
            ("photo_reference", photo.photo_reference.clone()),
            ("key", key.to_string()),
        ],
    )
    .map(String::from)
    .unwrap_or_default()
}

/// Canonical map link for a place. A place identifier wins outright;
/// otherwise a coordinate search (with the name when known), then a bare
/// name search, then nothing.
pub fn map_url(place_id: Option<&str>, location: Option<&LatLng>, name: Option<&str>) -> String {
    if let Some(id) = place_id {
        return format!("https://www.google.com/maps/place/?q=place_id:{id}");
    }
    let query = match (location, name) {
        (Some(at), Some(n)) => format!("{n} {},{}", at.lat, at.lng),
        (Some(at), None) => format!("{},{}", at.lat, at.lng),
        (None, Some(n)) => n.to_string(),
        (None, None) => return String::new(),
    };
    Url::parse_with_params(MAPS_SEARCH_ENDPOINT, &[("api", "1".to_string()), ("query", query)])
        .map(String::from)
        .unwrap_or_default()
}
