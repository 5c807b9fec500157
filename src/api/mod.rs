pub mod access_points;
pub mod auth;
pub mod dashboard;
pub mod devices;
pub mod users;
pub mod ws_handler;

/// GET /api/health
pub async fn health() -> &'static str {
    "WIFI Admin Portal API is running"
}

/// Body of the bulk device endpoints
#[derive(Debug, serde::Deserialize)]
pub struct IdList {
    #[serde(default)]
    pub ids: Vec<i64>,
}
