//! Corrective raster tile proxy.
//!
//! Serves `GET /proxy/{percent-encoded tile URL}`: fetches the original tile,
//! looks up correction geometry for its coordinate in a PMTiles archive and
//! strokes it onto the image before returning it.

pub mod config;
pub mod corrector;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod state;

pub use config::ProxyConfig;
pub use corrector::Corrector;
pub use server::{proxy_url_for, router, ServerError, TileInterceptor};
pub use state::AppState;
