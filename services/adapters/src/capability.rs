//! Capability declaration each adapter publishes before it is wired in.

use serde::{Deserialize, Serialize};
use types::FeedCategory;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterCapabilities {
    pub supports_websocket: bool,
    pub supports_rest: bool,
    pub supports_volume: bool,
    pub supports_order_book: bool,
    pub supported_categories: Vec<FeedCategory>,
}
