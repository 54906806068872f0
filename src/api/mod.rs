pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

pub use routes::create_router;

use crate::aggregate::AggregationSettings;
use crate::auth::IdentityProvider;
use crate::store::SummaryStore;
use std::sync::Arc;

/// Shared handles for every request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SummaryStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub settings: Arc<AggregationSettings>,
    pub admin_role: String,
}
