//! How the warmer obtains fresh responses for a route.

use async_trait::async_trait;
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

use crate::error::Result;
use crate::warmer::WarmupRoute;

/// Produces the response that should be cached for a route.
#[async_trait]
pub trait RouteFetcher: Send + Sync {
    async fn fetch(&self, route: &WarmupRoute) -> Result<Response>;
}

/// Fetches routes by driving an in-process axum [`Router`].
#[derive(Clone)]
pub struct RouterFetcher {
    router: Router,
}

impl RouterFetcher {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

#[async_trait]
impl RouteFetcher for RouterFetcher {
    async fn fetch(&self, route: &WarmupRoute) -> Result<Response> {
        let request = route.to_request()?;
        match self.router.clone().oneshot(request).await {
            Ok(response) => Ok(response),
            Err(never) => match never {},
        }
    }
}
