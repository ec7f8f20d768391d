//! Tracking beacon application
//!
//! Serves a page whose script reports the embedding page's URL back to
//! `/hi`. Reports for configured domains are recorded in a [`HitStore`].

pub mod store;

use std::collections::HashSet;
use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, error};

use crate::http::handler::Handler;
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};

pub use store::{Hit, HitStore, Summary};

pub const TRACKING_PAGE: &str = "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><title>shadow</title></head>\
<body><script>navigator.sendBeacon('/hi', window.location.href)</script></body></html>";

pub struct Beacon {
    domains: HashSet<String>,
    store: HitStore,
}

impl Beacon {
    pub fn new<I, D>(domains: I, store: HitStore) -> Self
    where
        I: IntoIterator<Item = D>,
        D: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().to_ascii_lowercase())
                .collect(),
            store,
        }
    }

    pub fn store(&self) -> &HitStore {
        &self.store
    }

    /// Records the URL in the body if its host is a tracked domain.
    async fn record(&self, request: &Request) -> Response {
        let Some(hit) = self.parse_hit(request.body()) else {
            debug!(peer = %request.source, "Ignoring beacon for untracked URL");
            return Response::no_content();
        };

        match self.store.record(hit).await {
            Ok(()) => Response::no_content(),
            Err(e) => {
                error!(error = ?e, "Failed to record hit");
                Response::text(StatusCode::InternalServerError, "Failed to record hit.")
            }
        }
    }

    fn parse_hit(&self, body: &[u8]) -> Option<Hit> {
        let raw = std::str::from_utf8(body).ok()?.trim();
        let url = url::Url::parse(raw).ok()?;
        let domain = url.host_str()?;

        self.domains.contains(domain).then(|| Hit {
            domain: domain.to_string(),
            path: url.path().to_string(),
            time: unix_now(),
        })
    }

    async fn stats(&self) -> Response {
        let summary = self.store.summary(unix_now()).await;

        match serde_json::to_vec(&summary) {
            Ok(body) => Response::ok("application/json", body),
            Err(e) => {
                error!(error = %e, "Failed to encode stats");
                Response::text(StatusCode::InternalServerError, "Failed to encode stats.")
            }
        }
    }
}

impl Handler for Beacon {
    fn handle(&self, request: Request) -> impl Future<Output = Response> + Send {
        async move {
            match (request.declaration.path(), request.method()) {
                ("/", "GET") => Response::ok("text/html", TRACKING_PAGE),
                ("/hi", "POST") => self.record(&request).await,
                ("/stats", "GET") => self.stats().await,
                ("/" | "/hi" | "/stats", _) => {
                    Response::text(StatusCode::MethodNotAllowed, "Method Not Allowed")
                }
                _ => Response::not_found(),
            }
        }
    }
}

pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
