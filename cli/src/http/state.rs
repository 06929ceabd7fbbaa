use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use action_hub_core::api::{Dispatcher, HubConfig, RouteBuilder};
use chrono::{DateTime, Local};

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<HubConfig>,
    pub dispatcher: Arc<Dispatcher>,
    pub routes: Arc<HubRoutes>,
    pub stats: Arc<RwLock<ServerStats>>,
}

impl AppState {
    pub fn new(config: HubConfig, dispatcher: Dispatcher) -> Self {
        let routes = HubRoutes::new(&config.server.base_url);
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
            routes: Arc::new(routes),
            stats: Arc::new(RwLock::new(ServerStats::new())),
        }
    }

    pub fn record_request(&self, endpoint: &str) {
        if let Ok(mut stats) = self.stats.write() {
            stats.increment_request(endpoint);
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut stats) = self.stats.write() {
            stats.increment_error();
        }
    }
}

/// Absolute URLs advertised in connector descriptors.
#[derive(Debug, Clone)]
pub struct HubRoutes {
    base_url: String,
}

impl HubRoutes {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl RouteBuilder for HubRoutes {
    fn action_url(&self, name: &str) -> String {
        format!("{}/actions/{}/execute", self.base_url, encode_segment(name))
    }

    fn form_url(&self, name: &str) -> String {
        format!("{}/actions/{}/form", self.base_url, encode_segment(name))
    }
}

fn encode_segment(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for b in name.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

pub struct ServerStats {
    pub requests_total: u64,
    pub requests_by_endpoint: HashMap<String, u64>,
    pub errors_total: u64,
    pub start_time: DateTime<Local>,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            requests_total: 0,
            requests_by_endpoint: HashMap::new(),
            errors_total: 0,
            start_time: Local::now(),
        }
    }

    pub fn increment_request(&mut self, endpoint: &str) {
        self.requests_total += 1;
        *self
            .requests_by_endpoint
            .entry(endpoint.to_string())
            .or_insert(0) += 1;
    }

    pub fn increment_error(&mut self) {
        self.errors_total += 1;
    }

    pub fn uptime_seconds(&self) -> f64 {
        let now = Local::now();
        (now - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_are_absolute_and_escaped() {
        let routes = HubRoutes::new("https://hub.example.com/");
        assert_eq!(
            routes.action_url("debug"),
            "https://hub.example.com/actions/debug/execute"
        );
        assert_eq!(
            routes.form_url("a b"),
            "https://hub.example.com/actions/a%20b/form"
        );
    }

    #[test]
    fn stats_count_requests_per_endpoint() {
        let mut stats = ServerStats::new();
        stats.increment_request("execute");
        stats.increment_request("execute");
        stats.increment_request("form");
        stats.increment_error();

        assert_eq!(stats.requests_total, 3);
        assert_eq!(stats.requests_by_endpoint["execute"], 2);
        assert_eq!(stats.errors_total, 1);
        assert!(stats.uptime_seconds() < 1.0);
    }
}
