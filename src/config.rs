use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    /// Our own origin, second entry of the OAuth postMessage allow-list.
    pub frontend_origin: String,
    /// Default per-request timeout, seconds.
    pub request_timeout_secs: u64,
    /// Shorter bound for the calendar connection probe, seconds.
    pub connection_check_secs: u64,
    /// Background list refresh interval, seconds.
    pub auto_refresh_secs: u64,
    /// Session tokens, if already issued (storage itself lives outside).
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_base_url = env::var("HMS_API_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8000/api".to_string());
        let frontend_origin = env::var("HMS_FRONTEND_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let request_timeout_secs = env::var("HMS_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(5);
        let connection_check_secs = env::var("HMS_CONNECTION_CHECK_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(3);
        let auto_refresh_secs = env::var("HMS_AUTO_REFRESH_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        let access_token = env::var("HMS_ACCESS_TOKEN").ok();
        let refresh_token = env::var("HMS_REFRESH_TOKEN").ok();

        Ok(Self {
            api_base_url,
            frontend_origin,
            request_timeout_secs,
            connection_check_secs,
            auto_refresh_secs,
            access_token,
            refresh_token,
        })
    }

    /// Origin part of the API base URL ("http://host:port"), first entry of
    /// the OAuth allow-list.
    pub fn backend_origin(&self) -> String {
        let url = &self.api_base_url;
        match url.find("://") {
            Some(scheme_end) => {
                let rest = &url[scheme_end + 3..];
                match rest.find('/') {
                    Some(path_start) => url[..scheme_end + 3 + path_start].to_string(),
                    None => url.clone(),
                }
            }
            None => url.clone(),
        }
    }
}
