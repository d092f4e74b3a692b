use axum::Router;

use crate::config::Config;

/// Serve a fake backend on an ephemeral port; returns its "/api" base URL.
pub(crate) async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/api")
}

pub(crate) fn test_config(base_url: &str) -> Config {
    Config {
        api_base_url: base_url.to_string(),
        frontend_origin: "http://localhost:3000".to_string(),
        request_timeout_secs: 5,
        connection_check_secs: 1,
        auto_refresh_secs: 30,
        access_token: Some("test-access".to_string()),
        refresh_token: Some("test-refresh".to_string()),
    }
}
