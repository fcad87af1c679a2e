//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use users_api::config::AppConfig;
use users_api::http::HttpServer;
use users_api::lifecycle::Shutdown;
use users_api::store::MemoryUserStore;
use users_sdk::UsersClient;

/// A running server backed by an in-memory store.
pub struct TestServer {
    pub addr: SocketAddr,
    pub store: MemoryUserStore,
    pub client: UsersClient,
    shutdown: Shutdown,
}

impl TestServer {
    /// Start a server on an ephemeral local port.
    pub async fn start() -> Self {
        let store = MemoryUserStore::new();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let shutdown = Shutdown::new();
        let server = HttpServer::new(AppConfig::default(), Arc::new(store.clone()));
        let server_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = server.run(listener, server_shutdown).await;
        });

        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .unwrap();
        let client = UsersClient::with_client(http, &format!("http://{addr}"));

        Self { addr, store, client, shutdown }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}
