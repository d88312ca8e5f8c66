#![allow(dead_code)]

use std::{
    net::{SocketAddr, TcpListener},
    sync::Arc,
};

use gigpal_core::Event;
use gigpal_server::{
    api::{build_router, AppState},
    catalog::MemoryCatalog,
    config::{CatalogConfig, Config},
};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const PASSWORD: &str = "correct horse";

pub fn catalog_event(id: &str, name: &str, city: &str) -> Event {
    Event {
        id: id.into(),
        name: name.into(),
        venue: Some("Main Hall".into()),
        starts_at: Some("2026-12-01T20:00:00Z".into()),
        location: Some(city.into()),
        ticket_url: Some(format!("https://tickets.example/{id}")),
        image_url: None,
    }
}

pub fn test_config(bind: String, data_dir: &std::path::Path) -> Config {
    Config {
        bind,
        data_dir: data_dir.to_path_buf(),
        logging_enabled: false,
        jwt_secret: None,
        catalog: CatalogConfig::default(),
        cors_origins: Vec::new(),
    }
}

pub async fn test_state(data_dir: &std::path::Path) -> AppState {
    let catalog = MemoryCatalog::new(vec![
        catalog_event("E100", "Boygenius", "Los Angeles"),
        catalog_event("E200", "Big Thief", "Chicago"),
    ]);
    AppState::with_catalog(
        test_config("127.0.0.1:0".into(), data_dir),
        Arc::new(catalog),
    )
    .await
    .unwrap()
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub server: JoinHandle<()>,
    pub client: reqwest::Client,
    _tmp: tempfile::TempDir,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        listener.set_nonblocking(true).unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path()).await;
        let app = build_router(state);
        let server = tokio::spawn(async move {
            axum::Server::from_tcp(listener)
                .unwrap()
                .serve(app.into_make_service())
                .await
                .unwrap();
        });
        Self {
            addr,
            server,
            client: reqwest::Client::new(),
            _tmp: tmp,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn signup(&self, name: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/signup"))
            .json(&json!({
                "email": format!("{name}@example.com"),
                "password": PASSWORD,
                "userName": name,
                "dateOfBirth": "1996-03-09"
            }))
            .send()
            .await
            .unwrap()
    }

    pub async fn login(&self, name: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/login"))
            .json(&json!({"email": format!("{name}@example.com"), "password": password}))
            .send()
            .await
            .unwrap()
    }

    /// Sign up and log in, returning the user id and bearer token.
    pub async fn user(&self, name: &str) -> (Uuid, String) {
        assert_eq!(self.signup(name).await.status(), 201);
        let v: Value = self.login(name, PASSWORD).await.json().await.unwrap();
        let id = v["userId"].as_str().unwrap().parse().unwrap();
        (id, v["token"].as_str().unwrap().to_string())
    }

    pub async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    pub async fn post(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn join(&self, token: &str, event_id: &str) -> reqwest::Response {
        self.post(token, "/api/matchmake", json!({ "eventId": event_id }))
            .await
    }

    pub async fn swipe(&self, token: &str, event_id: &str, target: Uuid, direction: &str) -> reqwest::Response {
        self.post(
            token,
            "/api/matchmaking/swipe",
            json!({"eventId": event_id, "matchUserId": target, "direction": direction}),
        )
        .await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.abort();
    }
}
