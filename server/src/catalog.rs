//! Upstream concert listings.

use futures::future::{self, BoxFuture, FutureExt};
use gigpal_core::Event;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

const DISCOVERY_BASE: &str = "https://app.ticketmaster.com/discovery/v2/";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("catalog answered with status {0}")]
    Status(StatusCode),
    #[error("invalid catalog url: {0}")]
    Url(#[from] url::ParseError),
}

/// Source of events users can join pools for.
pub trait EventCatalog: Send + Sync {
    /// Fetch a single event by its catalog id. `Ok(None)` when it does not exist.
    fn lookup<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Event>, CatalogError>>;

    /// Music events matching `query`, or a default listing when it is empty.
    fn search<'a>(&'a self, query: Option<&'a str>) -> BoxFuture<'a, Result<Vec<Event>, CatalogError>>;
}

/// Ticketmaster Discovery API v2.
pub struct TicketmasterCatalog {
    client: Client,
    api_key: String,
    dma_id: Option<String>,
    base: Url,
}

impl TicketmasterCatalog {
    pub fn new(api_key: String, dma_id: Option<String>) -> Result<Self, CatalogError> {
        Self::with_base(api_key, dma_id, DISCOVERY_BASE)
    }

    /// Point at another Discovery-compatible host.
    pub fn with_base(api_key: String, dma_id: Option<String>, base: &str) -> Result<Self, CatalogError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()?,
            api_key,
            dma_id,
            base: Url::parse(base)?,
        })
    }

    fn search_url(&self, query: Option<&str>) -> Result<Url, CatalogError> {
        let mut url = self.base.join("events.json")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("classificationName", "music");
            if let Some(dma) = &self.dma_id {
                pairs.append_pair("dmaId", dma);
            }
            if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
                pairs.append_pair("keyword", q);
            }
            pairs.append_pair("apikey", &self.api_key);
        }
        Ok(url)
    }

    fn lookup_url(&self, id: &str) -> Result<Url, CatalogError> {
        let mut url = self.base.join("events/")?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push(&format!("{id}.json"));
        url.query_pairs_mut().append_pair("apikey", &self.api_key);
        Ok(url)
    }

    async fn fetch_one(&self, id: &str) -> Result<Option<Event>, CatalogError> {
        let resp = self.client.get(self.lookup_url(id)?).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => {
                warn!(event = id, "event not in catalog");
                Ok(None)
            }
            s if s.is_success() => Ok(Some(resp.json::<TmEvent>().await?.into())),
            s => Err(CatalogError::Status(s)),
        }
    }

    async fn fetch_many(&self, query: Option<&str>) -> Result<Vec<Event>, CatalogError> {
        let resp = self.client.get(self.search_url(query)?).send().await?;
        if !resp.status().is_success() {
            return Err(CatalogError::Status(resp.status()));
        }
        let page: TmPage = resp.json().await?;
        let events: Vec<Event> = page
            .embedded
            .map(|e| e.events)
            .unwrap_or_default()
            .into_iter()
            .map(Event::from)
            .collect();
        debug!(count = events.len(), "catalog search");
        Ok(events)
    }
}

impl EventCatalog for TicketmasterCatalog {
    fn lookup<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Event>, CatalogError>> {
        self.fetch_one(id).boxed()
    }

    fn search<'a>(&'a self, query: Option<&'a str>) -> BoxFuture<'a, Result<Vec<Event>, CatalogError>> {
        self.fetch_many(query).boxed()
    }
}

/// Fixed in-process listing. Used when no API key is configured, and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    events: Vec<Event>,
}

impl MemoryCatalog {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }
}

impl EventCatalog for MemoryCatalog {
    fn lookup<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Event>, CatalogError>> {
        let found: Option<Event> = self.events.iter().find(|e| e.id == id).cloned();
        future::ready(Ok(found)).boxed()
    }

    fn search<'a>(&'a self, query: Option<&'a str>) -> BoxFuture<'a, Result<Vec<Event>, CatalogError>> {
        let needle = query.map(|q| q.trim().to_lowercase()).unwrap_or_default();
        let hits: Vec<Event> = self
            .events
            .iter()
            .filter(|e| {
                needle.is_empty()
                    || [Some(&e.name), e.venue.as_ref(), e.location.as_ref()]
                        .into_iter()
                        .flatten()
                        .any(|field| field.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        future::ready(Ok(hits)).boxed()
    }
}

#[derive(Deserialize)]
struct TmPage {
    #[serde(rename = "_embedded")]
    embedded: Option<TmEvents>,
}

#[derive(Deserialize)]
struct TmEvents {
    #[serde(default)]
    events: Vec<TmEvent>,
}

#[derive(Deserialize)]
struct TmEvent {
    id: String,
    name: String,
    url: Option<String>,
    dates: Option<TmDates>,
    #[serde(default)]
    images: Vec<TmImage>,
    #[serde(rename = "_embedded")]
    embedded: Option<TmVenues>,
}

#[derive(Deserialize)]
struct TmDates {
    start: Option<TmStart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TmStart {
    date_time: Option<String>,
    local_date: Option<String>,
}

#[derive(Deserialize)]
struct TmImage {
    url: String,
}

#[derive(Deserialize)]
struct TmVenues {
    #[serde(default)]
    venues: Vec<TmVenue>,
}

#[derive(Deserialize)]
struct TmVenue {
    name: Option<String>,
    city: Option<TmName>,
}

#[derive(Deserialize)]
struct TmName {
    name: String,
}

impl From<TmEvent> for Event {
    fn from(tm: TmEvent) -> Self {
        let start = tm.dates.and_then(|d| d.start);
        let venue = tm.embedded.and_then(|e| e.venues.into_iter().next());
        Event {
            id: tm.id,
            name: tm.name,
            venue: venue.as_ref().and_then(|v| v.name.clone()),
            starts_at: start.and_then(|s| s.date_time.or(s.local_date)),
            location: venue.and_then(|v| v.city).map(|c| c.name),
            ticket_url: tm.url,
            image_url: tm.images.into_iter().next().map(|i| i.url),
        }
    }
}
