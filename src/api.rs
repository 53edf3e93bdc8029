//! Synchronous client for the **CNES/SUS public-health REST API (v1)**.
//!
//! Wraps the establishment (`/api/v1/Estabelecimento*`) and hospital-bed
//! (`/api/v1/Leitos*`) endpoints and returns typed `models::*` rows.
//! Pagination loops are handled here, with page caps and cooperative
//! cancellation between requests.
//!
//! ### Notes
//! - Query parameter names are case-sensitive as required upstream
//!   (`pageNumber` on establishments, `PageNumber` on beds, and so on).
//! - The `/Leitos` listing sometimes double-encodes its JSON page as a
//!   string; the client re-parses and falls back to an empty page when the
//!   body is unusable.
//! - Network timeouts use a sane default (30s) and can be adjusted by
//!   editing the client builder.
//!
//! Typical usage:
//! ```no_run
//! # use cnes_rs::{Client, BedsQuery};
//! let client = Client::default();
//! let indicadores = client.bed_indicators(&BedsQuery::for_year(2023))?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::cache::{CachedPage, PageCache, PageKey};
use crate::models::{
    BedIndicators, BedItem, BedsByRegion, BedsByState, BedsQuery, BoundingBox, EstablishmentCount,
    EstablishmentInfo, EstablishmentSummary, FeatureCollection, Paginated, UfCount,
};
use anyhow::{Context, Result, bail};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV: &str = "CNES_API_BASE_URL";

const DEFAULT_BASE_URL: &str = "https://apidadosabertos.saude.gov.br";

// Allow -, _, . unescaped in query values (common in UF siglas and bed types)
const SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Cooperative cancellation flag shared between a caller and an in-progress
/// multi-page fetch. The loops consult it between requests; a request
/// already on the wire still completes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    pub base_url: String,
    http: HttpClient,
}

impl Default for Client {
    fn default() -> Self {
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }
}

impl Client {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30)) // total request timeout
            .connect_timeout(Duration::from_secs(10)) // connect timeout
            .redirect(Policy::limited(5)) // cap redirects
            .user_agent(concat!("cnes_rs/", env!("CARGO_PKG_VERSION"))) // set user agent
            .build()
            .expect("reqwest client build");
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    fn build_url(&self, path: &str, pairs: &[(&str, String)]) -> String {
        let mut url = format!("{}{}", self.base_url, path);
        let mut sep = '?';
        for (key, value) in pairs {
            url.push(sep);
            url.push_str(key);
            url.push('=');
            url.push_str(&percent_encoding::utf8_percent_encode(value.trim(), SAFE).to_string());
            sep = '&';
        }
        url
    }

    /// GET with a small retry for transient failures (5xx / network errors).
    fn get_text(&self, url: &str) -> Result<String> {
        let mut last_err: Option<anyhow::Error> = None;
        for backoff_ms in [100u64, 300, 700] {
            match self.http.get(url).send() {
                Ok(r) if r.status().is_success() => {
                    return r.text().context("read response body");
                }
                Ok(r) if r.status().is_server_error() => {
                    log::warn!("HTTP {} from {}, retrying", r.status(), url);
                }
                Ok(r) => bail!("request failed with HTTP {}", r.status()),
                Err(e) => last_err = Some(e.into()),
            }
            std::thread::sleep(Duration::from_millis(backoff_ms));
        }
        bail!("network error: {:?}", last_err);
    }

    fn get_json(&self, url: &str) -> Result<Value> {
        log::debug!("GET {}", url);
        let body = self.get_text(url)?;
        serde_json::from_str(&body).context("decode json")
    }

    /// One page of the establishment summary listing
    /// (`GET /api/v1/Estabelecimento`).
    pub fn establishments_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Paginated<EstablishmentSummary>> {
        let url = self.build_url(
            "/api/v1/Estabelecimento",
            &[
                ("pageNumber", page.to_string()),
                ("pageSize", page_size.to_string()),
            ],
        );
        let v = self.get_json(&url).with_context(|| format!("GET {}", url))?;
        serde_json::from_value(v).context("parse establishment page")
    }

    /// National establishment count, read from the listing's `totalCount`.
    pub fn establishments_total(&self) -> Result<u64> {
        Ok(self.establishments_page(1, 1)?.total_count)
    }

    /// Per-state establishment counts (`GET /api/v1/Estabelecimento/uf`),
    /// enriched with the static UF table. Counts for UF codes outside the
    /// table are logged and skipped.
    pub fn establishment_counts_by_uf(&self) -> Result<Vec<EstablishmentCount>> {
        let url = self.build_url("/api/v1/Estabelecimento/uf", &[]);
        let v = self.get_json(&url).with_context(|| format!("GET {}", url))?;
        let raw: Vec<UfCount> = serde_json::from_value(v).context("parse uf counts")?;

        let mut out = Vec::with_capacity(raw.len());
        for row in &raw {
            match EstablishmentCount::from_uf_count(row) {
                Some(enriched) => out.push(enriched),
                None => log::warn!("unknown UF code {} in /Estabelecimento/uf", row.cod_uf),
            }
        }
        Ok(out)
    }

    /// One page of detailed establishment records for a UF
    /// (`GET /api/v1/Estabelecimento/info`). Items are additionally filtered
    /// by the UF numeric code; the endpoint has been seen returning
    /// neighboring states on the last page.
    pub fn establishment_info_page(
        &self,
        uf_sigla: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Paginated<EstablishmentInfo>> {
        let Some(uf) = crate::regions::uf_from_sigla(uf_sigla) else {
            bail!("unknown UF sigla: {}", uf_sigla);
        };
        let url = self.build_url(
            "/api/v1/Estabelecimento/info",
            &[
                ("Uf", uf_sigla.to_ascii_lowercase()),
                ("pageNumber", page.to_string()),
                ("pageSize", page_size.to_string()),
            ],
        );
        let v = self.get_json(&url).with_context(|| format!("GET {}", url))?;
        let mut parsed: Paginated<EstablishmentInfo> =
            serde_json::from_value(v).context("parse establishment info page")?;
        parsed
            .items
            .retain(|item| item.localizacao.cod_uf == Some(uf.codigo));
        Ok(parsed)
    }

    /// One cached page of detailed establishment records. Hits are served
    /// from the cache; misses fetch, filter, and populate it.
    pub fn establishment_info_page_cached(
        &self,
        cache: &mut PageCache,
        uf_sigla: &str,
        page: u32,
        page_size: u32,
    ) -> Result<CachedPage> {
        let key = PageKey::new(uf_sigla, page, page_size);
        if let Some(hit) = cache.get(&key) {
            return Ok(hit.clone());
        }
        let resp = self.establishment_info_page(uf_sigla, page, page_size)?;
        let result = CachedPage {
            items: resp.items,
            has_next_page: page < resp.total_pages.max(1),
        };
        cache.insert(key, result.clone());
        Ok(result)
    }

    /// Detailed establishment records for a UF, up to `limit`, following
    /// pagination. The cancel token is consulted between pages.
    pub fn establishment_info_all(
        &self,
        uf_sigla: &str,
        limit: usize,
        cancel: &CancelToken,
    ) -> Result<Vec<EstablishmentInfo>> {
        let page_size = limit.max(1).min(30) as u32;
        let mut items: Vec<EstablishmentInfo> = Vec::new();
        let mut page = 1u32;
        let mut total_pages = 1u32;

        while items.len() < limit && page <= total_pages {
            if cancel.is_cancelled() {
                bail!("fetch cancelled");
            }
            let resp = self.establishment_info_page(uf_sigla, page, page_size)?;
            items.extend(resp.items);
            total_pages = resp.total_pages.max(1);
            page += 1;
        }
        items.truncate(limit);
        Ok(items)
    }

    /// Establishments within a bounding box
    /// (`GET /api/v1/Estabelecimento/geojson`).
    pub fn establishments_geojson(
        &self,
        bounds: &BoundingBox,
        zoom: u32,
    ) -> Result<FeatureCollection> {
        let url = self.build_url(
            "/api/v1/Estabelecimento/geojson",
            &[
                ("MinLatitude", bounds.min_latitude.to_string()),
                ("MaxLatitude", bounds.max_latitude.to_string()),
                ("MinLongitude", bounds.min_longitude.to_string()),
                ("MaxLongitude", bounds.max_longitude.to_string()),
                ("Zoom", zoom.to_string()),
            ],
        );
        let v = self.get_json(&url).with_context(|| format!("GET {}", url))?;
        serde_json::from_value(v).context("parse geojson feature collection")
    }

    /// Server-side CSV export of establishment details
    /// (`GET /api/v1/Estabelecimento/export-details`). Returns raw CSV text.
    pub fn export_establishment_details(&self, ufs: &[String]) -> Result<String> {
        let mut pairs = vec![("Format", "csv".to_string())];
        for uf in ufs {
            pairs.push(("Uf", uf.clone()));
        }
        let url = self.build_url("/api/v1/Estabelecimento/export-details", &pairs);
        log::debug!("GET {}", url);
        self.get_text(&url).with_context(|| format!("GET {}", url))
    }

    /// One page of the hospital/bed listing (`GET /api/v1/Leitos`).
    ///
    /// Tolerates the two malformed shapes seen upstream: a page body
    /// double-encoded as a JSON string, and truncated JSON. Both fall back
    /// to the safe empty page so list rendering never breaks.
    pub fn beds_page(
        &self,
        query: &BedsQuery,
        page: u32,
        page_size: u32,
    ) -> Result<Paginated<BedItem>> {
        let mut pairs = vec![
            ("PageNumber", page.to_string()),
            ("PageSize", page_size.to_string()),
        ];
        for uf in &query.ufs {
            pairs.push(("Uf", uf.clone()));
        }
        pairs.extend(query.query_pairs());
        let url = self.build_url("/api/v1/Leitos", &pairs);

        log::debug!("GET {}", url);
        let body = self.get_text(&url).with_context(|| format!("GET {}", url))?;
        Ok(parse_beds_page_body(&body, page_size))
    }

    /// All hospital/bed rows for a filter scope, following pagination up to
    /// `max_pages`. The cancel token is consulted between pages.
    pub fn beds_all(
        &self,
        query: &BedsQuery,
        page_size: u32,
        max_pages: u32,
        cancel: &CancelToken,
    ) -> Result<Vec<BedItem>> {
        let mut items: Vec<BedItem> = Vec::new();
        let mut page = 1u32;
        let mut total_pages = 1u32;

        while page <= total_pages && page <= max_pages {
            if cancel.is_cancelled() {
                bail!("fetch cancelled");
            }
            let resp = self.beds_page(query, page, page_size)?;
            items.extend(resp.items);
            total_pages = resp.total_pages.max(1);
            page += 1;
        }
        Ok(items)
    }

    /// Aggregate bed KPIs for a filter scope
    /// (`GET /api/v1/Leitos/indicadores`).
    pub fn bed_indicators(&self, query: &BedsQuery) -> Result<BedIndicators> {
        let url = self.build_url("/api/v1/Leitos/indicadores", &query.query_pairs());
        let v = self.get_json(&url).with_context(|| format!("GET {}", url))?;
        serde_json::from_value(v).context("parse bed indicators")
    }

    /// Bed KPIs broken down by state
    /// (`GET /api/v1/Leitos/indicadores-por-estado`).
    pub fn bed_indicators_by_state(&self, query: &BedsQuery) -> Result<Vec<BedsByState>> {
        let mut pairs = query.query_pairs();
        for uf in &query.ufs {
            pairs.push(("Ufs", uf.clone()));
        }
        let url = self.build_url("/api/v1/Leitos/indicadores-por-estado", &pairs);
        let v = self.get_json(&url).with_context(|| format!("GET {}", url))?;
        serde_json::from_value(v).context("parse bed indicators by state")
    }

    /// Bed KPIs broken down by macro-region
    /// (`GET /api/v1/Leitos/indicadores-por-regiao`).
    pub fn bed_indicators_by_region(&self, query: &BedsQuery) -> Result<Vec<BedsByRegion>> {
        let url = self.build_url("/api/v1/Leitos/indicadores-por-regiao", &query.query_pairs());
        let v = self.get_json(&url).with_context(|| format!("GET {}", url))?;
        serde_json::from_value(v).context("parse bed indicators by region")
    }
}

/// Decode a `/Leitos` page body into a typed page.
///
/// Tolerates the two malformed shapes seen upstream: a page double-encoded
/// as a JSON string, and truncated/unexpected JSON. Anything unusable falls
/// back to the safe empty page so list rendering never breaks.
pub fn parse_beds_page_body(body: &str, page_size: u32) -> Paginated<BedItem> {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(err) => {
            log::warn!("malformed /Leitos page body ({}), using empty page", err);
            return Paginated::empty(page_size);
        }
    };
    // Double-encoded payload: the page arrives as a JSON string.
    let value: Value = match value {
        Value::String(inner) => match serde_json::from_str(&inner) {
            Ok(v) => v,
            Err(err) => {
                log::warn!("unparseable inner /Leitos payload ({}), using empty page", err);
                return Paginated::empty(page_size);
            }
        },
        other => other,
    };
    match serde_json::from_value(value) {
        Ok(page) => page,
        Err(err) => {
            log::warn!("unexpected /Leitos page shape ({}), using empty page", err);
            Paginated::empty(page_size)
        }
    }
}
