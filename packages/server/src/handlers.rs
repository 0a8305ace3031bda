//! HTTP handler functions for the dashboard and its JSON API.

use std::collections::BTreeMap;

use actix_web::http::{StatusCode, header};
use actix_web::{HttpResponse, web};
use askama::Template;
use bidboard_listing::ListingDefinition;
use bidboard_listing::pipeline::{ScrapeOptions, ScrapeOutcome, ScrapeReport, scrape_listing};
use bidboard_listing::progress::null_progress;
use bidboard_render::{RenderError, render_tables};
use bidboard_server_models::{ApiError, ApiHealth, ApiListing, ApiTables};
use bidboard_table::chain::FilterState;

use crate::AppState;
use crate::session::SessionCache;

/// Query parameter holding the keyword filter.
const KEYWORD_PARAM: &str = "q";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

type Params = web::Query<BTreeMap<String, String>>;

// ── Helpers ─────────────────────────────────────────────────────────────

/// Builds the session filter state from query parameters. Parameters that
/// are neither the keyword nor a facet of `def` are ignored.
fn filter_state(def: &ListingDefinition, params: &BTreeMap<String, String>) -> FilterState {
    params
        .iter()
        .fold(FilterState::default(), |state, (key, value)| {
            if key == KEYWORD_PARAM {
                state.with_keyword(value)
            } else if def.view.is_facet(key) {
                state.with_facet(key, value)
            } else {
                state
            }
        })
}

fn page(status: StatusCode, template: &impl Template) -> HttpResponse {
    match template.render() {
        Ok(body) => HttpResponse::build(status)
            .content_type("text/html; charset=utf-8")
            .body(body),
        Err(e) => {
            log::error!("Failed to render page: {e}");
            HttpResponse::InternalServerError().body("Failed to render page")
        }
    }
}

fn unknown_listing(id: &str) -> HttpResponse {
    HttpResponse::NotFound().json(ApiError::new(format!("unknown listing '{id}'")))
}

/// Renders the cached tables for `def` through its view, or `None` if the
/// listing has not been scraped.
fn view_html(
    cache: &SessionCache,
    def: &ListingDefinition,
    state: &FilterState,
) -> Result<Option<String>, RenderError> {
    cache
        .view(&def.id, &def.view, state)
        .map(|tables| render_tables(&tables))
        .transpose()
}

fn render_failure(id: &str, e: &RenderError) -> HttpResponse {
    log::error!("[{id}] Failed to render tables: {e}");
    HttpResponse::InternalServerError().body("Failed to render tables")
}

fn summary(report: &ScrapeReport) -> String {
    match &report.outcome {
        ScrapeOutcome::Failed { .. } => "last scrape failed".to_owned(),
        ScrapeOutcome::NoData { .. } => "no data found".to_owned(),
        ScrapeOutcome::Complete | ScrapeOutcome::BestEffort { .. } => format!(
            "{} rows, scraped {}",
            report.row_count(),
            report.scraped_at.format(TIME_FORMAT)
        ),
    }
}

// ── Pages ───────────────────────────────────────────────────────────────

struct Card {
    id: String,
    title: String,
    transport: String,
    scraped: Option<String>,
}

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    cards: Vec<Card>,
    busy: bool,
}

/// `GET /`
pub async fn home(state: web::Data<AppState>) -> HttpResponse {
    let cards = {
        let cache = state.cache();
        state
            .listings
            .iter()
            .map(|def| Card {
                id: def.id.clone(),
                title: def.title.clone(),
                transport: def.fetch.transport().to_string(),
                scraped: cache.get(&def.id).map(summary),
            })
            .collect()
    };

    page(
        StatusCode::OK,
        &HomeTemplate {
            cards,
            busy: state.gate.is_busy(),
        },
    )
}

struct FacetOption {
    value: String,
    selected: bool,
}

struct Facet {
    name: String,
    options: Vec<FacetOption>,
}

#[derive(Template)]
#[template(path = "listing.html")]
struct ListingTemplate<'a> {
    id: &'a str,
    title: &'a str,
    source_url: &'a str,
    notice: Option<String>,
    scraped_at: Option<String>,
    skipped_rows: usize,
    keyword: &'a str,
    facets: Vec<Facet>,
    tables_html: String,
}

/// `GET /listings/{id}`
///
/// Renders the cached scrape through the listing's view narrowed by the
/// query parameters. Never fetches.
pub async fn listing_page(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: Params,
) -> HttpResponse {
    let id = path.into_inner();
    let Some(def) = state.listing(&id) else {
        return unknown_listing(&id);
    };
    let filter = filter_state(def, &params);

    let cache = state.cache();
    let report = cache.get(&id);
    let tables_html = match view_html(&cache, def, &filter) {
        Ok(html) => html.unwrap_or_default(),
        Err(e) => return render_failure(&id, &e),
    };

    let facets = def
        .view
        .facets
        .iter()
        .map(|name| {
            let mut options = def.view.facet_options(name);
            if options.is_empty() {
                options = cache.column_values(&id, name);
            }
            let selected = filter.facet(name);
            Facet {
                name: name.clone(),
                options: options
                    .into_iter()
                    .map(|value| FacetOption {
                        selected: selected == Some(value.as_str()),
                        value,
                    })
                    .collect(),
            }
        })
        .collect();

    let template = ListingTemplate {
        id: &def.id,
        title: &def.title,
        source_url: &def.url,
        notice: report.and_then(|r| r.outcome.notice().map(str::to_owned)),
        scraped_at: report.map(|r| r.scraped_at.format(TIME_FORMAT).to_string()),
        skipped_rows: report.map_or(0, |r| r.warnings.len()),
        keyword: &filter.keyword,
        facets,
        tables_html,
    };
    page(StatusCode::OK, &template)
}

/// `GET /listings/{id}/fragment`
///
/// Just the table sections of [`listing_page`], for in-place refresh.
pub async fn listing_fragment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: Params,
) -> HttpResponse {
    let id = path.into_inner();
    let Some(def) = state.listing(&id) else {
        return unknown_listing(&id);
    };
    let filter = filter_state(def, &params);

    match view_html(&state.cache(), def, &filter) {
        Ok(Some(html)) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(html),
        Ok(None) => HttpResponse::NotFound().body("Listing has not been scraped"),
        Err(e) => render_failure(&id, &e),
    }
}

#[derive(Template)]
#[template(path = "busy.html")]
struct BusyTemplate;

/// `POST /listings/{id}/scrape`
///
/// Runs the pipeline and replaces the cached result, then redirects to the
/// listing page. Responds `409 Conflict` while another scrape is running.
pub async fn scrape(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let id = path.into_inner();
    let Some(def) = state.listing(&id) else {
        return unknown_listing(&id);
    };

    let Some(_guard) = state.gate.try_acquire() else {
        log::warn!("[{id}] Scrape rejected: another scrape is running");
        return page(StatusCode::CONFLICT, &BusyTemplate);
    };

    let report = scrape_listing(
        def,
        &state.settings,
        ScrapeOptions::default(),
        &null_progress(),
    )
    .await;
    log::info!("[{id}] Scrape finished: {}", report.outcome.kind());
    state.cache().store(report);

    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, format!("/listings/{id}")))
        .finish()
}

// ── JSON API ────────────────────────────────────────────────────────────

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/listings`
pub async fn api_listings(state: web::Data<AppState>) -> HttpResponse {
    let cache = state.cache();
    let listings: Vec<ApiListing> = state
        .listings
        .iter()
        .map(|def| ApiListing {
            id: def.id.clone(),
            title: def.title.clone(),
            url: def.url.clone(),
            transport: def.fetch.transport().to_string(),
            best_effort: def.fetch.is_best_effort(),
            facets: def.view.facets.clone(),
            scraped_at: cache.get(&def.id).map(|r| r.scraped_at),
        })
        .collect();
    HttpResponse::Ok().json(listings)
}

/// `GET /api/listings/{id}/tables`
///
/// The cached scrape through the listing's view, narrowed by the same
/// query parameters as the listing page.
pub async fn api_tables(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: Params,
) -> HttpResponse {
    let id = path.into_inner();
    let Some(def) = state.listing(&id) else {
        return unknown_listing(&id);
    };
    let filter = filter_state(def, &params);

    let cache = state.cache();
    let Some(report) = cache.get(&id) else {
        return HttpResponse::NotFound().json(ApiError::new(format!(
            "listing '{id}' has not been scraped"
        )));
    };

    HttpResponse::Ok().json(ApiTables {
        listing_id: id.clone(),
        outcome: report.outcome.kind().to_owned(),
        notice: report.outcome.notice().map(str::to_owned),
        scraped_at: report.scraped_at,
        skipped_rows: report.warnings.len(),
        tables: report.view(&def.view, &filter),
    })
}
