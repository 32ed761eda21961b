use crate::navigation::{Effect, Navigator, PageLoadOutcome, RecordingEffects};
use crate::preview::QrSvgEncoder;
use crate::{Error, Record, RecordStore};
use askama::Template;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use include_dir::{Dir, include_dir};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, info};

type SharedState = Arc<AppState>;

static ASSETS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/assets");

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub struct AppState {
    pub store: &'static RecordStore,
    pub theme: WebTheme,
    pub base_url: String,
    pub contact: Option<Contact>,
    pub encoder: QrSvgEncoder,
}

/// Who to ask about adding a link; shown in the home page footer.
#[derive(Debug, Clone)]
pub struct Contact {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum WebTheme {
    #[default]
    Tailwind,
    Bootstrap,
}

impl fmt::Display for WebTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebTheme::Tailwind => write!(f, "tailwind"),
            WebTheme::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

impl FromStr for WebTheme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "tailwind" => Ok(WebTheme::Tailwind),
            "bootstrap" => Ok(WebTheme::Bootstrap),
            other => Err(format!(
                "unknown theme {other:?} (expected tailwind or bootstrap)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    body_class: &'static str,
    main_class: &'static str,
    card_class: &'static str,
    headline_class: &'static str,
    alert_headline_class: &'static str,
    lede_class: &'static str,
    muted_class: &'static str,
    input_class: &'static str,
    result_class: &'static str,
    button_class: &'static str,
    notice_class: &'static str,
}

impl Chrome {
    fn new(theme: WebTheme) -> Self {
        match theme {
            WebTheme::Tailwind => Self {
                body_class: "bg-gray-900 text-white",
                main_class: "flex items-center justify-center min-h-screen p-4",
                card_class: "w-full max-w-md bg-gray-800 rounded-lg shadow-xl p-8 border border-gray-700 text-center",
                headline_class: "text-3xl font-bold mt-4 text-teal-400",
                alert_headline_class: "text-3xl font-bold mt-4 text-red-500",
                lede_class: "mt-2 text-gray-400",
                muted_class: "mt-2 text-sm text-gray-500",
                input_class: "w-full px-4 py-3 bg-gray-700 text-white rounded-lg border border-gray-600 focus:outline-none focus:ring-2 focus:ring-teal-400",
                result_class: "block text-left bg-gray-700 hover:bg-gray-600 rounded-lg p-4 mt-2 cursor-pointer border border-gray-600 hover:border-teal-400",
                button_class: "inline-flex items-center rounded-md bg-teal-500 px-4 py-2 mt-4 text-gray-900 font-semibold hover:bg-teal-400",
                notice_class: "mt-4 rounded-lg border border-red-500 bg-red-950 p-3 text-sm text-red-200",
            },
            WebTheme::Bootstrap => Self {
                body_class: "bg-dark text-light",
                main_class: "container d-flex align-items-center justify-content-center min-vh-100",
                card_class: "card bg-secondary text-light p-4 text-center w-100",
                headline_class: "h3 fw-bold text-info",
                alert_headline_class: "h3 fw-bold text-danger",
                lede_class: "lead",
                muted_class: "small text-light-emphasis",
                input_class: "form-control form-control-lg",
                result_class: "list-group-item list-group-item-action text-start mt-2",
                button_class: "btn btn-info mt-3",
                notice_class: "alert alert-danger mt-3",
            },
        }
    }

    fn head_tags(theme: WebTheme) -> &'static str {
        match theme {
            WebTheme::Tailwind => {
                r#"<link rel="icon" href="/assets/favicon.svg" type="image/svg+xml">
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>"#
            }
            WebTheme::Bootstrap => {
                r#"<link rel="icon" href="/assets/favicon.svg" type="image/svg+xml">
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">"#
            }
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub theme: WebTheme,
    pub base_url: String,
    pub contact: Option<Contact>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            theme: WebTheme::default(),
            base_url: "http://127.0.0.1:8080".to_string(),
            contact: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn serve(config: WebConfig, store: &'static RecordStore) -> Result<(), WebError> {
    let state = Arc::new(AppState {
        store,
        theme: config.theme,
        base_url: config.base_url.trim_end_matches('/').to_string(),
        contact: config.contact.clone(),
        encoder: QrSvgEncoder::default(),
    });
    let router = build_router(state);
    info!(
        %config.addr,
        theme = %config.theme,
        base = %config.base_url,
        records = store.len(),
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/_/health", get(health))
        .route("/_/search", get(api_search))
        .route("/_/preview/:key/download", get(download_preview))
        .route("/assets/*path", get(asset))
        .fallback(page)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "pengalih-web",
        "records": state.store.len(),
    }))
}

#[derive(Debug, Default, Deserialize)]
struct PageParams {
    q: Option<String>,
    preview: Option<String>,
}

/// Every path that is not a service route is a page load.
async fn page(
    State(state): State<SharedState>,
    uri: Uri,
    params: Option<Query<PageParams>>,
) -> Response {
    let mut effects = RecordingEffects::new();
    let mut navigator = Navigator::new(state.store);
    let outcome = match navigator.page_load(uri.path(), &mut effects) {
        Ok(outcome) => outcome,
        Err(err) => return error_response(&state, StatusCode::INTERNAL_SERVER_ERROR, err),
    };
    match outcome {
        PageLoadOutcome::Ignored => StatusCode::NOT_FOUND.into_response(),
        PageLoadOutcome::Redirected(record) => redirect_response(&state, record, effects),
        PageLoadOutcome::NotFound => {
            let key = navigator.attempted_key().unwrap_or_default();
            not_found_response(&state, key)
        }
        PageLoadOutcome::Home => {
            // Query noise never blocks a page load; unreadable parameters
            // just leave the home screen unsearched.
            let params = params.map(|Query(params)| params).unwrap_or_default();
            home_response(&state, navigator, params)
        }
    }
}

fn redirect_response(state: &AppState, record: &Record, effects: RecordingEffects) -> Response {
    let target = effects.into_effects().into_iter().find_map(|effect| match effect {
        Effect::Navigate(url) => Some(url),
        _ => None,
    });
    let Some(target) = target else {
        return error_response(
            state,
            StatusCode::INTERNAL_SERVER_ERROR,
            "redirect was resolved without a navigation target",
        );
    };
    let template = ResolvingTemplate {
        chrome: Chrome::new(state.theme),
        head_tags: Chrome::head_tags(state.theme),
        key: record.key(),
        link: &target,
    };
    match template.render() {
        Ok(body) => (
            StatusCode::TEMPORARY_REDIRECT,
            [(header::LOCATION, target.clone())],
            Html(body),
        )
            .into_response(),
        Err(err) => error_response(state, StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

fn not_found_response(state: &AppState, key: &str) -> Response {
    let template = NotFoundTemplate {
        chrome: Chrome::new(state.theme),
        head_tags: Chrome::head_tags(state.theme),
        key,
    };
    match template.render() {
        Ok(body) => (StatusCode::NOT_FOUND, Html(body)).into_response(),
        Err(err) => error_response(state, StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

fn home_response(state: &AppState, mut navigator: Navigator<'_>, params: PageParams) -> Response {
    if let Some(query) = params.q.as_deref() {
        if let Err(err) = navigator.search_input(query) {
            return error_response(state, StatusCode::INTERNAL_SERVER_ERROR, err);
        }
    }

    let mut unknown_preview = None;
    if let Some(key) = params.preview.as_deref().filter(|key| !key.is_empty()) {
        match state.store.find_exact(key) {
            Some(record) => {
                // A failure is reported through the navigator's notice.
                if let Err(err) = navigator.request_preview(record, &state.encoder) {
                    debug!(error = %err, "preview request failed");
                }
            }
            None => unknown_preview = Some(key.to_string()),
        }
    }

    let query = navigator.search_query();
    let results = navigator
        .search_results()
        .iter()
        .map(|record| ResultRow {
            key: record.key(),
            link: record.link(),
            description: record.description(),
            preview_href: home_href(query, record.key()),
        })
        .collect();
    let preview = navigator.preview().map(|preview| PreviewBlock {
        key: preview.key.clone(),
        link: preview.link.clone(),
        svg: preview.image.as_text().unwrap_or_default().to_string(),
        download_href: download_href(&preview.key),
    });
    let example_key = state
        .store
        .records()
        .first()
        .map(Record::key)
        .unwrap_or("nama");

    let template = HomeTemplate {
        chrome: Chrome::new(state.theme),
        head_tags: Chrome::head_tags(state.theme),
        example_url: format!(
            "{}/{}",
            state.base_url,
            utf8_percent_encode(example_key, PATH_SEGMENT)
        ),
        query,
        searched: navigator.has_searched(),
        results,
        preview,
        notice: navigator.notice(),
        unknown_preview,
        contact: state.contact.as_ref(),
    };
    match template.render() {
        Ok(body) => Html(body).into_response(),
        Err(err) => error_response(state, StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SearchPayload {
    query: String,
    searched: bool,
    results: Vec<Record>,
}

async fn api_search(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchPayload>, ApiError> {
    let mut navigator = home_navigator(state.store)?;
    let query = params.q.unwrap_or_default();
    let results = navigator
        .search_input(&query)?
        .iter()
        .map(|record| (*record).clone())
        .collect();
    Ok(Json(SearchPayload {
        searched: navigator.has_searched(),
        query,
        results,
    }))
}

async fn download_preview(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Response {
    let Some(record) = state.store.find_exact(&key) else {
        return not_found_response(&state, &key);
    };
    let mut navigator = match home_navigator(state.store) {
        Ok(navigator) => navigator,
        Err(err) => return err.into_response(),
    };
    if let Err(err) = navigator.request_preview(record, &state.encoder) {
        let message = navigator.notice().map(str::to_string).unwrap_or_else(|| err.to_string());
        return error_response(&state, StatusCode::UNPROCESSABLE_ENTITY, message);
    }
    let mut effects = RecordingEffects::new();
    if let Err(err) = navigator.download_preview(&mut effects) {
        return error_response(&state, StatusCode::INTERNAL_SERVER_ERROR, err);
    }
    match effects.into_effects().into_iter().next() {
        Some(Effect::SaveFile { file_name, image }) => (
            [
                (header::CONTENT_TYPE, image.media_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{file_name}\""),
                ),
            ],
            image.bytes,
        )
            .into_response(),
        _ => error_response(
            &state,
            StatusCode::INTERNAL_SERVER_ERROR,
            "preview download produced no file",
        ),
    }
}

async fn asset(Path(path): Path<String>) -> Response {
    match ASSETS.get_file(&path) {
        Some(file) => (
            [(header::CONTENT_TYPE, asset_mime(&path).to_string())],
            file.contents(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn asset_mime(path: &str) -> mime::Mime {
    let extension = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    match extension.to_ascii_lowercase().as_str() {
        "js" => mime::TEXT_JAVASCRIPT,
        "css" => mime::TEXT_CSS,
        "svg" => mime::IMAGE_SVG,
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "json" => mime::APPLICATION_JSON,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// A navigator that has already settled on the home screen, for service
/// endpoints that act on behalf of the home page.
fn home_navigator(store: &RecordStore) -> Result<Navigator<'_>, ApiError> {
    let mut navigator = Navigator::new(store);
    navigator.page_load("/", &mut RecordingEffects::new())?;
    Ok(navigator)
}

fn home_href(query: &str, preview_key: &str) -> String {
    format!(
        "/?q={}&preview={}",
        utf8_percent_encode(query, NON_ALPHANUMERIC),
        utf8_percent_encode(preview_key, NON_ALPHANUMERIC)
    )
}

fn download_href(key: &str) -> String {
    format!(
        "/_/preview/{}/download",
        utf8_percent_encode(key, PATH_SEGMENT)
    )
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::PreviewEncodingFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn error_response(state: &AppState, status: StatusCode, message: impl fmt::Display) -> Response {
    let chrome = Chrome::new(state.theme);
    let message = message.to_string();
    let body = format!(
        r#"<!DOCTYPE html>
<html lang="id">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Pengalih URL • Galat</title>
    {head_tags}
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <div class="{card_class}">
        <h1 class="{headline_class}">Terjadi kesalahan</h1>
        <p class="{lede_class}">{message}</p>
        <a href="/" class="{button_class}">Kembali ke beranda</a>
      </div>
    </main>
  </body>
</html>"#,
        head_tags = Chrome::head_tags(state.theme),
        body_class = chrome.body_class,
        main_class = chrome.main_class,
        card_class = chrome.card_class,
        headline_class = chrome.alert_headline_class,
        lede_class = chrome.lede_class,
        button_class = chrome.button_class,
        message = html_escape(&message),
    );
    (status, Html(body)).into_response()
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

struct ResultRow<'a> {
    key: &'a str,
    link: &'a str,
    description: &'a str,
    preview_href: String,
}

struct PreviewBlock {
    key: String,
    link: String,
    svg: String,
    download_href: String,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="id">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Pengalih URL</title>
    {{ head_tags|safe }}
    <script src="/assets/search.js" defer></script>
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <h1 class="{{ chrome.headline_class }}">Selamat Datang di Pengalih URL</h1>
        <p class="{{ chrome.lede_class }}">Untuk menggunakan aplikasi ini, tambahkan nama ke URL atau cari di bawah.</p>
        <p class="{{ chrome.muted_class }}">Contoh: <code>{{ example_url }}</code></p>

        <form method="get" action="/" class="mt-6">
          <input id="search" type="text" name="q" value="{{ query }}" placeholder="Cari nama atau deskripsi..." autocomplete="off" class="{{ chrome.input_class }}" />
        </form>

        <div id="results" data-result-class="{{ chrome.result_class }}" data-muted-class="{{ chrome.muted_class }}">
          {% if results.len() > 0 %}
          <p class="{{ chrome.muted_class }}">Hasil Pencarian ({{ results.len() }}):</p>
          {% for row in results %}
          <div class="{{ chrome.result_class }}">
            <a href="{{ row.link }}" target="_blank" rel="noopener noreferrer">
              <h3 class="text-lg font-semibold">{{ row.key }}</h3>
              <p class="{{ chrome.muted_class }}">{{ row.description }}</p>
              <p class="text-xs text-teal-400 break-all">{{ row.link }}</p>
            </a>
            <a href="{{ row.preview_href }}" class="{{ chrome.muted_class }} underline">Kode QR</a>
          </div>
          {% endfor %}
          {% else if searched %}
          <p class="{{ chrome.muted_class }}">Tidak ada hasil yang ditemukan.</p>
          {% endif %}
        </div>

        {% if notice.is_some() %}
        <div class="{{ chrome.notice_class }}" role="alert">{{ notice.unwrap() }}</div>
        {% endif %}
        {% if unknown_preview.is_some() %}
        <div class="{{ chrome.notice_class }}" role="alert">Nama "{{ unknown_preview.as_ref().unwrap() }}" tidak ditemukan.</div>
        {% endif %}

        {% match preview %}
        {% when Some with (block) %}
        <section id="preview" class="mt-6">
          <p class="{{ chrome.muted_class }}">Kode QR untuk <span class="font-semibold">{{ block.key }}</span></p>
          <div class="inline-block bg-white p-2 rounded">{{ block.svg|safe }}</div>
          <p class="text-xs break-all">{{ block.link }}</p>
          <a href="{{ block.download_href }}" class="{{ chrome.button_class }}">Unduh kode QR</a>
        </section>
        {% when None %}
        {% endmatch %}

        {% match contact %}
        {% when Some with (footer) %}
        <div class="mt-8 pt-6 border-t border-gray-700">
          <p class="{{ chrome.muted_class }}">Ingin menambahkan URL Anda?</p>
          <p class="{{ chrome.muted_class }}">Silakan hubungi <a href="{{ footer.url }}" target="_blank" rel="noopener noreferrer" class="underline font-semibold">{{ footer.name }}</a></p>
        </div>
        {% when None %}
        {% endmatch %}
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct HomeTemplate<'a> {
    chrome: Chrome,
    head_tags: &'static str,
    example_url: String,
    query: &'a str,
    searched: bool,
    results: Vec<ResultRow<'a>>,
    preview: Option<PreviewBlock>,
    notice: Option<&'a str>,
    unknown_preview: Option<String>,
    contact: Option<&'a Contact>,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="id">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <meta http-equiv="refresh" content="0; url={{ link }}" />
    <title>Pengalih URL • {{ key }}</title>
    {{ head_tags|safe }}
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <h1 class="{{ chrome.headline_class }}">Mencari...</h1>
        <p class="{{ chrome.lede_class }}">Mencoba mengalihkan untuk <span class="font-semibold">{{ key }}</span>.</p>
        <a href="{{ link }}" class="{{ chrome.button_class }}">Lanjutkan</a>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct ResolvingTemplate<'a> {
    chrome: Chrome,
    head_tags: &'static str,
    key: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="id">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Pengalih URL • Tidak Ditemukan</title>
    {{ head_tags|safe }}
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <h1 class="{{ chrome.alert_headline_class }}">Halaman Tidak Ditemukan</h1>
        <p class="{{ chrome.lede_class }}">Maaf, kami tidak dapat menemukan halaman untuk <span class="font-semibold">"{{ key }}"</span>.</p>
        <a href="/" class="{{ chrome.button_class }}">Cari nama lain</a>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct NotFoundTemplate<'a> {
    chrome: Chrome,
    head_tags: &'static str,
    key: &'a str,
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use axum::{body, body::Body, http::Request};
    use tower::ServiceExt;

    fn test_router() -> Router {
        let state = Arc::new(AppState {
            store: RecordStore::embedded(),
            theme: WebTheme::Tailwind,
            base_url: "http://127.0.0.1:8080".to_string(),
            contact: Some(Contact {
                url: "https://wa.me/000".to_string(),
                name: "Marthin".to_string(),
            }),
            encoder: QrSvgEncoder::default(),
        });
        build_router(state)
    }

    async fn get(uri: &str) -> Response {
        test_router()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn known_name_redirects() {
        let response = get("/marthin").await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://alfreinsco.fun"
        );
    }

    #[tokio::test]
    async fn redirect_ignores_unparseable_query() {
        for uri in [
            "/marthin?q=a&q=b",
            "/marthin?preview=x&preview=y",
            "/marthin?utm_source=x",
        ] {
            let response = get(uri).await;
            assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{uri}");
        }
        let response = get("/unknown-user-xyz?q=a&q=b").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = get("/?q=a&q=b").await;
        assert!(response.status().is_success());
        assert!(!body_text(response).await.contains("Hasil Pencarian"));
    }

    #[tokio::test]
    async fn name_lookup_ignores_case() {
        let response = get("/MaRtHiN").await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    }

    #[tokio::test]
    async fn unknown_name_renders_not_found() {
        let response = get("/unknown-user-xyz").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let html = body_text(response).await;
        assert!(html.contains("Halaman Tidak Ditemukan"));
        assert!(html.contains("unknown-user-xyz"));
    }

    #[tokio::test]
    async fn root_renders_home() {
        let response = get("/").await;
        assert!(response.status().is_success());
        let html = body_text(response).await;
        assert!(html.contains("Selamat Datang di Pengalih URL"));
        assert!(html.contains("alfreinsco</code>"));
        assert!(html.contains("Ingin menambahkan URL Anda?"));
        assert!(!html.contains("Hasil Pencarian"));
        assert!(!html.contains("Tidak ada hasil"));
    }

    #[tokio::test]
    async fn home_search_lists_matches() {
        let html = body_text(get("/?q=kkr").await).await;
        assert!(html.contains("Hasil Pencarian (1)"));
        assert!(html.contains("penjangkauan-kkr-kampus-2025"));
        assert!(!html.contains("<h3 class=\"text-lg font-semibold\">marthin</h3>"));

        let html = body_text(get("/?q=tidak-ada-sama-sekali").await).await;
        assert!(html.contains("Tidak ada hasil yang ditemukan."));
    }

    #[tokio::test]
    async fn home_preview_renders_inline_qr() {
        let html = body_text(get("/?preview=marthin").await).await;
        assert!(html.contains("<section id=\"preview\""));
        assert!(html.contains("<svg"));
        assert!(html.contains("Unduh kode QR"));

        let html = body_text(get("/?preview=nobody").await).await;
        assert!(html.contains("Nama \"nobody\" tidak ditemukan."));
    }

    #[tokio::test]
    async fn api_search_returns_records() {
        let response = get("/_/search?q=MARTHIN").await;
        assert!(response.status().is_success());
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let payload: SearchPayload = serde_json::from_slice(&bytes).unwrap();
        assert!(payload.searched);
        let keys: Vec<_> = payload.results.iter().map(Record::key).collect();
        assert_eq!(keys, ["alfreinsco", "marthin"]);
    }

    #[tokio::test]
    async fn api_search_blank_is_not_searched() {
        let bytes = body::to_bytes(get("/_/search?q=%20%20").await.into_body(), usize::MAX)
            .await
            .unwrap();
        let payload: SearchPayload = serde_json::from_slice(&bytes).unwrap();
        assert!(!payload.searched);
        assert!(payload.results.is_empty());
    }

    #[tokio::test]
    async fn preview_download_is_attachment() {
        let response = get("/_/preview/Marthin/download").await;
        assert!(response.status().is_success());
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"qrcode-marthin.svg\""
        );
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/svg+xml"
        );
        assert!(body_text(response).await.contains("<svg"));
    }

    #[tokio::test]
    async fn preview_download_for_unknown_name_is_404() {
        let response = get("/_/preview/nobody/download").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn assets_are_served_and_never_resolved() {
        let response = get("/assets/search.js").await;
        assert!(response.status().is_success());
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/javascript"
        );

        let response = get("/assets/img/logo.png").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!body_text(response).await.contains("Halaman Tidak Ditemukan"));
    }

    #[tokio::test]
    async fn health_reports_record_count() {
        let bytes = body::to_bytes(get("/_/health").await.into_body(), usize::MAX)
            .await
            .unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["records"], RecordStore::embedded().len());
    }

    #[test]
    fn theme_parses_case_insensitively() {
        assert_eq!("Bootstrap".parse::<WebTheme>(), Ok(WebTheme::Bootstrap));
        assert!("solarized".parse::<WebTheme>().is_err());
    }
}
