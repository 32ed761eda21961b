//! Navigation state machine.
//!
//! A [`Navigator`] owns the screen state for one page load. The host calls
//! [`Navigator::page_load`] exactly once with the requested path, then feeds
//! user input through the remaining event handlers. Everything that would
//! leave the page (navigation, opening a new tab, saving a file) goes through
//! the injected [`BrowserEffects`], so the machine itself never performs IO.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::preview::{Preview, PreviewEncoder, PreviewImage};
use crate::{Error, Record, RecordStore, Result};

/// Requests under this prefix are static files, never names.
pub const ASSETS_PREFIX: &str = "/assets";

const PREVIEW_FAILED_NOTICE: &str = "Gagal membuat kode QR. Silakan coba lagi.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationState {
    #[default]
    Idle,
    Resolving,
    NotFound,
    Home,
}

impl fmt::Display for NavigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationState::Idle => write!(f, "idle"),
            NavigationState::Resolving => write!(f, "resolving"),
            NavigationState::NotFound => write!(f, "not found"),
            NavigationState::Home => write!(f, "home"),
        }
    }
}

/// Host capabilities the navigator may trigger.
pub trait BrowserEffects {
    /// Replace the current page with `url`.
    fn navigate(&mut self, url: &str);
    /// Open `url` in a new browsing context, keeping the current page.
    fn open_in_new_context(&mut self, url: &str);
    /// Hand `image` to the user as a file called `file_name`.
    fn save_file(&mut self, file_name: &str, image: &PreviewImage);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Navigate(String),
    OpenInNewContext(String),
    SaveFile {
        file_name: String,
        image: PreviewImage,
    },
}

/// Collects effects instead of performing them. The web host translates
/// the collected effects into an HTTP response.
#[derive(Debug, Default)]
pub struct RecordingEffects {
    effects: Vec<Effect>,
}

impl RecordingEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn into_effects(self) -> Vec<Effect> {
        self.effects
    }
}

impl BrowserEffects for RecordingEffects {
    fn navigate(&mut self, url: &str) {
        self.effects.push(Effect::Navigate(url.to_string()));
    }

    fn open_in_new_context(&mut self, url: &str) {
        self.effects.push(Effect::OpenInNewContext(url.to_string()));
    }

    fn save_file(&mut self, file_name: &str, image: &PreviewImage) {
        self.effects.push(Effect::SaveFile {
            file_name: file_name.to_string(),
            image: image.clone(),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLoadOutcome<'s> {
    /// Static-asset path; nothing was resolved.
    Ignored,
    Home,
    /// A navigation to the record's link was issued.
    Redirected(&'s Record),
    NotFound,
}

pub struct Navigator<'s> {
    store: &'s RecordStore,
    state: NavigationState,
    loaded: bool,
    attempted_key: Option<String>,
    search_query: String,
    search_results: Vec<&'s Record>,
    preview: Option<Preview>,
    notice: Option<String>,
}

impl<'s> Navigator<'s> {
    pub fn new(store: &'s RecordStore) -> Self {
        Self {
            store,
            state: NavigationState::Idle,
            loaded: false,
            attempted_key: None,
            search_query: String::new(),
            search_results: Vec::new(),
            preview: None,
            notice: None,
        }
    }

    /// Resolves the requested path. Runs once per navigator; later calls
    /// are rejected without touching the state.
    pub fn page_load(
        &mut self,
        path: &str,
        effects: &mut dyn BrowserEffects,
    ) -> Result<PageLoadOutcome<'s>> {
        if self.loaded {
            return Err(Error::AlreadyLoaded);
        }
        self.loaded = true;

        if is_asset_path(path) {
            debug!(path, "static asset path bypasses name resolution");
            return Ok(PageLoadOutcome::Ignored);
        }

        let key = path.strip_prefix('/').unwrap_or(path);
        if key.is_empty() {
            debug!("no name in path; showing home");
            self.state = NavigationState::Home;
            return Ok(PageLoadOutcome::Home);
        }

        self.attempted_key = Some(key.to_string());
        self.state = NavigationState::Resolving;
        match self.store.find_exact(key) {
            Some(record) => {
                info!(key, link = record.link(), "redirecting");
                effects.navigate(record.link());
                Ok(PageLoadOutcome::Redirected(record))
            }
            None => {
                warn!(key, "no link registered for name");
                self.state = NavigationState::NotFound;
                Ok(PageLoadOutcome::NotFound)
            }
        }
    }

    pub fn search_input(&mut self, query: &str) -> Result<&[&'s Record]> {
        self.require(NavigationState::Home, "SearchInput")?;
        self.search_query = query.to_string();
        self.search_results = self.store.search(query);
        Ok(&self.search_results)
    }

    /// Opens the link of the `index`-th current search result in a new
    /// browsing context.
    pub fn select_result(
        &self,
        index: usize,
        effects: &mut dyn BrowserEffects,
    ) -> Result<&'s Record> {
        self.require(NavigationState::Home, "SelectResult")?;
        let record = self
            .search_results
            .get(index)
            .copied()
            .ok_or(Error::NoSuchResult {
                index,
                len: self.search_results.len(),
            })?;
        effects.open_in_new_context(record.link());
        Ok(record)
    }

    /// Renders `record`'s link through `encoder` into the preview slot.
    ///
    /// On failure the previous preview stays and a notice is set for the
    /// page to show.
    pub fn request_preview(
        &mut self,
        record: &Record,
        encoder: &dyn PreviewEncoder,
    ) -> Result<&Preview> {
        self.require(NavigationState::Home, "RequestPreview")?;
        match encoder.encode(record.link()) {
            Ok(image) => {
                self.notice = None;
                let preview = Preview {
                    key: record.key().to_string(),
                    link: record.link().to_string(),
                    image,
                };
                Ok(&*self.preview.insert(preview))
            }
            Err(source) => {
                warn!(key = record.key(), error = %source, "preview encoding failed");
                self.notice = Some(PREVIEW_FAILED_NOTICE.to_string());
                Err(Error::PreviewEncodingFailed {
                    key: record.key().to_string(),
                    source,
                })
            }
        }
    }

    /// Saves the stored preview as `qrcode-<key>.<ext>`; returns the name.
    pub fn download_preview(&self, effects: &mut dyn BrowserEffects) -> Result<String> {
        self.require(NavigationState::Home, "DownloadPreview")?;
        let preview = self.preview.as_ref().ok_or(Error::NoPreview)?;
        let file_name = preview.file_name();
        effects.save_file(&file_name, &preview.image);
        Ok(file_name)
    }

    pub fn state(&self) -> NavigationState {
        self.state
    }

    pub fn attempted_key(&self) -> Option<&str> {
        self.attempted_key.as_deref()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn search_results(&self) -> &[&'s Record] {
        &self.search_results
    }

    /// Whether the current query asked for a search at all, as opposed to
    /// a search that found nothing.
    pub fn has_searched(&self) -> bool {
        !crate::is_blank_query(&self.search_query)
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    fn require(&self, expected: NavigationState, event: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidEvent {
                event,
                state: self.state,
            })
        }
    }
}

pub fn is_asset_path(path: &str) -> bool {
    path.strip_prefix(ASSETS_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::PreviewError;

    fn sample_store() -> RecordStore {
        RecordStore::from_records(vec![
            Record::new("alfreinsco", "https://alfreinsco.fun", "Pertofolio Marthin"),
            Record::new("marthin", "https://alfreinsco.fun", "Halaman Portofolio Marthin"),
            Record::new(
                "penjangkauan-kkr-kampus-2025",
                "https://forms.example/kkr",
                "Halaman Penjangkauan KKR Kampus 2025",
            ),
        ])
        .unwrap()
    }

    struct FixedEncoder;

    impl PreviewEncoder for FixedEncoder {
        fn encode(&self, payload: &str) -> Result<PreviewImage, PreviewError> {
            Ok(PreviewImage {
                bytes: payload.as_bytes().to_vec(),
                media_type: "text/plain",
                extension: "txt",
            })
        }
    }

    struct BrokenEncoder;

    impl PreviewEncoder for BrokenEncoder {
        fn encode(&self, _payload: &str) -> Result<PreviewImage, PreviewError> {
            Err(PreviewError::Encoder("renderer offline".into()))
        }
    }

    fn home(store: &RecordStore) -> Navigator<'_> {
        let mut nav = Navigator::new(store);
        let outcome = nav.page_load("/", &mut RecordingEffects::new()).unwrap();
        assert_eq!(outcome, PageLoadOutcome::Home);
        nav
    }

    #[test]
    fn starts_idle() {
        let store = sample_store();
        let nav = Navigator::new(&store);
        assert_eq!(nav.state(), NavigationState::Idle);
        assert!(nav.attempted_key().is_none());
    }

    #[test]
    fn root_path_shows_home_with_no_results() {
        let store = sample_store();
        let mut effects = RecordingEffects::new();
        let mut nav = Navigator::new(&store);
        nav.page_load("/", &mut effects).unwrap();
        assert_eq!(nav.state(), NavigationState::Home);
        assert!(nav.search_results().is_empty());
        assert!(!nav.has_searched());
        assert!(effects.effects().is_empty());
    }

    #[test]
    fn known_key_navigates_to_link() {
        let store = sample_store();
        let mut effects = RecordingEffects::new();
        let mut nav = Navigator::new(&store);
        let outcome = nav.page_load("/marthin", &mut effects).unwrap();
        assert!(matches!(outcome, PageLoadOutcome::Redirected(r) if r.key() == "marthin"));
        assert_eq!(nav.state(), NavigationState::Resolving);
        assert_eq!(nav.attempted_key(), Some("marthin"));
        assert_eq!(
            effects.effects(),
            [Effect::Navigate("https://alfreinsco.fun".into())]
        );
    }

    #[test]
    fn key_lookup_ignores_case() {
        let store = sample_store();
        let mut effects = RecordingEffects::new();
        let mut nav = Navigator::new(&store);
        nav.page_load("/MARTHIN", &mut effects).unwrap();
        assert_eq!(nav.attempted_key(), Some("MARTHIN"));
        assert_eq!(
            effects.into_effects(),
            vec![Effect::Navigate("https://alfreinsco.fun".into())]
        );
    }

    #[test]
    fn unknown_key_is_not_found() {
        let store = sample_store();
        let mut effects = RecordingEffects::new();
        let mut nav = Navigator::new(&store);
        let outcome = nav.page_load("/unknown-user-xyz", &mut effects).unwrap();
        assert_eq!(outcome, PageLoadOutcome::NotFound);
        assert_eq!(nav.state(), NavigationState::NotFound);
        assert_eq!(nav.attempted_key(), Some("unknown-user-xyz"));
        assert!(effects.effects().is_empty());
    }

    #[test]
    fn path_without_leading_slash_is_used_verbatim() {
        let store = sample_store();
        let mut effects = RecordingEffects::new();
        let mut nav = Navigator::new(&store);
        nav.page_load("alfreinsco", &mut effects).unwrap();
        assert_eq!(effects.effects().len(), 1);

        // Only one separator is stripped.
        let mut nav = Navigator::new(&store);
        nav.page_load("//marthin", &mut RecordingEffects::new()).unwrap();
        assert_eq!(nav.state(), NavigationState::NotFound);
        assert_eq!(nav.attempted_key(), Some("/marthin"));
    }

    #[test]
    fn asset_paths_are_ignored() {
        let store = sample_store();
        let mut effects = RecordingEffects::new();
        let mut nav = Navigator::new(&store);
        let outcome = nav.page_load("/assets/img/logo.png", &mut effects).unwrap();
        assert_eq!(outcome, PageLoadOutcome::Ignored);
        assert_eq!(nav.state(), NavigationState::Idle);
        assert!(nav.attempted_key().is_none());
        assert!(effects.effects().is_empty());

        assert!(is_asset_path("/assets"));
        assert!(!is_asset_path("/assetsmith"));
        assert!(!is_asset_path("/my/assets/x"));
    }

    #[test]
    fn page_load_runs_once() {
        let store = sample_store();
        let mut effects = RecordingEffects::new();
        let mut nav = Navigator::new(&store);
        nav.page_load("/unknown", &mut effects).unwrap();
        let err = nav.page_load("/marthin", &mut effects).unwrap_err();
        assert!(matches!(err, Error::AlreadyLoaded));
        assert_eq!(nav.state(), NavigationState::NotFound);
        assert_eq!(nav.attempted_key(), Some("unknown"));
        assert!(effects.effects().is_empty());
    }

    #[test]
    fn search_filters_and_resets() {
        let store = sample_store();
        let mut nav = home(&store);
        let keys: Vec<_> = nav
            .search_input("kkr")
            .unwrap()
            .iter()
            .map(|r| r.key())
            .collect();
        assert_eq!(keys, ["penjangkauan-kkr-kampus-2025"]);
        assert!(nav.has_searched());

        assert!(nav.search_input("").unwrap().is_empty());
        assert_eq!(nav.search_query(), "");
        assert!(!nav.has_searched());
    }

    #[test]
    fn searched_with_no_hits_differs_from_not_searched() {
        let store = sample_store();
        let mut nav = home(&store);
        assert!(nav.search_input("tidak-ada").unwrap().is_empty());
        assert!(nav.has_searched());
        nav.search_input("   ").unwrap();
        assert!(!nav.has_searched());
    }

    #[test]
    fn repeated_search_is_idempotent() {
        let store = sample_store();
        let mut nav = home(&store);
        let first: Vec<Record> = nav
            .search_input("marthin")
            .unwrap()
            .iter()
            .map(|r| (*r).clone())
            .collect();
        let second: Vec<Record> = nav
            .search_input("marthin")
            .unwrap()
            .iter()
            .map(|r| (*r).clone())
            .collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn search_outside_home_is_rejected() {
        let store = sample_store();
        let mut nav = Navigator::new(&store);
        nav.page_load("/nobody", &mut RecordingEffects::new()).unwrap();
        let err = nav.search_input("marthin").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidEvent {
                event: "SearchInput",
                state: NavigationState::NotFound
            }
        ));
        assert_eq!(nav.search_query(), "");
    }

    #[test]
    fn select_result_opens_new_context() {
        let store = sample_store();
        let mut nav = home(&store);
        nav.search_input("kkr").unwrap();
        let mut effects = RecordingEffects::new();
        let record = nav.select_result(0, &mut effects).unwrap();
        assert_eq!(record.key(), "penjangkauan-kkr-kampus-2025");
        assert_eq!(
            effects.effects(),
            [Effect::OpenInNewContext("https://forms.example/kkr".into())]
        );
        assert_eq!(nav.state(), NavigationState::Home);
    }

    #[test]
    fn select_result_requires_results() {
        let store = sample_store();
        let nav = home(&store);
        let mut effects = RecordingEffects::new();
        let err = nav.select_result(0, &mut effects).unwrap_err();
        assert!(matches!(err, Error::NoSuchResult { index: 0, len: 0 }));
        assert!(effects.effects().is_empty());
    }

    #[test]
    fn preview_then_download() {
        let store = sample_store();
        let mut nav = home(&store);
        let record = store.find_exact("marthin").unwrap();
        let preview = nav.request_preview(record, &FixedEncoder).unwrap();
        assert_eq!(preview.key, "marthin");
        assert_eq!(preview.link, "https://alfreinsco.fun");

        let mut effects = RecordingEffects::new();
        let name = nav.download_preview(&mut effects).unwrap();
        assert_eq!(name, "qrcode-marthin.txt");
        match effects.effects() {
            [Effect::SaveFile { file_name, image }] => {
                assert_eq!(file_name, "qrcode-marthin.txt");
                assert_eq!(image.bytes, b"https://alfreinsco.fun");
            }
            other => panic!("unexpected effects: {other:?}"),
        }
    }

    #[test]
    fn newer_preview_replaces_older() {
        let store = sample_store();
        let mut nav = home(&store);
        nav.request_preview(store.find_exact("marthin").unwrap(), &FixedEncoder)
            .unwrap();
        nav.request_preview(store.find_exact("alfreinsco").unwrap(), &FixedEncoder)
            .unwrap();
        assert_eq!(nav.preview().map(|p| p.key.as_str()), Some("alfreinsco"));
    }

    #[test]
    fn failed_preview_sets_notice_and_keeps_previous() {
        let store = sample_store();
        let mut nav = home(&store);
        let marthin = store.find_exact("marthin").unwrap();
        nav.request_preview(marthin, &FixedEncoder).unwrap();

        let err = nav.request_preview(marthin, &BrokenEncoder).unwrap_err();
        assert!(matches!(err, Error::PreviewEncodingFailed { ref key, .. } if key == "marthin"));
        assert!(nav.notice().is_some());
        assert_eq!(nav.preview().map(|p| p.key.as_str()), Some("marthin"));
        assert_eq!(nav.state(), NavigationState::Home);

        nav.request_preview(marthin, &FixedEncoder).unwrap();
        assert!(nav.notice().is_none());
    }

    #[test]
    fn download_without_preview_is_rejected() {
        let store = sample_store();
        let nav = home(&store);
        let mut effects = RecordingEffects::new();
        assert!(matches!(
            nav.download_preview(&mut effects),
            Err(Error::NoPreview)
        ));
        assert!(effects.effects().is_empty());
    }

    #[test]
    fn preview_outside_home_is_rejected() {
        let store = sample_store();
        let mut nav = Navigator::new(&store);
        let record = store.find_exact("marthin").unwrap();
        assert!(matches!(
            nav.request_preview(record, &FixedEncoder),
            Err(Error::InvalidEvent { state: NavigationState::Idle, .. })
        ));
        assert!(nav.preview().is_none());
    }
}
