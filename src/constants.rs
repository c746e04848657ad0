/// Setlist.fm API and on-disk naming constants shared across the harvester.

// Remote API
pub const SETLISTFM_API_BASE: &str = "https://api.setlist.fm/rest/1.0";

/// The attended listing always pages in blocks of this many items; fewer means last page.
pub const PAGE_SIZE: usize = 20;

/// Newest pages re-fetched on every delta run so upstream edits near the top are seen.
pub const DEFAULT_REFRESH_PAGES: u32 = 3;

pub const DEFAULT_LOCALE: &str = "en";

// Rate-limit backoff
pub const BACKOFF_BASE_MS: u64 = 500;
pub const BACKOFF_CAP_MS: u64 = 30_000;

/// Version stamped into every persisted document.
pub const SCHEMA_VERSION: u32 = 1;

// Environment variables
pub const ENV_API_KEY: &str = "SETLISTFM_API_KEY";
pub const ENV_USERNAME: &str = "SETLISTFM_USERNAME";
pub const ENV_LOCALE: &str = "SETLISTFM_LOCALE";
pub const ENV_FULL_RESCAN: &str = "SETLISTFM_FULL_RESCAN";
pub const ENV_REFRESH_PAGES: &str = "SETLISTFM_REFRESH_PAGES";
pub const ENV_API_BASE: &str = "SETLISTFM_API_BASE";
pub const ENV_INCLUDE_FESTIVAL: &str = "SETLISTFM_INCLUDE_FESTIVAL";
pub const ENV_MAX_RETRIES: &str = "SETLISTFM_MAX_RETRIES";
pub const ENV_OUT_DIR: &str = "SETLISTFM_OUT_DIR";

// Output layout
pub const DEFAULT_OUT_DIR: &str = "./_data";
pub const INDEX_FILE: &str = "setlists.attended.index.json";
pub const ROLLUP_FILE: &str = "setlists.attended.json";
pub const DETAIL_DIR: &str = "setlists.attended.detail";
pub const VIEWS_FILE: &str = "setlists.views.json";

/// Rollup bucket for records without a country code.
pub const UNKNOWN_COUNTRY: &str = "??";
