// DiVE - Die Vergleichs-Explorer Core Library
// Exposes all modules for use in the CLI, the web server, and tests

pub mod keys;
pub mod ingest;
pub mod graph;
pub mod elements;
pub mod styles;
pub mod layouts;
pub mod images;
pub mod session;
pub mod server;

// Re-export commonly used types
pub use keys::{normalize_key, KeyMap};
pub use ingest::{
    load_coin_table, count_rows, truncate_csv, decode_latin1,
    Coin, CoinTable, IngestError, DEFAULT_ROW_LIMIT,
};
pub use graph::{
    coin_edges, build_die_graph, connected_components, remove_duplicate_dies,
    CoinEdge, DieGraph, DieNode, DieRef, EdgeMode, ViewStats,
};
pub use elements::{coin_elements, die_elements, enrich_images, merge_split_url};
pub use styles::{
    base_stylesheet_coins, base_stylesheet_dies, color_rules, css_escape, hiding_rules,
};
pub use layouts::{build_layout, DEFAULT_LAYOUT, SUPPORTED_LAYOUTS};
pub use images::{bg_url_from_value, is_url, norm_path, proxify, ImageError, ImageMerger};
pub use session::{
    ColumnMapping, ConfirmChoice, HiddenStore, OptionsPayload, Session, UploadOutcome, View,
    ViewPayload,
};
pub use server::{run, ServerConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
