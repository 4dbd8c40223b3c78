// 🗃️ Session State - the server-side home of everything the UI manipulates
// One session per server process: the ingested coin table, column mapping,
// edge mode, filters, selection-hiding, colors and layout choices. Views are
// recomputed from this state on demand.

use crate::elements::{coin_elements, die_elements, enrich_images};
use crate::graph::{
    build_die_graph, coin_edges, connected_components, remove_duplicate_dies, DieRef, EdgeMode,
    ViewStats,
};
use crate::ingest::{count_rows, load_coin_table, truncate_csv, CoinTable, IngestError};
use crate::keys::normalize_key;
use crate::layouts::{build_layout, DEFAULT_LAYOUT};
use crate::styles::{base_stylesheet_coins, base_stylesheet_dies, color_rules, hiding_rules};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

// ============================================================================
// COLUMN MAPPING
// ============================================================================

pub const DEFAULT_FRONT_COLUMN: &str = "front die";
pub const DEFAULT_BACK_COLUMN: &str = "back die";
pub const DEFAULT_FRONT_IMG_COLUMN: &str = "front img";
pub const DEFAULT_BACK_IMG_COLUMN: &str = "back img";

/// The four column names the user maps before uploading. Empty fields fall
/// back to the defaults above.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnMapping {
    #[serde(default)]
    pub front: String,
    #[serde(default)]
    pub back: String,
    #[serde(default)]
    pub front_img: String,
    #[serde(default)]
    pub back_img: String,
}

/// Safe keys resolved from the mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedKeys {
    pub front: String,
    pub back: String,
    pub front_img: String,
    pub back_img: String,
}

impl ColumnMapping {
    pub fn keys(&self) -> MappedKeys {
        MappedKeys {
            front: resolve_or(&self.front, DEFAULT_FRONT_COLUMN),
            back: resolve_or(&self.back, DEFAULT_BACK_COLUMN),
            front_img: resolve_or(&self.front_img, DEFAULT_FRONT_IMG_COLUMN),
            back_img: resolve_or(&self.back_img, DEFAULT_BACK_IMG_COLUMN),
        }
    }
}

fn resolve_or(value: &str, default: &str) -> String {
    let name = value.trim();
    if name.is_empty() {
        normalize_key(default)
    } else {
        normalize_key(name)
    }
}

// ============================================================================
// VIEWS & STORES
// ============================================================================

/// The two graph views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Coins,
    Dies,
}

impl View {
    pub fn name(&self) -> &'static str {
        match self {
            View::Coins => "coins",
            View::Dies => "dies",
        }
    }
}

/// Selection-hidden nodes, per kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HiddenStore {
    pub coins: BTreeSet<String>,
    pub dies: Vec<DieRef>,
}

impl HiddenStore {
    pub fn is_empty(&self) -> bool {
        self.coins.is_empty() && self.dies.is_empty()
    }
}

/// Decision for an upload that exceeded the row limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmChoice {
    /// Load the whole file
    Full,
    /// Load only the first `row_limit` coins
    Reduced,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Accepted { rows: usize },
    ConfirmRequired { rows: usize },
}

// ============================================================================
// PAYLOADS
// ============================================================================

/// Everything the client needs to render one view.
#[derive(Debug, Clone, Serialize)]
pub struct ViewPayload {
    pub view: View,
    pub elements: Vec<Value>,
    pub stylesheet: Vec<Value>,
    pub layout: Value,
    pub stats: ViewStats,
    pub edge_mode: EdgeMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub raw: String,
    pub safe: String,
}

/// Dropdown contents: filterable attributes, color conditions, and the
/// header mapping for display.
#[derive(Debug, Clone, Serialize)]
pub struct OptionsPayload {
    pub attributes: BTreeMap<String, Vec<String>>,
    pub combinations: Vec<String>,
    pub columns: Vec<ColumnInfo>,
}

// ============================================================================
// SESSION
// ============================================================================

pub struct Session {
    pub row_limit: usize,
    pub table: Option<CoinTable>,
    pending_csv: Option<Vec<u8>>,
    pub mapping: ColumnMapping,
    pub edge_mode: EdgeMode,
    /// Attribute filters: safe key → values to hide
    pub filters: BTreeMap<String, Vec<String>>,
    pub hidden: HiddenStore,
    /// Scale die-view edge width by weight
    pub scale_edge_weight: bool,
    /// Color name → `attr=value` conditions
    pub color_selections: BTreeMap<String, Vec<String>>,
    /// User-added color names beyond the red/blue/green presets
    pub custom_colors: Vec<String>,
    pub layout_choices: BTreeMap<String, String>,
}

impl Session {
    pub fn new(row_limit: usize) -> Self {
        Session {
            row_limit,
            table: None,
            pending_csv: None,
            mapping: ColumnMapping::default(),
            edge_mode: EdgeMode::default(),
            filters: BTreeMap::new(),
            hidden: HiddenStore::default(),
            scale_edge_weight: true,
            color_selections: BTreeMap::new(),
            custom_colors: Vec::new(),
            layout_choices: BTreeMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // Upload gate
    // ------------------------------------------------------------------

    /// Take an uploaded CSV. Small files ingest immediately; files over the
    /// row limit are stashed until the user confirms full or reduced load.
    pub fn upload(&mut self, csv_bytes: Vec<u8>) -> Result<UploadOutcome, IngestError> {
        let rows = count_rows(&csv_bytes)?;
        if rows > self.row_limit {
            self.pending_csv = Some(csv_bytes);
            return Ok(UploadOutcome::ConfirmRequired { rows });
        }
        self.accept_csv(&csv_bytes)?;
        Ok(UploadOutcome::Accepted { rows })
    }

    /// Resolve a pending oversized upload. Returns None when nothing is
    /// pending.
    pub fn confirm_upload(
        &mut self,
        choice: ConfirmChoice,
    ) -> Result<Option<UploadOutcome>, IngestError> {
        let Some(pending) = self.pending_csv.take() else {
            return Ok(None);
        };
        let bytes = match choice {
            ConfirmChoice::Full => pending,
            ConfirmChoice::Reduced => truncate_csv(&pending, self.row_limit)?,
        };
        self.accept_csv(&bytes)?;
        let rows = self.table.as_ref().map(|t| t.len()).unwrap_or(0);
        Ok(Some(UploadOutcome::Accepted { rows }))
    }

    pub fn has_pending_upload(&self) -> bool {
        self.pending_csv.is_some()
    }

    fn accept_csv(&mut self, csv_bytes: &[u8]) -> Result<(), IngestError> {
        let table = load_coin_table(csv_bytes, None)?;
        self.table = Some(table);
        // A new coin list invalidates everything derived from the old one,
        // including an abandoned oversized upload still awaiting confirmation.
        // Custom color names survive; their selections do not.
        self.pending_csv = None;
        self.filters.clear();
        self.hidden = HiddenStore::default();
        self.color_selections.clear();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Selection hiding
    // ------------------------------------------------------------------

    /// Hide the given selection of the active view.
    pub fn hide_selection(&mut self, view: View, coin_ids: Vec<String>, dies: Vec<DieRef>) {
        match view {
            View::Coins => self.hidden.coins.extend(coin_ids),
            View::Dies => {
                let mut all = std::mem::take(&mut self.hidden.dies);
                all.extend(dies);
                self.hidden.dies = remove_duplicate_dies(all);
            }
        }
    }

    /// Hide everything in the active view that is visible but not selected.
    pub fn show_only_selection(&mut self, view: View, coin_ids: Vec<String>, dies: Vec<DieRef>) {
        match view {
            View::Coins => {
                let selected: BTreeSet<String> = coin_ids.into_iter().collect();
                let not_selected: Vec<String> = self
                    .filtered_coins()
                    .iter()
                    .map(|c| c.id.clone())
                    .filter(|id| !selected.contains(id))
                    .collect();
                self.hidden.coins.extend(not_selected);
            }
            View::Dies => {
                let selected: BTreeSet<String> = dies.into_iter().map(|d| d.id).collect();
                let graph = self.current_die_graph();
                let mut all = std::mem::take(&mut self.hidden.dies);
                for node in graph.nodes.values() {
                    if !selected.contains(&node.id) {
                        all.push(DieRef {
                            id: node.id.clone(),
                            typ: node.typ.clone(),
                        });
                    }
                }
                self.hidden.dies = remove_duplicate_dies(all);
            }
        }
    }

    pub fn reset_hidden(&mut self) {
        self.hidden = HiddenStore::default();
    }

    // ------------------------------------------------------------------
    // Derived views
    // ------------------------------------------------------------------

    /// Coins remaining after the attribute filters (selection-hiding is a
    /// stylesheet concern in the coin view and is not applied here).
    fn filtered_coins(&self) -> Vec<crate::ingest::Coin> {
        let Some(table) = &self.table else {
            return Vec::new();
        };
        table
            .coins
            .iter()
            .filter(|coin| {
                !self.filters.iter().any(|(attr, values)| {
                    let value = coin.attr(attr);
                    !value.is_empty() && values.iter().any(|v| v == value)
                })
            })
            .cloned()
            .collect()
    }

    fn current_die_graph(&self) -> crate::graph::DieGraph {
        let keys = self.mapping.keys();
        let coins = self.filtered_coins();
        let hidden_coins: HashSet<String> = self.hidden.coins.iter().cloned().collect();
        let hidden_dies: HashSet<String> =
            self.hidden.dies.iter().map(|d| d.id.clone()).collect();
        build_die_graph(
            &coins,
            &keys.front,
            &keys.back,
            &hidden_coins,
            &hidden_dies,
            &keys.front_img,
            &keys.back_img,
        )
    }

    /// Recompute a full view payload from the current state. None until a
    /// CSV has been ingested.
    pub fn compute_view(&self, view: View) -> Option<ViewPayload> {
        self.table.as_ref()?;
        let keys = self.mapping.keys();
        let coins = self.filtered_coins();
        let die_graph = self.current_die_graph();

        let color_pairs: Vec<(String, Vec<String>)> = self
            .color_selections
            .iter()
            .map(|(color, conds)| (color.clone(), conds.clone()))
            .collect();
        let generated = {
            let mut rules = color_rules(&color_pairs);
            let hidden_coins: Vec<String> = self.hidden.coins.iter().cloned().collect();
            rules.extend(hiding_rules(&self.filters, &hidden_coins, &self.hidden.dies));
            rules
        };

        let hidden_visible = coins
            .iter()
            .filter(|c| self.hidden.coins.contains(&c.id))
            .count();
        let visible_coins = coins.len() - hidden_visible;
        let stats = ViewStats {
            coins: visible_coins,
            dies: die_graph.nodes.len(),
            components: match view {
                View::Coins if visible_coins == 0 => 0,
                View::Coins => {
                    let edges = coin_edges(&coins, &keys.front, &keys.back, self.edge_mode);
                    connected_components(
                        coins.iter().map(|c| c.id.as_str()),
                        edges
                            .iter()
                            .map(|e| (e.source.as_str(), e.target.as_str())),
                    )
                }
                View::Dies => connected_components(
                    die_graph.nodes.keys().map(|k| k.as_str()),
                    die_graph
                        .edges
                        .keys()
                        .map(|(a, b)| (a.as_str(), b.as_str())),
                ),
            },
        };

        let (elements, stylesheet) = match view {
            View::Coins => {
                let edges = coin_edges(&coins, &keys.front, &keys.back, self.edge_mode);
                let base = coin_elements(&coins, &edges);
                let enriched = enrich_images(&coins, base, &keys.front_img, &keys.back_img);
                let mut stylesheet = base_stylesheet_coins(self.edge_mode);
                stylesheet.extend(generated);
                (enriched, stylesheet)
            }
            View::Dies => {
                let elements = die_elements(&die_graph);
                let mut stylesheet =
                    base_stylesheet_dies(self.scale_edge_weight, die_graph.max_edge_weight);
                stylesheet.extend(generated);
                (elements, stylesheet)
            }
        };

        let layout_name = self
            .layout_choices
            .get(view.name())
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_LAYOUT);

        Some(ViewPayload {
            view,
            elements,
            stylesheet,
            layout: build_layout(layout_name),
            stats,
            edge_mode: self.edge_mode,
        })
    }

    /// Dropdown options derived from the ingested table.
    pub fn options(&self) -> Option<OptionsPayload> {
        let table = self.table.as_ref()?;
        Some(OptionsPayload {
            attributes: table.attribute_values(),
            combinations: table.attribute_combinations(),
            columns: table
                .key_map
                .iter()
                .map(|(raw, safe)| ColumnInfo {
                    raw: raw.to_string(),
                    safe: safe.to_string(),
                })
                .collect(),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
