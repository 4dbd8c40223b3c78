// 🎨 Stylesheet Builders - Cytoscape rules for both views
// Base looks per view, plus generated rules for hiding and coloring nodes

use crate::graph::{DieRef, EdgeMode};
use serde_json::{json, Value};
use std::collections::BTreeMap;

// ============================================================================
// ESCAPING
// ============================================================================

/// Escape a value for safe use inside a Cytoscape attribute selector.
/// Specials get a doubled backslash so one level survives JSON transport.
pub fn css_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\\\\\"),
            '"' | '\'' | '[' | ']' => {
                out.push_str("\\\\");
                out.push(ch);
            }
            other => out.push(other),
        }
    }
    out
}

// ============================================================================
// BASE STYLESHEETS
// ============================================================================

/// Base stylesheet for the coin view. The image rule depends on the edge
/// mode: front/back show that side, `both` prefers the split preview and
/// falls back to front, then back.
pub fn base_stylesheet_coins(edge_mode: EdgeMode) -> Vec<Value> {
    let mut styles = vec![
        json!({
            "selector": "node",
            "style": {
                "label": "data(label)",
                "width": 200,
                "height": 200,
                "border-width": 4,
                "border-color": "black",
            }
        }),
        json!({
            "selector": "edge",
            "style": {
                "label": "data(label)",
                "font-size": 12,
                "min-zoomed-font-size": 8,
                "text-rotation": "autorotate",
                "line-color": "black",
                "text-margin-y": -10,
                "width": 2,
            }
        }),
        // Emphasize the current selection
        json!({
            "selector": ":selected",
            "style": { "border-width": 8, "background-color": "#999" }
        }),
    ];

    match edge_mode {
        EdgeMode::Front => styles.push(image_rule("bg_front")),
        EdgeMode::Back => styles.push(image_rule("bg_back")),
        EdgeMode::Both => {
            // Lowest → highest priority; the later rule wins
            styles.push(image_rule("bg_back"));
            styles.push(image_rule("bg_front"));
            styles.push(image_rule("bg_split"));
        }
    }

    styles
}

fn image_rule(key: &str) -> Value {
    json!({
        "selector": format!("node[{}]", key),
        "style": {
            "background-image": format!("data({})", key),
            "background-fit": "contain",
            "background-clip": "node",
            "background-opacity": 1,
        }
    })
}

/// Base stylesheet for the die view. Edges are labeled with their weight;
/// when `scale_edge_weight` is set, edge width maps linearly up to the
/// graph's maximum weight.
pub fn base_stylesheet_dies(scale_edge_weight: bool, max_edge_weight: u32) -> Vec<Value> {
    let mut styles = vec![
        json!({ "selector": "node", "style": { "label": "data(label)" } }),
        json!({
            "selector": "edge",
            "style": {
                "label": "data(weight)",
                "font-size": 12,
                "min-zoomed-font-size": 8,
                "text-rotation": "autorotate",
                "line-color": "black",
                "text-margin-y": -15,
                "width": 2,
                "border-color": "black",
            }
        }),
        json!({
            "selector": "node[bg_die]",
            "style": {
                "background-image": "data(bg_die)",
                "background-fit": "cover",
                "background-opacity": 1,
                "width": 200,
                "height": 200,
                "border-width": 4,
                "text-background-color": "#ffffff",
                "text-background-opacity": 0.5,
                "text-background-shape": "round-rectangle",
            }
        }),
        json!({
            "selector": ":selected",
            "style": { "border-width": 8, "background-color": "#999" }
        }),
    ];

    if scale_edge_weight {
        styles.push(json!({
            "selector": "edge",
            "style": {
                "width": format!("mapData(weight, 0, {}, 1, 20)", max_edge_weight),
            }
        }));
    }

    styles
}

// ============================================================================
// GENERATED RULES
// ============================================================================

/// `display: none` rules for selection-hidden coins and dies plus the
/// attribute filters. Dies are matched through their role column so both
/// views hide consistently.
pub fn hiding_rules(
    filters: &BTreeMap<String, Vec<String>>,
    hidden_coins: &[String],
    hidden_dies: &[DieRef],
) -> Vec<Value> {
    let mut rules = Vec::new();

    for coin_id in hidden_coins {
        rules.push(json!({
            "selector": format!("node[id='{}']", css_escape(coin_id)),
            "style": { "display": "none" }
        }));
    }

    for die in hidden_dies {
        rules.push(json!({
            "selector": format!("node[{}='{}']", css_escape(&die.typ), css_escape(&die.id)),
            "style": { "display": "none" }
        }));
    }

    for (attr, values) in filters {
        for value in values {
            rules.push(json!({
                "selector": format!("node[{}='{}']", attr, css_escape(value)),
                "style": { "display": "none" }
            }));
        }
    }

    rules
}

/// Border-color rules. Each entry pairs a color with `attr=value` condition
/// strings; conditions conjoin into a single selector.
pub fn color_rules(selections: &[(String, Vec<String>)]) -> Vec<Value> {
    let mut rules = Vec::new();

    for (color, conditions) in selections {
        if color.is_empty() || conditions.is_empty() {
            continue;
        }
        let mut selector = String::from("node");
        for condition in conditions {
            if let Some((attr, value)) = condition.split_once('=') {
                selector.push_str(&format!("[{}='{}']", attr, css_escape(value)));
            }
        }
        rules.push(json!({
            "selector": selector,
            "style": { "border-color": color }
        }));
    }

    rules
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_escape() {
        assert_eq!(css_escape("plain"), "plain");
        assert_eq!(css_escape("a'b"), "a\\\\'b");
        assert_eq!(css_escape("x[1]"), "x\\\\[1\\\\]");
        assert_eq!(css_escape("a\\b"), "a\\\\\\\\b");
    }

    #[test]
    fn test_coin_stylesheet_image_rule_follows_mode() {
        let front = base_stylesheet_coins(EdgeMode::Front);
        assert!(front
            .iter()
            .any(|r| r["selector"] == "node[bg_front]"));
        assert!(!front.iter().any(|r| r["selector"] == "node[bg_split]"));

        let both = base_stylesheet_coins(EdgeMode::Both);
        let selectors: Vec<&str> = both
            .iter()
            .filter_map(|r| r["selector"].as_str())
            .collect();
        // Split preview must come last so it wins
        let split_pos = selectors.iter().position(|s| *s == "node[bg_split]");
        let front_pos = selectors.iter().position(|s| *s == "node[bg_front]");
        assert!(split_pos > front_pos);
    }

    #[test]
    fn test_die_stylesheet_weight_scaling() {
        let unscaled = base_stylesheet_dies(false, 0);
        assert_eq!(unscaled.len(), 4);

        let scaled = base_stylesheet_dies(true, 7);
        assert_eq!(scaled.len(), 5);
        assert_eq!(
            scaled[4]["style"]["width"],
            "mapData(weight, 0, 7, 1, 20)"
        );
    }

    #[test]
    fn test_hiding_rules() {
        let mut filters = BTreeMap::new();
        filters.insert("mint".to_string(), vec!["Rome".to_string()]);
        let hidden_coins = vec!["c1".to_string()];
        let hidden_dies = vec![DieRef {
            id: "F1".to_string(),
            typ: "front_die".to_string(),
        }];

        let rules = hiding_rules(&filters, &hidden_coins, &hidden_dies);
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0]["selector"], "node[id='c1']");
        assert_eq!(rules[1]["selector"], "node[front_die='F1']");
        assert_eq!(rules[2]["selector"], "node[mint='Rome']");
        assert!(rules.iter().all(|r| r["style"]["display"] == "none"));
    }

    #[test]
    fn test_color_rules_conjoin_conditions() {
        let selections = vec![
            (
                "red".to_string(),
                vec!["mint=Rome".to_string(), "metal=AR".to_string()],
            ),
            ("blue".to_string(), vec![]),
        ];
        let rules = color_rules(&selections);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0]["selector"], "node[mint='Rome'][metal='AR']");
        assert_eq!(rules[0]["style"]["border-color"], "red");
    }
}
