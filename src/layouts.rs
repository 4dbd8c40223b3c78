// 🗺️ Layout Configurations - per-layout tuning for the Cytoscape client
// Each supported layout gets sensible defaults; unknown names pass through
// with only the base keys.

use serde_json::{json, Value};

pub const SUPPORTED_LAYOUTS: &[&str] = &[
    "cose",
    "cose-bilkent",
    "dagre",
    "klay",
    "grid",
    "circle",
    "concentric",
];

pub const DEFAULT_LAYOUT: &str = "dagre";

/// Build the layout configuration object for a layout name.
pub fn build_layout(name: &str) -> Value {
    let mut layout = json!({ "name": name, "fit": true, "padding": 30 });
    let extra = layout.as_object_mut().expect("layout is an object");

    match name {
        "concentric" => {
            extra.insert("minNodeSpacing".to_string(), json!(30));
        }
        "grid" | "circle" => {
            extra.insert("avoidOverlap".to_string(), json!(true));
        }
        "cose" => {
            extra.insert("randomize".to_string(), json!(false));
        }
        "cose-bilkent" => {
            extra.insert("randomize".to_string(), json!(false));
            extra.insert("idealEdgeLength".to_string(), json!(240));
            extra.insert("edgeElasticity".to_string(), json!(0.45));
            extra.insert("nodeRepulsion".to_string(), json!(12000));
            extra.insert("nestingFactor".to_string(), json!(0.1));
            extra.insert("gravity".to_string(), json!(0.25));
            extra.insert("numIter".to_string(), json!(2500));
            extra.insert("tile".to_string(), json!(true));
            extra.insert("tilingPaddingVertical".to_string(), json!(20));
            extra.insert("tilingPaddingHorizontal".to_string(), json!(20));
            extra.insert("gravityRange".to_string(), json!(3.8));
            extra.insert("gravityCompound".to_string(), json!(1.0));
            extra.insert("gravityRangeCompound".to_string(), json!(3.0));
            extra.insert("animate".to_string(), json!(false));
        }
        "dagre" => {
            // Left→right ranks suit die chains
            extra.insert("rankDir".to_string(), json!("LR"));
            extra.insert("rankSep".to_string(), json!(180));
            extra.insert("nodeSep".to_string(), json!(60));
            extra.insert("edgeSep".to_string(), json!(20));
            extra.insert("ranker".to_string(), json!("network-simplex"));
            extra.insert("animate".to_string(), json!(false));
        }
        "klay" => {
            extra.insert("animate".to_string(), json!(false));
            extra.insert(
                "klay".to_string(),
                json!({
                    "direction": "RIGHT",
                    "nodePlacement": "LINEAR_SEGMENTS",
                    "edgeRouting": "ORTHOGONAL",
                    "spacing": 60,
                    "borderSpacing": 20,
                    "crossingMinimization": "LAYER_SWEEP",
                }),
            );
        }
        _ => {}
    }

    layout
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_keys_always_present() {
        for name in SUPPORTED_LAYOUTS {
            let layout = build_layout(name);
            assert_eq!(layout["name"], *name);
            assert_eq!(layout["fit"], true);
            assert_eq!(layout["padding"], 30);
        }
    }

    #[test]
    fn test_dagre_defaults() {
        let layout = build_layout("dagre");
        assert_eq!(layout["rankDir"], "LR");
        assert_eq!(layout["ranker"], "network-simplex");
        assert_eq!(layout["rankSep"], 180);
    }

    #[test]
    fn test_unknown_layout_passes_through() {
        let layout = build_layout("breadthfirst");
        assert_eq!(layout["name"], "breadthfirst");
        assert!(layout.get("rankDir").is_none());
    }
}
