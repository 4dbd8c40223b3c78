// 🧩 Cytoscape Elements - graph structures → the element lists the client renders
// Every element is `{"data": {...}}`; nodes carry id/label plus attributes,
// edges carry source/target plus attributes.

use crate::graph::{CoinEdge, DieGraph};
use crate::images::bg_url_from_value;
use crate::ingest::Coin;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Element list for the coin view (no background images yet).
pub fn coin_elements(coins: &[Coin], edges: &[CoinEdge]) -> Vec<Value> {
    let mut elements = Vec::with_capacity(coins.len() + edges.len());

    for coin in coins {
        let mut data = Map::new();
        data.insert("id".to_string(), Value::String(coin.id.clone()));
        data.insert("label".to_string(), Value::String(coin.id.clone()));
        for (key, value) in &coin.attrs {
            data.insert(key.clone(), Value::String(value.clone()));
        }
        elements.push(json!({ "data": data }));
    }

    for edge in edges {
        elements.push(json!({
            "data": {
                "source": edge.source,
                "target": edge.target,
                "attr": edge.kind,
                "label": edge.label,
            }
        }));
    }

    elements
}

/// Element list for the die view.
pub fn die_elements(graph: &DieGraph) -> Vec<Value> {
    let mut elements = Vec::with_capacity(graph.nodes.len() + graph.edges.len());

    for node in graph.nodes.values() {
        let mut data = Map::new();
        data.insert("id".to_string(), Value::String(node.id.clone()));
        data.insert("label".to_string(), Value::String(node.id.clone()));
        data.insert("typ".to_string(), Value::String(node.typ.clone()));
        data.insert(
            "coin_ids".to_string(),
            Value::Array(
                node.coin_ids
                    .iter()
                    .map(|id| Value::String(id.clone()))
                    .collect(),
            ),
        );
        data.insert(
            "coin_ids_string".to_string(),
            Value::String(DieGraph::coin_ids_string(node)),
        );
        if let Some(image) = &node.image {
            data.insert("bg_die".to_string(), Value::String(image.clone()));
        }
        elements.push(json!({ "data": data }));
    }

    for ((source, target), weight) in &graph.edges {
        elements.push(json!({
            "data": {
                "source": source,
                "target": target,
                "weight": weight,
            }
        }));
    }

    elements
}

/// Add `bg_front` / `bg_back` background URLs to coin node elements, plus a
/// `bg_split` merge route when both sides have an image.
pub fn enrich_images(
    coins: &[Coin],
    elements: Vec<Value>,
    front_img_key: &str,
    back_img_key: &str,
) -> Vec<Value> {
    let mut urls_by_id: HashMap<&str, (Option<String>, Option<String>)> = HashMap::new();
    for coin in coins {
        urls_by_id.insert(
            coin.id.as_str(),
            (
                bg_url_from_value(coin.attr(front_img_key)),
                bg_url_from_value(coin.attr(back_img_key)),
            ),
        );
    }

    elements
        .into_iter()
        .map(|mut element| {
            let Some(id) = element
                .get("data")
                .and_then(|d| d.get("id"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
            else {
                return element; // edges pass through untouched
            };
            let Some((front_url, back_url)) = urls_by_id.get(id.as_str()) else {
                return element;
            };
            let data = element
                .get_mut("data")
                .and_then(|d| d.as_object_mut())
                .expect("coin element data is an object");

            if let Some(front) = front_url {
                data.insert("bg_front".to_string(), Value::String(front.clone()));
            }
            if let Some(back) = back_url {
                data.insert("bg_back".to_string(), Value::String(back.clone()));
            }
            if let (Some(front), Some(back)) = (front_url, back_url) {
                data.insert(
                    "bg_split".to_string(),
                    Value::String(merge_split_url(front, back, 200, 200)),
                );
            }
            element
        })
        .collect()
}

/// `/merge_split?w=…&h=…&front=…&back=…` with percent-encoded sources.
pub fn merge_split_url(front: &str, back: &str, w: u32, h: u32) -> String {
    format!(
        "/merge_split?w={}&h={}&front={}&back={}",
        w,
        h,
        urlencoding::encode(front),
        urlencoding::encode(back)
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_die_graph, coin_edges, EdgeMode};
    use std::collections::{BTreeMap, HashSet};

    fn coin(id: &str, front: &str, back: &str, front_img: &str, back_img: &str) -> Coin {
        let mut attrs = BTreeMap::new();
        attrs.insert("front_die".to_string(), front.to_string());
        attrs.insert("back_die".to_string(), back.to_string());
        attrs.insert("front_img".to_string(), front_img.to_string());
        attrs.insert("back_img".to_string(), back_img.to_string());
        Coin {
            id: id.to_string(),
            attrs,
        }
    }

    #[test]
    fn test_coin_elements_nodes_and_edges() {
        let coins = vec![
            coin("c1", "F1", "B1", "", ""),
            coin("c2", "F1", "B2", "", ""),
        ];
        let edges = coin_edges(&coins, "front_die", "back_die", EdgeMode::Front);
        let elements = coin_elements(&coins, &edges);

        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0]["data"]["id"], "c1");
        assert_eq!(elements[0]["data"]["label"], "c1");
        assert_eq!(elements[0]["data"]["front_die"], "F1");
        assert_eq!(elements[2]["data"]["source"], "c1");
        assert_eq!(elements[2]["data"]["attr"], "same_front");
        assert_eq!(elements[2]["data"]["label"], "F1");
    }

    #[test]
    fn test_die_elements_carry_weight_and_typ() {
        let coins = vec![
            coin("c1", "F1", "B1", "", ""),
            coin("c2", "F1", "B1", "", ""),
        ];
        let graph = build_die_graph(
            &coins,
            "front_die",
            "back_die",
            &HashSet::new(),
            &HashSet::new(),
            "front_img",
            "back_img",
        );
        let elements = die_elements(&graph);

        let nodes: Vec<&Value> = elements
            .iter()
            .filter(|e| e["data"].get("id").is_some())
            .collect();
        let edges: Vec<&Value> = elements
            .iter()
            .filter(|e| e["data"].get("source").is_some())
            .collect();

        assert_eq!(nodes.len(), 2);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0]["data"]["weight"], 2);

        let f1 = nodes.iter().find(|n| n["data"]["id"] == "F1").unwrap();
        assert_eq!(f1["data"]["typ"], "front_die");
        assert_eq!(f1["data"]["coin_ids_string"], ",c1,c2,");
    }

    #[test]
    fn test_enrich_images_adds_backgrounds() {
        let coins = vec![
            coin(
                "c1",
                "F1",
                "B1",
                "pics/front.png",
                "https://example.org/back.png",
            ),
            coin("c2", "F2", "B2", "", ""),
        ];
        let elements = coin_elements(&coins, &[]);
        let enriched = enrich_images(&coins, elements, "front_img", "back_img");

        let c1 = &enriched[0]["data"];
        assert_eq!(c1["bg_front"], "/assets/pics/front.png");
        assert_eq!(
            c1["bg_back"],
            "/img_proxy?url=https://example.org/back.png"
        );
        let split = c1["bg_split"].as_str().unwrap();
        assert!(split.starts_with("/merge_split?w=200&h=200&front="));

        // No image columns set → no bg_* fields
        let c2 = &enriched[1]["data"];
        assert!(c2.get("bg_front").is_none());
        assert!(c2.get("bg_split").is_none());
    }
}
