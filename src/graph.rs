// 🪙 Graph Engine - coin graph and die graph construction
// Coin view: nodes are coins, edges mean shared dies.
// Die view: nodes are dies, edges mean "struck together", weighted by coin count.

use crate::images::bg_url_from_value;
use crate::ingest::Coin;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

// ============================================================================
// EDGE MODE
// ============================================================================

/// Which die attributes connect two coins in the coin view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EdgeMode {
    #[default]
    Front,
    Back,
    Both,
}

impl EdgeMode {
    pub fn name(&self) -> &'static str {
        match self {
            EdgeMode::Front => "front",
            EdgeMode::Back => "back",
            EdgeMode::Both => "both",
        }
    }
}

// ============================================================================
// COIN GRAPH
// ============================================================================

/// An undirected edge between two coins that share a die.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinEdge {
    pub source: String,
    pub target: String,
    /// `same_front`, `same_back` or `same_front_back`
    pub kind: String,
    /// The shared die (or `front/back` pair) shown as the edge label
    pub label: String,
}

/// Compare every unordered coin pair on the mapped die attributes and emit
/// an edge where the mode's condition holds. Empty die cells never match.
pub fn coin_edges(coins: &[Coin], front_key: &str, back_key: &str, mode: EdgeMode) -> Vec<CoinEdge> {
    let mut edges = Vec::new();

    for i in 0..coins.len() {
        let front_u = coins[i].attr(front_key);
        let back_u = coins[i].attr(back_key);

        for j in (i + 1)..coins.len() {
            let front_v = coins[j].attr(front_key);
            let back_v = coins[j].attr(back_key);

            let edge = match mode {
                EdgeMode::Front if !front_u.is_empty() && front_u == front_v => Some(CoinEdge {
                    source: coins[i].id.clone(),
                    target: coins[j].id.clone(),
                    kind: "same_front".to_string(),
                    label: front_u.to_string(),
                }),
                EdgeMode::Back if !back_u.is_empty() && back_u == back_v => Some(CoinEdge {
                    source: coins[i].id.clone(),
                    target: coins[j].id.clone(),
                    kind: "same_back".to_string(),
                    label: back_u.to_string(),
                }),
                EdgeMode::Both
                    if !front_u.is_empty()
                        && !back_u.is_empty()
                        && front_u == front_v
                        && back_u == back_v =>
                {
                    Some(CoinEdge {
                        source: coins[i].id.clone(),
                        target: coins[j].id.clone(),
                        kind: "same_front_back".to_string(),
                        label: format!("{}/{}", front_u, back_v),
                    })
                }
                _ => None,
            };

            if let Some(edge) = edge {
                edges.push(edge);
            }
        }
    }

    edges
}

// ============================================================================
// DIE GRAPH
// ============================================================================

/// A die node: its role column, the coins struck with it, and an optional
/// background image adopted from the first coin that carried one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DieNode {
    pub id: String,
    /// Safe key of the column this die came from (front or back role)
    pub typ: String,
    pub coin_ids: BTreeSet<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DieGraph {
    pub nodes: BTreeMap<String, DieNode>,
    /// Undirected edges keyed by the ordered die-id pair, weight = coin count
    pub edges: BTreeMap<(String, String), u32>,
    pub max_edge_weight: u32,
}

impl DieGraph {
    fn touch_node(&mut self, die: &str, typ: &str, coin_id: &str, image_value: &str) {
        let node = self.nodes.entry(die.to_string()).or_insert_with(|| DieNode {
            id: die.to_string(),
            typ: typ.to_string(),
            coin_ids: BTreeSet::new(),
            image: None,
        });
        node.coin_ids.insert(coin_id.to_string());
        // Assign an image once, from the first coin that has one
        if node.image.is_none() {
            node.image = bg_url_from_value(image_value);
        }
    }

    fn add_pairing(&mut self, front: &str, back: &str) {
        let key = if front <= back {
            (front.to_string(), back.to_string())
        } else {
            (back.to_string(), front.to_string())
        };
        let weight = self.edges.entry(key).or_insert(0);
        *weight += 1;
        if *weight > self.max_edge_weight {
            self.max_edge_weight = *weight;
        }
    }

    /// `",id1,id2,…,"` — comma-delimited so selectors can substring-match ids.
    pub fn coin_ids_string(node: &DieNode) -> String {
        let mut out = String::from(",");
        for id in &node.coin_ids {
            out.push_str(id);
            out.push(',');
        }
        out
    }
}

/// Build the die graph from the visible coins, skipping hidden coins and
/// hidden dies. Every coin contributes its front and back die node; a coin
/// carrying both adds (or reweights) the edge between them.
pub fn build_die_graph(
    coins: &[Coin],
    front_key: &str,
    back_key: &str,
    hidden_coins: &HashSet<String>,
    hidden_dies: &HashSet<String>,
    front_img_key: &str,
    back_img_key: &str,
) -> DieGraph {
    let mut graph = DieGraph::default();

    for coin in coins {
        if hidden_coins.contains(&coin.id) {
            continue;
        }
        let front = coin.attr(front_key);
        let back = coin.attr(back_key);
        let skip_front = front.is_empty() || hidden_dies.contains(front);
        let skip_back = back.is_empty() || hidden_dies.contains(back);

        if !skip_front {
            graph.touch_node(front, front_key, &coin.id, coin.attr(front_img_key));
        }
        if !skip_back {
            graph.touch_node(back, back_key, &coin.id, coin.attr(back_img_key));
        }
        if !skip_front && !skip_back {
            graph.add_pairing(front, back);
        }
    }

    graph
}

// ============================================================================
// HIDDEN DIES
// ============================================================================

/// A die reference in the hidden store: id plus the role column it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieRef {
    pub id: String,
    pub typ: String,
}

/// Drop duplicate (id, typ) pairs, keeping the last occurrence's order stable
/// by first appearance.
pub fn remove_duplicate_dies(dies: Vec<DieRef>) -> Vec<DieRef> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for die in dies {
        if seen.insert((die.id.clone(), die.typ.clone())) {
            unique.push(die);
        }
    }
    unique
}

// ============================================================================
// CONNECTED COMPONENTS & STATS
// ============================================================================

/// Count connected components over explicit node ids and undirected edges.
/// Isolated nodes count as their own component.
pub fn connected_components<'a, N, E>(node_ids: N, edge_pairs: E) -> usize
where
    N: IntoIterator<Item = &'a str>,
    E: IntoIterator<Item = (&'a str, &'a str)>,
{
    let nodes: Vec<&str> = node_ids.into_iter().collect();
    let mut adjacency: HashMap<&str, Vec<&str>> = nodes.iter().map(|&n| (n, Vec::new())).collect();
    for (u, v) in edge_pairs {
        // Edges referencing unknown nodes are ignored
        if adjacency.contains_key(u) && adjacency.contains_key(v) {
            adjacency.get_mut(u).unwrap().push(v);
            adjacency.get_mut(v).unwrap().push(u);
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut components = 0;
    for &start in &nodes {
        if seen.contains(start) {
            continue;
        }
        components += 1;
        let mut queue = VecDeque::from([start]);
        seen.insert(start);
        while let Some(current) = queue.pop_front() {
            for &next in &adjacency[current] {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }
    components
}

/// The numbers shown in the sidebar stats box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewStats {
    pub coins: usize,
    pub dies: usize,
    pub components: usize,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn coin(id: &str, front: &str, back: &str) -> Coin {
        let mut attrs = BTreeMap::new();
        attrs.insert("front_die".to_string(), front.to_string());
        attrs.insert("back_die".to_string(), back.to_string());
        attrs.insert("front_img".to_string(), String::new());
        attrs.insert("back_img".to_string(), String::new());
        Coin {
            id: id.to_string(),
            attrs,
        }
    }

    #[test]
    fn test_front_mode_edges() {
        let coins = vec![coin("c1", "F1", "B1"), coin("c2", "F1", "B2"), coin("c3", "F2", "B2")];
        let edges = coin_edges(&coins, "front_die", "back_die", EdgeMode::Front);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, "c1");
        assert_eq!(edges[0].target, "c2");
        assert_eq!(edges[0].kind, "same_front");
        assert_eq!(edges[0].label, "F1");
    }

    #[test]
    fn test_back_mode_edges() {
        let coins = vec![coin("c1", "F1", "B1"), coin("c2", "F1", "B2"), coin("c3", "F2", "B2")];
        let edges = coin_edges(&coins, "front_die", "back_die", EdgeMode::Back);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, "c2");
        assert_eq!(edges[0].target, "c3");
        assert_eq!(edges[0].kind, "same_back");
    }

    #[test]
    fn test_both_mode_requires_both_dies() {
        let coins = vec![coin("c1", "F1", "B1"), coin("c2", "F1", "B1"), coin("c3", "F1", "B2")];
        let edges = coin_edges(&coins, "front_die", "back_die", EdgeMode::Both);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].label, "F1/B1");
        assert_eq!(edges[0].kind, "same_front_back");
    }

    #[test]
    fn test_empty_die_never_matches() {
        let coins = vec![coin("c1", "", "B1"), coin("c2", "", "B1")];
        assert!(coin_edges(&coins, "front_die", "back_die", EdgeMode::Front).is_empty());
        // Both mode also refuses when one side is empty
        assert!(coin_edges(&coins, "front_die", "back_die", EdgeMode::Both).is_empty());
    }

    #[test]
    fn test_die_graph_nodes_and_weights() {
        let coins = vec![coin("c1", "F1", "B1"), coin("c2", "F1", "B1"), coin("c3", "F1", "B2")];
        let graph = build_die_graph(
            &coins,
            "front_die",
            "back_die",
            &HashSet::new(),
            &HashSet::new(),
            "front_img",
            "back_img",
        );

        assert_eq!(graph.nodes.len(), 3); // F1, B1, B2
        assert_eq!(graph.nodes["F1"].coin_ids.len(), 3);
        assert_eq!(graph.nodes["F1"].typ, "front_die");
        assert_eq!(graph.nodes["B2"].typ, "back_die");

        let w_f1_b1 = graph.edges[&("B1".to_string(), "F1".to_string())];
        assert_eq!(w_f1_b1, 2);
        assert_eq!(graph.max_edge_weight, 2);
    }

    #[test]
    fn test_die_graph_skips_hidden() {
        let coins = vec![coin("c1", "F1", "B1"), coin("c2", "F2", "B1")];
        let hidden_coins: HashSet<String> = ["c1".to_string()].into_iter().collect();
        let hidden_dies: HashSet<String> = ["F2".to_string()].into_iter().collect();
        let graph = build_die_graph(
            &coins,
            "front_die",
            "back_die",
            &hidden_coins,
            &hidden_dies,
            "front_img",
            "back_img",
        );

        // c1 hidden entirely, F2 hidden as a die; only B1 from c2 remains
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.nodes.contains_key("B1"));
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_die_graph_image_assigned_once() {
        let mut c1 = coin("c1", "F1", "B1");
        c1.attrs
            .insert("front_img".to_string(), "pics/a.png".to_string());
        let mut c2 = coin("c2", "F1", "B2");
        c2.attrs
            .insert("front_img".to_string(), "pics/b.png".to_string());

        let graph = build_die_graph(
            &[c1, c2],
            "front_die",
            "back_die",
            &HashSet::new(),
            &HashSet::new(),
            "front_img",
            "back_img",
        );
        assert_eq!(
            graph.nodes["F1"].image.as_deref(),
            Some("/assets/pics/a.png")
        );
    }

    #[test]
    fn test_coin_ids_string_delimited() {
        let coins = vec![coin("c1", "F1", "B1"), coin("c2", "F1", "B2")];
        let graph = build_die_graph(
            &coins,
            "front_die",
            "back_die",
            &HashSet::new(),
            &HashSet::new(),
            "front_img",
            "back_img",
        );
        assert_eq!(DieGraph::coin_ids_string(&graph.nodes["F1"]), ",c1,c2,");
    }

    #[test]
    fn test_remove_duplicate_dies() {
        let dies = vec![
            DieRef { id: "F1".into(), typ: "front_die".into() },
            DieRef { id: "F1".into(), typ: "front_die".into() },
            DieRef { id: "F1".into(), typ: "back_die".into() },
        ];
        let unique = remove_duplicate_dies(dies);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].typ, "front_die");
        assert_eq!(unique[1].typ, "back_die");
    }

    #[test]
    fn test_connected_components() {
        let nodes = ["a", "b", "c", "d"];
        let edges = [("a", "b")];
        assert_eq!(connected_components(nodes, edges), 3);
        assert_eq!(
            connected_components(["a", "b", "c"], [("a", "b"), ("b", "c")]),
            1
        );
        assert_eq!(
            connected_components(Vec::<&str>::new(), Vec::<(&str, &str)>::new()),
            0
        );
    }
}
