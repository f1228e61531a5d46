// src/navigation/map.rs
// Static node-graph map: junctions, pickup and dropoff bays connected by taped lines.
// Built in for the competition arena, or loaded and validated from YAML.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grabber::resistance::Reel;

/// Robot heading, indexed clockwise from north.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    /// North
    N,
    /// East
    E,
    /// South
    S,
    /// West
    W,
}

impl Orientation {
    /// Clockwise order, also the neighbor expansion order of the router
    pub const CLOCKWISE: [Orientation; 4] = [Orientation::N, Orientation::E, Orientation::S, Orientation::W];

    /// Position in the clockwise order
    pub fn index(self) -> usize {
        match self {
            Orientation::N => 0,
            Orientation::E => 1,
            Orientation::S => 2,
            Orientation::W => 3,
        }
    }

    /// Orientation at `index` mod 4
    pub fn from_index(index: usize) -> Self {
        Self::CLOCKWISE[index % 4]
    }

    /// Heading after a half turn
    pub fn opposite(self) -> Self {
        Self::from_index(self.index() + 2)
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Physical manoeuvre performed at a junction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JunctionCommand {
    /// Drive across the junction
    GoStraight,
    /// Quarter turn clockwise
    GoRight,
    /// Quarter turn anticlockwise
    GoLeft,
    /// Half turn on the spot
    UTurn,
}

/// A vertex of the map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Unique id, e.g. `J12`
    pub id: String,
    /// Neighbor per heading, indexed by `Orientation::index`
    pub edges: [Option<String>; 4],
    /// Heading of the edge that leads into this junction's delivery bay
    pub dropoff: Option<Orientation>,
}

impl Node {
    /// Neighbor reached by leaving along `heading`
    pub fn neighbor(&self, heading: Orientation) -> Option<&str> {
        self.edges[heading.index()].as_deref()
    }
}

/// First and last junction of the dropoff strip for one reel type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReelZone {
    /// Junction routed to after pickup
    pub entry: String,
    /// Junction the bay search runs towards
    pub end: String,
}

/// Map loading and validation errors
#[derive(Debug, Error)]
pub enum MapError {
    /// Two nodes share an id
    #[error("duplicate node id {0}")]
    DuplicateNode(String),
    /// An edge names a node that does not exist
    #[error("node {node} links to unknown node {neighbor}")]
    UnknownNeighbor {
        /// Node holding the edge
        node: String,
        /// Missing target
        neighbor: String,
    },
    /// A dropoff attribute names a heading with no edge
    #[error("node {node} has dropoff {edge} but no edge that way")]
    MissingDropoffEdge {
        /// Offending node
        node: String,
        /// Heading named by the attribute
        edge: Orientation,
    },
    /// Pickup bay or reel zone names a node that does not exist
    #[error("unknown node {0} referenced by map tables")]
    UnknownReference(String),
    /// One zone per reel type is required
    #[error("expected 4 reel zones, found {0}")]
    ReelZoneCount(usize),
    /// File could not be opened
    #[error("cannot read map: {0}")]
    Io(#[from] std::io::Error),
    /// YAML did not match the schema
    #[error("map parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// One node as written in a YAML map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(rename = "N", default)]
    pub n: Option<String>,
    #[serde(rename = "E", default)]
    pub e: Option<String>,
    #[serde(rename = "S", default)]
    pub s: Option<String>,
    #[serde(rename = "W", default)]
    pub w: Option<String>,
    #[serde(default)]
    pub dropoff: Option<Orientation>,
}

/// Serialized form of a complete map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapDefinition {
    /// Every node, in any order
    pub nodes: Vec<NodeSpec>,
    /// Pickup bays in registry order
    pub pickup_bays: Vec<String>,
    /// Zones for reel 0 to reel 3
    pub reel_zones: Vec<ReelZone>,
}

/// Validated, immutable map
#[derive(Debug, Clone)]
pub struct NodeMap {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    pickup_bays: Vec<String>,
    reel_zones: Vec<ReelZone>,
}

type NodeRow = (&'static str, [Option<&'static str>; 4], Option<Orientation>);

const STANDARD_NODES: &[NodeRow] = &[
    ("START_BOX", [Some("S"), None, None, None], None),
    ("S", [Some("J29"), None, None, None], None),
    ("J1", [Some("J2"), Some("D1"), Some("J27"), None], Some(Orientation::E)),
    ("J2", [Some("J3"), Some("D2"), Some("J1"), None], Some(Orientation::E)),
    ("J3", [Some("J4"), Some("D3"), Some("J2"), None], Some(Orientation::E)),
    ("J4", [Some("J5"), Some("D4"), Some("J3"), None], Some(Orientation::E)),
    ("J5", [Some("J6"), Some("D5"), Some("J4"), None], Some(Orientation::E)),
    ("J6", [Some("J36"), Some("D6"), Some("J5"), None], Some(Orientation::E)),
    ("J7", [Some("J8"), None, Some("J31"), Some("D7")], Some(Orientation::W)),
    ("J8", [Some("J9"), None, Some("J7"), Some("D8")], Some(Orientation::W)),
    ("J9", [Some("J10"), None, Some("J8"), Some("D9")], Some(Orientation::W)),
    ("J10", [Some("J11"), None, Some("J9"), Some("D10")], Some(Orientation::W)),
    ("J11", [Some("J12"), None, Some("J10"), Some("D11")], Some(Orientation::W)),
    ("J12", [Some("J37"), None, Some("J11"), Some("D12")], Some(Orientation::W)),
    ("J13", [Some("J14"), None, Some("J34"), Some("D13")], Some(Orientation::W)),
    ("J14", [Some("J15"), None, Some("J13"), Some("D14")], Some(Orientation::W)),
    ("J15", [Some("J16"), None, Some("J14"), Some("D15")], Some(Orientation::W)),
    ("J16", [Some("J17"), None, Some("J15"), Some("D16")], Some(Orientation::W)),
    ("J17", [Some("J18"), None, Some("J16"), Some("D17")], Some(Orientation::W)),
    ("J18", [None, None, Some("J17"), Some("D18")], Some(Orientation::W)),
    ("J19", [Some("J20"), Some("D19"), Some("J35"), None], Some(Orientation::E)),
    ("J20", [Some("J21"), Some("D20"), Some("J19"), None], Some(Orientation::E)),
    ("J21", [Some("J22"), Some("D21"), Some("J20"), None], Some(Orientation::E)),
    ("J22", [Some("J23"), Some("D22"), Some("J21"), None], Some(Orientation::E)),
    ("J23", [Some("J24"), Some("D23"), Some("J22"), None], Some(Orientation::E)),
    ("J24", [None, Some("D24"), Some("J23"), None], Some(Orientation::E)),
    ("J25", [None, Some("J33"), Some("J26"), Some("J32")], None),
    ("J26", [Some("J25"), Some("J35"), None, Some("J34")], None),
    ("J27", [Some("J1"), Some("J28"), Some("P1"), None], None),
    ("J28", [None, Some("J29"), Some("P2"), Some("J27")], None),
    ("J29", [None, Some("J30"), Some("S"), Some("J28")], None),
    ("J30", [None, Some("J31"), Some("P3"), Some("J29")], None),
    ("J31", [Some("J7"), None, Some("P4"), Some("J30")], None),
    ("J32", [None, Some("J25"), Some("J36"), None], None),
    ("J33", [None, None, Some("J37"), Some("J25")], None),
    ("J34", [Some("J13"), Some("J26"), None, None], None),
    ("J35", [Some("J19"), None, None, Some("J26")], None),
    ("J36", [Some("J32"), None, Some("J6"), None], None),
    ("J37", [Some("J33"), None, Some("J12"), None], None),
    ("P1", [Some("J27"), None, None, None], None),
    ("P2", [Some("J28"), None, None, None], None),
    ("P3", [Some("J30"), None, None, None], None),
    ("P4", [Some("J31"), None, None, None], None),
    ("D1", [None, None, None, Some("J1")], None),
    ("D2", [None, None, None, Some("J2")], None),
    ("D3", [None, None, None, Some("J3")], None),
    ("D4", [None, None, None, Some("J4")], None),
    ("D5", [None, None, None, Some("J5")], None),
    ("D6", [None, None, None, Some("J6")], None),
    ("D7", [None, Some("J7"), None, None], None),
    ("D8", [None, Some("J8"), None, None], None),
    ("D9", [None, Some("J9"), None, None], None),
    ("D10", [None, Some("J10"), None, None], None),
    ("D11", [None, Some("J11"), None, None], None),
    ("D12", [None, Some("J12"), None, None], None),
    ("D13", [None, Some("J13"), None, None], None),
    ("D14", [None, Some("J14"), None, None], None),
    ("D15", [None, Some("J15"), None, None], None),
    ("D16", [None, Some("J16"), None, None], None),
    ("D17", [None, Some("J17"), None, None], None),
    ("D18", [None, Some("J18"), None, None], None),
    ("D19", [None, None, None, Some("J19")], None),
    ("D20", [None, None, None, Some("J20")], None),
    ("D21", [None, None, None, Some("J21")], None),
    ("D22", [None, None, None, Some("J22")], None),
    ("D23", [None, None, None, Some("J23")], None),
    ("D24", [None, None, None, Some("J24")], None),
];

const STANDARD_PICKUP_BAYS: [&str; 4] = ["P1", "P2", "P3", "P4"];

const STANDARD_REEL_ZONES: [(&str, &str); 4] =
    [("J1", "J6"), ("J7", "J12"), ("J13", "J18"), ("J19", "J24")];

impl NodeMap {
    /// The competition arena
    pub fn standard() -> Self {
        let definition = MapDefinition {
            nodes: STANDARD_NODES
                .iter()
                .map(|(id, edges, dropoff)| {
                    let [n, e, s, w] = edges.map(|edge| edge.map(str::to_string));
                    NodeSpec {
                        id: id.to_string(),
                        n,
                        e,
                        s,
                        w,
                        dropoff: *dropoff,
                    }
                })
                .collect(),
            pickup_bays: STANDARD_PICKUP_BAYS.iter().map(|b| b.to_string()).collect(),
            reel_zones: STANDARD_REEL_ZONES
                .iter()
                .map(|(entry, end)| ReelZone {
                    entry: entry.to_string(),
                    end: end.to_string(),
                })
                .collect(),
        };
        // The built-in table is covered by `standard_map_is_valid`.
        Self::build(definition)
    }

    /// Load a map from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, MapError> {
        let file = File::open(path)?;
        let definition: MapDefinition = serde_yaml::from_reader(file)?;
        Self::from_definition(definition)
    }

    /// Validate a definition and build the map
    pub fn from_definition(definition: MapDefinition) -> Result<Self, MapError> {
        let mut seen = HashSet::new();
        for entry in &definition.nodes {
            if !seen.insert(entry.id.as_str()) {
                return Err(MapError::DuplicateNode(entry.id.clone()));
            }
        }
        for entry in &definition.nodes {
            let edges = [&entry.n, &entry.e, &entry.s, &entry.w];
            for neighbor in edges.into_iter().flatten() {
                if !seen.contains(neighbor.as_str()) {
                    return Err(MapError::UnknownNeighbor {
                        node: entry.id.clone(),
                        neighbor: neighbor.clone(),
                    });
                }
            }
            if let Some(edge) = entry.dropoff {
                if edges[edge.index()].is_none() {
                    return Err(MapError::MissingDropoffEdge {
                        node: entry.id.clone(),
                        edge,
                    });
                }
            }
        }
        if definition.reel_zones.len() != 4 {
            return Err(MapError::ReelZoneCount(definition.reel_zones.len()));
        }
        let referenced = definition
            .pickup_bays
            .iter()
            .chain(definition.reel_zones.iter().flat_map(|z| [&z.entry, &z.end]));
        for id in referenced {
            if !seen.contains(id.as_str()) {
                return Err(MapError::UnknownReference(id.clone()));
            }
        }
        Ok(Self::build(definition))
    }

    fn build(definition: MapDefinition) -> Self {
        let nodes: Vec<Node> = definition
            .nodes
            .into_iter()
            .map(|entry| Node {
                id: entry.id,
                edges: [entry.n, entry.e, entry.s, entry.w],
                dropoff: entry.dropoff,
            })
            .collect();
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.clone(), i))
            .collect();
        NodeMap {
            nodes,
            index,
            pickup_bays: definition.pickup_bays,
            reel_zones: definition.reel_zones,
        }
    }

    /// Look a node up by id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Neighbor of `id` along `heading`, `None` for unknown nodes or missing edges
    pub fn neighbor(&self, id: &str, heading: Orientation) -> Option<&str> {
        self.node(id).and_then(|node| node.neighbor(heading))
    }

    /// All nodes in definition order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Pickup bays in registry order
    pub fn pickup_bays(&self) -> &[String] {
        &self.pickup_bays
    }

    /// Dropoff strip for a reel type. Open circuit has none.
    pub fn reel_zone(&self, reel: Reel) -> Option<&ReelZone> {
        reel.index().and_then(|i| self.reel_zones.get(i))
    }
}
