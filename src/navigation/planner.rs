// src/navigation/planner.rs
// Graph routing over the static map: breadth-first search for the fewest-hop path,
// then conversion of absolute headings into junction commands relative to the robot.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use log::debug;
use thiserror::Error;

use super::map::{JunctionCommand, NodeMap, Orientation};

/// Routing failures. Both variants mean no route exists for the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// Node id is not on the map
    #[error("unknown node {0}")]
    UnknownNode(String),
    /// No directed path between the nodes
    #[error("no path from {start} to {end}")]
    Unreachable {
        /// Requested start
        start: String,
        /// Requested destination
        end: String,
    },
}

/// Fewest-hop path through the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResult {
    /// Nodes from start to end inclusive
    pub nodes: Vec<String>,
    /// Heading taken to leave each node, one fewer than `nodes`
    pub moves: Vec<Orientation>,
}

/// Path converted into robot-relative commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directions {
    /// Heading after the last command
    pub final_orientation: Orientation,
    /// Nodes visited, excluding the start
    pub nodes: Vec<String>,
    /// One command per junction between the first node and the destination
    pub commands: Vec<JunctionCommand>,
}

impl Directions {
    /// Pairs each command with the node it leads to.
    pub fn into_route(self) -> Route {
        let steps = self
            .commands
            .into_iter()
            .zip(self.nodes.into_iter().skip(1))
            .map(|(command, node)| RouteStep { command, node })
            .collect();
        Route { steps }
    }
}

/// One junction of a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteStep {
    /// Manoeuvre at the junction
    pub command: JunctionCommand,
    /// Node reached after the manoeuvre
    pub node: String,
}

/// Commands still to execute, consumed one per junction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route {
    steps: VecDeque<RouteStep>,
}

impl Route {
    /// Take the next step, `None` once exhausted
    pub fn next_step(&mut self) -> Option<RouteStep> {
        self.steps.pop_front()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Router over a shared map.
#[derive(Debug, Clone)]
pub struct GraphRouter {
    map: Arc<NodeMap>,
}

impl GraphRouter {
    /// Creates a router for `map`.
    pub fn new(map: Arc<NodeMap>) -> Self {
        GraphRouter { map }
    }

    /// The map being routed over.
    pub fn map(&self) -> &NodeMap {
        &self.map
    }

    /// Breadth-first search from `start` to `end`.
    /// Neighbors are expanded in N, E, S, W order so ties resolve the same way every time.
    pub fn find_path(&self, start: &str, end: &str) -> Result<PathResult, RouteError> {
        for id in [start, end] {
            if !self.map.contains(id) {
                return Err(RouteError::UnknownNode(id.to_string()));
            }
        }
        if start == end {
            return Ok(PathResult {
                nodes: vec![start.to_string()],
                moves: Vec::new(),
            });
        }

        let mut queue = VecDeque::from([start]);
        let mut visited = HashSet::from([start]);
        let mut parent: HashMap<&str, (&str, Orientation)> = HashMap::new();

        while let Some(current) = queue.pop_front() {
            if current == end {
                break;
            }
            for heading in Orientation::CLOCKWISE {
                let Some(neighbor) = self.map.neighbor(current, heading) else {
                    continue;
                };
                if visited.insert(neighbor) {
                    parent.insert(neighbor, (current, heading));
                    queue.push_back(neighbor);
                }
            }
        }

        if !parent.contains_key(end) {
            return Err(RouteError::Unreachable {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        let mut nodes = vec![end.to_string()];
        let mut moves = Vec::new();
        let mut cursor = end;
        while let Some(&(previous, heading)) = parent.get(cursor) {
            moves.push(heading);
            nodes.push(previous.to_string());
            cursor = previous;
        }
        nodes.reverse();
        moves.reverse();
        Ok(PathResult { nodes, moves })
    }

    /// Command needed to leave a junction along `target` while facing `current`.
    pub fn compute_turn(current: Orientation, target: Orientation) -> (JunctionCommand, Orientation) {
        let diff = (target.index() + 4 - current.index()) % 4;
        match diff {
            0 => (JunctionCommand::GoStraight, current),
            1 => (JunctionCommand::GoRight, target),
            2 => (JunctionCommand::UTurn, target),
            _ => (JunctionCommand::GoLeft, target),
        }
    }

    /// Junction commands from `start` to `end`.
    ///
    /// The robot is assumed to be at `start` already heading along the first edge, so the
    /// first move only fixes the departure and produces no command.
    pub fn get_directions(
        &self,
        start: &str,
        end: &str,
        start_orientation: Orientation,
    ) -> Result<Directions, RouteError> {
        let path = self.find_path(start, end)?;
        debug!("Router: moves {:?}", path.moves);

        let mut orientation = start_orientation;
        let mut commands = Vec::with_capacity(path.moves.len().saturating_sub(1));
        for &heading in path.moves.iter().skip(1) {
            let (command, next) = Self::compute_turn(orientation, heading);
            debug!("Router: {} -> {} gives {:?}", orientation, heading, command);
            commands.push(command);
            orientation = next;
        }

        Ok(Directions {
            final_orientation: orientation,
            nodes: path.nodes.into_iter().skip(1).collect(),
            commands,
        })
    }

    /// Number of nodes visited travelling from `start` to `end`.
    pub fn hop_count(&self, start: &str, end: &str) -> Result<usize, RouteError> {
        self.find_path(start, end).map(|path| path.nodes.len() - 1)
    }
}
