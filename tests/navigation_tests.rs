mod common;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use agv_core::core::{BayOccupancySampler, Timestamp};
use agv_core::hardware::{Bench, SensorSide};
use agv_core::navigation::{
    DropoffState, GraphRouter, JunctionCommand, MotionController, NavigationError, Navigator,
    NodeMap, Orientation, PathFollowingState, RouteError,
};
use common::{t, test_config, Track, STEP_MS};
use rstest::rstest;

fn navigator(bench: &Bench) -> Navigator {
    let config = test_config();
    let motion = MotionController::new(
        &config.motion,
        Box::new(bench.drive()),
        Box::new(bench.line_sensors()),
    );
    let sampler = BayOccupancySampler::new(&config.occupancy, Box::new(bench.distance()));
    Navigator::new(
        &config.navigation,
        GraphRouter::new(Arc::new(NodeMap::standard())),
        motion,
        sampler,
    )
}

/// Runs the control loop until `done` holds, returning the junction commands issued.
fn drive_until(
    bench: &Bench,
    nav: &mut Navigator,
    start_ms: u32,
    done: impl Fn(&Navigator) -> bool,
) -> Result<Vec<JunctionCommand>, NavigationError> {
    let mut track = Track::new();
    let mut issued = Vec::new();
    let mut pending = None;
    let mut now_ms = start_ms;
    for _ in 0..20_000 {
        let now: Timestamp = t(now_ms);
        bench.set_line(track.frame(nav.motion(), now));
        nav.motion_mut().tick(now);
        nav.tick(now)?;

        let turn = nav.motion().pending_turn();
        if turn.is_some() && turn != pending {
            issued.extend(turn);
        }
        pending = turn;
        if done(nav) {
            return Ok(issued);
        }
        now_ms += STEP_MS;
    }
    panic!("navigation never finished");
}

#[test]
fn drives_from_s_to_p2() {
    let bench = Bench::new();
    let mut nav = navigator(&bench);
    nav.set_route("P2", Some("S"), Some(Orientation::N), t(0)).unwrap();

    let issued = drive_until(&bench, &mut nav, STEP_MS, |nav| {
        nav.path_state() == PathFollowingState::Complete
    })
    .unwrap();

    assert_eq!(issued, vec![JunctionCommand::GoLeft, JunctionCommand::GoLeft]);
    assert_eq!(nav.current_node(), "P2");
    assert_eq!(nav.current_orientation(), Orientation::S);
    assert!(bench.motors_stopped());
}

#[test]
fn reverses_out_of_a_pickup_bay_to_a_zone() {
    let bench = Bench::new();
    let mut nav = navigator(&bench);
    nav.set_route("J7", Some("P2"), Some(Orientation::S), t(0)).unwrap();
    assert!(nav.motion().is_reversing());

    let issued = drive_until(&bench, &mut nav, STEP_MS, |nav| {
        nav.path_state() == PathFollowingState::Complete
    })
    .unwrap();

    use JunctionCommand::*;
    assert_eq!(issued, vec![GoLeft, GoStraight, GoStraight, GoLeft]);
    assert_eq!(nav.current_orientation(), Orientation::N);
}

#[test]
fn skips_an_occupied_bay_and_takes_the_next() {
    let bench = Bench::new();
    bench.set_default_distance(Some(900));
    bench.push_distances(SensorSide::Left, [Some(120); 5]);
    let mut nav = navigator(&bench);
    nav.place("J7", Orientation::N);
    nav.start_dropoff("J12");

    let issued = drive_until(&bench, &mut nav, 0, |nav| {
        nav.dropoff_state() == DropoffState::Complete
    })
    .unwrap();

    assert_eq!(issued, vec![JunctionCommand::GoStraight, JunctionCommand::GoLeft]);
    assert!(!nav.delivered().contains("J7"));
    assert!(nav.delivered().contains("J8"));
    assert_eq!(nav.current_node(), "D8");
    assert_eq!(nav.current_orientation(), Orientation::W);
    assert!(bench.motors_stopped());
}

#[test]
fn unknown_destination_is_reported() {
    let bench = Bench::new();
    let mut nav = navigator(&bench);
    let err = nav.set_route("J99", Some("S"), None, t(0)).unwrap_err();
    assert!(matches!(err, NavigationError::Route(RouteError::UnknownNode(id)) if id == "J99"));
}

// Plain breadth-first distances over the map, independent of the router.
fn distances_from(map: &NodeMap, start: &str) -> HashMap<String, usize> {
    let mut distances = HashMap::from([(start.to_string(), 0)]);
    let mut queue = VecDeque::from([start.to_string()]);
    while let Some(current) = queue.pop_front() {
        let here = distances[&current];
        let Some(node) = map.node(&current) else { continue };
        for neighbor in node.edges.iter().flatten() {
            if !distances.contains_key(neighbor) {
                distances.insert(neighbor.clone(), here + 1);
                queue.push_back(neighbor.clone());
            }
        }
    }
    distances
}

#[test]
fn hop_counts_are_shortest_paths() {
    let map = Arc::new(NodeMap::standard());
    let router = GraphRouter::new(map.clone());
    for start in map.nodes() {
        let expected = distances_from(&map, &start.id);
        for end in map.nodes() {
            match (router.hop_count(&start.id, &end.id), expected.get(&end.id)) {
                (Ok(hops), Some(&shortest)) => assert_eq!(hops, shortest, "{} -> {}", start.id, end.id),
                (Err(RouteError::Unreachable { .. }), None) => {}
                (got, want) => panic!("{} -> {}: router {:?}, bfs {:?}", start.id, end.id, got, want),
            }
        }
    }
}

#[rstest]
#[case("S", "P2", 3)]
#[case("P2", "P1", 3)]
#[case("P4", "J7", 2)]
fn known_hop_counts(#[case] start: &str, #[case] end: &str, #[case] hops: usize) {
    let router = GraphRouter::new(Arc::new(NodeMap::standard()));
    assert_eq!(router.hop_count(start, end), Ok(hops));
}
