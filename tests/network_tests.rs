//! Network and composition tests
//!
//! Whole-tick behaviour: hand-offs, jams, light phasing and the 1/4/16
//! crossroad meshes.

use std::collections::HashSet;

use grid_traffic::simulation::{
    build_unit, compose, link, Block, CarId, GridPos, Layout, LightSchedule, Network,
    NetworkBuilder, PortLayout, SegmentKind, SimConfig, SimError, SpawnConfig, UnitConfig,
};

fn seeded(seed: u64) -> SimConfig {
    SimConfig {
        seed: Some(seed),
        shuffle: false,
        ..SimConfig::default()
    }
}

fn wired(network: &Network, from: &str, to: &str) -> bool {
    let (Some(a), Some(b)) = (network.segment_id(from), network.segment_id(to)) else {
        return false;
    };
    network.wires().iter().any(|w| w.from == a && w.to == b)
}

/// Every grid agrees with its registry and every vehicle is in exactly one place
fn assert_consistent(network: &Network) {
    let mut seen = HashSet::new();
    for segment in network.segments() {
        let held = segment.cars().len() + segment.arrivals().len();
        assert_eq!(
            segment.grid().occupied(),
            held,
            "grid and registry disagree on '{}' at tick {}",
            segment.name(),
            network.tick_count()
        );
        assert!(segment.grid().is_settled());
        for car in segment.cars().iter().chain(segment.arrivals()) {
            assert!(seen.insert(*car), "{} held twice", car);
        }
    }
    assert_eq!(
        network.live_cars() as u64 + network.completed(),
        network.spawned()
    );
}

/// One tick with the consistency check run on the freshly committed state
fn checked_tick(network: &mut Network) {
    network.move_phase();
    network.commit_phase();
    assert_consistent(network);
    network.transfer_phase().unwrap();
}

#[test]
fn test_registry_matches_grid_every_tick() {
    let unit = UnitConfig {
        length: 6,
        red: 4,
        green: 6,
        alternate_yield: true,
        spawn: Some(SpawnConfig {
            probability: 0.6,
            ..SpawnConfig::default()
        }),
        ..UnitConfig::default()
    };
    let sim = SimConfig {
        seed: Some(11),
        reroute_after: Some(5),
        ..SimConfig::default()
    };
    let mut composition = compose(Layout::Grid2x2, sim, &unit, &[0, 3, 6, 9]).unwrap();
    let network = &mut composition.network;

    for _ in 0..300 {
        checked_tick(network);
    }
    assert!(network.spawned() > 0);
    assert_eq!(network.stats().len(), 300);
}

#[test]
fn test_corners_stay_empty_under_traffic() {
    let unit = UnitConfig {
        alternate_yield: true,
        spawn: Some(SpawnConfig::default()),
        ..UnitConfig::default()
    };
    let mut composition = compose(Layout::Grid2x2, seeded(5), &unit, &[]).unwrap();
    let network = &mut composition.network;

    let corners = [
        GridPos::new(0, 0),
        GridPos::new(0, 3),
        GridPos::new(3, 0),
        GridPos::new(3, 3),
    ];
    for _ in 0..200 {
        network.tick().unwrap();
        for segment in network.segments() {
            if !matches!(segment.kind(), SegmentKind::Intersection(_)) {
                continue;
            }
            for corner in corners {
                assert_eq!(segment.grid().value(corner), Some(0));
                assert!(segment.grid().is_blocked(corner));
            }
        }
    }
}

#[test]
fn test_straight_through_traffic_takes_three_handoffs() {
    let unit = UnitConfig {
        red: 0,
        green: 10,
        spawn: Some(SpawnConfig {
            probability: 1.0,
            random_walk: false,
            route: vec![0],
            ..SpawnConfig::default()
        }),
        ..UnitConfig::default()
    };
    let mut composition = compose(Layout::Single, seeded(1), &unit, &[]).unwrap();
    let network = &mut composition.network;

    network.run(200).unwrap();

    assert!(network.completed() > 0);
    assert!(network.spawned() <= 4 * 200);
    assert_eq!(
        network.live_cars() as u64 + network.completed(),
        network.spawned()
    );
    for car in network.cars().iter().filter(|c| c.retired) {
        // generator to approach, approach to crossroad, crossroad to exit line
        assert_eq!(car.handoffs, 3, "{} took an unexpected path", car.id);
    }
}

#[test]
fn test_crossing_approaches_are_never_green_together() {
    let unit = UnitConfig {
        red: 4,
        green: 4,
        ..UnitConfig::default()
    };
    let mut composition = compose(Layout::Single, seeded(2), &unit, &[1]).unwrap();
    let network = &mut composition.network;

    let west = network.segment_id("unit/signaled1").unwrap();
    let south = network.segment_id("unit/signaled3").unwrap();

    for _ in 0..100 {
        network.tick().unwrap();
        let west_red = network.segment(west).unwrap().is_red().unwrap();
        let south_red = network.segment(south).unwrap().is_red().unwrap();
        assert!(
            west_red || south_red,
            "both approaches green at tick {}",
            network.tick_count()
        );
    }
}

#[test]
fn test_red_light_holds_queue_until_green() {
    let spawn = SpawnConfig {
        probability: 1.0,
        random_walk: false,
        ..SpawnConfig::default()
    };
    let mut builder = NetworkBuilder::new(seeded(3));
    let approach = builder.add_line("approach", 4).unwrap();
    let signaled = builder
        .add_signaled_line("signaled", 3, 1, LightSchedule::new(40, 1000, 0).unwrap())
        .unwrap();
    let source = builder.add_source("approach/source", spawn, 1).unwrap();
    builder.connect(approach, 0, signaled, 0).unwrap();
    builder.connect(source, 0, approach, 0).unwrap();
    let mut network = builder.build();

    let end = GridPos::new(0, 3);
    network.run(20).unwrap();

    let queued: Option<CarId> = network.segment(approach).unwrap().occupant(end);
    assert!(queued.is_some());
    let live = network.live_cars();
    let spawned = network.spawned();

    while network.tick_count() < 40 {
        network.tick().unwrap();
        let segment = network.segment(approach).unwrap();
        assert_eq!(segment.grid().occupied(), 4);
        assert_eq!(segment.occupant(end), queued);
        assert_eq!(network.live_cars(), live);
        assert_eq!(network.spawned(), spawned);
        assert_eq!(network.completed(), 0);

        // the source holds its rejected vehicle for the next offer
        let SegmentKind::Source(generator) = network.segment(source).unwrap().kind() else {
            panic!("approach/source is not a source");
        };
        assert!(generator.pending().is_some());
        assert_eq!(network.cars().active().count(), network.live_cars() + 1);
    }

    network.run(20).unwrap();
    assert!(network.completed() > 0);
    assert_ne!(network.segment(approach).unwrap().occupant(end), queued);
    checked_tick(&mut network);
}

#[test]
fn test_process_outputs_twice_is_a_noop() {
    let mut builder = NetworkBuilder::new(seeded(4));
    let first = builder.add_line("first", 2).unwrap();
    let second = builder.add_line("second", 3).unwrap();
    builder.connect(first, 0, second, 0).unwrap();
    let mut network = builder.build();

    let car = network.create_car(vec![]);
    assert!(network.add_car(first, car, 0).unwrap());
    network.tick().unwrap();

    network.move_phase();
    network.commit_phase();
    assert_eq!(
        network.segment(first).unwrap().occupant(GridPos::new(0, 1)),
        Some(car)
    );

    let exit = GridPos::new(0, 1);
    let entry = GridPos::new(0, 0);
    for _ in 0..2 {
        network.process_outputs(first).unwrap();
        let sender = network.segment(first).unwrap();
        assert!(sender.cars().is_empty());
        // vacated in next-state, still held in current-state until the commit
        assert_eq!(sender.grid().staged(exit), Some(0));
        assert_eq!(sender.grid().value(exit), Some(car.cell_value()));
        let receiver = network.segment(second).unwrap();
        assert_eq!(receiver.arrivals(), &[car]);
        assert_eq!(receiver.grid().staged(entry), Some(car.cell_value()));
        assert_eq!(network.cars().get(car).unwrap().handoffs, 2);
    }

    network.transfer_phase().unwrap();
    network.tick().unwrap();
    assert_eq!(network.segment(first).unwrap().grid().occupied(), 0);
    assert_eq!(network.segment(second).unwrap().cars(), &[car]);
}

#[test]
fn test_handoff_is_counted_at_the_next_commit() {
    let mut builder = NetworkBuilder::new(seeded(4));
    let first = builder.add_line("first", 2).unwrap();
    let second = builder.add_line("second", 3).unwrap();
    builder.connect(first, 0, second, 0).unwrap();
    let mut network = builder.build();

    let car = network.create_car(vec![]);
    assert!(network.add_car(first, car, 0).unwrap());
    // t0 hand-in, t1 move to the end cell, t1 transfer hands it on
    network.run(2).unwrap();
    assert_eq!(network.segment(second).unwrap().arrivals(), &[car]);

    network.move_phase();
    let total = network.commit_phase();
    let sender = network.segment(first).unwrap().stats();
    let receiver = network.segment(second).unwrap().stats();
    assert_eq!(sender.last().map(|s| s.moved), Some(0.5));
    assert_eq!(sender.last().map(|s| s.cars), Some(0));
    assert_eq!(receiver.last().map(|s| s.moved), Some(0.5));
    assert_eq!(receiver.last().map(|s| s.cars), Some(1));
    assert_eq!(total.moved, 1.0);
    assert_eq!(total.cars, 1);
    assert_eq!(network.segment(first).unwrap().grid().occupied(), 0);
    assert_eq!(
        network.segment(second).unwrap().occupant(GridPos::new(0, 0)),
        Some(car)
    );
}

#[test]
fn test_rejected_handoff_leaves_both_sides_untouched() {
    let mut builder = NetworkBuilder::new(seeded(4));
    let first = builder.add_line("first", 2).unwrap();
    let second = builder.add_line("second", 3).unwrap();
    builder.connect(first, 0, second, 0).unwrap();
    let mut network = builder.build();

    let car = network.create_car(vec![]);
    assert!(network.add_car(first, car, 0).unwrap());
    network.tick().unwrap();
    network.move_phase();
    network.commit_phase();

    let blocker = network.create_car(vec![]);
    assert!(network.add_car(second, blocker, 0).unwrap());

    for _ in 0..2 {
        network.process_outputs(first).unwrap();
        assert_eq!(network.segment(first).unwrap().cars(), &[car]);
        assert_eq!(network.segment(second).unwrap().arrivals(), &[blocker]);
        assert_eq!(network.cars().get(car).unwrap().handoffs, 1);
    }
}

#[test]
fn test_arrival_is_not_passed_on_in_the_same_tick() {
    let mut builder = NetworkBuilder::new(seeded(4));
    let first = builder.add_line("first", 1).unwrap();
    let second = builder.add_line("second", 1).unwrap();
    builder.connect(first, 0, second, 0).unwrap();
    let mut network = builder.build();

    let car = network.create_car(vec![]);
    assert!(network.add_car(first, car, 0).unwrap());

    network.tick().unwrap();
    assert_eq!(network.segment(second).unwrap().arrivals(), &[car]);
    assert_eq!(network.completed(), 0);

    network.tick().unwrap();
    assert!(network.segment(second).unwrap().cars().is_empty());
    assert_eq!(network.completed(), 1);
}

#[test]
fn test_single_unit_wiring() {
    let unit = UnitConfig {
        spawn: Some(SpawnConfig::default()),
        ..UnitConfig::default()
    };
    let composition = compose(Layout::Single, seeded(1), &unit, &[]).unwrap();
    let network = &composition.network;

    assert_eq!(network.segments().count(), 13);
    assert_eq!(network.order()[0], network.segment_id("unit/line1").unwrap());
    assert_eq!(network.wires().len(), 12);
    for n in 1..=4 {
        let entry = format!("unit/signaled{}", n);
        assert!(wired(network, &format!("{}/source", entry), &entry));
        assert!(wired(network, &entry, "unit/crossroad"));
        assert!(wired(network, "unit/crossroad", &format!("unit/line{}", n)));
    }

    let Block::Unit(root) = &composition.root else {
        panic!("a single layout builds a lone unit");
    };
    assert_eq!(root.crossroad, network.segment_id("unit/crossroad").unwrap());
    assert_eq!(root.exits[1], vec![network.segment_id("unit/line2").unwrap()]);
}

#[test]
fn test_two_by_two_wiring() {
    let unit = UnitConfig {
        spawn: Some(SpawnConfig::default()),
        ..UnitConfig::default()
    };
    let composition = compose(Layout::Grid2x2, seeded(1), &unit, &[]).unwrap();
    let network = &composition.network;

    assert_eq!(composition.root.units().len(), 4);
    assert_eq!(network.segments().count(), 4 * 9 + 8);
    assert_eq!(network.wires().len(), 4 * 8 + 8 + 8);

    assert!(wired(network, "grid/1/line2", "grid/2/signaled2"));
    assert!(wired(network, "grid/1/line3", "grid/3/signaled3"));
    assert!(wired(network, "grid/2/line1", "grid/1/signaled1"));
    assert!(wired(network, "grid/4/line4", "grid/2/signaled4"));
    // outer sides are open boundaries
    assert!(network.segment_by_name("grid/1/line1").unwrap().outputs()[0].is_none());
    assert!(network.segment_by_name("grid/1/signaled2/source").is_some());
    assert!(network.segment_by_name("grid/2/signaled2/source").is_none());

    let top_left = network.segment_id("grid/1/crossroad").unwrap();
    let bottom_right = network.segment_id("grid/4/crossroad").unwrap();
    let open_exit = network.segment_id("grid/1/line1").unwrap();
    assert!(network.reachable(top_left, bottom_right));
    assert!(network.reachable(bottom_right, top_left));
    assert!(!network.reachable(open_exit, top_left));
}

#[test]
fn test_four_by_four_wiring() {
    let unit = UnitConfig {
        spawn: Some(SpawnConfig::default()),
        ..UnitConfig::default()
    };
    let composition = compose(Layout::Grid4x4, seeded(1), &unit, &[]).unwrap();
    let network = &composition.network;

    assert_eq!(composition.root.units().len(), 16);
    assert_eq!(network.segments().count(), 16 * 9 + 16);
    // unit-internal, within each 2x2, between the 2x2 blocks, generators
    assert_eq!(network.wires().len(), 16 * 8 + 4 * 8 + 8 * 2 + 16);

    // east edge of the top-left block feeds the west edge of the top-right one
    assert!(wired(network, "grid/1/2/line2", "grid/2/1/signaled2"));
    assert!(wired(network, "grid/1/4/line2", "grid/2/3/signaled2"));

    let corner = network.segment_id("grid/1/1/crossroad").unwrap();
    let opposite = network.segment_id("grid/4/4/crossroad").unwrap();
    assert!(network.reachable(corner, opposite));
}

#[test]
fn test_mesh_runs_and_drains() {
    let unit = UnitConfig {
        spawn: Some(SpawnConfig {
            probability: 0.3,
            ..SpawnConfig::default()
        }),
        ..UnitConfig::default()
    };
    let sim = SimConfig {
        seed: Some(9),
        reroute_after: Some(8),
        ..SimConfig::default()
    };
    let mut composition = compose(Layout::Grid4x4, sim, &unit, &[]).unwrap();
    let network = &mut composition.network;

    network.run(399).unwrap();
    checked_tick(network);
    assert!(network.completed() > 0);
    assert!(network
        .stats()
        .iter()
        .all(|s| s.moved >= 0.0 && s.moved * 2.0 <= s.cells as f32));
}

#[test]
fn test_mismatched_lanes_cannot_be_linked() {
    let mut builder = NetworkBuilder::new(seeded(1));
    let wide = UnitConfig {
        layout: PortLayout {
            left: 2,
            right: 1,
            bottom: 1,
            top: 1,
        },
        ..UnitConfig::default()
    };
    let a = build_unit(&mut builder, "a", &wide, 0).unwrap();
    let b = build_unit(&mut builder, "b", &UnitConfig::default(), 0).unwrap();

    let result = link(&mut builder, &Block::Unit(b), &Block::Unit(a), 0);
    assert!(matches!(
        result,
        Err(SimError::LaneMismatch {
            outputs: 1,
            inputs: 2
        })
    ));
}

#[test]
fn test_builder_rejects_bad_wiring() {
    let mut builder = NetworkBuilder::new(seeded(1));
    let a = builder.add_line("a", 3).unwrap();
    let b = builder.add_line("b", 3).unwrap();
    let c = builder.add_line("c", 3).unwrap();

    assert!(matches!(
        builder.add_line("a", 5),
        Err(SimError::DuplicateName(_))
    ));
    assert!(matches!(
        builder.connect(a, 0, a, 0),
        Err(SimError::SelfLoop(_))
    ));
    assert!(matches!(
        builder.connect(a, 1, b, 0),
        Err(SimError::InvalidPort { port: 1, .. })
    ));

    builder.connect(a, 0, b, 0).unwrap();
    assert!(matches!(
        builder.connect(a, 0, c, 0),
        Err(SimError::OutputAlreadyWired { .. })
    ));
    assert!(matches!(
        builder.connect(c, 0, b, 0),
        Err(SimError::InputAlreadyFed { .. })
    ));
    assert!(builder.is_fed(b, 0));
    assert!(!builder.is_fed(c, 0));
    assert_eq!(builder.len(), 3);
}

#[test]
fn test_invalid_unit_settings_are_rejected() {
    let short = UnitConfig {
        length: 1,
        ..UnitConfig::default()
    };
    assert!(matches!(
        compose(Layout::Single, seeded(1), &short, &[]),
        Err(SimError::InvalidConfig(_))
    ));

    let dark = UnitConfig {
        red: 0,
        green: 0,
        ..UnitConfig::default()
    };
    assert!(matches!(
        compose(Layout::Single, seeded(1), &dark, &[]),
        Err(SimError::InvalidConfig(_))
    ));
}

#[test]
fn test_extreme_light_settings() {
    let wrapped = UnitConfig {
        red: 4,
        green: 4,
        ..UnitConfig::default()
    };
    let mut composition = compose(Layout::Single, seeded(5), &wrapped, &[u32::MAX]).unwrap();
    let network = &mut composition.network;
    let west = network.segment_id("unit/signaled1").unwrap();
    let south = network.segment_id("unit/signaled3").unwrap();
    for _ in 0..40 {
        network.tick().unwrap();
        let west_red = network.segment(west).unwrap().is_red().unwrap();
        let south_red = network.segment(south).unwrap().is_red().unwrap();
        assert_ne!(west_red, south_red, "tick {}", network.tick_count());
    }

    let overflowing = UnitConfig {
        red: u32::MAX,
        green: 2,
        ..UnitConfig::default()
    };
    assert!(matches!(
        compose(Layout::Single, seeded(5), &overflowing, &[]),
        Err(SimError::InvalidConfig(_))
    ));
}

#[test]
fn test_long_green_still_builds() {
    let unit = UnitConfig {
        red: 2,
        green: 6,
        ..UnitConfig::default()
    };
    let mut composition = compose(Layout::Single, seeded(6), &unit, &[]).unwrap();
    let network = &mut composition.network;
    let west = network.segment_id("unit/signaled1").unwrap();
    let south = network.segment_id("unit/signaled3").unwrap();

    // an 8 tick cycle with 6 green on each approach overlaps on 4 of them
    let mut both_green = 0;
    for _ in 0..8 {
        network.tick().unwrap();
        let west_red = network.segment(west).unwrap().is_red().unwrap();
        let south_red = network.segment(south).unwrap().is_red().unwrap();
        if !west_red && !south_red {
            both_green += 1;
        }
    }
    assert_eq!(both_green, 4);
}
