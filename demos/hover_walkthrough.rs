//! Replays a pointer sweep over two journeys and prints what the info panel shows.
//!
//! Run with `RUST_LOG=debug cargo run --example hover_walkthrough` to see engine logs.

use std::collections::BTreeSet;

use chrono::{TimeZone, Utc};
use trajectory_viewer::{
    geo_utils::meters_to_degrees, CoordinatePoint, GpsPoint, Interval, Journey, MapEvent,
    MemorySurface, TrajectoryViewer, ViewerConfig,
};

fn interval(journey: u32, number: u32, start_hour: u32, points: &[(f64, f64, f64)]) -> Interval {
    let mut interval = Interval::new(journey, number);
    interval.start_time = Utc.with_ymd_and_hms(2024, 3, 1, start_hour, 0, 0).single();
    interval.end_time = Utc.with_ymd_and_hms(2024, 3, 1, start_hour + 1, 5, 0).single();
    interval.avg_speed = Some(7.5);
    interval.nav_status = "Under way using engine".to_string();
    interval.classification_type = Some("Transit".to_string());
    interval.coordinate_points = points
        .iter()
        .map(|&(lat, lon, speed)| CoordinatePoint::new(lat, lon).with_speed(speed))
        .collect();
    interval
}

fn main() {
    env_logger::init();

    let journeys = vec![
        Journey::new(
            1,
            vec![
                interval(
                    1,
                    1,
                    8,
                    &[(36.130, -5.350, 6.1), (36.120, -5.360, 7.0), (36.110, -5.372, 8.2)],
                ),
                interval(
                    1,
                    2,
                    9,
                    &[(36.110, -5.372, 8.0), (36.100, -5.385, 8.4), (36.092, -5.400, 3.1)],
                ),
            ],
        ),
        Journey::new(
            2,
            vec![interval(
                2,
                1,
                10,
                &[(36.050, -5.300, 9.0), (36.060, -5.330, 9.5), (36.070, -5.360, 9.1)],
            )],
        )
        .incomplete(),
    ];

    let config = ViewerConfig::with_local_offset();
    let mut viewer = TrajectoryViewer::new(MemorySurface::new(), journeys, config);
    viewer.rebuild(&BTreeSet::from([1, 2]));
    println!(
        "Rendered {} paths and {} markers",
        viewer.render_set().path_count(),
        viewer.render_set().marker_count()
    );

    let first = viewer.render_set().paths()[0].layer;
    let entry = GpsPoint::new(36.125, -5.355);
    viewer.handle_event(MapEvent::LayerEnter { layer: first, position: entry });
    report(&viewer, "enter path at the first interval");

    // Sweep south-east along journey 1, then drift away from every path
    let sweep = [
        (GpsPoint::new(36.115, -5.366), "along the track"),
        (GpsPoint::new(36.101, -5.384), "onto the second interval"),
        (GpsPoint::new(36.0921, -5.3999), "at the journey end"),
    ];
    for (position, label) in sweep {
        viewer.handle_event(MapEvent::PointerMove { position });
        report(&viewer, label);
    }
    for meters in [300.0, 650.0, 1_000.0] {
        let position = GpsPoint::new(36.092, -5.400 - meters_to_degrees(meters, 36.092));
        viewer.handle_event(MapEvent::PointerMove { position });
        report(&viewer, &format!("{:.0} m west of the journey end", meters));
    }

    viewer.clear();
    println!(
        "Cleared: {} layers left on the map",
        viewer.surface().layers().len()
    );
}

fn report(viewer: &TrajectoryViewer<MemorySurface>, label: &str) {
    println!("--- {} ---", label);
    match viewer.surface().open_tooltip() {
        Some(panel) => println!("{}", panel.content),
        None => println!("(panel closed)"),
    }
}
