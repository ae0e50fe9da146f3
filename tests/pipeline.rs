use approx::assert_abs_diff_eq;
use crowdgrid::{
    AlertEvent, Calibration, CentroidTracker, Detection, Error, MonitoringConfig, OccupancyGrid,
    Tracking,
};
use nalgebra as na;

fn trapezoid() -> Vec<na::Point2<f64>> {
    vec![
        na::Point2::new(300.0, 200.0),
        na::Point2::new(700.0, 200.0),
        na::Point2::new(900.0, 600.0),
        na::Point2::new(100.0, 600.0),
    ]
}

#[test]
fn perspective_calibration_round_trip() {
    let cal = Calibration::from_points(&trapezoid(), 10.0, 8.0).unwrap();
    let g = cal.geometry();

    let world = [(0.0, 0.0), (10.0, 0.0), (10.0, 8.0), (0.0, 8.0)];
    for (img, &(wx, wy)) in trapezoid().iter().zip(world.iter()) {
        let p = g.image_to_world_point(img.x, img.y).unwrap();

        assert_abs_diff_eq!(p.x, wx, epsilon = 1e-6);
        assert_abs_diff_eq!(p.y, wy, epsilon = 1e-6);

        let (px, py) = g.world_to_image_point(wx, wy);
        assert!((px as f64 - img.x).abs() <= 1.0);
        assert!((py as f64 - img.y).abs() <= 1.0);
    }
}

#[test]
fn calibration_errors() {
    let pts = trapezoid();

    assert!(matches!(
        Calibration::from_points(&pts[..3], 10.0, 8.0),
        Err(Error::NotEnoughPoints(3))
    ));
    assert!(matches!(
        Calibration::from_points(&pts, -1.0, 8.0),
        Err(Error::InvalidDimensions { .. })
    ));

    let line: Vec<_> = (0..4).map(|i| na::Point2::new(i as f64 * 10.0, 0.0)).collect();
    assert!(matches!(
        Calibration::from_points(&line, 10.0, 8.0),
        Err(Error::DegeneratePoints)
    ));
}

#[test]
fn crowd_raises_and_clears_alert() {
    // 100 px per meter over a 10 x 8 m area
    let pts = [
        na::Point2::new(0.0, 0.0),
        na::Point2::new(1000.0, 0.0),
        na::Point2::new(1000.0, 800.0),
        na::Point2::new(0.0, 800.0),
    ];
    let cal = Calibration::from_points(&pts, 10.0, 8.0).unwrap();

    let config = MonitoringConfig {
        cell_width: 2.0,
        cell_height: 2.0,
        cell_capacity: Some(1),
        max_age: 0,
        ema_alpha: 1.0,
        hysteresis_time: 1.0,
        ..Default::default()
    };

    let mut tracker = CentroidTracker::from_config(&config, Some(cal.geometry())).unwrap();
    let mut grid =
        OccupancyGrid::new(&config, *cal.geometry(), cal.world_width(), cal.world_height())
            .unwrap();

    // three people in cell (1, 2)
    let crowd = [
        Detection::new(420.0, 220.0, 480.0, 280.0, 0.9),
        Detection::new(500.0, 220.0, 560.0, 280.0, 0.9),
        Detection::new(420.0, 300.0, 480.0, 360.0, 0.9),
    ];

    let mut events = Vec::new();
    for dt in [0.0, 0.5, 0.5] {
        let tracks = tracker.update(&crowd, None);
        assert_eq!(tracks.len(), 3);

        events.extend(grid.update(&tracks, dt));
    }

    assert_eq!(events.len(), 1);
    assert!(events[0].is_activation());
    assert_eq!(events[0].cell(), (1, 2));
    assert_abs_diff_eq!(grid.ema_counts()[[1, 2]], 3.0, epsilon = 1e-9);

    // everyone leaves, tracks expire on the first empty update
    let tracks = tracker.update(&[], None);
    assert!(tracks.is_empty());

    let events = grid.update(&tracks, 0.5);
    assert_eq!(events, vec![AlertEvent::Cleared { row: 1, col: 2 }]);
    assert!(grid.active_alerts().is_empty());
}

#[test]
fn scenario_grid_layout() {
    let cal = Calibration::from_points(&trapezoid(), 10.0, 8.0).unwrap();
    let config = MonitoringConfig {
        cell_width: 2.0,
        cell_height: 2.0,
        person_radius: 0.5,
        ..Default::default()
    };

    let grid = OccupancyGrid::new(&config, *cal.geometry(), 10.0, 8.0).unwrap();

    assert_eq!((grid.rows(), grid.cols()), (4, 5));
    assert_eq!(grid.cell_capacity(), 5);
}
