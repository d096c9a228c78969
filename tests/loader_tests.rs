use std::{fs::File, io::Write, path::PathBuf};

use snapline::{prelude::*, source};
use zip::{ZipWriter, write::SimpleFileOptions};

fn data_dir() -> PathBuf {
    PathBuf::from(format!("{}/tests/data", env!("CARGO_MANIFEST_DIR")))
}

fn load_from_directory() -> Repository {
    let source = Source::default().from_directory(data_dir());
    Repository::new()
        .with_source(&source, &SwapConfig::default())
        .unwrap()
}

#[test]
fn load_from_directory_test() {
    let repository = load_from_directory();
    assert_eq!(repository.route_names(), vec!["34", "7"]);
    assert_eq!(repository.stations.len(), 6);
    assert_eq!(repository.variants.len(), 2);
    // the truncated file is skipped, the readme is not a geometry file
    assert_eq!(repository.shapes.len(), 2);
    assert!(repository.last_updated.is_some());

    for station in repository.stations.iter() {
        if station.id.is_empty() {
            panic!("station id should never be empty");
        }
        if station.name.is_empty() {
            panic!("station name should never be empty");
        }
    }
}

#[test]
fn loose_types_are_accepted() {
    let repository = load_from_directory();
    let harbor = repository.station_by_id("e").unwrap();
    assert_eq!(harbor.coordinate, Coordinate::new(37.01, 127.0));
    assert_eq!(harbor.number.as_ref(), "105");
    let variant = repository.variant_by_id("V7").unwrap();
    assert_eq!(variant.route_name.as_ref(), "7");
    assert_eq!(variant.stops.len(), 2);
    assert!(variant.stops.iter().all(|stop| stop.direction == Direction::Outbound));
}

#[test]
fn loop_shape_is_split_at_its_turn() {
    let repository = load_from_directory();
    let shape = repository.shape_by_variant_id("V1").unwrap();
    assert_eq!(shape.turn_index, Some(2));
    assert!(!shape.swapped);
    assert_eq!(shape.polylines.outbound.len(), 3);
    assert_eq!(shape.polylines.inbound.len(), 4);
    assert_eq!(shape.total_length, Distance::from_meters(533.0));
    assert_eq!(shape.stop_index.by_id("c"), Some(4));
    let bbox = shape.bounding_box.unwrap();
    assert!(bbox.contains(&Coordinate::new(37.001, 127.0005)));
}

#[test]
fn one_way_shape_borrows_the_route_map_stops() {
    let repository = load_from_directory();
    let shape = repository.shape_by_variant_id("V7").unwrap();
    assert_eq!(shape.turn_index, None);
    assert_eq!(shape.stops.len(), 2);
    assert!(shape.stop_index.is_empty());
    assert_eq!(shape.polylines.outbound.len(), 4);
    assert!(shape.polylines.inbound.is_empty());
    assert_eq!(repository.shapes_by_route_name("7").len(), 1);
}

#[test]
fn missing_directory_is_an_error() {
    let source = Source::default().from_directory(data_dir().join("missing"));
    let result = Repository::new().with_source(&source, &SwapConfig::default());
    assert!(matches!(result, Err(source::Error::FileNotFound(_))));
}

#[test]
fn load_from_zip_test() {
    let path = std::env::temp_dir().join(format!("snapline-loader-{}.zip", std::process::id()));
    let mut writer = ZipWriter::new(File::create(&path).unwrap());
    for name in ["routeMap.json", "derived_routes/V1.geojson", "derived_routes/V7.geojson"] {
        let content = std::fs::read(data_dir().join(name)).unwrap();
        writer.start_file(name, SimpleFileOptions::default()).unwrap();
        writer.write_all(&content).unwrap();
    }
    writer.finish().unwrap();

    let source = Source::default().from_zip(path.clone());
    let repository = Repository::new()
        .with_source(&source, &SwapConfig::default())
        .unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(repository.variants.len(), 2);
    assert_eq!(repository.shapes.len(), 2);
    assert!(repository.shape_by_variant_id("V1").is_some());
}
