use lunacast::location::Coordinate;
use lunacast::resolver::{CoordinateResolver, CoordinateStore, JsonCoordinateStore, MemoryCoordinateStore};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn kyiv() -> Coordinate {
    Coordinate::new(50.4501, 30.5234).unwrap()
}

fn backups(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("saved_coords.json.corrupt-"))
        .collect();
    names.sort();
    names
}

#[test]
fn test_nearby_query_reuses_registered_coordinate() {
    let resolver = CoordinateResolver::new(MemoryCoordinateStore::new(), 20.0);

    let miss = resolver.find_existing(kyiv());
    assert!(!miss.found);
    assert_eq!(miss.coordinate, kyiv());

    resolver.register(kyiv()).unwrap();

    let hit = resolver.find_existing(Coordinate::new(50.46, 30.53).unwrap());
    assert!(hit.found);
    assert_eq!(hit.coordinate, kyiv());
}

#[test]
fn test_distant_query_is_a_miss() {
    let store = MemoryCoordinateStore::with_coordinates(vec![kyiv()]);
    let resolver = CoordinateResolver::new(store, 20.0);

    // Lviv, roughly 470 km away
    let lviv = Coordinate::new(49.8397, 24.0297).unwrap();
    let resolution = resolver.find_existing(lviv);

    assert!(!resolution.found);
    assert_eq!(resolution.coordinate, lviv);
}

#[test]
fn test_nearest_of_several_wins() {
    let far = Coordinate::new(50.55, 30.60).unwrap();
    let near = Coordinate::new(50.452, 30.525).unwrap();
    let store = MemoryCoordinateStore::with_coordinates(vec![far, near]);
    let resolver = CoordinateResolver::new(store, 20.0);

    assert_eq!(resolver.find_existing(kyiv()).coordinate, near);
}

#[test]
fn test_register_keeps_existing_nearby_entry() {
    let resolver = CoordinateResolver::new(MemoryCoordinateStore::new(), 20.0);

    assert_eq!(resolver.register(kyiv()).unwrap(), kyiv());
    let second = resolver.register(Coordinate::new(50.46, 30.53).unwrap()).unwrap();

    assert_eq!(second, kyiv());
    assert_eq!(resolver.store().load().unwrap().len(), 1);
}

#[test]
fn test_json_store_persists_and_reads_idempotently() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("saved_coords.json");

    let resolver = CoordinateResolver::new(JsonCoordinateStore::new(&path), 20.0);
    resolver.register(kyiv()).unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"lat\""));
    assert!(raw.contains("\"lon\""));

    // a fresh store over the same file sees the entry, and lookups do not write
    let reopened = CoordinateResolver::new(JsonCoordinateStore::new(&path), 20.0);
    let first = reopened.find_existing(Coordinate::new(50.46, 30.53).unwrap());
    let second = reopened.find_existing(Coordinate::new(50.46, 30.53).unwrap());

    assert_eq!(first, second);
    assert!(first.found);
    assert_eq!(fs::read_to_string(&path).unwrap(), raw);
    assert!(!path.with_extension("json.lock").exists());
}

#[test]
fn test_corrupt_store_degrades_to_miss() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("saved_coords.json");
    fs::write(&path, "{ not json").unwrap();

    let store = JsonCoordinateStore::new(&path);
    assert_eq!(store.load().unwrap_err().kind(), "cache_corruption");

    let resolver = CoordinateResolver::new(store, 20.0);
    let resolution = resolver.find_existing(kyiv());
    assert!(!resolution.found);

    // the unreadable file is kept aside before the store is rewritten
    resolver.register(kyiv()).unwrap();
    assert_eq!(resolver.store().load().unwrap(), vec![kyiv()]);

    let moved = backups(dir.path());
    assert_eq!(moved.len(), 1);
    assert_eq!(fs::read_to_string(dir.path().join(&moved[0])).unwrap(), "{ not json");
}

#[test]
fn test_out_of_range_entry_is_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("saved_coords.json");
    fs::write(&path, r#"[{"lat": 123.0, "lon": 0.0}, {"lat": 50.4501, "lon": 30.5234}]"#).unwrap();

    let store = JsonCoordinateStore::new(&path);
    assert_eq!(store.load().unwrap(), vec![kyiv()]);
}

#[test]
fn test_register_keeps_valid_entries_next_to_a_bad_one() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("saved_coords.json");
    let original = r#"[
        {"lat": 50.4501, "lon": 30.5234},
        {"lat": 48.85, "lon": 2.35},
        {"lat": 91.0, "lon": 0.0},
        {"lat": "north"}
    ]"#;
    fs::write(&path, original).unwrap();

    let resolver = CoordinateResolver::new(JsonCoordinateStore::new(&path), 20.0);
    let madrid = Coordinate::new(40.0, -3.7).unwrap();
    resolver.register(madrid).unwrap();

    let paris = Coordinate::new(48.85, 2.35).unwrap();
    assert_eq!(resolver.store().load().unwrap(), vec![kyiv(), paris, madrid]);

    let moved = backups(dir.path());
    assert_eq!(moved.len(), 1);
    assert_eq!(fs::read_to_string(dir.path().join(&moved[0])).unwrap(), original);
}

#[test]
fn test_clean_store_is_not_backed_up() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("saved_coords.json");
    let resolver = CoordinateResolver::new(JsonCoordinateStore::new(&path), 20.0);

    resolver.register(kyiv()).unwrap();
    resolver.register(Coordinate::new(40.0, -3.7).unwrap()).unwrap();

    assert!(backups(dir.path()).is_empty());
}

#[test]
fn test_abandoned_lock_is_broken() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("saved_coords.json");
    let lock = dir.path().join("saved_coords.json.lock");
    fs::write(&lock, "4242\n").unwrap();
    thread::sleep(Duration::from_millis(80));

    let store = JsonCoordinateStore::new(&path)
        .with_lock_timeout(Duration::from_secs(5))
        .with_stale_lock_age(Duration::from_millis(50));
    let resolver = CoordinateResolver::new(store, 20.0);

    resolver.register(kyiv()).unwrap();
    resolver.register(Coordinate::new(40.0, -3.7).unwrap()).unwrap();

    assert_eq!(resolver.store().load().unwrap().len(), 2);
    assert!(!lock.exists());
}

#[test]
fn test_live_lock_times_out() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("saved_coords.json");
    fs::write(dir.path().join("saved_coords.json.lock"), "").unwrap();

    let store = JsonCoordinateStore::new(&path)
        .with_lock_timeout(Duration::from_millis(60))
        .with_stale_lock_age(Duration::from_secs(3600));
    let err = store.append(kyiv()).unwrap_err();

    assert_eq!(err.kind(), "io");
    assert!(!path.exists());
}

#[test]
fn test_concurrent_registration_appends_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("saved_coords.json");
    let resolver = CoordinateResolver::new(JsonCoordinateStore::new(&path), 20.0);

    thread::scope(|scope| {
        for i in 0..4 {
            let resolver = &resolver;
            scope.spawn(move || {
                let offset = f64::from(i) * 0.001;
                resolver
                    .register(Coordinate::new(50.4501 + offset, 30.5234).unwrap())
                    .unwrap();
            });
        }
    });

    assert_eq!(resolver.store().load().unwrap().len(), 1);
}
