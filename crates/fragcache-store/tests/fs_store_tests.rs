//! Entry store and marker behaviour on a real filesystem.

use std::fs;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use fragcache_core::{ProfileName, validate_key};
use fragcache_store::{
    EntryStore, FsStorage, GenerationMarker, MARKER_FILE, ReadOutcome, Stamp, Storage, StoreError,
};
use tempfile::TempDir;

fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
}

struct Fixture {
    dir: TempDir,
    entries: EntryStore,
    markers: GenerationMarker,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FsStorage::new(dir.path()));
    Fixture {
        entries: EntryStore::new(storage.clone()),
        markers: GenerationMarker::new(storage),
        dir,
    }
}

#[test]
fn test_entry_and_marker_share_profile_directory() {
    let fx = fixture();
    let profile = ProfileName::parse("Woo").unwrap();
    let key = validate_key("product 12").unwrap();

    fx.entries.write(&profile, &key, "<p>X</p>", at(0)).unwrap();
    fx.markers.timestamp(&profile, at(5));

    let profile_dir = fx.dir.path().join("Woo");
    assert!(profile_dir.join("product 12.entry").is_file());
    assert_eq!(fs::metadata(profile_dir.join(MARKER_FILE)).unwrap().len(), 0);
}

#[test]
fn test_bump_is_a_single_file_write() {
    let fx = fixture();
    let profile = ProfileName::parse("Footer").unwrap();

    for i in 0..50 {
        let key = validate_key(&format!("k{i}")).unwrap();
        fx.entries.write(&profile, &key, &i, at(0)).unwrap();
    }

    fx.markers.bump(&profile, at(10)).unwrap();

    // Entries are untouched, only the marker moved
    let key = validate_key("k7").unwrap();
    assert_eq!(fx.entries.stamp(&profile, &key), Stamp::At(at(0)));
    assert_eq!(fx.markers.peek(&profile), Some(at(10)));
    assert_eq!(
        fx.entries.read::<i32>(&profile, &key),
        ReadOutcome::Found {
            payload: 7,
            stored_at: Some(at(0))
        }
    );
}

#[test]
fn test_profiles_are_isolated() {
    let fx = fixture();
    let a = ProfileName::parse("A").unwrap();
    let b = ProfileName::parse("B").unwrap();
    let key = validate_key("same").unwrap();

    fx.entries.write(&a, &key, "from a", at(0)).unwrap();

    assert_eq!(fx.entries.read::<String>(&b, &key), ReadOutcome::NotFound);
    fx.markers.bump(&a, at(1)).unwrap();
    assert_eq!(fx.markers.peek(&b), None);
}

#[test]
fn test_truncated_file_is_corrupt() {
    let fx = fixture();
    let profile = ProfileName::parse("Album").unwrap();
    let key = validate_key("cover").unwrap();
    fx.entries
        .write(&profile, &key, &vec!["a", "b"], at(0))
        .unwrap();

    fs::write(fx.dir.path().join("Album").join("cover.entry"), b"[\"a\",").unwrap();

    assert!(matches!(
        fx.entries.read::<Vec<String>>(&profile, &key),
        ReadOutcome::Corrupt { stored_at: Some(_) }
    ));
}

#[cfg(unix)]
#[test]
fn test_unwritable_root_is_reported() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ro");
    fs::create_dir(&root).unwrap();
    fs::set_permissions(&root, fs::Permissions::from_mode(0o555)).unwrap();

    // Root ignores permission bits
    if fs::write(root.join("writable"), b"").is_ok() {
        return;
    }

    let entries = EntryStore::new(Arc::new(FsStorage::new(&root)));
    let profile = ProfileName::parse("Woo").unwrap();
    let key = validate_key("k").unwrap();

    let err = entries.write(&profile, &key, "x", at(0)).unwrap_err();
    assert!(matches!(err, StoreError::Path { .. }));
    assert_eq!(entries.health().failure_count(), 1);
    assert_eq!(entries.stamp(&profile, &key), Stamp::Missing);
}
