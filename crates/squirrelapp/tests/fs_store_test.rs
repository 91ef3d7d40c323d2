use squirrelapp::error::SquirrelError;
use squirrelapp::model::{EpicsValue, Pv, Snapshot};
use squirrelapp::store::fs::FileStore;
use squirrelapp::store::{Backend, NewPv, SnapshotFilter};
use squirrelapp::tags::{TagDef, TagGroup, TagSet};
use std::collections::BTreeSet;
use std::fs;
use tempfile::TempDir;

fn setup() -> (TempDir, FileStore) {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path().join("filestore.json"));
    (dir, store)
}

fn region() -> TagDef {
    TagDef::from_iter([(
        0,
        TagGroup::new("Region", "").with_tag(0, "A").with_tag(1, "B"),
    )])
}

#[test]
fn test_missing_file_reads_as_empty() {
    let (_dir, store) = setup();
    assert!(store.get_all_pvs().unwrap().is_empty());
    assert!(store.get_tags().unwrap().is_empty());
    assert!(store
        .get_snapshots(&SnapshotFilter::default())
        .unwrap()
        .is_empty());
}

#[test]
fn test_everything_survives_reopen() {
    let (dir, mut store) = setup();
    store.set_tags(&region()).unwrap();
    let pv = store
        .add_pv(
            NewPv::new(Some("MGNT:GUNB:TEST0"), Some("MGNT:GUNB:TEST0:RB"), "magnet")
                .with_tags(TagSet::from([(0, BTreeSet::from([1]))])),
        )
        .unwrap();
    store
        .set_meta_pvs(&[Pv::new().with_readback("BEAM:DEST")])
        .unwrap();
    let mut snapshot = Snapshot::new("golden", "reference machine state");
    snapshot.pvs = vec![pv.clone().with_setpoint_data(EpicsValue::new(1.5))];
    store.add_snapshot(&snapshot).unwrap();

    let reopened = FileStore::open(dir.path().join("filestore.json"));
    assert_eq!(reopened.get_tags().unwrap(), region());
    assert_eq!(reopened.get_all_pvs().unwrap(), vec![pv]);
    assert_eq!(reopened.get_meta_pvs().unwrap().len(), 1);
    let loaded = reopened
        .get_snapshots(&SnapshotFilter::by_id(snapshot.uuid))
        .unwrap();
    assert_eq!(loaded, vec![snapshot]);
}

#[test]
fn test_writes_leave_no_temp_files() {
    let (dir, mut store) = setup();
    store.add_pv(NewPv::new(Some("SP"), None, "")).unwrap();
    store.add_pv(NewPv::new(Some("SP2"), None, "")).unwrap();

    for entry in fs::read_dir(dir.path()).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(!name.ends_with(".tmp"), "Found leftover tmp file: {}", name);
    }
}

#[test]
fn test_referenced_pv_is_archived_not_erased() {
    let (dir, mut store) = setup();
    let kept = store.add_pv(NewPv::new(Some("KEEP"), None, "")).unwrap();
    let gone = store.add_pv(NewPv::new(Some("GONE"), None, "")).unwrap();
    let mut snapshot = Snapshot::new("uses KEEP", "");
    snapshot.pvs = vec![kept.clone()];
    store.add_snapshot(&snapshot).unwrap();

    store.delete_entry(&kept.clone().into()).unwrap();
    store.delete_entry(&gone.clone().into()).unwrap();

    let reopened = FileStore::open(dir.path().join("filestore.json"));
    assert!(reopened.get_all_pvs().unwrap().is_empty());
    assert_eq!(reopened.get_entry(&kept.uuid).unwrap(), kept.into());
    assert!(matches!(
        reopened.get_entry(&gone.uuid),
        Err(SquirrelError::EntryNotFound(_))
    ));
}

#[test]
fn test_corrupt_file_is_an_error() {
    let (dir, store) = setup();
    fs::write(dir.path().join("filestore.json"), "{ not json").unwrap();
    assert!(store.get_all_pvs().is_err());
}

#[test]
fn test_two_handles_see_each_other() {
    let (dir, mut first) = setup();
    let mut second = FileStore::open(dir.path().join("filestore.json"));

    first.add_tag_group("Region", "").unwrap();
    let group = second.get_tags().unwrap().group_id("Region").unwrap();
    second.add_tag_to_group(group, "A").unwrap();

    let def = first.get_tags().unwrap();
    assert_eq!(def.get(group).unwrap().tag_id("A"), Some(0));
}
