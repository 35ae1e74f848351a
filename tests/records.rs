//! Persistence tests for records and the metarecord index

mod common;

use chrono::{Duration, Utc};
use common::FileTree;
use snapvault::record::{RECORD_EXT, RECORD_FOLDER};
use snapvault::{MetaRecord, Record};
use tempfile::TempDir;

#[test]
fn test_create_metarecord() {
    let temp_dir = TempDir::new().unwrap();
    let ft = FileTree::new(temp_dir.path());
    let meta = MetaRecord::create_new(ft.root());
    meta.save().unwrap();
    assert!(ft.exists(&format!("{RECORD_FOLDER}/metarecord.rec.json")));
    assert!(!ft
        .read(&format!("{RECORD_FOLDER}/metarecord.rec.json"))
        .is_empty());
}

#[test]
fn test_load_metarecord() {
    let temp_dir = TempDir::new().unwrap();
    let ft = FileTree::new(temp_dir.path());
    let mut meta = MetaRecord::create_new(ft.root());
    let record = Record::new("Rec A", "Rec A Data");
    record.save(ft.root()).unwrap();
    meta.add_record(&record);
    meta.save().unwrap();

    let loaded = MetaRecord::load_from(ft.root()).unwrap().unwrap();
    assert_eq!(loaded.root(), meta.root());
    assert_eq!(loaded.records().len(), meta.records().len());
    for (ours, theirs) in meta.records().iter().zip(loaded.records()) {
        assert_eq!(ours.name, theirs.name);
        assert_eq!(ours.timestamp, theirs.timestamp);
    }
}

#[test]
fn test_create_record() {
    let temp_dir = TempDir::new().unwrap();
    let ft = FileTree::new(temp_dir.path());
    let mut meta = MetaRecord::create_new(ft.root());
    let record = Record::new("Rec A", "Rec A Data");
    record.save(ft.root()).unwrap();
    meta.add_record(&record);
    meta.save().unwrap();

    let record_file = format!("{RECORD_FOLDER}/Rec A{RECORD_EXT}");
    assert!(ft.exists(&record_file));
    assert!(!ft.read(&record_file).is_empty());
    assert!(ft.exists(&format!("{RECORD_FOLDER}/metarecord.rec.json")));
}

#[test]
fn test_record_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let ft = FileTree::new(temp_dir.path());
    ft.file("source_data/junkA", "junk content A");
    ft.file("source_data/junkB", "junk content B");

    let mut record = Record::new("Rec A", "Rec A Data");
    record
        .add_file(&ft.path("source_data/junkA"), "source_data/junkA", None)
        .unwrap();
    record
        .add_file(&ft.path("source_data/junkB"), "source_data/junkB", None)
        .unwrap();
    record.save(ft.root()).unwrap();

    let loaded = Record::load_from(ft.root(), &record.name).unwrap();
    assert_eq!(loaded, record); // name, folder, timestamp, files
}

#[test]
fn test_load_latest_record() {
    // Records are timestamped on CREATION, not save: the first one
    // instantiated is the oldest even when it is saved last.
    let temp_dir = TempDir::new().unwrap();
    let ft = FileTree::new(temp_dir.path());
    let mut meta = MetaRecord::create_new(ft.root());

    let base = Utc::now();
    let rec_a = Record::with_timestamp("Rec A", "Rec A Data", base); // oldest
    let rec_b = Record::with_timestamp("Rec B", "Rec B Data", base + Duration::seconds(2));

    rec_b.save(ft.root()).unwrap();
    meta.add_record(&rec_b);
    rec_a.save(ft.root()).unwrap();
    meta.add_record(&rec_a);
    meta.save().unwrap();

    assert_eq!(meta.latest_record().unwrap(), rec_b);

    let rec_c = Record::with_timestamp("Rec C", "Rec C Data", base + Duration::seconds(4));
    rec_c.save(ft.root()).unwrap();
    meta.add_record(&rec_c);
    meta.save().unwrap();
    assert_eq!(meta.latest_record().unwrap(), rec_c);

    // And the resolution survives a reload of the index.
    let reloaded = MetaRecord::load_from(ft.root()).unwrap().unwrap();
    assert_eq!(reloaded.latest().unwrap().name, "Rec C");
}

#[test]
fn test_diff_changed_records() {
    let temp_dir = TempDir::new().unwrap();
    let ft = FileTree::new(temp_dir.path());
    ft.file("source_data/junkA", "original A");
    ft.file("source_data/junkB", "original B");

    let mut record = Record::new("Rec A", "Rec A Data");
    record
        .add_file(&ft.path("source_data/junkA"), "source_data/junkA", None)
        .unwrap();
    record
        .add_file(&ft.path("source_data/junkB"), "source_data/junkB", None)
        .unwrap();

    ft.file("source_data/junkA", "different things");
    ft.file("source_data/junkB", "different things B");

    let mut record2 = Record::new("Rec A - 2", "Rec A Data");
    record2
        .add_file(&ft.path("source_data/junkA"), "source_data/junkA", None)
        .unwrap();
    record2
        .add_file(&ft.path("source_data/junkB"), "source_data/junkB", None)
        .unwrap();

    let diff = record.diff(&record2);
    assert_eq!(diff.added.len(), 0);
    assert_eq!(diff.changed.len(), 2);
    assert_eq!(diff.removed.len(), 0);
    assert_eq!(diff.unchanged.len(), 0);
    for ((old, new), ours) in diff.changed.iter().zip(&record.files) {
        assert_eq!(&old.path, &ours.path);
        assert_eq!(old.path, new.path);
        assert_ne!(old.hash, new.hash);
    }
}
