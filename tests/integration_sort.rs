//! End-to-end filing runs against on-disk indexes.

mod common;

use assert_fs::prelude::*;
use common::{jpeg_taken_at, tree, write};
use photo_inbox_sorter::config::SorterConfig;
use photo_inbox_sorter::core::index::{
    migrate, open_backend, open_backend_read_only, BackendKind, DuplicateIndex, IndexEntry,
};
use photo_inbox_sorter::core::pipeline::{IndexRebuilder, Sorter};
use photo_inbox_sorter::error::{IndexError, SorterError};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn open(kind: BackendKind, index: &Path, library: &Path) -> DuplicateIndex {
    DuplicateIndex::load(open_backend(kind, index).unwrap(), library).unwrap()
}

fn sort_once(kind: BackendKind, index: &Path, inbox: &Path, library: &Path) -> photo_inbox_sorter::core::pipeline::SortResult {
    let mut index = open(kind, index, library);
    let result = Sorter::builder(library).source(inbox).build().unwrap().run(&mut index).unwrap();
    index.close().unwrap();
    result
}

fn owned(index: &DuplicateIndex) -> Vec<IndexEntry> {
    index.entries().into_iter().cloned().collect()
}

#[test]
fn csv_index_files_content_once_across_runs() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.path().join("inbox");
    let library = temp.path().join("library");
    let index = library.join(".photo-sort").join("index.csv");
    let bytes = jpeg_taken_at("2013:08:24 13:05:52");

    write(&inbox, "img.jpg", &bytes);
    let first = sort_once(BackendKind::Csv, &index, &inbox, &library);
    assert_eq!(first.summary.filed, 1);

    write(&inbox, "img (1).jpg", &bytes);
    let second = sort_once(BackendKind::Csv, &index, &inbox, &library);
    assert_eq!(second.summary.filed, 0);
    assert_eq!(second.summary.duplicates, 1);

    assert_eq!(
        tree(&library),
        vec![".photo-sort/index.csv", "2013/2013_08_24/img.jpg"]
    );
    assert_eq!(tree(&inbox), vec!["img (1).jpg"]);

    let csv = fs::read_to_string(&index).unwrap();
    assert!(csv.starts_with("directory,filename,type,hash\n"));
    assert!(csv.contains("2013/2013_08_24,img.jpg,photo,"));
    assert!(csv.trim_end().ends_with(" - 2013-08-24 13:05:52"));
}

#[test]
fn sqlite_index_files_content_once_across_runs() {
    let temp = assert_fs::TempDir::new().unwrap();
    let inbox = temp.child("inbox");
    let library = temp.child("library");
    inbox.create_dir_all().unwrap();
    library.create_dir_all().unwrap();
    let index = library.path().join(".photo-sort").join("index.db");
    let bytes = jpeg_taken_at("2013:08:24 13:05:52");

    inbox.child("img.jpg").write_binary(&bytes).unwrap();
    sort_once(BackendKind::Sqlite, &index, inbox.path(), library.path());
    inbox.child("img.jpg").assert(predicate::path::missing());
    library
        .child("2013/2013_08_24/img.jpg")
        .assert(predicate::path::is_file());

    inbox.child("copy.jpg").write_binary(&bytes).unwrap();
    let second = sort_once(BackendKind::Sqlite, &index, inbox.path(), library.path());
    assert_eq!(second.summary.duplicates, 1);
    inbox.child("copy.jpg").assert(predicate::path::is_file());
    library
        .child("2013/2013_08_24/copy.jpg")
        .assert(predicate::path::missing());

    let reopened = open(BackendKind::Sqlite, &index, library.path());
    assert_eq!(reopened.len(), 1);
}

#[test]
fn dry_run_leaves_no_index_behind() {
    let temp = assert_fs::TempDir::new().unwrap();
    let inbox = temp.child("inbox");
    let library = temp.child("library");
    inbox.create_dir_all().unwrap();
    library.create_dir_all().unwrap();
    inbox
        .child("img.jpg")
        .write_binary(&jpeg_taken_at("2013:08:24 13:05:52"))
        .unwrap();
    let index_path = library.path().join(".photo-sort").join("index.db");

    let backend = open_backend_read_only(BackendKind::Sqlite, &index_path).unwrap();
    let mut index = DuplicateIndex::load(backend, library.path()).unwrap();
    let result = Sorter::builder(library.path())
        .source(inbox.path())
        .dry_run(true)
        .build()
        .unwrap()
        .run(&mut index)
        .unwrap();

    assert_eq!(result.summary.filed, 1);
    inbox.child("img.jpg").assert(predicate::path::is_file());
    library.child(".photo-sort").assert(predicate::path::missing());
    library.child("2013").assert(predicate::path::missing());
}

#[test]
fn composite_is_filed_under_a_shared_prefixed_name() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.path().join("inbox");
    let library = temp.path().join("library");
    write(&inbox, "mov1.mp4", b"frames");
    write(&inbox, "mov1.jpg", &jpeg_taken_at("2013:08:24 13:05:52"));

    let mut index = open(BackendKind::Csv, &library.join("index.csv"), &library);
    let result = Sorter::builder(&library)
        .source(&inbox)
        .filename_format(Some("%(year)04d%(month)02d%(day)02d_".to_string()))
        .build()
        .unwrap()
        .run(&mut index)
        .unwrap();

    assert_eq!(result.summary.units, 1);
    assert_eq!(
        tree(&library),
        vec![
            "2013/2013_08_24/20130824_mov1.jpg",
            "2013/2013_08_24/20130824_mov1.mp4",
            "index.csv",
        ]
    );
    let entries = owned(&index);
    assert_eq!(entries[0].filename, "20130824_mov1.mp4");
    assert_eq!(entries[0].file_type, "movie_with_metadata");
}

#[test]
fn config_file_drives_a_run() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.path().join("inbox");
    let library = temp.path().join("library");
    write(&inbox, "raw1.arw", b"");
    write(&inbox, "raw1.jpg", &jpeg_taken_at("2013:08:24 13:05:52"));

    let config_path = temp.path().join("config.json");
    fs::write(
        &config_path,
        format!(
            r#"{{ "sources": {{ "camera": {{ "dir": {:?} }} }}, "output": {:?}, "backend": "csv", "mode": "0640" }}"#,
            inbox, library
        ),
    )
    .unwrap();
    let config = SorterConfig::load(&config_path).unwrap();

    let mut index = open(config.backend_kind(), &config.index_path().unwrap(), &library);
    Sorter::builder(config.output_root().unwrap())
        .sources(config.source_dirs())
        .placement(config.placement().unwrap())
        .build()
        .unwrap()
        .run(&mut index)
        .unwrap();
    index.close().unwrap();

    assert_eq!(
        tree(&library),
        vec![
            ".photo-sort/index.csv",
            "2013/2013_08_24/raw1.arw",
            "2013/2013_08_24/raw1.jpg",
        ]
    );
    let csv = fs::read_to_string(library.join(".photo-sort/index.csv")).unwrap();
    assert!(csv.contains(
        "2013/2013_08_24,raw1.arw,raw_with_metadata,d41d8cd98f00b204e9800998ecf8427e - 2013-08-24 13:05:52"
    ));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(library.join("2013/2013_08_24/raw1.arw"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o640);
    }
}

#[test]
fn rebuild_reproduces_what_sorting_recorded() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.path().join("inbox");
    let library = temp.path().join("library");
    write(&inbox, "a.jpg", &jpeg_taken_at("2013:08:24 13:05:52"));
    write(&inbox, "trip/b.jpg", &jpeg_taken_at("2014:02:01 09:00:00"));
    write(&inbox, "mov1.mp4", b"frames");
    write(&inbox, "mov1.jpg", &jpeg_taken_at("2013:08:24 18:00:00"));

    let sorted_index = temp.path().join("sorted.csv");
    sort_once(BackendKind::Csv, &sorted_index, &inbox, &library);
    let sorted = owned(&open(BackendKind::Csv, &sorted_index, &library));
    assert_eq!(sorted.len(), 3);

    let rebuilt_index = temp.path().join("rebuilt.csv");
    let mut index = open(BackendKind::Csv, &rebuilt_index, &library);
    let result = IndexRebuilder::new().run(&mut index).unwrap();
    index.close().unwrap();

    assert_eq!(result.summary.indexed, 3);
    assert_eq!(owned(&open(BackendKind::Csv, &rebuilt_index, &library)), sorted);
}

#[test]
fn flat_index_migrates_into_sqlite() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.path().join("inbox");
    let library = temp.path().join("library");
    write(&inbox, "a.jpg", &jpeg_taken_at("2013:08:24 13:05:52"));
    write(&inbox, "b.mov", b"frames");

    let csv = temp.path().join("index.csv");
    sort_once(BackendKind::Csv, &csv, &inbox, &library);

    let db = temp.path().join("index.db");
    let mut source = open_backend(BackendKind::Csv, &csv).unwrap();
    let mut target = open_backend(BackendKind::Sqlite, &db).unwrap();
    let report = migrate(source.as_mut(), target.as_mut()).unwrap();
    target.close().unwrap();

    assert_eq!(report.copied, 2);
    assert_eq!(
        owned(&open(BackendKind::Sqlite, &db, &library)),
        owned(&open(BackendKind::Csv, &csv, &library))
    );

    // Sorting against the migrated index still recognizes the filed photo.
    write(&inbox, "again.jpg", &jpeg_taken_at("2013:08:24 13:05:52"));
    let result = sort_once(BackendKind::Sqlite, &db, &inbox, &library);
    assert_eq!(result.summary.duplicates, 1);
}

#[test]
fn corrupt_index_stops_the_run_before_anything_moves() {
    let temp = TempDir::new().unwrap();
    let library = temp.path().join("library");
    let index = write(temp.path(), "index.csv", b"directory,filename,type,hash\nonly,three,fields\n");

    let result = DuplicateIndex::load(open_backend(BackendKind::Csv, &index).unwrap(), &library);
    assert!(matches!(result, Err(IndexError::Corrupt { .. })));
    let error: SorterError = result.err().unwrap().into();
    assert!(error.to_string().contains("index.csv"));
}
