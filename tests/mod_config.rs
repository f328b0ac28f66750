use bookshelf::Bookshelf;
use bookshelf::config::ShelfConfig;
use bookshelf::errors::DbError;

#[test]
fn file_config_names_the_collection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bookshelf.toml");
    std::fs::write(&path, "collection = \"library\"\nmax_results = 25\n[log]\nretention = 2\n").unwrap();
    let cfg = ShelfConfig::from_file(&path).unwrap();
    assert_eq!(cfg.collection, "library");
    assert_eq!(cfg.max_results, 25);
    assert_eq!(cfg.log.retention, 2);

    let shelf = Bookshelf::new(cfg).unwrap();
    assert!(shelf.engine().get_collection("library").is_some());
    assert!(shelf.engine().get_collection("books").is_none());
}

#[test]
fn explicit_missing_file_is_a_config_error() {
    let err = ShelfConfig::load(Some(std::path::Path::new("/no/such/bookshelf.toml"))).unwrap_err();
    assert!(matches!(err, DbError::Config(_)));
}

#[test]
fn invalid_config_is_rejected_by_bookshelf() {
    let cfg = ShelfConfig { max_results: 0, ..ShelfConfig::default() };
    assert!(Bookshelf::new(cfg).is_err());
}

#[test]
fn dropped_collection_surfaces_as_error() {
    let shelf = Bookshelf::new(ShelfConfig::default()).unwrap();
    shelf.engine().drop_collection("books");
    assert!(matches!(shelf.runner(), Err(DbError::NoSuchCollection(_))));
}
