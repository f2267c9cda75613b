use camino::Utf8PathBuf;

use eqfinder::catalog::{CatalogFile, FDSN_HEADER};
use eqfinder::store::CatalogStore;

#[test]
fn write_catalog_replaces_existing_file() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let path = root.join("nested").join("catalog.txt");
    std::fs::create_dir_all(path.parent().unwrap().as_std_path()).unwrap();
    std::fs::write(path.as_std_path(), "stale contents\n").unwrap();

    let store = CatalogStore::new();
    store
        .write_catalog(&path, &CatalogFile::FdsnSchema(Vec::new()))
        .unwrap();

    let written = std::fs::read_to_string(path.as_std_path()).unwrap();
    assert_eq!(written, format!("{FDSN_HEADER}\n"));
    let leftovers = std::fs::read_dir(path.parent().unwrap().as_std_path())
        .unwrap()
        .count();
    assert_eq!(leftovers, 1);
}

#[test]
fn remove_existing_reports_whether_a_file_was_removed() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let path = root.join("catalog.txt");
    let store = CatalogStore::new();

    assert!(!store.remove_existing(&path).unwrap());
    std::fs::write(path.as_std_path(), "old").unwrap();
    assert!(store.remove_existing(&path).unwrap());
    assert!(!path.as_std_path().exists());
}
