use teide_datagen::{generate_groupby, generate_join, DatasetSpec};
use tempfile::TempDir;

#[test]
fn groupby_is_byte_identical_for_same_arguments() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let spec = DatasetSpec::new(5_000, 10, 5, 42).unwrap();

    let out_a = generate_groupby(&spec, a.path()).unwrap();
    let out_b = generate_groupby(&spec, b.path()).unwrap();

    let bytes_a = std::fs::read(&out_a.files[0]).unwrap();
    let bytes_b = std::fs::read(&out_b.files[0]).unwrap();
    assert!(!bytes_a.is_empty());
    assert_eq!(bytes_a, bytes_b);
    assert_eq!(
        std::fs::read(&out_a.manifest).unwrap(),
        std::fs::read(&out_b.manifest).unwrap()
    );
}

#[test]
fn groupby_changes_with_seed() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let out_a = generate_groupby(&DatasetSpec::new(1_000, 10, 0, 1).unwrap(), a.path()).unwrap();
    let out_b = generate_groupby(&DatasetSpec::new(1_000, 10, 0, 2).unwrap(), b.path()).unwrap();
    assert_ne!(
        std::fs::read(&out_a.files[0]).unwrap(),
        std::fs::read(&out_b.files[0]).unwrap()
    );
}

#[test]
fn join_pair_is_byte_identical_for_same_arguments() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let spec = DatasetSpec::new(500, 5, 0, 9).unwrap();

    let out_a = generate_join(&spec, a.path()).unwrap();
    let out_b = generate_join(&spec, b.path()).unwrap();
    for (fa, fb) in out_a.files.iter().zip(&out_b.files) {
        assert_eq!(std::fs::read(fa).unwrap(), std::fs::read(fb).unwrap());
    }
}

#[test]
fn files_land_at_named_paths() {
    let root = TempDir::new().unwrap();
    let spec = DatasetSpec::new(1_000, 10, 0, 0).unwrap();
    generate_groupby(&spec, root.path()).unwrap();
    generate_join(&spec, root.path()).unwrap();

    assert!(root.path().join("G1_1e3_1e1_0_0/G1_1e3_1e1_0_0.csv").exists());
    assert!(root.path().join("J1_1e3_1e1_0_0/J1_1e3_NA_0_0.csv").exists());
    assert!(root.path().join("J1_1e3_1e1_0_0/J1_1e3_1e3_0_0.csv").exists());
}
