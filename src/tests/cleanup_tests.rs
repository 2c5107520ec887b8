use super::cleanup::*;
use super::test_fixtures::Project;

fn local_registry() -> &'static StagingRegistry {
    Box::leak(Box::new(StagingRegistry::new()))
}

fn temp_config(project: &Project) -> tempfile::NamedTempFile {
    tempfile::Builder::new()
        .prefix("tsconfig.tsfiles-")
        .suffix(".json")
        .tempfile_in(project.root())
        .expect("temp file")
}

#[test]
fn test_staged_file_is_registered_until_dropped() {
    let project = Project::new();
    let registry = local_registry();
    let staged = registry.stage(temp_config(&project));
    let path = staged.path().to_path_buf();
    assert!(path.exists());
    assert!(registry.contains(&path));

    drop(staged);
    assert!(!path.exists());
    assert!(!registry.contains(&path));
}

#[test]
fn test_remove_all_deletes_live_files() {
    let project = Project::new();
    let registry = local_registry();
    let first = registry.stage(temp_config(&project));
    let second = registry.stage(temp_config(&project));
    let paths = [first.path().to_path_buf(), second.path().to_path_buf()];

    assert_eq!(registry.remove_all(), 2);
    for path in &paths {
        assert!(!path.exists());
        assert!(!registry.contains(path));
    }

    // The later drops find nothing left to delete.
    drop(first);
    drop(second);
}

#[test]
fn test_remove_all_skips_files_already_gone() {
    let project = Project::new();
    let registry = local_registry();
    let staged = registry.stage(temp_config(&project));
    std::fs::remove_file(staged.path()).expect("remove early");

    assert_eq!(registry.remove_all(), 0);
    assert!(!registry.contains(staged.path()));
}

#[test]
fn test_new_stages_in_global_registry() {
    let project = Project::new();
    let staged = StagedFile::new(temp_config(&project));
    let path = staged.path().to_path_buf();
    assert!(StagingRegistry::global().contains(&path));

    drop(staged);
    assert!(!StagingRegistry::global().contains(&path));
}
