use super::cleanup::StagingRegistry;
use super::config_value::ConfigValue;
use super::discovery::{DependencyClosure, ImportGraphLoader, discover};
use super::fs::to_slash;
use super::synthesize::*;
use super::test_fixtures::{Project, roots};
use std::path::Path;

fn closure_for(project: &Project, config: &str, root: &str) -> DependencyClosure {
    discover(
        &project.record(config),
        &roots(&[project.path(root)]),
        &ImportGraphLoader::default(),
        None,
    )
}

fn in_place(project: &Project, dir: &str) -> SynthesisOptions {
    SynthesisOptions {
        output_dir: project.path(dir),
    }
}

fn slash(project: &Project, relative: &str) -> String {
    to_slash(&project.path(relative))
}

fn option_str<'a>(config: &'a IsolatedConfiguration, key: &str) -> Option<&'a str> {
    config.compiler_options.get(key).and_then(ConfigValue::as_str)
}

#[test]
fn test_files_are_exactly_the_closure() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    project.write("src/a.ts", "import './b';");
    project.write("src/b.ts", "");
    project.write("src/unrelated.ts", "");

    let record = project.record("tsconfig.json");
    let closure = closure_for(&project, "tsconfig.json", "src/a.ts");
    let config = synthesize(&record, &closure, &in_place(&project, ""));
    assert_eq!(config.files, vec![slash(&project, "src/a.ts"), slash(&project, "src/b.ts")]);
}

#[test]
fn test_defaults_for_skip_lib_check_and_no_emit() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    project.write("a.ts", "");
    let record = project.record("tsconfig.json");
    let closure = closure_for(&project, "tsconfig.json", "a.ts");

    let config = synthesize(&record, &closure, &in_place(&project, ""));
    assert_eq!(config.compiler_options.get("skipLibCheck"), Some(&ConfigValue::Bool(true)));
    assert_eq!(config.compiler_options.get("noEmit"), Some(&ConfigValue::Bool(true)));
    assert!(config.compiler_options.get("typeRoots").is_none());
}

#[test]
fn test_user_choices_for_emit_are_respected() {
    let project = Project::new();
    project.write(
        "tsconfig.json",
        r#"{ "compilerOptions": { "skipLibCheck": false, "emitDeclarationOnly": true, "declaration": true } }"#,
    );
    project.write("a.ts", "");
    let record = project.record("tsconfig.json");
    let closure = closure_for(&project, "tsconfig.json", "a.ts");

    let config = synthesize(&record, &closure, &in_place(&project, ""));
    assert_eq!(config.compiler_options.get("skipLibCheck"), Some(&ConfigValue::Bool(false)));
    assert!(config.compiler_options.get("noEmit").is_none());
}

#[test]
fn test_paths_are_absolutized_against_declaring_config() {
    let project = Project::new();
    project.write(
        "base/tsconfig.base.json",
        r#"{ "compilerOptions": { "paths": { "@ui/*": ["../ui/*", "/abs/ui/*"] } } }"#,
    );
    project.write("app/tsconfig.json", r#"{ "extends": "../base/tsconfig.base.json" }"#);
    project.write("app/a.ts", "");
    let record = project.record("app/tsconfig.json");
    let closure = closure_for(&project, "app/tsconfig.json", "app/a.ts");

    let config = synthesize(&record, &closure, &in_place(&project, "app"));
    let paths = config.compiler_options.get("paths").expect("paths");
    let targets = paths.as_object().expect("table")["@ui/*"].string_items();
    assert_eq!(targets, vec![slash(&project, "ui/*"), "/abs/ui/*".to_string()]);
}

#[test]
fn test_path_rewrite_is_idempotent() {
    let paths = ConfigValue::from(&serde_json::json!({ "@x/*": ["src/x/*"], "y": ["lib/y.ts"] }));
    let base = Path::new("/repo/pkg");
    let once = rewrite_path_mappings(&paths, base);
    let twice = rewrite_path_mappings(&once, base);
    assert_eq!(once, twice);
    assert_eq!(
        once.as_object().expect("table")["@x/*"].string_items(),
        vec!["/repo/pkg/src/x/*".to_string()]
    );
}

#[test]
fn test_base_url_dropped_under_bundler() {
    let project = Project::new();
    project.write(
        "tsconfig.json",
        r#"{ "compilerOptions": { "moduleResolution": "bundler", "module": "esnext", "baseUrl": "src" } }"#,
    );
    project.write("a.ts", "");
    let record = project.record("tsconfig.json");
    let closure = closure_for(&project, "tsconfig.json", "a.ts");

    let config = synthesize(&record, &closure, &in_place(&project, ""));
    assert!(config.compiler_options.get("baseUrl").is_none());
}

#[test]
fn test_base_url_absolutized_otherwise() {
    let project = Project::new();
    project.write("tsconfig.json", r#"{ "compilerOptions": { "baseUrl": "src" } }"#);
    project.write("a.ts", "");
    let record = project.record("tsconfig.json");
    let closure = closure_for(&project, "tsconfig.json", "a.ts");

    let config = synthesize(&record, &closure, &in_place(&project, ""));
    assert_eq!(option_str(&config, "baseUrl"), Some(slash(&project, "src").as_str()));
}

#[test]
fn test_exclude_union_always_contains_dependency_and_build_dirs() {
    let project = Project::new();
    project.write(
        "tsconfig.json",
        r#"{ "compilerOptions": { "outDir": "out" }, "exclude": ["scripts", "node_modules"] }"#,
    );
    let record = project.record("tsconfig.json");

    let excludes = merged_excludes(&record);
    for expected in ["scripts", "node_modules", "dist", "build", "out"] {
        assert!(
            excludes.contains(&slash(&project, expected)),
            "missing {expected} in {excludes:?}"
        );
    }
    let unique: std::collections::BTreeSet<_> = excludes.iter().collect();
    assert_eq!(unique.len(), excludes.len(), "duplicates in {excludes:?}");
    assert_eq!(excludes[0], slash(&project, "scripts"));
}

#[test]
fn test_exclude_union_is_idempotent() {
    let project = Project::new();
    project.write("tsconfig.json", r#"{ "exclude": ["tmp"] }"#);
    let first = merged_excludes(&project.record("tsconfig.json"));

    let rewritten = serde_json::json!({ "exclude": first });
    project.write("tsconfig.json", &rewritten.to_string());
    let second = merged_excludes(&project.record("tsconfig.json"));
    assert_eq!(first, second);
}

#[test]
fn test_explicitly_included_build_dir_is_not_excluded() {
    let project = Project::new();
    project.write("tsconfig.json", r#"{ "include": ["src", "build/scripts"] }"#);

    let excludes = merged_excludes(&project.record("tsconfig.json"));
    assert!(!excludes.contains(&slash(&project, "build")));
    assert!(excludes.contains(&slash(&project, "dist")));
}

#[test]
fn test_missing_exclude_keeps_compiler_default_excludes() {
    let project = Project::new();
    project.write("tsconfig.json", r#"{ "include": ["src"] }"#);

    let excludes = merged_excludes(&project.record("tsconfig.json"));
    for expected in ["node_modules", "bower_components", "jspm_packages", "dist", "build"] {
        assert!(
            excludes.contains(&slash(&project, expected)),
            "missing {expected} in {excludes:?}"
        );
    }
}

#[test]
fn test_explicit_exclude_replaces_compiler_default_excludes() {
    let project = Project::new();
    project.write("tsconfig.json", r#"{ "exclude": ["tmp"] }"#);

    let excludes = merged_excludes(&project.record("tsconfig.json"));
    assert!(excludes.contains(&slash(&project, "tmp")));
    assert!(!excludes.contains(&slash(&project, "bower_components")));
    assert!(excludes.contains(&slash(&project, "node_modules")));
}

#[test]
fn test_incremental_gets_build_info_under_cache_dir() {
    let project = Project::new();
    project.write("tsconfig.json", r#"{ "compilerOptions": { "composite": true } }"#);
    project.write("a.ts", "");
    let record = project.record("tsconfig.json");
    let closure = closure_for(&project, "tsconfig.json", "a.ts");

    let config = synthesize(&record, &closure, &in_place(&project, ""));
    assert_eq!(
        option_str(&config, "tsBuildInfoFile"),
        Some(slash(&project, "node_modules/.cache/tsfiles/tsconfig.tsbuildinfo").as_str())
    );
}

#[test]
fn test_explicit_build_info_is_absolutized() {
    let project = Project::new();
    project.write(
        "tsconfig.json",
        r#"{ "compilerOptions": { "incremental": true, "tsBuildInfoFile": ".state/app.tsbuildinfo" } }"#,
    );
    project.write("a.ts", "");
    let record = project.record("tsconfig.json");
    let closure = closure_for(&project, "tsconfig.json", "a.ts");

    let config = synthesize(&record, &closure, &in_place(&project, ""));
    assert_eq!(
        option_str(&config, "tsBuildInfoFile"),
        Some(slash(&project, ".state/app.tsbuildinfo").as_str())
    );
}

#[test]
fn test_type_roots_added_when_staged_elsewhere() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    project.mkdir("node_modules/@types/node");
    project.write("a.ts", "");
    let record = project.record("tsconfig.json");
    let closure = closure_for(&project, "tsconfig.json", "a.ts");

    let staged = SynthesisOptions {
        output_dir: std::env::temp_dir(),
    };
    let config = synthesize(&record, &closure, &staged);
    let roots = config
        .compiler_options
        .get("typeRoots")
        .expect("typeRoots")
        .string_items();
    assert_eq!(roots.first(), Some(&slash(&project, "node_modules/@types")));
}

#[test]
fn test_user_type_roots_are_preserved() {
    let project = Project::new();
    project.write("tsconfig.json", r#"{ "compilerOptions": { "typeRoots": ["./typings"] } }"#);
    project.write("a.ts", "");
    let record = project.record("tsconfig.json");
    let closure = closure_for(&project, "tsconfig.json", "a.ts");

    let config = synthesize(&record, &closure, &SynthesisOptions {
        output_dir: std::env::temp_dir(),
    });
    assert_eq!(
        config.compiler_options.get("typeRoots").expect("typeRoots").string_items(),
        vec![slash(&project, "typings")]
    );
}

#[test]
fn test_include_becomes_declaration_only() {
    let project = Project::new();
    project.write("tsconfig.json", r#"{ "include": ["src/**/*.ts", "types"] }"#);
    let record = project.record("tsconfig.json");

    assert_eq!(
        declaration_includes(&record),
        vec![slash(&project, "src/**/*.d.ts"), slash(&project, "types/**/*.d.ts")]
    );
}

#[test]
fn test_written_file_is_removed_on_drop() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    project.write("a.ts", "");
    let record = project.record("tsconfig.json");
    let closure = closure_for(&project, "tsconfig.json", "a.ts");
    let config = synthesize(&record, &closure, &in_place(&project, ""));

    let file = write_isolated(&config, project.root()).expect("write synthesized config");
    let path = file.path().to_path_buf();
    let name = path.file_name().expect("name").to_string_lossy().into_owned();
    assert!(name.starts_with("tsconfig.tsfiles-") && name.ends_with(".json"));

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read back")).expect("json");
    assert_eq!(written["files"][0], serde_json::json!(slash(&project, "a.ts")));
    assert!(written.get("extends").is_none());
    assert!(StagingRegistry::global().contains(&path));

    drop(file);
    assert!(!path.exists());
    assert!(!StagingRegistry::global().contains(&path));
}

#[test]
fn test_staging_prefers_project_directory() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    assert_eq!(staging_dir(&project.record("tsconfig.json")), project.root());
}
