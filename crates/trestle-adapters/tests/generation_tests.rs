//! End-to-end generation runs over the filesystem adapters.

use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use trestle_adapters::{
    CargoManifestWriter, LocalFilesystem, MemoryFilesystem, ScriptedProcessRunner,
};
use trestle_core::{
    application::{
        CancellationToken, Filesystem, GenerationOptions, GenerationService, GenerationStatus,
        services::{GenerationError, Stage},
    },
    error::TrestleResult,
    domain::{
        Blueprint, BlueprintId, BlueprintMetadata, DependencySpec, Expression, FileContent,
        FileEntry, HookSpec, Overrides, RelativePath, Template, ValidationErrorKind, Value,
        VariableKind, VariableSpec,
    },
};

const OUT: &str = "/work/out";

// ── Helpers ───────────────────────────────────────────────────────────────────

fn rp(path: &str) -> RelativePath {
    RelativePath::sanitize(path).unwrap()
}

fn tpl(source: &str) -> Template {
    Template::parse(source).unwrap()
}

fn rendered(source: &str) -> FileContent {
    FileContent::Template(tpl(source))
}

fn literal(text: &str) -> FileContent {
    FileContent::Literal(text.as_bytes().to_vec())
}

fn file(source: &str, content: FileContent) -> FileEntry {
    FileEntry::new(rp(source), content, tpl(source))
}

fn overrides(pairs: &[(&str, Value)]) -> Overrides {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn base() -> trestle_core::domain::BlueprintBuilder {
    Blueprint::builder()
        .id(BlueprintId::new("demo", "1.0.0"))
        .metadata(BlueprintMetadata::new("Demo"))
}

/// `{Name: required string, Feature: bool = false}`, one conditional file.
fn feature_blueprint() -> Blueprint {
    base()
        .variable(VariableSpec::new("Name", VariableKind::String).required())
        .variable(VariableSpec::new("Feature", VariableKind::Bool).with_default(false))
        .file(file("README.md", rendered("# {{ Name }}\n")))
        .file(
            FileEntry::new(
                rp("feature.rs"),
                literal("pub fn feature() {}\n"),
                tpl("src/feature.rs"),
            )
            .when(Expression::parse("Feature == true").unwrap()),
        )
        .build()
        .unwrap()
}

fn service(fs: &MemoryFilesystem) -> GenerationService {
    GenerationService::new(Box::new(fs.clone()), Box::new(ScriptedProcessRunner::new()))
        .with_manifest_writer(Box::new(CargoManifestWriter::new()))
}

fn files_under(fs: &MemoryFilesystem, root: &str) -> Vec<PathBuf> {
    fs.list_files()
        .into_iter()
        .filter(|p| p.starts_with(root))
        .collect()
}

fn no_scratch_left(fs: &MemoryFilesystem) -> bool {
    fs.list_dirs()
        .iter()
        .chain(fs.list_files().iter())
        .all(|p| !p.to_string_lossy().contains(".trestle-"))
}

/// Cancels `token` the moment the wrapped filesystem sees `trigger`.
struct CancelOn {
    inner: MemoryFilesystem,
    token: CancellationToken,
    trigger: Trigger,
}

enum Trigger {
    /// First existence check, which happens while planning.
    FirstExists,
    /// A rename whose destination is this path.
    RenameInto(PathBuf),
}

impl Filesystem for CancelOn {
    fn create_dir_all(&self, path: &Path) -> TrestleResult<()> {
        self.inner.create_dir_all(path)
    }
    fn write_file(&self, path: &Path, content: &[u8]) -> TrestleResult<()> {
        self.inner.write_file(path, content)
    }
    fn read_file(&self, path: &Path) -> TrestleResult<Vec<u8>> {
        self.inner.read_file(path)
    }
    fn set_permissions(&self, path: &Path, executable: bool) -> TrestleResult<()> {
        self.inner.set_permissions(path, executable)
    }
    fn exists(&self, path: &Path) -> bool {
        if matches!(self.trigger, Trigger::FirstExists) {
            self.token.cancel();
        }
        self.inner.exists(path)
    }
    fn remove_file(&self, path: &Path) -> TrestleResult<()> {
        self.inner.remove_file(path)
    }
    fn remove_dir_all(&self, path: &Path) -> TrestleResult<()> {
        self.inner.remove_dir_all(path)
    }
    fn rename(&self, from: &Path, to: &Path) -> TrestleResult<()> {
        let outcome = self.inner.rename(from, to);
        if matches!(&self.trigger, Trigger::RenameInto(target) if target == to) {
            self.token.cancel();
        }
        outcome
    }
}

// ── Scenario ──────────────────────────────────────────────────────────────────

#[test]
fn condition_false_excludes_the_file() {
    let fs = MemoryFilesystem::new();
    let result = service(&fs).generate(
        &feature_blueprint(),
        &overrides(&[("Name", "x".into())]),
        OUT,
        &CancellationToken::new(),
    );

    assert_eq!(result.status, GenerationStatus::Completed, "{:?}", result.errors);
    assert_eq!(result.files.len(), 1);
    assert_eq!(fs.contents("/work/out/README.md").as_deref(), Some("# x\n"));
    assert!(!fs.exists(Path::new("/work/out/src/feature.rs")));
    assert!(no_scratch_left(&fs));
}

#[test]
fn condition_true_includes_exactly_one_more_file() {
    let fs = MemoryFilesystem::new();
    let result = service(&fs).generate(
        &feature_blueprint(),
        &overrides(&[("Name", "x".into()), ("Feature", true.into())]),
        OUT,
        &CancellationToken::new(),
    );

    assert!(result.is_success());
    let paths: Vec<&str> = result.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["README.md", "src/feature.rs"]);
    assert_eq!(
        fs.contents("/work/out/src/feature.rs").as_deref(),
        Some("pub fn feature() {}\n")
    );
}

#[test]
fn string_overrides_are_coerced() {
    let fs = MemoryFilesystem::new();
    let result = service(&fs).generate(
        &feature_blueprint(),
        &overrides(&[("Name", "x".into()), ("Feature", "yes".into())]),
        OUT,
        &CancellationToken::new(),
    );
    assert!(result.is_success());
    assert_eq!(result.files.len(), 2);
}

// ── Resolve / Plan failures ───────────────────────────────────────────────────

#[test]
fn missing_required_variable_aborts_before_io() {
    let fs = MemoryFilesystem::new();
    let result = service(&fs).generate(
        &feature_blueprint(),
        &Overrides::new(),
        OUT,
        &CancellationToken::new(),
    );

    assert_eq!(result.status, GenerationStatus::Aborted);
    match result.errors.as_slice() {
        [GenerationError::Validation(errors)] => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].variable, "Name");
            assert_eq!(errors[0].kind, ValidationErrorKind::MissingRequired);
        }
        other => panic!("unexpected errors: {other:?}"),
    }
    assert!(fs.list_files().is_empty());
    assert!(fs.list_dirs().is_empty());
}

#[test]
fn escaping_destination_is_unsafe() {
    let blueprint = base()
        .variable(VariableSpec::new("Name", VariableKind::String).required())
        .file(FileEntry::new(
            rp("passwd"),
            literal("root"),
            tpl("{{ Name }}/passwd"),
        ))
        .build()
        .unwrap();

    let fs = MemoryFilesystem::new();
    let result = service(&fs).generate(
        &blueprint,
        &overrides(&[("Name", "../../etc".into())]),
        OUT,
        &CancellationToken::new(),
    );

    assert_eq!(result.status, GenerationStatus::Aborted);
    assert!(matches!(
        result.errors.as_slice(),
        [GenerationError::UnsafeDestination { .. }]
    ));
    assert!(fs.list_files().is_empty());
}

#[test]
fn conditional_entries_colliding_at_runtime_are_duplicates() {
    let blueprint = base()
        .variable(VariableSpec::new("A", VariableKind::Bool).with_default(true))
        .file(file("one.txt", literal("1")).when(Expression::parse("A").unwrap()))
        .file(
            FileEntry::new(rp("two.txt"), literal("2"), tpl("one.txt"))
                .when(Expression::parse("A").unwrap()),
        )
        .build()
        .unwrap();

    let fs = MemoryFilesystem::new();
    let result =
        service(&fs).generate(&blueprint, &Overrides::new(), OUT, &CancellationToken::new());

    assert_eq!(result.status, GenerationStatus::Aborted);
    assert_eq!(
        result.errors,
        vec![GenerationError::DuplicateDestination {
            path: "one.txt".into()
        }]
    );
}

#[test]
fn existing_destination_aborts_without_overwrite() {
    let fs = MemoryFilesystem::new().with_file("/work/out/README.md", "keep me");
    let result = service(&fs).generate(
        &feature_blueprint(),
        &overrides(&[("Name", "x".into())]),
        OUT,
        &CancellationToken::new(),
    );

    assert_eq!(result.status, GenerationStatus::Aborted);
    assert!(matches!(
        result.errors.as_slice(),
        [GenerationError::DestinationExists { .. }]
    ));
    assert_eq!(fs.contents("/work/out/README.md").as_deref(), Some("keep me"));
}

#[test]
fn overwrite_replaces_existing_files() {
    let fs = MemoryFilesystem::new()
        .with_file("/work/out/README.md", "old")
        .with_file("/work/out/NOTES.md", "untouched");
    let result = service(&fs)
        .with_options(GenerationOptions {
            overwrite: true,
            ..GenerationOptions::default()
        })
        .generate(
            &feature_blueprint(),
            &overrides(&[("Name", "x".into())]),
            OUT,
            &CancellationToken::new(),
        );

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(fs.contents("/work/out/README.md").as_deref(), Some("# x\n"));
    assert_eq!(fs.contents("/work/out/NOTES.md").as_deref(), Some("untouched"));
    assert!(no_scratch_left(&fs));
}

#[test]
fn conflicting_pins_abort() {
    let blueprint = base()
        .file(file("a.txt", literal("a")))
        .dependency(DependencySpec::new("serde", "=1.0.100").unwrap())
        .dependency(DependencySpec::new("serde", "=1.0.200").unwrap())
        .build()
        .unwrap();

    let fs = MemoryFilesystem::new();
    let result =
        service(&fs).generate(&blueprint, &Overrides::new(), OUT, &CancellationToken::new());

    assert_eq!(result.status, GenerationStatus::Aborted);
    assert!(matches!(
        result.errors.as_slice(),
        [GenerationError::DependencyConflict { module, .. }] if module == "serde"
    ));
    assert!(fs.list_files().is_empty());
}

// ── Stage / Commit ────────────────────────────────────────────────────────────

#[test]
fn render_failure_leaves_destination_untouched() {
    let blueprint = base()
        .variable(VariableSpec::new("Name", VariableKind::String).with_default("x"))
        .file(file("ok.txt", rendered("{{ Name }}")))
        .file(file(
            "broken.txt",
            rendered("{% for c in Name %}{{ c }}{% endfor %}"),
        ))
        .build()
        .unwrap();

    let fs = MemoryFilesystem::new().with_file("/work/out/keep.txt", "keep");
    let result =
        service(&fs).generate(&blueprint, &Overrides::new(), OUT, &CancellationToken::new());

    assert_eq!(result.status, GenerationStatus::PartiallyFailed);
    assert!(result.files.is_empty());
    assert!(matches!(
        result.errors.as_slice(),
        [GenerationError::Render { file, .. }] if file == "broken.txt"
    ));
    assert_eq!(
        files_under(&fs, "/"),
        vec![PathBuf::from("/work/out/keep.txt")]
    );
    assert!(no_scratch_left(&fs));
}

#[test]
fn commit_failure_rolls_back_moves_and_backups() {
    let blueprint = base()
        .file(file("a.txt", literal("new a")))
        .file(file("src/b.rs", literal("new b")))
        .build()
        .unwrap();

    let fs = MemoryFilesystem::new()
        .with_file("/work/out/a.txt", "old a")
        .with_file("/work/out/keep.txt", "keep");
    fs.fail_on("/work/out/src/b.rs");

    let result = service(&fs)
        .with_options(GenerationOptions {
            overwrite: true,
            ..GenerationOptions::default()
        })
        .generate(&blueprint, &Overrides::new(), OUT, &CancellationToken::new());

    assert_eq!(result.status, GenerationStatus::Aborted);
    assert!(result.files.is_empty());
    assert!(matches!(
        result.errors.first(),
        Some(GenerationError::Commit { .. })
    ));
    assert_eq!(fs.contents("/work/out/a.txt").as_deref(), Some("old a"));
    assert_eq!(fs.contents("/work/out/keep.txt").as_deref(), Some("keep"));
    assert!(!fs.exists(Path::new("/work/out/src")));
    assert!(no_scratch_left(&fs));
}

#[test]
fn output_is_deterministic_across_runs_and_modes() {
    let blueprint = base()
        .variable(VariableSpec::new("Name", VariableKind::String).with_default("My App"))
        .variable(
            VariableSpec::new("Features", VariableKind::List).with_default(vec!["auth", "db"]),
        )
        .file(file(
            "Cargo.toml",
            rendered("[package]\nname = \"{{ Name | kebab_case }}\"\n"),
        ))
        .file(file(
            "src/lib.rs",
            rendered("{% for f in Features %}pub mod {{ f }};\n{% endfor %}"),
        ))
        .file(FileEntry::new(
            rp("mod.rs"),
            rendered("// {{ Name }}\n"),
            tpl("src/{{ Name | snake_case }}.rs"),
        ))
        .build()
        .unwrap();

    let run = |parallel: bool| {
        let fs = MemoryFilesystem::new();
        let result = service(&fs)
            .with_options(GenerationOptions {
                parallel,
                ..GenerationOptions::default()
            })
            .generate(&blueprint, &Overrides::new(), OUT, &CancellationToken::new());
        assert!(result.is_success(), "{:?}", result.errors);
        files_under(&fs, OUT)
            .into_iter()
            .map(|p| {
                let content = fs.contents(&p).unwrap_or_default();
                (p, content)
            })
            .collect::<Vec<_>>()
    };

    let first = run(true);
    assert_eq!(first, run(true));
    assert_eq!(first, run(false));
    assert!(first.contains(&(
        PathBuf::from("/work/out/src/my_app.rs"),
        "// My App\n".to_string()
    )));
    assert!(first.contains(&(
        PathBuf::from("/work/out/src/lib.rs"),
        "pub mod auth;\npub mod db;\n".to_string()
    )));
}

#[test]
fn failed_stage_removes_parent_directories_it_created() {
    let blueprint = base()
        .variable(VariableSpec::new("Name", VariableKind::String).with_default("x"))
        .file(file(
            "broken.txt",
            rendered("{% for c in Name %}{{ c }}{% endfor %}"),
        ))
        .dependency(DependencySpec::new("serde", "1").unwrap())
        .build()
        .unwrap();

    let fs = MemoryFilesystem::new().with_file("/work/keep.txt", "keep");
    let result = service(&fs).generate(
        &blueprint,
        &Overrides::new(),
        "/work/deep/nested/out",
        &CancellationToken::new(),
    );

    assert_eq!(result.status, GenerationStatus::PartiallyFailed);
    assert!(result.dependencies.is_empty());
    assert!(!fs.exists(Path::new("/work/deep")));
    assert!(fs.exists(Path::new("/work/keep.txt")));
}

// ── Zero planned files ────────────────────────────────────────────────────────

#[test]
fn no_planned_files_still_creates_the_output_directory() {
    let blueprint = base()
        .variable(VariableSpec::new("Feature", VariableKind::Bool).with_default(false))
        .file(file("only.txt", literal("x")).when(Expression::parse("Feature").unwrap()))
        .dependency(DependencySpec::new("log", "0.4").unwrap())
        .hook(HookSpec::new("fmt", vec![tpl("cargo"), tpl("fmt")]))
        .build()
        .unwrap();

    let fs = MemoryFilesystem::new();
    let runner = ScriptedProcessRunner::new();
    let result = GenerationService::new(Box::new(fs.clone()), Box::new(runner.clone()))
        .with_manifest_writer(Box::new(CargoManifestWriter::new()))
        .generate(&blueprint, &Overrides::new(), OUT, &CancellationToken::new());

    assert_eq!(result.status, GenerationStatus::Completed, "{:?}", result.errors);
    assert!(fs.exists(Path::new(OUT)));
    assert!(fs.contents("/work/out/Cargo.toml").unwrap().contains("log"));
    assert_eq!(result.dependencies.len(), 1);
    assert_eq!(runner.call_lines(), vec!["cargo fmt"]);
    assert_eq!(runner.calls()[0].working_dir, PathBuf::from(OUT));
    assert!(no_scratch_left(&fs));
}

#[cfg(unix)]
#[test]
fn hooks_only_blueprint_runs_in_a_fresh_real_directory() {
    let blueprint = base()
        .hook(
            HookSpec::new("mark", vec![tpl("sh"), tpl("-c"), tpl("echo ok > marker")]).required(),
        )
        .build()
        .unwrap();

    let temp = tempfile::tempdir().unwrap();
    let output = temp.path().join("nested").join("out");
    let result = GenerationService::new(
        Box::new(LocalFilesystem::new()),
        Box::new(trestle_adapters::SystemProcessRunner::new()),
    )
    .generate(&blueprint, &Overrides::new(), &output, &CancellationToken::new());

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(std::fs::read_to_string(output.join("marker")).unwrap(), "ok\n");
}

// ── Merge ─────────────────────────────────────────────────────────────────────

#[test]
fn dependencies_merge_into_the_generated_manifest() {
    let blueprint = base()
        .variable(VariableSpec::new("Json", VariableKind::Bool).with_default(true))
        .file(file("Cargo.toml", literal("[package]\nname = \"demo\"\n")))
        .dependency(DependencySpec::new("serde", "1.0").unwrap().features(["derive"]))
        .dependency(
            DependencySpec::new("serde", "1.0.150")
                .unwrap()
                .when(Expression::parse("Json").unwrap()),
        )
        .dependency(
            DependencySpec::new("tempfile", "3")
                .unwrap()
                .kind(trestle_core::domain::DependencyKind::Dev),
        )
        .build()
        .unwrap();

    let fs = MemoryFilesystem::new();
    let result =
        service(&fs).generate(&blueprint, &Overrides::new(), OUT, &CancellationToken::new());

    assert!(result.is_success(), "{:?}", result.errors);
    let manifest = fs.contents("/work/out/Cargo.toml").unwrap();
    assert!(manifest.contains("name = \"demo\""));
    assert!(manifest.contains("[dependencies]"));
    assert!(manifest.contains("version = \"1.0.150\""));
    assert!(manifest.contains("features = [\"derive\"]"));
    assert!(manifest.contains("[dev-dependencies]"));
    assert_eq!(result.dependencies.len(), 2);

    let cargo = result
        .files
        .iter()
        .find(|f| f.path.as_str() == "Cargo.toml")
        .unwrap();
    assert_eq!(cargo.size, manifest.len() as u64);
}

#[test]
fn manifest_failure_is_partial_and_hooks_still_run() {
    let blueprint = base()
        .file(file("a.txt", literal("a")))
        .dependency(DependencySpec::new("log", "0.4").unwrap())
        .hook(HookSpec::new("after", vec![tpl("echo"), tpl("done")]))
        .build()
        .unwrap();

    let fs = MemoryFilesystem::new();
    fs.fail_on("/work/out/Cargo.toml");
    let runner = ScriptedProcessRunner::new();

    let result = GenerationService::new(Box::new(fs.clone()), Box::new(runner.clone()))
        .with_manifest_writer(Box::new(CargoManifestWriter::new()))
        .generate(&blueprint, &Overrides::new(), OUT, &CancellationToken::new());

    assert_eq!(result.status, GenerationStatus::PartiallyFailed);
    assert!(matches!(
        result.errors.as_slice(),
        [GenerationError::Manifest { .. }]
    ));
    assert_eq!(fs.contents("/work/out/a.txt").as_deref(), Some("a"));
    assert_eq!(runner.call_lines(), vec!["echo done"]);
}

// ── Cancellation ──────────────────────────────────────────────────────────────

#[test]
fn cancelled_before_start_aborts() {
    let fs = MemoryFilesystem::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = service(&fs).generate(
        &feature_blueprint(),
        &overrides(&[("Name", "x".into())]),
        OUT,
        &cancel,
    );

    assert_eq!(result.status, GenerationStatus::Aborted);
    assert_eq!(
        result.errors,
        vec![GenerationError::Cancelled {
            stage: Stage::Resolve
        }]
    );
    assert!(fs.list_files().is_empty());
}

#[test]
fn cancelled_after_planning_touches_nothing() {
    let token = CancellationToken::new();
    let inner = MemoryFilesystem::new();
    let fs = CancelOn {
        inner: inner.clone(),
        token: token.clone(),
        trigger: Trigger::FirstExists,
    };

    let result = GenerationService::new(Box::new(fs), Box::new(ScriptedProcessRunner::new()))
        .generate(
            &feature_blueprint(),
            &overrides(&[("Name", "x".into())]),
            OUT,
            &token,
        );

    assert_eq!(result.status, GenerationStatus::Aborted);
    assert_eq!(
        result.errors,
        vec![GenerationError::Cancelled { stage: Stage::Stage }]
    );
    assert!(inner.list_files().is_empty());
    assert!(inner.list_dirs().is_empty());
}

#[test]
fn cancelled_after_commit_keeps_committed_files() {
    let blueprint = base()
        .file(file("a.txt", literal("a")))
        .dependency(DependencySpec::new("log", "0.4").unwrap())
        .hook(HookSpec::new("after", vec![tpl("echo")]))
        .build()
        .unwrap();

    let token = CancellationToken::new();
    let inner = MemoryFilesystem::new();
    let fs = CancelOn {
        inner: inner.clone(),
        token: token.clone(),
        trigger: Trigger::RenameInto(PathBuf::from(OUT)),
    };
    let runner = ScriptedProcessRunner::new();

    let result = GenerationService::new(Box::new(fs), Box::new(runner.clone()))
        .with_manifest_writer(Box::new(CargoManifestWriter::new()))
        .generate(&blueprint, &Overrides::new(), OUT, &token);

    assert_eq!(result.status, GenerationStatus::PartiallyFailed);
    assert_eq!(
        result.errors,
        vec![GenerationError::Cancelled { stage: Stage::Merge }]
    );
    assert_eq!(result.files.len(), 1);
    assert!(result.dependencies.is_empty());
    assert_eq!(inner.contents("/work/out/a.txt").as_deref(), Some("a"));
    assert!(!inner.exists(Path::new("/work/out/Cargo.toml")));
    assert!(runner.calls().is_empty());
}

// ── Real filesystem ───────────────────────────────────────────────────────────

#[test]
fn generates_into_a_real_directory() {
    let blueprint = base()
        .variable(VariableSpec::new("Name", VariableKind::String).with_default("tool"))
        .file(file("bin/run.sh", rendered("#!/bin/sh\necho {{ Name }}\n")).executable())
        .file(file("data.bin", FileContent::Literal(vec![0, 255, 1, 254])))
        .build()
        .unwrap();

    let temp = tempfile::tempdir().unwrap();
    let output = temp.path().join("project");
    let result = GenerationService::new(
        Box::new(LocalFilesystem::new()),
        Box::new(ScriptedProcessRunner::new()),
    )
    .generate(&blueprint, &Overrides::new(), &output, &CancellationToken::new());

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(
        std::fs::read_to_string(output.join("bin/run.sh")).unwrap(),
        "#!/bin/sh\necho tool\n"
    );
    assert_eq!(
        std::fs::read(output.join("data.bin")).unwrap(),
        vec![0, 255, 1, 254]
    );

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(output.join("bin/run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    let leftovers: Vec<_> = std::fs::read_dir(temp.path())
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(leftovers, vec!["project"]);
}
