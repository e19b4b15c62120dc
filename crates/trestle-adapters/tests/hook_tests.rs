//! Hook execution semantics, driven through a mocked process runner.

use std::path::PathBuf;
use std::time::Duration;

use mockall::{Sequence, mock};
use trestle_adapters::MemoryFilesystem;
use trestle_core::{
    application::{
        ApplicationError, CancellationToken, GenerationOptions, GenerationService,
        GenerationStatus,
        ports::{CommandSpec, ProcessOutput, ProcessRunner, Termination},
        services::{GenerationError, HookStatus},
    },
    domain::{
        Blueprint, BlueprintId, BlueprintMetadata, Expression, FileContent, FileEntry, HookSpec,
        Overrides, RelativePath, Template, VariableKind, VariableSpec,
    },
    error::TrestleResult,
};

mock! {
    pub Runner {}

    impl ProcessRunner for Runner {
        fn run(
            &self,
            command: &CommandSpec,
            cancel: &CancellationToken,
        ) -> TrestleResult<ProcessOutput>;
    }
}

const OUT: &str = "/work/app";

fn exited(code: i32) -> ProcessOutput {
    ProcessOutput {
        exit_code: Some(code),
        stdout: String::new(),
        stderr: if code == 0 { String::new() } else { "boom".into() },
        termination: Termination::Exited,
        duration: Duration::from_millis(5),
    }
}

fn hook(name: &str, program: &str) -> HookSpec {
    HookSpec::new(name, vec![Template::parse(program).unwrap()])
}

fn blueprint(hooks: Vec<HookSpec>) -> Blueprint {
    let mut builder = Blueprint::builder()
        .id(BlueprintId::new("hooks", "0.1.0"))
        .metadata(BlueprintMetadata::new("Hooks"))
        .variable(VariableSpec::new("name", VariableKind::String).with_default("demo"))
        .variable(VariableSpec::new("git", VariableKind::Bool).with_default(false))
        .file(FileEntry::new(
            RelativePath::sanitize("README.md").unwrap(),
            FileContent::Literal(b"readme".to_vec()),
            Template::parse("README.md").unwrap(),
        ));
    for hook in hooks {
        builder = builder.hook(hook);
    }
    builder.build().unwrap()
}

fn run(runner: MockRunner, blueprint: &Blueprint) -> trestle_core::application::GenerationResult {
    GenerationService::new(Box::new(MemoryFilesystem::new()), Box::new(runner)).generate(
        blueprint,
        &Overrides::new(),
        OUT,
        &CancellationToken::new(),
    )
}

fn program_is(
    name: &'static str,
) -> impl Fn(&CommandSpec, &CancellationToken) -> bool + Send + 'static {
    move |command, _| command.program == name
}

#[test]
fn hooks_run_in_declaration_order_inside_the_output() {
    let mut runner = MockRunner::new();
    let mut seq = Sequence::new();
    runner
        .expect_run()
        .withf(|command, _| {
            command.program == "first"
                && command.args == ["demo"]
                && command.working_dir == PathBuf::from(OUT)
                && command.env.get("TRESTLE_OUTPUT_DIR").map(String::as_str) == Some(OUT)
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(exited(0)));
    runner
        .expect_run()
        .withf(|command, _| {
            command.program == "second" && command.working_dir == PathBuf::from(OUT).join("sub")
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(exited(0)));

    let blueprint = blueprint(vec![
        HookSpec::new(
            "first",
            vec![
                Template::parse("first").unwrap(),
                Template::parse("{{ name }}").unwrap(),
            ],
        ),
        hook("second", "second").in_dir(Template::parse("sub").unwrap()),
    ]);
    let result = run(runner, &blueprint);

    assert!(result.is_success(), "{:?}", result.errors);
    let statuses: Vec<HookStatus> = result.hooks.iter().map(|h| h.status).collect();
    assert_eq!(statuses, vec![HookStatus::Succeeded, HookStatus::Succeeded]);
    assert_eq!(result.hooks[0].command, "first demo");
}

#[test]
fn optional_hook_failure_is_recorded_and_run_continues() {
    let mut runner = MockRunner::new();
    runner
        .expect_run()
        .withf(program_is("lint"))
        .times(1)
        .returning(|_, _| Ok(exited(1)));
    runner
        .expect_run()
        .withf(program_is("fmt"))
        .times(1)
        .returning(|_, _| Ok(exited(0)));

    let result = run(runner, &blueprint(vec![hook("lint", "lint"), hook("fmt", "fmt")]));

    assert_eq!(result.status, GenerationStatus::Completed);
    assert_eq!(result.hooks[0].status, HookStatus::Failed);
    assert_eq!(result.hooks[0].exit_code, Some(1));
    assert_eq!(result.hooks[0].stderr, "boom");
    assert_eq!(result.hooks[1].status, HookStatus::Succeeded);
    assert!(matches!(
        result.errors.as_slice(),
        [GenerationError::Hook { hook, .. }] if hook == "lint"
    ));
}

#[test]
fn required_hook_failure_skips_the_rest() {
    let mut runner = MockRunner::new();
    runner
        .expect_run()
        .withf(program_is("install"))
        .times(1)
        .returning(|_, _| Ok(exited(2)));
    runner.expect_run().withf(program_is("after")).never();

    let result = run(
        runner,
        &blueprint(vec![
            hook("install", "install").required(),
            hook("after", "after"),
        ]),
    );

    assert_eq!(result.status, GenerationStatus::PartiallyFailed);
    let statuses: Vec<HookStatus> = result.hooks.iter().map(|h| h.status).collect();
    assert_eq!(statuses, vec![HookStatus::Failed, HookStatus::Skipped]);
    assert_eq!(result.files.len(), 1);
}

#[test]
fn timeouts_come_from_the_hook_or_the_options() {
    let mut runner = MockRunner::new();
    runner
        .expect_run()
        .withf(|command, _| command.program == "own" && command.timeout == Duration::from_secs(5))
        .times(1)
        .returning(|_, _| Ok(exited(0)));
    runner
        .expect_run()
        .withf(|command, _| {
            command.program == "default" && command.timeout == Duration::from_secs(42)
        })
        .times(1)
        .returning(|command, _| {
            Ok(ProcessOutput {
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                termination: Termination::TimedOut,
                duration: command.timeout,
            })
        });

    let blueprint = blueprint(vec![
        hook("own", "own").timeout(Duration::from_secs(5)),
        hook("default", "default"),
    ]);
    let result = GenerationService::new(Box::new(MemoryFilesystem::new()), Box::new(runner))
        .with_options(GenerationOptions {
            hook_timeout: Duration::from_secs(42),
            ..GenerationOptions::default()
        })
        .generate(&blueprint, &Overrides::new(), OUT, &CancellationToken::new());

    assert_eq!(result.hooks[1].status, HookStatus::TimedOut);
    assert_eq!(result.status, GenerationStatus::Completed);
}

#[test]
fn hooks_whose_condition_is_false_never_run() {
    let mut runner = MockRunner::new();
    runner.expect_run().never();

    let blueprint = blueprint(vec![
        hook("init", "git").when(Expression::parse("git == true").unwrap()),
    ]);
    let result = run(runner, &blueprint);

    assert!(result.is_success());
    assert!(result.hooks.is_empty());
}

#[test]
fn disabled_hooks_never_run() {
    let mut runner = MockRunner::new();
    runner.expect_run().never();

    let result = GenerationService::new(Box::new(MemoryFilesystem::new()), Box::new(runner))
        .with_options(GenerationOptions {
            run_hooks: false,
            ..GenerationOptions::default()
        })
        .generate(
            &blueprint(vec![hook("fmt", "fmt")]),
            &Overrides::new(),
            OUT,
            &CancellationToken::new(),
        );

    assert!(result.is_success());
    assert!(result.hooks.is_empty());
}

#[test]
fn unstartable_hook_is_errored() {
    let mut runner = MockRunner::new();
    runner.expect_run().times(1).returning(|command, _| {
        Err(ApplicationError::ProcessFailed {
            program: command.program.clone(),
            reason: "not found".into(),
        }
        .into())
    });

    let result = run(runner, &blueprint(vec![hook("missing", "nope").required()]));

    assert_eq!(result.status, GenerationStatus::PartiallyFailed);
    assert_eq!(result.hooks[0].status, HookStatus::Errored);
    assert!(result.hooks[0].stderr.contains("not found"));
}

#[test]
fn working_dir_may_not_escape_the_output() {
    let mut runner = MockRunner::new();
    runner.expect_run().never();

    let blueprint = blueprint(vec![
        hook("escape", "ls").in_dir(Template::parse("../..").unwrap()),
    ]);
    let result = run(runner, &blueprint);

    assert_eq!(result.hooks[0].status, HookStatus::Errored);
    assert_eq!(result.status, GenerationStatus::Completed);
}
