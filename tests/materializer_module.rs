#[path = "test_support/mod.rs"]
mod test_support;

use stagehand::lifecycle::{LifecycleState, TeardownPolicy};
use stagehand::materializer::{MaterializeError, Materializer, ScaffoldTool};
use stagehand::options::{Authentication, ProjectOptions};
use stagehand::shared::ids::TemplateId;
use std::fs;
use std::time::{Duration, Instant};
use tempfile::tempdir;
use test_support::{
    entries_in, materializer_for, write_failing_scaffold_tool, write_fake_scaffold_tool,
    write_script,
};

fn template() -> TemplateId {
    TemplateId::parse("arcus-webapi").expect("template id")
}

#[test]
fn materialize_generates_into_a_fresh_directory_with_rendered_options() {
    let tools = tempdir().expect("tools dir");
    let root = tempdir().expect("projects root");
    let materializer = materializer_for(&write_fake_scaffold_tool(tools.path()));

    let options = ProjectOptions::new()
        .with_project_name("Orders")
        .and_then(|options| {
            options.with(&Authentication::SharedAccessKey {
                header: "x-api-key".to_string(),
                secret_name: "ApiKey".to_string(),
            })
        })
        .and_then(|options| options.with_toggle("exclude-correlation", true))
        .expect("options");

    let project = materializer
        .materialize(&template(), &options, root.path())
        .expect("materialize");

    assert_eq!(project.state(), LifecycleState::Created);
    assert!(project.directory().starts_with(root.path()));
    assert!(project
        .id()
        .as_str()
        .starts_with("arcus-webapi-"));
    assert!(project.directory().join("src/Program.cs").is_file());

    let args = fs::read_to_string(project.directory().join("args.txt")).expect("args");
    assert!(
        args.starts_with("new arcus-webapi --name Orders --authentication SharedAccessKey"),
        "{args}"
    );
    assert!(args.contains("--exclude-correlation true"), "{args}");
    assert!(
        args.trim_end()
            .ends_with(&format!("--output {}", project.directory().display())),
        "{args}"
    );
    assert_eq!(project.options(), &options);
}

#[test]
fn two_materializations_never_share_a_directory() {
    let tools = tempdir().expect("tools dir");
    let root = tempdir().expect("projects root");
    let materializer = materializer_for(&write_fake_scaffold_tool(tools.path()));

    let first = materializer
        .materialize(&template(), &ProjectOptions::new(), root.path())
        .expect("first");
    let second = materializer
        .materialize(&template(), &ProjectOptions::new(), root.path())
        .expect("second");

    assert_ne!(first.directory(), second.directory());
    assert_ne!(first.id(), second.id());
    assert_eq!(entries_in(root.path()).len(), 2);
}

#[test]
fn missing_projects_root_is_created() {
    let tools = tempdir().expect("tools dir");
    let base = tempdir().expect("base");
    let root = base.path().join("nested/projects");
    let materializer = materializer_for(&write_fake_scaffold_tool(tools.path()));

    let project = materializer
        .materialize(&template(), &ProjectOptions::new(), &root)
        .expect("materialize");
    assert!(project.directory().starts_with(&root));
}

#[test]
fn failed_generation_surfaces_stderr_and_leaves_no_directory() {
    let tools = tempdir().expect("tools dir");
    let root = tempdir().expect("projects root");
    let tool = write_failing_scaffold_tool(
        tools.path(),
        "No templates found matching: arcus-webapi.",
        103,
    );

    let err = materializer_for(&tool)
        .materialize(&template(), &ProjectOptions::new(), root.path())
        .expect_err("generation fails");

    match err {
        MaterializeError::ProjectCreation {
            template,
            exit_code,
            stderr,
        } => {
            assert_eq!(template, "arcus-webapi");
            assert_eq!(exit_code, Some(103));
            assert_eq!(stderr, "No templates found matching: arcus-webapi.\n");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(entries_in(root.path()).is_empty());
}

#[test]
fn missing_tool_is_reported_without_leaving_a_directory() {
    let root = tempdir().expect("projects root");
    let materializer = Materializer::new(ScaffoldTool::new(
        root.path().join("no-such-dotnet").display().to_string(),
        Duration::from_secs(1),
    ));

    let err = materializer
        .materialize(&template(), &ProjectOptions::new(), root.path())
        .expect_err("tool missing");
    assert!(matches!(err, MaterializeError::ToolMissing { .. }), "{err:?}");
    assert!(entries_in(root.path()).is_empty());
}

#[test]
fn hung_tool_times_out() {
    let tools = tempdir().expect("tools dir");
    let root = tempdir().expect("projects root");
    let tool = tools.path().join("hung-dotnet");
    write_script(&tool, "#!/bin/sh\nexec sleep 5\n");
    let materializer = Materializer::new(ScaffoldTool::new(
        tool.display().to_string(),
        Duration::from_millis(200),
    ));

    let err = materializer
        .materialize(&template(), &ProjectOptions::new(), root.path())
        .expect_err("timeout");
    assert!(
        matches!(err, MaterializeError::Timeout { timeout_ms: 200, .. }),
        "{err:?}"
    );
    assert!(entries_in(root.path()).is_empty());
}

#[test]
fn timeout_does_not_wait_for_the_tools_own_children() {
    let tools = tempdir().expect("tools dir");
    let root = tempdir().expect("projects root");
    let tool = tools.path().join("restoring-dotnet");
    write_script(&tool, "#!/bin/sh\nsleep 8\necho done\n");
    let materializer = Materializer::new(ScaffoldTool::new(
        tool.display().to_string(),
        Duration::from_millis(500),
    ));

    let started = Instant::now();
    let err = materializer
        .materialize(&template(), &ProjectOptions::new(), root.path())
        .expect_err("timeout");
    let took = started.elapsed();

    assert!(matches!(err, MaterializeError::Timeout { .. }), "{err:?}");
    assert!(took < Duration::from_secs(4), "{took:?}");
    assert!(entries_in(root.path()).is_empty());
}

#[test]
fn template_install_and_uninstall_invoke_the_tool() {
    let tools = tempdir().expect("tools dir");
    let log = tools.path().join("calls.log");
    let tool = tools.path().join("recording-dotnet");
    write_script(
        &tool,
        &format!("#!/bin/sh\necho \"$@\" >> {}\n", log.display()),
    );
    let scaffold = ScaffoldTool::new(tool.display().to_string(), Duration::from_secs(5));
    let source = tools.path().join("templates");
    fs::create_dir_all(&source).expect("template source");

    scaffold.install_template(&source).expect("install");
    scaffold.uninstall_template(&source).expect("uninstall");

    let calls = fs::read_to_string(&log).expect("calls");
    let lines: Vec<&str> = calls.lines().collect();
    assert_eq!(
        lines,
        vec![
            format!("new install {}", source.display()),
            format!("new uninstall {}", source.display()),
        ]
    );
}

#[test]
fn teardown_policy_from_the_materializer_is_applied() {
    let tools = tempdir().expect("tools dir");
    let root = tempdir().expect("projects root");
    let materializer = materializer_for(&write_fake_scaffold_tool(tools.path()))
        .with_teardown_policy(TeardownPolicy::KeepProjectDirectory);

    let project = materializer
        .materialize(&template(), &ProjectOptions::new(), root.path())
        .expect("materialize");
    let dir = project.directory().to_path_buf();
    assert_eq!(project.teardown_policy(), TeardownPolicy::KeepProjectDirectory);

    drop(project);
    assert!(dir.is_dir());
}
