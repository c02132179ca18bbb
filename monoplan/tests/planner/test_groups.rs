//! Group task delegation.

use monoplan::{Job, PreSpec, Shell, Task, TaskBuilder, TaskParams, TreePackage};

use super::common::{command, group, has_edge, id, init_tracing, plan};

#[tokio::test]
async fn test_group_delegates_own_name_across_members() -> anyhow::Result<()> {
    init_tracing();
    let root = TreePackage::root("repo");
    root.add_task("test", group(&["./*"]));
    root.add_task(
        "build",
        TaskBuilder::new("build").add_pre(PreSpec::new("test")).spec(),
    );
    root.add_child("ui").add_task("test", command("jest"));
    root.add_child("api").add_task("test", command("jest"));

    let plan = plan(&root, "build").await?;

    assert!(plan.call_of(&id("repo", "test")).is_some());
    assert!(plan.call_of(&id("repo/ui", "test")).is_some());
    assert!(plan.call_of(&id("repo/api", "test")).is_some());

    // The group synchronizes its sub-tasks without gating the dependent.
    assert!(has_edge(&plan, ("repo", "test"), ("repo/ui", "test")));
    assert!(has_edge(&plan, ("repo", "test"), ("repo/api", "test")));
    assert!(has_edge(&plan, ("repo/ui", "test"), ("repo", "build")));
    assert!(has_edge(&plan, ("repo/api", "test"), ("repo", "build")));
    assert!(!has_edge(&plan, ("repo", "test"), ("repo", "build")));
    Ok(())
}

#[tokio::test]
async fn test_group_delegates_explicit_sub_task() -> anyhow::Result<()> {
    let root = TreePackage::root("repo");
    root.add_task("each", group(&["./*"]));
    root.add_task(
        "fix",
        TaskBuilder::new("fix")
            .add_pre(PreSpec::new("each").args(["lint", "--fix"]))
            .spec(),
    );
    root.add_child("ui").add_task("lint", command("eslint"));
    root.add_child("api").add_task("lint", command("eslint"));

    let plan = plan(&root, "fix").await?;

    let ui_lint = plan.call_of(&id("repo/ui", "lint")).expect("ui lint");
    let api_lint = plan.call_of(&id("repo/api", "lint")).expect("api lint");
    // The first plain argument names the sub-task, the rest are its args.
    assert_eq!(ui_lint.params().args, ["--fix"]);
    assert_eq!(api_lint.params().args, ["--fix"]);
    assert!(has_edge(&plan, ("repo", "each"), ("repo/ui", "lint")));
    assert!(has_edge(&plan, ("repo", "each"), ("repo/api", "lint")));
    Ok(())
}

#[tokio::test]
async fn test_group_call_takes_attrs_but_not_args() -> anyhow::Result<()> {
    let root = TreePackage::root("repo");
    root.add_task("test", group(&["./*"]));
    root.add_task(
        "build",
        TaskBuilder::new("build")
            .add_pre(PreSpec::new("test").attr("coverage", "on").arg("--bail"))
            .spec(),
    );
    root.add_child("ui").add_task("test", command("jest"));

    let plan = plan(&root, "build").await?;

    let group_call = plan.call_of(&id("repo", "test")).expect("group call");
    assert_eq!(group_call.params().attr("coverage"), Some("on"));
    assert!(group_call.params().args.is_empty());

    let sub = plan.call_of(&id("repo/ui", "test")).expect("sub call");
    assert_eq!(sub.params().attr("coverage"), Some("on"));
    assert_eq!(sub.params().args, ["--bail"]);
    Ok(())
}

#[tokio::test]
async fn test_group_resolving_itself_plans_once() -> anyhow::Result<()> {
    let root = TreePackage::root("repo");
    // No action at all defaults to a group over the task's own package, so
    // delegating its own name resolves straight back to the group.
    root.add_task("setup", TaskBuilder::new("setup").spec());
    root.add_task(
        "build",
        TaskBuilder::new("build").add_pre(PreSpec::new("setup")).spec(),
    );

    let plan = plan(&root, "build").await?;

    assert!(plan.call_of(&id("repo", "setup")).is_some());
    assert_eq!(plan.calls().len(), 2);
    // The group contributes no effective sub-tasks, so nothing gates.
    assert!(plan.order_edges().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_sub_task_reached_twice_plans_once() -> anyhow::Result<()> {
    let root = TreePackage::root("repo");
    root.add_task("each", group(&["./*"]));
    root.add_child("ui").add_task("test", command("jest"));
    root.add_task(
        "build",
        TaskBuilder::new("build")
            .add_pre(PreSpec::new("test").target("./ui"))
            .add_pre(PreSpec::new("each").args(["test"]))
            .spec(),
    );

    let plan = plan(&root, "build").await?;

    // Reached directly and again through delegation: still one call, with
    // no duplicated edges or parallel declarations.
    assert_eq!(plan.calls().len(), 3);
    assert_eq!(
        plan.order_edges(),
        [
            (id("repo", "each"), id("repo/ui", "test")),
            (id("repo/ui", "test"), id("repo", "build")),
        ]
    );
    assert_eq!(plan.parallel_groups().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_group_execution_is_a_noop() -> anyhow::Result<()> {
    struct RefuseShell;

    impl Shell for RefuseShell {
        fn exec_command(&self, task: &Task, _: &str, _: &TaskParams) -> Box<dyn Job> {
            panic!("group task `{}` spawned a command", task.name());
        }

        fn exec_script(&self, task: &Task, _: &TaskParams) -> Box<dyn Job> {
            panic!("group task `{}` spawned a script", task.name());
        }
    }

    let root = TreePackage::root("repo");
    root.add_task("test", group(&[]));

    let plan = plan(&root, "test").await?;
    let call = plan.call_of(&id("repo", "test")).expect("group call");
    let job = call.task().exec(&RefuseShell, &call);
    assert_eq!(job.when_done().await, Ok(()));
    Ok(())
}
