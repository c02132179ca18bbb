//! Sequential grouping, parallel eligibility, and annexes.

use monoplan::{PreSpec, TaskBuilder, TreePackage};

use super::common::{command, has_edge, id, init_tracing, plan};

#[tokio::test]
async fn test_sequential_and_parallel_groups() -> anyhow::Result<()> {
    init_tracing();
    let root = TreePackage::root("repo");
    root.add_task("lint", command("eslint"));
    root.add_task("test", command("jest"));
    root.add_task("bundle", command("rollup"));
    root.add_task(
        "build",
        TaskBuilder::new("build")
            .add_pre(PreSpec::new("lint"))
            .add_pre(PreSpec::new("test").parallel())
            .add_pre(PreSpec::new("bundle"))
            .spec(),
    );

    let plan = plan(&root, "build").await?;

    // lint and test form one parallel bunch with no edge between them.
    assert!(!has_edge(&plan, ("repo", "lint"), ("repo", "test")));
    assert!(!has_edge(&plan, ("repo", "test"), ("repo", "lint")));
    let lint = plan.call_of(&id("repo", "lint")).expect("lint");
    let test = plan.call_of(&id("repo", "test")).expect("test");
    assert!(lint.is_parallel_to(&test));

    // Both gate the next sequential step.
    assert!(has_edge(&plan, ("repo", "lint"), ("repo", "bundle")));
    assert!(has_edge(&plan, ("repo", "test"), ("repo", "bundle")));
    assert!(has_edge(&plan, ("repo", "bundle"), ("repo", "build")));

    let bundle = plan.call_of(&id("repo", "bundle")).expect("bundle");
    assert!(!bundle.is_parallel_to(&lint));

    // The dependent's direct predecessors are the last sequential group.
    let build = plan.call_of(&id("repo", "build")).expect("build");
    assert_eq!(build.prerequisites(), [bundle]);
    assert!(build.has_prerequisite(&id("repo", "lint")));
    Ok(())
}

#[tokio::test]
async fn test_annex_borrows_position_without_gating() -> anyhow::Result<()> {
    let root = TreePackage::root("repo");
    root.add_task("lint", command("eslint"));
    root.add_task("watch", command("watcher"));
    root.add_task("bundle", command("rollup"));
    root.add_task(
        "build",
        TaskBuilder::new("build")
            .add_pre(PreSpec::new("lint"))
            .add_pre(PreSpec::new("watch").annex())
            .add_pre(PreSpec::new("bundle"))
            .spec(),
    );

    let plan = plan(&root, "build").await?;

    // The annex call exists but takes part in no ordering at all.
    assert!(plan.call_of(&id("repo", "watch")).is_some());
    let watch = id("repo", "watch");
    assert!(plan
        .order_edges()
        .iter()
        .all(|(from, to)| *from != watch && *to != watch));

    assert!(has_edge(&plan, ("repo", "lint"), ("repo", "bundle")));
    assert!(has_edge(&plan, ("repo", "bundle"), ("repo", "build")));
    Ok(())
}

#[tokio::test]
async fn test_contradictory_edges_accepted() -> anyhow::Result<()> {
    let root = TreePackage::root("repo");
    root.add_task(
        "a",
        TaskBuilder::new("a")
            .add_pre(PreSpec::new("b"))
            .set_action(monoplan::Action::Command {
                command: "first".to_string(),
                parallel: false,
                args: vec![],
            })
            .spec(),
    );
    root.add_task(
        "b",
        TaskBuilder::new("b")
            .add_pre(PreSpec::new("a"))
            .set_action(monoplan::Action::Command {
                command: "second".to_string(),
                parallel: false,
                args: vec![],
            })
            .spec(),
    );

    // Mutual prerequisites plan fine; cycles are the executor's concern.
    let plan = plan(&root, "a").await?;
    assert!(has_edge(&plan, ("repo", "b"), ("repo", "a")));
    assert!(has_edge(&plan, ("repo", "a"), ("repo", "b")));
    assert_eq!(plan.calls().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_parallel_command_joins_own_prerequisites() -> anyhow::Result<()> {
    let root = TreePackage::root("repo");
    root.add_task("serve", command("serve"));
    root.add_task(
        "watch",
        TaskBuilder::new("watch")
            .add_pre(PreSpec::new("serve"))
            .set_action(monoplan::Action::Command {
                command: "watcher".to_string(),
                parallel: true,
                args: vec![],
            })
            .spec(),
    );

    let plan = plan(&root, "watch").await?;
    let serve = plan.call_of(&id("repo", "serve")).expect("serve");
    let watch = plan.call_of(&id("repo", "watch")).expect("watch");
    // Ordered, yet eligible to run side by side.
    assert!(has_edge(&plan, ("repo", "serve"), ("repo", "watch")));
    assert!(serve.is_parallel_to(&watch));
    Ok(())
}
