//! Call identity and parameter merging.

use std::sync::Arc;

use futures::FutureExt;
use monoplan::{
    CallDetails, Package, PlanFn, Planner, PreSpec, TaskBuilder, TaskParams, TreePackage,
};

use super::common::{command, id, init_tracing, plan};

#[tokio::test]
async fn test_plans_single_call() -> anyhow::Result<()> {
    init_tracing();
    let root = TreePackage::root("repo");
    root.add_task(
        "build",
        TaskBuilder::new("build")
            .add_attr("mode", "release")
            .add_arg("--verbose")
            .set_action(monoplan::Action::Command {
                command: "tsc".to_string(),
                parallel: false,
                args: vec!["-p".to_string(), ".".to_string()],
            })
            .spec(),
    );

    let plan = plan(&root, "build").await?;
    assert_eq!(plan.calls().len(), 1);

    let call = plan.call_of(&id("repo", "build")).expect("planned call");
    let params = call.params();
    assert_eq!(params.attr("mode"), Some("release"));
    assert_eq!(params.args, ["--verbose"]);
    assert_eq!(params.action_args, ["-p", "."]);
    Ok(())
}

#[tokio::test]
async fn test_repeated_call_merges_params() -> anyhow::Result<()> {
    let root = TreePackage::root("repo");
    root.add_task("lint", command("eslint"));
    root.add_task(
        "build",
        TaskBuilder::new("build")
            .add_pre(PreSpec::new("lint").attr("fix", "off").arg("--cache"))
            .add_pre(PreSpec::new("lint").attr("fix", "on").arg("--quiet"))
            .spec(),
    );

    let plan = plan(&root, "build").await?;
    // One call per task, however often it is called.
    assert_eq!(plan.calls().len(), 2);

    let lint = plan.call_of(&id("repo", "lint")).expect("lint call");
    let params = lint.params();
    assert_eq!(params.attr_values("fix"), ["off", "on"]);
    assert_eq!(params.attr("fix"), Some("on"));
    assert_eq!(params.args, ["--cache", "--quiet"]);
    Ok(())
}

#[tokio::test]
async fn test_params_identity_stable_until_extended() -> anyhow::Result<()> {
    let root = TreePackage::root("repo");
    root.add_task("build", command("tsc"));
    let task = Arc::clone(&root).task("build").await?;

    let extension = Arc::clone(&task);
    let hook: PlanFn = Arc::new(move |planner| {
        let extension = Arc::clone(&extension);
        async move {
            let call = planner.planned_call();
            let first = call.params();
            let second = call.params();
            assert!(Arc::ptr_eq(&first, &second));

            let mut extra = TaskParams::default();
            extra.extend_attrs(
                &[("mode".to_string(), vec!["debug".to_string()])]
                    .into_iter()
                    .collect(),
            );
            planner.call(extension, CallDetails::with_params(extra));

            let third = call.params();
            assert!(!Arc::ptr_eq(&first, &third));
            assert_eq!(third.attr("mode"), Some("debug"));
            Ok(())
        }
        .boxed()
    });

    Planner::new()
        .plan(
            task,
            CallDetails {
                params: None,
                plan: Some(hook),
            },
        )
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_mutual_prerequisites_params_resolve() -> anyhow::Result<()> {
    let root = TreePackage::root("repo");
    root.add_task(
        "a",
        TaskBuilder::new("a")
            .add_attr("from", "a")
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
            .add_attr("from", "b")
            .add_pre(PreSpec::new("a"))
            .set_action(monoplan::Action::Command {
                command: "second".to_string(),
                parallel: false,
                args: vec![],
            })
            .spec(),
    );

    let plan = plan(&root, "a").await?;
    let a = plan.call_of(&id("repo", "a")).expect("a call");
    let b = plan.call_of(&id("repo", "b")).expect("b call");

    // Each call inherits through the other. The cyclic read terminates,
    // and both calls observe both attributes.
    let b_params = b.params();
    assert!(b_params.attr_values("from").contains(&"a".to_string()));
    assert!(b_params.attr_values("from").contains(&"b".to_string()));
    let a_params = a.params();
    assert!(a_params.attr_values("from").contains(&"a".to_string()));
    assert!(a_params.attr_values("from").contains(&"b".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_prerequisite_inherits_dependent_params() -> anyhow::Result<()> {
    let root = TreePackage::root("repo");
    root.add_task("lint", command("eslint"));
    root.add_task(
        "build",
        TaskBuilder::new("build")
            .add_attr("mode", "release")
            .add_pre(PreSpec::new("lint"))
            .spec(),
    );

    let plan = plan(&root, "build").await?;
    let lint = plan.call_of(&id("repo", "lint")).expect("lint call");
    // Prerequisite calls observe their dependent's attributes.
    assert_eq!(lint.params().attr("mode"), Some("release"));
    Ok(())
}
