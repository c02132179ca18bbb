//! Failure propagation through the recursive planning chain.

use monoplan::{Action, PlanError, PreSpec, TaskBuilder, TreePackage};

use super::common::{command, init_tracing, plan};

#[tokio::test]
async fn test_unknown_prerequisite_fails_plan() {
    init_tracing();
    let root = TreePackage::root("repo");
    root.add_task(
        "build",
        TaskBuilder::new("build").add_pre(PreSpec::new("missing")).spec(),
    );

    let outcome = plan(&root, "build").await;
    let err = outcome.expect_err("plan should fail");
    assert_eq!(
        err.downcast::<PlanError>().expect("plan error"),
        PlanError::UnknownTask {
            target: "repo".to_string(),
            task: "missing".to_string(),
        }
    );
}

#[tokio::test]
async fn test_unknown_task_deep_in_chain_fails_plan() {
    let root = TreePackage::root("repo");
    root.add_task("lint", command("eslint"));
    root.add_task(
        "test",
        TaskBuilder::new("test")
            .add_pre(PreSpec::new("missing"))
            .set_action(Action::Command {
                command: "jest".to_string(),
                parallel: false,
                args: vec![],
            })
            .spec(),
    );
    root.add_task(
        "build",
        TaskBuilder::new("build")
            .add_pre(PreSpec::new("lint"))
            .add_pre(PreSpec::new("test"))
            .spec(),
    );

    let outcome = plan(&root, "build").await;
    assert!(matches!(
        outcome.expect_err("plan should fail").downcast::<PlanError>(),
        Ok(PlanError::UnknownTask { .. })
    ));
}

#[tokio::test]
async fn test_annex_with_zero_targets_fails_plan() {
    let root = TreePackage::root("repo");
    // No children, so `./*` resolves to nothing.
    root.add_task(
        "build",
        TaskBuilder::new("build")
            .add_pre(PreSpec::new("test").target("./*").annex())
            .spec(),
    );

    let outcome = plan(&root, "build").await;
    assert!(matches!(
        outcome.expect_err("plan should fail").downcast::<PlanError>(),
        Ok(PlanError::TargetReuse { .. })
    ));
}

#[tokio::test]
async fn test_unresolved_target_fails_plan() {
    let root = TreePackage::root("repo");
    root.add_task(
        "build",
        TaskBuilder::new("build")
            .add_pre(PreSpec::new("test").target("./missing"))
            .spec(),
    );

    let outcome = plan(&root, "build").await;
    assert!(matches!(
        outcome.expect_err("plan should fail").downcast::<PlanError>(),
        Ok(PlanError::Resolution(_))
    ));
}
