use crate::harness::{Assertion, Scenario};

#[test]
fn test_closed_phases_stack_up_to_current() {
    Scenario::new("phase_stack")
        .with_summary("Short summary.")
        .project("alpha", "Alpha")
        .user_says("main", "root plan")
        .close_phase("main")
        .assert(Assertion::PhaseExists {
            phase: "fase 1".into(),
        })
        .user_says("fase 1", "phase one work")
        .close_phase("fase 1")
        .user_says("fase 2", "phase two work")
        .close_phase("fase 2")
        .user_says("fase 3", "phase three work")
        .checkpoint("fase 3")
        .assert(Assertion::HierarchyPhases {
            current: "fase 2".into(),
            phases: vec!["main".into(), "fase 1".into(), "fase 2".into()],
        })
        .assert_hierarchy_contains("fase 2", "USER: root plan")
        .assert_hierarchy_contains("fase 2", "# --- FASE 1 ---")
        .assert_hierarchy_contains("fase 2", "USER: phase two work")
        .assert_hierarchy_excludes("fase 2", "# --- FASE 3 ---")
        .assert_hierarchy_excludes("fase 2", "phase three work")
        .assert(Assertion::HierarchyLiveCount {
            current: "fase 2".into(),
            count: 1,
        })
        .run()
        .unwrap();
}

#[test]
fn test_title_is_inherited_from_root() {
    Scenario::new("title_inheritance")
        .project("alpha", "Alpha")
        .user_says("fase 3", "title: Something Else")
        .checkpoint("fase 3")
        .assert(Assertion::CheckpointTitle {
            phase: "fase 3".into(),
            title: "Alpha".into(),
        })
        .rename("Alpha: second edition")
        .checkpoint("fase 3")
        .assert(Assertion::CheckpointTitle {
            phase: "fase 3".into(),
            title: "Alpha: second edition".into(),
        })
        .run()
        .unwrap();
}

#[test]
fn test_closing_main_keeps_title() {
    Scenario::new("close_main_title")
        .project("alpha", "Alpha")
        .user_says("main", "kickoff")
        .close_phase("main")
        .assert(Assertion::CheckpointTitle {
            phase: "main".into(),
            title: "Alpha".into(),
        })
        .close_phase("fase 1")
        .assert(Assertion::CheckpointTitle {
            phase: "fase 1".into(),
            title: "Alpha".into(),
        })
        .run()
        .unwrap();
}

#[test]
fn test_error_content_adds_debug_tag() {
    Scenario::new("debug_tag")
        .project("alpha", "Alpha")
        .user_says("fase 1", "it fails with an ERROR")
        .assistant_says("fase 1", "try this")
        .checkpoint("fase 1")
        .assert(Assertion::CheckpointHasTag {
            phase: "fase 1".into(),
            tag: "fase 1".into(),
        })
        .assert(Assertion::CheckpointHasTag {
            phase: "fase 1".into(),
            tag: "debug".into(),
        })
        .run()
        .unwrap();
}

#[test]
fn test_checkpoint_clears_pending() {
    Scenario::new("pending")
        .project("alpha", "Alpha")
        .user_says("fase 1", "unsaved work")
        .assert(Assertion::Pending {
            phase: "fase 1".into(),
            pending: true,
        })
        .checkpoint("fase 1")
        .assert(Assertion::Pending {
            phase: "fase 1".into(),
            pending: false,
        })
        .run()
        .unwrap();
}
