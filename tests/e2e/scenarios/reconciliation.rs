use crate::harness::{Assertion, Scenario};
use serde_json::json;

#[test]
fn test_finalize_keeps_assistant_meta() {
    Scenario::new("finalize_meta")
        .project("alpha", "Alpha")
        .live_user("main", "question")
        .live_assistant("main", "answer", json!({"model": "x", "metrics": {"length": 6}}))
        .edit_buffer("main", 1, "edited answer")
        .evict("main")
        .assert(Assertion::SessionClosed {
            phase: "main".into(),
        })
        .assert_records("main", 2)
        .assert_content("main", 1, "edited answer")
        .assert(Assertion::MetaAt {
            phase: "main".into(),
            index: 1,
            key: "model".into(),
            value: json!("x"),
        })
        .assert(Assertion::NoMetaAt {
            phase: "main".into(),
            index: 0,
        })
        .run()
        .unwrap();
}

#[test]
fn test_finalize_correlates_by_position() {
    // Dropping the first turn shifts every assistant turn onto a user
    // record's index, so their metadata is not carried over.
    Scenario::new("finalize_positional")
        .project("alpha", "Alpha")
        .live_user("main", "q1")
        .live_assistant("main", "a1", json!({"model": "m1"}))
        .live_user("main", "q2")
        .live_assistant("main", "a2", json!({"model": "m2"}))
        .drop_from_buffer("main", 0)
        .evict("main")
        .assert_records("main", 3)
        .assert_content("main", 0, "a1")
        .assert(Assertion::NoMetaAt {
            phase: "main".into(),
            index: 0,
        })
        .assert(Assertion::NoMetaAt {
            phase: "main".into(),
            index: 2,
        })
        .run()
        .unwrap();
}

#[test]
fn test_reopened_session_hydrates_from_log() {
    Scenario::new("session_reopen")
        .project("alpha", "Alpha")
        .live_user("fase 1", "hello")
        .evict("fase 1")
        .live_user("fase 1", "again")
        .assert(Assertion::SessionOpen {
            phase: "fase 1".into(),
        })
        .assert_records("fase 1", 2)
        .evict("fase 1")
        .assert_records("fase 1", 2)
        .assert_content("fase 1", 1, "again")
        .run()
        .unwrap();
}

#[test]
fn test_live_turns_reach_hierarchy() {
    Scenario::new("live_hierarchy")
        .project("alpha", "Alpha")
        .live_user("fase 1", "live question")
        .live_assistant("fase 1", "live answer", json!({}))
        .assert(Assertion::HierarchyLiveCount {
            current: "fase 1".into(),
            count: 2,
        })
        .run()
        .unwrap();
}
