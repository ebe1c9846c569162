use pretty_assertions::assert_eq;

use warden_core::telegram::Update;

use crate::common::OPERATOR;
use crate::common::harness;
use crate::common::text_update;

#[tokio::test]
async fn cursor_advances_past_every_processed_update() {
    let h = harness();

    h.transport.queue_batch(vec![
        text_update(7, 100, "/pending"),
        text_update(9, 100, "/pending"),
    ]);
    h.controller.poll_once().await.unwrap();

    assert_eq!(h.controller.store().load_cursor().offset, 10);
    // Both updates were dispatched.
    assert_eq!(h.transport.messages_for(OPERATOR).len(), 2);
}

#[tokio::test]
async fn cursor_never_moves_backwards() {
    let h = harness();

    h.controller
        .process_update(text_update(50, 100, "/pending"))
        .await
        .unwrap();
    assert_eq!(h.controller.store().load_cursor().offset, 51);

    // A stale id does not rewind the cursor.
    h.controller
        .process_update(text_update(3, 100, "/pending"))
        .await
        .unwrap();
    assert_eq!(h.controller.store().load_cursor().offset, 51);
}

#[tokio::test]
async fn textless_updates_only_advance_the_cursor() {
    let h = harness();

    h.controller
        .process_update(Update {
            update_id: 12,
            message: None,
        })
        .await
        .unwrap();

    assert_eq!(h.controller.store().load_cursor().offset, 13);
    assert!(h.transport.messages().is_empty());
}

#[tokio::test]
async fn unauthorized_chats_get_a_courtesy_reply_and_no_dispatch() {
    let h = harness();

    h.controller
        .process_update(text_update(1, 555, "/status"))
        .await
        .unwrap();

    assert_eq!(h.transport.messages_for("555"), vec!["Unauthorized chat."]);
    assert_eq!(h.runner.call_count(), 0);
    // The cursor still advanced.
    assert_eq!(h.controller.store().load_cursor().offset, 2);
}

#[tokio::test]
async fn allowed_chats_are_dispatched() {
    let h = harness();

    h.controller
        .process_update(text_update(1, 100, "/pending"))
        .await
        .unwrap();

    assert_eq!(
        h.transport.messages_for(OPERATOR),
        vec!["No pending approvals."]
    );
}
