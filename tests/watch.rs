mod support;

use std::sync::mpsc;
use std::time::Duration;

use hustle::watch::{spawn_watch, StoreChange};
use hustle::workspace::WorkItemDraft;

use support::TestDir;

#[test]
fn write_from_another_instance_triggers_reload() {
    let dir = TestDir::new();
    let watched = dir.shared_store();
    watched.persist().expect("persist");

    let (tx, rx) = mpsc::channel();
    let _handle = spawn_watch(watched.clone(), tx).expect("spawn watch");

    // Our own writes never reload.
    watched
        .mutate(|ws| {
            ws.add_board("Ops")?;
            Ok(())
        })
        .expect("own write");
    assert!(rx.recv_timeout(Duration::from_millis(800)).is_err());

    let other = dir.shared_store();
    other
        .mutate(|ws| {
            ws.add_work_item(WorkItemDraft {
                title: "Written elsewhere".to_string(),
                ..WorkItemDraft::default()
            })
        })
        .expect("other write");

    let change = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("reload notification");
    assert_eq!(change, StoreChange::Reloaded);
    let seen = watched
        .read(|ws| ws.work_items.iter().any(|item| item.title == "Written elsewhere"))
        .expect("read");
    assert!(seen);
}
