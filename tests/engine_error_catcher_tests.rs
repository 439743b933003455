mod common;

use bondflow::core::{
    bind, same_node, ChildOwner, Closeable, ConfigError, Msg, Node, NodeError, NodeId, NodeRef,
    ReadEndpoint, WriteEndpoint,
};
use bondflow::engine::{ErrorCatcher, Graph, GraphState};
use bondflow::nodes::Drain;
use common::{within, Faulty};
use std::sync::Arc;

fn origin(msg: &Msg) -> String {
    msg.downcast_ref::<NodeError>()
        .expect("NodeError payload")
        .origin()
        .to_string()
}

#[tokio::test]
async fn test_catcher_stops_propagation() {
    // root > catcher > sub > leaf: the root would panic if the error got past the catcher
    let root = Graph::new("root");
    let catcher = ErrorCatcher::new("catcher", 4);
    let sub = Graph::new("sub");
    sub.add_child(Arc::new(Faulty::new("leaf", 2))).unwrap();
    catcher.add_child(sub).unwrap();
    root.add_child(catcher.clone()).unwrap();

    let mut errors = catcher.take_errors().unwrap();
    within(root.run()).await.unwrap();

    let first = within(errors.recv()).await.unwrap();
    let second = within(errors.recv()).await.unwrap();
    assert_eq!(origin(&first), "leaf");
    assert_eq!(origin(&second), "leaf");
    assert_eq!(
        first.downcast_ref::<NodeError>().unwrap().error().to_string(),
        "fault 0"
    );

    let metrics = catcher.metrics().unwrap();
    assert_eq!(metrics.errors_count(), 2);
    assert_eq!(metrics.messages_forwarded(), 2);
}

#[tokio::test]
async fn test_catcher_with_direct_child() {
    let catcher = ErrorCatcher::new("catcher", 1);
    catcher.add_child(Arc::new(Faulty::new("leaf", 1))).unwrap();
    let mut errors = catcher.take_errors().unwrap();

    within(catcher.run()).await.unwrap();
    assert_eq!(origin(&within(errors.recv()).await.unwrap()), "leaf");
}

#[tokio::test]
async fn test_rendezvous_error_bond_waits_for_reader() {
    let catcher = ErrorCatcher::new("catcher", 0);
    catcher.add_child(Arc::new(Faulty::new("leaf", 3))).unwrap();
    let mut errors = catcher.take_errors().unwrap();

    let runner = tokio::spawn({
        let catcher = catcher.clone();
        async move { catcher.run().await }
    });
    for _ in 0..3 {
        assert_eq!(origin(&within(errors.recv()).await.unwrap()), "leaf");
    }
    within(runner).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_nested_catcher_keeps_errors_to_itself() {
    let outer = ErrorCatcher::new("outer", 4);
    let inner = ErrorCatcher::new("inner", 4);
    inner.add_child(Arc::new(Faulty::new("leaf", 1))).unwrap();
    outer.add_child(inner.clone()).unwrap();

    let mut inner_errors = inner.take_errors().unwrap();
    within(outer.run()).await.unwrap();

    assert_eq!(origin(&within(inner_errors.recv()).await.unwrap()), "leaf");
    assert_eq!(outer.metrics().unwrap().errors_count(), 0);
}

#[tokio::test]
async fn test_error_output_can_be_rebound() {
    let catcher = ErrorCatcher::new("catcher", 1);
    let monitor = ReadEndpoint::new("monitor", "in");
    bind(catcher.error_output(), &monitor, 2);
    catcher.add_child(Arc::new(Faulty::new("leaf", 1))).unwrap();

    let mut rx = monitor.take_receiver().unwrap();
    within(catcher.run()).await.unwrap();
    assert_eq!(origin(&within(rx.recv()).await.unwrap()), "leaf");
}

#[test]
fn test_take_errors_only_once() {
    let catcher = ErrorCatcher::new("catcher", 1);
    assert!(catcher.take_errors().is_ok());
    assert!(catcher.take_errors().is_err());
}

#[test]
fn test_add_child_replaces_previous_child() {
    let catcher = ErrorCatcher::new("catcher", 1);
    let first: NodeRef = Arc::new(Faulty::new("first", 0));
    let second: NodeRef = Arc::new(Faulty::new("second", 0));

    catcher.add_child(first.clone()).unwrap();
    catcher.add_child(second.clone()).unwrap();

    assert!(first.parent().is_none());
    assert!(same_node(second.parent().unwrap().as_ref(), &*catcher));
    assert_eq!(catcher.children().len(), 1);
    assert!(catcher.get_child(&NodeId::from("second")).is_some());
    assert!(catcher.get_child(&NodeId::from("first")).is_none());

    // Removing some other id leaves the child in place
    catcher.remove_child(&NodeId::from("first"));
    assert!(catcher.child().is_some());

    catcher.remove_child(&NodeId::from("second"));
    assert!(catcher.child().is_none());
    assert!(second.parent().is_none());
}

#[test]
fn test_catcher_rejects_its_own_ancestor() {
    let graph = Graph::new("g");
    let catcher = ErrorCatcher::new("catcher", 1);
    graph.add_child(catcher.clone()).unwrap();

    assert!(catcher.add_child(graph.clone()).is_err());
}

#[tokio::test]
async fn test_empty_catcher_runs() {
    let catcher = ErrorCatcher::new("catcher", 1);
    within(catcher.run()).await.unwrap();
}

#[tokio::test]
async fn test_close_ends_error_stream() {
    let catcher = ErrorCatcher::new("catcher", 1);
    let sub = Graph::new("sub");
    catcher.add_child(sub.clone()).unwrap();
    let mut errors = catcher.take_errors().unwrap();

    catcher.close();

    assert!(within(errors.recv()).await.is_none());
    assert!(catcher.error_output().is_closed());
}

#[tokio::test]
async fn test_child_is_fixed_while_running() {
    let catcher = ErrorCatcher::new("catcher", 1);
    let drain = Arc::new(Drain::new("drain"));
    let src = WriteEndpoint::new("src", "out");
    bind(&src, &drain.input, 1);
    catcher.add_child(drain.clone()).unwrap();

    let runner = tokio::spawn({
        let catcher = catcher.clone();
        async move { catcher.run().await }
    });
    within(async {
        while catcher.state() != GraphState::Running {
            tokio::task::yield_now().await;
        }
    })
    .await;

    let err = catcher
        .add_child(Arc::new(Faulty::new("late", 0)))
        .unwrap_err();
    assert_eq!(
        err,
        ConfigError::NotAssembling {
            owner: "catcher".into(),
            state: "running"
        }
    );
    assert!(same_node(catcher.child().unwrap().as_ref(), &*drain));

    src.close();
    within(runner).await.unwrap().unwrap();
    assert_eq!(catcher.state(), GraphState::Stopped);
    assert!(catcher.add_child(Arc::new(Faulty::new("later", 0))).is_err());
}
