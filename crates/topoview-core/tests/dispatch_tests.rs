//! Integration tests for decoding, dispatch, resolution and buffered rendering.

use serde_json::json;
use topoview_core::{
    Action, CoreError, Dispatcher, EdgeMutation, EntityId, EntityRegistry, Message, NodeMutation,
    Query, RecordingRenderer, RegistryMode, RenderCall, UpdateBuffer,
};

struct Ctx {
    registry: EntityRegistry,
    buffer: UpdateBuffer,
    dropped: usize,
}

impl Ctx {
    fn new() -> Self {
        Self {
            registry: EntityRegistry::new(RegistryMode::Permissive),
            buffer: UpdateBuffer::new(),
            dropped: 0,
        }
    }
}

fn dispatcher() -> Dispatcher<Ctx> {
    let mut dispatcher = Dispatcher::new();
    dispatcher
        .bind(Action::Insert, "node", |ctx: &mut Ctx, msg| {
            let id = msg
                .param("id")
                .and_then(EntityId::from_value)
                .ok_or("node without id")?;
            let name = msg.param("name").and_then(|v| v.as_str()).unwrap_or_default();
            ctx.registry.register_node(id.clone(), name, Vec::<String>::new())?;
            ctx.buffer.enqueue_node(NodeMutation::new(id).label(name));
            Ok(())
        })
        .bind(Action::Update, "node", |ctx: &mut Ctx, msg| {
            match ctx.registry.resolve_by_filter(&msg.filter) {
                Ok(id) => {
                    ctx.buffer.enqueue_node(NodeMutation::new(id).image("img/switch.png"));
                    Ok(())
                }
                Err(err) => {
                    ctx.dropped += 1;
                    Err(err.into())
                }
            }
        })
        .bind(Action::Update, "channel", |ctx: &mut Ctx, msg| {
            let id = ctx.registry.resolve_by_filter(&msg.filter)?;
            ctx.buffer.enqueue_edge(EdgeMutation::new(id).label("1.0 Mbps"));
            Ok(())
        });
    dispatcher
}

fn frame(value: serde_json::Value) -> Message {
    Message::decode(&value.to_string()).unwrap()
}

#[test]
fn test_frames_flow_into_one_batch_per_kind() {
    let dispatcher = dispatcher();
    let mut ctx = Ctx::new();
    let renderer = RecordingRenderer::new();

    for message in [
        frame(json!({"action": "insert", "object_name": "node", "params": {"id": 5, "name": "n1"}})),
        frame(json!({"action": "insert", "object_name": "node", "params": {"id": 6, "name": "n2"}})),
        frame(json!({"action": "update", "object_name": "node", "filter": [["name", "==", "n1"]]})),
        frame(json!({"action": "update", "object_name": "channel", "filter": [["id", "==", "c9"]]})),
    ] {
        dispatcher.dispatch(&mut ctx, &message);
    }

    let report = ctx.buffer.flush(&renderer);
    assert_eq!(report.nodes, 3);
    assert_eq!(report.edges, 1);
    assert_eq!(
        renderer.calls(),
        vec![
            RenderCall::Nodes(vec![
                NodeMutation::new(5).label("n1"),
                NodeMutation::new(6).label("n2"),
                NodeMutation::new(5).image("img/switch.png"),
            ]),
            RenderCall::Edges(vec![EdgeMutation::new("c9").label("1.0 Mbps")]),
        ]
    );
}

#[test]
fn test_unresolvable_update_is_dropped() {
    let dispatcher = dispatcher();
    let mut ctx = Ctx::new();

    let report = dispatcher.dispatch(
        &mut ctx,
        &frame(json!({"action": "update", "object_name": "node", "filter": [["name", "==", "ghost"]]})),
    );
    assert_eq!(report.failed, 1);
    assert_eq!(ctx.dropped, 1);
    assert!(ctx.buffer.is_empty());

    let report = dispatcher.dispatch(
        &mut ctx,
        &frame(json!({"action": "update", "object_name": "node"})),
    );
    assert_eq!(report.failed, 1);
    assert_eq!(ctx.dropped, 2);
}

#[test]
fn test_id_filter_wins_over_name() {
    let mut registry = EntityRegistry::default();
    registry.register_node(EntityId::Int(9), "n1", ["eth0"]).unwrap();

    let message = frame(json!({
        "action": "update",
        "object_name": "node",
        "filter": [["name", "==", "n1"], ["id", "==", 5]],
    }));
    assert_eq!(registry.resolve_by_filter(&message.filter), Ok(EntityId::Int(5)));
}

#[test]
fn test_malformed_frames_are_rejected() {
    for text in [
        "not json",
        "[1, 2]",
        r#"{"object_name": "node"}"#,
        r#"{"action": "explode", "object_name": "node"}"#,
        r#"{"action": "insert"}"#,
    ] {
        assert!(
            matches!(Message::decode(text), Err(CoreError::MalformedFrame(_))),
            "{text} should be malformed"
        );
    }
}

#[test]
fn test_select_node_wire_shape() {
    let wire = serde_json::to_value(Query::new(Action::Select, "node").to_wire()).unwrap();
    assert_eq!(
        wire,
        json!({
            "action": "select",
            "object_name": "node",
            "filter": null,
            "params": null,
            "fields": null,
            "last": false,
        })
    );
}
