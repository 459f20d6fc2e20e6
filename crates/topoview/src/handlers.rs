//! The dashboard's message handlers.
//!
//! Each handler turns one kind of source message into registry updates,
//! buffered renderer mutations, or follow-up queries. Handlers never talk to
//! the transport: queries go to [`DashboardContext::outbox`] and the session
//! sends them once dispatch returns.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use topoview_core::logging::targets;
use topoview_core::{
    Action, Dispatcher, EdgeMutation, EntityId, EntityKind, EntityRegistry, FlushReport, Font,
    HandlerResult, Message, NodeMutation, Position, Query, RegistryMode, Renderer, UpdateBuffer,
};

/// Node size relative to the coordinate scale.
const NODE_SIZE_FACTOR: f64 = 0.75;

/// Above this many Mbps the edge label switches to Gbps.
const GBPS_THRESHOLD: f64 = 1000.0;

/// Presentation settings used when building mutations.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStyle {
    /// Prefix of node image paths.
    pub image_dir: String,
    /// Factor applied to source coordinates.
    pub coordinate_scale: f64,
}

impl Default for DashboardStyle {
    fn default() -> Self {
        Self {
            image_dir: "img/".to_string(),
            coordinate_scale: 50.0,
        }
    }
}

impl DashboardStyle {
    fn image_for(&self, category: &str) -> String {
        format!("{}{}.png", self.image_dir, category)
    }
}

/// State the handlers operate on.
pub struct DashboardContext {
    /// Name and interface lookups.
    pub registry: EntityRegistry,
    /// Pending mutations.
    pub buffer: Arc<UpdateBuffer>,
    /// Where flushed mutations go.
    pub renderer: Arc<dyn Renderer>,
    /// Presentation settings.
    pub style: DashboardStyle,
    /// Queries to send once the current dispatch returns.
    pub outbox: Vec<Query>,
    flushes: u64,
}

impl DashboardContext {
    /// Create a context with an empty registry and buffer.
    pub fn new(mode: RegistryMode, style: DashboardStyle, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            registry: EntityRegistry::new(mode),
            buffer: Arc::new(UpdateBuffer::new()),
            renderer,
            style,
            outbox: Vec::new(),
            flushes: 0,
        }
    }

    /// Hand pending mutations to the renderer.
    pub fn flush(&mut self) -> FlushReport {
        let report = self.buffer.flush(self.renderer.as_ref());
        if !report.is_empty() {
            self.flushes += 1;
        }
        report
    }

    /// Flushes that delivered at least one mutation.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Take the queries queued by handlers.
    pub fn take_outbox(&mut self) -> Vec<Query> {
        std::mem::take(&mut self.outbox)
    }
}

impl std::fmt::Debug for DashboardContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardContext")
            .field("registry", &self.registry)
            .field("buffer", &self.buffer)
            .field("style", &self.style)
            .field("outbox", &self.outbox.len())
            .field("flushes", &self.flushes)
            .finish()
    }
}

/// Bind every dashboard handler.
pub fn bind_dashboard(dispatcher: &mut Dispatcher<DashboardContext>) {
    dispatcher
        .bind(Action::Insert, EntityKind::Connection, on_connect)
        .bind(Action::Delete, EntityKind::Connection, on_disconnect)
        .bind(Action::Insert, EntityKind::Node, on_insert_node)
        .bind(Action::Update, EntityKind::Node, on_update_node)
        .bind(Action::Insert, EntityKind::Channel, on_insert_channel)
        .bind(Action::Update, EntityKind::Channel, on_update_channel);
}

/// Request the node list once connected.
pub fn on_connect(ctx: &mut DashboardContext, _message: &Message) -> HandlerResult {
    tracing::info!(target: targets::HANDLERS, "connected, requesting nodes");
    ctx.outbox.push(Query::select(EntityKind::Node));
    Ok(())
}

/// Note the loss of the connection.
pub fn on_disconnect(ctx: &mut DashboardContext, _message: &Message) -> HandlerResult {
    tracing::info!(
        target: targets::HANDLERS,
        nodes = ctx.registry.node_count(),
        "disconnected from source"
    );
    Ok(())
}

#[derive(Debug, Deserialize)]
struct NodeRecord {
    id: EntityId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(default)]
    groups: Vec<Value>,
    #[serde(default)]
    interfaces: Vec<Value>,
}

/// Register a node and queue it for display.
///
/// Nodes without a group are registered but not shown. The last page of the
/// node listing flushes the buffer, fits the view and requests the channels.
pub fn on_insert_node(ctx: &mut DashboardContext, message: &Message) -> HandlerResult {
    let node: NodeRecord = message.params_as()?;
    let name = node.name.clone().unwrap_or_else(|| node.id.to_string());

    ctx.registry.register_node(
        node.id.clone(),
        &name,
        node.interfaces.iter().map(interface_key),
    )?;

    if node.groups.is_empty() {
        tracing::debug!(target: targets::HANDLERS, id = %node.id, "node has no group, not displayed");
    } else {
        let scale = ctx.style.coordinate_scale;
        let mut mutation = NodeMutation::new(node.id)
            .label(name)
            .size(NODE_SIZE_FACTOR * scale)
            .font(Font::node_label())
            .physics(false);
        if let (Some(x), Some(y)) = (node.x, node.y) {
            mutation = mutation.position(Position::new(x * scale, y * scale));
        }
        if let Some(category) = &node.category {
            mutation = mutation.image(ctx.style.image_for(category));
        }
        ctx.buffer.enqueue_node(mutation);
    }

    if message.last {
        let report = ctx.flush();
        ctx.renderer.fit_view();
        tracing::info!(
            target: targets::HANDLERS,
            nodes = ctx.registry.node_count(),
            flushed = report.nodes,
            "node listing complete, requesting channels"
        );
        ctx.outbox.push(Query::select(EntityKind::Channel));
    }
    Ok(())
}

/// Apply a node update to the node its filter designates.
pub fn on_update_node(ctx: &mut DashboardContext, message: &Message) -> HandlerResult {
    let id = match ctx.registry.resolve_by_filter(&message.filter) {
        Ok(id) => id,
        Err(err) => {
            tracing::warn!(target: targets::HANDLERS, error = %err, "dropping node update");
            return Ok(());
        }
    };

    let mut mutation = NodeMutation::new(id.clone());
    if let Some(category) = message.param("category").and_then(Value::as_str) {
        mutation = mutation.image(ctx.style.image_for(category));
    }
    if let Some(name) = message.param("name").and_then(Value::as_str) {
        ctx.registry.rename(&id, name)?;
        mutation = mutation.label(name);
    }

    if mutation == NodeMutation::new(id) {
        tracing::trace!(target: targets::HANDLERS, "node update without displayed attributes");
        return Ok(());
    }
    ctx.buffer.enqueue_node(mutation);
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ChannelRecord {
    id: EntityId,
    #[serde(rename = "type", default)]
    channel_type: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    src: Option<Value>,
    #[serde(default)]
    dst: Option<Value>,
    #[serde(default)]
    src_node: Option<EntityId>,
    #[serde(default)]
    dst_node: Option<EntityId>,
    #[serde(default)]
    capacity: Option<Value>,
    #[serde(default)]
    stations: Option<Vec<EntityId>>,
    #[serde(default)]
    ap: Option<EntityId>,
}

/// Turn a channel into one edge, or one radio edge per station.
pub fn on_insert_channel(ctx: &mut DashboardContext, message: &Message) -> HandlerResult {
    let channel: ChannelRecord = message.params_as()?;
    let capacity = channel.capacity.as_ref().and_then(number);
    let kind = channel.channel_type.as_str();

    let is_wired = ["wiredchannel", "link", "phylink", "memiflink"]
        .iter()
        .any(|t| kind.contains(t));

    if is_wired {
        let (from, to) = if kind.contains("link") {
            (channel.src_node, channel.dst_node)
        } else {
            let lookup = |end: &Option<Value>| {
                end.as_ref()
                    .and_then(|v| ctx.registry.node_for_interface(&interface_key(v)))
                    .cloned()
            };
            (lookup(&channel.src), lookup(&channel.dst))
        };

        if from.is_none() || to.is_none() {
            tracing::debug!(target: targets::HANDLERS, id = %channel.id, "channel endpoint unresolved");
        }
        if let Some(capacity) = capacity {
            ctx.registry.record_edge_capacity(channel.id.clone(), capacity);
        }
        ctx.buffer.enqueue_edge(
            EdgeMutation::new(channel.id)
                .endpoints(from, to)
                .capacity(capacity)
                .font(Font::edge_label()),
        );
    } else if kind.contains("emulatedchannel") {
        let channel_name = channel
            .name
            .clone()
            .unwrap_or_else(|| channel.id.to_string());
        for station in channel.stations.unwrap_or_default() {
            let station_name = ctx
                .registry
                .name_of(&station)
                .map(str::to_string)
                .unwrap_or_else(|| station.to_string());
            let edge_id = EntityId::from(format!("tap-{station_name}-{channel_name}"));

            if let Some(capacity) = capacity {
                ctx.registry.record_edge_capacity(edge_id.clone(), capacity);
            }
            ctx.buffer.enqueue_edge(
                EdgeMutation::new(edge_id)
                    .endpoints(Some(station), channel.ap.clone())
                    .capacity(capacity)
                    .dashed()
                    .font(Font::edge_label()),
            );
        }
    } else {
        tracing::debug!(target: targets::HANDLERS, id = %channel.id, channel_type = kind, "ignoring channel type");
    }
    Ok(())
}

/// Relabel an edge with its measured bandwidth.
pub fn on_update_channel(ctx: &mut DashboardContext, message: &Message) -> HandlerResult {
    let Some(upstream) = message.param("bw_upstream") else {
        return Ok(());
    };

    let Some(id) = message
        .filter
        .equalities()
        .get("id")
        .and_then(|v| EntityId::from_value(v))
    else {
        tracing::warn!(target: targets::HANDLERS, filter = %message.filter, "dropping channel update without id");
        return Ok(());
    };

    let upstream = number(upstream).unwrap_or(0.0);
    let downstream = message.param("bw_downstream").and_then(number).unwrap_or(0.0);
    let mbps = bandwidth_mbps(upstream, downstream);

    ctx.buffer.enqueue_edge(
        EdgeMutation::new(id)
            .bandwidth_mbps(mbps)
            .label(bandwidth_label(mbps)),
    );
    Ok(())
}

/// Convert byte counters to Mbps, rounded to one decimal.
pub fn bandwidth_mbps(upstream: f64, downstream: f64) -> f64 {
    ((upstream + downstream) / 1024.0 / 1024.0 * 8.0 * 10.0).round() / 10.0
}

/// Edge label for a bandwidth in Mbps. Zero yields an empty label.
pub fn bandwidth_label(mbps: f64) -> String {
    if mbps == 0.0 {
        String::new()
    } else if mbps > GBPS_THRESHOLD {
        // Up to two decimals, without trailing zeros.
        format!("{} Gbps", (mbps / 10.0).round() / 100.0)
    } else {
        format!("{mbps:.1} Mbps")
    }
}

// Numbers arrive either as JSON numbers or as numeric strings.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn interface_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use topoview_core::{Filter, RecordingRenderer, RenderCall};

    fn context() -> (DashboardContext, Arc<RecordingRenderer>) {
        let renderer = Arc::new(RecordingRenderer::new());
        let ctx = DashboardContext::new(
            RegistryMode::Permissive,
            DashboardStyle::default(),
            renderer.clone(),
        );
        (ctx, renderer)
    }

    fn insert_node(id: i64, name: &str, groups: Value, interfaces: Value) -> Message {
        Message::new(Action::Insert, "node").with_params(json!({
            "id": id,
            "name": name,
            "category": "router",
            "x": 2,
            "y": -1.5,
            "groups": groups,
            "interfaces": interfaces,
        }))
    }

    #[test]
    fn test_connect_requests_nodes() {
        let (mut ctx, _) = context();
        on_connect(&mut ctx, &Message::connectivity(Action::Insert)).unwrap();
        assert_eq!(ctx.take_outbox(), vec![Query::select("node")]);
        assert!(ctx.outbox.is_empty());
    }

    #[test]
    fn test_insert_node_builds_mutation() {
        let (mut ctx, renderer) = context();
        on_insert_node(&mut ctx, &insert_node(5, "r1", json!(["core"]), json!(["aa"]))).unwrap();

        assert_eq!(ctx.registry.id_of("r1"), Some(&EntityId::Int(5)));
        assert_eq!(ctx.registry.node_for_interface("aa"), Some(&EntityId::Int(5)));
        assert!(ctx.outbox.is_empty());

        ctx.buffer.flush(renderer.as_ref());
        let expected = NodeMutation::new(5)
            .label("r1")
            .size(37.5)
            .font(Font::node_label())
            .physics(false)
            .position(Position::new(100.0, -75.0))
            .image("img/router.png");
        assert_eq!(renderer.nodes(), vec![expected]);
        assert_eq!(renderer.fit_count(), 0);
    }

    #[test]
    fn test_node_without_group_is_registered_but_hidden() {
        let (mut ctx, _) = context();
        on_insert_node(&mut ctx, &insert_node(3, "hidden", json!([]), json!(["bb"]))).unwrap();

        assert!(ctx.buffer.is_empty());
        assert_eq!(ctx.registry.node_for_interface("bb"), Some(&EntityId::Int(3)));
    }

    #[test]
    fn test_last_node_flushes_fits_and_requests_channels() {
        let (mut ctx, renderer) = context();
        on_insert_node(&mut ctx, &insert_node(1, "a", json!(["g"]), json!([]))).unwrap();
        on_insert_node(
            &mut ctx,
            &insert_node(2, "b", json!(["g"]), json!([])).with_last(true),
        )
        .unwrap();

        let calls = renderer.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(&calls[0], RenderCall::Nodes(nodes) if nodes.len() == 2));
        assert_eq!(calls[1], RenderCall::FitView);
        assert_eq!(ctx.take_outbox(), vec![Query::select("channel")]);
    }

    #[test]
    fn test_insert_node_without_id_fails() {
        let (mut ctx, _) = context();
        let message = Message::new(Action::Insert, "node").with_params(json!({"name": "x"}));
        assert!(on_insert_node(&mut ctx, &message).is_err());
    }

    #[test]
    fn test_update_node_by_name() {
        let (mut ctx, renderer) = context();
        ctx.registry.register_node(EntityId::Int(7), "sw1", Vec::<String>::new()).unwrap();

        let message = Message::new(Action::Update, "node")
            .with_params(json!({"category": "switch-down"}))
            .with_filter(Filter::new().and_eq("name", "sw1"));
        on_update_node(&mut ctx, &message).unwrap();

        ctx.buffer.flush(renderer.as_ref());
        assert_eq!(
            renderer.nodes(),
            vec![NodeMutation::new(7).image("img/switch-down.png")]
        );
    }

    #[test]
    fn test_update_node_rename() {
        let (mut ctx, _) = context();
        ctx.registry.register_node(EntityId::Int(7), "sw1", Vec::<String>::new()).unwrap();

        let message = Message::new(Action::Update, "node")
            .with_params(json!({"name": "sw9"}))
            .with_filter(Filter::new().and_eq("id", 7));
        on_update_node(&mut ctx, &message).unwrap();

        assert_eq!(ctx.registry.id_of("sw9"), Some(&EntityId::Int(7)));
        assert_eq!(ctx.buffer.pending_nodes(), 1);
    }

    #[test]
    fn test_unresolvable_node_update_is_dropped() {
        let (mut ctx, _) = context();
        let message = Message::new(Action::Update, "node")
            .with_params(json!({"category": "x"}))
            .with_filter(Filter::new().and_eq("name", "ghost"));
        on_update_node(&mut ctx, &message).unwrap();
        assert!(ctx.buffer.is_empty());
    }

    #[test]
    fn test_wired_channel_maps_interfaces() {
        let (mut ctx, renderer) = context();
        ctx.registry.register_node(EntityId::Int(1), "a", ["if-a"]).unwrap();
        ctx.registry.register_node(EntityId::Int(2), "b", ["if-b"]).unwrap();

        let message = Message::new(Action::Insert, "channel").with_params(json!({
            "id": "c1",
            "type": "wiredchannel",
            "src": "if-a",
            "dst": "if-b",
            "capacity": 100,
        }));
        on_insert_channel(&mut ctx, &message).unwrap();

        ctx.buffer.flush(renderer.as_ref());
        let edges = renderer.edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from, Some(EntityId::Int(1)));
        assert_eq!(edges[0].to, Some(EntityId::Int(2)));
        assert_eq!(edges[0].capacity, Some(100.0));
        assert_eq!(ctx.registry.edge_capacity(&EntityId::from("c1")), Some(100.0));
    }

    #[test]
    fn test_link_channels_use_node_endpoints() {
        let (mut ctx, renderer) = context();
        for channel_type in ["link", "memiflink", "phylink"] {
            let message = Message::new(Action::Insert, "channel").with_params(json!({
                "id": channel_type,
                "type": channel_type,
                "src_node": 10,
                "dst_node": 11,
                "src": "unused",
            }));
            on_insert_channel(&mut ctx, &message).unwrap();
        }

        ctx.buffer.flush(renderer.as_ref());
        let edges = renderer.edges();
        assert_eq!(edges.len(), 3);
        for edge in edges {
            assert_eq!(edge.from, Some(EntityId::Int(10)));
            assert_eq!(edge.to, Some(EntityId::Int(11)));
        }
    }

    #[test]
    fn test_emulated_channel_fans_out_per_station() {
        let (mut ctx, renderer) = context();
        ctx.registry.register_node(EntityId::Int(1), "sta1", Vec::<String>::new()).unwrap();
        ctx.registry.register_node(EntityId::Int(2), "sta2", Vec::<String>::new()).unwrap();

        let message = Message::new(Action::Insert, "channel").with_params(json!({
            "id": "wifi",
            "type": "emulatedchannel",
            "name": "wlan0",
            "stations": [1, 2],
            "ap": 9,
            "capacity": "54",
        }));
        on_insert_channel(&mut ctx, &message).unwrap();

        ctx.buffer.flush(renderer.as_ref());
        let edges = renderer.edges();
        let ids: Vec<_> = edges.iter().map(|e| e.id.to_string()).collect();
        assert_eq!(ids, vec!["tap-sta1-wlan0", "tap-sta2-wlan0"]);
        assert!(edges.iter().all(|e| e.dashed == Some(true)));
        assert!(edges.iter().all(|e| e.to == Some(EntityId::Int(9))));
        assert_eq!(
            ctx.registry.edge_capacity(&EntityId::from("tap-sta2-wlan0")),
            Some(54.0)
        );
    }

    #[test]
    fn test_unknown_channel_type_is_ignored() {
        let (mut ctx, _) = context();
        let message = Message::new(Action::Insert, "channel")
            .with_params(json!({"id": "x", "type": "bluetooth"}));
        on_insert_channel(&mut ctx, &message).unwrap();
        assert!(ctx.buffer.is_empty());
    }

    #[test]
    fn test_update_channel_label() {
        let (mut ctx, renderer) = context();
        let message = Message::new(Action::Update, "channel")
            .with_params(json!({"bw_upstream": 1048576, "bw_downstream": "524288"}))
            .with_filter(Filter::new().and_eq("id", "c1"));
        on_update_channel(&mut ctx, &message).unwrap();

        ctx.buffer.flush(renderer.as_ref());
        assert_eq!(
            renderer.edges(),
            vec![EdgeMutation::new("c1").bandwidth_mbps(12.0).label("12.0 Mbps")]
        );
    }

    #[test]
    fn test_update_channel_without_bandwidth_is_ignored() {
        let (mut ctx, _) = context();
        let message = Message::new(Action::Update, "channel")
            .with_params(json!({"bw_downstream": 10}))
            .with_filter(Filter::new().and_eq("id", "c1"));
        on_update_channel(&mut ctx, &message).unwrap();
        assert!(ctx.buffer.is_empty());
    }

    #[test]
    fn test_bandwidth_formatting() {
        assert_eq!(bandwidth_mbps(0.0, 0.0), 0.0);
        assert_eq!(bandwidth_mbps(131072.0, 0.0), 1.0);
        assert_eq!(bandwidth_label(0.0), "");
        assert_eq!(bandwidth_label(12.3), "12.3 Mbps");
        assert_eq!(bandwidth_label(1000.0), "1000.0 Mbps");
        assert_eq!(bandwidth_label(1234.5), "1.23 Gbps");
        assert_eq!(bandwidth_label(1200.0), "1.2 Gbps");
        assert_eq!(bandwidth_label(2000.4), "2 Gbps");
    }

    #[test]
    fn test_bind_dashboard() {
        let mut dispatcher = Dispatcher::new();
        bind_dashboard(&mut dispatcher);
        assert_eq!(dispatcher.key_count(), 6);
        assert_eq!(dispatcher.handler_count(Action::Insert, "node"), 1);
    }
}
