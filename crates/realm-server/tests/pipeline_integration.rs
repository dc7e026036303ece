//! Integration tests for the inbound pipeline, driven through the coordinator
//! with frame bodies exactly as the network layer hands them over.

use std::sync::Arc;

use realm_core::protocol::catalog::encode_client_frame;
use realm_core::protocol::client_packets::{Attack, ConfirmTargetItem, NetPing, SelectCharacter};
use realm_core::{
    decode_frame, standard_registry, ClientPacket, ClientPacketId, InstanceType, ProtocolError,
    ServerPacket, WireId,
};
use realm_server::application::collaborators::{
    CombatContext, CombatRules, CombatantView, Outcome, StandardCombatRules,
};
use realm_server::application::context::{ExecutionSettings, ServerContext};
use realm_server::application::coordinator::{Coordinator, SessionSettings};
use realm_server::application::handlers::ExecutionFault;
use realm_server::application::inbound::{DecodePolicy, FrameOutcome, PacketStage};
use realm_server::application::session::Session;
use realm_server::infrastructure::storage::config::AppConfig;
use realm_server::infrastructure::storage::data_store::ConfigDataStore;

const ARIA: i32 = 100_001;
const BREN: i32 = 100_002;
const GREMLIN: i32 = 200_900;

const WORLD: &str = r#"
[[characters]]
object_id = 100001
name = "Aria"
p_atk = 100

[[characters]]
object_id = 100002
name = "Bren"
p_atk = 100

[[npcs]]
object_id = 200900
name = "Gremlin"
kind = "Monster"
max_hp = 1000000
p_def = 100

[[items]]
object_id = 42
item_id = 6579
owner_id = 100001
kind = "weapon"
"#;

// ── Fixtures ──────────────────────────────────────────────────────────────────

struct PanickingRules;

impl CombatRules for PanickingRules {
    fn compute_outcome(&self, _: &CombatantView, _: &CombatantView, _: &CombatContext) -> Outcome {
        panic!("rules exploded");
    }
}

async fn coordinator(rules: impl CombatRules + 'static, policy: DecodePolicy) -> Arc<Coordinator> {
    coordinator_for(WORLD, rules, policy).await
}

async fn coordinator_for(
    world: &str,
    rules: impl CombatRules + 'static,
    policy: DecodePolicy,
) -> Arc<Coordinator> {
    let config: AppConfig = toml::from_str(world).expect("world config");
    config.validate().expect("valid world config");
    let ctx = Arc::new(ServerContext::new(
        standard_registry().expect("registry"),
        InstanceType::build_taxonomy().expect("taxonomy"),
        Arc::new(rules),
        Arc::new(ConfigDataStore::from_config(&config)),
        ExecutionSettings::default(),
    ));
    ctx.world.populate(&config.npcs, &config.items, &config.rooms).await;
    Arc::new(Coordinator::new(
        ctx,
        SessionSettings {
            decode_policy: policy,
            ..SessionSettings::default()
        },
    ))
}

fn body(c: &Coordinator, packet: ClientPacket) -> Vec<u8> {
    let frame = encode_client_frame(c.registry(), &packet).expect("encode");
    decode_frame(&frame).expect("frame").0.to_vec()
}

async fn select(c: &Coordinator, session: &Arc<Session>, char_obj_id: i32) {
    let outcome = c
        .on_frame(session, &body(c, ClientPacket::SelectCharacter(SelectCharacter { char_obj_id })))
        .await;
    assert!(matches!(outcome, FrameOutcome::Executed(ClientPacketId::SelectCharacter)));
    assert!(matches!(&session.take_pending()[..], [ServerPacket::CharSelected(_)]));
}

fn attack(target_obj_id: i32) -> ClientPacket {
    ClientPacket::Attack(Attack {
        target_obj_id,
        x: 0,
        y: 0,
        z: 0,
        shift: false,
    })
}

fn peer() -> std::net::SocketAddr {
    "127.0.0.1:52000".parse().unwrap()
}

// ── Validation ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_confirm_item_without_character_is_rejected_and_world_unchanged() {
    // Arrange – opcode 0x01, item_obj_id = 42, no character selected
    let c = coordinator(StandardCombatRules, DecodePolicy::Strict).await;
    let s = c.open_session(peer()).await;
    let before = c.context().world.snapshot().await;

    // Act
    let outcome = c.on_frame(&s, &[0x01, 0x2A, 0x00, 0x00, 0x00]).await;

    // Assert
    assert!(matches!(
        outcome,
        FrameOutcome::Rejected { packet: ClientPacketId::ConfirmTargetItem, .. }
    ));
    assert_eq!(outcome.stage(), PacketStage::Rejected);
    assert_eq!(s.pending_len(), 0);
    assert_eq!(c.context().world.snapshot().await, before);
    assert!(!s.is_closed());
}

#[tokio::test]
async fn test_selected_character_can_offer_own_item() {
    // Arrange
    let c = coordinator(StandardCombatRules, DecodePolicy::Strict).await;
    let s = c.open_session(peer()).await;
    select(&c, &s, ARIA).await;

    // Act
    let outcome = c
        .on_frame(&s, &body(&c, ClientPacket::ConfirmTargetItem(ConfirmTargetItem { item_obj_id: 42 })))
        .await;

    // Assert
    assert!(matches!(outcome, FrameOutcome::Executed(ClientPacketId::ConfirmTargetItem)));
    assert!(matches!(
        &s.take_pending()[..],
        [ServerPacket::ExPutItemResultForVariationMake(v)] if v.item_obj_id == 42 && v.item_id == 6_579
    ));
}

#[tokio::test]
async fn test_other_players_item_is_rejected_silently() {
    let c = coordinator(StandardCombatRules, DecodePolicy::Strict).await;
    let s = c.open_session(peer()).await;
    select(&c, &s, BREN).await;

    let outcome = c.on_frame(&s, &[0x01, 0x2A, 0x00, 0x00, 0x00]).await;

    assert_eq!(outcome.stage(), PacketStage::Rejected);
    assert_eq!(s.pending_len(), 0);
}

// ── Object ids ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_select_with_unnumbered_npcs_enters_the_character() {
    // Arrange
    let world = r#"
[[characters]]
object_id = 100001
name = "Aria"

[[npcs]]
name = "Gremlin"
kind = "Monster"

[[npcs]]
name = "Wolf"
kind = "Monster"
"#;
    let c = coordinator_for(world, StandardCombatRules, DecodePolicy::Strict).await;
    let s = c.open_session(peer()).await;

    // Act
    let outcome = c
        .on_frame(&s, &body(&c, ClientPacket::SelectCharacter(SelectCharacter { char_obj_id: ARIA })))
        .await;
    let selected = s.take_pending();
    c.on_frame(&s, &body(&c, ClientPacket::Logout)).await;

    // Assert
    assert!(matches!(outcome, FrameOutcome::Executed(ClientPacketId::SelectCharacter)));
    assert!(matches!(
        &selected[..],
        [ServerPacket::CharSelected(p)] if p.object_id == ARIA && p.name == "Aria"
    ));
    let snapshot = c.context().world.snapshot().await;
    let names: Vec<&str> = snapshot.actors.values().map(|(_, name, _)| name.as_str()).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"Gremlin") && names.contains(&"Wolf"));
}

#[test]
fn test_world_config_with_character_in_runtime_id_range_is_refused() {
    let world = WORLD.replacen("object_id = 100001", "object_id = 268435457", 1);
    let config: AppConfig = toml::from_str(&world).expect("world config");

    assert!(config.validate().is_err());
}

// ── Concurrency ───────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_sessions_damaging_one_target_lose_no_update() {
    // Arrange – two players, 25 swings each, 70 damage per swing
    let c = coordinator(StandardCombatRules, DecodePolicy::Strict).await;
    let s1 = c.open_session(peer()).await;
    let s2 = c.open_session(peer()).await;
    select(&c, &s1, ARIA).await;
    select(&c, &s2, BREN).await;

    // Act
    let mut tasks = Vec::new();
    for s in [s1, s2] {
        let c = Arc::clone(&c);
        tasks.push(tokio::spawn(async move {
            let frame = body(&c, attack(GREMLIN));
            for _ in 0..25 {
                let outcome = c.on_frame(&s, &frame).await;
                assert!(matches!(outcome, FrameOutcome::Executed(ClientPacketId::Attack)));
            }
        }));
    }
    for task in tasks {
        task.await.expect("attack task");
    }

    // Assert
    let snapshot = c.context().world.snapshot().await;
    let (_, _, gremlin) = &snapshot.actors[&GREMLIN];
    assert_eq!(gremlin.current_hp, 1_000_000 - 50 * 70);
}

// ── Fault isolation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_panic_during_execution_faults_only_that_frame() {
    // Arrange
    let c = coordinator(PanickingRules, DecodePolicy::Strict).await;
    let s = c.open_session(peer()).await;
    select(&c, &s, ARIA).await;

    // Act
    let faulted = c.on_frame(&s, &body(&c, attack(GREMLIN))).await;
    let next = c
        .on_frame(&s, &body(&c, ClientPacket::NetPing(NetPing { request_id: 1, ping_ms: 20 })))
        .await;

    // Assert
    match faulted {
        FrameOutcome::Faulted {
            packet: ClientPacketId::Attack,
            fault: ExecutionFault::Panicked(message),
        } => assert!(message.contains("rules exploded")),
        other => panic!("expected a panicked fault, got {other:?}"),
    }
    assert!(matches!(next, FrameOutcome::Executed(ClientPacketId::NetPing)));
    assert!(!s.is_closed());
}

#[tokio::test]
async fn test_truncated_frame_under_strict_policy_closes_session() {
    let c = coordinator(StandardCombatRules, DecodePolicy::Strict).await;
    let s = c.open_session(peer()).await;
    select(&c, &s, ARIA).await;

    let outcome = c.on_frame(&s, &[0x0A, 0x00, 0x01]).await;

    assert!(matches!(
        outcome,
        FrameOutcome::Desynchronized(ProtocolError::TruncatedFrame { .. })
    ));
    assert!(s.is_closed());
    assert!(c.context().world.actor(ARIA).await.is_none());
}

#[tokio::test]
async fn test_truncated_frame_under_drop_policy_leaves_world_and_session_intact() {
    // Arrange
    let c = coordinator(StandardCombatRules, DecodePolicy::DropFrame).await;
    let s = c.open_session(peer()).await;
    select(&c, &s, ARIA).await;
    let before = c.context().world.snapshot().await;

    // Act
    let dropped = c.on_frame(&s, &[0x0A, 0x00, 0x01]).await;
    let after = c.context().world.snapshot().await;
    let next = c.on_frame(&s, &body(&c, attack(GREMLIN))).await;

    // Assert
    assert!(matches!(dropped, FrameOutcome::Dropped(ProtocolError::TruncatedFrame { .. })));
    assert_eq!(after, before);
    assert!(matches!(next, FrameOutcome::Executed(ClientPacketId::Attack)));
}

#[tokio::test]
async fn test_unknown_extended_opcode_is_skipped() {
    let c = coordinator(StandardCombatRules, DecodePolicy::Strict).await;
    let s = c.open_session(peer()).await;

    let outcome = c.on_frame(&s, &[0xD0, 0xFF, 0x7F, 0x01]).await;

    assert!(matches!(
        outcome,
        FrameOutcome::UnknownOpcode(w) if w == WireId::extended(0xD0, 0x7FFF)
    ));
    assert!(!s.is_closed());
}
