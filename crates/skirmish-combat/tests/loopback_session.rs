//! Host and guests exchanging real packets over the loopback transport.

mod common;

use common::{DT, Peer, guest, health_seen_by, host, pump, test_config};
use glam::Vec3;
use skirmish_combat::{
    Arena, FireOutcome, PresentationEvent, RecordingSink, TriggerInput, TriggerOutcome,
    UNKNOWN_KILLER,
};
use skirmish_multiplayer::SessionContext;
use skirmish_net::{LoopbackHub, ParticipantId};
use skirmish_physics::{MovementInput, PhysicsBackend, RapierBackend};

fn two_peers(hub: &LoopbackHub) -> Vec<Peer> {
    let first = host(hub, test_config());
    let host_id = first.id();
    let second = guest(hub, test_config(), host_id);
    let mut peers = vec![first, second];
    pump(&mut peers, 3);
    peers
}

fn trigger() -> TriggerInput {
    TriggerInput {
        held: true,
        pressed: true,
    }
}

#[test]
fn test_join_creates_actors_on_both_sides() {
    let hub = LoopbackHub::new();
    let peers = two_peers(&hub);
    let (host_id, guest_id) = (peers[0].id(), peers[1].id());

    for peer in &peers {
        assert_eq!(peer.arena.actor_ids(), vec![host_id, guest_id]);
    }
    assert_eq!(peers[1].arena.position(guest_id), Some(Vec3::new(10.0, 2.0, 0.0)));
}

#[test]
fn test_reported_hit_replicates_to_everyone() {
    let hub = LoopbackHub::new();
    let mut peers = two_peers(&hub);
    let (host_id, guest_id) = (peers[0].id(), peers[1].id());

    let damage = peers[1].arena.report_hit(host_id, false).unwrap();
    assert_eq!(damage, 25.0);
    pump(&mut peers, 3);

    assert_eq!(health_seen_by(&peers[0], host_id), 75.0);
    assert_eq!(health_seen_by(&peers[1], host_id), 75.0);
    assert!(peers[1].sink.events().contains(&PresentationEvent::Hit {
        target: host_id,
        attacker: Some(guest_id),
        amount: 25.0,
    }));
}

#[test]
fn test_kill_and_respawn_seen_by_victim() {
    let hub = LoopbackHub::new();
    let mut peers = two_peers(&hub);
    let (host_id, guest_id) = (peers[0].id(), peers[1].id());

    peers[0].arena.apply_damage(guest_id, 100.0, Some(host_id)).unwrap();
    pump(&mut peers, 3);

    let victim = &peers[1];
    assert!(victim.arena.actor(guest_id).unwrap().health.is_dead());
    assert!(victim.arena.snapshot(guest_id).unwrap().dead);
    assert!(victim.sink.events().contains(&PresentationEvent::Death {
        victim: guest_id,
        killer_label: "Player 1".into(),
    }));
    assert_eq!(
        peers[1].arena.fire(trigger()).unwrap(),
        TriggerOutcome::Idle
    );

    let delay = peers[0].arena.config().session.respawn_delay_secs;
    pump(&mut peers, (delay / DT) as usize + 5);

    let victim = &peers[1];
    let actor = victim.arena.actor(guest_id).unwrap();
    assert!(!actor.health.is_dead());
    assert_eq!(actor.health.current(), 100.0);
    assert_eq!(actor.position, Vec3::new(10.0, 2.0, 0.0));
    let respawns = victim
        .sink
        .events()
        .iter()
        .filter(|e| matches!(e, PresentationEvent::Respawned { actor, .. } if *actor == guest_id))
        .count();
    assert_eq!(respawns, 2, "initial placement and the respawn");
}

#[test]
fn test_owner_weapon_state_mirrors_on_host() {
    let hub = LoopbackHub::new();
    let mut peers = two_peers(&hub);
    let guest_id = peers[1].id();

    assert_eq!(
        peers[1].arena.fire(trigger()).unwrap(),
        TriggerOutcome::Fire(FireOutcome::Fired)
    );
    peers[1].arena.reload().unwrap();
    pump(&mut peers, 3);

    let mirror = &peers[0].arena.actor(guest_id).unwrap().weapon;
    assert_eq!(mirror.clip(), 29);
    assert!(mirror.is_reloading());

    let reload = peers[1].arena.config().weapon.reload_secs;
    pump(&mut peers, (reload / DT) as usize + 5);
    let mirror = &peers[0].arena.actor(guest_id).unwrap().weapon;
    assert_eq!(mirror.clip(), 30);
    assert_eq!(mirror.reserve(), 89);
    assert!(!mirror.is_reloading());
}

#[test]
fn test_shot_effect_skips_the_shooter() {
    let hub = LoopbackHub::new();
    let first = host(&hub, test_config());
    let host_id = first.id();
    let second = guest(&hub, test_config(), host_id);
    let third = guest(&hub, test_config(), host_id);
    let mut peers = vec![first, second, third];
    pump(&mut peers, 3);
    let shooter = peers[1].id();

    peers[1].arena.fire(trigger()).unwrap();
    pump(&mut peers, 3);

    let shots = |peer: &Peer| {
        peer.sink
            .events()
            .iter()
            .filter(|e| **e == PresentationEvent::ShotFired { shooter })
            .count()
    };
    assert_eq!(shots(&peers[0]), 1);
    assert_eq!(shots(&peers[1]), 1, "local event only");
    assert_eq!(shots(&peers[2]), 1);
}

#[test]
fn test_duplicate_delivery_applies_once() {
    let hub = LoopbackHub::with_duplicate_delivery(true);
    let mut peers = two_peers(&hub);
    let host_id = peers[0].id();

    peers[1].arena.report_hit(host_id, false).unwrap();
    pump(&mut peers, 4);

    assert_eq!(health_seen_by(&peers[0], host_id), 75.0);
    assert_eq!(health_seen_by(&peers[1], host_id), 75.0);
    assert!(peers[0].arena.duplicate_rpcs() >= 1);
    assert!(peers[1].arena.duplicate_rpcs() >= 1);

    let changes = peers[1]
        .sink
        .events()
        .iter()
        .filter(|e| matches!(e, PresentationEvent::HealthChanged { actor, .. } if *actor == host_id))
        .count();
    assert_eq!(changes, 1);
}

#[test]
fn test_late_joiner_receives_current_state() {
    let hub = LoopbackHub::new();
    let mut peers = two_peers(&hub);
    let (host_id, early) = (peers[0].id(), peers[1].id());

    peers[0].arena.apply_damage(early, 30.0, Some(host_id)).unwrap();
    peers[1].arena.fire(trigger()).unwrap();
    pump(&mut peers, 3);

    peers.push(guest(&hub, test_config(), host_id));
    pump(&mut peers, 3);

    let late = &peers[2];
    assert_eq!(health_seen_by(late, early), 70.0);
    assert_eq!(late.arena.actor(early).unwrap().weapon.clip(), 29);
    assert_eq!(late.arena.actor_ids().len(), 3);
}

#[test]
fn test_departure_removes_actor_everywhere() {
    let hub = LoopbackHub::new();
    let mut peers = two_peers(&hub);
    let host_id = peers[0].id();
    let third = guest(&hub, test_config(), host_id);
    peers.push(third);
    pump(&mut peers, 3);
    let leaving = peers[1].id();

    peers[0].arena.apply_damage(leaving, 100.0, Some(host_id)).unwrap();
    peers.remove(1);
    pump(&mut peers, 3);

    for peer in &peers {
        assert!(peer.arena.actor(leaving).is_none());
        assert!(!peer.arena.ctx().contains(leaving));
    }
    assert_eq!(peers[0].arena.killer_label(Some(leaving)), UNKNOWN_KILLER);

    let delay = peers[0].arena.config().session.respawn_delay_secs;
    pump(&mut peers, (delay / DT) as usize + 5);
    assert_eq!(peers[0].arena.stats().respawns, 0);
}

#[test]
fn test_grounded_jump_with_rapier_scene() {
    let mut backend = RapierBackend::new();
    backend.add_floor(50.0);
    backend.step(DT as f32);

    let id = ParticipantId(1);
    let sink = RecordingSink::new();
    let mut arena = Arena::new(test_config(), SessionContext::host(id))
        .with_physics(backend)
        .with_sink(sink.clone());

    for _ in 0..120 {
        arena.tick(DT, &MovementInput::default());
    }
    assert!(arena.snapshot(id).unwrap().grounded);
    let rest = arena.position(id).unwrap();
    assert!(rest.y < 2.0 && rest.y > 0.5, "settled on the floor: {rest:?}");

    let jump = MovementInput {
        jump: true,
        ..Default::default()
    };
    arena.tick(DT, &jump);
    arena.tick(DT, &jump);

    let jumps = sink
        .events()
        .iter()
        .filter(|e| matches!(e, PresentationEvent::Jump { .. }))
        .count();
    assert_eq!(jumps, 1, "second request is inside the cooldown");
    assert!(arena.actor(id).unwrap().motion.last_jump_at.is_some());
}

#[test]
fn test_zero_dt_tick_freezes_clock_and_bodies() {
    let mut backend = RapierBackend::new();
    backend.add_floor(50.0);
    backend.step(DT as f32);

    let id = ParticipantId(1);
    let mut arena = Arena::new(test_config(), SessionContext::host(id)).with_physics(backend);
    let before = arena.position(id).unwrap();

    for _ in 0..30 {
        arena.tick(0.0, &MovementInput::default());
    }
    arena.tick(-DT, &MovementInput::default());

    assert_eq!(arena.clock(), 0.0);
    assert_eq!(arena.position(id), Some(before));

    arena.tick(DT, &MovementInput::default());
    assert!(arena.position(id).unwrap().y < before.y);
}
