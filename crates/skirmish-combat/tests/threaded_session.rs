//! Arenas ticking on their own threads converge once traffic settles.

mod common;

use std::thread;
use std::time::Duration;

use common::{DT, Peer, guest, host, pump, test_config};
use skirmish_combat::TriggerInput;
use skirmish_net::LoopbackHub;
use skirmish_physics::MovementInput;

const GUESTS: usize = 3;
const TICKS: usize = 240;
const SETTLE_TICKS: usize = 240;

#[test]
fn test_concurrent_arenas_agree_after_quiescence() {
    let hub = LoopbackHub::new();
    let first = host(&hub, test_config());
    let host_id = first.id();
    let mut peers = vec![first];
    for _ in 0..GUESTS {
        peers.push(guest(&hub, test_config(), host_id));
    }

    let handles: Vec<thread::JoinHandle<Peer>> = peers
        .into_iter()
        .enumerate()
        .map(|(slot, mut peer)| {
            thread::spawn(move || {
                let idle = MovementInput::default();
                for tick in 0..TICKS {
                    if slot > 0 {
                        let _ = peer.arena.fire(TriggerInput {
                            held: true,
                            pressed: tick % 10 == 0,
                        });
                        if tick % 30 == slot {
                            let _ = peer.arena.report_hit(host_id, tick % 60 == slot);
                        }
                    }
                    peer.arena.tick(DT, &idle);
                    thread::sleep(Duration::from_micros(100));
                }
                peer
            })
        })
        .collect();

    let mut peers: Vec<Peer> = handles
        .into_iter()
        .map(|handle| handle.join().expect("arena thread panicked"))
        .collect();
    // Long enough for pending reloads and respawns to finish.
    pump(&mut peers, SETTLE_TICKS);

    let authority = peers[0].arena.actor(host_id).unwrap();
    let (health, dead) = (authority.health.current(), authority.health.is_dead());
    assert!(peers[0].arena.stats().kills >= 1, "enough damage was reported to kill");

    for peer in &peers[1..] {
        let mirror = peer.arena.actor(host_id).unwrap();
        assert_eq!(mirror.health.current(), health);
        assert_eq!(mirror.health.is_dead(), dead);
        assert_eq!(peer.arena.actor_ids().len(), GUESTS + 1);

        let own = peer.arena.actor(peer.id()).unwrap();
        let on_host = peers[0].arena.actor(peer.id()).unwrap();
        assert_eq!(on_host.weapon.clip(), own.weapon.clip());
        assert_eq!(on_host.weapon.reserve(), own.weapon.reserve());
        assert!(own.weapon.clip() <= own.weapon.profile().clip_size);
    }
}
