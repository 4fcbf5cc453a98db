//! Gameplay RPC payloads carried in [`skirmish_net::RpcFrame`]s.

use serde::{Deserialize, Serialize};
use skirmish_net::ParticipantId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameRpc {
    /// Shooter -> authority. Damage is computed by the shooter, headshot
    /// multiplier included, and is not revalidated.
    ReportHit {
        target: ParticipantId,
        damage: f32,
        headshot: bool,
    },
    /// Owner -> authority: a round was fired.
    ShotFired,
    /// Authority -> everyone but the shooter.
    ShotEffect { shooter: ParticipantId },
    /// Authority -> everyone.
    HitEffect {
        target: ParticipantId,
        attacker: Option<ParticipantId>,
        amount: f32,
    },
    /// Authority -> everyone.
    DeathEffect {
        victim: ParticipantId,
        killer: Option<ParticipantId>,
        killer_label: String,
    },
    /// Authority -> everyone: the actor was placed at `position`.
    Respawned {
        actor: ParticipantId,
        position: [f32; 3],
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_death_effect_survives_postcard() {
        let msg = GameRpc::DeathEffect {
            victim: ParticipantId(3),
            killer: None,
            killer_label: "Unknown".into(),
        };
        let bytes = postcard::to_allocvec(&msg).unwrap();
        let back: GameRpc = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back, msg);
    }
}
