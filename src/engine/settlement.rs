//! Settlement: the eliminated hunter's parting shot, and game-over handling.

use crate::protocol::{
    EliminationReason, GameError, Phase, ReplayEvent, Role, RoleReveal, Seat, UserId,
    GAME_OVER_LINGER_MS,
};

use super::state::GameState;

impl GameState {
    /// Enter settlement waiting for the hunter at `seat` to shoot or pass.
    pub fn begin_settlement(&mut self, seat: Seat, now: i64) {
        self.phase = Phase::Settlement;
        self.settlement.pending_hunter_seat = Some(seat);
        self.active_role = None;
        self.active_speaker_seat = None;
        self.speaking_queue.clear();

        self.push_public_log(format!("{seat}号是猎人，等待开枪"));
        self.push_event(ReplayEvent::PhaseChanged {
            phase: Phase::Settlement,
            day_no: self.day_no,
        });
        self.arm_phase_clock(now, self.timers.settlement_seconds);
    }

    /// The pending hunter shoots a living seat, or passes with `None`.
    pub fn apply_hunter_shoot(
        &mut self,
        user_id: &UserId,
        target: Option<Seat>,
    ) -> Result<(), GameError> {
        if self.phase != Phase::Settlement {
            return Err(GameError::PhaseForbidsAction);
        }
        let player = self.player_by_user(user_id).ok_or(GameError::NotInGame)?;
        if self.settlement.pending_hunter_seat != Some(player.seat) {
            return Err(GameError::NotYourTurn);
        }
        let hunter_seat = player.seat;
        if let Some(seat) = target {
            if !self.is_seat_alive(seat) {
                return Err(GameError::TargetInvalid);
            }
        }
        self.push_event(ReplayEvent::ActionSubmitted {
            seat: hunter_seat,
            action: "settlement.hunterShoot".into(),
        });
        self.resolve_hunter_shot(hunter_seat, target, crate::protocol::now_ms());
        Ok(())
    }

    /// Apply the shot (if any) and leave settlement. A shot hunter chains
    /// into a fresh settlement.
    pub fn resolve_hunter_shot(&mut self, hunter_seat: Seat, target: Option<Seat>, now: i64) {
        self.settlement.pending_hunter_seat = None;

        let mut chained_hunter: Option<Seat> = None;
        if let Some(seat) = target {
            if let Some(victim) = self.player_by_seat_mut(seat) {
                if victim.is_alive {
                    victim.is_alive = false;
                    if victim.role == Role::Hunter {
                        chained_hunter = Some(seat);
                    }
                    self.push_public_log(format!("{hunter_seat}号猎人开枪带走了{seat}号"));
                    self.push_event(ReplayEvent::PlayerEliminated {
                        seat,
                        reason: EliminationReason::Hunter,
                    });
                }
            }
        } else {
            self.push_public_log(format!("{hunter_seat}号猎人没有开枪"));
        }

        if self.check_winner_and_finish(now) {
            return;
        }
        if let Some(seat) = chained_hunter {
            self.begin_settlement(seat, now);
            return;
        }

        if self.day_no > 0 {
            self.begin_night(now);
        } else {
            // First-night hunter death before any day: the day starts now
            self.day_no = 1;
            self.begin_day_speech(now);
        }
    }

    /// Re-evaluate the winner; on a verdict, seal the game. Returns `true`
    /// when the game just ended.
    pub fn check_winner_and_finish(&mut self, now: i64) -> bool {
        if self.phase == Phase::GameOver {
            return true;
        }
        let Some(winner) = self.compute_winner() else {
            return false;
        };

        self.winner = Some(winner);
        self.phase = Phase::GameOver;
        self.active_role = None;
        self.active_speaker_seat = None;
        self.speaking_queue.clear();
        self.settlement.pending_hunter_seat = None;
        self.phase_ends_at = (now + GAME_OVER_LINGER_MS).max(self.phase_ends_at + 1);

        self.push_public_log(winner.announcement());
        let roles = self
            .players
            .iter()
            .map(|p| RoleReveal {
                seat: p.seat,
                nickname: p.nickname.clone(),
                role: p.role,
            })
            .collect();
        self.push_event(ReplayEvent::GameResult { winner, roles });
        true
    }
}
