//! Night flow: sub-role cycling, role action validation, and dawn resolution.

use crate::protocol::{
    EliminationReason, GameError, NightRole, Phase, ReplayEvent, Role, Seat, UserId,
    SHERIFF_ELECTION_MIN_PLAYERS, SHERIFF_ELECTION_SECS,
};

use super::state::{GameState, Player};

impl GameState {
    /// Enter night: clear the per-night scratch (potion flags persist) and
    /// open the first sub-role with living holders.
    pub fn begin_night(&mut self, now: i64) {
        self.phase = Phase::Night;
        self.active_speaker_seat = None;
        self.speaking_queue.clear();
        self.last_night_eliminated.clear();

        let save_used = self.night.witch_save_used;
        let poison_used = self.night.witch_poison_used;
        self.night = Default::default();
        self.night.witch_save_used = save_used;
        self.night.witch_poison_used = poison_used;

        self.push_public_log("天黑请闭眼");
        self.push_event(ReplayEvent::PhaseChanged {
            phase: Phase::Night,
            day_no: self.day_no,
        });

        // At least one wolf is alive while the game continues, so the first
        // sub-role always exists.
        let mut role = NightRole::Werewolf;
        while self.alive_with_role(role.role()).next().is_none() {
            match role.next() {
                Some(next) => role = next,
                None => break,
            }
        }
        self.open_subrole(role, now);
    }

    fn open_subrole(&mut self, role: NightRole, now: i64) {
        self.active_role = Some(role);
        self.night.acted.clear();
        self.push_public_log(role.announcement());

        if role == NightRole::Witch {
            // Spent potions need no decision this night
            if self.night.witch_save_used && self.night.witch_save.is_none() {
                self.night.witch_save = Some(false);
            }
            if self.night.witch_poison_used && self.night.witch_poison.is_none() {
                self.night.witch_poison = Some(None);
            }
        }

        self.arm_phase_clock(now, self.timers.night_seconds);
    }

    /// Move to the next sub-role with living holders. Returns `true` when the
    /// night is exhausted and dawn must be resolved.
    pub fn advance_subrole(&mut self, now: i64) -> bool {
        let mut current = match self.active_role {
            Some(role) => role,
            None => return true,
        };
        loop {
            match current.next() {
                Some(next) => {
                    current = next;
                    if self.alive_with_role(current.role()).next().is_some() {
                        self.open_subrole(current, now);
                        return false;
                    }
                }
                None => {
                    self.active_role = None;
                    return true;
                }
            }
        }
    }

    /// Whether every living holder of the active sub-role has acted.
    pub fn subrole_complete(&self) -> bool {
        let Some(role) = self.active_role else {
            return false;
        };
        match role {
            NightRole::Werewolf => self.alive_with_role(Role::Werewolf).all(|wolf| {
                self.night
                    .wolf_votes
                    .iter()
                    .any(|(uid, _)| *uid == wolf.user_id)
            }),
            _ => self
                .alive_with_role(role.role())
                .all(|holder| self.night.acted.contains(&holder.user_id)),
        }
    }

    fn night_actor<'a>(&'a self, user_id: &UserId, role: NightRole) -> Result<&'a Player, GameError> {
        if self.phase != Phase::Night || self.active_role != Some(role) {
            return Err(GameError::PhaseForbidsAction);
        }
        let player = self.player_by_user(user_id).ok_or(GameError::NotInGame)?;
        if player.role != role.role() {
            return Err(GameError::PhaseForbidsAction);
        }
        if !player.is_alive {
            return Err(GameError::PlayerDead);
        }
        Ok(player)
    }

    /// Wolf ballot for tonight's victim.
    pub fn apply_wolf_kill(&mut self, user_id: &UserId, target: Seat) -> Result<(), GameError> {
        let actor_seat = self.night_actor(user_id, NightRole::Werewolf)?.seat;
        if self.night.wolf_votes.iter().any(|(uid, _)| uid == user_id) {
            return Err(GameError::AlreadyActed);
        }
        let victim = self.player_by_seat(target).ok_or(GameError::TargetInvalid)?;
        if !victim.is_alive || victim.role.is_wolf() {
            return Err(GameError::TargetInvalid);
        }
        self.night.wolf_votes.push((user_id.clone(), target));
        self.push_event(ReplayEvent::ActionSubmitted {
            seat: actor_seat,
            action: "night.wolfKill".into(),
        });
        Ok(())
    }

    /// Seer divination; the verdict is pushed as a private hint.
    pub fn apply_seer_check(&mut self, user_id: &UserId, target: Seat) -> Result<(), GameError> {
        let actor = self.night_actor(user_id, NightRole::Seer)?;
        let actor_seat = actor.seat;
        if self.night.acted.contains(user_id) {
            return Err(GameError::AlreadyActed);
        }
        let checked = self.player_by_seat(target).ok_or(GameError::TargetInvalid)?;
        if !checked.is_alive || checked.seat == actor_seat {
            return Err(GameError::TargetInvalid);
        }
        let verdict = checked.role.seer_label();

        self.night.seer_target = Some(target);
        self.night.acted.push(user_id.clone());
        self.push_hint(user_id, format!("你查验了 {target} 号：{verdict}"));
        self.push_event(ReplayEvent::ActionSubmitted {
            seat: actor_seat,
            action: "night.seerCheck".into(),
        });
        Ok(())
    }

    /// Guard protection; seat 0 protects nobody.
    pub fn apply_guard_protect(&mut self, user_id: &UserId, target: Seat) -> Result<(), GameError> {
        let actor_seat = self.night_actor(user_id, NightRole::Guard)?.seat;
        if self.night.acted.contains(user_id) {
            return Err(GameError::AlreadyActed);
        }
        if target != 0 {
            if !self.is_seat_alive(target) {
                return Err(GameError::TargetInvalid);
            }
            self.night.guard_target = Some(target);
        }
        self.night.acted.push(user_id.clone());
        self.push_event(ReplayEvent::ActionSubmitted {
            seat: actor_seat,
            action: "night.guardProtect".into(),
        });
        Ok(())
    }

    /// Witch antidote decision.
    pub fn apply_witch_save(&mut self, user_id: &UserId, use_potion: bool) -> Result<(), GameError> {
        let actor_seat = self.night_actor(user_id, NightRole::Witch)?.seat;
        if self.night.witch_save_used {
            return Err(GameError::PotionUsed);
        }
        if self.night.witch_save.is_some() {
            return Err(GameError::AlreadyActed);
        }
        self.night.witch_save = Some(use_potion);
        self.mark_witch_done(user_id);
        self.push_event(ReplayEvent::ActionSubmitted {
            seat: actor_seat,
            action: "night.witch.save".into(),
        });
        Ok(())
    }

    /// Witch poison decision, `None` to hold the potion.
    pub fn apply_witch_poison(
        &mut self,
        user_id: &UserId,
        target: Option<Seat>,
    ) -> Result<(), GameError> {
        let actor_seat = self.night_actor(user_id, NightRole::Witch)?.seat;
        if self.night.witch_poison_used {
            return Err(GameError::PotionUsed);
        }
        if self.night.witch_poison.is_some() {
            return Err(GameError::AlreadyActed);
        }
        if let Some(seat) = target {
            if !self.is_seat_alive(seat) || seat == actor_seat {
                return Err(GameError::TargetInvalid);
            }
        }
        self.night.witch_poison = Some(target);
        self.mark_witch_done(user_id);
        self.push_event(ReplayEvent::ActionSubmitted {
            seat: actor_seat,
            action: "night.witch.poison".into(),
        });
        Ok(())
    }

    /// The witch is done once both potion decisions exist.
    fn mark_witch_done(&mut self, user_id: &UserId) {
        if self.night.witch_save.is_some()
            && self.night.witch_poison.is_some()
            && !self.night.acted.contains(user_id)
        {
            self.night.acted.push(user_id.clone());
        }
    }

    /// Dawn: apply wolf kill, antidote, guard, and poison, then route to
    /// settlement, the sheriff election, or day speech.
    pub fn resolve_night(&mut self, now: i64) {
        self.active_role = None;

        let victim = self.wolf_victim();
        let mut eliminated: Vec<(Seat, EliminationReason)> = Vec::new();

        if let Some(victim_seat) = victim {
            let saved = self.night.witch_save == Some(true) && !self.night.witch_save_used;
            if saved {
                self.night.witch_save_used = true;
            }
            let guarded = self.night.guard_target == Some(victim_seat);
            if !saved && !guarded && self.is_seat_alive(victim_seat) {
                eliminated.push((victim_seat, EliminationReason::Wolf));
            }
        }

        if let Some(Some(poison_seat)) = self.night.witch_poison {
            if !self.night.witch_poison_used {
                self.night.witch_poison_used = true;
                if self.is_seat_alive(poison_seat)
                    && !eliminated.iter().any(|(seat, _)| *seat == poison_seat)
                {
                    eliminated.push((poison_seat, EliminationReason::Poison));
                }
            }
        }

        for (seat, reason) in &eliminated {
            if let Some(player) = self.player_by_seat_mut(*seat) {
                player.is_alive = false;
            }
            self.push_event(ReplayEvent::PlayerEliminated {
                seat: *seat,
                reason: *reason,
            });
        }
        self.last_night_eliminated = eliminated.iter().map(|(seat, _)| *seat).collect();

        if eliminated.is_empty() {
            self.push_public_log("天亮了，无人出局");
        } else {
            let seats = self
                .last_night_eliminated
                .iter()
                .map(|seat| format!("{seat}"))
                .collect::<Vec<_>>()
                .join("、");
            self.push_public_log(format!("天亮了，{seats}号出局"));
        }
        self.push_event(ReplayEvent::NightResult {
            eliminated_seats: self.last_night_eliminated.clone(),
        });

        if self.check_winner_and_finish(now) {
            return;
        }

        let hunter_down = self
            .last_night_eliminated
            .iter()
            .copied()
            .find(|seat| self.player_by_seat(*seat).is_some_and(|p| p.role == Role::Hunter));
        if let Some(hunter_seat) = hunter_down {
            self.begin_settlement(hunter_seat, now);
            return;
        }

        self.day_no += 1;
        if self.day_no == 1
            && self.players.len() >= SHERIFF_ELECTION_MIN_PLAYERS
            && self.sheriff_seat.is_none()
        {
            self.begin_sheriff_election(now);
        } else {
            self.begin_day_speech(now);
        }
    }

    /// Open the sheriff enrollment window.
    pub fn begin_sheriff_election(&mut self, now: i64) {
        self.phase = Phase::SheriffElection;
        self.election = Default::default();
        self.election.stage = 1;
        self.push_public_log("警长竞选开始，上警请举手");
        self.push_event(ReplayEvent::PhaseChanged {
            phase: Phase::SheriffElection,
            day_no: self.day_no,
        });
        self.arm_phase_clock(now, SHERIFF_ELECTION_SECS);
    }
}
