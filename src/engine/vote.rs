//! Ballots: sheriff election and the daytime elimination vote.
//!
//! Vote totals are tracked in half-vote units so the sheriff's 1.5-weight
//! ballot stays exact: an ordinary ballot counts 2, the sheriff's counts 3.

use crate::protocol::{
    GameError, Phase, ReplayEvent, Role, Seat, SeatTally, UserId, VoteKind, SHERIFF_VOTE_SECS,
};

use super::state::GameState;

/// Half-vote weight of an ordinary ballot.
const BALLOT_WEIGHT: u32 = 2;
/// Half-vote weight of the sheriff's ballot.
const SHERIFF_BALLOT_WEIGHT: u32 = 3;

/// Accumulate ballots into per-seat half-vote totals, in first-vote order.
fn tally(votes: &[(UserId, Option<Seat>)], weight_of: impl Fn(&UserId) -> u32) -> Vec<SeatTally> {
    let mut totals: Vec<SeatTally> = Vec::new();
    for (voter, choice) in votes {
        let Some(seat) = choice else { continue };
        let weight = weight_of(voter);
        match totals.iter_mut().find(|t| t.seat == *seat) {
            Some(t) => t.half_votes += weight,
            None => totals.push(SeatTally {
                seat: *seat,
                half_votes: weight,
            }),
        }
    }
    totals
}

/// Seats sharing the highest total. Empty when nobody was named.
fn leaders(totals: &[SeatTally]) -> Vec<Seat> {
    let Some(best) = totals.iter().map(|t| t.half_votes).max() else {
        return Vec::new();
    };
    totals
        .iter()
        .filter(|t| t.half_votes == best)
        .map(|t| t.seat)
        .collect()
}

impl GameState {
    // ---- sheriff election ----

    /// Stand for sheriff.
    pub fn apply_sheriff_enroll(&mut self, user_id: &UserId) -> Result<(), GameError> {
        if self.phase != Phase::SheriffElection {
            return Err(GameError::PhaseForbidsAction);
        }
        let player = self.player_by_user(user_id).ok_or(GameError::NotInGame)?;
        if !player.is_alive {
            return Err(GameError::PlayerDead);
        }
        let seat = player.seat;
        if self.election.candidates.contains(&seat) {
            return Err(GameError::AlreadyActed);
        }
        self.election.candidates.push(seat);
        self.push_public_log(format!("{seat}号上警竞选警长"));
        self.push_event(ReplayEvent::ActionSubmitted {
            seat,
            action: "sheriff.enroll".into(),
        });
        Ok(())
    }

    /// Withdraw a candidacy.
    pub fn apply_sheriff_quit(&mut self, user_id: &UserId) -> Result<(), GameError> {
        if self.phase != Phase::SheriffElection {
            return Err(GameError::PhaseForbidsAction);
        }
        let player = self.player_by_user(user_id).ok_or(GameError::NotInGame)?;
        if !player.is_alive {
            return Err(GameError::PlayerDead);
        }
        let seat = player.seat;
        if !self.election.candidates.contains(&seat) {
            return Err(GameError::TargetInvalid);
        }
        self.election.candidates.retain(|s| *s != seat);
        self.push_public_log(format!("{seat}号退水"));
        self.push_event(ReplayEvent::ActionSubmitted {
            seat,
            action: "sheriff.quit".into(),
        });
        Ok(())
    }

    /// Close the enrollment window: candidates speak, or the day starts with
    /// no sheriff when nobody stood.
    pub fn finish_sheriff_election(&mut self, now: i64) {
        if self.election.candidates.is_empty() {
            self.push_public_log("无人竞选警长");
            self.push_event(ReplayEvent::SheriffElected { seat: None });
            self.begin_day_speech(now);
        } else {
            self.begin_sheriff_speech(now);
        }
    }

    /// Open the sheriff ballot after the last candidate spoke.
    pub fn begin_sheriff_vote(&mut self, now: i64) {
        self.phase = Phase::SheriffVote;
        self.election.votes.clear();
        self.push_public_log("请为警长候选人投票");
        self.push_event(ReplayEvent::PhaseChanged {
            phase: Phase::SheriffVote,
            day_no: self.day_no,
        });
        self.arm_phase_clock(now, SHERIFF_VOTE_SECS);
    }

    /// Non-candidate ballot for a candidate, `None` to abstain.
    pub fn apply_sheriff_vote(
        &mut self,
        user_id: &UserId,
        target: Option<Seat>,
    ) -> Result<(), GameError> {
        if self.phase != Phase::SheriffVote {
            return Err(GameError::PhaseForbidsAction);
        }
        let player = self.player_by_user(user_id).ok_or(GameError::NotInGame)?;
        if !player.is_alive {
            return Err(GameError::PlayerDead);
        }
        let seat = player.seat;
        if self.election.candidates.contains(&seat) {
            return Err(GameError::NotYourTurn);
        }
        if self.election.votes.iter().any(|(uid, _)| uid == user_id) {
            return Err(GameError::AlreadyActed);
        }
        if let Some(choice) = target {
            if !self.election.candidates.contains(&choice) {
                return Err(GameError::TargetInvalid);
            }
        }
        self.election.votes.push((user_id.clone(), target));
        self.push_event(ReplayEvent::ActionSubmitted {
            seat,
            action: "sheriff.vote".into(),
        });
        Ok(())
    }

    /// Whether every living non-candidate has cast a sheriff ballot.
    pub fn sheriff_votes_complete(&self) -> bool {
        self.alive()
            .filter(|p| !self.election.candidates.contains(&p.seat))
            .all(|p| self.election.votes.iter().any(|(uid, _)| *uid == p.user_id))
    }

    /// Tally the sheriff ballot: plurality wins; a first-round tie retries
    /// once among the tied seats; a second tie elects nobody.
    pub fn resolve_sheriff_vote(&mut self, now: i64) {
        let totals = tally(&self.election.votes, |_| BALLOT_WEIGHT);
        let leaders = leaders(&totals);
        self.push_event(ReplayEvent::VoteResult {
            kind: VoteKind::Sheriff,
            stage: self.election.stage,
            tally: totals,
            eliminated_seat: None,
        });

        match leaders.len() {
            1 => {
                let seat = leaders[0];
                self.sheriff_seat = Some(seat);
                self.push_public_log(format!("{seat}号当选警长"));
                self.push_event(ReplayEvent::SheriffElected { seat: Some(seat) });
                self.begin_day_speech(now);
            }
            0 => {
                self.push_public_log("无人当选警长");
                self.push_event(ReplayEvent::SheriffElected { seat: None });
                self.begin_day_speech(now);
            }
            _ if self.election.stage == 1 => {
                self.election.stage = 2;
                self.election.candidates = leaders;
                self.election.votes.clear();
                self.push_public_log("警长竞选平票，平票者再次发言");
                self.begin_sheriff_speech(now);
            }
            _ => {
                self.push_public_log("警长竞选再次平票，本局无警长");
                self.push_event(ReplayEvent::SheriffElected { seat: None });
                self.begin_day_speech(now);
            }
        }
    }

    // ---- day vote ----

    /// Open the elimination ballot after the last speech.
    pub fn begin_day_vote(&mut self, now: i64) {
        self.phase = Phase::DayVote;
        self.day.votes.clear();
        self.push_public_log("请投票");
        self.push_event(ReplayEvent::PhaseChanged {
            phase: Phase::DayVote,
            day_no: self.day_no,
        });
        self.arm_phase_clock(now, self.timers.day_vote_seconds);
    }

    /// Elimination ballot for a living seat, `None` to abstain. Stage 2
    /// restricts targets to the runoff candidates.
    pub fn apply_day_vote(
        &mut self,
        user_id: &UserId,
        target: Option<Seat>,
    ) -> Result<(), GameError> {
        if self.phase != Phase::DayVote {
            return Err(GameError::PhaseForbidsAction);
        }
        let player = self.player_by_user(user_id).ok_or(GameError::NotInGame)?;
        if !player.is_alive {
            return Err(GameError::PlayerDead);
        }
        let seat = player.seat;
        if self.day.votes.iter().any(|(uid, _)| uid == user_id) {
            return Err(GameError::AlreadyActed);
        }
        if let Some(choice) = target {
            if !self.is_seat_alive(choice) {
                return Err(GameError::TargetInvalid);
            }
            if let Some(candidates) = &self.day.candidates {
                if !candidates.contains(&choice) {
                    return Err(GameError::TargetInvalid);
                }
            }
        }
        self.day.votes.push((user_id.clone(), target));
        self.push_event(ReplayEvent::ActionSubmitted {
            seat,
            action: "day.vote".into(),
        });
        Ok(())
    }

    /// Whether every living player has cast a day ballot.
    pub fn day_votes_complete(&self) -> bool {
        self.alive()
            .all(|p| self.day.votes.iter().any(|(uid, _)| *uid == p.user_id))
    }

    /// Tally the day ballot. The sheriff's ballot weighs 1.5; the highest
    /// total is eliminated; a stage-1 tie re-opens the vote among the tied
    /// seats; a stage-2 tie or an empty ballot eliminates nobody.
    pub fn resolve_day_vote(&mut self, now: i64) {
        let sheriff_user = self
            .sheriff_seat
            .and_then(|seat| self.player_by_seat(seat))
            .map(|p| p.user_id.clone());
        let totals = tally(&self.day.votes, |voter| {
            if sheriff_user.as_ref() == Some(voter) {
                SHERIFF_BALLOT_WEIGHT
            } else {
                BALLOT_WEIGHT
            }
        });
        let leaders = leaders(&totals);

        match leaders.len() {
            1 => {
                let seat = leaders[0];
                self.push_event(ReplayEvent::VoteResult {
                    kind: VoteKind::Day,
                    stage: self.day.stage,
                    tally: totals,
                    eliminated_seat: Some(seat),
                });
                self.eliminate_by_vote(seat, now);
            }
            0 => {
                self.push_event(ReplayEvent::VoteResult {
                    kind: VoteKind::Day,
                    stage: self.day.stage,
                    tally: totals,
                    eliminated_seat: None,
                });
                self.push_public_log("无人出局");
                self.begin_night(now);
            }
            _ if self.day.stage == 1 => {
                self.push_event(ReplayEvent::VoteResult {
                    kind: VoteKind::Day,
                    stage: 1,
                    tally: totals,
                    eliminated_seat: None,
                });
                self.day.stage = 2;
                self.day.candidates = Some(leaders);
                self.day.votes.clear();
                self.push_public_log("投票平票，请在平票者中重新投票");
                self.arm_phase_clock(now, self.timers.day_vote_seconds);
            }
            _ => {
                self.push_event(ReplayEvent::VoteResult {
                    kind: VoteKind::Day,
                    stage: 2,
                    tally: totals,
                    eliminated_seat: None,
                });
                self.push_public_log("再次平票，无人出局");
                self.begin_night(now);
            }
        }
    }

    fn eliminate_by_vote(&mut self, seat: Seat, now: i64) {
        let role = match self.player_by_seat_mut(seat) {
            Some(player) => {
                player.is_alive = false;
                player.role
            }
            None => return,
        };
        self.push_public_log(format!("{seat}号被投票出局"));
        self.push_event(ReplayEvent::PlayerEliminated {
            seat,
            reason: crate::protocol::EliminationReason::Vote,
        });
        // Day eliminations never seed the next speech queue
        self.last_night_eliminated.clear();

        if self.check_winner_and_finish(now) {
            return;
        }
        if role == Role::Hunter {
            self.begin_settlement(seat, now);
        } else {
            self.begin_night(now);
        }
    }
}
