//! Speaker rotation for day speech and sheriff candidate speeches.

use crate::protocol::{GameError, Phase, ReplayEvent, Seat, UserId};

use super::state::GameState;

impl GameState {
    /// Build the day-speech queue: living seats ascending, started at the
    /// first living seat strictly greater than the first seat eliminated last
    /// night (wrapping), or at the lowest living seat when nobody fell.
    pub fn build_day_speech_queue(&self) -> Vec<Seat> {
        let mut alive: Vec<Seat> = self.alive().map(|p| p.seat).collect();
        alive.sort_unstable();
        if alive.is_empty() {
            return alive;
        }

        let start_idx = self
            .last_night_eliminated
            .first()
            .map(|fallen| {
                alive
                    .iter()
                    .position(|seat| *seat > *fallen)
                    .unwrap_or(0)
            })
            .unwrap_or(0);

        let mut queue = Vec::with_capacity(alive.len());
        queue.extend_from_slice(&alive[start_idx..]);
        queue.extend_from_slice(&alive[..start_idx]);
        queue
    }

    /// Enter day speech with a fresh rotation.
    pub fn begin_day_speech(&mut self, now: i64) {
        self.phase = Phase::DaySpeech;
        self.speaking_queue = self.build_day_speech_queue();
        self.active_speaker_seat = self.speaking_queue.first().copied();
        self.day = Default::default();
        self.day.stage = 1;

        self.push_event(ReplayEvent::PhaseChanged {
            phase: Phase::DaySpeech,
            day_no: self.day_no,
        });
        if let Some(seat) = self.active_speaker_seat {
            self.push_public_log(format!("请{seat}号发言"));
            self.push_event(ReplayEvent::SpeakerChanged { seat: Some(seat) });
        }
        self.arm_phase_clock(now, self.timers.day_speech_seconds);
    }

    /// Enter candidate speeches over the current election candidates.
    pub fn begin_sheriff_speech(&mut self, now: i64) {
        self.phase = Phase::SheriffSpeech;
        self.speaking_queue = self.election.candidates.clone();
        self.active_speaker_seat = self.speaking_queue.first().copied();

        self.push_event(ReplayEvent::PhaseChanged {
            phase: Phase::SheriffSpeech,
            day_no: self.day_no,
        });
        if let Some(seat) = self.active_speaker_seat {
            self.push_public_log(format!("请{seat}号竞选发言"));
            self.push_event(ReplayEvent::SpeakerChanged { seat: Some(seat) });
        }
        self.arm_phase_clock(now, self.timers.day_speech_seconds);
    }

    /// Hand the floor to the next queued speaker. Returns `true` when the
    /// rotation is exhausted; the caller then opens the matching ballot.
    pub fn advance_speaker(&mut self, now: i64) -> bool {
        let Some(active) = self.active_speaker_seat else {
            return true;
        };
        let Some(idx) = self.speaking_queue.iter().position(|s| *s == active) else {
            return true;
        };
        match self.speaking_queue.get(idx + 1).copied() {
            Some(next) => {
                self.active_speaker_seat = Some(next);
                self.push_public_log(format!("请{next}号发言"));
                self.push_event(ReplayEvent::SpeakerChanged { seat: Some(next) });
                self.arm_phase_clock(now, self.timers.day_speech_seconds);
                false
            }
            None => {
                self.active_speaker_seat = None;
                self.push_event(ReplayEvent::SpeakerChanged { seat: None });
                true
            }
        }
    }

    /// The active speaker yields early.
    pub fn apply_next_speaker(&mut self, user_id: &UserId) -> Result<(), GameError> {
        if !self.phase.is_speech_phase() {
            return Err(GameError::PhaseForbidsAction);
        }
        let player = self.player_by_user(user_id).ok_or(GameError::NotInGame)?;
        if !player.is_alive {
            return Err(GameError::PlayerDead);
        }
        if self.active_speaker_seat != Some(player.seat) {
            return Err(GameError::NotYourTurn);
        }
        Ok(())
    }
}
