//! Default value functions referenced by the serde-default config structs.

pub fn default_port() -> u16 {
    3890
}

pub fn default_pump_tick_millis() -> u64 {
    1000
}

pub fn default_room_sweep_interval_secs() -> u64 {
    30
}

pub fn default_broadcast_capacity() -> usize {
    64
}

pub fn default_night_seconds() -> u64 {
    30
}

pub fn default_day_speech_seconds() -> u64 {
    45
}

pub fn default_day_vote_seconds() -> u64 {
    30
}

pub fn default_settlement_seconds() -> u64 {
    20
}

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_log_rotation() -> String {
    "daily".to_string()
}
