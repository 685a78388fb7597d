pub mod arena;
pub mod finish_sequence;
pub mod handle_race;
pub mod horse;
pub mod race;
pub mod restart_handler;
pub mod scoreboard;
pub mod session;
pub mod start_sequencer;
