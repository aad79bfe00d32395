//! Tournament business logic: registration, Swiss pairing, result aggregation, round lifecycle.

mod pairing;
mod results;
mod rounds;
mod setup;

pub use pairing::{compute_rounds, generate_pairings};
pub use results::{
    apply_bye, apply_result, is_round_complete, is_tournament_complete, recompute_tiebreaks,
    standings,
};
pub use rounds::{complete_round, complete_tournament, start_round, RoundCompletion};
pub use setup::{import_roster_csv, register_participant, start_tournament, MIN_PARTICIPANTS};
