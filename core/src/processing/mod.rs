pub mod butterfly;
pub mod fdmt;
pub mod phase_cache;
pub mod search;

pub use butterfly::{ButterflyEngine, StageLayout};
pub use fdmt::{build_transform, Fdmt};
pub use phase_cache::PhaseCache;
pub use search::{find_peak, max_over_dm_range, Candidate};
