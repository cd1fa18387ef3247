//! Derived figures for dashboards and the admin console.

mod progress;
mod stats;

pub use progress::{AccountProgress, RiskLevel};
pub use stats::{rank_leaderboard, LeaderboardEntry, PlatformStats};
