pub mod policy;
pub mod scheduler;
pub mod service;

pub use scheduler::{RewardPeriod, WeeklyRewardScheduler};
pub use service::{PointService, PointsError, WeeklyPayout};
