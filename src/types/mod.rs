mod ids;
mod job;

pub use ids::JobId;
pub use job::{JobRecord, JobState};
