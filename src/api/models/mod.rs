pub mod jobs;
pub mod summaries;
pub mod users;

pub use jobs::*;
pub use summaries::*;
pub use users::*;
