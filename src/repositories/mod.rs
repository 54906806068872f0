pub mod readings;
pub mod summaries;

pub use readings::ReadingRepository;
pub use summaries::SummaryRepository;
