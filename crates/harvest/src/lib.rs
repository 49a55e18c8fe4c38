pub mod client;
pub mod discipline;
pub mod fields;
pub mod reader;
pub mod record;

pub use client::{HalClient, HarvestConfig, SearchPage};
pub use discipline::Discipline;
pub use reader::RecordFile;
pub use record::{DocumentRecord, HarvestedRecord};
