pub mod model;
pub mod review;

pub use model::{ChecklistMark, ReviewOverrides, TaskUpdate, UpdateDraft, UpdateStatus};
