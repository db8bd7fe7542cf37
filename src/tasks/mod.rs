pub mod checklist;
pub mod model;
pub mod points;
pub mod progress;

pub use model::{ChecklistItem, Task, TaskProgress, TaskStatus};
