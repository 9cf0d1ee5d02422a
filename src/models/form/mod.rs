pub mod answers;
pub mod queries;
pub mod types;

pub use answers::find_answers;
pub use queries::*;
pub use types::*;
