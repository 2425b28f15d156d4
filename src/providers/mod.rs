pub mod moonshot;
pub mod traits;

pub use moonshot::MoonshotProvider;
pub use traits::{ChatTurn, CompletionProvider};
