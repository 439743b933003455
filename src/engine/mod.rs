pub mod error_catcher;
pub mod graph;
pub mod pipeline;
pub mod state;

pub use error_catcher::ErrorCatcher;
pub use graph::Graph;
pub use pipeline::Pipeline;
pub use state::GraphState;
