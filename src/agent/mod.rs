pub mod backend;
pub mod command;
pub mod endpoint;
pub mod task;

pub use backend::{AgentRun, AgentRunner, AgentTask};
pub use command::CommandAgent;
