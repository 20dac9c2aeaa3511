pub mod dispatcher;
pub mod input;
pub mod safety;

pub use dispatcher::Executor;
pub use input::{CommandRunner, RunOutcome, ShellRunner};
