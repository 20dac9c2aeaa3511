pub mod screenshot;
pub mod traits;
pub mod types;

pub use screenshot::CommandScreenSource;
pub use traits::ScreenSource;
pub use types::Resolution;
