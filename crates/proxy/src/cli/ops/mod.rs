pub mod cat;
pub mod daemon;
pub mod put;
pub mod rm;
pub mod stats;
pub mod version;

pub use cat::Cat;
pub use daemon::Daemon;
pub use put::Put;
pub use rm::Rm;
pub use stats::Stats;
pub use version::Version;
