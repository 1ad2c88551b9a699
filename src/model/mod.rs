pub mod color;
pub mod config;
pub mod forest;
pub mod ids;
pub mod index;
pub mod lenient;
pub mod pantry;
pub mod review;
pub mod snapshot;
pub mod store;
pub mod thread;

pub use config::*;
pub use forest::*;
pub use ids::*;
pub use index::*;
pub use pantry::*;
pub use review::*;
pub use snapshot::*;
pub use store::*;
pub use thread::*;
