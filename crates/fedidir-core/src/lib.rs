pub mod fediverse;
pub mod filter;
pub mod ids;
pub mod keys;
pub mod model;
pub mod normalize;
pub mod score;
pub mod snapshot;
pub mod tally;
pub mod types;

pub use fediverse::*;
pub use filter::*;
pub use ids::*;
pub use keys::*;
pub use model::*;
pub use normalize::*;
pub use score::*;
pub use snapshot::*;
pub use tally::*;
pub use types::*;
