//! `postviews` core: post identifiers, flush batches, the in-memory view
//! counter store, and the persistence sink trait.

pub mod counter;
pub mod outcome;
pub mod sink;
pub mod types;

pub use counter::ViewCounterStore;
pub use outcome::{FlushOutcome, PersistError};
pub use sink::PersistenceSink;
pub use types::{FlushBatch, InvalidPostId, PostId, MAX_POST_ID_LEN};
