//! Minq Rope
//!
//! A test double for minq-style query builders. Register canned data per
//! collection, run the code under test against the recorder, then assert on
//! the queries it issued.
//!
//! # Features
//!
//! - **Collection Stubs**: Answer queries by collection name, with wildcard fallback
//! - **Query Recording**: Every finalized query is kept, split into reads and writes
//! - **Fluent Surface**: `from`, `filter`, `by_id`, `sort`, `skip`, `limit`, `one`, `to_array`, `insert`, `remove`
//! - **Deferred Results**: Terminal calls return a future that is already settled
//! - **Stable Ids**: Memoized fake object ids for fixtures
//!
//! # Example
//!
//! ```
//! use minq_rope::{Rope, StubDefinition};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let mut spy = Rope::new()
//!     .stub(StubDefinition::for_collection("foo", json!({"_id": "123asd"})))
//!     .minq();
//!
//! let found = spy.from("foo").by_id("123asd").one().await;
//! assert_eq!(found, Some(json!({"_id": "123asd"})));
//! assert_eq!(spy.read_queries().len(), 1);
//! # });
//! ```
//!
//! # Example Fixture
//!
//! ```yaml
//! stubs:
//!   - collection: users
//!     data:
//!       - _id: 1
//!         name: jason
//!   - data: {}
//! ```

pub mod config;
pub mod deferred;
pub mod document;
pub mod ids;
pub mod recorder;
pub mod registry;
pub mod rope;

pub use config::{GlobalSettings, RopeConfig, StubDefinition};
pub use deferred::Deferred;
pub use document::{Document, InvalidPathError, QueryOption, SetValue};
pub use ids::{IdCache, ObjectId};
pub use recorder::{QueryClass, QueryDescriptor, QueryRecorder, QueryType, Terminal};
pub use registry::{MatchKind, StubRegistry};
pub use rope::Rope;
