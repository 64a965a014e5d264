//! Fluent query recorder.
//!
//! Mirrors the minq builder surface. Chained calls fill in the active
//! descriptor; a terminal call freezes it into the query log, classifies it
//! as a read or a write, and matches it against the stub registry. Reads
//! resolve to the stub data.

use crate::config::{GlobalSettings, RopeConfig, StubDefinition};
use crate::deferred::Deferred;
use crate::document::{
    self, split_path, Document, InvalidPathError, QueryOption, SetValue, CHANGES, OPTIONS, QUERY,
};
use crate::registry::StubRegistry;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Opaque context (usually a database handle) attached to descriptors.
pub type DbContext = Arc<dyn Any + Send + Sync>;

/// Operation that ended a builder chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    ToArray,
    One,
    Insert,
    Remove,
}

impl Terminal {
    pub fn class(self) -> QueryClass {
        match self {
            Terminal::ToArray | Terminal::One => QueryClass::Read,
            Terminal::Insert | Terminal::Remove => QueryClass::Write,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Terminal::ToArray => "toArray",
            Terminal::One => "one",
            Terminal::Insert => "insert",
            Terminal::Remove => "remove",
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryClass {
    Read,
    Write,
}

/// Result shape tag set by [`QueryRecorder::one`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    One,
}

/// A query as built through the fluent surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryDescriptor {
    /// Context captured when the descriptor was started
    #[serde(skip)]
    pub db: Option<DbContext>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// Filter document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,

    #[serde(skip_serializing_if = "Document::is_empty")]
    pub options: Document,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub query_type: Option<QueryType>,

    /// Write payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<Value>,

    /// Set once the descriptor is finalized
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<Terminal>,
}

impl QueryDescriptor {
    fn started(db: Option<DbContext>, collection: Option<String>) -> Self {
        Self {
            db,
            collection,
            ..Self::default()
        }
    }

    pub fn option(&self, option: QueryOption) -> Option<&Value> {
        self.options.get(option.key())
    }

    pub fn class(&self) -> Option<QueryClass> {
        self.terminal.map(Terminal::class)
    }

    /// Whether the captured context is exactly `db` (same allocation).
    pub fn db_is<T: Any + Send + Sync>(&self, db: &Arc<T>) -> bool {
        self.db.as_ref().is_some_and(|own| {
            std::ptr::eq(Arc::as_ptr(own) as *const (), Arc::as_ptr(db) as *const ())
        })
    }

    /// Borrow the captured context as a concrete type.
    pub fn db_as<T: Any>(&self) -> Option<&T> {
        self.db.as_deref()?.downcast_ref()
    }

    /// Write `value` at a dotted path rooted at `query`, `options` or `changes`.
    pub fn set(&mut self, path: &str, value: SetValue) -> Result<(), InvalidPathError> {
        let segments = split_path(path)?;
        let Some((slot, rest)) = segments.split_first() else {
            return Err(InvalidPathError::EmptySegment {
                path: path.to_string(),
            });
        };

        match *slot {
            OPTIONS if rest.is_empty() => match value {
                SetValue::Merge(entries) => {
                    self.options.extend(entries);
                    Ok(())
                }
                SetValue::Replace(_) => Err(InvalidPathError::NotAMapping {
                    path: path.to_string(),
                    segment: OPTIONS.to_string(),
                }),
            },
            OPTIONS => document::set_segments(&mut self.options, path, rest, value),
            QUERY => set_in_slot(&mut self.query, QUERY, path, rest, value),
            CHANGES => set_in_slot(&mut self.changes, CHANGES, path, rest, value),
            _ => Err(InvalidPathError::UnknownSlot {
                path: path.to_string(),
            }),
        }
    }

    fn set_option(&mut self, option: QueryOption, value: SetValue) {
        let slot = self
            .options
            .entry(option.key().to_string())
            .or_insert(Value::Null);
        document::apply(slot, value);
    }
}

fn set_in_slot(
    slot: &mut Option<Value>,
    name: &str,
    path: &str,
    rest: &[&str],
    value: SetValue,
) -> Result<(), InvalidPathError> {
    if rest.is_empty() {
        assign_slot(slot, value);
        return Ok(());
    }

    match slot {
        None => {
            let mut doc = Document::new();
            document::set_segments(&mut doc, path, rest, value)?;
            *slot = Some(Value::Object(doc));
            Ok(())
        }
        Some(Value::Object(doc)) => document::set_segments(doc, path, rest, value),
        Some(_) => Err(InvalidPathError::NotAMapping {
            path: path.to_string(),
            segment: name.to_string(),
        }),
    }
}

/// Write a whole top-level slot (`query` or `changes`). Cannot fail.
fn assign_slot(slot: &mut Option<Value>, value: SetValue) {
    document::apply(slot.get_or_insert(Value::Null), value);
}

/// Finalized descriptors in call order.
///
/// Every entry of `reads` and `writes` is the same allocation as its entry
/// in `queries`.
#[derive(Debug, Default)]
pub struct QueryLog {
    queries: Vec<Arc<QueryDescriptor>>,
    reads: Vec<Arc<QueryDescriptor>>,
    writes: Vec<Arc<QueryDescriptor>>,
}

impl QueryLog {
    fn record(&mut self, class: QueryClass, descriptor: Arc<QueryDescriptor>) {
        match class {
            QueryClass::Read => self.reads.push(Arc::clone(&descriptor)),
            QueryClass::Write => self.writes.push(Arc::clone(&descriptor)),
        }
        self.queries.push(descriptor);
    }

    pub fn queries(&self) -> &[Arc<QueryDescriptor>] {
        &self.queries
    }

    pub fn read_queries(&self) -> &[Arc<QueryDescriptor>] {
        &self.reads
    }

    pub fn write_queries(&self) -> &[Arc<QueryDescriptor>] {
        &self.writes
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    fn clear(&mut self) {
        self.queries.clear();
        self.reads.clear();
        self.writes.clear();
    }
}

/// Query-recording test double.
///
/// Owns its stubs and its query log. Builder methods return `&mut Self` so
/// calls chain; terminal methods return a [`Deferred`]. Reads settle with the
/// matched stub data, writes with `None`.
#[derive(Debug, Default)]
pub struct QueryRecorder {
    registry: StubRegistry,
    settings: GlobalSettings,
    db: Option<DbContext>,
    active: Option<QueryDescriptor>,
    log: QueryLog,
    /// Dispatches answered by a stub
    matched: u64,
    /// Dispatches with no stub
    unmatched: u64,
}

impl QueryRecorder {
    /// Create a recorder with the stubs and settings of `config`.
    pub fn new(config: RopeConfig) -> Self {
        info!(
            stubs = config.stubs.len(),
            wildcards = config.stubs.iter().filter(|s| s.is_wildcard()).count(),
            "Query recorder initialized"
        );

        Self {
            registry: StubRegistry::from(config.stubs),
            settings: config.settings,
            ..Self::default()
        }
    }

    /// Create a recorder from a YAML fixture.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Ok(Self::new(RopeConfig::from_yaml(yaml)?))
    }

    /// Register another stub after construction.
    pub fn stub(&mut self, stub: StubDefinition) -> &mut Self {
        debug!(collection = ?stub.collection, "Registering stub");
        self.registry.register(stub);
        self
    }

    /// Capture a context for every descriptor started from now on.
    pub fn with_db<T: Any + Send + Sync>(&mut self, db: Arc<T>) -> &mut Self {
        let db: DbContext = db;
        self.db = Some(db);
        self
    }

    pub fn db(&self) -> Option<&DbContext> {
        self.db.as_ref()
    }

    pub fn registry(&self) -> &StubRegistry {
        &self.registry
    }

    /// Start a new descriptor against `collection`.
    ///
    /// An unfinished descriptor is discarded.
    pub fn from(&mut self, collection: impl Into<String>) -> &mut Self {
        let collection = collection.into();
        if let Some(previous) = &self.active {
            debug!(collection = ?previous.collection, "Discarding unfinished query");
        }
        self.active = Some(QueryDescriptor::started(self.db.clone(), Some(collection)));
        self
    }

    /// Alias of [`QueryRecorder::from`].
    pub fn collection(&mut self, collection: impl Into<String>) -> &mut Self {
        self.from(collection)
    }

    /// Replace the filter.
    pub fn filter(&mut self, query: impl Into<Value>) -> &mut Self {
        self.active_mut().query = Some(query.into());
        self
    }

    /// Filter on `_id` equality.
    pub fn by_id(&mut self, id: impl Into<Value>) -> &mut Self {
        assign_slot(&mut self.active_mut().query, SetValue::entry("_id", id));
        self
    }

    /// Filter on `_id` membership.
    pub fn by_ids<I, V>(&mut self, ids: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        assign_slot(
            &mut self.active_mut().query,
            SetValue::entry("_id", serde_json::json!({ "$in": ids })),
        );
        self
    }

    pub fn select(&mut self, fields: Document) -> &mut Self {
        self.option(QueryOption::Select, SetValue::Merge(fields))
    }

    pub fn sort(&mut self, spec: Document) -> &mut Self {
        self.option(QueryOption::Sort, SetValue::Merge(spec))
    }

    pub fn skip(&mut self, n: u64) -> &mut Self {
        self.option(QueryOption::Skip, SetValue::Replace(n.into()))
    }

    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.option(QueryOption::Limit, SetValue::Replace(n.into()))
    }

    /// Expected result count.
    pub fn expect(&mut self, n: u64) -> &mut Self {
        self.option(QueryOption::Expect, SetValue::Replace(n.into()))
    }

    /// Write `value` at a dotted path of the active descriptor.
    pub fn set(&mut self, path: &str, value: SetValue) -> Result<&mut Self, InvalidPathError> {
        self.active_mut().set(path, value)?;
        Ok(self)
    }

    /// Read every matching document.
    pub fn to_array(&mut self) -> Deferred {
        self.finalize(Terminal::ToArray, |_| {})
    }

    /// Read a single document.
    pub fn one(&mut self) -> Deferred {
        self.finalize(Terminal::One, |descriptor| {
            descriptor.query_type = Some(QueryType::One);
        })
    }

    /// Record an insert of `changes`.
    ///
    /// A mapping is merged into any `changes` already set on the descriptor.
    /// Resolves to `None`.
    pub fn insert(&mut self, changes: impl Into<Value>) -> Deferred {
        let changes = SetValue::from_value(changes.into());
        self.finalize(Terminal::Insert, |descriptor| {
            assign_slot(&mut descriptor.changes, changes);
        })
    }

    /// Record a remove. Resolves to `None`.
    pub fn remove(&mut self) -> Deferred {
        self.finalize(Terminal::Remove, |_| {})
    }

    /// Descriptor currently being built, if any.
    pub fn active(&self) -> Option<&QueryDescriptor> {
        self.active.as_ref()
    }

    pub fn log(&self) -> &QueryLog {
        &self.log
    }

    pub fn queries(&self) -> &[Arc<QueryDescriptor>] {
        self.log.queries()
    }

    pub fn read_queries(&self) -> &[Arc<QueryDescriptor>] {
        self.log.read_queries()
    }

    pub fn write_queries(&self) -> &[Arc<QueryDescriptor>] {
        self.log.write_queries()
    }

    pub fn total_matched(&self) -> u64 {
        self.matched
    }

    pub fn total_unmatched(&self) -> u64 {
        self.unmatched
    }

    /// Forget recorded queries and counters. Stubs and context are kept.
    pub fn reset(&mut self) {
        self.log.clear();
        self.active = None;
        self.matched = 0;
        self.unmatched = 0;
    }

    fn option(&mut self, option: QueryOption, value: SetValue) -> &mut Self {
        self.active_mut().set_option(option, value);
        self
    }

    /// Active descriptor, started blank when the chain skipped `from`.
    fn active_mut(&mut self) -> &mut QueryDescriptor {
        let db = &self.db;
        self.active
            .get_or_insert_with(|| QueryDescriptor::started(db.clone(), None))
    }

    fn finalize(&mut self, terminal: Terminal, apply: impl FnOnce(&mut QueryDescriptor)) -> Deferred {
        let mut descriptor = match self.active.take() {
            Some(descriptor) => descriptor,
            None => QueryDescriptor::started(self.db.clone(), None),
        };
        apply(&mut descriptor);
        descriptor.terminal = Some(terminal);

        let descriptor = Arc::new(descriptor);
        self.log.record(terminal.class(), Arc::clone(&descriptor));

        // Writes are matched for logging and counters but carry no data back.
        let data = self.dispatch(&descriptor);
        match terminal.class() {
            QueryClass::Read => Deferred::resolved(data),
            QueryClass::Write => Deferred::resolved(None),
        }
    }

    fn dispatch(&mut self, descriptor: &QueryDescriptor) -> Option<Value> {
        let terminal = descriptor.terminal.map(Terminal::as_str).unwrap_or("none");

        match self.registry.find_match(descriptor.collection.as_deref()) {
            Some(result) => {
                self.matched += 1;
                if self.settings.log_matches {
                    info!(
                        collection = ?descriptor.collection,
                        terminal,
                        stub_index = result.index,
                        kind = ?result.kind,
                        "Query matched stub"
                    );
                }
                Some(result.stub.data.clone())
            }
            None => {
                self.unmatched += 1;
                if self.settings.log_unmatched {
                    warn!(
                        collection = ?descriptor.collection,
                        terminal,
                        "No matching stub found"
                    );
                }
                None
            }
        }
    }
}
