//! Convenient re-exports of commonly used types from recordlayer.
//!
//! ```ignore
//! use recordlayer::prelude::*;
//! ```

pub use recordlayer_core::{
    adapter::{CreateMode, DynRecordAdapter, RecordAdapter},
    backend::{StoreBackend, StoreBackendBuilder, WriteCondition},
    cache::SchemaCache,
    config::AdapterConfig,
    error::{RecordStoreError, RecordStoreResult},
    merge::{DictPolicy, ListPolicy, MergePolicy},
    notify::{AttributeValue, ChangeEvent, ChangeSink, NoopSink, Operation},
    page::{Page, PaginationParams},
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    record::Record,
    schema::{Schema, SchemaDocument},
};

pub use crate::engine::{Engine, RecordLayerConfig};
