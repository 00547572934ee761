pub mod analysis;
pub mod backend;
pub mod checkpoint;
pub mod collection;
pub mod core;
pub mod external;
pub mod query;
pub mod schema;
pub mod slots;
pub mod taxonomy;
pub mod tasks;
pub mod varint;

pub use crate::core::error::{Error, ErrorKind, Result};

/*
┌────────────────────────────────────────────────────────────────────────────────────────────┐
│                               RESTPOSE STRUCT ARCHITECTURE                                   │
└────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────────── SCHEMA LAYER ────────────────────────────────────────┐
│                                                                                               │
│  struct Schema { fields: BTreeMap<String, FieldConfigEnum>, patterns: Vec<PatternConfig> }   │
│  trait FieldIndexer { fn index(&self, doc: &mut DocumentData, values: &[Value]); }           │
│  IdFieldConfig · ExactFieldConfig · TextFieldConfig · DateFieldConfig · TimestampFieldConfig  │
│  CategoryFieldConfig · StoredFieldConfig · IgnoredFieldConfig · MetaFieldConfig              │
│                                                                                               │
│  Document { data: BTreeMap<String, Vec<Value>> }  ->  DocumentData (slots + terms + store)   │
└───────────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────────── TAXONOMY LAYER ────────────────────────────────────────┐
│  CategoryHierarchy { categories: BTreeMap<String, Category> }                                │
│  Category { name, parents, children, ancestors, descendants: BTreeSet<String> }              │
└───────────────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────────── QUERY LAYER ────────────────────────────────────────┐
│  enum Query (matchall/matchnothing/field/meta/and/or/not/filter/xor)                         │
│  fn build_query(schema, query) -> backend::Query                                             │
│  FacetCountMatchSpy, conditionals::{exists, equals}                                          │
└───────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────────── BACKEND LAYER ────────────────────────────────────────┐
│  trait IndexBackend { add/replace/delete_doc, commit, search, value_range }                  │
│  struct MemoryBackend (inverted term index + per-slot value store + deleted-doc bitmap)      │
└───────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── COLLECTION LAYER ────────────────────────────────────────┐
│  struct Collection { schema: RwLock<Schema>, taxonomy: RwLock<CategoryHierarchy>,            │
│                      backend: Box<dyn IndexBackend>, checkpoints: Checkpoints }              │
│  struct CollectionPool { collections: Mutex<BTreeMap<String, Arc<Collection>>> }             │
└───────────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────────── TASK PIPELINE ─────────────────────────────────────────┐
│  struct Task { collection, kind: TaskKind, result: ResultHandle }                             │
│  struct TaskQueueGroup { queues: Mutex<BTreeMap<String, QueueInfo>>, cond: Condvar }          │
│  struct WorkerPool { threads: Vec<JoinHandle<()>> }                                           │
│  struct TaskManager { search, processing, indexing: TaskQueueGroup, pool: CollectionPool }    │
└───────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────────── AMBIENT STACK ────────────────────────────────────────┐
│  core::error::{Error, ErrorKind}     core::config::Config                                    │
│  core::logger::Logger (background writer thread, bounded FIFO, drop counting)                │
│  core::result_handle::ResultHandle<T> (cross-thread ready cell + fd nudge)                    │
└───────────────────────────────────────────────────────────────────────────────────────────────┘
*/
