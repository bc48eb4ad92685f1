//! # Storage Layer
//!
//! Variables do not own their storage. They live as objects inside a host
//! document, and everything the registry knows about them is read from and
//! written to typed properties on those objects. The [`DocumentStore`] trait
//! is the capability interface the registry needs from the host; nothing
//! above this layer inspects objects any other way.
//!
//! ## What the host provides
//!
//! - Objects of a given type, each with a generated internal id and a
//!   user-facing label.
//! - Typed properties that can be added, removed and inspected at runtime,
//!   with per-property documentation, enumeration options and editor flags.
//! - Expression bindings on properties and a `recompute` that propagates
//!   their results. Evaluating expressions is the host's business.
//! - A dependency graph between objects, derived from those bindings.
//!
//! ## Variable layout
//!
//! A variable is an object of type [`VARSET_TYPE`] whose id starts with
//! [`VAR_PREFIX`]. Its properties:
//!
//! | Property | Type | Meaning |
//! |----------|------|---------|
//! | `Value` | any | The variable's value; its type is the variable type |
//! | `Description` | String | Free text, mirrored into `Value`'s documentation |
//! | `VarGroup` | String | Title-cased group name |
//! | `SortKey` | Integer | Row position inside the group |
//! | `GroupSortKey` | Integer | Position of the group among groups |
//!
//! Documents written by older versions may lack the two ordering keys. The
//! ordering engine fills them in on open.
//!
//! ## Implementations
//!
//! - [`document::HostDocument`]: reference host, write-through over a
//!   [`backend::StorageBackend`]. Inside a [`batched`] call it saves once.
//! - [`fs_backend::FsBackend`]: JSON document on disk.
//! - [`memory::InMemoryDocument`]: for testing logic without filesystem I/O.

use crate::error::Result;
use crate::model::{EditorMode, ObjectId, TypeTag, Value};

pub mod backend;
pub mod document;
pub mod fs_backend;
pub mod mem_backend;
pub mod memory;

/// Host object type backing a variable.
pub const VARSET_TYPE: &str = "App::VarSet";

/// Internal id prefix that marks a `VarSet` as one of ours.
pub const VAR_PREFIX: &str = "XVar_";

pub mod props {
    pub const VALUE: &str = "Value";
    pub const DESCRIPTION: &str = "Description";
    pub const GROUP: &str = "VarGroup";
    pub const SORT_KEY: &str = "SortKey";
    pub const GROUP_SORT_KEY: &str = "GroupSortKey";
}

/// Definition of a dynamically added property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
    pub type_tag: TypeTag,
    pub doc: String,
    pub enumerations: Option<Vec<String>>,
}

impl PropertySpec {
    pub fn new(type_tag: TypeTag) -> Self {
        Self {
            type_tag,
            doc: String::new(),
            enumerations: None,
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn with_enumerations(mut self, options: Option<Vec<String>>) -> Self {
        self.enumerations = options;
        self
    }
}

/// Abstract interface to the host document.
///
/// Every method addressing an object fails with `ObjectNotFound` when the
/// id is not live, and with `PropertyNotFound` when the property is absent.
pub trait DocumentStore {
    // --- Objects ---

    /// Create an object of `type_id` with a fresh internal id starting with `name_prefix`.
    fn add_object(&mut self, type_id: &str, name_prefix: &str) -> Result<ObjectId>;

    fn remove_object(&mut self, id: &ObjectId) -> Result<()>;

    fn contains(&self, id: &ObjectId) -> bool;

    /// All objects of the given type, ordered by id.
    fn find_objects(&self, type_id: &str) -> Result<Vec<ObjectId>>;

    /// Objects whose label matches exactly.
    fn objects_by_label(&self, label: &str) -> Result<Vec<ObjectId>>;

    fn label(&self, id: &ObjectId) -> Result<String>;

    fn set_label(&mut self, id: &ObjectId, label: &str) -> Result<()>;

    // --- Properties ---

    fn has_property(&self, id: &ObjectId, property: &str) -> Result<bool>;

    fn property_type(&self, id: &ObjectId, property: &str) -> Result<TypeTag>;

    /// Add a property holding the default value of its type.
    fn add_property(&mut self, id: &ObjectId, property: &str, spec: PropertySpec) -> Result<()>;

    fn remove_property(&mut self, id: &ObjectId, property: &str) -> Result<()>;

    fn get_property(&self, id: &ObjectId, property: &str) -> Result<Value>;

    /// Assign a value. The host rejects values of the wrong type and
    /// enumeration values outside the option list.
    fn set_property(&mut self, id: &ObjectId, property: &str, value: Value) -> Result<()>;

    fn property_doc(&self, id: &ObjectId, property: &str) -> Result<String>;

    fn set_property_doc(&mut self, id: &ObjectId, property: &str, doc: &str) -> Result<()>;

    fn enumerations(&self, id: &ObjectId, property: &str) -> Result<Option<Vec<String>>>;

    fn set_enumerations(&mut self, id: &ObjectId, property: &str, options: Vec<String>)
        -> Result<()>;

    fn editor_mode(&self, id: &ObjectId, property: &str) -> Result<EditorMode>;

    fn set_editor_mode(&mut self, id: &ObjectId, property: &str, mode: EditorMode) -> Result<()>;

    // --- Expressions ---

    fn bind_expression(&mut self, id: &ObjectId, property: &str, expression: &str) -> Result<()>;

    fn clear_expression(&mut self, id: &ObjectId, property: &str) -> Result<()>;

    fn bound_expression(&self, id: &ObjectId, property: &str) -> Result<Option<String>>;

    // --- Dependency graph ---

    /// Objects this object's expressions depend on.
    fn out_list(&self, id: &ObjectId) -> Result<Vec<ObjectId>>;

    /// Objects whose expressions depend on this object.
    fn in_list(&self, id: &ObjectId) -> Result<Vec<ObjectId>>;

    /// Propagate expression results.
    fn recompute(&mut self) -> Result<()>;

    /// Property types this host can create.
    fn supported_types(&self) -> Vec<TypeTag> {
        TypeTag::ALL.to_vec()
    }

    // --- Batching ---

    /// Hold writes back until the matching [`end_batch`](Self::end_batch).
    /// Batches nest; only the outermost one persists.
    fn begin_batch(&mut self) {}

    fn end_batch(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Run `f` as a single batch of writes.
///
/// Everything `f` changed is persisted once at the end, whether or not it
/// succeeded.
pub fn batched<S, T>(store: &mut S, f: impl FnOnce(&mut S) -> Result<T>) -> Result<T>
where
    S: DocumentStore,
{
    store.begin_batch();
    let out = f(store);
    let ended = store.end_batch();
    let value = out?;
    ended?;
    Ok(value)
}
