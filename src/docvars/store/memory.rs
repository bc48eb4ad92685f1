use super::document::HostDocument;
use super::mem_backend::MemBackend;

pub type InMemoryDocument = HostDocument<MemBackend>;

impl Default for InMemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocument {
    pub fn new() -> Self {
        HostDocument::with_data(MemBackend::new(), Default::default())
    }
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use crate::model::{ObjectId, TypeTag, Value};
    use crate::store::{props, DocumentStore, PropertySpec, VARSET_TYPE, VAR_PREFIX};

    /// Builds documents the way older versions (or other tools) left them,
    /// bypassing the registry's invariants.
    pub struct DocumentFixture {
        pub doc: InMemoryDocument,
        pub ids: Vec<ObjectId>,
    }

    impl Default for DocumentFixture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl DocumentFixture {
        pub fn new() -> Self {
            Self {
                doc: InMemoryDocument::new(),
                ids: Vec::new(),
            }
        }

        /// A variable object with only the properties given.
        /// `None` keys model documents written before ordering existed.
        pub fn with_raw_var(
            mut self,
            name: &str,
            value: Value,
            group: &str,
            row_key: Option<i64>,
            group_key: Option<i64>,
        ) -> Self {
            let doc = &mut self.doc;
            let id = doc.add_object(VARSET_TYPE, VAR_PREFIX).unwrap();
            doc.set_label(&id, name).unwrap();
            doc.add_property(&id, props::VALUE, PropertySpec::new(value.type_tag()))
                .unwrap();
            doc.set_property(&id, props::VALUE, value).unwrap();
            doc.add_property(&id, props::DESCRIPTION, PropertySpec::new(TypeTag::String))
                .unwrap();
            doc.add_property(&id, props::GROUP, PropertySpec::new(TypeTag::String))
                .unwrap();
            doc.set_property(&id, props::GROUP, Value::String(group.to_string()))
                .unwrap();
            if let Some(key) = row_key {
                doc.add_property(&id, props::SORT_KEY, PropertySpec::new(TypeTag::Integer))
                    .unwrap();
                doc.set_property(&id, props::SORT_KEY, Value::Integer(key))
                    .unwrap();
            }
            if let Some(key) = group_key {
                doc.add_property(
                    &id,
                    props::GROUP_SORT_KEY,
                    PropertySpec::new(TypeTag::Integer),
                )
                .unwrap();
                doc.set_property(&id, props::GROUP_SORT_KEY, Value::Integer(key))
                    .unwrap();
            }
            self.ids.push(id);
            self
        }

        /// A `VarSet` that is not one of ours: wrong id prefix.
        pub fn with_foreign_varset(mut self, label: &str) -> Self {
            let id = self.doc.add_object(VARSET_TYPE, "VarSet").unwrap();
            self.doc.set_label(&id, label).unwrap();
            self.ids.push(id);
            self
        }

        /// An object of some other type.
        pub fn with_other_object(mut self, type_id: &str, label: &str) -> Self {
            let id = self.doc.add_object(type_id, "Obj").unwrap();
            self.doc.set_label(&id, label).unwrap();
            self.ids.push(id);
            self
        }
    }
}
