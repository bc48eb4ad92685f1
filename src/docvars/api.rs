//! # API Facade
//!
//! The API layer is a **thin facade** over the command layer and the
//! [`Variable`] handle. It is the single entry point for registry
//! operations, whatever the client (CLI, an editor, a script).
//!
//! ## Role and Responsibilities
//!
//! The API facade:
//! - **Dispatches** to the command functions in `commands/*.rs`
//! - **Resolves names** into variable handles, failing with `NotFound`
//! - **Returns structured types**, never formatted output
//!
//! Business logic lives in `commands`, `variable` and `ordering`; storage
//! lives behind [`DocumentStore`].
//!
//! ## Generic Over DocumentStore
//!
//! `VarsApi<S: DocumentStore>` works with any host:
//! - Production: `VarsApi<HostDocument<FsBackend>>`
//! - Testing: `VarsApi<InMemoryDocument>`
//!
//! ## Opening a document
//!
//! [`VarsApi::open`] runs the ordering repair once, so documents written
//! before ordering keys existed are usable straight away.
//!
//! ## Batched writes
//!
//! Operations that touch many properties (create, delete, rename, regroup,
//! retype, reorders, import, repair) run inside [`batched`], so a
//! write-through host persists once per call rather than once per property.
//! Single-property setters write through directly.

use crate::commands::{self, export::ExportFile, export::VarInfo, CmdResult, NewVar};
use crate::config::VarsConfig;
use crate::convert::Converter;
use crate::error::Result;
use crate::model::{EditorMode, ModeChange, TypeTag, Value, VarRecord};
use crate::ordering::{self, Delta};
use crate::store::{batched, DocumentStore};
use crate::variable::Variable;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

/// The main API facade for registry operations.
pub struct VarsApi<S: DocumentStore> {
    store: S,
    config: VarsConfig,
}

impl<S: DocumentStore> VarsApi<S> {
    /// Wrap a document, repairing ordering keys if needed.
    pub fn open(store: S) -> Result<Self> {
        Self::open_with_config(store, VarsConfig::default())
    }

    pub fn open_with_config(mut store: S, config: VarsConfig) -> Result<Self> {
        let report = batched(&mut store, ordering::repair)?;
        if !report.is_clean() {
            info!(?report, "ordering keys repaired on open");
        }
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &VarsConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// A resolved handle to an existing variable.
    pub fn variable(&self, name: &str) -> Result<Variable> {
        let var = Variable::new(name.trim());
        var.id(&self.store)?;
        Ok(var)
    }

    pub fn exists(&self, name: &str) -> bool {
        Variable::new(name.trim()).exists(&self.store)
    }

    // --- Create / delete ---

    /// `false` when the name is taken.
    pub fn create(&mut self, new: NewVar) -> Result<bool> {
        let default_type = self.config.default_type;
        batched(&mut self.store, |store| {
            commands::create::run(store, &new, default_type)
        })
    }

    pub fn create_if_not_exists(&mut self, new: NewVar) -> Result<Variable> {
        let default_type = self.config.default_type;
        batched(&mut self.store, |store| {
            commands::create::run_if_not_exists(store, &new, default_type)
        })
    }

    pub fn delete(&mut self, name: &str) -> Result<bool> {
        batched(&mut self.store, |store| commands::delete::run(store, name))
    }

    pub fn rename(&mut self, old: &str, new: &str, description: Option<&str>) -> Result<bool> {
        let mut var = self.variable(old)?;
        batched(&mut self.store, |store| var.rename(store, new, description))
    }

    // --- Attributes ---

    pub fn get(&self, name: &str) -> Result<VarRecord> {
        self.variable(name)?.snapshot(&self.store)
    }

    pub fn value(&self, name: &str) -> Result<Value> {
        self.variable(name)?.value(&self.store)
    }

    pub fn set_value(&mut self, name: &str, value: Value) -> Result<()> {
        self.variable(name)?.set_value(&mut self.store, value)
    }

    pub fn description(&self, name: &str) -> Result<String> {
        self.variable(name)?.description(&self.store)
    }

    pub fn set_description(&mut self, name: &str, description: &str) -> Result<()> {
        self.variable(name)?
            .set_description(&mut self.store, description)
    }

    pub fn options(&self, name: &str) -> Result<Option<Vec<String>>> {
        self.variable(name)?.options(&self.store)
    }

    pub fn set_options(&mut self, name: &str, options: Vec<String>) -> Result<()> {
        self.variable(name)?.set_options(&mut self.store, options)
    }

    pub fn expression(&self, name: &str) -> Result<Option<String>> {
        self.variable(name)?.expression(&self.store)
    }

    pub fn set_expression(&mut self, name: &str, expression: Option<&str>) -> Result<()> {
        self.variable(name)?
            .set_expression(&mut self.store, expression)
    }

    pub fn group(&self, name: &str) -> Result<String> {
        self.variable(name)?.group(&self.store)
    }

    pub fn set_group(&mut self, name: &str, group: &str) -> Result<bool> {
        let var = self.variable(name)?;
        batched(&mut self.store, |store| var.set_group(store, group))
    }

    pub fn var_type(&self, name: &str) -> Result<TypeTag> {
        self.variable(name)?.var_type(&self.store)
    }

    pub fn set_type(
        &mut self,
        name: &str,
        new_type: TypeTag,
        options: Option<Vec<String>>,
        converter: Option<Converter<'_>>,
    ) -> Result<bool> {
        let var = self.variable(name)?;
        batched(&mut self.store, |store| {
            var.change_type(store, new_type, options, converter)
        })
    }

    pub fn set_read_only(&mut self, name: &str, on: bool) -> Result<()> {
        self.variable(name)?.set_read_only(&mut self.store, on)
    }

    pub fn set_hidden(&mut self, name: &str, on: bool) -> Result<()> {
        self.variable(name)?.set_hidden(&mut self.store, on)
    }

    pub fn apply_editor_mode(&mut self, name: &str, changes: &[ModeChange]) -> Result<EditorMode> {
        self.variable(name)?
            .apply_editor_mode(&mut self.store, changes)
    }

    // --- Listing and ordering ---

    pub fn list_all(&self) -> Result<Vec<VarRecord>> {
        commands::list::all(&self.store)
    }

    pub fn list_group(&self, group: &str) -> Result<Vec<VarRecord>> {
        commands::list::in_group(&self.store, group)
    }

    pub fn list_groups(&self) -> Result<BTreeSet<String>> {
        commands::list::groups(&self.store)
    }

    pub fn reorder_variable(&mut self, name: &str, delta: Delta) -> Result<bool> {
        batched(&mut self.store, |store| {
            commands::reorder::variable(store, name, delta)
        })
    }

    pub fn reorder_group(&mut self, group: &str, delta: Delta) -> Result<bool> {
        batched(&mut self.store, |store| commands::reorder::group(store, group, delta))
    }

    // --- Dependency graph ---

    pub fn dependencies(&self, name: &str) -> Result<Vec<String>> {
        self.variable(name)?.dependencies(&self.store)
    }

    pub fn references(&self, name: &str) -> Result<Vec<String>> {
        self.variable(name)?.references(&self.store)
    }

    // --- Serialization ---

    pub fn export(&self) -> Result<ExportFile> {
        commands::export::build(&self.store)
    }

    pub fn export_to_path(&self, path: &Path) -> Result<CmdResult> {
        commands::export::run(&self.store, path, self.config.pretty_export)
    }

    pub fn import(&mut self, records: &[VarInfo]) -> Result<CmdResult> {
        let default_type = self.config.default_type;
        batched(&mut self.store, |store| {
            commands::import::run(store, records, default_type)
        })
    }

    pub fn import_from_path(&mut self, path: &Path) -> Result<CmdResult> {
        let default_type = self.config.default_type;
        batched(&mut self.store, |store| {
            commands::import::run_file(store, path, default_type)
        })
    }

    // --- Maintenance ---

    pub fn doctor(&mut self) -> Result<CmdResult> {
        batched(&mut self.store, commands::doctor::run)
    }
}

pub use crate::commands::{CmdMessage, MessageLevel};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VarsError;
    use crate::store::memory::fixtures::DocumentFixture;
    use crate::store::memory::InMemoryDocument;

    fn make_api() -> VarsApi<InMemoryDocument> {
        VarsApi::open(InMemoryDocument::new()).unwrap()
    }

    #[test]
    fn test_open_repairs_legacy_documents() {
        let fixture = DocumentFixture::new()
            .with_raw_var("B", Value::Integer(1), "default", None, None)
            .with_raw_var("A", Value::Integer(2), "default", None, None);
        let api = VarsApi::open(fixture.doc).unwrap();

        let rows: Vec<_> = api
            .list_all()
            .unwrap()
            .into_iter()
            .map(|r| (r.name, r.group, r.row_key))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("A".to_string(), "Default".to_string(), 0),
                ("B".to_string(), "Default".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_unknown_names_are_not_found() {
        let mut api = make_api();
        assert!(matches!(api.value("Nope"), Err(VarsError::NotFound(_))));
        assert!(matches!(
            api.set_value("Nope", Value::Integer(1)),
            Err(VarsError::NotFound(_))
        ));
        assert!(matches!(
            api.rename("Nope", "Other", None),
            Err(VarsError::NotFound(_))
        ));
        assert!(!api.delete("Nope").unwrap());
    }

    #[test]
    fn test_default_type_comes_from_config() {
        let config = VarsConfig {
            default_type: TypeTag::Percent,
            ..VarsConfig::default()
        };
        let mut api = VarsApi::open_with_config(InMemoryDocument::new(), config).unwrap();
        api.create(NewVar::named("Ratio")).unwrap();
        assert_eq!(api.var_type("Ratio").unwrap(), TypeTag::Percent);
    }

    #[test]
    fn test_setters_dispatch_to_variable() {
        let mut api = make_api();
        api.create(NewVar::new("Width", TypeTag::Length)).unwrap();

        api.set_value("width", Value::Float(3.0)).unwrap();
        api.set_description("Width", "outer").unwrap();
        api.set_hidden("Width", true).unwrap();
        assert!(api.set_group("Width", "body").unwrap());

        let rec = api.get("Width").unwrap();
        assert_eq!(rec.value, Value::Length(3.0));
        assert_eq!(rec.description, "outer");
        assert!(rec.hidden);
        assert_eq!(rec.group, "Body");
        assert_eq!(
            api.list_groups().unwrap().into_iter().collect::<Vec<_>>(),
            vec!["Body".to_string(), "Default".to_string()]
        );
    }

    #[test]
    fn test_multi_property_operations_save_once() {
        let mut api = make_api();
        let before = api.store().backend().save_count();
        api.create(NewVar::new("A", TypeTag::Integer).with_description("first"))
            .unwrap();
        assert_eq!(api.store().backend().save_count(), before + 1);

        for name in ["B", "C", "D"] {
            api.create(NewVar::new(name, TypeTag::Integer)).unwrap();
        }
        let before = api.store().backend().save_count();
        api.reorder_variable("D", Delta::First).unwrap();
        api.set_group("B", "other").unwrap();
        api.delete("A").unwrap();
        assert_eq!(api.store().backend().save_count(), before + 3);
    }

    #[test]
    fn test_open_saves_legacy_repair_once() {
        let mut fixture = DocumentFixture::new();
        for name in ["A", "B", "C", "D", "E"] {
            fixture = fixture.with_raw_var(name, Value::Integer(0), "default", None, None);
        }
        let before = fixture.doc.backend().save_count();
        let api = VarsApi::open(fixture.doc).unwrap();
        assert_eq!(api.store().backend().save_count(), before + 1);
    }

    #[test]
    fn test_editor_mode_changes() {
        let mut api = make_api();
        api.create(NewVar::new("Width", TypeTag::Length)).unwrap();
        let mode = api
            .apply_editor_mode(
                "Width",
                &[
                    ModeChange::Set(EditorMode::READ_ONLY),
                    ModeChange::Set(EditorMode::HIDDEN),
                    ModeChange::Clear(EditorMode::READ_ONLY),
                ],
            )
            .unwrap();
        assert_eq!(mode, EditorMode::HIDDEN);
    }
}
