//! # Variable Handle
//!
//! A [`Variable`] does not own its record. It remembers the name it was
//! created with and resolves the backing object lazily, caching the internal
//! id on first success. Every accessor takes the store explicitly.
//!
//! Once resolved, a handle stays bound to that object: if the object is
//! deleted, every later call fails with [`VarsError::NotFound`] instead of
//! silently picking up a new variable that happens to reuse the name.

use crate::convert::{self, Converter};
use crate::error::{Result, VarsError};
use crate::model::{EditorMode, ModeChange, ObjectId, TypeTag, Value, VarRecord};
use crate::names;
use crate::ordering;
use crate::store::{props, DocumentStore, PropertySpec};
use once_cell::unsync::OnceCell;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    id: OnceCell<ObjectId>,
}

impl Variable {
    /// A handle that resolves `name` on first use.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: OnceCell::new(),
        }
    }

    /// A handle already bound to a known object.
    pub fn bound(name: impl Into<String>, id: ObjectId) -> Self {
        Self {
            name: name.into(),
            id: OnceCell::from(id),
        }
    }

    /// The name this handle was created with, or last renamed to.
    pub fn handle_name(&self) -> &str {
        &self.name
    }

    /// Resolve the backing object.
    pub fn id<S: DocumentStore>(&self, store: &S) -> Result<ObjectId> {
        if let Some(id) = self.id.get() {
            return if store.contains(id) {
                Ok(id.clone())
            } else {
                Err(VarsError::NotFound(self.name.clone()))
            };
        }
        let id = names::resolve(store, &self.name)?
            .ok_or_else(|| VarsError::NotFound(self.name.clone()))?;
        let _ = self.id.set(id.clone());
        Ok(id)
    }

    pub fn exists<S: DocumentStore>(&self, store: &S) -> bool {
        self.id(store).is_ok()
    }

    /// Current label in the document.
    pub fn name<S: DocumentStore>(&self, store: &S) -> Result<String> {
        store.label(&self.id(store)?)
    }

    pub fn snapshot<S: DocumentStore>(&self, store: &S) -> Result<VarRecord> {
        let id = self.id(store)?;
        let mode = store.editor_mode(&id, props::VALUE)?;
        Ok(VarRecord {
            name: store.label(&id)?,
            var_type: store.property_type(&id, props::VALUE)?,
            value: store.get_property(&id, props::VALUE)?,
            options: self.options(store)?,
            description: self.description(store)?,
            expression: store.bound_expression(&id, props::VALUE)?,
            group: ordering::read_group(store, &id)?,
            row_key: ordering::read_key(store, &id, props::SORT_KEY)?.unwrap_or(0),
            group_key: ordering::read_key(store, &id, props::GROUP_SORT_KEY)?.unwrap_or(0),
            read_only: mode.contains(EditorMode::READ_ONLY),
            hidden: mode.contains(EditorMode::HIDDEN),
            internal_id: id,
        })
    }

    // --- Value ---

    pub fn var_type<S: DocumentStore>(&self, store: &S) -> Result<TypeTag> {
        store.property_type(&self.id(store)?, props::VALUE)
    }

    pub fn value<S: DocumentStore>(&self, store: &S) -> Result<Value> {
        store.get_property(&self.id(store)?, props::VALUE)
    }

    /// Assign a value, casting it to the variable's type when needed.
    ///
    /// Fails with `ExpressionBound` while an expression drives the value and
    /// with `InvalidValue` when the cast is impossible.
    pub fn set_value<S: DocumentStore>(&self, store: &mut S, value: Value) -> Result<()> {
        let id = self.id(store)?;
        if store.bound_expression(&id, props::VALUE)?.is_some() {
            return Err(VarsError::ExpressionBound(store.label(&id)?));
        }
        let var_type = store.property_type(&id, props::VALUE)?;
        let options = store.enumerations(&id, props::VALUE)?;
        let coerced = convert::cast(&value, var_type, options.as_deref()).map_err(|reason| {
            debug!(%reason, "value rejected");
            VarsError::InvalidValue {
                name: self.name.clone(),
                var_type,
                value: value.to_string(),
            }
        })?;
        store.set_property(&id, props::VALUE, coerced)?;
        store.recompute()
    }

    // --- Description ---

    pub fn description<S: DocumentStore>(&self, store: &S) -> Result<String> {
        let id = self.id(store)?;
        if !store.has_property(&id, props::DESCRIPTION)? {
            return Ok(String::new());
        }
        Ok(match store.get_property(&id, props::DESCRIPTION)? {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    /// Also becomes the documentation of the `Value` property.
    pub fn set_description<S: DocumentStore>(&self, store: &mut S, description: &str) -> Result<()> {
        let id = self.id(store)?;
        if !store.has_property(&id, props::DESCRIPTION)? {
            store.add_property(&id, props::DESCRIPTION, PropertySpec::new(TypeTag::String))?;
        }
        store.set_property(&id, props::DESCRIPTION, Value::String(description.to_string()))?;
        store.set_property_doc(&id, props::VALUE, description)
    }

    // --- Options ---

    /// Enumeration options; `None` for every other type.
    pub fn options<S: DocumentStore>(&self, store: &S) -> Result<Option<Vec<String>>> {
        let id = self.id(store)?;
        if store.property_type(&id, props::VALUE)? != TypeTag::Enumeration {
            return Ok(None);
        }
        Ok(Some(
            store.enumerations(&id, props::VALUE)?.unwrap_or_default(),
        ))
    }

    pub fn set_options<S: DocumentStore>(&self, store: &mut S, options: Vec<String>) -> Result<()> {
        let id = self.id(store)?;
        let var_type = store.property_type(&id, props::VALUE)?;
        if var_type != TypeTag::Enumeration {
            return Err(VarsError::InvalidArgument(format!(
                "options only apply to Enumeration variables, '{}' is {}",
                self.name, var_type
            )));
        }
        validate_options(&options)?;
        store.set_enumerations(&id, props::VALUE, options)
    }

    // --- Expression ---

    pub fn expression<S: DocumentStore>(&self, store: &S) -> Result<Option<String>> {
        store.bound_expression(&self.id(store)?, props::VALUE)
    }

    /// Bind an expression, or clear it with `None` or a blank string.
    pub fn set_expression<S: DocumentStore>(
        &self,
        store: &mut S,
        expression: Option<&str>,
    ) -> Result<()> {
        let id = self.id(store)?;
        match expression.map(str::trim).filter(|e| !e.is_empty()) {
            Some(expr) => store.bind_expression(&id, props::VALUE, expr)?,
            None => store.clear_expression(&id, props::VALUE)?,
        }
        store.recompute()
    }

    // --- Group ---

    pub fn group<S: DocumentStore>(&self, store: &S) -> Result<String> {
        ordering::read_group(store, &self.id(store)?)
    }

    /// Move to another group, appended at its end. The old group is
    /// renumbered. Returns `false` when the group does not change.
    pub fn set_group<S: DocumentStore>(&self, store: &mut S, group: &str) -> Result<bool> {
        let id = self.id(store)?;
        let target = names::normalize_group(Some(group));
        let current = ordering::read_group(store, &id)?;
        if target == current && store.has_property(&id, props::GROUP)? {
            return Ok(false);
        }

        let group_key = ordering::group_key_for(store, &target)?;
        let row_key = ordering::next_row(store, &target, Some(&id))?;
        if !store.has_property(&id, props::GROUP)? {
            store.add_property(&id, props::GROUP, PropertySpec::new(TypeTag::String))?;
        }
        store.set_property(&id, props::GROUP, Value::String(target.clone()))?;
        ordering::write_key(store, &id, props::GROUP_SORT_KEY, group_key)?;
        ordering::write_key(store, &id, props::SORT_KEY, row_key)?;
        ordering::normalize_rows(store, &current)?;
        debug!(from = %current, to = %target, group_key, row_key, "variable regrouped");
        Ok(true)
    }

    // --- Type ---

    /// Migrate to `new_type`. Returns `false` when the type is already `new_type`.
    ///
    /// Enumeration targets need `options`; other targets must not get any.
    /// A value that does not survive the migration is replaced by the new
    /// type's default and logged. Description, editor flags and any bound
    /// expression carry over.
    pub fn change_type<S: DocumentStore>(
        &self,
        store: &mut S,
        new_type: TypeTag,
        options: Option<Vec<String>>,
        converter: Option<Converter<'_>>,
    ) -> Result<bool> {
        let id = self.id(store)?;
        let old_type = store.property_type(&id, props::VALUE)?;
        if old_type == new_type {
            return Ok(false);
        }
        if !store.supported_types().contains(&new_type) {
            return Err(VarsError::UnsupportedType(new_type.host_name()));
        }
        check_options(new_type, options.as_ref())?;

        let old_value = store.get_property(&id, props::VALUE)?;
        let mode = store.editor_mode(&id, props::VALUE)?;
        let doc = store.property_doc(&id, props::VALUE)?;
        let expression = store.bound_expression(&id, props::VALUE)?;

        let migration = convert::convert(
            old_type,
            new_type,
            &old_value,
            options.as_deref(),
            converter,
        );
        if let Some(failure) = &migration.failure {
            warn!(variable = %self.name, %failure, "value reset to default");
        }

        store.remove_property(&id, props::VALUE)?;
        store.add_property(
            &id,
            props::VALUE,
            PropertySpec::new(new_type)
                .with_doc(doc)
                .with_enumerations(options),
        )?;
        if let Err(err) = store.set_property(&id, props::VALUE, migration.value) {
            warn!(variable = %self.name, %err, "migrated value rejected, keeping default");
        }
        store.set_editor_mode(&id, props::VALUE, mode)?;
        if let Some(expr) = expression {
            store.bind_expression(&id, props::VALUE, &expr)?;
            store.recompute()?;
        }
        debug!(variable = %self.name, from = %old_type, to = %new_type, "type changed");
        Ok(migration.type_changed)
    }

    // --- Editor flags ---

    pub fn editor_mode<S: DocumentStore>(&self, store: &S) -> Result<EditorMode> {
        store.editor_mode(&self.id(store)?, props::VALUE)
    }

    /// Read-modify-write over the current mask; unrelated flags survive.
    pub fn apply_editor_mode<S: DocumentStore>(
        &self,
        store: &mut S,
        changes: &[ModeChange],
    ) -> Result<EditorMode> {
        let id = self.id(store)?;
        let mode = store.editor_mode(&id, props::VALUE)?.apply(changes);
        store.set_editor_mode(&id, props::VALUE, mode)?;
        Ok(mode)
    }

    pub fn read_only<S: DocumentStore>(&self, store: &S) -> Result<bool> {
        Ok(self.editor_mode(store)?.contains(EditorMode::READ_ONLY))
    }

    pub fn set_read_only<S: DocumentStore>(&self, store: &mut S, on: bool) -> Result<()> {
        self.apply_editor_mode(store, &[flag_change(EditorMode::READ_ONLY, on)])
            .map(|_| ())
    }

    pub fn hidden<S: DocumentStore>(&self, store: &S) -> Result<bool> {
        Ok(self.editor_mode(store)?.contains(EditorMode::HIDDEN))
    }

    pub fn set_hidden<S: DocumentStore>(&self, store: &mut S, on: bool) -> Result<()> {
        self.apply_editor_mode(store, &[flag_change(EditorMode::HIDDEN, on)])
            .map(|_| ())
    }

    // --- Identity ---

    /// Rename, optionally replacing the description.
    ///
    /// Returns `false` without touching anything when `new_name` belongs to
    /// another variable. Differences in case alone are a valid rename.
    pub fn rename<S: DocumentStore>(
        &mut self,
        store: &mut S,
        new_name: &str,
        description: Option<&str>,
    ) -> Result<bool> {
        let new_name = names::sanitize(new_name)?;
        let id = self.id(store)?;
        if let Some(other) = names::resolve(store, &new_name)? {
            if other != id {
                debug!(name = %new_name, "rename collides with another variable");
                return Ok(false);
            }
        }
        store.set_label(&id, &new_name)?;
        self.name = new_name;
        if let Some(description) = description {
            self.set_description(store, description)?;
        }
        store.recompute()?;
        Ok(true)
    }

    /// Remove the backing object. `false` if it is already gone.
    pub fn delete<S: DocumentStore>(&self, store: &mut S) -> Result<bool> {
        let id = match self.id(store) {
            Ok(id) => id,
            Err(VarsError::NotFound(_)) => return Ok(false),
            Err(err) => return Err(err),
        };
        store.remove_object(&id)?;
        Ok(true)
    }

    // --- Dependency graph ---

    /// Labels of the objects this variable's expression reads from.
    pub fn dependencies<S: DocumentStore>(&self, store: &S) -> Result<Vec<String>> {
        let id = self.id(store)?;
        store
            .out_list(&id)?
            .iter()
            .map(|other| store.label(other))
            .collect()
    }

    /// Labels of the objects whose expressions read this variable.
    pub fn references<S: DocumentStore>(&self, store: &S) -> Result<Vec<String>> {
        let id = self.id(store)?;
        store
            .in_list(&id)?
            .iter()
            .map(|other| store.label(other))
            .collect()
    }
}

fn flag_change(flag: EditorMode, on: bool) -> ModeChange {
    if on {
        ModeChange::Set(flag)
    } else {
        ModeChange::Clear(flag)
    }
}

pub(crate) fn validate_options(options: &[String]) -> Result<()> {
    if options.is_empty() {
        return Err(VarsError::InvalidArgument(
            "Enumeration needs at least one option".to_string(),
        ));
    }
    if options.iter().any(|o| o.trim().is_empty()) {
        return Err(VarsError::InvalidArgument(
            "Enumeration options must not be blank".to_string(),
        ));
    }
    Ok(())
}

/// Options are required for Enumeration and forbidden otherwise.
pub(crate) fn check_options(var_type: TypeTag, options: Option<&Vec<String>>) -> Result<()> {
    match (var_type == TypeTag::Enumeration, options) {
        (true, Some(opts)) => validate_options(opts),
        (true, None) => Err(VarsError::InvalidArgument(
            "Enumeration variables need options".to_string(),
        )),
        (false, Some(_)) => Err(VarsError::InvalidArgument(format!(
            "options are only valid for Enumeration, not {}",
            var_type
        ))),
        (false, None) => Ok(()),
    }
}
