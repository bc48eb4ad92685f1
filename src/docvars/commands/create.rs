use super::NewVar;
use crate::convert;
use crate::error::{Result, VarsError};
use crate::model::{ObjectId, TypeTag, Value};
use crate::names;
use crate::ordering;
use crate::store::{props, DocumentStore, PropertySpec, VARSET_TYPE, VAR_PREFIX};
use crate::variable::{self, Variable};
use tracing::{debug, warn};

/// Create a variable. Returns `false` if the name is already taken.
///
/// The new variable is appended to the end of its group; a group seen for
/// the first time gets the next free group key.
pub fn run<S: DocumentStore>(store: &mut S, new: &NewVar, default_type: TypeTag) -> Result<bool> {
    let name = names::sanitize(&new.name)?;
    if names::resolve(store, &name)?.is_some() {
        debug!(%name, "variable already exists");
        return Ok(false);
    }

    let var_type = new.var_type.unwrap_or(default_type);
    variable::check_options(var_type, new.options.as_ref())?;
    if !store.supported_types().contains(&var_type) {
        return Err(VarsError::UnsupportedType(var_type.host_name()));
    }

    let group = names::normalize_group(new.group.as_deref());
    let group_key = ordering::group_key_for(store, &group)?;
    let row_key = ordering::next_row(store, &group, None)?;

    let id = store.add_object(VARSET_TYPE, VAR_PREFIX)?;
    if let Err(err) = populate(store, &id, &name, var_type, new, &group, group_key, row_key) {
        // Best effort: do not leave a half-built object behind
        let _ = store.remove_object(&id);
        return Err(err);
    }

    if let Some(value) = &new.value {
        let options = new.options.as_deref();
        match convert::cast(value, var_type, options) {
            Ok(v) => {
                if let Err(err) = store.set_property(&id, props::VALUE, v) {
                    warn!(%name, %err, "initial value rejected");
                }
            }
            Err(reason) => warn!(%name, %value, %reason, "initial value ignored"),
        }
    }
    if let Some(expr) = new.expression.as_deref().filter(|e| !e.trim().is_empty()) {
        store.bind_expression(&id, props::VALUE, expr.trim())?;
        store.recompute()?;
    }

    debug!(%name, %id, %var_type, %group, group_key, row_key, "variable created");
    Ok(true)
}

#[allow(clippy::too_many_arguments)]
fn populate<S: DocumentStore>(
    store: &mut S,
    id: &ObjectId,
    name: &str,
    var_type: TypeTag,
    new: &NewVar,
    group: &str,
    group_key: i64,
    row_key: i64,
) -> Result<()> {
    store.set_label(id, name)?;
    store.add_property(
        id,
        props::VALUE,
        PropertySpec::new(var_type)
            .with_doc(new.description.clone())
            .with_enumerations(new.options.clone()),
    )?;
    store.add_property(id, props::DESCRIPTION, PropertySpec::new(TypeTag::String))?;
    store.set_property(id, props::DESCRIPTION, Value::String(new.description.clone()))?;
    store.add_property(id, props::GROUP, PropertySpec::new(TypeTag::String))?;
    store.set_property(id, props::GROUP, Value::String(group.to_string()))?;
    ordering::write_key(store, id, props::SORT_KEY, row_key)?;
    ordering::write_key(store, id, props::GROUP_SORT_KEY, group_key)?;
    Ok(())
}

/// Return the existing variable untouched, or create it.
pub fn run_if_not_exists<S: DocumentStore>(
    store: &mut S,
    new: &NewVar,
    default_type: TypeTag,
) -> Result<Variable> {
    let name = names::sanitize(&new.name)?;
    if let Some(id) = names::resolve(store, &name)? {
        return Ok(Variable::bound(store.label(&id)?, id));
    }
    run(store, new, default_type)?;
    Ok(Variable::new(name))
}
