use super::backend::{DocumentData, HostObject, Property, StorageBackend};
use super::{DocumentStore, PropertySpec};
use crate::convert;
use crate::error::{Result, VarsError};
use crate::model::{EditorMode, ObjectId, TypeTag, Value};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Evaluates expressions bound to properties during [`HostDocument::recompute`].
///
/// `lookup` resolves a reference of the form `Label` or `Label.Property`
/// (the property defaults to `Value`) against the current document.
/// Returning `None` leaves the bound property untouched.
pub trait ExpressionEngine {
    fn evaluate(&self, expression: &str, lookup: &dyn Fn(&str) -> Option<Value>) -> Option<Value>;
}

/// Minimal engine: an expression is either a numeric literal or a single
/// reference, optionally preceded by `=`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceEngine;

impl ExpressionEngine for ReferenceEngine {
    fn evaluate(&self, expression: &str, lookup: &dyn Fn(&str) -> Option<Value>) -> Option<Value> {
        let text = expression.trim();
        let text = text.strip_prefix('=').unwrap_or(text).trim();
        if let Ok(i) = text.parse::<i64>() {
            return Some(Value::Integer(i));
        }
        if let Ok(f) = text.parse::<f64>() {
            return Some(Value::Float(f));
        }
        let reference = text
            .strip_prefix("<<")
            .and_then(|rest| rest.strip_suffix(">>"))
            .unwrap_or(text);
        lookup(reference)
    }
}

/// Identifier-shaped tokens in an expression. These are the candidate
/// references the dependency graph is built from.
pub fn expression_identifiers(expression: &str) -> impl Iterator<Item = &str> {
    expression
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| {
            token
                .chars()
                .next()
                .is_some_and(|c| c.is_alphabetic() || c == '_')
        })
}

/// Reference host document.
///
/// Holds the whole document in memory and writes every successful mutation
/// through to its backend. A mutation whose save fails leaves the in-memory
/// document unchanged. Inside a batch, mutations only touch memory and the
/// outermost `end_batch` saves once.
pub struct HostDocument<B: StorageBackend> {
    pub(crate) backend: B,
    data: DocumentData,
    engine: Option<Box<dyn ExpressionEngine>>,
    supported: Vec<TypeTag>,
    recomputes: usize,
    batch: Option<Batch>,
}

/// State of an open batch: the last persisted document and how deep we are.
struct Batch {
    depth: usize,
    saved: DocumentData,
    dirty: bool,
}

impl<B: StorageBackend> HostDocument<B> {
    /// Open the document stored in `backend`, or start an empty one.
    pub fn open(backend: B) -> Result<Self> {
        let data = backend.load()?.unwrap_or_default();
        debug!(
            location = %backend.location().display(),
            objects = data.objects.len(),
            "document opened"
        );
        Ok(Self::with_data(backend, data))
    }

    pub(crate) fn with_data(backend: B, data: DocumentData) -> Self {
        Self {
            backend,
            data,
            engine: None,
            supported: TypeTag::ALL.to_vec(),
            recomputes: 0,
            batch: None,
        }
    }

    pub fn with_engine(mut self, engine: impl ExpressionEngine + 'static) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    /// Restrict the property types this host can create.
    pub fn with_supported_types(mut self, types: &[TypeTag]) -> Self {
        self.supported = types.to_vec();
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn data(&self) -> &DocumentData {
        &self.data
    }

    /// How many times `recompute` ran since the document was opened.
    pub fn recompute_count(&self) -> usize {
        self.recomputes
    }

    /// Apply `f` to a copy of the document, save it, then commit.
    /// Inside a batch `f` edits the document in place and nothing is saved.
    fn mutate<T>(&mut self, f: impl FnOnce(&mut DocumentData) -> Result<T>) -> Result<T> {
        if let Some(batch) = self.batch.as_mut() {
            batch.dirty = true;
            return f(&mut self.data);
        }
        let mut next = self.data.clone();
        let out = f(&mut next)?;
        self.commit(next)?;
        Ok(out)
    }

    fn commit(&mut self, next: DocumentData) -> Result<()> {
        match self.batch.as_mut() {
            Some(batch) => batch.dirty = true,
            None => self.backend.save(&next)?,
        }
        self.data = next;
        Ok(())
    }

    fn object(&self, id: &ObjectId) -> Result<&HostObject> {
        self.data
            .objects
            .get(id)
            .ok_or_else(|| VarsError::ObjectNotFound(id.clone()))
    }

    fn property(&self, id: &ObjectId, property: &str) -> Result<&Property> {
        self.object(id)?
            .properties
            .get(property)
            .ok_or_else(|| VarsError::PropertyNotFound {
                object: id.clone(),
                property: property.to_string(),
            })
    }

    fn update_property<T>(
        &mut self,
        id: &ObjectId,
        property: &str,
        f: impl FnOnce(&mut Property) -> Result<T>,
    ) -> Result<T> {
        self.mutate(|data| {
            let slot = data
                .objects
                .get_mut(id)
                .ok_or_else(|| VarsError::ObjectNotFound(id.clone()))?
                .properties
                .get_mut(property)
                .ok_or_else(|| VarsError::PropertyNotFound {
                    object: id.clone(),
                    property: property.to_string(),
                })?;
            f(slot)
        })
    }

    /// Resolve `Label` or `Label.Property` against `data`.
    fn lookup(data: &DocumentData, reference: &str) -> Option<Value> {
        let (label, property) = reference
            .split_once('.')
            .unwrap_or((reference, super::props::VALUE));
        data.objects
            .iter()
            .find(|(id, obj)| obj.label == label || id.as_str() == label)
            .and_then(|(_, obj)| obj.properties.get(property))
            .map(|p| p.value.clone())
    }

    fn check_value(property: &str, slot: &Property, value: &Value) -> Result<()> {
        if value.type_tag() != slot.type_tag {
            return Err(VarsError::TypeMismatch {
                property: property.to_string(),
                expected: slot.type_tag,
                found: value.type_tag(),
            });
        }
        if let (Value::Enumeration(choice), Some(options)) = (value, &slot.enumerations) {
            if !options.is_empty() && !options.contains(choice) {
                return Err(VarsError::InvalidArgument(format!(
                    "'{}' is not one of [{}]",
                    choice,
                    options.join(", ")
                )));
            }
        }
        Ok(())
    }
}

impl<B: StorageBackend> DocumentStore for HostDocument<B> {
    fn add_object(&mut self, type_id: &str, name_prefix: &str) -> Result<ObjectId> {
        let id = ObjectId::generate(name_prefix);
        let object = HostObject::new(type_id, id.as_str());
        let created = id.clone();
        self.mutate(move |data| {
            data.objects.insert(created, object);
            Ok(())
        })?;
        debug!(%id, type_id, "object added");
        Ok(id)
    }

    fn remove_object(&mut self, id: &ObjectId) -> Result<()> {
        self.object(id)?;
        self.mutate(|data| {
            data.objects.remove(id);
            Ok(())
        })
    }

    fn contains(&self, id: &ObjectId) -> bool {
        self.data.objects.contains_key(id)
    }

    fn find_objects(&self, type_id: &str) -> Result<Vec<ObjectId>> {
        Ok(self
            .data
            .objects
            .iter()
            .filter(|(_, obj)| obj.type_id == type_id)
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn objects_by_label(&self, label: &str) -> Result<Vec<ObjectId>> {
        Ok(self
            .data
            .objects
            .iter()
            .filter(|(_, obj)| obj.label == label)
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn label(&self, id: &ObjectId) -> Result<String> {
        Ok(self.object(id)?.label.clone())
    }

    fn set_label(&mut self, id: &ObjectId, label: &str) -> Result<()> {
        self.object(id)?;
        self.mutate(|data| {
            if let Some(obj) = data.objects.get_mut(id) {
                obj.label = label.to_string();
            }
            Ok(())
        })
    }

    fn has_property(&self, id: &ObjectId, property: &str) -> Result<bool> {
        Ok(self.object(id)?.properties.contains_key(property))
    }

    fn property_type(&self, id: &ObjectId, property: &str) -> Result<TypeTag> {
        Ok(self.property(id, property)?.type_tag)
    }

    fn add_property(&mut self, id: &ObjectId, property: &str, spec: PropertySpec) -> Result<()> {
        if !self.supported.contains(&spec.type_tag) {
            return Err(VarsError::UnsupportedType(spec.type_tag.host_name()));
        }
        if self.has_property(id, property)? {
            return Err(VarsError::Store(format!(
                "Property '{}' already exists on {}",
                property, id
            )));
        }
        let mut slot = Property::new(
            spec.type_tag,
            Value::default_for(spec.type_tag, spec.enumerations.as_deref()),
        );
        slot.doc = spec.doc;
        slot.enumerations = spec.enumerations;
        self.mutate(|data| {
            if let Some(obj) = data.objects.get_mut(id) {
                obj.properties.insert(property.to_string(), slot);
            }
            Ok(())
        })
    }

    fn remove_property(&mut self, id: &ObjectId, property: &str) -> Result<()> {
        self.property(id, property)?;
        self.mutate(|data| {
            if let Some(obj) = data.objects.get_mut(id) {
                obj.properties.remove(property);
            }
            Ok(())
        })
    }

    fn get_property(&self, id: &ObjectId, property: &str) -> Result<Value> {
        Ok(self.property(id, property)?.value.clone())
    }

    fn set_property(&mut self, id: &ObjectId, property: &str, value: Value) -> Result<()> {
        Self::check_value(property, self.property(id, property)?, &value)?;
        self.update_property(id, property, |slot| {
            slot.value = value;
            Ok(())
        })
    }

    fn property_doc(&self, id: &ObjectId, property: &str) -> Result<String> {
        Ok(self.property(id, property)?.doc.clone())
    }

    fn set_property_doc(&mut self, id: &ObjectId, property: &str, doc: &str) -> Result<()> {
        self.update_property(id, property, |slot| {
            slot.doc = doc.to_string();
            Ok(())
        })
    }

    fn enumerations(&self, id: &ObjectId, property: &str) -> Result<Option<Vec<String>>> {
        Ok(self.property(id, property)?.enumerations.clone())
    }

    fn set_enumerations(
        &mut self,
        id: &ObjectId,
        property: &str,
        options: Vec<String>,
    ) -> Result<()> {
        self.update_property(id, property, |slot| {
            if slot.type_tag != TypeTag::Enumeration {
                return Err(VarsError::TypeMismatch {
                    property: property.to_string(),
                    expected: TypeTag::Enumeration,
                    found: slot.type_tag,
                });
            }
            let keep = matches!(&slot.value, Value::Enumeration(current) if options.contains(current));
            if !keep {
                slot.value = Value::default_for(TypeTag::Enumeration, Some(&options));
            }
            slot.enumerations = Some(options);
            Ok(())
        })
    }

    fn editor_mode(&self, id: &ObjectId, property: &str) -> Result<EditorMode> {
        Ok(self.property(id, property)?.mode)
    }

    fn set_editor_mode(&mut self, id: &ObjectId, property: &str, mode: EditorMode) -> Result<()> {
        self.update_property(id, property, |slot| {
            slot.mode = mode;
            Ok(())
        })
    }

    fn bind_expression(&mut self, id: &ObjectId, property: &str, expression: &str) -> Result<()> {
        self.update_property(id, property, |slot| {
            slot.expression = Some(expression.to_string());
            Ok(())
        })
    }

    fn clear_expression(&mut self, id: &ObjectId, property: &str) -> Result<()> {
        self.update_property(id, property, |slot| {
            slot.expression = None;
            Ok(())
        })
    }

    fn bound_expression(&self, id: &ObjectId, property: &str) -> Result<Option<String>> {
        Ok(self.property(id, property)?.expression.clone())
    }

    fn out_list(&self, id: &ObjectId) -> Result<Vec<ObjectId>> {
        let object = self.object(id)?;
        let tokens: BTreeSet<&str> = object
            .properties
            .values()
            .filter_map(|p| p.expression.as_deref())
            .flat_map(expression_identifiers)
            .collect();

        Ok(self
            .data
            .objects
            .iter()
            .filter(|(other, obj)| {
                *other != id
                    && (tokens.contains(obj.label.as_str()) || tokens.contains(other.as_str()))
            })
            .map(|(other, _)| other.clone())
            .collect())
    }

    fn in_list(&self, id: &ObjectId) -> Result<Vec<ObjectId>> {
        self.object(id)?;
        let mut dependents = Vec::new();
        for other in self.data.objects.keys() {
            if other != id && self.out_list(other)?.contains(id) {
                dependents.push(other.clone());
            }
        }
        Ok(dependents)
    }

    fn recompute(&mut self) -> Result<()> {
        self.recomputes += 1;
        let Some(engine) = self.engine.as_deref() else {
            return Ok(());
        };

        let bound: Vec<(ObjectId, String, String)> = self
            .data
            .objects
            .iter()
            .flat_map(|(id, obj)| {
                obj.properties.iter().filter_map(move |(name, p)| {
                    p.expression
                        .as_ref()
                        .map(|expr| (id.clone(), name.clone(), expr.clone()))
                })
            })
            .collect();
        if bound.is_empty() {
            return Ok(());
        }

        let mut next = self.data.clone();
        let mut converged = false;
        for _ in 0..=bound.len() {
            let mut changed = false;
            for (id, name, expr) in &bound {
                let snapshot = &next;
                let lookup = |reference: &str| Self::lookup(snapshot, reference);
                let Some(result) = engine.evaluate(expr, &lookup) else {
                    debug!(%id, property = %name, expression = %expr, "expression did not evaluate");
                    continue;
                };
                let Some(slot) = next
                    .objects
                    .get_mut(id)
                    .and_then(|obj| obj.properties.get_mut(name))
                else {
                    continue;
                };
                match convert::cast(&result, slot.type_tag, slot.enumerations.as_deref()) {
                    Ok(value) if value != slot.value => {
                        slot.value = value;
                        changed = true;
                    }
                    Ok(_) => {}
                    Err(reason) => {
                        warn!(%id, property = %name, expression = %expr, %reason, "expression result rejected")
                    }
                }
            }
            if !changed {
                converged = true;
                break;
            }
        }
        if !converged {
            warn!("recompute did not settle; expressions may be circular");
        }

        if next != self.data {
            self.commit(next)?;
        }
        Ok(())
    }

    fn supported_types(&self) -> Vec<TypeTag> {
        self.supported.clone()
    }

    fn begin_batch(&mut self) {
        match self.batch.as_mut() {
            Some(batch) => batch.depth += 1,
            None => {
                self.batch = Some(Batch {
                    depth: 1,
                    saved: self.data.clone(),
                    dirty: false,
                })
            }
        }
    }

    fn end_batch(&mut self) -> Result<()> {
        let Some(batch) = self.batch.as_mut() else {
            return Ok(());
        };
        batch.depth -= 1;
        if batch.depth > 0 {
            return Ok(());
        }
        let Some(batch) = self.batch.take() else {
            return Ok(());
        };
        if !batch.dirty {
            return Ok(());
        }
        if let Err(err) = self.backend.save(&self.data) {
            self.data = batch.saved;
            return Err(err);
        }
        debug!("batch saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem_backend::MemBackend;
    use crate::store::{props, VARSET_TYPE, VAR_PREFIX};

    fn make_doc() -> HostDocument<MemBackend> {
        HostDocument::open(MemBackend::new()).unwrap()
    }

    fn add_value(doc: &mut HostDocument<MemBackend>, label: &str, ty: TypeTag) -> ObjectId {
        let id = doc.add_object(VARSET_TYPE, VAR_PREFIX).unwrap();
        doc.set_label(&id, label).unwrap();
        doc.add_property(&id, props::VALUE, PropertySpec::new(ty))
            .unwrap();
        id
    }

    #[test]
    fn test_add_object_uses_prefix_and_id_as_label() {
        let mut doc = make_doc();
        let id = doc.add_object(VARSET_TYPE, VAR_PREFIX).unwrap();
        assert!(id.as_str().starts_with(VAR_PREFIX));
        assert_eq!(doc.label(&id).unwrap(), id.as_str());
        assert_eq!(doc.find_objects(VARSET_TYPE).unwrap(), vec![id]);
    }

    #[test]
    fn test_new_property_holds_type_default() {
        let mut doc = make_doc();
        let id = add_value(&mut doc, "Width", TypeTag::Length);
        assert_eq!(
            doc.get_property(&id, props::VALUE).unwrap(),
            Value::Length(0.0)
        );
    }

    #[test]
    fn test_set_property_rejects_wrong_type() {
        let mut doc = make_doc();
        let id = add_value(&mut doc, "Width", TypeTag::Length);
        let err = doc
            .set_property(&id, props::VALUE, Value::Integer(3))
            .unwrap_err();
        assert!(matches!(err, VarsError::TypeMismatch { .. }));
    }

    #[test]
    fn test_enumeration_value_must_be_an_option() {
        let mut doc = make_doc();
        let id = doc.add_object(VARSET_TYPE, VAR_PREFIX).unwrap();
        let opts = vec!["S".to_string(), "L".to_string()];
        doc.add_property(
            &id,
            props::VALUE,
            PropertySpec::new(TypeTag::Enumeration).with_enumerations(Some(opts)),
        )
        .unwrap();
        assert_eq!(
            doc.get_property(&id, props::VALUE).unwrap(),
            Value::Enumeration("S".into())
        );
        assert!(doc
            .set_property(&id, props::VALUE, Value::Enumeration("XL".into()))
            .is_err());
        doc.set_property(&id, props::VALUE, Value::Enumeration("L".into()))
            .unwrap();

        // Replacing options resets a value that is no longer valid
        doc.set_enumerations(&id, props::VALUE, vec!["A".into(), "B".into()])
            .unwrap();
        assert_eq!(
            doc.get_property(&id, props::VALUE).unwrap(),
            Value::Enumeration("A".into())
        );
    }

    #[test]
    fn test_unsupported_type_is_refused() {
        let mut doc = make_doc().with_supported_types(&[TypeTag::String]);
        let id = doc.add_object(VARSET_TYPE, VAR_PREFIX).unwrap();
        let err = doc
            .add_property(&id, props::VALUE, PropertySpec::new(TypeTag::BoolList))
            .unwrap_err();
        assert!(matches!(err, VarsError::UnsupportedType(_)));
    }

    #[test]
    fn test_failed_save_leaves_document_unchanged() {
        let mut doc = make_doc();
        let id = add_value(&mut doc, "Width", TypeTag::Length);
        doc.backend().set_simulate_write_error(true);
        assert!(doc.set_label(&id, "Height").is_err());
        assert_eq!(doc.label(&id).unwrap(), "Width");
    }

    #[test]
    fn test_batch_saves_once() {
        let mut doc = make_doc();
        let saves = doc.backend().save_count();
        let id = crate::store::batched(&mut doc, |doc| {
            let id = add_value(doc, "Width", TypeTag::Length);
            crate::store::batched(doc, |doc| {
                doc.set_property(&id, props::VALUE, Value::Length(4.0))
            })?;
            doc.set_property_doc(&id, props::VALUE, "outer")?;
            Ok(id)
        })
        .unwrap();

        assert_eq!(doc.backend().save_count(), saves + 1);
        let saved = doc.backend().snapshot().unwrap();
        assert_eq!(saved, *doc.data());
        assert_eq!(
            doc.get_property(&id, props::VALUE).unwrap(),
            Value::Length(4.0)
        );
    }

    #[test]
    fn test_batch_without_writes_does_not_save() {
        let mut doc = make_doc();
        let saves = doc.backend().save_count();
        crate::store::batched(&mut doc, |doc| doc.find_objects(VARSET_TYPE)).unwrap();
        assert_eq!(doc.backend().save_count(), saves);
    }

    #[test]
    fn test_failed_batch_save_restores_last_saved_document() {
        let mut doc = make_doc();
        let id = add_value(&mut doc, "Width", TypeTag::Length);
        doc.backend().set_simulate_write_error(true);
        let result = crate::store::batched(&mut doc, |doc| {
            doc.set_label(&id, "Height")?;
            add_value(doc, "Depth", TypeTag::Length);
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(doc.label(&id).unwrap(), "Width");
        assert_eq!(doc.find_objects(VARSET_TYPE).unwrap().len(), 1);
    }

    #[test]
    fn test_dependency_lists_follow_expressions() {
        let mut doc = make_doc();
        let width = add_value(&mut doc, "Width", TypeTag::Length);
        let height = add_value(&mut doc, "Height", TypeTag::Length);
        doc.bind_expression(&height, props::VALUE, "Width * 2")
            .unwrap();

        assert_eq!(doc.out_list(&height).unwrap(), vec![width.clone()]);
        assert_eq!(doc.in_list(&width).unwrap(), vec![height.clone()]);
        assert!(doc.out_list(&width).unwrap().is_empty());
    }

    #[test]
    fn test_recompute_without_engine_keeps_values() {
        let mut doc = make_doc();
        let width = add_value(&mut doc, "Width", TypeTag::Length);
        doc.bind_expression(&width, props::VALUE, "42").unwrap();
        doc.recompute().unwrap();
        assert_eq!(
            doc.get_property(&width, props::VALUE).unwrap(),
            Value::Length(0.0)
        );
        assert_eq!(doc.recompute_count(), 1);
    }

    #[test]
    fn test_recompute_propagates_chained_references() {
        let mut doc = make_doc().with_engine(ReferenceEngine);
        let a = add_value(&mut doc, "A", TypeTag::Length);
        let b = add_value(&mut doc, "B", TypeTag::Length);
        let c = add_value(&mut doc, "C", TypeTag::Length);
        // c depends on b which depends on a; id order does not matter
        doc.bind_expression(&c, props::VALUE, "B").unwrap();
        doc.bind_expression(&b, props::VALUE, "=A").unwrap();
        doc.set_property(&a, props::VALUE, Value::Length(7.5))
            .unwrap();

        doc.recompute().unwrap();
        assert_eq!(
            doc.get_property(&c, props::VALUE).unwrap(),
            Value::Length(7.5)
        );
    }

    #[test]
    fn test_identifiers_skip_numbers() {
        let ids: Vec<_> = expression_identifiers("Width * 2 + <<Gap>>.Value - 3mm").collect();
        assert_eq!(ids, vec!["Width", "Gap", "Value"]);
    }
}
