use super::backend::{DocumentData, StorageBackend};
use crate::error::{Result, VarsError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Stores the whole document as one JSON file.
pub struct FsBackend {
    path: PathBuf,
}

impl FsBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(VarsError::Io)?;
            }
        }
        Ok(())
    }
}

impl StorageBackend for FsBackend {
    fn load(&self) -> Result<Option<DocumentData>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no document yet");
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).map_err(VarsError::Io)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        let data: DocumentData =
            serde_json::from_str(&content).map_err(VarsError::Serialization)?;
        Ok(Some(data))
    }

    fn save(&self, data: &DocumentData) -> Result<()> {
        self.ensure_parent()?;
        let content = serde_json::to_string_pretty(data).map_err(VarsError::Serialization)?;

        // Atomic write
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let tmp_path = dir.join(format!(".docvars-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_path, content).map_err(VarsError::Io)?;
        if let Err(err) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(VarsError::Io(err));
        }

        Ok(())
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectId, TypeTag, Value};
    use crate::store::backend::{HostObject, Property};
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempdir().unwrap();
        let backend = FsBackend::new(dir.path().join("doc.json"));
        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_keeps_objects() {
        let dir = tempdir().unwrap();
        let backend = FsBackend::new(dir.path().join("nested").join("doc.json"));

        let mut object = HostObject::new("App::VarSet", "Width");
        object.properties.insert(
            "Value".to_string(),
            Property::new(TypeTag::Length, Value::Length(12.0)),
        );
        let mut data = DocumentData::default();
        data.objects.insert(ObjectId::new("XVar_1"), object);

        backend.save(&data).unwrap();
        let loaded = backend.load().unwrap().unwrap();
        assert_eq!(loaded, data);

        // No temp files left behind
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("doc.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("occupied"), "x").unwrap();

        let backend = FsBackend::new(&target);
        assert!(matches!(
            backend.save(&DocumentData::default()),
            Err(VarsError::Io(_))
        ));

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, "{ not json").unwrap();
        let backend = FsBackend::new(path);
        assert!(matches!(backend.load(), Err(VarsError::Serialization(_))));
    }
}
