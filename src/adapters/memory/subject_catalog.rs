//! Subject catalog held in memory, optionally loaded from a YAML file.
//!
//! ```yaml
//! - id: data-eng
//!   title: Data Engineering
//!   requirements: SQL, Python
//!   responsibilities: Build and run pipelines
//!   level: junior
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::domain::foundation::SubjectId;
use crate::domain::interview::Subject;
use crate::ports::{RepositoryError, SubjectCatalog};

#[derive(Debug, Clone, Default)]
pub struct InMemorySubjectCatalog {
    subjects: Arc<HashMap<SubjectId, Subject>>,
}

impl InMemorySubjectCatalog {
    pub fn new(subjects: impl IntoIterator<Item = Subject>) -> Self {
        let subjects = subjects
            .into_iter()
            .map(|subject| (subject.id.clone(), subject))
            .collect();
        Self {
            subjects: Arc::new(subjects),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, RepositoryError> {
        let subjects: Vec<Subject> = serde_yaml::from_str(yaml)
            .map_err(|e| RepositoryError::Database(format!("invalid subject catalog: {e}")))?;
        Ok(Self::new(subjects))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            RepositoryError::Database(format!("cannot read {}: {e}", path.display()))
        })?;
        let catalog = Self::from_yaml_str(&yaml)?;
        tracing::info!(path = %path.display(), subjects = catalog.len(), "Loaded subject catalog");
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

#[async_trait]
impl SubjectCatalog for InMemorySubjectCatalog {
    async fn find(&self, id: &SubjectId) -> Result<Option<Subject>, RepositoryError> {
        Ok(self.subjects.get(id).cloned())
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Subject>, RepositoryError> {
        Ok(self
            .subjects
            .values()
            .find(|subject| subject.title_matches(title))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const YAML: &str = r#"
- id: data-eng
  title: Data Engineering
  requirements: SQL, Python
  responsibilities: Build pipelines
  level: junior
- id: analytics
  title: Data Analytics
"#;

    #[tokio::test]
    async fn finds_by_id_and_title() {
        let catalog = InMemorySubjectCatalog::from_yaml_str(YAML).unwrap();
        let id = SubjectId::new("data-eng").unwrap();

        let subject = catalog.find(&id).await.unwrap().unwrap();
        assert_eq!(subject.level.as_deref(), Some("junior"));

        let by_title = catalog.find_by_title("  data analytics ").await.unwrap().unwrap();
        assert_eq!(by_title.id.as_str(), "analytics");
        assert!(by_title.requirements.is_empty());

        assert!(catalog.find_by_title("Cooking").await.unwrap().is_none());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let catalog = InMemorySubjectCatalog::from_yaml_file(file.path()).unwrap();

        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = InMemorySubjectCatalog::from_yaml_file(dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(RepositoryError::Database(_))));
    }

    #[test]
    fn invalid_subject_id_is_rejected() {
        let yaml = "- id: ''\n  title: Nameless\n";
        assert!(InMemorySubjectCatalog::from_yaml_str(yaml).is_err());
    }
}
