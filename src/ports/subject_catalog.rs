//! Subject catalog port.
//!
//! The catalog (courses, roles) is maintained elsewhere; interviews only
//! look subjects up.

use async_trait::async_trait;

use crate::domain::foundation::SubjectId;
use crate::domain::interview::Subject;

use super::RepositoryError;

#[async_trait]
pub trait SubjectCatalog: Send + Sync {
    async fn find(&self, id: &SubjectId) -> Result<Option<Subject>, RepositoryError>;

    /// Case-insensitive lookup by title.
    async fn find_by_title(&self, title: &str) -> Result<Option<Subject>, RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_catalog_is_object_safe() {
        fn _accepts_dyn(_catalog: &dyn SubjectCatalog) {}
    }
}
