use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;

use crate::types::data_type::DataType;

/// An interning cache of canonical type instances.
///
/// Safe for concurrent readers; insertions take the writer lock. The analyzer
/// asks the repository for every result type, so hits dominate.
#[derive(Debug, Default)]
pub struct TypeRepository {
    cache: RwLock<HashMap<DataType, Arc<DataType>>>,
}

impl TypeRepository {
    pub fn new() -> Self {
        TypeRepository {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the canonical shared instance of the given type.
    pub fn get(&self, ty: DataType) -> Arc<DataType> {
        if let Some(found) = self.cache.read().expect("type repository poisoned").get(&ty) {
            return Arc::clone(found);
        }
        let mut cache = self.cache.write().expect("type repository poisoned");
        Arc::clone(cache.entry(ty.clone()).or_insert_with(|| Arc::new(ty)))
    }

    pub fn len(&self) -> usize {
        self.cache.read().expect("type repository poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

lazy_static! {
    static ref DEFAULT_REPOSITORY: TypeRepository = TypeRepository::new();
    static ref ERROR_TYPE: Arc<DataType> = Arc::new(DataType::Error);
    static ref PENDING_TYPE: Arc<DataType> = Arc::new(DataType::Pending);
}

/// The process-wide shared repository, for callers that do not manage their own.
pub fn default_repository() -> &'static TypeRepository {
    &DEFAULT_REPOSITORY
}

/// The shared canonical `error` type instance.
pub fn shared_error() -> Arc<DataType> {
    Arc::clone(&ERROR_TYPE)
}

/// The shared canonical `pending` type instance.
pub fn shared_pending() -> Arc<DataType> {
    Arc::clone(&PENDING_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interns_equal_types_to_one_instance() {
        let repo = TypeRepository::new();
        let a = repo.get(DataType::decimal(Some(10), Some(2)));
        let b = repo.get(DataType::decimal(Some(10), Some(2)));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn distinct_types_get_distinct_instances() {
        let repo = TypeRepository::new();
        let a = repo.get(DataType::Int4);
        let b = repo.get(DataType::Int8);
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn shared_extensions_are_stable() {
        assert!(Arc::ptr_eq(&shared_error(), &shared_error()));
        assert!(Arc::ptr_eq(&shared_pending(), &shared_pending()));
        assert!(shared_error().is_error());
    }
}
