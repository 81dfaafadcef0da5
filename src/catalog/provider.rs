use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::catalog::CatalogError;

/// Anything a provider can host.
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for crate::catalog::function::FunctionDeclaration {
    fn name(&self) -> &str {
        self.name()
    }
}

impl Named for crate::catalog::function::AggregateFunctionDeclaration {
    fn name(&self) -> &str {
        self.name()
    }
}

impl Named for crate::catalog::table::TableDeclaration {
    fn name(&self) -> &str {
        self.name()
    }
}

impl Named for crate::catalog::table::IndexDeclaration {
    fn name(&self) -> &str {
        self.name()
    }
}

impl Named for crate::catalog::variable::VariableDeclaration {
    fn name(&self) -> &str {
        self.name()
    }
}

/// Read access to a chain of declaration providers. Children shadow parents.
pub trait Provider<T: Named>: Send + Sync {
    /// Iterates every visible declaration, skipping an ancestor's entry if a
    /// descendant already provided one under the same name.
    fn each(&self, consumer: &mut dyn FnMut(&Arc<T>));

    fn find(&self, name: &str) -> Option<Arc<T>>;
}

/// A provider whose contents can be configured at run time.
///
/// Readers proceed in parallel; writers take the exclusive lock. Thread
/// safety therefore matches the reader-writer discipline the catalog
/// contract demands.
pub struct ConfigurableProvider<T: Named> {
    parent: Option<Arc<dyn Provider<T>>>,
    declarations: RwLock<BTreeMap<String, Arc<T>>>,
}

impl<T: Named> Default for ConfigurableProvider<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Named> ConfigurableProvider<T> {
    pub fn new() -> Self {
        ConfigurableProvider {
            parent: None,
            declarations: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_parent(parent: Arc<dyn Provider<T>>) -> Self {
        ConfigurableProvider {
            parent: Some(parent),
            declarations: RwLock::new(BTreeMap::new()),
        }
    }

    /// Adds a declaration. Without `overwrite`, the name must be free both
    /// here and in every parent.
    pub fn add(&self, element: T, overwrite: bool) -> Result<Arc<T>, CatalogError> {
        self.add_shared(Arc::new(element), overwrite)
    }

    pub fn add_shared(&self, element: Arc<T>, overwrite: bool) -> Result<Arc<T>, CatalogError> {
        let key = element.name().to_string();
        let mut declarations = self.declarations.write().expect("provider poisoned");
        if overwrite {
            declarations.insert(key, Arc::clone(&element));
            return Ok(element);
        }
        if let Some(parent) = &self.parent {
            if parent.find(&key).is_some() {
                return Err(CatalogError::AlreadyExistsInParent { name: key });
            }
        }
        if declarations.contains_key(&key) {
            return Err(CatalogError::AlreadyExists { name: key });
        }
        declarations.insert(key, Arc::clone(&element));
        Ok(element)
    }

    /// Removes the declaration from this provider only, never from parents.
    pub fn remove(&self, element: &Arc<T>) -> bool {
        let mut declarations = self.declarations.write().expect("provider poisoned");
        if let Some(found) = declarations.get(element.name()) {
            if Arc::ptr_eq(found, element) {
                declarations.remove(element.name());
                return true;
            }
        }
        false
    }
}

impl<T: Named + Send + Sync> Provider<T> for ConfigurableProvider<T> {
    fn each(&self, consumer: &mut dyn FnMut(&Arc<T>)) {
        let declarations = self.declarations.read().expect("provider poisoned");
        for declaration in declarations.values() {
            consumer(declaration);
        }
        if let Some(parent) = &self.parent {
            parent.each(&mut |declaration| {
                if !declarations.contains_key(declaration.name()) {
                    consumer(declaration);
                }
            });
        }
    }

    fn find(&self, name: &str) -> Option<Arc<T>> {
        if let Some(found) = self
            .declarations
            .read()
            .expect("provider poisoned")
            .get(name)
        {
            return Some(Arc::clone(found));
        }
        self.parent.as_ref().and_then(|parent| parent.find(name))
    }
}
