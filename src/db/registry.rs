use ahash::AHashMap;
use parking_lot::RwLock;
use std::{any::Any, fmt, sync::Arc};

/// A named model bound to a live connection.
pub trait Model: Send + Sync + 'static {
    fn name(&self) -> &str;
}

/// A model as stored in the registry, type-erased for lookup by name.
#[derive(Clone)]
pub struct ModelEntry {
    name: String,
    model: Arc<dyn Any + Send + Sync>,
}

impl ModelEntry {
    pub fn new<M: Model>(model: M) -> Self {
        Self {
            name: model.name().to_string(),
            model: Arc::new(model),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelEntry")
            .field("name", &self.name)
            .finish()
    }
}

/// Builds a model against the current connection. Called again after every reconnect.
pub type ModelFactory<C> = Arc<dyn Fn(&Arc<C>) -> ModelEntry + Send + Sync>;

struct RegistryInner<C> {
    connection: Option<Arc<C>>,
    models: AHashMap<String, ModelEntry>,
}

/// Shared view of the current connection and its models.
///
/// Clones share state: the bootstrapper updates it in place on every reconnect,
/// so holders always read the latest connection.
pub struct Registry<C> {
    inner: Arc<RwLock<RegistryInner<C>>>,
}

impl<C> Clone for Registry<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                connection: None,
                models: AHashMap::default(),
            })),
        }
    }
}

impl<C: Send + Sync + 'static> Registry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current connection, or `None` while (re)initializing.
    pub fn connection(&self) -> Option<Arc<C>> {
        self.inner.read().connection.clone()
    }

    pub fn model<M: Model>(&self, name: &str) -> Option<Arc<M>> {
        let entry = self.inner.read().models.get(name).cloned()?;
        entry.model.downcast::<M>().ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().models.contains_key(name)
    }

    pub fn model_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().models.keys().cloned().collect();
        names.sort();
        names
    }

    /// Installs a new connection and (re)builds every model against it. Entries with
    /// the same name are overwritten.
    pub(crate) fn install(&self, connection: Arc<C>, factories: &[ModelFactory<C>]) {
        let entries: Vec<ModelEntry> = factories.iter().map(|f| f(&connection)).collect();
        let mut inner = self.inner.write();
        inner.connection = Some(connection);
        for entry in entries {
            inner.models.insert(entry.name.clone(), entry);
        }
    }

    /// Detaches the current connection, returning it.
    pub(crate) fn take_connection(&self) -> Option<Arc<C>> {
        self.inner.write().connection.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Conn(u32);

    struct Users {
        conn: Arc<Conn>,
    }

    impl Model for Users {
        fn name(&self) -> &str {
            "User"
        }
    }

    struct Events;

    impl Model for Events {
        fn name(&self) -> &str {
            "Event"
        }
    }

    fn factories() -> Vec<ModelFactory<Conn>> {
        vec![
            Arc::new(|c: &Arc<Conn>| ModelEntry::new(Users { conn: c.clone() })),
            Arc::new(|_: &Arc<Conn>| ModelEntry::new(Events)),
        ]
    }

    #[test]
    fn clones_observe_replacement_in_place() {
        let registry = Registry::<Conn>::new();
        let view = registry.clone();
        assert!(view.connection().is_none());

        registry.install(Arc::new(Conn(1)), &factories());
        assert_eq!(view.connection().unwrap().0, 1);
        assert_eq!(view.model::<Users>("User").unwrap().conn.0, 1);

        registry.install(Arc::new(Conn(2)), &factories());
        assert_eq!(view.connection().unwrap().0, 2);
        assert_eq!(view.model::<Users>("User").unwrap().conn.0, 2);
        assert_eq!(view.model_names(), vec!["Event", "User"]);
    }

    #[test]
    fn lookup_with_wrong_type_is_none() {
        let registry = Registry::<Conn>::new();
        registry.install(Arc::new(Conn(1)), &factories());

        assert!(registry.model::<Events>("User").is_none());
        assert!(registry.model::<Events>("Event").is_some());
        assert!(!registry.contains("Missing"));
    }

    #[test]
    fn take_connection_keeps_models() {
        let registry = Registry::<Conn>::new();
        registry.install(Arc::new(Conn(7)), &factories());

        assert_eq!(registry.take_connection().unwrap().0, 7);
        assert!(registry.connection().is_none());
        assert!(registry.contains("User"));
    }
}
