//! Element factory: builds elements by factory name.

use crate::element::{BinImpl, Element};
use crate::elements::{AutoVideoSink, FakeSink, PlayBin, Queue, Tee, VideoConvert};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

/// Type alias for element constructor functions.
///
/// The constructor receives the final element name and the factory name.
type ElementConstructor = fn(String, &str) -> Element;

/// Per-factory counters used for default element names (`queue0`, `queue1`).
static NAME_COUNTERS: LazyLock<Mutex<HashMap<String, u32>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Next default name for an element built by `factory`.
///
/// Counters are process wide, so two elements never get the same default
/// name even if they end up in different pipelines.
pub(crate) fn unique_name(factory: &str) -> String {
    let mut counters = NAME_COUNTERS.lock().unwrap();
    let counter = counters.entry(factory.to_string()).or_insert(0);
    let name = format!("{}{}", factory, counter);
    *counter += 1;
    name
}

/// Registry of element constructors.
pub struct ElementFactory {
    constructors: HashMap<String, ElementConstructor>,
}

impl ElementFactory {
    /// Create a new factory with built-in elements registered.
    pub fn new() -> Self {
        let mut factory = Self::empty();

        factory.register("bin", |name, factory| {
            Element::new(name, factory, Box::new(BinImpl))
        });
        factory.register("tee", |name, factory| {
            Element::new(name, factory, Box::new(Tee::new()))
        });
        factory.register("queue", |name, factory| {
            Element::new(name, factory, Box::new(Queue::new()))
        });
        factory.register("videoconvert", |name, factory| {
            Element::new(name, factory, Box::new(VideoConvert::new()))
        });
        factory.register("fakesink", |name, factory| {
            Element::new(name, factory, Box::new(FakeSink::new()))
        });
        factory.register("autovideosink", |name, factory| {
            Element::new(name, factory, Box::new(AutoVideoSink::new()))
        });
        factory.register("playbin", |name, factory| {
            Element::new(name, factory, Box::new(PlayBin::new()))
        });

        factory
    }

    /// Create a factory without any element registered.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register a custom element constructor.
    pub fn register(&mut self, name: &str, constructor: ElementConstructor) {
        self.constructors.insert(name.to_string(), constructor);
    }

    /// Remove a constructor. Returns whether it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.constructors.remove(name).is_some()
    }

    /// Build an element.
    ///
    /// Without an explicit name the element is called `<factory><N>`.
    pub fn make(&self, factory: &str, name: Option<&str>) -> Result<Element> {
        let constructor = self
            .constructors
            .get(factory)
            .ok_or_else(|| Error::NoSuchFactory(factory.to_string()))?;
        let name = match name {
            Some(name) => name.to_string(),
            None => unique_name(factory),
        };
        tracing::trace!(%factory, %name, "making element");
        Ok(constructor(name, factory))
    }

    /// Check if an element type is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// List all available element names.
    pub fn list_elements(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ElementFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ElementFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementFactory")
            .field("elements", &self.list_elements())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_elements() {
        let factory = ElementFactory::new();
        for name in [
            "autovideosink",
            "bin",
            "fakesink",
            "playbin",
            "queue",
            "tee",
            "videoconvert",
        ] {
            assert!(factory.is_registered(name), "{} missing", name);
        }
    }

    #[test]
    fn test_make_unknown_fails() {
        let factory = ElementFactory::new();
        let err = factory.make("nosuchthing", None).unwrap_err();
        assert!(matches!(err, Error::NoSuchFactory(ref name) if name == "nosuchthing"));
    }

    #[test]
    fn test_default_names_are_unique() {
        let factory = ElementFactory::new();
        let a = factory.make("queue", None).unwrap();
        let b = factory.make("queue", None).unwrap();
        assert!(a.name().starts_with("queue"));
        assert_ne!(a.name(), b.name());
        assert_eq!(a.factory_name(), "queue");
    }

    #[test]
    fn test_explicit_name() {
        let factory = ElementFactory::new();
        let sink = factory.make("fakesink", Some("vsbsink7")).unwrap();
        assert_eq!(sink.name(), "vsbsink7");
        assert!(sink.is_sink());
    }

    #[test]
    fn test_register_and_unregister() {
        let mut factory = ElementFactory::empty();
        assert!(factory.list_elements().is_empty());

        factory.register("holder", |name, factory| {
            Element::new(name, factory, Box::new(BinImpl))
        });
        assert_eq!(factory.list_elements(), vec!["holder".to_string()]);
        assert!(factory.make("holder", None).unwrap().is_bin());

        assert!(factory.unregister("holder"));
        assert!(!factory.is_registered("holder"));
    }
}
