//! Processor registry
//!
//! Processors are the pluggable processing steps of an ingestion pipeline
//! (the actual inference logic behind them is opaque to this crate). They
//! are identified by string keys resolved through a registry populated at
//! startup; resolving an unregistered key is a defined input error rather
//! than a reflective lookup failure.

use crate::document::Document;
use crate::error::PipelineError;
use crate::pipeline::PipelineContext;
use serde_json::Value;
use std::collections::HashMap;

/// One processing step applied to each document flowing through a pipeline.
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    fn process(&self, ctx: &PipelineContext, doc: &mut Document) -> Result<(), PipelineError>;
}

/// Builds a processor instance from its JSON args.
pub type ProcessorFactory =
    Box<dyn Fn(&Value) -> Result<Box<dyn Processor>, PipelineError> + Send + Sync>;

/// String key → constructor mapping, resolved at startup.
#[derive(Default)]
pub struct ProcessorRegistry {
    factories: HashMap<String, ProcessorFactory>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &str,
        factory: impl Fn(&Value) -> Result<Box<dyn Processor>, PipelineError> + Send + Sync + 'static,
    ) {
        tracing::debug!("registering processor: {}", name);
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Instantiate the named processor with the given args.
    pub fn resolve(&self, name: &str, args: &Value) -> Result<Box<dyn Processor>, PipelineError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PipelineError::UnknownProcessor(name.to_string()))?;
        factory(args)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tagger {
        tag: String,
    }

    impl Processor for Tagger {
        fn name(&self) -> &str {
            "tagger"
        }

        fn process(&self, _ctx: &PipelineContext, doc: &mut Document) -> Result<(), PipelineError> {
            doc.set_attr("tags.tag", serde_json::json!(self.tag));
            Ok(())
        }
    }

    fn registry() -> ProcessorRegistry {
        let mut registry = ProcessorRegistry::new();
        registry.register("tagger", |args| {
            let tag = args
                .get("tag")
                .and_then(Value::as_str)
                .unwrap_or("untagged")
                .to_string();
            Ok(Box::new(Tagger { tag }))
        });
        registry
    }

    #[test]
    fn test_resolve_registered_processor() {
        let registry = registry();
        let processor = registry
            .resolve("tagger", &serde_json::json!({"tag": "beach"}))
            .unwrap();
        assert_eq!(processor.name(), "tagger");
    }

    #[test]
    fn test_resolve_unknown_processor_is_input_error() {
        let registry = registry();
        let err = registry
            .resolve("face-detector", &Value::Null)
            .err()
            .unwrap();
        match err {
            PipelineError::UnknownProcessor(name) => assert_eq!(name, "face-detector"),
            other => panic!("expected UnknownProcessor, got {other}"),
        }
    }

    #[test]
    fn test_names_are_sorted() {
        let mut registry = registry();
        registry.register("a-first", |_| {
            Ok(Box::new(Tagger {
                tag: String::new(),
            }))
        });
        assert_eq!(registry.names(), vec!["a-first", "tagger"]);
    }
}
