//! Built-in processors shipped with the analyst.
//!
//! The interesting inference processors live in external plugin crates;
//! what ships here is the storage-facing baseline every deployment needs.

use archivist_core::{Document, PipelineContext, PipelineError, Processor, ProcessorRegistry};
use serde_json::Value;

const DEFAULT_PROXY_CATEGORY: &str = "proxies";

/// Copies the source file into the object store and records where the
/// stored copy can be fetched. Idempotent across task re-runs because the
/// store path is derived from the source path.
pub struct ProxyProcessor {
    category: String,
    variants: Vec<String>,
}

impl ProxyProcessor {
    pub fn from_args(args: &Value) -> Result<Self, PipelineError> {
        let category = match args.get("category") {
            None => DEFAULT_PROXY_CATEGORY.to_string(),
            Some(value) => value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| PipelineError::InvalidArgs {
                    name: "proxy".to_string(),
                    reason: "category must be a string".to_string(),
                })?,
        };
        let variants = match args.get("variants") {
            None => Vec::new(),
            Some(value) => value
                .as_array()
                .and_then(|items| {
                    items
                        .iter()
                        .map(|v| v.as_str().map(str::to_string))
                        .collect::<Option<Vec<_>>>()
                })
                .ok_or_else(|| PipelineError::InvalidArgs {
                    name: "proxy".to_string(),
                    reason: "variants must be an array of strings".to_string(),
                })?,
        };
        Ok(Self { category, variants })
    }

    fn extension(source: &str) -> &str {
        source
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && !ext.contains('/'))
            .unwrap_or("bin")
    }
}

impl Processor for ProxyProcessor {
    fn name(&self) -> &str {
        "proxy"
    }

    fn process(&self, ctx: &PipelineContext, doc: &mut Document) -> Result<(), PipelineError> {
        let source = doc.source_path().to_string();
        let variants: Vec<&str> = self.variants.iter().map(String::as_str).collect();
        let file = ctx.ofs.prepare(
            &self.category,
            &source,
            Self::extension(&source),
            &variants,
        )?;
        let stored = ctx.ofs.transfer(&source, &file)?;
        if !stored {
            tracing::debug!("proxy for {} already stored", source);
        }
        doc.set_attr("proxy.id", Value::String(file.composite_id()));
        doc.set_attr(
            "proxy.url",
            Value::String(ctx.ofs.url(&file, &ctx.url_base)),
        );
        Ok(())
    }
}

/// Sets fixed attributes on every document, e.g. project or batch tags.
pub struct SetAttrsProcessor {
    attrs: Vec<(String, Value)>,
}

impl SetAttrsProcessor {
    pub fn from_args(args: &Value) -> Result<Self, PipelineError> {
        let map = args
            .as_object()
            .ok_or_else(|| PipelineError::InvalidArgs {
                name: "set_attrs".to_string(),
                reason: "args must be an object of attribute paths".to_string(),
            })?;
        Ok(Self {
            attrs: map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        })
    }
}

impl Processor for SetAttrsProcessor {
    fn name(&self) -> &str {
        "set_attrs"
    }

    fn process(&self, _ctx: &PipelineContext, doc: &mut Document) -> Result<(), PipelineError> {
        for (path, value) in &self.attrs {
            doc.set_attr(path, value.clone());
        }
        Ok(())
    }
}

/// Registry with the built-in processors installed.
pub fn default_registry() -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    registry.register("proxy", |args| {
        Ok(Box::new(ProxyProcessor::from_args(args)?) as Box<dyn Processor>)
    });
    registry.register("set_attrs", |args| {
        Ok(Box::new(SetAttrsProcessor::from_args(args)?) as Box<dyn Processor>)
    });
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivist_core::{
        BulkIngestCommitter, CancelToken, IndexError, ObjectFileSystem, SearchIndex, UpsertOutcome,
        UpsertRequest,
    };
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct NullIndex;

    impl SearchIndex for NullIndex {
        fn bulk(&self, requests: &[UpsertRequest]) -> Result<Vec<UpsertOutcome>, IndexError> {
            Ok(vec![UpsertOutcome::Created; requests.len()])
        }
    }

    fn context() -> (TempDir, PipelineContext) {
        let dir = TempDir::new().unwrap();
        let ofs = Arc::new(ObjectFileSystem::new(dir.path().join("ofs")).unwrap());
        let ctx = PipelineContext {
            ofs,
            committer: Arc::new(BulkIngestCommitter::new(Arc::new(NullIndex))),
            cancel: CancelToken::new(),
            url_base: "http://archivist:8066".to_string(),
        };
        (dir, ctx)
    }

    #[test]
    fn test_proxy_stores_and_annotates() {
        let (dir, ctx) = context();
        let source = dir.path().join("beach.jpg");
        std::fs::write(&source, b"pixels").unwrap();

        let processor = ProxyProcessor::from_args(&Value::Null).unwrap();
        let mut doc = Document::new(source.to_str().unwrap().to_string());
        processor.process(&ctx, &mut doc).unwrap();

        let composite = doc.attr("proxy.id").unwrap().as_str().unwrap().to_string();
        assert!(composite.starts_with("proxies/"));
        let stored = ctx.ofs.get_by_id(&composite).unwrap();
        assert_eq!(std::fs::read(stored.path()).unwrap(), b"pixels");

        let url = doc.attr("proxy.url").unwrap().as_str().unwrap().to_string();
        assert!(url.starts_with("http://archivist:8066/api/v1/fs/proxies/"));
    }

    #[test]
    fn test_proxy_rerun_is_idempotent() {
        let (dir, ctx) = context();
        let source = dir.path().join("beach.jpg");
        std::fs::write(&source, b"pixels").unwrap();
        let path = source.to_str().unwrap().to_string();

        let processor = ProxyProcessor::from_args(&Value::Null).unwrap();
        let mut first = Document::new(path.clone());
        processor.process(&ctx, &mut first).unwrap();
        let mut second = Document::new(path);
        processor.process(&ctx, &mut second).unwrap();

        assert_eq!(first.attr("proxy.id"), second.attr("proxy.id"));
    }

    #[test]
    fn test_proxy_custom_category_and_variants() {
        let (dir, ctx) = context();
        let source = dir.path().join("beach.jpg");
        std::fs::write(&source, b"pixels").unwrap();

        let processor = ProxyProcessor::from_args(&json!({
            "category": "thumbs",
            "variants": ["128"],
        }))
        .unwrap();
        let mut doc = Document::new(source.to_str().unwrap().to_string());
        processor.process(&ctx, &mut doc).unwrap();

        let composite = doc.attr("proxy.id").unwrap().as_str().unwrap().to_string();
        assert!(composite.starts_with("thumbs/"));
        assert!(composite.ends_with("_128.jpg"));
    }

    #[test]
    fn test_proxy_rejects_bad_args() {
        assert!(matches!(
            ProxyProcessor::from_args(&json!({"category": 9})),
            Err(PipelineError::InvalidArgs { .. })
        ));
        assert!(matches!(
            ProxyProcessor::from_args(&json!({"variants": "128"})),
            Err(PipelineError::InvalidArgs { .. })
        ));
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(ProxyProcessor::extension("/vol/beach.jpg"), "jpg");
        assert_eq!(ProxyProcessor::extension("/vol/noext"), "bin");
        assert_eq!(ProxyProcessor::extension("/vol.d/noext"), "bin");
    }

    #[test]
    fn test_set_attrs_applies_every_pair() {
        let (_dir, ctx) = context();
        let processor = SetAttrsProcessor::from_args(&json!({
            "project.name": "shoot-07",
            "media.reviewed": false,
        }))
        .unwrap();
        let mut doc = Document::new("/vol/a.jpg".to_string());
        processor.process(&ctx, &mut doc).unwrap();
        assert_eq!(doc.attr("project.name"), Some(&json!("shoot-07")));
        assert_eq!(doc.attr("media.reviewed"), Some(&json!(false)));
    }

    #[test]
    fn test_default_registry_contents() {
        let registry = default_registry();
        assert_eq!(registry.names(), vec!["proxy", "set_attrs"]);
    }
}
