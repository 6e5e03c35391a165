//! The config composer.
//!
//! Each named config block composes one typed value out of its sources.
//! Every source yields raw YAML — a file's bytes, or another job's stdout —
//! decoded into a generic mapping and merged left to right with override
//! semantics: maps merge recursively, everything else is replaced. The
//! merged mapping is re-serialized to YAML and re-parsed through the typed
//! value bridge, so `conf.<name>` always has one stable, fully typed shape.

use runbook_types::Value;
use tracing::debug;

use crate::ast::{ConfigSpec, JobSpec, SourceSpec};
use crate::context::EvalScope;
use crate::error::Error;
use crate::runner::{Runner, ValueMap};

impl Runner {
    /// Compose every config visible to `job` (root-job configs first) and
    /// return the object published as `conf`.
    pub(crate) async fn compose_configs(
        &self,
        scope: &EvalScope,
        job: &JobSpec,
        stack: &[String],
    ) -> Result<hcl::Value, Error> {
        let root = &self.document().root;
        let specs: Vec<&ConfigSpec> = if job.name.is_empty() {
            job.configs.iter().collect()
        } else {
            root.configs.iter().chain(job.configs.iter()).collect()
        };

        let mut fields = hcl::Map::new();
        for spec in specs {
            let value = self.compose_one(scope, &job.name, spec, stack).await?;
            fields.insert(spec.name.clone(), value);
        }
        Ok(hcl::Value::Object(fields))
    }

    async fn compose_one(
        &self,
        scope: &EvalScope,
        job_name: &str,
        spec: &ConfigSpec,
        stack: &[String],
    ) -> Result<hcl::Value, Error> {
        let source_error = |index: usize, message: String| Error::ConfigSource {
            job: job_name.to_string(),
            config: spec.name.to_string(),
            index,
            message,
        };

        let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

        for (index, source) in spec.sources.iter().enumerate() {
            let yaml_text = match source {
                SourceSpec::File { path, default } => {
                    let path = decode_source_string(scope, &source_error, index, "path", path)?;
                    match tokio::fs::read_to_string(&path).await {
                        Ok(text) => text,
                        Err(e) => match default {
                            Some(default) => {
                                decode_source_string(scope, &source_error, index, "default", default)?
                            }
                            None => return Err(source_error(index, format!("{path}: {e}"))),
                        },
                    }
                }
                SourceSpec::Job { name, args, format } => {
                    if let Some(format) = format.as_deref() {
                        if format != "yaml" {
                            return Err(source_error(
                                index,
                                format!(
                                    "format {format:?} is not implemented yet. It must be \"yaml\" or omitted"
                                ),
                            ));
                        }
                    }
                    let args_value = scope.eval(args)?;
                    let fields = match &args_value {
                        hcl::Value::Object(fields) => fields,
                        other => {
                            return Err(source_error(
                                index,
                                format!(
                                    "args must be a mapping, got {}",
                                    runbook_types::tagged_type_name(other)
                                ),
                            ))
                        }
                    };
                    let mut call_args = ValueMap::new();
                    for (key, value) in fields {
                        call_args.insert(key.clone(), Value::from_hcl(value)?);
                    }
                    // One caller map feeds both arguments and options.
                    let result = self
                        .run_boxed(name.clone(), call_args.clone(), call_args, stack.to_vec())
                        .await?;
                    result.stdout
                }
                SourceSpec::Unknown { kind } => {
                    return Err(source_error(
                        index,
                        format!(
                            "config source {kind:?} is not implemented. It must be either \"file\" or \"job\""
                        ),
                    ))
                }
            };

            let decoded: serde_yaml::Value = serde_yaml::from_str(&yaml_text)
                .map_err(|e| source_error(index, e.to_string()))?;
            match decoded {
                serde_yaml::Value::Null => {}
                mapping @ serde_yaml::Value::Mapping(_) => merge_override(&mut merged, mapping),
                other => {
                    return Err(source_error(
                        index,
                        format!("expected a YAML mapping, got {}", yaml_kind(&other)),
                    ))
                }
            }
        }

        debug!(config = %spec.name, "composed config");

        // Round-trip through YAML into the typed value domain for a stable
        // shape regardless of how the sources were produced.
        let yaml_text = serde_yaml::to_string(&merged)
            .map_err(|e| source_error(spec.sources.len(), e.to_string()))?;
        serde_yaml::from_str::<hcl::Value>(&yaml_text)
            .map_err(|e| source_error(spec.sources.len(), e.to_string()))
    }
}

fn decode_source_string(
    scope: &EvalScope,
    source_error: &impl Fn(usize, String) -> Error,
    index: usize,
    what: &str,
    expr: &hcl::expr::Expression,
) -> Result<String, Error> {
    let value = scope.eval(expr)?;
    match value {
        hcl::Value::String(s) => Ok(s),
        other => Err(source_error(
            index,
            format!(
                "{what} must be a string, got {}",
                runbook_types::tagged_type_name(&other)
            ),
        )),
    }
}

/// Merge `src` into `dst`: mappings merge recursively, scalars and
/// sequences at the same path are replaced by the later source.
fn merge_override(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(dst), serde_yaml::Value::Mapping(src)) => {
            for (key, value) in src {
                match dst.get_mut(&key) {
                    Some(slot) => merge_override(slot, value),
                    None => {
                        dst.insert(key, value);
                    }
                }
            }
        }
        (slot, src) => *slot = src,
    }
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a bool",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}
