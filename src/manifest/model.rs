use std::collections::BTreeMap;

use crate::foundation::error::ValidationIssue;

/// Input names the embedding compiler can always supply from its own context.
///
/// For `domain: clip` manifests these are also the *only* legal port names:
/// `source`/`input` carry the clip's running image stream and `faceMask` a
/// compiler-synthesized mask derived from externally supplied face rectangles.
pub const EXTERNAL_CONTEXT_INPUTS: &[&str] = &["source", "input", "faceMask"];

/// Value kind a port accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    /// An image stream.
    Image,
    /// A scalar stream.
    Scalar,
    /// A single-channel mask image.
    Mask,
}

/// A named input a feature can consume. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PortDefinition {
    /// Port name referenced by pass inputs and external bindings.
    pub name: String,
    /// Kind of value the port accepts.
    pub kind: PortKind,
}

/// Declaration of one tunable parameter, decoded from a `{"type": ...}` record.
///
/// The tag set is closed: an unknown `type` is a decode error, never a default.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamSpec {
    /// Float with an inclusive legal range.
    Float {
        /// Minimum legal value.
        min: f64,
        /// Maximum legal value.
        max: f64,
        /// Default value.
        default: f64,
    },
    /// Boolean flag.
    Bool {
        /// Default value.
        default: bool,
    },
    /// Straight RGBA color.
    Color {
        /// Default color.
        default: [f32; 4],
    },
    /// One choice out of a closed set.
    Enum {
        /// Legal choices.
        choices: Vec<String>,
        /// Default choice.
        default: String,
    },
}

impl ParamSpec {
    /// Human-readable kind name, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ParamSpec::Float { .. } => "float",
            ParamSpec::Bool { .. } => "bool",
            ParamSpec::Color { .. } => "color",
            ParamSpec::Enum { .. } => "enum choice",
        }
    }
}

/// A named parameter declaration.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ParameterDefinition {
    /// Parameter name.
    pub name: String,
    /// Type, range, and default.
    #[serde(flatten)]
    pub spec: ParamSpec,
}

impl ParameterDefinition {
    /// The declared default as a concrete value.
    pub fn default_value(&self) -> ParamValue {
        match &self.spec {
            ParamSpec::Float { default, .. } => ParamValue::Float(*default),
            ParamSpec::Bool { default } => ParamValue::Bool(*default),
            ParamSpec::Color { default } => ParamValue::Color(*default),
            ParamSpec::Enum { default, .. } => ParamValue::Choice(default.clone()),
        }
    }
}

/// A concrete parameter value carried by a render node.
///
/// A closed sum type: consumption sites match exhaustively, and decoding
/// rejects shapes outside these four.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean flag.
    Bool(bool),
    /// Float scalar.
    Float(f64),
    /// Straight RGBA color.
    Color([f32; 4]),
    /// Enum choice.
    Choice(String),
}

impl ParamValue {
    /// Human-readable kind name, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Float(_) => "float",
            ParamValue::Color(_) => "color",
            ParamValue::Choice(_) => "enum choice",
        }
    }

    /// The float payload, if this is a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The bool payload, if this is a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The color payload, if this is a color.
    pub fn as_color(&self) -> Option<[f32; 4]> {
        match self {
            ParamValue::Color(v) => Some(*v),
            _ => None,
        }
    }

    /// The choice payload, if this is an enum choice.
    pub fn as_choice(&self) -> Option<&str> {
        match self {
            ParamValue::Choice(v) => Some(v),
            _ => None,
        }
    }
}

/// Where a feature is allowed to appear.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureDomain {
    /// Applies to a single clip's image stream.
    Clip,
    /// Applies to a whole assembled scene.
    Scene,
    /// Produces an image without consuming a clip stream.
    Generator,
    /// Bridges two adjacent clips.
    Transition,
    /// Helper features not exposed to end users.
    Utility,
    /// Engine-internal kernels (adapters, neutral sources).
    Intrinsic,
    /// Audio-domain features; never image-compiled.
    Audio,
}

/// One internal dispatch step inside a multi-pass feature.
///
/// The set of passes for a manifest forms a DAG keyed by
/// `inputs` → `output_name` edges.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturePass {
    /// Name used for scheduling diagnostics.
    pub logical_name: String,
    /// Kernel dispatched by this pass.
    pub kernel_function: String,
    /// Input names: declared ports, external context names, or earlier pass outputs.
    pub inputs: Vec<String>,
    /// Name later passes use to consume this pass's output.
    pub output_name: String,
}

/// Declarative description of one feature.
///
/// Created by deserializing a manifest source, validated once at load time,
/// then immutable and shared for the process lifetime (or until a registry
/// reload). Unknown fields in the source record are ignored for forward
/// compatibility.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureManifest {
    /// Source format revision; absent means 1.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Globally unique feature identifier.
    pub id: String,
    /// Author-facing feature version string.
    #[serde(default)]
    pub version: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Grouping key for browse/query.
    #[serde(default)]
    pub category: String,
    /// Placement domain.
    pub domain: FeatureDomain,
    /// Declared input ports.
    #[serde(default)]
    pub inputs: Vec<PortDefinition>,
    /// Declared tunables.
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
    /// Single-pass shorthand: the kernel for a one-pass feature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_function: Option<String>,
    /// Explicit pass list for multi-pass features.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passes: Vec<FeaturePass>,
}

fn default_schema_version() -> u32 {
    1
}

impl FeatureManifest {
    /// The pass list with the single-kernel shorthand desugared.
    ///
    /// A manifest with `kernel_function` and no explicit passes is one implicit
    /// pass whose inputs are exactly its declared ports in declaration order.
    pub fn effective_passes(&self) -> Vec<FeaturePass> {
        if !self.passes.is_empty() {
            return self.passes.clone();
        }
        match &self.kernel_function {
            Some(kernel) => vec![FeaturePass {
                logical_name: "main".to_string(),
                kernel_function: kernel.clone(),
                inputs: self.inputs.iter().map(|p| p.name.clone()).collect(),
                output_name: "out".to_string(),
            }],
            None => Vec::new(),
        }
    }

    /// All kernel names this manifest dispatches.
    pub fn kernel_names(&self) -> Vec<&str> {
        if !self.passes.is_empty() {
            self.passes.iter().map(|p| p.kernel_function.as_str()).collect()
        } else {
            self.kernel_function.iter().map(String::as_str).collect()
        }
    }

    /// Look up a declared port by name.
    pub fn find_port(&self, name: &str) -> Option<&PortDefinition> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Declared parameter defaults as a concrete value map.
    pub fn default_params(&self) -> BTreeMap<String, ParamValue> {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.default_value()))
            .collect()
    }

    /// Ports a clip-compilation context cannot supply.
    ///
    /// Non-empty for a `domain: clip` manifest means the manifest is not
    /// clip-compilable and must be reclassified.
    pub fn illegal_clip_ports(&self) -> Vec<&str> {
        self.inputs
            .iter()
            .map(|p| p.name.as_str())
            .filter(|name| !EXTERNAL_CONTEXT_INPUTS.contains(name))
            .collect()
    }

    /// Structural issues independent of any registry: identity, pass-list
    /// shape, input resolution, and domain/port consistency.
    pub fn structural_issues(&self, source: &str) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.id.trim().is_empty() {
            issues.push(ValidationIssue::Decode {
                source_name: source.to_string(),
                message: "manifest id must be non-empty".to_string(),
            });
            return issues;
        }

        let passes = self.effective_passes();
        if passes.is_empty() {
            issues.push(ValidationIssue::BadPassGraph {
                manifest: self.id.clone(),
                message: "manifest declares neither kernelFunction nor passes".to_string(),
            });
            return issues;
        }

        let mut outputs: Vec<&str> = Vec::with_capacity(passes.len());
        for pass in &passes {
            if outputs.contains(&pass.output_name.as_str()) {
                issues.push(ValidationIssue::BadPassGraph {
                    manifest: self.id.clone(),
                    message: format!("duplicate pass output name '{}'", pass.output_name),
                });
            }
            outputs.push(pass.output_name.as_str());
        }

        for pass in &passes {
            for input in &pass.inputs {
                let resolves = self.find_port(input).is_some()
                    || outputs.contains(&input.as_str())
                    || EXTERNAL_CONTEXT_INPUTS.contains(&input.as_str());
                if !resolves {
                    issues.push(ValidationIssue::BadPassGraph {
                        manifest: self.id.clone(),
                        message: format!(
                            "pass '{}' input '{input}' is not a declared port, context input, or pass output",
                            pass.logical_name
                        ),
                    });
                }
            }
        }

        if self.domain == FeatureDomain::Clip {
            for port in self.illegal_clip_ports() {
                issues.push(ValidationIssue::IllegalClipPort {
                    manifest: self.id.clone(),
                    port: port.to_string(),
                });
            }
        }

        issues
    }
}

#[cfg(test)]
#[path = "../../tests/unit/manifest/model.rs"]
mod tests;
