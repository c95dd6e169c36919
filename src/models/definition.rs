//! Model definition ("Modelfile") handling
//!
//! A definition names its source artifact on a `FROM` line, followed by
//! sampling parameters, a system prompt, a prompt template and stop sequences.
//! Definitions read from the daemon or from disk are kept verbatim apart from
//! the source line; definitions for bare GGUF files are synthesized from a
//! per-family table keyed on the artifact's file name.

use crate::error::{ModelError, ModelResult};
use std::path::Path;

const SOURCE_PREFIX: &str = "FROM ";

/// Textual model definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDefinition(String);

impl ModelDefinition {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Reference on the first `FROM` line, trimmed
    pub fn source(&self) -> ModelResult<&str> {
        self.0
            .lines()
            .find_map(|line| line.strip_prefix(SOURCE_PREFIX))
            .map(str::trim)
            .filter(|source| !source.is_empty())
            .ok_or_else(|| {
                ModelError::InvalidDefinition("no FROM line naming the model file".to_string())
            })
    }

    /// Point every `FROM` line at `artifact`, leaving other lines untouched
    pub fn with_source(&self, artifact: &Path) -> Self {
        let replacement = format!("{}{}", SOURCE_PREFIX, artifact.display());
        let rewritten = self
            .0
            .split('\n')
            .map(|line| {
                if line.starts_with(SOURCE_PREFIX) {
                    replacement.as_str()
                } else {
                    line
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        Self(rewritten)
    }
}

impl std::fmt::Display for ModelDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Family Table
// ============================================================================

const SAMPLING_PARAMETERS: &[(&str, &str)] = &[
    ("temperature", "0.7"),
    ("top_p", "0.9"),
    ("top_k", "40"),
    ("repeat_penalty", "1.1"),
];

const GENERIC_PERSONA: &str =
    "You are a helpful AI assistant. You provide accurate, helpful, and safe responses to user queries.";
const QWEN_PERSONA: &str =
    "You are Qwen, a helpful AI assistant. You provide accurate, helpful, and safe responses to user queries.";
const CODING_PERSONA: &str = "You are an expert programmer. You write clean, efficient, and well-documented code. Always provide helpful explanations for your code.";

/// Prompt-template token vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `<|system|>` / `<|user|>` / `<|assistant|>` blocks closed by `<|end|>`
    RoleTag,
    /// Role tags without blank lines between turns
    CompactRoleTag,
    /// `[INST]` brackets with a `<<SYS>>` system block
    InstructWithSystem,
    /// `[INST]` brackets, system prompt inlined
    Instruct,
    /// `<start_of_turn>` / `<end_of_turn>` turn delimiters
    Turn,
}

impl Dialect {
    fn template(self) -> &'static str {
        match self {
            Dialect::RoleTag => concat!(
                "{{ if .System }}<|system|>\n{{ .System }}\n<|end|>\n\n",
                "{{ end }}{{ if .Prompt }}<|user|>\n{{ .Prompt }}\n<|end|>\n\n",
                "{{ end }}<|assistant|>\n{{ .Response }}\n<|end|>",
            ),
            Dialect::CompactRoleTag => concat!(
                "{{ if .System }}<|system|>\n{{ .System }}\n<|end|>\n",
                "{{ end }}{{ if .Prompt }}<|user|>\n{{ .Prompt }}\n<|end|>\n",
                "{{ end }}<|assistant|>\n{{ .Response }}\n<|end|>",
            ),
            Dialect::InstructWithSystem => concat!(
                "{{ if .System }}<s>[INST] <<SYS>>\n{{ .System }}\n<</SYS>>\n\n",
                "{{ .Prompt }} [/INST]{{ else }}{{ if .Prompt }}<s>[INST] {{ .Prompt }} [/INST]",
                "{{ end }}{{ end }} {{ .Response }}</s>",
            ),
            Dialect::Instruct => concat!(
                "{{ if .System }}<s>[INST] {{ .System }}\n\n",
                "{{ .Prompt }} [/INST]{{ else }}{{ if .Prompt }}<s>[INST] {{ .Prompt }} [/INST]",
                "{{ end }}{{ end }} {{ .Response }}</s>",
            ),
            Dialect::Turn => concat!(
                "{{ if .System }}<start_of_turn>user\n{{ .System }}\n\n",
                "{{ .Prompt }}<end_of_turn>\n<start_of_turn>model\n",
                "{{ .Response }}<end_of_turn>{{ else }}{{ if .Prompt }}<start_of_turn>user\n",
                "{{ .Prompt }}<end_of_turn>\n<start_of_turn>model\n",
                "{{ .Response }}<end_of_turn>{{ end }}{{ end }}",
            ),
        }
    }

    fn stop_tokens(self) -> &'static [&'static str] {
        match self {
            Dialect::RoleTag | Dialect::CompactRoleTag => {
                &["<|system|>", "<|user|>", "<|assistant|>", "<|end|>"]
            }
            Dialect::InstructWithSystem | Dialect::Instruct => &["</s>", "[INST]"],
            Dialect::Turn => &["<start_of_turn>", "<end_of_turn>"],
        }
    }
}

/// One model family recognised by file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Family {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub persona: &'static str,
    pub dialect: Dialect,
}

/// Families in match priority order; code-specific keywords come first
pub const FAMILIES: &[Family] = &[
    Family {
        name: "codellama",
        keywords: &["codellama", "code-llama"],
        persona: CODING_PERSONA,
        dialect: Dialect::InstructWithSystem,
    },
    Family {
        name: "qwen",
        keywords: &["qwen", "qwen2", "qwen3"],
        persona: QWEN_PERSONA,
        dialect: Dialect::RoleTag,
    },
    Family {
        name: "llama",
        keywords: &["llama", "llama2", "llama3"],
        persona: GENERIC_PERSONA,
        dialect: Dialect::InstructWithSystem,
    },
    Family {
        name: "mistral",
        keywords: &["mistral", "mixtral"],
        persona: GENERIC_PERSONA,
        dialect: Dialect::Instruct,
    },
    Family {
        name: "gemma",
        keywords: &["gemma"],
        persona: GENERIC_PERSONA,
        dialect: Dialect::Turn,
    },
    Family {
        name: "phi",
        keywords: &["phi", "phi2", "phi3"],
        persona: GENERIC_PERSONA,
        dialect: Dialect::CompactRoleTag,
    },
    Family {
        name: "yi",
        keywords: &["yi", "01-yi"],
        persona: GENERIC_PERSONA,
        dialect: Dialect::RoleTag,
    },
    Family {
        name: "deepseek",
        keywords: &["deepseek"],
        persona: GENERIC_PERSONA,
        dialect: Dialect::RoleTag,
    },
];

/// Used when no family keyword matches
pub const DEFAULT_FAMILY: Family = Family {
    name: "default",
    keywords: &[],
    persona: GENERIC_PERSONA,
    dialect: Dialect::RoleTag,
};

/// First family (in priority order) with a keyword in `file_name`, case-insensitively
pub fn detect_family(file_name: &str) -> &'static Family {
    let lowered = file_name.to_lowercase();
    FAMILIES
        .iter()
        .find(|family| family.keywords.iter().any(|kw| lowered.contains(kw)))
        .unwrap_or(&DEFAULT_FAMILY)
}

/// Render the family's definition for `artifact`
pub fn render(family: &Family, artifact: &Path) -> ModelDefinition {
    let mut text = String::new();

    text.push_str(SOURCE_PREFIX);
    text.push_str(&artifact.display().to_string());
    text.push_str("\n\n");

    for (name, value) in SAMPLING_PARAMETERS {
        text.push_str(&format!("PARAMETER {} {}\n", name, value));
    }
    text.push('\n');

    text.push_str(&format!("SYSTEM \"{}\"\n\n", family.persona));

    text.push_str("TEMPLATE \"");
    text.push_str(family.dialect.template());
    text.push_str("\"\n\n");

    for token in family.dialect.stop_tokens() {
        text.push_str(&format!("STOP \"{}\"\n", token));
    }

    ModelDefinition(text)
}

/// Build a definition for an artifact that has none
///
/// `artifact` must already be the resolved absolute path; it is written
/// verbatim on the `FROM` line.
pub fn synthesize(artifact: &Path, model_name: &str) -> ModelDefinition {
    let file_name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let family = detect_family(&file_name);

    tracing::debug!(
        model = %model_name,
        file = %file_name,
        family = %family.name,
        "Synthesizing model definition"
    );

    render(family, artifact)
}
