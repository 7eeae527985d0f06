//! Automation script synthesis.
//!
//! Scripts are generated against a fixed runtime API and checked for
//! placeholders and self-recursion before they are handed to the host.

mod lint;
mod synthesis;

pub use lint::{LintFinding, lint, strip_fences};
pub use synthesis::{RUNTIME_PRIMITIVES, ScriptSynthesizer, SynthesisRequest, system_prompt};
