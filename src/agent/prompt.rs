//! Prompt composition for the intent round-trip.
//!
//! The prompt is a pure function of its inputs. Identical history, utterance
//! and hints always yield an identical prompt.

use crate::config::BridgeProfile;
use crate::intent::ActionName;

/// Characters of the editor buffer included as context.
pub const EDITOR_EXCERPT_CHARS: usize = 400;

/// Everything a prompt is built from.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    /// History window, oldest first, already rendered as `speaker: content`.
    pub history: &'a [String],
    pub utterance: &'a str,
    /// Script name the user is looking at.
    pub default_script: &'a str,
    /// Editor buffer contents. Empty when there is nothing open.
    pub editor_code: &'a str,
}

/// A composed prompt: fixed instructions plus turn context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub context: String,
}

/// Builds intent prompts for one profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptComposer {
    profile: BridgeProfile,
}

impl PromptComposer {
    pub fn new(profile: BridgeProfile) -> Self {
        Self { profile }
    }

    pub fn compose(&self, input: &PromptInput<'_>) -> Prompt {
        Prompt {
            system: self.system_instructions(),
            context: render_context(input),
        }
    }

    /// Fixed instructions: persona, available actions and usage rules.
    pub fn system_instructions(&self) -> String {
        let actions: Vec<String> = self
            .profile
            .actions()
            .iter()
            .map(|a| format!("- {}: {}", a, a.description()))
            .collect();

        let mut rules = vec![
            "Answer with JSON {\"say\": \"...\", \"call\": {\"name\": \"...\", \"args\": {...}}}. \
             `say` is required; `call` is optional and at most one action runs per reply."
                .to_string(),
            "Reply in the language the user writes in. Keep `say` short; results are appended to it."
                .to_string(),
            format!(
                "To scan actively use {} or {}. Never start a script just to scan.",
                ActionName::ScanSector,
                ActionName::PerformScan
            ),
        ];

        if self.profile.allows(ActionName::UpdateScript) {
            rules.push(format!(
                "To change an existing script use {}; its current code is always fetched before \
                 it is rewritten. Never recreate a script with {} to edit it.",
                ActionName::UpdateScript,
                ActionName::CreateScript
            ));
            rules.push(format!(
                "When a script name is omitted, the default script name below is used, except \
                 for {} which always needs the name the pilot gave.",
                ActionName::DeleteScript
            ));
        }

        let rules: Vec<String> = rules.iter().map(|r| format!("- {}", r)).collect();

        format!(
            "You are the command bridge of a mining ship. You turn the pilot's requests into ship \
             actions and report back.\n\n## Actions\n{}\n\n## Rules\n{}",
            actions.join("\n"),
            rules.join("\n")
        )
    }
}

fn render_context(input: &PromptInput<'_>) -> String {
    let mut context = String::new();

    if !input.history.is_empty() {
        context.push_str("Recent conversation:\n");
        for line in input.history {
            context.push_str(line);
            context.push('\n');
        }
        context.push('\n');
    }

    context.push_str(&format!("Default script name: {}\n", input.default_script));

    if !input.editor_code.trim().is_empty() {
        let excerpt: String = input.editor_code.chars().take(EDITOR_EXCERPT_CHARS).collect();
        context.push_str(&format!(
            "Editor buffer (first {} characters):\n{}\n",
            EDITOR_EXCERPT_CHARS, excerpt
        ));
    }

    context.push_str(&format!("\nUser: {}", input.utterance));
    context
}
