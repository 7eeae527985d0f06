//! Static checks for generated scripts.

use std::sync::OnceLock;

use regex::Regex;

static RE_FENCE: OnceLock<Regex> = OnceLock::new();
static RE_PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
static RE_FUNCTION: OnceLock<Regex> = OnceLock::new();
static RE_BINDING: OnceLock<Regex> = OnceLock::new();

/// A problem found in a generated script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LintFinding {
    Empty,
    /// Placeholder marker or fill-in instruction, with the offending text.
    Placeholder(String),
    /// A function that calls itself or hands itself to a timer.
    Recursion(String),
}

impl std::fmt::Display for LintFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LintFinding::Empty => write!(f, "the script is empty"),
            LintFinding::Placeholder(text) => write!(f, "placeholder left in code: '{}'", text),
            LintFinding::Recursion(name) => write!(
                f,
                "function '{}' calls itself; use a loop with sleep() instead",
                name
            ),
        }
    }
}

/// Remove a surrounding markdown code fence, if present.
pub fn strip_fences(code: &str) -> String {
    let re = RE_FENCE.get_or_init(|| Regex::new(r"(?s)^\s*```[\w-]*\s*\n(.*?)\n?```\s*$").unwrap());
    match re.captures(code) {
        Some(caps) => caps[1].trim().to_string(),
        None => code.trim().to_string(),
    }
}

/// Check a script for anything that would keep it from running as-is.
pub fn lint(code: &str) -> Vec<LintFinding> {
    let mut findings = Vec::new();

    if code.trim().is_empty() {
        findings.push(LintFinding::Empty);
        return findings;
    }

    let placeholder = RE_PLACEHOLDER.get_or_init(|| {
        Regex::new(
            r"(?im)\b(?:TODO|FIXME|TBD)\b|fill (?:this|it|in)\b|your code here|<insert[^>]*>|^\s*//\s*\.\.\.",
        )
        .unwrap()
    });
    if let Some(m) = placeholder.find(code) {
        findings.push(LintFinding::Placeholder(m.as_str().trim().to_string()));
    }

    let function = RE_FUNCTION
        .get_or_init(|| Regex::new(r"function\*?\s+([A-Za-z_$][\w$]*)\s*\(").unwrap());
    for caps in function.captures_iter(code) {
        let name = &caps[1];
        let Some(whole) = caps.get(0) else { continue };
        let Some(body) = function_body(&code[whole.end()..]) else {
            continue;
        };
        if calls(body, name) {
            findings.push(LintFinding::Recursion(name.to_string()));
        }
    }

    // Function expressions and arrows bound to a name.
    let binding = RE_BINDING.get_or_init(|| {
        Regex::new(
            r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(function\b|\(|[A-Za-z_$][\w$]*\s*=>)",
        )
        .unwrap()
    });
    for caps in binding.captures_iter(code) {
        let name = &caps[1];
        let Some(kind) = caps.get(2) else { continue };
        let body = if kind.as_str() == "function" {
            function_body(&code[kind.end()..])
        } else {
            arrow_body(&code[kind.start()..])
        };
        let Some(body) = body else { continue };
        if calls(body, name) && !findings.contains(&LintFinding::Recursion(name.to_string())) {
            findings.push(LintFinding::Recursion(name.to_string()));
        }
    }

    findings
}

/// Body of an arrow function starting at its parameter list.
fn arrow_body(rest: &str) -> Option<&str> {
    let after_params = if rest.starts_with('(') {
        let mut depth = 0usize;
        let mut close = None;
        for (i, ch) in rest.char_indices() {
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        &rest[close? + 1..]
    } else {
        let arrow = rest.find("=>")?;
        &rest[arrow..]
    };

    let body = after_params.trim_start().strip_prefix("=>")?.trim_start();
    if body.starts_with('{') {
        return function_body(body);
    }
    let end = body.find([';', '\n']).unwrap_or(body.len());
    Some(&body[..end])
}

/// Text between the first `{` and its matching `}`.
fn function_body(rest: &str) -> Option<&str> {
    let open = rest.find('{')?;
    let mut depth = 0usize;
    for (i, ch) in rest[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&rest[open + 1..open + i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// True when `body` invokes `name` or passes it as an argument,
/// as in `setTimeout(name, 1000)`.
fn calls(body: &str, name: &str) -> bool {
    let mut search = body;
    while let Some(idx) = search.find(name) {
        let before = search[..idx].chars().next_back();
        let after = search[idx + name.len()..].trim_start();
        let boundary = before.is_none_or(|c| !(c.is_alphanumeric() || c == '_' || c == '$' || c == '.'));
        let after_boundary = !after.starts_with(|c: char| c.is_alphanumeric() || c == '_' || c == '$');
        if boundary && after_boundary {
            if after.starts_with('(') {
                return true;
            }
            let opens_arg = search[..idx].trim_end().ends_with(['(', ',']);
            if opens_arg && after.starts_with([',', ')']) {
                return true;
            }
        }
        search = &search[idx + name.len()..];
    }
    false
}
