//! Tree-sitter backed static analysis shared by every language provider

use crate::languages::{Analysis, AnalysisFacts, Finding, LanguageError, Location, Severity};
use regex::Regex;
use tree_sitter::{Node, Parser, Tree};
use tracing::warn;

const MAX_SYNTAX_FINDINGS: usize = 10;
const MAX_LINE_CHARS: usize = 120;
const SNIPPET_CHARS: usize = 24;

/// Decides whether parsed code can run as a program on its own
pub type EntryPointFn = fn(root: Node<'_>, source: &str, functions: &[String]) -> bool;

/// Line-oriented lint
#[derive(Debug, Clone)]
pub struct LintRule {
    pub id: &'static str,
    pub severity: Severity,
    pub message: &'static str,
    pattern: Regex,
}

impl LintRule {
    /// Returns `None` (and logs) when the pattern does not compile
    pub fn new(
        id: &'static str,
        severity: Severity,
        pattern: &str,
        message: &'static str,
    ) -> Option<Self> {
        match Regex::new(pattern) {
            Ok(pattern) => Some(Self {
                id,
                severity,
                message,
                pattern,
            }),
            Err(err) => {
                warn!(rule = id, error = %err, "skipping lint rule with invalid pattern");
                None
            }
        }
    }
}

/// Grammar plus the node kinds and lints that describe one language
pub struct SyntaxProfile {
    language_name: &'static str,
    grammar: tree_sitter::Language,
    function_kinds: &'static [&'static str],
    /// `(node kind, field holding the imported path)`
    import_kinds: &'static [(&'static str, &'static str)],
    entry_point: EntryPointFn,
    lints: Vec<LintRule>,
}

impl std::fmt::Debug for SyntaxProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntaxProfile")
            .field("language", &self.language_name)
            .field("lints", &self.lints.len())
            .finish()
    }
}

impl SyntaxProfile {
    pub fn new(
        language_name: &'static str,
        grammar: tree_sitter::Language,
        function_kinds: &'static [&'static str],
        import_kinds: &'static [(&'static str, &'static str)],
        entry_point: EntryPointFn,
    ) -> Self {
        let lints = [LintRule::new(
            "todo",
            Severity::Info,
            r"\b(TODO|FIXME|XXX)\b",
            "unresolved TODO marker",
        )]
        .into_iter()
        .flatten()
        .collect();
        Self {
            language_name,
            grammar,
            function_kinds,
            import_kinds,
            entry_point,
            lints,
        }
    }

    pub fn with_lints(mut self, lints: impl IntoIterator<Item = Option<LintRule>>) -> Self {
        self.lints.extend(lints.into_iter().flatten());
        self
    }

    pub fn language_name(&self) -> &'static str {
        self.language_name
    }

    fn parse(&self, code: &str) -> Result<Tree, LanguageError> {
        let mut parser = Parser::new();
        parser.set_language(&self.grammar).map_err(|e| {
            LanguageError::Sandbox(format!("{} grammar unavailable: {e}", self.language_name))
        })?;
        parser.parse(code, None).ok_or_else(|| {
            LanguageError::InvalidRequest(format!("{} parser gave up", self.language_name))
        })
    }

    /// Parse-only check. The first syntax error is reported with its position.
    pub fn validate(&self, code: &str) -> Result<(), LanguageError> {
        if code.trim().is_empty() {
            return Err(LanguageError::EmptyCode);
        }
        let tree = self.parse(code)?;
        match syntax_errors(tree.root_node(), code).into_iter().next() {
            Some(finding) => {
                let location = finding.location.unwrap_or(Location { line: 1, column: 1 });
                Err(LanguageError::SyntaxError {
                    line: location.line,
                    column: location.column,
                    message: finding.message,
                })
            }
            None => Ok(()),
        }
    }

    /// Static inspection; deterministic in `code`
    pub fn analyze(&self, code: &str) -> Result<Analysis, LanguageError> {
        if code.trim().is_empty() {
            return Err(LanguageError::EmptyCode);
        }
        let tree = self.parse(code)?;
        let root = tree.root_node();

        let mut findings = syntax_errors(root, code);
        let syntax_ok = findings.is_empty();

        let mut functions = Vec::new();
        let mut imports = Vec::new();
        walk(root, |node| {
            let kind = node.kind();
            if self.function_kinds.contains(&kind) {
                if let Some(name) = field_text(node, "name", code) {
                    functions.push(name.to_string());
                }
            }
            if let Some((_, field)) = self.import_kinds.iter().find(|(k, _)| *k == kind) {
                imports.extend(import_paths(node, field, code));
            }
            true
        });

        let has_entry_point = (self.entry_point)(root, code, &functions);
        findings.extend(self.lint(code));
        if syntax_ok && !has_entry_point {
            findings.push(Finding {
                severity: Severity::Info,
                message: "no program entry point; the code cannot be executed on its own"
                    .to_string(),
                location: None,
                rule: "entry_point".to_string(),
            });
        }

        Ok(Analysis {
            language: self.language_name.to_string(),
            findings,
            facts: AnalysisFacts {
                lines: code.lines().count(),
                functions,
                imports,
                has_entry_point,
                syntax_ok,
            },
        })
    }

    fn lint(&self, code: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        for (index, line) in code.lines().enumerate() {
            for rule in &self.lints {
                if let Some(found) = rule.pattern.find(line) {
                    findings.push(Finding {
                        severity: rule.severity,
                        message: rule.message.to_string(),
                        location: Some(Location {
                            line: index + 1,
                            column: line[..found.start()].chars().count() + 1,
                        }),
                        rule: rule.id.to_string(),
                    });
                }
            }
            let width = line.chars().count();
            if width > MAX_LINE_CHARS {
                findings.push(Finding {
                    severity: Severity::Info,
                    message: format!("line is {width} characters long (limit {MAX_LINE_CHARS})"),
                    location: Some(Location {
                        line: index + 1,
                        column: MAX_LINE_CHARS + 1,
                    }),
                    rule: "long_line".to_string(),
                });
            }
        }
        findings
    }
}

/// Pre-order traversal; `visit` returns whether to descend into the node
pub(crate) fn walk<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>) -> bool) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if !visit(node) {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

/// Whether the root holds a statement outside `declaration_kinds`; docstring-like
/// bare string expressions do not count
pub(crate) fn has_top_level_statement(root: Node<'_>, declaration_kinds: &[&str]) -> bool {
    let mut cursor = root.walk();
    let found = root.named_children(&mut cursor).any(|child| {
        let kind = child.kind();
        if kind == "comment" || declaration_kinds.contains(&kind) {
            return false;
        }
        let bare_string = kind == "expression_statement"
            && child.named_child_count() == 1
            && child.named_child(0).is_some_and(|inner| inner.kind() == "string");
        !bare_string
    });
    found
}

pub(crate) fn field_text<'s>(node: Node<'_>, field: &str, source: &'s str) -> Option<&'s str> {
    node.child_by_field_name(field)
        .and_then(|child| child.utf8_text(source.as_bytes()).ok())
}

fn import_paths(node: Node<'_>, field: &str, source: &str) -> Vec<String> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor)
        .filter_map(|child| child.utf8_text(source.as_bytes()).ok())
        .map(|text| {
            let path = text.split(" as ").next().unwrap_or(text);
            path.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
        })
        .filter(|text| !text.is_empty())
        .collect()
}

fn syntax_errors(root: Node<'_>, source: &str) -> Vec<Finding> {
    if !root.has_error() {
        return Vec::new();
    }
    let mut findings = Vec::new();
    walk(root, |node| {
        if findings.len() >= MAX_SYNTAX_FINDINGS {
            return false;
        }
        if node.is_missing() {
            findings.push(syntax_finding(node, format!("missing `{}`", node.kind())));
            return false;
        }
        if node.is_error() {
            let snippet: String = node
                .utf8_text(source.as_bytes())
                .unwrap_or_default()
                .lines()
                .next()
                .unwrap_or_default()
                .chars()
                .take(SNIPPET_CHARS)
                .collect();
            let message = if snippet.trim().is_empty() {
                "unexpected input".to_string()
            } else {
                format!("unexpected `{}`", snippet.trim())
            };
            findings.push(syntax_finding(node, message));
            return false;
        }
        node.has_error()
    });
    findings
}

fn syntax_finding(node: Node<'_>, message: String) -> Finding {
    let position = node.start_position();
    Finding {
        severity: Severity::Error,
        message,
        location: Some(Location {
            line: position.row + 1,
            column: position.column + 1,
        }),
        rule: "syntax".to_string(),
    }
}
