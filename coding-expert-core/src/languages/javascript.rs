use crate::context::RequestContext;
use crate::languages::analysis::{LintRule, SyntaxProfile, has_top_level_statement};
use crate::languages::sandbox::require_toolchain;
use crate::languages::{
    Analysis, ExecutionRequest, ExecutionResult, Language, LanguageError, LanguageProvider,
    ResourceLimits, Sandbox, SandboxCommand, SandboxWorkspace, Severity, execution_timeout,
    run_limits, strings,
};
use async_trait::async_trait;
use std::sync::Arc;
use tree_sitter::Node;

const RUNTIME: &str = "node";

pub struct JavaScriptProvider {
    language: Language,
    profile: SyntaxProfile,
    sandbox: Arc<Sandbox>,
}

impl JavaScriptProvider {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self {
            language: Language {
                name: "JavaScript".to_string(),
                version: "ES2022".to_string(),
                file_extensions: strings(&[".js", ".mjs", ".cjs"]),
                aliases: strings(&["js", "node", "nodejs"]),
                keywords: strings(&[
                    "async", "await", "break", "case", "catch", "class", "const", "continue",
                    "default", "delete", "do", "else", "export", "extends", "finally", "for",
                    "function", "if", "import", "in", "instanceof", "let", "new", "return",
                    "switch", "this", "throw", "try", "typeof", "var", "void", "while", "yield",
                ]),
                standard_library_summary: "Array, Object, Map, Set, Promise, JSON, Math, \
                    String, RegExp; node: fs, path, process, readline, util"
                    .to_string(),
            },
            profile: profile(),
            sandbox,
        }
    }
}

fn profile() -> SyntaxProfile {
    SyntaxProfile::new(
        "JavaScript",
        tree_sitter_javascript::LANGUAGE.into(),
        &[
            "function_declaration",
            "generator_function_declaration",
            "method_definition",
        ],
        &[("import_statement", "source")],
        runs_as_script,
    )
    .with_lints([
        LintRule::new(
            "eval",
            Severity::Warning,
            r"\beval\(",
            "eval runs arbitrary code",
        ),
        LintRule::new(
            "var",
            Severity::Info,
            r"(^|[;{\s])var\s",
            "`var` is function scoped; prefer `let` or `const`",
        ),
        LintRule::new(
            "loose_equality",
            Severity::Info,
            r"[^=!<>]==[^=]|!=[^=]",
            "loose equality coerces types; prefer `===` / `!==`",
        ),
    ])
}

fn runs_as_script(root: Node<'_>, _source: &str, _functions: &[String]) -> bool {
    has_top_level_statement(
        root,
        &[
            "function_declaration",
            "generator_function_declaration",
            "class_declaration",
            "import_statement",
            "export_statement",
        ],
    )
}

/// ES module syntax needs the `.mjs` extension; everything else runs as CommonJS
fn entry_file(code: &str) -> &'static str {
    let module = code.lines().map(str::trim_start).any(|line| {
        line.starts_with("import ") || line.starts_with("import{") || line.starts_with("export ")
    });
    if module { "main.mjs" } else { "main.js" }
}

#[async_trait]
impl LanguageProvider for JavaScriptProvider {
    fn language(&self) -> &Language {
        &self.language
    }

    fn resource_limits(&self) -> ResourceLimits {
        self.sandbox.default_limits()
    }

    fn supports_interactive(&self) -> bool {
        true
    }

    async fn validate(&self, _ctx: &RequestContext, code: &str) -> Result<(), LanguageError> {
        self.profile.validate(code)
    }

    async fn analyze(&self, _ctx: &RequestContext, code: &str) -> Result<Analysis, LanguageError> {
        self.profile.analyze(code)
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, LanguageError> {
        let timeout = execution_timeout(request)?;
        require_toolchain(&self.language.name, RUNTIME)?;

        let workspace = SandboxWorkspace::create()?;
        let file = entry_file(&request.code);
        workspace.write_file(file, &request.code).await?;

        let limits = self.resource_limits();
        // V8 reserves far more address space than it commits; cap the heap instead
        let heap_mb = (limits.max_memory_bytes / (1024 * 1024) / 2).max(16);
        let command = SandboxCommand::new(RUNTIME, run_limits(limits, timeout), timeout)
            .arg(format!("--max-old-space-size={heap_mb}"))
            .arg(file)
            .env("NODE_OPTIONS", "")
            .stdin(request.stdin.clone())
            .without_address_space_limit();
        self.sandbox.run(ctx, &workspace, &command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::constants::sandbox as sandbox_defaults;
    use crate::languages::sandbox::find_executable;
    use std::time::Duration;

    fn provider() -> JavaScriptProvider {
        let defaults = ResourceLimits {
            max_memory_bytes: sandbox_defaults::DEFAULT_MAX_MEMORY_BYTES,
            max_cpu_seconds: sandbox_defaults::DEFAULT_MAX_CPU_SECS,
            max_processes: sandbox_defaults::DEFAULT_MAX_PROCESSES,
            max_output_bytes: sandbox_defaults::DEFAULT_MAX_OUTPUT_BYTES,
            max_file_bytes: sandbox_defaults::DEFAULT_MAX_FILE_BYTES,
            network: false,
            filesystem: false,
        };
        JavaScriptProvider::new(Arc::new(Sandbox::new(std::env::temp_dir(), false, defaults)))
    }

    #[test]
    fn module_syntax_selects_mjs() {
        assert_eq!(entry_file("import fs from 'fs';\nconsole.log(1)"), "main.mjs");
        assert_eq!(entry_file("const fs = require('fs');"), "main.js");
    }

    #[tokio::test]
    async fn analysis_collects_functions_imports_and_lints() {
        let ctx = RequestContext::new(Duration::from_secs(5));
        let code = concat!(
            "import { readFile } from 'fs';\n\n",
            "function load(p) {\n",
            "  var data = eval(p);\n",
            "  return data == null;\n",
            "}\n\n",
            "load('1');\n",
        );
        let analysis = provider().analyze(&ctx, code).await.unwrap();
        assert!(analysis.facts.syntax_ok);
        assert!(analysis.facts.has_entry_point);
        assert_eq!(analysis.facts.functions, vec!["load"]);
        assert_eq!(analysis.facts.imports, vec!["fs"]);
        let rules: Vec<&str> = analysis.findings.iter().map(|f| f.rule.as_str()).collect();
        assert_eq!(rules, vec!["eval", "var", "loose_equality"]);
    }

    #[tokio::test]
    async fn runs_console_log() {
        if find_executable(RUNTIME).is_none() {
            eprintln!("skipping: node not installed");
            return;
        }
        let ctx = RequestContext::new(Duration::from_secs(30));
        let request = ExecutionRequest {
            code: "console.log([1, 2, 3].map((x) => x * 2).join(','));".to_string(),
            language: "javascript".to_string(),
            stdin: None,
            timeout_seconds: 10,
            allow_network: false,
        };
        let result = provider().execute(&ctx, &request).await.unwrap();
        assert_eq!(result.exit_code, 0, "{}", result.stderr);
        assert_eq!(result.stdout, "2,4,6\n");
    }
}
