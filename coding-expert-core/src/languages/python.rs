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

const INTERPRETER: &str = "python3";

pub struct PythonProvider {
    language: Language,
    profile: SyntaxProfile,
    sandbox: Arc<Sandbox>,
}

impl PythonProvider {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self {
            language: Language {
                name: "Python".to_string(),
                version: "3".to_string(),
                file_extensions: strings(&[".py"]),
                aliases: strings(&["py", "python3"]),
                keywords: strings(&[
                    "and", "as", "assert", "async", "await", "break", "class", "continue",
                    "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
                    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass",
                    "raise", "return", "try", "while", "with", "yield",
                ]),
                standard_library_summary: "os, sys, re, json, math, itertools, functools, \
                    collections, dataclasses, typing, pathlib, subprocess, asyncio, unittest"
                    .to_string(),
            },
            profile: profile(),
            sandbox,
        }
    }
}

fn profile() -> SyntaxProfile {
    SyntaxProfile::new(
        "Python",
        tree_sitter_python::LANGUAGE.into(),
        &["function_definition"],
        &[
            ("import_statement", "name"),
            ("import_from_statement", "module_name"),
        ],
        runs_as_script,
    )
    .with_lints([
        LintRule::new(
            "bare_except",
            Severity::Warning,
            r"^\s*except\s*:",
            "bare `except:` also catches KeyboardInterrupt and SystemExit",
        ),
        LintRule::new(
            "eval",
            Severity::Warning,
            r"\b(eval|exec)\(",
            "eval/exec run arbitrary code",
        ),
        LintRule::new(
            "mutable_default",
            Severity::Warning,
            r"def\s+\w+\(.*=\s*(\[\]|\{\})",
            "mutable default argument is shared between calls",
        ),
    ])
}

fn runs_as_script(root: Node<'_>, _source: &str, _functions: &[String]) -> bool {
    has_top_level_statement(
        root,
        &[
            "function_definition",
            "class_definition",
            "decorated_definition",
            "import_statement",
            "import_from_statement",
        ],
    )
}

#[async_trait]
impl LanguageProvider for PythonProvider {
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
        require_toolchain(&self.language.name, INTERPRETER)?;

        let workspace = SandboxWorkspace::create()?;
        workspace.write_file("main.py", &request.code).await?;

        let command = SandboxCommand::new(
            INTERPRETER,
            run_limits(self.resource_limits(), timeout),
            timeout,
        )
        .args(["-I", "-B", "main.py"])
        .env("PYTHONUNBUFFERED", "1")
        .stdin(request.stdin.clone());
        self.sandbox.run(ctx, &workspace, &command).await
    }
}
