use crate::config::constants::sandbox as sandbox_defaults;
use crate::context::RequestContext;
use crate::languages::analysis::{LintRule, SyntaxProfile, walk};
use crate::languages::sandbox::require_toolchain;
use crate::languages::{
    Analysis, ExecutionRequest, ExecutionResult, Language, LanguageError, LanguageProvider,
    ResourceLimits, Sandbox, SandboxCommand, SandboxWorkspace, Severity, build_limits,
    execution_timeout, run_limits, strings, with_build_time,
};
use async_trait::async_trait;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tree_sitter::Node;

/// Packages imported automatically when a snippet without a package clause uses them
const SNIPPET_PACKAGES: &[&str] = &[
    "bufio", "errors", "fmt", "math", "os", "sort", "strconv", "strings", "time",
];

pub struct GoProvider {
    language: Language,
    profile: SyntaxProfile,
    sandbox: Arc<Sandbox>,
}

impl GoProvider {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self {
            language: Language {
                name: "Go".to_string(),
                version: "1.22".to_string(),
                file_extensions: strings(&[".go"]),
                aliases: strings(&["golang"]),
                keywords: strings(&[
                    "break", "case", "chan", "const", "continue", "default", "defer", "else",
                    "fallthrough", "for", "func", "go", "goto", "if", "import", "interface",
                    "map", "package", "range", "return", "select", "struct", "switch", "type",
                    "var",
                ]),
                standard_library_summary: "fmt, strings, strconv, bufio, os, io, errors, sort, \
                    math, time, sync, context, net/http, encoding/json"
                    .to_string(),
            },
            profile: profile(),
            sandbox,
        }
    }
}

fn profile() -> SyntaxProfile {
    SyntaxProfile::new(
        "Go",
        tree_sitter_go::LANGUAGE.into(),
        &["function_declaration", "method_declaration"],
        &[("import_spec", "path")],
        has_main,
    )
    .with_lints([
        LintRule::new(
            "panic",
            Severity::Warning,
            r"\bpanic\(",
            "panic aborts the program; prefer returning an error",
        ),
        LintRule::new(
            "discarded_error",
            Severity::Warning,
            r"(^|[\s,])_\s*=\s*\w",
            "value discarded with `_`; check that no error is being ignored",
        ),
        LintRule::new(
            "os_exit",
            Severity::Info,
            r"\bos\.Exit\(",
            "os.Exit skips deferred calls",
        ),
    ])
}

fn has_main(root: Node<'_>, source: &str, functions: &[String]) -> bool {
    let mut main_package = false;
    walk(root, |node| {
        if node.kind() == "package_identifier"
            && node.utf8_text(source.as_bytes()).ok() == Some("main")
        {
            main_package = true;
        }
        node.kind() == "source_file" || node.kind() == "package_clause"
    });
    main_package && functions.iter().any(|name| name == "main")
}

fn references_package(code: &str, package: &str) -> bool {
    let needle = format!("{package}.");
    code.match_indices(&needle).any(|(at, _)| {
        code[..at]
            .chars()
            .next_back()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_' || c == '.'))
    })
}

/// Wrap statement snippets (no `package` clause) into a runnable `main` package
fn as_program(code: &str) -> Cow<'_, str> {
    let has_package = code
        .lines()
        .any(|line| line.trim_start().starts_with("package "));
    if has_package {
        return Cow::Borrowed(code);
    }
    let imports: Vec<String> = SNIPPET_PACKAGES
        .iter()
        .filter(|package| references_package(code, package))
        .map(|package| format!("import \"{package}\"\n"))
        .collect();
    Cow::Owned(format!(
        "package main\n\n{}\nfunc main() {{\n{code}\n}}\n",
        imports.concat()
    ))
}

#[async_trait]
impl LanguageProvider for GoProvider {
    fn language(&self) -> &Language {
        &self.language
    }

    fn resource_limits(&self) -> ResourceLimits {
        self.sandbox.default_limits()
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
        require_toolchain(&self.language.name, "go")?;

        let workspace = SandboxWorkspace::create()?;
        workspace
            .write_file("main.go", &as_program(&request.code))
            .await?;

        let limits = self.resource_limits();
        let cache = self.sandbox.cache_dir("go");
        let build = SandboxCommand::new(
            "go",
            build_limits(limits),
            Duration::from_secs(sandbox_defaults::BUILD_TIMEOUT_SECS),
        )
        .args(["build", "-o", "prog", "main.go"])
        .env("GOCACHE", cache.join("build").display().to_string())
        .env("GOPATH", cache.join("path").display().to_string())
        .env("GOTOOLCHAIN", "local")
        .env("GOPROXY", "off")
        .env("CGO_ENABLED", "0")
        .without_address_space_limit();
        let built = self.sandbox.run(ctx, &workspace, &build).await?;
        if built.exit_code != 0 {
            return Ok(with_build_time(built.clone(), &built));
        }

        // The Go runtime reserves more address space than it uses, so the heap is
        // bounded through GOMEMLIMIT instead of `ulimit -v`
        let run = SandboxCommand::new("./prog", run_limits(limits, timeout), timeout)
            .env("GOMEMLIMIT", limits.max_memory_bytes.to_string())
            .env("GOMAXPROCS", "2")
            .stdin(request.stdin.clone())
            .without_address_space_limit();
        let result = self.sandbox.run(ctx, &workspace, &run).await?;
        Ok(with_build_time(result, &built))
    }
}
