use crate::config::constants::sandbox as sandbox_defaults;
use crate::context::RequestContext;
use crate::languages::analysis::{LintRule, SyntaxProfile};
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

const COMPILER: &str = "rustc";

pub struct RustProvider {
    language: Language,
    profile: SyntaxProfile,
    sandbox: Arc<Sandbox>,
}

impl RustProvider {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self {
            language: Language {
                name: "Rust".to_string(),
                version: "2021".to_string(),
                file_extensions: strings(&[".rs"]),
                aliases: strings(&["rs"]),
                keywords: strings(&[
                    "as", "async", "await", "break", "const", "continue", "crate", "dyn",
                    "else", "enum", "extern", "fn", "for", "if", "impl", "in", "let", "loop",
                    "match", "mod", "move", "mut", "pub", "ref", "return", "self", "static",
                    "struct", "super", "trait", "type", "unsafe", "use", "where", "while",
                ]),
                standard_library_summary: "std::collections, std::io, std::fs, std::fmt, \
                    std::iter, std::sync, std::thread, std::time, std::str, std::num"
                    .to_string(),
            },
            profile: profile(),
            sandbox,
        }
    }
}

fn profile() -> SyntaxProfile {
    SyntaxProfile::new(
        "Rust",
        tree_sitter_rust::LANGUAGE.into(),
        &["function_item"],
        &[
            ("use_declaration", "argument"),
            ("extern_crate_declaration", "name"),
        ],
        has_main,
    )
    .with_lints([
        LintRule::new(
            "unwrap",
            Severity::Info,
            r"\.(unwrap|expect)\(",
            "unwrap/expect panic on failure; consider propagating with `?`",
        ),
        LintRule::new(
            "unsafe",
            Severity::Warning,
            r"\bunsafe\s*\{|\bunsafe\s+fn\b",
            "unsafe code needs a documented safety argument",
        ),
        LintRule::new(
            "panic",
            Severity::Warning,
            r"\b(panic|todo|unimplemented)!\(",
            "macro aborts the program at runtime",
        ),
    ])
}

fn has_main(_root: Node<'_>, _source: &str, functions: &[String]) -> bool {
    functions.iter().any(|name| name == "main")
}

/// Wrap statement snippets (no `fn main`) into a program
fn as_program(code: &str) -> Cow<'_, str> {
    if code.contains("fn main") {
        Cow::Borrowed(code)
    } else {
        Cow::Owned(format!("fn main() {{\n{code}\n}}\n"))
    }
}

#[async_trait]
impl LanguageProvider for RustProvider {
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
        require_toolchain(&self.language.name, COMPILER)?;

        let workspace = SandboxWorkspace::create()?;
        workspace
            .write_file("main.rs", &as_program(&request.code))
            .await?;

        let limits = self.resource_limits();
        let build = SandboxCommand::new(
            COMPILER,
            build_limits(limits),
            Duration::from_secs(sandbox_defaults::BUILD_TIMEOUT_SECS),
        )
        .args([
            "--edition",
            "2021",
            "-C",
            "debuginfo=0",
            "--color",
            "never",
            "-o",
            "prog",
            "main.rs",
        ])
        .without_address_space_limit();
        let built = self.sandbox.run(ctx, &workspace, &build).await?;
        if built.exit_code != 0 {
            return Ok(with_build_time(built.clone(), &built));
        }

        let run = SandboxCommand::new("./prog", run_limits(limits, timeout), timeout)
            .env("RUST_BACKTRACE", "0")
            .stdin(request.stdin.clone());
        let result = self.sandbox.run(ctx, &workspace, &run).await?;
        Ok(with_build_time(result, &built))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::sandbox::find_executable;

    fn provider() -> RustProvider {
        let defaults = ResourceLimits {
            max_memory_bytes: sandbox_defaults::DEFAULT_MAX_MEMORY_BYTES,
            max_cpu_seconds: sandbox_defaults::DEFAULT_MAX_CPU_SECS,
            max_processes: sandbox_defaults::DEFAULT_MAX_PROCESSES,
            max_output_bytes: sandbox_defaults::DEFAULT_MAX_OUTPUT_BYTES,
            max_file_bytes: sandbox_defaults::DEFAULT_MAX_FILE_BYTES,
            network: false,
            filesystem: false,
        };
        RustProvider::new(Arc::new(Sandbox::new(std::env::temp_dir(), false, defaults)))
    }

    #[test]
    fn snippets_get_a_main() {
        assert!(as_program("println!(\"{}\", 1);").starts_with("fn main() {\n"));
        assert!(matches!(as_program("fn main() {}"), Cow::Borrowed(_)));
    }

    #[tokio::test]
    async fn analysis_covers_uses_and_lints() {
        let ctx = RequestContext::new(Duration::from_secs(5));
        let code = concat!(
            "use std::collections::HashMap;\n\n",
            "fn main() {\n",
            "    let m: HashMap<u8, u8> = HashMap::new();\n",
            "    let v = m.get(&1).unwrap();\n",
            "    unsafe { std::hint::unreachable_unchecked() }\n",
            "}\n",
        );
        let analysis = provider().analyze(&ctx, code).await.unwrap();
        assert!(analysis.facts.syntax_ok);
        assert!(analysis.facts.has_entry_point);
        assert_eq!(analysis.facts.imports, vec!["std::collections::HashMap"]);
        let rules: Vec<&str> = analysis.findings.iter().map(|f| f.rule.as_str()).collect();
        assert_eq!(rules, vec!["unwrap", "unsafe"]);
    }

    #[tokio::test]
    async fn alias_and_extension_metadata() {
        let provider = provider();
        assert_eq!(provider.language().aliases, vec!["rs"]);
        assert_eq!(provider.language().file_extensions, vec![".rs"]);
        assert!(!provider.supports_network());
    }

    #[tokio::test]
    async fn compiles_and_runs() {
        if find_executable(COMPILER).is_none() {
            eprintln!("skipping: rustc not installed");
            return;
        }
        let ctx = RequestContext::new(Duration::from_secs(120));
        let request = ExecutionRequest {
            code: "let total: u32 = (1..=4).sum();\nprintln!(\"{total}\");".to_string(),
            language: "rust".to_string(),
            stdin: None,
            timeout_seconds: 10,
            allow_network: false,
        };
        let result = provider().execute(&ctx, &request).await.unwrap();
        assert_eq!(result.exit_code, 0, "{}", result.stderr);
        assert_eq!(result.stdout, "10\n");
    }
}
