//! Minimal CLI: fix | validate | reorganize
use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};

use crate::ast;
use crate::fixer::{FixOptions, Fixer};
use crate::parser;
use crate::reorganize;
use crate::report;
use crate::value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// repair malformed Kubernetes YAML manifests and report every change
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// repair manifests and print the fixed YAML (or a change report)
    Fix(FixArgs),
    /// check manifests without changing them; nonzero exit when invalid
    Validate(ValidateArgs),
    /// move misplaced fields to their schema paths, no other repairs
    Reorganize(ReorganizeArgs),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more inputs. May be literal paths or quoted glob patterns or '-' for stdin
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug)]
struct FixArgs {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output file (stdout if omitted; only with a single input)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// rewrite each input file with its repaired content
    #[arg(long, conflicts_with = "out")]
    in_place: bool,

    /// print the full result as JSON instead of YAML
    #[arg(long)]
    json: bool,

    /// print a line diff instead of the fixed content
    #[arg(long, conflicts_with = "json")]
    diff: bool,

    /// print the change report to stderr after the content
    #[arg(long)]
    report: bool,

    /// changes below this confidence are demoted to warnings
    #[arg(long, default_value_t = 0.7)]
    threshold: f64,

    /// apply coercions even below the confidence threshold
    #[arg(long)]
    aggressive: bool,

    /// strict-error patch iterations
    #[arg(long, default_value_t = 3)]
    max_iterations: usize,

    /// output indentation width
    #[arg(long, default_value_t = 2)]
    indent: usize,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    #[command(flatten)]
    input_settings: InputSettings,

    /// print findings as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ReorganizeArgs {
    #[command(flatten)]
    input_settings: InputSettings,

    /// print the change list as JSON instead of the reorganized YAML
    #[arg(long)]
    json: bool,

    /// output indentation width
    #[arg(long, default_value_t = 2)]
    indent: usize,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

struct Source {
    name: String,
    content: String,
}

impl InputSettings {
    fn load(&self) -> anyhow::Result<Vec<Source>> {
        let mut sources = Vec::new();
        for pattern in &self.input {
            if pattern == "-" {
                let mut content = String::new();
                std::io::stdin()
                    .read_to_string(&mut content)
                    .context("failed to read stdin")?;
                sources.push(Source {
                    name: "<stdin>".to_string(),
                    content,
                });
                continue;
            }
            for path in resolve_file_path_patterns(std::slice::from_ref(pattern))? {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                sources.push(Source {
                    name: path.to_string_lossy().to_string(),
                    content,
                });
            }
        }
        Ok(sources)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Fix(args) => run_fix(args),
            Command::Validate(args) => run_validate(args),
            Command::Reorganize(args) => run_reorganize(args),
        }
    }
}

fn run_fix(args: &FixArgs) -> anyhow::Result<()> {
    let sources = args.input_settings.load()?;
    if args.out.is_some() && sources.len() > 1 {
        bail!("--out only works with a single input, got {}", sources.len());
    }

    let fixer = Fixer::new(FixOptions {
        confidence_threshold: args.threshold,
        aggressive: args.aggressive,
        max_iterations: args.max_iterations,
        indent_size: args.indent,
    });

    for source in &sources {
        let result = fixer.fix(&source.content);

        if args.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else if args.diff {
            print!("{}", report::render_diff(&source.content, &result.content));
        } else if args.in_place {
            std::fs::write(&source.name, &result.content)
                .with_context(|| format!("failed to write {}", source.name))?;
            eprintln!(
                "{}: {} change(s), confidence {:.2}",
                source.name,
                result.changes.len(),
                result.confidence
            );
        } else if let Some(out) = &args.out {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(out, &result.content)
                .with_context(|| format!("failed to write {}", out.display()))?;
        } else {
            print!("{}", result.content);
        }

        if args.report {
            eprint!("{}", report::render_text(&source.name, &result));
        }
    }
    Ok(())
}

fn run_validate(args: &ValidateArgs) -> anyhow::Result<()> {
    let sources = args.input_settings.load()?;
    let mut invalid = 0usize;

    for source in &sources {
        let (root, strict) = parser::build_with_errors(&source.content);
        let analysis = ast::analyze(&root);
        let ok = strict.is_empty() && analysis.broken_count == 0 && analysis.structure_valid;
        if !ok {
            invalid += 1;
        }

        if args.json {
            let findings = serde_json::json!({
                "source": source.name,
                "valid": ok,
                "strict_errors": strict.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
                "diagnostics": analysis.diagnostics,
                "kind": analysis.detected_kind,
                "apiVersion": analysis.detected_api_version,
            });
            println!("{}", serde_json::to_string_pretty(&findings)?);
        } else {
            println!("{}: {}", source.name, if ok { "valid" } else { "invalid" });
            for error in &strict {
                println!("  {error}");
            }
            for diag in &analysis.diagnostics {
                println!("  line {}: {}", diag.line, diag.message);
            }
        }
    }

    if invalid > 0 {
        bail!("{invalid} of {} input(s) invalid", sources.len());
    }
    Ok(())
}

fn run_reorganize(args: &ReorganizeArgs) -> anyhow::Result<()> {
    let sources = args.input_settings.load()?;

    for source in &sources {
        let (root, strict) = parser::build_with_errors(&source.content);
        if !strict.is_empty() {
            bail!(
                "{}: cannot reorganize, input does not parse cleanly ({})",
                source.name,
                strict[0]
            );
        }

        let mut rendered = Vec::new();
        let mut all_changes = Vec::new();
        for &doc in &root.documents {
            let Some(document) = value::from_ast(&root, doc) else {
                continue;
            };
            let out = reorganize::reorganize(document);
            all_changes.extend(out.changes);
            rendered.push(value::to_yaml(&out.document, args.indent));
        }

        if args.json {
            println!("{}", serde_json::to_string_pretty(&all_changes)?);
        } else if rendered.len() == 1 {
            print!("{}", rendered[0]);
        } else {
            print!("{}", rendered.join("---\n"));
        }
    }
    Ok(())
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in
                glob::glob(pattern).with_context(|| format!("bad glob pattern: {pattern}"))?
            {
                let path = entry.with_context(|| format!("glob failure in {pattern}"))?;
                if path.is_file() {
                    out.push(path);
                    matched_any = true;
                }
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            let path = PathBuf::from(pattern);
            if !path.is_file() {
                bail!("no such file: {pattern}");
            }
            out.push(path);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_literal_path_is_an_error() {
        let err = resolve_file_path_patterns(["definitely-missing.yaml"]).unwrap_err();
        assert!(err.to_string().contains("no such file"));
    }

    #[test]
    fn cli_parses_fix_with_options() {
        let cli = CommandLineInterface::try_parse_from([
            "yamlfix",
            "fix",
            "-i",
            "a.yaml",
            "--threshold",
            "0.8",
            "--aggressive",
            "--json",
        ])
        .expect("parses");
        match cli.cmd {
            Command::Fix(args) => {
                assert_eq!(args.input_settings.input, vec!["a.yaml"]);
                assert!(args.aggressive);
                assert!(args.json);
                assert!((args.threshold - 0.8).abs() < 1e-9);
            }
            other => panic!("expected fix, got {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_out_together_with_in_place() {
        let err = CommandLineInterface::try_parse_from([
            "yamlfix", "fix", "-i", "a.yaml", "--out", "b.yaml", "--in-place",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("cannot be used with"));
    }
}
