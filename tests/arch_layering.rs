use arch_utils::{Violation, format_report, rust_sources, use_statements};
use regex::Regex;

const CROSS_DOMAIN_ALLOWLIST: &[(&str, &str)] = &[
    ("sessions", "git"),
    ("sessions", "settings"),
    ("sessions", "terminal"),
    ("splits", "git"),
    ("splits", "sessions"),
    ("splits", "settings"),
    ("trash", "git"),
    ("trash", "sessions"),
    ("trash", "settings"),
    ("trash", "splits"),
];

/// Files allowed to spawn child processes.
const PROCESS_ADAPTERS: &[&str] = &["src/domains/terminal/tmux.rs", "src/domains/git/cli.rs"];

#[test]
fn domains_only_import_allowed_domains() {
    let domain_ref = Regex::new(r"domains::([a-z_]+)").unwrap();
    let mut violations = Vec::new();

    for (file, content) in rust_sources("src/domains") {
        let Some(source) = file.split('/').nth(2).map(|d| d.trim_end_matches(".rs")) else {
            continue;
        };
        for import in use_statements(&content) {
            for caps in domain_ref.captures_iter(&import) {
                let target = &caps[1];
                if target == source
                    || CROSS_DOMAIN_ALLOWLIST
                        .iter()
                        .any(|(src, dst)| *src == source && *dst == target)
                {
                    continue;
                }
                violations.push(Violation {
                    file: file.clone(),
                    detail: import.clone(),
                    reason: format!("{source} -> {target} is not an allowed dependency"),
                });
            }
        }
    }

    assert!(violations.is_empty(), "{}", format_report("Cross-Domain Import", &violations));
}

#[test]
fn lower_layers_never_import_services() {
    let mut violations = Vec::new();
    for dir in ["src/domains", "src/infrastructure", "src/shared"] {
        for (file, content) in rust_sources(dir) {
            for import in use_statements(&content) {
                if import.contains("crate::services") {
                    violations.push(Violation {
                        file: file.clone(),
                        detail: import,
                        reason: "services sit above every other layer".to_string(),
                    });
                }
            }
        }
    }

    assert!(violations.is_empty(), "{}", format_report("Upward Import", &violations));
}

#[test]
fn services_do_not_touch_sqlite_directly() {
    let violations: Vec<Violation> = rust_sources("src/services")
        .into_iter()
        .filter(|(_, content)| content.contains("rusqlite"))
        .map(|(file, _)| Violation {
            file,
            detail: "rusqlite".to_string(),
            reason: "storage goes through the domain db_* methods".to_string(),
        })
        .collect();

    assert!(violations.is_empty(), "{}", format_report("Database Layering", &violations));
}

#[test]
fn only_adapters_spawn_processes() {
    let mut violations = Vec::new();
    for (file, content) in rust_sources("src") {
        if PROCESS_ADAPTERS.contains(&file.as_str()) {
            continue;
        }
        for (idx, line) in content.lines().enumerate() {
            if line.contains("process::Command") || line.contains("tokio::process") {
                violations.push(Violation {
                    file: format!("{file}:{}", idx + 1),
                    detail: line.trim().to_string(),
                    reason: "child processes belong to the tmux and git adapters".to_string(),
                });
            }
        }
    }

    assert!(violations.is_empty(), "{}", format_report("Process Spawn", &violations));
}

mod arch_utils {
    use std::fmt::Write as _;
    use std::fs;
    use std::path::Path;

    use regex::Regex;
    use walkdir::WalkDir;

    pub struct Violation {
        pub file: String,
        pub detail: String,
        pub reason: String,
    }

    /// Every `.rs` file under `dir`, keyed by its manifest-relative path with
    /// forward slashes.
    pub fn rust_sources(dir: &str) -> Vec<(String, String)> {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        WalkDir::new(manifest_dir.join(dir))
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| {
                e.file_type().is_file()
                    && e.path().extension().and_then(|ext| ext.to_str()) == Some("rs")
            })
            .filter_map(|e| {
                let content = fs::read_to_string(e.path()).ok()?;
                let relative = e
                    .path()
                    .strip_prefix(manifest_dir)
                    .unwrap_or(e.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                Some((relative, content))
            })
            .collect()
    }

    /// `use crate::…;` statements flattened onto one line each.
    pub fn use_statements(content: &str) -> Vec<String> {
        let regex = Regex::new(r"(?s)use\s+crate::([^;]+);").unwrap();
        regex
            .captures_iter(content)
            .map(|caps| {
                let body = caps[1].split_whitespace().collect::<Vec<_>>().join(" ");
                format!("use crate::{body};")
            })
            .collect()
    }

    pub fn format_report(title: &str, violations: &[Violation]) -> String {
        let mut report = String::new();
        for violation in violations {
            let _ = writeln!(report, "[{title}]");
            let _ = writeln!(report, "  File: {}", violation.file);
            let _ = writeln!(report, "  Found: {}", violation.detail);
            let _ = writeln!(report, "  Reason: {}\n", violation.reason);
        }
        let _ = write!(report, "Total violations: {}", violations.len());
        report
    }
}
