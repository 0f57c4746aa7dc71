use modscope::config::AnalyzerConfig;
use modscope::core::{
    AnalysisError, AnalysisReport, CodebaseAnalyzer, DependencyEdge, DiagnosticKind,
    ImportCycle, SourceFile,
};
use modscope::formatters::JsonReportFormatter;
use modscope::sources::FileScanner;
use std::fs;
use std::path::{Path, PathBuf};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn analyze_dir(root: &Path, config: AnalyzerConfig) -> AnalysisReport {
    let sources = FileScanner::new(&config).collect(root).unwrap();
    CodebaseAnalyzer::new(config).analyze(root, sources).unwrap()
}

fn analyze_sources(files: &[(&str, &str)]) -> AnalysisReport {
    let sources = files
        .iter()
        .map(|(path, text)| SourceFile::new(*path, *text))
        .collect();
    CodebaseAnalyzer::new(AnalyzerConfig::default())
        .analyze(Path::new("proj"), sources)
        .unwrap()
}

fn namespace_config() -> AnalyzerConfig {
    AnalyzerConfig {
        namespace_packages: true,
        ..AnalyzerConfig::default()
    }
}

#[test]
fn analyzer_end_to_end_on_python_project_fixture() {
    let report = analyze_dir(&fixture("python-project"), AnalyzerConfig::default());

    let ids: Vec<&str> = report.modules.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["async_functions", "classes", "decorators", "main", "relative_imports"]
    );
    // utils/ has no package marker
    assert_eq!(report.unimportable, vec!["utils/helpers.py"]);
    assert!(report.packages.is_empty());

    assert_eq!(
        report.import_edges(),
        vec![("main", "relative_imports"), ("relative_imports", "main")]
    );
    assert_eq!(
        report.cycles,
        vec![ImportCycle {
            modules: vec!["main".to_string(), "relative_imports".to_string()]
        }]
    );

    let extends: Vec<String> = report
        .edges
        .iter()
        .filter_map(|edge| match edge {
            DependencyEdge::Extends { from, to } => Some(format!("{from} -> {to}")),
            DependencyEdge::Imports { .. } => None,
        })
        .collect();
    assert_eq!(extends, vec!["classes.Dog -> classes.Animal"]);

    let escapes = report.diagnostics_of_kind(DiagnosticKind::RelativeEscapesRoot);
    assert_eq!(escapes.len(), 1);
    assert_eq!(escapes[0].module, "relative_imports");
    assert_eq!(escapes[0].line, Some(5));

    let relative = report.diagnostics_of_kind(DiagnosticKind::UnresolvedRelative);
    assert_eq!(relative.len(), 2);
    assert!(relative.iter().all(|d| d.module == "relative_imports"));

    // stdlib and the invisible utils package
    let absolute = report.diagnostics_of_kind(DiagnosticKind::UnresolvedAbsolute);
    let absolute_modules: Vec<&str> = absolute.iter().map(|d| d.module.as_str()).collect();
    assert_eq!(
        absolute_modules,
        vec!["async_functions", "classes", "decorators", "main", "main", "main"]
    );
    assert_eq!(report.diagnostics.len(), 9);
}

#[test]
fn analyzer_end_to_end_on_integration_fixture() {
    let report = analyze_dir(&fixture("python-integration"), namespace_config());

    assert_eq!(
        report.import_edges(),
        vec![
            ("app", "services.processor"),
            ("app", "utils.database"),
            ("app", "utils.helpers"),
            ("services.processor", "utils.helpers"),
            ("utils", "utils.database"),
            ("utils", "utils.helpers"),
            ("utils.database", "utils.helpers"),
        ]
    );
    assert!(report.cycles.is_empty());
    assert!(report.unimportable.is_empty());

    let utils = report.package("utils").unwrap();
    assert_eq!(utils.marker.as_deref(), Some("utils"));
    assert_eq!(utils.children, vec!["utils.database", "utils.helpers"]);
    assert_eq!(
        utils.exports,
        Some(vec![
            "connect_db".to_string(),
            "query_data".to_string(),
            "format_result".to_string()
        ])
    );
    assert_eq!(utils.reexports.len(), 3);

    let services = report.package("services").unwrap();
    assert_eq!(services.marker, None);
    assert!(services.reexports.is_empty());

    // only the two `import json` statements fail
    assert_eq!(report.diagnostics.len(), 2);
    assert!(report
        .diagnostics
        .iter()
        .all(|d| d.kind == DiagnosticKind::UnresolvedAbsolute));

    let processor = report.module("services.processor").unwrap();
    assert_eq!(processor.declarations.len(), 5);
}

#[test]
fn strict_mode_hides_unmarked_service_directory() {
    let report = analyze_dir(&fixture("python-integration"), AnalyzerConfig::default());

    assert_eq!(report.unimportable, vec!["services/processor.py"]);
    assert_eq!(report.import_edges().len(), 5);
    assert!(report
        .diagnostics_of_kind(DiagnosticKind::UnresolvedAbsolute)
        .iter()
        .any(|d| d.module == "app" && d.detail.contains("services.processor")));
}

#[test]
fn two_package_scenario_has_two_edges_and_no_cycles() {
    let report = analyze_sources(&[
        (
            "app.py",
            "from services.processor import DataProcessor\n\nprocessor = DataProcessor()\n",
        ),
        ("services/__init__.py", ""),
        (
            "services/processor.py",
            "from ..utils.helpers import parse_json\n\nclass DataProcessor:\n    pass\n",
        ),
        ("utils/__init__.py", ""),
        ("utils/helpers.py", "def parse_json(text):\n    return text\n"),
    ]);

    assert_eq!(
        report.import_edges(),
        vec![
            ("app", "services.processor"),
            ("services.processor", "utils.helpers")
        ]
    );
    assert!(report.cycles.is_empty());
    assert!(report.diagnostics.is_empty());
}

#[test]
fn import_cycle_is_independent_of_source_order() {
    let files = [
        ("a.py", "import b\n"),
        ("b.py", "import c\n"),
        ("c.py", "import a\n"),
    ];
    let expected = vec![ImportCycle {
        modules: vec!["a".to_string(), "b".to_string(), "c".to_string()],
    }];

    let forward = analyze_sources(&files);
    let mut reversed_files = files;
    reversed_files.reverse();
    let reversed = analyze_sources(&reversed_files);

    assert_eq!(forward.cycles, expected);
    assert_eq!(reversed.cycles, expected);
}

#[test]
fn repeated_runs_produce_identical_reports() {
    let root = fixture("python-integration");
    let config = namespace_config();
    let formatter = JsonReportFormatter::new();

    let analyzer = CodebaseAnalyzer::new(config.clone());
    let sources = FileScanner::new(&config).collect(&root).unwrap();
    let first = formatter
        .format(&analyzer.analyze(&root, sources.clone()).unwrap())
        .unwrap();
    // second run is served from the parse cache
    let second = formatter
        .format(&analyzer.analyze(&root, sources.clone()).unwrap())
        .unwrap();
    let fresh = formatter
        .format(&CodebaseAnalyzer::new(config).analyze(&root, sources).unwrap())
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first, fresh);
    assert!(analyzer.parse_cache().stats().memory_entries > 0);
}

#[test]
fn duplicate_module_is_excluded_but_analysis_continues() {
    let report = analyze_sources(&[
        ("pkg/__init__.py", ""),
        ("pkg/helpers.py", "def a():\n    pass\n"),
        ("pkg/helpers.pyi", "def a() -> None: ...\n"),
        ("app.py", "import pkg.helpers\nimport pkg\n"),
    ]);

    assert!(report.module("pkg.helpers").is_none());
    assert_eq!(
        report.diagnostics_of_kind(DiagnosticKind::DuplicateModuleId).len(),
        1
    );
    assert_eq!(report.import_edges(), vec![("app", "pkg")]);
}

#[test]
fn package_with_duplicate_marker_is_not_importable() {
    let report = analyze_sources(&[
        ("pkg/__init__.py", ""),
        ("Pkg.py", ""),
        ("pkg/x.py", "VALUE = 1\n"),
        ("app.py", "import pkg.x\n"),
    ]);

    assert!(report.packages.is_empty());
    assert_eq!(report.unimportable, vec!["pkg/x.py"]);
    assert!(report.import_edges().is_empty());

    let unresolved = report.diagnostics_of_kind(DiagnosticKind::UnresolvedAbsolute);
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].module, "app");
}

#[test]
fn malformed_import_leaves_the_rest_of_the_module_intact() {
    let report = analyze_sources(&[(
        "broken.py",
        "import os\nimport\n\nclass Kept:\n    pass\n",
    )]);

    let kinds: Vec<DiagnosticKind> = report.diagnostics.iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![DiagnosticKind::MalformedImport, DiagnosticKind::UnresolvedAbsolute]
    );
    assert_eq!(report.diagnostics[0].line, Some(2));
    assert!(report.diagnostics[1].detail.contains("os"));
    assert!(report.declaration("broken", "Kept").is_some());
    assert_eq!(report.declaration_count(), 1);
}

#[test]
fn unreadable_source_is_fatal() {
    let err = CodebaseAnalyzer::new(AnalyzerConfig::default())
        .analyze(
            Path::new("proj"),
            vec![
                SourceFile::new("ok.py", "import missing\n"),
                SourceFile::unreadable("gone.py"),
            ],
        )
        .unwrap_err();

    assert!(matches!(err, AnalysisError::MissingSource { .. }));
    assert!(err.to_string().contains("gone.py"));
}

#[test]
fn analyzer_discovers_config_in_root() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("services")).unwrap();
    fs::write(root.join(".modscope.toml"), "namespace_packages = true\n").unwrap();
    fs::write(root.join("app.py"), "import services.worker\n").unwrap();
    fs::write(root.join("services/worker.py"), "").unwrap();

    let analyzer = CodebaseAnalyzer::discover(root).unwrap();
    assert!(analyzer.config().namespace_packages);

    let sources = FileScanner::new(analyzer.config()).collect(root).unwrap();
    let report = analyzer.analyze(root, sources).unwrap();
    assert_eq!(report.import_edges(), vec![("app", "services.worker")]);
}

#[test]
fn invalid_config_in_root_is_an_error() {
    let dir = tempfile::TempDir::new().unwrap();
    fs::write(dir.path().join(".modscope.toml"), "namespace_packages = [\n").unwrap();

    assert!(matches!(
        CodebaseAnalyzer::discover(dir.path()),
        Err(AnalysisError::Config(_))
    ));
}
