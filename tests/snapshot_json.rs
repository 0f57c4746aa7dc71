use indoc::indoc;
use modscope::config::AnalyzerConfig;
use modscope::core::{CodebaseAnalyzer, SourceFile};
use modscope::formatters::JsonReportFormatter;
use serde_json::{json, Value};
use std::path::Path;

fn small_tree() -> Vec<SourceFile> {
    vec![
        SourceFile::new("pkg/__init__.py", ""),
        SourceFile::new("pkg/base.py", "class Base:\n    pass\n"),
        SourceFile::new(
            "app.py",
            indoc! {r#"
                from pkg.base import Base

                class App(Base):
                    """App."""

                    @staticmethod
                    def run():
                        pass
            "#},
        ),
    ]
}

#[test]
fn json_report_snapshot_small_tree() {
    let report = CodebaseAnalyzer::new(AnalyzerConfig::default())
        .analyze(Path::new("proj"), small_tree())
        .unwrap();

    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("out/report.json");
    JsonReportFormatter::new()
        .format_to_file(&report, &path)
        .unwrap();
    let s = std::fs::read_to_string(&path).unwrap();
    let v: Value = serde_json::from_str(&s).unwrap();

    let base_ref = json!({"module": "pkg.base", "index": 0, "name": "Base"});
    let app_ref = json!({"module": "app", "index": 0, "name": "App"});

    let expected = json!({
        "root": "proj",
        "modules": [
            {
                "id": "app",
                "path": "app.py",
                "is_package": false,
                "declarations": [
                    {
                        "index": 0,
                        "name": "App",
                        "qualified_name": "App",
                        "kind": "class",
                        "decorators": [],
                        "markers": [],
                        "is_async": false,
                        "enclosing": null,
                        "bases": ["Base"],
                        "line": 3,
                        "docstring": "App.",
                        "classification": {
                            "role": "plain_class",
                            "is_async": false,
                            "outermost_decorator": null,
                            "application_order": [],
                            "base_chain": [base_ref.clone()]
                        }
                    },
                    {
                        "index": 1,
                        "name": "run",
                        "qualified_name": "App.run",
                        "kind": "method",
                        "decorators": ["staticmethod"],
                        "markers": ["static_method"],
                        "is_async": false,
                        "enclosing": 0,
                        "bases": [],
                        "line": 7,
                        "docstring": null,
                        "classification": {
                            "role": "static_method",
                            "is_async": false,
                            "outermost_decorator": "staticmethod",
                            "application_order": ["staticmethod"]
                        }
                    }
                ],
                "imports": [
                    {
                        "reference": {
                            "source": "app",
                            "path": "pkg.base",
                            "dots": 0,
                            "alias": null,
                            "symbol": "Base",
                            "line": 1
                        },
                        "outcome": {
                            "status": "resolved",
                            "target": "pkg.base",
                            "interpretation": "symbol",
                            "symbols": ["Base"],
                            "shadows_symbol": false
                        }
                    }
                ]
            },
            {
                "id": "pkg",
                "path": "pkg/__init__.py",
                "is_package": true,
                "declarations": [],
                "imports": []
            },
            {
                "id": "pkg.base",
                "path": "pkg/base.py",
                "is_package": false,
                "declarations": [
                    {
                        "index": 0,
                        "name": "Base",
                        "qualified_name": "Base",
                        "kind": "class",
                        "decorators": [],
                        "markers": [],
                        "is_async": false,
                        "enclosing": null,
                        "bases": [],
                        "line": 1,
                        "docstring": null,
                        "classification": {
                            "role": "plain_class",
                            "is_async": false,
                            "outermost_decorator": null,
                            "application_order": []
                        }
                    }
                ],
                "imports": []
            }
        ],
        "packages": [
            {"id": "pkg", "marker": "pkg", "children": ["pkg.base"], "reexports": []}
        ],
        "unimportable": [],
        "edges": [
            {"kind": "imports", "from": "app", "to": "pkg.base", "self_import": false},
            {"kind": "extends", "from": app_ref, "to": base_ref}
        ],
        "cycles": [],
        "diagnostics": []
    });
    assert_eq!(v, expected);
}

#[test]
fn json_report_failures_and_cycles_snapshot() {
    let report = CodebaseAnalyzer::new(AnalyzerConfig::default())
        .analyze(
            Path::new("proj"),
            vec![
                SourceFile::new("a.py", "import b\nfrom .. import up\n"),
                SourceFile::new("b.py", "import a\n"),
            ],
        )
        .unwrap();
    let v = serde_json::to_value(&report).unwrap();

    assert_eq!(v["cycles"], json!([{"modules": ["a", "b"]}]));
    assert_eq!(
        v["modules"][0]["imports"][1]["outcome"],
        json!({
            "status": "failed",
            "failure": {"kind": "relative_escapes_root", "dots": 2, "package": ""}
        })
    );
    assert_eq!(
        v["diagnostics"],
        json!([{
            "kind": "RelativeEscapesRoot",
            "module": "a",
            "declaration": null,
            "line": 2,
            "detail": "`from .. import up`: 2 leading dots climb above the analysis root from package ``"
        }])
    );
}

#[test]
fn compact_and_pretty_output_hold_the_same_report() {
    let report = CodebaseAnalyzer::new(AnalyzerConfig::default())
        .analyze(Path::new("proj"), small_tree())
        .unwrap();

    let pretty = JsonReportFormatter::new().format(&report).unwrap();
    let compact = JsonReportFormatter::compact().format(&report).unwrap();

    assert!(pretty.lines().count() > 1);
    assert_eq!(compact.lines().count(), 1);
    let pretty_value: Value = serde_json::from_str(&pretty).unwrap();
    let compact_value: Value = serde_json::from_str(&compact).unwrap();
    assert_eq!(pretty_value, compact_value);
}
