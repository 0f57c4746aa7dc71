use indoc::indoc;
use modscope::config::{AnalyzerConfig, ConfigError, MarkerConfig, CONFIG_FILE_NAME};
use modscope::core::StructuralMarker;
use std::fs;
use std::path::PathBuf;

#[test]
fn defaults_describe_a_standard_python_tree() {
    let config = AnalyzerConfig::default();

    assert_eq!(config.extensions, vec!["py", "pyi"]);
    assert_eq!(config.package_marker, "__init__");
    assert!(!config.namespace_packages);
    assert!(config.skip_dirs.iter().any(|d| d == "__pycache__"));
    assert!(config.cache_dir.is_none());
    assert!(config.accepts_extension("pyi"));
    assert!(!config.accepts_extension("rs"));
}

#[test]
fn partial_toml_keeps_remaining_defaults() {
    let config = AnalyzerConfig::from_toml(indoc! {r#"
        namespace_packages = true
        cache_dir = ".modscope-cache"

        [markers]
        static_method = ["staticmethod", "pure"]
    "#})
    .unwrap();

    assert!(config.namespace_packages);
    assert_eq!(config.cache_dir, Some(PathBuf::from(".modscope-cache")));
    assert_eq!(config.extensions, vec!["py", "pyi"]);
    assert_eq!(config.markers.static_method, vec!["staticmethod", "pure"]);
    assert_eq!(config.markers.class_method, vec!["classmethod"]);
}

#[test]
fn empty_file_is_the_default_config() {
    assert_eq!(
        AnalyzerConfig::from_toml("").unwrap(),
        AnalyzerConfig::default()
    );
}

#[test]
fn load_reports_the_offending_path() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    fs::write(&path, "extensions = 3\n").unwrap();

    let err = AnalyzerConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains(CONFIG_FILE_NAME));

    let missing = AnalyzerConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(missing, ConfigError::Read { .. }));
}

#[test]
fn discover_falls_back_to_defaults() {
    let dir = tempfile::TempDir::new().unwrap();
    assert_eq!(
        AnalyzerConfig::discover(dir.path()).unwrap(),
        AnalyzerConfig::default()
    );

    fs::write(dir.path().join(CONFIG_FILE_NAME), "package_marker = \"__pkg__\"\n").unwrap();
    assert_eq!(
        AnalyzerConfig::discover(dir.path()).unwrap().package_marker,
        "__pkg__"
    );
}

#[test]
fn marker_names_are_recognized() {
    let markers = MarkerConfig::default();

    assert_eq!(
        markers.recognize("staticmethod"),
        Some(StructuralMarker::StaticMethod)
    );
    assert_eq!(
        markers.recognize("classmethod"),
        Some(StructuralMarker::ClassMethod)
    );
    assert_eq!(
        markers.recognize("functools.cached_property"),
        Some(StructuralMarker::Property)
    );
    assert_eq!(
        markers.recognize("value.setter"),
        Some(StructuralMarker::Property)
    );
    assert_eq!(
        markers.recognize("value.deleter"),
        Some(StructuralMarker::Property)
    );
    assert_eq!(markers.recognize("wraps"), None);
    assert_eq!(markers.recognize("my_decorator"), None);
}
