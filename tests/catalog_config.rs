//! Catalog and config integration tests: YAML files on disk.

use std::fs;

use sonority::config::{Config, ConfigError};
use sonority::dsl::{Interpreter, ParseOptions, TriggerKey, ValueKind};
use sonority::schema::{ComponentKind, SchemaCatalog, SchemaError, ValueType};

const SMALL_CATALOG: &str = r#"
components:
  oscillator:
    role: source
    attributes:
      pitch:
        type: number
        min: -1200
        max: 1200
        default: 0
        accepts_modulation: [lfo]
      label:
        type: string
  lfo:
    role: modulator
    attributes:
      rate:
        type: frequency
        min: 0.1
        max: 20
        default: 2
triggers:
  master:
    requires_name: false
    has_attributes: false
"#;

#[test]
fn catalog_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.yaml");
    fs::write(&path, SMALL_CATALOG).unwrap();

    let catalog = SchemaCatalog::load(&path).unwrap();
    assert_eq!(catalog.components.len(), 2);
    let label = catalog
        .component_attribute(ComponentKind::Oscillator, "label")
        .unwrap();
    assert_eq!(label.value_type, ValueType::String);
}

#[test]
fn missing_catalog_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = SchemaCatalog::load(&dir.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, SchemaError::Io(_)));
}

#[test]
fn catalog_without_components_is_rejected() {
    let err = SchemaCatalog::from_yaml("components: {}\n").unwrap_err();
    assert!(matches!(err, SchemaError::Empty));
}

#[test]
fn custom_catalog_drives_the_interpreter() {
    let catalog = SchemaCatalog::from_yaml(SMALL_CATALOG).unwrap();
    let src = "\
oscillator lead
  pitch 5000
  label hello world
envelope amp
master
  volume 90
";
    let doc = Interpreter::new(&catalog).parse(src);

    // `envelope` is not in this catalog; master takes no attributes here.
    let lines: Vec<usize> = doc.result.errors.iter().map(|d| d.line).collect();
    assert_eq!(lines, vec![4, 6], "{:?}", doc.result.errors);
    assert_eq!(doc.result.warnings.len(), 1);

    let lead = doc.store.get_component("lead").unwrap();
    assert_eq!(lead.attribute("pitch").unwrap().value, Some(ValueKind::number(1200.0)));
    assert_eq!(
        lead.attribute("label").unwrap().value,
        Some(ValueKind::text("hello world"))
    );
    assert!(doc
        .store
        .get_trigger_attributes(&TriggerKey::master())
        .is_empty());
}

#[test]
fn unknown_word_on_string_attribute_is_kept_as_text() {
    let catalog = SchemaCatalog::from_yaml(SMALL_CATALOG).unwrap();
    let doc = Interpreter::new(&catalog)
        .with_options(ParseOptions { strict: true })
        .parse("oscillator lead\n  label bright\n");
    assert!(doc.result.success, "{:?}", doc.result.errors);
    assert_eq!(
        doc.store
            .get_component("lead")
            .unwrap()
            .attribute("label")
            .unwrap()
            .value,
        Some(ValueKind::text("bright"))
    );
}

#[test]
fn chord_attribute_accepts_table_values() {
    let catalog = SchemaCatalog::builtin();
    let doc = Interpreter::new(&catalog).parse("oscillator pad\n  chord maj7\n  chord_x 1\n");
    assert!(doc.result.success, "{:?}", doc.result.errors);
    assert_eq!(
        doc.store
            .get_component("pad")
            .unwrap()
            .attribute("chord")
            .unwrap()
            .value,
        Some(ValueKind::text("maj7"))
    );

    let doc = Interpreter::new(&catalog).parse("oscillator pad\n  chord mystery\n");
    assert_eq!(doc.result.errors.len(), 1);
    assert_eq!(
        doc.store
            .get_component("pad")
            .unwrap()
            .attribute("chord")
            .unwrap()
            .value,
        Some(ValueKind::text("single"))
    );
}

#[test]
fn config_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(
        &path,
        "catalog: /opt/patches/catalog.yaml\nstrict: true\nlog_level: info\n",
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert!(config.strict);
    assert_eq!(
        config.catalog.as_deref(),
        Some(std::path::Path::new("/opt/patches/catalog.yaml"))
    );
    assert_eq!(config.level_filter(), log::LevelFilter::Info);
}

#[test]
fn config_errors_name_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.yaml");
    assert!(matches!(
        Config::load_from(&missing),
        Err(ConfigError::Io { .. })
    ));

    let broken = dir.path().join("broken.yaml");
    fs::write(&broken, "strict: [not, a, bool]\n").unwrap();
    let err = Config::load_from(&broken).unwrap_err();
    assert!(matches!(err, ConfigError::Yaml { .. }));
    assert!(err.to_string().contains("broken.yaml"));
}
