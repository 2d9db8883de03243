//! Interpreter pipeline integration tests: document text → store → actions.

use assert_approx_eq::assert_approx_eq;

use sonority::dsl::{
    effective_number, Action, ActionTarget, ComponentRef, Document, InstanceStore, Interpreter,
    ParamOffsets, ParseOptions, Scope, Severity, TriggerKey, Unit, ValueKind,
};
use sonority::schema::{ComponentKind, SchemaCatalog};

fn parse(src: &str) -> Document {
    let catalog = SchemaCatalog::builtin();
    Interpreter::new(&catalog).parse(src)
}

fn parse_strict(src: &str) -> Document {
    let catalog = SchemaCatalog::builtin();
    Interpreter::new(&catalog)
        .with_options(ParseOptions { strict: true })
        .parse(src)
}

const PATCH: &str = "\
# lead patch
variable depth = 40 [0, 100]

oscillator lead
  waveform saw
  pitch 0
    modulation vibrato
  envelope amp

lfo vibrato
  rate 5
  depth depth

envelope amp
  attack 5
  release 300

key f
  pitch 0
    modulation vibrato

key g
  volume 120
";

// =============================================================================
// Forward references
// =============================================================================

#[test]
fn forward_references_resolve_after_whole_document() {
    let doc = parse(PATCH);
    assert!(doc.result.success, "{:?}", doc.result.errors);
    assert!(doc.result.warnings.is_empty(), "{:?}", doc.result.warnings);

    let lead = doc.store.get_component("lead").unwrap();
    let pitch = lead.attribute("pitch").unwrap();
    assert_eq!(pitch.value, Some(ValueKind::number(0.0)));
    assert_eq!(
        pitch.modulation,
        Some(ComponentRef::resolved("vibrato", ComponentKind::Lfo))
    );
    assert_eq!(
        lead.attribute("envelope").unwrap().value,
        Some(ValueKind::ComponentRef(ComponentRef::resolved(
            "amp",
            ComponentKind::Envelope
        )))
    );
}

#[test]
fn variable_declared_after_use_becomes_a_reference() {
    let doc = parse("oscillator lead\n  detune spread\nvariable spread = 7\n");
    assert!(doc.result.success, "{:?}", doc.result.errors);
    assert_eq!(
        doc.store
            .get_component("lead")
            .unwrap()
            .attribute("detune")
            .unwrap()
            .value,
        Some(ValueKind::VariableRef("spread".into()))
    );
}

// =============================================================================
// Reference-kind rejection
// =============================================================================

#[test]
fn compressor_cannot_modulate_pitch() {
    let src = "\
oscillator lead
  pitch 0
    modulation squash
compressor squash
  ratio 4
";
    let doc = parse(src);
    assert!(!doc.result.success);
    assert_eq!(doc.result.errors.len(), 1);
    assert_eq!(doc.result.errors[0].line, 3);
    assert!(doc.result.errors[0].message.contains("compressor"));

    let pitch = doc
        .store
        .get_component("lead")
        .unwrap()
        .attribute("pitch")
        .unwrap();
    assert_eq!(pitch.modulation, None);
    assert_eq!(pitch.value, Some(ValueKind::number(0.0)));
}

#[test]
fn component_ref_of_wrong_kind_is_left_raw() {
    let doc = parse("oscillator lead\n  envelope wobble\nlfo wobble\n");
    assert_eq!(doc.result.errors.len(), 1);
    assert_eq!(doc.result.errors[0].line, 2);
    assert_eq!(
        doc.store
            .get_component("lead")
            .unwrap()
            .attribute("envelope")
            .unwrap()
            .value,
        Some(ValueKind::Unresolved("wobble".into()))
    );
}

// =============================================================================
// Name uniqueness
// =============================================================================

#[test]
fn names_are_unique_across_scopes() {
    let src = "\
oscillator lead
  pitch 0
note c4
  lfo lead
    rate 2
  variable lead = 3
";
    let doc = parse(src);
    assert_eq!(doc.result.errors.len(), 2, "{:?}", doc.result.errors);
    assert_eq!(doc.result.errors[0].line, 4);
    assert_eq!(doc.result.errors[1].line, 6);
    assert_eq!(doc.store.component_count(), 1);
    assert_eq!(
        doc.store.get_component("lead").unwrap().kind,
        ComponentKind::Oscillator
    );
    assert!(doc.store.get_variable("lead").is_none());
}

// =============================================================================
// Idempotent re-parsing
// =============================================================================

#[test]
fn parsing_twice_yields_the_same_store() {
    let first = parse(PATCH);
    let second = parse(PATCH);
    assert_eq!(first.store, second.store);
    assert_eq!(first.result, second.result);
}

#[test]
fn reparse_into_same_store_is_not_accumulative() {
    let catalog = SchemaCatalog::builtin();
    let interpreter = Interpreter::new(&catalog);
    let mut store = InstanceStore::new();

    let first = interpreter.reparse(&mut store, PATCH);
    let snapshot = store.clone();
    let second = interpreter.reparse(&mut store, PATCH);

    assert_eq!(first, second);
    assert!(second.success);
    assert_eq!(store, snapshot);
}

// =============================================================================
// Action collection
// =============================================================================

#[test]
fn key_f_sets_pitch_then_modulates() {
    let doc = parse(PATCH);
    assert_eq!(
        doc.store.collect_actions(&TriggerKey::key("f")),
        vec![
            Action::SetValue {
                target: ActionTarget::Pitch,
                value: 0.0,
                unit: Unit::Cents,
            },
            Action::ApplyModulation {
                target: ActionTarget::Pitch,
                modulator: ComponentRef::resolved("vibrato", ComponentKind::Lfo),
            },
        ]
    );
}

#[test]
fn key_g_only_sets_volume() {
    let doc = parse(PATCH);
    assert_eq!(
        doc.store.collect_actions(&TriggerKey::key("g")),
        vec![Action::SetValue {
            target: ActionTarget::Volume,
            value: 120.0,
            unit: Unit::Percentage,
        }]
    );
}

#[test]
fn actions_fold_into_offsets() {
    let src = "\
variable shift = 700
key a
  variable shift = 1200
  pitch shift
  volume 50
";
    let doc = parse(src);
    assert!(doc.result.success, "{:?}", doc.result.errors);
    let offsets = ParamOffsets::fold(&doc.store.collect_actions(&TriggerKey::key("a")));
    assert_approx_eq!(offsets.cents, 1200.0);
    assert_approx_eq!(offsets.gain, 0.5);
    assert!(offsets.modulations.is_empty());
}

// =============================================================================
// Indentation
// =============================================================================

#[test]
fn dedent_ends_the_current_component() {
    let src = "\
note c4
  oscillator lead
    pitch 3
pitch 5
";
    let doc = parse(src);
    assert_eq!(doc.result.errors.len(), 1);
    assert_eq!(doc.result.errors[0].line, 4);
    assert_eq!(
        doc.result.errors[0].message,
        "attribute `pitch` outside any component/trigger"
    );
    let lead = doc.store.get_component("lead").unwrap();
    assert_eq!(lead.scope, Scope::Trigger(TriggerKey::note("c4")));
    assert_eq!(lead.attribute("pitch").unwrap().value, Some(ValueKind::number(3.0)));
}

#[test]
fn dedent_to_trigger_level_returns_to_trigger_attributes() {
    let src = "\
note c4
  oscillator lead
    pitch 3
  volume 90
";
    let doc = parse(src);
    assert!(doc.result.success, "{:?}", doc.result.errors);
    let lead = doc.store.get_component("lead").unwrap();
    assert!(lead.attribute("volume").is_none());
    assert_eq!(
        doc.store
            .get_trigger_attribute(&TriggerKey::note("c4"), "volume")
            .unwrap()
            .value,
        Some(ValueKind::number(90.0))
    );
}

// =============================================================================
// Old single-line modulation form
// =============================================================================

const OLD_FORM: &str = "\
oscillator lead
  pitch vibrato
lfo vibrato
  rate 4
";

#[test]
fn old_form_is_rewritten_with_a_warning() {
    let doc = parse(OLD_FORM);
    assert!(doc.result.success, "{:?}", doc.result.errors);
    assert_eq!(doc.result.warnings.len(), 1);
    assert_eq!(doc.result.warnings[0].line, 2);

    let pitch = doc
        .store
        .get_component("lead")
        .unwrap()
        .attribute("pitch")
        .unwrap();
    assert_eq!(pitch.value, Some(ValueKind::number(0.0)));
    assert_eq!(
        pitch.modulation,
        Some(ComponentRef::resolved("vibrato", ComponentKind::Lfo))
    );
}

#[test]
fn strict_mode_rejects_old_form() {
    let doc = parse_strict(OLD_FORM);
    assert!(!doc.result.success);
    assert_eq!(doc.result.errors.len(), 1);
    assert_eq!(doc.result.errors[0].line, 2);
    let pitch = doc
        .store
        .get_component("lead")
        .unwrap()
        .attribute("pitch")
        .unwrap();
    assert_eq!(pitch.modulation, None);
}

// =============================================================================
// Values and diagnostics
// =============================================================================

#[test]
fn expressions_evaluate_in_owner_scope() {
    let src = "\
variable depth = 40
lfo wobble
  depth depth * 2
key f
  variable depth = 10
  volume depth + 50
";
    let catalog = SchemaCatalog::builtin();
    let doc = Interpreter::new(&catalog).parse(src);
    assert!(doc.result.success, "{:?}", doc.result.errors);

    let wobble = doc.store.get_component("wobble").unwrap();
    let depth = wobble.attribute("depth").unwrap();
    let schema = catalog.component_attribute(ComponentKind::Lfo, "depth");
    assert_approx_eq!(
        effective_number(&doc.store, schema, depth.value.as_ref(), &wobble.scope).unwrap(),
        80.0
    );

    assert_eq!(
        doc.store.collect_actions(&TriggerKey::key("f")),
        vec![Action::SetValue {
            target: ActionTarget::Volume,
            value: 60.0,
            unit: Unit::Percentage,
        }]
    );
}

#[test]
fn variable_local_to_another_trigger_is_an_error() {
    let src = "\
key f
  variable local = 500
key g
  pitch local
";
    let doc = parse(src);
    assert!(!doc.result.success);
    assert_eq!(doc.result.errors.len(), 1);
    assert_eq!(doc.result.errors[0].line, 4);
    assert!(
        doc.result.errors[0].message.contains("`local` is not visible from `key_g`"),
        "{}",
        doc.result.errors[0].message
    );
    assert!(doc.store.collect_actions(&TriggerKey::key("g")).is_empty());
}

#[test]
fn forward_declared_global_is_visible_from_a_trigger() {
    let doc = parse("key f\n  pitch later\nvariable later = 300\n");
    assert!(doc.result.success, "{:?}", doc.result.errors);
    assert_eq!(
        doc.store.collect_actions(&TriggerKey::key("f")),
        vec![Action::SetValue {
            target: ActionTarget::Pitch,
            value: 300.0,
            unit: Unit::Cents,
        }]
    );
}

#[test]
fn broken_document_still_builds_what_it_can() {
    let src = "\
oscillator lead
  waveform wobbly
  volume 80
  modulation
theremin spooky
  pitch 1
lfo vibrato
  rate 3
";
    let doc = parse(src);
    assert!(!doc.result.success);
    let lines: Vec<usize> = doc.result.errors.iter().map(|d| d.line).collect();
    assert_eq!(lines, vec![2, 4, 5]);

    assert!(doc.store.get_component("vibrato").is_some());
    let lead = doc.store.get_component("lead").unwrap();
    assert_eq!(lead.attribute("waveform").unwrap().value, Some(ValueKind::text("sine")));
    assert_eq!(lead.attribute("volume").unwrap().value, Some(ValueKind::number(80.0)));
}

#[test]
fn diagnostics_render_with_line_and_severity() {
    let doc = parse("oscillator lead\n  volume 300\n  waveform wobbly\n");
    let rendered: Vec<String> = doc
        .result
        .diagnostics()
        .iter()
        .map(|d| d.to_string())
        .collect();
    assert_eq!(rendered.len(), 2);
    assert!(rendered[0].starts_with("line 2: warning: "));
    assert!(rendered[1].starts_with("line 3: error: "));
    assert_eq!(
        doc.result.diagnostics()[1].severity,
        Severity::Error
    );
}
