use oca_core::{
    Attribute, AttributeType, Bundle, Command, Conformance, Language, ObjectKind, OcaAst, OcaBox,
    OverlayKind, ScalarType, Standard, Translations, AST_VERSION,
};
use serde_json::json;

fn lang(code: &str) -> Language {
    Language::parse(code).expect("test language should parse")
}

fn rich_bundle() -> Bundle {
    let mut oca_box = OcaBox::new();
    oca_box.add_classification("GICS:35102020").unwrap();
    oca_box
        .add_meta(
            "name",
            Translations::from([
                (lang("pol"), "Formularz".to_string()),
                (lang("eng"), "Form".to_string()),
            ]),
        )
        .unwrap();
    oca_box
        .add_attribute(
            Attribute::new("kind", AttributeType::Scalar(ScalarType::Text))
                .flagged()
                .with_entry("x", lang("eng"), "X")
                .with_label(lang("eng"), "Kind")
                .with_information(lang("eng"), "Kind of thing")
                .with_standard(Standard::parse("urn:iso:std:iso:5218").unwrap()),
        )
        .unwrap();
    oca_box
        .add_attribute(
            Attribute::new(
                "amounts",
                AttributeType::array(AttributeType::Scalar(ScalarType::Numeric)),
            )
            .with_format("^[0-9]+$")
            .with_unit("kg")
            .with_condition("${kind} == 'x'"),
        )
        .unwrap();
    oca_box.generate_bundle().unwrap()
}

#[test]
fn commands_follow_fixed_kind_order() {
    let ast = OcaAst::from_bundle(&rich_bundle());
    let kinds: Vec<&str> = ast
        .commands
        .iter()
        .map(|command| command.object_kind().name())
        .collect();

    assert_eq!(ast.version, AST_VERSION);
    assert_eq!(
        kinds,
        vec![
            "CaptureBase",
            "Meta",
            "Meta",
            "CharacterEncoding",
            "EntryCode",
            "Entry",
            "Label",
            "Information",
            "Format",
            "Unit",
            "Standard",
            "Conditional",
        ]
    );
}

#[test]
fn language_commands_keep_first_encountered_order() {
    let ast = OcaAst::from_bundle(&rich_bundle());
    let meta_languages: Vec<String> = ast
        .commands
        .iter()
        .filter_map(|command| match command {
            Command::Overlay(content) if content.kind() == OverlayKind::Meta => {
                content.language().map(|l| l.to_string())
            }
            _ => None,
        })
        .collect();
    assert_eq!(meta_languages, vec!["pol", "eng"]);
}

#[test]
fn absent_kinds_are_skipped() {
    let mut oca_box = OcaBox::new();
    oca_box
        .add_attribute(Attribute::new("a", AttributeType::Scalar(ScalarType::Text)))
        .unwrap();
    let ast = OcaAst::from_bundle(&oca_box.generate_bundle().unwrap());

    let kinds: Vec<ObjectKind> = ast.commands.iter().map(Command::object_kind).collect();
    assert_eq!(
        kinds,
        vec![
            ObjectKind::CaptureBase,
            ObjectKind::Overlay(OverlayKind::CharacterEncoding)
        ]
    );
}

#[test]
fn export_is_stable_across_calls() {
    let bundle = rich_bundle();
    let first = OcaAst::from_bundle(&bundle).to_value().unwrap();
    let second = OcaAst::from_bundle(&bundle).to_value().unwrap();
    assert_eq!(first, second);
}

#[test]
fn exported_commands_carry_payload_only() {
    let value = OcaAst::from_bundle(&rich_bundle()).to_value().unwrap();

    assert_eq!(value["version"], "1.0.0");
    let capture_base = &value["commands"][0];
    assert_eq!(capture_base["object_kind"], "CaptureBase");
    assert_eq!(capture_base["attributes"]["amounts"], json!(["Numeric"]));
    assert_eq!(capture_base["flagged_attributes"], json!(["kind"]));
    assert!(capture_base.get("d").is_none());

    for command in value["commands"].as_array().unwrap() {
        assert!(command.get("capture_base").is_none());
        assert!(command.get("type").is_none());
    }
}

#[test]
fn replay_reproduces_bundle_digests() {
    let bundle = rich_bundle();
    let ast = OcaAst::from_bundle(&bundle);
    let replayed = ast.replay().unwrap();

    assert_eq!(replayed.d, bundle.d);
    assert_eq!(replayed, bundle);
}

#[test]
fn replay_after_value_round_trip_yields_equal_overlays() {
    let bundle = rich_bundle();
    let value = OcaAst::from_bundle(&bundle).to_value().unwrap();
    let ast = OcaAst::from_value(&value).unwrap();
    let replayed = ast.replay().unwrap();

    let original: Vec<_> = bundle.overlays.iter().map(|o| &o.content).collect();
    let rebuilt: Vec<_> = replayed.overlays.iter().map(|o| &o.content).collect();
    assert_eq!(original, rebuilt);
    assert_eq!(replayed.capture_base, bundle.capture_base);
}

#[test]
fn serde_uses_the_same_shape() {
    let ast = OcaAst::from_bundle(&rich_bundle());
    let via_serde = serde_json::to_value(&ast).unwrap();
    assert_eq!(via_serde, ast.to_value().unwrap());
    let decoded: OcaAst = serde_json::from_value(via_serde).unwrap();
    assert_eq!(decoded, ast);
}

#[test]
fn unknown_object_kind_is_rejected() {
    let err = OcaAst::from_value(&json!({
        "version": "1.0.0",
        "commands": [{"object_kind": "Link"}]
    }))
    .unwrap_err();
    assert!(err.to_string().contains("Link"));
}

#[test]
fn cardinality_and_conformance_follow_conditional() {
    let mut oca_box = OcaBox::new();
    oca_box
        .add_attribute(Attribute::new("a", AttributeType::Scalar(ScalarType::Text)))
        .unwrap();
    oca_box
        .add_attribute(
            Attribute::new("b", AttributeType::Scalar(ScalarType::Numeric))
                .with_condition("${a} == 'x'")
                .with_cardinality("1-3")
                .with_conformance(Conformance::Mandatory),
        )
        .unwrap();
    let bundle = oca_box.generate_bundle().unwrap();
    let ast = OcaAst::from_bundle(&bundle);
    let kinds: Vec<&str> = ast
        .commands
        .iter()
        .map(|command| command.object_kind().name())
        .collect();

    assert_eq!(
        kinds,
        vec![
            "CaptureBase",
            "CharacterEncoding",
            "Conditional",
            "Cardinality",
            "Conformance",
        ]
    );
    assert_eq!(ast.replay().unwrap(), bundle);
}
