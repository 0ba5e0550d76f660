use oca_core::digest::{compute_said, verify};
use oca_core::{
    Attribute, AttributeType, Bundle, Conformance, Encoding, Language, OcaBox, OcaError,
    OverlayContent, OverlayKind, Said, ScalarType, Standard, Translations,
};
use serde_json::json;

fn lang(code: &str) -> Language {
    Language::parse(code).expect("test language should parse")
}

fn text(name: &str) -> Attribute {
    Attribute::new(name, AttributeType::Scalar(ScalarType::Text))
}

fn full_box() -> OcaBox {
    let mut oca_box = OcaBox::new();
    oca_box.add_classification("GICS:35102020").unwrap();
    oca_box
        .add_meta(
            "name",
            Translations::from([
                (lang("eng"), "Driving licence".to_string()),
                (lang("pol"), "Prawo jazdy".to_string()),
            ]),
        )
        .unwrap();
    oca_box
        .add_meta(
            "description",
            Translations::from([(lang("eng"), "Licence details".to_string())]),
        )
        .unwrap();
    oca_box
        .add_attribute(
            text("first_name")
                .flagged()
                .with_label(lang("eng"), "First name")
                .with_label(lang("pol"), "Imię")
                .with_information(lang("eng"), "Holder first name")
                .with_encoding(Encoding::Iso8859_1),
        )
        .unwrap();
    oca_box
        .add_attribute(
            Attribute::new("age", AttributeType::Scalar(ScalarType::Numeric))
                .with_label(lang("eng"), "Age")
                .with_format("^[0-9]+$")
                .with_unit("year")
                .with_condition("${category} == 'B'"),
        )
        .unwrap();
    oca_box
        .add_attribute(
            text("category")
                .with_entry("A", lang("eng"), "Motorcycle")
                .with_entry("B", lang("eng"), "Car")
                .with_entry("B", lang("pol"), "Samochód")
                .with_standard(Standard::parse("urn:iso:std:iso:18013").unwrap()),
        )
        .unwrap();
    oca_box
}

#[test]
fn classification_only_box_has_single_character_encoding_overlay() {
    let mut oca_box = OcaBox::new();
    oca_box.add_classification("GICS:35102020").unwrap();
    let bundle = oca_box.generate_bundle().unwrap();

    assert_eq!(bundle.overlays.len(), 1);
    assert_eq!(bundle.overlays[0].kind(), OverlayKind::CharacterEncoding);
    assert!(bundle.capture_base.attributes.is_empty());
    assert!(bundle.capture_base.flagged_attributes.is_empty());
    assert_eq!(bundle.capture_base.classification, "GICS:35102020");
}

#[test]
fn flagged_attributes_keep_flagging_order() {
    let mut oca_box = OcaBox::new();
    oca_box.add_attribute(text("a2").flagged()).unwrap();
    oca_box.add_attribute(text("a1").flagged()).unwrap();
    oca_box.add_attribute(text("a3")).unwrap();
    let bundle = oca_box.generate_bundle().unwrap();

    assert_eq!(bundle.capture_base.flagged_attributes, vec!["a2", "a1"]);
}

#[test]
fn generating_twice_yields_identical_digests() {
    let oca_box = full_box();
    let first = oca_box.generate_bundle().unwrap();
    let second = oca_box.generate_bundle().unwrap();

    assert_eq!(first.d, second.d);
    assert_eq!(first.capture_base.d, second.capture_base.d);
    let first_saids: Vec<_> = first.overlays.iter().map(|o| o.d.clone()).collect();
    let second_saids: Vec<_> = second.overlays.iter().map(|o| o.d.clone()).collect();
    assert_eq!(first_saids, second_saids);
}

#[test]
fn attribute_insertion_order_does_not_change_digests() {
    let mut forward = OcaBox::new();
    forward.add_attribute(text("a").with_label(lang("eng"), "A")).unwrap();
    forward.add_attribute(text("b").with_label(lang("eng"), "B")).unwrap();
    let mut backward = OcaBox::new();
    backward.add_attribute(text("b").with_label(lang("eng"), "B")).unwrap();
    backward.add_attribute(text("a").with_label(lang("eng"), "A")).unwrap();

    let forward = forward.generate_bundle().unwrap();
    let backward = backward.generate_bundle().unwrap();
    assert_eq!(forward.capture_base.d, backward.capture_base.d);
    assert_eq!(forward.d, backward.d);
}

#[test]
fn every_entity_is_stamped_and_linked() {
    let bundle = full_box().generate_bundle().unwrap();

    assert!(verify(&bundle.capture_base).unwrap());
    assert!(verify(&bundle).unwrap());
    for overlay in &bundle.overlays {
        assert!(verify(overlay).unwrap(), "{} digest", overlay.kind());
        assert_eq!(overlay.capture_base, bundle.capture_base.d);
    }
}

#[test]
fn overlays_follow_canonical_order_and_split_by_language() {
    let bundle = full_box().generate_bundle().unwrap();
    let layout: Vec<(OverlayKind, Option<String>)> = bundle
        .overlays
        .iter()
        .map(|o| (o.kind(), o.language().map(|l| l.to_string())))
        .collect();

    let expected = vec![
        (OverlayKind::Meta, Some("eng".to_string())),
        (OverlayKind::Meta, Some("pol".to_string())),
        (OverlayKind::CharacterEncoding, None),
        (OverlayKind::EntryCode, None),
        (OverlayKind::Entry, Some("eng".to_string())),
        (OverlayKind::Entry, Some("pol".to_string())),
        (OverlayKind::Label, Some("eng".to_string())),
        (OverlayKind::Label, Some("pol".to_string())),
        (OverlayKind::Information, Some("eng".to_string())),
        (OverlayKind::Format, None),
        (OverlayKind::Unit, None),
        (OverlayKind::Standard, None),
        (OverlayKind::Conditional, None),
    ];
    assert_eq!(layout, expected);
}

#[test]
fn language_overlays_do_not_back_fill() {
    let bundle = full_box().generate_bundle().unwrap();
    let pol_labels = bundle
        .overlays_of(OverlayKind::Label)
        .find_map(|o| match &o.content {
            OverlayContent::Label(c) if c.language == lang("pol") => Some(c.clone()),
            _ => None,
        })
        .expect("pol label overlay");

    assert_eq!(pol_labels.attribute_labels.len(), 1);
    assert_eq!(pol_labels.attribute_labels["first_name"], "Imię");
}

#[test]
fn export_has_plain_structural_shape() {
    let bundle = full_box().generate_bundle().unwrap();
    let value = bundle.to_value().unwrap();

    assert_eq!(value["capture_base"]["type"], "spec/capture_base/1.0");
    assert_eq!(value["capture_base"]["attributes"]["age"], "Numeric");
    assert_eq!(value["capture_base"]["flagged_attributes"], json!(["first_name"]));
    assert!(value["overlays"].is_array());

    let encoding = &value["overlays"][2];
    assert_eq!(encoding["type"], "spec/overlays/character_encoding/1.0");
    assert_eq!(encoding["default_character_encoding"], "utf-8");
    assert_eq!(
        encoding["attribute_character_encoding"],
        json!({"first_name": "iso-8859-1"})
    );

    let conditional = value["overlays"]
        .as_array()
        .unwrap()
        .iter()
        .find(|o| o["type"] == "spec/overlays/conditional/1.0")
        .unwrap();
    assert_eq!(conditional["attribute_conditions"]["age"], "${0} == 'B'");
    assert_eq!(conditional["attribute_dependencies"]["age"], json!(["category"]));

    let unit = value["overlays"]
        .as_array()
        .unwrap()
        .iter()
        .find(|o| o["type"] == "spec/overlays/unit/1.0")
        .unwrap();
    assert_eq!(unit["metric_system"], "SI");
    assert_eq!(unit["attribute_units"]["age"], "year");
}

#[test]
fn entry_codes_keep_declaration_order() {
    let bundle = full_box().generate_bundle().unwrap();
    let codes = bundle
        .overlays_of(OverlayKind::EntryCode)
        .find_map(|o| match &o.content {
            OverlayContent::EntryCode(c) => Some(c.attribute_entry_codes.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(codes["category"], vec!["A", "B"]);
}

#[test]
fn changing_one_attribute_keeps_unrelated_overlay_content() {
    let mut before = OcaBox::new();
    before.add_attribute(text("a").with_label(lang("eng"), "A")).unwrap();
    before.add_attribute(text("b")).unwrap();
    let mut after = before.clone();
    after
        .add_attribute(Attribute::new("b", AttributeType::Scalar(ScalarType::Binary)))
        .unwrap();

    let before = before.generate_bundle().unwrap();
    let after = after.generate_bundle().unwrap();
    assert_ne!(before.capture_base.d, after.capture_base.d);

    let label = |bundle: &Bundle| {
        bundle
            .overlays_of(OverlayKind::Label)
            .next()
            .cloned()
            .unwrap()
    };
    assert_eq!(label(&before).content, label(&after).content);
    assert_ne!(label(&before).d, label(&after).d);
}

#[test]
fn loaded_bundle_regenerates_identical_digests() {
    let bundle = full_box().generate_bundle().unwrap();
    let exported = bundle.to_value().unwrap();
    let imported = Bundle::from_value(&exported).unwrap();
    assert_eq!(imported, bundle);

    let reloaded = OcaBox::load(&imported).unwrap();
    let regenerated = reloaded.generate_bundle().unwrap();
    assert_eq!(regenerated, bundle);
}

#[test]
fn loaded_box_can_be_extended() {
    let bundle = full_box().generate_bundle().unwrap();
    let mut oca_box = OcaBox::load(&bundle).unwrap();
    oca_box
        .add_attribute(text("licence_number").flagged())
        .unwrap();
    let extended = oca_box.generate_bundle().unwrap();

    assert_ne!(extended.d, bundle.d);
    assert_eq!(
        extended.capture_base.flagged_attributes,
        vec!["first_name", "licence_number"]
    );
    assert_eq!(extended.overlays.len(), bundle.overlays.len());
}

#[test]
fn load_rejects_overlay_for_undeclared_attribute() {
    let bundle = full_box().generate_bundle().unwrap();
    let mut value = bundle.to_value().unwrap();
    value["capture_base"]["attributes"]
        .as_object_mut()
        .unwrap()
        .remove("age");
    let imported = Bundle::from_value(&value).unwrap();

    let err = OcaBox::load(&imported).unwrap_err();
    assert!(matches!(err, OcaError::Structural(message) if message.contains("age")));
}

#[test]
fn bare_reference_with_target_becomes_reference_descriptor() {
    let said: Said = "EF5ERATRBBN_ewEo9buQbznirhBmvrSSC0O2GIR4Gbfs".parse().unwrap();
    let mut oca_box = OcaBox::new();
    oca_box
        .add_attribute(
            Attribute::new("holder", AttributeType::Scalar(ScalarType::Reference))
                .with_reference_sai(said.clone()),
        )
        .unwrap();
    let bundle = oca_box.generate_bundle().unwrap();

    assert_eq!(
        bundle.capture_base.attributes["holder"],
        AttributeType::Reference(said)
    );
    let value = bundle.to_value().unwrap();
    assert_eq!(
        value["capture_base"]["attributes"]["holder"],
        "refs:EF5ERATRBBN_ewEo9buQbznirhBmvrSSC0O2GIR4Gbfs"
    );
}

#[test]
fn box_configuration_reaches_overlays() {
    let mut oca_box = OcaBox::new()
        .with_default_encoding(Encoding::Utf16)
        .with_metric_system("Imperial");
    oca_box
        .add_attribute(text("height").with_unit("ft").with_encoding(Encoding::Utf16))
        .unwrap();
    let value = oca_box.generate_bundle().unwrap().to_value().unwrap();

    assert_eq!(value["overlays"][0]["default_character_encoding"], "utf-16");
    assert_eq!(value["overlays"][0]["attribute_character_encoding"], json!({}));
    assert_eq!(value["overlays"][1]["metric_system"], "Imperial");
}

#[test]
fn bundle_digest_ignores_overlay_order() {
    let mut bundle = full_box().generate_bundle().unwrap();
    let original = compute_said(&bundle).unwrap();
    bundle.overlays.reverse();
    assert_eq!(compute_said(&bundle).unwrap(), original);
}

#[test]
fn entry_codes_without_labels_emit_no_entry_overlay() {
    let mut oca_box = OcaBox::new();
    oca_box
        .add_attribute(text("colour").with_entry_codes(["red", "green"]))
        .unwrap();
    let bundle = oca_box.generate_bundle().unwrap();

    assert_eq!(bundle.overlays_of(OverlayKind::EntryCode).count(), 1);
    assert_eq!(bundle.overlays_of(OverlayKind::Entry).count(), 0);
    let value = bundle.to_value().unwrap();
    let entry_codes = value["overlays"]
        .as_array()
        .unwrap()
        .iter()
        .find(|o| o["type"] == "spec/overlays/entry_code/1.0")
        .unwrap();
    assert_eq!(
        entry_codes["attribute_entry_codes"]["colour"],
        json!(["red", "green"])
    );
}

#[test]
fn cardinality_and_conformance_are_emitted_only_with_data() {
    let bare = full_box().generate_bundle().unwrap();
    assert_eq!(bare.overlays_of(OverlayKind::Cardinality).count(), 0);
    assert_eq!(bare.overlays_of(OverlayKind::Conformance).count(), 0);

    let mut oca_box = full_box();
    oca_box
        .add_attribute(
            text("licence_number")
                .with_cardinality("1")
                .with_conformance(Conformance::Mandatory),
        )
        .unwrap();
    let bundle = oca_box.generate_bundle().unwrap();
    let value = bundle.to_value().unwrap();
    let overlays = value["overlays"].as_array().unwrap();
    let tail: Vec<&str> = overlays[overlays.len() - 2..]
        .iter()
        .map(|o| o["type"].as_str().unwrap())
        .collect();

    assert_eq!(
        tail,
        vec![
            "spec/overlays/cardinality/1.0",
            "spec/overlays/conformance/1.0"
        ]
    );
    assert_eq!(
        overlays[overlays.len() - 2]["attribute_cardinality"],
        json!({"licence_number": "1"})
    );
    assert_eq!(
        overlays[overlays.len() - 1]["attribute_conformance"],
        json!({"licence_number": "M"})
    );
}

#[test]
fn cardinality_and_conformance_survive_load() {
    let mut oca_box = full_box();
    oca_box
        .add_attribute(
            text("licence_number")
                .with_cardinality("1-2")
                .with_conformance(Conformance::Optional),
        )
        .unwrap();
    let bundle = oca_box.generate_bundle().unwrap();

    let imported = Bundle::from_value(&bundle.to_value().unwrap()).unwrap();
    let reloaded = OcaBox::load(&imported).unwrap();
    let attribute = reloaded.attribute("licence_number").unwrap();
    assert_eq!(attribute.cardinality.as_deref(), Some("1-2"));
    assert_eq!(attribute.conformance, Some(Conformance::Optional));
    assert_eq!(reloaded.generate_bundle().unwrap().d, bundle.d);
}
