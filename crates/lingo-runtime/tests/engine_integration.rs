#![forbid(unsafe_code)]

//! Integration tests: the full path from catalog documents to `translate()`.

use std::sync::Arc;

use lingo_catalog::{LocaleId, compile, decompile, parse_str, validate};
use lingo_runtime::{DuplicatePolicy, Engine, MergedView, MessageIndex};

fn locale(tag: &str) -> Option<LocaleId> {
    Some(LocaleId::parse(tag).unwrap())
}

/// Generic French: complete for Dialog, has a numerus message.
const FR: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE TS>
<TS version="2.0" language="fr">
<context>
    <name>Dialog</name>
    <message>
        <source>Cancel</source>
        <translation>Annuler</translation>
    </message>
    <message>
        <source>Cancel</source>
        <comment>download</comment>
        <translation>Interrompre</translation>
    </message>
    <message>
        <source>%1 has %2 items</source>
        <translation>%1 a %2 éléments</translation>
    </message>
    <message numerus="yes">
        <source>%n recording(s)</source>
        <translation>
            <numerusform>%n enregistrement</numerusform>
            <numerusform>%n enregistrements</numerusform>
        </translation>
    </message>
</context>
</TS>"#;

/// Canadian French: overrides one key, leaves one unfinished.
const FR_CA: &str = r#"<TS version="2.0" language="fr_CA">
<context>
    <name>Dialog</name>
    <message>
        <source>Cancel</source>
        <translation>Annuler (CA)</translation>
    </message>
    <message>
        <source>%1 has %2 items</source>
        <translation type="unfinished">%1 a %2 trucs</translation>
    </message>
</context>
</TS>"#;

fn loaded_engine(tag: &str) -> Engine {
    let engine = Engine::new();
    engine.reload(vec![parse_str(FR).unwrap(), parse_str(FR_CA).unwrap()]);
    engine.set_locale(locale(tag));
    engine
}

#[test]
fn specific_locale_wins_per_key() {
    let e = loaded_engine("fr_CA");
    // fr_CA has this one finished.
    assert_eq!(e.translate("Dialog", "Cancel", None, None, &[]), "Annuler (CA)");
    // fr_CA's entry is unfinished, so generic fr wins key-by-key.
    assert_eq!(
        e.translate("Dialog", "%1 has %2 items", None, None, &["Alice", "3"]),
        "Alice a 3 éléments"
    );
    // Only fr carries the disambiguated variant.
    assert_eq!(
        e.translate("Dialog", "Cancel", Some("download"), None, &[]),
        "Interrompre"
    );
}

#[test]
fn missing_key_degrades_to_source() {
    let e = loaded_engine("fr_CA");
    assert_eq!(e.translate("Dialog", "Help", None, None, &[]), "Help");
    assert_eq!(
        e.translate("StatusBar", "Ready", None, None, &[]),
        "Ready"
    );
}

#[test]
fn fallback_totality_with_empty_catalog() {
    let engine = Engine::new();
    engine.reload(vec![parse_str("<TS language=\"de\"></TS>").unwrap()]);
    engine.set_locale(locale("de"));
    assert_eq!(engine.translate("Dialog", "Cancel", None, None, &[]), "Cancel");
}

#[test]
fn plural_selection_and_count_substitution() {
    let e = loaded_engine("fr");
    let t = |n| e.translate("Dialog", "%n recording(s)", None, Some(n), &[]);
    assert_eq!(t(0), "0 enregistrement");
    assert_eq!(t(1), "1 enregistrement");
    assert_eq!(t(5), "5 enregistrements");
}

#[test]
fn out_of_range_placeholder_left_literal() {
    let e = loaded_engine("fr");
    assert_eq!(
        e.translate("Dialog", "%1 has %2 items", None, None, &["Alice"]),
        "Alice a %2 éléments"
    );
}

#[test]
fn unrequested_locale_is_invisible() {
    let e = loaded_engine("de");
    // No German catalog: chain is empty, everything degrades to source.
    assert_eq!(e.translate("Dialog", "Cancel", None, None, &[]), "Cancel");
}

#[test]
fn compiled_blob_translates_identically() {
    let original = parse_str(FR).unwrap();
    assert!(validate(&original).is_empty());
    let reloaded = decompile(&compile(&original)).unwrap();

    let from_text = Engine::new();
    from_text.reload(vec![original]);
    from_text.set_locale(locale("fr"));

    let from_blob = Engine::new();
    from_blob.reload(vec![reloaded]);
    from_blob.set_locale(locale("fr"));

    let queries: &[(&str, &str, Option<&str>, Option<i64>, &[&str])] = &[
        ("Dialog", "Cancel", None, None, &[]),
        ("Dialog", "Cancel", Some("download"), None, &[]),
        ("Dialog", "%1 has %2 items", None, None, &["x", "y"]),
        ("Dialog", "%n recording(s)", None, Some(1), &[]),
        ("Dialog", "%n recording(s)", None, Some(3), &[]),
        ("Dialog", "Missing", None, None, &[]),
    ];
    for &(ctx, src, disamb, count, args) in queries {
        assert_eq!(
            from_text.translate(ctx, src, disamb, count, args),
            from_blob.translate(ctx, src, disamb, count, args),
            "diverged on {ctx}/{src}"
        );
    }
}

#[test]
fn merged_view_direct_usage() {
    let fr = Arc::new(
        MessageIndex::build(
            Arc::new(parse_str(FR).unwrap()),
            DuplicatePolicy::Fail,
        )
        .unwrap(),
    );
    let view = MergedView::merge(vec![fr]);
    let (msg, rule) = view.lookup("Dialog", "Cancel", None).unwrap();
    assert_eq!(msg.variants.as_slice(), ["Annuler"]);
    assert_eq!(rule.category_count(), 2);
}

#[test]
fn hot_reload_is_atomic_under_concurrency() {
    let engine = Arc::new(loaded_engine("fr"));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    let s = engine.translate("Dialog", "Cancel", None, None, &[]);
                    assert!(s == "Annuler" || s == "Cancel", "torn read: {s}");
                }
            })
        })
        .collect();
    for _ in 0..50 {
        engine.reload(vec![parse_str(FR).unwrap(), parse_str(FR_CA).unwrap()]);
        engine.reload(Vec::new());
    }
    for handle in readers {
        handle.join().unwrap();
    }
}
