mod common;

use common::{classify_record, event, three_handed};
use hand_pipeline::hand::{Relative, Street, Token};
use hand_pipeline::intention::{IntentionError, IntentionTable, StrengthBand};
use hand_pipeline::scorer::{DecisionScore, SizeCategory};
use hand_pipeline::{ActionLabel, Materializer};

fn table() -> IntentionTable {
    IntentionTable::embedded().unwrap()
}

#[test]
fn situations_name_the_intention() {
    let table = table();
    let cases = [
        (Street::Flop, ActionLabel::Cont, StrengthBand::High, SizeCategory::Medium, "strong-cbet"),
        (Street::Turn, ActionLabel::Probe, StrengthBand::Medium, SizeCategory::Big, "merge"),
        (Street::River, ActionLabel::Donk, StrengthBand::Low, SizeCategory::Pot, "polarised-bluff-or-value"),
        (Street::Preflop, ActionLabel::Open, StrengthBand::High, SizeCategory::Small, "value"),
        (Street::Preflop, ActionLabel::NBet(2), StrengthBand::Low, SizeCategory::Huge, "squeeze"),
    ];
    for (street, label, band, size, expected) in cases {
        assert_eq!(table.lookup(street, label, band, size), expected, "{street} {label}");
    }
}

#[test]
fn detailed_cells_win_and_missing_cells_fall_back() {
    let table = table();
    // Detailed cell.
    assert_eq!(
        table.lookup(Street::Flop, ActionLabel::Cont, StrengthBand::Low, SizeCategory::Tiny),
        "continuation"
    );
    // Situation without that cell: default grid.
    assert_eq!(
        table.lookup(Street::Flop, ActionLabel::Cont, StrengthBand::Low, SizeCategory::Medium),
        "semi-bluff"
    );
    assert_eq!(
        table.lookup(Street::River, ActionLabel::Bet, StrengthBand::High, SizeCategory::Huge),
        "max-value"
    );
    // No situation at all.
    assert_eq!(
        table.lookup(Street::Turn, ActionLabel::Lead, StrengthBand::Medium, SizeCategory::Small),
        "thin-value"
    );
    // Empty table.
    assert_eq!(
        IntentionTable::default().lookup(Street::Flop, ActionLabel::Cont, StrengthBand::High, SizeCategory::Pot),
        "cont-high-pot"
    );
}

#[test]
fn passive_actions_and_unscored_actions() {
    let table = table();
    let check = event(Street::Flop, Token::Check, Relative::InPosition);
    assert_eq!(
        table.intention_of(&check, None, DecisionScore::Unscored, None).as_deref(),
        Some("check")
    );

    let call = event(Street::Flop, Token::Call, Relative::InPosition);
    assert_eq!(
        table.intention_of(&call, None, DecisionScore::Scored(70.0), None).as_deref(),
        Some("call-strong")
    );
    let fold = event(Street::Turn, Token::Fold, Relative::OutOfPosition);
    assert_eq!(
        table.intention_of(&fold, None, DecisionScore::Scored(20.0), None).as_deref(),
        Some("fold-weak")
    );
    assert_eq!(table.intention_of(&call, None, DecisionScore::Unscored, None), None);

    let bet = event(Street::Flop, Token::Bet, Relative::OutOfPosition);
    assert_eq!(
        table.intention_of(&bet, Some(ActionLabel::Cont), DecisionScore::Unscored, Some(SizeCategory::Pot)),
        None
    );
    assert_eq!(
        table.intention_of(&bet, Some(ActionLabel::Unclassified), DecisionScore::Scored(80.0), None),
        None
    );
    assert_eq!(
        table
            .intention_of(&bet, Some(ActionLabel::Cont), DecisionScore::Scored(40.0), None)
            .as_deref(),
        Some("continuation")
    );
}

#[test]
fn invalid_tables_are_rejected() {
    let twice = r#"
situations:
  - street: flop
    label: cont
    grouped: { high: { small: a } }
  - street: flop
    label: cont
    grouped: { low: { small: b } }
"#;
    assert!(matches!(
        IntentionTable::from_yaml(twice),
        Err(IntentionError::DuplicateSituation { street: Street::Flop, label: ActionLabel::Cont })
    ));

    let blank = "defaults:\n  detailed:\n    low: { tiny: \"  \" }\n";
    assert!(matches!(
        IntentionTable::from_yaml(blank),
        Err(IntentionError::Empty { band: StrengthBand::Low, .. })
    ));

    let unknown = "situations:\n  - street: flop\n    label: cont\n    sizes: {}\n";
    assert!(matches!(IntentionTable::from_yaml(unknown), Err(IntentionError::Yaml(_))));
}

#[test]
fn classified_hands_carry_intentions_into_the_snapshot() {
    let hand = three_handed(
        "h1",
        &[
            (Street::Preflop, "", &["r250", "f", "c"]),
            (Street::Flop, "9d8c3s", &["x", "b200", "f"]),
        ],
    );
    let actions = classify_record(&hand);
    let intentions: Vec<(&str, &str)> = actions
        .iter()
        .map(|a| (a.event.player.id.as_str(), a.intention.as_deref().unwrap()))
        .collect();

    let open = intentions[0];
    assert_eq!(open.0, "btn");
    assert!(["steal-attempt", "steal", "value"].contains(&open.1), "{open:?}");
    assert!(intentions[1].1.starts_with("fold-"));
    assert!(intentions[2].1.starts_with("call-"));
    assert_eq!(intentions[3], ("bb", "check"));
    assert!(intentions[5].1.starts_with("fold-"));

    let snapshot = Materializer::default().rebuild(&actions);
    let btn = &snapshot.players["btn"];
    assert_eq!(btn.intentions.values().sum::<u64>(), btn.actions);
    assert_eq!(snapshot.players["bb"].intentions["check"], 1);
}
