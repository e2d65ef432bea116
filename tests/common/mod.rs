#![allow(dead_code)]

use chrono::{DateTime, Utc};
use hand_pipeline::analysis::{ClassifiedAction, analyze_hand};
use hand_pipeline::hand::{
    ActionEvent, Blinds, HandRecord, PlayerRef, PotType, Relative, Seat, Street, StreetRecord,
    TablePosition, Token,
};
use hand_pipeline::ingest::ingest;
use hand_pipeline::intention::IntentionTable;
use hand_pipeline::rules::RuleSet;
use hand_pipeline::scorer::DecisionScorer;

pub const STACK: u64 = 10_000;

pub fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

/// A hand at 50/100 where every player has [`STACK`] chips. Seats are
/// `(player id, position, hole cards)`; streets are `(street, board, tokens)`.
pub fn record(
    hand_id: &str,
    seats: &[(&str, TablePosition, &str)],
    streets: &[(Street, &str, &[&str])],
) -> HandRecord {
    HandRecord {
        hand_id: hand_id.to_string(),
        blinds: Some(Blinds {
            small: 50,
            big: 100,
            ante: 0,
        }),
        players: seats
            .iter()
            .map(|(id, position, hole)| Seat {
                player_id: id.to_string(),
                name: Some(format!("Name {id}")),
                position: *position,
                stack: STACK,
                hole_cards: (!hole.is_empty()).then(|| hole.to_string()),
            })
            .collect(),
        streets: streets
            .iter()
            .map(|(street, board, actions)| StreetRecord {
                street: *street,
                board: board.to_string(),
                actions: actions.iter().map(|a| a.to_string()).collect(),
            })
            .collect(),
        pot_type: PotType::Cash,
        timestamp: ts(0),
    }
}

/// Three-handed BTN/SB/BB table used by most scenario tests.
pub fn three_handed(hand_id: &str, streets: &[(Street, &str, &[&str])]) -> HandRecord {
    record(
        hand_id,
        &[
            ("btn", TablePosition::Btn, "AhKh"),
            ("sb", TablePosition::Sb, "7c2d"),
            ("bb", TablePosition::Bb, "QsJs"),
        ],
        streets,
    )
}

pub fn classify_record(record: &HandRecord) -> Vec<ClassifiedAction> {
    let hand = ingest(record).expect("record ingests");
    let rules = RuleSet::embedded().expect("embedded rules");
    let intentions = IntentionTable::embedded().expect("embedded intentions");
    analyze_hand(&hand, &rules, &DecisionScorer::default(), &intentions).actions
}

/// Labels of the bets and raises, as `(player, label)`.
pub fn labels(record: &HandRecord) -> Vec<(String, String)> {
    classify_record(record)
        .into_iter()
        .filter_map(|a| a.label.map(|l| (a.event.player.id.clone(), l.to_string())))
        .collect()
}

pub fn event(street: Street, token: Token, relative: Relative) -> ActionEvent {
    ActionEvent {
        hand_id: "h1".to_string(),
        street,
        index: 0,
        sequence: 0,
        player: PlayerRef {
            id: "p1".to_string(),
            name: "Player 1".to_string(),
        },
        seat: TablePosition::Btn,
        relative,
        token,
        amount: 300,
        amount_to: 300,
        pot_before: 150,
        stack_before: STACK,
        stack_after: STACK - 300,
        all_in: false,
        big_blind: 100,
        board: String::new(),
        hole_cards: Some("AsAd".to_string()),
    }
}
