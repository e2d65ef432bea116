mod common;

use std::sync::Arc;

use common::{classify_record, event, three_handed};
use hand_pipeline::ActionLabel;
use hand_pipeline::analysis::analyze_hand;
use hand_pipeline::cards::{Card, parse_cards};
use hand_pipeline::equity::{EquityError, EquityEvaluator};
use hand_pipeline::hand::{Relative, Street, Token};
use hand_pipeline::ingest::ingest;
use hand_pipeline::intention::IntentionTable;
use hand_pipeline::rules::RuleSet;
use hand_pipeline::scorer::{DecisionScore, DecisionScorer, PotState, SizeCategory};
use hand_pipeline::source::SyntheticSource;

struct Fixed(f64);

impl EquityEvaluator for Fixed {
    fn evaluate(&self, _hole: &[Card], _board: &[Card]) -> Result<f64, EquityError> {
        Ok(self.0)
    }
}

struct Broken;

impl EquityEvaluator for Broken {
    fn evaluate(&self, hole: &[Card], _board: &[Card]) -> Result<f64, EquityError> {
        Err(EquityError::HoleCards(hole.len()))
    }
}

fn cards(s: &str) -> Vec<Card> {
    parse_cards(s).unwrap()
}

fn preflop(invested: u64) -> PotState {
    PotState {
        street: Street::Preflop,
        invested,
        pot_before: 150,
    }
}

#[test]
fn pocket_aces_opening_scores_the_maximum() {
    let scorer = DecisionScorer::default();
    let score = scorer.score(Some(ActionLabel::Open), &cards("AsAd"), &[], preflop(250));
    assert_eq!(score, DecisionScore::Scored(100.0));
}

#[test]
fn injected_evaluator_drives_the_score() {
    let scorer = DecisionScorer::new(Arc::new(Fixed(0.5)));
    let pot = PotState {
        street: Street::Flop,
        invested: 50,
        pot_before: 100,
    };
    let score = scorer.score(Some(ActionLabel::Bet), &cards("2c3d"), &cards("9d8c3s"), pot);
    assert_eq!(score, DecisionScore::Scored(54.5));
}

#[test]
fn labels_with_higher_baselines_score_weak_hands_lower() {
    let scorer = DecisionScorer::default();
    let hole = cards("JhTh");
    let open = scorer.score(Some(ActionLabel::Open), &hole, &[], preflop(250));
    let four_bet = scorer.score(Some(ActionLabel::NBet(4)), &hole, &[], preflop(2500));
    assert!(open.value().unwrap() > four_bet.value().unwrap());
}

#[test]
fn larger_bets_carry_more_risk() {
    let scorer = DecisionScorer::new(Arc::new(Fixed(0.8)));
    let board = cards("9d8c3s");
    let hole = cards("AhKh");
    let bet = |invested| {
        let pot = PotState {
            street: Street::Flop,
            invested,
            pot_before: 100,
        };
        scorer.score(Some(ActionLabel::Bet), &hole, &board, pot).value().unwrap()
    };
    assert!(bet(30) > bet(100));
    assert!(bet(100) > bet(400));
    assert_eq!(bet(500), bet(5_000));
}

#[test]
fn missing_or_invalid_cards_are_unscored() {
    let scorer = DecisionScorer::default();
    let pot = PotState {
        street: Street::Flop,
        invested: 100,
        pot_before: 300,
    };
    // Flop action with only the preflop board.
    assert_eq!(
        scorer.score(Some(ActionLabel::Cont), &cards("AhKh"), &[], pot),
        DecisionScore::Unscored
    );
    assert_eq!(
        scorer.score(Some(ActionLabel::Cont), &cards("Ah"), &cards("9d8c3s"), pot),
        DecisionScore::Unscored
    );

    let mut no_hole = event(Street::Preflop, Token::Raise, Relative::InPosition);
    no_hole.hole_cards = None;
    assert_eq!(scorer.score_event(&no_hole, Some(ActionLabel::Open)), DecisionScore::Unscored);

    let mut garbage = event(Street::Preflop, Token::Raise, Relative::InPosition);
    garbage.hole_cards = Some("Zz9x".into());
    assert_eq!(scorer.score_event(&garbage, Some(ActionLabel::Open)), DecisionScore::Unscored);

    let failing = DecisionScorer::new(Arc::new(Broken));
    let fine = event(Street::Preflop, Token::Raise, Relative::InPosition);
    assert_eq!(failing.score_event(&fine, Some(ActionLabel::Open)), DecisionScore::Unscored);
}

#[test]
fn passive_actions_are_scored_on_strength_alone() {
    let scorer = DecisionScorer::new(Arc::new(Fixed(0.5)));
    let call = event(Street::Preflop, Token::Call, Relative::InPosition);
    assert_eq!(scorer.score_event(&call, None), DecisionScore::Scored(50.5));
}

#[test]
fn scores_are_deterministic_and_in_range() {
    let rules = RuleSet::embedded().unwrap();
    let scorer = DecisionScorer::default();
    let intentions = IntentionTable::default();
    for record in SyntheticSource::new(11, 0).generate(80) {
        let hand = ingest(&record).unwrap();
        let first = analyze_hand(&hand, &rules, &scorer, &intentions);
        let second = analyze_hand(&hand, &rules, &scorer, &intentions);
        assert_eq!(first.actions, second.actions);
        for action in &first.actions {
            if let Some(value) = action.score.value() {
                assert!((1.0..=100.0).contains(&value), "{value}");
                assert_eq!((value * 10.0).round() / 10.0, value);
            }
        }
    }
}

#[test]
fn aggressive_actions_get_a_size_category() {
    let hand = three_handed(
        "sizes",
        &[
            (Street::Preflop, "", &["r250", "f", "c"]),
            (Street::Flop, "9d8c3s", &["x", "b700", "c"]),
        ],
    );
    let sizes: Vec<(Token, Option<SizeCategory>)> = classify_record(&hand)
        .iter()
        .map(|a| (a.event.token, a.size))
        .collect();
    assert_eq!(
        sizes,
        [
            (Token::Raise, Some(SizeCategory::Medium)),
            (Token::Fold, None),
            (Token::Call, None),
            (Token::Check, None),
            (Token::Bet, Some(SizeCategory::Over)),
            (Token::Call, None),
        ]
    );
    assert_eq!("over".parse::<SizeCategory>(), Ok(SizeCategory::Over));
}
