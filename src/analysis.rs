//! Classification and scoring of one ingested hand.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::context::build_contexts;
use crate::hand::ActionEvent;
use crate::ingest::IngestedHand;
use crate::intention::IntentionTable;
use crate::label::ActionLabel;
use crate::rules::{ClassifyError, RuleSet};
use crate::scorer::{DecisionScore, DecisionScorer, SizeCategory};

/// An [`ActionEvent`] with its derived label, score, size bucket and intention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifiedAction {
    pub event: ActionEvent,
    /// `None` for folds, checks and calls.
    pub label: Option<ActionLabel>,
    pub score: DecisionScore,
    pub size: Option<SizeCategory>,
    /// `None` when the action could not be scored, checks excepted.
    pub intention: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HandAnalysis {
    pub hand_id: String,
    pub actions: Vec<ClassifiedAction>,
    /// Bets and raises no rule matched; each is labelled unclassified.
    pub gaps: usize,
}

pub fn analyze_hand(
    hand: &IngestedHand,
    rules: &RuleSet,
    scorer: &DecisionScorer,
    intentions: &IntentionTable,
) -> HandAnalysis {
    let contexts = build_contexts(&hand.events);
    let mut gaps = 0;

    let actions = hand
        .events
        .iter()
        .zip(&contexts)
        .map(|(event, ctx)| {
            let label = match rules.classify(event, ctx) {
                Ok(label) => Some(label),
                Err(ClassifyError::NotClassifiable(_)) => None,
                Err(err @ ClassifyError::Gap { .. }) => {
                    error!(
                        severity = "fatal",
                        hand_id = %event.hand_id,
                        street = %event.street,
                        index = event.index,
                        error = %err,
                        "classification gap in rule set"
                    );
                    gaps += 1;
                    Some(ActionLabel::Unclassified)
                }
            };
            let score = scorer.score_event(event, label);
            let size = SizeCategory::of(event);
            ClassifiedAction {
                intention: intentions.intention_of(event, label, score, size),
                event: event.clone(),
                label,
                score,
                size,
            }
        })
        .collect();

    HandAnalysis {
        hand_id: hand.hand_id.clone(),
        actions,
        gaps,
    }
}
