//! Per-event betting context consumed by the rule engine.

use serde::Serialize;

use crate::hand::{ActionEvent, Street, Token};

/// What had happened on the current and previous street when an event was taken.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreetContext {
    /// Bets and raises earlier on this street.
    pub raise_count: u32,
    /// No bet or raise yet on this street.
    pub first_bet_this_street: bool,
    /// Player made the last preflop raise (so far, when on the preflop).
    pub is_preflop_aggressor: bool,
    pub prev_street_had_bet: bool,
    pub prev_street_ended_with_two_checks: bool,
    /// Player made the last bet or raise of the previous street.
    pub prev_street_aggressor: bool,
    /// Player called on the previous street.
    pub called_prev_street: bool,
    /// Player's own earlier tokens on this street, in order.
    pub prior_tokens: Vec<Token>,
}

impl StreetContext {
    /// Value of `raise_count + 1`, the `n` in an `{n}bet` template.
    pub fn raise_count_plus1(&self) -> u32 {
        self.raise_count + 1
    }
}

#[derive(Default)]
struct StreetHistory<'a> {
    tokens: Vec<(&'a str, Token)>,
}

impl<'a> StreetHistory<'a> {
    fn had_bet(&self) -> bool {
        self.tokens.iter().any(|(_, t)| t.is_aggressive())
    }

    fn ended_with_two_checks(&self) -> bool {
        matches!(
            self.tokens.as_slice(),
            [.., (_, Token::Check), (_, Token::Check)]
        )
    }

    fn last_aggressor(&self) -> Option<&'a str> {
        self.tokens
            .iter()
            .rev()
            .find(|(_, t)| t.is_aggressive())
            .map(|(p, _)| *p)
    }

    fn called(&self, player: &str) -> bool {
        self.tokens
            .iter()
            .any(|(p, t)| *p == player && *t == Token::Call)
    }

    fn raise_count(&self) -> u32 {
        self.tokens.iter().filter(|(_, t)| t.is_aggressive()).count() as u32
    }

    fn prior_tokens(&self, player: &str) -> Vec<Token> {
        self.tokens
            .iter()
            .filter(|(p, _)| *p == player)
            .map(|(_, t)| *t)
            .collect()
    }
}

/// Builds one context per event of a single hand.
///
/// `events` must be in recorded order (street, then index within street); the
/// output is index-aligned with the input.
pub fn build_contexts(events: &[ActionEvent]) -> Vec<StreetContext> {
    let mut streets: [StreetHistory<'_>; 4] = Default::default();
    let mut contexts = Vec::with_capacity(events.len());

    for event in events {
        let player = event.player.id.as_str();
        let current = &streets[event.street.index()];
        let raise_count = current.raise_count();
        let prior_tokens = current.prior_tokens(player);

        let is_preflop_aggressor = streets[Street::Preflop.index()].last_aggressor() == Some(player);

        let mut ctx = StreetContext {
            raise_count,
            first_bet_this_street: raise_count == 0,
            is_preflop_aggressor,
            prior_tokens,
            ..StreetContext::default()
        };

        if let Some(prev) = event.street.previous() {
            let prev = &streets[prev.index()];
            ctx.prev_street_had_bet = prev.had_bet();
            ctx.prev_street_ended_with_two_checks = prev.ended_with_two_checks();
            ctx.prev_street_aggressor = prev.last_aggressor() == Some(player);
            ctx.called_prev_street = prev.called(player);
        }

        contexts.push(ctx);
        streets[event.street.index()].tokens.push((player, event.token));
    }

    contexts
}
