//! Rule Engine: a data-driven interpreter over an ordered list of
//! classification rules.
//!
//! A rule set is loaded once (usually from YAML), validated, sorted by
//! priority and then shared read-only across classification workers.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::context::StreetContext;
use crate::hand::{ActionEvent, Relative, Street, Token};
use crate::label::ActionLabel;

const EMBEDDED_RULES: &str = include_str!("../rules/action_rules.yml");

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid rule document: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("rule with empty id")]
    EmptyId,
    #[error("rule id '{0}' declared twice")]
    DuplicateId(String),
    #[error("rule '{0}' declares both result and result_template")]
    AmbiguousResult(String),
    #[error("rule '{0}' declares neither result nor result_template")]
    MissingResult(String),
    #[error("rule '{id}' has unsupported template '{template}'")]
    Template { id: String, template: String },
    #[error("rule '{id}' conditions on token '{token}', only bet and raise are classified")]
    NotClassifiable { id: String, token: Token },
    #[error("no unconditional ANY fallback rule for '{0}'")]
    MissingFallback(Token),
    #[error("rule '{0}' is evaluated after a fallback rule and can never match")]
    ShadowedByFallback(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    #[error("only bet and raise are classified, got {0}")]
    NotClassifiable(Token),
    #[error("no rule matched {token} #{index} on the {street} of hand {hand_id}")]
    Gap {
        hand_id: String,
        street: Street,
        index: u32,
        token: Token,
    },
}

/// Streets a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    Preflop,
    Flop,
    Turn,
    River,
    /// Flop, turn and river.
    Postflop,
    Any,
}

impl Scope {
    pub fn covers(self, street: Street) -> bool {
        match self {
            Scope::Preflop => street == Street::Preflop,
            Scope::Flop => street == Street::Flop,
            Scope::Turn => street == Street::Turn,
            Scope::River => street == Street::River,
            Scope::Postflop => street.is_postflop(),
            Scope::Any => true,
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Scope::Preflop => "PREFLOP",
            Scope::Flop => "FLOP",
            Scope::Turn => "TURN",
            Scope::River => "RIVER",
            Scope::Postflop => "POSTFLOP",
            Scope::Any => "ANY",
        })
    }
}

/// One condition of a rule's conjunction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Token(Token),
    RaiseCount(u32),
    RaiseCountGt(u32),
    /// The player already used this token earlier on the street.
    PriorTokenContains(Token),
    Position(Relative),
    PreflopAggressor(bool),
    FirstBetThisStreet(bool),
    PrevStreetHadBet(bool),
    PrevStreetEndedWithTwoChecks(bool),
    PrevStreetAggressor(bool),
    CalledPrevStreet(bool),
}

impl Predicate {
    pub fn holds(&self, event: &ActionEvent, ctx: &StreetContext) -> bool {
        match *self {
            Predicate::Token(token) => event.token == token,
            Predicate::RaiseCount(n) => ctx.raise_count == n,
            Predicate::RaiseCountGt(n) => ctx.raise_count > n,
            Predicate::PriorTokenContains(token) => ctx.prior_tokens.contains(&token),
            Predicate::Position(relative) => event.relative == relative,
            Predicate::PreflopAggressor(want) => ctx.is_preflop_aggressor == want,
            Predicate::FirstBetThisStreet(want) => ctx.first_bet_this_street == want,
            Predicate::PrevStreetHadBet(want) => ctx.prev_street_had_bet == want,
            Predicate::PrevStreetEndedWithTwoChecks(want) => {
                ctx.prev_street_ended_with_two_checks == want
            }
            Predicate::PrevStreetAggressor(want) => ctx.prev_street_aggressor == want,
            Predicate::CalledPrevStreet(want) => ctx.called_prev_street == want,
        }
    }
}

/// Context variable a label template can substitute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateVar {
    RaiseCount,
    RaiseCountPlus1,
}

impl TemplateVar {
    fn resolve(self, ctx: &StreetContext) -> u32 {
        match self {
            TemplateVar::RaiseCount => ctx.raise_count,
            TemplateVar::RaiseCountPlus1 => ctx.raise_count_plus1(),
        }
    }
}

/// `{var}bet`, resolved to [`ActionLabel::NBet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelTemplate {
    pub var: TemplateVar,
}

impl LabelTemplate {
    pub fn parse(template: &str) -> Option<Self> {
        let var = match template.strip_suffix("bet")? {
            "{raise_count}" => TemplateVar::RaiseCount,
            "{raise_count_plus1}" => TemplateVar::RaiseCountPlus1,
            _ => return None,
        };
        Some(LabelTemplate { var })
    }

    /// Label for the given context. Values below 2 (never produced by a
    /// well-formed rule) fall back to a plain raise.
    pub fn render(&self, ctx: &StreetContext) -> ActionLabel {
        match self.var.resolve(ctx) {
            n if n >= 2 => ActionLabel::NBet(n),
            _ => ActionLabel::Raise,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleResult {
    Literal(ActionLabel),
    Template(LabelTemplate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    pub id: String,
    /// Lower values take precedence.
    pub priority: i32,
    pub scope: Scope,
    pub predicates: Vec<Predicate>,
    pub result: RuleResult,
}

impl ClassificationRule {
    pub fn new(
        id: impl Into<String>,
        priority: i32,
        scope: Scope,
        predicates: Vec<Predicate>,
        result: RuleResult,
    ) -> Self {
        Self {
            id: id.into(),
            priority,
            scope,
            predicates,
            result,
        }
    }

    pub fn matches(&self, event: &ActionEvent, ctx: &StreetContext) -> bool {
        self.scope.covers(event.street) && self.predicates.iter().all(|p| p.holds(event, ctx))
    }

    fn label(&self, ctx: &StreetContext) -> ActionLabel {
        match self.result {
            RuleResult::Literal(label) => label,
            RuleResult::Template(template) => template.render(ctx),
        }
    }

    /// The single token this rule is restricted to, if any.
    fn token(&self) -> Option<Token> {
        self.predicates.iter().find_map(|p| match p {
            Predicate::Token(token) => Some(*token),
            _ => None,
        })
    }

    /// `ANY` scope and no condition beyond the token.
    fn fallback_for(&self) -> Option<Token> {
        match self.predicates.as_slice() {
            [Predicate::Token(token)] if self.scope == Scope::Any => Some(*token),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleDocument {
    #[serde(default)]
    version: Option<String>,
    rules: Vec<RuleSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleSpec {
    id: String,
    priority: i32,
    #[serde(default = "any_scope")]
    scope: Scope,
    #[serde(default)]
    when: WhenSpec,
    #[serde(default)]
    result: Option<ActionLabel>,
    #[serde(default)]
    result_template: Option<String>,
}

fn any_scope() -> Scope {
    Scope::Any
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct WhenSpec {
    current_token: Option<Token>,
    raise_count: Option<u32>,
    raise_count_gt: Option<u32>,
    player_prev_actions_contains: Option<Token>,
    player_position: Option<Relative>,
    is_preflop_aggressor: Option<bool>,
    first_bet_this_street: Option<bool>,
    prev_street_had_bet: Option<bool>,
    prev_street_ended_with_two_checks: Option<bool>,
    prev_street_aggressor: Option<bool>,
    called_prev_street: Option<bool>,
}

impl WhenSpec {
    fn into_predicates(self) -> Vec<Predicate> {
        [
            self.current_token.map(Predicate::Token),
            self.raise_count.map(Predicate::RaiseCount),
            self.raise_count_gt.map(Predicate::RaiseCountGt),
            self.player_prev_actions_contains
                .map(Predicate::PriorTokenContains),
            self.player_position.map(Predicate::Position),
            self.is_preflop_aggressor.map(Predicate::PreflopAggressor),
            self.first_bet_this_street.map(Predicate::FirstBetThisStreet),
            self.prev_street_had_bet.map(Predicate::PrevStreetHadBet),
            self.prev_street_ended_with_two_checks
                .map(Predicate::PrevStreetEndedWithTwoChecks),
            self.prev_street_aggressor.map(Predicate::PrevStreetAggressor),
            self.called_prev_street.map(Predicate::CalledPrevStreet),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

impl RuleSpec {
    fn into_rule(self) -> Result<ClassificationRule, RuleError> {
        let result = match (self.result, self.result_template) {
            (Some(_), Some(_)) => return Err(RuleError::AmbiguousResult(self.id)),
            (None, None) => return Err(RuleError::MissingResult(self.id)),
            (Some(label), None) => RuleResult::Literal(label),
            (None, Some(template)) => match LabelTemplate::parse(&template) {
                Some(parsed) => RuleResult::Template(parsed),
                None => {
                    return Err(RuleError::Template {
                        id: self.id,
                        template,
                    });
                }
            },
        };
        Ok(ClassificationRule {
            id: self.id,
            priority: self.priority,
            scope: self.scope,
            predicates: self.when.into_predicates(),
            result,
        })
    }
}

/// A validated rule set, sorted by ascending priority with declaration order
/// breaking ties.
#[derive(Debug, Clone)]
pub struct RuleSet {
    version: Option<String>,
    rules: Vec<ClassificationRule>,
    /// Indices into `rules` per street, already in evaluation order.
    by_street: [Vec<usize>; 4],
}

impl RuleSet {
    /// Validates `rules`, including the mandatory bet/raise fallbacks.
    pub fn new(rules: Vec<ClassificationRule>) -> Result<Self, RuleError> {
        let set = Self::build(rules)?;
        set.check_fallbacks()?;
        Ok(set)
    }

    /// Like [`RuleSet::new`] but without the fallback requirement. A set built
    /// this way can produce classification gaps.
    pub fn without_fallback_check(rules: Vec<ClassificationRule>) -> Result<Self, RuleError> {
        Self::build(rules)
    }

    pub fn from_yaml(document: &str) -> Result<Self, RuleError> {
        let document: RuleDocument = serde_yaml::from_str(document)?;
        let rules = document
            .rules
            .into_iter()
            .map(RuleSpec::into_rule)
            .collect::<Result<Vec<_>, _>>()?;
        let mut set = Self::new(rules)?;
        set.version = document.version;
        Ok(set)
    }

    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let text = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// The rule file shipped with the crate.
    pub fn embedded() -> Result<Self, RuleError> {
        Self::from_yaml(EMBEDDED_RULES)
    }

    fn build(mut rules: Vec<ClassificationRule>) -> Result<Self, RuleError> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if rule.id.trim().is_empty() {
                return Err(RuleError::EmptyId);
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(RuleError::DuplicateId(rule.id.clone()));
            }
            if let Some(token) = rule.token()
                && !token.is_aggressive()
            {
                return Err(RuleError::NotClassifiable {
                    id: rule.id.clone(),
                    token,
                });
            }
        }

        // Vec::sort_by_key is stable: equal priorities keep declaration order.
        rules.sort_by_key(|rule| rule.priority);

        let by_street: [Vec<usize>; 4] = Street::ALL.map(|street| {
            rules
                .iter()
                .enumerate()
                .filter(|(_, rule)| rule.scope.covers(street))
                .map(|(idx, _)| idx)
                .collect()
        });

        Ok(Self {
            version: None,
            rules,
            by_street,
        })
    }

    fn check_fallbacks(&self) -> Result<(), RuleError> {
        for token in [Token::Bet, Token::Raise] {
            let Some(position) = self
                .rules
                .iter()
                .position(|rule| rule.fallback_for() == Some(token))
            else {
                return Err(RuleError::MissingFallback(token));
            };
            let shadowed = self.rules[position + 1..].iter().find(|rule| {
                rule.token().is_none_or(|t| t == token) && rule.fallback_for() != Some(token)
            });
            if let Some(rule) = shadowed {
                return Err(RuleError::ShadowedByFallback(rule.id.clone()));
            }
        }
        Ok(())
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The first rule, in evaluation order, that matches the event.
    pub fn first_match(
        &self,
        event: &ActionEvent,
        ctx: &StreetContext,
    ) -> Option<&ClassificationRule> {
        self.by_street[event.street.index()]
            .iter()
            .map(|&idx| &self.rules[idx])
            .find(|rule| rule.matches(event, ctx))
    }

    /// Labels a bet or raise. Folds, checks and calls are rejected.
    pub fn classify(
        &self,
        event: &ActionEvent,
        ctx: &StreetContext,
    ) -> Result<ActionLabel, ClassifyError> {
        if !event.token.is_aggressive() {
            return Err(ClassifyError::NotClassifiable(event.token));
        }
        self.first_match(event, ctx)
            .map(|rule| rule.label(ctx))
            .ok_or_else(|| ClassifyError::Gap {
                hand_id: event.hand_id.clone(),
                street: event.street,
                index: event.index,
                token: event.token,
            })
    }
}
