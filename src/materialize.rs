//! Materializer: full rebuild of the aggregate views from the classified
//! action set, and the atomically swapped store that serves them.
//!
//! Scores are summed as integer tenths and every grouping is a `BTreeMap`, so
//! the snapshot depends only on the set of actions, not on their order. Two
//! rebuilds over the same set serialize to identical bytes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::analysis::ClassifiedAction;
use crate::hand::{Street, Token};
use crate::label::ActionLabel;
use crate::scorer::SizeCategory;

/// Population-wide figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSummary {
    pub total_players: u64,
    /// Player-hands: one per player per hand they acted in, so a big blind
    /// walk does not count. Equals the sum of `hands` over all player summaries.
    pub total_hands: u64,
    pub distinct_hands: u64,
    pub total_actions: u64,
    pub scored_actions: u64,
    pub unclassified_actions: u64,
    pub vpip_pct: Option<f64>,
    pub pfr_pct: Option<f64>,
    pub avg_j_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub player_id: String,
    pub name: String,
    pub hands: u64,
    pub avg_j_score: Option<f64>,
    pub vpip_pct: Option<f64>,
    pub pfr_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreetScore {
    pub actions: u64,
    pub scored: u64,
    pub avg_j_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub player_id: String,
    pub name: String,
    pub hands: u64,
    pub actions: u64,
    pub scored_actions: u64,
    pub avg_j_score: Option<f64>,
    pub vpip_hands: u64,
    pub pfr_hands: u64,
    pub vpip_pct: Option<f64>,
    pub pfr_pct: Option<f64>,
    pub streets: BTreeMap<Street, StreetScore>,
    pub labels: BTreeMap<ActionLabel, u64>,
    pub sizes: BTreeMap<SizeCategory, u64>,
    #[serde(default)]
    pub intentions: BTreeMap<String, u64>,
}

/// One complete, internally consistent version of all three views.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub summary: GlobalSummary,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub players: BTreeMap<String, PlayerSummary>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn pct(part: u64, whole: u64) -> Option<f64> {
    (whole > 0).then(|| round2(part as f64 * 100.0 / whole as f64))
}

fn mean_tenths(sum: u64, count: u64) -> Option<f64> {
    (count > 0).then(|| round2(sum as f64 / count as f64 / 10.0))
}

#[derive(Debug, Default, Clone, Copy)]
struct HandFlags {
    vpip: bool,
    pfr: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct ScoreSum {
    actions: u64,
    scored: u64,
    tenths: u64,
}

impl ScoreSum {
    fn add(&mut self, action: &ClassifiedAction) {
        self.actions += 1;
        if let Some(tenths) = action.score.tenths() {
            self.scored += 1;
            self.tenths += tenths;
        }
    }

    fn mean(&self) -> Option<f64> {
        mean_tenths(self.tenths, self.scored)
    }
}

#[derive(Debug, Default)]
struct PlayerAcc {
    name: Option<String>,
    hands: BTreeMap<String, HandFlags>,
    total: ScoreSum,
    streets: BTreeMap<Street, ScoreSum>,
    labels: BTreeMap<ActionLabel, u64>,
    sizes: BTreeMap<SizeCategory, u64>,
    intentions: BTreeMap<String, u64>,
}

impl PlayerAcc {
    fn summary(&self, player_id: &str) -> PlayerSummary {
        let hands = self.hands.len() as u64;
        let vpip_hands = self.hands.values().filter(|f| f.vpip).count() as u64;
        let pfr_hands = self.hands.values().filter(|f| f.pfr).count() as u64;
        PlayerSummary {
            player_id: player_id.to_string(),
            name: self.name.clone().unwrap_or_else(|| player_id.to_string()),
            hands,
            actions: self.total.actions,
            scored_actions: self.total.scored,
            avg_j_score: self.total.mean(),
            vpip_hands,
            pfr_hands,
            vpip_pct: pct(vpip_hands, hands),
            pfr_pct: pct(pfr_hands, hands),
            streets: self
                .streets
                .iter()
                .map(|(street, sum)| {
                    (
                        *street,
                        StreetScore {
                            actions: sum.actions,
                            scored: sum.scored,
                            avg_j_score: sum.mean(),
                        },
                    )
                })
                .collect(),
            labels: self.labels.clone(),
            sizes: self.sizes.clone(),
            intentions: self.intentions.clone(),
        }
    }
}

/// Streaming accumulator behind [`Materializer::rebuild`].
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    players: BTreeMap<String, PlayerAcc>,
    hands: BTreeSet<String>,
    total: ScoreSum,
    unclassified: u64,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: &ClassifiedAction) {
        let event = &action.event;
        self.hands.insert(event.hand_id.clone());
        self.total.add(action);
        if action.label == Some(ActionLabel::Unclassified) {
            self.unclassified += 1;
        }

        let acc = self.players.entry(event.player.id.clone()).or_default();
        // Smallest name seen, so the result does not depend on input order.
        if acc.name.as_ref().is_none_or(|name| event.player.name < *name) {
            acc.name = Some(event.player.name.clone());
        }
        let flags = acc.hands.entry(event.hand_id.clone()).or_default();
        if event.street == Street::Preflop {
            flags.vpip |= matches!(event.token, Token::Call | Token::Bet | Token::Raise);
            flags.pfr |= event.token.is_aggressive();
        }
        acc.total.add(action);
        acc.streets.entry(event.street).or_default().add(action);
        if let Some(label) = action.label {
            *acc.labels.entry(label).or_default() += 1;
        }
        if let Some(size) = action.size {
            *acc.sizes.entry(size).or_default() += 1;
        }
        if let Some(intention) = &action.intention {
            *acc.intentions.entry(intention.clone()).or_default() += 1;
        }
    }

    pub fn finish(self, leaderboard_size: usize, min_hands: u64) -> AggregateSnapshot {
        let players: BTreeMap<String, PlayerSummary> = self
            .players
            .iter()
            .map(|(id, acc)| (id.clone(), acc.summary(id)))
            .collect();

        let total_hands: u64 = players.values().map(|p| p.hands).sum();
        let vpip_hands: u64 = players.values().map(|p| p.vpip_hands).sum();
        let pfr_hands: u64 = players.values().map(|p| p.pfr_hands).sum();

        let summary = GlobalSummary {
            total_players: players.len() as u64,
            total_hands,
            distinct_hands: self.hands.len() as u64,
            total_actions: self.total.actions,
            scored_actions: self.total.scored,
            unclassified_actions: self.unclassified,
            vpip_pct: pct(vpip_hands, total_hands),
            pfr_pct: pct(pfr_hands, total_hands),
            avg_j_score: self.total.mean(),
        };

        let mut ranked: Vec<&PlayerSummary> =
            players.values().filter(|p| p.hands > min_hands).collect();
        ranked.sort_by(|a, b| {
            b.hands
                .cmp(&a.hands)
                .then_with(|| a.player_id.cmp(&b.player_id))
        });
        let leaderboard = ranked
            .into_iter()
            .take(leaderboard_size)
            .enumerate()
            .map(|(i, p)| LeaderboardEntry {
                rank: i as u32 + 1,
                player_id: p.player_id.clone(),
                name: p.name.clone(),
                hands: p.hands,
                avg_j_score: p.avg_j_score,
                vpip_pct: p.vpip_pct,
                pfr_pct: p.pfr_pct,
            })
            .collect();

        AggregateSnapshot {
            summary,
            leaderboard,
            players,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Materializer {
    pub leaderboard_size: usize,
    /// Players need strictly more hands than this to be ranked.
    pub min_hands: u64,
}

impl Default for Materializer {
    fn default() -> Self {
        Self {
            leaderboard_size: 25,
            min_hands: 10,
        }
    }
}

impl Materializer {
    pub fn new(leaderboard_size: usize, min_hands: u64) -> Self {
        Self {
            leaderboard_size,
            min_hands,
        }
    }

    /// Builds a fresh snapshot in one pass over `actions`.
    pub fn rebuild<'a, I>(&self, actions: I) -> AggregateSnapshot
    where
        I: IntoIterator<Item = &'a ClassifiedAction>,
    {
        let mut builder = SnapshotBuilder::new();
        for action in actions {
            builder.push(action);
        }
        builder.finish(self.leaderboard_size, self.min_hands)
    }
}

/// A snapshot as published to readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Published {
    /// 0 for the empty initial snapshot, then one per publish.
    pub generation: u64,
    pub published_at: DateTime<Utc>,
    pub snapshot: AggregateSnapshot,
}

/// Single-writer, multi-reader holder of the current snapshot.
///
/// Readers clone an `Arc` under a short read lock and then work on an
/// immutable value; `publish` replaces the pointer in one step, so a reader
/// sees either the previous snapshot or the new one.
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Arc<Published>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Published {
                generation: 0,
                published_at: Utc::now(),
                snapshot: AggregateSnapshot::default(),
            })),
        }
    }

    pub fn current(&self) -> Arc<Published> {
        Arc::clone(&self.current.read())
    }

    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    /// Swaps in a fully built snapshot and returns its generation.
    pub fn publish(&self, snapshot: AggregateSnapshot) -> u64 {
        let mut current = self.current.write();
        let generation = current.generation + 1;
        *current = Arc::new(Published {
            generation,
            published_at: Utc::now(),
            snapshot,
        });
        generation
    }

    pub fn global_summary(&self) -> GlobalSummary {
        self.current().snapshot.summary.clone()
    }

    pub fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        self.current()
            .snapshot
            .leaderboard
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn player_summary(&self, player_id: &str) -> Option<PlayerSummary> {
        self.current().snapshot.players.get(player_id).cloned()
    }
}
