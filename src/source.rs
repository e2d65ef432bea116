//! Raw hand record sources.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::cards::{Card, format_cards, shuffled_deck};
use crate::hand::{Blinds, HandRecord, PotType, Seat, Street, StreetRecord, TablePosition};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Records fetched in one cycle plus the ones that could not be decoded.
#[derive(Debug, Clone, Default)]
pub struct FetchBatch {
    pub records: Vec<HandRecord>,
    pub malformed: usize,
}

/// Upstream producer of raw hand histories.
#[async_trait]
pub trait HandSource: Send + Sync {
    fn name(&self) -> &str;

    /// Records that may be new. `since` is the newest hand timestamp of the
    /// last successful cycle; sources with a time-ordered feed may use it to
    /// skip work. Returning an already seen hand is allowed; the pipeline
    /// skips it.
    async fn fetch_since(&self, since: Option<DateTime<Utc>>) -> Result<FetchBatch, SourceError>;
}

/// Reads `*.json` files from a directory. Each file holds one record or an
/// array of records; undecodable entries are counted as malformed.
///
/// Files can land in any timestamp order, so every fetch rereads the whole
/// directory and ignores `since`.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn json_files(&self) -> Result<Vec<PathBuf>, SourceError> {
        let io = |source| SourceError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io)? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn decode_file(path: &Path, bytes: &[u8], batch: &mut FetchBatch) {
    let value: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "unreadable hand file");
            batch.malformed += 1;
            return;
        }
    };
    let items = match value {
        serde_json::Value::Array(items) => items,
        single => vec![single],
    };
    for item in items {
        match serde_json::from_value::<HandRecord>(item) {
            Ok(record) => batch.records.push(record),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "undecodable hand record");
                batch.malformed += 1;
            }
        }
    }
}

#[async_trait]
impl HandSource for JsonDirSource {
    fn name(&self) -> &str {
        "json-dir"
    }

    async fn fetch_since(&self, _since: Option<DateTime<Utc>>) -> Result<FetchBatch, SourceError> {
        let mut batch = FetchBatch::default();
        for path in self.json_files().await? {
            let bytes = tokio::fs::read(&path).await.map_err(|source| SourceError::Io {
                path: path.clone(),
                source,
            })?;
            decode_file(&path, &bytes, &mut batch);
        }
        debug!(
            dir = %self.dir.display(),
            records = batch.records.len(),
            malformed = batch.malformed,
            "scanned hand directory"
        );
        Ok(batch)
    }
}

const SYNTHETIC_EPOCH: i64 = 1_704_067_200;
const SMALL_BLIND: u64 = 50;
const BIG_BLIND: u64 = 100;
const STACK: u64 = 10_000_000;
const MAX_RAISES_PER_STREET: u32 = 3;

struct SyntheticState {
    rng: ChaCha8Rng,
    counter: u64,
    clock: DateTime<Utc>,
}

/// Seeded generator of well-formed hand histories.
///
/// Every call produces `hands_per_fetch` new hands with strictly increasing
/// timestamps. The same seed always yields the same sequence.
pub struct SyntheticSource {
    seed: u64,
    hands_per_fetch: usize,
    pool: usize,
    state: Mutex<SyntheticState>,
}

impl SyntheticSource {
    pub fn new(seed: u64, hands_per_fetch: usize) -> Self {
        Self {
            seed,
            hands_per_fetch,
            pool: 12,
            state: Mutex::new(SyntheticState {
                rng: ChaCha8Rng::seed_from_u64(seed),
                counter: 0,
                clock: DateTime::from_timestamp(SYNTHETIC_EPOCH, 0).unwrap_or_default(),
            }),
        }
    }

    /// Number of distinct players hands are drawn from (at least six).
    pub fn with_player_pool(mut self, pool: usize) -> Self {
        self.pool = pool.max(6);
        self
    }

    /// Generates a batch without going through the async trait.
    pub fn generate(&self, hands: usize) -> Vec<HandRecord> {
        let mut state = self.state.lock();
        (0..hands)
            .map(|_| {
                state.counter += 1;
                state.clock += Duration::seconds(37);
                let hand_id = format!("syn-{}-{:08}", self.seed, state.counter);
                let timestamp = state.clock;
                deal_hand(&mut state.rng, hand_id, timestamp, self.pool)
            })
            .collect()
    }
}

#[async_trait]
impl HandSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn fetch_since(&self, _since: Option<DateTime<Utc>>) -> Result<FetchBatch, SourceError> {
        Ok(FetchBatch {
            records: self.generate(self.hands_per_fetch),
            malformed: 0,
        })
    }
}

/// Mirrors the acting-order bookkeeping of ingestion so that every generated
/// token sequence is legal.
struct TableSim {
    street_invested: Vec<u64>,
    committed: Vec<u64>,
    in_hand: Vec<bool>,
    pot: u64,
}

impl TableSim {
    fn players_in(&self) -> usize {
        self.in_hand.iter().filter(|p| **p).count()
    }

    fn put(&mut self, seat: usize, chips: u64) {
        self.street_invested[seat] += chips;
        self.committed[seat] += chips;
        self.pot += chips;
    }

    /// Everyone still in could match a bet to `to` without going all in.
    fn affordable(&self, to: u64) -> bool {
        (0..self.in_hand.len())
            .filter(|&i| self.in_hand[i])
            .all(|i| self.committed[i] + to.saturating_sub(self.street_invested[i]) < STACK)
    }
}

fn deal_hand(rng: &mut ChaCha8Rng, hand_id: String, timestamp: DateTime<Utc>, pool: usize) -> HandRecord {
    let n = rng.gen_range(3..=6);
    let positions = TablePosition::for_table(n);
    let ids: Vec<usize> = (0..pool).collect();
    let chosen: Vec<usize> = ids.choose_multiple(rng, n).copied().collect();
    let mut deck = shuffled_deck(rng).into_iter();
    let mut draw = |count: usize| -> Vec<Card> { deck.by_ref().take(count).collect() };

    let players: Vec<Seat> = positions
        .iter()
        .zip(&chosen)
        .map(|(&position, &player)| {
            let hole = draw(2);
            Seat {
                player_id: format!("p{player:03}"),
                name: Some(format!("Player {player}")),
                position,
                stack: STACK,
                hole_cards: Some(format_cards(&hole)),
            }
        })
        .collect();
    let board = draw(5);

    let mut sim = TableSim {
        street_invested: vec![0; n],
        committed: vec![0; n],
        in_hand: vec![true; n],
        pot: 0,
    };
    sim.put(n - 2, SMALL_BLIND);
    sim.put(n - 1, BIG_BLIND);

    let mut streets = Vec::new();
    let mut dealt = 0;
    for street in Street::ALL {
        if sim.players_in() < 2 {
            break;
        }
        let cards = street.dealt_cards();
        let street_board = format_cards(&board[dealt..dealt + cards]);
        dealt += cards;

        let order: VecDeque<usize> = if street == Street::Preflop {
            (0..n).collect()
        } else {
            sim.street_invested.iter_mut().for_each(|v| *v = 0);
            let mut idx: Vec<usize> = (0..n).filter(|&i| sim.in_hand[i]).collect();
            idx.sort_by_key(|&i| positions[i].postflop_rank());
            idx.into()
        };
        let current_bet = if street == Street::Preflop { BIG_BLIND } else { 0 };
        let actions = play_street(rng, &mut sim, order, current_bet, street);

        streets.push(StreetRecord {
            street,
            board: street_board,
            actions,
        });
    }

    HandRecord {
        hand_id,
        blinds: Some(Blinds {
            small: SMALL_BLIND,
            big: BIG_BLIND,
            ante: 0,
        }),
        players,
        streets,
        pot_type: if rng.gen_bool(0.8) {
            PotType::Cash
        } else {
            PotType::Tournament
        },
        timestamp,
    }
}

fn play_street(
    rng: &mut ChaCha8Rng,
    sim: &mut TableSim,
    mut order: VecDeque<usize>,
    mut current_bet: u64,
    street: Street,
) -> Vec<String> {
    let mut pending: Vec<usize> = order.iter().copied().collect();
    let mut raises = 0u32;
    let mut tokens = Vec::new();

    while sim.players_in() > 1 && !pending.is_empty() {
        let Some(&seat) = order.front() else { break };
        let to_call = current_bet.saturating_sub(sim.street_invested[seat]);
        let can_raise = raises < MAX_RAISES_PER_STREET;
        let roll: f64 = rng.gen_range(0.0..1.0);

        let to = if current_bet == 0 {
            let fraction = rng.gen_range(25..=150) as u64;
            (sim.pot * fraction / 100).max(BIG_BLIND)
        } else {
            current_bet * 2 + rng.gen_range(0..=current_bet)
        };
        let aggress = can_raise
            && sim.affordable(to)
            && if to_call == 0 { roll < 0.35 } else { roll < 0.15 };
        let fold = !aggress && to_call > 0 && roll > 0.55;

        if aggress {
            tokens.push(if current_bet == 0 && street.is_postflop() {
                format!("b{to}")
            } else {
                format!("r{to}")
            });
            sim.put(seat, to - sim.street_invested[seat]);
            current_bet = to;
            raises += 1;
            pending = order.iter().copied().filter(|&s| s != seat).collect();
            order.rotate_left(1);
        } else if fold {
            tokens.push("f".to_string());
            sim.in_hand[seat] = false;
            pending.retain(|&s| s != seat);
            order.pop_front();
        } else {
            tokens.push(if to_call == 0 { "x" } else { "c" }.to_string());
            sim.put(seat, to_call);
            pending.retain(|&s| s != seat);
            order.rotate_left(1);
        }
    }
    tokens
}
