//! Raw hand records to ordered [`ActionEvent`]s.
//!
//! Acting order follows the seat labels: preflop in [`TablePosition::PREFLOP_ORDER`],
//! postflop starting from the small blind. Folded and all-in players leave the
//! acting order; folded players also leave the hand.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::hand::{
    ActionEvent, Blinds, HandRecord, PlayerRef, PotType, Relative, Street, TablePosition, Token,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("missing or zero big blind")]
    MissingBlinds,
    #[error("need at least two players, got {0}")]
    TooFewPlayers(usize),
    #[error("position {0} is seated twice")]
    DuplicatePosition(TablePosition),
    #[error("player {0} is seated twice")]
    DuplicatePlayer(String),
    #[error("street {found} out of order, expected {expected}")]
    StreetOrder { expected: Street, found: Street },
    #[error("more than four streets")]
    TooManyStreets,
    #[error("unparsable action token '{0}'")]
    Token(String),
    #[error("token '{token}' on the {street} but nobody is left to act")]
    NobodyToAct { street: Street, token: String },
    #[error("raise to {to} on the {street} does not exceed the current bet of {current}")]
    IllegalRaise { street: Street, to: u64, current: u64 },
    #[error("{player} cannot {token} on the {street} with {to_call} to call")]
    PotMismatch {
        street: Street,
        player: String,
        token: Token,
        to_call: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawAction {
    Fold,
    Check,
    Call,
    Aggress(u64),
}

fn parse_token(token: &str) -> Result<RawAction, IngestError> {
    let bad = || IngestError::Token(token.to_string());
    let mut chars = token.chars();
    let head = chars.next().ok_or_else(bad)?;
    let rest = chars.as_str();
    match (head.to_ascii_lowercase(), rest.is_empty()) {
        ('f', true) => Ok(RawAction::Fold),
        ('x', true) => Ok(RawAction::Check),
        ('c', true) => Ok(RawAction::Call),
        ('b' | 'r', false) => rest.parse().map(RawAction::Aggress).map_err(|_| bad()),
        _ => Err(bad()),
    }
}

/// A hand that passed ingestion.
#[derive(Debug, Clone)]
pub struct IngestedHand {
    pub hand_id: String,
    pub pot_type: PotType,
    pub timestamp: DateTime<Utc>,
    pub blinds: Blinds,
    pub events: Vec<ActionEvent>,
}

struct SeatState {
    player: PlayerRef,
    position: TablePosition,
    hole_cards: Option<String>,
    stack: u64,
    committed: u64,
    street_invested: u64,
    in_hand: bool,
}

impl SeatState {
    fn remaining(&self) -> u64 {
        self.stack.saturating_sub(self.committed)
    }

    fn put(&mut self, chips: u64) {
        self.committed += chips;
        self.street_invested += chips;
    }
}

pub fn ingest(record: &HandRecord) -> Result<IngestedHand, IngestError> {
    let blinds = record
        .blinds
        .filter(|b| b.big > 0)
        .ok_or(IngestError::MissingBlinds)?;
    if record.players.len() < 2 {
        return Err(IngestError::TooFewPlayers(record.players.len()));
    }

    let mut seats: Vec<SeatState> = Vec::with_capacity(record.players.len());
    for seat in &record.players {
        if seats.iter().any(|s| s.position == seat.position) {
            return Err(IngestError::DuplicatePosition(seat.position));
        }
        if seats.iter().any(|s| s.player.id == seat.player_id) {
            return Err(IngestError::DuplicatePlayer(seat.player_id.clone()));
        }
        seats.push(SeatState {
            player: PlayerRef {
                id: seat.player_id.clone(),
                name: seat.name.clone().unwrap_or_else(|| seat.player_id.clone()),
            },
            position: seat.position,
            hole_cards: seat.hole_cards.clone(),
            stack: seat.stack,
            committed: 0,
            street_invested: 0,
            in_hand: true,
        });
    }
    seats.sort_by_key(|s| s.position);

    let mut pot = 0u64;
    for seat in &mut seats {
        let ante = blinds.ante.min(seat.remaining());
        seat.committed += ante;
        pot += ante;
        let blind = match seat.position {
            TablePosition::Sb => blinds.small,
            TablePosition::Bb => blinds.big,
            _ => 0,
        };
        let blind = blind.min(seat.remaining());
        seat.put(blind);
        pot += blind;
    }

    let mut order: VecDeque<usize> = (0..seats.len()).collect();
    let mut current_bet = blinds.big;
    let mut board_seen = String::new();
    let mut events = Vec::new();
    let mut sequence = 0u32;

    if record.streets.len() > Street::ALL.len() {
        return Err(IngestError::TooManyStreets);
    }

    for (expected, street_record) in Street::ALL.iter().copied().zip(&record.streets) {
        let street = street_record.street;
        if street != expected {
            return Err(IngestError::StreetOrder {
                expected,
                found: street,
            });
        }

        board_seen.push_str(street_record.board.trim());
        if street.is_postflop() {
            for seat in &mut seats {
                seat.street_invested = 0;
            }
            current_bet = 0;
            order = postflop_order(&seats);
        }
        let in_position = last_to_act(&seats);

        for (index, raw) in street_record.actions.iter().enumerate() {
            let action = parse_token(raw)?;
            let in_hand = seats.iter().filter(|s| s.in_hand).count();
            let seat_idx = match order.front() {
                Some(&idx) if in_hand > 1 => idx,
                _ => {
                    return Err(IngestError::NobodyToAct {
                        street,
                        token: raw.clone(),
                    });
                }
            };

            let seat = &mut seats[seat_idx];
            let stack_before = seat.remaining();
            let pot_before = pot;
            let to_call = current_bet.saturating_sub(seat.street_invested);
            let mismatch = |token| IngestError::PotMismatch {
                street,
                player: seat.player.id.clone(),
                token,
                to_call,
            };
            let (token, chips) = match action {
                RawAction::Fold => (Token::Fold, 0),
                // A blind that went all in posting may still check.
                RawAction::Check if to_call > 0 && stack_before > 0 => {
                    return Err(mismatch(Token::Check));
                }
                RawAction::Check => (Token::Check, 0),
                RawAction::Call if to_call == 0 => return Err(mismatch(Token::Call)),
                RawAction::Call => (Token::Call, to_call.min(stack_before)),
                RawAction::Aggress(to) => {
                    if to <= current_bet {
                        return Err(IngestError::IllegalRaise {
                            street,
                            to,
                            current: current_bet,
                        });
                    }
                    let token = if current_bet == 0 {
                        Token::Bet
                    } else {
                        Token::Raise
                    };
                    (token, to.saturating_sub(seat.street_invested).min(stack_before))
                }
            };

            seat.put(chips);
            pot += chips;
            if token.is_aggressive() {
                current_bet = current_bet.max(seat.street_invested);
            }
            let stack_after = seat.remaining();
            let all_in = chips > 0 && stack_after == 0;

            events.push(ActionEvent {
                hand_id: record.hand_id.clone(),
                street,
                index: index as u32,
                sequence,
                player: seat.player.clone(),
                seat: seat.position,
                relative: if Some(seat_idx) == in_position {
                    Relative::InPosition
                } else {
                    Relative::OutOfPosition
                },
                token,
                amount: chips,
                amount_to: seat.street_invested,
                pot_before,
                stack_before,
                stack_after,
                all_in,
                big_blind: blinds.big,
                board: board_seen.clone(),
                hole_cards: seat.hole_cards.clone(),
            });
            sequence += 1;

            if token == Token::Fold {
                seat.in_hand = false;
                order.pop_front();
            } else if all_in {
                order.pop_front();
            } else {
                order.rotate_left(1);
            }
        }
    }

    Ok(IngestedHand {
        hand_id: record.hand_id.clone(),
        pot_type: record.pot_type,
        timestamp: record.timestamp,
        blinds,
        events,
    })
}

fn postflop_order(seats: &[SeatState]) -> VecDeque<usize> {
    let mut idx: Vec<usize> = (0..seats.len())
        .filter(|&i| seats[i].in_hand && seats[i].remaining() > 0)
        .collect();
    idx.sort_by_key(|&i| seats[i].position.postflop_rank());
    idx.into()
}

/// The seat acting last postflop among players still in the hand.
fn last_to_act(seats: &[SeatState]) -> Option<usize> {
    (0..seats.len())
        .filter(|&i| seats[i].in_hand)
        .max_by_key(|&i| seats[i].position.postflop_rank())
}
