//! Round state machine.
//!
//! `Open --perform_upkeep--> Calculating --fulfill_random_words--> Open`.
//! Every operation validates before it touches state, so a failed call
//! leaves the raffle exactly as it found it.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{clock::UnixTimestamp, pubkey::Pubkey};

use crate::{
    error::RaffleError,
    events::{EventSink, RaffleEvent},
    state::{Raffle, RafflePhase, MAX_PARTICIPANTS},
    vrf::{winner_index, RandomnessRequest},
};

/// Source of verifiable randomness. Returns the id the matching
/// fulfillment will carry.
pub trait RandomnessOracle {
    fn request_randomness(&mut self, request: &RandomnessRequest) -> Result<u64, RaffleError>;
}

/// Moves the pool to the winner. Must report failure rather than pay
/// partially.
pub trait FundTransfer {
    fn transfer(&mut self, to: &Pubkey, amount: u64) -> Result<(), RaffleError>;
}

/// Result of the upkeep predicate
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct UpkeepCheck {
    pub upkeep_needed: bool,
    /// Caller payload, returned untouched
    pub payload: Vec<u8>,
}

/// Outcome of a settled round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub winner: Pubkey,
    pub winner_index: usize,
    pub payout: u64,
    pub request_id: u64,
}

impl Raffle {
    /// Joins the current round with `amount` lamports.
    pub fn enter(
        &mut self,
        payer: Pubkey,
        amount: u64,
        events: &mut impl EventSink,
    ) -> Result<(), RaffleError> {
        if amount < self.config.entrance_fee {
            return Err(RaffleError::InsufficientPayment);
        }
        if self.round.phase != RafflePhase::Open {
            return Err(RaffleError::RoundNotOpen);
        }
        if self.round.participants.len() >= MAX_PARTICIPANTS {
            return Err(RaffleError::RaffleFull);
        }
        let pool_balance = self
            .round
            .pool_balance
            .checked_add(amount)
            .ok_or(RaffleError::MathOverflow)?;

        self.round.participants.push(payer);
        self.round.pool_balance = pool_balance;

        events.emit(RaffleEvent::RaffleEntered {
            player: payer,
            amount,
        });
        Ok(())
    }

    fn upkeep_needed(&self, now: UnixTimestamp) -> bool {
        let is_open = self.round.phase == RafflePhase::Open;
        let time_passed = now.saturating_sub(self.round.last_settlement_time) >= self.config.interval;
        let has_balance = self.round.pool_balance > 0;
        let has_players = !self.round.participants.is_empty();
        is_open && time_passed && has_balance && has_players
    }

    /// Read-only upkeep predicate.
    pub fn check_upkeep(&self, now: UnixTimestamp, payload: &[u8]) -> UpkeepCheck {
        UpkeepCheck {
            upkeep_needed: self.upkeep_needed(now),
            payload: payload.to_vec(),
        }
    }

    /// Requests randomness and moves the round to `Calculating`. Anyone may
    /// call this; the predicate is re-evaluated here regardless of what the
    /// caller saw.
    pub fn perform_upkeep(
        &mut self,
        now: UnixTimestamp,
        _payload: &[u8],
        oracle: &mut impl RandomnessOracle,
        events: &mut impl EventSink,
    ) -> Result<u64, RaffleError> {
        if !self.upkeep_needed(now) {
            return Err(RaffleError::UpkeepNotNeeded {
                balance: self.round.pool_balance,
                participants: self.number_of_players(),
                phase: self.round.phase,
            });
        }
        let requests_issued = self
            .round
            .requests_issued
            .checked_add(1)
            .ok_or(RaffleError::MathOverflow)?;

        let request = RandomnessRequest::from(&self.config);
        let request_id = oracle.request_randomness(&request)?;

        self.round.phase = RafflePhase::Calculating;
        self.round.pending_request_id = Some(request_id);
        self.round.requested_at = Some(now);
        self.round.requests_issued = requests_issued;

        events.emit(RaffleEvent::RequestedRaffleWinner {
            request_id,
            round_number: self.round.round_number,
        });
        Ok(request_id)
    }

    /// Winner of the outstanding request for `random_words`, without settling.
    pub fn select_winner(
        &self,
        request_id: u64,
        random_words: &[u64],
    ) -> Result<(usize, Pubkey), RaffleError> {
        if self.round.phase != RafflePhase::Calculating
            || self.round.pending_request_id != Some(request_id)
        {
            return Err(RaffleError::UnknownRequest);
        }
        let word = *random_words.first().ok_or(RaffleError::MissingRandomWords)?;
        // Guarded by perform_upkeep, which never leaves Open with no entries.
        let index = winner_index(word, self.round.participants.len())
            .ok_or(RaffleError::UnknownRequest)?;
        Ok((index, self.round.participants[index]))
    }

    /// Consumes the coordinator's answer: picks the winner, pays the whole
    /// pool and opens the next round. If the payout fails nothing changes and
    /// the same request can be fulfilled again.
    pub fn fulfill_random_words(
        &mut self,
        request_id: u64,
        random_words: &[u64],
        now: UnixTimestamp,
        payout: &mut impl FundTransfer,
        events: &mut impl EventSink,
    ) -> Result<Settlement, RaffleError> {
        let (index, winner) = self.select_winner(request_id, random_words)?;
        let amount = self.round.pool_balance;
        let round_number = self
            .round
            .round_number
            .checked_add(1)
            .ok_or(RaffleError::MathOverflow)?;

        payout.transfer(&winner, amount)?;

        self.round.recent_winner = Some(winner);
        self.round.participants.clear();
        self.round.pool_balance = 0;
        self.round.last_settlement_time = now;
        self.round.pending_request_id = None;
        self.round.requested_at = None;
        self.round.phase = RafflePhase::Open;
        self.round.round_number = round_number;

        events.emit(RaffleEvent::WinnerPicked {
            winner,
            payout: amount,
            request_id,
            round_number,
        });
        Ok(Settlement {
            winner,
            winner_index: index,
            payout: amount,
            request_id,
        })
    }
}
