use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo,
    clock::UnixTimestamp,
    program_error::ProgramError,
    program_pack::{IsInitialized, Sealed},
    pubkey::Pubkey,
};

use crate::error::RaffleError;

/// Upper bound on entries per round; sizes the raffle account.
pub const MAX_PARTICIPANTS: usize = 256;

/// Largest `num_words` a randomness request may ask for.
pub const MAX_NUM_WORDS: u32 = 500;

/// Entries per `RaffleSnapshot` page, keeping the snapshot under the
/// 1024 byte return data limit.
pub const SNAPSHOT_PAGE_LEN: usize = 24;

pub const MIN_REQUEST_CONFIRMATIONS: u16 = 3;
pub const MAX_REQUEST_CONFIRMATIONS: u16 = 200;

/// Gas lane used by the local development profile.
pub const DEV_KEY_HASH: [u8; 32] = [
    0x79, 0xd3, 0xd8, 0x83, 0x2d, 0x90, 0x45, 0x92, 0xc0, 0xbf, 0x98, 0x18, 0xb6, 0x21, 0x52, 0x2c,
    0x98, 0x8b, 0xb8, 0xb0, 0xc0, 0x5c, 0xdc, 0x3b, 0x15, 0xae, 0xa1, 0xb6, 0xe8, 0xdb, 0x0c, 0x15,
];

/// Phase of the current round
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RafflePhase {
    /// Accepting entries
    Open,
    /// Randomness requested, waiting on the coordinator
    Calculating,
}

/// Parameters fixed when the raffle is initialized
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaffleConfig {
    /// Minimum payment per entry in lamports
    pub entrance_fee: u64,
    /// Seconds that must pass between settlements
    pub interval: i64,
    /// Authority allowed to deliver randomness
    pub coordinator: Pubkey,
    /// Oracle key / gas lane selector
    pub key_hash: [u8; 32],
    /// Subscription billed for requests
    pub subscription_id: u64,
    /// Confirmations the oracle waits before responding
    pub request_confirmations: u16,
    /// Compute budget reserved for the fulfillment callback
    pub callback_compute_limit: u32,
    /// Random words requested per round
    pub num_words: u32,
}

impl RaffleConfig {
    pub const LEN: usize = 8 + 8 + 32 + 32 + 8 + 2 + 4 + 4;

    pub fn validate(&self) -> Result<(), RaffleError> {
        if self.entrance_fee == 0 || self.interval <= 0 {
            return Err(RaffleError::InvalidConfig);
        }
        if self.num_words == 0 || self.num_words > MAX_NUM_WORDS {
            return Err(RaffleError::InvalidConfig);
        }
        if !(MIN_REQUEST_CONFIRMATIONS..=MAX_REQUEST_CONFIRMATIONS)
            .contains(&self.request_confirmations)
        {
            return Err(RaffleError::InvalidConfig);
        }
        Ok(())
    }
}

impl Default for RaffleConfig {
    // Local development profile: 1 SOL entry, 30 second rounds.
    fn default() -> Self {
        Self {
            entrance_fee: 1_000_000_000,
            interval: 30,
            coordinator: Pubkey::default(),
            key_hash: DEV_KEY_HASH,
            subscription_id: 0,
            request_confirmations: MIN_REQUEST_CONFIRMATIONS,
            callback_compute_limit: 500_000,
            num_words: 1,
        }
    }
}

/// Mutable state of the running round
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RoundState {
    pub phase: RafflePhase,
    /// Entries in insertion order; the index space for winner selection
    pub participants: Vec<Pubkey>,
    /// Sum of all entry payments in this round
    pub pool_balance: u64,
    /// Time of the last settlement, or of initialization
    pub last_settlement_time: UnixTimestamp,
    /// Outstanding randomness request while calculating
    pub pending_request_id: Option<u64>,
    /// When the outstanding request was issued
    pub requested_at: Option<UnixTimestamp>,
    pub recent_winner: Option<Pubkey>,
    /// Successful randomness requests so far; feeds request id derivation
    pub requests_issued: u64,
    /// Rounds settled so far
    pub round_number: u64,
}

impl RoundState {
    pub const LEN: usize = 1 + (4 + 32 * MAX_PARTICIPANTS) + 8 + 8 + 9 + 9 + 33 + 8 + 8;

    pub fn new(now: UnixTimestamp) -> Self {
        Self {
            phase: RafflePhase::Open,
            participants: Vec::new(),
            pool_balance: 0,
            last_settlement_time: now,
            pending_request_id: None,
            requested_at: None,
            recent_winner: None,
            requests_issued: 0,
            round_number: 0,
        }
    }
}

/// The raffle account
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Raffle {
    pub is_initialized: bool,
    /// Bump of the raffle PDA
    pub bump: u8,
    pub config: RaffleConfig,
    pub round: RoundState,
}

impl Sealed for Raffle {}

impl IsInitialized for Raffle {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Raffle {
    pub const LEN: usize = 1 + 1 + RaffleConfig::LEN + RoundState::LEN;

    pub fn new(config: RaffleConfig, bump: u8, now: UnixTimestamp) -> Self {
        Self {
            is_initialized: true,
            bump,
            config,
            round: RoundState::new(now),
        }
    }

    /// Deserialize from account data. Trailing capacity is ignored.
    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        let raffle = Self::deserialize(&mut &data[..])
            .map_err(|_| ProgramError::InvalidAccountData)?;
        if !raffle.is_initialized {
            return Err(RaffleError::NotInitialized.into());
        }
        Ok(raffle)
    }

    pub fn load(account: &AccountInfo) -> Result<Self, ProgramError> {
        Self::unpack(&account.try_borrow_data()?)
    }

    pub fn save(&self, account: &AccountInfo) -> Result<(), ProgramError> {
        let mut data = account.try_borrow_mut_data()?;
        self.serialize(&mut &mut data[..])
            .map_err(|_| ProgramError::AccountDataTooSmall)
    }

    pub fn entrance_fee(&self) -> u64 {
        self.config.entrance_fee
    }

    pub fn interval(&self) -> i64 {
        self.config.interval
    }

    pub fn num_words(&self) -> u32 {
        self.config.num_words
    }

    pub fn request_confirmations(&self) -> u16 {
        self.config.request_confirmations
    }

    pub fn phase(&self) -> RafflePhase {
        self.round.phase
    }

    pub fn pool_balance(&self) -> u64 {
        self.round.pool_balance
    }

    pub fn participants(&self) -> &[Pubkey] {
        &self.round.participants
    }

    pub fn number_of_players(&self) -> u64 {
        self.round.participants.len() as u64
    }

    /// Entry at `index` in the current round.
    pub fn player(&self, index: usize) -> Option<&Pubkey> {
        self.round.participants.get(index)
    }

    pub fn recent_winner(&self) -> Option<Pubkey> {
        self.round.recent_winner
    }

    pub fn last_settlement_time(&self) -> UnixTimestamp {
        self.round.last_settlement_time
    }

    pub fn pending_request_id(&self) -> Option<u64> {
        self.round.pending_request_id
    }

    pub fn round_number(&self) -> u64 {
        self.round.round_number
    }

    /// Seconds the outstanding request has been waiting. A round stuck in
    /// `Calculating` shows up here with an ever-growing value.
    pub fn pending_for(&self, now: UnixTimestamp) -> Option<i64> {
        self.round
            .requested_at
            .map(|at| now.saturating_sub(at).max(0))
    }

    /// Query view with at most `SNAPSHOT_PAGE_LEN` entries starting at
    /// `participants_offset`.
    pub fn snapshot(&self, now: UnixTimestamp, participants_offset: usize) -> RaffleSnapshot {
        let participants = self
            .participants()
            .iter()
            .skip(participants_offset)
            .take(SNAPSHOT_PAGE_LEN)
            .copied()
            .collect();

        RaffleSnapshot {
            phase: self.phase(),
            entrance_fee: self.entrance_fee(),
            interval: self.interval(),
            num_words: self.num_words(),
            request_confirmations: self.request_confirmations(),
            pool_balance: self.pool_balance(),
            number_of_players: self.number_of_players(),
            participants_offset: participants_offset as u32,
            participants,
            recent_winner: self.recent_winner(),
            last_settlement_time: self.last_settlement_time(),
            pending_request_id: self.pending_request_id(),
            pending_for: self.pending_for(now),
            round_number: self.round_number(),
        }
    }
}

/// Read-only view returned by `QueryState`
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RaffleSnapshot {
    pub phase: RafflePhase,
    pub entrance_fee: u64,
    pub interval: i64,
    pub num_words: u32,
    pub request_confirmations: u16,
    pub pool_balance: u64,
    pub number_of_players: u64,
    /// Position of the first entry in `participants`
    pub participants_offset: u32,
    pub participants: Vec<Pubkey>,
    pub recent_winner: Option<Pubkey>,
    pub last_settlement_time: UnixTimestamp,
    pub pending_request_id: Option<u64>,
    pub pending_for: Option<i64>,
    pub round_number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use borsh::BorshSerialize;
    use solana_program::program::MAX_RETURN_DATA;

    fn full_raffle() -> Raffle {
        let mut raffle = Raffle::new(RaffleConfig::default(), 254, 1_000);
        raffle.round.participants = vec![Pubkey::new_unique(); MAX_PARTICIPANTS];
        raffle.round.pending_request_id = Some(u64::MAX);
        raffle.round.requested_at = Some(i64::MAX);
        raffle.round.recent_winner = Some(Pubkey::new_unique());
        raffle
    }

    #[test]
    fn len_covers_largest_layout() {
        let bytes = full_raffle().try_to_vec().unwrap();
        assert_eq!(bytes.len(), Raffle::LEN);
    }

    #[test]
    fn unpack_ignores_trailing_capacity() {
        let raffle = Raffle::new(RaffleConfig::default(), 1, 42);
        let mut data = vec![0u8; Raffle::LEN];
        let bytes = raffle.try_to_vec().unwrap();
        data[..bytes.len()].copy_from_slice(&bytes);

        assert_eq!(Raffle::unpack(&data).unwrap(), raffle);
    }

    #[test]
    fn unpack_rejects_zeroed_account() {
        let data = vec![0u8; Raffle::LEN];
        assert_eq!(
            Raffle::unpack(&data).unwrap_err(),
            ProgramError::from(RaffleError::NotInitialized)
        );
    }

    #[test]
    fn default_config_is_valid() {
        assert!(RaffleConfig::default().validate().is_ok());
    }

    #[test]
    fn config_rejects_out_of_range_values() {
        let base = RaffleConfig::default();
        for bad in [
            RaffleConfig { entrance_fee: 0, ..base },
            RaffleConfig { interval: 0, ..base },
            RaffleConfig { num_words: 0, ..base },
            RaffleConfig { num_words: MAX_NUM_WORDS + 1, ..base },
            RaffleConfig { request_confirmations: 2, ..base },
            RaffleConfig { request_confirmations: 201, ..base },
        ] {
            assert_eq!(bad.validate(), Err(RaffleError::InvalidConfig));
        }
    }

    #[test]
    fn pending_for_reports_stuck_request() {
        let mut raffle = Raffle::new(RaffleConfig::default(), 1, 0);
        assert_eq!(raffle.pending_for(100), None);

        raffle.round.phase = RafflePhase::Calculating;
        raffle.round.pending_request_id = Some(9);
        raffle.round.requested_at = Some(40);
        assert_eq!(raffle.pending_for(100), Some(60));
        assert_eq!(raffle.snapshot(100, 0).pending_for, Some(60));
    }

    #[test]
    fn snapshot_lists_entries_and_request_settings() {
        let config = RaffleConfig {
            num_words: 3,
            request_confirmations: 5,
            ..RaffleConfig::default()
        };
        let mut raffle = Raffle::new(config, 1, 0);
        let players = vec![Pubkey::new_unique(), Pubkey::new_unique()];
        raffle.round.participants = players.clone();
        raffle.round.pool_balance = 2 * config.entrance_fee;

        let snapshot = raffle.snapshot(10, 0);
        assert_eq!(snapshot.participants, players);
        assert_eq!(snapshot.number_of_players, 2);
        assert_eq!(snapshot.num_words, 3);
        assert_eq!(snapshot.request_confirmations, 5);
        assert_eq!(snapshot.pool_balance, 2 * config.entrance_fee);
        assert_eq!(snapshot.pending_for, None);
    }

    #[test]
    fn snapshot_pages_fit_return_data() {
        let raffle = full_raffle();
        let players = raffle.participants();

        let first = raffle.snapshot(0, 0);
        assert_eq!(first.participants, &players[..SNAPSHOT_PAGE_LEN]);
        assert!(first.try_to_vec().unwrap().len() <= MAX_RETURN_DATA);

        let last = raffle.snapshot(0, MAX_PARTICIPANTS - 4);
        assert_eq!(last.participants_offset as usize, MAX_PARTICIPANTS - 4);
        assert_eq!(last.participants, &players[MAX_PARTICIPANTS - 4..]);

        assert!(raffle.snapshot(0, MAX_PARTICIPANTS).participants.is_empty());
    }

    #[test]
    fn player_out_of_range_is_none() {
        let raffle = Raffle::new(RaffleConfig::default(), 1, 0);
        assert_eq!(raffle.player(0), None);
    }
}
