use arrayref::{array_ref, array_refs};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use std::mem::size_of;

use crate::{
    error::RaffleError,
    state::{RaffleConfig, MAX_NUM_WORDS},
    utils::find_raffle_address,
};

#[derive(Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Create the raffle and open the first round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The authority, pays for the raffle account
    /// 1. `[writable]` The raffle account (PDA)
    /// 2. `[]` The randomness coordinator authority
    /// 3. `[]` The system program
    Initialize {
        /// Minimum payment per entry in lamports
        entrance_fee: u64,
        /// Seconds between settlements
        interval: i64,
        key_hash: [u8; 32],
        subscription_id: u64,
        request_confirmations: u16,
        callback_compute_limit: u32,
        num_words: u32,
    },

    /// Enter the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The player
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The system program
    EnterRaffle {
        /// Lamports paid, at least the entrance fee
        amount: u64,
    },

    /// Evaluate the upkeep predicate; answers through return data
    ///
    /// Accounts expected:
    /// 0. `[]` The raffle account
    CheckUpkeep { payload: Vec<u8> },

    /// Request randomness if upkeep is needed (anyone can call this)
    ///
    /// Accounts expected:
    /// 0. `[signer]` Any caller
    /// 1. `[writable]` The raffle account
    PerformUpkeep { payload: Vec<u8> },

    /// Deliver randomness for the outstanding request
    ///
    /// Accounts expected:
    /// 0. `[signer]` The randomness coordinator authority
    /// 1. `[writable]` The raffle account
    /// 2. `[writable]` The winner, receives the pool
    FulfillRandomWords {
        request_id: u64,
        random_words: Vec<u64>,
    },

    /// Report the raffle snapshot through return data. Entries are paged
    /// from `participants_offset`.
    ///
    /// Accounts expected:
    /// 0. `[]` The raffle account
    QueryState { participants_offset: u32 },
}

impl RaffleInstruction {
    const INITIALIZE_LEN: usize = 8 + 8 + 32 + 8 + 2 + 4 + 4;

    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(RaffleError::InvalidInstructionData)?;

        Ok(match tag {
            0 => {
                if rest.len() < Self::INITIALIZE_LEN {
                    return Err(RaffleError::InvalidInstructionData.into());
                }
                let src = array_ref![rest, 0, RaffleInstruction::INITIALIZE_LEN];
                let (
                    entrance_fee,
                    interval,
                    key_hash,
                    subscription_id,
                    request_confirmations,
                    callback_compute_limit,
                    num_words,
                ) = array_refs![src, 8, 8, 32, 8, 2, 4, 4];
                Self::Initialize {
                    entrance_fee: u64::from_le_bytes(*entrance_fee),
                    interval: i64::from_le_bytes(*interval),
                    key_hash: *key_hash,
                    subscription_id: u64::from_le_bytes(*subscription_id),
                    request_confirmations: u16::from_le_bytes(*request_confirmations),
                    callback_compute_limit: u32::from_le_bytes(*callback_compute_limit),
                    num_words: u32::from_le_bytes(*num_words),
                }
            }
            1 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::EnterRaffle { amount }
            }
            2 => {
                let (payload, _) = Self::unpack_bytes(rest)?;
                Self::CheckUpkeep { payload }
            }
            3 => {
                let (payload, _) = Self::unpack_bytes(rest)?;
                Self::PerformUpkeep { payload }
            }
            4 => {
                let (request_id, rest) = Self::unpack_u64(rest)?;
                let (count, mut rest) = Self::unpack_u32(rest)?;
                if count > MAX_NUM_WORDS {
                    return Err(RaffleError::InvalidInstructionData.into());
                }
                let mut random_words = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let (word, next) = Self::unpack_u64(rest)?;
                    random_words.push(word);
                    rest = next;
                }
                Self::FulfillRandomWords {
                    request_id,
                    random_words,
                }
            }
            5 => {
                let (participants_offset, _) = Self::unpack_u32(rest)?;
                Self::QueryState {
                    participants_offset,
                }
            }
            _ => return Err(RaffleError::InvalidInstructionData.into()),
        })
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        if input.len() < 8 {
            return Err(RaffleError::InvalidInstructionData.into());
        }
        let (value, rest) = input.split_at(8);
        Ok((u64::from_le_bytes(*array_ref![value, 0, 8]), rest))
    }

    fn unpack_u32(input: &[u8]) -> Result<(u32, &[u8]), ProgramError> {
        if input.len() < 4 {
            return Err(RaffleError::InvalidInstructionData.into());
        }
        let (value, rest) = input.split_at(4);
        Ok((u32::from_le_bytes(*array_ref![value, 0, 4]), rest))
    }

    fn unpack_bytes(input: &[u8]) -> Result<(Vec<u8>, &[u8]), ProgramError> {
        let (len, rest) = Self::unpack_u32(input)?;
        let len = len as usize;
        if rest.len() < len {
            return Err(RaffleError::InvalidInstructionData.into());
        }
        let (bytes, rest) = rest.split_at(len);
        Ok((bytes.to_vec(), rest))
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(size_of::<Self>());
        match self {
            Self::Initialize {
                entrance_fee,
                interval,
                key_hash,
                subscription_id,
                request_confirmations,
                callback_compute_limit,
                num_words,
            } => {
                buf.push(0);
                buf.extend_from_slice(&entrance_fee.to_le_bytes());
                buf.extend_from_slice(&interval.to_le_bytes());
                buf.extend_from_slice(key_hash);
                buf.extend_from_slice(&subscription_id.to_le_bytes());
                buf.extend_from_slice(&request_confirmations.to_le_bytes());
                buf.extend_from_slice(&callback_compute_limit.to_le_bytes());
                buf.extend_from_slice(&num_words.to_le_bytes());
            }
            Self::EnterRaffle { amount } => {
                buf.push(1);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::CheckUpkeep { payload } => {
                buf.push(2);
                buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
                buf.extend_from_slice(payload);
            }
            Self::PerformUpkeep { payload } => {
                buf.push(3);
                buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
                buf.extend_from_slice(payload);
            }
            Self::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                buf.push(4);
                buf.extend_from_slice(&request_id.to_le_bytes());
                buf.extend_from_slice(&(random_words.len() as u32).to_le_bytes());
                for word in random_words {
                    buf.extend_from_slice(&word.to_le_bytes());
                }
            }
            Self::QueryState {
                participants_offset,
            } => {
                buf.push(5);
                buf.extend_from_slice(&participants_offset.to_le_bytes());
            }
        }
        buf
    }
}

/// Create initialize instruction. The coordinator comes from `config`.
pub fn initialize(program_id: &Pubkey, authority: &Pubkey, config: &RaffleConfig) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);
    let data = RaffleInstruction::Initialize {
        entrance_fee: config.entrance_fee,
        interval: config.interval,
        key_hash: config.key_hash,
        subscription_id: config.subscription_id,
        request_confirmations: config.request_confirmations,
        callback_compute_limit: config.callback_compute_limit,
        num_words: config.num_words,
    }
    .pack();

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*authority, true),
            AccountMeta::new(raffle, false),
            AccountMeta::new_readonly(config.coordinator, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    }
}

/// Create enter_raffle instruction
pub fn enter_raffle(program_id: &Pubkey, player: &Pubkey, amount: u64) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*player, true),
            AccountMeta::new(raffle, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: RaffleInstruction::EnterRaffle { amount }.pack(),
    }
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey, payload: Vec<u8>) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);
    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(raffle, false)],
        data: RaffleInstruction::CheckUpkeep { payload }.pack(),
    }
}

/// Create perform_upkeep instruction
pub fn perform_upkeep(program_id: &Pubkey, caller: &Pubkey, payload: Vec<u8>) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*caller, true),
            AccountMeta::new(raffle, false),
        ],
        data: RaffleInstruction::PerformUpkeep { payload }.pack(),
    }
}

/// Create fulfill_random_words instruction
pub fn fulfill_random_words(
    program_id: &Pubkey,
    coordinator: &Pubkey,
    winner: &Pubkey,
    request_id: u64,
    random_words: Vec<u64>,
) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*coordinator, true),
            AccountMeta::new(raffle, false),
            AccountMeta::new(*winner, false),
        ],
        data: RaffleInstruction::FulfillRandomWords {
            request_id,
            random_words,
        }
        .pack(),
    }
}

/// Create query_state instruction
pub fn query_state(program_id: &Pubkey, participants_offset: u32) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);
    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(raffle, false)],
        data: RaffleInstruction::QueryState {
            participants_offset,
        }
        .pack(),
    }
}
