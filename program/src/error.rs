use solana_program::{
    decode_error::DecodeError, msg, program_error::PrintProgramError,
    program_error::ProgramError,
};
use thiserror::Error;

use crate::state::RafflePhase;

/// Errors that may be returned by the raffle program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstructionData,

    /// Payment is below the entrance fee
    #[error("Not enough lamports entered")]
    InsufficientPayment,

    /// The round is calculating a winner and rejects entries
    #[error("Raffle is not open")]
    RoundNotOpen,

    /// performUpkeep was called while the upkeep predicate is false
    #[error("Upkeep not needed: balance={balance}, participants={participants}, phase={phase:?}")]
    UpkeepNotNeeded {
        balance: u64,
        participants: u64,
        phase: RafflePhase,
    },

    /// Fulfillment does not match the outstanding request
    #[error("Unknown or stale randomness request")]
    UnknownRequest,

    /// The winner could not be paid; settlement is rolled back
    #[error("Payout transfer to winner failed")]
    PayoutTransferFailed,

    /// Fulfillment carried no random words
    #[error("Fulfillment carried no random words")]
    MissingRandomWords,

    /// Only the configured coordinator may deliver randomness
    #[error("Caller is not the randomness coordinator")]
    UnauthorizedCoordinator,

    /// Raffle account is already initialized
    #[error("Raffle already initialized")]
    AlreadyInitialized,

    /// Raffle account is not initialized
    #[error("Raffle not initialized")]
    NotInitialized,

    /// Account passed as the raffle is not the program's raffle PDA
    #[error("Invalid raffle account")]
    InvalidRaffleAccount,

    /// Participant list reached account capacity
    #[error("Raffle is full")]
    RaffleFull,

    /// Checked arithmetic failed
    #[error("Math overflow")]
    MathOverflow,

    /// Initialization parameters are out of range
    #[error("Invalid raffle configuration")]
    InvalidConfig,
}

impl RaffleError {
    /// Stable on-chain error code.
    pub fn code(&self) -> u32 {
        match self {
            RaffleError::InvalidInstructionData => 0,
            RaffleError::InsufficientPayment => 1,
            RaffleError::RoundNotOpen => 2,
            RaffleError::UpkeepNotNeeded { .. } => 3,
            RaffleError::UnknownRequest => 4,
            RaffleError::PayoutTransferFailed => 5,
            RaffleError::MissingRandomWords => 6,
            RaffleError::UnauthorizedCoordinator => 7,
            RaffleError::AlreadyInitialized => 8,
            RaffleError::NotInitialized => 9,
            RaffleError::InvalidRaffleAccount => 10,
            RaffleError::RaffleFull => 11,
            RaffleError::MathOverflow => 12,
            RaffleError::InvalidConfig => 13,
        }
    }
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e.code())
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

impl PrintProgramError for RaffleError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upkeep_not_needed_carries_diagnostics() {
        let err = RaffleError::UpkeepNotNeeded {
            balance: 300,
            participants: 3,
            phase: RafflePhase::Calculating,
        };
        assert_eq!(
            err.to_string(),
            "Upkeep not needed: balance=300, participants=3, phase=Calculating"
        );
        assert_eq!(ProgramError::from(err), ProgramError::Custom(3));
    }

    #[test]
    fn codes_are_distinct() {
        let all = [
            RaffleError::InvalidInstructionData,
            RaffleError::InsufficientPayment,
            RaffleError::RoundNotOpen,
            RaffleError::UpkeepNotNeeded {
                balance: 0,
                participants: 0,
                phase: RafflePhase::Open,
            },
            RaffleError::UnknownRequest,
            RaffleError::PayoutTransferFailed,
            RaffleError::MissingRandomWords,
            RaffleError::UnauthorizedCoordinator,
            RaffleError::AlreadyInitialized,
            RaffleError::NotInitialized,
            RaffleError::InvalidRaffleAccount,
            RaffleError::RaffleFull,
            RaffleError::MathOverflow,
            RaffleError::InvalidConfig,
        ];
        let mut codes: Vec<u32> = all.iter().map(RaffleError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}
