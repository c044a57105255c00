// Raffle Program - Utility Functions
use solana_program::pubkey::Pubkey;

/// Seed of the singleton raffle account
pub const RAFFLE_SEED: &[u8] = b"raffle";

/// Find the program derived address of the raffle
pub fn find_raffle_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[RAFFLE_SEED], program_id)
}
