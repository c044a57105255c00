// Randomness coordinator integration
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{hash::hashv, log::sol_log_data, msg, pubkey::Pubkey};

use crate::{engine::RandomnessOracle, error::RaffleError, state::RaffleConfig};

/// Parameters forwarded to the coordinator with each request
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RandomnessRequest {
    pub key_hash: [u8; 32],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_compute_limit: u32,
    pub num_words: u32,
}

impl From<&RaffleConfig> for RandomnessRequest {
    fn from(config: &RaffleConfig) -> Self {
        Self {
            key_hash: config.key_hash,
            subscription_id: config.subscription_id,
            request_confirmations: config.request_confirmations,
            callback_compute_limit: config.callback_compute_limit,
            num_words: config.num_words,
        }
    }
}

/// Log record the off-chain coordinator watches for
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RandomWordsRequested {
    pub request_id: u64,
    pub consumer: Pubkey,
    pub nonce: u64,
    pub request: RandomnessRequest,
}

/// Request id for the `nonce`-th request of `consumer`.
pub fn derive_request_id(request: &RandomnessRequest, consumer: &Pubkey, nonce: u64) -> u64 {
    let hash = hashv(&[
        &request.key_hash,
        consumer.as_ref(),
        &request.subscription_id.to_le_bytes(),
        &nonce.to_le_bytes(),
    ]);
    let mut id = [0u8; 8];
    id.copy_from_slice(&hash.as_ref()[..8]);
    u64::from_le_bytes(id)
}

/// Oracle capability backed by an off-chain coordinator. Issuing a request
/// publishes it to the log; the coordinator answers later with a separate
/// `FulfillRandomWords` instruction.
pub struct CoordinatorOracle {
    consumer: Pubkey,
    nonce: u64,
}

impl CoordinatorOracle {
    pub fn new(consumer: Pubkey, nonce: u64) -> Self {
        Self { consumer, nonce }
    }
}

impl RandomnessOracle for CoordinatorOracle {
    fn request_randomness(&mut self, request: &RandomnessRequest) -> Result<u64, RaffleError> {
        let request_id = derive_request_id(request, &self.consumer, self.nonce);
        let record = RandomWordsRequested {
            request_id,
            consumer: self.consumer,
            nonce: self.nonce,
            request: *request,
        };
        msg!(
            "RandomWordsRequested: request_id={}, consumer={}, num_words={}, confirmations={}",
            request_id,
            self.consumer,
            request.num_words,
            request.request_confirmations
        );
        let bytes = record
            .try_to_vec()
            .map_err(|_| RaffleError::InvalidInstructionData)?;
        sol_log_data(&[&bytes]);
        Ok(request_id)
    }
}

/// Index of the winning entry.
///
/// Plain modulo over the entry count. When `len` does not divide 2^64 the
/// low indexes are favoured by at most `len / 2^64`, which is accepted as an
/// approximation of a uniform draw, not a guarantee of one.
pub fn winner_index(random_word: u64, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some((random_word % len as u64) as usize)
}
