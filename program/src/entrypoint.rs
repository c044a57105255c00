// Define the standard Solana entrypoint
use solana_program::entrypoint;

use crate::process_instruction;

entrypoint!(process_instruction);
