// Raffle Program - Instruction Processor
use borsh::BorshSerialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction, system_program,
    sysvar::Sysvar,
};

use crate::{
    engine::FundTransfer,
    error::RaffleError,
    events::{EventSink, ProgramLog, RaffleEvent},
    instruction::RaffleInstruction,
    state::{Raffle, RaffleConfig},
    utils::{find_raffle_address, RAFFLE_SEED},
    vrf::CoordinatorOracle,
};

/// Pays the winner out of the raffle account's lamports. The rent-exempt
/// reserve is never touched.
pub struct LamportPayout<'a, 'info> {
    vault: &'a AccountInfo<'info>,
    recipient: &'a AccountInfo<'info>,
    reserve: u64,
}

impl<'a, 'info> LamportPayout<'a, 'info> {
    pub fn new(vault: &'a AccountInfo<'info>, recipient: &'a AccountInfo<'info>, reserve: u64) -> Self {
        Self {
            vault,
            recipient,
            reserve,
        }
    }
}

impl<'a, 'info> FundTransfer for LamportPayout<'a, 'info> {
    fn transfer(&mut self, to: &Pubkey, amount: u64) -> Result<(), RaffleError> {
        if self.recipient.key != to || !self.recipient.is_writable {
            msg!("Winner account {} does not match selected winner {}", self.recipient.key, to);
            return Err(RaffleError::PayoutTransferFailed);
        }
        let vault_after = self
            .vault
            .lamports()
            .checked_sub(amount)
            .filter(|rest| *rest >= self.reserve)
            .ok_or(RaffleError::PayoutTransferFailed)?;
        let recipient_after = self
            .recipient
            .lamports()
            .checked_add(amount)
            .ok_or(RaffleError::PayoutTransferFailed)?;

        **self
            .vault
            .try_borrow_mut_lamports()
            .map_err(|_| RaffleError::PayoutTransferFailed)? = vault_after;
        **self
            .recipient
            .try_borrow_mut_lamports()
            .map_err(|_| RaffleError::PayoutTransferFailed)? = recipient_after;
        Ok(())
    }
}

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::Initialize {
                entrance_fee,
                interval,
                key_hash,
                subscription_id,
                request_confirmations,
                callback_compute_limit,
                num_words,
            } => {
                msg!("Instruction: Initialize");
                let config = RaffleConfig {
                    entrance_fee,
                    interval,
                    // taken from the accounts
                    coordinator: Pubkey::default(),
                    key_hash,
                    subscription_id,
                    request_confirmations,
                    callback_compute_limit,
                    num_words,
                };
                Self::process_initialize(accounts, config, program_id)
            }
            RaffleInstruction::EnterRaffle { amount } => {
                msg!("Instruction: Enter Raffle");
                Self::process_enter_raffle(accounts, amount, program_id)
            }
            RaffleInstruction::CheckUpkeep { payload } => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(accounts, &payload, program_id)
            }
            RaffleInstruction::PerformUpkeep { payload } => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(accounts, &payload, program_id)
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(accounts, request_id, &random_words, program_id)
            }
            RaffleInstruction::QueryState {
                participants_offset,
            } => {
                msg!("Instruction: Query State");
                Self::process_query_state(accounts, participants_offset, program_id)
            }
        }
    }

    /// Creates the raffle PDA and opens the first round
    fn process_initialize(
        accounts: &[AccountInfo],
        mut config: RaffleConfig,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            msg!("Authority must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if *system_program_info.key != system_program::id() {
            return Err(ProgramError::IncorrectProgramId);
        }

        let (expected_raffle, bump) = find_raffle_address(program_id);
        if *raffle_info.key != expected_raffle {
            msg!("Invalid raffle account address");
            return Err(RaffleError::InvalidRaffleAccount.into());
        }
        if raffle_info.owner == program_id {
            msg!("Raffle account is already initialized");
            return Err(RaffleError::AlreadyInitialized.into());
        }

        config.coordinator = *coordinator_info.key;
        config.validate()?;

        Self::create_raffle_account(authority_info, raffle_info, system_program_info, bump, program_id)?;

        let now = Clock::get()?.unix_timestamp;
        Raffle::new(config, bump, now).save(raffle_info)?;

        msg!(
            "Raffle initialized: EntranceFee={}, Interval={}s, Coordinator={}",
            config.entrance_fee,
            config.interval,
            config.coordinator
        );
        Ok(())
    }

    /// Allocates the raffle PDA. An address that already holds lamports
    /// cannot go through `create_account`, so it is topped up to the rent
    /// minimum, then allocated and assigned in place.
    fn create_raffle_account<'a>(
        authority_info: &AccountInfo<'a>,
        raffle_info: &AccountInfo<'a>,
        system_program_info: &AccountInfo<'a>,
        bump: u8,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let rent = Rent::get()?;
        let required_lamports = rent.minimum_balance(Raffle::LEN);
        let signer_seeds: &[&[u8]] = &[RAFFLE_SEED, &[bump]];

        if raffle_info.lamports() == 0 {
            return invoke_signed(
                &system_instruction::create_account(
                    authority_info.key,
                    raffle_info.key,
                    required_lamports,
                    Raffle::LEN as u64,
                    program_id,
                ),
                &[
                    authority_info.clone(),
                    raffle_info.clone(),
                    system_program_info.clone(),
                ],
                &[signer_seeds],
            );
        }

        msg!("Raffle address pre-funded with {} lamports", raffle_info.lamports());
        let top_up = required_lamports.saturating_sub(raffle_info.lamports());
        if top_up > 0 {
            invoke(
                &system_instruction::transfer(authority_info.key, raffle_info.key, top_up),
                &[
                    authority_info.clone(),
                    raffle_info.clone(),
                    system_program_info.clone(),
                ],
            )?;
        }
        invoke_signed(
            &system_instruction::allocate(raffle_info.key, Raffle::LEN as u64),
            &[raffle_info.clone(), system_program_info.clone()],
            &[signer_seeds],
        )?;
        invoke_signed(
            &system_instruction::assign(raffle_info.key, program_id),
            &[raffle_info.clone(), system_program_info.clone()],
            &[signer_seeds],
        )
    }

    fn process_enter_raffle(
        accounts: &[AccountInfo],
        amount: u64,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let player_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !player_info.is_signer {
            msg!("Player must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        Self::check_raffle_account(raffle_info, program_id)?;

        let mut raffle = Raffle::load(raffle_info)?;
        let mut events = Vec::new();
        raffle.enter(*player_info.key, amount, &mut events)?;

        invoke(
            &system_instruction::transfer(player_info.key, raffle_info.key, amount),
            &[
                player_info.clone(),
                raffle_info.clone(),
                system_program_info.clone(),
            ],
        )?;
        raffle.save(raffle_info)?;

        msg!(
            "Entered: players={}, pool={} lamports",
            raffle.number_of_players(),
            raffle.pool_balance()
        );
        Self::publish(events);
        Ok(())
    }

    /// Read-only; the answer is returned as Borsh `UpkeepCheck`
    fn process_check_upkeep(
        accounts: &[AccountInfo],
        payload: &[u8],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;
        Self::check_raffle_account(raffle_info, program_id)?;

        let raffle = Raffle::load(raffle_info)?;
        let now = Clock::get()?.unix_timestamp;
        let check = raffle.check_upkeep(now, payload);

        msg!("Upkeep needed: {}", check.upkeep_needed);
        let data = check
            .try_to_vec()
            .map_err(|_| ProgramError::InvalidAccountData)?;
        set_return_data(&data);
        Ok(())
    }

    fn process_perform_upkeep(
        accounts: &[AccountInfo],
        payload: &[u8],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let caller_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;

        // Anyone can trigger upkeep; the predicate is the only guard
        if !caller_info.is_signer {
            msg!("Caller must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        Self::check_raffle_account(raffle_info, program_id)?;

        let mut raffle = Raffle::load(raffle_info)?;
        let now = Clock::get()?.unix_timestamp;
        let mut oracle = CoordinatorOracle::new(*raffle_info.key, raffle.round.requests_issued);
        let mut events = Vec::new();

        let request_id = raffle
            .perform_upkeep(now, payload, &mut oracle, &mut events)
            .map_err(|err| {
                if let RaffleError::UpkeepNotNeeded {
                    balance,
                    participants,
                    phase,
                } = err
                {
                    msg!(
                        "Upkeep not needed: balance={}, participants={}, phase={:?}",
                        balance,
                        participants,
                        phase
                    );
                }
                err
            })?;
        raffle.save(raffle_info)?;

        msg!("Randomness requested by {}: request_id={}", caller_info.key, request_id);
        Self::publish(events);
        Ok(())
    }

    fn process_fulfill_random_words(
        accounts: &[AccountInfo],
        request_id: u64,
        random_words: &[u64],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let coordinator_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        Self::check_raffle_account(raffle_info, program_id)?;
        let mut raffle = Raffle::load(raffle_info)?;

        if !coordinator_info.is_signer || *coordinator_info.key != raffle.config.coordinator {
            msg!("Only the coordinator {} can fulfill", raffle.config.coordinator);
            return Err(RaffleError::UnauthorizedCoordinator.into());
        }

        let now = Clock::get()?.unix_timestamp;
        let reserve = Rent::get()?.minimum_balance(raffle_info.data_len());
        let mut payout = LamportPayout::new(raffle_info, winner_info, reserve);
        let mut events = Vec::new();

        let settlement =
            raffle.fulfill_random_words(request_id, random_words, now, &mut payout, &mut events)?;
        raffle.save(raffle_info)?;

        msg!(
            "Winner index {} of request {}: {} receives {} lamports",
            settlement.winner_index,
            settlement.request_id,
            settlement.winner,
            settlement.payout
        );
        Self::publish(events);
        Ok(())
    }

    fn process_query_state(
        accounts: &[AccountInfo],
        participants_offset: u32,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;
        Self::check_raffle_account(raffle_info, program_id)?;

        let raffle = Raffle::load(raffle_info)?;
        let snapshot = raffle.snapshot(Clock::get()?.unix_timestamp, participants_offset as usize);

        if let Some(waiting) = snapshot.pending_for {
            msg!(
                "Request {:?} outstanding for {}s",
                snapshot.pending_request_id,
                waiting
            );
        }
        let data = snapshot
            .try_to_vec()
            .map_err(|_| ProgramError::InvalidAccountData)?;
        set_return_data(&data);
        Ok(())
    }

    fn check_raffle_account(raffle_info: &AccountInfo, program_id: &Pubkey) -> ProgramResult {
        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let (expected_raffle, _) = find_raffle_address(program_id);
        if *raffle_info.key != expected_raffle {
            return Err(RaffleError::InvalidRaffleAccount.into());
        }
        Ok(())
    }

    fn publish(events: Vec<RaffleEvent>) {
        let mut log = ProgramLog;
        for event in events {
            log.emit(event);
        }
    }
}
