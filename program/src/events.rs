use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{log::sol_log_data, msg, pubkey::Pubkey};

/// Notifications emitted for off-chain consumers
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    /// A player joined the current round
    RaffleEntered { player: Pubkey, amount: u64 },
    /// Randomness was requested for the current round
    RequestedRaffleWinner { request_id: u64, round_number: u64 },
    /// The round settled and the pool was paid out
    WinnerPicked {
        winner: Pubkey,
        payout: u64,
        request_id: u64,
        round_number: u64,
    },
}

pub trait EventSink {
    fn emit(&mut self, event: RaffleEvent);
}

impl EventSink for Vec<RaffleEvent> {
    fn emit(&mut self, event: RaffleEvent) {
        self.push(event);
    }
}

/// Writes events to the program log: a readable line plus the Borsh
/// encoding as log data for indexers.
pub struct ProgramLog;

impl EventSink for ProgramLog {
    fn emit(&mut self, event: RaffleEvent) {
        match &event {
            RaffleEvent::RaffleEntered { player, amount } => {
                msg!("RaffleEntered: player={}, amount={}", player, amount);
            }
            RaffleEvent::RequestedRaffleWinner {
                request_id,
                round_number,
            } => {
                msg!(
                    "RequestedRaffleWinner: request_id={}, round={}",
                    request_id,
                    round_number
                );
            }
            RaffleEvent::WinnerPicked {
                winner,
                payout,
                request_id,
                round_number,
            } => {
                msg!(
                    "WinnerPicked: winner={}, payout={}, request_id={}, round={}",
                    winner,
                    payout,
                    request_id,
                    round_number
                );
            }
        }
        match event.try_to_vec() {
            Ok(bytes) => sol_log_data(&[&bytes]),
            Err(err) => msg!("Failed to encode event data: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_event() -> Vec<RaffleEvent> {
        let player = Pubkey::new_unique();
        vec![
            RaffleEvent::RaffleEntered { player, amount: 100 },
            RaffleEvent::RequestedRaffleWinner {
                request_id: 9,
                round_number: 0,
            },
            RaffleEvent::WinnerPicked {
                winner: player,
                payout: 300,
                request_id: 9,
                round_number: 1,
            },
        ]
    }

    #[test]
    fn every_event_has_log_data() {
        for event in every_event() {
            let bytes = event.try_to_vec().unwrap();
            assert_eq!(RaffleEvent::try_from_slice(&bytes).unwrap(), event);
        }
    }

    #[test]
    fn program_log_publishes_every_event() {
        let mut log = ProgramLog;
        for event in every_event() {
            log.emit(event);
        }
    }

    #[test]
    fn vec_sink_keeps_order() {
        let mut sink = Vec::new();
        for event in every_event() {
            sink.emit(event);
        }
        assert_eq!(sink, every_event());
    }
}
