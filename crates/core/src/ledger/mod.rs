//! Private note ledger

pub mod note;
pub mod private;

pub use note::{Note, NoteId, Principal};
pub use private::{
    change_value, Account, LedgerError, PrivateLedger, SpendSelection, VoterRecord,
    MAX_NOTE_VALUE,
};
