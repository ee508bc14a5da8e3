pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod gateway;
pub mod journal;
pub mod policy;
pub mod receipt;

// Re-export the main types for convenience
pub use config::{EntranceConfig, PolicyKind, DEFAULT_MAX_OPERATIONS};
pub use dispatcher::{dispatch, dispatch_instruction, InstructionOutcome};
pub use executor::ProgramExecutor;
pub use gateway::Entrance;
pub use journal::{FileProgramJournal, JournalEntry, MemoryProgramJournal, ProgramJournal};
pub use policy::{AllowAll, AuthorizationPolicy, SubmitterIsOperator};
pub use receipt::{InMemoryReceiptStorage, ProgramReceipt, ReceiptStorage};
