//! Transfer Orchestrator
//!
//! Moves value between holdings as one atomic unit of work.
//!
//! # State Machine
//!
//! ```text
//! VALIDATING → LOCKED → RATED (cross-asset only) → APPLIED → COMMITTED
//!      ↓          ↓          ↓                        ↓          ↓
//!      └──────────┴──────────┴──────── ABORTED ───────┴──────────┘
//! ```
//!
//! # Safety Invariants
//!
//! 1. **All or Nothing**: ledger append, balance deltas and the COMPLETED flip
//!    share one unit of work
//! 2. **Ordered Locking**: holdings are locked in ascending id order
//! 3. **Frozen Rate**: the oracle is asked at most once per movement and the
//!    rate is stored on the record
//! 4. **No PENDING Leaks**: callers only ever see COMPLETED or FAILED records

pub mod coordinator;
pub mod error;
pub mod phase;
pub mod request;


pub use coordinator::TransferOrchestrator;
pub use error::LedgerError;
pub use phase::Phase;
pub use request::{CancelToken, MovementRequest};
