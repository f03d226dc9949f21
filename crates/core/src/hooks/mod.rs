//! Hook system
//!
//! Two kinds of redirection:
//! - Inline hooks (absolute jumps written over exported entry points)
//! - Forwarding thunks (shared pass-through slots for proxy vtables)
//!
//! Machine code is encoded with iced-x86; page protection goes through region.

pub mod inline;
pub mod patch;
pub mod thunk;

pub use inline::{HookError, HookRecord, HookTable, InlineHookKey, SuspendGuard};
pub use patch::{encode_absolute_jump, CodeMemory, ProcessMemory, PATCH_LEN};
pub use thunk::forwarding_thunk;
