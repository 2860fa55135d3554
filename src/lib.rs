//! Patch the bodies of already-compiled stack-machine methods
//!
//! The crate is split in two:
//!
//!   - [`il`] models the instruction stream of a method body: opcodes, operands, labels, and a
//!     graph of the types and members that instructions refer to.
//!
//!   - [`patch`] is the editing substrate. A [`patch::MethodBody`] owns the instructions and the
//!     symbols (locals and labels) of one method, and a [`patch::Navigator`] moves a cursor over
//!     it to search for positions and to inject or rewrite code there.
//!
//! Reassembling, verifying, and loading the edited method is left to the host that supplied it.

pub mod il;
pub mod patch;
