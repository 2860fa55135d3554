//! Editing sessions over method bodies
//!
//! A [`MethodBody`] is one session: it owns the instructions and the [`SymbolTable`] of the
//! method being patched. All edits go through a [`Navigator`], which keeps a cursor into the
//! instructions. Injected code calls external procedures (static methods of the [`TypeGraph`]
//! whose parameters say what they want to be handed), so most patches only consist of finding a
//! position and injecting a call, a return, or a jump there.
//!
//! [`TypeGraph`]: crate::il::TypeGraph

mod binder;
mod body;
mod errors;
mod injector;
mod navigator;
mod settings;
mod stream;
mod symbols;

pub use body::*;
pub use errors::*;
pub use navigator::*;
pub use settings::*;
pub use stream::*;
pub use symbols::*;
