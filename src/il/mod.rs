//! Model of a method body's instructions and of the types and members they refer to
//!
//! Types and members live in a [`TypeGraph`], which is arena-allocated so that instructions can
//! hold `&'g` references into it:
//!
//! ```
//! use ilpatch::il::*;
//!
//! let arenas = TypeGraphArenas::new();
//! let graph = TypeGraph::new(&arenas);
//! let core = graph.insert_core_types();
//!
//! let log = graph.add_method(MethodData::new(
//!     core.object,
//!     MemberName::from_string(String::from("Log")).unwrap(),
//!     vec![ParameterData::new(
//!         MemberName::from_string(String::from("value")).unwrap(),
//!         core.int32,
//!     )],
//!     core.void,
//!     MethodAccessFlags::public_static(),
//! ));
//!
//! let code = vec![
//!     Instruction::load_int32(42),
//!     Instruction::call(log),
//!     Instruction::ret(),
//! ];
//! assert!(code.iter().all(|instruction| instruction.validate().is_ok()));
//! assert_eq!(code[1].member(), Some(MemberRef::Method(log)));
//! ```

mod access_flags;
mod errors;
mod instruction;
mod label;
mod names;
mod opcodes;
mod type_graph;

pub use access_flags::*;
pub use errors::*;
pub use instruction::*;
pub use label::*;
pub use names::*;
pub use opcodes::*;
pub use type_graph::*;
