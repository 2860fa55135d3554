use super::{TypeData, TypeId, TypeName};
use std::collections::HashSet;

/// Subtyping relationship between types
pub trait Assignable {
    /// Is the first type assignable to the second?
    fn is_assignable(&self, super_type: &Self) -> bool;
}

/// This does a traversal of super types in the type graph to determine assignability
///
/// Value types, `void`, and by-ref types are only ever assignable to themselves: no boxing or
/// dereferencing is implied by an assignment.
impl<'g> Assignable for TypeData<'g> {
    fn is_assignable(&self, super_type: &TypeData<'g>) -> bool {
        if self == super_type {
            return true;
        }
        if !is_reference(self) || !is_reference(super_type) {
            return false;
        }
        if super_type.name == TypeName::OBJECT {
            return true;
        }

        let mut supertypes_to_visit: Vec<&TypeData<'g>> = vec![self];
        let mut dont_revisit: HashSet<&TypeName> = HashSet::new();
        dont_revisit.insert(&self.name);

        // Optimization: if the super type is a class, then skip visiting interfaces
        let super_is_class: bool = !super_type.is_interface();

        while let Some(type_data) = supertypes_to_visit.pop() {
            if type_data == super_type {
                return true;
            }

            // Enqueue next types to visit
            if let Some(base) = type_data.base {
                if dont_revisit.insert(&base.name) {
                    supertypes_to_visit.push(base);
                }
            }
            if !super_is_class {
                for &interface in &type_data.interfaces {
                    if dont_revisit.insert(&interface.name) {
                        supertypes_to_visit.push(interface);
                    }
                }
            }
        }

        false
    }
}

fn is_reference(type_data: &TypeData<'_>) -> bool {
    !type_data.is_value() && !type_data.is_void() && !type_data.is_by_ref()
}

/// Can a value of type `source` be used where `target` is expected?
pub fn is_assignable<'g>(target: TypeId<'g>, source: TypeId<'g>) -> bool {
    source.is_assignable(target)
}

/// How a binding satisfies a formal parameter
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ByRefResolution {
    /// The bound type is exactly the (dereferenced) formal type
    pub exact: bool,

    /// The binding must be loaded by address (eg. `ldloca` instead of `ldloc`)
    pub needs_address: bool,
}

/// Why a binding does not satisfy a formal parameter
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Incompatibility {
    /// The formal is a plain value but the binding is by-ref
    UnexpectedByRef,

    /// The formal is by-ref but the binding is a value that cannot be addressed
    MissingByRef,

    /// The types don't match
    TypeIncompatible,
}

/// Check a binding to an addressable source (argument, local, or instance) against a formal
///
/// A by-ref formal accepts a by-ref source with the same element type as is, or a plain source
/// of exactly its element type by taking the address of the source. A plain formal rejects
/// by-ref sources and otherwise follows [`is_assignable`].
pub fn resolve_by_ref<'g>(
    formal: TypeId<'g>,
    bound: TypeId<'g>,
) -> Result<ByRefResolution, Incompatibility> {
    match (formal.element(), bound.element()) {
        (None, Some(_)) => Err(Incompatibility::UnexpectedByRef),
        (Some(formal_element), Some(bound_element)) => {
            if formal_element == bound_element {
                Ok(ByRefResolution {
                    exact: true,
                    needs_address: false,
                })
            } else {
                Err(Incompatibility::TypeIncompatible)
            }
        }
        (Some(formal_element), None) => {
            if formal_element == bound {
                Ok(ByRefResolution {
                    exact: true,
                    needs_address: true,
                })
            } else {
                Err(Incompatibility::TypeIncompatible)
            }
        }
        (None, None) => {
            if is_assignable(formal, bound) {
                Ok(ByRefResolution {
                    exact: formal == bound,
                    needs_address: false,
                })
            } else {
                Err(Incompatibility::TypeIncompatible)
            }
        }
    }
}

/// Check a value already on the stack against a formal
///
/// Unlike [`resolve_by_ref`], no address can be taken of a stack value: `bound_by_ref` says
/// whether the stack holds a pointer to `bound` or `bound` itself.
pub fn resolve_stack_value<'g>(
    formal: TypeId<'g>,
    bound: TypeId<'g>,
    bound_by_ref: bool,
) -> Result<ByRefResolution, Incompatibility> {
    match (formal.element(), bound_by_ref) {
        (Some(_), false) => Err(Incompatibility::MissingByRef),
        (None, true) => Err(Incompatibility::UnexpectedByRef),
        (Some(formal_element), true) if formal_element == bound => Ok(ByRefResolution {
            exact: true,
            needs_address: false,
        }),
        (None, false) if is_assignable(formal, bound) => Ok(ByRefResolution {
            exact: formal == bound,
            needs_address: false,
        }),
        _ => Err(Incompatibility::TypeIncompatible),
    }
}
