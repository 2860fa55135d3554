use super::{Error, FieldAccessFlags, MemberName, MethodAccessFlags, Name, TypeName};
use elsa::map::FrozenMap;
use elsa::FrozenVec;
use log::trace;
use std::fmt;
use std::fmt::Debug;
use typed_arena::Arena;

mod assignable;
mod core_types;
mod member_cache;

pub use assignable::*;
pub use core_types::*;
pub use member_cache::*;

pub struct TypeGraphArenas<'g> {
    type_arena: Arena<TypeData<'g>>,
    method_arena: Arena<MethodData<'g>>,
    field_arena: Arena<FieldData<'g>>,
}

impl<'g> TypeGraphArenas<'g> {
    pub fn new() -> Self {
        TypeGraphArenas {
            type_arena: Arena::new(),
            method_arena: Arena::new(),
            field_arena: Arena::new(),
        }
    }
}

impl<'g> Default for TypeGraphArenas<'g> {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks the types that instructions can refer to and the members declared on those types
///
/// The host describes the fragment of its type system that a patch touches: the declaring type
/// of the edited method, the types of its parameters and locals, and the procedures that get
/// injected. Everything is arena-allocated so that instructions can hold plain `&'g` references
/// to members.
pub struct TypeGraph<'g> {
    arenas: &'g TypeGraphArenas<'g>,
    types: FrozenMap<TypeName, &'g TypeData<'g>>,
    methods: FrozenVec<&'g MethodData<'g>>,
    fields: FrozenVec<&'g FieldData<'g>>,
}

/// Types are compared by name, and referred to by reference
pub type TypeId<'g> = &'g TypeData<'g>;

impl<'g> TypeGraph<'g> {
    /// New empty graph
    pub fn new(arenas: &'g TypeGraphArenas<'g>) -> Self {
        TypeGraph {
            arenas,
            types: FrozenMap::new(),
            methods: FrozenVec::new(),
            fields: FrozenVec::new(),
        }
    }

    pub fn lookup_type(&'g self, name: &TypeName) -> Option<TypeId<'g>> {
        self.types.get(name)
    }

    /// Add a new type to the graph
    ///
    /// If a type with the same name is already present, that type is returned instead.
    pub fn add_type(&'g self, data: TypeData<'g>) -> TypeId<'g> {
        if let Some(existing) = self.types.get(&data.name) {
            return existing;
        }
        let data = &*self.arenas.type_arena.alloc(data);
        self.types.insert(data.name.clone(), data);
        data
    }

    /// By-reference (managed pointer) type whose element is the given type
    pub fn by_ref(&'g self, element: TypeId<'g>) -> TypeId<'g> {
        self.add_type(TypeData {
            name: element.name.by_ref(),
            kind: TypeKind::ByRef(element),
            base: None,
            interfaces: vec![],
        })
    }

    /// Add a method to the graph
    ///
    /// Methods with the same declaring type, name, parameter types, and generic arguments are
    /// deduplicated so that member operands can be compared by identity.
    pub fn add_method(&'g self, method: MethodData<'g>) -> &'g MethodData<'g> {
        if let Some(existing) = self.find_method(|m| m.same_signature(&method)) {
            existing
        } else {
            let data = &*self.arenas.method_arena.alloc(method);
            self.methods.push(data);
            data
        }
    }

    /// Add a field to the graph
    pub fn add_field(&'g self, field: FieldData<'g>) -> &'g FieldData<'g> {
        if let Some(existing) = self.find_field(|f| {
            f.declaring_type == field.declaring_type && f.name == field.name
        }) {
            existing
        } else {
            let data = &*self.arenas.field_arena.alloc(field);
            self.fields.push(data);
            data
        }
    }

    fn find_method(
        &'g self,
        predicate: impl Fn(&MethodData<'g>) -> bool,
    ) -> Option<&'g MethodData<'g>> {
        (0..self.methods.len())
            .filter_map(|i| self.methods.get(i))
            .find(|m| predicate(m))
    }

    fn find_field(
        &'g self,
        predicate: impl Fn(&FieldData<'g>) -> bool,
    ) -> Option<&'g FieldData<'g>> {
        (0..self.fields.len())
            .filter_map(|i| self.fields.get(i))
            .find(|f| predicate(f))
    }

    /// Resolve a member by walking up the base type chain of the declaring type
    ///
    /// Methods are preferred, then property getters (`get_<name>` with no parameters), then
    /// fields. When generic arguments are supplied, the matching generic method definition is
    /// instantiated with them.
    pub fn find_member(&'g self, query: &MemberQuery<'g>) -> Result<MemberRef<'g>, Error> {
        let chain: Vec<TypeId<'g>> = query.declaring_type.base_chain().collect();

        let method_matches = |method: &MethodData<'g>, name: &MemberName| -> bool {
            method.name == *name
                && method.generic_arguments.is_empty()
                && method.generic_arity == query.generic_arguments.len()
                && query.parameter_types.as_ref().map_or(true, |types| {
                    types.len() == method.parameters.len()
                        && types
                            .iter()
                            .zip(&method.parameters)
                            .all(|(t, p)| *t == p.param_type)
                })
        };

        for declaring in &chain {
            if let Some(method) =
                self.find_method(|m| m.declaring_type == *declaring && method_matches(m, &query.name))
            {
                trace!("resolved {:?} to method {:?}", query, method);
                return Ok(MemberRef::Method(self.instantiate(method, &query.generic_arguments)));
            }
        }

        if query.generic_arguments.is_empty()
            && query.parameter_types.as_ref().map_or(true, |t| t.is_empty())
        {
            let getter = query.name.getter();
            for declaring in &chain {
                if let Some(method) = self.find_method(|m| {
                    m.declaring_type == *declaring
                        && m.name == getter
                        && m.parameters.is_empty()
                        && m.generic_arity == 0
                }) {
                    trace!("resolved {:?} to property getter {:?}", query, method);
                    return Ok(MemberRef::Method(method));
                }
            }

            for declaring in &chain {
                if let Some(field) =
                    self.find_field(|f| f.declaring_type == *declaring && f.name == query.name)
                {
                    trace!("resolved {:?} to field {:?}", query, field);
                    return Ok(MemberRef::Field(field));
                }
            }
        }

        Err(Error::MissingMember(format!("{:?}", query)))
    }

    /// Resolve the setter of a property (`set_<name>` with one parameter) along the base chain
    ///
    /// Parameter types in the query, if any, must be the single type the setter takes.
    pub fn find_setter(&'g self, query: &MemberQuery<'g>) -> Result<&'g MethodData<'g>, Error> {
        let setter = query.name.setter();
        for declaring in query.declaring_type.base_chain() {
            if let Some(method) = self.find_method(|m| {
                m.declaring_type == declaring
                    && m.name == setter
                    && m.parameters.len() == 1
                    && m.generic_arity == 0
                    && query.parameter_types.as_ref().map_or(true, |types| {
                        types.len() == 1 && types[0] == m.parameters[0].param_type
                    })
            }) {
                trace!("resolved {:?} to property setter {:?}", query, method);
                return Ok(method);
            }
        }
        Err(Error::MissingMember(format!("setter of {:?}", query)))
    }

    /// Instantiate a generic method definition (identity if there are no generic arguments)
    fn instantiate(
        &'g self,
        definition: &'g MethodData<'g>,
        generic_arguments: &[TypeId<'g>],
    ) -> &'g MethodData<'g> {
        if generic_arguments.is_empty() {
            return definition;
        }
        self.add_method(MethodData {
            generic_arguments: generic_arguments.to_vec(),
            ..definition.clone()
        })
    }

    /// Parse a type name and look it up
    pub fn lookup_type_str(&'g self, name: &str) -> Result<TypeId<'g>, Error> {
        let name = TypeName::from_string(name.to_owned()).map_err(Error::MalformedName)?;
        self.lookup_type(&name)
            .ok_or_else(|| Error::MissingType(name.as_str().to_owned()))
    }

    /// Add standard types to the graph
    pub fn insert_core_types(&'g self) -> CoreTypes<'g> {
        CoreTypes::add_to_graph(self)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TypeKind<'g> {
    /// Reference type
    Class,

    /// Reference type that cannot be instantiated directly
    Interface,

    /// Value types (including primitives) are only ever compatible with themselves
    Value,

    Void,

    /// Managed pointer to a value of the element type
    ByRef(TypeId<'g>),
}

pub struct TypeData<'g> {
    /// Fully qualified name
    pub name: TypeName,

    pub kind: TypeKind<'g>,

    /// Base type is only ever missing for the root object type, `void`, and by-ref types
    pub base: Option<TypeId<'g>>,

    /// Interfaces implemented (or super-interfaces)
    pub interfaces: Vec<TypeId<'g>>,
}

impl<'g> TypeData<'g> {
    pub fn new(name: TypeName, kind: TypeKind<'g>, base: Option<TypeId<'g>>) -> TypeData<'g> {
        TypeData {
            name,
            kind,
            base,
            interfaces: vec![],
        }
    }

    pub fn is_value(&self) -> bool {
        self.kind == TypeKind::Value
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn is_void(&self) -> bool {
        self.kind == TypeKind::Void
    }

    pub fn is_by_ref(&self) -> bool {
        matches!(self.kind, TypeKind::ByRef(_))
    }

    /// Element type of a by-ref type
    pub fn element(&self) -> Option<TypeId<'g>> {
        match self.kind {
            TypeKind::ByRef(element) => Some(element),
            _ => None,
        }
    }

    /// This type followed by all of its base types
    pub fn base_chain<'a>(&'a self) -> impl Iterator<Item = &'a TypeData<'g>> + 'a {
        std::iter::successors(Some(self), |t| t.base)
    }
}

impl<'g> PartialEq for TypeData<'g> {
    fn eq(&self, other: &TypeData<'g>) -> bool {
        self.name == other.name
    }
}

impl<'g> Eq for TypeData<'g> {}

impl<'g> Debug for TypeData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())
    }
}

/// How a formal parameter of an injected procedure wants to be bound
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum BindingHint<'g> {
    /// Match by name: first against the edited method's parameters, then against named locals
    None,

    /// Parameter of the edited method (or its instance), optionally under a different name
    Original(Option<MemberName>),

    /// Local of the edited method
    Local(LocalSelector<'g>),
}

/// Which local an explicitly local-bound parameter refers to
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum LocalSelector<'g> {
    /// Local with this name, created if it doesn't exist yet
    ///
    /// The type defaults to the parameter's type (dereferenced if the parameter is by-ref).
    Name {
        name: String,
        local_type: Option<TypeId<'g>>,
    },

    /// Local at this index
    Index(u16),

    /// The `occurrence`-th local (counting from 0) of the given type
    ///
    /// The type defaults to the parameter's type (dereferenced if the parameter is by-ref).
    TypeOccurrence {
        local_type: Option<TypeId<'g>>,
        occurrence: usize,
    },

    /// Local loaded or stored by the instruction under the cursor
    Current,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ParameterData<'g> {
    pub name: MemberName,

    /// Type of the parameter, which is a by-ref type for `ref` and `out` parameters
    pub param_type: TypeId<'g>,

    pub binding: BindingHint<'g>,
}

impl<'g> ParameterData<'g> {
    pub fn new(name: MemberName, param_type: TypeId<'g>) -> ParameterData<'g> {
        ParameterData {
            name,
            param_type,
            binding: BindingHint::None,
        }
    }

    pub fn with_binding(self, binding: BindingHint<'g>) -> ParameterData<'g> {
        ParameterData { binding, ..self }
    }

    pub fn is_by_ref(&self) -> bool {
        self.param_type.is_by_ref()
    }

    /// Type of the value the parameter refers to (the element type, for by-ref parameters)
    pub fn value_type(&self) -> TypeId<'g> {
        self.param_type.element().unwrap_or(self.param_type)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct MethodData<'g> {
    pub declaring_type: TypeId<'g>,

    pub name: MemberName,

    pub parameters: Vec<ParameterData<'g>>,

    pub return_type: TypeId<'g>,

    pub access_flags: MethodAccessFlags,

    /// Number of generic parameters the method definition declares
    pub generic_arity: usize,

    /// Generic arguments (empty unless this is an instantiation)
    pub generic_arguments: Vec<TypeId<'g>>,
}

impl<'g> MethodData<'g> {
    pub fn new(
        declaring_type: TypeId<'g>,
        name: MemberName,
        parameters: Vec<ParameterData<'g>>,
        return_type: TypeId<'g>,
        access_flags: MethodAccessFlags,
    ) -> MethodData<'g> {
        MethodData {
            declaring_type,
            name,
            parameters,
            return_type,
            access_flags,
            generic_arity: 0,
            generic_arguments: vec![],
        }
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn returns_void(&self) -> bool {
        self.return_type.is_void()
    }

    /// Parameter by name
    pub fn parameter(&self, name: &str) -> Option<(usize, &ParameterData<'g>)> {
        self.parameters
            .iter()
            .enumerate()
            .find(|(_, p)| p.name.as_str() == name)
    }

    fn same_signature(&self, other: &MethodData<'g>) -> bool {
        self.declaring_type == other.declaring_type
            && self.name == other.name
            && self.is_static() == other.is_static()
            && self.generic_arguments == other.generic_arguments
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(p1, p2)| p1.param_type == p2.param_type)
    }
}

impl<'g> Debug for MethodData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type.name, self.name)?;
        if !self.generic_arguments.is_empty() {
            f.debug_list().entries(&self.generic_arguments).finish()?;
        }
        let mut tuple = f.debug_tuple("");
        for parameter in &self.parameters {
            tuple.field(&parameter.param_type);
        }
        tuple.finish()?;
        write!(f, ":{}", self.return_type.name)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct FieldData<'g> {
    pub declaring_type: TypeId<'g>,

    pub name: MemberName,

    pub field_type: TypeId<'g>,

    pub access_flags: FieldAccessFlags,
}

impl<'g> FieldData<'g> {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }
}

impl<'g> Debug for FieldData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}:{}",
            self.declaring_type.name, self.name, self.field_type.name
        )
    }
}

/// Reference to a resolved member
///
/// Members are deduplicated in the graph, so equality is identity.
#[derive(Copy, Clone, Debug)]
pub enum MemberRef<'g> {
    Method(&'g MethodData<'g>),
    Field(&'g FieldData<'g>),
}

impl<'g> PartialEq for MemberRef<'g> {
    fn eq(&self, other: &MemberRef<'g>) -> bool {
        match (self, other) {
            (MemberRef::Method(m1), MemberRef::Method(m2)) => std::ptr::eq(*m1, *m2),
            (MemberRef::Field(f1), MemberRef::Field(f2)) => std::ptr::eq(*f1, *f2),
            _ => false,
        }
    }
}

impl<'g> Eq for MemberRef<'g> {}

impl<'g> MemberRef<'g> {
    pub fn declaring_type(&self) -> TypeId<'g> {
        match self {
            MemberRef::Method(method) => method.declaring_type,
            MemberRef::Field(field) => field.declaring_type,
        }
    }

    pub fn is_static(&self) -> bool {
        match self {
            MemberRef::Method(method) => method.is_static(),
            MemberRef::Field(field) => field.is_static(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn by_ref_types_are_deduplicated() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let core = graph.insert_core_types();

        let int_ref1 = graph.by_ref(core.int32);
        let int_ref2 = graph.by_ref(core.int32);
        assert!(std::ptr::eq(int_ref1, int_ref2));
        assert_eq!(int_ref1.element(), Some(core.int32));
        assert_eq!(int_ref1.name.as_str(), "System.Int32&");
    }

    #[test]
    fn find_member_walks_bases() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let core = graph.insert_core_types();

        let entity = graph.add_type(TypeData::new(
            TypeName::from_string(String::from("Game.Entity")).unwrap(),
            TypeKind::Class,
            Some(core.object),
        ));
        let player = graph.add_type(TypeData::new(
            TypeName::from_string(String::from("Game.Player")).unwrap(),
            TypeKind::Class,
            Some(entity),
        ));
        let health = graph.add_method(MethodData::new(
            entity,
            MemberName::from_string(String::from("get_Health")).unwrap(),
            vec![],
            core.int32,
            MethodAccessFlags::PUBLIC,
        ));
        let name = graph.add_field(FieldData {
            declaring_type: entity,
            name: MemberName::from_string(String::from("name")).unwrap(),
            field_type: core.string,
            access_flags: FieldAccessFlags::PRIVATE,
        });

        let query = |member: &str| {
            MemberQuery::new(player, MemberName::from_string(member.to_owned()).unwrap())
        };

        assert_eq!(
            graph.find_member(&query("Health")).unwrap(),
            MemberRef::Method(health),
            "property getter on a base type"
        );
        assert_eq!(
            graph.find_member(&query("get_Health")).unwrap(),
            MemberRef::Method(health),
            "method on a base type"
        );
        assert_eq!(
            graph.find_member(&query("name")).unwrap(),
            MemberRef::Field(name),
            "field on a base type"
        );
        assert!(graph.find_member(&query("Mana")).is_err());
    }

    #[test]
    fn generic_instantiations_are_shared() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let core = graph.insert_core_types();

        let definition = graph.add_method(MethodData {
            generic_arity: 1,
            ..MethodData::new(
                core.object,
                MemberName::from_string(String::from("Identity")).unwrap(),
                vec![],
                core.object,
                MethodAccessFlags::public_static(),
            )
        });

        let query = MemberQuery::new(
            core.object,
            MemberName::from_string(String::from("Identity")).unwrap(),
        )
        .with_generic_arguments(vec![core.int32]);

        let first = graph.find_member(&query).unwrap();
        let second = graph.find_member(&query).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, MemberRef::Method(definition));
        match first {
            MemberRef::Method(method) => assert_eq!(method.generic_arguments, vec![core.int32]),
            MemberRef::Field(_) => panic!("expected a method"),
        }
    }
}
