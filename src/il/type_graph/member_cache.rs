use super::{MemberRef, MethodData, TypeGraph, TypeId};
use crate::il::{Error, MemberName, TypeName};
use log::trace;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Description of a member to resolve
#[derive(Clone)]
pub struct MemberQuery<'g> {
    pub declaring_type: TypeId<'g>,

    pub name: MemberName,

    /// Parameter types (`None` to accept any overload, taking the first one declared)
    pub parameter_types: Option<Vec<TypeId<'g>>>,

    /// Generic arguments to instantiate a generic method with
    pub generic_arguments: Vec<TypeId<'g>>,
}

impl<'g> MemberQuery<'g> {
    pub fn new(declaring_type: TypeId<'g>, name: MemberName) -> MemberQuery<'g> {
        MemberQuery {
            declaring_type,
            name,
            parameter_types: None,
            generic_arguments: vec![],
        }
    }

    pub fn with_parameter_types(self, parameter_types: Vec<TypeId<'g>>) -> MemberQuery<'g> {
        MemberQuery {
            parameter_types: Some(parameter_types),
            ..self
        }
    }

    pub fn with_generic_arguments(self, generic_arguments: Vec<TypeId<'g>>) -> MemberQuery<'g> {
        MemberQuery {
            generic_arguments,
            ..self
        }
    }

    /// Key under which the resolved member is cached
    pub fn key(&self) -> MemberKey {
        MemberKey {
            declaring_type: self.declaring_type.name.clone(),
            name: self.name.clone(),
            parameter_types: self
                .parameter_types
                .as_ref()
                .map(|types| types.iter().map(|t| t.name.clone()).collect()),
            generic_arguments: self
                .generic_arguments
                .iter()
                .map(|t| t.name.clone())
                .collect(),
            setter: false,
        }
    }
}

impl<'g> fmt::Debug for MemberQuery<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type.name, self.name)?;
        if !self.generic_arguments.is_empty() {
            f.debug_list().entries(&self.generic_arguments).finish()?;
        }
        if let Some(parameter_types) = &self.parameter_types {
            let mut tuple = f.debug_tuple("");
            for parameter_type in parameter_types {
                tuple.field(parameter_type);
            }
            tuple.finish()?;
        }
        Ok(())
    }
}

/// Structural key of a [`MemberQuery`]
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MemberKey {
    pub declaring_type: TypeName,
    pub name: MemberName,
    pub parameter_types: Option<Vec<TypeName>>,
    pub generic_arguments: Vec<TypeName>,

    /// Resolved to the property setter rather than the member itself
    pub setter: bool,
}

/// Process-wide cache of member resolutions
///
/// Resolving a member walks the base types of the declaring type, so repeated patches against
/// the same members go through this cache. It is safe to share between editing sessions running
/// on different threads: every access takes a lock.
pub struct MemberCache<'g> {
    members: Mutex<HashMap<MemberKey, MemberRef<'g>>>,
}

impl<'g> MemberCache<'g> {
    pub fn new() -> MemberCache<'g> {
        MemberCache {
            members: Mutex::new(HashMap::new()),
        }
    }

    /// A panic while holding the lock can't leave the map half-updated, so poison is ignored
    fn lock(&self) -> MutexGuard<'_, HashMap<MemberKey, MemberRef<'g>>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a member, resolving it in the graph on a cache miss
    pub fn resolve(
        &self,
        graph: &'g TypeGraph<'g>,
        query: &MemberQuery<'g>,
    ) -> Result<MemberRef<'g>, Error> {
        let key = query.key();
        if let Some(member) = self.lock().get(&key) {
            trace!("member cache hit for {:?}", query);
            return Ok(*member);
        }

        let member = graph.find_member(query)?;
        Ok(*self.lock().entry(key).or_insert(member))
    }

    /// Look up the setter of the property a query names, resolving it in the graph on a miss
    pub fn resolve_setter(
        &self,
        graph: &'g TypeGraph<'g>,
        query: &MemberQuery<'g>,
    ) -> Result<&'g MethodData<'g>, Error> {
        let key = MemberKey {
            setter: true,
            ..query.key()
        };
        if let Some(MemberRef::Method(setter)) = self.lock().get(&key).copied() {
            trace!("member cache hit for setter of {:?}", query);
            return Ok(setter);
        }

        let setter = graph.find_setter(query)?;
        self.lock().entry(key).or_insert(MemberRef::Method(setter));
        Ok(setter)
    }

    pub fn get(&self, query: &MemberQuery<'g>) -> Option<MemberRef<'g>> {
        self.lock().get(&query.key()).copied()
    }

    /// Record a resolution, returning the previous one
    pub fn insert(&self, query: &MemberQuery<'g>, member: MemberRef<'g>) -> Option<MemberRef<'g>> {
        self.lock().insert(query.key(), member)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear()
    }
}

impl<'g> Default for MemberCache<'g> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type graph whose member resolutions go through a (shared) cache
#[derive(Copy, Clone)]
pub struct MemberResolver<'a, 'g> {
    pub graph: &'g TypeGraph<'g>,
    pub cache: &'a MemberCache<'g>,
}

impl<'a, 'g> MemberResolver<'a, 'g> {
    pub fn new(graph: &'g TypeGraph<'g>, cache: &'a MemberCache<'g>) -> MemberResolver<'a, 'g> {
        MemberResolver { graph, cache }
    }

    pub fn resolve(&self, query: &MemberQuery<'g>) -> Result<MemberRef<'g>, Error> {
        self.cache.resolve(self.graph, query)
    }

    pub fn resolve_setter(&self, query: &MemberQuery<'g>) -> Result<&'g MethodData<'g>, Error> {
        self.cache.resolve_setter(self.graph, query)
    }
}
