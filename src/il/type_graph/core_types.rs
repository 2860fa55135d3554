use super::{TypeData, TypeGraph, TypeId, TypeKind};
use crate::il::TypeName;

/// Types inside `System.*` that the editor itself needs to know about
///
/// These are the types of constant loads and of the boolean that decides injected returns and
/// jumps.
#[derive(Copy, Clone, Debug)]
pub struct CoreTypes<'g> {
    pub object: TypeId<'g>,
    pub value_type: TypeId<'g>,
    pub void: TypeId<'g>,
    pub boolean: TypeId<'g>,
    pub int32: TypeId<'g>,
    pub int64: TypeId<'g>,
    pub float32: TypeId<'g>,
    pub float64: TypeId<'g>,
    pub string: TypeId<'g>,
}

impl<'g> CoreTypes<'g> {
    pub fn add_to_graph(graph: &'g TypeGraph<'g>) -> CoreTypes<'g> {
        let object = graph.add_type(TypeData::new(TypeName::OBJECT, TypeKind::Class, None));
        let value_type = graph.add_type(TypeData::new(
            TypeName::VALUETYPE,
            TypeKind::Class,
            Some(object),
        ));
        let value =
            |name: TypeName| graph.add_type(TypeData::new(name, TypeKind::Value, Some(value_type)));

        CoreTypes {
            object,
            value_type,
            void: graph.add_type(TypeData::new(TypeName::VOID, TypeKind::Void, None)),
            boolean: value(TypeName::BOOLEAN),
            int32: value(TypeName::INT32),
            int64: value(TypeName::INT64),
            float32: value(TypeName::SINGLE),
            float64: value(TypeName::DOUBLE),
            string: graph.add_type(TypeData::new(
                TypeName::STRING,
                TypeKind::Class,
                Some(object),
            )),
        }
    }
}
