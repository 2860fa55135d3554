use super::{Error, LocalSlot, MethodBody};
use crate::il::{
    resolve_by_ref, BindingHint, Incompatibility, Instruction, LocalSelector, MemberName,
    MethodData, Name, ParameterData, TypeId,
};
use log::trace;

/// Where the value of a bound parameter comes from
#[derive(Copy, Clone, Debug)]
enum Source<'g> {
    Argument(u16, TypeId<'g>),
    Local(u16, TypeId<'g>),
}

impl<'g> Source<'g> {
    fn source_type(&self) -> TypeId<'g> {
        match self {
            Source::Argument(_, source_type) | Source::Local(_, source_type) => *source_type,
        }
    }
}

/// Bind one formal parameter of `procedure` and produce the instruction that loads it
///
/// Binding hints are tried in a fixed order: an explicit binding to a parameter (or the instance)
/// of the edited method, then an explicit binding to a local, and otherwise the formal's own name
/// is looked up among the instance, the parameters, and the named locals. The loaded source is
/// then checked against the formal: by-ref formals get an address load unless the source is
/// already by-ref.
///
/// `position` is the instruction that `LocalSelector::Current` refers to.
pub(crate) fn bind_parameter<'g>(
    body: &mut MethodBody<'g>,
    position: usize,
    procedure: &MethodData<'g>,
    formal: &ParameterData<'g>,
) -> Result<Instruction<'g>, Error> {
    let source = match &formal.binding {
        BindingHint::Original(alias) => {
            let name = alias.as_ref().unwrap_or(&formal.name);
            original_source(body, name)?.ok_or_else(|| unknown_parameter(procedure, formal))?
        }
        BindingHint::Local(selector) => {
            let slot = local_source(body, position, formal, selector)?;
            Source::Local(slot.index, slot.local_type)
        }
        BindingHint::None => match original_source(body, &formal.name)? {
            Some(source) => source,
            None => body
                .symbols
                .local_named(formal.name.as_str())
                .map(|slot| Source::Local(slot.index, slot.local_type))
                .ok_or_else(|| unknown_parameter(procedure, formal))?,
        },
    };
    trace!("bound {} of {:?} to {:?}", formal.name, procedure, source);

    let resolution = resolve_by_ref(formal.param_type, source.source_type()).map_err(|err| {
        incompatibility(
            err,
            &formal.name,
            formal.param_type,
            source.source_type(),
        )
    })?;
    Ok(match (source, resolution.needs_address) {
        (Source::Argument(index, _), false) => Instruction::load_arg(index),
        (Source::Argument(index, _), true) => Instruction::load_arg_address(index),
        (Source::Local(index, _), false) => Instruction::load_local(index),
        (Source::Local(index, _), true) => Instruction::load_local_address(index),
    })
}

/// Instance or parameter of the edited method with the given name
fn original_source<'g>(
    body: &MethodBody<'g>,
    name: &MemberName,
) -> Result<Option<Source<'g>>, Error> {
    let method = body.method();
    if *name == body.settings().instance_parameter {
        if method.is_static() {
            return Err(Error::MissingInstance(format!("{:?}", method)));
        }
        return Ok(Some(Source::Argument(0, method.declaring_type)));
    }
    Ok(method.parameter(name.as_str()).map(|(i, parameter)| {
        Source::Argument(body.argument_index(i), parameter.param_type)
    }))
}

fn local_source<'g>(
    body: &mut MethodBody<'g>,
    position: usize,
    formal: &ParameterData<'g>,
    selector: &LocalSelector<'g>,
) -> Result<LocalSlot<'g>, Error> {
    match selector {
        LocalSelector::Name { name, local_type } => body
            .symbols
            .get_or_create_local(
                Some(local_type.unwrap_or_else(|| formal.value_type())),
                Some(name.as_str()),
            ),
        LocalSelector::Index(index) => body
            .symbols
            .local(*index)
            .cloned()
            .ok_or_else(|| Error::UnknownLocal(format!("{}", index))),
        LocalSelector::TypeOccurrence {
            local_type,
            occurrence,
        } => body.symbols.find_local_by_type(
            local_type.unwrap_or_else(|| formal.value_type()),
            None,
            *occurrence,
        ),
        LocalSelector::Current => {
            let instruction = body.code.get(position).ok_or(Error::InvalidPosition {
                position,
                len: body.code.len(),
            })?;
            body.symbols
                .local_for(instruction)
                .cloned()
                .ok_or_else(|| Error::InvalidCurrentInstruction {
                    position,
                    expected: "local load or store",
                    found: format!("{:?}", instruction),
                })
        }
    }
}

fn unknown_parameter(procedure: &MethodData<'_>, formal: &ParameterData<'_>) -> Error {
    Error::UnknownParameter {
        procedure: format!("{:?}", procedure),
        parameter: formal.name.as_str().to_owned(),
    }
}

/// Turn a failed type check of a binding into the matching error
pub(crate) fn incompatibility<'g>(
    err: Incompatibility,
    binding: &MemberName,
    expected: TypeId<'g>,
    found: TypeId<'g>,
) -> Error {
    match err {
        Incompatibility::MissingByRef => Error::MissingByRef {
            parameter: binding.as_str().to_owned(),
            found: format!("{:?}", found),
        },
        Incompatibility::UnexpectedByRef => Error::UnexpectedByRef {
            parameter: binding.as_str().to_owned(),
            found: format!("{:?}", found),
        },
        Incompatibility::TypeIncompatible => Error::TypeIncompatible {
            binding: binding.as_str().to_owned(),
            expected: format!("{:?}", expected),
            found: format!("{:?}", found),
        },
    }
}

#[cfg(test)]
mod test {
    use super::bind_parameter;
    use crate::il::*;
    use crate::patch::{Error, MethodBody, Settings};

    fn name(name: &str) -> MemberName {
        MemberName::from_string(name.to_owned()).unwrap()
    }

    #[test]
    fn binding_priority() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let core = graph.insert_core_types();
        let target = graph.add_method(MethodData::new(
            core.object,
            name("Target"),
            vec![ParameterData::new(name("count"), core.int32)],
            core.void,
            MethodAccessFlags::PUBLIC,
        ));
        let procedure = graph.add_method(MethodData::new(
            core.object,
            name("Hook"),
            vec![],
            core.void,
            MethodAccessFlags::public_static(),
        ));
        let mut body = MethodBody::new(
            target,
            core,
            &[core.int32],
            vec![Instruction::load_local(0), Instruction::ret()],
            Settings::new(),
        )
        .unwrap();
        body.symbols_mut().name_local(0, "count").unwrap();

        // Parameters shadow locals of the same name
        let formal = ParameterData::new(name("count"), core.int32);
        let load = bind_parameter(&mut body, 0, procedure, &formal).unwrap();
        assert_eq!(load, Instruction::load_arg(1));

        let formal = ParameterData::new(name("n"), core.int32)
            .with_binding(BindingHint::Local(LocalSelector::Current));
        let load = bind_parameter(&mut body, 0, procedure, &formal).unwrap();
        assert_eq!(load, Instruction::load_local(0));

        let formal = ParameterData::new(name("self"), core.object)
            .with_binding(BindingHint::Original(Some(MemberName::INSTANCE)));
        let load = bind_parameter(&mut body, 0, procedure, &formal).unwrap();
        assert_eq!(load, Instruction::load_arg(0));

        let formal = ParameterData::new(name("missing"), core.int32);
        assert!(matches!(
            bind_parameter(&mut body, 0, procedure, &formal),
            Err(Error::UnknownParameter { .. })
        ));

        let formal = ParameterData::new(name("total"), graph.by_ref(core.int32)).with_binding(
            BindingHint::Local(LocalSelector::Name {
                name: String::from("total"),
                local_type: None,
            }),
        );
        let load = bind_parameter(&mut body, 0, procedure, &formal).unwrap();
        assert_eq!(load, Instruction::load_local_address(1));
        assert_eq!(body.symbols().local(1).unwrap().local_type, core.int32);
    }
}
