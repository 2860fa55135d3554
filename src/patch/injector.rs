//! Edits that inject calls to external procedures, and the rewrites built on top of them
//!
//! A procedure is a static method whose formal parameters are bound to values of the edited
//! method (see [`bind_parameter`]). Every edit here either applies completely or leaves the body
//! and the cursor as they were.

use super::binder::{bind_parameter, incompatibility};
use super::{Boundary, Error, Navigator};
use crate::il::{
    is_assignable, resolve_stack_value, Instruction, LabelId, MemberQuery, MemberRef,
    MemberResolver, MethodData, Name, Opcode, Operand, ParameterData, TypeId,
};
use log::debug;

/// Shape of the value that a replaced instruction leaves on the stack
struct Replaced<'g> {
    /// Type of the instance the instruction consumes, and whether it is passed by address
    instance: Option<(TypeId<'g>, bool)>,

    /// Parameters the instruction consumes (in order)
    parameters: &'g [ParameterData<'g>],

    /// Type of the pushed value, and whether it is pushed by address
    value: Option<(TypeId<'g>, bool)>,
}

fn check_static(procedure: &MethodData<'_>) -> Result<(), Error> {
    if procedure.is_static() {
        Ok(())
    } else {
        Err(Error::NonStaticProcedure(format!("{:?}", procedure)))
    }
}

fn invalid_return(procedure: &MethodData<'_>) -> Error {
    Error::InvalidReturn {
        procedure: format!("{:?}", procedure),
        found: format!("{:?}", procedure.return_type),
    }
}

impl<'b, 'g> Navigator<'b, 'g> {
    /// Run an edit, undoing everything it did (to instructions, symbols, and cursor) if it fails
    ///
    /// Only the outermost edit takes a snapshot. Nested edits propagate their failure to it, which
    /// then undoes them along with everything else.
    fn transaction<T>(
        &mut self,
        edit: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<T, Error> {
        if self.in_transaction {
            return edit(self);
        }
        let code = self.body.code.clone();
        let symbols = self.body.symbols.checkpoint();
        let position = self.position;

        self.in_transaction = true;
        let result = edit(self);
        self.in_transaction = false;
        if let Err(err) = &result {
            debug!("rolling back failed edit at {}: {:?}", position, err);
            self.body.code = code;
            self.body.symbols.rollback(symbols);
            self.position = position;
        }
        result
    }

    /// Apply `edit` at every instruction in `start..end` that matches, then restore the cursor
    ///
    /// The end of the range is re-read after every edit when it isn't given, so instructions
    /// inserted by the edits are scanned too (and skipped by the edits, which leave the cursor
    /// on the last instruction they produced).
    fn edit_all(
        &mut self,
        start: usize,
        end: Option<usize>,
        matches: impl Fn(&Self) -> bool,
        mut edit: impl FnMut(&mut Self) -> Result<(), Error>,
    ) -> Result<usize, Error> {
        let started_at = self.position;
        self.transaction(|nav| {
            let mut count = 0;
            nav.position = start;
            while nav.position < end.unwrap_or_else(|| nav.len()).min(nav.len()) {
                if matches(nav) {
                    edit(nav)?;
                    count += 1;
                }
                nav.position += 1;
            }
            nav.position = started_at.min(nav.len() - 1);
            Ok(count)
        })
    }

    fn emit(&mut self, instruction: Instruction<'g>, before: bool) -> Result<(), Error> {
        if before {
            self.insert_before(instruction)
        } else {
            self.insert_after(instruction)
        }
    }

    fn bind_all(
        &mut self,
        procedure: &MethodData<'g>,
        formals: &[ParameterData<'g>],
    ) -> Result<Vec<Instruction<'g>>, Error> {
        let mut loads = Vec::with_capacity(formals.len());
        for formal in formals {
            loads.push(bind_parameter(self.body, self.position, procedure, formal)?);
        }
        Ok(loads)
    }

    /// Inject a call to `procedure` before or after the current instruction
    ///
    /// A procedure that returns something must take the same type as its first parameter: that
    /// parameter is the value on top of the stack, which the procedure hands back (possibly
    /// changed). All other parameters are bound and loaded right before the call.
    ///
    /// Injecting before keeps the cursor on the current instruction. Injecting after moves the
    /// cursor onto the injected call.
    pub fn insert_call(&mut self, procedure: &'g MethodData<'g>, before: bool) -> Result<(), Error> {
        check_static(procedure)?;
        self.transaction(|nav| {
            let mut formals = procedure.parameters.as_slice();
            if !procedure.returns_void() {
                match formals.split_first() {
                    Some((first, rest)) if first.param_type == procedure.return_type => {
                        formals = rest
                    }
                    _ => return Err(invalid_return(procedure)),
                }
            }

            let loads = nav.bind_all(procedure, formals)?;
            debug!(
                "insert call to {:?} {} {}",
                procedure,
                if before { "before" } else { "after" },
                nav.position
            );
            for load in loads {
                nav.emit(load, before)?;
            }
            nav.emit(Instruction::call(procedure), before)
        })
    }

    /// Inject a call to `procedure` after every access of `member`, returning how many there were
    pub fn insert_after_all(
        &mut self,
        member: MemberRef<'g>,
        procedure: &'g MethodData<'g>,
    ) -> Result<usize, Error> {
        check_static(procedure)?;
        self.edit_all(
            0,
            None,
            |nav| nav.calls(member),
            |nav| nav.insert_call(procedure, false),
        )
    }

    /// What the current instruction consumes and produces, if it can be replaced by a call
    fn replaced(&self) -> Result<Replaced<'g>, Error> {
        let current = self.current();
        let core = self.body.core();
        let opcode = current.opcode;

        let replaced = match current.member() {
            Some(MemberRef::Method(method)) if opcode.is_member_access() => Replaced {
                instance: (!method.is_static())
                    .then(|| (method.declaring_type, method.declaring_type.is_value())),
                parameters: &method.parameters,
                value: (!method.returns_void()).then(|| (method.return_type, false)),
            },
            Some(MemberRef::Field(field)) if opcode.is_member_access() => Replaced {
                instance: (!field.is_static())
                    .then(|| (field.declaring_type, field.declaring_type.is_value())),
                parameters: &[],
                value: Some((
                    field.field_type,
                    matches!(opcode, Opcode::LdFldA | Opcode::LdSFldA),
                )),
            },
            _ => {
                let value = if opcode.is_int32_constant() {
                    core.int32
                } else if opcode == Opcode::LdcI8 {
                    core.int64
                } else if opcode == Opcode::LdcR4 {
                    core.float32
                } else if opcode == Opcode::LdcR8 {
                    core.float64
                } else if let Some(slot) = current
                    .is_load_local()
                    .then(|| self.local_at_cursor())
                    .flatten()
                {
                    slot.local_type
                } else {
                    return Err(
                        self.invalid_current("member access, numeric constant, or local load")
                    );
                };
                Replaced {
                    instance: None,
                    parameters: &[],
                    value: Some((value, opcode == Opcode::LdLocA)),
                }
            }
        };
        Ok(replaced)
    }

    /// Replace the current instruction with a call to `procedure`
    ///
    /// The current instruction is a call, a field load, a numeric constant load, or a local load.
    /// The procedure consumes what the instruction consumed (its instance first, then its
    /// parameters under the same names and types) and must return something usable in place of
    /// what the instruction pushed. Further parameters of the procedure are bound like those of an
    /// injected call and loaded right before it. The labels of the replaced instruction move to
    /// the first of those loads.
    ///
    /// The cursor ends on the call.
    pub fn replace_call(&mut self, procedure: &'g MethodData<'g>) -> Result<(), Error> {
        check_static(procedure)?;
        self.transaction(|nav| {
            let replaced = nav.replaced()?;
            let procedure_name = format!("{:?}", procedure);

            match replaced.value {
                None if procedure.returns_void() => (),
                Some((value, true)) if procedure.return_type.element() == Some(value) => (),
                Some((value, false))
                    if !procedure.returns_void() && is_assignable(value, procedure.return_type) => {}
                _ => {
                    return Err(Error::TypeIncompatible {
                        binding: String::from("return value"),
                        expected: replaced
                            .value
                            .map_or_else(|| String::from("void"), |(value, by_ref)| {
                                format!("{:?}{}", value, if by_ref { "&" } else { "" })
                            }),
                        found: format!("{:?}", procedure.return_type),
                    })
                }
            }

            let mut formals = procedure.parameters.iter();
            if let Some((instance_type, by_ref)) = replaced.instance {
                // A first formal named after the member's first parameter isn't the instance
                let formal = match formals.next() {
                    Some(formal)
                        if replaced
                            .parameters
                            .first()
                            .map_or(true, |parameter| parameter.name != formal.name) =>
                    {
                        formal
                    }
                    _ => return Err(Error::MissingInstance(procedure_name)),
                };
                resolve_stack_value(formal.param_type, instance_type, by_ref).map_err(|err| {
                    incompatibility(err, &formal.name, formal.param_type, instance_type)
                })?;
            }
            for (position, parameter) in replaced.parameters.iter().enumerate() {
                let formal = formals.next().ok_or_else(|| Error::MissingParameter {
                    procedure: procedure_name.clone(),
                    expected: format!("{} {:?}", parameter.name, parameter.param_type),
                })?;
                if formal.name != parameter.name || formal.param_type != parameter.param_type {
                    return Err(Error::ParameterOrderMismatch {
                        procedure: procedure_name,
                        position,
                        expected: format!("{} {:?}", parameter.name, parameter.param_type),
                        found: format!("{} {:?}", formal.name, formal.param_type),
                    });
                }
            }

            let extra = formals.as_slice();
            let loads = nav.bind_all(procedure, extra)?;
            debug!(
                "replace {:?} at {} with call to {:?}",
                nav.current(),
                nav.position,
                procedure
            );

            let first_load = nav.position;
            let inserted = loads.len();
            for load in loads {
                nav.insert_before(load)?;
            }
            if inserted > 0 {
                nav.body.code.move_labels(nav.position, first_load)?;
            }
            nav.set(Opcode::Call, Operand::Method(procedure))
        })
    }

    /// Replace every access of `member` with a call to `procedure`, returning how many there were
    pub fn replace_all_calls(
        &mut self,
        member: MemberRef<'g>,
        procedure: &'g MethodData<'g>,
    ) -> Result<usize, Error> {
        check_static(procedure)?;
        self.edit_all(
            0,
            None,
            |nav| nav.calls(member),
            |nav| nav.replace_call(procedure),
        )
    }

    /// Inject a return from the edited method, before or after the current instruction
    ///
    /// The procedure returns either nothing (the injected return always happens) or a boolean
    /// (`true` continues with the original code, `false` returns). If the edited method returns a
    /// value, the procedure has a by-ref `__result` parameter through which it sets that value.
    ///
    /// The cursor moves like it does for [`Navigator::insert_call`].
    pub fn insert_return(&mut self, procedure: &'g MethodData<'g>, before: bool) -> Result<(), Error> {
        check_static(procedure)?;
        let boolean = self.body.core().boolean;
        let conditional = procedure.return_type == boolean;
        if !procedure.returns_void() && !conditional {
            return Err(invalid_return(procedure));
        }

        self.transaction(|nav| {
            let return_type = nav.body.method().return_type;
            let result_name = nav.body.settings().result_parameter.clone();
            let result = procedure.parameter(result_name.as_str());

            match result {
                None if !return_type.is_void() => {
                    return Err(Error::MissingResult(format!("{:?}", procedure)))
                }
                Some(_) if return_type.is_void() => {
                    return Err(Error::UnexpectedResult(format!("{:?}", procedure)))
                }
                Some((_, formal)) if !formal.is_by_ref() => {
                    return Err(Error::MissingByRef {
                        parameter: result_name.as_str().to_owned(),
                        found: format!("{:?}", formal.param_type),
                    })
                }
                Some((_, formal)) if formal.param_type.element() != Some(return_type) => {
                    return Err(Error::TypeIncompatible {
                        binding: result_name.as_str().to_owned(),
                        expected: format!("{:?}&", return_type),
                        found: format!("{:?}", formal.param_type),
                    })
                }
                _ => (),
            }

            let result_local = match result {
                Some(_) => {
                    let name = nav.body.settings().result_local.clone();
                    Some(
                        nav.body
                            .symbols
                            .get_or_create_local(Some(return_type), Some(name.as_str()))?,
                    )
                }
                None => None,
            };

            let mut loads = Vec::with_capacity(procedure.parameters.len());
            for (i, formal) in procedure.parameters.iter().enumerate() {
                match (&result_local, result) {
                    (Some(slot), Some((result_index, _))) if result_index == i => {
                        loads.push(Instruction::load_local_address(slot.index))
                    }
                    _ => loads.push(bind_parameter(nav.body, nav.position, procedure, formal)?),
                }
            }

            // Label of the instruction that follows the injected code
            let resume = if !conditional {
                None
            } else if before {
                Some(nav.current_label(true)?)
            } else if nav.is_last() {
                return Err(nav.invalid_current("instruction followed by another one"));
            } else {
                Some(nav.label_for(nav.position + 1, None, true)?)
            };

            debug!(
                "insert return through {:?} {} {}",
                procedure,
                if before { "before" } else { "after" },
                nav.position
            );
            for load in loads {
                nav.emit(load, before)?;
            }
            nav.emit(Instruction::call(procedure), before)?;
            if let Some(resume) = resume {
                nav.emit(Instruction::branch(Opcode::BrTrue, resume)?, before)?;
            }
            if let Some(slot) = result_local {
                nav.emit(Instruction::load_local(slot.index), before)?;
            }
            nav.emit(Instruction::ret(), before)
        })
    }

    /// Inject a jump to `label`, taken when `procedure` returns `true`
    pub fn insert_jump(
        &mut self,
        procedure: &'g MethodData<'g>,
        label: LabelId,
        before: bool,
    ) -> Result<(), Error> {
        check_static(procedure)?;
        if procedure.return_type != self.body.core().boolean {
            return Err(invalid_return(procedure));
        }
        let result_name = &self.body.settings().result_parameter;
        if procedure.parameter(result_name.as_str()).is_some() {
            return Err(Error::UnexpectedResult(format!("{:?}", procedure)));
        }
        if self.body.symbols.label(label).is_none() {
            return Err(Error::UnknownLabel(format!("{:?}", label)));
        }

        self.transaction(|nav| {
            let loads = nav.bind_all(procedure, &procedure.parameters)?;
            debug!(
                "insert jump to {:?} through {:?} {} {}",
                label,
                procedure,
                if before { "before" } else { "after" },
                nav.position
            );
            for load in loads {
                nav.emit(load, before)?;
            }
            nav.emit(Instruction::call(procedure), before)?;
            nav.emit(Instruction::branch(Opcode::BrTrue, label)?, before)
        })
    }

    /// Move to the first branch at or after the cursor, which must be a conditional one
    fn next_conditional_branch(&mut self) -> Result<usize, Error> {
        if !self.is_branch() {
            self.seek(|nav| nav.is_branch())?;
        }
        let opcode = self.current().opcode;
        if opcode.is_conditional_branch() {
            Ok(self.position)
        } else {
            Err(Error::UnexpectedBranch {
                position: self.position,
                opcode,
            })
        }
    }

    /// Make the next conditional branch always jump
    ///
    /// An unconditional branch to the same label is inserted after the conditional one, which
    /// still consumes its operands. The cursor ends on the inserted branch.
    pub fn jump_always(&mut self) -> Result<(), Error> {
        let from = self.position;
        self.transaction(|nav| {
            nav.next_conditional_branch().map_err(|err| exhausted_from(err, from))?;
            let target = nav.target_label()?;
            let short = nav.current().opcode.is_short_branch()
                && nav.body.settings().prefer_short_branches;
            debug!("jump always at {} to {:?}", nav.position, target);
            nav.insert_after(Instruction::branch(
                Opcode::unconditional_branch(short),
                target,
            )?)
        })
    }

    /// Make the next conditional branch never jump
    ///
    /// The branch is retargeted to the instruction that follows it. The cursor ends on the branch.
    pub fn jump_never(&mut self) -> Result<(), Error> {
        let from = self.position;
        self.transaction(|nav| {
            nav.next_conditional_branch().map_err(|err| exhausted_from(err, from))?;
            if nav.is_last() {
                return Err(nav.invalid_current("branch followed by another instruction"));
            }
            let next = nav.label_for(nav.position + 1, None, true)?;
            debug!("jump never at {} (falls through to {:?})", nav.position, next);
            let opcode = nav.current().opcode;
            nav.set(opcode, Operand::Label(next))
        })
    }

    /// Change the value loaded by the current integer constant load
    ///
    /// 64-bit loads stay 64-bit. All 32-bit loads (including the compact ones) become `ldc.i4`.
    pub fn replace_integer_constant(&mut self, value: i64) -> Result<(), Error> {
        if self.current().integer_constant().is_none() {
            return Err(self.invalid_current("integer constant load"));
        }
        let opcode = if self.current().opcode.is_int32_constant() {
            Opcode::LdcI4
        } else {
            Opcode::LdcI8
        };
        self.set(opcode, Operand::Integer(value))
    }

    /// Change the value loaded by the current floating point constant load (keeping its width)
    pub fn replace_float_constant(&mut self, value: f64) -> Result<(), Error> {
        if self.current().float_constant().is_none() {
            return Err(self.invalid_current("floating point constant load"));
        }
        let opcode = self.current().opcode;
        self.set(opcode, Operand::Float(value))
    }

    /// Change every load of the integer constant `old` in `start..end` to load `new`
    ///
    /// The range defaults to the whole body. Returns the number of rewritten loads.
    pub fn replace_all_integer_constant(
        &mut self,
        old: i64,
        new: i64,
        start: Option<usize>,
        end: Option<usize>,
    ) -> Result<usize, Error> {
        self.edit_all(
            start.unwrap_or(0),
            end,
            |nav| nav.is_load_integer(old),
            |nav| nav.replace_integer_constant(new),
        )
    }

    /// Change every load of the floating point constant `old` in `start..end` to load `new`
    ///
    /// Widths are kept, so an `ldc.r4` of `new` may round it. Returns the number of rewritten
    /// loads.
    pub fn replace_all_float_constant(
        &mut self,
        old: f64,
        new: f64,
        start: Option<usize>,
        end: Option<usize>,
    ) -> Result<usize, Error> {
        self.edit_all(
            start.unwrap_or(0),
            end,
            |nav| nav.is_load_float(old),
            |nav| nav.replace_float_constant(new),
        )
    }

    /// Replace every load of the integer constant `old` with a call to `procedure`
    pub fn replace_all_integer_constant_with_call(
        &mut self,
        old: i64,
        procedure: &'g MethodData<'g>,
    ) -> Result<usize, Error> {
        check_static(procedure)?;
        self.edit_all(
            0,
            None,
            |nav| nav.is_load_integer(old),
            |nav| nav.replace_call(procedure),
        )
    }

    /// Replace every load of the floating point constant `old` (of either width) with a call to
    /// `procedure`
    pub fn replace_all_float_constant_with_call(
        &mut self,
        old: f64,
        procedure: &'g MethodData<'g>,
    ) -> Result<usize, Error> {
        check_static(procedure)?;
        self.edit_all(
            0,
            None,
            |nav| nav.is_load_float(old),
            |nav| nav.replace_call(procedure),
        )
    }

    /// [`Navigator::insert_after_all`] for a member resolved through `members`
    pub fn insert_after_all_query(
        &mut self,
        members: &MemberResolver<'_, 'g>,
        query: &MemberQuery<'g>,
        procedure: &'g MethodData<'g>,
    ) -> Result<usize, Error> {
        let member = members.resolve(query)?;
        self.insert_after_all(member, procedure)
    }

    /// [`Navigator::replace_all_calls`] for a member resolved through `members`
    pub fn replace_all_calls_query(
        &mut self,
        members: &MemberResolver<'_, 'g>,
        query: &MemberQuery<'g>,
        procedure: &'g MethodData<'g>,
    ) -> Result<usize, Error> {
        let member = members.resolve(query)?;
        self.replace_all_calls(member, procedure)
    }
}

/// Report an exhausted branch search from where the edit started
fn exhausted_from(err: Error, from: usize) -> Error {
    match err {
        Error::NavigationExhausted { .. } => Error::NavigationExhausted {
            from,
            boundary: Boundary::End,
        },
        err => err,
    }
}
