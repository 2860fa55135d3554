mod common;

use common::{member_name, Fixture};
use ilpatch::il::*;
use ilpatch::patch::{Boundary, Error};

/// Body of `Player.Update(int x, string y)`, with a `bool` local `V_0`
fn update_code<'g>() -> Vec<Instruction<'g>> {
    vec![
        Instruction::load_arg(1),
        Instruction::load_int32(1),
        Instruction::new(Opcode::Add, Operand::None).unwrap(),
        Instruction::new(Opcode::Pop, Operand::None).unwrap(),
        Instruction::nop(),
        Instruction::ret(),
    ]
}

#[test]
fn inject_call_after() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);

    let f = fx.procedure(
        "F",
        vec![
            fx.parameter("v", fx.core.boolean).with_binding(BindingHint::Local(
                LocalSelector::TypeOccurrence {
                    local_type: None,
                    occurrence: 0,
                },
            )),
            fx.parameter("x", fx.core.int32),
        ],
        fx.core.void,
    );
    let mut body = fx.body(fx.update, &[fx.core.boolean], update_code());
    let mut nav = body.navigator();
    nav.set_position(4);

    nav.insert_call(f, false).unwrap();
    assert_eq!(nav.position(), 7);
    assert_eq!(nav.instruction_at(5), Some(&Instruction::load_local(0)));
    assert_eq!(nav.instruction_at(6), Some(&Instruction::load_arg(1)));
    assert_eq!(nav.instruction_at(7), Some(&Instruction::call(f)));
    assert_eq!(nav.instruction_at(8), Some(&Instruction::ret()));
}

#[test]
fn inject_call_before() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);

    let f = fx.procedure(
        "F",
        vec![
            fx.parameter("__instance", fx.player),
            fx.parameter("y", fx.core.string),
        ],
        fx.core.void,
    );
    let mut code = update_code();
    code[5].labels.push(LabelId(0));
    let mut body = fx.body(fx.update, &[fx.core.boolean], code);
    let mut nav = body.navigator();
    nav.last();

    nav.insert_call(f, true).unwrap();
    assert_eq!(nav.position(), 8);
    assert!(nav.is(Opcode::Ret));
    assert_eq!(nav.current().labels, vec![LabelId(0)], "labels stay on ret");
    assert_eq!(nav.instruction_at(5), Some(&Instruction::load_arg(0)));
    assert_eq!(nav.instruction_at(6), Some(&Instruction::load_arg(2)));
    assert_eq!(nav.instruction_at(7), Some(&Instruction::call(f)));
}

#[test]
fn replace_static_call() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);

    let g = fx.procedure(
        "G",
        vec![
            fx.parameter("n", fx.core.int32),
            fx.parameter("extra", fx.core.int32)
                .with_binding(BindingHint::Local(LocalSelector::Index(1))),
        ],
        fx.core.int32,
    );
    let mut body = fx.body(
        fx.update,
        &[fx.core.boolean, fx.core.int32],
        vec![
            Instruction::load_int32(5),
            Instruction::call(fx.bar).with_labels(vec![LabelId(3)]),
            Instruction::new(Opcode::Pop, Operand::None).unwrap(),
            Instruction::ret(),
        ],
    );
    let mut nav = body.navigator();

    assert_eq!(nav.seek_member(MemberRef::Method(fx.bar)).unwrap(), 1);
    nav.replace_call(g).unwrap();
    assert_eq!(nav.position(), 2);
    assert_eq!(*nav.current(), Instruction::call(g));

    let edited = body.result().unwrap();
    assert_eq!(edited.instructions.len(), 5);
    assert_eq!(
        edited.instructions[1],
        Instruction::load_local(1).with_labels(vec![LabelId(3)]),
        "labels move to the first load"
    );
    assert!(edited.instructions[2].labels.is_empty());
}

#[test]
fn replace_call_checks_signature() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);

    let renamed = fx.procedure(
        "Renamed",
        vec![fx.parameter("count", fx.core.int32)],
        fx.core.int32,
    );
    let too_short = fx.procedure("TooShort", vec![], fx.core.int32);
    let wrong_return = fx.procedure(
        "WrongReturn",
        vec![fx.parameter("n", fx.core.int32)],
        fx.core.string,
    );
    let mut body = fx.body(
        fx.update,
        &[],
        vec![
            Instruction::load_int32(5),
            Instruction::call(fx.bar),
            Instruction::ret(),
        ],
    );
    let mut nav = body.navigator();
    nav.seek_member(MemberRef::Method(fx.bar)).unwrap();

    assert!(matches!(
        nav.replace_call(renamed),
        Err(Error::ParameterOrderMismatch { position: 0, .. })
    ));
    assert!(matches!(
        nav.replace_call(too_short),
        Err(Error::MissingParameter { .. })
    ));
    assert!(matches!(
        nav.replace_call(wrong_return),
        Err(Error::TypeIncompatible { .. })
    ));
    // a constant load takes no parameters, so `count` has to be bound like an injected one
    nav.first();
    assert!(matches!(
        nav.replace_call(renamed),
        Err(Error::UnknownParameter { .. })
    ));
    nav.last();
    assert!(matches!(
        nav.replace_call(too_short),
        Err(Error::InvalidCurrentInstruction { .. })
    ));
    assert_eq!(nav.len(), 3);
}

#[test]
fn replace_instance_call() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);

    let heal = fx.player_method("Heal", vec![fx.parameter("amount", fx.core.int32)], fx.core.void);
    let logged_heal = fx.procedure(
        "LoggedHeal",
        vec![
            fx.parameter("player", fx.player),
            fx.parameter("amount", fx.core.int32),
            fx.parameter("y", fx.core.string),
        ],
        fx.core.void,
    );
    let by_ref_instance = fx.procedure(
        "ByRefHeal",
        vec![
            fx.parameter("player", graph.by_ref(fx.player)),
            fx.parameter("amount", fx.core.int32),
        ],
        fx.core.void,
    );
    let mut body = fx.body(
        fx.update,
        &[],
        vec![
            Instruction::load_arg(0),
            Instruction::load_int32(10),
            Instruction::new(Opcode::CallVirt, Operand::Method(heal)).unwrap(),
            Instruction::ret(),
        ],
    );
    let mut nav = body.navigator();
    nav.seek_member(MemberRef::Method(heal)).unwrap();

    assert!(matches!(
        nav.replace_call(by_ref_instance),
        Err(Error::MissingByRef { .. })
    ));
    nav.replace_call(logged_heal).unwrap();
    assert_eq!(nav.position(), 3);
    assert_eq!(nav.previous(), Some(&Instruction::load_arg(2)));
    assert_eq!(*nav.current(), Instruction::call(logged_heal));
}

#[test]
fn replace_call_needs_instance() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);

    let heal = fx.player_method("Heal", vec![fx.parameter("amount", fx.core.int32)], fx.core.void);
    let no_parameters = fx.procedure("NoParameters", vec![], fx.core.void);
    let forgot_instance = fx.procedure(
        "ForgotInstance",
        vec![fx.parameter("amount", fx.core.int32)],
        fx.core.void,
    );
    let mut body = fx.body(
        fx.update,
        &[],
        vec![
            Instruction::load_arg(0),
            Instruction::load_int32(10),
            Instruction::call(heal),
            Instruction::ret(),
        ],
    );
    let mut nav = body.navigator();
    nav.seek_member(MemberRef::Method(heal)).unwrap();

    assert!(matches!(
        nav.replace_call(no_parameters),
        Err(Error::MissingInstance(_))
    ));
    assert!(matches!(
        nav.replace_call(forgot_instance),
        Err(Error::MissingInstance(_))
    ));
    assert_eq!(nav.position(), 2);
    assert_eq!(*nav.current(), Instruction::call(heal));
}

#[test]
fn replace_all_constants() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);

    let mut body = fx.body(
        fx.update,
        &[],
        vec![
            Instruction::load_int32(5),
            Instruction::load_int32(5),
            Instruction::load_int32(7),
            Instruction::load_int32(5),
            Instruction::ret(),
        ],
    );
    let mut nav = body.navigator();
    nav.set_position(2);

    assert_eq!(nav.replace_all_integer_constant(5, 6, None, None).unwrap(), 3);
    assert_eq!(nav.position(), 2);
    assert!(nav.is_load_integer(7));
    for position in [0, 1, 3] {
        assert!(nav.instruction_at(position).unwrap().loads_integer(6));
    }

    assert_eq!(
        nav.replace_all_integer_constant(6, 9, Some(1), Some(3))
            .unwrap(),
        1
    );
    assert!(nav.instruction_at(0).unwrap().loads_integer(6));
    assert!(nav.instruction_at(1).unwrap().loads_integer(9));
    assert!(nav.instruction_at(3).unwrap().loads_integer(6));
}

#[test]
fn replace_all_float_constants() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);

    let mut body = fx.body(
        fx.update,
        &[],
        vec![
            Instruction::new(Opcode::LdcR4, Operand::Float(1.5)).unwrap(),
            Instruction::new(Opcode::LdcR8, Operand::Float(1.5)).unwrap(),
            Instruction::ret(),
        ],
    );
    let mut nav = body.navigator();

    assert_eq!(nav.replace_all_float_constant(1.5, 2.0, None, None).unwrap(), 2);
    assert!(nav.is_with(Opcode::LdcR4, &Operand::Float(2.0)));
    assert_eq!(
        nav.instruction_at(1),
        Some(&Instruction::new(Opcode::LdcR8, Operand::Float(2.0)).unwrap())
    );
}

#[test]
fn replace_constants_with_calls() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);

    let tuned = fx.procedure("Tuned", vec![fx.parameter("x", fx.core.int32)], fx.core.int32);
    let mut body = fx.body(
        fx.update,
        &[],
        vec![
            Instruction::load_int32(5),
            Instruction::load_int32(7),
            Instruction::load_int32(5),
            Instruction::ret(),
        ],
    );
    let mut nav = body.navigator();

    assert_eq!(
        nav.replace_all_integer_constant_with_call(5, tuned).unwrap(),
        2
    );
    assert_eq!(nav.position(), 0);
    let code: Vec<_> = nav.body().code().iter().cloned().collect();
    assert_eq!(
        code,
        vec![
            Instruction::load_arg(1),
            Instruction::call(tuned),
            Instruction::load_int32(7),
            Instruction::load_arg(1),
            Instruction::call(tuned),
            Instruction::ret(),
        ]
    );
}

#[test]
fn replace_float_constants_with_calls() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);

    let scaled = fx.procedure("Scaled", vec![fx.parameter("y", fx.core.string)], fx.core.float32);
    let single = |value: f64| Instruction::new(Opcode::LdcR4, Operand::Float(value)).unwrap();
    let mut body = fx.body(
        fx.update,
        &[],
        vec![single(1.5), single(2.0), single(1.5), Instruction::ret()],
    );
    let mut nav = body.navigator();

    assert_eq!(
        nav.replace_all_float_constant_with_call(1.5, scaled).unwrap(),
        2
    );
    assert_eq!(nav.position(), 0);
    let code: Vec<_> = nav.body().code().iter().cloned().collect();
    assert_eq!(
        code,
        vec![
            Instruction::load_arg(2),
            Instruction::call(scaled),
            single(2.0),
            Instruction::load_arg(2),
            Instruction::call(scaled),
            Instruction::ret(),
        ]
    );

    // the double can't be replaced by a float32 call, so neither is the single before it
    let mut body = fx.body(
        fx.update,
        &[],
        vec![
            single(1.5),
            Instruction::new(Opcode::LdcR8, Operand::Float(1.5)).unwrap(),
            Instruction::ret(),
        ],
    );
    let mut nav = body.navigator();
    assert!(matches!(
        nav.replace_all_float_constant_with_call(1.5, scaled),
        Err(Error::TypeIncompatible { .. })
    ));
    assert_eq!(nav.len(), 3);
    assert_eq!(*nav.current(), single(1.5));
}

#[test]
fn resolved_member_searches() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);
    let cache = MemberCache::new();
    let members = MemberResolver::new(&graph, &cache);

    let get_health = fx.player_method("get_Health", vec![], fx.core.int32);
    let set_health = fx.player_method(
        "set_Health",
        vec![fx.parameter("value", fx.core.int32)],
        fx.core.void,
    );
    let adjust = fx.procedure("Adjust", vec![fx.parameter("value", fx.core.int32)], fx.core.int32);
    let clamped = fx.procedure(
        "ClampedHealth",
        vec![fx.parameter("player", fx.player)],
        fx.core.int32,
    );
    let mut body = fx.body(
        fx.update,
        &[],
        vec![
            Instruction::load_arg(0),
            Instruction::load_arg(0),
            Instruction::call(get_health),
            Instruction::load_int32(1),
            Instruction::new(Opcode::Add, Operand::None).unwrap(),
            Instruction::call(set_health),
            Instruction::ret(),
        ],
    );
    let mut nav = body.navigator();
    let health = MemberQuery::new(fx.player, member_name("Health"));

    assert_eq!(nav.seek_query(&members, &health).unwrap(), 2);
    assert!(nav.calls_query(&members, &health).unwrap());
    assert_eq!(nav.seek_setter(&members, &health).unwrap(), 5);
    assert_eq!(nav.rewind_query(&members, &health).unwrap(), 2);
    assert!(matches!(
        nav.rewind_setter(&members, &health),
        Err(Error::NavigationExhausted {
            from: 2,
            boundary: Boundary::Start
        })
    ));
    assert_eq!(cache.len(), 2, "getter and setter");

    assert_eq!(nav.insert_after_all_query(&members, &health, adjust).unwrap(), 1);
    assert_eq!(nav.position(), 2);
    assert_eq!(nav.instruction_at(3), Some(&Instruction::call(adjust)));
    assert_eq!(nav.replace_all_calls_query(&members, &health, clamped).unwrap(), 1);
    assert_eq!(*nav.current(), Instruction::call(clamped));
    assert_eq!(nav.len(), 8);
    assert_eq!(cache.len(), 2);

    let mana = MemberQuery::new(fx.player, member_name("Mana"));
    assert!(matches!(nav.seek_query(&members, &mana), Err(Error::Il(_))));
    assert_eq!(nav.position(), 2);
}

#[test]
fn insert_after_every_access() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);

    let clamp = fx.procedure(
        "Clamp",
        vec![
            fx.parameter("value", fx.core.int32),
            fx.parameter("x", fx.core.int32),
        ],
        fx.core.int32,
    );
    let double = fx.procedure("Double", vec![fx.parameter("n", fx.core.int32)], fx.core.int32);
    let mut body = fx.body(
        fx.update,
        &[],
        vec![
            Instruction::load_int32(1),
            Instruction::call(fx.bar),
            Instruction::load_int32(2),
            Instruction::call(fx.bar),
            Instruction::new(Opcode::Add, Operand::None).unwrap(),
            Instruction::ret(),
        ],
    );
    let mut nav = body.navigator();
    nav.set_position(4);

    let bar = MemberRef::Method(fx.bar);
    assert_eq!(nav.insert_after_all(bar, clamp).unwrap(), 2);
    assert_eq!(nav.position(), 4);
    assert_eq!(nav.len(), 10);
    assert_eq!(nav.instruction_at(2), Some(&Instruction::load_arg(1)));
    assert_eq!(nav.instruction_at(3), Some(&Instruction::call(clamp)));

    assert_eq!(nav.replace_all_calls(bar, double).unwrap(), 2);
    nav.first();
    assert!(matches!(
        nav.seek_member(bar),
        Err(Error::NavigationExhausted {
            from: 0,
            boundary: Boundary::End
        })
    ));
    nav.first();
    assert_eq!(nav.seek_member(MemberRef::Method(double)).unwrap(), 1);
}

#[test]
fn by_ref_bindings() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);
    let int_ref = graph.by_ref(fx.core.int32);

    let target = fx.player_method(
        "Tick",
        vec![
            fx.parameter("count", int_ref),
            fx.parameter("delta", fx.core.int32),
        ],
        fx.core.void,
    );
    let mut body = fx.body(target, &[], vec![Instruction::nop(), Instruction::ret()]);
    let mut nav = body.navigator();

    // by-ref formal, by-ref source: passed along as is
    let pass_ref = fx.procedure("PassRef", vec![fx.parameter("count", int_ref)], fx.core.void);
    nav.insert_call(pass_ref, false).unwrap();
    assert_eq!(nav.previous(), Some(&Instruction::load_arg(1)));

    // by-ref formal, plain argument: its address is taken
    let take_address = fx.procedure(
        "TakeAddress",
        vec![fx.parameter("delta", int_ref)],
        fx.core.void,
    );
    nav.insert_call(take_address, false).unwrap();
    assert_eq!(nav.previous(), Some(&Instruction::load_arg_address(2)));

    // plain formal, by-ref source
    let by_value = fx.procedure("ByValue", vec![fx.parameter("count", fx.core.int32)], fx.core.void);
    assert!(matches!(
        nav.insert_call(by_value, false),
        Err(Error::UnexpectedByRef { .. })
    ));

    let wrong_type = fx.procedure(
        "WrongType",
        vec![fx.parameter("delta", fx.core.string)],
        fx.core.void,
    );
    assert!(matches!(
        nav.insert_call(wrong_type, false),
        Err(Error::TypeIncompatible { .. })
    ));

    let unknown = fx.procedure("Unknown", vec![fx.parameter("speed", fx.core.int32)], fx.core.void);
    assert!(matches!(
        nav.insert_call(unknown, false),
        Err(Error::UnknownParameter { .. })
    ));
    assert_eq!(nav.len(), 6);
}

#[test]
fn instance_of_static_method() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);

    let hook = fx.procedure(
        "Hook",
        vec![fx
            .parameter("me", fx.core.object)
            .with_binding(BindingHint::Original(Some(member_name("__instance"))))],
        fx.core.void,
    );
    let mut body = fx.body(fx.bar, &[], vec![Instruction::load_arg(0), Instruction::ret()]);
    let mut nav = body.navigator();

    assert!(matches!(
        nav.insert_call(hook, true),
        Err(Error::MissingInstance(_))
    ));
}

#[test]
fn local_slots() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);
    let mut body = fx.body(fx.update, &[fx.core.boolean], update_code());
    let symbols = body.symbols_mut();

    let slot = symbols.get_or_create_local(Some(fx.core.int32), Some("x")).unwrap();
    assert_eq!(slot.index, 1);
    let again = symbols.get_or_create_local(Some(fx.core.int32), Some("x")).unwrap();
    assert_eq!(again.index, slot.index);
    assert!(matches!(
        symbols.get_or_create_local(Some(fx.core.string), Some("x")),
        Err(Error::TypeIncompatible { .. })
    ));
    assert!(matches!(
        symbols.name_local(0, "x"),
        Err(Error::NameCollision(_))
    ));
    assert_eq!(symbols.locals().len(), 2);
}

#[test]
fn conditional_return() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);
    let int_ref = graph.by_ref(fx.core.int32);

    let get_health = fx.player_method(
        "GetHealth",
        vec![fx.parameter("bonus", fx.core.int32)],
        fx.core.int32,
    );
    let prefix = fx.procedure(
        "Prefix",
        vec![
            fx.parameter("__result", int_ref),
            fx.parameter("bonus", fx.core.int32),
        ],
        fx.core.boolean,
    );
    let mut body = fx.body(
        get_health,
        &[],
        vec![
            Instruction::load_int32(100),
            Instruction::load_arg(1),
            Instruction::new(Opcode::Add, Operand::None).unwrap(),
            Instruction::ret(),
        ],
    );
    let mut nav = body.navigator();

    nav.insert_return(prefix, true).unwrap();
    assert_eq!(nav.position(), 6);
    let resume = nav.current_label(false).unwrap();
    assert_eq!(
        nav.body().code().as_slice()[..6].to_vec(),
        vec![
            Instruction::load_local_address(0),
            Instruction::load_arg(1),
            Instruction::call(prefix),
            Instruction::branch(Opcode::BrTrue, resume).unwrap(),
            Instruction::load_local(0),
            Instruction::ret(),
        ]
    );
    assert_eq!(
        nav.body().symbols().local_named("__result").unwrap().local_type,
        fx.core.int32
    );
    assert!(body.result().is_ok());
}

#[test]
fn unconditional_return_after() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);

    let stop = fx.procedure("Stop", vec![fx.parameter("x", fx.core.int32)], fx.core.void);
    let mut body = fx.body(fx.update, &[fx.core.boolean], update_code());
    let mut nav = body.navigator();

    nav.insert_return(stop, false).unwrap();
    assert_eq!(nav.position(), 3);
    assert!(nav.is(Opcode::Ret));
    assert_eq!(nav.previous(), Some(&Instruction::call(stop)));
    assert_eq!(nav.len(), 9);
}

#[test]
fn return_result_rules() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);
    let int_ref = graph.by_ref(fx.core.int32);

    let with_result = fx.procedure(
        "WithResult",
        vec![fx.parameter("__result", int_ref)],
        fx.core.boolean,
    );
    let without_result = fx.procedure("WithoutResult", vec![], fx.core.boolean);
    let plain_result = fx.procedure(
        "PlainResult",
        vec![fx.parameter("__result", fx.core.int32)],
        fx.core.void,
    );
    let string_result = fx.procedure(
        "StringResult",
        vec![fx.parameter("__result", graph.by_ref(fx.core.string))],
        fx.core.void,
    );
    let returns_int = fx.procedure("ReturnsInt", vec![], fx.core.int32);

    let mut void_body = fx.body(fx.update, &[], update_code());
    let mut nav = void_body.navigator();
    assert!(matches!(
        nav.insert_return(with_result, true),
        Err(Error::UnexpectedResult(_))
    ));
    assert!(matches!(
        nav.insert_return(returns_int, true),
        Err(Error::InvalidReturn { .. })
    ));

    let mut int_body = fx.body(
        fx.bar,
        &[],
        vec![Instruction::load_arg(0), Instruction::ret()],
    );
    let mut nav = int_body.navigator();
    assert!(matches!(
        nav.insert_return(without_result, true),
        Err(Error::MissingResult(_))
    ));
    assert!(matches!(
        nav.insert_return(plain_result, true),
        Err(Error::MissingByRef { .. })
    ));
    assert!(matches!(
        nav.insert_return(string_result, true),
        Err(Error::TypeIncompatible { .. })
    ));
    nav.last();
    assert!(matches!(
        nav.insert_return(with_result, false),
        Err(Error::InvalidCurrentInstruction { .. })
    ));
    assert_eq!(nav.len(), 2);
    assert!(nav.body().symbols().locals().is_empty());
}

#[test]
fn injected_jump() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);

    let skip = fx.procedure("Skip", vec![fx.parameter("y", fx.core.string)], fx.core.boolean);
    let mut code = update_code();
    code[5].labels.push(LabelId(0));
    let mut body = fx.body(fx.update, &[fx.core.boolean], code);
    let mut nav = body.navigator();

    nav.insert_jump(skip, LabelId(0), false).unwrap();
    assert_eq!(nav.position(), 3);
    assert_eq!(
        *nav.current(),
        Instruction::branch(Opcode::BrTrue, LabelId(0)).unwrap()
    );
    assert!(matches!(
        nav.insert_jump(skip, LabelId(40), false),
        Err(Error::UnknownLabel(_))
    ));

    let returns_void = fx.procedure("ReturnsVoid", vec![], fx.core.void);
    assert!(matches!(
        nav.insert_jump(returns_void, LabelId(0), false),
        Err(Error::InvalidReturn { .. })
    ));
}

/// `if (x) { return 0; } return 1;`
fn branching_code<'g>() -> Vec<Instruction<'g>> {
    vec![
        Instruction::load_arg(1),
        Instruction::branch(Opcode::BrTrueS, LabelId(0)).unwrap(),
        Instruction::load_int32(1),
        Instruction::ret(),
        Instruction::load_int32(0).with_labels(vec![LabelId(0)]),
        Instruction::ret(),
    ]
}

#[test]
fn jump_always() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);

    let mut body = fx.body(fx.update, &[], branching_code());
    let mut nav = body.navigator();

    nav.jump_always().unwrap();
    assert_eq!(nav.position(), 2);
    assert_eq!(
        *nav.current(),
        Instruction::branch(Opcode::BrS, LabelId(0)).unwrap()
    );
    assert!(nav.previous().unwrap().opcode == Opcode::BrTrueS);

    // the inserted branch is unconditional, so it can't be rewritten again
    assert!(matches!(
        nav.jump_always(),
        Err(Error::UnexpectedBranch {
            position: 2,
            opcode: Opcode::BrS
        })
    ));
    assert_eq!(nav.position(), 2);
}

#[test]
fn jump_never() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let fx = Fixture::new(&graph);

    let mut body = fx.body(fx.update, &[], branching_code());
    let mut nav = body.navigator();

    nav.jump_never().unwrap();
    assert_eq!(nav.position(), 1);
    let fall_through = nav.label_for(2, None, false).unwrap();
    assert_eq!(nav.target_label().unwrap(), fall_through);

    nav.set_position(2);
    assert!(matches!(
        nav.jump_never(),
        Err(Error::NavigationExhausted {
            from: 2,
            boundary: Boundary::End
        })
    ));
    assert_eq!(nav.position(), 2);
    assert!(body.result().is_ok(), "label 0 is still attached");
}
