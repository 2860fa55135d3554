#![allow(dead_code)]

use ilpatch::il::*;
use ilpatch::patch::{MethodBody, Settings};

/// Install a logger once per test binary (output only shows up for failing tests)
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn member_name(name: &str) -> MemberName {
    MemberName::from_string(name.to_owned()).unwrap()
}

pub fn type_name(name: &str) -> TypeName {
    TypeName::from_string(name.to_owned()).unwrap()
}

/// Small game-like type graph to patch
///
///   - `Game.Player` with an instance method `Update(int x, string y): void`
///   - `Game.Foo` with a static method `Bar(int n): int`
///   - `Mod.Hooks`, which holds the injected procedures (see [`Fixture::procedure`])
pub struct Fixture<'g> {
    pub graph: &'g TypeGraph<'g>,
    pub core: CoreTypes<'g>,
    pub player: TypeId<'g>,
    pub hooks: TypeId<'g>,
    pub update: &'g MethodData<'g>,
    pub bar: &'g MethodData<'g>,
}

impl<'g> Fixture<'g> {
    pub fn new(graph: &'g TypeGraph<'g>) -> Fixture<'g> {
        init_logging();
        let core = graph.insert_core_types();
        let class = |name: &str| {
            graph.add_type(TypeData::new(
                type_name(name),
                TypeKind::Class,
                Some(core.object),
            ))
        };
        let player = class("Game.Player");
        let foo = class("Game.Foo");
        let hooks = class("Mod.Hooks");

        let update = graph.add_method(MethodData::new(
            player,
            member_name("Update"),
            vec![
                ParameterData::new(member_name("x"), core.int32),
                ParameterData::new(member_name("y"), core.string),
            ],
            core.void,
            MethodAccessFlags::PUBLIC | MethodAccessFlags::HIDE_BY_SIG,
        ));
        let bar = graph.add_method(MethodData::new(
            foo,
            member_name("Bar"),
            vec![ParameterData::new(member_name("n"), core.int32)],
            core.int32,
            MethodAccessFlags::public_static(),
        ));

        Fixture {
            graph,
            core,
            player,
            hooks,
            update,
            bar,
        }
    }

    pub fn parameter(&self, name: &str, param_type: TypeId<'g>) -> ParameterData<'g> {
        ParameterData::new(member_name(name), param_type)
    }

    /// Static method of `Mod.Hooks`
    pub fn procedure(
        &self,
        name: &str,
        parameters: Vec<ParameterData<'g>>,
        return_type: TypeId<'g>,
    ) -> &'g MethodData<'g> {
        self.graph.add_method(MethodData::new(
            self.hooks,
            member_name(name),
            parameters,
            return_type,
            MethodAccessFlags::public_static(),
        ))
    }

    /// Instance method of `Game.Player`
    pub fn player_method(
        &self,
        name: &str,
        parameters: Vec<ParameterData<'g>>,
        return_type: TypeId<'g>,
    ) -> &'g MethodData<'g> {
        self.graph.add_method(MethodData::new(
            self.player,
            member_name(name),
            parameters,
            return_type,
            MethodAccessFlags::PUBLIC,
        ))
    }

    pub fn body(
        &self,
        method: &'g MethodData<'g>,
        locals: &[TypeId<'g>],
        code: Vec<Instruction<'g>>,
    ) -> MethodBody<'g> {
        MethodBody::new(method, self.core, locals, code, Settings::new()).unwrap()
    }
}
