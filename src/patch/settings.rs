use crate::il::MemberName;

pub struct Settings {
    /// Prefix of the placeholder names given to unnamed locals (eg. `V_` for `V_0`, `V_1`, ...)
    pub local_name_prefix: String,

    /// Prefix of the placeholder names given to unnamed labels (eg. `L_` for `L_0`, `L_1`, ...)
    pub label_name_prefix: String,

    /// Name of a procedure parameter that binds to the instance of the edited method
    pub instance_parameter: MemberName,

    /// Name of the by-ref procedure parameter through which an injected return sets the value
    /// the edited method returns
    pub result_parameter: MemberName,

    /// Name of the local that holds the value of an injected return
    pub result_local: MemberName,

    /// Use `br.s` when turning a short conditional branch into an unconditional one
    ///
    /// The host is expected to widen branches whose offsets no longer fit after patching, so
    /// this only matters for hosts that reassemble without widening.
    pub prefer_short_branches: bool,
}

impl Settings {
    pub fn new() -> Settings {
        Settings {
            local_name_prefix: String::from("V_"),
            label_name_prefix: String::from("L_"),
            instance_parameter: MemberName::INSTANCE,
            result_parameter: MemberName::RESULT,
            result_local: MemberName::RESULT,
            prefer_short_branches: true,
        }
    }
}

impl Default for Settings {
    fn default() -> Settings {
        Settings::new()
    }
}
