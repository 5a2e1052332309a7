use crate::commands::{key, schema};

/// Titled block of sample invocations shown after a subcommand's long help.
#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

/// Subcommand name paired with its example groups.
pub struct CommandExample {
    pub name: &'static str,
    pub groups: &'static [ExampleGroup],
}

pub const fn command_examples() -> [CommandExample; 2] {
    [
        CommandExample { name: "key", groups: key::EXAMPLES },
        CommandExample { name: "schema", groups: schema::EXAMPLES },
    ]
}
