//! Chat commands the bot answers, keyed by name.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::telegram::BotCommand;
use crate::ups::report;
use crate::ups::store::DeviceStateStore;

/// What a handler gets to look at when building its reply.
pub struct CommandContext<'a> {
    pub store: &'a DeviceStateStore,
    pub registry: &'a CommandRegistry,
    pub now: DateTime<Utc>,
}

pub type Handler = fn(&CommandContext<'_>, &str) -> String;

pub struct CommandSpec {
    pub description: String,
    /// Whether free-form text after the command is passed to the handler.
    pub takes_argument: bool,
    handler: Handler,
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandSpec>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `start`, `help` and `status`.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("start", "initialization", false, start);
        registry.register("help", "command list", false, help);
        registry.register("status", "list ups states", true, status);
        registry
    }

    pub fn register(
        &mut self,
        name: &str,
        description: &str,
        takes_argument: bool,
        handler: Handler,
    ) {
        self.commands.insert(
            name.to_string(),
            CommandSpec {
                description: description.to_string(),
                takes_argument,
                handler,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    /// Menu entries for `setMyCommands`.
    pub fn bot_commands(&self) -> Vec<BotCommand> {
        self.commands
            .iter()
            .map(|(name, spec)| BotCommand {
                command: name.clone(),
                description: spec.description.clone(),
            })
            .collect()
    }

    /// Run the named command and return its reply, or `None` if it is unknown.
    pub fn dispatch(
        &self,
        name: &str,
        argument: &str,
        store: &DeviceStateStore,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let spec = self.get(name)?;
        let argument = if spec.takes_argument { argument } else { "" };
        let ctx = CommandContext {
            store,
            registry: self,
            now,
        };
        Some((spec.handler)(&ctx, argument))
    }
}

fn start(ctx: &CommandContext<'_>, _argument: &str) -> String {
    format!(
        "nut-to-telegram is running, tracking {} ups. /help lists commands.",
        ctx.store.len()
    )
}

fn help(ctx: &CommandContext<'_>, _argument: &str) -> String {
    let names: Vec<String> = ctx.registry.names().map(|n| format!("/{n}")).collect();
    format!("commands: {}", names.join(", "))
}

/// Full report, or only the devices whose topic contains the argument.
fn status(ctx: &CommandContext<'_>, argument: &str) -> String {
    let mut snapshot = ctx.store.snapshot();
    if !argument.is_empty() {
        snapshot.retain(|(topic, _)| topic.contains(argument));
    }
    report::render(&snapshot, ctx.now)
}
