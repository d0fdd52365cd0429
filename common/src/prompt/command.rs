use std::{
    collections::HashSet,
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, PoisonError},
};

use anyhow::Error;
use indexmap::IndexMap;
use log::{error, info, warn};
use thiserror::Error;

use super::argument::*;
use crate::{async_handler, config::VERSION};

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Expected a command name")]
    ExpectedCommandName,
    #[error("Command '{}' was not found", _0)]
    CommandNotFound(String),
    #[error("Expected required argument {}", _0)]
    ExpectedRequiredArg(String), // arg name
    #[error("Too many arguments")]
    TooManyArguments,
    #[error(transparent)]
    ArgError(#[from] ArgError),
    #[error("Invalid argument: {}", _0)]
    InvalidArgument(String),
    #[error("This command is dangerous, confirm it with --{}", _0)]
    ConfirmationRequired(String),
    #[error("Missing required option '{}'", _0)]
    MissingOption(String),
    #[error(transparent)]
    Any(#[from] Error),
    #[error("Poison Error: {}", _0)]
    PoisonError(String),
}

impl<T> From<PoisonError<T>> for CommandError {
    fn from(err: PoisonError<T>) -> Self {
        Self::PoisonError(format!("{}", err))
    }
}

pub type SyncCommandCallback<T> = fn(&CommandManager<T>, &Command<T>, ArgumentManager) -> Result<(), CommandError>;
pub type AsyncCommandCallback<T> = for<'a> fn(
    &'a CommandManager<T>,
    &'a Command<T>,
    ArgumentManager,
) -> Pin<Box<dyn Future<Output = Result<(), CommandError>> + 'a>>;

pub enum CommandHandler<T> {
    Sync(SyncCommandCallback<T>),
    Async(AsyncCommandCallback<T>),
}

pub struct Command<T> {
    name: String,
    description: String,
    required_args: Vec<Arg>,
    optional_args: Vec<Arg>,
    // Flag that must be typed for the command to run
    confirmation: Option<String>,
    callback: CommandHandler<T>,
}

impl<T> Command<T> {
    pub fn new(name: &str, description: &str, callback: CommandHandler<T>) -> Self {
        Self::with_arguments(name, description, Vec::new(), Vec::new(), callback)
    }

    pub fn with_optional_arguments(name: &str, description: &str, optional_args: Vec<Arg>, callback: CommandHandler<T>) -> Self {
        Self::with_arguments(name, description, Vec::new(), optional_args, callback)
    }

    pub fn with_required_arguments(name: &str, description: &str, required_args: Vec<Arg>, callback: CommandHandler<T>) -> Self {
        Self::with_arguments(name, description, required_args, Vec::new(), callback)
    }

    pub fn with_arguments(name: &str, description: &str, required_args: Vec<Arg>, optional_args: Vec<Arg>, callback: CommandHandler<T>) -> Self {
        Self {
            name: name.to_owned(),
            description: description.to_owned(),
            required_args,
            optional_args,
            confirmation: None,
            callback,
        }
    }

    pub fn require_confirmation(mut self, flag: &str) -> Self {
        self.confirmation = Some(flag.to_owned());
        self
    }

    pub async fn execute(&self, manager: &CommandManager<T>, values: ArgumentManager) -> Result<(), CommandError> {
        match &self.callback {
            CommandHandler::Sync(handler) => handler(manager, self, values),
            CommandHandler::Async(handler) => handler(manager, self, values).await,
        }
    }

    pub fn get_name(&self) -> &String {
        &self.name
    }

    pub fn get_description(&self) -> &String {
        &self.description
    }

    pub fn get_required_args(&self) -> &Vec<Arg> {
        &self.required_args
    }

    pub fn get_optional_args(&self) -> &Vec<Arg> {
        &self.optional_args
    }

    pub fn get_confirmation(&self) -> Option<&String> {
        self.confirmation.as_ref()
    }

    pub fn get_usage(&self) -> String {
        let mut parts = vec![self.name.clone()];
        parts.extend(
            self.required_args
                .iter()
                .map(|arg| format!("<{}:{}>", arg.get_name(), arg.get_type())),
        );
        parts.extend(
            self.optional_args
                .iter()
                .map(|arg| format!("[{}:{}]", arg.get_name(), arg.get_type())),
        );
        if let Some(flag) = &self.confirmation {
            parts.push(format!("--{}", flag));
        }
        parts.join(" ")
    }
}

// Registry of the commands available to the operator, sharing `data` between handlers
pub struct CommandManager<T> {
    commands: Mutex<Vec<Arc<Command<T>>>>,
    data: T,
}

impl<T> CommandManager<T> {
    pub fn new(data: T) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            data,
        }
    }

    pub fn get_data(&self) -> &T {
        &self.data
    }

    // Register default commands:
    // - help
    // - version
    pub fn register_default_commands(&self) -> Result<(), CommandError>
    where
        T: 'static,
    {
        self.add_command(Command::with_optional_arguments(
            "help",
            "Show this help",
            vec![Arg::new("command", crate::abi::AbiType::String, "Command to describe")],
            CommandHandler::Async(async_handler!(help::<T>)),
        ))?;
        self.add_command(Command::new("version", "Show the current version", CommandHandler::Sync(version::<T>)))?;

        Ok(())
    }

    pub fn add_command(&self, command: Command<T>) -> Result<(), CommandError> {
        let mut commands = self.commands.lock()?;
        commands.push(Arc::new(command));
        Ok(())
    }

    pub fn get_command(&self, name: &str) -> Result<Arc<Command<T>>, CommandError> {
        let commands = self.commands.lock()?;
        commands
            .iter()
            .find(|command| *command.get_name() == *name)
            .cloned()
            .ok_or_else(|| CommandError::CommandNotFound(name.to_owned()))
    }

    pub fn get_command_names(&self) -> Result<Vec<String>, CommandError> {
        let commands = self.commands.lock()?;
        Ok(commands.iter().map(|c| c.get_name().clone()).collect())
    }

    pub async fn handle_command(&self, value: &str) -> Result<(), CommandError> {
        self.handle_tokens(value.split_whitespace().map(str::to_owned).collect())
            .await
    }

    // First token is the command name, `--name` tokens are flags, the rest are positional values
    pub async fn handle_tokens(&self, tokens: Vec<String>) -> Result<(), CommandError> {
        let mut tokens = tokens.into_iter();
        let command_name = tokens.next().ok_or(CommandError::ExpectedCommandName)?;
        let command = self.get_command(&command_name)?;

        let mut flags = HashSet::new();
        let mut positional = Vec::new();
        for token in tokens {
            match token.strip_prefix("--") {
                Some(flag) if !flag.is_empty() => {
                    if command.get_confirmation().map(|f| f.as_str()) != Some(flag) {
                        return Err(ArgError::UnknownFlag(flag.to_owned()).into());
                    }
                    flags.insert(flag.to_owned());
                }
                _ => positional.push(token),
            }
        }

        let mut positional = positional.into_iter();
        let mut arguments = IndexMap::new();
        for arg in command.get_required_args() {
            let arg_value = positional
                .next()
                .ok_or_else(|| CommandError::ExpectedRequiredArg(arg.get_name().to_owned()))?;
            arguments.insert(arg.get_name().clone(), arg.to_value(&arg_value)?);
        }

        // include all options args available
        for optional_arg in command.get_optional_args() {
            if let Some(arg_value) = positional.next() {
                arguments.insert(optional_arg.get_name().clone(), optional_arg.to_value(&arg_value)?);
            } else {
                break;
            }
        }

        if positional.next().is_some() {
            return Err(CommandError::TooManyArguments);
        }

        if let Some(flag) = command.get_confirmation() {
            if !flags.contains(flag) {
                return Err(CommandError::ConfirmationRequired(flag.clone()));
            }
        }

        command
            .execute(self, ArgumentManager::new(arguments, flags))
            .await
    }

    pub fn display_commands(&self) -> Result<(), CommandError> {
        let commands = self.commands.lock()?;
        self.message("Available commands:");
        for cmd in commands.iter() {
            self.message(format!("- {}: {}", cmd.get_name(), cmd.get_description()));
        }
        Ok(())
    }

    pub fn message<D: Display>(&self, message: D) {
        info!("{}", message);
    }

    pub fn warn<D: Display>(&self, message: D) {
        warn!("{}", message);
    }

    pub fn error<D: Display>(&self, message: D) {
        error!("{}", message);
    }
}

async fn help<T>(manager: &CommandManager<T>, _: &Command<T>, mut args: ArgumentManager) -> Result<(), CommandError> {
    if args.has_argument("command") {
        let name = args.get_value("command")?.to_string();
        let cmd = manager.get_command(&name)?;
        manager.message(format!("Usage: {}", cmd.get_usage()));
        for arg in cmd.get_required_args().iter().chain(cmd.get_optional_args()) {
            if !arg.get_description().is_empty() {
                manager.message(format!("  {}: {}", arg.get_name(), arg.get_description()));
            }
        }
    } else {
        manager.display_commands()?;
        manager.message("See how to use a command using help <command>");
    }
    Ok(())
}

fn version<T>(manager: &CommandManager<T>, _: &Command<T>, _: ArgumentManager) -> Result<(), CommandError> {
    manager.message(format!("Version: {}", VERSION));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::abi::{AbiType, AbiValue};

    #[derive(Default)]
    struct Counter {
        total: AtomicU64,
    }

    fn add(manager: &CommandManager<Counter>, _: &Command<Counter>, mut args: ArgumentManager) -> Result<(), CommandError> {
        let value = args.get_value("amount")?.as_uint().unwrap_or_default();
        manager.get_data().total.fetch_add(value.as_u64(), Ordering::SeqCst);
        Ok(())
    }

    async fn reset(manager: &CommandManager<Counter>, _: &Command<Counter>, args: ArgumentManager) -> Result<(), CommandError> {
        assert_eq!(args.into_values(), Vec::<AbiValue>::new());
        manager.get_data().total.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn manager() -> CommandManager<Counter> {
        let manager = CommandManager::new(Counter::default());
        manager.register_default_commands().unwrap();
        manager
            .add_command(Command::with_required_arguments(
                "add",
                "Add an amount",
                vec![Arg::new("amount", AbiType::Uint(64), "Amount to add")],
                CommandHandler::Sync(add),
            ))
            .unwrap();
        manager
            .add_command(
                Command::new("reset", "Reset the counter", CommandHandler::Async(async_handler!(reset)))
                    .require_confirmation("yes-im-sure-reset"),
            )
            .unwrap();
        manager
    }

    #[tokio::test]
    async fn test_handle_command() {
        let manager = manager();
        manager.handle_command("add 5").await.unwrap();
        manager.handle_command("add 0x0a").await.unwrap();
        assert_eq!(manager.get_data().total.load(Ordering::SeqCst), 15);

        assert!(matches!(
            manager.handle_command("add").await,
            Err(CommandError::ExpectedRequiredArg(_))
        ));
        assert!(matches!(
            manager.handle_command("add 1 2").await,
            Err(CommandError::TooManyArguments)
        ));
        assert!(matches!(
            manager.handle_command("add abc").await,
            Err(CommandError::ArgError(ArgError::InvalidValue(..)))
        ));
        assert!(matches!(
            manager.handle_command("unknown").await,
            Err(CommandError::CommandNotFound(_))
        ));
        assert!(matches!(manager.handle_command("").await, Err(CommandError::ExpectedCommandName)));
    }

    #[tokio::test]
    async fn test_confirmation_flag() {
        let manager = manager();
        manager.handle_command("add 3").await.unwrap();

        assert!(matches!(
            manager.handle_command("reset").await,
            Err(CommandError::ConfirmationRequired(_))
        ));
        assert_eq!(manager.get_data().total.load(Ordering::SeqCst), 3);

        assert!(matches!(
            manager.handle_command("add 1 --force").await,
            Err(CommandError::ArgError(ArgError::UnknownFlag(_)))
        ));

        manager
            .handle_command("reset --yes-im-sure-reset")
            .await
            .unwrap();
        assert_eq!(manager.get_data().total.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_usage() {
        let manager = manager();
        let add = manager.get_command("add").unwrap();
        assert_eq!(add.get_usage(), "add <amount:uint64>");
        let reset = manager.get_command("reset").unwrap();
        assert_eq!(reset.get_usage(), "reset --yes-im-sure-reset");
    }
}
