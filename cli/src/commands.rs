use std::sync::Arc;

use anyhow::Context;
use dot_common::{
    abi::{AbiFunction, AbiValue, Address, ContractAbi},
    async_handler,
    prompt::{
        argument::{Arg, ArgumentManager},
        colorize,
        command::{Command, CommandError, CommandHandler, CommandManager},
        Color,
    },
};
use indexmap::IndexMap;
use log::debug;
use primitive_types::U256;

use crate::{
    gateway::{ContractGateway, SendOptions},
    tracker::TransactionTracker,
};

// Per-signature tuning of the generated commands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodOptions {
    pub skip: bool,
    pub dangerous: bool,
    // Used when the contract userdoc has no notice
    pub notice: Option<&'static str>,
}

impl MethodOptions {
    fn notice(notice: &'static str) -> Self {
        Self {
            notice: Some(notice),
            ..Default::default()
        }
    }
}

// Defaults shipped for the LicenseCore contract
pub fn license_core_methods() -> IndexMap<&'static str, MethodOptions> {
    let mut methods = IndexMap::new();
    methods.insert(
        "setCEO(address)",
        MethodOptions {
            dangerous: true,
            ..Default::default()
        },
    );
    methods.insert(
        "setNewAddress(address)",
        MethodOptions {
            dangerous: true,
            notice: Some("Sets a new contract address"),
            ..Default::default()
        },
    );
    methods.insert("ceoAddress()", MethodOptions::notice("Get the CEO's Address"));
    methods.insert("cfoAddress()", MethodOptions::notice("Get the CFO's Address"));
    methods.insert("cooAddress()", MethodOptions::notice("Get the COOs address"));
    methods.insert("unpause()", MethodOptions::notice("Unpause the contract"));
    methods.insert("paused()", MethodOptions::notice("Checks if the contract is paused"));
    methods.insert("newContractAddress()", MethodOptions::notice("Gets the new contract address"));
    methods.insert("products()", MethodOptions::notice("Gets the products"));
    methods.insert("affiliateProgram()", MethodOptions::notice("Get the affiliate program address"));
    methods.insert("allProductIds()", MethodOptions::notice("Get all product ids"));
    methods.insert("withdrawalAddress()", MethodOptions::notice("Get the withdrawal address"));
    methods.insert(
        "createPromotionalPurchase(uint256,uint256,address,uint256)",
        MethodOptions::notice("Creates a promotional purchase"),
    );
    methods
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedCommand<'a> {
    pub function: &'a AbiFunction,
    pub notice: String,
    pub dangerous: bool,
}

impl SynthesizedCommand<'_> {
    pub fn confirmation_flag(&self) -> Option<String> {
        self.dangerous
            .then(|| format!("yes-im-sure-{}", self.function.get_name()))
    }
}

// Functions that become commands, sorted by name
// A function needs a notice, from the userdoc or from the options, to be exposed
pub fn synthesized_functions<'a>(
    contract: &'a ContractAbi,
    methods: &IndexMap<&'static str, MethodOptions>,
) -> Vec<SynthesizedCommand<'a>> {
    let mut functions: Vec<&AbiFunction> = contract.get_functions().iter().collect();
    functions.sort_by(|a, b| a.get_name().cmp(b.get_name()));

    let mut commands = Vec::new();
    for function in functions {
        let options = methods
            .get(function.get_signature().as_str())
            .cloned()
            .unwrap_or_default();
        if options.skip {
            continue;
        }

        if contract.is_overloaded(function.get_name()) {
            if log::log_enabled!(log::Level::Debug) {
                debug!("Skipping overloaded function {}", function.get_signature());
            }
            continue;
        }

        let notice = match contract.get_notice(function).or(options.notice) {
            Some(notice) => notice.to_owned(),
            None => {
                if log::log_enabled!(log::Level::Debug) {
                    debug!("No userdoc for {}", function.get_signature());
                }
                continue;
            }
        };

        commands.push(SynthesizedCommand {
            function,
            notice,
            dangerous: options.dangerous,
        });
    }

    commands
}

// Shared state of the contract commands
pub struct CommandData {
    pub gateway: Arc<ContractGateway>,
    pub tracker: TransactionTracker,
    pub from: Option<Address>,
    pub gas_price: Option<U256>,
    pub gas_limit: Option<U256>,
    pub value: Option<U256>,
}

pub fn build_command_manager(
    data: CommandData,
    methods: &IndexMap<&'static str, MethodOptions>,
) -> Result<CommandManager<CommandData>, CommandError> {
    let manager = CommandManager::new(data);
    manager.register_default_commands()?;

    let gateway = Arc::clone(&manager.get_data().gateway);
    let contract = gateway.get_contract();
    for synthesized in synthesized_functions(contract, methods) {
        let function = synthesized.function;
        let args = function
            .get_inputs()
            .iter()
            .map(|param| {
                let description = contract
                    .get_param_doc(function, param.get_cli_name())
                    .or_else(|| contract.get_param_doc(function, param.get_name()))
                    .unwrap_or_default();
                Arg::new(param.get_cli_name(), param.get_type().clone(), description)
            })
            .collect();

        let mut command = Command::with_required_arguments(
            function.get_name(),
            &synthesized.notice,
            args,
            CommandHandler::Async(async_handler!(invoke_contract_function)),
        );
        if let Some(flag) = synthesized.confirmation_flag() {
            command = command.require_confirmation(&flag);
        }
        manager.add_command(command)?;
    }

    Ok(manager)
}

fn output_name(function: &AbiFunction, index: usize) -> String {
    match function.get_outputs().get(index) {
        Some(param) if !param.get_name().is_empty() => param.get_cli_name().to_owned(),
        _ => index.to_string(),
    }
}

async fn invoke_contract_function(
    manager: &CommandManager<CommandData>,
    command: &Command<CommandData>,
    args: ArgumentManager,
) -> Result<(), CommandError> {
    let data = manager.get_data();
    let function = data
        .gateway
        .get_contract()
        .get_function(command.get_name())
        .context("Command has no matching contract function")?;
    let values = args.into_values();

    if function.is_read_only() {
        let result = data
            .gateway
            .call(command.get_name(), &values)
            .await
            .with_context(|| format!("Error while calling {}", function.get_signature()))?;

        match result.as_slice() {
            [single] => manager.message(single),
            values => {
                let named: IndexMap<String, &AbiValue> = values
                    .iter()
                    .enumerate()
                    .map(|(i, value)| (output_name(function, i), value))
                    .collect();
                let json = serde_json::to_string_pretty(&named).context("Error while serializing result")?;
                manager.message(json);
            }
        }
        return Ok(());
    }

    if function.is_payable() && data.value.is_none() {
        return Err(CommandError::MissingOption("value".to_owned()));
    }

    let from = data
        .gateway
        .resolve_sender(data.from)
        .await
        .context("Error while resolving the sender")?;
    let options = SendOptions {
        from,
        gas_price: data.gas_price,
        gas_limit: data.gas_limit,
        value: data.value,
    };

    let pending = data
        .gateway
        .send(command.get_name(), &values, &options)
        .await
        .with_context(|| format!("Error while sending {}", function.get_signature()))?;
    let receipt = data
        .tracker
        .track(pending)
        .await
        .with_context(|| format!("{} was not confirmed", function.get_signature()))?;

    let json = serde_json::to_string_pretty(&receipt).context("Error while serializing receipt")?;
    manager.message(format!("{} {}", colorize(Color::Green, "Receipt:"), json));
    if !receipt.logs.is_empty() {
        let events = serde_json::to_string_pretty(&receipt.logs).context("Error while serializing events")?;
        manager.message(format!("Events: {}", events));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn contract() -> ContractAbi {
        let abi = json!([
            {"type": "function", "name": "setCEO", "inputs": [{"name": "_newCEO", "type": "address"}], "outputs": []},
            {"type": "function", "name": "paused", "constant": true, "inputs": [], "outputs": [{"name": "", "type": "bool"}]},
            {"type": "function", "name": "ceoAddress", "constant": true, "inputs": [], "outputs": [{"name": "", "type": "address"}]},
            {"type": "function", "name": "undocumented", "inputs": [], "outputs": []},
            {"type": "function", "name": "setPrice", "inputs": [
                {"name": "_productId", "type": "uint256"}, {"name": "_price", "type": "uint256"}], "outputs": []}
        ]);
        let userdoc = json!({"methods": {
            "setCEO(address)": {"notice": "Sets the CEO"},
            "setPrice(uint256,uint256)": {"notice": "Set the price of a product"}
        }});
        ContractAbi::new("LicenseCore", &abi, userdoc, Value::Null).unwrap()
    }

    #[test]
    fn test_synthesized_functions() {
        let contract = contract();
        let commands = synthesized_functions(&contract, &license_core_methods());
        let names: Vec<&str> = commands.iter().map(|c| c.function.get_name().as_str()).collect();
        assert_eq!(names, vec!["ceoAddress", "paused", "setCEO", "setPrice"]);

        assert_eq!(commands[0].notice, "Get the CEO's Address");
        assert_eq!(commands[2].notice, "Sets the CEO");
        assert_eq!(commands[2].confirmation_flag().as_deref(), Some("yes-im-sure-setCEO"));
        assert_eq!(commands[3].confirmation_flag(), None);
    }

    #[test]
    fn test_skip_option() {
        let contract = contract();
        let mut methods = license_core_methods();
        methods.insert(
            "setPrice(uint256,uint256)",
            MethodOptions {
                skip: true,
                ..Default::default()
            },
        );
        let commands = synthesized_functions(&contract, &methods);
        assert!(commands.iter().all(|c| c.function.get_name() != "setPrice"));
    }

    #[test]
    fn test_without_options_only_documented_functions() {
        let contract = contract();
        let commands = synthesized_functions(&contract, &IndexMap::new());
        let names: Vec<&str> = commands.iter().map(|c| c.function.get_name().as_str()).collect();
        assert_eq!(names, vec!["setCEO", "setPrice"]);
        assert!(!commands[0].dangerous);
    }
}
