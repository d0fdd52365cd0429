use std::{fs::File, io::Write, path::Path, process::ExitCode, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Parser;
use dot_common::{
    abi::AbiCatalog,
    prompt::{colorize, setup_logger, Color, LoggerConfig},
    rpc::JsonRpcClient,
};
use dot_license_cli::{
    commands::{build_command_manager, license_core_methods, CommandData},
    config::{CliCommand, Config},
    gateway::ContractGateway,
    product::load_products,
    provider::{parse_network_id, RpcContract},
    reconcile::Reconciler,
    tracker::TransactionTracker,
};
use log::{error, info};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let mut config: Config = Config::parse();
    if let Some(path) = config.config_file.as_ref() {
        if config.generate_config_template {
            if Path::new(path).exists() {
                eprintln!("Config file already exists at {}", path);
                return Ok(ExitCode::SUCCESS);
            }

            let mut file = File::create(path).context("Error while creating config file")?;
            let json = serde_json::to_string_pretty(&config).context("Error while serializing config file")?;
            file.write_all(json.as_bytes()).context("Error while writing config file")?;
            println!("Config file template generated at {}", path);
            return Ok(ExitCode::SUCCESS);
        }

        // the command is only given on the command line
        let command = config.command.take();
        let file = File::open(path).context("Error while opening config file")?;
        config = serde_json::from_reader(file).context("Error while reading config file")?;
        config.command = command;
    } else if config.generate_config_template {
        eprintln!("Provided config file path is required to generate the template with --config-file");
        return Ok(ExitCode::SUCCESS);
    }

    let log_config = &config.log;
    setup_logger(LoggerConfig {
        level: log_config.log_level,
        file_level: log_config.file_log_level.unwrap_or(log_config.log_level),
        dir_path: &log_config.logs_path,
        filename_log: &log_config.filename_log,
        disable_file_logging: log_config.disable_file_logging,
        disable_file_log_date_based: log_config.disable_file_log_date_based,
        disable_colors: log_config.disable_log_color,
        module_logs: &log_config.logs_modules,
        datetime_format: &log_config.datetime_format,
    })
    .context("Error while setting up the logger")?;

    match run(config).await {
        Ok(code) => Ok(code),
        Err(e) => {
            if log::log_enabled!(log::Level::Error) {
                error!("{:#}", e);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(config: Config) -> Result<ExitCode> {
    let Some(command) = config.command.clone() else {
        bail!("No command provided, use --help to list them");
    };

    let catalog = AbiCatalog::load(&config.abi_path)
        .with_context(|| format!("Error while loading ABI file {}", config.abi_path))?;
    let contract = catalog
        .get_contract(&config.contract_name)
        .context("Error while selecting the contract")?
        .clone();

    let address = config
        .network
        .contract_address
        .context("No contract address: use --contract-address or LICENSE_CORE_ADDRESS")?;

    let client = JsonRpcClient::new(&config.network.provider_url).context("Error while creating the provider client")?;
    if log::log_enabled!(log::Level::Info) {
        info!("Using provider {} for contract {} at {}", client.get_url(), contract.get_name(), address);
    }

    let rpc_contract = RpcContract::new(
        Arc::new(client),
        address,
        config.transaction.receipt_poll_interval(),
        config.transaction.confirmations,
    );

    if let Some(expected) = config.network.network_id {
        let raw = rpc_contract
            .network_id()
            .await
            .context("Error while fetching the network id")?;
        let actual = parse_network_id(&raw)?;
        if actual != expected {
            bail!("Provider is on network {} but network {} was expected", actual, expected);
        }
    }

    let gateway = Arc::new(ContractGateway::new(
        Arc::new(rpc_contract),
        contract,
        config.transaction.ledger,
    ));
    let tracker = TransactionTracker::new(config.transaction.receipt_timeout());

    match command {
        CliCommand::SyncProducts { products, inventory } => {
            let products = load_products(&products)
                .with_context(|| format!("Error while loading products from {}", products))?;
            let reconciler = Reconciler::new(
                gateway,
                tracker,
                config.transaction.from,
                config.transaction.gas_price(),
                config.transaction.gas_limit(),
            )
            .await
            .context("Cannot start products synchronization")?;

            let report = reconciler.reconcile(&products, inventory).await;
            report.log_summary();
            if report.has_failures() {
                return Ok(ExitCode::FAILURE);
            }
        }
        CliCommand::Exec { command } => {
            let manager = build_command_manager(
                CommandData {
                    gateway,
                    tracker,
                    from: config.transaction.from,
                    gas_price: config.transaction.gas_price(),
                    gas_limit: config.transaction.gas_limit(),
                    value: config.transaction.value(),
                },
                &license_core_methods(),
            )?;

            if log::log_enabled!(log::Level::Info) {
                info!("Executing command: {}", colorize(Color::Cyan, command.join(" ")));
            }
            manager.handle_tokens(command).await?;
        }
        CliCommand::Commands => {
            let manager = build_command_manager(
                CommandData {
                    gateway,
                    tracker,
                    from: None,
                    gas_price: None,
                    gas_limit: None,
                    value: None,
                },
                &license_core_methods(),
            )?;
            manager.display_commands()?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
