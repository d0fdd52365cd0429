mod common;

use std::sync::{atomic::Ordering, Arc};

use common::*;
use dot_common::{
    abi::{AbiValue, Address},
    prompt::{
        argument::ArgError,
        command::{CommandError, CommandManager},
    },
};
use dot_license_cli::{
    commands::{build_command_manager, license_core_methods, CommandData},
    tracker::TransactionTracker,
};
use primitive_types::U256;

fn manager(mock: &Arc<MockLicenseCore>) -> CommandManager<CommandData> {
    build_command_manager(
        CommandData {
            gateway: gateway(mock),
            tracker: TransactionTracker::default(),
            from: None,
            gas_price: None,
            gas_limit: Some(U256::from(200_000u64)),
            value: None,
        },
        &license_core_methods(),
    )
    .unwrap()
}

fn tokens(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_owned).collect()
}

#[tokio::test]
async fn test_commands_are_synthesized_from_documented_functions() {
    let mock = Arc::new(MockLicenseCore::new());
    let manager = manager(&mock);

    let names = manager.get_command_names().unwrap();
    assert_eq!(names, vec!["help", "version", "paused", "productInfo", "setCEO", "setPrice"]);

    let set_price = manager.get_command("setPrice").unwrap();
    assert_eq!(set_price.get_usage(), "setPrice <productId:uint256> <price:uint256>");
    assert_eq!(set_price.get_description(), "Set the price of a product");

    let set_ceo = manager.get_command("setCEO").unwrap();
    assert_eq!(set_ceo.get_usage(), "setCEO <newCEO:address> --yes-im-sure-setCEO");
}

#[tokio::test]
async fn test_write_command_sends_and_tracks() {
    let mock = Arc::new(MockLicenseCore::new().with_product(1, stored(100, 5, false)));
    let manager = manager(&mock);

    manager.handle_tokens(tokens("setPrice 1 2500")).await.unwrap();
    assert_eq!(mock.get_product(1).unwrap().price, U256::from(2500));
    assert_eq!(mock.write_names(), vec!["setPrice"]);
}

#[tokio::test]
async fn test_read_command_calls_contract() {
    let mock = Arc::new(MockLicenseCore::new().with_product(1, stored(100, 5, true)));
    let manager = manager(&mock);

    manager.handle_command("productInfo 1").await.unwrap();
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
    assert!(mock.write_names().is_empty());
}

#[tokio::test]
async fn test_dangerous_command_requires_confirmation() {
    let mock = Arc::new(MockLicenseCore::new());
    let manager = manager(&mock);
    let ceo = Address::new([0x42; 20]).to_string();

    let result = manager.handle_tokens(tokens(&format!("setCEO {}", ceo))).await;
    assert!(matches!(result, Err(CommandError::ConfirmationRequired(flag)) if flag == "yes-im-sure-setCEO"));
    assert!(mock.write_names().is_empty());

    manager
        .handle_tokens(tokens(&format!("setCEO {} --yes-im-sure-setCEO", ceo)))
        .await
        .unwrap();
    let writes = mock.writes.lock().unwrap().clone();
    assert_eq!(writes, vec![("setCEO".to_owned(), vec![AbiValue::Address(Address::new([0x42; 20]))])]);
}

#[tokio::test]
async fn test_invalid_invocations_never_reach_the_contract() {
    let mock = Arc::new(MockLicenseCore::new().with_product(1, stored(100, 5, false)));
    let manager = manager(&mock);

    assert!(matches!(
        manager.handle_tokens(tokens("setPrice 1")).await,
        Err(CommandError::ExpectedRequiredArg(name)) if name == "price"
    ));
    assert!(matches!(
        manager.handle_tokens(tokens("setPrice 1 cheap")).await,
        Err(CommandError::ArgError(ArgError::InvalidValue(name, _))) if name == "price"
    ));
    assert!(matches!(
        manager.handle_tokens(tokens("setPrice 1 2 3")).await,
        Err(CommandError::TooManyArguments)
    ));
    assert!(matches!(
        manager.handle_tokens(tokens("setPrice 1 2 --force")).await,
        Err(CommandError::ArgError(ArgError::UnknownFlag(_)))
    ));
    assert!(matches!(
        manager.handle_tokens(tokens("createProduct 1 2 3 4 5")).await,
        Err(CommandError::CommandNotFound(_))
    ));

    assert!(mock.write_names().is_empty());
    assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reverted_write_is_reported() {
    let mock = Arc::new(MockLicenseCore::new().with_product(1, stored(100, 5, false)));
    mock.fail_on(1, "setPrice");
    let manager = manager(&mock);

    let result = manager.handle_tokens(tokens("setPrice 1 2500")).await;
    assert!(matches!(result, Err(CommandError::Any(_))));
    assert_eq!(mock.get_product(1).unwrap().price, U256::from(100));
}
