//! Stable registry names of the executor's actions and core services.
//!
//! Names carry the deployed contract's version suffix. Changing one changes its
//! hash and therefore every operation fingerprint that contains it.

// Common actions
pub const PULL_TOKEN: &str = "PullToken_3";
pub const SEND_TOKEN: &str = "SendToken_4";
pub const SET_APPROVAL: &str = "SetApproval_3";
pub const SWAP: &str = "SwapAction_3";
pub const TAKE_FLASHLOAN: &str = "TakeFlashloan_3";
pub const WRAP_ETH: &str = "WrapEth_3";
pub const UNWRAP_ETH: &str = "UnwrapEth_3";
pub const RETURN_FUNDS: &str = "ReturnFunds_3";
pub const POSITION_CREATED: &str = "PositionCreated";

// Aave v2
pub const AAVE_V2_DEPOSIT: &str = "AaveDeposit_3";
pub const AAVE_V2_BORROW: &str = "AaveBorrow_3";
pub const AAVE_V2_WITHDRAW: &str = "AaveWithdraw_3";
pub const AAVE_V2_PAYBACK: &str = "AavePayback_3";

// Aave v3
pub const AAVE_V3_DEPOSIT: &str = "AaveV3Deposit_3";
pub const AAVE_V3_BORROW: &str = "AaveV3Borrow_3";
pub const AAVE_V3_WITHDRAW: &str = "AaveV3Withdraw_3";
pub const AAVE_V3_PAYBACK: &str = "AaveV3Payback_3";
pub const AAVE_V3_SET_EMODE: &str = "AaveV3SetEMode_3";

// Spark
pub const SPARK_DEPOSIT: &str = "SparkDeposit";
pub const SPARK_BORROW: &str = "SparkBorrow";
pub const SPARK_WITHDRAW: &str = "SparkWithdraw";
pub const SPARK_PAYBACK: &str = "SparkPayback";
pub const SPARK_SET_EMODE: &str = "SparkSetEMode";

// Core services
pub const OPERATION_EXECUTOR: &str = "OperationExecutor_2";
pub const OPERATION_STORAGE: &str = "OperationStorage_2";
pub const OPERATIONS_REGISTRY: &str = "OperationsRegistry_2";
pub const ACCOUNT_GUARD: &str = "AccountGuard";
pub const ACCOUNT_FACTORY: &str = "AccountFactory";
pub const SWAP_CONTRACT: &str = "Swap";

// Protocol and token services
pub const MCD_FLASH: &str = "MCD_FLASH";
pub const BALANCER_VAULT: &str = "BalancerVault";
pub const AAVE_V2_LENDING_POOL: &str = "AaveLendingPool";
pub const AAVE_V3_POOL: &str = "AavePool";
pub const SPARK_LENDING_POOL: &str = "SparkLendingPool";
pub const WETH: &str = "WETH";
pub const DAI: &str = "DAI";
