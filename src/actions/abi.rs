//! Compile-time ABI definitions for the operation executor and its actions.
//!
//! Every action exposes `execute(bytes data, uint8[] paramsMap)`; `data` is the
//! ABI encoding of one of the argument structs below.

#![allow(clippy::too_many_arguments)]

use alloy::sol;

sol! {
    /// One step as seen by the operation executor.
    #[derive(Debug, PartialEq, Eq)]
    struct Call {
        bytes32 targetHash;
        bytes callData;
        bool skipped;
    }

    /// Entry point of every action contract.
    function execute(bytes calldata data, uint8[] calldata paramsMap) external payable;

    /// Entry point of the operation executor.
    function executeOp(Call[] calldata calls, string calldata operationName) external payable;

    #[derive(Debug, PartialEq, Eq)]
    struct PullTokenData {
        address asset;
        address from;
        uint256 amount;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct SendTokenData {
        address asset;
        address to;
        uint256 amount;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct SetApprovalData {
        address asset;
        address delegate;
        uint256 amount;
        bool sumAmounts;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct SwapData {
        address fromAsset;
        address toAsset;
        uint256 amount;
        uint256 receiveAtLeast;
        uint256 fee;
        bytes withData;
        bool collectFeeInFromToken;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct WrapEthData {
        uint256 amount;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct UnwrapEthData {
        uint256 amount;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct ReturnFundsData {
        address asset;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct PositionCreatedData {
        string protocol;
        string positionType;
        address collateralToken;
        address debtToken;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct DepositData {
        address asset;
        uint256 amount;
        bool sumAmounts;
        bool setAsCollateral;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct BorrowData {
        address asset;
        uint256 amount;
        address to;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct WithdrawData {
        address asset;
        uint256 amount;
        address to;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct PaybackData {
        address asset;
        uint256 amount;
        bool paybackAll;
        address onBehalf;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct SetEModeData {
        uint8 categoryId;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct FlashloanData {
        uint256 amount;
        address asset;
        bool isProxyFlashloan;
        bool isDPMProxy;
        uint8 provider;
        Call[] calls;
    }
}

sol! {
    /// Operations registry: operation name to ordered action hashes.
    #[sol(rpc)]
    interface IOperationsRegistry {
        struct StoredOperation {
            bytes32[] actions;
            bool[] optional;
            string name;
        }

        function addOperation(StoredOperation calldata operation) external;

        function getOperation(string memory name)
            external
            view
            returns (bytes32[] memory actions, bool[] memory optional);
    }

    /// Service registry: service name hash to contract address.
    #[sol(rpc)]
    interface IServiceRegistry {
        function addNamedService(bytes32 serviceNameHash, address serviceAddress) external;

        function getRegisteredService(string memory serviceName) external view returns (address);
    }
}
