//! Aave V3 contract interfaces.
//!
//! Only the calls the liquidator makes are declared. Struct layouts follow
//! the deployed ABIs; `ReserveDataLegacy` is the 3.0 layout that later pool
//! versions still return from `getReserveData`.

use alloy::sol;

sol! {
    /// Reserve state returned by `Pool.getReserveData`
    #[derive(Debug)]
    struct ReserveDataLegacy {
        uint256 configuration;
        uint128 liquidityIndex;
        uint128 currentLiquidityRate;
        uint128 variableBorrowIndex;
        uint128 currentVariableBorrowRate;
        uint128 currentStableBorrowRate;
        uint40 lastUpdateTimestamp;
        uint16 id;
        address aTokenAddress;
        address stableDebtTokenAddress;
        address variableDebtTokenAddress;
        address interestRateStrategyAddress;
        uint128 accruedToTreasury;
        uint128 unbacked;
        uint128 isolationModeTotalDebt;
    }

    /// Aave V3 Pool interface (subset for position reads and liquidation)
    #[sol(rpc)]
    interface IPool {
        function getUserAccountData(address user) external view returns (
            uint256 totalCollateralBase,
            uint256 totalDebtBase,
            uint256 availableBorrowsBase,
            uint256 currentLiquidationThreshold,
            uint256 ltv,
            uint256 healthFactor
        );

        function getReserveData(address asset) external view returns (ReserveDataLegacy memory);

        function liquidationCall(
            address collateralAsset,
            address debtAsset,
            address user,
            uint256 debtToCover,
            bool receiveAToken
        ) external;
    }
}

sol! {
    /// Per-reserve user state from the UI data provider
    #[derive(Debug)]
    struct UserReserveData {
        address underlyingAsset;
        uint256 scaledATokenBalance;
        bool usageAsCollateralEnabledOnUser;
        uint256 scaledVariableDebt;
    }

    /// UiPoolDataProviderV3 read-only view contract
    #[sol(rpc)]
    interface IUiPoolDataProviderV3 {
        function getUserReservesData(address provider, address user)
            external
            view
            returns (UserReserveData[] memory, uint8);
    }
}
