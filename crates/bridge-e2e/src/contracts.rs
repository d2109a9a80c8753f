//! ABI definitions for the contracts deployed into a bridge environment, and the
//! typed deploy/call requests the binding layer accepts.

use alloy::{
    primitives::{Address, B256, Bytes, FixedBytes, U256, keccak256},
    sol,
    sol_types::{SolCall, SolConstructor},
};

use crate::resource::ResourceId;

sol! {
    /// Bridge entry point: resource registry, fee handler wiring and deposits.
    #[derive(Debug)]
    contract Bridge {
        constructor(uint8 domainID);

        function endKeygen(address MPCAddress) external;

        function adminChangeFeeHandler(address newFeeHandler) external;

        function adminSetResource(
            address handlerAddress,
            bytes32 resourceID,
            address tokenAddress
        ) external;

        function adminSetGenericResource(
            address handlerAddress,
            bytes32 resourceID,
            address contractAddress,
            bytes4 depositFunctionSig,
            uint256 depositFunctionDepositorOffset,
            bytes4 executeFunctionSig
        ) external;

        function adminSetBurnable(address handlerAddress, address tokenAddress) external;

        function deposit(
            uint8 destinationDomainID,
            bytes32 resourceID,
            bytes calldata depositData,
            bytes calldata feeData
        ) external payable;

        event Deposit(
            uint8 destinationDomainID,
            bytes32 resourceID,
            uint64 depositNonce,
            address indexed user,
            bytes data,
            bytes handlerResponse
        );

        event ProposalExecution(
            uint8 originDomainID,
            uint64 depositNonce,
            bytes32 dataHash
        );
    }

    /// Flat-fee handler.
    #[derive(Debug)]
    contract BasicFeeHandler {
        constructor(address bridgeAddress);

        function changeFee(uint256 newFee) external;
    }

    /// Message signed by the fee oracle, prepended to the oracle signature in fee data.
    #[derive(Debug)]
    struct FeeDataMessage {
        uint256 ber;
        uint256 ter;
        uint256 dstGasPrice;
        uint256 expiresAt;
        uint8 fromDomainID;
        uint8 toDomainID;
        bytes32 resourceID;
        uint256 msgGasLimit;
    }

    #[derive(Debug)]
    contract ERC20PresetMinterPauser {
        constructor(string name, string symbol);

        function mint(address to, uint256 amount) external;
        function approve(address spender, uint256 amount) external returns (bool);
        function grantRole(bytes32 role, address account) external;
        function balanceOf(address account) external view returns (uint256);
    }

    #[derive(Debug)]
    contract ERC721MinterBurnerPauser {
        constructor(string name, string symbol, string baseURI);

        function mint(address to, uint256 tokenId, string data) external;
        function approve(address to, uint256 tokenId) external;
        function grantRole(bytes32 role, address account) external;
        function ownerOf(uint256 tokenId) external view returns (address);
    }

    /// Asset store targeted by the generic handler.
    #[derive(Debug)]
    contract CentrifugeAsset {
        function store(bytes32 asset) external;
        function _assetsStored(bytes32 asset) external view returns (bool);
    }

    #[derive(Debug)]
    contract ERC20Handler {
        constructor(address bridgeAddress);
    }

    #[derive(Debug)]
    contract ERC721Handler {
        constructor(address bridgeAddress);
    }

    #[derive(Debug)]
    contract GenericHandler {
        constructor(address bridgeAddress);
    }
}

/// Selector of `CentrifugeAsset.store(bytes32)`, used for both the deposit and
/// execute hooks of the generic resource.
pub const ASSET_STORE_SELECTOR: [u8; 4] = CentrifugeAsset::storeCall::SELECTOR;

/// `keccak256("MINTER_ROLE")`.
pub fn minter_role() -> B256 {
    keccak256("MINTER_ROLE")
}

/// Contracts the environment deploys. Also names the bytecode artifact files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    Bridge,
    BasicFeeHandler,
    Erc20,
    Erc20Handler,
    Erc721,
    Erc721Handler,
    AssetStore,
    GenericHandler,
}

impl ContractKind {
    pub const ALL: [Self; 8] = [
        Self::Bridge,
        Self::BasicFeeHandler,
        Self::Erc20,
        Self::Erc20Handler,
        Self::Erc721,
        Self::Erc721Handler,
        Self::AssetStore,
        Self::GenericHandler,
    ];

    /// Solidity contract name, which is also the artifact file stem.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bridge => "Bridge",
            Self::BasicFeeHandler => "BasicFeeHandler",
            Self::Erc20 => "ERC20PresetMinterPauser",
            Self::Erc20Handler => "ERC20Handler",
            Self::Erc721 => "ERC721MinterBurnerPauser",
            Self::Erc721Handler => "ERC721Handler",
            Self::AssetStore => "CentrifugeAsset",
            Self::GenericHandler => "GenericHandler",
        }
    }
}

/// A contract deployment together with its constructor arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployRequest {
    Bridge { domain_id: u8 },
    BasicFeeHandler { bridge: Address },
    Erc20 { name: String, symbol: String },
    Erc20Handler { bridge: Address },
    Erc721 { name: String, symbol: String, base_uri: String },
    Erc721Handler { bridge: Address },
    AssetStore,
    GenericHandler { bridge: Address },
}

impl DeployRequest {
    pub const fn kind(&self) -> ContractKind {
        match self {
            Self::Bridge { .. } => ContractKind::Bridge,
            Self::BasicFeeHandler { .. } => ContractKind::BasicFeeHandler,
            Self::Erc20 { .. } => ContractKind::Erc20,
            Self::Erc20Handler { .. } => ContractKind::Erc20Handler,
            Self::Erc721 { .. } => ContractKind::Erc721,
            Self::Erc721Handler { .. } => ContractKind::Erc721Handler,
            Self::AssetStore => ContractKind::AssetStore,
            Self::GenericHandler { .. } => ContractKind::GenericHandler,
        }
    }

    /// ABI-encoded constructor arguments, appended to the creation bytecode.
    pub fn constructor_args(&self) -> Vec<u8> {
        match self {
            Self::Bridge { domain_id } => Bridge::constructorCall {
                domainID: *domain_id,
            }
            .abi_encode(),
            Self::BasicFeeHandler { bridge } => BasicFeeHandler::constructorCall {
                bridgeAddress: *bridge,
            }
            .abi_encode(),
            Self::Erc20 { name, symbol } => ERC20PresetMinterPauser::constructorCall {
                name: name.clone(),
                symbol: symbol.clone(),
            }
            .abi_encode(),
            Self::Erc20Handler { bridge } => ERC20Handler::constructorCall {
                bridgeAddress: *bridge,
            }
            .abi_encode(),
            Self::Erc721 {
                name,
                symbol,
                base_uri,
            } => ERC721MinterBurnerPauser::constructorCall {
                name: name.clone(),
                symbol: symbol.clone(),
                baseURI: base_uri.clone(),
            }
            .abi_encode(),
            Self::Erc721Handler { bridge } => ERC721Handler::constructorCall {
                bridgeAddress: *bridge,
            }
            .abi_encode(),
            Self::AssetStore => Vec::new(),
            Self::GenericHandler { bridge } => GenericHandler::constructorCall {
                bridgeAddress: *bridge,
            }
            .abi_encode(),
        }
    }
}

/// A state-changing call on one of the environment's contracts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    EndKeygen {
        mpc_address: Address,
    },
    ChangeFeeHandler {
        fee_handler: Address,
    },
    ChangeFee {
        fee: U256,
    },
    SetResource {
        handler: Address,
        resource_id: ResourceId,
        token: Address,
    },
    SetGenericResource {
        handler: Address,
        resource_id: ResourceId,
        asset_store: Address,
        deposit_selector: [u8; 4],
        depositor_offset: U256,
        execute_selector: [u8; 4],
    },
    SetBurnable {
        handler: Address,
        token: Address,
    },
    Erc20Mint {
        to: Address,
        amount: U256,
    },
    Erc20Approve {
        spender: Address,
        amount: U256,
    },
    GrantRole {
        role: B256,
        account: Address,
    },
    Erc721Mint {
        to: Address,
        token_id: U256,
        metadata: String,
    },
    Erc721Approve {
        to: Address,
        token_id: U256,
    },
    Deposit {
        destination_domain_id: u8,
        resource_id: ResourceId,
        deposit_data: Bytes,
        fee_data: Bytes,
    },
}

impl ContractCall {
    /// Calldata for this call.
    pub fn abi_encode(&self) -> Bytes {
        let encoded = match self {
            Self::EndKeygen { mpc_address } => Bridge::endKeygenCall {
                MPCAddress: *mpc_address,
            }
            .abi_encode(),
            Self::ChangeFeeHandler { fee_handler } => Bridge::adminChangeFeeHandlerCall {
                newFeeHandler: *fee_handler,
            }
            .abi_encode(),
            Self::ChangeFee { fee } => BasicFeeHandler::changeFeeCall { newFee: *fee }.abi_encode(),
            Self::SetResource {
                handler,
                resource_id,
                token,
            } => Bridge::adminSetResourceCall {
                handlerAddress: *handler,
                resourceID: resource_id.as_b256(),
                tokenAddress: *token,
            }
            .abi_encode(),
            Self::SetGenericResource {
                handler,
                resource_id,
                asset_store,
                deposit_selector,
                depositor_offset,
                execute_selector,
            } => Bridge::adminSetGenericResourceCall {
                handlerAddress: *handler,
                resourceID: resource_id.as_b256(),
                contractAddress: *asset_store,
                depositFunctionSig: FixedBytes(*deposit_selector),
                depositFunctionDepositorOffset: *depositor_offset,
                executeFunctionSig: FixedBytes(*execute_selector),
            }
            .abi_encode(),
            Self::SetBurnable { handler, token } => Bridge::adminSetBurnableCall {
                handlerAddress: *handler,
                tokenAddress: *token,
            }
            .abi_encode(),
            Self::Erc20Mint { to, amount } => ERC20PresetMinterPauser::mintCall {
                to: *to,
                amount: *amount,
            }
            .abi_encode(),
            Self::Erc20Approve { spender, amount } => ERC20PresetMinterPauser::approveCall {
                spender: *spender,
                amount: *amount,
            }
            .abi_encode(),
            Self::GrantRole { role, account } => ERC20PresetMinterPauser::grantRoleCall {
                role: *role,
                account: *account,
            }
            .abi_encode(),
            Self::Erc721Mint {
                to,
                token_id,
                metadata,
            } => ERC721MinterBurnerPauser::mintCall {
                to: *to,
                tokenId: *token_id,
                data: metadata.clone(),
            }
            .abi_encode(),
            Self::Erc721Approve { to, token_id } => ERC721MinterBurnerPauser::approveCall {
                to: *to,
                tokenId: *token_id,
            }
            .abi_encode(),
            Self::Deposit {
                destination_domain_id,
                resource_id,
                deposit_data,
                fee_data,
            } => Bridge::depositCall {
                destinationDomainID: *destination_domain_id,
                resourceID: resource_id.as_b256(),
                depositData: deposit_data.clone(),
                feeData: fee_data.clone(),
            }
            .abi_encode(),
        };
        encoded.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{AssetClass, resource_id};

    #[test]
    fn asset_store_selector_matches_store_bytes32() {
        assert_eq!(ASSET_STORE_SELECTOR, [0x65, 0x4c, 0xf8, 0x8c]);
    }

    #[test]
    fn bridge_constructor_encodes_domain_id() {
        let args = DeployRequest::Bridge { domain_id: 2 }.constructor_args();
        assert_eq!(args.len(), 32);
        assert_eq!(args[31], 2);
        assert!(DeployRequest::AssetStore.constructor_args().is_empty());
    }

    #[test]
    fn handler_constructor_encodes_bridge_address() {
        let bridge = Address::repeat_byte(0xbb);
        let args = DeployRequest::GenericHandler { bridge }.constructor_args();
        assert_eq!(&args[12..], bridge.as_slice());
    }

    #[test]
    fn set_resource_calldata_starts_with_selector() {
        let call = ContractCall::SetResource {
            handler: Address::repeat_byte(1),
            resource_id: resource_id(AssetClass::NonFungible),
            token: Address::repeat_byte(2),
        };
        let data = call.abi_encode();
        assert_eq!(data[..4], Bridge::adminSetResourceCall::SELECTOR);
        assert_eq!(data.len(), 4 + 3 * 32);
    }
}
