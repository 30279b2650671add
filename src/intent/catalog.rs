/// Static interface catalog: the closed set of functions and events the
/// service knows how to build and decode.
///
/// Read functions are matched by an ordered list of (keyword predicate,
/// resolution) pairs; the first entry whose predicate holds wins. Write
/// actions are an exact table keyed by the lower-cased action label. Events
/// are keyed by their `topics[0]` hash so a log is routed to at most one
/// candidate before any payload decoding happens.
///
/// The catalog is built once per process ([`InterfaceCatalog::global`]) and
/// never mutated afterwards.
use crate::domain::types::ReturnField;
use crate::intent::abi::{event_topic, AbiType, FunctionSignature};
use alloy_primitives::B256;
use std::sync::OnceLock;

pub const CATALOG_VERSION: &str = "contractmind-hub-v2.1";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadBinding {
    /// The caller's own address is the single argument.
    Caller,
    NoArguments,
}

#[derive(Clone, Debug)]
pub struct ReadEntry {
    pub function: FunctionSignature,
    pub message_keywords: &'static [&'static str],
    pub action_aliases: &'static [&'static str],
    pub binding: ReadBinding,
    pub returns: Vec<ReturnField>,
}

impl ReadEntry {
    /// Both inputs must already be lower-cased.
    fn matches(&self, action: &str, message: &str) -> bool {
        self.message_keywords
            .iter()
            .any(|keyword| message.contains(keyword))
            || self.action_aliases.contains(&action)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteBinding {
    Amount,
    /// `(tokenIn, tokenOut, amount)`; token addresses come from intent params.
    SwapPair,
    NoArguments,
}

#[derive(Clone, Debug)]
pub struct WriteEntry {
    pub action: &'static str,
    pub verb: &'static str,
    pub function: FunctionSignature,
    pub binding: WriteBinding,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KnownEvent {
    AgentRegistered,
    FunctionExecuted,
}

#[derive(Clone, Debug)]
pub struct EventParam {
    pub name: &'static str,
    pub kind: AbiType,
    pub indexed: bool,
}

#[derive(Clone, Debug)]
pub struct EventEntry {
    pub event: KnownEvent,
    pub name: &'static str,
    pub signature: String,
    pub topic0: B256,
    pub params: Vec<EventParam>,
}

impl EventEntry {
    fn new(event: KnownEvent, name: &'static str, params: Vec<EventParam>) -> Self {
        let types = params
            .iter()
            .map(|param| param.kind.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let signature = format!("{name}({types})");
        let topic0 = event_topic(&signature);
        Self {
            event,
            name,
            signature,
            topic0,
            params,
        }
    }

    pub fn indexed_count(&self) -> usize {
        self.params.iter().filter(|param| param.indexed).count()
    }
}

/// Entry points of the trust-delegating hub contract.
#[derive(Clone, Debug)]
pub struct HubInterface {
    pub execute_function: FunctionSignature,
    pub query_target: FunctionSignature,
    pub query_target_returns: Vec<AbiType>,
    pub validate_transaction: FunctionSignature,
    pub trusted_hub: FunctionSignature,
}

#[derive(Clone, Debug)]
pub struct RegistryInterface {
    pub register_agent: FunctionSignature,
    pub get_agent: FunctionSignature,
    /// `(owner, targetContract, name, configRef, active, createdAt, updatedAt)`
    pub agent_record: AbiType,
    pub is_agent_active: FunctionSignature,
}

#[derive(Clone, Debug)]
pub struct InterfaceCatalog {
    reads: Vec<ReadEntry>,
    writes: Vec<WriteEntry>,
    events: Vec<EventEntry>,
    hub: HubInterface,
    registry: RegistryInterface,
}

impl InterfaceCatalog {
    pub fn global() -> &'static Self {
        static CATALOG: OnceLock<InterfaceCatalog> = OnceLock::new();
        CATALOG.get_or_init(Self::builtin)
    }

    pub fn builtin() -> Self {
        let uint = || AbiType::Uint(256);
        let field = |key: &str| ReturnField {
            key: key.to_string(),
            kind: uint(),
        };

        let reads = vec![
            ReadEntry {
                function: FunctionSignature::new("balanceOf", vec![AbiType::Address]),
                message_keywords: &["balance"],
                action_aliases: &["balance", "balanceof"],
                binding: ReadBinding::Caller,
                returns: vec![field("balance")],
            },
            ReadEntry {
                function: FunctionSignature::new("pendingRewards", vec![AbiType::Address]),
                message_keywords: &["pending", "rewards"],
                action_aliases: &["pendingrewards"],
                binding: ReadBinding::Caller,
                returns: vec![field("rewards")],
            },
            ReadEntry {
                function: FunctionSignature::new("getCurrentAPY", Vec::new()),
                message_keywords: &["apy"],
                action_aliases: &["getcurrentapy", "apy"],
                binding: ReadBinding::NoArguments,
                returns: vec![field("apy")],
            },
            ReadEntry {
                function: FunctionSignature::new("getTVL", Vec::new()),
                message_keywords: &["tvl"],
                action_aliases: &["gettvl", "tvl"],
                binding: ReadBinding::NoArguments,
                returns: vec![field("tvl")],
            },
            ReadEntry {
                function: FunctionSignature::new("getStakeInfo", vec![AbiType::Address]),
                message_keywords: &["stake info", "stakeinfo"],
                action_aliases: &["getstakeinfo"],
                binding: ReadBinding::Caller,
                returns: vec![
                    field("stakedAmount"),
                    field("rewards"),
                    field("stakingDuration"),
                    field("apy"),
                ],
            },
        ];

        let writes = vec![
            WriteEntry {
                action: "stake",
                verb: "Stake",
                function: FunctionSignature::new("stake", vec![uint()]),
                binding: WriteBinding::Amount,
            },
            WriteEntry {
                action: "withdraw",
                verb: "Withdraw",
                function: FunctionSignature::new("withdraw", vec![uint()]),
                binding: WriteBinding::Amount,
            },
            WriteEntry {
                action: "claim",
                verb: "Claim rewards",
                function: FunctionSignature::new("claimRewards", Vec::new()),
                binding: WriteBinding::NoArguments,
            },
            WriteEntry {
                action: "swap",
                verb: "Swap",
                function: FunctionSignature::new(
                    "swap",
                    vec![AbiType::Address, AbiType::Address, uint()],
                ),
                binding: WriteBinding::SwapPair,
            },
            WriteEntry {
                action: "lend",
                verb: "Lend",
                function: FunctionSignature::new("lend", vec![uint()]),
                binding: WriteBinding::Amount,
            },
            WriteEntry {
                action: "borrow",
                verb: "Borrow",
                function: FunctionSignature::new("borrow", vec![uint()]),
                binding: WriteBinding::Amount,
            },
        ];

        let bytes32 = || AbiType::FixedBytes(32);
        let events = vec![
            EventEntry::new(
                KnownEvent::AgentRegistered,
                "AgentRegistered",
                vec![
                    EventParam {
                        name: "agentId",
                        kind: bytes32(),
                        indexed: true,
                    },
                    EventParam {
                        name: "owner",
                        kind: AbiType::Address,
                        indexed: true,
                    },
                    EventParam {
                        name: "targetContract",
                        kind: AbiType::Address,
                        indexed: false,
                    },
                    EventParam {
                        name: "name",
                        kind: AbiType::String,
                        indexed: false,
                    },
                ],
            ),
            EventEntry::new(
                KnownEvent::FunctionExecuted,
                "FunctionExecuted",
                vec![
                    EventParam {
                        name: "agentId",
                        kind: bytes32(),
                        indexed: true,
                    },
                    EventParam {
                        name: "user",
                        kind: AbiType::Address,
                        indexed: true,
                    },
                    EventParam {
                        name: "target",
                        kind: AbiType::Address,
                        indexed: true,
                    },
                    EventParam {
                        name: "selector",
                        kind: AbiType::FixedBytes(4),
                        indexed: false,
                    },
                    EventParam {
                        name: "success",
                        kind: AbiType::Bool,
                        indexed: false,
                    },
                ],
            ),
        ];

        let forward_args = || vec![bytes32(), AbiType::Address, AbiType::Bytes];
        let hub = HubInterface {
            execute_function: FunctionSignature::new("executeFunction", forward_args()),
            query_target: FunctionSignature::new("queryTarget", forward_args()),
            query_target_returns: vec![AbiType::Bytes],
            validate_transaction: FunctionSignature::new(
                "validateTransaction",
                vec![bytes32(), AbiType::Address, AbiType::FixedBytes(4)],
            ),
            trusted_hub: FunctionSignature::new("trustedHub", Vec::new()),
        };

        let registry = RegistryInterface {
            register_agent: FunctionSignature::new(
                "registerAgent",
                vec![AbiType::Address, AbiType::String, AbiType::String],
            ),
            get_agent: FunctionSignature::new("getAgent", vec![bytes32()]),
            agent_record: AbiType::Tuple(vec![
                AbiType::Address,
                AbiType::Address,
                AbiType::String,
                AbiType::String,
                AbiType::Bool,
                uint(),
                uint(),
            ]),
            is_agent_active: FunctionSignature::new("isAgentActive", vec![bytes32()]),
        };

        Self {
            reads,
            writes,
            events,
            hub,
            registry,
        }
    }

    pub fn version(&self) -> &'static str {
        CATALOG_VERSION
    }

    /// First read entry whose keyword predicate holds, in priority order.
    pub fn match_read(&self, action: &str, message: &str) -> Option<&ReadEntry> {
        let action = action.trim().to_ascii_lowercase();
        let message = message.to_lowercase();
        self.reads
            .iter()
            .find(|entry| entry.matches(&action, &message))
    }

    pub fn write_action(&self, action: &str) -> Option<&WriteEntry> {
        let action = action.trim().to_ascii_lowercase();
        self.writes.iter().find(|entry| entry.action == action)
    }

    pub fn is_write_action(&self, action: &str) -> bool {
        self.write_action(action).is_some()
    }

    pub fn event_by_topic(&self, topic0: &B256) -> Option<&EventEntry> {
        self.events.iter().find(|entry| entry.topic0 == *topic0)
    }

    pub fn event(&self, event: KnownEvent) -> Option<&EventEntry> {
        self.events.iter().find(|entry| entry.event == event)
    }

    pub fn events(&self) -> &[EventEntry] {
        &self.events
    }

    pub fn hub(&self) -> &HubInterface {
        &self.hub
    }

    pub fn registry(&self) -> &RegistryInterface {
        &self.registry
    }
}
