/// Intent → resolved operation mapping.
///
/// Pure and synchronous: no network access, no store access. The caller
/// supplies the target contract and the route already decided for it; the
/// classifier only picks the function and binds its arguments.
///
/// # Classification rule
///
/// 1. **Write check**: the lower-cased action label is looked up in the
///    catalog's write table; a hit routes to the write path regardless of the
///    message text.
/// 2. **Read lookup**: otherwise the catalog's ordered read predicates are
///    evaluated against the action label and free-text message; the first
///    match wins.
/// 3. **No match**: an [`UnknownOperation`] with a clarification message,
///    never a guess.
use crate::domain::types::{OperationKind, ResolvedOperation, Route};
use crate::error::CoreError;
use crate::intent::catalog::{InterfaceCatalog, ReadBinding, WriteBinding};
use crate::intent::codec::AbiValue;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structured intent as it arrives from the chat surface.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl Intent {
    /// Fills an empty action, amount and token from a message such as
    /// `"stake 1000 SOMI"`: the first numeric word becomes the amount and the
    /// word after it the token symbol. A write verb in the message becomes
    /// the action only when an amount accompanies it, so questions such as
    /// "what is my stake info" or "can I claim rewards yet?" stay reads and
    /// are matched by the read table on free text.
    pub fn with_message_hints(mut self, catalog: &InterfaceCatalog) -> Self {
        let words = self
            .message
            .split_whitespace()
            .map(|word| word.trim_matches(|char: char| !char.is_ascii_alphanumeric() && char != '.'))
            .filter(|word| !word.is_empty())
            .collect::<Vec<_>>();

        if self.amount.is_none() {
            if let Some(position) = words.iter().position(|word| is_decimal_amount(word)) {
                self.amount = Some(words[position].to_string());
                if self.token.is_none() {
                    self.token = words
                        .get(position + 1)
                        .filter(|word| word.chars().all(|char| char.is_ascii_alphanumeric()))
                        .map(|word| word.to_ascii_uppercase());
                }
            }
        }
        let has_amount = self
            .amount
            .as_deref()
            .is_some_and(|amount| is_decimal_amount(amount.trim()));
        if self.action.trim().is_empty() && has_amount {
            if let Some(verb) = words.iter().find(|word| catalog.is_write_action(word)) {
                self.action = verb.to_ascii_lowercase();
            }
        }
        self
    }
}

/// Everything the classifier needs that is not part of the intent itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntentContext {
    pub caller: Address,
    pub target: Address,
    pub route: Route,
    pub token_decimals: u8,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UnknownOperation {
    pub clarification: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    Resolved(ResolvedOperation),
    Unknown(UnknownOperation),
}

pub fn classify(
    catalog: &InterfaceCatalog,
    intent: &Intent,
    context: &IntentContext,
) -> Result<Classification, CoreError> {
    let action = intent.action.trim().to_ascii_lowercase();

    if let Some(entry) = catalog.write_action(&action) {
        let amount = || required_amount(intent, context.token_decimals);
        let arguments = match entry.binding {
            WriteBinding::Amount => vec![AbiValue::Uint(amount()?)],
            WriteBinding::NoArguments => Vec::new(),
            WriteBinding::SwapPair => vec![
                AbiValue::Address(param_address(intent, "tokenIn")?),
                AbiValue::Address(param_address(intent, "tokenOut")?),
                AbiValue::Uint(amount()?),
            ],
        };
        let description = describe_write(entry.verb, intent, entry.binding);
        return Ok(Classification::Resolved(ResolvedOperation {
            kind: OperationKind::Write,
            action,
            target: context.target,
            function: entry.function.clone(),
            arguments,
            returns: Vec::new(),
            route: context.route.clone(),
            value: U256::ZERO,
            description,
        }));
    }

    let Some(entry) = catalog.match_read(&action, &intent.message) else {
        let subject = intent
            .protocol
            .as_deref()
            .map(str::trim)
            .filter(|protocol| !protocol.is_empty())
            .unwrap_or("the target");
        return Ok(Classification::Unknown(UnknownOperation {
            clarification: format!(
                "Interpreted as a query on {subject}. Specify 'balance', 'rewards', 'APY', 'TVL', or 'stake info'."
            ),
        }));
    };

    let arguments = match entry.binding {
        ReadBinding::Caller => vec![AbiValue::Address(context.caller)],
        ReadBinding::NoArguments => Vec::new(),
    };
    let keys = entry
        .returns
        .iter()
        .map(|field| field.key.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    Ok(Classification::Resolved(ResolvedOperation {
        kind: OperationKind::Read,
        action: if action.is_empty() {
            entry.function.name().to_ascii_lowercase()
        } else {
            action
        },
        target: context.target,
        function: entry.function.clone(),
        arguments,
        returns: entry.returns.clone(),
        route: context.route.clone(),
        value: U256::ZERO,
        description: format!("Read {keys} via {}", entry.function.canonical()),
    }))
}

fn describe_write(verb: &str, intent: &Intent, binding: WriteBinding) -> String {
    let amount = intent.amount.as_deref().map(str::trim).unwrap_or_default();
    let token = intent.token.as_deref().map(str::trim).unwrap_or_default();
    match binding {
        WriteBinding::NoArguments => verb.to_string(),
        _ if token.is_empty() => format!("{verb} {amount}"),
        _ => format!("{verb} {amount} {token}"),
    }
}

fn required_amount(intent: &Intent, decimals: u8) -> Result<U256, CoreError> {
    let raw = intent
        .amount
        .as_deref()
        .map(str::trim)
        .filter(|amount| !amount.is_empty())
        .ok_or_else(|| {
            CoreError::InvalidInput(format!("{} requires an amount", intent.action.trim()))
        })?;
    parse_token_amount(raw, decimals).map_err(CoreError::InvalidInput)
}

fn param_address(intent: &Intent, key: &str) -> Result<Address, CoreError> {
    let raw = intent
        .params
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| CoreError::InvalidInput(format!("params.{key} is required")))?;
    raw.parse::<Address>().map_err(|_error| {
        CoreError::InvalidInput(format!("params.{key} must be a 0x-prefixed 20-byte address"))
    })
}

fn is_decimal_amount(word: &str) -> bool {
    let mut parts = word.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();
    !whole.is_empty()
        && whole.bytes().all(|byte| byte.is_ascii_digit())
        && fraction.map_or(true, |digits| digits.bytes().all(|byte| byte.is_ascii_digit()))
}

/// Parses a human decimal amount (`"1000"`, `"1.5"`) into base units scaled
/// by `decimals`.
pub fn parse_token_amount(raw: &str, decimals: u8) -> Result<U256, String> {
    let trimmed = raw.trim().replace('_', "");
    if trimmed.is_empty() || !is_decimal_amount(&trimmed) {
        return Err(format!("amount must be a non-negative decimal number, got {raw}"));
    }
    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > usize::from(decimals) {
        return Err(format!(
            "amount has more than {decimals} fractional digits: {raw}"
        ));
    }
    let overflow = || format!("amount does not fit in uint256: {raw}");
    let scale = U256::from(10u8)
        .checked_pow(U256::from(decimals))
        .ok_or_else(overflow)?;
    let whole = U256::from_str_radix(whole, 10).map_err(|_error| overflow())?;
    let mut total = whole.checked_mul(scale).ok_or_else(overflow)?;
    if !fraction.is_empty() {
        let padding = usize::from(decimals) - fraction.len();
        let fraction_units = U256::from_str_radix(&format!("{fraction}{}", "0".repeat(padding)), 10)
            .map_err(|_error| overflow())?;
        total = total.checked_add(fraction_units).ok_or_else(overflow)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::{classify, parse_token_amount, Classification, Intent, IntentContext};
    use crate::domain::types::{OperationKind, Route};
    use crate::domain::AgentId;
    use crate::error::CoreError;
    use crate::intent::catalog::InterfaceCatalog;
    use crate::intent::codec::AbiValue;
    use alloy_primitives::{address, Address, U256};
    use std::collections::BTreeMap;

    const CALLER: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    const TARGET: Address = address!("00000000000000000000000000000000000000c0");

    fn context() -> IntentContext {
        IntentContext {
            caller: CALLER,
            target: TARGET,
            route: Route::Hub {
                hub: address!("00000000000000000000000000000000000000b0"),
                agent_id: AgentId::normalize("erc20-2").expect("agent id"),
            },
            token_decimals: 18,
        }
    }

    fn resolved(intent: &Intent) -> crate::domain::types::ResolvedOperation {
        match classify(&InterfaceCatalog::builtin(), intent, &context())
            .expect("classification should succeed")
        {
            Classification::Resolved(operation) => operation,
            Classification::Unknown(unknown) => panic!("unexpected unknown: {unknown:?}"),
        }
    }

    #[test]
    fn action_label_and_free_text_resolve_to_the_same_balance_read() {
        let by_action = resolved(&Intent {
            action: "balanceof".to_string(),
            ..Intent::default()
        });
        let by_text = resolved(&Intent {
            message: "what's my balance".to_string(),
            ..Intent::default()
        });
        assert_eq!(by_action.function, by_text.function);
        assert_eq!(by_action.function.canonical(), "balanceOf(address)");
        assert_eq!(by_action.kind, OperationKind::Read);
        assert_eq!(by_action.arguments, vec![AbiValue::Address(CALLER)]);
        assert_eq!(by_action.returns[0].key, "balance");
    }

    #[test]
    fn stake_routes_to_write_path_regardless_of_message() {
        let operation = resolved(&Intent {
            action: "Stake".to_string(),
            message: "what's my balance and apy?".to_string(),
            amount: Some("1000".to_string()),
            token: Some("SOMI".to_string()),
            ..Intent::default()
        });
        assert_eq!(operation.kind, OperationKind::Write);
        assert_eq!(operation.function.canonical(), "stake(uint256)");
        assert_eq!(
            operation.arguments,
            vec![AbiValue::Uint(
                U256::from(1000u64) * U256::from(10u64).pow(U256::from(18u64))
            )]
        );
        assert_eq!(operation.description, "Stake 1000 SOMI");
        assert_eq!(operation.route, context().route);
    }

    #[test]
    fn no_argument_reads_bind_nothing() {
        let operation = resolved(&Intent {
            message: "current APY?".to_string(),
            ..Intent::default()
        });
        assert_eq!(operation.function.canonical(), "getCurrentAPY()");
        assert!(operation.arguments.is_empty());
    }

    #[test]
    fn unmatched_read_yields_clarification_naming_the_protocol() {
        let outcome = classify(
            &InterfaceCatalog::builtin(),
            &Intent {
                message: "hello there".to_string(),
                protocol: Some("SomniaStaking".to_string()),
                ..Intent::default()
            },
            &context(),
        )
        .expect("unknown is not an error");
        let Classification::Unknown(unknown) = outcome else {
            panic!("expected unknown operation");
        };
        assert!(unknown.clarification.contains("query on SomniaStaking"));
        assert!(unknown.clarification.contains("'stake info'"));
    }

    #[test]
    fn write_without_amount_is_invalid_input() {
        let error = classify(
            &InterfaceCatalog::builtin(),
            &Intent {
                action: "withdraw".to_string(),
                ..Intent::default()
            },
            &context(),
        )
        .expect_err("missing amount should fail");
        assert!(matches!(error, CoreError::InvalidInput(ref message) if message.contains("requires an amount")));
    }

    #[test]
    fn swap_binds_token_pair_from_params() {
        let mut params = BTreeMap::new();
        params.insert(
            "tokenIn".to_string(),
            "0x1111111111111111111111111111111111111111".to_string(),
        );
        params.insert(
            "tokenOut".to_string(),
            "0x2222222222222222222222222222222222222222".to_string(),
        );
        let operation = resolved(&Intent {
            action: "swap".to_string(),
            amount: Some("2.5".to_string()),
            params,
            ..Intent::default()
        });
        assert_eq!(operation.arguments.len(), 3);
        assert_eq!(
            operation.arguments[2],
            AbiValue::Uint(U256::from(2_500_000_000_000_000_000u128))
        );
    }

    #[test]
    fn message_hints_fill_action_amount_and_token() {
        let intent = Intent {
            message: "please stake 1000 somi now".to_string(),
            ..Intent::default()
        }
        .with_message_hints(&InterfaceCatalog::builtin());
        assert_eq!(intent.action, "stake");
        assert_eq!(intent.amount.as_deref(), Some("1000"));
        assert_eq!(intent.token.as_deref(), Some("SOMI"));
    }

    #[test]
    fn write_verbs_without_an_amount_stay_reads() {
        let hinted = |message: &str| {
            Intent {
                message: message.to_string(),
                ..Intent::default()
            }
            .with_message_hints(&InterfaceCatalog::builtin())
        };

        let stake_info = hinted("what is my stake info");
        assert!(stake_info.action.is_empty());
        assert_eq!(resolved(&stake_info).function.canonical(), "getStakeInfo(address)");

        let rewards = hinted("can I claim rewards yet?");
        assert!(rewards.action.is_empty());
        let operation = resolved(&rewards);
        assert_eq!(operation.kind, OperationKind::Read);
        assert_eq!(operation.function.canonical(), "pendingRewards(address)");

        let withdraw = hinted("how much can I withdraw?");
        assert!(withdraw.action.is_empty());
        let outcome = classify(&InterfaceCatalog::builtin(), &withdraw, &context())
            .expect("unmatched read is not an error");
        assert!(matches!(outcome, Classification::Unknown(_)));
    }

    #[test]
    fn token_amounts_scale_by_decimals() {
        assert_eq!(parse_token_amount("1.5", 6), Ok(U256::from(1_500_000u64)));
        assert_eq!(parse_token_amount("0.10", 2), Ok(U256::from(10u64)));
        assert_eq!(parse_token_amount("7", 0), Ok(U256::from(7u64)));
        assert!(parse_token_amount("1.234", 2).is_err());
        assert!(parse_token_amount("-1", 18).is_err());
        assert!(parse_token_amount("1e18", 18).is_err());
        assert!(parse_token_amount(&"9".repeat(80), 18).is_err());
    }
}
