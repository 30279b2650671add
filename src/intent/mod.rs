/// Intent subsystem: catalog lookup, classification, ABI encoding and call
/// compilation.
///
/// The modules form a pipeline:
///
/// 1. [`abi`] provides argument types, canonical signatures, 4-byte selectors
///    and event topics.
/// 2. [`codec`] provides head/tail encoding and bounds-checked decoding of
///    [`AbiValue`]s.
/// 3. [`catalog`] provides the static, versioned table of known reads, writes,
///    hub and registry entry points, and events. Loaded once per process.
/// 4. [`classifier`] maps an [`Intent`] purely to a
///    [`ResolvedOperation`] or a clarification.
/// 5. [`compiler`] turns a resolved operation into a gas-estimated, signer-ready
///    [`CompiledCall`], wrapped for the hub when routed through it.
///
/// [`AbiValue`]: codec::AbiValue
/// [`Intent`]: classifier::Intent
/// [`ResolvedOperation`]: crate::domain::types::ResolvedOperation
/// [`CompiledCall`]: crate::domain::types::CompiledCall
pub mod abi;
pub mod catalog;
pub mod classifier;
pub mod codec;
pub mod compiler;
