//! Runtime ABI decoding against a [`TriggerBinding`]'s parsed signature.
//!
//! The teacher decodes events through `alloy::sol!`-generated static
//! types, one struct per event. Here the Trigger Registry resolves
//! signatures from a configuration file at startup, so there is no
//! compile-time type to generate against; `alloy::dyn_abi` decodes each
//! matched log or transaction against the signature's parsed parameter
//! list instead.

use alloy::dyn_abi::{DynSolType, DynSolValue};

use crate::error::{InfraError, Result};
use crate::types::block::LogEntry;
use crate::types::trigger::TriggerBinding;

/// Decode an event log's indexed topics and non-indexed data into values
/// ordered the same way as `binding.decoded_params`.
///
/// # Errors
/// Returns [`InfraError::Decode`] if a parameter's Solidity type doesn't
/// parse, or if the topic/data layout doesn't match the signature (wrong
/// topic count, truncated data).
pub fn decode_event_params(binding: &TriggerBinding, log: &LogEntry) -> Result<Vec<DynSolValue>> {
    let indexed_topics = &log.topics[1.min(log.topics.len())..];

    let mut indexed_iter = indexed_topics.iter();
    let non_indexed_types: Vec<DynSolType> = binding
        .decoded_params
        .iter()
        .filter(|p| !p.indexed)
        .map(|p| parse_type(&p.ty))
        .collect::<Result<_>>()?;

    let non_indexed_tuple = DynSolType::Tuple(non_indexed_types);
    let decoded_non_indexed = non_indexed_tuple
        .abi_decode_sequence(&log.data)
        .map_err(|e| InfraError::Decode(format!("event data decode failed: {e}")))?;
    let mut non_indexed_values = match decoded_non_indexed {
        DynSolValue::Tuple(values) => values.into_iter(),
        other => vec![other].into_iter(),
    };

    let mut out = Vec::with_capacity(binding.decoded_params.len());
    for param in &binding.decoded_params {
        if param.indexed {
            let topic = indexed_iter
                .next()
                .ok_or_else(|| InfraError::Decode(format!("missing indexed topic for {}", param.ty)))?;
            let ty = parse_type(&param.ty)?;
            let value = ty
                .abi_decode(topic.as_bytes())
                .map_err(|e| InfraError::Decode(format!("indexed topic decode failed: {e}")))?;
            out.push(value);
        } else {
            let value = non_indexed_values
                .next()
                .ok_or_else(|| InfraError::Decode(format!("missing non-indexed value for {}", param.ty)))?;
            out.push(value);
        }
    }

    Ok(out)
}

/// Decode a transaction's calldata (with the 4-byte selector already
/// stripped) against `binding.decoded_params`, in declaration order.
///
/// # Errors
/// Returns [`InfraError::Decode`] if a parameter type doesn't parse or
/// the calldata doesn't match the signature's tuple layout.
pub fn decode_function_params(binding: &TriggerBinding, calldata_without_selector: &[u8]) -> Result<Vec<DynSolValue>> {
    let types: Vec<DynSolType> = binding.decoded_params.iter().map(|p| parse_type(&p.ty)).collect::<Result<_>>()?;
    let tuple = DynSolType::Tuple(types);
    let decoded = tuple
        .abi_decode_sequence(calldata_without_selector)
        .map_err(|e| InfraError::Decode(format!("function calldata decode failed: {e}")))?;

    match decoded {
        DynSolValue::Tuple(values) => Ok(values),
        other => Ok(vec![other]),
    }
}

fn parse_type(ty: &str) -> Result<DynSolType> {
    ty.parse().map_err(|e| InfraError::Decode(format!("unparseable Solidity type {ty:?}: {e}")).into())
}
