//! ABI registry - function selectors and event topics of one contract

use std::collections::HashMap;

use alloy_json_abi::JsonAbi;
use alloy_primitives::{keccak256, B256};
use serde::{Serialize, Serializer};

/// A function or event parameter specification
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    /// Parameter name (may be empty)
    pub name: String,
    /// Solidity type (e.g., "address", "uint256", "(uint256,address)")
    pub kind: String,
    /// Event parameter stored in a topic rather than in the data section
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub indexed: bool,
}

impl ParamSpec {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            indexed: false,
        }
    }

    pub fn indexed(name: &str, kind: &str) -> Self {
        Self {
            indexed: true,
            ..Self::new(name, kind)
        }
    }

    /// Dynamic types are only available as their keccak hash when indexed
    pub fn is_dynamic(&self) -> bool {
        let kind = self.kind.trim();
        kind == "string" || kind == "bytes" || kind.ends_with(']') || kind.starts_with('(')
    }
}

/// A function signature with its metadata
#[derive(Debug, Clone, Serialize)]
pub struct FunctionSignature {
    /// 4-byte function selector
    #[serde(serialize_with = "serialize_selector")]
    pub selector: [u8; 4],
    /// Function name
    pub name: String,
    /// Full signature string (e.g., "transfer(address,uint256)")
    pub signature: String,
    pub inputs: Vec<ParamSpec>,
    pub outputs: Vec<ParamSpec>,
}

impl FunctionSignature {
    /// Get selector as hex string
    pub fn selector_hex(&self) -> String {
        format!("0x{}", hex::encode(self.selector))
    }
}

/// An event signature with its topic0
#[derive(Debug, Clone, Serialize)]
pub struct EventSignature {
    pub topic0: B256,
    pub name: String,
    /// Full signature string (e.g., "Transfer(address,address,uint256)")
    pub signature: String,
    pub inputs: Vec<ParamSpec>,
    pub anonymous: bool,
}

impl EventSignature {
    /// Build an event from its name and parameters, deriving signature and topic0
    pub fn new(name: &str, inputs: Vec<ParamSpec>) -> Self {
        let types: Vec<&str> = inputs.iter().map(|p| p.kind.as_str()).collect();
        let signature = format!("{}({})", name, types.join(","));
        Self {
            topic0: keccak256(signature.as_bytes()),
            name: name.to_string(),
            signature,
            inputs,
            anonymous: false,
        }
    }

    /// `Transfer(address indexed from, address indexed to, uint256 value)`
    pub fn erc20_transfer() -> Self {
        Self::new(
            "Transfer",
            vec![
                ParamSpec::indexed("from", "address"),
                ParamSpec::indexed("to", "address"),
                ParamSpec::new("value", "uint256"),
            ],
        )
    }

    /// `Approval(address indexed owner, address indexed spender, uint256 value)`
    pub fn erc20_approval() -> Self {
        Self::new(
            "Approval",
            vec![
                ParamSpec::indexed("owner", "address"),
                ParamSpec::indexed("spender", "address"),
                ParamSpec::new("value", "uint256"),
            ],
        )
    }
}

/// Registry of a contract's functions (by selector) and events (by topic0)
#[derive(Debug, Default, Clone)]
pub struct AbiRegistry {
    functions: HashMap<[u8; 4], FunctionSignature>,
    /// Events in ABI order; lookups by name must be deterministic
    events: Vec<EventSignature>,
}

impl AbiRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding only the standard ERC-20 events
    pub fn erc20() -> Self {
        let mut registry = Self::new();
        registry.ensure_standard_events();
        registry
    }

    /// Build a registry from a parsed JSON ABI
    pub fn from_json_abi(abi: &JsonAbi) -> Self {
        let mut registry = Self::new();

        for function in abi.functions() {
            let inputs = function
                .inputs
                .iter()
                .map(|input| ParamSpec::new(&input.name, &input.selector_type()))
                .collect();
            let outputs = function
                .outputs
                .iter()
                .map(|output| ParamSpec::new(&output.name, &output.selector_type()))
                .collect();
            registry.insert(FunctionSignature {
                selector: function.selector().0,
                name: function.name.clone(),
                signature: function.signature(),
                inputs,
                outputs,
            });
        }

        for event in abi.events() {
            let inputs = event
                .inputs
                .iter()
                .map(|input| ParamSpec {
                    name: input.name.clone(),
                    kind: input.selector_type().into_owned(),
                    indexed: input.indexed,
                })
                .collect();
            registry.insert_event(EventSignature {
                topic0: event.selector(),
                name: event.name.clone(),
                signature: event.signature(),
                inputs,
                anonymous: event.anonymous,
            });
        }

        registry
    }

    /// Insert a function signature
    ///
    /// Note: First function for a given selector wins (no overwrite)
    pub fn insert(&mut self, function: FunctionSignature) {
        self.functions.entry(function.selector).or_insert(function);
    }

    /// Insert an event signature, first event for a given topic0 wins
    pub fn insert_event(&mut self, event: EventSignature) {
        if self.event_by_topic(event.topic0).is_none() {
            self.events.push(event);
        }
    }

    /// Add `Transfer` and `Approval` when absent, returning the injected names
    pub fn ensure_standard_events(&mut self) -> Vec<String> {
        let mut injected = Vec::new();
        for event in [EventSignature::erc20_transfer(), EventSignature::erc20_approval()] {
            if self.event(&event.name).is_none() {
                injected.push(event.name.clone());
                self.insert_event(event);
            }
        }
        injected
    }

    /// Look up a function by selector
    pub fn lookup(&self, selector: [u8; 4]) -> Option<&FunctionSignature> {
        self.functions.get(&selector)
    }

    /// Look up a function by selector hex string (e.g., "0xa9059cbb")
    pub fn lookup_hex(&self, selector_hex: &str) -> Option<&FunctionSignature> {
        let normalized = selector_hex
            .strip_prefix("0x")
            .or_else(|| selector_hex.strip_prefix("0X"))
            .unwrap_or(selector_hex);

        if normalized.len() != 8 {
            return None;
        }

        let bytes = hex::decode(normalized).ok()?;
        let selector: [u8; 4] = bytes.try_into().ok()?;
        self.lookup(selector)
    }

    /// Look up an event by name or by full signature ("Transfer(address,address,uint256)")
    pub fn event(&self, name_or_signature: &str) -> Option<&EventSignature> {
        let wanted = name_or_signature.trim();
        if wanted.contains('(') {
            let wanted: String = wanted.chars().filter(|c| !c.is_whitespace()).collect();
            return self.events.iter().find(|e| e.signature == wanted);
        }
        self.events.iter().find(|e| e.name == wanted)
    }

    pub fn event_by_topic(&self, topic0: B256) -> Option<&EventSignature> {
        self.events.iter().find(|e| e.topic0 == topic0)
    }

    /// Get the number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.events.is_empty()
    }

    /// Functions sorted by name, then selector
    pub fn functions(&self) -> Vec<FunctionSignature> {
        let mut functions: Vec<FunctionSignature> = self.functions.values().cloned().collect();
        functions.sort_by(|a, b| a.name.cmp(&b.name).then(a.selector.cmp(&b.selector)));
        functions
    }

    pub fn events(&self) -> &[EventSignature] {
        &self.events
    }
}

fn serialize_selector<S: Serializer>(selector: &[u8; 4], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("0x{}", hex::encode(selector)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ERC20_ABI: &str = r#"[
        {"type":"function","name":"transfer","stateMutability":"nonpayable",
         "inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],
         "outputs":[{"name":"","type":"bool"}]},
        {"type":"event","name":"Transfer","anonymous":false,
         "inputs":[{"name":"from","type":"address","indexed":true},
                   {"name":"to","type":"address","indexed":true},
                   {"name":"value","type":"uint256","indexed":false}]}
    ]"#;

    #[test]
    fn test_registry_insert_lookup() {
        let mut registry = AbiRegistry::new();
        let func = FunctionSignature {
            selector: [0xa9, 0x05, 0x9c, 0xbb],
            name: "transfer".to_string(),
            signature: "transfer(address,uint256)".to_string(),
            inputs: vec![ParamSpec::new("to", "address"), ParamSpec::new("amount", "uint256")],
            outputs: vec![],
        };

        registry.insert(func);

        assert_eq!(registry.len(), 1);
        assert!(registry.lookup([0xa9, 0x05, 0x9c, 0xbb]).is_some());
        assert!(registry.lookup_hex("0xa9059cbb").is_some());
        assert!(registry.lookup_hex("0xdeadbeef").is_none());
    }

    #[test]
    fn test_from_json_abi() {
        let abi: JsonAbi = serde_json::from_str(ERC20_ABI).unwrap();
        let registry = AbiRegistry::from_json_abi(&abi);

        let transfer = registry.lookup_hex("0xa9059cbb").unwrap();
        assert_eq!(transfer.signature, "transfer(address,uint256)");
        assert_eq!(transfer.outputs[0].kind, "bool");

        let event = registry.event("Transfer").unwrap();
        assert_eq!(event.topic0, EventSignature::erc20_transfer().topic0);
        assert!(event.inputs[0].indexed);
        assert!(!event.inputs[2].indexed);
        assert!(registry.event("Transfer(address, address, uint256)").is_some());
    }

    #[test]
    fn test_standard_event_injection() {
        let abi: JsonAbi = serde_json::from_str(ERC20_ABI).unwrap();
        let mut registry = AbiRegistry::from_json_abi(&abi);

        let injected = registry.ensure_standard_events();
        assert_eq!(injected, vec!["Approval".to_string()]);
        assert_eq!(registry.events().len(), 2);

        // idempotent
        assert!(registry.ensure_standard_events().is_empty());
    }

    #[test]
    fn test_standard_topics() {
        assert_eq!(
            format!("{:x}", EventSignature::erc20_transfer().topic0),
            "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
        assert_eq!(
            format!("{:x}", EventSignature::erc20_approval().topic0),
            "8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925"
        );
    }
}
