//! Minimal Solidity ABI encoding for constructor arguments and contract calls.
//!
//! Only the handful of types the ledger contracts take are supported: `address`,
//! `bytes32` and `string`. Static values occupy one 32-byte head word, dynamic
//! values are referenced from the head by an offset into the tail.

use alloy_core::primitives::{Address, B256, Bytes, keccak256};

/// Size of an ABI word in bytes.
const WORD: usize = 32;

/// A single ABI-encodable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    FixedBytes(B256),
    String(String),
}

impl Token {
    /// The canonical Solidity type name used in function signatures.
    pub fn type_name(&self) -> &'static str {
        match self {
            Token::Address(_) => "address",
            Token::FixedBytes(_) => "bytes32",
            Token::String(_) => "string",
        }
    }

    fn is_dynamic(&self) -> bool {
        matches!(self, Token::String(_))
    }
}

/// A call to a contract method, kept in typed form until it is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    /// Method name, without the parameter list.
    pub method: String,
    /// Ordered call arguments.
    pub args: Vec<Token>,
}

impl ContractCall {
    pub fn new(method: impl Into<String>, args: Vec<Token>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }

    /// The canonical signature, e.g. `setLedgerCore(address)`.
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.args.iter().map(Token::type_name).collect();
        format!("{}({})", self.method, params.join(","))
    }

    /// Selector followed by the encoded arguments.
    pub fn calldata(&self) -> Bytes {
        let mut data = selector(&self.signature()).to_vec();
        data.extend(encode(&self.args));
        Bytes::from(data)
    }
}

/// The 4-byte function selector for a canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

/// ABI-encode a tuple of tokens.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let mut head = Vec::with_capacity(tokens.len() * WORD);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            let offset = tokens.len() * WORD + tail.len();
            head.extend_from_slice(&uint_word(offset as u64));
            encode_dynamic(token, &mut tail);
        } else {
            head.extend_from_slice(&static_word(token));
        }
    }

    head.extend(tail);
    head
}

/// Contract creation payload: the creation bytecode followed by the encoded
/// constructor arguments.
pub fn creation_data(bytecode: &Bytes, args: &[Token]) -> Bytes {
    let mut data = bytecode.to_vec();
    data.extend(encode(args));
    Bytes::from(data)
}

fn static_word(token: &Token) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    match token {
        Token::Address(address) => word[12..].copy_from_slice(address.as_slice()),
        Token::FixedBytes(bytes) => word.copy_from_slice(bytes.as_slice()),
        Token::String(_) => unreachable!("dynamic tokens are encoded in the tail"),
    }
    word
}

fn encode_dynamic(token: &Token, tail: &mut Vec<u8>) {
    let Token::String(value) = token else {
        return;
    };
    let bytes = value.as_bytes();
    tail.extend_from_slice(&uint_word(bytes.len() as u64));
    tail.extend_from_slice(bytes);
    let padding = (WORD - bytes.len() % WORD) % WORD;
    tail.extend(std::iter::repeat_n(0u8, padding));
}

fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}
