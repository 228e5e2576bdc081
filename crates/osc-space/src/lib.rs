//! OSC Space
//!
//! Address pattern matching and method dispatch for Open Sound Control.
//!
//! Senders address one or many methods at once with patterns such as
//! `/synth/*/freq` or `/mixer/{left,right}/gain[1-4]`. This crate provides:
//! - Pattern parsing ([`AddressPattern`], [`Component`], [`Token`])
//! - Anchored backtracking matching of one path segment ([`matcher`])
//! - A trie of registered methods ([`Node`])
//! - Registration, lookup and dispatch over that trie ([`AddressSpace`])
//! - A lock-protected handle for concurrent register/dispatch ([`SharedAddressSpace`])
//!
//! # Example
//!
//! ```
//! use osc_space::AddressSpace;
//!
//! let mut space = AddressSpace::new();
//! let a = space.register("/methodA", None);
//! let b = space.register("/some/address/methodB", None);
//!
//! assert_eq!(space.methods("/methodA"), vec![a]);
//! assert_eq!(space.methods("/some/*/method?"), vec![b]);
//! ```

pub mod config;
pub mod error;
pub mod matcher;
pub mod node;
pub mod pattern;
pub mod shared;
pub mod space;

pub use config::{AddressSpaceConfig, AlternativeOrder, PatternOptions, RangePolicy};
pub use error::{Error, Result};
pub use matcher::{evaluate, MatchResult, TokenMatcher};
pub use node::{validate_name, Method, MethodId, Node, NodeId};
pub use pattern::{tokenize, tokenize_with, AddressPattern, CharacterGroup, Component, Token};
pub use shared::SharedAddressSpace;
pub use space::{AddressSpace, Callback, DispatchContext, MethodCall};

/// Path separator of OSC addresses
pub const PATH_SEPARATOR: char = '/';
