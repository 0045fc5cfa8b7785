//! # openworld - Lazy Partial Worlds for Open-Universe Inference
//!
//! openworld is the inference core of an open-universe probabilistic
//! engine. A model declares types, guaranteed objects, origin patterns that
//! generate unknown numbers of objects, and random functions with dependency
//! models. Inference runs MCMC over partial worlds: only the variables a
//! query or proposal actually touches are ever instantiated.
//!
//! ## Core Concepts
//!
//! - **Variable**: a random-function application `F(a1, .., an)` or a number
//!   variable `#Type(origin args)` counting generated objects
//! - **PartialWorld**: a lazily extended assignment of values to variables
//! - **WorldDiff**: a copy-on-write layer over a world with `save`/`revert`
//! - **Proposer**: turns the current world into the next MCMC state
//!
//! ## Usage
//!
//! ```rust
//! use openworld::models::coin_model;
//! use openworld::proposer::{conjugate::BetaParams, GibbsConfig, Proposer, VariableGibbsProposer};
//! use openworld::{Query, WorldDiff, WorldView};
//!
//! let coin = coin_model(BetaParams::new(2.0, 2.0)?, 10)?;
//! let evidence = coin.evidence(&[true, true, false, true])?;
//! let config = GibbsConfig { seed: Some(7), ..GibbsConfig::default() };
//! let mut gibbs = VariableGibbsProposer::new(coin.model.clone(), config)?;
//!
//! let world = gibbs.initialize(&evidence, &[Query::new(coin.bias_var())])?;
//! let mut diff = WorldDiff::from(world);
//! gibbs.propose_next_state(&mut diff)?;
//! assert!(diff.value(&coin.bias_var()).is_some());
//! # Ok::<(), openworld::EngineError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod evidence;
pub mod object;
pub mod value;
pub mod variable;

// Model and distributions
pub mod distrib;
pub mod model;
pub mod models;

// Inference
pub mod chain;
pub mod proposer;
pub mod world;

pub use chain::{ChainConfig, ChainStats, MarkovChain};
pub use distrib::{DistribSpec, Distribution, DistributionRegistry};
pub use error::{EngineError, EngineResult, EvalError, ModelError, ProposalError, ValidationError};
pub use evidence::{Evidence, Query};
pub use model::{Dependency, DependencyModel, Model, ModelBuilder, ParentReader};
pub use object::{GeneratedObject, GuaranteedObject, LineageId, ObjectRef, TypeName};
pub use proposer::{MoveKind, Proposal, Proposer, RelationProposer, VariableGibbsProposer};
pub use value::{Value, ValueType};
pub use variable::{CountVar, FuncAppVar, FuncRef, PopId, Variable};
pub use world::{PartialWorld, WorldDiff, WorldView};
