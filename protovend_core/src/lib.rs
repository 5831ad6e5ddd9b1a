//! `protovend_core` is the engine behind the [protovend] CLI. It resolves
//! the transitive closure of proto modules a project depends on, vendors
//! their text, drives an external code generator over them, and relocates
//! the generated artifacts into the project tree.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Module lists (protovend.yaml)
//!   → Resolver (concurrent per-round fetch, import scanning, dedup,
//!     fixed-point convergence, vendoring to disk)
//!   → Generator invocation (one per template identity)
//!   → Migration (staged output moved into the project tree)
//! ```
//!
//! ## Modules
//!
//! - [`config`] — the `protovend.yaml` module lists.
//! - [`template`] — the generator template (`buf.gen.yaml`): plugin
//!   destination overrides and the external-plugins-only copy.
//! - [`fetch`] — module sources: project tree, hosted repositories, and
//!   their ordered composition.
//! - [`scan`] — the two line-anchored declaration patterns resolution needs.
//! - [`resolver`] — the transitive-closure engine.
//! - [`generate`] — external generator argument assembly and invocation.
//! - [`migrate`] — placement of generated output and staging reclamation.
//!
//! ## Key Types
//!
//! - [`Target`] — a resolved module with its destination, template identity,
//!   and generation flag; all four fields form the dedup key.
//! - [`TemplateTargets`] — resolver output, grouped by template identity.
//! - [`Resolver`] — owns one resolution run's state.
//! - [`TreeLayout`] — the filesystem layout shared by all three steps.
//! - [`ProtovendError`] — the crate-wide error type.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use protovend_core::{
//! 	FetcherChain, LocalFetcher, ResolveRequest, Resolver, TreeLayout, migrate, run_generator,
//! };
//!
//! # async fn example() -> protovend_core::ProtovendResult<()> {
//! let layout = TreeLayout {
//! 	root: "/project".into(),
//! 	vendor_dir: ".vendorpb".into(),
//! 	output_dir: "internal/pb".into(),
//! 	project_repo: "github.com/acme/project".into(),
//! };
//!
//! let chain = FetcherChain::new(vec![Box::new(LocalFetcher::new("/project"))]);
//! let mut resolver = Resolver::new(Arc::new(chain), layout.clone());
//!
//! let groups = resolver
//! 	.resolve(ResolveRequest {
//! 		local_modules: vec!["api/billing/billing.proto".into()],
//! 		local_template: "/project/buf.gen.yaml".into(),
//! 		external_template: "/project/.vendorpb/.generate/buf.gen.yaml".into(),
//! 		..Default::default()
//! 	})
//! 	.await?;
//!
//! for (template, targets) in &groups {
//! 	run_generator(&layout, "./bin/buf".as_ref(), template, targets)?;
//! }
//!
//! let all: Vec<_> = groups.into_values().flatten().collect();
//! migrate(&layout, &all)?;
//! # Ok(())
//! # }
//! ```
//!
//! [protovend]: https://github.com/protovend/protovend

pub use config::*;
pub use error::*;
pub use fetch::*;
pub use generate::*;
pub use migrate::*;
pub use resolver::*;
pub use template::*;

pub mod config;
mod error;
pub mod fetch;
pub mod generate;
pub mod migrate;
pub mod resolver;
pub mod scan;
pub mod template;

#[cfg(test)]
mod __tests;
