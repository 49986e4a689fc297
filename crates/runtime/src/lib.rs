//! Async orchestration for the action resolution engine.
//!
//! This crate wires `arbiter-core`'s pure resolution logic to a host
//! system: the interactive configuration prompt, the persistence layer,
//! template placement and dice visualization are all async ports injected
//! through [`ActionUse::builder`]. Consumers build one [`ActionUse`] per
//! invocation and call [`ActionUse::process`].
//!
//! Modules by responsibility:
//! - [`process`] hosts the orchestrator and builder
//! - [`hooks`] provides the extension-point system (observe/veto)
//! - [`services`] defines the external service ports
//! - [`result`] is the serializable outcome bundle
pub mod config;
pub mod error;
pub mod hooks;
pub mod process;
pub mod result;
pub mod services;

pub use config::ProcessOptions;
pub use error::{Result, RuntimeError};
pub use hooks::{
    ExtensionPoint, HookCriticality, HookEvent, HookRegistry, HookVerdict, UseHook,
};
pub use process::{ActionUse, ActionUseBuilder, UseOutcome};
pub use result::{AmmoReport, ResultBundle, SaveResult};
pub use services::{
    ConfigurationPrompt, DiceVisualizer, Persistence, ResourceUpdate, TemplateHandle,
    TemplateService, UpdateRejection,
};
