//! Ensemble materialization and job orchestration for simulation models.
//!
//! A [`ParameterSpace`] is turned into an [`EnsembleTable`] by sampling or by
//! a Cartesian product; the [`RunPlanner`] maps each row to a run directory
//! and a model command, and dispatches it through the [`Executor`], a
//! [`SchedulerBackend`] or, all at once, the [`ArrayJobBuilder`].

pub mod array;
pub mod config;
pub mod errors;
pub mod executor;
pub mod indices;
pub mod model;
pub mod param;
pub mod planner;
pub mod scheduler;
pub mod table;

pub use array::ArrayJobBuilder;
pub use config::{ConfigWriter, ExperimentConfig};
pub use errors::{EnsembleError, ErrorKind, Result};
pub use executor::{ExecMode, Executor};
pub use indices::MemberIndex;
pub use model::{CommandTemplate, ModelCommand, ModelWrapper, ParamFileType};
pub use param::{Distribution, Parameter, ParameterSpace, SamplingMethod};
pub use planner::{DirLayout, MemberOutcome, MemberStage, RunDescriptor, RunHandle, RunPlanner, SubmitHandle};
pub use scheduler::{backend_by_name, JobId, Resources, SchedulerBackend, SchedulerConfig};
pub use table::EnsembleTable;
