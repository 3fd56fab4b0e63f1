// getML client
// Author: Gabriel Demetrios Lafis

//! # getML client
//!
//! A typed Rust client for the getML relational learning engine.
//!
//! ## Features
//!
//! - Column expressions built locally and evaluated by the engine
//! - Slicing with negative and open bounds, resolved with at most one length request
//! - Data frames and lazily composed views
//! - Placeholders, joins and the data model sent to the engine
//! - Containers, star schemas and time series for train/test subsets
//! - Pipelines: fit, transform, predict and score over a thin RPC layer
//! - Project management through the monitor
//!
//! ## Example
//!
//! ```rust,no_run
//! use getml_client::{
//!     comm::Session,
//!     data::{DataFrame, DataModel, JoinOptions, Roles, Table},
//!     pipeline::{FastProp, Pipeline, XGBoostClassifier, LossFunction},
//!     project,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Switch the engine to a project
//! let session = project::set_project(&Session::default(), "loans")?;
//!
//! // Point at data frames that already live on the engine
//! let mut loans = DataFrame::new("loans", Roles::new())?;
//! loans.refresh(&session)?;
//! let mut trans = DataFrame::new("trans", Roles::new())?;
//! trans.refresh(&session)?;
//!
//! // Column expressions are built locally and only evaluated on request
//! let large = trans.get_column("amount")?.try_compare("greater", 1000.0)?;
//! let large_trans = trans.where_(&session, large)?;
//! println!("{:?}", large_trans.nrows(&session, false)?);
//!
//! // Describe how the tables relate
//! let mut data_model = DataModel::new(loans.to_placeholder(None));
//! let trans_ph = data_model.add(trans.to_placeholder(None));
//! data_model.join(data_model.population(), trans_ph, JoinOptions::new().on("account_id"))?;
//!
//! // Fit a pipeline
//! let mut pipe = Pipeline::new(data_model)
//!     .loss_function(LossFunction::CrossEntropyLoss)
//!     .with_feature_learner(FastProp::new())
//!     .with_predictor(XGBoostClassifier::new());
//!
//! let population = Table::from(loans);
//! let peripheral = vec![Table::from(trans)];
//!
//! pipe.fit(&session, &population, &peripheral, None)?;
//! let scores = pipe.score(&session, &population, &peripheral)?;
//! println!("AUC: {:?}", scores.auc());
//! # Ok(())
//! # }
//! ```

pub mod comm;
pub mod data;
pub mod pipeline;
pub mod project;
pub mod utils;

// Re-export main types
pub use comm::{CommError, Session};
pub use data::{DataError, DataFrame, DataModel, Placeholder, Role, Roles, Table, View};
pub use pipeline::{Pipeline, PipelineError};
pub use project::ProjectError;
pub use utils::{AppError, AppResult, Config};
