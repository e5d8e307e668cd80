use interchange::InterchangeError;
use thiserror::Error;

use crate::design::DesignError;
use crate::elab::ElabError;

/// Errors raised while converting between a design and an interchange package
#[derive(Debug, Error)]
pub enum ExchangeError {
	#[error(transparent)]
	Design(#[from] DesignError),

	#[error(transparent)]
	Elab(#[from] ElabError),

	#[error(transparent)]
	Interchange(#[from] InterchangeError),

	#[error("Module `{0}` must be elaborated before it can be exported")]
	NotElaborated(String),

	#[error("{kind} connected to Port `{port}` of Instance `{instance}` in Module `{module}` cannot be exported")]
	UnloweredConnection {
		kind: &'static str,
		port: String,
		instance: String,
		module: String,
	},

	#[error("Instance `{instance}` in Module `{module}` has no exportable target")]
	UnresolvedTarget { instance: String, module: String },
}
