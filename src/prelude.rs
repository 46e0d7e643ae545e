//! Items used by nearly every module of the optimiser.

pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, info, trace, warn};

pub use crate::error::{InternalError, InternalResult};
