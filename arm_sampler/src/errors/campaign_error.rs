use std::error::Error;
use std::fmt;

use super::{DatasetError, ExportError};

#[derive(Debug, Clone, PartialEq)]
pub enum DriveError {
    /// A blend is already driving this joint set.
    BlendInFlight,
    /// Slot does not name an actuated joint.
    UnknownJoint(usize),
}

impl Error for DriveError {}

impl fmt::Display for DriveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DriveError::BlendInFlight => write!(f, "A blend is already in flight for this joint set"),
            DriveError::UnknownJoint(slot) => write!(f, "No actuated joint at slot {}", slot),
        }
    }
}

#[derive(Debug)]
pub enum CampaignError {
    Drive(DriveError),
    Dataset(DatasetError),
    Export(ExportError),
    Config(String),
}

impl Error for CampaignError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CampaignError::Drive(e) => Some(e),
            CampaignError::Dataset(e) => Some(e),
            CampaignError::Export(e) => Some(e),
            CampaignError::Config(_) => None,
        }
    }
}

impl fmt::Display for CampaignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CampaignError::Drive(ref e) => write!(f, "Drive error: {}", e),
            CampaignError::Dataset(ref e) => write!(f, "{}", e),
            CampaignError::Export(ref e) => write!(f, "{}", e),
            CampaignError::Config(ref msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl From<DriveError> for CampaignError {
    fn from(e: DriveError) -> Self {
        CampaignError::Drive(e)
    }
}

impl From<DatasetError> for CampaignError {
    fn from(e: DatasetError) -> Self {
        CampaignError::Dataset(e)
    }
}

impl From<ExportError> for CampaignError {
    fn from(e: ExportError) -> Self {
        CampaignError::Export(e)
    }
}
