use serde::{Deserialize, Serialize};

/// Arguments of `/_get_epochs`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpochsQuery {
    pub date: Option<String>,
}

/// Arguments of `/_get_steps`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepsQuery {
    pub date: Option<String>,
    pub epoch: Option<String>,
}

/// Arguments of `/_predict`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictQuery {
    /// Base64 encoded input sequence
    pub seq_str: Option<String>,
    pub date: Option<String>,
    pub epoch: Option<String>,
    pub step: Option<String>,
}

/// Response of `/_get_dates`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatesResponse {
    pub dates: Vec<String>,
}

/// Response of `/_get_epochs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochsResponse {
    /// Key spelled the way existing clients expect it
    pub epoches: Vec<String>,
}

/// Response of `/_get_steps`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepsResponse {
    pub steps: Vec<String>,
}

/// Success envelope of `/_predict`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub data: PredictData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictData {
    /// Candidates, best first, each rendered as space-joined tokens
    pub results: Vec<String>,
}
