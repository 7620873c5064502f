use thiserror::Error;

/// Errors raised by the pure computations of the crate
/// File and layer handling reports through `anyhow` instead
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MorphoError {
    /// No qualifying segments or observations for a required computation
    #[error("no qualifying input for {0}")]
    EmptyInput(String),
    /// A trimmed group has too few points to define the statistic
    #[error("{statistic} is undefined for {observations} observation(s)")]
    UndefinedStatistic {
        statistic: &'static str,
        observations: usize,
    },
    #[error("invalid geometry: {0}")]
    Geometry(String),
    #[error("invalid ASCII grid: {0}")]
    Grid(String),
    #[error("missing column `{0}`")]
    MissingColumn(String),
}

pub type MorphoResult<T> = std::result::Result<T, MorphoError>;

impl MorphoError {
    /// True for the errors an `UndefinedPolicy::Nan` run turns into NaN
    pub fn is_undefined(&self) -> bool {
        matches!(
            self,
            MorphoError::EmptyInput(_) | MorphoError::UndefinedStatistic { .. }
        )
    }
}
